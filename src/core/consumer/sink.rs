// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Consumer outputs
//!
//! The consumer hands each command of a registered overlay to a
//! [`CommandSink`], and the raw RDP stream to an [`RdpSink`]. Logging
//! implementations share their storage behind an `Arc`, so a clone kept
//! by the caller observes what a consumer thread recorded.

use crate::core::overlay::OverlayId;
use std::sync::{Arc, Mutex, MutexGuard};

/// One command of an external overlay, as seen by the consumer
#[derive(Debug)]
pub struct Dispatch<'a> {
    /// Base ID of the overlay
    pub overlay: OverlayId,

    /// Overlay name
    pub name: &'a str,

    /// Command index relative to the base ID (may exceed 15)
    pub command: u32,

    /// Every word of the command, header included
    pub words: &'a [u32],

    /// The overlay's resident state
    pub state: &'a mut [u32],
}

/// Executor of external overlay commands
pub trait CommandSink {
    fn execute(&mut self, dispatch: Dispatch<'_>);
}

/// Receiver of raw 64-bit RDP commands
pub trait RdpSink {
    /// Accept one command (several words for triangles and rectangles)
    fn submit(&mut self, command: &[u64]);

    /// Return once every submitted command has been rasterized
    fn wait_idle(&mut self) {}
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl CommandSink for NullSink {
    fn execute(&mut self, _dispatch: Dispatch<'_>) {}
}

impl RdpSink for NullSink {
    fn submit(&mut self, _command: &[u64]) {}
}

/// Command recorded by [`CommandLog`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedCommand {
    pub overlay: OverlayId,
    pub name: String,
    pub command: u32,
    pub words: Vec<u32>,
}

/// Sink recording every dispatched command
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    entries: Arc<Mutex<Vec<LoggedCommand>>>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LoggedCommand>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of the commands recorded so far
    pub fn commands(&self) -> Vec<LoggedCommand> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl CommandSink for CommandLog {
    fn execute(&mut self, dispatch: Dispatch<'_>) {
        self.lock().push(LoggedCommand {
            overlay: dispatch.overlay,
            name: dispatch.name.to_string(),
            command: dispatch.command,
            words: dispatch.words.to_vec(),
        });
    }
}

/// Sink recording the raw RDP stream
#[derive(Debug, Clone, Default)]
pub struct RdpLog {
    commands: Arc<Mutex<Vec<Vec<u64>>>>,
}

impl RdpLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Vec<u64>>> {
        self.commands.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of the commands recorded so far
    pub fn commands(&self) -> Vec<Vec<u64>> {
        self.lock().clone()
    }

    /// Recorded commands as one flat stream of 64-bit words
    pub fn stream(&self) -> Vec<u64> {
        self.lock().iter().flatten().copied().collect()
    }

    /// Opcode of each recorded command
    pub fn opcodes(&self) -> Vec<u8> {
        self.lock()
            .iter()
            .map(|command| ((command[0] >> 56) & 0x3F) as u8)
            .collect()
    }

    /// Number of recorded commands
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl RdpSink for RdpLog {
    fn submit(&mut self, command: &[u64]) {
        if !command.is_empty() {
            self.lock().push(command.to_vec());
        }
    }
}

/// Send the stream to two sinks
impl<A: RdpSink, B: RdpSink> RdpSink for (A, B) {
    fn submit(&mut self, command: &[u64]) {
        self.0.submit(command);
        self.1.submit(command);
    }

    fn wait_idle(&mut self) {
        self.0.wait_idle();
        self.1.wait_idle();
    }
}
