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

//! RDP stream capture
//!
//! [`TraceRecorder`] is an [`RdpSink`] that keeps every command the
//! consumer sent to the rasterizer. The resulting [`Trace`] can be saved
//! with bincode and reloaded later, or exported in the two formats the
//! validator reads.
//!
//! # Example
//!
//! ```
//! use rcpq::core::consumer::RdpSink;
//! use rcpq::core::trace::TraceRecorder;
//!
//! let recorder = TraceRecorder::new();
//! let mut sink = recorder.clone();
//! sink.submit(&[0xE900_0000_0000_0000]);
//! assert_eq!(recorder.trace().stream(), vec![0xE900_0000_0000_0000]);
//! ```

use crate::core::consumer::RdpSink;
use crate::core::error::{QueueError, Result};
use crate::core::validate::{Report, Validator};
use bincode::{config, Decode, Encode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Trace file format version
///
/// Increment when the layout of [`Trace`] changes.
pub const TRACE_VERSION: u32 = 1;

/// Captured RDP stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Trace {
    /// Format version
    pub version: u32,

    /// When the capture started
    #[bincode(with_serde)]
    pub captured_at: DateTime<Utc>,

    /// One entry per command, every word included
    pub commands: Vec<Vec<u64>>,
}

impl Default for Trace {
    fn default() -> Self {
        Self::new()
    }
}

impl Trace {
    pub fn new() -> Self {
        Self {
            version: TRACE_VERSION,
            captured_at: Utc::now(),
            commands: Vec::new(),
        }
    }

    pub fn push(&mut self, command: &[u64]) {
        self.commands.push(command.to_vec());
    }

    /// Number of commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Commands as one flat stream
    pub fn stream(&self) -> Vec<u64> {
        self.commands.iter().flatten().copied().collect()
    }

    /// Replay the trace through a fresh validator
    pub fn validate(&self) -> Report {
        let mut validator = Validator::new();
        for command in &self.commands {
            validator.validate(command);
        }
        validator.finish()
    }

    /// Encode to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::encode_to_vec(self, config::standard())?)
    }

    /// Decode from bytes, checking the version
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (trace, _): (Trace, usize) = bincode::decode_from_slice(bytes, config::standard())?;
        if trace.version != TRACE_VERSION {
            return Err(QueueError::TraceVersion {
                expected: TRACE_VERSION,
                found: trace.version,
            });
        }
        Ok(trace)
    }

    /// Save the trace to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let encoded = self.to_bytes()?;
        let mut file = File::create(path.as_ref())?;
        file.write_all(&encoded)?;
        log::info!(
            "trace: saved {} commands to {}",
            self.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Load a trace saved with [`Trace::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        Self::from_bytes(&buffer)
    }

    /// Write the stream as raw big-endian words
    pub fn export_binary(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        for word in self.stream() {
            out.write_all(&word.to_be_bytes())?;
        }
        out.flush()?;
        Ok(())
    }

    /// Write the stream as hex text, one word per line
    pub fn export_hex(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(
            out,
            "# rcpq trace, {} commands, captured {}",
            self.len(),
            self.captured_at.to_rfc3339()
        )?;
        for word in self.stream() {
            writeln!(out, "0x{:016X}", word)?;
        }
        out.flush()?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RecorderState {
    trace: Trace,
    validator: Option<Validator>,
}

/// Sink capturing the RDP stream into a [`Trace`]
///
/// Clones share the capture, so a clone kept by the caller sees what a
/// consumer thread recorded.
#[derive(Debug, Clone, Default)]
pub struct TraceRecorder {
    state: Arc<Mutex<RecorderState>>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorder that also validates every command as it arrives
    ///
    /// Findings are logged at warn level as they are made.
    pub fn with_validation() -> Self {
        Self {
            state: Arc::new(Mutex::new(RecorderState {
                trace: Trace::new(),
                validator: Some(Validator::live()),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of the capture so far
    pub fn trace(&self) -> Trace {
        self.lock().trace.clone()
    }

    /// Findings of the live validator, if enabled
    pub fn report(&self) -> Option<Report> {
        self.lock().validator.clone().map(Validator::finish)
    }

    pub fn len(&self) -> usize {
        self.lock().trace.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().trace.is_empty()
    }
}

impl RdpSink for TraceRecorder {
    fn submit(&mut self, command: &[u64]) {
        if command.is_empty() {
            return;
        }
        let mut state = self.lock();
        state.trace.push(command);
        if let Some(validator) = state.validator.as_mut() {
            validator.validate(command);
        }
    }
}
