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

//! Consumer-side RDP stage
//!
//! Forwards raw commands to the [`RdpSink`] and executes the two render
//! mode stack extensions. The stage mirrors the last SET_COMBINE and
//! SET_OTHER_MODES it forwarded; PUSH saves them, POP re-emits the saved
//! pair.

use super::sink::RdpSink;
use super::ConsumerFault;
use crate::core::rdp::commands::{
    self, POP_RENDER_MODE, PUSH_RENDER_MODE, SET_COMBINE, SET_OTHER_MODES,
};
use crate::core::rdp::MODE_STACK_SAVED;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ModeRegisters {
    combine: Option<u64>,
    other_modes: Option<u64>,
}

pub(crate) struct RdpStage {
    sink: Box<dyn RdpSink + Send>,
    current: ModeRegisters,
    stack: Vec<ModeRegisters>,
}

impl RdpStage {
    pub fn new(sink: Box<dyn RdpSink + Send>) -> Self {
        Self {
            sink,
            current: ModeRegisters::default(),
            stack: Vec::with_capacity(MODE_STACK_SAVED),
        }
    }

    /// Stall until the sink has drained
    pub fn wait_idle(&mut self) {
        self.sink.wait_idle();
    }

    pub fn execute(&mut self, words: &[u32]) -> Result<(), ConsumerFault> {
        let command = commands::join(words);
        let Some(&first) = command.first() else {
            return Ok(());
        };

        match commands::opcode(first) {
            PUSH_RENDER_MODE => {
                if self.stack.len() >= MODE_STACK_SAVED {
                    return Err(ConsumerFault::ModeStackOverflow);
                }
                self.stack.push(self.current);
            }
            POP_RENDER_MODE => {
                let saved = self.stack.pop().ok_or(ConsumerFault::ModeStackUnderflow)?;
                self.current = saved;
                if let Some(combine) = saved.combine {
                    self.sink.submit(&[combine]);
                }
                if let Some(other_modes) = saved.other_modes {
                    self.sink.submit(&[other_modes]);
                }
            }
            op => {
                match op {
                    SET_COMBINE => self.current.combine = Some(first),
                    SET_OTHER_MODES => self.current.other_modes = Some(first),
                    _ => {}
                }
                self.sink.submit(&command);
            }
        }
        Ok(())
    }
}
