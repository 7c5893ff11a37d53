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

//! Simulated coprocessor
//!
//! [`Coprocessor`] is the consumer end of the command stream: a command
//! dispatcher that follows the chained segments, calls into blocks, honors
//! high-priority requests, and hands overlay commands to its sinks.
//!
//! # Execution Contexts
//!
//! Two contexts exist, one per priority. Each has a read cursor and its
//! own return stack, bounded by the block nesting limit:
//!
//! ```text
//! context | starts at                | entered when
//! --------|--------------------------|----------------------------------
//! normal  | first normal segment     | startup, last SWAP_BUFFERS
//! high    | first high-prio segment  | highpri_pending > 0 (checked
//!         |                          | before every normal command)
//! ```
//!
//! # Faults
//!
//! A stream the dispatcher cannot interpret halts it: the fault is
//! logged, recorded in the status register, and HALTED is raised. Blocking
//! producer calls then fail instead of waiting forever.
//!
//! # Driving
//!
//! - [`Coprocessor::run`]: background loop, sleeps on the MORE signal
//! - [`Coprocessor::step`] / [`Coprocessor::run_until_idle`]: manual,
//!   deterministic stepping for tests

mod rdp_stage;
mod sink;

#[cfg(test)]
mod tests;

pub use sink::{CommandLog, CommandSink, Dispatch, LoggedCommand, NullSink, RdpLog, RdpSink};

use crate::core::error::{fatal, ProtocolViolation};
use crate::core::memory::Segment;
use crate::core::overlay::{OverlayKind, COMMANDS_PER_ID};
use crate::core::queue::commands::{self, status_masks};
use crate::core::queue::Shared;
use crate::core::signal::Signals;
use rdp_stage::RdpStage;
use std::sync::Arc;
use thiserror::Error;

/// Reason the consumer halted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsumerFault {
    #[error("unknown internal command 0x{0:X}")]
    UnknownInternalCommand(u32),

    #[error("overlay 0x{0:X} is not registered")]
    UnknownOverlay(u32),

    #[error("command {index} does not exist in overlay 0x{overlay:X}")]
    UnknownCommand { overlay: u32, index: u32 },

    #[error("address 0x{0:06X} is not mapped")]
    UnmappedAddress(u32),

    #[error("command at offset {offset} runs past the end of its segment ({words} words)")]
    TruncatedCommand { offset: usize, words: usize },

    #[error("call stack overflow (depth {0})")]
    CallStackOverflow(usize),

    #[error("RET with an empty call stack")]
    CallStackUnderflow,

    #[error("SWAP_BUFFERS outside the high-priority stream")]
    SwapOutsideHighPriority,

    #[error("state write out of range for overlay 0x{overlay:X}: offset {offset} + {len} words exceeds {size}")]
    StateWriteOutOfRange {
        overlay: u32,
        offset: usize,
        len: usize,
        size: usize,
    },

    #[error("render mode stack overflow")]
    ModeStackOverflow,

    #[error("render mode stack underflow")]
    ModeStackUnderflow,
}

/// Outcome of one [`Coprocessor::step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// One command was executed
    Executed,
    /// The next slot is empty: the consumer caught up with the producer
    Idle,
    /// The consumer is halted
    Halted,
}

#[derive(Clone)]
struct Cursor {
    segment: Arc<Segment>,
    offset: usize,
}

struct Context {
    start: u32,
    cursor: Option<Cursor>,
    stack: Vec<Cursor>,
}

impl Context {
    fn new(start: u32) -> Self {
        Self {
            start,
            cursor: None,
            stack: Vec::new(),
        }
    }
}

const NORMAL: usize = 0;
const HIGH: usize = 1;

/// Consumer of a queue's command stream
pub struct Coprocessor {
    shared: Arc<Shared>,
    sink: Box<dyn CommandSink + Send>,
    rdp: RdpStage,
    contexts: [Context; 2],
    active: usize,
    executed: u64,
}

impl Coprocessor {
    /// Claim the consumer role of a queue
    ///
    /// Fatal if another consumer is attached.
    pub(crate) fn attach(
        shared: Arc<Shared>,
        sink: Box<dyn CommandSink + Send>,
        rdp_sink: Box<dyn RdpSink + Send>,
    ) -> Self {
        if !shared.status.attach() {
            fatal(ProtocolViolation::ConsumerAlreadyAttached);
        }
        let contexts = [
            Context::new(shared.lowpri_start),
            Context::new(shared.highpri_start),
        ];
        Self {
            shared,
            sink,
            rdp: RdpStage::new(rdp_sink),
            contexts,
            active: NORMAL,
            executed: 0,
        }
    }

    /// Number of commands executed
    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// Check whether the high-priority stream is being executed
    pub fn in_highpri(&self) -> bool {
        self.active == HIGH
    }

    /// Call stack depth of the active context
    pub fn call_depth(&self) -> usize {
        self.contexts[self.active].stack.len()
    }

    /// Execute at most one command
    pub fn step(&mut self) -> Step {
        let shared = Arc::clone(&self.shared);
        let status = &shared.status;
        if status.contains(Signals::HALTED) {
            return Step::Halted;
        }

        if self.active == NORMAL && status.highpri_pending() > 0 {
            self.active = HIGH;
            status.set(Signals::HIGHPRI_RUNNING);
            log::debug!("consumer: entering high-priority stream");
        }

        let cursor = match self.cursor() {
            Ok(cursor) => cursor,
            Err(fault) => return self.fault(fault),
        };
        let header = cursor.segment.load(cursor.offset);
        if header == 0 {
            return Step::Idle;
        }

        match self.execute(cursor, header) {
            Ok(()) => {
                self.executed += 1;
                Step::Executed
            }
            Err(fault) => self.fault(fault),
        }
    }

    /// Step until the consumer is idle or halted
    ///
    /// Returns the number of commands executed.
    pub fn run_until_idle(&mut self) -> usize {
        let mut count = 0;
        loop {
            match self.step() {
                Step::Executed => count += 1,
                Step::Idle => {
                    self.shared.status.set(Signals::IDLE);
                    self.shared.status.notify_producer();
                    return count;
                }
                Step::Halted => return count,
            }
        }
    }

    /// Background loop
    ///
    /// Runs until a shutdown request finds the consumer idle, or until a
    /// fault halts it.
    pub fn run(mut self) {
        log::info!("consumer: running");
        loop {
            match self.step() {
                Step::Executed => {}
                Step::Halted => break,
                Step::Idle => {
                    let status = &self.shared.status;
                    status.set(Signals::IDLE);
                    status.notify_producer();
                    if !status.wait_for_more() {
                        break;
                    }
                    status.clear(Signals::IDLE);
                }
            }
        }
        log::info!("consumer: stopped after {} commands", self.executed);
    }

    fn fault(&mut self, fault: ConsumerFault) -> Step {
        self.shared.status.halt(fault.to_string());
        Step::Halted
    }

    fn resolve(&self, address: u32) -> Result<Cursor, ConsumerFault> {
        self.shared
            .arena
            .resolve(address)
            .map(|(segment, offset)| Cursor { segment, offset })
            .ok_or(ConsumerFault::UnmappedAddress(address))
    }

    fn cursor(&mut self) -> Result<Cursor, ConsumerFault> {
        if let Some(cursor) = &self.contexts[self.active].cursor {
            return Ok(cursor.clone());
        }
        let cursor = self.resolve(self.contexts[self.active].start)?;
        self.contexts[self.active].cursor = Some(cursor.clone());
        Ok(cursor)
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.contexts[self.active].cursor = Some(cursor);
    }

    fn advance(&mut self, cursor: &Cursor, words: usize) {
        self.set_cursor(Cursor {
            segment: Arc::clone(&cursor.segment),
            offset: cursor.offset + words,
        });
    }

    fn read(cursor: &Cursor, words: usize) -> Result<Vec<u32>, ConsumerFault> {
        let end = cursor.offset + words;
        if end > cursor.segment.len() {
            return Err(ConsumerFault::TruncatedCommand {
                offset: cursor.offset,
                words,
            });
        }
        Ok(cursor.segment.snapshot(cursor.offset..end))
    }

    fn execute(&mut self, cursor: Cursor, header: u32) -> Result<(), ConsumerFault> {
        let overlay = header >> 28;
        if overlay == 0 {
            return self.execute_internal(cursor, header);
        }

        let entry = self
            .shared
            .overlays
            .lookup(overlay)
            .ok_or(ConsumerFault::UnknownOverlay(overlay))?;
        let index = (overlay - entry.id.index()) * COMMANDS_PER_ID as u32 + ((header >> 24) & 0xF);
        let size = entry
            .command_words(index as usize)
            .ok_or(ConsumerFault::UnknownCommand { overlay, index })?;
        let words = Self::read(&cursor, size)?;
        self.advance(&cursor, size);

        log::trace!(
            "consumer: {} cmd {} (0x{:08X}, {} words)",
            entry.descriptor.name(),
            index,
            header,
            size
        );

        match entry.descriptor.kind() {
            OverlayKind::External => {
                let mut state = entry.state();
                self.sink.execute(Dispatch {
                    overlay: entry.id,
                    name: entry.descriptor.name(),
                    command: index,
                    words: &words,
                    state: state.as_mut_slice(),
                });
                Ok(())
            }
            OverlayKind::Rdp => self.rdp.execute(&words),
        }
    }

    fn execute_internal(&mut self, cursor: Cursor, header: u32) -> Result<(), ConsumerFault> {
        let shared = Arc::clone(&self.shared);
        let status = &shared.status;
        let command = commands::command_of(header);
        log::trace!("consumer: {} (0x{:08X})", commands::name(header), header);

        match command {
            commands::CMD_NOOP => self.advance(&cursor, 1),
            commands::CMD_JUMP => {
                let target = self.resolve(header)?;
                self.set_cursor(target);
            }
            commands::CMD_CALL => {
                Self::read(&cursor, 2)?;
                let target = self.resolve(header)?;
                let context = &mut self.contexts[self.active];
                if context.stack.len() >= shared.max_call_depth as usize {
                    return Err(ConsumerFault::CallStackOverflow(context.stack.len() + 1));
                }
                context.stack.push(Cursor {
                    segment: Arc::clone(&cursor.segment),
                    offset: cursor.offset + 2,
                });
                self.set_cursor(target);
            }
            commands::CMD_RET => {
                let back = self.contexts[self.active]
                    .stack
                    .pop()
                    .ok_or(ConsumerFault::CallStackUnderflow)?;
                self.set_cursor(back);
            }
            commands::CMD_WRITE_STATUS => {
                let (set, clear) = status_masks(header);
                self.advance(&cursor, 1);
                status.write_status(set, clear);
            }
            commands::CMD_SWAP_BUFFERS => {
                if self.active != HIGH {
                    return Err(ConsumerFault::SwapOutsideHighPriority);
                }
                self.advance(&cursor, 1);
                if status.complete_highpri() == 0 {
                    self.active = NORMAL;
                    status.clear(Signals::HIGHPRI_RUNNING);
                    log::debug!("consumer: resuming normal stream");
                }
                status.notify_producer();
            }
            commands::CMD_SYNCPOINT => {
                self.advance(&cursor, 1);
                status.raise_syncpoint();
            }
            commands::CMD_RDP_WAIT_IDLE => {
                self.advance(&cursor, 1);
                self.rdp.wait_idle();
            }
            commands::CMD_STATE_WRITE => {
                let count = (header & 0xFF) as usize;
                let words = Self::read(&cursor, 2 + count)?;
                let overlay = (header >> 16) & 0xF;
                let entry = shared
                    .overlays
                    .lookup(overlay)
                    .ok_or(ConsumerFault::UnknownOverlay(overlay))?;
                let offset = words[1] as usize;
                let mut state = entry.state();
                if offset + count > state.len() {
                    return Err(ConsumerFault::StateWriteOutOfRange {
                        overlay,
                        offset,
                        len: count,
                        size: state.len(),
                    });
                }
                state[offset..offset + count].copy_from_slice(&words[2..]);
                drop(state);
                self.advance(&cursor, 2 + count);
            }
            other => return Err(ConsumerFault::UnknownInternalCommand(other)),
        }
        Ok(())
    }
}

impl Drop for Coprocessor {
    fn drop(&mut self) {
        self.shared.status.detach();
    }
}
