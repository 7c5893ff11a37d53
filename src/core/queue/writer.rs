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

//! Command writer
//!
//! Two forms append commands:
//!
//! - [`Queue::write`]: one call, up to 16 words
//! - [`Queue::write_begin`]: builder for commands up to the configured
//!   maximum (62 words at most)
//!
//! Both check the sentinel before the command is started, so a command is
//! never split across segments.

use super::commands::{self, STATE_WRITE_MAX_WORDS};
use super::{Queue, Ring};
use crate::core::config::{MAX_COMMAND_WORDS, MAX_SHORT_COMMAND_WORDS};
use crate::core::error::{fatal, ProtocolViolation};
use crate::core::memory::ADDRESS_MASK;
use crate::core::overlay::{OverlayId, COMMANDS_PER_ID};
use crate::core::signal::{Signals, StatusRegister};
use std::sync::Arc;
use std::time::Duration;

/// Producer sleep granularity while blocked on the consumer
const PARK_TIMEOUT: Duration = Duration::from_millis(10);

#[inline(always)]
fn header(overlay: OverlayId, command: u32) -> u32 {
    if overlay == OverlayId::INTERNAL {
        fatal(ProtocolViolation::ReservedOverlay);
    }
    if command as usize >= COMMANDS_PER_ID {
        fatal(ProtocolViolation::CommandIndexOutOfRange {
            overlay: overlay.index(),
            index: command,
        });
    }
    overlay.raw() | (command << 24)
}

impl Queue {
    /// Append a command with no inline payload
    ///
    /// The command is `1 + args.len()` words long. See
    /// [`Queue::write_with_payload`].
    ///
    /// # Example
    ///
    /// ```
    /// use rcpq::core::overlay::OverlayDescriptor;
    /// use rcpq::core::queue::Queue;
    ///
    /// let mut queue = Queue::with_defaults();
    /// let id = queue.overlays().register(OverlayDescriptor::uniform("demo", 4, 3, 0));
    /// queue.write(id, 2, &[0x1234, 0x5678]);
    /// assert_eq!(queue.cursor(), 3);
    /// ```
    pub fn write(&mut self, overlay: OverlayId, command: u32, args: &[u32]) {
        self.write_with_payload(overlay, command, 0, args);
    }

    /// Append a command whose first word carries a 24-bit payload
    ///
    /// Bits above the low 24 of `payload` are discarded. The short form is
    /// limited to 16 words; larger commands use [`Queue::write_begin`].
    pub fn write_with_payload(&mut self, overlay: OverlayId, command: u32, payload: u32, args: &[u32]) {
        let words = 1 + args.len();
        let max = MAX_SHORT_COMMAND_WORDS.min(self.config.max_command_words);
        if words > max {
            fatal(ProtocolViolation::CommandTooLarge { words, max });
        }

        let mut buffer = [0u32; MAX_SHORT_COMMAND_WORDS];
        buffer[0] = header(overlay, command) | (payload & ADDRESS_MASK);
        buffer[1..words].copy_from_slice(args);
        self.emit(&buffer[..words]);
    }

    /// Start a command of `size` words
    ///
    /// The space check happens here, with the full declared size. Arguments
    /// not supplied before [`CommandWriter::end`] are zero.
    pub fn write_begin(&mut self, overlay: OverlayId, command: u32, size: usize) -> CommandWriter<'_> {
        let max = self.config.max_command_words;
        if size == 0 || size > max {
            fatal(ProtocolViolation::CommandTooLarge { words: size, max });
        }
        let first = header(overlay, command);
        self.ensure_space();
        let mut words = [0u32; MAX_COMMAND_WORDS];
        words[0] = first;
        CommandWriter {
            queue: self,
            words,
            size,
            len: 1,
        }
    }

    /// Make everything written so far visible to the consumer
    ///
    /// Cheap and never blocking. A no-op while recording a block.
    pub fn flush(&mut self) {
        if self.recording.is_some() {
            return;
        }
        let status = &self.shared.status;
        status.set(Signals::MORE);
        status.notify_consumer();
    }

    /// Append a NOOP command
    pub fn noop(&mut self) {
        self.emit(&[commands::noop()]);
    }

    /// Update an overlay's resident state in stream order
    ///
    /// Large updates are split into several STATE_WRITE commands. The range
    /// is checked against the overlay's state size.
    pub fn write_state(&mut self, overlay: OverlayId, offset: usize, data: &[u32]) {
        let Some(entry) = self.shared.overlays.lookup(overlay.index()) else {
            fatal(ProtocolViolation::OverlayNotRegistered(overlay.index()));
        };
        let size = entry.descriptor.state_words();
        if offset + data.len() > size {
            fatal(ProtocolViolation::OverlayStateOutOfRange {
                offset,
                len: data.len(),
                size,
            });
        }

        let max = self.config.max_command_words;
        if max < 3 {
            fatal(ProtocolViolation::CommandTooLarge { words: 3, max });
        }
        let chunk_words = STATE_WRITE_MAX_WORDS.min(max - 2);
        let mut words = [0u32; MAX_COMMAND_WORDS];
        for (i, chunk) in data.chunks(chunk_words).enumerate() {
            let at = offset + i * chunk_words;
            words[0] = commands::state_write(entry.id.index(), chunk.len());
            words[1] = at as u32;
            words[2..2 + chunk.len()].copy_from_slice(chunk);
            self.emit(&words[..2 + chunk.len()]);
        }
    }

    /// Block until the consumer has executed everything written so far
    ///
    /// Runs every deferred callback whose syncpoint has been reached.
    pub fn wait(&mut self) {
        if self.recording.is_some() {
            fatal(ProtocolViolation::WaitInBlock);
        }
        let syncpoint = self.syncpoint_new();
        self.syncpoint_wait(syncpoint);
        while self.poll_deferred() {}
    }

    /// Append a complete command to the current target
    pub(crate) fn emit(&mut self, words: &[u32]) {
        self.ensure_space();
        log::trace!(
            "queue: emit 0x{:08X} ({} words) at {}",
            words[0],
            words.len(),
            self.target().cursor
        );
        self.target_mut().emit(words);
        self.stats.commands += 1;
        self.stats.words += words.len() as u64;
    }

    /// Switch segments if the cursor passed the sentinel
    #[inline]
    pub(crate) fn ensure_space(&mut self) {
        if self.target().needs_switch() {
            self.switch_segment();
        }
    }

    fn switch_segment(&mut self) {
        if self.recording.is_some() {
            self.block_next_chunk();
        } else if self.in_highpri {
            self.ring_next_buffer(Ring::High);
        } else {
            self.ring_next_buffer(Ring::Low);
        }
    }

    fn ring_next_buffer(&mut self, which: Ring) {
        let bufdone = match which {
            Ring::Low => self.lowpri.bufdone,
            Ring::High => self.highpri.bufdone,
        };
        self.block_until(|status| status.contains(bufdone));
        self.shared.status.clear(bufdone);

        let reserve = self.config.segment_reserve();
        let ring = match which {
            Ring::Low => &mut self.lowpri,
            Ring::High => &mut self.highpri,
        };
        ring.other().clear();
        let next = ring.other().address(0);
        ring.target.emit(&[commands::jump(next)]);
        ring.advance(reserve);
        ring.target
            .emit(&[commands::write_status(bufdone, Signals::empty())]);

        self.stats.buffer_switches += 1;
        log::debug!("queue: {:?} ring switched to 0x{:06X}", which, next);
    }

    /// Sleep until `ready` holds for the status register
    ///
    /// Everything written so far is flushed first. Deferred callbacks keep
    /// running while blocked. Blocking with no consumer attached, or on a
    /// halted consumer, is fatal.
    pub(crate) fn block_until<F>(&mut self, mut ready: F)
    where
        F: FnMut(&StatusRegister) -> bool,
    {
        let shared = Arc::clone(&self.shared);
        let status = &shared.status;
        if ready(status) {
            return;
        }
        self.flush();
        loop {
            if ready(status) {
                return;
            }
            if status.contains(Signals::HALTED) {
                fatal(ProtocolViolation::ConsumerHalted(
                    status.fault().unwrap_or_default(),
                ));
            }
            if !status.is_attached() {
                fatal(ProtocolViolation::NoConsumer);
            }
            if self.poll_deferred() {
                continue;
            }
            status.park_producer(|| ready(status), PARK_TIMEOUT);
        }
    }
}

/// Builder returned by [`Queue::write_begin`]
///
/// Nothing reaches the queue until [`CommandWriter::end`]; a writer
/// dropped without `end` writes nothing.
#[must_use = "a command is only written by CommandWriter::end"]
pub struct CommandWriter<'a> {
    queue: &'a mut Queue,
    words: [u32; MAX_COMMAND_WORDS],
    size: usize,
    len: usize,
}

impl CommandWriter<'_> {
    /// OR a 24-bit payload into the first word
    pub fn payload(mut self, value: u32) -> Self {
        self.words[0] |= value & ADDRESS_MASK;
        self
    }

    /// Append one argument word
    pub fn arg(mut self, value: u32) -> Self {
        if self.len >= self.size {
            fatal(ProtocolViolation::ArgumentOverflow {
                declared: self.size,
                written: self.len + 1,
            });
        }
        self.words[self.len] = value;
        self.len += 1;
        self
    }

    /// Append several argument words
    pub fn args(self, values: &[u32]) -> Self {
        values.iter().fold(self, |writer, &value| writer.arg(value))
    }

    /// Words written so far, header included
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Finish the command
    pub fn end(self) {
        let CommandWriter {
            queue, words, size, ..
        } = self;
        queue.target_mut().emit(&words[..size]);
        queue.stats.commands += 1;
        queue.stats.words += size as u64;
        log::trace!("queue: emit 0x{:08X} ({} words)", words[0], size);
    }
}
