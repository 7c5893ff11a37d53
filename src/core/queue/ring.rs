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

//! Write targets and double-buffered rings
//!
//! A [`WriteTarget`] is a segment plus a write cursor and its sentinel. The
//! sentinel sits `max_command_words + TRAILER_WORDS` before the end, so a
//! single `cursor > sentinel` test before each command guarantees that the
//! command and a chaining trailer both fit.

use crate::core::memory::{SegmentArena, SegmentRef};
use crate::core::signal::Signals;

/// Segment being written
#[derive(Debug)]
pub(crate) struct WriteTarget {
    /// Segment receiving commands
    pub segment: SegmentRef,

    /// Next free word
    pub cursor: usize,

    /// Last cursor position at which a new command may start
    pub sentinel: usize,
}

impl WriteTarget {
    pub fn new(segment: SegmentRef, reserve: usize) -> Self {
        let sentinel = segment.len() - reserve;
        Self {
            segment,
            cursor: 0,
            sentinel,
        }
    }

    /// Check whether the next command must go to a new segment
    #[inline(always)]
    pub fn needs_switch(&self) -> bool {
        self.cursor > self.sentinel
    }

    /// Append a complete command
    ///
    /// Payload words are stored first and the header is published last, so
    /// the consumer never observes a partial command.
    #[inline]
    pub fn emit(&mut self, words: &[u32]) {
        let base = self.cursor;
        for (i, &word) in words.iter().enumerate().skip(1) {
            self.segment.store(base + i, word);
        }
        self.segment.publish(base, words[0]);
        self.cursor += words.len();
    }

    /// Physical address of the cursor
    pub fn address(&self) -> u32 {
        self.segment.address(self.cursor)
    }
}

/// Pair of segments used in strict alternation
#[derive(Debug)]
pub(crate) struct RingBuffer {
    /// The two segments
    pub buffers: [SegmentRef; 2],

    /// Index of the segment being written
    pub index: usize,

    /// Write state of `buffers[index]`
    pub target: WriteTarget,

    /// Signal raised by the consumer when it leaves one of the segments
    pub bufdone: Signals,
}

impl RingBuffer {
    pub fn new(arena: &SegmentArena, words: usize, reserve: usize, bufdone: Signals) -> Self {
        let buffers = [arena.alloc(words), arena.alloc(words)];
        let target = WriteTarget::new(buffers[0].clone(), reserve);
        Self {
            buffers,
            index: 0,
            target,
            bufdone,
        }
    }

    /// Segment the producer switches to next
    pub fn other(&self) -> &SegmentRef {
        &self.buffers[self.index ^ 1]
    }

    /// Make the other segment current
    pub fn advance(&mut self, reserve: usize) {
        self.index ^= 1;
        self.target = WriteTarget::new(self.buffers[self.index].clone(), reserve);
    }

    /// Address the consumer starts reading this ring at
    pub fn start_address(&self) -> u32 {
        self.buffers[0].address(0)
    }

    pub fn release(&self, arena: &SegmentArena) {
        for buffer in &self.buffers {
            arena.release(buffer);
        }
    }
}
