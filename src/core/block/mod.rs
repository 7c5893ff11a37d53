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

//! Block recorder
//!
//! A block is a prerecorded command sequence the consumer can call like a
//! subroutine. While a block is being recorded, every command the queue
//! writes goes into the block's chunk chain instead of a live ring.
//!
//! ## Chunk Chain
//!
//! ```text
//! chunk 0 (block_min_words)   chunk 1 (x2)        chunk n (capped)
//! +-------------------+       +-------------+     +-----------+
//! | cmd cmd ... JUMP -+-----> | cmd ... JUMP+---> | cmd ... RET|
//! +-------------------+       +-------------+     +-----------+
//! ```
//!
//! Chunk sizes double from `block_min_words` up to `block_max_words`.
//! The last chunk ends with RET, which carries the block's nesting level.
//!
//! ## Nesting
//!
//! A block that calls no other block has level 0; a block calling blocks
//! of level at most `n` has level `n + 1`. Levels must stay below
//! `max_block_nesting`, which bounds the consumer's return stack.
//!
//! ## Lifetime
//!
//! Dropping a [`Block`] releases its chunks. The consumer must not still
//! have a CALL to it pending; use [`Queue::block_free_deferred`] when in
//! doubt.

#[cfg(test)]
mod tests;

use crate::core::error::{fatal, ProtocolViolation};
use crate::core::memory::SegmentRef;
use crate::core::queue::{commands, Queue, Shared, WriteTarget};
use crate::core::rdp::RdpBlockState;
use std::sync::Arc;

/// A finished, immutable block
pub struct Block {
    chunks: Vec<SegmentRef>,
    lengths: Vec<usize>,
    nesting_level: u32,
    pub(crate) rdp: RdpBlockState,
    shared: Arc<Shared>,
}

impl Block {
    /// Physical address of the first command
    pub fn address(&self) -> u32 {
        self.chunks[0].address(0)
    }

    /// Nesting level (0 for a block that calls no other block)
    pub fn nesting_level(&self) -> u32 {
        self.nesting_level
    }

    /// Number of chunks in the chain
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Capacity of each chunk, in chain order
    pub fn chunk_sizes(&self) -> Vec<usize> {
        self.chunks.iter().map(|c| c.len()).collect()
    }

    /// Every word of the block in chain order, trailers included
    pub fn words(&self) -> Vec<u32> {
        self.chunks
            .iter()
            .zip(&self.lengths)
            .flat_map(|(chunk, &len)| chunk.snapshot(0..len))
            .collect()
    }

    /// Release the block's chunks
    ///
    /// Equivalent to dropping it.
    pub fn free(self) {}
}

impl Drop for Block {
    fn drop(&mut self) {
        for chunk in &self.chunks {
            self.shared.arena.release(chunk);
        }
        log::debug!(
            "block: freed 0x{:06X} ({} chunks)",
            self.chunks[0].address(0),
            self.chunks.len()
        );
    }
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("address", &format_args!("0x{:06X}", self.address()))
            .field("chunks", &self.chunks.len())
            .field("nesting_level", &self.nesting_level)
            .finish()
    }
}

/// Recording session state
#[derive(Debug)]
pub(crate) struct BlockRecording {
    chunks: Vec<SegmentRef>,
    lengths: Vec<usize>,
    pub target: WriteTarget,
    next_words: usize,
    nesting_level: u32,
}

impl Queue {
    /// Start recording a block
    ///
    /// The fixup layer's tracking state is set aside and replaced with a
    /// fully conservative one. Nested recording, or recording in
    /// high-priority mode, is fatal.
    pub fn block_begin(&mut self) {
        if self.recording.is_some() {
            fatal(ProtocolViolation::NestedBlock);
        }
        if self.in_highpri {
            fatal(ProtocolViolation::BlockInHighPriority);
        }

        let first = self.shared.arena.alloc(self.config.block_min_words);
        self.stats.block_chunks += 1;
        log::debug!("block: recording into 0x{:06X}", first.address(0));

        self.rdp_block_begin();
        self.recording = Some(BlockRecording {
            target: WriteTarget::new(first.clone(), self.config.segment_reserve()),
            chunks: vec![first],
            lengths: Vec::new(),
            next_words: (self.config.block_min_words * 2).min(self.config.block_max_words),
            nesting_level: 0,
        });
    }

    /// Finish recording and return the block
    pub fn block_end(&mut self) -> Block {
        let Some(mut recording) = self.recording.take() else {
            fatal(ProtocolViolation::BlockNotRecording);
        };

        recording
            .target
            .emit(&[commands::ret(recording.nesting_level)]);
        recording.lengths.push(recording.target.cursor);

        let rdp = self.rdp_block_end();
        self.stats.blocks_recorded += 1;

        let block = Block {
            chunks: recording.chunks,
            lengths: recording.lengths,
            nesting_level: recording.nesting_level,
            rdp,
            shared: Arc::clone(&self.shared),
        };
        log::debug!(
            "block: finished 0x{:06X} (level {}, {} chunks)",
            block.address(),
            block.nesting_level,
            block.chunks.len()
        );
        block
    }

    /// Call a block from the current target
    ///
    /// The invoking context's fixup tracking is seeded with the state the
    /// block ends in. Inside a recording, the recorded block's nesting level
    /// grows to one more than the called block's.
    pub fn block_run(&mut self, block: &Block) {
        if let Some(recording) = &mut self.recording {
            let level = block.nesting_level + 1;
            if level >= self.config.max_block_nesting {
                fatal(ProtocolViolation::BlockNestingTooDeep {
                    level,
                    max: self.config.max_block_nesting,
                });
            }
            recording.nesting_level = recording.nesting_level.max(level);
        }

        log::trace!("block: call 0x{:06X}", block.address());
        self.emit(&commands::call(block.address(), block.nesting_level));
        self.rdp_block_run(&block.rdp);
    }

    /// Free a block once the consumer has passed the current position
    pub fn block_free_deferred(&mut self, block: Block) {
        self.call_deferred(move || drop(block));
    }

    /// Chain a new, larger chunk to the block being recorded
    pub(crate) fn block_next_chunk(&mut self) {
        let reserve = self.config.segment_reserve();
        let max = self.config.block_max_words;
        let Some(recording) = self.recording.as_mut() else {
            fatal(ProtocolViolation::BlockNotRecording);
        };

        let words = recording.next_words;
        let chunk = self.shared.arena.alloc(words);
        recording.target.emit(&[commands::jump(chunk.address(0))]);
        recording.lengths.push(recording.target.cursor);
        recording.target = WriteTarget::new(chunk.clone(), reserve);
        recording.chunks.push(chunk);
        recording.next_words = (words * 2).min(max);

        self.stats.block_chunks += 1;
        log::debug!("block: chained chunk {} ({} words)", recording.chunks.len(), words);
    }
}
