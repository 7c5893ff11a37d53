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

//! Segment arena and address adapter
//!
//! Every buffer the consumer can read (the two normal segments, the two
//! high-priority segments, every block chunk) lives in the arena. Commands
//! that transfer control (JUMP, CALL) carry a 24-bit physical address, which
//! this module translates to a segment and word offset.
//!
//! # Address Layout
//!
//! ```text
//! Bits   | Field       | Description
//! -------|-------------|--------------------------------------
//! 23-13  | slot        | Arena slot (1-2047, slot 0 is never used)
//! 12-0   | word offset | Word index inside the segment
//! ```
//!
//! Releasing a slot makes its addresses unresolvable until the slot is
//! handed out again. A stale address is a logic error of the caller, but it
//! can never reach freed memory: resolved segments are reference counted.

mod segment;

#[cfg(test)]
mod tests;

pub use segment::Segment;

use crate::core::error::{fatal, ProtocolViolation};
use std::sync::{Arc, Mutex, MutexGuard};

/// Bit position of the slot field in a physical address
pub const SLOT_SHIFT: u32 = 13;

/// Largest segment the address adapter can express
pub const MAX_SEGMENT_WORDS: usize = 1 << SLOT_SHIFT;

/// Number of arena slots (including the unused slot 0)
pub const MAX_SEGMENTS: usize = 1 << (24 - SLOT_SHIFT);

/// Mask of the 24 address bits carried by a command word
pub const ADDRESS_MASK: u32 = 0x00FF_FFFF;

/// Build a physical address from a slot and word offset
#[inline(always)]
pub fn physical_address(slot: u32, offset: usize) -> u32 {
    debug_assert!(offset < MAX_SEGMENT_WORDS);
    ((slot << SLOT_SHIFT) | offset as u32) & ADDRESS_MASK
}

/// Split a physical address into slot and word offset
#[inline(always)]
pub fn split_address(address: u32) -> (u32, usize) {
    let address = address & ADDRESS_MASK;
    (
        address >> SLOT_SHIFT,
        (address & (MAX_SEGMENT_WORDS as u32 - 1)) as usize,
    )
}

/// Producer-side handle to an allocated segment
#[derive(Clone, Debug)]
pub struct SegmentRef {
    slot: u32,
    segment: Arc<Segment>,
}

impl SegmentRef {
    /// Arena slot of this segment
    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// Physical address of word `offset`
    pub fn address(&self, offset: usize) -> u32 {
        physical_address(self.slot, offset)
    }

    /// Backing segment
    pub fn segment(&self) -> &Arc<Segment> {
        &self.segment
    }
}

impl std::ops::Deref for SegmentRef {
    type Target = Segment;

    fn deref(&self) -> &Segment {
        &self.segment
    }
}

struct Slots {
    entries: Vec<Option<Arc<Segment>>>,
    free: Vec<u32>,
}

/// Arena of consumer-visible segments
pub struct SegmentArena {
    slots: Mutex<Slots>,
}

impl SegmentArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slots {
                // Slot 0 stays empty so that address 0 never resolves
                entries: vec![None],
                free: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Allocate a zero-filled segment of `words` words
    ///
    /// Exhausting the slot space is fatal.
    pub fn alloc(&self, words: usize) -> SegmentRef {
        debug_assert!(words <= MAX_SEGMENT_WORDS);
        let segment = Arc::new(Segment::new(words));
        let mut slots = self.lock();

        let slot = match slots.free.pop() {
            Some(slot) => slot,
            None => {
                if slots.entries.len() >= MAX_SEGMENTS {
                    let live = slots.entries.len() - 1;
                    drop(slots);
                    fatal(ProtocolViolation::ArenaExhausted(live));
                }
                slots.entries.push(None);
                (slots.entries.len() - 1) as u32
            }
        };
        slots.entries[slot as usize] = Some(Arc::clone(&segment));

        log::trace!("arena: slot {} <- {} words", slot, words);
        SegmentRef { slot, segment }
    }

    /// Return a segment's slot to the arena
    pub fn release(&self, segment: &SegmentRef) {
        let mut slots = self.lock();
        let entry = &mut slots.entries[segment.slot as usize];
        if entry
            .as_ref()
            .is_some_and(|live| Arc::ptr_eq(live, &segment.segment))
        {
            *entry = None;
            slots.free.push(segment.slot);
            log::trace!("arena: slot {} released", segment.slot);
        }
    }

    /// Translate a physical address to its segment and word offset
    ///
    /// Returns `None` for unmapped slots and out-of-range offsets.
    pub fn resolve(&self, address: u32) -> Option<(Arc<Segment>, usize)> {
        let (slot, offset) = split_address(address);
        let slots = self.lock();
        let segment = slots.entries.get(slot as usize)?.as_ref()?;
        if offset >= segment.len() {
            return None;
        }
        Some((Arc::clone(segment), offset))
    }

    /// Number of live segments
    pub fn live(&self) -> usize {
        let slots = self.lock();
        slots.entries.iter().filter(|e| e.is_some()).count()
    }
}

impl Default for SegmentArena {
    fn default() -> Self {
        Self::new()
    }
}
