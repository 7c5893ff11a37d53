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

//! Command word segment
//!
//! A segment is a fixed-capacity array of 32-bit words written by the
//! producer and read by the consumer. Visibility follows one rule: payload
//! words are stored first, the header word is published last with release
//! ordering, and the consumer acquires the header before reading anything
//! else. A zero header means "nothing here yet".

use std::sync::atomic::{fence, AtomicU32, Ordering};

/// Fixed-capacity command word buffer shared with the consumer
pub struct Segment {
    words: Box<[AtomicU32]>,
}

impl Segment {
    /// Create a zero-filled segment of `len` words
    pub fn new(len: usize) -> Self {
        let words = (0..len).map(|_| AtomicU32::new(0)).collect();
        Self { words }
    }

    /// Capacity in words
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Check whether the segment has zero capacity
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Store a payload word
    ///
    /// Not visible to the consumer until a later [`publish`](Self::publish).
    #[inline(always)]
    pub fn store(&self, index: usize, value: u32) {
        self.words[index].store(value, Ordering::Relaxed);
    }

    /// Publish a header word
    ///
    /// Every word stored before this call becomes visible to a consumer that
    /// observes `value` through [`load`](Self::load).
    #[inline(always)]
    pub fn publish(&self, index: usize, value: u32) {
        self.words[index].store(value, Ordering::Release);
    }

    /// Read a word as the consumer
    #[inline(always)]
    pub fn load(&self, index: usize) -> u32 {
        self.words[index].load(Ordering::Acquire)
    }

    /// Zero-fill the whole segment before it is reused
    pub fn clear(&self) {
        for word in self.words.iter() {
            word.store(0, Ordering::Relaxed);
        }
        fence(Ordering::Release);
    }

    /// Copy of the words in `range`
    pub fn snapshot(&self, range: std::ops::Range<usize>) -> Vec<u32> {
        self.words[range]
            .iter()
            .map(|w| w.load(Ordering::Acquire))
            .collect()
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment").field("len", &self.len()).finish()
    }
}
