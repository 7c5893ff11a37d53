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

//! Overlay registry
//!
//! An overlay is a command set executed by the consumer. The top nibble of a
//! command's first word selects the overlay, the next nibble the command
//! within it:
//!
//! ```text
//! 31    28 27    24 23                             0
//! +-------+--------+--------------------------------+
//! |  id   |  cmd   |        payload (24 bits)       |
//! +-------+--------+--------------------------------+
//! ```
//!
//! ID 0 belongs to the queue's internal commands. The remaining 15 IDs are
//! assigned to registered overlays; an overlay with more than 16 commands
//! occupies consecutive IDs, and its command index simply carries into the
//! ID nibble.
//!
//! The registry is shared with the consumer, which looks up command sizes
//! and resident state through it.

#[cfg(test)]
mod tests;

use crate::core::config::MAX_COMMAND_WORDS;
use crate::core::error::{fatal, ProtocolViolation};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Number of overlay IDs
pub const OVERLAY_SLOTS: usize = 16;

/// Commands addressable through one overlay ID
pub const COMMANDS_PER_ID: usize = 16;

/// Pre-shifted overlay identifier
///
/// The value is already positioned in bits 31-28, ready to be OR'ed into a
/// command header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayId(u32);

impl OverlayId {
    /// ID of the queue's internal command set
    pub const INTERNAL: OverlayId = OverlayId(0);

    /// Build an ID from its 4-bit index
    pub const fn from_index(index: u32) -> Self {
        OverlayId((index & 0xF) << 28)
    }

    /// Pre-shifted value
    #[inline(always)]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// 4-bit index
    #[inline(always)]
    pub const fn index(self) -> u32 {
        self.0 >> 28
    }
}

impl std::fmt::Display for OverlayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:X}", self.index())
    }
}

/// Who executes an overlay's commands on the consumer side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    /// Dispatched to the consumer's [`CommandSink`](crate::core::consumer::CommandSink)
    External,
    /// Executed by the consumer's built-in RDP stage
    Rdp,
}

/// Command set descriptor
///
/// # Example
///
/// ```
/// use rcpq::core::overlay::OverlayDescriptor;
///
/// let desc = OverlayDescriptor::new("audio", 8)
///     .command(2)
///     .command(4);
/// assert_eq!(desc.command_count(), 2);
/// assert_eq!(desc.command_words(1), Some(4));
/// assert_eq!(desc.units(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayDescriptor {
    /// Name used in logs and duplicate detection
    name: String,

    /// Size in words of each command, by command index
    command_words: Vec<usize>,

    /// Words of resident state reserved for the overlay
    state_words: usize,

    kind: OverlayKind,
}

impl OverlayDescriptor {
    /// Create a descriptor with no commands yet
    pub fn new(name: impl Into<String>, state_words: usize) -> Self {
        Self {
            name: name.into(),
            command_words: Vec::new(),
            state_words,
            kind: OverlayKind::External,
        }
    }

    /// Create a descriptor whose `commands` commands all have the same size
    pub fn uniform(name: impl Into<String>, commands: usize, words: usize, state_words: usize) -> Self {
        Self {
            command_words: vec![words; commands],
            ..Self::new(name, state_words)
        }
    }

    /// Append a command of `words` words
    pub fn command(mut self, words: usize) -> Self {
        self.command_words.push(words);
        self
    }

    pub(crate) fn with_kind(mut self, kind: OverlayKind) -> Self {
        self.kind = kind;
        self
    }

    /// Overlay name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of commands
    pub fn command_count(&self) -> usize {
        self.command_words.len()
    }

    /// Size in words of command `index`
    pub fn command_words(&self, index: usize) -> Option<usize> {
        self.command_words.get(index).copied()
    }

    /// Resident state size in words
    pub fn state_words(&self) -> usize {
        self.state_words
    }

    /// Number of consecutive IDs the overlay occupies
    pub fn units(&self) -> usize {
        self.command_words.len().div_ceil(COMMANDS_PER_ID).max(1)
    }

    /// Consumer-side executor
    pub fn kind(&self) -> OverlayKind {
        self.kind
    }

    fn check(&self) {
        let max = (OVERLAY_SLOTS - 1) * COMMANDS_PER_ID;
        if self.command_words.len() > max {
            fatal(ProtocolViolation::OverlayTooLarge {
                name: self.name.clone(),
                commands: self.command_words.len(),
                max,
            });
        }
        if let Some(&words) = self
            .command_words
            .iter()
            .find(|&&w| w == 0 || w > MAX_COMMAND_WORDS)
        {
            fatal(ProtocolViolation::CommandTooLarge {
                words,
                max: MAX_COMMAND_WORDS,
            });
        }
    }
}

/// A registered overlay
#[derive(Debug)]
pub struct OverlayEntry {
    /// Base ID
    pub id: OverlayId,

    /// Command set
    pub descriptor: Arc<OverlayDescriptor>,

    /// Resident state, written by the consumer
    state: Mutex<Vec<u32>>,
}

impl OverlayEntry {
    /// Lock the resident state
    pub fn state(&self) -> MutexGuard<'_, Vec<u32>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Size of the command at `index` (relative to the base ID)
    pub fn command_words(&self, index: usize) -> Option<usize> {
        self.descriptor.command_words(index)
    }
}

/// Table of registered overlays
pub struct OverlayRegistry {
    table: RwLock<[Option<Arc<OverlayEntry>>; OVERLAY_SLOTS]>,
}

impl OverlayRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            table: RwLock::new(Default::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, [Option<Arc<OverlayEntry>>; OVERLAY_SLOTS]> {
        self.table.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, [Option<Arc<OverlayEntry>>; OVERLAY_SLOTS]> {
        self.table.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register an overlay at the first free range of IDs
    ///
    /// Scans upward from ID 1 for `descriptor.units()` consecutive free IDs.
    /// Running out of IDs is fatal.
    pub fn register(&self, descriptor: OverlayDescriptor) -> OverlayId {
        descriptor.check();
        let units = descriptor.units();
        let mut table = self.write();
        Self::check_duplicate(&table, &descriptor);

        let base = (1..=OVERLAY_SLOTS - units)
            .find(|&base| table[base..base + units].iter().all(Option::is_none));
        let Some(base) = base else {
            let name = descriptor.name().to_string();
            drop(table);
            fatal(ProtocolViolation::OverlayIdsExhausted { name, units });
        };

        Self::install(&mut table, descriptor, base)
    }

    /// Register an overlay at a caller-chosen ID
    ///
    /// The whole range `id..id + units` must be free.
    pub fn register_static(&self, descriptor: OverlayDescriptor, id: OverlayId) -> OverlayId {
        descriptor.check();
        let base = id.index() as usize;
        if base == 0 {
            fatal(ProtocolViolation::ReservedOverlay);
        }
        let units = descriptor.units();
        let last = base + units - 1;
        let mut table = self.write();
        Self::check_duplicate(&table, &descriptor);

        if last >= OVERLAY_SLOTS || table[base..=last].iter().any(Option::is_some) {
            drop(table);
            fatal(ProtocolViolation::OverlayRangeOccupied {
                base: base as u32,
                last: last as u32,
            });
        }

        Self::install(&mut table, descriptor, base)
    }

    fn check_duplicate(table: &[Option<Arc<OverlayEntry>>; OVERLAY_SLOTS], descriptor: &OverlayDescriptor) {
        if table
            .iter()
            .flatten()
            .any(|entry| entry.descriptor.name() == descriptor.name())
        {
            fatal(ProtocolViolation::OverlayAlreadyRegistered(
                descriptor.name().to_string(),
            ));
        }
    }

    fn install(
        table: &mut [Option<Arc<OverlayEntry>>; OVERLAY_SLOTS],
        descriptor: OverlayDescriptor,
        base: usize,
    ) -> OverlayId {
        let id = OverlayId::from_index(base as u32);
        let units = descriptor.units();
        let entry = Arc::new(OverlayEntry {
            id,
            state: Mutex::new(vec![0; descriptor.state_words()]),
            descriptor: Arc::new(descriptor),
        });
        for slot in &mut table[base..base + units] {
            *slot = Some(Arc::clone(&entry));
        }
        log::debug!(
            "overlay: registered {} at {} ({} IDs, {} state words)",
            entry.descriptor.name(),
            id,
            units,
            entry.descriptor.state_words()
        );
        id
    }

    /// Free an overlay's ID range
    ///
    /// `id` must be the base ID returned at registration.
    pub fn unregister(&self, id: OverlayId) {
        let base = id.index() as usize;
        if base == 0 {
            fatal(ProtocolViolation::ReservedOverlay);
        }
        let mut table = self.write();
        let entry = match &table[base] {
            Some(entry) if entry.id == id => Arc::clone(entry),
            _ => {
                drop(table);
                fatal(ProtocolViolation::OverlayNotRegistered(id.index()));
            }
        };
        for slot in &mut table[base..base + entry.descriptor.units()] {
            *slot = None;
        }
        log::debug!("overlay: unregistered {} from {}", entry.descriptor.name(), id);
    }

    /// Entry covering ID `index`
    pub fn lookup(&self, index: u32) -> Option<Arc<OverlayEntry>> {
        self.read().get(index as usize)?.clone()
    }

    /// Base ID of a registered overlay, by name
    pub fn find(&self, name: &str) -> Option<OverlayId> {
        self.read()
            .iter()
            .flatten()
            .find(|entry| entry.descriptor.name() == name)
            .map(|entry| entry.id)
    }

    /// Number of free IDs (excluding the internal ID 0)
    pub fn free_ids(&self) -> usize {
        self.read()[1..].iter().filter(|e| e.is_none()).count()
    }
}

impl Default for OverlayRegistry {
    fn default() -> Self {
        Self::new()
    }
}
