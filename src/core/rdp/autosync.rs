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

//! Automatic synchronization
//!
//! The rasterizer pipelines its work: a command that changes a register or
//! TMEM while a previous draw still reads it corrupts that draw. The
//! producer tracks which resources may still be in use and inserts the
//! matching SYNC command only when a change hits one of them.
//!
//! ```text
//! draw / load      -> use(resources)     mark busy
//! state change     -> change(resources)  sync busy classes, mark free
//! ```

use super::commands::{self, SYNC_FULL, SYNC_LOAD, SYNC_PIPE, SYNC_TILE};
use super::target::Rect;
use crate::core::config::RdpConfig;
use crate::core::error::{fatal, ProtocolViolation};
use crate::core::queue::commands as queue_commands;
use crate::core::queue::Queue;
use bitflags::bitflags;

bitflags! {
    /// Rasterizer resources tracked for synchronization
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Resources: u32 {
        /// All 8 tile descriptors
        const TILES = 0x0000_00FF;
        /// All 8 TMEM regions
        const TMEMS = 0x0000_FF00;
        /// The pixel pipeline registers
        const PIPE = 1 << 16;
    }
}

impl Resources {
    /// Tile descriptor `n`
    pub fn tile(n: u8) -> Self {
        if n > 7 {
            fatal(ProtocolViolation::InvalidTile(n));
        }
        Self::from_bits_retain(1 << n)
    }

    /// TMEM region `n` (512 bytes each)
    pub fn tmem(n: u8) -> Self {
        Self::from_bits_retain(1 << (8 + (n & 7)))
    }
}

/// What the producer knows about one command stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tracking {
    /// Resources possibly still in use
    pub autosync: Resources,

    /// Last SET_COMBINE sent
    pub combine: Option<u64>,

    /// Last SET_OTHER_MODES sent
    pub other_modes: Option<u64>,

    /// Last scissor sent, with the fill/copy class it was encoded for
    pub scissor: Option<(Rect, bool)>,

    /// Last SET_COLOR_IMAGE sent
    pub color_image: Option<u64>,
}

impl Tracking {
    /// Freshly initialized rasterizer: idle, nothing sent
    pub fn idle() -> Self {
        Self {
            autosync: Resources::empty(),
            combine: None,
            other_modes: None,
            scissor: None,
            color_image: None,
        }
    }

    /// Nothing known: assume everything busy
    pub fn unknown() -> Self {
        Self {
            autosync: Resources::all(),
            ..Self::idle()
        }
    }

    /// Adopt the final state of a block that just ran
    ///
    /// Resources busy at the block's end replace ours. Registers the block
    /// sent replace ours; registers it left alone keep our values.
    pub fn seed(&mut self, block: &Tracking) {
        self.autosync = block.autosync;
        if block.combine.is_some() {
            self.combine = block.combine;
        }
        if block.other_modes.is_some() {
            self.other_modes = block.other_modes;
        }
        if block.scissor.is_some() {
            self.scissor = block.scissor;
        }
        if block.color_image.is_some() {
            self.color_image = block.color_image;
        }
    }
}

impl Queue {
    /// Resources the producer believes busy
    pub fn autosync_state(&self) -> Resources {
        self.rdp.ctx.tracking.autosync
    }

    /// Mark resources as in use by the command about to be written
    pub(crate) fn autosync_use(&mut self, resources: Resources) {
        self.rdp.ctx.tracking.autosync |= resources;
    }

    /// Sync whatever busy resources the next command changes
    ///
    /// One SYNC per class, tiles first, then TMEM, then the pipe. Classes
    /// whose switch is off are left busy.
    pub(crate) fn autosync_change(&mut self, resources: Resources) {
        let busy = resources & self.rdp.ctx.tracking.autosync;
        if busy.is_empty() {
            return;
        }
        let config = self.rdp.config;
        if busy.intersects(Resources::TILES) && config.contains(RdpConfig::AUTOSYNC_TILE) {
            self.sync_class(SYNC_TILE, Resources::TILES);
        }
        if busy.intersects(Resources::TMEMS) && config.contains(RdpConfig::AUTOSYNC_LOAD) {
            self.sync_class(SYNC_LOAD, Resources::TMEMS);
        }
        if busy.intersects(Resources::PIPE) && config.contains(RdpConfig::AUTOSYNC_PIPE) {
            self.sync_class(SYNC_PIPE, Resources::PIPE);
        }
    }

    fn sync_class(&mut self, opcode: u8, class: Resources) {
        self.rdp_write(&[commands::encode(opcode, 0, 0)]);
        self.rdp.ctx.tracking.autosync &= !class;
    }

    /// Emit SYNC_PIPE
    pub fn sync_pipe(&mut self) {
        self.sync_class(SYNC_PIPE, Resources::PIPE);
    }

    /// Emit SYNC_TILE
    pub fn sync_tile(&mut self) {
        self.sync_class(SYNC_TILE, Resources::TILES);
    }

    /// Emit SYNC_LOAD
    pub fn sync_load(&mut self) {
        self.sync_class(SYNC_LOAD, Resources::TMEMS);
    }

    /// Emit SYNC_FULL: wait until the rasterizer is completely idle
    pub fn sync_full(&mut self) {
        self.sync_class(SYNC_FULL, Resources::all());
    }

    /// Emit SYNC_FULL and run `callback` once the consumer has passed it
    ///
    /// Fatal while recording a block or in high-priority mode, like any
    /// syncpoint.
    pub fn sync_full_cb<F>(&mut self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.sync_full();
        self.call_deferred(callback);
    }

    /// Hold the consumer until the rasterizer has finished everything so far
    ///
    /// Commands of other overlays written after the fence only run once the
    /// [`RdpSink`](crate::core::consumer::RdpSink) reports idle.
    pub fn fence(&mut self) {
        self.sync_full();
        self.emit(&[queue_commands::rdp_wait_idle()]);
    }
}
