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

//! RDP fixup layer
//!
//! The fixup layer turns declarative calls ("set this render mode", "draw
//! into this surface") into the minimal raw RDP command sequence, given
//! what the rasterizer is known to be configured with. It keeps a mirror
//! of the rasterizer state on the producer side:
//!
//! - which resources are busy (autosync, see [`Resources`])
//! - the render mode as requested, and the SET_COMBINE / SET_OTHER_MODES
//!   words last sent
//! - the scissor and color image last sent
//! - the stack of attached render targets
//!
//! The mirror is producer-owned; the consumer never reads it.
//!
//! # Blocks and High Priority
//!
//! A block may run from any context, so recording starts from an unknown
//! state: every resource busy, nothing known to be sent. When the block
//! ends, its final state is stored in the block and the recorder's state
//! is restored. Running the block seeds the caller with that final state.
//!
//! High-priority sessions run at an unpredictable point of the normal
//! stream. They also start from the unknown state, and on return the
//! normal stream forgets what it had sent.

pub mod commands;

mod attach;
mod autosync;
mod draw;
mod mode;
mod target;

#[cfg(test)]
mod tests;

pub use attach::{ATTACH_STACK_DEPTH, Z_CLEAR_VALUE};
pub use autosync::Resources;
pub use draw::TileParams;
pub use mode::{
    som, slot, AlphaCompare, Antialias, Blender, Combiner, DitherMode, Filter, Mipmap, RenderMode,
    Tlut,
};
pub use target::{Color, Rect, Surface, TexFormat};

pub(crate) use attach::Attachment;
pub(crate) use autosync::Tracking;

use crate::core::config::RdpConfig;
use crate::core::error::{fatal, ProtocolViolation};
use crate::core::queue::Queue;
use commands::RDP_OVERLAY_ID;

/// Render mode stack depth, current mode included
pub const MODE_STACK_DEPTH: usize = 4;

/// Saved render modes the stack can hold
pub const MODE_STACK_SAVED: usize = MODE_STACK_DEPTH - 1;

/// Render mode saved by `mode_push`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ModeSnapshot {
    mode: RenderMode,
    combine: Option<u64>,
    other_modes: Option<u64>,
}

/// Mirrored state of one producer context
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RdpContext {
    pub tracking: Tracking,
    pub mode: RenderMode,
    pub frozen: bool,
    pub stack: Vec<ModeSnapshot>,
    pub target_16bpp: bool,
}

impl RdpContext {
    fn new() -> Self {
        Self {
            tracking: Tracking::idle(),
            mode: RenderMode::standard(),
            frozen: false,
            stack: Vec::with_capacity(MODE_STACK_SAVED),
            target_16bpp: false,
        }
    }

    /// Context for code that may run anywhere
    ///
    /// The requested mode and target format are inherited; nothing is
    /// known to be sent.
    fn unknown_from(outer: &RdpContext) -> Self {
        Self {
            tracking: Tracking::unknown(),
            mode: outer.mode,
            frozen: false,
            stack: Vec::with_capacity(MODE_STACK_SAVED),
            target_16bpp: outer.target_16bpp,
        }
    }
}

/// Fixup state stored in a finished block
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RdpBlockState {
    tracking: Tracking,
    mode: Option<RenderMode>,
}

/// Producer-side fixup state of a queue
pub(crate) struct RdpState {
    pub initialized: bool,
    pub config: RdpConfig,
    pub ctx: RdpContext,
    pub attached: Vec<Attachment>,
    block_saved: Option<RdpContext>,
    highpri_saved: Option<RdpContext>,
}

impl RdpState {
    pub fn new(config: RdpConfig) -> Self {
        Self {
            initialized: false,
            config,
            ctx: RdpContext::new(),
            attached: Vec::with_capacity(ATTACH_STACK_DEPTH),
            block_saved: None,
            highpri_saved: None,
        }
    }
}

impl Queue {
    /// Register the RDP overlay and put the rasterizer in a known state
    ///
    /// The initial color image is a detached dummy with an empty scissor,
    /// so nothing is drawn until a real target is set.
    pub fn rdp_init(&mut self) {
        if self.rdp.initialized {
            return;
        }
        self.shared
            .overlays
            .register_static(commands::descriptor(), RDP_OVERLAY_ID);
        self.rdp.initialized = true;
        self.rdp.ctx = RdpContext::new();
        log::info!("rdp: initialized at overlay {}", RDP_OVERLAY_ID);

        self.set_color_image(None);
        self.set_scissor(Rect::new(0, 0, 1, 0));
    }

    /// Unregister the RDP overlay
    pub fn rdp_close(&mut self) {
        if !self.rdp.initialized {
            return;
        }
        self.shared.overlays.unregister(RDP_OVERLAY_ID);
        self.rdp.initialized = false;
        log::info!("rdp: closed");
    }

    /// Check whether the RDP overlay is registered
    pub fn rdp_initialized(&self) -> bool {
        self.rdp.initialized
    }

    /// Current fixup switches
    pub fn rdp_config(&self) -> RdpConfig {
        self.rdp.config
    }

    /// Replace the fixup switches, returning the previous ones
    pub fn rdp_config_set(&mut self, config: RdpConfig) -> RdpConfig {
        std::mem::replace(&mut self.rdp.config, config)
    }

    /// Turn switches on, returning the previous set
    pub fn rdp_config_enable(&mut self, flags: RdpConfig) -> RdpConfig {
        let previous = self.rdp.config;
        self.rdp.config |= flags;
        previous
    }

    /// Turn switches off, returning the previous set
    pub fn rdp_config_disable(&mut self, flags: RdpConfig) -> RdpConfig {
        let previous = self.rdp.config;
        self.rdp.config &= !flags;
        previous
    }

    /// Append a raw RDP command (one or more 64-bit words)
    ///
    /// Bypasses all tracking. The top byte of the first word must carry the
    /// opcode; the command's length must match the opcode.
    pub fn rdp_write(&mut self, command: &[u64]) {
        if !self.rdp.initialized {
            fatal(ProtocolViolation::RdpNotInitialized);
        }
        let Some(&first) = command.first() else {
            return;
        };
        let opcode = commands::opcode(first);
        let words = command.len() * 2;
        let expected = commands::command_words(opcode);
        if words != expected {
            fatal(ProtocolViolation::RdpCommandSize {
                opcode,
                words,
                expected,
            });
        }
        if words > self.config.max_command_words {
            fatal(ProtocolViolation::CommandTooLarge {
                words,
                max: self.config.max_command_words,
            });
        }

        let mut buffer = [0u32; crate::core::config::MAX_COMMAND_WORDS];
        for (i, &raw) in command.iter().enumerate() {
            let [hi, lo] = commands::split(raw);
            buffer[2 * i] = hi;
            buffer[2 * i + 1] = lo;
        }
        // Overlay nibble of the queue header
        buffer[0] |= 0xC000_0000;
        log::trace!("rdp: {} 0x{:016X}", commands::name(opcode), first);
        self.emit(&buffer[..words]);
    }

    pub(crate) fn rdp_block_begin(&mut self) {
        let inner = RdpContext::unknown_from(&self.rdp.ctx);
        self.rdp.block_saved = Some(std::mem::replace(&mut self.rdp.ctx, inner));
    }

    pub(crate) fn rdp_block_end(&mut self) -> RdpBlockState {
        let outer = self.rdp.block_saved.take().unwrap_or_else(RdpContext::new);
        let inner = std::mem::replace(&mut self.rdp.ctx, outer);
        let mode_sent = inner.tracking.combine.is_some() || inner.tracking.other_modes.is_some();
        RdpBlockState {
            tracking: inner.tracking,
            mode: mode_sent.then_some(inner.mode),
        }
    }

    pub(crate) fn rdp_block_run(&mut self, block: &RdpBlockState) {
        let ctx = &mut self.rdp.ctx;
        ctx.tracking.seed(&block.tracking);
        if let Some(mode) = block.mode {
            ctx.mode = mode;
        }
        // The block may have crossed the fill/copy boundary
        if self.rdp.initialized {
            self.scissor_refresh();
        }
    }

    pub(crate) fn rdp_highpri_begin(&mut self) {
        let inner = RdpContext::unknown_from(&self.rdp.ctx);
        self.rdp.highpri_saved = Some(std::mem::replace(&mut self.rdp.ctx, inner));
    }

    pub(crate) fn rdp_highpri_end(&mut self) {
        let mut outer = self.rdp.highpri_saved.take().unwrap_or_else(RdpContext::new);
        outer.tracking = Tracking::unknown();
        self.rdp.ctx = outer;
    }
}
