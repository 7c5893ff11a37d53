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

//! Render target attachment
//!
//! Attached targets form a stack of color/depth pairs. Attaching points the
//! rasterizer at a new pair; detaching drains the rasterizer and restores
//! the pair below, or the detached dummy once the stack is empty.

use super::target::{Color, Rect, Surface};
use crate::core::config::RdpConfig;
use crate::core::error::{fatal, ProtocolViolation};
use crate::core::queue::Queue;

/// Maximum number of nested attachments
pub const ATTACH_STACK_DEPTH: usize = 4;

/// Depth written by [`Queue::attach_clear`]: farthest depth, zero slope
pub const Z_CLEAR_VALUE: u16 = 0xFFFC;

const CLEAR_COLOR: Color = Color::new(0, 0, 0, 0xFF);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Attachment {
    color: Surface,
    depth: Option<Surface>,
}

fn full_rect(surface: &Surface) -> Rect {
    Rect::new(0, 0, surface.width, surface.height)
}

fn depth_address(depth: Option<&Surface>) -> u32 {
    depth.map_or(0, |depth| depth.address)
}

impl Queue {
    /// Draw into `color`, with `depth` as the depth buffer
    ///
    /// The previous target comes back with [`Queue::detach`]. The depth
    /// buffer must have the size of the color buffer.
    pub fn attach(&mut self, color: &Surface, depth: Option<&Surface>) {
        self.attach_with(color, depth, false);
    }

    /// Attach, then clear color to opaque black and depth to [`Z_CLEAR_VALUE`]
    pub fn attach_clear(&mut self, color: &Surface, depth: Option<&Surface>) {
        self.attach_with(color, depth, true);
    }

    fn attach_with(&mut self, color: &Surface, depth: Option<&Surface>, clear: bool) {
        if self.rdp.attached.len() >= ATTACH_STACK_DEPTH {
            fatal(ProtocolViolation::AttachStackOverflow(ATTACH_STACK_DEPTH));
        }
        if let Some(depth) = depth {
            if (depth.width, depth.height) != (color.width, color.height) {
                fatal(ProtocolViolation::DepthSizeMismatch {
                    color_width: color.width,
                    color_height: color.height,
                    depth_width: depth.width,
                    depth_height: depth.height,
                });
            }
        }
        self.rdp.attached.push(Attachment {
            color: *color,
            depth: depth.copied(),
        });
        log::debug!(
            "rdp: attached 0x{:08X} (depth {:?}, level {})",
            color.address,
            depth.map(|depth| depth.address),
            self.rdp.attached.len()
        );

        if clear {
            self.mode_push();
            if let Some(depth) = depth {
                self.set_color_image(Some(depth));
                self.set_mode_fill(Color::from_rgba16(Z_CLEAR_VALUE));
                self.fill_rectangle(full_rect(depth));
            }
        }
        self.set_z_image(depth_address(depth));
        if clear {
            self.set_color_image(Some(color));
            self.set_mode_fill(CLEAR_COLOR);
            self.fill_rectangle(full_rect(color));
        }
        self.set_color_image(Some(color));
        if clear {
            self.mode_pop();
        }
    }

    /// Finish drawing into the current target and restore the previous one
    ///
    /// A SYNC_FULL goes first, so the target is complete once the consumer
    /// has passed this point.
    pub fn detach(&mut self) {
        if !self.is_attached() {
            fatal(ProtocolViolation::NotAttached);
        }
        self.sync_full();
        self.reattach_previous();
    }

    /// Detach, and run `callback` once the target is complete
    ///
    /// Fatal while recording a block or in high-priority mode.
    pub fn detach_cb<F>(&mut self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.is_attached() {
            fatal(ProtocolViolation::NotAttached);
        }
        self.sync_full_cb(callback);
        self.reattach_previous();
    }

    /// Detach and block until the target is complete
    pub fn detach_wait(&mut self) {
        self.detach();
        self.wait();
    }

    fn reattach_previous(&mut self) {
        self.rdp.attached.pop();
        let previous = self.rdp.attached.last().copied();
        self.set_z_image(depth_address(previous.and_then(|a| a.depth).as_ref()));
        self.set_color_image(previous.as_ref().map(|a| &a.color));
        log::debug!("rdp: detached (level {})", self.rdp.attached.len());
        self.flush();
    }

    pub fn is_attached(&self) -> bool {
        !self.rdp.attached.is_empty()
    }

    /// Color buffer of the current target
    pub fn attached(&self) -> Option<Surface> {
        self.rdp.attached.last().map(|a| a.color)
    }

    fn top_attachment(&self) -> Attachment {
        match self.rdp.attached.last() {
            Some(attachment) => *attachment,
            None => fatal(ProtocolViolation::NotAttached),
        }
    }

    /// Fill the whole current target with `color`
    ///
    /// The render mode is left untouched. The fill respects the scissor.
    pub fn clear(&mut self, color: Color) {
        let target = self.top_attachment().color;
        self.mode_push();
        self.set_mode_fill(color);
        self.fill_rectangle(full_rect(&target));
        self.mode_pop();
    }

    /// Fill the current depth buffer with the raw 16-bit value `z`
    ///
    /// The scissor of the color target stays in effect.
    pub fn clear_z(&mut self, z: u16) {
        let Some(depth) = self.top_attachment().depth else {
            fatal(ProtocolViolation::NoDepthBuffer);
        };
        let config = self.rdp_config_disable(RdpConfig::AUTOSCISSOR);
        self.attach(&depth, None);
        self.clear(Color::from_rgba16(z));
        self.detach();
        self.rdp_config_set(config);
    }
}
