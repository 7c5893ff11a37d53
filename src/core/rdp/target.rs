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

//! Render targets, images and scissor

use super::autosync::Resources;
use super::commands::{self, SET_COLOR_IMAGE, SET_FILL_COLOR, SET_SCISSOR, SET_TEXTURE_IMAGE, SET_Z_IMAGE};
use super::mode::som;
use crate::core::config::RdpConfig;
use crate::core::queue::Queue;
use serde::{Deserialize, Serialize};

/// Address of the dummy target installed when no surface is attached
pub const DETACHED_ADDRESS: u32 = 0x0080_0000;

/// Pixel formats the rasterizer reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TexFormat {
    Rgba16,
    Rgba32,
    Yuv16,
    Ci4,
    Ci8,
    Ia4,
    Ia8,
    Ia16,
    I4,
    I8,
}

impl TexFormat {
    /// Format code (bits 21-23 of image commands)
    pub const fn format_code(self) -> u32 {
        match self {
            TexFormat::Rgba16 | TexFormat::Rgba32 => 0,
            TexFormat::Yuv16 => 1,
            TexFormat::Ci4 | TexFormat::Ci8 => 2,
            TexFormat::Ia4 | TexFormat::Ia8 | TexFormat::Ia16 => 3,
            TexFormat::I4 | TexFormat::I8 => 4,
        }
    }

    /// Pixel size code (bits 19-20 of image commands)
    pub const fn size_code(self) -> u32 {
        match self {
            TexFormat::Ci4 | TexFormat::Ia4 | TexFormat::I4 => 0,
            TexFormat::Ci8 | TexFormat::Ia8 | TexFormat::I8 => 1,
            TexFormat::Rgba16 | TexFormat::Yuv16 | TexFormat::Ia16 => 2,
            TexFormat::Rgba32 => 3,
        }
    }

    pub const fn bits_per_pixel(self) -> u32 {
        4 << self.size_code()
    }
}

/// An image in memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Surface {
    pub format: TexFormat,
    pub width: u16,
    pub height: u16,
    /// Physical address of the first pixel
    pub address: u32,
}

impl Surface {
    pub fn new(format: TexFormat, width: u16, height: u16, address: u32) -> Self {
        Self {
            format,
            width,
            height,
            address,
        }
    }

    /// Image command pointing at this surface
    fn image_command(&self, opcode: u8) -> u64 {
        let w0 = (self.format.format_code() << 21)
            | (self.format.size_code() << 19)
            | (u32::from(self.width.max(1)) - 1) & 0x3FF;
        commands::encode(opcode, w0, self.address & 0x03FF_FFFF)
    }
}

/// 8-bit per channel color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Packed as 0xRRGGBBAA
    pub const fn rgba32(self) -> u32 {
        (self.r as u32) << 24 | (self.g as u32) << 16 | (self.b as u32) << 8 | self.a as u32
    }

    /// Unpack RGBA 5551, replicating the high bits of each channel
    pub const fn from_rgba16(packed: u16) -> Self {
        let r = ((packed >> 11) & 0x1F) as u8;
        let g = ((packed >> 6) & 0x1F) as u8;
        let b = ((packed >> 1) & 0x1F) as u8;
        Self {
            r: r << 3 | r >> 2,
            g: g << 3 | g >> 2,
            b: b << 3 | b >> 2,
            a: if packed & 1 != 0 { 0xFF } else { 0 },
        }
    }

    /// Packed as RGBA 5551
    pub const fn rgba16(self) -> u16 {
        (((self.r >> 3) as u16) << 11)
            | (((self.g >> 3) as u16) << 6)
            | (((self.b >> 3) as u16) << 1)
            | (self.a >> 7) as u16
    }
}

/// Screen rectangle, with exclusive right and bottom edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x0: u16,
    pub y0: u16,
    pub x1: u16,
    pub y1: u16,
}

impl Rect {
    pub const fn new(x0: u16, y0: u16, x1: u16, y1: u16) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub const fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    pub const fn width(&self) -> u16 {
        self.x1.saturating_sub(self.x0)
    }

    pub const fn height(&self) -> u16 {
        self.y1.saturating_sub(self.y0)
    }
}

/// Fill or copy cycle type: X1 edges are inclusive there
pub(crate) const fn is_fill_copy(other_modes: u64) -> bool {
    (other_modes & som::CYCLE_MASK) >= som::CYCLE_COPY
}

/// Encode a scissor for the given cycle class
fn scissor_command(rect: Rect, fill_copy: bool) -> u64 {
    let x1 = if fill_copy {
        rect.x1.saturating_sub(1)
    } else {
        rect.x1
    };
    let w0 = ((u32::from(rect.x0) * 4) & 0xFFF) << 12 | (u32::from(rect.y0) * 4) & 0xFFF;
    let w1 = ((u32::from(x1) * 4) & 0xFFF) << 12 | (u32::from(rect.y1) * 4) & 0xFFF;
    commands::encode(SET_SCISSOR, w0, w1)
}

impl Queue {
    /// Attach a color target, or detach with `None`
    ///
    /// Nothing is sent if the same target is already set. With
    /// `AUTOSCISSOR` on, the scissor follows the target's size.
    pub fn set_color_image(&mut self, surface: Option<&Surface>) {
        let (command, scissor, is_16bpp) = match surface {
            Some(surface) => (
                surface.image_command(SET_COLOR_IMAGE),
                Rect::new(0, 0, surface.width, surface.height),
                surface.format.size_code() == 2,
            ),
            None => {
                let detached = Surface::new(TexFormat::Rgba16, 8, 8, DETACHED_ADDRESS);
                (
                    detached.image_command(SET_COLOR_IMAGE),
                    Rect::new(0, 0, 1, 0),
                    true,
                )
            }
        };
        self.rdp.ctx.target_16bpp = is_16bpp;

        if self.rdp.ctx.tracking.color_image != Some(command) {
            self.autosync_change(Resources::PIPE);
            self.rdp_write(&[command]);
            self.rdp.ctx.tracking.color_image = Some(command);
        }
        if self.rdp.config.contains(RdpConfig::AUTOSCISSOR) {
            self.set_scissor(scissor);
        }
    }

    /// Attach a depth buffer
    pub fn set_z_image(&mut self, address: u32) {
        self.autosync_change(Resources::PIPE);
        self.rdp_write(&[commands::encode(SET_Z_IMAGE, 0, address & 0x03FF_FFFF)]);
    }

    /// Point texture loads at a surface
    pub fn set_texture_image(&mut self, surface: &Surface) {
        self.autosync_change(Resources::PIPE);
        self.rdp_write(&[surface.image_command(SET_TEXTURE_IMAGE)]);
    }

    /// Restrict drawing to `rect` (exclusive edges)
    ///
    /// The encoding depends on the cycle type in effect; it is redone
    /// automatically when a mode change crosses into or out of fill/copy.
    pub fn set_scissor(&mut self, rect: Rect) {
        let fill_copy = is_fill_copy(self.effective_other_modes());
        if self.rdp.ctx.tracking.scissor == Some((rect, fill_copy)) {
            return;
        }
        self.autosync_change(Resources::PIPE);
        self.rdp_write(&[scissor_command(rect, fill_copy)]);
        self.rdp.ctx.tracking.scissor = Some((rect, fill_copy));
    }

    /// Scissor last sent, if known
    pub fn scissor(&self) -> Option<Rect> {
        self.rdp.ctx.tracking.scissor.map(|(rect, _)| rect)
    }

    /// Re-encode the scissor if the cycle class changed since it was sent
    pub(crate) fn scissor_refresh(&mut self) {
        if let Some((rect, fill_copy)) = self.rdp.ctx.tracking.scissor {
            if fill_copy != is_fill_copy(self.effective_other_modes()) {
                self.set_scissor(rect);
            }
        }
    }

    /// Set the color used by fill mode
    ///
    /// On 16-bit targets the color is packed twice, as the rasterizer writes
    /// two pixels per cycle.
    pub fn set_fill_color(&mut self, color: Color) {
        let packed = if self.rdp.ctx.target_16bpp {
            let c = u32::from(color.rgba16());
            c << 16 | c
        } else {
            color.rgba32()
        };
        self.set_fill_color_raw(packed);
    }

    /// Set the fill register to a raw value
    pub fn set_fill_color_raw(&mut self, value: u32) {
        self.autosync_change(Resources::PIPE);
        self.rdp_write(&[commands::encode(SET_FILL_COLOR, 0, value)]);
    }
}
