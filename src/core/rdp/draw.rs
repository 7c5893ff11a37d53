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

//! Tiles, texture loads, colors and draw commands

use super::autosync::Resources;
use super::commands::{
    self, FILL_RECTANGLE, LOAD_BLOCK, LOAD_TILE, LOAD_TLUT, SET_BLEND_COLOR, SET_ENV_COLOR,
    SET_FOG_COLOR, SET_PRIM_COLOR, SET_PRIM_DEPTH, SET_TILE, SET_TILE_SIZE, TEXTURE_RECTANGLE,
};
use super::mode::som;
use super::target::{is_fill_copy, Color, Rect, TexFormat};
use crate::core::error::{fatal, ProtocolViolation};
use crate::core::queue::Queue;

/// Tile descriptor settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileParams {
    pub format: TexFormat,
    /// Row stride in 64-bit TMEM words
    pub line: u16,
    /// TMEM address in 64-bit words
    pub tmem_addr: u16,
    pub palette: u8,
    pub clamp_s: bool,
    pub mirror_s: bool,
    pub mask_s: u8,
    pub shift_s: u8,
    pub clamp_t: bool,
    pub mirror_t: bool,
    pub mask_t: u8,
    pub shift_t: u8,
}

impl TileParams {
    pub fn new(format: TexFormat, line: u16, tmem_addr: u16) -> Self {
        Self {
            format,
            line,
            tmem_addr,
            palette: 0,
            clamp_s: false,
            mirror_s: false,
            mask_s: 0,
            shift_s: 0,
            clamp_t: false,
            mirror_t: false,
            mask_t: 0,
            shift_t: 0,
        }
    }
}

fn check_tile(tile: u8) {
    if tile > 7 {
        fatal(ProtocolViolation::InvalidTile(tile));
    }
}

/// Pack a tile coordinate rectangle (inclusive edges, 10.2 fixed point)
fn tile_coords(opcode: u8, tile: u8, s0: u16, t0: u16, s1: u16, t1: u16) -> u64 {
    let w0 = (u32::from(s0) * 4 & 0xFFF) << 12 | (u32::from(t0) * 4 & 0xFFF);
    let w1 = u32::from(tile) << 24
        | (u32::from(s1) * 4 & 0xFFF) << 12
        | (u32::from(t1) * 4 & 0xFFF);
    commands::encode(opcode, w0, w1)
}

/// Signed fixed point with `frac` fractional bits, truncated to 16 bits
fn fixed16(value: f32, frac: u32) -> u32 {
    ((value * (1u32 << frac) as f32) as i32 as u32) & 0xFFFF
}

impl Queue {
    /// Resources a textured draw sampling `tile` reads
    ///
    /// Two-cycle and mipmapped modes may read the following tiles too; all
    /// are marked busy in that case. So are they inside a block that has not
    /// sent a mode yet, since the block runs with its caller's mode.
    fn texture_tiles(&self, tile: u8) -> Resources {
        check_tile(tile);
        if self.is_recording() && self.rdp.ctx.tracking.other_modes.is_none() {
            return Resources::TILES;
        }
        let other_modes = self.effective_other_modes();
        let multi_tile = other_modes & som::CYCLE_MASK == som::CYCLE_2
            || other_modes & (som::TEXTURE_LOD | som::TEXTURE_DETAIL | som::TEXTURE_SHARPEN) != 0;
        if multi_tile {
            Resources::TILES
        } else {
            Resources::tile(tile)
        }
    }

    /// Configure tile descriptor `tile`
    pub fn set_tile(&mut self, tile: u8, params: &TileParams) {
        check_tile(tile);
        self.autosync_change(Resources::tile(tile));
        let w0 = params.format.format_code() << 21
            | params.format.size_code() << 19
            | (u32::from(params.line) & 0x1FF) << 9
            | (u32::from(params.tmem_addr) & 0x1FF);
        let w1 = u32::from(tile) << 24
            | (u32::from(params.palette) & 0xF) << 20
            | u32::from(params.clamp_t) << 19
            | u32::from(params.mirror_t) << 18
            | (u32::from(params.mask_t) & 0xF) << 14
            | (u32::from(params.shift_t) & 0xF) << 10
            | u32::from(params.clamp_s) << 9
            | u32::from(params.mirror_s) << 8
            | (u32::from(params.mask_s) & 0xF) << 4
            | (u32::from(params.shift_s) & 0xF);
        self.rdp_write(&[commands::encode(SET_TILE, w0, w1)]);
    }

    /// Set the texel window of a tile (exclusive `s1`, `t1`)
    pub fn set_tile_size(&mut self, tile: u8, s0: u16, t0: u16, s1: u16, t1: u16) {
        check_tile(tile);
        self.autosync_change(Resources::tile(tile));
        self.rdp_write(&[tile_coords(
            SET_TILE_SIZE,
            tile,
            s0,
            t0,
            s1.saturating_sub(1),
            t1.saturating_sub(1),
        )]);
    }

    /// Load a rectangle of the texture image into TMEM
    pub fn load_tile(&mut self, tile: u8, s0: u16, t0: u16, s1: u16, t1: u16) {
        check_tile(tile);
        self.autosync_change(Resources::tmem(0) | Resources::tile(tile));
        self.autosync_use(Resources::tile(tile));
        self.rdp_write(&[tile_coords(
            LOAD_TILE,
            tile,
            s0,
            t0,
            s1.saturating_sub(1),
            t1.saturating_sub(1),
        )]);
    }

    /// Load `texels` contiguous texels into TMEM
    ///
    /// `dxt` is the 1.11 fixed-point row increment.
    pub fn load_block(&mut self, tile: u8, s0: u16, t0: u16, texels: u16, dxt: u16) {
        check_tile(tile);
        self.autosync_change(Resources::tmem(0));
        self.autosync_use(Resources::tile(tile));
        let w0 = (u32::from(s0) & 0xFFF) << 12 | (u32::from(t0) & 0xFFF);
        let w1 = u32::from(tile) << 24
            | (u32::from(texels.saturating_sub(1)) & 0xFFF) << 12
            | (u32::from(dxt) & 0xFFF);
        self.rdp_write(&[commands::encode(LOAD_BLOCK, w0, w1)]);
    }

    /// Load `count` palette entries starting at `first`
    pub fn load_tlut(&mut self, tile: u8, first: u8, count: u16) {
        check_tile(tile);
        self.autosync_change(Resources::tmem(0));
        self.autosync_use(Resources::tile(tile));
        let last = (u32::from(first) + u32::from(count.max(1)) - 1).min(255) as u16;
        self.rdp_write(&[tile_coords(LOAD_TLUT, tile, u16::from(first), 0, last, 0)]);
    }

    /// Fill `rect` (exclusive edges) with the current mode
    ///
    /// Empty rectangles emit nothing. Fill and copy modes take inclusive
    /// edges, so one pixel is removed from the right and bottom.
    pub fn fill_rectangle(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        let (x1, y1) = if is_fill_copy(self.effective_other_modes()) {
            (rect.x1 - 1, rect.y1 - 1)
        } else {
            (rect.x1, rect.y1)
        };
        self.autosync_use(Resources::PIPE);
        let w0 = (u32::from(x1) * 4 & 0xFFF) << 12 | (u32::from(y1) * 4 & 0xFFF);
        let w1 = (u32::from(rect.x0) * 4 & 0xFFF) << 12 | (u32::from(rect.y0) * 4 & 0xFFF);
        self.rdp_write(&[commands::encode(FILL_RECTANGLE, w0, w1)]);
    }

    /// Draw `rect` sampling `tile` from texel (`s`, `t`)
    ///
    /// `dsdx` and `dtdy` are texels per pixel. In copy mode the rasterizer
    /// expects four texels per step and inclusive edges.
    #[allow(clippy::too_many_arguments)]
    pub fn texture_rectangle(&mut self, tile: u8, rect: Rect, s: f32, t: f32, dsdx: f32, dtdy: f32) {
        if rect.is_empty() {
            return;
        }
        let tiles = self.texture_tiles(tile);
        let other_modes = self.effective_other_modes();
        let copy = other_modes & som::CYCLE_MASK == som::CYCLE_COPY;
        let (x1, y1) = if is_fill_copy(other_modes) {
            (rect.x1 - 1, rect.y1 - 1)
        } else {
            (rect.x1, rect.y1)
        };
        let dsdx = if copy { dsdx * 4.0 } else { dsdx };

        self.autosync_use(Resources::PIPE | tiles | Resources::tmem(0));
        let w0 = (u32::from(x1) * 4 & 0xFFF) << 12 | (u32::from(y1) * 4 & 0xFFF);
        let w1 = u32::from(tile) << 24
            | (u32::from(rect.x0) * 4 & 0xFFF) << 12
            | (u32::from(rect.y0) * 4 & 0xFFF);
        let w2 = fixed16(s, 5) << 16 | fixed16(t, 5);
        let w3 = fixed16(dsdx, 10) << 16 | fixed16(dtdy, 10);
        self.rdp_write(&[
            commands::encode(TEXTURE_RECTANGLE, w0, w1),
            (u64::from(w2) << 32) | u64::from(w3),
        ]);
    }

    /// Draw a triangle from precomputed edge and attribute words
    ///
    /// `words` is the full raw command, opcode included. The opcode decides
    /// whether the triangle samples a texture; the tile index sits in bits
    /// 48-50 of the first word.
    pub fn triangle(&mut self, words: &[u64]) {
        let mut resources = Resources::PIPE;
        if let Some(&first) = words.first() {
            if commands::triangle_is_textured(commands::opcode(first)) {
                resources |= self.texture_tiles(commands::triangle_tile(first)) | Resources::TMEMS;
            }
        }
        self.autosync_use(resources);
        self.rdp_write(words);
    }

    pub fn set_fog_color(&mut self, color: Color) {
        self.autosync_change(Resources::PIPE);
        self.rdp_write(&[commands::encode(SET_FOG_COLOR, 0, color.rgba32())]);
    }

    pub fn set_blend_color(&mut self, color: Color) {
        self.autosync_change(Resources::PIPE);
        self.rdp_write(&[commands::encode(SET_BLEND_COLOR, 0, color.rgba32())]);
    }

    pub fn set_env_color(&mut self, color: Color) {
        self.autosync_change(Resources::PIPE);
        self.rdp_write(&[commands::encode(SET_ENV_COLOR, 0, color.rgba32())]);
    }

    /// Set the primitive color
    ///
    /// Latched by the rasterizer per primitive; needs no sync.
    pub fn set_prim_color(&mut self, color: Color) {
        self.rdp_write(&[commands::encode(SET_PRIM_COLOR, 0, color.rgba32())]);
    }

    /// Set the depth used when the depth source is the primitive
    pub fn set_prim_depth(&mut self, z: u16, delta_z: u16) {
        let w1 = u32::from(z) << 16 | u32::from(delta_z);
        self.rdp_write(&[commands::encode(SET_PRIM_DEPTH, 0, w1)]);
    }
}
