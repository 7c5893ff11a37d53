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

//! RDP command set
//!
//! The RDP overlay occupies IDs 0xC-0xF, so the queue header of an RDP
//! command is exactly the raw command's high byte with the top two bits
//! set (`0xC0 | opcode`), which the rasterizer ignores.
//!
//! ```text
//! Opcode    | Command                | Words
//! ----------|------------------------|------
//! 0x08-0x0F | triangles              | 8-44
//! 0x10      | PUSH_RENDER_MODE (ext) | 2
//! 0x11      | POP_RENDER_MODE (ext)  | 2
//! 0x24-0x25 | TEXTURE_RECTANGLE      | 4
//! 0x26-0x29 | SYNC_LOAD/PIPE/TILE/FULL | 2
//! 0x2A-0x3F | state and load commands | 2
//! ```
//!
//! The two extension opcodes never reach the rasterizer: the consumer's RDP
//! stage executes them from its own mirrored mode stack.

use crate::core::overlay::{OverlayDescriptor, OverlayId, OverlayKind};

/// Static ID of the RDP overlay
pub const RDP_OVERLAY_ID: OverlayId = OverlayId::from_index(0xC);

/// Number of opcodes
pub const RDP_COMMANDS: usize = 64;

pub const NOP: u8 = 0x00;
pub const TRI_FILL: u8 = 0x08;
pub const TRI_FILL_ZBUF: u8 = 0x09;
pub const TRI_TEX: u8 = 0x0A;
pub const TRI_TEX_ZBUF: u8 = 0x0B;
pub const TRI_SHADE: u8 = 0x0C;
pub const TRI_SHADE_ZBUF: u8 = 0x0D;
pub const TRI_SHADE_TEX: u8 = 0x0E;
pub const TRI_SHADE_TEX_ZBUF: u8 = 0x0F;
pub const PUSH_RENDER_MODE: u8 = 0x10;
pub const POP_RENDER_MODE: u8 = 0x11;
pub const TEXTURE_RECTANGLE: u8 = 0x24;
pub const TEXTURE_RECTANGLE_FLIP: u8 = 0x25;
pub const SYNC_LOAD: u8 = 0x26;
pub const SYNC_PIPE: u8 = 0x27;
pub const SYNC_TILE: u8 = 0x28;
pub const SYNC_FULL: u8 = 0x29;
pub const SET_KEY_GB: u8 = 0x2A;
pub const SET_KEY_R: u8 = 0x2B;
pub const SET_CONVERT: u8 = 0x2C;
pub const SET_SCISSOR: u8 = 0x2D;
pub const SET_PRIM_DEPTH: u8 = 0x2E;
pub const SET_OTHER_MODES: u8 = 0x2F;
pub const LOAD_TLUT: u8 = 0x30;
pub const SET_TILE_SIZE: u8 = 0x32;
pub const LOAD_BLOCK: u8 = 0x33;
pub const LOAD_TILE: u8 = 0x34;
pub const SET_TILE: u8 = 0x35;
pub const FILL_RECTANGLE: u8 = 0x36;
pub const SET_FILL_COLOR: u8 = 0x37;
pub const SET_FOG_COLOR: u8 = 0x38;
pub const SET_BLEND_COLOR: u8 = 0x39;
pub const SET_PRIM_COLOR: u8 = 0x3A;
pub const SET_ENV_COLOR: u8 = 0x3B;
pub const SET_COMBINE: u8 = 0x3C;
pub const SET_TEXTURE_IMAGE: u8 = 0x3D;
pub const SET_Z_IMAGE: u8 = 0x3E;
pub const SET_COLOR_IMAGE: u8 = 0x3F;

/// Triangle sizes in 32-bit words, by opcode - 0x08
const TRIANGLE_WORDS: [usize; 8] = [8, 12, 24, 28, 24, 28, 40, 44];

/// Size of a command in 32-bit words
pub const fn command_words(opcode: u8) -> usize {
    match opcode & 0x3F {
        op @ TRI_FILL..=TRI_SHADE_TEX_ZBUF => TRIANGLE_WORDS[(op - TRI_FILL) as usize],
        TEXTURE_RECTANGLE | TEXTURE_RECTANGLE_FLIP => 4,
        _ => 2,
    }
}

/// Check whether an opcode is a triangle
pub const fn is_triangle(opcode: u8) -> bool {
    matches!(opcode & 0x3F, TRI_FILL..=TRI_SHADE_TEX_ZBUF)
}

/// Check whether a triangle opcode samples a texture
pub const fn triangle_is_textured(opcode: u8) -> bool {
    is_triangle(opcode) && (opcode & 0x02) != 0
}

/// Tile sampled by a textured triangle, from its first word
#[inline(always)]
pub const fn triangle_tile(command: u64) -> u8 {
    ((command >> 48) & 0x7) as u8
}

/// Check whether the rasterizer implements an opcode
pub const fn is_known(opcode: u8) -> bool {
    matches!(
        opcode & 0x3F,
        NOP | TRI_FILL..=TRI_SHADE_TEX_ZBUF | TEXTURE_RECTANGLE..=LOAD_TLUT | SET_TILE_SIZE..=SET_COLOR_IMAGE
    )
}

/// Opcode of a raw command
#[inline(always)]
pub const fn opcode(command: u64) -> u8 {
    ((command >> 56) & 0x3F) as u8
}

/// Build a raw command from its two halves
///
/// Only the low 24 bits of `w0` are used; the opcode fills the top byte.
#[inline(always)]
pub const fn encode(opcode: u8, w0: u32, w1: u32) -> u64 {
    (((0xC0 | opcode as u64) << 24) | (w0 & 0x00FF_FFFF) as u64) << 32 | w1 as u64
}

/// Split a raw command into its two queue words
#[inline(always)]
pub const fn split(command: u64) -> [u32; 2] {
    [(command >> 32) as u32, command as u32]
}

/// Join queue words into raw commands
pub fn join(words: &[u32]) -> Vec<u64> {
    words
        .chunks_exact(2)
        .map(|pair| ((pair[0] as u64) << 32) | pair[1] as u64)
        .collect()
}

/// Mnemonic of an opcode
pub const fn name(opcode: u8) -> &'static str {
    match opcode & 0x3F {
        NOP => "NOP",
        TRI_FILL => "TRI",
        TRI_FILL_ZBUF => "TRI_Z",
        TRI_TEX => "TRI_TEX",
        TRI_TEX_ZBUF => "TRI_TEX_Z",
        TRI_SHADE => "TRI_SHADE",
        TRI_SHADE_ZBUF => "TRI_SHADE_Z",
        TRI_SHADE_TEX => "TRI_SHADE_TEX",
        TRI_SHADE_TEX_ZBUF => "TRI_SHADE_TEX_Z",
        PUSH_RENDER_MODE => "PUSH_RENDER_MODE",
        POP_RENDER_MODE => "POP_RENDER_MODE",
        TEXTURE_RECTANGLE => "TEX_RECT",
        TEXTURE_RECTANGLE_FLIP => "TEX_RECT_FLIP",
        SYNC_LOAD => "SYNC_LOAD",
        SYNC_PIPE => "SYNC_PIPE",
        SYNC_TILE => "SYNC_TILE",
        SYNC_FULL => "SYNC_FULL",
        SET_KEY_GB => "SET_KEY_GB",
        SET_KEY_R => "SET_KEY_R",
        SET_CONVERT => "SET_CONVERT",
        SET_SCISSOR => "SET_SCISSOR",
        SET_PRIM_DEPTH => "SET_PRIM_DEPTH",
        SET_OTHER_MODES => "SET_OTHER_MODES",
        LOAD_TLUT => "LOAD_TLUT",
        SET_TILE_SIZE => "SET_TILE_SIZE",
        LOAD_BLOCK => "LOAD_BLOCK",
        LOAD_TILE => "LOAD_TILE",
        SET_TILE => "SET_TILE",
        FILL_RECTANGLE => "FILL_RECT",
        SET_FILL_COLOR => "SET_FILL_COLOR",
        SET_FOG_COLOR => "SET_FOG_COLOR",
        SET_BLEND_COLOR => "SET_BLEND_COLOR",
        SET_PRIM_COLOR => "SET_PRIM_COLOR",
        SET_ENV_COLOR => "SET_ENV_COLOR",
        SET_COMBINE => "SET_COMBINE",
        SET_TEXTURE_IMAGE => "SET_TEX_IMAGE",
        SET_Z_IMAGE => "SET_Z_IMAGE",
        SET_COLOR_IMAGE => "SET_COLOR_IMAGE",
        _ => "???",
    }
}

/// Descriptor of the RDP overlay
pub fn descriptor() -> OverlayDescriptor {
    (0..RDP_COMMANDS as u8)
        .fold(OverlayDescriptor::new("rdp", 0), |desc, op| {
            desc.command(command_words(op))
        })
        .with_kind(OverlayKind::Rdp)
}
