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

//! Render mode
//!
//! The producer keeps the requested render mode as a [`RenderMode`]: the
//! combiner formula, the raw other-modes word (plus a few extension bits
//! that never reach the rasterizer) and the blender formulas. Every setter
//! updates the mirror and recomputes the SET_COMBINE and SET_OTHER_MODES
//! words; only words that differ from the last ones sent are emitted.
//!
//! For standard modes the cycle type is derived, never set directly:
//! two-cycle is used when the combiner or blender needs two passes, or when
//! fog and a blender are both configured.

use super::autosync::Resources;
use super::commands::{self, POP_RENDER_MODE, PUSH_RENDER_MODE, SET_COMBINE, SET_OTHER_MODES};
use super::target::Color;
use super::{ModeSnapshot, MODE_STACK_DEPTH, MODE_STACK_SAVED};
use crate::core::error::{fatal, ProtocolViolation};
use crate::core::queue::Queue;

/// Other-modes word layout
pub mod som {
    pub const CYCLE_SHIFT: u32 = 52;
    pub const CYCLE_MASK: u64 = 3 << 52;
    pub const CYCLE_1: u64 = 0 << 52;
    pub const CYCLE_2: u64 = 1 << 52;
    pub const CYCLE_COPY: u64 = 2 << 52;
    pub const CYCLE_FILL: u64 = 3 << 52;

    pub const TEXTURE_PERSP: u64 = 1 << 51;
    pub const TEXTURE_DETAIL: u64 = 1 << 50;
    pub const TEXTURE_SHARPEN: u64 = 1 << 49;
    pub const TEXTURE_LOD: u64 = 1 << 48;

    pub const TLUT_MASK: u64 = 3 << 46;
    pub const TLUT_RGBA16: u64 = 2 << 46;
    pub const TLUT_IA16: u64 = 3 << 46;

    pub const SAMPLE_MASK: u64 = 3 << 44;
    pub const SAMPLE_BILINEAR: u64 = 2 << 44;
    pub const SAMPLE_MEDIAN: u64 = 3 << 44;

    pub const TF0_RGB: u64 = 1 << 43;
    pub const TF1_RGB: u64 = 2 << 41;

    pub const RGBDITHER_SHIFT: u32 = 38;
    pub const RGBDITHER_MASK: u64 = 3 << 38;
    pub const ALPHADITHER_SHIFT: u32 = 36;
    pub const ALPHADITHER_MASK: u64 = 3 << 36;

    pub const BLEND0_MASK: u64 = 0xCCCC_0000;
    pub const BLEND1_MASK: u64 = 0x3333_0000;
    pub const BLEND_MASK: u64 = BLEND0_MASK | BLEND1_MASK;

    pub const BLENDING: u64 = 1 << 14;
    pub const BLALPHA_MASK: u64 = 3 << 12;
    pub const ZMODE_MASK: u64 = 3 << 10;
    pub const COVERAGE_DEST_MASK: u64 = 3 << 8;
    pub const COLOR_ON_CVG_OVERFLOW: u64 = 1 << 7;
    pub const READ_ENABLE: u64 = 1 << 6;
    pub const Z_WRITE: u64 = 1 << 5;
    pub const Z_COMPARE: u64 = 1 << 4;
    pub const AA_ENABLE: u64 = 1 << 3;
    pub const ZSOURCE_PRIM: u64 = 1 << 2;
    pub const ALPHACOMPARE_MASK: u64 = 3;
    pub const ALPHACOMPARE_THRESHOLD: u64 = 1;
    pub const ALPHACOMPARE_NOISE: u64 = 3;

    // Extension bits, stripped before sending
    pub const SOMX_FOG: u64 = 1 << 32;
    pub const SOMX_UPDATE_FREEZE: u64 = 1 << 33;
    pub const SOMX_AA_REDUCED: u64 = 1 << 34;
    pub const SOMX_LOD_INTERPOLATE: u64 = 1 << 35;
    pub const SOMX_BLEND_2PASS: u64 = 1 << 15;
    pub const SOMX_NUMLODS_SHIFT: u32 = 59;
    pub const SOMX_NUMLODS_MASK: u64 = 7 << 59;
    pub const EXTENSION_MASK: u64 = SOMX_FOG
        | SOMX_UPDATE_FREEZE
        | SOMX_AA_REDUCED
        | SOMX_LOD_INTERPOLATE
        | SOMX_BLEND_2PASS
        | SOMX_NUMLODS_MASK;
}

/// Combiner input codes
///
/// Each formula is `(A - B) * C + D`; the zero code differs per input slot.
pub mod slot {
    pub const COMBINED: u8 = 0;
    pub const TEX0: u8 = 1;
    pub const TEX1: u8 = 2;
    pub const PRIM: u8 = 3;
    pub const SHADE: u8 = 4;
    pub const ENV: u8 = 5;
    pub const ONE: u8 = 6;
    pub const ZERO_SUB: u8 = 8;
    pub const ZERO_MUL: u8 = 16;
    pub const ZERO_ADD: u8 = 7;
    pub const ALPHA_ZERO: u8 = 7;
}

/// SET_COMBINE formula
///
/// Bit 63 marks a formula that needs both cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Combiner(u64);

impl Combiner {
    const TWO_PASS: u64 = 1 << 63;
    const RAW_MASK: u64 = 0x00FF_FFFF_FFFF_FFFF;

    const CYCLE0_MASK: u64 = Self::cycle0([15, 15, 31, 7], [7, 7, 7, 7]);

    const PASSTHROUGH_CYCLE1: u64 = Self::cycle1(
        [slot::ZERO_SUB, slot::ZERO_SUB, slot::ZERO_MUL, slot::COMBINED],
        [slot::ALPHA_ZERO, slot::ALPHA_ZERO, slot::ALPHA_ZERO, slot::COMBINED],
    );

    /// Vertex color
    pub const SHADE: Combiner = Combiner::new(
        [slot::ZERO_SUB, slot::ZERO_SUB, slot::ZERO_MUL, slot::SHADE],
        [slot::ALPHA_ZERO, slot::ALPHA_ZERO, slot::ALPHA_ZERO, slot::SHADE],
    );

    /// Primitive color
    pub const FLAT: Combiner = Combiner::new(
        [slot::ZERO_SUB, slot::ZERO_SUB, slot::ZERO_MUL, slot::PRIM],
        [slot::ALPHA_ZERO, slot::ALPHA_ZERO, slot::ALPHA_ZERO, slot::PRIM],
    );

    /// Texture color
    pub const TEX: Combiner = Combiner::new(
        [slot::ZERO_SUB, slot::ZERO_SUB, slot::ZERO_MUL, slot::TEX0],
        [slot::ALPHA_ZERO, slot::ALPHA_ZERO, slot::ALPHA_ZERO, slot::TEX0],
    );

    /// Texture modulated by primitive color
    pub const TEX_FLAT: Combiner = Combiner::new(
        [slot::TEX0, slot::ZERO_SUB, slot::PRIM, slot::ZERO_ADD],
        [slot::TEX0, slot::ALPHA_ZERO, slot::PRIM, slot::ALPHA_ZERO],
    );

    /// Texture modulated by vertex color
    pub const TEX_SHADE: Combiner = Combiner::new(
        [slot::TEX0, slot::ZERO_SUB, slot::SHADE, slot::ZERO_ADD],
        [slot::TEX0, slot::ALPHA_ZERO, slot::SHADE, slot::ALPHA_ZERO],
    );

    /// One-pass formula, `[A, B, C, D]` for RGB and alpha
    pub const fn new(rgb: [u8; 4], alpha: [u8; 4]) -> Self {
        Self(Self::cycle0(rgb, alpha) | Self::cycle1(rgb, alpha))
    }

    /// Two-pass formula: `first` runs in cycle 0, `second` in cycle 1
    pub const fn two_pass(first: ([u8; 4], [u8; 4]), second: ([u8; 4], [u8; 4])) -> Self {
        Self(Self::cycle0(first.0, first.1) | Self::cycle1(second.0, second.1) | Self::TWO_PASS)
    }

    /// Wrap a raw SET_COMBINE value as a one-pass formula
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw & Self::RAW_MASK)
    }

    const fn cycle0(rgb: [u8; 4], alpha: [u8; 4]) -> u64 {
        (rgb[0] as u64 & 0xF) << 52
            | (rgb[2] as u64 & 0x1F) << 47
            | (alpha[0] as u64 & 7) << 44
            | (alpha[2] as u64 & 7) << 41
            | (rgb[1] as u64 & 0xF) << 28
            | (rgb[3] as u64 & 7) << 15
            | (alpha[1] as u64 & 7) << 12
            | (alpha[3] as u64 & 7) << 9
    }

    const fn cycle1(rgb: [u8; 4], alpha: [u8; 4]) -> u64 {
        (rgb[0] as u64 & 0xF) << 37
            | (rgb[2] as u64 & 0x1F) << 32
            | (rgb[1] as u64 & 0xF) << 24
            | (alpha[0] as u64 & 7) << 21
            | (alpha[2] as u64 & 7) << 18
            | (rgb[3] as u64 & 7) << 6
            | (alpha[1] as u64 & 7) << 3
            | (alpha[3] as u64 & 7)
    }

    /// SET_COMBINE payload
    pub const fn raw(self) -> u64 {
        self.0 & Self::RAW_MASK
    }

    pub const fn is_two_pass(self) -> bool {
        self.0 & Self::TWO_PASS != 0
    }
}

/// Blender formula `(P * A + M * B) / (A + B)`
///
/// One-pass formulas are kept in the cycle 1 position and copied to cycle 0
/// when the mode runs in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Blender {
    bits: u32,
    two_pass: bool,
}

impl Blender {
    // P and M inputs
    pub const IN: u8 = 0;
    pub const MEMORY: u8 = 1;
    pub const BLEND_RGB: u8 = 2;
    pub const FOG_RGB: u8 = 3;

    // A inputs
    pub const IN_ALPHA: u8 = 0;
    pub const FOG_ALPHA: u8 = 1;
    pub const SHADE_ALPHA: u8 = 2;
    pub const ZERO: u8 = 3;

    // B inputs
    pub const INV_MUX_ALPHA: u8 = 0;
    pub const MEMORY_CVG: u8 = 1;
    pub const ONE: u8 = 2;

    /// Alpha blending with the framebuffer
    pub const MULTIPLY: Blender =
        Blender::new(Self::IN, Self::IN_ALPHA, Self::MEMORY, Self::INV_MUX_ALPHA);

    /// Additive blending with the framebuffer
    pub const ADDITIVE: Blender = Blender::new(Self::IN, Self::IN_ALPHA, Self::MEMORY, Self::ONE);

    /// Vertex-alpha fog
    pub const FOG_STANDARD: Blender =
        Blender::new(Self::IN, Self::SHADE_ALPHA, Self::FOG_RGB, Self::INV_MUX_ALPHA);

    /// Coverage-weighted antialiasing
    const ANTIALIAS: Blender = Blender::new(Self::IN, Self::IN_ALPHA, Self::MEMORY, Self::MEMORY_CVG);

    const fn pack(formula: [u8; 4]) -> u32 {
        (formula[0] as u32 & 3) << 28
            | (formula[1] as u32 & 3) << 24
            | (formula[2] as u32 & 3) << 20
            | (formula[3] as u32 & 3) << 16
    }

    pub const fn new(p: u8, a: u8, m: u8, b: u8) -> Self {
        Self {
            bits: Self::pack([p, a, m, b]),
            two_pass: false,
        }
    }

    /// Formula needing both cycles
    pub const fn two_pass(first: [u8; 4], second: [u8; 4]) -> Self {
        Self {
            bits: Self::pack(first) << 2 | Self::pack(second),
            two_pass: true,
        }
    }

    pub const fn is_two_pass(self) -> bool {
        self.two_pass
    }

    const fn cycle1(self) -> u64 {
        self.bits as u64 & som::BLEND1_MASK
    }

    const fn cycle0(self) -> u64 {
        (self.bits as u64 & som::BLEND1_MASK) << 2
    }

    const fn both(self) -> u64 {
        self.bits as u64 & som::BLEND_MASK
    }
}

/// Check whether blender bits read the framebuffer
fn reads_memory(blend: u64) -> bool {
    // P and M inputs of cycle 0, then cycle 1
    [30, 22, 28, 20]
        .iter()
        .any(|&shift| (blend >> shift) & 3 == u64::from(Blender::MEMORY))
}

/// Dither pattern for one channel group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DitherMode {
    Square,
    Bayer,
    Noise,
    None,
}

impl DitherMode {
    const fn code(self) -> u64 {
        match self {
            DitherMode::Square => 0,
            DitherMode::Bayer => 1,
            DitherMode::Noise => 2,
            DitherMode::None => 3,
        }
    }
}

/// Alpha compare test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlphaCompare {
    Off,
    /// Reject pixels with alpha below the threshold
    Threshold(u8),
    /// Reject against a random threshold
    Noise,
}

/// Palette lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tlut {
    None,
    Rgba16,
    Ia16,
}

/// Texture sampling filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Point,
    Bilinear,
    Median,
}

/// Mipmapping mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mipmap {
    None,
    Nearest,
    Interpolate,
    Sharpen,
    Detail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Antialias {
    None,
    Standard,
    /// Edge antialiasing without reading the framebuffer
    Reduced,
}

/// Requested render mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderMode {
    combiner: Combiner,
    other_modes: u64,
    blender: Option<Blender>,
    fog: Option<Blender>,
}

impl Default for RenderMode {
    fn default() -> Self {
        Self::standard()
    }
}

impl RenderMode {
    /// Textured, one cycle, no blending, no dithering
    pub const fn standard() -> Self {
        Self {
            combiner: Combiner::TEX,
            other_modes: som::CYCLE_1
                | som::TF0_RGB
                | som::TF1_RGB
                | DitherMode::None.code() << som::RGBDITHER_SHIFT
                | DitherMode::None.code() << som::ALPHADITHER_SHIFT,
            blender: None,
            fog: None,
        }
    }

    /// Fill mode: every pixel written with the fill color
    pub const fn fill() -> Self {
        Self {
            combiner: Combiner::TEX,
            other_modes: som::CYCLE_FILL,
            blender: None,
            fog: None,
        }
    }

    /// Copy mode: texels copied straight to the target
    pub const fn copy(transparency: bool) -> Self {
        Self {
            combiner: Combiner::TEX,
            other_modes: som::CYCLE_COPY
                | if transparency {
                    som::ALPHACOMPARE_THRESHOLD
                } else {
                    0
                },
            blender: None,
            fog: None,
        }
    }

    pub fn combiner(&self) -> Combiner {
        self.combiner
    }

    pub fn blender(&self) -> Option<Blender> {
        self.blender
    }

    pub fn fog(&self) -> Option<Blender> {
        self.fog
    }

    /// Requested other-modes word, extension bits included
    pub fn other_modes(&self) -> u64 {
        self.other_modes
    }

    fn set_bits(&mut self, mask: u64, value: u64) {
        self.other_modes = (self.other_modes & !mask) | (value & mask);
    }

    fn is_standard(&self) -> bool {
        self.other_modes & som::CYCLE_MASK < som::CYCLE_COPY
    }

    /// SET_COMBINE and SET_OTHER_MODES payloads for this mode
    pub fn resolve(&self) -> (u64, u64) {
        let mut other_modes = self.other_modes
            & !(som::EXTENSION_MASK | som::BLEND_MASK | som::BLENDING | som::READ_ENABLE);
        if !self.is_standard() {
            return (self.combiner.raw(), other_modes);
        }

        let antialias = self.other_modes & som::AA_ENABLE != 0;
        let reduced = self.other_modes & som::SOMX_AA_REDUCED != 0;
        let blender = match self.blender {
            None if antialias && !reduced => Some(Blender::ANTIALIAS),
            other => other,
        };
        let two_cycle = self.combiner.is_two_pass()
            || self.other_modes & som::SOMX_BLEND_2PASS != 0
            || blender.is_some_and(Blender::is_two_pass)
            || (self.fog.is_some() && blender.is_some());

        let blend = if two_cycle {
            match blender {
                Some(b) if b.is_two_pass() => b.both(),
                _ => self.fog.map_or(0, Blender::cycle0) | blender.map_or(0, Blender::cycle1),
            }
        } else {
            self.fog
                .or(blender)
                .map_or(0, |b| b.cycle0() | b.cycle1())
        };

        other_modes &= !som::CYCLE_MASK;
        other_modes |= if two_cycle { som::CYCLE_2 } else { som::CYCLE_1 };
        other_modes |= blend;
        if self.blender.is_some() || self.fog.is_some() {
            other_modes |= som::BLENDING;
        }
        if reads_memory(blend) || (antialias && !reduced) {
            other_modes |= som::READ_ENABLE;
        }

        let combine = if two_cycle && !self.combiner.is_two_pass() {
            (self.combiner.raw() & Combiner::CYCLE0_MASK) | Combiner::PASSTHROUGH_CYCLE1
        } else {
            self.combiner.raw()
        };
        (combine, other_modes)
    }
}

impl Queue {
    /// Render mode requested so far
    pub fn mode(&self) -> RenderMode {
        self.rdp.ctx.mode
    }

    /// Other-modes word the next draw will run with
    pub(crate) fn effective_other_modes(&self) -> u64 {
        match self.rdp.ctx.tracking.other_modes {
            Some(command) => command,
            None => self.rdp.ctx.mode.resolve().1,
        }
    }

    fn mode_update<F>(&mut self, update: F)
    where
        F: FnOnce(&mut RenderMode),
    {
        update(&mut self.rdp.ctx.mode);
        self.mode_commit();
    }

    /// Send whatever part of the mode differs from what was last sent
    pub(crate) fn mode_commit(&mut self) {
        if self.rdp.ctx.frozen {
            return;
        }
        let (combine, other_modes) = self.rdp.ctx.mode.resolve();
        let combine = commands::encode(SET_COMBINE, (combine >> 32) as u32, combine as u32);
        let other_modes = commands::encode(
            SET_OTHER_MODES,
            (other_modes >> 32) as u32,
            other_modes as u32,
        );

        if self.rdp.ctx.tracking.combine != Some(combine) {
            self.autosync_change(Resources::PIPE);
            self.rdp_write(&[combine]);
            self.rdp.ctx.tracking.combine = Some(combine);
        }
        if self.rdp.ctx.tracking.other_modes != Some(other_modes) {
            self.autosync_change(Resources::PIPE);
            self.rdp_write(&[other_modes]);
            self.rdp.ctx.tracking.other_modes = Some(other_modes);
        }
        self.scissor_refresh();
    }

    /// Textured standard mode
    pub fn set_mode_standard(&mut self) {
        self.mode_update(|mode| *mode = RenderMode::standard());
    }

    /// Fill mode with the given color
    pub fn set_mode_fill(&mut self, color: Color) {
        self.mode_update(|mode| *mode = RenderMode::fill());
        self.set_fill_color(color);
    }

    /// Copy mode, optionally skipping transparent texels
    pub fn set_mode_copy(&mut self, transparency: bool) {
        self.mode_update(|mode| *mode = RenderMode::copy(transparency));
    }

    pub fn mode_combiner(&mut self, combiner: Combiner) {
        self.mode_update(|mode| mode.combiner = combiner);
    }

    /// Blend with the framebuffer, or stop blending with `None`
    pub fn mode_blender(&mut self, blender: Option<Blender>) {
        self.mode_update(|mode| {
            mode.blender = blender;
            let two_pass = blender.is_some_and(Blender::is_two_pass);
            mode.set_bits(som::SOMX_BLEND_2PASS, if two_pass { som::SOMX_BLEND_2PASS } else { 0 });
        });
    }

    /// Fog stage running before the blender
    pub fn mode_fog(&mut self, fog: Option<Blender>) {
        self.mode_update(|mode| {
            mode.fog = fog;
            mode.set_bits(som::SOMX_FOG, if fog.is_some() { som::SOMX_FOG } else { 0 });
        });
    }

    pub fn mode_dithering(&mut self, rgb: DitherMode, alpha: DitherMode) {
        self.mode_update(|mode| {
            mode.set_bits(
                som::RGBDITHER_MASK | som::ALPHADITHER_MASK,
                rgb.code() << som::RGBDITHER_SHIFT | alpha.code() << som::ALPHADITHER_SHIFT,
            )
        });
    }

    /// Configure the alpha test
    ///
    /// A threshold is stored in the blend color's alpha.
    pub fn mode_alphacompare(&mut self, compare: AlphaCompare) {
        let bits = match compare {
            AlphaCompare::Off => 0,
            AlphaCompare::Threshold(threshold) => {
                self.set_blend_color(Color::new(0, 0, 0, threshold));
                som::ALPHACOMPARE_THRESHOLD
            }
            AlphaCompare::Noise => som::ALPHACOMPARE_NOISE,
        };
        self.mode_update(|mode| mode.set_bits(som::ALPHACOMPARE_MASK, bits));
    }

    /// Depth test and depth write
    pub fn mode_zbuf(&mut self, compare: bool, update: bool) {
        let compare = if compare { som::Z_COMPARE } else { 0 };
        let update = if update { som::Z_WRITE } else { 0 };
        let bits = compare | update;
        self.mode_update(|mode| mode.set_bits(som::Z_COMPARE | som::Z_WRITE, bits));
    }

    /// Use a fixed depth for every pixel instead of the interpolated one
    pub fn mode_zoverride(&mut self, enable: bool, z: u16, delta_z: u16) {
        if enable {
            self.set_prim_depth(z, delta_z);
        }
        let bits = if enable { som::ZSOURCE_PRIM } else { 0 };
        self.mode_update(|mode| mode.set_bits(som::ZSOURCE_PRIM, bits));
    }

    pub fn mode_tlut(&mut self, tlut: Tlut) {
        let bits = match tlut {
            Tlut::None => 0,
            Tlut::Rgba16 => som::TLUT_RGBA16,
            Tlut::Ia16 => som::TLUT_IA16,
        };
        self.mode_update(|mode| mode.set_bits(som::TLUT_MASK, bits));
    }

    pub fn mode_filter(&mut self, filter: Filter) {
        let bits = match filter {
            Filter::Point => 0,
            Filter::Bilinear => som::SAMPLE_BILINEAR,
            Filter::Median => som::SAMPLE_MEDIAN,
        };
        self.mode_update(|mode| mode.set_bits(som::SAMPLE_MASK, bits));
    }

    /// Mipmapping over `levels` levels (1 to 8)
    pub fn mode_mipmap(&mut self, mipmap: Mipmap, levels: u8) {
        let mask = som::TEXTURE_LOD
            | som::TEXTURE_DETAIL
            | som::TEXTURE_SHARPEN
            | som::SOMX_LOD_INTERPOLATE
            | som::SOMX_NUMLODS_MASK;
        let bits = match mipmap {
            Mipmap::None => 0,
            Mipmap::Nearest => som::TEXTURE_LOD,
            Mipmap::Interpolate => som::TEXTURE_LOD | som::SOMX_LOD_INTERPOLATE,
            Mipmap::Sharpen => som::TEXTURE_LOD | som::TEXTURE_SHARPEN,
            Mipmap::Detail => som::TEXTURE_LOD | som::TEXTURE_DETAIL,
        };
        let levels = if mipmap == Mipmap::None {
            0
        } else {
            u64::from(levels.clamp(1, 8) - 1) << som::SOMX_NUMLODS_SHIFT
        };
        self.mode_update(|mode| mode.set_bits(mask, bits | levels));
    }

    /// Perspective-correct texturing
    pub fn mode_persp(&mut self, enable: bool) {
        let bits = if enable { som::TEXTURE_PERSP } else { 0 };
        self.mode_update(|mode| mode.set_bits(som::TEXTURE_PERSP, bits));
    }

    pub fn mode_antialias(&mut self, antialias: Antialias) {
        let bits = match antialias {
            Antialias::None => 0,
            Antialias::Standard => som::AA_ENABLE,
            Antialias::Reduced => som::AA_ENABLE | som::SOMX_AA_REDUCED,
        };
        self.mode_update(|mode| mode.set_bits(som::AA_ENABLE | som::SOMX_AA_REDUCED, bits));
    }

    /// Start batching mode changes
    ///
    /// Setters only update the mirror until [`Queue::mode_end`], which
    /// sends the net result once.
    pub fn mode_begin(&mut self) {
        if self.rdp.ctx.frozen {
            fatal(ProtocolViolation::NestedModeBatch);
        }
        self.rdp.ctx.frozen = true;
    }

    pub fn mode_end(&mut self) {
        if !self.rdp.ctx.frozen {
            fatal(ProtocolViolation::ModeBatchNotActive);
        }
        self.rdp.ctx.frozen = false;
        self.mode_commit();
    }

    /// Save the current render mode
    pub fn mode_push(&mut self) {
        let ctx = &mut self.rdp.ctx;
        if ctx.stack.len() >= MODE_STACK_SAVED {
            fatal(ProtocolViolation::ModeStackOverflow(MODE_STACK_DEPTH));
        }
        ctx.stack.push(ModeSnapshot {
            mode: ctx.mode,
            combine: ctx.tracking.combine,
            other_modes: ctx.tracking.other_modes,
        });
        self.rdp_write(&[commands::encode(PUSH_RENDER_MODE, 0, 0)]);
    }

    /// Restore the render mode saved by the matching [`Queue::mode_push`]
    pub fn mode_pop(&mut self) {
        let Some(snapshot) = self.rdp.ctx.stack.pop() else {
            fatal(ProtocolViolation::ModeStackUnderflow);
        };
        self.autosync_change(Resources::PIPE);
        self.rdp_write(&[commands::encode(POP_RENDER_MODE, 0, 0)]);

        let ctx = &mut self.rdp.ctx;
        ctx.mode = snapshot.mode;
        ctx.tracking.combine = snapshot.combine;
        ctx.tracking.other_modes = snapshot.other_modes;
        self.scissor_refresh();
    }
}
