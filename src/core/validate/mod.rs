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

//! Offline RDP stream validator
//!
//! [`Validator`] replays raw 64-bit RDP commands and reports what the
//! rasterizer would trip on. It tracks:
//!
//! - which resources are busy (pipe, the eight tile descriptors, TMEM in
//!   64-byte regions)
//! - which state was set (color image, scissor, other modes, combiner)
//! - tile descriptors, to know which TMEM a textured draw reads
//!
//! ```text
//! Severity | Meaning
//! ---------|----------------------------------------------------
//! Warning  | undefined output (a missing sync is a race)
//! Error    | wrong output on hardware
//! Crash    | the rasterizer locks up
//! ```
//!
//! # Example
//!
//! ```
//! use rcpq::core::rdp::commands::{self, FILL_RECTANGLE};
//! use rcpq::core::validate::{validate_stream, Severity};
//!
//! let report = validate_stream(&[commands::encode(FILL_RECTANGLE, 0, 0)]);
//! assert_eq!(report.count(Severity::Crash), 2);
//! ```

mod disasm;
mod input;

#[cfg(test)]
mod tests;

pub use disasm::{disasm, disasm_stream};
pub use input::{detect_format, load, parse_binary, parse_hex, InputFormat};

use crate::core::rdp::commands::{self, *};
use crate::core::rdp::som;
use serde::Serialize;
use std::fmt;

/// TMEM size in bytes
const TMEM_BYTES: u32 = 4096;

/// Bytes covered by one bit of the TMEM busy mask
const TMEM_REGION_BYTES: u32 = 64;

/// How bad a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Warning,
    Error,
    Crash,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Crash => write!(f, "CRASH"),
        }
    }
}

/// One finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,

    /// Position of the command in the stream (0-based, in commands)
    pub index: usize,

    /// First word of the offending command
    pub command: u64,

    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] #{} 0x{:016X} {}: {}",
            self.severity,
            self.index,
            self.command,
            commands::name(opcode(self.command)),
            self.message
        )
    }
}

/// Result of a validation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub diagnostics: Vec<Diagnostic>,

    /// Commands replayed
    pub commands: usize,
}

impl Report {
    /// Number of findings of one severity
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Worst severity found, if any
    pub fn worst(&self) -> Option<Severity> {
        self.diagnostics.iter().map(|d| d.severity).max()
    }

    /// Check whether the run counts as failed
    ///
    /// Errors and crashes always fail; warnings only when
    /// `warnings_as_errors` is set.
    pub fn failed(&self, warnings_as_errors: bool) -> bool {
        match self.worst() {
            Some(Severity::Warning) => warnings_as_errors,
            Some(_) => true,
            None => false,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Tile descriptor as last configured
#[derive(Debug, Clone, Copy, Default)]
struct TileState {
    configured: bool,
    /// TMEM address in bytes
    tmem_addr: u32,
    /// Row pitch in bytes
    pitch: u32,
    /// Rows covered, once SET_TILE_SIZE or LOAD_TILE set the extents
    rows: Option<u32>,
}

impl TileState {
    /// TMEM byte range a draw sampling this tile reads
    fn tmem_range(&self) -> (u32, u32) {
        let size = match self.rows {
            Some(rows) => rows * self.pitch.max(8),
            None => TMEM_BYTES - self.tmem_addr.min(TMEM_BYTES),
        };
        (self.tmem_addr, size)
    }
}

/// Busy resources
#[derive(Debug, Clone, Copy, Default)]
struct Busy {
    pipe: bool,
    tiles: [bool; 8],
    tmem: u64,
}

fn tmem_mask(addr: u32, size: u32) -> u64 {
    let start = addr.min(TMEM_BYTES) / TMEM_REGION_BYTES;
    let end = (addr + size).min(TMEM_BYTES).div_ceil(TMEM_REGION_BYTES);
    (start..end).fold(0, |mask, region| mask | 1 << region)
}

#[inline(always)]
fn bits(word: u64, lo: u32, hi: u32) -> u32 {
    ((word >> lo) & ((1u64 << (hi - lo + 1)) - 1)) as u32
}

/// Stateful RDP command validator
#[derive(Debug, Clone, Default)]
pub struct Validator {
    busy: Busy,
    tiles: [TileState; 8],
    /// Size code of the last texture image
    tex_size: u32,
    other_modes: Option<u64>,
    combine_set: bool,
    color_image: bool,
    scissor: bool,
    live: bool,
    index: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validator that also logs every finding as it is made
    pub fn live() -> Self {
        Self {
            live: true,
            ..Self::default()
        }
    }

    /// Findings so far
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Commands replayed so far
    pub fn commands(&self) -> usize {
        self.index
    }

    /// Finish the run
    pub fn finish(self) -> Report {
        Report {
            diagnostics: self.diagnostics,
            commands: self.index,
        }
    }

    fn report(&mut self, severity: Severity, command: u64, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            severity,
            index: self.index,
            command,
            message: message.into(),
        };
        if self.live {
            log::warn!("validate: {}", diagnostic);
        }
        self.diagnostics.push(diagnostic);
    }

    fn check(&mut self, ok: bool, severity: Severity, command: u64, message: &str) {
        if !ok {
            self.report(severity, command, message);
        }
    }

    fn cycle_type(&self) -> u64 {
        self.other_modes.unwrap_or(0) & som::CYCLE_MASK
    }

    fn change_pipe(&mut self, w0: u64) {
        let busy = self.busy.pipe;
        self.check(!busy, Severity::Warning, w0, "pipe might be busy, SYNC_PIPE is missing");
        self.busy.pipe = false;
    }

    fn change_tile(&mut self, w0: u64, tile: usize) {
        if self.busy.tiles[tile] {
            self.report(
                Severity::Warning,
                w0,
                format!("tile {} might be busy, SYNC_TILE is missing", tile),
            );
        }
        self.busy.tiles[tile] = false;
    }

    fn change_tmem(&mut self, w0: u64, addr: u32, size: u32) {
        if self.busy.tmem & tmem_mask(addr, size) != 0 {
            self.report(
                Severity::Warning,
                w0,
                format!(
                    "writing to TMEM[0x{:X}:0x{:X}] while busy, SYNC_LOAD is missing",
                    addr,
                    addr + size
                ),
            );
        }
    }

    fn use_tile(&mut self, tile: usize) {
        self.busy.tiles[tile] = true;
        let (addr, size) = self.tiles[tile].tmem_range();
        self.busy.tmem |= tmem_mask(addr, size);
    }

    /// Checks shared by every draw command
    fn check_draw(&mut self, w0: u64) {
        let (color_image, scissor) = (self.color_image, self.scissor);
        self.check(
            color_image,
            Severity::Crash,
            w0,
            "SET_COLOR_IMAGE not called before drawing",
        );
        self.check(scissor, Severity::Crash, w0, "SET_SCISSOR not called before drawing");

        let Some(other_modes) = self.other_modes else {
            self.report(Severity::Error, w0, "SET_OTHER_MODES not called before drawing");
            return;
        };
        match other_modes & som::CYCLE_MASK {
            som::CYCLE_FILL => {
                self.check(
                    other_modes & som::READ_ENABLE == 0,
                    Severity::Crash,
                    w0,
                    "image read is enabled but is not supported in FILL mode",
                );
                self.check(
                    other_modes & som::Z_COMPARE == 0,
                    Severity::Crash,
                    w0,
                    "Z buffer compare is enabled but is not supported in FILL mode",
                );
            }
            som::CYCLE_COPY => {}
            _ => {
                let combine_set = self.combine_set;
                self.check(
                    combine_set,
                    Severity::Error,
                    w0,
                    "SET_COMBINE not called before drawing",
                );
            }
        }
    }

    /// Textured draw sampling `tile`
    fn draw_textured(&mut self, w0: u64, tile: usize) {
        if !self.tiles[tile].configured {
            self.report(Severity::Error, w0, format!("tile {} was not configured", tile));
        }
        self.use_tile(tile);
        let multi_tile = self.cycle_type() == som::CYCLE_2
            || self.other_modes.unwrap_or(0)
                & (som::TEXTURE_LOD | som::TEXTURE_DETAIL | som::TEXTURE_SHARPEN)
                != 0;
        if multi_tile {
            self.use_tile((tile + 1) & 7);
        }
    }

    /// Replay one complete command
    ///
    /// `command` holds every word of the command; a short slice is
    /// reported as truncated and otherwise ignored.
    pub fn validate(&mut self, command: &[u64]) {
        let Some(&w0) = command.first() else {
            return;
        };
        let op = opcode(w0);
        let expected = command_words(op) / 2;
        if command.len() < expected {
            self.report(
                Severity::Error,
                w0,
                format!(
                    "truncated command: {} of {} words present",
                    command.len(),
                    expected
                ),
            );
            self.index += 1;
            return;
        }

        match op {
            NOP => {}
            SET_COLOR_IMAGE => {
                self.change_pipe(w0);
                self.color_image = true;
                self.check(
                    bits(w0, 51, 52) != 0,
                    Severity::Error,
                    w0,
                    "cannot render to a 4bpp surface",
                );
                self.check(
                    bits(w0, 0, 5) == 0,
                    Severity::Error,
                    w0,
                    "color image must be aligned to 64 bytes",
                );
            }
            SET_Z_IMAGE => {
                self.change_pipe(w0);
                self.check(
                    bits(w0, 0, 5) == 0,
                    Severity::Error,
                    w0,
                    "Z image must be aligned to 64 bytes",
                );
            }
            SET_TEXTURE_IMAGE => {
                self.change_pipe(w0);
                self.tex_size = bits(w0, 51, 52);
                self.check(
                    bits(w0, 0, 2) == 0,
                    Severity::Error,
                    w0,
                    "texture image must be aligned to 8 bytes",
                );
            }
            SET_OTHER_MODES => {
                self.change_pipe(w0);
                self.other_modes = Some(w0 & 0x00FF_FFFF_FFFF_FFFF);
            }
            SET_COMBINE => {
                self.change_pipe(w0);
                self.combine_set = true;
            }
            SET_FILL_COLOR | SET_FOG_COLOR | SET_BLEND_COLOR | SET_ENV_COLOR | SET_CONVERT
            | SET_KEY_GB | SET_KEY_R => self.change_pipe(w0),
            SET_PRIM_COLOR | SET_PRIM_DEPTH => {}
            SET_SCISSOR => {
                self.scissor = true;
                let (x0, x1) = (bits(w0, 44, 55), bits(w0, 12, 23));
                if x0 > x1 {
                    self.report(
                        Severity::Error,
                        w0,
                        format!("scissor X0 ({}) is greater than X1 ({})", x0 / 4, x1 / 4),
                    );
                }
                self.check(
                    bits(w0, 32, 43) <= bits(w0, 0, 11),
                    Severity::Warning,
                    w0,
                    "scissor Y0 is greater than Y1",
                );
            }
            SET_TILE => {
                let tile = bits(w0, 24, 26) as usize;
                self.change_tile(w0, tile);
                self.tiles[tile] = TileState {
                    configured: true,
                    tmem_addr: bits(w0, 32, 40) * 8,
                    pitch: bits(w0, 41, 49) * 8,
                    rows: None,
                };
            }
            SET_TILE_SIZE => {
                let tile = bits(w0, 24, 26) as usize;
                self.change_tile(w0, tile);
                self.tiles[tile].rows = Some((bits(w0, 0, 11) / 4).saturating_sub(bits(w0, 32, 43) / 4) + 1);
            }
            LOAD_TILE => {
                let tile = bits(w0, 24, 26) as usize;
                self.change_tile(w0, tile);
                self.check(
                    self.tex_size != 0,
                    Severity::Crash,
                    w0,
                    "LOAD_TILE does not support 4-bit textures",
                );
                let rows = (bits(w0, 0, 11) / 4).saturating_sub(bits(w0, 32, 43) / 4) + 1;
                self.tiles[tile].rows = Some(rows);
                let (addr, size) = self.tiles[tile].tmem_range();
                self.change_tmem(w0, addr, size);
                self.busy.tiles[tile] = true;
            }
            LOAD_BLOCK => {
                let tile = bits(w0, 24, 26) as usize;
                let texels = bits(w0, 12, 23) + 1;
                self.check(
                    texels <= 2048,
                    Severity::Error,
                    w0,
                    "cannot load more than 2048 texels at once",
                );
                let bytes = (texels * (4 << self.tex_size)).div_ceil(8);
                self.change_tmem(w0, self.tiles[tile].tmem_addr, bytes);
                self.busy.tiles[tile] = true;
            }
            LOAD_TLUT => {
                let tile = bits(w0, 24, 26) as usize;
                let (low, high) = (bits(w0, 44, 55) >> 2, bits(w0, 12, 23) >> 2);
                let addr = self.tiles[tile].tmem_addr;
                self.check(
                    addr >= 0x800,
                    Severity::Error,
                    w0,
                    "palettes must be loaded in upper half of TMEM (address >= 0x800)",
                );
                self.check(
                    low <= high,
                    Severity::Crash,
                    w0,
                    "palette stop index is lower than palette start index",
                );
                let entries = high.saturating_sub(low) + 1;
                self.change_tmem(w0, addr, entries * 8);
                self.busy.tiles[tile] = true;
            }
            FILL_RECTANGLE => {
                self.check_draw(w0);
                let copy = self.other_modes.is_some() && self.cycle_type() == som::CYCLE_COPY;
                self.check(
                    !copy,
                    Severity::Error,
                    w0,
                    "FILL_RECTANGLE cannot be used in COPY mode",
                );
                self.busy.pipe = true;
            }
            TEXTURE_RECTANGLE | TEXTURE_RECTANGLE_FLIP => {
                self.check_draw(w0);
                let fill = self.other_modes.is_some() && self.cycle_type() == som::CYCLE_FILL;
                self.check(
                    !fill,
                    Severity::Crash,
                    w0,
                    "cannot draw texture rectangles in FILL mode",
                );
                if op == TEXTURE_RECTANGLE_FLIP && self.cycle_type() == som::CYCLE_COPY {
                    self.report(
                        Severity::Error,
                        w0,
                        "cannot draw texture rectangle flip in COPY mode",
                    );
                }
                self.busy.pipe = true;
                self.draw_textured(w0, bits(w0, 24, 26) as usize);
            }
            op if is_triangle(op) => {
                self.check_draw(w0);
                let fill_copy = matches!(self.cycle_type(), som::CYCLE_FILL | som::CYCLE_COPY);
                self.check(
                    self.other_modes.is_none() || !fill_copy,
                    Severity::Crash,
                    w0,
                    "cannot draw triangles in COPY/FILL mode",
                );
                self.busy.pipe = true;
                if triangle_is_textured(op) {
                    self.draw_textured(w0, usize::from(triangle_tile(w0)));
                }
            }
            SYNC_PIPE => self.busy.pipe = false,
            SYNC_TILE => self.busy.tiles = [false; 8],
            SYNC_LOAD => self.busy.tmem = 0,
            SYNC_FULL => self.busy = Busy::default(),
            _ => self.report(
                Severity::Error,
                w0,
                format!("invalid RDP command 0x{:02X}", op),
            ),
        }
        self.index += 1;
    }
}

/// Split a flat stream into commands
///
/// The last command may be shorter than its opcode requires when the
/// stream is truncated.
pub fn split_commands(stream: &[u64]) -> Vec<&[u64]> {
    let mut out = Vec::new();
    let mut rest = stream;
    while let Some(&w0) = rest.first() {
        let len = (command_words(opcode(w0)) / 2).min(rest.len());
        let (command, tail) = rest.split_at(len);
        out.push(command);
        rest = tail;
    }
    out
}

/// Validate a complete flat stream
pub fn validate_stream(stream: &[u64]) -> Report {
    let mut validator = Validator::new();
    for command in split_commands(stream) {
        validator.validate(command);
    }
    validator.finish()
}
