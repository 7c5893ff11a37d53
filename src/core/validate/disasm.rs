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

//! RDP command disassembler
//!
//! One line per command: mnemonic padded to 16 columns, then decoded
//! fields. Coordinates in 10.2 fixed point are printed as decimals.

use super::bits;
use crate::core::rdp::commands::{self, *};
use crate::core::rdp::som;
use std::fmt::Write;

const FORMATS: [&str; 8] = ["RGBA", "YUV", "CI", "IA", "I", "?", "?", "?"];

fn format_name(w0: u64) -> String {
    format!(
        "{}{}",
        FORMATS[bits(w0, 53, 55) as usize],
        4 << bits(w0, 51, 52)
    )
}

/// 10.2 fixed point
fn fx2(value: u32) -> f32 {
    value as f32 / 4.0
}

/// Signed fixed point with `frac` fractional bits
fn fixed16(value: u32, frac: u32) -> f32 {
    (value as u16 as i16) as f32 / (1u32 << frac) as f32
}

fn rect_fields(w0: u64) -> (f32, f32, f32, f32) {
    (
        fx2(bits(w0, 44, 55)),
        fx2(bits(w0, 32, 43)),
        fx2(bits(w0, 12, 23)),
        fx2(bits(w0, 0, 11)),
    )
}

fn color(w0: u64) -> String {
    format!(
        "rgba=({}, {}, {}, {})",
        bits(w0, 24, 31),
        bits(w0, 16, 23),
        bits(w0, 8, 15),
        bits(w0, 0, 7)
    )
}

fn other_modes(w0: u64) -> String {
    let cycle = match w0 & som::CYCLE_MASK {
        som::CYCLE_1 => "1cyc",
        som::CYCLE_2 => "2cyc",
        som::CYCLE_COPY => "copy",
        _ => "fill",
    };
    let mut out = cycle.to_string();
    let flags = [
        (som::TEXTURE_PERSP, "persp"),
        (som::TEXTURE_LOD, "lod"),
        (som::TEXTURE_DETAIL, "detail"),
        (som::TEXTURE_SHARPEN, "sharpen"),
        (som::BLENDING, "blend"),
        (som::READ_ENABLE, "read"),
        (som::Z_COMPARE, "zcmp"),
        (som::Z_WRITE, "zupd"),
    ];
    for (bit, label) in flags {
        if w0 & bit != 0 {
            out.push(' ');
            out.push_str(label);
        }
    }
    if w0 & som::TLUT_MASK != 0 {
        out.push_str(" tlut");
    }
    match w0 & som::SAMPLE_MASK {
        som::SAMPLE_BILINEAR => out.push_str(" bilinear"),
        som::SAMPLE_MEDIAN => out.push_str(" median"),
        _ => {}
    }
    out
}

/// Render one command
///
/// With `show_payload`, every word after the first of a triangle is
/// listed on its own line.
pub fn disasm(command: &[u64], show_payload: bool) -> String {
    let Some(&w0) = command.first() else {
        return String::new();
    };
    let op = opcode(w0);
    let mut line = format!("{:<16}", commands::name(op));

    let fields = match op {
        SET_SCISSOR => {
            let (x0, y0, x1, y1) = rect_fields(w0);
            format!("xy=({:.2},{:.2})-({:.2},{:.2})", x0, y0, x1, y1)
        }
        SET_COLOR_IMAGE | SET_Z_IMAGE | SET_TEXTURE_IMAGE => format!(
            "dram=0x{:08X} w={} fmt={}",
            bits(w0, 0, 25),
            bits(w0, 32, 41) + 1,
            format_name(w0)
        ),
        SET_OTHER_MODES => other_modes(w0),
        SET_COMBINE => format!("0x{:014X}", w0 & 0x00FF_FFFF_FFFF_FFFF),
        FILL_RECTANGLE => {
            let (x1, y1, x0, y0) = rect_fields(w0);
            format!("xy=({:.2},{:.2})-({:.2},{:.2})", x0, y0, x1, y1)
        }
        TEXTURE_RECTANGLE | TEXTURE_RECTANGLE_FLIP => {
            let (x1, y1, x0, y0) = rect_fields(w0);
            let mut text = format!(
                "tile={} xy=({:.2},{:.2})-({:.2},{:.2})",
                bits(w0, 24, 26),
                x0,
                y0,
                x1,
                y1
            );
            if let Some(&w1) = command.get(1) {
                let _ = write!(
                    text,
                    " st=({:.2},{:.2}) dst=({:.4},{:.4})",
                    fixed16(bits(w1, 48, 63), 5),
                    fixed16(bits(w1, 32, 47), 5),
                    fixed16(bits(w1, 16, 31), 10),
                    fixed16(bits(w1, 0, 15), 10)
                );
            }
            text
        }
        SET_FILL_COLOR => format!("color=0x{:08X}", bits(w0, 0, 31)),
        SET_FOG_COLOR | SET_BLEND_COLOR | SET_PRIM_COLOR | SET_ENV_COLOR => color(w0),
        SET_PRIM_DEPTH => format!("z=0x{:04X} dz=0x{:04X}", bits(w0, 16, 31), bits(w0, 0, 15)),
        SET_TILE => format!(
            "tile={} fmt={} tmem=0x{:03X} pitch={} pal={}",
            bits(w0, 24, 26),
            format_name(w0),
            bits(w0, 32, 40) * 8,
            bits(w0, 41, 49) * 8,
            bits(w0, 20, 23)
        ),
        SET_TILE_SIZE | LOAD_TILE => {
            let (s0, t0, s1, t1) = rect_fields(w0);
            format!(
                "tile={} st=({:.2},{:.2})-({:.2},{:.2})",
                bits(w0, 24, 26),
                s0,
                t0,
                s1,
                t1
            )
        }
        LOAD_BLOCK => format!(
            "tile={} st=({},{}) texels={} dxt=0x{:03X}",
            bits(w0, 24, 26),
            bits(w0, 44, 55),
            bits(w0, 32, 43),
            bits(w0, 12, 23) + 1,
            bits(w0, 0, 11)
        ),
        LOAD_TLUT => format!(
            "tile={} palidx=({}-{})",
            bits(w0, 24, 26),
            bits(w0, 44, 55) >> 2,
            bits(w0, 12, 23) >> 2
        ),
        op if triangle_is_textured(op) => format!(
            "{} tile={}",
            if bits(w0, 55, 55) != 0 { "left" } else { "right" },
            bits(w0, 48, 50)
        ),
        op if is_triangle(op) => {
            let major = if bits(w0, 55, 55) != 0 { "left" } else { "right" };
            major.to_string()
        }
        op if !is_known(op) => format!("0x{:016X}", w0),
        _ => String::new(),
    };
    line.push_str(&fields);
    let line_len = line.trim_end().len();
    line.truncate(line_len);

    if show_payload && is_triangle(op) {
        for word in &command[1..] {
            let _ = write!(line, "\n{:<16}0x{:016X}", "", word);
        }
    }
    line
}

/// Render a flat stream, one entry per command
pub fn disasm_stream(stream: &[u64], show_payload: bool) -> Vec<String> {
    super::split_commands(stream)
        .into_iter()
        .map(|command| disasm(command, show_payload))
        .collect()
}
