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

use super::super::*;
use super::{color_image, other_modes, scissor};
use crate::core::rdp::commands::encode;

#[test]
fn test_disasm_scissor() {
    assert_eq!(
        disasm(&[scissor(0, 0, 320, 240)], false),
        "SET_SCISSOR     xy=(0.00,0.00)-(320.00,240.00)"
    );
}

#[test]
fn test_disasm_color_image() {
    assert_eq!(
        disasm(&[color_image()], false),
        "SET_COLOR_IMAGE dram=0x00100000 w=320 fmt=RGBA16"
    );
}

#[test]
fn test_disasm_other_modes() {
    let line = disasm(&[other_modes(som::CYCLE_2 | som::BLENDING | som::SAMPLE_BILINEAR)], false);
    assert_eq!(line, "SET_OTHER_MODES 2cyc blend bilinear");
}

#[test]
fn test_disasm_sync_has_no_fields() {
    assert_eq!(disasm(&[encode(SYNC_FULL, 0, 0)], false), "SYNC_FULL");
}

#[test]
fn test_disasm_texture_rectangle() {
    let command = [
        encode(TEXTURE_RECTANGLE, (16 * 4) << 12 | 8 * 4, 2 << 24),
        0x0020_0040_0400_0400,
    ];
    assert_eq!(
        disasm(&command, false),
        "TEX_RECT        tile=2 xy=(0.00,0.00)-(16.00,8.00) st=(1.00,2.00) dst=(1.0000,1.0000)"
    );
}

#[test]
fn test_disasm_triangle_payload() {
    let mut command = vec![encode(TRI_SHADE_TEX, 1 << 23 | 3 << 16, 0)];
    command.extend(std::iter::repeat(0xABCDu64).take(19));

    let short = disasm(&command, false);
    assert_eq!(short, "TRI_SHADE_TEX   left tile=3");

    let long = disasm(&command, true);
    assert_eq!(long.lines().count(), 20);
    assert!(long.lines().nth(1).is_some_and(|l| l.ends_with("0x000000000000ABCD")));
}

#[test]
fn test_disasm_unknown() {
    let line = disasm(&[encode(0x02, 0, 0x1234)], false);
    assert_eq!(line, "???             0xC200000000001234");
}

#[test]
fn test_disasm_stream_splits_commands() {
    let mut stream = vec![color_image(), scissor(0, 0, 8, 8)];
    stream.extend([encode(TEXTURE_RECTANGLE, 0, 0), 0]);
    stream.push(encode(SYNC_PIPE, 0, 0));
    let lines = disasm_stream(&stream, false);
    assert_eq!(lines.len(), 4);
    assert!(lines[2].starts_with("TEX_RECT"));
    assert_eq!(lines[3], "SYNC_PIPE");
}
