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

//! Validator, disassembler and input tests

mod disasm;

use super::*;
use crate::core::rdp::commands::{encode, SET_COLOR_IMAGE, SET_OTHER_MODES, SET_SCISSOR};

/// SET_COLOR_IMAGE for a 320 pixel wide RGBA16 target
pub(super) fn color_image() -> u64 {
    encode(SET_COLOR_IMAGE, 2 << 19 | 319, 0x0010_0000)
}

pub(super) fn scissor(x0: u32, y0: u32, x1: u32, y1: u32) -> u64 {
    encode(SET_SCISSOR, (x0 * 4) << 12 | y0 * 4, (x1 * 4) << 12 | y1 * 4)
}

pub(super) fn other_modes(bits: u64) -> u64 {
    encode(SET_OTHER_MODES, (bits >> 32) as u32, bits as u32)
}

/// Messages of a report, in order
pub(super) fn messages(report: &Report) -> Vec<String> {
    report
        .diagnostics
        .iter()
        .map(|d| d.message.clone())
        .collect()
}
