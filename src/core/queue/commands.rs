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

//! Internal command set (overlay 0)
//!
//! These commands are a private convention between the producer and the
//! consumer model; applications never write them directly.
//!
//! ```text
//! Cmd  | Name          | Words | Payload
//! -----|---------------|-------|------------------------------------------
//! 0x00 | INVALID       | 1     | (never written: zero marks an empty slot)
//! 0x01 | NOOP          | 1     | -
//! 0x02 | JUMP          | 1     | bits 23-0: physical address
//! 0x03 | CALL          | 2     | bits 23-0: address, word 1: nesting level
//! 0x04 | RET           | 1     | bits 23-0: nesting level
//! 0x05 | WRITE_STATUS  | 1     | bits 23-12: signals to clear, 11-0: to set
//! 0x06 | SWAP_BUFFERS  | 1     | -
//! 0x07 | SYNCPOINT     | 1     | -
//! 0x08 | STATE_WRITE   | 2+n   | bits 19-16: overlay, 7-0: n; word 1: offset
//! 0x09 | RDP_WAIT_IDLE | 1     | -
//! ```

use crate::core::memory::ADDRESS_MASK;
use crate::core::signal::{Signals, STATUS_FIELD_BITS};

pub const CMD_INVALID: u32 = 0x00;
pub const CMD_NOOP: u32 = 0x01;
pub const CMD_JUMP: u32 = 0x02;
pub const CMD_CALL: u32 = 0x03;
pub const CMD_RET: u32 = 0x04;
pub const CMD_WRITE_STATUS: u32 = 0x05;
pub const CMD_SWAP_BUFFERS: u32 = 0x06;
pub const CMD_SYNCPOINT: u32 = 0x07;
pub const CMD_STATE_WRITE: u32 = 0x08;
pub const CMD_RDP_WAIT_IDLE: u32 = 0x09;

/// Maximum data words carried by one STATE_WRITE
pub const STATE_WRITE_MAX_WORDS: usize = 60;

#[inline(always)]
const fn header(cmd: u32) -> u32 {
    cmd << 24
}

/// Command index of an internal header
#[inline(always)]
pub const fn command_of(word: u32) -> u32 {
    (word >> 24) & 0x0F
}

pub const fn noop() -> u32 {
    header(CMD_NOOP)
}

pub const fn jump(address: u32) -> u32 {
    header(CMD_JUMP) | (address & ADDRESS_MASK)
}

pub const fn call(address: u32, nesting_level: u32) -> [u32; 2] {
    [header(CMD_CALL) | (address & ADDRESS_MASK), nesting_level]
}

pub const fn ret(nesting_level: u32) -> u32 {
    header(CMD_RET) | (nesting_level & ADDRESS_MASK)
}

pub fn write_status(set: Signals, clear: Signals) -> u32 {
    header(CMD_WRITE_STATUS) | (clear.bits() << STATUS_FIELD_BITS) | set.bits()
}

pub const fn swap_buffers() -> u32 {
    header(CMD_SWAP_BUFFERS)
}

pub const fn syncpoint() -> u32 {
    header(CMD_SYNCPOINT)
}

pub const fn rdp_wait_idle() -> u32 {
    header(CMD_RDP_WAIT_IDLE)
}

pub const fn state_write(overlay_index: u32, count: usize) -> u32 {
    header(CMD_STATE_WRITE) | ((overlay_index & 0xF) << 16) | (count as u32 & 0xFF)
}

/// Decode the set/clear masks of a WRITE_STATUS word
pub fn status_masks(word: u32) -> (Signals, Signals) {
    let field = (1 << STATUS_FIELD_BITS) - 1;
    (
        Signals::from_bits_truncate(word & field),
        Signals::from_bits_truncate((word >> STATUS_FIELD_BITS) & field),
    )
}

/// Size in words of an internal command, from its header
pub fn command_words(word: u32) -> Option<usize> {
    match command_of(word) {
        CMD_NOOP | CMD_JUMP | CMD_RET | CMD_WRITE_STATUS | CMD_SWAP_BUFFERS | CMD_SYNCPOINT
        | CMD_RDP_WAIT_IDLE => Some(1),
        CMD_CALL => Some(2),
        CMD_STATE_WRITE => Some(2 + (word & 0xFF) as usize),
        _ => None,
    }
}

/// Mnemonic of an internal command
pub fn name(word: u32) -> &'static str {
    match command_of(word) {
        CMD_INVALID => "INVALID",
        CMD_NOOP => "NOOP",
        CMD_JUMP => "JUMP",
        CMD_CALL => "CALL",
        CMD_RET => "RET",
        CMD_WRITE_STATUS => "WRITE_STATUS",
        CMD_SWAP_BUFFERS => "SWAP_BUFFERS",
        CMD_SYNCPOINT => "SYNCPOINT",
        CMD_STATE_WRITE => "STATE_WRITE",
        CMD_RDP_WAIT_IDLE => "RDP_WAIT_IDLE",
        _ => "UNKNOWN",
    }
}
