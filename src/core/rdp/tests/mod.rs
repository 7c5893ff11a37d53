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

//! Fixup layer tests
//!
//! Commands are read back from the normal segment without a consumer, so
//! each test stays well inside one segment.

mod autosync;

use super::commands;
use crate::core::queue::Queue;

/// Queue with the RDP overlay registered
pub(super) fn rdp_queue() -> Queue {
    let mut queue = Queue::with_defaults();
    queue.rdp_init();
    queue
}

/// First word of every RDP command written from word `mark` on
pub(super) fn emitted(queue: &Queue, mark: usize) -> Vec<u64> {
    let words = queue.current_words();
    let mut out = Vec::new();
    let mut i = mark;
    while i + 1 < words.len() {
        let opcode = ((words[i] >> 24) & 0x3F) as u8;
        out.push(((words[i] as u64) << 32) | words[i + 1] as u64);
        i += commands::command_words(opcode);
    }
    out
}

/// Opcodes written from word `mark` on
pub(super) fn opcodes(queue: &Queue, mark: usize) -> Vec<u8> {
    emitted(queue, mark)
        .into_iter()
        .map(commands::opcode)
        .collect()
}
