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

//! Fixup tracking across block boundaries

use crate::core::config::QueueConfig;
use crate::core::queue::Queue;
use crate::core::rdp::commands::*;
use crate::core::rdp::{Color, Rect, RenderMode, Resources};

/// Queue whose first block chunk holds every command of a test
fn rdp_queue() -> Queue {
    let config = QueueConfig {
        block_min_words: 1024,
        ..QueueConfig::default()
    };
    let mut queue = Queue::new(config).unwrap();
    queue.rdp_init();
    queue
}

/// Opcodes of the RDP commands written from word `mark` on
fn opcodes(queue: &Queue, mark: usize) -> Vec<u8> {
    let words = queue.current_words();
    let mut out = Vec::new();
    let mut i = mark;
    while i < words.len() {
        let op = ((words[i] >> 24) & 0x3F) as u8;
        out.push(op);
        i += command_words(op);
    }
    out
}

#[test]
fn test_recording_starts_unknown() {
    let mut queue = rdp_queue();
    queue.set_mode_standard();

    queue.block_begin();
    assert_eq!(queue.autosync_state(), Resources::all());
    let mark = queue.cursor();
    // Already sent outside, but unknown inside the block
    queue.set_mode_standard();
    assert_eq!(
        opcodes(&queue, mark),
        vec![SYNC_PIPE, SET_COMBINE, SET_OTHER_MODES]
    );
    let _ = queue.block_end();

    // The recorder's own state is restored
    assert!(queue.autosync_state().is_empty());
}

#[test]
fn test_run_seeds_busy_resources() {
    let mut queue = rdp_queue();
    queue.set_mode_fill(Color::default());

    queue.block_begin();
    queue.set_fill_color(Color::new(255, 0, 0, 255));
    queue.fill_rectangle(Rect::new(0, 0, 16, 16));
    let block = queue.block_end();
    assert!(queue.autosync_state().is_empty());

    queue.block_run(&block);
    assert_eq!(queue.autosync_state(), Resources::all());

    let mark = queue.cursor();
    queue.set_fill_color(Color::default());
    assert_eq!(opcodes(&queue, mark), vec![SYNC_PIPE, SET_FILL_COLOR]);
}

#[test]
fn test_run_adopts_block_mode() {
    let mut queue = rdp_queue();
    queue.set_mode_standard();

    queue.block_begin();
    queue.set_mode_copy(false);
    let block = queue.block_end();
    assert_eq!(queue.mode(), RenderMode::standard());

    queue.block_run(&block);
    assert_eq!(queue.mode(), RenderMode::copy(false));

    // Mode and scissor encoding both already match
    let mark = queue.cursor();
    queue.set_mode_copy(false);
    assert_eq!(queue.cursor(), mark);
}

#[test]
fn test_untouched_registers_keep_invoker_state() {
    let mut queue = rdp_queue();
    queue.set_mode_standard();

    queue.block_begin();
    queue.set_prim_color(Color::new(1, 2, 3, 4));
    let block = queue.block_end();

    queue.block_run(&block);
    let mark = queue.cursor();
    queue.set_mode_standard();
    assert_eq!(queue.cursor(), mark);
}

#[test]
fn test_textured_draw_in_block_marks_every_tile() {
    let mut queue = rdp_queue();
    queue.set_mode_standard();

    queue.block_begin();
    queue.load_tile(2, 0, 0, 8, 8);
    queue.texture_rectangle(2, Rect::new(0, 0, 8, 8), 0.0, 0.0, 1.0, 1.0);
    let block = queue.block_end();

    queue.block_run(&block);
    assert!(queue.autosync_state().contains(Resources::TILES));

    // The caller may be in a two-cycle mode reading the next tile
    let mark = queue.cursor();
    queue.load_tile(3, 0, 0, 8, 8);
    assert_eq!(opcodes(&queue, mark), vec![SYNC_TILE, SYNC_LOAD, LOAD_TILE]);
}

#[test]
fn test_block_with_own_mode_marks_only_its_tile() {
    let mut queue = rdp_queue();

    queue.block_begin();
    queue.set_mode_standard();
    queue.load_tile(2, 0, 0, 8, 8);
    queue.texture_rectangle(2, Rect::new(0, 0, 8, 8), 0.0, 0.0, 1.0, 1.0);
    let block = queue.block_end();

    queue.block_run(&block);
    let busy = queue.autosync_state();
    assert!(busy.contains(Resources::tile(2)));
    assert!(!busy.contains(Resources::tile(3)));
}
