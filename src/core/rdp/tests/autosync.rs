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

//! Autosync tests

use super::super::commands::*;
use super::super::*;
use super::{emitted, opcodes, rdp_queue};
use crate::core::config::RdpConfig;

fn tile_params() -> TileParams {
    TileParams::new(TexFormat::Rgba16, 4, 0)
}

#[test]
fn test_init_leaves_nothing_busy() {
    let queue = rdp_queue();
    assert!(queue.autosync_state().is_empty());
    assert_eq!(opcodes(&queue, 0), vec![SET_COLOR_IMAGE, SET_SCISSOR]);
}

#[test]
fn test_single_sync_tile_between_change_and_use() {
    let mut queue = rdp_queue();
    let mark = queue.cursor();

    queue.set_tile(3, &tile_params());
    queue.texture_rectangle(3, Rect::new(0, 0, 16, 16), 0.0, 0.0, 1.0, 1.0);
    queue.set_tile(3, &tile_params());

    assert_eq!(
        opcodes(&queue, mark),
        vec![SET_TILE, TEXTURE_RECTANGLE, SYNC_TILE, SET_TILE]
    );
}

#[test]
fn test_change_of_idle_resource_needs_no_sync() {
    let mut queue = rdp_queue();
    let mark = queue.cursor();

    queue.set_tile(3, &tile_params());
    queue.texture_rectangle(3, Rect::new(0, 0, 16, 16), 0.0, 0.0, 1.0, 1.0);
    queue.set_tile(4, &tile_params());

    assert_eq!(
        opcodes(&queue, mark),
        vec![SET_TILE, TEXTURE_RECTANGLE, SET_TILE]
    );
}

#[test]
fn test_pipe_sync_after_draw() {
    let mut queue = rdp_queue();
    queue.set_mode_fill(Color::new(255, 0, 0, 255));
    let mark = queue.cursor();

    queue.fill_rectangle(Rect::new(0, 0, 32, 32));
    queue.set_fill_color(Color::new(0, 255, 0, 255));
    queue.set_fill_color(Color::new(0, 0, 255, 255));

    // Only the first change after the draw is synced
    assert_eq!(
        opcodes(&queue, mark),
        vec![FILL_RECTANGLE, SYNC_PIPE, SET_FILL_COLOR, SET_FILL_COLOR]
    );
    assert!(queue.autosync_state().is_empty());
}

#[test]
fn test_load_syncs_tmem_and_tile() {
    let mut queue = rdp_queue();
    queue.load_tile(0, 0, 0, 8, 8);
    queue.texture_rectangle(0, Rect::new(0, 0, 8, 8), 0.0, 0.0, 1.0, 1.0);
    let mark = queue.cursor();

    queue.load_tile(0, 0, 0, 8, 8);
    assert_eq!(opcodes(&queue, mark), vec![SYNC_TILE, SYNC_LOAD, LOAD_TILE]);
}

#[test]
fn test_prim_color_is_untracked() {
    let mut queue = rdp_queue();
    queue.fill_rectangle(Rect::new(0, 0, 4, 4));
    let mark = queue.cursor();

    queue.set_prim_color(Color::new(1, 2, 3, 4));
    assert_eq!(opcodes(&queue, mark), vec![SET_PRIM_COLOR]);
    assert!(queue.autosync_state().contains(Resources::PIPE));
}

#[test]
fn test_disabled_class_stays_busy() {
    let mut queue = rdp_queue();
    let previous = queue.rdp_config_disable(RdpConfig::AUTOSYNC_PIPE);
    assert_eq!(previous, RdpConfig::all());

    queue.fill_rectangle(Rect::new(0, 0, 4, 4));
    let mark = queue.cursor();
    queue.set_fill_color(Color::default());

    assert_eq!(opcodes(&queue, mark), vec![SET_FILL_COLOR]);
    assert!(queue.autosync_state().contains(Resources::PIPE));
}

#[test]
fn test_explicit_sync_clears_class() {
    let mut queue = rdp_queue();
    queue.load_tile(2, 0, 0, 8, 8);
    assert!(queue.autosync_state().contains(Resources::tile(2)));

    queue.sync_tile();
    assert!(queue.autosync_state().is_empty());

    queue.fill_rectangle(Rect::new(0, 0, 4, 4));
    queue.load_tile(2, 0, 0, 8, 8);
    queue.sync_full();
    assert!(queue.autosync_state().is_empty());
}

#[test]
fn test_mipmapped_draw_marks_every_tile() {
    let mut queue = rdp_queue();
    queue.mode_mipmap(Mipmap::Nearest, 4);
    queue.texture_rectangle(1, Rect::new(0, 0, 8, 8), 0.0, 0.0, 1.0, 1.0);
    assert!(queue.autosync_state().contains(Resources::TILES));
}

#[test]
fn test_textured_triangle_marks_all_tmem() {
    let mut queue = rdp_queue();
    let mut words = vec![0u64; command_words(TRI_SHADE_TEX) / 2];
    words[0] = encode(TRI_SHADE_TEX, 5 << 16, 0);
    queue.triangle(&words);

    let busy = queue.autosync_state();
    assert!(busy.contains(Resources::PIPE | Resources::tile(5) | Resources::TMEMS));
    assert!(!busy.contains(Resources::tile(4)));
}

#[test]
fn test_textured_triangle_tile_comes_from_command() {
    let mut queue = rdp_queue();
    let mark = queue.cursor();
    let mut words = vec![0u64; command_words(TRI_TEX) / 2];
    words[0] = encode(TRI_TEX, 0, 0);

    queue.set_tile(0, &tile_params());
    queue.triangle(&words);
    queue.set_tile(0, &tile_params());

    assert_eq!(
        opcodes(&queue, mark),
        vec![SET_TILE, TRI_TEX, SYNC_TILE, SET_TILE]
    );
}

#[test]
fn test_untextured_triangle_leaves_tiles_idle() {
    let mut queue = rdp_queue();
    let mut words = vec![0u64; command_words(TRI_SHADE) / 2];
    words[0] = encode(TRI_SHADE, 3 << 16, 0);
    queue.triangle(&words);

    assert_eq!(queue.autosync_state(), Resources::PIPE);
}

#[test]
fn test_full_palette_load_clamps_last_entry() {
    let mut queue = rdp_queue();
    let mark = queue.cursor();
    queue.load_tlut(1, 16, u16::MAX);

    let load = emitted(&queue, mark)[0];
    assert_eq!(opcode(load), LOAD_TLUT);
    assert_eq!((load >> 12) & 0xFFF, 255 * 4);
    assert_eq!((load >> 44) & 0xFFF, 16 * 4);
}

#[test]
#[should_panic(expected = "invalid tile index 8")]
fn test_invalid_tile() {
    let mut queue = rdp_queue();
    queue.set_tile(8, &tile_params());
}

#[test]
#[should_panic(expected = "invalid RDP command size")]
fn test_triangle_size_checked() {
    let mut queue = rdp_queue();
    queue.triangle(&[encode(TRI_FILL, 0, 0)]);
}

#[test]
#[should_panic(expected = "RDP overlay is not initialized")]
fn test_rdp_before_init() {
    let mut queue = crate::core::queue::Queue::with_defaults();
    queue.sync_pipe();
}
