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

//! Property tests for stream integrity, ordering and autosync

mod common;

use common::assertions::{assert_clean, assert_command_intact, assert_payloads};
use common::fixtures::{
    manual_queue, register_sized_overlay, textured_scene_setup, threaded_queue, SIZES,
};
use proptest::prelude::*;
use rcpq::core::config::QueueConfig;
use rcpq::core::overlay::OverlayDescriptor;
use rcpq::core::queue::Queue;
use rcpq::core::rdp::commands::{self, SET_COLOR_IMAGE, SET_COMBINE, SET_OTHER_MODES, TRI_TEX};
use rcpq::core::rdp::{
    slot, Color, Combiner, Filter, Mipmap, Rect, Surface, TexFormat, TileParams,
};
use rcpq::core::validate::validate_stream;
use rcpq::core::Block;

/// Texture sampled in the first cycle, passed through in the second
const TEX_TWO_CYCLE: Combiner = Combiner::two_pass(
    (
        [slot::ZERO_SUB, slot::ZERO_SUB, slot::ZERO_MUL, slot::TEX0],
        [slot::ALPHA_ZERO, slot::ALPHA_ZERO, slot::ALPHA_ZERO, slot::TEX0],
    ),
    (
        [slot::ZERO_SUB, slot::ZERO_SUB, slot::ZERO_MUL, slot::COMBINED],
        [slot::ALPHA_ZERO, slot::ALPHA_ZERO, slot::ALPHA_ZERO, slot::COMBINED],
    ),
);

/// Producer-side operation touching the autosync resources
#[derive(Debug, Clone)]
enum RdpOp {
    SetTile(u8),
    LoadTile(u8),
    LoadBlock(u8),
    /// Palette tile (4-7, upper TMEM half), first entry, entry count
    LoadTlut(u8, u8, u16),
    TexRect(u8),
    TexTriangle(u8),
    PrimColor(u8),
    Filter(bool),
    TwoCycle(bool),
    Mipmap(bool),
    FillBar,
    /// Replay the pre-recorded load-and-draw block of a tile
    BlockRun(u8),
    /// High-priority session loading and drawing a tile, then a fill bar
    Highpri(u8),
}

fn rdp_op() -> impl Strategy<Value = RdpOp> {
    prop_oneof![
        (0..8u8).prop_map(RdpOp::SetTile),
        (0..8u8).prop_map(RdpOp::LoadTile),
        (0..8u8).prop_map(RdpOp::LoadBlock),
        (4..8u8, any::<u8>(), any::<u16>()).prop_map(|(t, f, n)| RdpOp::LoadTlut(t, f, n)),
        (0..8u8).prop_map(RdpOp::TexRect),
        (0..8u8).prop_map(RdpOp::TexTriangle),
        any::<u8>().prop_map(RdpOp::PrimColor),
        any::<bool>().prop_map(RdpOp::Filter),
        any::<bool>().prop_map(RdpOp::TwoCycle),
        any::<bool>().prop_map(RdpOp::Mipmap),
        Just(RdpOp::FillBar),
        (0..8u8).prop_map(RdpOp::BlockRun),
        (0..8u8).prop_map(RdpOp::Highpri),
    ]
}

fn draw_tile(queue: &mut Queue, tile: u8, y: u16) {
    let x = u16::from(tile) * 20;
    queue.texture_rectangle(tile, Rect::new(x, y, x + 16, y + 16), 0.0, 0.0, 1.0, 1.0);
}

fn fill_bar(queue: &mut Queue) {
    queue.mode_push();
    queue.set_mode_fill(Color::new(0, 0, 0, 255));
    queue.fill_rectangle(Rect::new(0, 200, 320, 208));
    queue.mode_pop();
}

/// One block per tile, each loading the tile and drawing with it
fn record_tile_blocks(queue: &mut Queue) -> Vec<Block> {
    (0..8u8)
        .map(|tile| {
            queue.block_begin();
            queue.load_tile(tile, 0, 0, 16, 16);
            draw_tile(queue, tile, 100);
            queue.block_end()
        })
        .collect()
}

fn apply(queue: &mut Queue, blocks: &[Block], op: RdpOp) {
    match op {
        RdpOp::SetTile(tile) => {
            let tmem = u16::from(tile) * 0x40;
            queue.set_tile(tile, &TileParams::new(TexFormat::Rgba16, 4, tmem));
        }
        RdpOp::LoadTile(tile) => queue.load_tile(tile, 0, 0, 16, 16),
        RdpOp::LoadBlock(tile) => queue.load_block(tile, 0, 0, 256, 0x200),
        RdpOp::LoadTlut(tile, first, count) => queue.load_tlut(tile, first, count),
        RdpOp::TexRect(tile) => draw_tile(queue, tile, 0),
        RdpOp::TexTriangle(tile) => {
            let mut words = vec![0u64; commands::command_words(TRI_TEX) / 2];
            words[0] = commands::encode(TRI_TEX, u32::from(tile) << 16, 0);
            queue.triangle(&words);
        }
        RdpOp::PrimColor(level) => queue.set_prim_color(Color::new(level, level, level, 255)),
        RdpOp::Filter(bilinear) => {
            queue.mode_filter(if bilinear { Filter::Bilinear } else { Filter::Point })
        }
        RdpOp::TwoCycle(on) => queue.mode_combiner(if on { TEX_TWO_CYCLE } else { Combiner::TEX }),
        RdpOp::Mipmap(on) => queue.mode_mipmap(if on { Mipmap::Nearest } else { Mipmap::None }, 4),
        RdpOp::FillBar => fill_bar(queue),
        RdpOp::BlockRun(tile) => queue.block_run(&blocks[usize::from(tile)]),
        RdpOp::Highpri(tile) => {
            queue.highpri_begin();
            queue.load_tile(tile, 0, 0, 16, 16);
            draw_tile(queue, tile, 40);
            fill_bar(queue);
            queue.highpri_end();
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_commands_arrive_intact(indices in prop::collection::vec(0..SIZES.len(), 1..200)) {
        let config = QueueConfig {
            lowpri_buffer_words: 256,
            ..QueueConfig::default()
        };
        let (mut queue, log) = threaded_queue(config);
        let id = register_sized_overlay(&queue);

        for (seq, &index) in indices.iter().enumerate() {
            let seq = seq as u32;
            let words = SIZES[index];
            let args: Vec<u32> = (1..words as u32).map(|i| seq << 8 | i).collect();
            queue
                .write_begin(id, index as u32, words)
                .payload(seq)
                .args(&args)
                .end();
        }
        queue.wait();

        let logged = log.commands();
        prop_assert_eq!(logged.len(), indices.len());
        for (seq, (command, &index)) in logged.iter().zip(&indices).enumerate() {
            prop_assert_eq!(command.command, index as u32);
            assert_command_intact(command, seq as u32, SIZES[index]);
        }
        queue.close();
    }

    #[test]
    fn prop_autosync_stream_needs_no_extra_syncs(ops in prop::collection::vec(rdp_op(), 1..48)) {
        let (mut queue, mut coprocessor, _, rdp) = manual_queue(QueueConfig::default());
        textured_scene_setup(&mut queue);
        let blocks = record_tile_blocks(&mut queue);

        for op in ops {
            apply(&mut queue, &blocks, op);
            coprocessor.run_until_idle();
        }

        let stream = rdp.stream();
        assert_clean(&validate_stream(&stream), &stream);
    }

    #[test]
    fn prop_syncpoints_complete_in_order(
        plan in prop::collection::vec((0..4usize, 0..6usize), 1..24)
    ) {
        let (mut queue, mut coprocessor, _, _) = manual_queue(QueueConfig::default());
        let id = queue
            .overlays()
            .register(OverlayDescriptor::uniform("steps", 16, 1, 0));

        let mut created = Vec::new();
        for (writes, steps) in plan {
            for _ in 0..writes {
                queue.write(id, 0, &[]);
            }
            created.push(queue.syncpoint_new());
            queue.flush();
            for _ in 0..steps {
                coprocessor.step();
            }

            let reached: Vec<bool> = created.iter().map(|&s| queue.syncpoint_check(s)).collect();
            // Once a syncpoint is reached, every earlier one is too
            if let Some(last) = reached.iter().rposition(|&r| r) {
                prop_assert!(reached[..=last].iter().all(|&r| r));
            }
        }

        coprocessor.run_until_idle();
        for pair in created.windows(2) {
            prop_assert!(pair[0].id() < pair[1].id());
        }
        prop_assert!(created.iter().all(|&s| queue.syncpoint_check(s)));
    }
}

#[test]
fn test_block_replay_repeats_contents() {
    let (mut queue, mut coprocessor, log, _) = manual_queue(QueueConfig::default());
    let id = queue
        .overlays()
        .register(OverlayDescriptor::uniform("replay", 16, 1, 0));

    queue.block_begin();
    for i in 0..3 {
        queue.write_with_payload(id, 0, i, &[]);
    }
    let inner = queue.block_end();

    queue.block_begin();
    queue.write_with_payload(id, 0, 100, &[]);
    queue.block_run(&inner);
    queue.write_with_payload(id, 0, 101, &[]);
    let outer = queue.block_end();
    assert_eq!(outer.nesting_level(), inner.nesting_level() + 1);

    let mut expected = Vec::new();
    for k in 0..5 {
        queue.write_with_payload(id, 0, 200 + k, &[]);
        queue.block_run(&outer);
        expected.push(200 + k);
        expected.extend([100, 0, 1, 2, 101]);
    }
    coprocessor.run_until_idle();

    assert_payloads(&log.commands(), &expected);
}

#[test]
fn test_block_spanning_chunks_replays_in_order() {
    let config = QueueConfig {
        block_min_words: 70,
        block_max_words: 140,
        ..QueueConfig::default()
    };
    let (mut queue, mut coprocessor, log, _) = manual_queue(config);
    let id = queue
        .overlays()
        .register(OverlayDescriptor::uniform("long", 16, 4, 0));

    queue.block_begin();
    for i in 0..200 {
        queue.write_with_payload(id, 0, i, &[i, i, i]);
    }
    let block = queue.block_end();
    assert!(block.chunk_count() > 2);

    queue.block_run(&block);
    queue.block_run(&block);
    coprocessor.run_until_idle();

    let once: Vec<u32> = (0..200).collect();
    let twice: Vec<u32> = once.iter().chain(&once).copied().collect();
    assert_payloads(&log.commands(), &twice);
}

#[test]
fn test_repeated_setters_emit_once() {
    let (mut queue, mut coprocessor, _, rdp) = manual_queue(QueueConfig::default());
    let target = Surface::new(TexFormat::Rgba16, 320, 240, 0x0010_0000);
    queue.rdp_init();
    for _ in 0..3 {
        queue.set_color_image(Some(&target));
        queue.set_mode_standard();
        queue.mode_combiner(Combiner::SHADE);
    }
    coprocessor.run_until_idle();

    let count = |opcode| {
        rdp.stream()
            .iter()
            .filter(|&&c| commands::opcode(c) == opcode)
            .count()
    };
    assert_eq!(count(SET_COLOR_IMAGE), 1);
    assert_eq!(count(SET_OTHER_MODES), 1);
    assert_eq!(count(SET_COMBINE), 1);
}

#[test]
fn test_highpri_sessions_run_whole_and_in_order() {
    let (mut queue, mut coprocessor, log, _) = manual_queue(QueueConfig::default());
    let id = queue
        .overlays()
        .register(OverlayDescriptor::uniform("prio", 16, 1, 0));

    for i in 0..4 {
        queue.write_with_payload(id, 0, i, &[]);
    }
    queue.flush();
    coprocessor.step();
    coprocessor.step();

    for session in 0..2u32 {
        queue.highpri_begin();
        for i in 0..3 {
            queue.write_with_payload(id, 0, 10 * (session + 1) + i, &[]);
        }
        queue.highpri_end();
    }
    queue.write_with_payload(id, 0, 4, &[]);
    coprocessor.run_until_idle();

    assert_payloads(&log.commands(), &[0, 1, 10, 11, 12, 20, 21, 22, 2, 3, 4]);
}
