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

//! Test fixtures for common test scenarios

use rcpq::core::config::QueueConfig;
use rcpq::core::consumer::{CommandLog, Coprocessor, NullSink, RdpLog};
use rcpq::core::overlay::{OverlayDescriptor, OverlayId};
use rcpq::core::queue::Queue;
use rcpq::core::rdp::{Combiner, Surface, TexFormat, TileParams};

/// Command sizes of the overlay registered by [`register_sized_overlay`]
#[allow(dead_code)]
pub const SIZES: [usize; 16] = [1, 2, 3, 4, 6, 8, 12, 16, 20, 24, 31, 40, 48, 56, 61, 62];

/// Queue whose normal segments hold 64 words with the sentinel at word 60
#[allow(dead_code)]
pub fn small_queue() -> Queue {
    let config = QueueConfig {
        lowpri_buffer_words: 64,
        max_command_words: 3,
        ..QueueConfig::default()
    };
    Queue::new(config).expect("small config is valid")
}

/// Queue with a manually stepped consumer logging everything
#[allow(dead_code)]
pub fn manual_queue(config: QueueConfig) -> (Queue, Coprocessor, CommandLog, RdpLog) {
    let queue = Queue::new(config).expect("config is valid");
    let log = CommandLog::new();
    let rdp = RdpLog::new();
    let coprocessor = queue.coprocessor(log.clone(), rdp.clone());
    (queue, coprocessor, log, rdp)
}

/// Queue with a consumer thread logging overlay commands
#[allow(dead_code)]
pub fn threaded_queue(config: QueueConfig) -> (Queue, CommandLog) {
    let mut queue = Queue::new(config).expect("config is valid");
    let log = CommandLog::new();
    queue
        .start(log.clone(), NullSink)
        .expect("consumer thread starts");
    (queue, log)
}

/// Register an overlay whose command `i` is `SIZES[i]` words long
#[allow(dead_code)]
pub fn register_sized_overlay(queue: &Queue) -> OverlayId {
    let descriptor = SIZES
        .iter()
        .fold(OverlayDescriptor::new("sized", 0), |desc, &words| {
            desc.command(words)
        });
    queue.overlays().register(descriptor)
}

/// Attach a 320x240 target and a one-cycle textured mode with every tile
/// configured
#[allow(dead_code)]
pub fn textured_scene_setup(queue: &mut Queue) {
    queue.rdp_init();
    let target = Surface::new(TexFormat::Rgba16, 320, 240, 0x0010_0000);
    let texture = Surface::new(TexFormat::Rgba16, 16, 16, 0x0030_0000);
    queue.set_color_image(Some(&target));
    queue.set_mode_standard();
    queue.mode_combiner(Combiner::TEX);
    queue.set_texture_image(&texture);
    for tile in 0..8u8 {
        let tmem = u16::from(tile) * 0x40;
        queue.set_tile(tile, &TileParams::new(TexFormat::Rgba16, 4, tmem));
    }
}
