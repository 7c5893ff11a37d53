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

//! High-priority channel tests

use crate::core::config::QueueConfig;
use crate::core::consumer::{CommandLog, NullSink, RdpLog};
use crate::core::overlay::{OverlayDescriptor, OverlayId};
use crate::core::queue::Queue;
use crate::core::rdp::commands::*;
use crate::core::signal::Signals;

fn tagged_queue() -> (Queue, OverlayId) {
    let queue = Queue::with_defaults();
    let id = queue
        .overlays()
        .register(OverlayDescriptor::uniform("tag", 1, 2, 0));
    (queue, id)
}

fn tags(log: &CommandLog) -> Vec<u32> {
    log.commands().iter().map(|c| c.words[1]).collect()
}

#[test]
fn test_session_runs_before_later_normal_commands() {
    let (mut queue, id) = tagged_queue();
    let log = CommandLog::new();
    let mut coprocessor = queue.coprocessor(log.clone(), NullSink);

    queue.write(id, 0, &[1]);
    queue.write(id, 0, &[2]);
    coprocessor.run_until_idle();

    queue.highpri_begin();
    assert!(queue.in_highpri());
    queue.write(id, 0, &[10]);
    queue.write(id, 0, &[11]);
    queue.highpri_end();
    queue.write(id, 0, &[3]);

    coprocessor.run_until_idle();
    assert_eq!(tags(&log), vec![1, 2, 10, 11, 3]);
    assert!(!coprocessor.in_highpri());
    assert_eq!(queue.shared().status.highpri_pending(), 0);
    assert!(!queue.shared().status.contains(Signals::HIGHPRI_RUNNING));
}

#[test]
fn test_session_preempts_unconsumed_normal_commands() {
    let (mut queue, id) = tagged_queue();
    let log = CommandLog::new();
    let mut coprocessor = queue.coprocessor(log.clone(), NullSink);

    queue.write(id, 0, &[1]);
    queue.write(id, 0, &[2]);
    coprocessor.step();

    queue.highpri_begin();
    queue.write(id, 0, &[10]);
    queue.highpri_end();

    coprocessor.run_until_idle();
    assert_eq!(tags(&log), vec![1, 10, 2]);
}

#[test]
fn test_consumer_waits_inside_open_session() {
    let (mut queue, id) = tagged_queue();
    let log = CommandLog::new();
    let mut coprocessor = queue.coprocessor(log.clone(), NullSink);

    queue.write(id, 0, &[1]);
    queue.highpri_begin();
    coprocessor.run_until_idle();
    assert!(coprocessor.in_highpri());
    assert!(tags(&log).is_empty());

    queue.write(id, 0, &[10]);
    queue.highpri_end();
    coprocessor.run_until_idle();
    assert_eq!(tags(&log), vec![10, 1]);
}

#[test]
fn test_sessions_with_consumer_thread() {
    let config = QueueConfig {
        highpri_buffer_words: 64,
        max_command_words: 3,
        ..QueueConfig::default()
    };
    let mut queue = Queue::new(config).unwrap();
    let id = queue
        .overlays()
        .register(OverlayDescriptor::uniform("tag", 1, 2, 0));
    let log = CommandLog::new();
    queue.start(log.clone(), NullSink).unwrap();

    for session in 0..10u32 {
        queue.highpri_begin();
        for i in 0..20 {
            queue.write(id, 0, &[session * 100 + i]);
        }
        queue.highpri_end();
    }
    queue.highpri_sync();
    queue.wait();

    assert_eq!(log.len(), 200);
    assert_eq!(queue.stats().highpri_sessions, 10);
    assert!(queue.stats().buffer_switches > 0);
    queue.close();
}

#[test]
fn test_session_invalidates_sent_rdp_state() {
    let mut queue = Queue::with_defaults();
    let rdp = RdpLog::new();
    let mut coprocessor = queue.coprocessor(NullSink, rdp.clone());
    queue.rdp_init();
    queue.set_mode_standard();
    coprocessor.run_until_idle();

    queue.highpri_begin();
    queue.set_mode_fill(crate::core::rdp::Color::default());
    queue.highpri_end();

    let mark = queue.cursor();
    queue.set_mode_standard();
    assert!(queue.cursor() > mark);

    coprocessor.run_until_idle();
    let modes: Vec<u64> = rdp
        .commands()
        .iter()
        .map(|c| c[0])
        .filter(|&c| opcode(c) == SET_OTHER_MODES)
        .collect();
    assert_eq!(modes.first(), modes.last());
}

#[test]
#[should_panic(expected = "high-priority mode is already active")]
fn test_nested_session() {
    let (mut queue, _) = tagged_queue();
    queue.highpri_begin();
    queue.highpri_begin();
}

#[test]
#[should_panic(expected = "highpri_end called outside high-priority mode")]
fn test_end_without_begin() {
    let (mut queue, _) = tagged_queue();
    queue.highpri_end();
}

#[test]
#[should_panic(expected = "high-priority mode cannot start while recording a block")]
fn test_session_in_block() {
    let (mut queue, _) = tagged_queue();
    queue.block_begin();
    queue.highpri_begin();
}

#[test]
#[should_panic(expected = "highpri_sync called inside a high-priority session")]
fn test_sync_inside_session() {
    let (mut queue, _) = tagged_queue();
    queue.highpri_begin();
    queue.highpri_sync();
}
