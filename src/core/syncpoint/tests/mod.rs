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

//! Syncpoint and deferred callback tests

use super::*;
use crate::core::consumer::NullSink;
use std::sync::{Arc, Mutex};

#[test]
fn test_reached_by_wraps() {
    assert!(Syncpoint(5).reached_by(5));
    assert!(Syncpoint(5).reached_by(6));
    assert!(!Syncpoint(6).reached_by(5));
    assert!(!Syncpoint(1).reached_by(u32::MAX));
    assert!(Syncpoint(u32::MAX).reached_by(1));
}

#[test]
fn test_ids_increase_and_are_reached_in_order() {
    let mut queue = Queue::with_defaults();
    let mut coprocessor = queue.coprocessor(NullSink, NullSink);

    let first = queue.syncpoint_new();
    let second = queue.syncpoint_new();
    assert!(second.id() > first.id());
    assert!(!queue.syncpoint_check(first));

    assert_eq!(coprocessor.step(), crate::core::consumer::Step::Executed);
    assert!(queue.syncpoint_check(first));
    assert!(!queue.syncpoint_check(second));

    coprocessor.run_until_idle();
    assert!(queue.syncpoint_check(first));
    assert!(queue.syncpoint_check(second));
    assert_eq!(queue.stats().syncpoints, 2);
}

#[test]
fn test_deferred_callbacks_run_one_per_poll() {
    let mut queue = Queue::with_defaults();
    let mut coprocessor = queue.coprocessor(NullSink, NullSink);
    let order = Arc::new(Mutex::new(Vec::new()));

    for tag in 0..2 {
        let order = Arc::clone(&order);
        queue.call_deferred(move || order.lock().unwrap().push(tag));
    }
    assert_eq!(queue.deferred_pending(), 2);
    assert!(!queue.poll_deferred());

    coprocessor.run_until_idle();
    assert!(queue.poll_deferred());
    assert_eq!(*order.lock().unwrap(), vec![0]);
    assert!(queue.poll_deferred());
    assert!(!queue.poll_deferred());
    assert_eq!(*order.lock().unwrap(), vec![0, 1]);
    assert_eq!(queue.deferred_pending(), 0);
}

#[test]
fn test_callback_waits_for_its_own_syncpoint() {
    let mut queue = Queue::with_defaults();
    let mut coprocessor = queue.coprocessor(NullSink, NullSink);
    let ran = Arc::new(Mutex::new(false));

    queue.syncpoint_new();
    let flag = Arc::clone(&ran);
    queue.syncpoint_new_cb(move || *flag.lock().unwrap() = true);

    coprocessor.step();
    assert!(!queue.poll_deferred());
    coprocessor.step();
    assert!(queue.poll_deferred());
    assert!(*ran.lock().unwrap());
}

#[test]
fn test_wait_with_consumer_thread() {
    let mut queue = Queue::with_defaults();
    queue.start(NullSink, NullSink).unwrap();
    let count = Arc::new(Mutex::new(0));

    for _ in 0..3 {
        let count = Arc::clone(&count);
        queue.call_deferred(move || *count.lock().unwrap() += 1);
    }
    queue.wait();

    assert_eq!(*count.lock().unwrap(), 3);
    queue.close();
}

#[test]
#[should_panic(expected = "cannot create a syncpoint while recording a block")]
fn test_syncpoint_in_block() {
    let mut queue = Queue::with_defaults();
    queue.block_begin();
    queue.syncpoint_new();
}

#[test]
#[should_panic(expected = "cannot wait while recording a block")]
fn test_wait_in_block() {
    let mut queue = Queue::with_defaults();
    queue.block_begin();
    queue.wait();
}

#[test]
#[should_panic(expected = "cannot create a syncpoint in high-priority mode")]
fn test_syncpoint_in_high_priority() {
    let mut queue = Queue::with_defaults();
    queue.highpri_begin();
    queue.syncpoint_new();
}

#[test]
#[should_panic(expected = "deadlock: blocking wait with no consumer attached")]
fn test_wait_without_consumer() {
    let mut queue = Queue::with_defaults();
    let syncpoint = queue.syncpoint_new();
    queue.syncpoint_wait(syncpoint);
}
