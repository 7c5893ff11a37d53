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

//! Arena allocation and address adapter tests

use super::super::*;

#[test]
fn test_address_round_trip() {
    let address = physical_address(5, 0x123);
    assert_eq!(address, (5 << 13) | 0x123);
    assert_eq!(split_address(address), (5, 0x123));
}

#[test]
fn test_address_ignores_command_bits() {
    // The top byte of a JUMP word carries the command, not the address
    let word = 0x0200_0000 | physical_address(3, 7);
    assert_eq!(split_address(word), (3, 7));
}

#[test]
fn test_slot_zero_is_never_allocated() {
    let arena = SegmentArena::new();
    let first = arena.alloc(16);
    assert_eq!(first.slot(), 1);
    assert!(arena.resolve(0).is_none());
}

#[test]
fn test_resolve_live_segment() {
    let arena = SegmentArena::new();
    let seg = arena.alloc(32);
    seg.store(4, 0xDEAD_BEEF);
    seg.publish(3, 0x0100_0000);

    let (resolved, offset) = arena.resolve(seg.address(3)).unwrap();
    assert_eq!(offset, 3);
    assert_eq!(resolved.load(3), 0x0100_0000);
    assert_eq!(resolved.load(4), 0xDEAD_BEEF);
}

#[test]
fn test_resolve_rejects_out_of_range_offset() {
    let arena = SegmentArena::new();
    let seg = arena.alloc(8);
    assert!(arena.resolve(seg.address(8)).is_none());
}

#[test]
fn test_release_unmaps_and_recycles() {
    let arena = SegmentArena::new();
    let a = arena.alloc(8);
    let _b = arena.alloc(8);
    assert_eq!(arena.live(), 2);

    let address = a.address(0);
    arena.release(&a);
    assert!(arena.resolve(address).is_none());
    assert_eq!(arena.live(), 1);

    let c = arena.alloc(8);
    assert_eq!(c.slot(), a.slot());
}

#[test]
fn test_double_release_is_ignored() {
    let arena = SegmentArena::new();
    let a = arena.alloc(8);
    arena.release(&a);
    let b = arena.alloc(8);
    // A stale handle must not unmap the slot's new owner
    arena.release(&a);
    assert!(arena.resolve(b.address(0)).is_some());
}
