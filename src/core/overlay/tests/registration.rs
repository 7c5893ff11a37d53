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

//! Registration and lookup tests

use super::super::*;

fn overlay(name: &str, commands: usize) -> OverlayDescriptor {
    OverlayDescriptor::uniform(name, commands, 2, 4)
}

#[test]
fn test_overlay_id_encoding() {
    let id = OverlayId::from_index(6);
    assert_eq!(id.raw(), 0x6000_0000);
    assert_eq!(id.index(), 6);
    assert_eq!(id.to_string(), "0x6");
    assert_eq!(OverlayId::INTERNAL.raw(), 0);
}

#[test]
fn test_units_round_up() {
    assert_eq!(overlay("a", 0).units(), 1);
    assert_eq!(overlay("b", 16).units(), 1);
    assert_eq!(overlay("c", 17).units(), 2);
    assert_eq!(overlay("d", 64).units(), 4);
}

#[test]
fn test_first_registration_skips_internal_id() {
    let registry = OverlayRegistry::new();
    let id = registry.register(overlay("first", 3));
    assert_eq!(id.index(), 1);
    assert_eq!(registry.free_ids(), 14);
}

#[test]
fn test_multi_unit_overlay_gets_consecutive_ids() {
    let registry = OverlayRegistry::new();
    let wide = registry.register(overlay("wide", 20));
    let narrow = registry.register(overlay("narrow", 1));

    assert_eq!(wide.index(), 1);
    assert_eq!(narrow.index(), 3);

    let upper = registry.lookup(2).unwrap();
    assert_eq!(upper.id, wide);
    assert_eq!(upper.descriptor.name(), "wide");
}

#[test]
fn test_unregister_recycles_range() {
    let registry = OverlayRegistry::new();
    let a = registry.register(overlay("a", 1));
    let _b = registry.register(overlay("b", 1));
    registry.unregister(a);
    assert!(registry.lookup(a.index()).is_none());

    let c = registry.register(overlay("c", 1));
    assert_eq!(c, a);
}

#[test]
fn test_dynamic_registration_finds_gap_large_enough() {
    let registry = OverlayRegistry::new();
    let a = registry.register(overlay("a", 1)); // ID 1
    let _b = registry.register(overlay("b", 1)); // ID 2
    registry.unregister(a);

    // A two-ID overlay does not fit in the single free ID 1
    let wide = registry.register(overlay("wide", 32));
    assert_eq!(wide.index(), 3);
}

#[test]
fn test_static_registration() {
    let registry = OverlayRegistry::new();
    let id = registry.register_static(overlay("rdp", 64), OverlayId::from_index(0xC));
    assert_eq!(id.index(), 0xC);
    for index in 0xC..=0xF {
        assert_eq!(registry.lookup(index).unwrap().id, id);
    }

    // Dynamic registration never lands inside the static range
    let other = registry.register(overlay("other", 1));
    assert_eq!(other.index(), 1);
}

#[test]
fn test_state_starts_zeroed() {
    let registry = OverlayRegistry::new();
    let id = registry.register(OverlayDescriptor::new("stateful", 8).command(1));
    let entry = registry.lookup(id.index()).unwrap();
    assert_eq!(*entry.state(), vec![0; 8]);
    assert_eq!(registry.find("stateful"), Some(id));
}
