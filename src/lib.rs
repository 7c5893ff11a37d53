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

//! Command queue engine for a coprocessor-driven graphics pipeline
//!
//! A producer appends variable-length commands to double-buffered rings
//! that a coprocessor drains concurrently. On top of the ring sit
//! pre-recorded blocks, syncpoints, a high-priority channel and a fixup
//! layer for the RDP rasterizer that inserts hazard syncs and tracks the
//! render mode.
//!
//! # Example
//!
//! ```
//! use rcpq::core::consumer::{NullSink, RdpLog};
//! use rcpq::core::queue::Queue;
//! use rcpq::core::rdp::{Color, Rect};
//!
//! let mut queue = Queue::with_defaults();
//! let rdp = RdpLog::new();
//! let mut coprocessor = queue.coprocessor(NullSink, rdp.clone());
//!
//! queue.rdp_init();
//! queue.set_mode_fill(Color::new(255, 0, 0, 255));
//! queue.fill_rectangle(Rect::new(0, 0, 8, 8));
//! queue.flush();
//! coprocessor.run_until_idle();
//!
//! assert!(!rdp.is_empty());
//! ```

pub mod core;
