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

//! Core queue components
//!
//! This module contains every part of the command queue engine:
//! - Segment memory and the 24-bit address adapter
//! - Status register shared with the consumer
//! - Queue context, ring writer and overlay registry
//! - Block recorder, syncpoints and the high-priority channel
//! - Simulated coprocessor (consumer)
//! - RDP fixup layer, stream validator and trace capture

pub mod block;
pub mod config;
pub mod consumer;
pub mod error;
pub mod highpri;
pub mod memory;
pub mod overlay;
pub mod queue;
pub mod rdp;
pub mod signal;
pub mod syncpoint;
pub mod trace;
pub mod validate;

// Re-export commonly used types
pub use block::Block;
pub use config::{QueueConfig, RdpConfig};
pub use consumer::{CommandSink, Coprocessor, RdpSink};
pub use error::{ProtocolViolation, QueueError, Result};
pub use overlay::{OverlayDescriptor, OverlayId};
pub use queue::Queue;
pub use syncpoint::Syncpoint;
pub use trace::{Trace, TraceRecorder};
pub use validate::{Report, Severity, Validator};
