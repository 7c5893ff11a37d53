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

//! Queue context
//!
//! [`Queue`] is the producer side of the command stream. It owns:
//!
//! - the normal-priority ring (two segments used alternately)
//! - the high-priority ring (same mechanics, never alternated with the
//!   normal pair)
//! - the block recording session, if any
//! - the syncpoint generator and deferred callback list
//! - the fixup layer's mirrored RDP state
//!
//! Everything the consumer needs to see lives in [`Shared`], behind an
//! `Arc`. The producer is single threaded: every operation takes
//! `&mut self`, so none of the producer-side state needs a lock.
//!
//! # Write Target Selection
//!
//! ```text
//! recording a block?  -> current block chunk
//! high priority?      -> high-priority ring
//! otherwise           -> normal ring
//! ```
//!
//! # Buffer Switch
//!
//! Before every command the cursor is compared to the target's sentinel.
//! Past it, a live ring:
//!
//! 1. waits until the consumer has left the other segment (BUFDONE signal)
//! 2. lowers the signal and zero-fills the other segment
//! 3. terminates the current segment with JUMP(other)
//! 4. opens the other segment with WRITE_STATUS(set BUFDONE)
//!
//! Step 4 runs in the new segment, so the signal is raised only once the
//! consumer has really left the old one.

pub mod commands;
mod ring;
mod writer;

#[cfg(test)]
mod tests;

pub use writer::CommandWriter;

pub(crate) use ring::{RingBuffer, WriteTarget};

use crate::core::block::BlockRecording;
use crate::core::config::QueueConfig;
use crate::core::consumer::{CommandSink, Coprocessor, RdpSink};
use crate::core::error::{fatal, ProtocolViolation, Result};
use crate::core::memory::SegmentArena;
use crate::core::overlay::{OverlayId, OverlayRegistry};
use crate::core::rdp::RdpState;
use crate::core::signal::{Signals, StatusRegister};
use crate::core::syncpoint::SyncpointState;
use serde::Serialize;
use std::sync::Arc;
use std::thread::JoinHandle;

/// State shared between the producer and the consumer
pub struct Shared {
    /// Every consumer-visible segment
    pub arena: SegmentArena,

    /// Signals and counters
    pub status: StatusRegister,

    /// Registered command sets
    pub overlays: OverlayRegistry,

    /// Start address of the normal stream
    pub lowpri_start: u32,

    /// Start address of the high-priority stream
    pub highpri_start: u32,

    /// Return stack bound enforced by the consumer
    pub max_call_depth: u32,
}

/// Producer-side counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Commands appended (internal commands included, trailers excluded)
    pub commands: u64,

    /// Words appended by those commands
    pub words: u64,

    /// Live segment switches
    pub buffer_switches: u64,

    /// Block chunks allocated
    pub block_chunks: u64,

    /// Blocks finished with `block_end`
    pub blocks_recorded: u64,

    /// Syncpoints created
    pub syncpoints: u64,

    /// High-priority sessions begun
    pub highpri_sessions: u64,
}

/// Which live ring a switch applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ring {
    Low,
    High,
}

/// Command queue context
pub struct Queue {
    pub(crate) config: QueueConfig,
    pub(crate) shared: Arc<Shared>,
    pub(crate) lowpri: RingBuffer,
    pub(crate) highpri: RingBuffer,
    pub(crate) in_highpri: bool,
    pub(crate) recording: Option<BlockRecording>,
    pub(crate) syncpoints: SyncpointState,
    pub(crate) rdp: RdpState,
    pub(crate) stats: QueueStats,
    consumer: Option<JoinHandle<()>>,
}

impl Queue {
    /// Create a queue context
    ///
    /// Validates `config` and allocates the two segment pairs. No consumer
    /// is attached yet; see [`Queue::start`] and [`Queue::coprocessor`].
    pub fn new(config: QueueConfig) -> Result<Self> {
        config.validate()?;
        let reserve = config.segment_reserve();

        let arena = SegmentArena::new();
        let lowpri = RingBuffer::new(
            &arena,
            config.lowpri_buffer_words,
            reserve,
            Signals::BUFDONE_LOW,
        );
        let highpri = RingBuffer::new(
            &arena,
            config.highpri_buffer_words,
            reserve,
            Signals::BUFDONE_HIGH,
        );

        let shared = Arc::new(Shared {
            lowpri_start: lowpri.start_address(),
            highpri_start: highpri.start_address(),
            max_call_depth: config.max_block_nesting,
            arena,
            status: StatusRegister::new(),
            overlays: OverlayRegistry::new(),
        });

        log::info!(
            "queue: initialized (normal {}x2 words, high priority {}x2 words)",
            config.lowpri_buffer_words,
            config.highpri_buffer_words
        );

        Ok(Self {
            rdp: RdpState::new(config.rdp),
            config,
            shared,
            lowpri,
            highpri,
            in_highpri: false,
            recording: None,
            syncpoints: SyncpointState::default(),
            stats: QueueStats::default(),
            consumer: None,
        })
    }

    /// Create a queue with the default configuration
    pub fn with_defaults() -> Self {
        match Self::new(QueueConfig::default()) {
            Ok(queue) => queue,
            Err(e) => unreachable!("default configuration rejected: {}", e),
        }
    }

    /// Attach a consumer to be driven by the caller
    ///
    /// Only one consumer may be attached at a time.
    pub fn coprocessor<S, R>(&self, sink: S, rdp_sink: R) -> Coprocessor
    where
        S: CommandSink + Send + 'static,
        R: RdpSink + Send + 'static,
    {
        Coprocessor::attach(Arc::clone(&self.shared), Box::new(sink), Box::new(rdp_sink))
    }

    /// Start the consumer on a background thread
    pub fn start<S, R>(&mut self, sink: S, rdp_sink: R) -> Result<()>
    where
        S: CommandSink + Send + 'static,
        R: RdpSink + Send + 'static,
    {
        let coprocessor = self.coprocessor(sink, rdp_sink);
        let handle = std::thread::Builder::new()
            .name("rcpq-consumer".to_string())
            .spawn(move || coprocessor.run())?;
        self.consumer = Some(handle);
        log::info!("queue: consumer thread started");
        Ok(())
    }

    /// Drain the queue and stop the consumer thread
    ///
    /// Only a consumer thread started with [`Queue::start`] is drained; a
    /// halted consumer is not waited for.
    pub fn close(mut self) {
        if self.consumer.is_some() && !self.shared.status.contains(Signals::HALTED) {
            self.wait();
        }
        self.stop_consumer();
        log::info!(
            "queue: closed after {} commands ({} words)",
            self.stats.commands,
            self.stats.words
        );
    }

    fn stop_consumer(&mut self) {
        if let Some(handle) = self.consumer.take() {
            self.shared.status.request_shutdown();
            if handle.join().is_err() {
                log::error!("queue: consumer thread panicked");
            }
            log::info!("queue: consumer thread stopped");
        }
    }

    /// State shared with the consumer
    pub fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// Overlay registry
    pub fn overlays(&self) -> &OverlayRegistry {
        &self.shared.overlays
    }

    /// Producer counters
    pub fn stats(&self) -> QueueStats {
        self.stats
    }

    /// Configuration the queue was created with
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Check whether a block is being recorded
    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Write cursor of the current target, in words
    pub fn cursor(&self) -> usize {
        self.target().cursor
    }

    /// Physical address of the current target's cursor
    pub fn cursor_address(&self) -> u32 {
        self.target().address()
    }

    /// Sentinel of the current target
    pub fn sentinel(&self) -> usize {
        self.target().sentinel
    }

    /// Words published so far in the current target
    ///
    /// Debug view of the segment being written.
    pub fn current_words(&self) -> Vec<u32> {
        let target = self.target();
        target.segment.snapshot(0..target.cursor)
    }

    pub(crate) fn target(&self) -> &WriteTarget {
        match (&self.recording, self.in_highpri) {
            (Some(recording), _) => &recording.target,
            (None, true) => &self.highpri.target,
            (None, false) => &self.lowpri.target,
        }
    }

    pub(crate) fn target_mut(&mut self) -> &mut WriteTarget {
        match (&mut self.recording, self.in_highpri) {
            (Some(recording), _) => &mut recording.target,
            (None, true) => &mut self.highpri.target,
            (None, false) => &mut self.lowpri.target,
        }
    }

    /// Resident state of an overlay, after draining the queue
    ///
    /// The wait guarantees the consumer is not writing the state
    /// concurrently.
    pub fn overlay_state(&mut self, id: OverlayId) -> Vec<u32> {
        self.wait();
        match self.shared.overlays.lookup(id.index()) {
            Some(entry) => entry.state().clone(),
            None => fatal(ProtocolViolation::OverlayNotRegistered(id.index())),
        }
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        self.stop_consumer();
        self.lowpri.release(&self.shared.arena);
        self.highpri.release(&self.shared.arena);
    }
}
