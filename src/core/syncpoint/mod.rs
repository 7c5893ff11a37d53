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

//! Syncpoints and deferred callbacks
//!
//! A syncpoint marks a position in the normal stream. Creating one appends
//! a SYNCPOINT command; the consumer increments `syncpoints_done` when it
//! executes it. IDs and the counter advance in lockstep, so
//! "reached" is a wrapping comparison:
//!
//! ```text
//! reached(id) = (id - syncpoints_done) as i32 <= 0
//! ```
//!
//! Deferred callbacks are attached to a syncpoint and run on the producer
//! thread, in creation order, once it is reached. They run from
//! [`Queue::poll_deferred`], which the queue also calls while blocked on
//! the consumer. One callback runs per poll, so the producer keeps feeding
//! the consumer between callbacks.

#[cfg(test)]
mod tests;

use crate::core::error::{fatal, ProtocolViolation};
use crate::core::queue::{commands, Queue};
use std::collections::VecDeque;

/// Opaque syncpoint identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Syncpoint(u32);

impl Syncpoint {
    /// Raw identifier
    pub fn id(self) -> u32 {
        self.0
    }

    /// Check whether the consumer counter `done` has reached this syncpoint
    #[inline(always)]
    pub fn reached_by(self, done: u32) -> bool {
        (self.0.wrapping_sub(done) as i32) <= 0
    }
}

type Callback = Box<dyn FnOnce() + Send>;

/// Producer-side syncpoint bookkeeping
#[derive(Default)]
pub(crate) struct SyncpointState {
    /// Last identifier handed out
    genid: u32,

    /// Pending callbacks, in creation order
    deferred: VecDeque<(Syncpoint, Callback)>,
}

impl Queue {
    /// Create a syncpoint at the current stream position
    ///
    /// Fatal while recording a block or in high-priority mode.
    pub fn syncpoint_new(&mut self) -> Syncpoint {
        if self.recording.is_some() {
            fatal(ProtocolViolation::SyncpointInBlock);
        }
        if self.in_highpri {
            fatal(ProtocolViolation::SyncpointInHighPriority);
        }

        self.emit(&[commands::syncpoint()]);
        self.syncpoints.genid = self.syncpoints.genid.wrapping_add(1);
        self.stats.syncpoints += 1;

        let syncpoint = Syncpoint(self.syncpoints.genid);
        log::debug!("syncpoint: created {}", syncpoint.0);
        syncpoint
    }

    /// Create a syncpoint that runs `callback` once reached
    pub fn syncpoint_new_cb<F>(&mut self, callback: F) -> Syncpoint
    where
        F: FnOnce() + Send + 'static,
    {
        let syncpoint = self.syncpoint_new();
        self.syncpoints
            .deferred
            .push_back((syncpoint, Box::new(callback)));
        syncpoint
    }

    /// Run `callback` once the consumer passes the current position
    pub fn call_deferred<F>(&mut self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.syncpoint_new_cb(callback);
        self.flush();
    }

    /// Non-blocking check
    pub fn syncpoint_check(&self, syncpoint: Syncpoint) -> bool {
        syncpoint.reached_by(self.shared.status.syncpoints_done())
    }

    /// Block until `syncpoint` is reached
    pub fn syncpoint_wait(&mut self, syncpoint: Syncpoint) {
        if self.syncpoint_check(syncpoint) {
            return;
        }
        self.flush();
        self.block_until(|status| syncpoint.reached_by(status.syncpoints_done()));
    }

    /// Run the oldest deferred callback if its syncpoint was reached
    ///
    /// Returns true if a callback ran.
    pub fn poll_deferred(&mut self) -> bool {
        let done = self.shared.status.syncpoints_done();
        match self.syncpoints.deferred.front() {
            Some((syncpoint, _)) if syncpoint.reached_by(done) => {}
            _ => return false,
        }
        let Some((syncpoint, callback)) = self.syncpoints.deferred.pop_front() else {
            return false;
        };
        log::trace!("syncpoint: running callback for {}", syncpoint.0);
        callback();
        true
    }

    /// Number of callbacks not run yet
    pub fn deferred_pending(&self) -> usize {
        self.syncpoints.deferred.len()
    }
}
