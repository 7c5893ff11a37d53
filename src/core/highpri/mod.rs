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

//! High-priority channel
//!
//! Commands written between [`Queue::highpri_begin`] and
//! [`Queue::highpri_end`] go to a second ring. The two sides agree on the
//! `highpri_pending` counter of the status register:
//!
//! ```text
//! producer                          consumer
//! --------                          --------
//! begin: pending += 1, flush  --->  before each normal command:
//!                                     pending > 0 => save position,
//!                                     run high-priority ring,
//!                                     raise HIGHPRI_RUNNING
//! end:   SWAP_BUFFERS, flush  --->  SWAP_BUFFERS: pending -= 1,
//!                                     0 => resume saved position,
//!                                     lower HIGHPRI_RUNNING
//! ```
//!
//! Sessions are drained in creation order. At most `max_highpri_pending`
//! sessions may be in flight; `highpri_begin` waits for the consumer
//! beyond that.
//!
//! Preemption happens at command boundaries of the normal stream, wherever
//! the consumer happens to be. Normal commands written before a session
//! but not yet executed run after it.

#[cfg(test)]
mod tests;

use crate::core::error::{fatal, ProtocolViolation};
use crate::core::queue::{commands, Queue};

impl Queue {
    /// Redirect writes to the high-priority ring
    ///
    /// Fatal if already in high-priority mode or while recording a block.
    pub fn highpri_begin(&mut self) {
        if self.in_highpri {
            fatal(ProtocolViolation::NestedHighPriority);
        }
        if self.recording.is_some() {
            fatal(ProtocolViolation::HighPriorityInBlock);
        }

        let max = self.config.max_highpri_pending;
        if self.shared.status.highpri_pending() >= max {
            log::debug!("highpri: {} sessions in flight, waiting", max);
            self.flush();
            self.block_until(|status| status.highpri_pending() < max);
        }

        self.rdp_highpri_begin();
        self.in_highpri = true;
        self.shared.status.request_highpri();
        self.stats.highpri_sessions += 1;
        log::debug!("highpri: session {} begun", self.stats.highpri_sessions);
        self.flush();
    }

    /// Close the session and return to the normal ring
    pub fn highpri_end(&mut self) {
        if !self.in_highpri {
            fatal(ProtocolViolation::HighPriorityNotActive);
        }
        self.emit(&[commands::swap_buffers()]);
        self.in_highpri = false;
        self.rdp_highpri_end();
        log::debug!("highpri: session {} ended", self.stats.highpri_sessions);
        self.flush();
    }

    /// Block until every high-priority session so far has drained
    pub fn highpri_sync(&mut self) {
        if self.in_highpri {
            fatal(ProtocolViolation::HighPrioritySyncInSession);
        }
        self.flush();
        self.block_until(|status| status.highpri_pending() == 0);
    }

    /// Check whether writes currently go to the high-priority ring
    pub fn in_highpri(&self) -> bool {
        self.in_highpri
    }
}
