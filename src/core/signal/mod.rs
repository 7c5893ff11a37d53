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

//! Producer/consumer status register
//!
//! The status register is the only state both processors write. It plays the
//! role of the coprocessor status bits plus the interrupt line back to the
//! CPU.
//!
//! ## Signals
//!
//! ```text
//! Bit | Signal          | Set by                | Cleared by
//! ----|-----------------|-----------------------|-------------------------
//! 0   | MORE            | producer (flush)      | consumer (on wake-up)
//! 1   | BUFDONE_LOW     | consumer (trailer)    | producer (buffer switch)
//! 2   | BUFDONE_HIGH    | consumer (trailer)    | producer (buffer switch)
//! 3   | HIGHPRI_RUNNING | consumer (preempt)    | consumer (last SWAP)
//! 4   | IDLE            | consumer (caught up)  | consumer (new work)
//! 5   | HALTED          | consumer (fault/stop) | never
//! ```
//!
//! Two counters complete the register: `syncpoints_done` (incremented by the
//! SYNCPOINT command) and `highpri_pending` (high-priority sessions begun by
//! the producer and not yet drained).
//!
//! All fields are atomics, so the producer's write path never takes a lock.
//! The mutex below only guards the two condition variables used to sleep.

#[cfg(test)]
mod tests;

use bitflags::bitflags;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

bitflags! {
    /// Status register signal bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Signals: u32 {
        /// New work was flushed since the consumer last went idle
        const MORE = 1 << 0;
        /// The consumer left the normal segment it was reading
        const BUFDONE_LOW = 1 << 1;
        /// The consumer left the high-priority segment it was reading
        const BUFDONE_HIGH = 1 << 2;
        /// The consumer is executing the high-priority stream
        const HIGHPRI_RUNNING = 1 << 3;
        /// The consumer caught up with the producer
        const IDLE = 1 << 4;
        /// The consumer stopped and will not make progress
        const HALTED = 1 << 5;
    }
}

/// Bits available to the WRITE_STATUS command (set and clear masks)
pub const STATUS_FIELD_BITS: u32 = 12;

/// Shared status register
pub struct StatusRegister {
    /// Signal bits (see [`Signals`])
    bits: AtomicU32,

    /// Number of SYNCPOINT commands executed
    syncpoints_done: AtomicU32,

    /// High-priority sessions begun and not yet drained
    highpri_pending: AtomicU32,

    /// Set when a consumer (thread or manual) is attached
    attached: AtomicBool,

    /// Consumer thread stop request
    shutdown: AtomicBool,

    /// Reason for the HALTED signal
    fault: Mutex<Option<String>>,

    doorbell: Mutex<()>,
    consumer_bell: Condvar,
    producer_bell: Condvar,
}

impl StatusRegister {
    /// Create a status register in its reset state
    ///
    /// Both BUFDONE signals start raised: the second segment of each pair
    /// has never been handed to the consumer.
    pub fn new() -> Self {
        Self {
            bits: AtomicU32::new((Signals::BUFDONE_LOW | Signals::BUFDONE_HIGH).bits()),
            syncpoints_done: AtomicU32::new(0),
            highpri_pending: AtomicU32::new(0),
            attached: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            fault: Mutex::new(None),
            doorbell: Mutex::new(()),
            consumer_bell: Condvar::new(),
            producer_bell: Condvar::new(),
        }
    }

    fn bell(&self) -> MutexGuard<'_, ()> {
        self.doorbell.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current signal bits
    #[inline(always)]
    pub fn read(&self) -> Signals {
        Signals::from_bits_truncate(self.bits.load(Ordering::Acquire))
    }

    /// Check whether all of `signals` are raised
    #[inline(always)]
    pub fn contains(&self, signals: Signals) -> bool {
        self.read().contains(signals)
    }

    /// Raise signals
    pub fn set(&self, signals: Signals) {
        self.bits.fetch_or(signals.bits(), Ordering::AcqRel);
    }

    /// Lower signals
    pub fn clear(&self, signals: Signals) {
        self.bits.fetch_and(!signals.bits(), Ordering::AcqRel);
    }

    /// Apply a WRITE_STATUS command and wake the producer
    pub fn write_status(&self, set: Signals, clear: Signals) {
        self.clear(clear);
        self.set(set);
        self.notify_producer();
    }

    /// Number of syncpoints the consumer has reached
    #[inline(always)]
    pub fn syncpoints_done(&self) -> u32 {
        self.syncpoints_done.load(Ordering::Acquire)
    }

    /// Record one more reached syncpoint and wake the producer
    pub fn raise_syncpoint(&self) {
        self.syncpoints_done.fetch_add(1, Ordering::AcqRel);
        self.notify_producer();
    }

    /// High-priority sessions begun and not yet drained
    #[inline(always)]
    pub fn highpri_pending(&self) -> u32 {
        self.highpri_pending.load(Ordering::Acquire)
    }

    /// Announce a new high-priority session
    pub fn request_highpri(&self) {
        self.highpri_pending.fetch_add(1, Ordering::AcqRel);
    }

    /// Mark one high-priority session drained
    ///
    /// Returns the number of sessions still pending.
    pub fn complete_highpri(&self) -> u32 {
        let previous = self
            .highpri_pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(1))
            })
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    /// Claim the consumer role
    ///
    /// Returns false if a consumer is already attached.
    pub fn attach(&self) -> bool {
        self.attached
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release the consumer role
    pub fn detach(&self) {
        self.attached.store(false, Ordering::Release);
        self.notify_producer();
    }

    /// Check whether a consumer is attached
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Ask the consumer thread to stop
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.notify_consumer();
    }

    /// Check whether the consumer thread was asked to stop
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Stop the consumer permanently, recording why
    pub fn halt(&self, reason: impl Into<String>) {
        let reason = reason.into();
        log::error!("consumer halted: {}", reason);
        *self.fault.lock().unwrap_or_else(|e| e.into_inner()) = Some(reason);
        self.set(Signals::HALTED);
        self.notify_producer();
        self.notify_consumer();
    }

    /// Reason the consumer halted, if it did
    pub fn fault(&self) -> Option<String> {
        self.fault.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Wake a sleeping consumer
    pub fn notify_consumer(&self) {
        let _guard = self.bell();
        self.consumer_bell.notify_all();
    }

    /// Wake a sleeping producer
    pub fn notify_producer(&self) {
        let _guard = self.bell();
        self.producer_bell.notify_all();
    }

    /// Consumer sleep until MORE or a shutdown request
    ///
    /// Consumes the MORE signal. Returns false on shutdown.
    pub fn wait_for_more(&self) -> bool {
        let mut guard = self.bell();
        loop {
            if self.bits.fetch_and(!Signals::MORE.bits(), Ordering::AcqRel) & Signals::MORE.bits() != 0
            {
                return true;
            }
            if self.shutdown_requested() {
                return false;
            }
            guard = self
                .consumer_bell
                .wait(guard)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Producer sleep until `ready` holds or `timeout` elapses
    ///
    /// `ready` is evaluated under the doorbell lock, so a notification sent
    /// after the consumer changed the observed state cannot be lost.
    /// Returns the final value of `ready`.
    pub fn park_producer<F>(&self, mut ready: F, timeout: Duration) -> bool
    where
        F: FnMut() -> bool,
    {
        let guard = self.bell();
        if ready() {
            return true;
        }
        let _guard = self
            .producer_bell
            .wait_timeout(guard, timeout)
            .unwrap_or_else(|e| e.into_inner());
        ready()
    }
}

impl Default for StatusRegister {
    fn default() -> Self {
        Self::new()
    }
}
