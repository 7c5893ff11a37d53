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

//! Queue error types
//!
//! Two families of failure exist:
//!
//! - [`QueueError`]: recoverable conditions at the I/O edge of the crate
//!   (configuration files, trace files, validator input).
//! - [`ProtocolViolation`]: misuse of the producer API. These are never
//!   returned; [`fatal`] logs them and aborts the calling thread, because
//!   continuing would leave a command stream the consumer cannot interpret.

use thiserror::Error;

/// Result type for recoverable queue operations
pub type Result<T> = std::result::Result<T, QueueError>;

/// Recoverable error type
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Trace encode error: {0}")]
    TraceEncode(#[from] bincode::error::EncodeError),

    #[error("Trace decode error: {0}")]
    TraceDecode(#[from] bincode::error::DecodeError),

    #[error("Incompatible trace version: expected {expected}, found {found}")]
    TraceVersion { expected: u32, found: u32 },

    #[error("Input format error at line {line}: {message}")]
    InputFormat { line: usize, message: String },
}

/// Fatal API misuse
///
/// Every variant names the invariant that was broken. The `Display` text is
/// the panic message produced by [`fatal`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("command too large: {words} words (maximum {max})")]
    CommandTooLarge { words: usize, max: usize },

    #[error("command argument overflow: declared {declared} words, wrote {written}")]
    ArgumentOverflow { declared: usize, written: usize },

    #[error("command index {index} out of range for overlay 0x{overlay:X}")]
    CommandIndexOutOfRange { overlay: u32, index: u32 },

    #[error("overlay ID 0 is reserved for internal commands")]
    ReservedOverlay,

    #[error("overlay 0x{0:X} is not registered")]
    OverlayNotRegistered(u32),

    #[error("overlay {0} is already registered")]
    OverlayAlreadyRegistered(String),

    #[error("no free overlay ID range of {units} slots for overlay {name}")]
    OverlayIdsExhausted { name: String, units: usize },

    #[error("overlay ID range 0x{base:X}..=0x{last:X} is already occupied")]
    OverlayRangeOccupied { base: u32, last: u32 },

    #[error("overlay {name} has {commands} commands (maximum {max})")]
    OverlayTooLarge { name: String, commands: usize, max: usize },

    #[error("overlay state write out of range: offset {offset} + {len} words exceeds {size}")]
    OverlayStateOutOfRange { offset: usize, len: usize, size: usize },

    #[error("segment arena exhausted ({0} live segments)")]
    ArenaExhausted(usize),

    #[error("a block is already being recorded")]
    NestedBlock,

    #[error("block_end called without block_begin")]
    BlockNotRecording,

    #[error("block nesting too deep: level {level} (maximum {max})")]
    BlockNestingTooDeep { level: u32, max: u32 },

    #[error("block recording cannot start in high-priority mode")]
    BlockInHighPriority,

    #[error("cannot create a syncpoint while recording a block")]
    SyncpointInBlock,

    #[error("cannot create a syncpoint in high-priority mode")]
    SyncpointInHighPriority,

    #[error("cannot wait while recording a block")]
    WaitInBlock,

    #[error("high-priority mode is already active")]
    NestedHighPriority,

    #[error("high-priority mode cannot start while recording a block")]
    HighPriorityInBlock,

    #[error("highpri_end called outside high-priority mode")]
    HighPriorityNotActive,

    #[error("highpri_sync called inside a high-priority session")]
    HighPrioritySyncInSession,

    #[error("deadlock: blocking wait with no consumer attached")]
    NoConsumer,

    #[error("a consumer is already attached to this queue")]
    ConsumerAlreadyAttached,

    #[error("consumer halted: {0}")]
    ConsumerHalted(String),

    #[error("render mode stack overflow (depth {0})")]
    ModeStackOverflow(usize),

    #[error("render mode stack underflow")]
    ModeStackUnderflow,

    #[error("mode_begin called twice without mode_end")]
    NestedModeBatch,

    #[error("mode_end called without mode_begin")]
    ModeBatchNotActive,

    #[error("too many nested render targets (maximum {0})")]
    AttachStackOverflow(usize),

    #[error("no render target is currently attached")]
    NotAttached,

    #[error("no depth buffer is currently attached")]
    NoDepthBuffer,

    #[error("color and depth buffers differ in size: {color_width}x{color_height} vs {depth_width}x{depth_height}")]
    DepthSizeMismatch {
        color_width: u16,
        color_height: u16,
        depth_width: u16,
        depth_height: u16,
    },

    #[error("invalid tile index {0} (valid range: 0-7)")]
    InvalidTile(u8),

    #[error("RDP overlay is not initialized")]
    RdpNotInitialized,

    #[error("invalid RDP command size for opcode 0x{opcode:02X}: {words} words (expected {expected})")]
    RdpCommandSize {
        opcode: u8,
        words: usize,
        expected: usize,
    },
}

/// Abort on a protocol violation
///
/// Logs the violation at error level and panics with its description.
#[cold]
#[track_caller]
pub fn fatal(violation: ProtocolViolation) -> ! {
    log::error!("{}", violation);
    panic!("{}", violation);
}
