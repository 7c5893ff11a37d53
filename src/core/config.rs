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

//! Queue configuration
//!
//! [`QueueConfig`] holds the sizing and limit parameters of a queue context.
//! It can be built in code or loaded from a TOML file:
//!
//! ```toml
//! lowpri_buffer_words = 4096
//! highpri_buffer_words = 512
//! max_block_nesting = 8
//! rdp = "AUTOSYNC_PIPE | AUTOSYNC_LOAD | AUTOSYNC_TILE | AUTOSCISSOR"
//! ```
//!
//! Missing keys fall back to the defaults.

use crate::core::error::{QueueError, Result};
use crate::core::memory::MAX_SEGMENT_WORDS;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Absolute per-command size cap in words
pub const MAX_COMMAND_WORDS: usize = 62;

/// Size cap of the short-form writer in words (header + 15 arguments)
pub const MAX_SHORT_COMMAND_WORDS: usize = 16;

/// Words reserved at the end of every segment for the chaining trailer
///
/// A live segment ends with a JUMP to its successor, a block chunk with a
/// JUMP or a RET.
pub const TRAILER_WORDS: usize = 1;

bitflags! {
    /// Fixup layer switches
    ///
    /// Disabling an autosync class stops the automatic insertion of its sync
    /// command; hazard tracking itself keeps running.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct RdpConfig: u32 {
        /// Insert SYNC_PIPE before pipeline state changes
        const AUTOSYNC_PIPE = 1 << 0;
        /// Insert SYNC_LOAD before TMEM loads
        const AUTOSYNC_LOAD = 1 << 1;
        /// Insert SYNC_TILE before tile descriptor changes
        const AUTOSYNC_TILE = 1 << 2;
        /// Emit a scissor matching every new color image
        const AUTOSCISSOR = 1 << 3;
    }
}

impl Default for RdpConfig {
    fn default() -> Self {
        RdpConfig::all()
    }
}

/// Queue context configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Capacity in words of each of the two normal-priority segments
    pub lowpri_buffer_words: usize,

    /// Capacity in words of each of the two high-priority segments
    pub highpri_buffer_words: usize,

    /// Size in words of the first chunk of a block
    pub block_min_words: usize,

    /// Cap on block chunk growth in words
    pub block_max_words: usize,

    /// Hard per-command cap in words
    ///
    /// Also sizes the sentinel: a segment switches once its cursor passes
    /// `capacity - max_command_words - TRAILER_WORDS`.
    pub max_command_words: usize,

    /// Maximum block-call nesting level
    pub max_block_nesting: u32,

    /// Maximum number of high-priority sessions in flight
    pub max_highpri_pending: u32,

    /// Initial fixup layer switches
    pub rdp: RdpConfig,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            lowpri_buffer_words: 0x1000,
            highpri_buffer_words: 0x200,
            block_min_words: 64,
            block_max_words: 4192,
            max_command_words: MAX_COMMAND_WORDS,
            max_block_nesting: 8,
            max_highpri_pending: 4,
            rdp: RdpConfig::default(),
        }
    }
}

impl QueueConfig {
    /// Parse a configuration from TOML text
    ///
    /// The result is validated before it is returned.
    ///
    /// # Example
    ///
    /// ```
    /// use rcpq::core::config::QueueConfig;
    ///
    /// let config = QueueConfig::from_toml_str("lowpri_buffer_words = 256").unwrap();
    /// assert_eq!(config.lowpri_buffer_words, 256);
    /// assert_eq!(config.block_min_words, 64);
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: QueueConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Serialize to TOML text
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    /// Words reserved past the sentinel of every segment
    pub fn segment_reserve(&self) -> usize {
        self.max_command_words + TRAILER_WORDS
    }

    /// Check every field against the limits of the address adapter
    pub fn validate(&self) -> Result<()> {
        if self.max_command_words == 0 || self.max_command_words > MAX_COMMAND_WORDS {
            return Err(QueueError::InvalidConfig(format!(
                "max_command_words must be in 1..={}, got {}",
                MAX_COMMAND_WORDS, self.max_command_words
            )));
        }

        let reserve = self.segment_reserve();
        let sizes = [
            ("lowpri_buffer_words", self.lowpri_buffer_words),
            ("highpri_buffer_words", self.highpri_buffer_words),
            ("block_min_words", self.block_min_words),
            ("block_max_words", self.block_max_words),
        ];
        for (name, words) in sizes {
            if words <= reserve {
                return Err(QueueError::InvalidConfig(format!(
                    "{} must exceed the segment reserve of {} words, got {}",
                    name, reserve, words
                )));
            }
            if words > MAX_SEGMENT_WORDS {
                return Err(QueueError::InvalidConfig(format!(
                    "{} must be at most {} words, got {}",
                    name, MAX_SEGMENT_WORDS, words
                )));
            }
        }

        if self.block_min_words > self.block_max_words {
            return Err(QueueError::InvalidConfig(format!(
                "block_min_words ({}) exceeds block_max_words ({})",
                self.block_min_words, self.block_max_words
            )));
        }
        if self.max_block_nesting == 0 {
            return Err(QueueError::InvalidConfig(
                "max_block_nesting must be at least 1".to_string(),
            ));
        }
        if self.max_highpri_pending == 0 {
            return Err(QueueError::InvalidConfig(
                "max_highpri_pending must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
