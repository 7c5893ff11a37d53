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

//! Queue context tests
//!
//! - `writer`: command encoding and size limits
//! - `switching`: sentinel checks and segment chaining


use crate::core::config::QueueConfig;

/// Queue whose normal segments hold 64 words with the sentinel at word 60
pub(super) fn small_queue() -> super::Queue {
    let config = QueueConfig {
        lowpri_buffer_words: 64,
        max_command_words: 3,
        ..QueueConfig::default()
    };
    super::Queue::new(config).unwrap()
}
