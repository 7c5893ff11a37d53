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

//! Block recorder tests

mod tracking;

use crate::core::config::QueueConfig;
use crate::core::queue::Queue;

/// Queue with 16-word first chunks doubling up to 64 words
pub(super) fn block_queue() -> Queue {
    let config = QueueConfig {
        max_command_words: 3,
        block_min_words: 16,
        block_max_words: 64,
        max_block_nesting: 3,
        ..QueueConfig::default()
    };
    Queue::new(config).unwrap()
}
