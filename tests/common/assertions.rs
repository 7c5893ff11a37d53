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

//! Custom assertions for command stream testing

use rcpq::core::consumer::LoggedCommand;
use rcpq::core::validate::{disasm_stream, Report};

/// Assert the validator found nothing
#[allow(dead_code)]
pub fn assert_clean(report: &Report, stream: &[u64]) {
    if !report.is_clean() {
        let listing = disasm_stream(stream, false).join("\n");
        panic!(
            "validator findings:\n{}\nstream:\n{}",
            report
                .diagnostics
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join("\n"),
            listing
        );
    }
}

/// Assert the 24-bit payloads of logged commands, in order
#[allow(dead_code)]
pub fn assert_payloads(log: &[LoggedCommand], expected: &[u32]) {
    let actual: Vec<u32> = log.iter().map(|c| c.words[0] & 0x00FF_FFFF).collect();
    assert_eq!(
        actual, expected,
        "consumer order mismatch: expected {:?}, got {:?}",
        expected, actual
    );
}

/// Assert a logged command carries the words it was written with
#[allow(dead_code)]
pub fn assert_command_intact(command: &LoggedCommand, seq: u32, words: usize) {
    assert_eq!(
        command.words.len(),
        words,
        "command {} has {} words, expected {}",
        seq,
        command.words.len(),
        words
    );
    assert_eq!(command.words[0] & 0x00FF_FFFF, seq, "command {} header payload", seq);
    for (i, &word) in command.words.iter().enumerate().skip(1) {
        assert_eq!(
            word,
            seq << 8 | i as u32,
            "command {} word {} corrupted: 0x{:08X}",
            seq,
            i,
            word
        );
    }
}
