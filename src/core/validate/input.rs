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

//! Validator input files
//!
//! Two formats are read:
//!
//! - binary: raw big-endian 64-bit words, back to back
//! - hex: one 64-bit word per line, optional `0x` prefix, `#` starts a
//!   comment

use crate::core::error::{QueueError, Result};
use std::path::Path;

/// Input file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Binary,
    Hex,
}

/// Guess the format of `data`
///
/// Text made only of hex digits, whitespace, `x` and comments is hex;
/// anything else is binary.
pub fn detect_format(data: &[u8]) -> InputFormat {
    let Ok(text) = std::str::from_utf8(data) else {
        return InputFormat::Binary;
    };
    let looks_hex = text
        .lines()
        .map(|line| line.split('#').next().unwrap_or(""))
        .all(|line| {
            line.chars()
                .all(|c| c.is_ascii_hexdigit() || c.is_ascii_whitespace() || c == 'x' || c == 'X')
        });
    if looks_hex && !text.trim().is_empty() {
        InputFormat::Hex
    } else {
        InputFormat::Binary
    }
}

/// Parse raw big-endian words
pub fn parse_binary(data: &[u8]) -> Result<Vec<u64>> {
    if data.len() % 8 != 0 {
        return Err(QueueError::InputFormat {
            line: 0,
            message: format!("binary input is {} bytes, not a multiple of 8", data.len()),
        });
    }
    Ok(data
        .chunks_exact(8)
        .map(|chunk| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            u64::from_be_bytes(bytes)
        })
        .collect())
}

/// Parse one word per line
pub fn parse_hex(text: &str) -> Result<Vec<u64>> {
    let mut words = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let content = line.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        let digits = content
            .strip_prefix("0x")
            .or_else(|| content.strip_prefix("0X"))
            .unwrap_or(content);
        let word = u64::from_str_radix(digits, 16).map_err(|e| QueueError::InputFormat {
            line: number + 1,
            message: format!("invalid hex word {:?}: {}", content, e),
        })?;
        words.push(word);
    }
    Ok(words)
}

/// Read a stream file, detecting the format unless one is given
pub fn load(path: impl AsRef<Path>, format: Option<InputFormat>) -> Result<Vec<u64>> {
    let data = std::fs::read(path.as_ref())?;
    match format.unwrap_or_else(|| detect_format(&data)) {
        InputFormat::Binary => parse_binary(&data),
        InputFormat::Hex => {
            let text = std::str::from_utf8(&data).map_err(|e| QueueError::InputFormat {
                line: 0,
                message: format!("hex input is not UTF-8: {}", e),
            })?;
            parse_hex(text)
        }
    }
}
