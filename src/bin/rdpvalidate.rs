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

use clap::Parser;
use log::{error, info};
use rcpq::core::error::Result;
use rcpq::core::validate::{self, disasm, InputFormat, Severity, Validator};
use std::path::PathBuf;

/// Offline RDP stream validator
#[derive(Parser)]
#[command(name = "rdpvalidate")]
#[command(about = "Validate and disassemble a captured RDP command stream", long_about = None)]
struct Args {
    /// Input is hex text (one 64-bit word per line)
    #[arg(short = 'H', long = "hex", conflicts_with = "binary")]
    hex: bool,

    /// Input is raw big-endian 64-bit words
    #[arg(short = 'B', long = "binary")]
    binary: bool,

    /// Print the disassembly
    #[arg(short = 'd', long)]
    disasm: bool,

    /// Include triangle payload words in the disassembly
    #[arg(short = 't', long)]
    triangles: bool,

    /// Count warnings as failures
    #[arg(short = 'e', long = "warnings-as-errors")]
    warnings_as_errors: bool,

    /// Stream file
    file: PathBuf,
}

fn init_logging() {
    dotenvy::dotenv().ok();
    let mut builder = env_logger::Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(log::LevelFilter::Info);
    }
    builder.init();
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let format = if args.hex {
        Some(InputFormat::Hex)
    } else if args.binary {
        Some(InputFormat::Binary)
    } else {
        None
    };
    let stream = validate::load(&args.file, format)
        .inspect_err(|e| error!("Failed to read {}: {}", args.file.display(), e))?;
    info!("Validating {} words from {}", stream.len(), args.file.display());

    let mut validator = Validator::new();
    for command in validate::split_commands(&stream) {
        let seen = validator.diagnostics().len();
        let index = validator.commands();
        validator.validate(command);

        if args.disasm {
            println!("[{:5}] 0x{:016X}  {}", index, command[0], disasm(command, args.triangles));
        }
        for diagnostic in &validator.diagnostics()[seen..] {
            println!("[{}] #{}: {}", diagnostic.severity, diagnostic.index, diagnostic.message);
        }
    }

    let report = validator.finish();
    println!(
        "{} commands: {} warnings, {} errors, {} crashes",
        report.commands,
        report.count(Severity::Warning),
        report.count(Severity::Error),
        report.count(Severity::Crash)
    );

    if report.failed(args.warnings_as_errors) {
        std::process::exit(1);
    }
    Ok(())
}
