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
use log::{error, info, warn};
use rcpq::core::consumer::CommandLog;
use rcpq::core::error::Result;
use rcpq::core::overlay::OverlayDescriptor;
use rcpq::core::queue::{Queue, QueueStats};
use rcpq::core::rdp::{Color, Combiner, Rect, Surface, TexFormat, TileParams};
use rcpq::core::trace::TraceRecorder;
use rcpq::core::validate::Severity;
use rcpq::core::QueueConfig;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

const SCREEN_WIDTH: u16 = 320;
const SCREEN_HEIGHT: u16 = 240;
const FRAMEBUFFERS: [u32; 2] = [0x0010_0000, 0x0013_0000];
const SPRITE_SHEET: u32 = 0x0030_0000;
const SPRITES_PER_FRAME: u16 = 12;

/// Command queue demo runner
#[derive(Parser)]
#[command(name = "rcpq")]
#[command(about = "Run a scripted scene through the command queue", long_about = None)]
struct Args {
    /// Queue configuration (TOML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Number of frames to render
    #[arg(short = 'f', long, default_value = "8")]
    frames: u32,

    /// Save the captured RDP stream to this file
    #[arg(short = 't', long)]
    trace: Option<PathBuf>,

    /// Also export the RDP stream as hex text for rdpvalidate
    #[arg(long)]
    hex: Option<PathBuf>,

    /// Print run statistics as JSON
    #[arg(long)]
    json: bool,
}

/// Statistics printed at the end of a run
#[derive(Serialize)]
struct RunSummary {
    frames: u32,
    frames_completed: u32,
    elapsed_ms: u128,
    queue: QueueStats,
    overlay_commands: usize,
    rdp_commands: usize,
    warnings: usize,
    errors: usize,
    crashes: usize,
}

fn init_logging() {
    // A .env file may set RUST_LOG for this checkout
    dotenvy::dotenv().ok();
    let mut builder = env_logger::Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(log::LevelFilter::Info);
    }
    builder.init();
}

fn main() -> Result<()> {
    init_logging();
    info!("rcpq v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => {
            info!("Loading config from: {}", path.display());
            QueueConfig::load(path).inspect_err(|e| error!("Failed to load config: {}", e))?
        }
        None => QueueConfig::default(),
    };

    let mut queue = Queue::new(config)?;
    let overlay_log = CommandLog::new();
    let recorder = TraceRecorder::with_validation();
    queue.start(overlay_log.clone(), recorder.clone())?;

    let started = Instant::now();
    let frames_completed = Arc::new(AtomicU32::new(0));
    run_scene(&mut queue, args.frames, &frames_completed);
    queue.wait();
    let stats = queue.stats();
    queue.close();
    let elapsed = started.elapsed();

    let trace = recorder.trace();
    let report = recorder.report().unwrap_or_else(|| trace.validate());
    for diagnostic in &report.diagnostics {
        warn!("{}", diagnostic);
    }

    if let Some(path) = &args.trace {
        trace.save(path)?;
    }
    if let Some(path) = &args.hex {
        trace.export_hex(path)?;
        info!("Hex stream written to: {}", path.display());
    }

    let summary = RunSummary {
        frames: args.frames,
        frames_completed: frames_completed.load(Ordering::Relaxed),
        elapsed_ms: elapsed.as_millis(),
        queue: stats,
        overlay_commands: overlay_log.len(),
        rdp_commands: trace.len(),
        warnings: report.count(Severity::Warning),
        errors: report.count(Severity::Error),
        crashes: report.count(Severity::Crash),
    };

    if args.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to encode summary: {}", e),
        }
    } else {
        info!(
            "Rendered {}/{} frames in {} ms",
            summary.frames_completed, summary.frames, summary.elapsed_ms
        );
        info!(
            "Queue: {} commands, {} words, {} buffer switches, {} block chunks",
            stats.commands, stats.words, stats.buffer_switches, stats.block_chunks
        );
        info!(
            "RDP: {} commands, {} warnings, {} errors, {} crashes",
            summary.rdp_commands, summary.warnings, summary.errors, summary.crashes
        );
    }

    if report.failed(false) {
        error!("RDP stream validation failed");
        std::process::exit(1);
    }
    Ok(())
}

/// Record and play the scene
///
/// Each frame replays a pre-recorded background block, draws a row of
/// sprites, bumps a frame counter in a custom overlay's state and detaches
/// its framebuffer with a completion callback. Every other frame a
/// high-priority session draws an overlay bar on top.
fn run_scene(queue: &mut Queue, frames: u32, frames_completed: &Arc<AtomicU32>) {
    let stats_overlay = queue
        .overlays()
        .register(OverlayDescriptor::uniform("frame_stats", 2, 2, 4));

    queue.rdp_init();
    let screen = |frame: u32| {
        Surface::new(
            TexFormat::Rgba16,
            SCREEN_WIDTH,
            SCREEN_HEIGHT,
            FRAMEBUFFERS[frame as usize % FRAMEBUFFERS.len()],
        )
    };
    queue.set_color_image(Some(&screen(0)));

    queue.block_begin();
    queue.set_mode_fill(Color::new(16, 24, 48, 255));
    queue.fill_rectangle(Rect::new(0, 0, SCREEN_WIDTH, SCREEN_HEIGHT));
    queue.set_fill_color(Color::new(40, 80, 40, 255));
    queue.fill_rectangle(Rect::new(0, SCREEN_HEIGHT - 32, SCREEN_WIDTH, SCREEN_HEIGHT));
    let background = queue.block_end();

    // Everything above must reach the rasterizer before a high-priority
    // session can preempt the stream
    queue.wait();

    let sheet = Surface::new(TexFormat::Rgba16, 16, 16, SPRITE_SHEET);
    for frame in 0..frames {
        queue.attach(&screen(frame), None);
        queue.block_run(&background);

        queue.set_mode_standard();
        queue.mode_combiner(Combiner::TEX);
        queue.set_texture_image(&sheet);
        queue.set_tile(0, &TileParams::new(TexFormat::Rgba16, 4, 0));
        queue.load_tile(0, 0, 0, 16, 16);
        for i in 0..SPRITES_PER_FRAME {
            let x = ((u32::from(i) * 24 + frame * 4) % u32::from(SCREEN_WIDTH - 16)) as u16;
            let y = 40 + (i % 4) * 32;
            queue.texture_rectangle(0, Rect::new(x, y, x + 16, y + 16), 0.0, 0.0, 1.0, 1.0);
        }

        if frame % 2 == 1 {
            queue.highpri_begin();
            queue.mode_push();
            queue.set_mode_fill(Color::new(200, 40, 40, 255));
            queue.fill_rectangle(Rect::new(0, 0, SCREEN_WIDTH, 8));
            queue.mode_pop();
            queue.highpri_end();
        }

        queue.write(stats_overlay, 0, &[frame]);
        queue.write_state(stats_overlay, 0, &[frame, u32::from(SPRITES_PER_FRAME)]);

        let done = Arc::clone(frames_completed);
        queue.detach_cb(move || {
            done.fetch_add(1, Ordering::Relaxed);
        });
    }

    queue.highpri_sync();
    queue.block_free_deferred(background);
}
