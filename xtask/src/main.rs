use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::process::{Command, Stdio};
use std::time::Instant;

/// Benchmark target of the main crate
const BENCH_TARGET: &str = "queue_bench";

/// Frames rendered by the CI smoke run
const SMOKE_FRAMES: u32 = 4;

#[derive(Parser)]
#[command(name = "x")]
#[command(about = "Development automation for rcpq")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Format check, clippy, tests, then a validated demo run
    Ci {
        #[arg(long)]
        verbose: bool,
        /// Skip the demo capture and rdpvalidate smoke run
        #[arg(long)]
        no_demo: bool,
    },
    /// Format check and clippy only
    Check,
    /// Format code
    Fmt {
        #[arg(long)]
        check: bool,
    },
    /// Run clippy on every target
    Clippy {
        #[arg(long)]
        fix: bool,
    },
    /// Run tests, optionally a single suite
    Test {
        #[arg(value_enum)]
        suite: Option<Suite>,
        #[arg(long)]
        doc: bool,
        #[arg(long)]
        ignored: bool,
    },
    /// Run the queue benchmarks
    Bench {
        /// Only run benchmarks whose name contains this
        filter: Option<String>,
    },
    /// Build the API documentation
    Doc {
        #[arg(long)]
        open: bool,
    },
    /// Run the demo scene and validate the captured stream
    Demo {
        /// Frames to render
        #[arg(short = 'f', long, default_value = "8")]
        frames: u32,
        /// Where to write the hex export of the capture
        #[arg(long, default_value = "target/demo.hex")]
        output: String,
        #[arg(long)]
        release: bool,
    },
    /// Remove build artifacts
    Clean,
}

/// Test suites that can run on their own
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Suite {
    /// Ring and writer unit tests
    Queue,
    /// Consumer model unit tests
    Consumer,
    /// Block recording and replay unit tests
    Block,
    /// RDP fixup layer unit tests
    Rdp,
    /// Validator and disassembler unit tests
    Validate,
    /// Randomized stream properties
    Properties,
    /// End-to-end scenarios
    Integration,
}

impl Suite {
    /// Target selector and name filter passed to `cargo test`
    fn cargo_args(self) -> [&'static str; 2] {
        match self {
            Suite::Queue => ["--lib", "core::queue"],
            Suite::Consumer => ["--lib", "core::consumer"],
            Suite::Block => ["--lib", "core::block"],
            Suite::Rdp => ["--lib", "core::rdp"],
            Suite::Validate => ["--lib", "core::validate"],
            Suite::Properties => ["--test", "properties"],
            Suite::Integration => ["--test", "integration_test"],
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci { verbose, no_demo } => run_ci(verbose, no_demo),
        Commands::Check => run_check(),
        Commands::Fmt { check } => run_fmt(check),
        Commands::Clippy { fix } => run_clippy(fix),
        Commands::Test {
            suite,
            doc,
            ignored,
        } => run_test(suite, doc, ignored),
        Commands::Bench { filter } => run_bench(filter.as_deref()),
        Commands::Doc { open } => run_doc(open),
        Commands::Demo {
            frames,
            output,
            release,
        } => run_demo(frames, &output, release),
        Commands::Clean => execute_command(cargo(&["clean"])),
    }
}

fn run_ci(verbose: bool, no_demo: bool) -> Result<()> {
    println!("{}", "=== rcpq CI ===".bold().blue());
    let start = Instant::now();

    run_task("Format check", || run_fmt(true), verbose)?;
    run_task("Clippy", || run_clippy(false), verbose)?;
    run_task("Tests", || run_test(None, false, false), verbose)?;
    run_task("Doc tests", || run_test(None, true, false), verbose)?;
    if !no_demo {
        run_task(
            "Demo capture",
            || run_demo(SMOKE_FRAMES, "target/ci-demo.hex", false),
            verbose,
        )?;
    }

    println!(
        "\n{} {}",
        "✓ CI passed in".green().bold(),
        format!("{:.2}s", start.elapsed().as_secs_f64()).bold()
    );
    Ok(())
}

fn run_check() -> Result<()> {
    run_task("Format check", || run_fmt(true), false)?;
    run_task("Clippy", || run_clippy(false), false)
}

fn run_fmt(check: bool) -> Result<()> {
    let mut cmd = cargo(&["fmt", "--all"]);
    if check {
        cmd.args(["--", "--check"]);
    }
    execute_command(cmd)
}

fn run_clippy(fix: bool) -> Result<()> {
    let mut cmd = cargo(&["clippy", "--workspace", "--all-targets"]);
    if fix {
        cmd.arg("--fix");
    } else {
        cmd.args(["--", "-D", "warnings"]);
    }
    execute_command(cmd)
}

fn run_test(suite: Option<Suite>, doc: bool, ignored: bool) -> Result<()> {
    let mut cmd = cargo(&["test"]);
    if doc {
        cmd.arg("--doc");
    } else if let Some(suite) = suite {
        println!("{} Running {:?} tests", "→".blue(), suite);
        cmd.args(suite.cargo_args());
    }
    if ignored {
        cmd.args(["--", "--ignored"]);
    }
    execute_command(cmd)
}

fn run_bench(filter: Option<&str>) -> Result<()> {
    let mut cmd = cargo(&["bench", "--bench", BENCH_TARGET]);
    if let Some(filter) = filter {
        cmd.args(["--", filter]);
    }
    execute_command(cmd)
}

fn run_doc(open: bool) -> Result<()> {
    let mut cmd = cargo(&["doc", "--no-deps"]);
    if open {
        cmd.arg("--open");
    }
    execute_command(cmd)
}

fn run_demo(frames: u32, output: &str, release: bool) -> Result<()> {
    println!(
        "{} Rendering {} frames into {}",
        "→".blue(),
        frames.to_string().bold(),
        output.cyan()
    );
    let mut cmd = cargo_run("rcpq", release);
    cmd.args(["--frames", &frames.to_string(), "--hex", output]);
    execute_command(cmd)?;

    println!("{} Validating capture", "→".blue());
    let mut cmd = cargo_run("rdpvalidate", release);
    cmd.args(["--hex", "--warnings-as-errors", output]);
    let status = cmd
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .status()?;
    if !status.success() {
        anyhow::bail!("capture {} failed validation ({})", output, status);
    }
    println!("{} {} validated", "✓".green().bold(), output);
    Ok(())
}

fn cargo(args: &[&str]) -> Command {
    let mut cmd = Command::new("cargo");
    cmd.args(args);
    cmd
}

fn cargo_run(bin: &str, release: bool) -> Command {
    let mut cmd = cargo(&["run", "--quiet", "--bin", bin]);
    if release {
        cmd.arg("--release");
    }
    cmd.arg("--");
    cmd
}

fn run_task<F>(name: &str, task: F, verbose: bool) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    println!("{} {}", "→".blue(), name.bold());
    let start = Instant::now();
    let result = task();
    let elapsed = if verbose {
        format!(" ({:.2}s)", start.elapsed().as_secs_f64())
    } else {
        String::new()
    };
    match &result {
        Ok(()) => println!("{} {}{}", "✓".green().bold(), name, elapsed),
        Err(_) => println!("{} {}{}", "✗".red().bold(), name, elapsed),
    }
    result
}

fn execute_command(mut cmd: Command) -> Result<()> {
    let status = cmd
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()?;
    if !status.success() {
        anyhow::bail!("{:?} failed ({})", cmd.get_program(), status);
    }
    Ok(())
}
