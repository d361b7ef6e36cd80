//! CLI for distfit: which distribution did this file of doubles come from?

mod commands;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use distfit_core::config::DEFAULT_CRITICAL_P_VALUE;

#[derive(Parser)]
#[command(name = "distfit")]
#[command(about = "distfit: chi-square goodness-of-fit over very large files of doubles")]
#[command(version = distfit_core::VERSION)]
struct Cli {
    /// Log more (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run both passes and test Normal, Uniform, Exponential and Poisson
    Fit {
        /// Headerless file of little-endian 8-byte doubles
        file: PathBuf,

        /// Critical p-value; a hypothesis is accepted above it
        #[arg(long, default_value_t = DEFAULT_CRITICAL_P_VALUE)]
        alpha: f64,

        /// Doubles per read (default: 10 MiB worth)
        #[arg(long)]
        block_size: Option<usize>,

        /// Seconds without progress before the watchdog reports a stall
        #[arg(long)]
        watchdog_interval: Option<u64>,

        /// Worker threads (default: hardware concurrency)
        #[arg(long)]
        threads: Option<usize>,

        /// Exit when the watchdog sees a stall instead of warning
        #[arg(long)]
        strict_watchdog: bool,

        /// Run without the watchdog
        #[arg(long, conflicts_with = "strict_watchdog")]
        no_watchdog: bool,

        /// Write the full report as JSON
        #[arg(long)]
        output: Option<String>,
    },

    /// Show record count and trailing bytes without running the passes
    Inspect {
        /// Headerless file of little-endian 8-byte doubles
        file: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match cli.command {
        Commands::Fit {
            file,
            alpha,
            block_size,
            watchdog_interval,
            threads,
            strict_watchdog,
            no_watchdog,
            output,
        } => commands::fit::run(commands::fit::FitCommandConfig {
            path: &file,
            alpha,
            block_size,
            watchdog_interval_secs: watchdog_interval,
            threads,
            strict_watchdog,
            no_watchdog,
            output_path: output.as_deref(),
        }),
        Commands::Inspect { file } => commands::inspect::run(&file),
    };
    std::process::exit(code);
}
