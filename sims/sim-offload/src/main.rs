// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Compare offload policies for a dual path packet pipeline.
//!
//! See `lib.rs` for how the configuration is assembled.

use std::path::PathBuf;

use clap::Parser;
use indicatif::ProgressBar;
use itertools::Itertools;
use offsim_engine::engine::Engine;
use offsim_engine::sim_error;
use offsim_engine::types::{SimError, Turn};
use offsim_track::builder::{TrackerConfig, TrackersConfig, setup_trackers};
use offsim_track::{Tracker, error, info};
use sim_offload::{
    PolicyKind, SweepOptions, build_sweep, describe_sweep, format_header, format_row, load_config,
};

/// Command-line arguments.
#[derive(Parser)]
#[command(about = "Offload policy evaluation application")]
struct Cli {
    /// TOML file with the base simulation configuration.
    #[arg(long)]
    conf_file: Option<PathBuf>,

    /// Number of turns (seconds) to simulate.
    #[arg(long)]
    turns: Option<Turn>,

    /// Thresholds used for the static policy runs. Use 0 to disable
    /// offloading.
    #[arg(long, value_delimiter = ',', default_values_t = [2u64, 4, 8, 16, 32, 64])]
    thresholds: Vec<u64>,

    /// Policies to evaluate.
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        default_values = ["static", "reactive", "proportional", "sketch"]
    )]
    policies: Vec<PolicyKind>,

    /// Divide all per-turn rates by this value for quicker runs.
    #[arg(long, default_value = "1")]
    scale: u64,

    /// Discard packets dropped by the slow path instead of sending them again.
    #[arg(long)]
    no_drops_retry: bool,

    /// Number of runs simulated in parallel. Defaults to the number of CPUs.
    #[arg(long)]
    jobs: Option<usize>,

    /// Show a progress bar of completed runs.
    #[arg(long)]
    progress: bool,

    /// Enable logging to the console.
    #[arg(long, default_value = "false")]
    stdout: bool,

    /// Console log level.
    #[arg(long, default_value = "Info")]
    stdout_level: log::Level,

    /// Only entities whose path matches this regex log at `--stdout-level`,
    /// for example `.*::controller`. The rest only report errors.
    #[arg(long, default_value = "")]
    stdout_filter_regex: String,

    /// Write the log to this file.
    #[arg(long)]
    log_file: Option<String>,

    /// Log file level.
    #[arg(long, default_value = "Debug")]
    log_file_level: log::Level,

    /// As `--stdout-filter-regex`, for the log file.
    #[arg(long, default_value = "")]
    log_file_filter_regex: String,
}

fn build_trackers(args: &Cli) -> Result<Tracker, SimError> {
    let config = TrackersConfig {
        stdout: TrackerConfig {
            enable: args.stdout,
            level: args.stdout_level,
            filter_regex: &args.stdout_filter_regex,
            file: None,
        },
        log_file: TrackerConfig {
            enable: args.log_file.is_some(),
            level: args.log_file_level,
            filter_regex: &args.log_file_filter_regex,
            file: args.log_file.as_deref(),
        },
    };
    setup_trackers(&config).map_err(|e| SimError(e.to_string()))
}

fn main() -> Result<(), SimError> {
    let args = Cli::parse();
    let tracker = build_trackers(&args)?;

    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .map_err(|e| SimError(format!("unable to create {jobs} worker threads: {e}")))?;
    }

    let engine = Engine::new(&tracker);
    let top = engine.top().clone();

    let base = match load_config(args.conf_file.as_deref()) {
        Ok(base) => base,
        Err(e) => {
            error!(top ; "{e}");
            tracker.shutdown();
            return Err(e);
        }
    };
    let options = SweepOptions {
        thresholds: args.thresholds.clone(),
        policies: args.policies.clone(),
        turns: args.turns,
        scale: args.scale,
        drops_retry: args.no_drops_retry.then_some(false),
    };
    let configs = build_sweep(&base, &options);
    info!(top ; "Running {} configurations: {}", configs.len(), describe_sweep(&configs));
    info!(top ; "Static thresholds: {}", options.thresholds.iter().join(","));

    let progress_bar = if args.progress {
        ProgressBar::new(configs.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    let num_configs = configs.len();
    let results = engine.run_sweep_with(configs, |_| progress_bar.inc(1));
    progress_bar.finish();

    println!("{}", format_header());
    let mut num_failed = 0;
    for result in &results {
        match result {
            Ok(summary) => println!("{}", format_row(summary)),
            Err(e) => {
                num_failed += 1;
                println!("{e}");
            }
        }
    }

    engine.shutdown();
    if num_failed > 0 {
        return sim_error!(format!("{num_failed}/{num_configs} runs failed"));
    }
    Ok(())
}
