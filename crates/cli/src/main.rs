//! CLI entry point for the CC music converter
//!
//! Loads configuration, installs logging, waits for the user to fill the
//! input directory, then runs one conversion.

use cc_music_converter::{init_logging, Config, Pipeline};
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};

/// CC Music Converter - batch-convert audio files to DFPWM
#[derive(Parser, Debug)]
#[command(name = "cc-music-converter")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (config.toml); defaults apply if absent
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Skip the Java runtime check. For testing only.
    #[arg(long, default_value = "false")]
    skip_checks: bool,

    /// Start converting immediately instead of waiting for enter
    #[arg(long, default_value = "false")]
    no_wait: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match Config::load_or_default(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {}", args.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = match init_logging(&config.paths.log_file, LevelFilter::INFO) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", config.paths.log_file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = std::fs::create_dir_all(&config.paths.input_dir) {
        error!(
            "Fatal: unable to create {}: {}",
            config.paths.input_dir.display(),
            e
        );
        return ExitCode::from(1);
    }

    if !args.no_wait {
        info!("Place files in input directory and press enter when ready...");
        let mut line = String::new();
        if let Err(e) = std::io::stdin().lock().read_line(&mut line) {
            warn!("Unable to read from stdin: {}", e);
        }
    }

    if args.skip_checks {
        warn!("Skipping startup checks (--skip-checks enabled)");
    }

    match Pipeline::new(config).skip_checks(args.skip_checks).run().await {
        Ok(summary) => {
            info!(
                "Done Processing Files... {} converted, output in {}",
                summary.converted(),
                summary.working_dir.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Fatal: {}", e);
            ExitCode::from(1)
        }
    }
}
