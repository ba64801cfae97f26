//! WhatsApp Media Exporter - CLI Entry Point
//!
//! Exports WhatsApp media from an Android phone (over adb) or from a copied
//! WhatsApp folder, filtered by modification date.
//!
//! This binary is a thin wrapper around the library, handling argument parsing,
//! logging setup, and command dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Builder;
use indicatif::MultiProgress;
use log::{info, LevelFilter};
use std::fs::OpenOptions;
use std::io::Write;
use whatsapp_media_exporter::cli::{self, Args, DualWriter};
use whatsapp_media_exporter::core::config::Config;
use whatsapp_media_exporter::core::progress::CancelToken;

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(ref config_path) = args.config {
        match Config::load(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Warning: Failed to load config file: {}", e);
                Config::default()
            }
        }
    } else {
        Config::load_default().unwrap_or_default()
    };

    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }

    // Set up graceful shutdown handler
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();

    ctrlc::set_handler(move || {
        if handler_token.is_cancelled() {
            // Second Ctrl+C - force exit
            eprintln!("\nForce shutdown requested. Exiting immediately...");
            std::process::exit(1);
        } else {
            handler_token.cancel();
            eprintln!("\nCancelling after the current file... (Press Ctrl+C again to force quit)");
        }
    })
    .context("Failed to set Ctrl+C handler")?;

    let multi = MultiProgress::new();
    init_logging(&config, &multi)?;

    info!("WhatsApp Media Exporter v{}", whatsapp_media_exporter::VERSION);

    // Run the command
    cli::run_command(&args, &config, &cancel, &multi)?;

    Ok(())
}

/// Route log records through the progress display, optionally teeing to a file
fn init_logging(config: &Config, multi: &MultiProgress) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };

    if config.logging.log_to_file {
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.logging.log_file)
            .with_context(|| {
                format!(
                    "Failed to open log file {}",
                    config.logging.log_file.display()
                )
            })?;

        Builder::new()
            .filter_level(log_level)
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{} {} {}] {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                    record.level(),
                    record.target(),
                    record.args()
                )
            })
            .target(env_logger::Target::Pipe(Box::new(DualWriter {
                progress: multi.clone(),
                file: Some(log_file),
            })))
            .init();

        info!("Logging to file: {}", config.logging.log_file.display());
    } else {
        Builder::from_env(env_logger::Env::default().default_filter_or(&config.logging.level))
            .target(env_logger::Target::Pipe(Box::new(DualWriter {
                progress: multi.clone(),
                file: None,
            })))
            .init();
    }

    Ok(())
}
