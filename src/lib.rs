//! WhatsApp Media Exporter Library
//!
//! Copies (or moves) WhatsApp media whose modification date falls in a date
//! range, from an Android phone over adb or from a WhatsApp folder already
//! copied to disk. Exported files keep their relative layout and their
//! original modification time.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`core`] - Configuration, errors, planning and the export pipeline
//! - [`device`] - The adb bridge and the [`device::DeviceBridge`] seam it implements
//! - [`source`] - Local and USB media sources behind one trait
//! - [`cli`] - Command-line interface (only used by the binary)
//! - [`testdb`] - A mock bridge and named scenarios for running without a phone
//! - [`ui`] - A background controller and event channel for interactive front-ends
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use whatsapp_media_exporter::core::config::Config;
//! use whatsapp_media_exporter::core::model::SourceSpec;
//! use whatsapp_media_exporter::core::pipeline;
//! use whatsapp_media_exporter::core::progress::{CancelToken, NullSink, ProgressReporter, TransferCounters};
//! use whatsapp_media_exporter::source::SourceSettings;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     let transfer = config.to_transfer_config(SourceSpec::Local {
//!         root: "/backup/WhatsApp".into(),
//!     })?;
//!
//!     let summary = pipeline::run(
//!         &transfer,
//!         &SourceSettings::from_config(&config),
//!         &CancelToken::new(),
//!         &TransferCounters::new(),
//!         &ProgressReporter::new(&NullSink),
//!     )?;
//!     println!("{}", summary.finished_line());
//!     Ok(())
//! }
//! ```
//!
//! # Testing Without a Device
//!
//! ```rust,no_run
//! use whatsapp_media_exporter::testdb::{run_scenario, ScenarioLibrary};
//!
//! for scenario in ScenarioLibrary::all() {
//!     let outcome = run_scenario(&scenario, std::path::Path::new("/tmp/wa-scenarios"));
//!     println!("{}: {}", outcome.name, outcome.passed());
//! }
//! ```

pub mod cli;
pub mod core;
pub mod device;
pub mod source;
pub mod testdb;
pub mod ui;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
