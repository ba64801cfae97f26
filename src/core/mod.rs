//! Core functionality module
//!
//! The export engine: configuration, the run model, planning, transfer
//! and the pipeline that ties them together.
//!
//! # Submodules
//!
//! - `config` - Configuration loading, saving, and management
//! - `error` - Error types and result aliases
//! - `model` - Transfer configuration, date parsing and subfolder names
//! - `planner` - Candidate filtering by subfolder and date range
//! - `collision` - Non-overwriting destination names
//! - `executor` - Per-file transfer loop
//! - `pipeline` - Full run from validation to summary
//! - `progress` - Counters, run state, cancellation and events

pub mod collision;
pub mod config;
pub mod error;
pub mod executor;
pub mod model;
pub mod pipeline;
pub mod planner;
pub mod progress;

pub use error::{ExportError, Result};
pub use model::{SourceKind, SourceSpec, TransferConfig, TransferMode};
pub use pipeline::{run, run_export, scan_source, ScanResult};
pub use planner::{build_plan, TransferPlan};
pub use progress::{
    CancelToken, CounterSnapshot, ExportEvent, LogLevel, ProgressReporter, ProgressSink, RunState,
    RunSummary, TransferCounters,
};
