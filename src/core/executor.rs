//! Transfer execution
//!
//! Walks the plan strictly in order. A failed file is counted and logged,
//! then the next one is tried; nothing here aborts a run. Cancellation is
//! checked before each file.

use crate::core::collision;
use crate::core::error::ExportError;
use crate::core::model::TransferConfig;
use crate::core::planner::TransferPlan;
use crate::core::progress::{CancelToken, ProgressReporter, RunState, TransferCounters};
use crate::source::{CandidateFile, MediaSource};
use std::fs;
use std::path::PathBuf;

/// Display format for modification times in log lines
const MODIFIED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Transfer every plan entry; returns `Completed` or `Cancelled`
pub fn execute(
    plan: &TransferPlan,
    source: &dyn MediaSource,
    config: &TransferConfig,
    cancel: &CancelToken,
    counters: &TransferCounters,
    reporter: &ProgressReporter<'_>,
) -> RunState {
    for file in plan {
        if cancel.is_cancelled() {
            counters.mark_cancelled();
            return RunState::Cancelled;
        }

        match transfer_one(file, source, config) {
            Ok(_) => {
                counters.record_exported();
                reporter.info(exported_line(file));
            }
            Err(e) => {
                counters.record_failed();
                reporter.error(format!(
                    "ERROR exporting: {} ({})",
                    file.relative_path,
                    failure_detail(&e)
                ));
            }
        }

        reporter.counters(counters);
    }

    // A cancel that arrives after the last file changes nothing
    RunState::Completed
}

/// Resolve the destination for one file and transfer it there
fn transfer_one(
    file: &CandidateFile,
    source: &dyn MediaSource,
    config: &TransferConfig,
) -> Result<PathBuf, ExportError> {
    let target = file.destination_under(&config.destination_root);

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| ExportError::PerFileIo {
            path: file.relative_path.clone(),
            message: format!("cannot create '{}': {}", parent.display(), e),
        })?;
    }

    let destination = collision::resolve(&target);
    source.transfer(file, &destination, config.mode)?;
    Ok(destination)
}

fn exported_line(file: &CandidateFile) -> String {
    match &file.modified {
        Ok(time) => format!(
            "Exported: {}  (modified: {})",
            file.relative_path,
            time.format(MODIFIED_FORMAT)
        ),
        Err(_) => format!("Exported: {}", file.relative_path),
    }
}

fn failure_detail(error: &ExportError) -> String {
    match error {
        ExportError::PerFileIo { message, .. } => message.clone(),
        other => other.to_string(),
    }
}
