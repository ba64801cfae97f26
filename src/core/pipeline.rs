//! Export pipeline
//!
//! One run moves through `Idle -> Scanning -> Transferring` and ends in
//! `Completed`, `Cancelled` or `Failed`. Configuration and reachability
//! problems fail the run before anything is transferred; per-file problems
//! are only counted.

use crate::core::error::{ExportError, Result};
use crate::core::executor;
use crate::core::model::{SourceKind, TransferConfig};
use crate::core::planner::{build_plan, TransferPlan};
use crate::core::progress::{CancelToken, ProgressReporter, RunState, RunSummary, TransferCounters};
use crate::source::{open_source, CandidateFile, MediaSource, SourceSettings};
use std::fs;
use std::time::Instant;

/// Result of the scanning phase
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub plan: TransferPlan,
    /// Cancellation was observed while enumerating
    pub cancelled: bool,
}

/// Validate, open the configured source, and run the export
///
/// This is what front-ends call. Opening a USB source probes the device,
/// so it happens after the run has entered `Scanning`.
pub fn run(
    config: &TransferConfig,
    settings: &SourceSettings,
    cancel: &CancelToken,
    counters: &TransferCounters,
    reporter: &ProgressReporter<'_>,
) -> Result<RunSummary> {
    let started = Instant::now();
    counters.reset();
    prepare(config, reporter)?;

    reporter.phase(RunState::Scanning);
    let source = open_source(&config.source, settings).map_err(|e| fail(reporter, e))?;
    reporter.info(format!("Source: {}", source.describe()));

    scan_and_transfer(config, source.as_ref(), cancel, counters, reporter, started)
}

/// Run the export against an already opened source
pub fn run_export(
    config: &TransferConfig,
    source: &dyn MediaSource,
    cancel: &CancelToken,
    counters: &TransferCounters,
    reporter: &ProgressReporter<'_>,
) -> Result<RunSummary> {
    let started = Instant::now();
    counters.reset();
    prepare(config, reporter)?;

    reporter.phase(RunState::Scanning);
    scan_and_transfer(config, source, cancel, counters, reporter, started)
}

/// Enumerate the source and build the plan without transferring anything
///
/// Counts every enumerated file as scanned and every unreadable timestamp
/// in an enabled subfolder as an error.
pub fn scan_source(
    config: &TransferConfig,
    source: &dyn MediaSource,
    cancel: &CancelToken,
    counters: &TransferCounters,
    reporter: &ProgressReporter<'_>,
) -> ScanResult {
    match source.kind() {
        SourceKind::Local => reporter.info(format!("Media root detected: {}", source.media_root())),
        SourceKind::Usb => {
            reporter.info(format!("Using WhatsApp Media root(s): {}", source.media_root()))
        }
    }

    let candidates = enumerate(config, source, cancel, counters, reporter);
    if cancel.is_cancelled() {
        return ScanResult {
            plan: TransferPlan::default(),
            cancelled: true,
        };
    }

    let plan = build_plan(config, candidates);
    for failure in &plan.timestamp_failures {
        counters.record_error();
        reporter.error(format!(
            "ERROR reading time: {} ({})",
            failure.location, failure.message
        ));
    }

    counters.set_planned(plan.len());
    reporter.counters(counters);
    reporter.plan_ready(plan.len());
    reporter.info(format!(
        "{} file(s) between {} and {} selected for {}",
        plan.len(),
        config.start_date,
        config.end_date,
        config.mode
    ));

    ScanResult {
        plan,
        cancelled: false,
    }
}

/// Validate the config and create the destination root
fn prepare(config: &TransferConfig, reporter: &ProgressReporter<'_>) -> Result<()> {
    config.validate().map_err(|e| fail(reporter, e))?;
    fs::create_dir_all(&config.destination_root).map_err(|e| fail(reporter, ExportError::Io(e)))?;
    Ok(())
}

fn fail(reporter: &ProgressReporter<'_>, error: ExportError) -> ExportError {
    reporter.phase(RunState::Failed);
    reporter.failed(error.to_string());
    error
}

fn enumerate(
    config: &TransferConfig,
    source: &dyn MediaSource,
    cancel: &CancelToken,
    counters: &TransferCounters,
    reporter: &ProgressReporter<'_>,
) -> Vec<CandidateFile> {
    let mut candidates = Vec::new();

    for subfolder in config.scan_subfolders() {
        if cancel.is_cancelled() {
            break;
        }

        // Unselected subfolders only count toward scanned; their times are never read
        let enabled = config.is_enabled(&subfolder);
        let location = source.subfolder_location(&subfolder);
        match source.list_subfolder(&subfolder, enabled) {
            Ok(Some(files)) => {
                counters.add_scanned(files.len());
                candidates.extend(files);
                reporter.scan_progress(counters);
            }
            Ok(None) if enabled => {
                reporter.info(format!("Skipping missing folder: {}", location));
            }
            Ok(None) => {
                log::debug!("Not present: {}", location);
            }
            Err(e) if enabled => {
                counters.record_error();
                reporter.error(format!("ERROR listing files in: {} ({})", location, e));
            }
            Err(e) => {
                log::debug!("Could not list unselected {}: {}", location, e);
            }
        }
    }

    candidates
}

fn scan_and_transfer(
    config: &TransferConfig,
    source: &dyn MediaSource,
    cancel: &CancelToken,
    counters: &TransferCounters,
    reporter: &ProgressReporter<'_>,
    started: Instant,
) -> Result<RunSummary> {
    let scan = scan_source(config, source, cancel, counters, reporter);

    let state = if scan.cancelled {
        counters.mark_cancelled();
        RunState::Cancelled
    } else {
        reporter.phase(RunState::Transferring);
        executor::execute(&scan.plan, source, config, cancel, counters, reporter)
    };

    reporter.phase(state);
    match state {
        RunState::Cancelled => reporter.warn("Cancelled by user."),
        _ => reporter.info(match source.kind() {
            SourceKind::Usb => "Export complete (ADB mode).",
            SourceKind::Local => "Export complete (local mode).",
        }),
    }

    let summary = RunSummary::from_snapshot(state, counters.snapshot(), started.elapsed());
    reporter.info(summary.finished_line());
    reporter.finished(&summary);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{parse_date, SourceSpec, TransferMode};
    use crate::core::progress::{ExportEvent, FnSink, NullSink};
    use crate::source::LocalSource;
    use crate::testdb::fixtures::{list_relative, MediaTreeBuilder};
    use chrono::NaiveDate;
    use std::sync::Mutex;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn local_config(root: &std::path::Path, out: &std::path::Path) -> TransferConfig {
        TransferConfig::new(
            SourceSpec::Local {
                root: root.to_path_buf(),
            },
            out,
            parse_date("2025-09-17").unwrap(),
            parse_date("2025-12-17").unwrap(),
        )
    }

    #[test]
    fn test_images_video_scenario() {
        let tree = MediaTreeBuilder::new()
            .with_media_dir()
            .file("WhatsApp Images/img1.jpg", ymd(2025, 10, 1))
            .file("WhatsApp Video/vid1.mp4", ymd(2025, 10, 1))
            .build();
        let out = tempfile::tempdir().unwrap();
        let config = local_config(tree.root(), out.path()).with_subfolders(["WhatsApp Images"]);
        let source = LocalSource::new(tree.root()).unwrap();

        let counters = TransferCounters::new();
        let sink = NullSink;
        let summary = run_export(
            &config,
            &source,
            &CancelToken::new(),
            &counters,
            &ProgressReporter::new(&sink),
        )
        .unwrap();

        assert_eq!(summary.state, RunState::Completed);
        assert_eq!(summary.planned, 1);
        assert_eq!((summary.scanned, summary.exported, summary.errors), (2, 1, 0));
        assert_eq!(list_relative(out.path()), vec!["WhatsApp Images/img1.jpg"]);
    }

    #[test]
    fn test_second_copy_run_creates_dup_files() {
        let tree = MediaTreeBuilder::new()
            .file("WhatsApp Images/a.jpg", ymd(2025, 10, 1))
            .file("WhatsApp Documents/b.pdf", ymd(2025, 10, 2))
            .build();
        let out = tempfile::tempdir().unwrap();
        let config = local_config(tree.root(), out.path());
        let source = LocalSource::new(tree.root()).unwrap();
        let sink = NullSink;

        for _ in 0..2 {
            let summary = run_export(
                &config,
                &source,
                &CancelToken::new(),
                &TransferCounters::new(),
                &ProgressReporter::new(&sink),
            )
            .unwrap();
            assert_eq!(summary.exported, 2);
        }

        assert_eq!(
            list_relative(out.path()),
            vec![
                "WhatsApp Documents/b.pdf",
                "WhatsApp Documents/b__dup1.pdf",
                "WhatsApp Images/a.jpg",
                "WhatsApp Images/a__dup1.jpg",
            ]
        );
    }

    #[test]
    fn test_invalid_config_fails_before_touching_files() {
        let tree = MediaTreeBuilder::new()
            .file("WhatsApp Images/a.jpg", ymd(2025, 10, 1))
            .build();
        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("never-created");
        let mut config = local_config(tree.root(), &dest);
        config.end_date = ymd(2025, 1, 1);
        let source = LocalSource::new(tree.root()).unwrap();

        let events = Mutex::new(Vec::new());
        let sink = FnSink(|e| events.lock().unwrap().push(e));
        let err = run_export(
            &config,
            &source,
            &CancelToken::new(),
            &TransferCounters::new(),
            &ProgressReporter::new(&sink),
        )
        .unwrap_err();

        assert!(matches!(err, ExportError::InvalidDateRange { .. }));
        assert!(!dest.exists());
        let events = events.lock().unwrap();
        assert!(events.contains(&ExportEvent::PhaseChanged(RunState::Failed)));
        assert!(events.iter().any(|e| matches!(e, ExportEvent::Failed { .. })));
        assert!(!events.iter().any(|e| matches!(e, ExportEvent::Finished(_))));
    }

    #[test]
    fn test_cancel_during_scan_transfers_nothing() {
        let tree = MediaTreeBuilder::new()
            .file("WhatsApp Images/a.jpg", ymd(2025, 10, 1))
            .build();
        let out = tempfile::tempdir().unwrap();
        let config = local_config(tree.root(), out.path());
        let source = LocalSource::new(tree.root()).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let sink = NullSink;
        let summary = run_export(
            &config,
            &source,
            &cancel,
            &TransferCounters::new(),
            &ProgressReporter::new(&sink),
        )
        .unwrap();

        assert_eq!(summary.state, RunState::Cancelled);
        assert!(summary.cancelled);
        assert_eq!(summary.exported, 0);
        assert!(list_relative(out.path()).is_empty());
    }

    #[test]
    fn test_event_sequence() {
        let tree = MediaTreeBuilder::new()
            .file("WhatsApp Images/a.jpg", ymd(2025, 10, 1))
            .build();
        let out = tempfile::tempdir().unwrap();
        let config = local_config(tree.root(), out.path());
        let source = LocalSource::new(tree.root()).unwrap();

        let phases = Mutex::new(Vec::new());
        let logs = Mutex::new(Vec::new());
        let sink = FnSink(|e| match e {
            ExportEvent::PhaseChanged(s) => phases.lock().unwrap().push(s),
            ExportEvent::Log { message, .. } => logs.lock().unwrap().push(message),
            _ => {}
        });
        run_export(
            &config,
            &source,
            &CancelToken::new(),
            &TransferCounters::new(),
            &ProgressReporter::new(&sink),
        )
        .unwrap();

        assert_eq!(
            *phases.lock().unwrap(),
            vec![RunState::Scanning, RunState::Transferring, RunState::Completed]
        );
        let logs = logs.lock().unwrap();
        assert!(logs.iter().any(|l| l.starts_with("Media root detected: ")));
        assert!(logs.iter().any(|l| l.starts_with("Skipping missing folder: ")));
        assert_eq!(
            logs.last().map(String::as_str),
            Some("Finished. Scanned=1, Exported=1, Errors=0.")
        );
    }

    #[test]
    fn test_unreadable_timestamp_counts_error() {
        struct BrokenTimes(LocalSource);

        impl MediaSource for BrokenTimes {
            fn kind(&self) -> SourceKind {
                self.0.kind()
            }
            fn describe(&self) -> String {
                self.0.describe()
            }
            fn media_root(&self) -> String {
                self.0.media_root()
            }
            fn subfolder_location(&self, subfolder: &str) -> String {
                self.0.subfolder_location(subfolder)
            }
            fn list_subfolder(
                &self,
                subfolder: &str,
                with_times: bool,
            ) -> Result<Option<Vec<CandidateFile>>> {
                Ok(self.0.list_subfolder(subfolder, with_times)?.map(|files| {
                    files
                        .into_iter()
                        .map(|mut f| {
                            f.modified = Err("no stat".into());
                            f
                        })
                        .collect()
                }))
            }
            fn transfer(
                &self,
                file: &CandidateFile,
                destination: &std::path::Path,
                mode: TransferMode,
            ) -> Result<()> {
                self.0.transfer(file, destination, mode)
            }
        }

        let tree = MediaTreeBuilder::new()
            .file("WhatsApp Images/a.jpg", ymd(2025, 10, 1))
            .build();
        let out = tempfile::tempdir().unwrap();
        let config = local_config(tree.root(), out.path());
        let source = BrokenTimes(LocalSource::new(tree.root()).unwrap());
        let sink = NullSink;
        let summary = run_export(
            &config,
            &source,
            &CancelToken::new(),
            &TransferCounters::new(),
            &ProgressReporter::new(&sink),
        )
        .unwrap();

        assert_eq!(summary.state, RunState::Completed);
        assert_eq!((summary.scanned, summary.exported, summary.errors), (1, 0, 1));
    }
}
