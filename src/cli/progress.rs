//! Progress bar utilities for CLI output
//!
//! Key features:
//! - A spinner while scanning and a bar while transferring, driven by run events
//! - Log records are written through the same `MultiProgress`, so they
//!   suspend the bar instead of tearing it
//! - Optional tee of log records into a file

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use crate::core::progress::{ExportEvent, ProgressSink, RunState, RunSummary};
use crate::ui::events::{estimate_remaining, format_duration, format_eta};

// ============================================================================
// Styles - Consistent visual appearance
// ============================================================================

/// Get the spinner style for scanning
fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷")
}

/// Get the progress bar style for transfers
fn progress_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  {spinner:.green} [{bar:40.cyan/dim}] {pos}/{len} ({percent}%) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━╾─")
}

/// Get the style for completed progress bars
fn completed_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  ✓ [{bar:40.green/dim}] {pos}/{len} ({percent}%) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━━")
}

// ============================================================================
// Console output helpers
// ============================================================================

/// Print a header section with a box
pub fn print_header(title: &str) {
    let width = 68;
    let title_padded = format!("{:^width$}", title, width = width - 4);
    println!();
    println!("╔{}╗", "═".repeat(width - 2));
    println!("║ {} ║", title_padded);
    println!("╚{}╝", "═".repeat(width - 2));
    println!();
}

/// Print a success message with checkmark
pub fn print_success(msg: &str) {
    println!("  ✓ {}", msg);
}

/// Print an info message with bullet
pub fn print_info(msg: &str) {
    println!("  • {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("  ⚠ {}", msg);
}

/// Print an error message
pub fn print_error(msg: &str) {
    println!("  ✗ {}", msg);
}

/// Print the end-of-run summary block
pub fn print_summary(summary: &RunSummary) {
    println!();
    match summary.state {
        RunState::Completed => print_success("Export complete"),
        RunState::Cancelled => print_warning("Export cancelled"),
        other => print_error(&format!("Export ended: {}", other)),
    }
    print_info(&format!("Scanned:  {}", summary.scanned));
    print_info(&format!("Planned:  {}", summary.planned));
    print_info(&format!("Exported: {}", summary.exported));
    print_info(&format!("Errors:   {}", summary.errors));
    print_info(&format!("Time:     {}", format_duration(summary.elapsed())));
}

// ============================================================================
// Run progress display
// ============================================================================

/// Renders run events as a spinner, then a progress bar
///
/// Log lines are not printed here; they reach the terminal through the
/// logger, which shares this display's [`MultiProgress`].
pub struct RunProgress {
    bar: ProgressBar,
    started: Instant,
}

impl RunProgress {
    pub fn new(multi: &MultiProgress) -> Self {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.set_style(spinner_style());
        Self {
            bar,
            started: Instant::now(),
        }
    }

    /// A display that draws nothing, for `--json` output
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            started: Instant::now(),
        }
    }

    fn on_phase(&self, state: RunState) {
        match state {
            RunState::Scanning => {
                self.bar.enable_steady_tick(Duration::from_millis(100));
                self.bar.set_message("Scanning source...");
            }
            RunState::Transferring => {
                self.bar.set_style(progress_bar_style());
                self.bar.set_message("Transferring...");
            }
            RunState::Completed => {
                self.bar.set_style(completed_style());
                self.bar.finish_with_message(format!(
                    "Complete in {}",
                    format_duration(self.started.elapsed())
                ));
            }
            RunState::Cancelled => self.bar.abandon_with_message("✗ Cancelled"),
            RunState::Failed => self.bar.abandon_with_message("✗ Failed"),
            RunState::Idle => {}
        }
    }
}

impl ProgressSink for RunProgress {
    fn emit(&self, event: ExportEvent) {
        match event {
            ExportEvent::PhaseChanged(state) => self.on_phase(state),
            ExportEvent::PlanReady { total } => {
                self.bar.set_length(total as u64);
                self.bar.set_position(0);
            }
            ExportEvent::Counters(snapshot) => {
                if self.bar.length().is_some() {
                    self.bar.set_position(snapshot.processed as u64);
                    let eta = estimate_remaining(&snapshot, self.started.elapsed());
                    self.bar.set_message(format!(
                        "{} error(s), ETA {}",
                        snapshot.errors,
                        format_eta(eta)
                    ));
                } else {
                    self.bar.set_message(format!(
                        "Scanning: {} files found ({:.0}s)",
                        snapshot.scanned,
                        self.started.elapsed().as_secs_f64()
                    ));
                }
            }
            ExportEvent::Failed { error } => {
                self.bar.abandon_with_message(format!("✗ {}", error));
            }
            ExportEvent::Log { .. } | ExportEvent::Finished(_) => {}
        }
    }
}

// ============================================================================
// Dual writer for file + console logging
// ============================================================================

/// A writer that writes to both console and file
///
/// Console output goes through the shared [`MultiProgress`] so any active
/// bar is cleared before the record and redrawn after it.
pub struct DualWriter {
    pub progress: MultiProgress,
    pub file: Option<File>,
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Write to console
        self.progress.suspend(|| {
            let _ = io::stderr().write_all(buf);
        });
        // Write to file
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = io::stderr().flush();
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
