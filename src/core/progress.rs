//! Run state, counters, and progress reporting
//!
//! The executor side owns the authoritative [`TransferCounters`]. Front-ends
//! only ever see [`CounterSnapshot`] copies, delivered as [`ExportEvent`]s
//! through a [`ProgressSink`] or read directly with `snapshot()`.

use serde::Serialize;
use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Minimum gap between counter events while scanning
pub const DEFAULT_SCAN_THROTTLE: Duration = Duration::from_millis(250);

// =============================================================================
// Cancellation
// =============================================================================

/// Cooperative cancellation flag shared between the worker and front-ends
///
/// Cancellation is observed between files, never in the middle of one.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing flag (e.g. one set by a Ctrl+C handler)
    pub fn from_flag(flag: Arc<AtomicBool>) -> Self {
        Self(flag)
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

// =============================================================================
// Run State
// =============================================================================

/// Lifecycle of one export run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum RunState {
    Idle = 0,
    Scanning = 1,
    Transferring = 2,
    Completed = 3,
    Cancelled = 4,
    Failed = 5,
}

impl RunState {
    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Scanning | RunState::Transferring)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Cancelled | RunState::Failed
        )
    }
}

impl From<u8> for RunState {
    fn from(value: u8) -> Self {
        match value {
            1 => RunState::Scanning,
            2 => RunState::Transferring,
            3 => RunState::Completed,
            4 => RunState::Cancelled,
            5 => RunState::Failed,
            _ => RunState::Idle,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "Idle",
            RunState::Scanning => "Scanning",
            RunState::Transferring => "Transferring",
            RunState::Completed => "Completed",
            RunState::Cancelled => "Cancelled",
            RunState::Failed => "Failed",
        };
        write!(f, "{}", name)
    }
}

// =============================================================================
// Counters
// =============================================================================

/// Authoritative per-run counters
#[derive(Debug, Default)]
pub struct TransferCounters {
    /// Files enumerated on the source
    scanned: AtomicUsize,
    /// Entries in the transfer plan
    planned: AtomicUsize,
    /// Plan entries handled so far, successful or not
    processed: AtomicUsize,
    exported: AtomicUsize,
    errors: AtomicUsize,
    cancelled: AtomicBool,
}

impl TransferCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero everything for a new run
    pub fn reset(&self) {
        self.scanned.store(0, Ordering::SeqCst);
        self.planned.store(0, Ordering::SeqCst);
        self.processed.store(0, Ordering::SeqCst);
        self.exported.store(0, Ordering::SeqCst);
        self.errors.store(0, Ordering::SeqCst);
        self.cancelled.store(false, Ordering::SeqCst);
    }

    pub fn add_scanned(&self, count: usize) {
        self.scanned.fetch_add(count, Ordering::SeqCst);
    }

    pub fn set_planned(&self, count: usize) {
        self.planned.store(count, Ordering::SeqCst);
    }

    pub fn record_exported(&self) {
        self.exported.fetch_add(1, Ordering::SeqCst);
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    /// A plan entry failed to transfer
    pub fn record_failed(&self) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    /// An error outside the plan (e.g. an unreadable timestamp)
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }

    pub fn mark_cancelled(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            scanned: self.scanned.load(Ordering::SeqCst),
            planned: self.planned.load(Ordering::SeqCst),
            processed: self.processed.load(Ordering::SeqCst),
            exported: self.exported.load(Ordering::SeqCst),
            errors: self.errors.load(Ordering::SeqCst),
            cancelled: self.cancelled.load(Ordering::SeqCst),
        }
    }
}

/// Point-in-time copy of [`TransferCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub scanned: usize,
    pub planned: usize,
    pub processed: usize,
    pub exported: usize,
    pub errors: usize,
    pub cancelled: bool,
}

impl CounterSnapshot {
    /// Fraction of the plan handled, 0.0 to 1.0
    pub fn fraction_done(&self) -> f64 {
        if self.planned == 0 {
            return 0.0;
        }
        (self.processed as f64 / self.planned as f64).min(1.0)
    }
}

/// Final outcome of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub state: RunState,
    pub scanned: usize,
    pub planned: usize,
    pub exported: usize,
    pub errors: usize,
    pub cancelled: bool,
    /// Wall time in milliseconds
    pub elapsed_ms: u64,
}

impl RunSummary {
    pub fn from_snapshot(state: RunState, snapshot: CounterSnapshot, elapsed: Duration) -> Self {
        Self {
            state,
            scanned: snapshot.scanned,
            planned: snapshot.planned,
            exported: snapshot.exported,
            errors: snapshot.errors,
            cancelled: snapshot.cancelled,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    /// The line written to the log when a run ends
    pub fn finished_line(&self) -> String {
        format!(
            "Finished. Scanned={}, Exported={}, Errors={}.",
            self.scanned, self.exported, self.errors
        )
    }
}

// =============================================================================
// Events
// =============================================================================

/// Severity of a run log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn as_log_level(self) -> log::Level {
        match self {
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warning => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

/// Everything a front-end needs to render a run
#[derive(Debug, Clone, PartialEq)]
pub enum ExportEvent {
    PhaseChanged(RunState),
    Log { level: LogLevel, message: String },
    Counters(CounterSnapshot),
    /// Planning finished; `total` files will be transferred
    PlanReady { total: usize },
    Finished(RunSummary),
    /// A fatal error ended the run before or during scanning
    Failed { error: String },
}

/// Receiver of run events
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ExportEvent);
}

/// Sink that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: ExportEvent) {}
}

/// Sink backed by a closure
pub struct FnSink<F>(pub F);

impl<F> ProgressSink for FnSink<F>
where
    F: Fn(ExportEvent) + Send + Sync,
{
    fn emit(&self, event: ExportEvent) {
        (self.0)(event)
    }
}

// =============================================================================
// Reporter
// =============================================================================

/// Forwards run events to a sink
///
/// Log lines and phase changes go out immediately. Counter snapshots go out
/// per file while transferring and at most once per throttle interval while
/// scanning. The reporter holds no counters of its own.
pub struct ProgressReporter<'a> {
    sink: &'a dyn ProgressSink,
    scan_throttle: Duration,
    last_scan_emit: Cell<Option<Instant>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self::with_throttle(sink, DEFAULT_SCAN_THROTTLE)
    }

    pub fn with_throttle(sink: &'a dyn ProgressSink, scan_throttle: Duration) -> Self {
        Self {
            sink,
            scan_throttle,
            last_scan_emit: Cell::new(None),
        }
    }

    pub fn phase(&self, state: RunState) {
        log::debug!("Run state -> {}", state);
        self.sink.emit(ExportEvent::PhaseChanged(state));
    }

    /// Emit a log line to the sink and the `log` facade
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        log::log!(level.as_log_level(), "{}", message);
        self.sink.emit(ExportEvent::Log { level, message });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Counter snapshot, unthrottled
    pub fn counters(&self, counters: &TransferCounters) {
        self.sink.emit(ExportEvent::Counters(counters.snapshot()));
    }

    /// Counter snapshot, throttled; returns whether one was sent
    pub fn scan_progress(&self, counters: &TransferCounters) -> bool {
        let now = Instant::now();
        let due = match self.last_scan_emit.get() {
            Some(last) => now.duration_since(last) >= self.scan_throttle,
            None => true,
        };
        if due {
            self.last_scan_emit.set(Some(now));
            self.counters(counters);
        }
        due
    }

    pub fn plan_ready(&self, total: usize) {
        self.sink.emit(ExportEvent::PlanReady { total });
    }

    pub fn finished(&self, summary: &RunSummary) {
        self.sink.emit(ExportEvent::Finished(summary.clone()));
    }

    pub fn failed(&self, error: impl Into<String>) {
        let error = error.into();
        log::error!("{}", error);
        self.sink.emit(ExportEvent::Failed { error });
    }
}
