//! UI Events Module
//!
//! Events published by [`ExportController`](crate::ui::ExportController)
//! for a front-end to drain, and small formatting helpers for rendering
//! progress.

use crossbeam_channel::Sender;
use std::time::Duration;

use crate::core::progress::{CounterSnapshot, ExportEvent, ProgressSink};
use crate::device::DeviceHandle;

/// Device list changes
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// A refresh finished; the full current list
    Refreshed(Vec<DeviceHandle>),
    /// A refresh could not talk to the bridge
    RefreshFailed(String),
}

/// Everything a front-end receives from the controller
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Export(ExportEvent),
    Device(DeviceEvent),
}

impl From<ExportEvent> for UiEvent {
    fn from(event: ExportEvent) -> Self {
        UiEvent::Export(event)
    }
}

impl From<DeviceEvent> for UiEvent {
    fn from(event: DeviceEvent) -> Self {
        UiEvent::Device(event)
    }
}

// A dropped receiver means nobody is listening any more; events are discarded.
impl ProgressSink for Sender<UiEvent> {
    fn emit(&self, event: ExportEvent) {
        let _ = self.send(UiEvent::Export(event));
    }
}

impl ProgressSink for Sender<ExportEvent> {
    fn emit(&self, event: ExportEvent) {
        let _ = self.send(event);
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Estimated time left, from the average time per processed file so far
pub fn estimate_remaining(snapshot: &CounterSnapshot, elapsed: Duration) -> Option<Duration> {
    if snapshot.processed == 0 || snapshot.planned == 0 {
        return None;
    }
    let remaining = snapshot.planned.saturating_sub(snapshot.processed);
    let per_file = elapsed.as_secs_f64() / snapshot.processed as f64;
    Some(Duration::from_secs_f64(per_file * remaining as f64))
}

/// Format ETA as human-readable string
pub fn format_eta(eta: Option<Duration>) -> String {
    match eta {
        Some(d) if d.as_secs() == 0 => "< 1s".to_string(),
        Some(d) => format_duration(d),
        None => "calculating...".to_string(),
    }
}

/// Files per second over the run so far
pub fn format_rate(files: usize, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return "-".to_string();
    }
    format!("{:.1} files/s", files as f64 / secs)
}

// =============================================================================
// Tests
// =============================================================================
