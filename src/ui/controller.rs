//! Export Controller Module
//!
//! Runs exports on a background thread so a front-end never blocks on the
//! device. The front-end starts a run, polls events, and may cancel; the
//! cancel takes effect before the next file.

use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::core::error::{ExportError, Result};
use crate::core::model::TransferConfig;
use crate::core::pipeline;
use crate::core::progress::{
    CancelToken, CounterSnapshot, ExportEvent, ProgressReporter, ProgressSink, RunState,
    RunSummary, TransferCounters,
};
use crate::device::DeviceHandle;
use crate::source::SourceSettings;
use crate::ui::events::{DeviceEvent, UiEvent};

/// Forwards events to the channel and mirrors phase changes into the
/// controller state
struct WorkerSink {
    state: Arc<AtomicU8>,
    event_tx: Sender<UiEvent>,
}

impl ProgressSink for WorkerSink {
    fn emit(&self, event: ExportEvent) {
        if let ExportEvent::PhaseChanged(state) = &event {
            self.state.store(*state as u8, Ordering::SeqCst);
        }
        let _ = self.event_tx.send(UiEvent::Export(event));
    }
}

/// Thread-safe export controller
///
/// At most one run is active at a time. Counters are shared with the
/// worker, so `counters()` is always current even if events are not
/// drained.
pub struct ExportController {
    state: Arc<AtomicU8>,
    cancel: CancelToken,
    counters: Arc<TransferCounters>,
    event_tx: Sender<UiEvent>,
    event_rx: Receiver<UiEvent>,
    worker_handle: Mutex<Option<JoinHandle<Option<RunSummary>>>>,
    last_summary: Arc<RwLock<Option<RunSummary>>>,
    last_error: Arc<RwLock<Option<String>>>,
}

impl ExportController {
    pub fn new() -> Self {
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        Self {
            state: Arc::new(AtomicU8::new(RunState::Idle as u8)),
            cancel: CancelToken::new(),
            counters: Arc::new(TransferCounters::new()),
            event_tx,
            event_rx,
            worker_handle: Mutex::new(None),
            last_summary: Arc::new(RwLock::new(None)),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn state(&self) -> RunState {
        RunState::from(self.state.load(Ordering::SeqCst))
    }

    /// Scanning or transferring
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Summary of the most recent finished run
    pub fn last_summary(&self) -> Option<RunSummary> {
        self.last_summary.read().ok().and_then(|s| s.clone())
    }

    /// Error that ended the most recent run, if it failed
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().ok().and_then(|e| e.clone())
    }

    /// Try to receive the next event (non-blocking)
    pub fn try_recv_event(&self) -> Option<UiEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Receive events with timeout
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<UiEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Drain all pending events
    pub fn drain_events(&self) -> Vec<UiEvent> {
        self.event_rx.try_iter().collect()
    }

    /// Start a run on a background thread
    ///
    /// The configuration is validated here so obvious mistakes are reported
    /// synchronously; the source is opened on the worker.
    pub fn start(&self, config: TransferConfig, settings: SourceSettings) -> Result<()> {
        config.validate()?;
        self.claim()?;

        // The previous worker already reported a terminal state; collect it
        // before reusing the shared counters
        self.join_worker();

        self.cancel.reset();
        self.counters.reset();
        self.state.store(RunState::Scanning as u8, Ordering::SeqCst);
        if let Ok(mut error) = self.last_error.write() {
            *error = None;
        }

        let state = Arc::clone(&self.state);
        let cancel = self.cancel.clone();
        let counters = Arc::clone(&self.counters);
        let event_tx = self.event_tx.clone();
        let last_summary = Arc::clone(&self.last_summary);
        let last_error = Arc::clone(&self.last_error);

        let handle = thread::spawn(move || {
            let sink = WorkerSink {
                state: Arc::clone(&state),
                event_tx,
            };
            let reporter = ProgressReporter::new(&sink);

            match pipeline::run(&config, &settings, &cancel, &counters, &reporter) {
                Ok(summary) => {
                    if let Ok(mut slot) = last_summary.write() {
                        *slot = Some(summary.clone());
                    }
                    Some(summary)
                }
                Err(e) => {
                    let _ = state.compare_exchange(
                        RunState::Scanning as u8,
                        RunState::Failed as u8,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    );
                    if let Ok(mut slot) = last_error.write() {
                        *slot = Some(e.to_string());
                    }
                    None
                }
            }
        });

        if let Ok(mut slot) = self.worker_handle.lock() {
            *slot = Some(handle);
        }
        Ok(())
    }

    /// Move from an inactive state to `Scanning`, or fail if a run holds it
    fn claim(&self) -> Result<()> {
        let mut current = self.state.load(Ordering::SeqCst);
        loop {
            if RunState::from(current).is_active() {
                return Err(ExportError::RunInProgress);
            }
            match self.state.compare_exchange(
                current,
                RunState::Scanning as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    /// Request cancellation; returns false when no run is active
    pub fn cancel(&self) -> bool {
        if !self.is_active() {
            return false;
        }
        log::info!("Cancellation requested");
        self.cancel.cancel();
        true
    }

    /// Block until the current run ends
    ///
    /// Returns the run's summary, or `None` if it failed before producing
    /// one (or there was no run).
    pub fn wait(&self) -> Option<RunSummary> {
        self.join_worker()
    }

    /// List attached devices and publish the result as a [`DeviceEvent`]
    pub fn refresh_devices(&self, settings: &SourceSettings) -> Result<Vec<DeviceHandle>> {
        let result = settings.bridge().and_then(|bridge| bridge.list_devices());
        let event = match &result {
            Ok(devices) => {
                log::info!("Found {} device(s)", devices.len());
                DeviceEvent::Refreshed(devices.clone())
            }
            Err(e) => {
                log::warn!("Device refresh failed: {}", e);
                DeviceEvent::RefreshFailed(e.to_string())
            }
        };
        let _ = self.event_tx.send(UiEvent::Device(event));
        result
    }

    /// Cancel any active run and wait for the worker
    pub fn shutdown(&self) {
        self.cancel();
        self.join_worker();
    }

    fn join_worker(&self) -> Option<RunSummary> {
        let handle = self.worker_handle.lock().ok().and_then(|mut h| h.take())?;
        match handle.join() {
            Ok(summary) => summary,
            Err(_) => {
                log::error!("{}", ExportError::WorkerPanicked);
                self.state.store(RunState::Failed as u8, Ordering::SeqCst);
                None
            }
        }
    }
}

impl Default for ExportController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ExportController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
