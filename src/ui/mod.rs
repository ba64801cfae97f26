//! UI Support Module
//!
//! Framework-agnostic building blocks for an interactive front-end: a
//! background [`ExportController`] and the [`UiEvent`]s it publishes.
//!
//! # Threading Model
//!
//! 1. **Event Channel** - the worker emits events through a crossbeam
//!    channel that the UI polls without blocking
//! 2. **Atomic State** - the run state is an atomic, so status checks never
//!    wait on the worker
//! 3. **Shared Counters** - counters are atomics readable from any thread
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use whatsapp_media_exporter::core::model::{parse_date, SourceSpec, TransferConfig};
//! use whatsapp_media_exporter::source::SourceSettings;
//! use whatsapp_media_exporter::ui::{ExportController, UiEvent};
//! use whatsapp_media_exporter::core::progress::ExportEvent;
//! use std::time::Duration;
//!
//! let controller = ExportController::new();
//! let config = TransferConfig::new(
//!     SourceSpec::Local { root: "/backup/WhatsApp".into() },
//!     "/exports",
//!     parse_date("2025-09-17").unwrap(),
//!     parse_date("2025-12-17").unwrap(),
//! );
//! controller.start(config, SourceSettings::default()).unwrap();
//!
//! while let Some(event) = controller.recv_event_timeout(Duration::from_millis(100)) {
//!     if let UiEvent::Export(ExportEvent::Finished(summary)) = event {
//!         println!("{}", summary.finished_line());
//!         break;
//!     }
//! }
//! ```

pub mod controller;
pub mod events;

pub use controller::ExportController;
pub use events::{
    estimate_remaining, format_duration, format_eta, format_rate, DeviceEvent, UiEvent,
};
