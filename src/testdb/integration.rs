//! End-to-end runs through the public entry points
//!
//! Local runs go against scratch folders on disk; USB runs go against the
//! mock bridge. Everything goes through `pipeline::run`, the controller or
//! the config loader, the same way the CLI drives them.

use super::fixtures::{list_relative, MediaTreeBuilder};
use super::mock_bridge::MockBridge;
use crate::core::config::Config;
use crate::core::error::{ExportError, Result};
use crate::core::model::{parse_date, SourceKind, SourceSpec, TransferConfig, TransferMode};
use crate::core::pipeline;
use crate::core::progress::{
    CancelToken, ExportEvent, FnSink, LogLevel, ProgressReporter, RunState, RunSummary,
    TransferCounters,
};
use crate::device::DeviceHandle;
use crate::source::SourceSettings;
use crate::ui::{ExportController, UiEvent};
use chrono::NaiveDate;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

const SERIAL: &str = "0123456789ABCDEF";
const MEDIA: &str = "/storage/emulated/0/Android/media/com.whatsapp/WhatsApp/Media";

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn remote(relative: &str) -> String {
    format!("{}/{}", MEDIA, relative)
}

/// Run through `pipeline::run`, collecting log lines
fn run_collecting(
    config: &TransferConfig,
    settings: &SourceSettings,
) -> (Result<RunSummary>, Vec<(LogLevel, String)>) {
    let logs = Mutex::new(Vec::new());
    let sink = FnSink(|event| {
        if let ExportEvent::Log { level, message } = event {
            logs.lock().unwrap().push((level, message));
        }
    });
    let result = pipeline::run(
        config,
        settings,
        &CancelToken::new(),
        &TransferCounters::new(),
        &ProgressReporter::new(&sink),
    );
    let logs = logs.into_inner().unwrap();
    (result, logs)
}

fn local_spec(root: &Path) -> SourceSpec {
    SourceSpec::Local {
        root: root.to_path_buf(),
    }
}

fn usb_spec() -> SourceSpec {
    SourceSpec::Usb {
        device: DeviceHandle::new(SERIAL),
    }
}

// =============================================================================
// Local source
// =============================================================================

#[test]
fn test_local_export_from_backup_with_media_dir() {
    let tree = MediaTreeBuilder::new()
        .with_media_dir()
        .file("WhatsApp Images/IMG-20251001-WA0001.jpg", ymd(2025, 10, 1))
        .file("WhatsApp Images/Sent/IMG-20251002-WA0002.jpg", ymd(2025, 10, 2))
        .file("WhatsApp Voice Notes/202510/PTT-20251003-WA0003.opus", ymd(2025, 10, 3))
        .file("WhatsApp Images/IMG-20240101-WA0009.jpg", ymd(2024, 1, 1))
        .empty_dir("WhatsApp Documents")
        .build();
    let out = tempfile::tempdir().unwrap();
    let config = TransferConfig::new(
        local_spec(tree.root()),
        out.path(),
        ymd(2025, 9, 17),
        ymd(2025, 12, 17),
    );

    let (result, logs) = run_collecting(&config, &SourceSettings::default());
    let summary = result.unwrap();

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!((summary.scanned, summary.exported, summary.errors), (4, 3, 0));
    assert_eq!(
        list_relative(out.path()),
        vec![
            "WhatsApp Images/IMG-20251001-WA0001.jpg",
            "WhatsApp Images/Sent/IMG-20251002-WA0002.jpg",
            "WhatsApp Voice Notes/202510/PTT-20251003-WA0003.opus",
        ]
    );
    assert!(logs
        .iter()
        .any(|(_, m)| m == &format!("Media root detected: {}", tree.media_root().display())));
}

#[test]
fn test_local_move_then_rerun_finds_nothing() {
    let tree = MediaTreeBuilder::new()
        .file("WhatsApp Documents/a.pdf", ymd(2025, 5, 1))
        .file("WhatsApp Documents/b.pdf", ymd(2025, 5, 2))
        .build();
    let out = tempfile::tempdir().unwrap();
    let config = TransferConfig::new(
        local_spec(tree.root()),
        out.path(),
        ymd(2025, 1, 1),
        ymd(2025, 12, 31),
    )
    .with_mode(TransferMode::Move);

    let (first, _) = run_collecting(&config, &SourceSettings::default());
    assert_eq!(first.unwrap().exported, 2);
    assert!(!tree.path("WhatsApp Documents/a.pdf").exists());

    let (second, _) = run_collecting(&config, &SourceSettings::default());
    let second = second.unwrap();
    assert_eq!((second.scanned, second.exported), (0, 0));
    assert_eq!(list_relative(out.path()).len(), 2);
}

#[test]
fn test_local_copy_preserves_mtime() {
    let tree = MediaTreeBuilder::new()
        .file("WhatsApp Audio/AUD-1.opus", ymd(2025, 7, 4))
        .build();
    let out = tempfile::tempdir().unwrap();
    let config = TransferConfig::new(
        local_spec(tree.root()),
        out.path(),
        ymd(2025, 7, 4),
        ymd(2025, 7, 4),
    );
    run_collecting(&config, &SourceSettings::default()).0.unwrap();

    let copied = fs::metadata(out.path().join("WhatsApp Audio/AUD-1.opus")).unwrap();
    let original = fs::metadata(tree.path("WhatsApp Audio/AUD-1.opus")).unwrap();
    assert_eq!(copied.modified().unwrap(), original.modified().unwrap());
}

#[test]
fn test_missing_local_root_fails() {
    let out = tempfile::tempdir().unwrap();
    let config = TransferConfig::new(
        local_spec(&out.path().join("nope")),
        out.path().join("dest"),
        ymd(2025, 1, 1),
        ymd(2025, 1, 2),
    );
    let (result, _) = run_collecting(&config, &SourceSettings::default());
    assert!(matches!(result, Err(ExportError::InvalidSource(_))));
}

// =============================================================================
// USB source
// =============================================================================

#[test]
fn test_usb_export_preserves_device_mtime() {
    let bridge = MockBridge::new()
        .with_device(DeviceHandle::new(SERIAL))
        .with_file(&remote("WhatsApp Video/VID-1.mp4"), ymd(2025, 10, 20), b"video")
        .with_file(&remote("WhatsApp Video/VID-2.mp4"), ymd(2025, 6, 1), b"old");
    let bridge = Arc::new(bridge);
    let settings = SourceSettings::default().with_bridge(bridge.clone());
    let out = tempfile::tempdir().unwrap();
    let config = TransferConfig::new(usb_spec(), out.path(), ymd(2025, 9, 17), ymd(2025, 12, 17));

    let (result, logs) = run_collecting(&config, &settings);
    let summary = result.unwrap();

    assert_eq!((summary.scanned, summary.exported, summary.errors), (2, 1, 0));
    assert_eq!(bridge.pulled(), vec![remote("WhatsApp Video/VID-1.mp4")]);
    let target = out.path().join("WhatsApp Video/VID-1.mp4");
    assert_eq!(fs::read(&target).unwrap(), b"video");
    let mtime = filetime::FileTime::from_last_modification_time(&fs::metadata(&target).unwrap());
    assert_eq!(
        mtime.unix_seconds(),
        crate::testdb::local_noon(ymd(2025, 10, 20)).timestamp()
    );
    assert!(logs
        .iter()
        .any(|(_, m)| m == &format!("Using WhatsApp Media root(s): {}", MEDIA)));
}

#[test]
fn test_usb_move_rejected_before_device_is_touched() {
    let bridge = Arc::new(
        MockBridge::new()
            .with_device(DeviceHandle::new(SERIAL))
            .with_file(&remote("WhatsApp Images/a.jpg"), ymd(2025, 10, 1), b"a"),
    );
    let settings = SourceSettings::default().with_bridge(bridge.clone());
    let out = tempfile::tempdir().unwrap();
    let config = TransferConfig::new(usb_spec(), out.path(), ymd(2025, 1, 1), ymd(2025, 12, 31))
        .with_mode(TransferMode::Move);

    let (result, _) = run_collecting(&config, &settings);
    assert!(matches!(result, Err(ExportError::InvalidTransferMode)));
    assert_eq!(bridge.stats().list_devices, 0);
    assert_eq!(bridge.stats().pulls, 0);
    assert!(list_relative(out.path()).is_empty());
}

#[test]
fn test_bridge_unavailable_fails_run() {
    let settings = SourceSettings::default().with_bridge(Arc::new(MockBridge::unavailable()));
    let out = tempfile::tempdir().unwrap();
    let config = TransferConfig::new(usb_spec(), out.path(), ymd(2025, 1, 1), ymd(2025, 12, 31));

    let (result, _) = run_collecting(&config, &settings);
    assert!(matches!(result, Err(ExportError::BridgeUnavailable { .. })));
}

#[test]
fn test_listing_error_is_not_fatal() {
    let bridge = MockBridge::new()
        .with_device(DeviceHandle::new(SERIAL))
        .with_file(&remote("WhatsApp Images/a.jpg"), ymd(2025, 3, 1), b"a")
        .with_file(&remote("WhatsApp Audio/b.opus"), ymd(2025, 3, 1), b"b")
        .with_find_error(&remote("WhatsApp Audio"));
    let settings = SourceSettings::default().with_bridge(Arc::new(bridge));
    let out = tempfile::tempdir().unwrap();
    let config = TransferConfig::new(usb_spec(), out.path(), ymd(2025, 1, 1), ymd(2025, 12, 31));

    let (result, logs) = run_collecting(&config, &settings);
    let summary = result.unwrap();
    assert_eq!((summary.exported, summary.errors), (1, 1));
    assert!(logs.iter().any(|(level, m)| *level == LogLevel::Error
        && m.starts_with(&format!("ERROR listing files in: {}", remote("WhatsApp Audio")))));
}

#[test]
fn test_listing_error_in_unselected_subfolder_is_ignored() {
    let bridge = MockBridge::new()
        .with_device(DeviceHandle::new(SERIAL))
        .with_file(&remote("WhatsApp Images/img1.jpg"), ymd(2025, 9, 20), b"i")
        .with_file(&remote("WhatsApp Video/vid1.mp4"), ymd(2025, 9, 20), b"v")
        .with_find_error(&remote("WhatsApp Video"));
    let settings = SourceSettings::default().with_bridge(Arc::new(bridge));
    let out = tempfile::tempdir().unwrap();
    let config = TransferConfig::new(usb_spec(), out.path(), ymd(2025, 9, 17), ymd(2025, 12, 17))
        .with_subfolders(["WhatsApp Images"]);

    let (result, logs) = run_collecting(&config, &settings);
    let summary = result.unwrap();
    assert_eq!((summary.scanned, summary.exported, summary.errors), (1, 1, 0));
    assert!(!logs.iter().any(|(level, _)| *level == LogLevel::Error));
}

#[test]
fn test_unselected_subfolder_is_listed_without_stat() {
    let mut bridge = MockBridge::new()
        .with_device(DeviceHandle::new(SERIAL))
        .with_file(&remote("WhatsApp Images/img1.jpg"), ymd(2025, 9, 20), b"i");
    for i in 0..50 {
        let path = remote(&format!("WhatsApp Video/VID-{:03}.mp4", i));
        bridge = bridge
            .with_file(&path, ymd(2025, 9, 20), b"v")
            .without_batch_stat(&path);
    }
    let bridge = Arc::new(bridge);
    let settings = SourceSettings::default().with_bridge(bridge.clone());
    let out = tempfile::tempdir().unwrap();
    let config = TransferConfig::new(usb_spec(), out.path(), ymd(2025, 9, 17), ymd(2025, 12, 17))
        .with_subfolders(["images"]);

    let summary = run_collecting(&config, &settings).0.unwrap();
    assert_eq!((summary.scanned, summary.exported, summary.errors), (51, 1, 0));

    let stats = bridge.stats();
    assert_eq!(stats.single_stat_calls, 0);
    assert_eq!(stats.batch_stat_calls, 1);
    assert_eq!(list_relative(out.path()), vec!["WhatsApp Images/img1.jpg"]);
}

#[test]
fn test_controller_runs_usb_export() {
    let bridge = MockBridge::new()
        .with_device(DeviceHandle::new(SERIAL))
        .with_file(&remote("WhatsApp Animated Gifs/g.mp4"), ymd(2025, 11, 11), b"g");
    let settings = SourceSettings::default().with_bridge(Arc::new(bridge));
    let out = tempfile::tempdir().unwrap();
    let config = TransferConfig::new(usb_spec(), out.path(), ymd(2025, 11, 1), ymd(2025, 11, 30))
        .with_subfolders(["gifs"]);

    let controller = ExportController::new();
    controller.start(config, settings).unwrap();
    let summary = controller.wait().unwrap();

    assert_eq!(summary.exported, 1);
    let phases: Vec<RunState> = controller
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            UiEvent::Export(ExportEvent::PhaseChanged(s)) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![RunState::Scanning, RunState::Transferring, RunState::Completed]
    );
}

// =============================================================================
// Config file to run
// =============================================================================

#[test]
fn test_config_file_drives_local_run() {
    let tree = MediaTreeBuilder::new()
        .file("WhatsApp Images/a.jpg", ymd(2025, 10, 1))
        .file("WhatsApp Video/b.mp4", ymd(2025, 10, 1))
        .build();
    let out = tempfile::tempdir().unwrap();
    let toml_text = format!(
        r#"
[source]
kind = "local"
local_root = {root:?}

[output]
directory = {out:?}

[filter]
start_date = "2025-09-17"
end_date = "2025-12-17"
subfolders = ["video"]
"#,
        root = tree.root().display().to_string(),
        out = out.path().display().to_string(),
    );
    let config_path = out.path().join("wa_export.toml");
    fs::write(&config_path, toml_text).unwrap();

    let config = Config::load(&config_path).unwrap();
    assert_eq!(config.source.kind, SourceKind::Local);
    let root = config.source.local_root.clone().unwrap();
    let transfer = config.to_transfer_config(local_spec(&root)).unwrap();
    assert_eq!(transfer.start_date, parse_date("2025-09-17").unwrap());
    assert!(transfer.is_enabled("WhatsApp Video"));
    assert!(!transfer.is_enabled("WhatsApp Images"));

    let (result, _) = run_collecting(&transfer, &SourceSettings::from_config(&config));
    assert_eq!(result.unwrap().exported, 1);
    assert!(out.path().join("WhatsApp Video/b.mp4").exists());
}
