//! Test Database Module
//!
//! Lets the exporter run end to end without a phone attached.
//!
//! # Features
//!
//! - **Mock Bridge**: [`MockBridge`] implements `DeviceBridge` over an
//!   in-memory file map, with per-path failure injection
//! - **Scenarios**: named device setups with expected run outcomes, runnable
//!   from the CLI (`wa-export test ...`)
//! - **Fixtures** (tests only): scratch WhatsApp folders on disk with
//!   controlled modification dates
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use whatsapp_media_exporter::testdb::{run_scenario, ScenarioLibrary};
//!
//! let scenario = ScenarioLibrary::find("date_boundaries").unwrap();
//! let outcome = run_scenario(&scenario, std::path::Path::new("/tmp/wa-test"));
//! println!("{}: {}", scenario.name, if outcome.passed() { "PASS" } else { "FAIL" });
//! ```

pub mod mock_bridge;
pub mod scenarios;

#[cfg(test)]
pub mod fixtures;
#[cfg(test)]
mod integration;

pub use mock_bridge::{MockBridge, MockBridgeStats, MockRemoteFile};
pub use scenarios::{run_scenario, ExpectedOutcome, Scenario, ScenarioLibrary, ScenarioOutcome};

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use std::path::Path;

/// Local noon of `date`, the timestamp every fixture file gets
pub fn local_noon(date: NaiveDate) -> DateTime<Local> {
    let naive = date.and_time(NaiveTime::MIN) + Duration::hours(12);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive).with_timezone(&Local))
}

/// Every regular file below `dir`, as sorted `/`-separated relative paths
pub fn list_relative(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path().strip_prefix(dir).ok().map(|p| {
                p.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_relative_sorted_slash_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("WhatsApp Images/Sent")).unwrap();
        std::fs::write(dir.path().join("WhatsApp Images/Sent/b.jpg"), b"b").unwrap();
        std::fs::write(dir.path().join("WhatsApp Images/a.jpg"), b"a").unwrap();

        assert_eq!(
            list_relative(dir.path()),
            vec!["WhatsApp Images/Sent/b.jpg", "WhatsApp Images/a.jpg"]
        );
        assert!(list_relative(&dir.path().join("missing")).is_empty());
    }

    #[test]
    fn test_local_noon_keeps_date() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 17).unwrap();
        let noon = local_noon(date);
        assert_eq!(noon.date_naive(), date);
        assert_eq!(noon.format("%H:%M").to_string(), "12:00");
    }
}
