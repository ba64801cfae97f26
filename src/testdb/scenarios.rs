//! Predefined device scenarios
//!
//! Each scenario describes a simulated phone, the export settings to run
//! against it, and what the run should produce. They back the
//! `wa-export test` commands and the integration tests.

use crate::core::model::{parse_date, SourceSpec, TransferConfig, TransferMode};
use crate::core::pipeline;
use crate::core::progress::{CancelToken, NullSink, ProgressReporter, RunState, RunSummary, TransferCounters};
use crate::device::DeviceHandle;
use crate::source::SourceSettings;
use crate::testdb::{list_relative, MockBridge};
use chrono::NaiveDate;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Serial of the simulated phone
pub const SIM_SERIAL: &str = "SIM-0001";

const MEDIA: &str = "/storage/emulated/0/Android/media/com.whatsapp/WhatsApp/Media";
const LEGACY_MEDIA: &str = "/storage/emulated/0/WhatsApp/Media";

/// What a scenario run should end with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedOutcome {
    pub state: RunState,
    pub scanned: usize,
    pub exported: usize,
    pub errors: usize,
    /// Files under the destination root, sorted, `/`-separated
    pub files: Vec<String>,
}

impl ExpectedOutcome {
    pub fn completed(scanned: usize, exported: usize, errors: usize, files: &[&str]) -> Self {
        Self {
            state: RunState::Completed,
            scanned,
            exported,
            errors,
            files: files.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// The run fails before scanning
    pub fn failed() -> Self {
        Self {
            state: RunState::Failed,
            scanned: 0,
            exported: 0,
            errors: 0,
            files: Vec::new(),
        }
    }
}

/// A simulated phone plus export settings
#[derive(Clone)]
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub tags: &'static [&'static str],
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Enabled subfolders; empty means the defaults
    pub subfolders: Vec<String>,
    pub mode: TransferMode,
    build: fn() -> MockBridge,
    pub expected: ExpectedOutcome,
}

impl Scenario {
    /// Fresh simulated phone for this scenario
    pub fn bridge(&self) -> MockBridge {
        (self.build)()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(&tag)
    }

    /// Export settings writing into `destination`
    pub fn transfer_config(&self, destination: &Path) -> TransferConfig {
        let config = TransferConfig::new(
            SourceSpec::Usb {
                device: DeviceHandle::new(SIM_SERIAL),
            },
            destination,
            self.start_date,
            self.end_date,
        )
        .with_mode(self.mode);

        if self.subfolders.is_empty() {
            config
        } else {
            config.with_subfolders(&self.subfolders)
        }
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("expected", &self.expected)
            .finish()
    }
}

/// Result of running one scenario
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub name: String,
    /// Present unless the run failed outright
    pub summary: Option<RunSummary>,
    /// Fatal error, when the run failed
    pub error: Option<String>,
    pub files: Vec<String>,
    pub duration: Duration,
    /// Differences from the expected outcome; empty when the scenario passed
    pub mismatches: Vec<String>,
}

impl ScenarioOutcome {
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Run `scenario` against a fresh simulated phone, exporting into
/// `<output>/<scenario name>`
///
/// The scenario directory must be absent or empty.
pub fn run_scenario(scenario: &Scenario, output: &Path) -> ScenarioOutcome {
    let started = Instant::now();
    let destination = output.join(scenario.name);
    let mut outcome = ScenarioOutcome {
        name: scenario.name.to_string(),
        summary: None,
        error: None,
        files: Vec::new(),
        duration: Duration::ZERO,
        mismatches: Vec::new(),
    };

    if !list_relative(&destination).is_empty() {
        outcome.mismatches.push(format!(
            "output directory {} is not empty",
            destination.display()
        ));
        return outcome;
    }

    let config = scenario.transfer_config(&destination);
    let settings = SourceSettings::default().with_bridge(Arc::new(scenario.bridge()));
    let counters = TransferCounters::new();
    let sink = NullSink;
    let reporter = ProgressReporter::new(&sink);

    let state = match pipeline::run(&config, &settings, &CancelToken::new(), &counters, &reporter) {
        Ok(summary) => {
            let state = summary.state;
            outcome.summary = Some(summary);
            state
        }
        Err(e) => {
            outcome.error = Some(e.to_string());
            RunState::Failed
        }
    };

    outcome.files = list_relative(&destination);
    outcome.duration = started.elapsed();
    outcome.mismatches = compare(&scenario.expected, state, outcome.summary.as_ref(), &outcome.files);
    outcome
}

fn compare(
    expected: &ExpectedOutcome,
    state: RunState,
    summary: Option<&RunSummary>,
    files: &[String],
) -> Vec<String> {
    let mut mismatches = Vec::new();
    let mut check = |what: &str, want: String, got: String| {
        if want != got {
            mismatches.push(format!("{}: expected {}, got {}", what, want, got));
        }
    };

    check("state", expected.state.to_string(), state.to_string());
    if let Some(summary) = summary {
        check("scanned", expected.scanned.to_string(), summary.scanned.to_string());
        check("exported", expected.exported.to_string(), summary.exported.to_string());
        check("errors", expected.errors.to_string(), summary.errors.to_string());
    }
    check("files", format!("{:?}", expected.files), format!("{:?}", files));
    mismatches
}

fn date(s: &str) -> NaiveDate {
    parse_date(s).unwrap_or(NaiveDate::MIN)
}

fn sim_phone() -> MockBridge {
    MockBridge::new().with_device(DeviceHandle::new(SIM_SERIAL).with_model("Simulated_Phone"))
}

fn media(relative: &str) -> String {
    format!("{}/{}", MEDIA, relative)
}

/// Library of predefined scenarios
pub struct ScenarioLibrary;

impl ScenarioLibrary {
    /// Images and video on the same day; only images enabled
    pub fn whatsapp_basic() -> Scenario {
        Scenario {
            name: "whatsapp_basic",
            description: "Images enabled, video present but disabled",
            tags: &["quick", "filter"],
            start_date: date("2025-09-17"),
            end_date: date("2025-12-17"),
            subfolders: vec!["WhatsApp Images".to_string()],
            mode: TransferMode::Copy,
            build: || {
                sim_phone()
                    .with_file(&media("WhatsApp Images/img1.jpg"), date("2025-10-01"), b"img1")
                    .with_file(&media("WhatsApp Video/vid1.mp4"), date("2025-10-01"), b"vid1")
            },
            expected: ExpectedOutcome::completed(2, 1, 0, &["WhatsApp Images/img1.jpg"]),
        }
    }

    /// Files one day either side of the range and on both ends
    pub fn date_boundaries() -> Scenario {
        Scenario {
            name: "date_boundaries",
            description: "Start and end dates are inclusive",
            tags: &["quick", "filter"],
            start_date: date("2025-09-17"),
            end_date: date("2025-12-17"),
            subfolders: Vec::new(),
            mode: TransferMode::Copy,
            build: || {
                sim_phone()
                    .with_file(&media("WhatsApp Images/before.jpg"), date("2025-09-16"), b"a")
                    .with_file(&media("WhatsApp Images/first.jpg"), date("2025-09-17"), b"b")
                    .with_file(&media("WhatsApp Images/Sent/mid.jpg"), date("2025-10-10"), b"c")
                    .with_file(&media("WhatsApp Images/last.jpg"), date("2025-12-17"), b"d")
                    .with_file(&media("WhatsApp Images/after.jpg"), date("2025-12-18"), b"e")
            },
            expected: ExpectedOutcome::completed(
                5,
                3,
                0,
                &[
                    "WhatsApp Images/Sent/mid.jpg",
                    "WhatsApp Images/first.jpg",
                    "WhatsApp Images/last.jpg",
                ],
            ),
        }
    }

    /// Media only under the pre-Android-11 location
    pub fn legacy_media_root() -> Scenario {
        Scenario {
            name: "legacy_media_root",
            description: "Falls back to /storage/emulated/0/WhatsApp/Media",
            tags: &["quick", "device"],
            start_date: date("2024-01-01"),
            end_date: date("2024-12-31"),
            subfolders: Vec::new(),
            mode: TransferMode::Copy,
            build: || {
                sim_phone()
                    .with_file(
                        &format!("{}/WhatsApp Voice Notes/202406/PTT-1.opus", LEGACY_MEDIA),
                        date("2024-06-01"),
                        b"ptt",
                    )
                    .with_file(
                        &format!("{}/WhatsApp Documents/report.pdf", LEGACY_MEDIA),
                        date("2024-03-05"),
                        b"pdf",
                    )
            },
            expected: ExpectedOutcome::completed(
                2,
                2,
                0,
                &[
                    "WhatsApp Documents/report.pdf",
                    "WhatsApp Voice Notes/202406/PTT-1.opus",
                ],
            ),
        }
    }

    /// One pull fails; the rest still arrive
    pub fn pull_errors() -> Scenario {
        Scenario {
            name: "pull_errors",
            description: "A failed transfer is counted and the run continues",
            tags: &["errors"],
            start_date: date("2025-01-01"),
            end_date: date("2025-12-31"),
            subfolders: vec!["WhatsApp Documents".to_string()],
            mode: TransferMode::Copy,
            build: || {
                sim_phone()
                    .with_file(&media("WhatsApp Documents/a.pdf"), date("2025-02-01"), b"a")
                    .with_file(&media("WhatsApp Documents/b.pdf"), date("2025-02-02"), b"b")
                    .with_file(&media("WhatsApp Documents/c.pdf"), date("2025-02-03"), b"c")
                    .with_pull_error(&media("WhatsApp Documents/b.pdf"))
            },
            expected: ExpectedOutcome::completed(
                3,
                2,
                1,
                &["WhatsApp Documents/a.pdf", "WhatsApp Documents/c.pdf"],
            ),
        }
    }

    /// One file's timestamp cannot be read at all
    pub fn unreadable_timestamps() -> Scenario {
        Scenario {
            name: "unreadable_timestamps",
            description: "Files without a timestamp are skipped and counted as errors",
            tags: &["errors"],
            start_date: date("2025-01-01"),
            end_date: date("2025-12-31"),
            subfolders: Vec::new(),
            mode: TransferMode::Copy,
            build: || {
                let broken = media("WhatsApp Audio/AUD-2.opus");
                sim_phone()
                    .with_file(&media("WhatsApp Audio/AUD-1.opus"), date("2025-04-01"), b"1")
                    .with_file(&broken, date("2025-04-02"), b"2")
                    .without_batch_stat(&broken)
                    .with_stat_error(&broken)
            },
            expected: ExpectedOutcome::completed(2, 1, 1, &["WhatsApp Audio/AUD-1.opus"]),
        }
    }

    /// One subfolder cannot be listed
    pub fn listing_error() -> Scenario {
        Scenario {
            name: "listing_error",
            description: "An unlistable subfolder is counted as an error, others still export",
            tags: &["errors"],
            start_date: date("2025-01-01"),
            end_date: date("2025-12-31"),
            subfolders: Vec::new(),
            mode: TransferMode::Copy,
            build: || {
                sim_phone()
                    .with_file(&media("WhatsApp Images/ok.jpg"), date("2025-05-01"), b"ok")
                    .with_file(&media("WhatsApp Video/locked.mp4"), date("2025-05-01"), b"no")
                    .with_find_error(&media("WhatsApp Video"))
            },
            expected: ExpectedOutcome::completed(1, 1, 1, &["WhatsApp Images/ok.jpg"]),
        }
    }

    /// Everything is outside the range
    pub fn nothing_in_range() -> Scenario {
        Scenario {
            name: "nothing_in_range",
            description: "A run with an empty plan completes without transfers",
            tags: &["quick", "filter"],
            start_date: date("2025-11-01"),
            end_date: date("2025-11-30"),
            subfolders: Vec::new(),
            mode: TransferMode::Copy,
            build: || {
                sim_phone()
                    .with_file(&media("WhatsApp Animated Gifs/g.mp4"), date("2025-10-31"), b"g")
                    .with_file(&media("WhatsApp Images/i.jpg"), date("2025-12-01"), b"i")
            },
            expected: ExpectedOutcome::completed(2, 0, 0, &[]),
        }
    }

    /// Phone is attached but has no WhatsApp folder
    pub fn no_media_root() -> Scenario {
        Scenario {
            name: "no_media_root",
            description: "No accessible media root fails the run",
            tags: &["quick", "device"],
            start_date: date("2025-01-01"),
            end_date: date("2025-12-31"),
            subfolders: Vec::new(),
            mode: TransferMode::Copy,
            build: || sim_phone().with_file("/storage/emulated/0/DCIM/Camera/x.jpg", date("2025-01-02"), b"x"),
            expected: ExpectedOutcome::failed(),
        }
    }

    /// The selected phone has been unplugged
    pub fn device_disconnected() -> Scenario {
        Scenario {
            name: "device_disconnected",
            description: "A device that is no longer attached fails the run",
            tags: &["device"],
            start_date: date("2025-01-01"),
            end_date: date("2025-12-31"),
            subfolders: Vec::new(),
            mode: TransferMode::Copy,
            build: MockBridge::new,
            expected: ExpectedOutcome::failed(),
        }
    }

    /// Every scenario
    pub fn all() -> Vec<Scenario> {
        vec![
            Self::whatsapp_basic(),
            Self::date_boundaries(),
            Self::legacy_media_root(),
            Self::pull_errors(),
            Self::unreadable_timestamps(),
            Self::listing_error(),
            Self::nothing_in_range(),
            Self::no_media_root(),
            Self::device_disconnected(),
        ]
    }

    pub fn find(name: &str) -> Option<Scenario> {
        Self::all().into_iter().find(|s| s.name == name)
    }

    pub fn by_tag(tag: &str) -> Vec<Scenario> {
        Self::all().into_iter().filter(|s| s.has_tag(tag)).collect()
    }

    pub fn names() -> Vec<&'static str> {
        Self::all().iter().map(|s| s.name).collect()
    }
}

/// Where `wa-export test` writes when no output directory is given
pub fn default_output_dir() -> PathBuf {
    std::env::temp_dir().join("wa-export-scenarios")
}
