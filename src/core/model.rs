//! Run configuration handed to the pipeline
//!
//! A [`TransferConfig`] is built once by the front-end (CLI or GUI), validated,
//! and then passed by reference into the pipeline. Nothing reads shared or
//! global state mid-run.

use crate::core::error::{ExportError, Result};
use crate::device::DeviceHandle;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Date format accepted for range boundaries
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Media subfolders present under a WhatsApp `Media` directory
pub const DEFAULT_SUBFOLDERS: &[&str] = &[
    "WhatsApp Images",
    "WhatsApp Video",
    "WhatsApp Documents",
    "WhatsApp Audio",
    "WhatsApp Voice Notes",
    "WhatsApp Animated Gifs",
];

/// Short command-line aliases for the default subfolders
const SUBFOLDER_ALIASES: &[(&str, &str)] = &[
    ("images", "WhatsApp Images"),
    ("video", "WhatsApp Video"),
    ("videos", "WhatsApp Video"),
    ("documents", "WhatsApp Documents"),
    ("audio", "WhatsApp Audio"),
    ("voice-notes", "WhatsApp Voice Notes"),
    ("voice notes", "WhatsApp Voice Notes"),
    ("gifs", "WhatsApp Animated Gifs"),
    ("animated gifs", "WhatsApp Animated Gifs"),
];

/// Expand a short alias (`images`, `voice-notes`, ...) to its folder name.
///
/// Anything that is not an alias is returned unchanged, so exact folder
/// names and custom folders pass straight through.
pub fn expand_subfolder_alias(name: &str) -> String {
    let trimmed = name.trim();
    let lower = trimmed.to_lowercase();
    SUBFOLDER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, folder)| (*folder).to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Parse a strict `YYYY-MM-DD` date.
///
/// chrono alone accepts single-digit months and days, so the shape is
/// checked first.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    let bytes = s.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());

    if !shaped {
        return Err(ExportError::InvalidDate(s.to_string()));
    }

    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| ExportError::InvalidDate(s.to_string()))
}

/// Where files are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Android device over adb
    #[default]
    Usb,
    /// Folder previously copied from the phone
    Local,
}

impl SourceKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            SourceKind::Usb => "USB Device (ADB)",
            SourceKind::Local => "Local Folder",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Whether files are copied or moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    #[default]
    Copy,
    /// Only permitted for local sources
    Move,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::Copy => write!(f, "copy"),
            TransferMode::Move => write!(f, "move"),
        }
    }
}

/// Concrete source selected for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Usb { device: DeviceHandle },
    Local { root: PathBuf },
}

impl SourceSpec {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceSpec::Usb { .. } => SourceKind::Usb,
            SourceSpec::Local { .. } => SourceKind::Local,
        }
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSpec::Usb { device } => write!(f, "device {}", device),
            SourceSpec::Local { root } => write!(f, "{}", root.display()),
        }
    }
}

/// Immutable configuration for one export run
#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub source: SourceSpec,
    pub destination_root: PathBuf,
    /// Inclusive
    pub start_date: NaiveDate,
    /// Inclusive
    pub end_date: NaiveDate,
    /// Subfolders whose files may be exported
    pub enabled_subfolders: BTreeSet<String>,
    /// Subfolders enumerated (and counted as scanned) on the source.
    /// Enabled subfolders are always enumerated as well.
    pub known_subfolders: Vec<String>,
    pub mode: TransferMode,
}

impl TransferConfig {
    /// Create a config with every default subfolder enabled
    pub fn new(
        source: SourceSpec,
        destination_root: impl Into<PathBuf>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            source,
            destination_root: destination_root.into(),
            start_date,
            end_date,
            enabled_subfolders: DEFAULT_SUBFOLDERS.iter().map(|s| s.to_string()).collect(),
            known_subfolders: DEFAULT_SUBFOLDERS.iter().map(|s| s.to_string()).collect(),
            mode: TransferMode::Copy,
        }
    }

    /// Replace the enabled subfolder set
    pub fn with_subfolders<I, S>(mut self, subfolders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.enabled_subfolders = subfolders
            .into_iter()
            .map(|s| expand_subfolder_alias(s.as_ref()))
            .collect();
        self
    }

    pub fn with_mode(mut self, mode: TransferMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source.kind()
    }

    pub fn is_enabled(&self, subfolder: &str) -> bool {
        self.enabled_subfolders.contains(subfolder)
    }

    /// Inclusive calendar-date containment
    pub fn in_range(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Subfolders to enumerate: the known catalogue followed by any enabled
    /// custom folder not already in it.
    pub fn scan_subfolders(&self) -> Vec<String> {
        let mut folders = self.known_subfolders.clone();
        for name in &self.enabled_subfolders {
            if !folders.contains(name) {
                folders.push(name.clone());
            }
        }
        folders
    }

    /// Validate before any file is touched
    pub fn validate(&self) -> Result<()> {
        self.validate_selection()?;

        if self.destination_root.as_os_str().is_empty() {
            return Err(ExportError::MissingDestination);
        }

        Ok(())
    }

    /// Everything `validate` checks except the destination, for dry scans
    pub fn validate_selection(&self) -> Result<()> {
        if self.end_date < self.start_date {
            return Err(ExportError::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }

        if self.mode == TransferMode::Move && self.source_kind() == SourceKind::Usb {
            return Err(ExportError::InvalidTransferMode);
        }

        if self.enabled_subfolders.is_empty() {
            return Err(ExportError::NoSubfoldersSelected);
        }

        match &self.source {
            SourceSpec::Usb { device } => {
                if device.serial.trim().is_empty() {
                    return Err(ExportError::NoDeviceSelected);
                }
            }
            SourceSpec::Local { root } => {
                if !root.is_dir() {
                    return Err(ExportError::InvalidSource(root.clone()));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn usb_config() -> TransferConfig {
        TransferConfig::new(
            SourceSpec::Usb {
                device: DeviceHandle::new("emulator-5554"),
            },
            "/tmp/out",
            date("2025-09-17"),
            date("2025-12-17"),
        )
    }

    #[test]
    fn test_parse_date_strict() {
        assert_eq!(
            parse_date("2025-09-17").unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 17).unwrap()
        );
        assert_eq!(
            parse_date(" 2025-12-17 ").unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 17).unwrap()
        );

        for bad in ["2025-9-17", "2025-09-7", "25-09-17", "2025/09/17", "2025-13-01", "2025-02-30", ""] {
            assert!(
                matches!(parse_date(bad), Err(ExportError::InvalidDate(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_alias_expansion() {
        assert_eq!(expand_subfolder_alias("images"), "WhatsApp Images");
        assert_eq!(expand_subfolder_alias("Voice-Notes"), "WhatsApp Voice Notes");
        assert_eq!(expand_subfolder_alias("gifs"), "WhatsApp Animated Gifs");
        assert_eq!(expand_subfolder_alias("WhatsApp Stickers"), "WhatsApp Stickers");
    }

    #[test]
    fn test_validate_rejects_reversed_range() {
        let mut config = usb_config();
        config.end_date = date("2025-09-16");
        assert!(matches!(
            config.validate(),
            Err(ExportError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn test_validate_accepts_single_day_range() {
        let mut config = usb_config();
        config.end_date = config.start_date;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_move_with_usb() {
        let config = usb_config().with_mode(TransferMode::Move);
        assert!(matches!(
            config.validate(),
            Err(ExportError::InvalidTransferMode)
        ));
    }

    #[test]
    fn test_validate_rejects_empty_selection() {
        let config = usb_config().with_subfolders(Vec::<String>::new());
        assert!(matches!(
            config.validate(),
            Err(ExportError::NoSubfoldersSelected)
        ));

        let mut config = usb_config();
        config.source = SourceSpec::Usb {
            device: DeviceHandle::new(" "),
        };
        assert!(matches!(config.validate(), Err(ExportError::NoDeviceSelected)));
    }

    #[test]
    fn test_destination_only_required_for_transfers() {
        let mut config = usb_config();
        config.destination_root = PathBuf::new();
        assert!(matches!(config.validate(), Err(ExportError::MissingDestination)));
        assert!(config.validate_selection().is_ok());

        config.end_date = date("2025-09-01");
        assert!(matches!(
            config.validate_selection(),
            Err(ExportError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn test_validate_local_source_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = usb_config().with_mode(TransferMode::Move);
        config.source = SourceSpec::Local {
            root: dir.path().to_path_buf(),
        };
        assert!(config.validate().is_ok());

        config.source = SourceSpec::Local {
            root: dir.path().join("missing"),
        };
        assert!(matches!(config.validate(), Err(ExportError::InvalidSource(_))));
    }

    #[test]
    fn test_scan_subfolders_includes_custom_enabled() {
        let config = usb_config().with_subfolders(["images", "WhatsApp Stickers"]);
        let folders = config.scan_subfolders();
        assert_eq!(folders.len(), DEFAULT_SUBFOLDERS.len() + 1);
        assert_eq!(folders.last().map(String::as_str), Some("WhatsApp Stickers"));
        assert!(config.is_enabled("WhatsApp Images"));
        assert!(!config.is_enabled("WhatsApp Video"));
    }

    #[test]
    fn test_in_range_is_inclusive() {
        let config = usb_config();
        assert!(config.in_range(date("2025-09-17")));
        assert!(config.in_range(date("2025-12-17")));
        assert!(!config.in_range(date("2025-09-16")));
        assert!(!config.in_range(date("2025-12-18")));
    }
}
