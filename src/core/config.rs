//! Configuration module for the media exporter
//!
//! Supports loading configuration from a TOML file.
//! Configuration is stored in a standard location:
//! - Windows: %APPDATA%\whatsapp_media_exporter\config.toml
//! - Linux: ~/.config/whatsapp_media_exporter/config.toml
//! - macOS: ~/Library/Application Support/whatsapp_media_exporter/config.toml

use crate::core::error::Result as ExportResult;
use crate::core::model::{
    parse_date, SourceKind, SourceSpec, TransferConfig, TransferMode, DEFAULT_SUBFOLDERS,
};
use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application name used for config directory
const APP_NAME: &str = "whatsapp_media_exporter";

/// Default config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config files checked in the working directory before the standard location
const LOCAL_CONFIG_FILES: &[&str] = &["./wa_export.toml", "./config.toml"];

/// Days covered when no start date is configured
const DEFAULT_RANGE_DAYS: i64 = 90;

/// Device media roots tried in order when none are configured
pub const DEFAULT_MEDIA_ROOTS: &[&str] = &[
    "/storage/emulated/0/Android/media/com.whatsapp/WhatsApp/Media",
    "/storage/emulated/0/WhatsApp/Media",
];

/// Get the standard configuration directory for the application.
pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME))
}

/// Get the standard configuration file path.
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Ensure the configuration directory exists.
pub fn ensure_config_dir() -> Result<PathBuf, ConfigError> {
    let config_dir = get_config_dir().ok_or(ConfigError::ConfigDirNotFound)?;

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)
            .map_err(|e| ConfigError::WriteError(config_dir.clone(), e.to_string()))?;
    }

    Ok(config_dir)
}

/// Initialize the configuration file if it doesn't exist.
///
/// Returns the path to the config file.
pub fn init_config() -> Result<PathBuf, ConfigError> {
    let config_dir = ensure_config_dir()?;
    let config_path = config_dir.join(CONFIG_FILE_NAME);

    if !config_path.exists() {
        fs::write(&config_path, Config::generate_default_config())
            .map_err(|e| ConfigError::WriteError(config_path.clone(), e.to_string()))?;
    }

    Ok(config_path)
}

/// Open the configuration file in the user's default editor.
pub fn open_config_in_editor() -> Result<PathBuf, ConfigError> {
    let config_path = init_config()?;

    open::that(&config_path)
        .map_err(|e| ConfigError::OpenError(config_path.clone(), e.to_string()))?;

    Ok(config_path)
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where media is read from
    pub source: SourceConfig,

    /// Where media is written to
    pub output: OutputConfig,

    /// Date range and subfolder selection
    pub filter: FilterConfig,

    /// Copy or move
    pub transfer: TransferSettings,

    /// adb discovery and device paths
    pub bridge: BridgeConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// "usb" or "local"
    pub kind: SourceKind,

    /// Root of a copied WhatsApp folder (local source)
    pub local_root: Option<PathBuf>,

    /// adb serial to use; prompts or picks the only device when unset
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Destination root; relative subfolder layout is preserved below it
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Inclusive start (YYYY-MM-DD); defaults to 90 days before the end
    pub start_date: Option<String>,

    /// Inclusive end (YYYY-MM-DD); defaults to today
    pub end_date: Option<String>,

    /// Subfolders to export (names or short aliases)
    pub subfolders: Vec<String>,

    /// Subfolders enumerated on the source
    pub known_subfolders: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSettings {
    pub mode: TransferMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Explicit adb executable; discovered when unset
    pub executable: Option<PathBuf>,

    /// WhatsApp media roots on the device, tried in order
    pub media_roots: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Also write log records to `log_file`
    pub log_to_file: bool,

    pub log_file: PathBuf,
}

impl Default for FilterConfig {
    fn default() -> Self {
        let defaults: Vec<String> = DEFAULT_SUBFOLDERS.iter().map(|s| s.to_string()).collect();
        Self {
            start_date: None,
            end_date: None,
            subfolders: defaults.clone(),
            known_subfolders: defaults,
        }
    }
}

impl FilterConfig {
    /// Resolve the configured range, filling in defaults relative to `today`
    pub fn date_range(&self, today: NaiveDate) -> ExportResult<(NaiveDate, NaiveDate)> {
        let end = match self.end_date.as_deref() {
            Some(s) if !s.trim().is_empty() => parse_date(s)?,
            _ => today,
        };
        let start = match self.start_date.as_deref() {
            Some(s) if !s.trim().is_empty() => parse_date(s)?,
            _ => end - Duration::days(DEFAULT_RANGE_DAYS),
        };
        Ok((start, end))
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            executable: None,
            media_roots: DEFAULT_MEDIA_ROOTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl BridgeConfig {
    /// Configured media roots, or the defaults when the list is empty
    pub fn effective_media_roots(&self) -> Vec<String> {
        if self.media_roots.is_empty() {
            DEFAULT_MEDIA_ROOTS.iter().map(|s| s.to_string()).collect()
        } else {
            self.media_roots.clone()
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_file: PathBuf::from("./wa_export.log"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))
    }

    /// Load from the working directory, then the standard location, else defaults
    pub fn load_default() -> Result<Self, ConfigError> {
        for path in LOCAL_CONFIG_FILES {
            let path = Path::new(path);
            if path.exists() {
                return Self::load(path);
            }
        }

        if let Some(config_path) = get_config_path() {
            if config_path.exists() {
                return Self::load(&config_path);
            }
        }

        Ok(Self::default())
    }

    /// Path of the config file `load_default` would read (or create)
    pub fn get_active_config_path() -> PathBuf {
        for path in LOCAL_CONFIG_FILES {
            let path = Path::new(path);
            if path.exists() {
                return path.to_path_buf();
            }
        }

        get_config_path().unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(path.as_ref(), content)
            .map_err(|e| ConfigError::WriteError(path.as_ref().to_path_buf(), e.to_string()))?;

        Ok(())
    }

    /// Commented default configuration file
    pub fn generate_default_config() -> String {
        include_str!("../../config.example.toml").to_string()
    }

    /// Build the run configuration for an already-selected source
    ///
    /// Dates are parsed here; everything else is checked by
    /// [`TransferConfig::validate`].
    pub fn to_transfer_config(&self, source: SourceSpec) -> ExportResult<TransferConfig> {
        let (start, end) = self.filter.date_range(Local::now().date_naive())?;

        let mut config = TransferConfig::new(source, self.output.directory.clone(), start, end)
            .with_subfolders(&self.filter.subfolders)
            .with_mode(self.transfer.mode);

        if !self.filter.known_subfolders.is_empty() {
            config.known_subfolders = self.filter.known_subfolders.clone();
        }

        Ok(config)
    }
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Cannot read {}: {}", .0.display(), .1)]
    ReadError(PathBuf, String),

    #[error("Invalid TOML in {}: {}", .0.display(), .1)]
    ParseError(PathBuf, String),

    #[error("Cannot serialize configuration: {0}")]
    SerializeError(String),

    #[error("Cannot write {}: {}", .0.display(), .1)]
    WriteError(PathBuf, String),

    #[error("No configuration directory on this platform")]
    ConfigDirNotFound,

    #[error("Cannot open {} in an editor: {}", .0.display(), .1)]
    OpenError(PathBuf, String),
}
