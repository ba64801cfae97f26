//! Android Debug Bridge (adb) implementation of [`DeviceBridge`]
//!
//! Every operation is a blocking `adb` subprocess. There are no timeouts: a
//! hung bridge blocks the calling worker until adb returns.

use crate::core::error::{ExportError, Result};
use crate::device::traits::{DeviceBridge, DeviceHandle};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

#[cfg(windows)]
const ADB_BINARY: &str = "adb.exe";
#[cfg(not(windows))]
const ADB_BINARY: &str = "adb";

/// Bridge that drives a located `adb` executable
#[derive(Debug, Clone)]
pub struct AdbBridge {
    executable: PathBuf,
}

impl AdbBridge {
    /// Use a specific executable without probing it
    pub fn with_executable(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Locate a working adb executable
    ///
    /// Tries the configured path first, then the `ADB` environment variable,
    /// the Android SDK environment variables, `PATH`, and finally the
    /// platform's default SDK install location. A candidate is accepted when
    /// `<candidate> version` succeeds.
    pub fn locate(configured: Option<&Path>) -> Result<Self> {
        let candidates = candidate_locations(
            configured,
            |key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()),
            dirs::home_dir(),
            dirs::data_local_dir(),
        );

        let mut tried = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let display = candidate.display().to_string();
            if tried.contains(&display) {
                continue;
            }
            debug!("Probing adb candidate: {}", display);
            match Command::new(&candidate).arg("version").output() {
                Ok(output) if output.status.success() => {
                    info!("Using adb: {}", display);
                    return Ok(Self::with_executable(candidate));
                }
                Ok(output) => {
                    debug!("{} version exited with {}", display, output.status);
                }
                Err(e) => {
                    debug!("{} could not be started: {}", display, e);
                }
            }
            tried.push(display);
        }

        Err(ExportError::BridgeUnavailable { tried })
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new(&self.executable)
            .args(args)
            .output()
            .map_err(|e| ExportError::BridgeCommand {
                command: format!("adb {}", args.join(" ")),
                message: e.to_string(),
            })
    }

    /// Run a command in the device shell and return its stdout
    ///
    /// The exit status of the remote command is not checked: callers that
    /// care ask the shell to echo it.
    fn shell(&self, device: &DeviceHandle, command: &str) -> Result<String> {
        let output = self.run(&["-s", &device.serial, "shell", command])?;
        if !output.status.success() {
            return Err(command_failed(
                &format!("adb -s {} shell {}", device.serial, command),
                &output,
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl DeviceBridge for AdbBridge {
    fn list_devices(&self) -> Result<Vec<DeviceHandle>> {
        let output = Command::new(&self.executable)
            .args(["devices", "-l"])
            .output()
            .map_err(|e| ExportError::BridgeUnavailable {
                tried: vec![format!("{} ({})", self.executable.display(), e)],
            })?;

        if !output.status.success() {
            return Err(command_failed("adb devices -l", &output));
        }

        Ok(parse_devices(&String::from_utf8_lossy(&output.stdout)))
    }

    fn path_exists(&self, device: &DeviceHandle, path: &str) -> Result<bool> {
        let command = format!("ls {} >/dev/null 2>&1; echo $?", shell_quote(path));
        let stdout = self.shell(device, &command)?;
        Ok(stdout.trim() == "0")
    }

    fn find_files(&self, device: &DeviceHandle, dir: &str) -> Result<Vec<String>> {
        let command = format!("find {} -type f 2>/dev/null", shell_quote(dir));
        let stdout = self.shell(device, &command)?;
        Ok(stdout
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn stat_mtimes(&self, device: &DeviceHandle, dir: &str) -> Result<HashMap<String, i64>> {
        let command = format!(
            "find {} -type f -exec stat -c '%Y %n' {{}} + 2>/dev/null",
            shell_quote(dir)
        );
        let stdout = self.shell(device, &command)?;
        Ok(parse_stat_lines(&stdout))
    }

    fn stat_mtime(&self, device: &DeviceHandle, path: &str) -> Result<i64> {
        let quoted = shell_quote(path);
        let command = format!(
            "toybox stat -c %Y {q} 2>/dev/null || stat -c %Y {q}",
            q = quoted
        );
        let stdout = self.shell(device, &command)?;
        parse_epoch(&stdout).ok_or_else(|| ExportError::TimestampUnavailable {
            path: path.to_string(),
            message: format!("unexpected stat output: {:?}", stdout.trim()),
        })
    }

    fn pull(&self, device: &DeviceHandle, remote: &str, local: &Path) -> Result<()> {
        let local_str = local.to_string_lossy();
        let output = self.run(&["-s", &device.serial, "pull", remote, &local_str])?;
        if !output.status.success() {
            return Err(command_failed(
                &format!("adb -s {} pull {} {}", device.serial, remote, local_str),
                &output,
            ));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.executable.display().to_string()
    }
}

/// Build the ordered list of adb locations to probe
pub fn candidate_locations<F>(
    configured: Option<&Path>,
    env: F,
    home: Option<PathBuf>,
    local_data: Option<PathBuf>,
) -> Vec<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    let mut candidates = Vec::new();

    if let Some(path) = configured {
        if !path.as_os_str().is_empty() {
            candidates.push(path.to_path_buf());
        }
    }

    if let Some(adb) = env("ADB") {
        candidates.push(PathBuf::from(adb));
    }

    for sdk_var in ["ANDROID_HOME", "ANDROID_SDK_ROOT"] {
        if let Some(sdk) = env(sdk_var) {
            candidates.push(PathBuf::from(sdk).join("platform-tools").join(ADB_BINARY));
        }
    }

    // Bare name resolves through PATH
    candidates.push(PathBuf::from(ADB_BINARY));

    if let Some(default) = default_sdk_adb(home, local_data) {
        candidates.push(default);
    }

    candidates
}

/// Default SDK install location for the current platform
fn default_sdk_adb(home: Option<PathBuf>, local_data: Option<PathBuf>) -> Option<PathBuf> {
    if cfg!(windows) {
        local_data.map(|d| d.join("Android").join("Sdk").join("platform-tools").join(ADB_BINARY))
    } else if cfg!(target_os = "macos") {
        home.map(|h| {
            h.join("Library")
                .join("Android")
                .join("sdk")
                .join("platform-tools")
                .join(ADB_BINARY)
        })
    } else {
        home.map(|h| h.join("Android").join("Sdk").join("platform-tools").join(ADB_BINARY))
    }
}

/// Parse `adb devices -l` output, keeping only authorized devices
pub fn parse_devices(output: &str) -> Vec<DeviceHandle> {
    let mut devices = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("List of devices") || line.starts_with('*') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let (Some(serial), Some(state)) = (fields.next(), fields.next()) else {
            continue;
        };

        if state != "device" {
            debug!("Skipping device {} in state '{}'", serial, state);
            continue;
        }

        let mut handle = DeviceHandle::new(serial);
        if let Some(model) = fields.find_map(|f| f.strip_prefix("model:")) {
            handle = handle.with_model(model);
        }
        devices.push(handle);
    }

    devices
}

/// Parse `stat -c '%Y %n'` lines into a path -> mtime map
pub fn parse_stat_lines(output: &str) -> HashMap<String, i64> {
    let mut times = HashMap::new();

    for line in output.lines() {
        let line = line.trim_end_matches('\r');
        let Some((epoch, path)) = line.split_once(' ') else {
            continue;
        };
        match epoch.trim().parse::<i64>() {
            Ok(secs) if !path.is_empty() => {
                times.insert(path.to_string(), secs);
            }
            _ => warn!("Ignoring unparseable stat line: {}", line),
        }
    }

    times
}

/// Parse a single epoch-seconds value
pub fn parse_epoch(output: &str) -> Option<i64> {
    output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .and_then(|l| l.parse::<i64>().ok())
}

/// Single-quote a string for the device shell
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

fn command_failed(command: &str, output: &Output) -> ExportError {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let message = if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        stderr
    };
    ExportError::BridgeCommand {
        command: command.to_string(),
        message,
    }
}
