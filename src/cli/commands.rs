//! Command handler implementations
//!
//! This module contains the implementation of all CLI commands.

use crate::cli::args::{ExportArgs, SourceArg};
use crate::cli::progress::{
    print_error, print_header, print_info, print_success, print_summary, print_warning,
    RunProgress,
};
use crate::cli::{Args, Commands, TestCommands};
use crate::core::config::{get_config_path, init_config, open_config_in_editor, Config};
use crate::core::error::ExportError;
use crate::core::model::{
    expand_subfolder_alias, SourceKind, SourceSpec, TransferConfig, TransferMode,
};
use crate::core::pipeline;
use crate::core::progress::{CancelToken, ProgressReporter, RunState, TransferCounters};
use crate::device::{DeviceBridge, DeviceHandle};
use crate::source::{open_source, SourceSettings};
use crate::testdb::scenarios::default_output_dir;
use crate::testdb::{run_scenario, MockBridge, Scenario, ScenarioLibrary};
use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use dialoguer::Select;
use indicatif::MultiProgress;
use log::{error, info, warn};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Run the appropriate command based on CLI arguments
pub fn run_command(
    args: &Args,
    config: &Config,
    cancel: &CancelToken,
    multi: &MultiProgress,
) -> Result<()> {
    match &args.command {
        Some(Commands::Export(export)) => run_export(config, export, cancel, multi),
        None => run_export(config, &args.export, cancel, multi),
        Some(Commands::Scan { export, verbose }) => scan(config, export, *verbose, cancel, multi),
        Some(Commands::Devices { adb }) => {
            let mut settings = SourceSettings::from_config(config);
            if adb.is_some() {
                settings.adb_executable = adb.clone();
            }
            list_devices(&settings)
        }
        Some(Commands::Config { path, reset }) => handle_config_command(*path, *reset),
        Some(Commands::GenerateConfig { output }) => generate_config_file(output.clone()),
        Some(Commands::ShowConfig) => {
            show_config(config);
            Ok(())
        }
        Some(Commands::Test { test_command }) => handle_test_command(test_command, cancel, multi),
    }
}

/// Fold command-line overrides into a copy of the file configuration
pub fn apply_overrides(config: &Config, args: &ExportArgs) -> Config {
    let mut config = config.clone();

    if let Some(source) = args.source {
        config.source.kind = SourceKind::from(source);
    }
    if let Some(root) = &args.root {
        config.source.local_root = Some(root.clone());
        // A root on its own implies a local source
        if args.source.is_none() {
            config.source.kind = SourceKind::Local;
        }
    }
    if let Some(device) = &args.device {
        config.source.device_id = Some(device.clone());
    }
    if let Some(output) = &args.output {
        config.output.directory = output.clone();
    }
    if let Some(start) = &args.start {
        config.filter.start_date = Some(start.clone());
    }
    if let Some(end) = &args.end {
        config.filter.end_date = Some(end.clone());
    }
    if !args.subfolders.is_empty() {
        config.filter.subfolders = args
            .subfolders
            .iter()
            .map(|s| expand_subfolder_alias(s.trim()))
            .collect();
    }
    if let Some(mode) = args.mode {
        config.transfer.mode = mode.into();
    }
    if let Some(adb) = &args.adb {
        config.bridge.executable = Some(adb.clone());
    }

    config
}

/// Build the run configuration, choosing a device when needed
fn prepare_run(
    config: &Config,
    args: &ExportArgs,
) -> Result<(Config, TransferConfig, SourceSettings)> {
    let config = apply_overrides(config, args);
    let settings = SourceSettings::from_config(&config);

    let source = match config.source.kind {
        SourceKind::Local => {
            let root = config
                .source
                .local_root
                .clone()
                .ok_or_else(|| anyhow!("No source folder given. Use --root <DIR> or set [source] local_root"))?;
            SourceSpec::Local { root }
        }
        SourceKind::Usb => {
            // Move is rejected before adb is even looked for
            if config.transfer.mode == TransferMode::Move {
                return Err(ExportError::InvalidTransferMode.into());
            }
            let device = select_device(&settings, config.source.device_id.as_deref())?;
            SourceSpec::Usb { device }
        }
    };

    let transfer = config.to_transfer_config(source)?;
    Ok((config, transfer, settings))
}

/// Export media in the configured range
fn run_export(
    config: &Config,
    args: &ExportArgs,
    cancel: &CancelToken,
    multi: &MultiProgress,
) -> Result<()> {
    let (_, transfer, settings) = prepare_run(config, args)?;

    if !args.json {
        print_header("WhatsApp Media Export");
        print_info(&format!("Source:      {}", transfer.source));
        print_info(&format!(
            "Destination: {}",
            transfer.destination_root.display()
        ));
        print_info(&format!(
            "Dates:       {} to {}",
            transfer.start_date, transfer.end_date
        ));
        print_info(&format!(
            "Subfolders:  {}",
            transfer
                .enabled_subfolders
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        ));
        print_info(&format!("Mode:        {}", transfer.mode));
        println!();
    }

    let display = if args.json {
        RunProgress::hidden()
    } else {
        RunProgress::new(multi)
    };
    let counters = TransferCounters::new();
    let reporter = ProgressReporter::new(&display);

    let summary = pipeline::run(&transfer, &settings, cancel, &counters, &reporter)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if summary.state == RunState::Cancelled {
        warn!("Run was cancelled; files already exported were kept");
    }
    Ok(())
}

/// Scan and plan without transferring
fn scan(
    config: &Config,
    args: &ExportArgs,
    verbose: bool,
    cancel: &CancelToken,
    multi: &MultiProgress,
) -> Result<()> {
    let (_, transfer, settings) = prepare_run(config, args)?;
    transfer.validate_selection()?;

    let display = RunProgress::new(multi);
    let reporter = ProgressReporter::new(&display);
    let counters = TransferCounters::new();

    reporter.phase(RunState::Scanning);
    let source = open_source(&transfer.source, &settings)?;
    let result = pipeline::scan_source(&transfer, source.as_ref(), cancel, &counters, &reporter);
    reporter.phase(if result.cancelled {
        RunState::Cancelled
    } else {
        RunState::Completed
    });

    if result.cancelled {
        print_warning("Scan cancelled");
        return Ok(());
    }

    let plan = &result.plan;
    let snapshot = counters.snapshot();
    print_header("Scan Results");
    print_info(&format!("Media root:         {}", source.media_root()));
    print_info(&format!("Files scanned:      {}", snapshot.scanned));
    print_info(&format!("Would export:       {}", plan.len()));
    print_info(&format!("Outside date range: {}", plan.excluded_out_of_range));
    print_info(&format!("Subfolder disabled: {}", plan.excluded_disabled));
    if !plan.timestamp_failures.is_empty() {
        print_warning(&format!(
            "Unreadable times:   {}",
            plan.timestamp_failures.len()
        ));
    }

    if verbose {
        println!();
        for file in plan {
            let date = file
                .modified_date()
                .map(|d| d.to_string())
                .unwrap_or_default();
            println!("  {}  {}", date, file.relative_path);
        }
    }

    Ok(())
}

/// Choose the device for a USB run
///
/// An explicit serial is used as given (checked when the source is opened).
/// Otherwise a single attached device is picked automatically and several
/// are offered in a menu.
fn select_device(settings: &SourceSettings, requested: Option<&str>) -> Result<DeviceHandle> {
    if let Some(serial) = requested.filter(|s| !s.trim().is_empty()) {
        return Ok(DeviceHandle::new(serial.trim()));
    }

    let bridge = settings.bridge()?;
    let devices = bridge.list_devices()?;

    match devices.len() {
        0 => Err(ExportError::NoDevicesFound.into()),
        1 => {
            info!("Using device {}", devices[0].display_name());
            Ok(devices[0].clone())
        }
        _ => select_device_interactive(&devices),
    }
}

/// Interactive device selection menu
fn select_device_interactive(devices: &[DeviceHandle]) -> Result<DeviceHandle> {
    if !std::io::stdin().is_terminal() {
        bail!(
            "{} devices attached; choose one with --device <SERIAL>",
            devices.len()
        );
    }

    let items: Vec<String> = devices.iter().map(DeviceHandle::display_name).collect();
    let choice = Select::new()
        .with_prompt("Multiple devices detected. Export from")
        .items(&items)
        .default(0)
        .interact_opt()?;

    match choice {
        Some(index) => Ok(devices[index].clone()),
        None => bail!("No device selected"),
    }
}

/// List phones visible to adb
pub fn list_devices(settings: &SourceSettings) -> Result<()> {
    let bridge = settings.bridge()?;
    info!("Using {}", bridge.describe());
    info!("Scanning for connected devices...");

    let devices = bridge.list_devices()?;
    if devices.is_empty() {
        info!("No devices found.");
        info!("");
        info!("Make sure your phone is:");
        info!("  1. Connected via USB cable");
        info!("  2. Unlocked, with USB debugging enabled");
        info!("  3. Trusting this computer (accept the RSA key prompt)");
        return Ok(());
    }

    info!("Found {} device(s):", devices.len());
    for (i, device) in devices.iter().enumerate() {
        println!("  [{}] {}", i + 1, device.display_name());
    }
    Ok(())
}

/// Handle the config command
pub fn handle_config_command(show_path: bool, reset: bool) -> Result<()> {
    if reset {
        // Delete existing config and create a fresh one
        if let Some(config_path) = get_config_path() {
            if config_path.exists() {
                std::fs::remove_file(&config_path)?;
                info!("Removed existing config file");
            }
        }
        let path = init_config()?;
        info!("Created fresh config file at: {}", path.display());
        return Ok(());
    }

    if show_path {
        let path = Config::get_active_config_path();
        println!("{}", path.display());
        if path.exists() {
            info!("Config file exists at: {}", path.display());
        } else {
            info!("Config file would be created at: {}", path.display());
        }
        return Ok(());
    }

    info!("Opening configuration file in default editor...");
    match open_config_in_editor() {
        Ok(path) => {
            info!("Config file: {}", path.display());
            info!("Run 'wa-export show-config' to verify your settings.");
        }
        Err(e) => {
            error!("Failed to open config file: {}", e);
            if let Some(path) = get_config_path() {
                info!("You can manually edit the config at: {}", path.display());
            }
        }
    }

    Ok(())
}

/// Generate a configuration file at the specified or default location
pub fn generate_config_file(output: Option<PathBuf>) -> Result<()> {
    let output_path = match output {
        Some(path) => {
            std::fs::write(&path, Config::generate_default_config())
                .with_context(|| format!("writing {}", path.display()))?;
            path
        }
        None => init_config()?,
    };

    info!("Configuration file: {}", output_path.display());
    info!("Edit this file to set the source, destination and date range.");
    Ok(())
}

/// Show the current configuration settings
pub fn show_config(config: &Config) {
    let config_path = Config::get_active_config_path();
    info!("Configuration file: {}", config_path.display());
    if !config_path.exists() {
        info!("(Using default settings - no config file found)");
    }
    info!("");
    info!("[source]");
    info!(
        "  kind = \"{}\"  # {}",
        match config.source.kind {
            SourceKind::Usb => "usb",
            SourceKind::Local => "local",
        },
        config.source.kind.display_name()
    );
    info!(
        "  local_root = {:?}",
        config
            .source
            .local_root
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );
    info!(
        "  device_id = {:?}",
        config.source.device_id.as_deref().unwrap_or("(auto)")
    );
    info!("");
    info!("[output]");
    info!("  directory = \"{}\"", config.output.directory.display());
    info!("");
    info!("[filter]");
    info!(
        "  start_date = {:?}",
        config.filter.start_date.as_deref().unwrap_or("(90 days before end)")
    );
    info!(
        "  end_date = {:?}",
        config.filter.end_date.as_deref().unwrap_or("(today)")
    );
    info!("  subfolders = {:?}", config.filter.subfolders);
    info!("  known_subfolders = {:?}", config.filter.known_subfolders);
    info!("");
    info!("[transfer]");
    info!("  mode = \"{}\"", config.transfer.mode);
    info!("");
    info!("[bridge]");
    info!(
        "  executable = {:?}",
        config
            .bridge
            .executable
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(search)".to_string())
    );
    info!("  media_roots = {:?}", config.bridge.effective_media_roots());
    info!("");
    info!("[logging]");
    info!("  level = \"{}\"", config.logging.level);
    info!("  log_to_file = {}", config.logging.log_to_file);
    info!("  log_file = \"{}\"", config.logging.log_file.display());
}

// ============================================================================
// Scenario commands
// ============================================================================

/// Handle test subcommands
pub fn handle_test_command(
    test_command: &TestCommands,
    cancel: &CancelToken,
    multi: &MultiProgress,
) -> Result<()> {
    match test_command {
        TestCommands::List { tag } => {
            test_list_scenarios(tag.as_deref());
            Ok(())
        }
        TestCommands::Run {
            scenarios,
            tag,
            output,
            verbose,
        } => test_run_scenarios(scenarios, tag.as_deref(), output.clone(), *verbose),
        TestCommands::Simulate { scenario, output } => {
            test_simulate(scenario, output, cancel, multi)
        }
    }
}

fn test_list_scenarios(tag: Option<&str>) {
    let scenarios = match tag {
        Some(tag) => ScenarioLibrary::by_tag(tag),
        None => ScenarioLibrary::all(),
    };

    if scenarios.is_empty() {
        print_warning("No scenarios match");
        return;
    }

    print_header("Scenarios");
    for scenario in &scenarios {
        println!("  {:<24} [{}]", scenario.name, scenario.tags.join(", "));
        println!("      {}", scenario.description);
    }
}

fn select_scenarios(names: &[String], tag: Option<&str>) -> Result<Vec<Scenario>> {
    let mut selected = match tag {
        Some(tag) => ScenarioLibrary::by_tag(tag),
        None => ScenarioLibrary::all(),
    };

    if !names.is_empty() {
        for name in names {
            if ScenarioLibrary::find(name).is_none() {
                bail!(
                    "Unknown scenario '{}'. Available: {}",
                    name,
                    ScenarioLibrary::names().join(", ")
                );
            }
        }
        selected.retain(|s| names.iter().any(|n| n == s.name));
    }

    Ok(selected)
}

fn test_run_scenarios(
    names: &[String],
    tag: Option<&str>,
    output: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let scenarios = select_scenarios(names, tag)?;
    let output = output.unwrap_or_else(|| {
        default_output_dir().join(Local::now().format("%Y%m%d-%H%M%S").to_string())
    });
    info!("Writing scenario exports under {}", output.display());

    print_header("Scenario Run");
    let mut failed = 0;
    for scenario in &scenarios {
        let outcome = run_scenario(scenario, &output);
        if outcome.passed() {
            print_success(&format!(
                "{:<24} ({:.0} ms)",
                outcome.name,
                outcome.duration.as_secs_f64() * 1000.0
            ));
        } else {
            failed += 1;
            print_error(&outcome.name);
            for mismatch in &outcome.mismatches {
                println!("      {}", mismatch);
            }
        }

        if verbose {
            if let Some(summary) = &outcome.summary {
                println!("      {}", summary.finished_line());
            }
            if let Some(error) = &outcome.error {
                println!("      error: {}", error);
            }
        }
    }

    println!();
    println!(
        "  {}/{} scenarios passed",
        scenarios.len() - failed,
        scenarios.len()
    );

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn test_simulate(
    name: &str,
    output: &Path,
    cancel: &CancelToken,
    multi: &MultiProgress,
) -> Result<()> {
    let scenario = ScenarioLibrary::find(name).ok_or_else(|| {
        anyhow!(
            "Unknown scenario '{}'. Available: {}",
            name,
            ScenarioLibrary::names().join(", ")
        )
    })?;

    print_header(&format!("Simulated export: {}", scenario.name));
    print_info(scenario.description);
    println!();

    let bridge: Arc<MockBridge> = Arc::new(scenario.bridge());
    let settings = SourceSettings::default().with_bridge(bridge);
    let transfer = scenario.transfer_config(output);

    let display = RunProgress::new(multi);
    let reporter = ProgressReporter::new(&display);
    let summary = pipeline::run(&transfer, &settings, cancel, &TransferCounters::new(), &reporter)?;
    print_summary(&summary);
    Ok(())
}
