//! macdisks CLI - Expose macOS volumes as on/off devices.
//!
//! `run` is the long-lived daemon a home-automation host launches and talks
//! to over stdin/stdout. The other subcommands are one-shot operator tools
//! over the same configuration.

mod daemon;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use log::LevelFilter;
use macdisks_core::{
    DeviceAction, Monitor, Settings, ShellRunner, StateChange, StatePublisher, config,
    config::VolumeKind,
};

/// macdisks CLI tool.
#[derive(Parser)]
#[command(name = "macdisks")]
#[command(about = "Mount and unmount macOS volumes as on/off devices", long_about = None)]
struct Cli {
    /// Settings file (default: <config dir>/macdisks/config.json).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level regardless of the settings file.
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the poll loop, accepting host requests via stdin.
    ///
    /// State changes and responses are written to stdout as JSON lines.
    /// The daemon exits on a shutdown request, when stdin closes, or when
    /// the launching process goes away.
    Run,
    /// Print the current state of every device.
    Status,
    /// Mount a device's volume.
    Mount { device: String },
    /// Unmount a device's volume.
    Unmount { device: String },
    /// Check the settings file and list the devices it defines.
    Validate,
}

/// Discards state changes; one-shot commands print the final state instead.
struct Quiet;

impl StatePublisher for Quiet {
    fn publish(&mut self, _device: &str, _changes: &[StateChange]) {}

    fn indicate(&mut self, _device: &str, _on: bool) {}
}

fn main() {
    let cli = Cli::parse();

    // Respects RUST_LOG; the effective level is narrowed below once settings are read.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> macdisks_core::Result<()> {
    let path = match cli.config {
        Some(path) => path,
        None => config::default_config_path()?,
    };
    let settings = Settings::load(&path)?;

    let level = if cli.debug || settings.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    log::set_max_level(level);

    match cli.command {
        Commands::Run => daemon::run_daemon(&settings),
        Commands::Status => {
            let mut monitor = Monitor::new(&settings, ShellRunner::new())?;
            monitor.start(&mut Quiet);
            for device in monitor.devices() {
                let state = device.state();
                let identifier = if state.identifier.is_empty() {
                    "-"
                } else {
                    state.identifier.as_str()
                };
                if device.is_on() {
                    println!(
                        "{:<16} on   {:<28} {} of {} free ({}%)",
                        device.name(),
                        identifier,
                        state.size_free,
                        state.size_total,
                        state.percent_free
                    );
                } else {
                    println!("{:<16} off  {}", device.name(), identifier);
                }
            }
            Ok(())
        }
        Commands::Mount { device } => switch(&settings, &device, DeviceAction::TurnOn),
        Commands::Unmount { device } => switch(&settings, &device, DeviceAction::TurnOff),
        Commands::Validate => {
            let configs = settings.device_configs()?;
            println!("{}: {} device(s)", path.display(), configs.len());
            for config in configs {
                let source = match &config.kind {
                    VolumeKind::Local => "local".to_string(),
                    VolumeKind::Network(url) => url.identifier(),
                };
                println!(
                    "  {:<16} {} -> {}",
                    config.name,
                    source,
                    config.mount_point.display()
                );
            }
            Ok(())
        }
    }
}

fn switch(settings: &Settings, name: &str, action: DeviceAction) -> macdisks_core::Result<()> {
    let mut monitor = Monitor::new(settings, ShellRunner::new())?;
    monitor.start(&mut Quiet);
    monitor.perform(name, action, &mut Quiet)?;

    if let Some(device) = monitor.device(name) {
        println!(
            "{} is {}",
            device.name(),
            if device.is_on() { "mounted" } else { "unmounted" }
        );
    }
    Ok(())
}
