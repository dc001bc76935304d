//! devctx
//!
//! Lists the logical devices built from the connected (or recorded) composite
//! USB devices and watches hot-plug changes.

use anyhow::{Context as _, Result};
use clap::Parser;
use common::setup_logging;
use devctx::config::expand_path;
use devctx::{BackendMode, Context, DevctxConfig, DeviceChange, DeviceList, subscribe_changes};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "devctx")]
#[command(author, version, about = "Composite USB device discovery")]
#[command(long_about = "
Groups the video and auxiliary interfaces of composite USB devices into
logical devices, detects devices stuck in firmware-recovery mode, and reports
devices appearing and disappearing.

EXAMPLES:
    # List devices
    devctx --list-devices

    # Watch hot-plug changes until Ctrl+C
    devctx --watch

    # Record a session, then replay it
    devctx --mode record --file ~/bench.rec --section bench --watch
    devctx --mode playback --file ~/bench.rec --section bench --watch

CONFIGURATION:
    devctx looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/devctx/devctx.toml
    3. /etc/devctx/devctx.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Device source (live, record, playback)
    #[arg(short, long, value_name = "MODE")]
    mode: Option<BackendMode>,

    /// Recording file for record and playback modes
    #[arg(short, long, value_name = "PATH")]
    file: Option<String>,

    /// Recording section
    #[arg(short, long, value_name = "NAME")]
    section: Option<String>,

    /// List devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Print device changes until Ctrl+C
    #[arg(short, long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --save-config flag early (before loading config)
    if args.save_config {
        let config = DevctxConfig::default();
        let path = DevctxConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let mut config = if let Some(ref path) = args.config {
        DevctxConfig::load(Some(expand_path(path))).context("Failed to load configuration")?
    } else {
        DevctxConfig::load_or_default()
    };

    // Command-line flags override the file
    if let Some(level) = args.log_level {
        config.context.log_level = level;
    }
    if let Some(mode) = args.mode {
        config.context.mode = mode;
    }
    if args.file.is_some() {
        config.context.file_path = args.file;
    }
    if args.section.is_some() {
        config.context.section = args.section;
    }
    config.validate().context("Invalid configuration")?;

    setup_logging(&config.context.log_level, config.context.log_format)
        .context("Failed to setup logging")?;

    info!("devctx v{}", env!("CARGO_PKG_VERSION"));
    info!("Mode: {}", config.context.mode);

    let ctx = Context::from_config(&config).context("Failed to create device context")?;

    if args.list_devices || !args.watch {
        list_devices(&ctx)?;
    }
    if args.watch {
        watch_devices(&ctx).await?;
    }

    Ok(())
}

/// Print every logical device with its sub-devices
fn list_devices(ctx: &Arc<Context>) -> Result<()> {
    let devices = DeviceList::query(ctx).context("Failed to query devices")?;

    if devices.is_empty() {
        println!("No devices found.");
        return Ok(());
    }

    println!("Found {} device(s):\n", devices.len());
    for entry in &devices {
        let info = &entry.info;
        println!("  {}", info);
        if info.is_recovery() {
            println!("      firmware recovery required");
        }
        for index in 0..info.get_subdevice_count() {
            let endpoints = info.subdevice_endpoints(index)?;
            let described: Vec<String> = endpoints.iter().map(|e| e.to_string()).collect();
            println!("      [{}] {}", index, described.join(", "));
        }
        println!();
    }

    Ok(())
}

/// Print device changes until Ctrl+C
async fn watch_devices(ctx: &Arc<Context>) -> Result<()> {
    let changes = subscribe_changes(ctx);
    println!("Watching for device changes, press Ctrl+C to stop");

    loop {
        tokio::select! {
            change = changes.recv() => match change {
                Ok(change) => print_change(ctx, &change),
                Err(e) => {
                    error!("Device change channel closed: {}", e);
                    break;
                }
            },
            result = signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Received Ctrl+C, shutting down..."),
                    Err(e) => error!("Error waiting for Ctrl+C: {}", e),
                }
                break;
            }
        }
    }

    ctx.clear_devices_changed_callback();
    Ok(())
}

fn print_change(ctx: &Context, change: &DeviceChange) {
    let timestamp = ctx.get_time();
    for info in &change.removed {
        println!("[{:>12.1} ms] - {}", timestamp, info);
    }
    for info in &change.added {
        println!("[{:>12.1} ms] + {}", timestamp, info);
    }
}
