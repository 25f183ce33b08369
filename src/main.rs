// SPDX-License-Identifier: GPL-3.0-only

use clap::Parser;
use depth_rectify::backends::sensor::{self, SensorBackendType};
use depth_rectify::capture::{CancelToken, CaptureSettings, run_session};
use depth_rectify::cli::{LaunchOptions, list_devices, resolve_serial};
use depth_rectify::config::Config;
use depth_rectify::errors::{AppError, AppResult, SensorError};
use depth_rectify::preview;
use depth_rectify::storage::SlotRing;
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "depth-rectify")]
#[command(about = "Depth sensor capture with thresholding and perspective rectification")]
#[command(version = env!("GIT_VERSION"))]
#[command(after_help = "Launch tokens (any order):
  cpu | gl | cl        packet pipeline (first one wins)
  -t <float>           initial threshold (negative = off)
  -p <8 floats>        corners tl.x tl.y tr.x tr.y br.x br.y bl.x bl.y as fractions
  -o <path>            output directory
  <digits>             device serial

--headless and --frames are also recognised among the launch tokens.

Keys: Esc quits, Up/Down change the threshold by 1")]
struct Cli {
    /// Sensor backend (default: freedepth when built with it, else synthetic)
    #[arg(long, value_enum)]
    backend: Option<SensorBackendType>,

    /// Run without the terminal preview
    #[arg(long)]
    headless: bool,

    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Configuration file (default: <config dir>/depth-rectify/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// List available devices and exit
    #[arg(long)]
    list: bool,

    /// Launch tokens
    #[arg(allow_hyphen_values = true, trailing_var_arg = true, num_args = 0..)]
    args: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=depth_rectify=trace, RUST_LOG=info
    // Logs go to stderr so they do not interleave with the terminal preview
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .init();

    if let Err(e) = run(cli) {
        error!("{}", e);
        eprintln!("{}", e);
        let code = if e.is_device_unavailable() { -1 } else { 1 };
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> AppResult<()> {
    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    let options = LaunchOptions::scan(&cli.args);
    options.apply_to(&mut config);

    let backend = sensor::get_backend(config.backend)
        .map_err(|e| AppError::Other(format!("{} backend unavailable: {}", config.backend, e)))?;

    if cli.list {
        list_devices(backend.as_ref());
        return Ok(());
    }

    let serial = resolve_serial(backend.as_ref(), options.serial.as_deref())?;

    let pipeline = match config.pipeline {
        Some(kind) if !backend.supports_pipeline(kind) => {
            warn!(pipeline = %kind, "Pipeline not supported by backend, using default");
            None
        }
        other => other,
    };

    let mut device = backend.open_device(&serial, pipeline).map_err(|e| match e {
        SensorError::OpenFailed(_) => e,
        other => SensorError::OpenFailed(other.to_string()),
    })?;
    info!(serial = %device.serial(), "Device opened");

    let cancel = CancelToken::new();
    cancel.install_interrupt_handler()?;

    let mut slots = SlotRing::new(
        config.output_dir.clone(),
        config.file_prefix.clone(),
        config.slot_count,
        config.cleanup,
    );
    let settings = CaptureSettings::from_config(&config, cli.frames.or(options.frames));

    let mut preview = match preview::create(cli.headless || options.headless) {
        Ok(preview) => preview,
        Err(e) => {
            // Nothing streamed yet, but the device is open
            if let Err(close_err) = device.close() {
                warn!(error = %close_err, "Failed to close device");
            }
            return Err(e);
        }
    };

    let summary = run_session(
        device.as_mut(),
        preview.as_mut(),
        &mut slots,
        &settings,
        &cancel,
    );
    // Restore the terminal before printing anything
    drop(preview);

    let summary = summary?;
    println!(
        "Processed {} frames ({} rectified), final threshold {}",
        summary.frames, summary.rectified, summary.final_threshold
    );
    Ok(())
}
