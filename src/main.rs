use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ball_tracker_runtime::config::{ControllerConfig, LINK_BAUDRATE, LINK_PORT, StopMode};
use ball_tracker_runtime::runtime::{self, RuntimeOptions};

/// Ball-centering motor controller for a three-wheel omni base
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Serial port the camera host is connected to
    #[arg(short, long, default_value = LINK_PORT)]
    port: String,

    #[arg(short, long, default_value_t = LINK_BAUDRATE)]
    baudrate: u32,

    /// JSON controller config (gains, clamps, timeouts); defaults if omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Publish cycle reports and health over Zenoh
    #[arg(long)]
    telemetry: bool,

    /// Override the stop convention from the config
    #[arg(long, value_enum)]
    stop_mode: Option<StopMode>,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=debug for per-frame output)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();

    let mut controller = match &args.config {
        Some(path) => match ControllerConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Config error ({}): {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => ControllerConfig::default(),
    };
    if let Some(mode) = args.stop_mode {
        controller.stop_mode = mode;
    }

    let options = RuntimeOptions {
        port: args.port,
        baudrate: args.baudrate,
        telemetry: args.telemetry,
        controller,
    };

    if let Err(e) = runtime::run(options).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
