//! camstream - MJPEG and still-capture HTTP endpoint for a camera

use std::path::PathBuf;
use std::sync::Arc;

use camstream::capture::{CaptureSource, TestPatternSource, V4l2Capture};
use camstream::server::{self, AppState};
use camstream::shutdown::{self, ShutdownSignal};
use camstream::{utils, Config, SourceKind};
use clap::Parser;
use color_eyre::{eyre::WrapErr, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve a camera as an MJPEG stream and JPEG stills")]
struct Args {
    /// TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    #[arg(short = 'p', long)]
    port: Option<u16>,

    #[arg(short = 'b', long)]
    bind_address: Option<String>,

    /// Serve a synthetic test pattern instead of opening a camera
    #[arg(long)]
    test_pattern: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("camstream=info")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("camstream launching...");

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).wrap_err("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind_address) = args.bind_address {
        config.server.bind_address = bind_address;
    }
    if args.test_pattern {
        config.capture.source = SourceKind::TestPattern;
    }

    let source = open_source(&config)?;

    let shutdown = ShutdownSignal::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown::os_signal().await;
            info!("Shutdown requested");
            shutdown.trigger();
        }
    });

    let state = AppState::new(source, config.stream.clone(), shutdown.clone());
    server::run(&config.server, state, shutdown).await?;

    info!("camstream shut down");
    Ok(())
}

fn open_source(config: &Config) -> Result<Arc<dyn CaptureSource>> {
    match config.capture.source {
        SourceKind::TestPattern => Ok(Arc::new(TestPatternSource::from_config(&config.capture))),
        SourceKind::V4l2 => {
            let mut capture_config = config.capture.clone();

            // Auto-detect capture device if needed
            if capture_config.device.path.is_empty() {
                let device = utils::auto_detect_device()?;
                capture_config.format = device.format;
                capture_config.device = device;
            }
            info!("Using capture device: {:?}", capture_config.device);

            let capture = V4l2Capture::new(capture_config)
                .wrap_err("Failed to initialize V4L2 capture")?;
            capture.start_stream().wrap_err("Failed to start capture stream")?;
            Ok(Arc::new(capture))
        }
    }
}
