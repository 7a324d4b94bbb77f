pub mod capture;
pub mod error;
pub mod handlers;
pub mod http;
pub mod server;
pub mod shutdown;
pub mod utils;

use std::path::Path;

use capture::frame::PixelFormat;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::utils::FoundDevice;

/// Prefix for environment overrides, e.g. `CAMSTREAM_SERVER__PORT=8080`
pub const ENV_PREFIX: &str = "CAMSTREAM";

/// System configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub capture: CaptureConfig,
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

/// Where frames come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    V4l2,
    TestPattern,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub source: SourceKind,
    /// Empty path means auto-detect
    pub device: FoundDevice,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: PixelFormat,
    pub buffer_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Quality used when raw frames are encoded for the stream
    pub jpeg_quality: u8,
    /// Value of the `X-Framerate` header. Advertised only, not enforced.
    pub advertised_framerate: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "0.0.0.0".into(),
                port: 80,
            },
            capture: CaptureConfig {
                source: SourceKind::V4l2,
                device: FoundDevice::new("/dev/video0".into(), PixelFormat::Mjpeg),
                width: 800,
                height: 600,
                fps: 30,
                format: PixelFormat::Mjpeg,
                buffer_count: 4,
            },
            stream: StreamConfig::default(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 80,
            advertised_framerate: 60,
        }
    }
}

impl Config {
    /// Defaults, then the optional TOML file, then `CAMSTREAM_*` environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }
}
