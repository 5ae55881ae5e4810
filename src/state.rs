use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::io::codec::CodecRegistry;

/// Configuration for the library and the API service
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the API server listens on
    pub bind_addr: SocketAddr,
    /// Base directory for file uploads
    pub upload_dir: PathBuf,
    /// Maximum file size in bytes
    pub max_upload_size: u64,
    /// Video processing configuration
    pub video: VideoConfig,
}

/// Video processing configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// The `ffmpeg` executable
    pub ffmpeg_path: PathBuf,
    /// The `ffprobe` executable
    pub ffprobe_path: PathBuf,
    /// Encoder used for written videos; ffmpeg picks one from the extension when unset
    pub codec: Option<String>,
    /// Frame rate used when a stream does not report one
    pub default_frame_rate: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            upload_dir: PathBuf::from("uploads"),
            max_upload_size: 100 * 1024 * 1024, // 100MB
            video: VideoConfig::default(),
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            codec: None,
            default_frame_rate: 25.0,
        }
    }
}

fn env_var<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("invalid value for {}: '{}'", key, value))),
        _ => Ok(None),
    }
}

impl Config {
    /// Builds a configuration from the defaults, a `.env` file if present and
    /// `ARRAYIO_*` environment variables.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let mut config = Self::default();

        if let Some(addr) = env_var("ARRAYIO_BIND_ADDR")? {
            config.bind_addr = addr;
        }
        if let Some(dir) = env_var::<PathBuf>("ARRAYIO_UPLOAD_DIR")? {
            config.upload_dir = dir;
        }
        if let Some(size) = env_var("ARRAYIO_MAX_UPLOAD_SIZE")? {
            config.max_upload_size = size;
        }
        if let Some(path) = env_var::<PathBuf>("ARRAYIO_FFMPEG")? {
            config.video.ffmpeg_path = path;
        }
        if let Some(path) = env_var::<PathBuf>("ARRAYIO_FFPROBE")? {
            config.video.ffprobe_path = path;
        }
        if let Some(codec) = env_var::<String>("ARRAYIO_VIDEO_CODEC")? {
            config.video.codec = Some(codec);
        }
        if let Some(rate) = env_var::<f64>("ARRAYIO_FRAME_RATE")? {
            if rate <= 0.0 {
                return Err(Error::Config(format!("ARRAYIO_FRAME_RATE must be positive, got {}", rate)));
            }
            config.video.default_frame_rate = rate;
        }

        Ok(config)
    }

    /// Loads a configuration from a JSON file; missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config = serde_json::from_str(&text)?;
        Ok(config)
    }
}

/// Application state that can be shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Application configuration
    pub config: Config,
    /// Codecs used to inspect uploaded arrays
    pub registry: Arc<CodecRegistry>,
}

impl AppState {
    /// Create a new application state with default configuration
    pub fn new() -> Arc<Self> {
        Self::with_config(Config::default())
    }

    /// Create a new application state with custom configuration
    pub fn with_config(config: Config) -> Arc<Self> {
        Arc::new(Self {
            config,
            registry: CodecRegistry::global(),
        })
    }
}
