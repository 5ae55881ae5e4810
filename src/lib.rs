#![doc(html_root_url = "https://docs.rs/arrayio/0.1.0")]
#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

//! # arrayio
//!
//! Numeric I/O for signal and image processing experiments: typed
//! N-dimensional arrays stored in several file formats, distance functions
//! between feature vectors, and frame-level video access.
//!
//! ## Features
//!
//! - **Arrays**: boolean, integer, float and complex arrays of 1 to 4
//!   dimensions, held in memory or read lazily from a file
//! - **Codecs**: a native binary format, Torch3 `.bindata` and MATLAB level-5
//!   `.mat` files, chosen by file extension
//! - **Arraysets**: id-indexed collections of same-typed arrays
//! - **Distances**: Euclidean, normalized scalar product and chi-square
//! - **Video**: read and write frames through `ffmpeg` (feature `video`)
//! - **Web API**: HTTP endpoints for distances and file inspection (feature `web`)
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! arrayio = { version = "0.1", features = ["full"] }
//! ```
//!
//! Basic usage:
//! ```rust,no_run
//! use arrayio::{Array, ArrayData, Result};
//!
//! fn main() -> Result<()> {
//!     let mut array = Array::new(ArrayData::from_vec(vec![1.0f64, 2.0, 3.0])?);
//!     array.save("values.mat")?;
//!     let values = Array::open("values.mat")?.get::<f64>()?;
//!     println!("{}", values);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod core;
/// Defines the library's error type and result alias.
pub mod error;
pub mod io;
mod state;
mod utils;

#[allow(dead_code, missing_docs, unreachable_pub)]
mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

use std::path::Path;

use serde::Serialize;

pub use crate::{
    core::{
        array::{ArrayData, Element, ElementType, TypeInfo, MAX_DIM},
        distance::{chi_square, euclidean_distance, normalized_scalar_product, DistanceMetric},
    },
    error::{Error, Result, ResultExt},
    io::{Array, Arrayset, ArraysetCodec, Codec, CodecRegistry},
    state::{AppState, Config, VideoConfig},
};

#[cfg(feature = "web")]
pub use crate::api::{create_router, health_check};

#[cfg(feature = "video")]
pub use crate::core::video::{check_ffmpeg_installed, Image, Video, VideoInfo, VideoState};

/// Initialize the library with default settings
///
/// This function sets up logging and checks for optional system tools.
/// It should be called early in the application startup process.
///
/// # Errors
///
/// Returns an error if logging initialization fails.
///
/// # Example
///
/// ```no_run
/// use arrayio::init;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     init()?;
///     // Application code here
///     Ok(())
/// }
/// ```
pub fn init() -> Result<()> {
    let env = env_logger::Env::default()
        .default_filter_or("info")
        .default_write_style_or("auto");

    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .format_module_path(false)
        .format_target(false)
        .try_init()
        .map_err(|e| Error::Config(format!("logger already initialized: {}", e)))?;

    log::info!(
        "Initializing {} {} ({})",
        built_info::PKG_NAME,
        built_info::PKG_VERSION,
        built_info::TARGET
    );

    #[cfg(feature = "video")]
    if let Err(e) = crate::core::video::check_ffmpeg_installed() {
        log::warn!("FFmpeg is not installed or not in PATH: {}", e);
        log::warn!("Video processing will not be available");
    }

    log::debug!("Codecs: {}", CodecRegistry::global().names().join(", "));
    Ok(())
}

/// What a file holds, as reported by [`inspect`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inspection {
    /// Name of the codec that reads the file
    pub codec: String,
    /// Type of the (first) array in the file
    pub type_info: TypeInfo,
    /// Number of arrays when the file is readable as an arrayset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrayset_len: Option<usize>,
}

/// Reports the codec and array type of a file without loading its data.
///
/// # Errors
///
/// Returns [`Error::UnknownCodec`] when no codec handles the extension, or
/// the codec's error when the file cannot be read.
pub fn inspect<P: AsRef<Path>>(path: P) -> Result<Inspection> {
    inspect_with(path, &CodecRegistry::global())
}

/// Like [`inspect`] with an explicit registry.
pub fn inspect_with<P: AsRef<Path>>(path: P, registry: &CodecRegistry) -> Result<Inspection> {
    let path = path.as_ref();
    let codec = registry.for_path(path)?;
    let type_info = codec.peek(path)?;
    let arrayset_len = codec
        .as_arrayset()
        .and_then(|set| set.peek_set(path).ok())
        .map(|(_, len)| len);
    log::debug!("Inspected {}: {} via {}", path.display(), type_info, codec.name());

    Ok(Inspection {
        codec: codec.name().to_string(),
        type_info,
        arrayset_len,
    })
}
