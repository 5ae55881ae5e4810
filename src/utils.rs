//! Small path helpers shared by the codecs and the API service

use std::path::Path;
#[cfg(feature = "web")]
use std::path::PathBuf;

#[cfg(feature = "web")]
use anyhow::{Context, Result};

/// Extension of `path` with its leading `.`, as codecs register them
pub(crate) fn dotted_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext))
}

/// Ensure a directory exists, creating it if necessary
#[cfg(feature = "web")]
pub(crate) fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("creating directory {}", path.display()))?;
    }
    Ok(())
}

/// Unique path in `dir` that keeps the extension of `original_name`
#[cfg(feature = "web")]
pub(crate) fn upload_path(dir: &Path, original_name: &str) -> PathBuf {
    let name = match dotted_extension(Path::new(original_name)) {
        Some(ext) => format!("{}{}", uuid::Uuid::new_v4(), ext),
        None => uuid::Uuid::new_v4().to_string(),
    };
    dir.join(name)
}
