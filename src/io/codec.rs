//! Codec traits and the extension-keyed registry.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::core::array::{ArrayData, TypeInfo};
use crate::error::{Error, Result};
use crate::io::{binary::BinaryCodec, mat::MatCodec, t3binary::T3BinaryCodec};
use crate::utils::dotted_extension;

/// Reads and writes single arrays in one file format.
pub trait Codec: Send + Sync + fmt::Debug {
    /// Unique codec name, e.g. `matlab.mat5`
    fn name(&self) -> &str;

    /// Extensions handled, including the leading `.`. Matching is case sensitive.
    fn extensions(&self) -> &[&'static str];

    /// Reads the element type and shape without loading the data.
    fn peek(&self, path: &Path) -> Result<TypeInfo>;

    /// Loads the array stored in `path`.
    fn load(&self, path: &Path) -> Result<ArrayData>;

    /// Writes `data` to `path`, replacing any existing file.
    fn save(&self, path: &Path, data: &ArrayData) -> Result<()>;

    /// The arrayset interface, for formats that can hold several arrays.
    fn as_arrayset(&self) -> Option<&dyn ArraysetCodec> {
        None
    }
}

/// Reads and writes id-indexed collections of arrays in one file.
pub trait ArraysetCodec: Send + Sync {
    /// Type shared by the arrays and how many there are.
    fn peek_set(&self, path: &Path) -> Result<(TypeInfo, usize)>;

    /// Ids of the stored arrays, ascending.
    fn list_ids(&self, path: &Path) -> Result<Vec<usize>> {
        Ok(self.load_set(path)?.into_keys().collect())
    }

    /// Loads every array, keyed by id.
    fn load_set(&self, path: &Path) -> Result<BTreeMap<usize, ArrayData>>;

    /// Loads the array stored under `id`.
    fn load_one(&self, path: &Path, id: usize) -> Result<ArrayData> {
        self.load_set(path)?
            .remove(&id)
            .ok_or_else(|| Error::NotFound(format!("array {} in {}", id, path.display())))
    }

    /// Writes every array, replacing any existing file.
    fn save_set(&self, path: &Path, arrays: &BTreeMap<usize, ArrayData>) -> Result<()>;
}

/// Codecs keyed by name and by file extension.
#[derive(Debug, Default)]
pub struct CodecRegistry {
    by_name: HashMap<String, Arc<dyn Codec>>,
    by_extension: HashMap<String, Arc<dyn Codec>>,
}

static GLOBAL: OnceLock<Arc<CodecRegistry>> = OnceLock::new();

impl CodecRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in codecs
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(BinaryCodec::new()));
        registry.register(Arc::new(T3BinaryCodec::new()));
        registry.register(Arc::new(MatCodec::new()));
        registry
    }

    /// Process-wide registry with the built-in codecs
    pub fn global() -> Arc<CodecRegistry> {
        GLOBAL.get_or_init(|| Arc::new(Self::with_defaults())).clone()
    }

    /// Adds a codec. A later registration takes over names and extensions
    /// claimed by an earlier one.
    pub fn register(&mut self, codec: Arc<dyn Codec>) {
        for ext in codec.extensions() {
            if let Some(previous) = self.by_extension.insert(ext.to_string(), codec.clone()) {
                log::warn!(
                    "Codec {} replaces {} for extension {}",
                    codec.name(),
                    previous.name(),
                    ext
                );
            }
        }
        self.by_name.insert(codec.name().to_string(), codec);
    }

    /// Codec registered under `name`
    pub fn by_name(&self, name: &str) -> Result<Arc<dyn Codec>> {
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownCodec(name.to_string()))
    }

    /// Codec for the extension of `path`
    pub fn for_path(&self, path: &Path) -> Result<Arc<dyn Codec>> {
        let ext = dotted_extension(path)
            .ok_or_else(|| Error::UnknownCodec(path.display().to_string()))?;
        self.by_extension
            .get(&ext)
            .cloned()
            .ok_or(Error::UnknownCodec(ext))
    }

    /// Registered codec names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
