//! Id-indexed collections of same-typed arrays.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::array::{ArrayData, TypeInfo};
use crate::error::{Error, Result};
use crate::io::codec::{ArraysetCodec, Codec, CodecRegistry};

#[derive(Clone)]
struct Source {
    path: PathBuf,
    codec: Arc<dyn Codec>,
}

impl Source {
    fn set_codec(&self) -> Result<&dyn ArraysetCodec> {
        arrayset_codec(&self.codec)
    }
}

fn arrayset_codec(codec: &Arc<dyn Codec>) -> Result<&dyn ArraysetCodec> {
    codec
        .as_arrayset()
        .ok_or_else(|| Error::InvalidInput(format!("codec {} cannot store arraysets", codec.name())))
}

/// Ordered collection of arrays sharing one [`TypeInfo`], keyed by id.
///
/// A set opened from a file knows its ids and type up front; member values
/// are read on access until [`Arrayset::load`] is called.
#[derive(Clone, Default)]
pub struct Arrayset {
    info: Option<TypeInfo>,
    // `None` marks a member still in the source file
    arrays: BTreeMap<usize, Option<ArrayData>>,
    source: Option<Source>,
}

impl fmt::Debug for Arrayset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arrayset")
            .field("type_info", &self.info)
            .field("len", &self.arrays.len())
            .field("source", &self.source.as_ref().map(|s| &s.path))
            .finish()
    }
}

impl Arrayset {
    /// An empty set; its type is fixed by the first array added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the set stored in `path`, reading its type and ids only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let codec = CodecRegistry::global().for_path(path)?;
        Self::open_with(path, codec)
    }

    /// Like [`Arrayset::open`] with an explicit codec.
    pub fn open_with<P: AsRef<Path>>(path: P, codec: Arc<dyn Codec>) -> Result<Self> {
        let path = path.as_ref();
        let set_codec = arrayset_codec(&codec)?;
        let (info, count) = set_codec.peek_set(path)?;
        let ids = set_codec.list_ids(path)?;
        if ids.len() != count {
            log::warn!(
                "{} reports {} arrays but lists {} ids",
                path.display(),
                count,
                ids.len()
            );
        }
        log::debug!("Opened arrayset {} ({} x {})", path.display(), ids.len(), info);

        Ok(Self {
            info: Some(info),
            arrays: ids.into_iter().map(|id| (id, None)).collect(),
            source: Some(Source {
                path: path.to_path_buf(),
                codec,
            }),
        })
    }

    fn check(&self, data: &ArrayData) -> Result<()> {
        let Some(info) = &self.info else {
            return Ok(());
        };
        let actual = data.type_info();
        if actual.dtype != info.dtype {
            return Err(Error::TypeMismatch {
                expected: info.dtype,
                actual: actual.dtype,
            });
        }
        if actual.shape != info.shape {
            return Err(Error::ShapeMismatch {
                expected: info.shape.clone(),
                actual: actual.shape,
            });
        }
        Ok(())
    }

    /// Adds an array under the next free id (highest id + 1, starting at 1).
    pub fn add(&mut self, data: ArrayData) -> Result<usize> {
        let id = self.arrays.keys().next_back().map_or(1, |last| last + 1);
        self.add_with_id(id, data)?;
        Ok(id)
    }

    /// Adds or replaces the array stored under `id`.
    pub fn add_with_id(&mut self, id: usize, data: ArrayData) -> Result<()> {
        if id == 0 {
            return Err(Error::InvalidInput("arrayset ids start at 1".to_string()));
        }
        self.check(&data)?;
        if self.info.is_none() {
            self.info = Some(data.type_info());
        }
        self.arrays.insert(id, Some(data));
        Ok(())
    }

    /// Removes the array stored under `id`.
    pub fn remove(&mut self, id: usize) -> Result<()> {
        self.arrays
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("array {} in arrayset", id)))
    }

    /// The array stored under `id`, read from the source file if needed.
    pub fn get(&self, id: usize) -> Result<ArrayData> {
        match self.arrays.get(&id) {
            Some(Some(data)) => Ok(data.clone()),
            Some(None) => {
                let source = self.source.as_ref().ok_or_else(|| {
                    Error::InvalidState(format!("array {} has neither data nor a source file", id))
                })?;
                source.set_codec()?.load_one(&source.path, id)
            }
            None => Err(Error::NotFound(format!("array {} in arrayset", id))),
        }
    }

    /// Ids in ascending order
    pub fn ids(&self) -> Vec<usize> {
        self.arrays.keys().copied().collect()
    }

    /// Number of arrays
    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    /// Whether the set holds no arrays
    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// Type shared by the members; `None` until the first array is added
    pub fn type_info(&self) -> Option<&TypeInfo> {
        self.info.as_ref()
    }

    /// File the set was opened from, while members remain unread
    pub fn filename(&self) -> Option<&Path> {
        self.source.as_ref().map(|s| s.path.as_path())
    }

    /// Whether every member is held in memory
    pub fn is_loaded(&self) -> bool {
        self.arrays.values().all(Option::is_some)
    }

    /// Reads every pending member into memory and forgets the source file.
    pub fn load(&mut self) -> Result<()> {
        if let Some(source) = &self.source {
            if !self.is_loaded() {
                let mut stored = source.set_codec()?.load_set(&source.path)?;
                for (id, slot) in self.arrays.iter_mut() {
                    if slot.is_none() {
                        let data = stored.remove(id).ok_or_else(|| {
                            Error::NotFound(format!("array {} in {}", id, source.path.display()))
                        })?;
                        *slot = Some(data);
                    }
                }
            }
        }
        self.source = None;
        Ok(())
    }

    /// Writes every member to `path` with the codec for its extension.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let codec = CodecRegistry::global().for_path(path)?;
        self.save_with(path, codec)
    }

    /// Writes every member to `path` with `codec`. The set is loaded first so
    /// that overwriting its own source file is safe.
    pub fn save_with<P: AsRef<Path>>(&mut self, path: P, codec: Arc<dyn Codec>) -> Result<()> {
        let path = path.as_ref();
        let set_codec = arrayset_codec(&codec)?;
        if self.is_empty() {
            return Err(Error::InvalidInput("cannot save an empty arrayset".to_string()));
        }
        self.load()?;

        let arrays: BTreeMap<usize, ArrayData> = self
            .arrays
            .iter()
            .filter_map(|(id, data)| data.clone().map(|d| (*id, d)))
            .collect();
        set_codec.save_set(path, &arrays)?;
        log::debug!("Saved arrayset of {} arrays to {}", arrays.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::array::ElementType;
    use tempfile::tempdir;

    fn vector(values: &[f64]) -> ArrayData {
        ArrayData::from_vec(values.to_vec()).unwrap()
    }

    #[test]
    fn test_ids_and_types() {
        let mut set = Arrayset::new();
        assert!(set.is_empty());
        assert!(set.type_info().is_none());

        assert_eq!(set.add(vector(&[1.0, 2.0])).unwrap(), 1);
        assert_eq!(set.add(vector(&[3.0, 4.0])).unwrap(), 2);
        set.add_with_id(10, vector(&[5.0, 6.0])).unwrap();
        assert_eq!(set.add(vector(&[7.0, 8.0])).unwrap(), 11);
        assert_eq!(set.ids(), vec![1, 2, 10, 11]);
        assert_eq!(set.type_info().unwrap().dtype, ElementType::Float64);

        assert!(matches!(
            set.add(ArrayData::from_vec(vec![1.0f32, 2.0]).unwrap()),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(set.add(vector(&[1.0])), Err(Error::ShapeMismatch { .. })));

        set.remove(2).unwrap();
        assert!(matches!(set.remove(2), Err(Error::NotFound(_))));
        assert!(matches!(set.get(2), Err(Error::NotFound(_))));
        assert_eq!(set.get(10).unwrap(), vector(&[5.0, 6.0]));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_open_is_lazy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("set.mat");
        let mut set = Arrayset::new();
        set.add_with_id(4, vector(&[1.0, 2.0, 3.0])).unwrap();
        set.add_with_id(9, vector(&[4.0, 5.0, 6.0])).unwrap();
        set.save(&path).unwrap();

        let mut opened = Arrayset::open(&path).unwrap();
        assert!(!opened.is_loaded());
        assert_eq!(opened.ids(), vec![4, 9]);
        assert_eq!(opened.get(9).unwrap(), vector(&[4.0, 5.0, 6.0]));
        assert!(!opened.is_loaded());

        opened.load().unwrap();
        assert!(opened.is_loaded());
        assert!(opened.filename().is_none());
        assert_eq!(opened.get(4).unwrap(), vector(&[1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_binary_codec_has_no_arraysets() {
        let dir = tempdir().unwrap();
        let mut set = Arrayset::new();
        set.add(vector(&[1.0])).unwrap();
        assert!(matches!(
            set.save(dir.path().join("set.bin")),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(Arrayset::new().save(dir.path().join("e.mat")), Err(Error::InvalidInput(_))));
    }
}
