//! Arrays held in memory or backed by a file.

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::ArrayD;

use crate::core::array::{ArrayData, Element, ElementType, TypeInfo};
use crate::error::Result;
use crate::io::codec::{Codec, CodecRegistry};

#[derive(Clone)]
enum Storage {
    Inline(ArrayData),
    External {
        path: PathBuf,
        codec: Arc<dyn Codec>,
        info: TypeInfo,
    },
}

/// A typed array, either inline or stored in a file and read on demand.
///
/// An external array only remembers its file, codec and type; the values are
/// read through the codec whenever they are asked for, until [`Array::load`]
/// brings them into memory.
#[derive(Clone)]
pub struct Array {
    storage: Storage,
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.storage {
            Storage::Inline(data) => f
                .debug_struct("Array")
                .field("type_info", &data.type_info())
                .field("loaded", &true)
                .finish(),
            Storage::External { path, codec, info } => f
                .debug_struct("Array")
                .field("type_info", info)
                .field("path", path)
                .field("codec", &codec.name())
                .finish(),
        }
    }
}

impl Array {
    /// Inline array holding `data`
    pub fn new(data: ArrayData) -> Self {
        Self {
            storage: Storage::Inline(data),
        }
    }

    /// External array for `path`, using the codec registered for its extension.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let codec = CodecRegistry::global().for_path(path)?;
        Self::open_with(path, codec)
    }

    /// External array for `path` read with `codec`. Only the type is read now.
    pub fn open_with<P: AsRef<Path>>(path: P, codec: Arc<dyn Codec>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let info = codec.peek(&path)?;
        log::debug!("Opened {} ({}) with {}", path.display(), info, codec.name());
        Ok(Self {
            storage: Storage::External { path, codec, info },
        })
    }

    /// Number of dimensions
    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Element type
    pub fn element_type(&self) -> ElementType {
        match &self.storage {
            Storage::Inline(data) => data.dtype(),
            Storage::External { info, .. } => info.dtype,
        }
    }

    /// Extent of every dimension
    pub fn shape(&self) -> &[usize] {
        match &self.storage {
            Storage::Inline(data) => data.shape(),
            Storage::External { info, .. } => &info.shape,
        }
    }

    /// Element type and shape
    pub fn type_info(&self) -> TypeInfo {
        match &self.storage {
            Storage::Inline(data) => data.type_info(),
            Storage::External { info, .. } => info.clone(),
        }
    }

    /// Whether the values are held in memory
    pub fn is_loaded(&self) -> bool {
        matches!(self.storage, Storage::Inline(_))
    }

    /// Backing file of an external array
    pub fn filename(&self) -> Option<&Path> {
        match &self.storage {
            Storage::Inline(_) => None,
            Storage::External { path, .. } => Some(path),
        }
    }

    /// Codec of an external array
    pub fn codec(&self) -> Option<&Arc<dyn Codec>> {
        match &self.storage {
            Storage::Inline(_) => None,
            Storage::External { codec, .. } => Some(codec),
        }
    }

    /// The values, read from the backing file when external.
    pub fn data(&self) -> Result<Cow<'_, ArrayData>> {
        match &self.storage {
            Storage::Inline(data) => Ok(Cow::Borrowed(data)),
            Storage::External { path, codec, .. } => Ok(Cow::Owned(codec.load(path)?)),
        }
    }

    /// Copies the values out as `T`, failing unless `T` is the stored type.
    /// External arrays stay unloaded.
    pub fn get<T: Element>(&self) -> Result<ArrayD<T>> {
        match self.data()? {
            Cow::Borrowed(data) => data.get(),
            Cow::Owned(data) => data.as_array::<T>().map(|a| a.to_owned()),
        }
    }

    /// Copies the values out converted to `T`.
    pub fn cast<T: Element>(&self) -> Result<ArrayD<T>> {
        Ok(self.data()?.cast::<T>())
    }

    /// Reads an external array into memory. The array forgets its file.
    pub fn load(&mut self) -> Result<()> {
        if let Storage::External { path, codec, .. } = &self.storage {
            let data = codec.load(path)?;
            self.storage = Storage::Inline(data);
        }
        Ok(())
    }

    /// Replaces the values; the array becomes inline.
    pub fn set(&mut self, data: ArrayData) {
        self.storage = Storage::Inline(data);
    }

    /// Writes the array with the codec registered for the extension of `path`.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let codec = CodecRegistry::global().for_path(path)?;
        self.save_with(path, codec)
    }

    /// Writes the array to `path` with `codec`. Afterwards the array is
    /// external and refers to `path`; an array already backed by another
    /// file now points at the new one, which leaves the old file in place.
    pub fn save_with<P: AsRef<Path>>(&mut self, path: P, codec: Arc<dyn Codec>) -> Result<()> {
        let path = path.as_ref();
        if let Storage::External { path: current, codec: current_codec, .. } = &self.storage {
            if current == path && current_codec.name() == codec.name() {
                return Ok(());
            }
        }

        let data = self.data()?.into_owned();
        codec.save(path, &data)?;
        // formats may not keep every shape as given (MAT stores 1 x n as a vector)
        let info = codec.peek(path)?;
        log::debug!("Saved {} to {} with {} as {}", data.type_info(), path.display(), codec.name(), info);
        self.storage = Storage::External {
            path: path.to_path_buf(),
            codec,
            info,
        };
        Ok(())
    }
}

impl From<ArrayData> for Array {
    fn from(data: ArrayData) -> Self {
        Self::new(data)
    }
}

impl<T: Element> TryFrom<ArrayD<T>> for Array {
    type Error = crate::error::Error;

    fn try_from(array: ArrayD<T>) -> Result<Self> {
        Ok(Self::new(ArrayData::from_array(array)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use ndarray::arr1;
    use num_complex::Complex;
    use tempfile::tempdir;

    fn sample() -> Array {
        Array::try_from(arr1(&[1.0f64, 2.0, 3.0, 4.0]).into_dyn()).unwrap()
    }

    #[test]
    fn test_inline_array() {
        let array = sample();
        assert!(array.is_loaded());
        assert_eq!(array.ndim(), 1);
        assert_eq!(array.element_type(), ElementType::Float64);
        assert_eq!(array.shape(), &[4]);
        assert!(array.filename().is_none());
        assert!(array.codec().is_none());
        assert!(matches!(array.get::<f32>(), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_save_get_load_cycle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.bin");
        let mut array = sample();
        let values = array.get::<f64>().unwrap();

        array.save(&path).unwrap();
        assert!(!array.is_loaded());
        assert_eq!(array.filename(), Some(path.as_path()));
        assert_eq!(array.codec().unwrap().name(), "arrayio.binary");
        assert_eq!(array.shape(), &[4]);

        assert_eq!(array.get::<f64>().unwrap(), values);
        assert!(!array.is_loaded());

        array.load().unwrap();
        assert!(array.is_loaded());
        assert!(array.filename().is_none());
        assert_eq!(array.get::<f64>().unwrap(), values);
    }

    #[test]
    fn test_save_moves_external_array() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first.bin");
        let second = dir.path().join("second.mat");
        let mut array = sample();

        array.save(&first).unwrap();
        array.save(&second).unwrap();
        assert_eq!(array.filename(), Some(second.as_path()));
        assert_eq!(array.codec().unwrap().name(), "matlab.mat5");
        assert!(!array.is_loaded());
        assert_eq!(array.get::<f64>().unwrap(), arr1(&[1.0, 2.0, 3.0, 4.0]).into_dyn());
        assert!(first.exists());
    }

    #[test]
    fn test_saved_shape_matches_file() {
        let dir = tempdir().unwrap();
        let column = dir.path().join("column.mat");
        let mut array = Array::try_from(ndarray::arr2(&[[1.0f64], [2.0], [3.0]]).into_dyn()).unwrap();
        array.save(&column).unwrap();
        assert_eq!(array.shape(), &[3, 1]);
        assert_eq!(array.get::<f64>().unwrap().shape(), &[3, 1]);
        assert_eq!(Array::open(&column).unwrap().shape(), &[3, 1]);

        let row = dir.path().join("row.mat");
        let mut array = Array::try_from(ndarray::arr2(&[[1.0f64, 2.0, 3.0]]).into_dyn()).unwrap();
        array.save(&row).unwrap();
        assert_eq!(array.shape(), array.get::<f64>().unwrap().shape());
        assert_eq!(array.shape(), &[3]);
    }

    #[test]
    fn test_casts() {
        let array = sample();
        let bytes = array.cast::<u8>().unwrap();
        let floats = array.cast::<f32>().unwrap();
        for (b, f) in bytes.iter().zip(floats.iter()) {
            assert_eq!(*b as f32, *f);
        }

        let complex = Array::new(ArrayData::from_vec(vec![Complex::new(1.5f64, -2.0); 3]).unwrap());
        let narrowed = complex.cast::<Complex<f32>>().unwrap();
        assert!(narrowed.iter().all(|c| *c == Complex::new(1.5f32, -2.0)));
    }

    #[test]
    fn test_clones_share_codec() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.bin");
        let mut array = sample();
        array.save(&path).unwrap();

        let copy = array.clone();
        assert!(Arc::ptr_eq(array.codec().unwrap(), copy.codec().unwrap()));
        assert_eq!(copy.is_loaded(), array.is_loaded());
        assert_eq!(copy.get::<f64>().unwrap(), array.get::<f64>().unwrap());
    }

    #[test]
    fn test_set_makes_inline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s.bin");
        let mut array = sample();
        array.save(&path).unwrap();
        array.set(ArrayData::from_vec(vec![7i32; 2]).unwrap());
        assert!(array.is_loaded());
        assert_eq!(array.element_type(), ElementType::Int32);
        assert!(matches!(
            Array::open(dir.path().join("missing.xyz")),
            Err(Error::UnknownCodec(_))
        ));
    }
}
