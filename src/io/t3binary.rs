//! Torch3 `bindata` files: `i32 n_samples`, `i32 frame_size`, then the samples
//! back to back as `f32` or `f64`. The value width is not recorded and is
//! inferred from the file size.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::core::array::{ArrayData, ElementType, TypeInfo};
use crate::error::{Error, Result};
use crate::io::codec::{ArraysetCodec, Codec};

const HEADER_SIZE: u64 = 8;

/// Layout of a bindata file
#[derive(Debug, Clone, Copy, PartialEq)]
struct Layout {
    n_samples: usize,
    frame_size: usize,
    dtype: ElementType,
}

impl Layout {
    fn sample_info(&self) -> TypeInfo {
        TypeInfo {
            dtype: self.dtype,
            shape: vec![self.frame_size],
        }
    }

    fn array_info(&self) -> TypeInfo {
        let shape = if self.n_samples == 1 {
            vec![self.frame_size]
        } else {
            vec![self.n_samples, self.frame_size]
        };
        TypeInfo {
            dtype: self.dtype,
            shape,
        }
    }
}

/// Codec for Torch3 `.bindata` files
#[derive(Debug, Default)]
pub struct T3BinaryCodec;

impl T3BinaryCodec {
    /// Creates the codec
    pub fn new() -> Self {
        Self
    }

    fn read_layout<R: Read>(&self, reader: &mut R, file_size: u64, path: &Path) -> Result<Layout> {
        let n_samples = reader.read_i32::<LittleEndian>()?;
        let frame_size = reader.read_i32::<LittleEndian>()?;
        if n_samples <= 0 || frame_size <= 0 {
            return Err(Error::Format(format!(
                "{}: invalid header ({} samples of size {})",
                path.display(),
                n_samples,
                frame_size
            )));
        }

        let values = n_samples as u64 * frame_size as u64;
        let payload = file_size.saturating_sub(HEADER_SIZE);
        let dtype = if values.checked_mul(4) == Some(payload) {
            ElementType::Float32
        } else if values.checked_mul(8) == Some(payload) {
            ElementType::Float64
        } else {
            return Err(Error::Format(format!(
                "{}: {} payload bytes do not hold {} float or double values",
                path.display(),
                payload,
                values
            )));
        };

        Ok(Layout {
            n_samples: n_samples as usize,
            frame_size: frame_size as usize,
            dtype,
        })
    }

    fn open(&self, path: &Path) -> Result<(Layout, BufReader<File>)> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let layout = self.read_layout(&mut reader, size, path)?;
        Ok((layout, reader))
    }

    fn read_payload(&self, path: &Path) -> Result<(Layout, Vec<u8>)> {
        let (layout, mut reader) = self.open(path)?;
        let mut payload = Vec::new();
        reader.read_to_end(&mut payload)?;
        Ok((layout, payload))
    }

    fn write(&self, path: &Path, n_samples: usize, frame_size: usize, payload: &[u8]) -> Result<()> {
        let to_i32 = |v: usize, what: &str| {
            i32::try_from(v).map_err(|_| Error::InvalidInput(format!("{} {} exceeds the format limit", what, v)))
        };
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_i32::<LittleEndian>(to_i32(n_samples, "sample count")?)?;
        writer.write_i32::<LittleEndian>(to_i32(frame_size, "frame size")?)?;
        writer.write_all(payload)?;
        writer.flush()?;
        log::debug!(
            "Saved {} samples of size {} to {}",
            n_samples,
            frame_size,
            path.display()
        );
        Ok(())
    }
}

fn check_float(dtype: ElementType) -> Result<()> {
    match dtype {
        ElementType::Float32 | ElementType::Float64 => Ok(()),
        other => Err(Error::TypeMismatch {
            expected: ElementType::Float32,
            actual: other,
        }),
    }
}

impl Codec for T3BinaryCodec {
    fn name(&self) -> &str {
        "torch3.binary"
    }

    fn extensions(&self) -> &[&'static str] {
        &[".bindata"]
    }

    fn peek(&self, path: &Path) -> Result<TypeInfo> {
        Ok(self.open(path)?.0.array_info())
    }

    fn load(&self, path: &Path) -> Result<ArrayData> {
        let (layout, payload) = self.read_payload(path)?;
        ArrayData::from_le_bytes(&layout.array_info(), &payload)
    }

    fn save(&self, path: &Path, data: &ArrayData) -> Result<()> {
        check_float(data.dtype())?;
        let (n_samples, frame_size) = match data.shape() {
            &[frame_size] => (1, frame_size),
            &[n_samples, frame_size] => (n_samples, frame_size),
            shape => {
                return Err(Error::Dimension {
                    got: shape.len(),
                    max: 2,
                })
            }
        };
        self.write(path, n_samples, frame_size, &data.to_le_bytes())
    }

    fn as_arrayset(&self) -> Option<&dyn ArraysetCodec> {
        Some(self)
    }
}

impl ArraysetCodec for T3BinaryCodec {
    fn peek_set(&self, path: &Path) -> Result<(TypeInfo, usize)> {
        let layout = self.open(path)?.0;
        Ok((layout.sample_info(), layout.n_samples))
    }

    fn list_ids(&self, path: &Path) -> Result<Vec<usize>> {
        Ok((1..=self.open(path)?.0.n_samples).collect())
    }

    fn load_set(&self, path: &Path) -> Result<BTreeMap<usize, ArrayData>> {
        let (layout, payload) = self.read_payload(path)?;
        let info = layout.sample_info();
        payload
            .chunks_exact(info.buffer_size())
            .enumerate()
            .map(|(i, chunk)| -> Result<(usize, ArrayData)> {
                Ok((i + 1, ArrayData::from_le_bytes(&info, chunk)?))
            })
            .collect()
    }

    fn load_one(&self, path: &Path, id: usize) -> Result<ArrayData> {
        let (layout, mut reader) = self.open(path)?;
        if id == 0 || id > layout.n_samples {
            return Err(Error::NotFound(format!("sample {} in {}", id, path.display())));
        }
        let info = layout.sample_info();
        let sample_bytes = info.buffer_size();
        std::io::copy(
            &mut reader.by_ref().take(((id - 1) * sample_bytes) as u64),
            &mut std::io::sink(),
        )?;
        let mut chunk = vec![0u8; sample_bytes];
        reader.read_exact(&mut chunk)?;
        ArrayData::from_le_bytes(&info, &chunk)
    }

    fn save_set(&self, path: &Path, arrays: &BTreeMap<usize, ArrayData>) -> Result<()> {
        let first = arrays
            .values()
            .next()
            .ok_or_else(|| Error::InvalidInput("cannot save an empty arrayset".to_string()))?
            .type_info();
        check_float(first.dtype)?;
        if first.ndim() != 1 {
            return Err(Error::Dimension {
                got: first.ndim(),
                max: 1,
            });
        }

        let mut payload = Vec::with_capacity(first.buffer_size() * arrays.len());
        for data in arrays.values() {
            let info = data.type_info();
            if info.dtype != first.dtype {
                return Err(Error::TypeMismatch {
                    expected: first.dtype,
                    actual: info.dtype,
                });
            }
            if info.shape != first.shape {
                return Err(Error::ShapeMismatch {
                    expected: first.shape.clone(),
                    actual: info.shape,
                });
            }
            payload.extend_from_slice(&data.to_le_bytes());
        }
        self.write(path, arrays.len(), first.shape[0], &payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};
    use tempfile::tempdir;

    #[test]
    fn test_float_width_is_inferred() {
        let dir = tempdir().unwrap();
        let codec = T3BinaryCodec::new();

        let single = ArrayData::from_array(arr2(&[[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]])).unwrap();
        let path = dir.path().join("f.bindata");
        codec.save(&path, &single).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 8 + 6 * 4);
        assert_eq!(codec.peek(&path).unwrap(), single.type_info());
        assert_eq!(codec.load(&path).unwrap(), single);

        let double = ArrayData::from_array(arr1(&[1.0f64, 2.0, 3.0, 4.0])).unwrap();
        let path = dir.path().join("d.bindata");
        codec.save(&path, &double).unwrap();
        let info = codec.peek(&path).unwrap();
        assert_eq!(info.dtype, ElementType::Float64);
        assert_eq!(info.shape, vec![4]);
        assert_eq!(codec.load(&path).unwrap(), double);
    }

    #[test]
    fn test_rejects_non_float_and_high_rank() {
        let dir = tempdir().unwrap();
        let codec = T3BinaryCodec::new();
        let path = dir.path().join("x.bindata");

        let ints = ArrayData::from_vec(vec![1i32, 2]).unwrap();
        assert!(matches!(codec.save(&path, &ints), Err(Error::TypeMismatch { .. })));

        let cube = ArrayData::from_array(ndarray::Array3::<f32>::zeros((2, 2, 2))).unwrap();
        assert!(matches!(codec.save(&path, &cube), Err(Error::Dimension { got: 3, max: 2 })));
    }

    #[test]
    fn test_corrupt_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.bindata");
        let mut bytes = Vec::new();
        bytes.write_i32::<LittleEndian>(2).unwrap();
        bytes.write_i32::<LittleEndian>(3).unwrap();
        bytes.extend_from_slice(&[0u8; 10]);
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(T3BinaryCodec::new().peek(&path), Err(Error::Format(_))));
    }

    #[test]
    fn test_huge_header_counts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("huge.bindata");
        let mut bytes = Vec::new();
        bytes.write_i32::<LittleEndian>(i32::MAX).unwrap();
        bytes.write_i32::<LittleEndian>(i32::MAX).unwrap();
        bytes.extend_from_slice(&[0u8; 32]);
        std::fs::write(&path, bytes).unwrap();

        let codec = T3BinaryCodec::new();
        assert!(matches!(codec.peek(&path), Err(Error::Format(_))));
        assert!(matches!(codec.load(&path), Err(Error::Format(_))));
        assert!(matches!(codec.peek_set(&path), Err(Error::Format(_))));
    }

    #[test]
    fn test_samples_as_arrayset() {
        let dir = tempdir().unwrap();
        let codec = T3BinaryCodec::new();
        let path = dir.path().join("set.bindata");

        let mut samples = BTreeMap::new();
        samples.insert(1, ArrayData::from_vec(vec![1.0f32, 2.0]).unwrap());
        samples.insert(2, ArrayData::from_vec(vec![3.0f32, 4.0]).unwrap());
        samples.insert(5, ArrayData::from_vec(vec![5.0f32, 6.0]).unwrap());
        codec.save_set(&path, &samples).unwrap();

        let (info, count) = codec.peek_set(&path).unwrap();
        assert_eq!(info.shape, vec![2]);
        assert_eq!(count, 3);
        assert_eq!(codec.list_ids(&path).unwrap(), vec![1, 2, 3]);

        // ids are renumbered densely from 1
        let loaded = codec.load_set(&path).unwrap();
        assert_eq!(loaded.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(loaded[&3], samples[&5]);
        assert_eq!(codec.load_one(&path, 2).unwrap(), samples[&2]);
        assert!(matches!(codec.load_one(&path, 4), Err(Error::NotFound(_))));

        let mut mixed = samples.clone();
        mixed.insert(9, ArrayData::from_vec(vec![1.0f32]).unwrap());
        assert!(matches!(codec.save_set(&path, &mixed), Err(Error::ShapeMismatch { .. })));
    }
}
