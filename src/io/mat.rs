//! MATLAB level-5 MAT files, uncompressed, little endian.
//!
//! MATLAB stores matrices column-major with complex parts split into separate
//! real and imaginary elements; both are converted to and from the row-major
//! interleaved layout of [`ArrayData`] here. Arraysets are stored as one
//! variable per array, named `array_<id>`.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use serde::Serialize;

use crate::core::array::{ArrayData, ElementType, TypeInfo};
use crate::error::{Error, Result};
use crate::io::codec::{ArraysetCodec, Codec};

const HEADER_LEN: usize = 128;
const TEXT_LEN: usize = 116;
const VERSION: u16 = 0x0100;
const MAX_NAME_LEN: usize = 63;

/// Data element types
mod mi {
    pub(super) const INT8: u32 = 1;
    pub(super) const UINT8: u32 = 2;
    pub(super) const INT16: u32 = 3;
    pub(super) const UINT16: u32 = 4;
    pub(super) const INT32: u32 = 5;
    pub(super) const UINT32: u32 = 6;
    pub(super) const SINGLE: u32 = 7;
    pub(super) const DOUBLE: u32 = 9;
    pub(super) const INT64: u32 = 12;
    pub(super) const UINT64: u32 = 13;
    pub(super) const MATRIX: u32 = 14;
    pub(super) const COMPRESSED: u32 = 15;
}

/// Array classes
mod mx {
    pub(super) const DOUBLE: u32 = 6;
    pub(super) const SINGLE: u32 = 7;
    pub(super) const INT8: u32 = 8;
    pub(super) const UINT8: u32 = 9;
    pub(super) const INT16: u32 = 10;
    pub(super) const UINT16: u32 = 11;
    pub(super) const INT32: u32 = 12;
    pub(super) const UINT32: u32 = 13;
    pub(super) const INT64: u32 = 14;
    pub(super) const UINT64: u32 = 15;
}

const FLAG_COMPLEX: u32 = 0x0800;
const FLAG_LOGICAL: u32 = 0x0200;

/// Element type of values stored as `mi_type`
fn storage_type(mi_type: u32) -> Option<ElementType> {
    Some(match mi_type {
        mi::INT8 => ElementType::Int8,
        mi::UINT8 => ElementType::UInt8,
        mi::INT16 => ElementType::Int16,
        mi::UINT16 => ElementType::UInt16,
        mi::INT32 => ElementType::Int32,
        mi::UINT32 => ElementType::UInt32,
        mi::SINGLE => ElementType::Float32,
        mi::DOUBLE => ElementType::Float64,
        mi::INT64 => ElementType::Int64,
        mi::UINT64 => ElementType::UInt64,
        _ => return None,
    })
}

/// Data type and class written for an element type
fn mat_types(dtype: ElementType) -> (u32, u32) {
    match dtype {
        ElementType::Bool | ElementType::UInt8 => (mi::UINT8, mx::UINT8),
        ElementType::Int8 => (mi::INT8, mx::INT8),
        ElementType::Int16 => (mi::INT16, mx::INT16),
        ElementType::UInt16 => (mi::UINT16, mx::UINT16),
        ElementType::Int32 => (mi::INT32, mx::INT32),
        ElementType::UInt32 => (mi::UINT32, mx::UINT32),
        ElementType::Int64 => (mi::INT64, mx::INT64),
        ElementType::UInt64 => (mi::UINT64, mx::UINT64),
        ElementType::Float32 | ElementType::Complex64 => (mi::SINGLE, mx::SINGLE),
        ElementType::Float64 | ElementType::Complex128 => (mi::DOUBLE, mx::DOUBLE),
    }
}

/// Element type for a class and its flags; `None` for classes with no counterpart
fn element_type(class: u32, complex: bool, logical: bool) -> Option<ElementType> {
    let dtype = match class {
        mx::DOUBLE => ElementType::Float64,
        mx::SINGLE => ElementType::Float32,
        mx::INT8 => ElementType::Int8,
        mx::UINT8 if logical => ElementType::Bool,
        mx::UINT8 => ElementType::UInt8,
        mx::INT16 => ElementType::Int16,
        mx::UINT16 => ElementType::UInt16,
        mx::INT32 => ElementType::Int32,
        mx::UINT32 => ElementType::UInt32,
        mx::INT64 => ElementType::Int64,
        mx::UINT64 => ElementType::UInt64,
        _ => return None,
    };
    if !complex {
        return Some(dtype);
    }
    match dtype {
        ElementType::Float32 => Some(ElementType::Complex64),
        ElementType::Float64 => Some(ElementType::Complex128),
        _ => None,
    }
}

fn padded(n: usize) -> usize {
    (n + 7) & !7
}

/// Id of an arrayset member variable (`array_<digits>`)
fn set_id(name: &str) -> Option<usize> {
    name.strip_prefix("array_")
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse().ok())
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name.len() <= MAX_NAME_LEN
}

#[derive(Debug, Clone, Copy)]
struct DataElement<'a> {
    mi_type: u32,
    data: &'a [u8],
}

/// Walks the tagged data elements of a buffer.
struct ElementReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ElementReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn next(&mut self) -> Result<Option<DataElement<'a>>> {
        if self.pos + 8 > self.buf.len() {
            return Ok(None);
        }
        let first = LittleEndian::read_u32(&self.buf[self.pos..]);

        // small data element: type and size share the first word, data fits in the second
        if first >> 16 != 0 {
            let len = (first >> 16) as usize;
            if len > 4 {
                return Err(Error::Format(format!("small data element of {} bytes", len)));
            }
            let start = self.pos + 4;
            self.pos += 8;
            return Ok(Some(DataElement {
                mi_type: first & 0xffff,
                data: &self.buf[start..start + len],
            }));
        }

        let len = LittleEndian::read_u32(&self.buf[self.pos + 4..]) as usize;
        let start = self.pos + 8;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| Error::Format(format!("truncated data element at offset {}", self.pos)))?;
        self.pos = (start + padded(len)).min(self.buf.len());
        Ok(Some(DataElement {
            mi_type: first,
            data: &self.buf[start..end],
        }))
    }

    fn require(&mut self, what: &str) -> Result<DataElement<'a>> {
        self.next()?
            .ok_or_else(|| Error::Format(format!("matrix is missing its {}", what)))
    }
}

/// A parsed `miMATRIX` element, data still encoded
struct RawVariable<'a> {
    name: String,
    info: std::result::Result<TypeInfo, String>,
    real: Option<DataElement<'a>>,
    imag: Option<DataElement<'a>>,
}

impl RawVariable<'_> {
    fn type_info(&self) -> Result<&TypeInfo> {
        self.info
            .as_ref()
            .map_err(|reason| Error::Format(format!("variable '{}': {}", self.name, reason)))
    }

    fn decode(&self) -> Result<ArrayData> {
        let info = self.type_info()?;
        let component = info.dtype.component();
        let col_shape: Vec<usize> = info.shape.iter().rev().copied().collect();

        let part = |element: &DataElement<'_>| -> Result<ArrayData> {
            let stored = storage_type(element.mi_type).ok_or_else(|| {
                Error::Format(format!(
                    "variable '{}': unsupported storage type {}",
                    self.name, element.mi_type
                ))
            })?;
            let col_info = TypeInfo {
                dtype: stored,
                shape: col_shape.clone(),
            };
            let col = ArrayData::from_le_bytes(&col_info, element.data)?;
            Ok(col.reversed_axes().cast_to(component))
        };

        let real = self
            .real
            .as_ref()
            .ok_or_else(|| Error::Format(format!("variable '{}' has no data", self.name)))?;
        let real = part(real)?;
        match &self.imag {
            Some(imag) => ArrayData::from_real_imag(&real, &part(imag)?, info.dtype),
            None => Ok(real),
        }
    }
}

fn parse_matrix(data: &[u8]) -> Result<RawVariable<'_>> {
    let mut reader = ElementReader::new(data);

    let flags = reader.require("array flags")?;
    if flags.data.len() < 4 {
        return Err(Error::Format("array flags element too short".to_string()));
    }
    let flags = LittleEndian::read_u32(flags.data);
    let class = flags & 0xff;
    let complex = flags & FLAG_COMPLEX != 0;
    let logical = flags & FLAG_LOGICAL != 0;

    let dims = reader.require("dimensions")?;
    if dims.mi_type != mi::INT32 {
        return Err(Error::Format(format!("dimensions stored as type {}", dims.mi_type)));
    }
    let dims: Vec<i32> = dims.data.chunks_exact(4).map(LittleEndian::read_i32).collect();

    let name = reader.require("name")?;
    let name = String::from_utf8_lossy(name.data).into_owned();

    let info = match element_type(class, complex, logical) {
        None => Err(format!("unsupported class {} (complex: {})", class, complex)),
        Some(dtype) => match dims.iter().map(|&d| usize::try_from(d)).collect::<std::result::Result<Vec<_>, _>>() {
            Err(_) => Err(format!("negative dimension in {:?}", dims)),
            Ok(mut shape) => {
                // row vectors come back one-dimensional
                if shape.len() == 2 && shape[0] == 1 {
                    shape.remove(0);
                }
                TypeInfo::new(dtype, shape).map_err(|e| e.to_string())
            }
        },
    };

    let (real, imag) = if info.is_ok() {
        let real = reader.require("real part")?;
        let imag = if complex {
            Some(reader.require("imaginary part")?)
        } else {
            None
        };
        (Some(real), imag)
    } else {
        (None, None)
    };

    Ok(RawVariable {
        name,
        info,
        real,
        imag,
    })
}

fn write_element(out: &mut Vec<u8>, mi_type: u32, data: &[u8]) -> Result<()> {
    let len = u32::try_from(data.len())
        .map_err(|_| Error::InvalidInput(format!("{} bytes exceed the MAT element limit", data.len())))?;
    out.write_u32::<LittleEndian>(mi_type)?;
    out.write_u32::<LittleEndian>(len)?;
    out.extend_from_slice(data);
    out.resize(out.len() + padded(data.len()) - data.len(), 0);
    Ok(())
}

fn write_header(out: &mut Vec<u8>) -> Result<()> {
    let mut text = format!(
        "MATLAB 5.0 MAT-file, Platform: {}, Created on: {}",
        std::env::consts::OS,
        chrono::Utc::now().format("%a %b %e %H:%M:%S %Y")
    )
    .into_bytes();
    text.resize(TEXT_LEN, b' ');
    out.extend_from_slice(&text);
    out.extend_from_slice(&[0u8; 8]);
    out.write_u16::<LittleEndian>(VERSION)?;
    out.extend_from_slice(b"IM");
    Ok(())
}

fn write_variable(out: &mut Vec<u8>, name: &str, data: &ArrayData) -> Result<()> {
    let info = data.type_info();
    let (mi_type, class) = mat_types(info.dtype);

    let mut flags = class;
    if info.dtype.is_complex() {
        flags |= FLAG_COMPLEX;
    }
    if info.dtype == ElementType::Bool {
        flags |= FLAG_LOGICAL;
    }

    let mut body = Vec::new();
    let mut flag_bytes = Vec::with_capacity(8);
    flag_bytes.write_u32::<LittleEndian>(flags)?;
    flag_bytes.write_u32::<LittleEndian>(0)?;
    write_element(&mut body, mi::UINT32, &flag_bytes)?;

    // MATLAB has no one-dimensional arrays; vectors are stored as rows
    let dims = if info.ndim() == 1 {
        vec![1, info.shape[0]]
    } else {
        info.shape.clone()
    };
    let mut dim_bytes = Vec::with_capacity(dims.len() * 4);
    for d in dims {
        let d = i32::try_from(d)
            .map_err(|_| Error::InvalidInput(format!("dimension {} exceeds the MAT limit", d)))?;
        dim_bytes.write_i32::<LittleEndian>(d)?;
    }
    write_element(&mut body, mi::INT32, &dim_bytes)?;
    write_element(&mut body, mi::INT8, name.as_bytes())?;

    let storage = storage_type(mi_type).unwrap_or(ElementType::UInt8);
    let col = data.reversed_axes();
    write_element(&mut body, mi_type, &col.real_part().cast_to(storage).to_le_bytes())?;
    if let Some(imag) = col.imag_part() {
        write_element(&mut body, mi_type, &imag.to_le_bytes())?;
    }

    write_element(out, mi::MATRIX, &body)
}

/// Name and type of a variable found in a MAT file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatVariable {
    /// Variable name
    pub name: String,
    /// Type, or `None` when the variable cannot be represented as an array
    pub info: Option<TypeInfo>,
}

/// Codec for MATLAB `.mat` files
#[derive(Debug, Default)]
pub struct MatCodec;

impl MatCodec {
    /// Creates the codec
    pub fn new() -> Self {
        Self
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let bytes = std::fs::read(path)?;
        if bytes.len() < HEADER_LEN {
            return Err(Error::Format(format!("{} is too short for a MAT file", path.display())));
        }
        match &bytes[126..128] {
            b"IM" => {}
            b"MI" => {
                return Err(Error::Format(format!(
                    "{}: big-endian MAT files are not supported",
                    path.display()
                )))
            }
            _ => return Err(Error::Format(format!("{} is not a level-5 MAT file", path.display()))),
        }
        let version = LittleEndian::read_u16(&bytes[124..126]);
        if version != VERSION {
            return Err(Error::Format(format!(
                "{}: unsupported MAT version {:#06x}",
                path.display(),
                version
            )));
        }
        Ok(bytes)
    }

    fn variables<'a>(&self, bytes: &'a [u8], path: &Path) -> Result<Vec<RawVariable<'a>>> {
        let mut reader = ElementReader::new(&bytes[HEADER_LEN..]);
        let mut variables = Vec::new();
        while let Some(element) = reader.next()? {
            match element.mi_type {
                mi::MATRIX => variables.push(parse_matrix(element.data)?),
                mi::COMPRESSED => {
                    log::warn!("Skipping compressed variable in {}", path.display());
                }
                other => {
                    log::debug!("Skipping top-level element of type {} in {}", other, path.display());
                }
            }
        }
        Ok(variables)
    }

    /// Lists every variable in the file with its type.
    pub fn list_variables(&self, path: &Path) -> Result<Vec<MatVariable>> {
        let bytes = self.read_file(path)?;
        Ok(self
            .variables(&bytes, path)?
            .into_iter()
            .map(|v| MatVariable {
                info: v.info.ok(),
                name: v.name,
            })
            .collect())
    }

    /// Loads the variable called `name`.
    pub fn load_named(&self, path: &Path, name: &str) -> Result<ArrayData> {
        let bytes = self.read_file(path)?;
        self.variables(&bytes, path)?
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| Error::NotFound(format!("variable '{}' in {}", name, path.display())))?
            .decode()
    }

    /// Writes the given variables, in order, replacing any existing file.
    pub fn save_named(&self, path: &Path, variables: &[(&str, &ArrayData)]) -> Result<()> {
        let mut out = Vec::new();
        write_header(&mut out)?;
        for (name, data) in variables {
            if !is_valid_name(name) {
                return Err(Error::InvalidInput(format!("'{}' is not a valid MATLAB variable name", name)));
            }
            write_variable(&mut out, name, data)?;
        }
        // write next to the target and rename, so readers never see a partial file
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&out)?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;
        log::debug!("Saved {} variables to {}", variables.len(), path.display());
        Ok(())
    }
}

impl Codec for MatCodec {
    fn name(&self) -> &str {
        "matlab.mat5"
    }

    fn extensions(&self) -> &[&'static str] {
        &[".mat"]
    }

    fn peek(&self, path: &Path) -> Result<TypeInfo> {
        let bytes = self.read_file(path)?;
        let variables = self.variables(&bytes, path)?;
        let first = variables
            .first()
            .ok_or_else(|| Error::Uninitialized(format!("{} holds no variables", path.display())))?;
        first.type_info().cloned()
    }

    fn load(&self, path: &Path) -> Result<ArrayData> {
        let bytes = self.read_file(path)?;
        let variables = self.variables(&bytes, path)?;
        variables
            .first()
            .ok_or_else(|| Error::Uninitialized(format!("{} holds no variables", path.display())))?
            .decode()
    }

    fn save(&self, path: &Path, data: &ArrayData) -> Result<()> {
        self.save_named(path, &[("array", data)])
    }

    fn as_arrayset(&self) -> Option<&dyn ArraysetCodec> {
        Some(self)
    }
}

impl ArraysetCodec for MatCodec {
    fn peek_set(&self, path: &Path) -> Result<(TypeInfo, usize)> {
        let bytes = self.read_file(path)?;
        let variables = self.variables(&bytes, path)?;
        let mut members = variables.iter().filter(|v| set_id(&v.name).is_some());
        let first = members
            .next()
            .ok_or_else(|| Error::Uninitialized(format!("{} holds no array_<N> variables", path.display())))?;
        let info = first.type_info()?.clone();
        Ok((info, 1 + members.count()))
    }

    fn list_ids(&self, path: &Path) -> Result<Vec<usize>> {
        let bytes = self.read_file(path)?;
        let mut ids: Vec<usize> = self
            .variables(&bytes, path)?
            .iter()
            .filter_map(|v| set_id(&v.name))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    fn load_set(&self, path: &Path) -> Result<BTreeMap<usize, ArrayData>> {
        let bytes = self.read_file(path)?;
        let mut arrays = BTreeMap::new();
        for variable in self.variables(&bytes, path)? {
            if let Some(id) = set_id(&variable.name) {
                arrays.insert(id, variable.decode()?);
            }
        }
        if arrays.is_empty() {
            return Err(Error::Uninitialized(format!(
                "{} holds no array_<N> variables",
                path.display()
            )));
        }
        Ok(arrays)
    }

    fn load_one(&self, path: &Path, id: usize) -> Result<ArrayData> {
        self.load_named(path, &format!("array_{}", id))
    }

    fn save_set(&self, path: &Path, arrays: &BTreeMap<usize, ArrayData>) -> Result<()> {
        let names: Vec<String> = arrays.keys().map(|id| format!("array_{}", id)).collect();
        let variables: Vec<(&str, &ArrayData)> = names
            .iter()
            .map(String::as_str)
            .zip(arrays.values())
            .collect();
        self.save_named(path, &variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, Array4, Array3};
    use num_complex::Complex;
    use tempfile::tempdir;

    fn round_trip(data: &ArrayData) -> ArrayData {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rt.mat");
        let codec = MatCodec::new();
        codec.save(&path, data).unwrap();
        assert_eq!(codec.peek(&path).unwrap(), data.type_info());
        codec.load(&path).unwrap()
    }

    #[test]
    fn test_round_trips() {
        let vector = ArrayData::from_array(arr1(&[1.0f64, 2.0, 3.0, 4.0])).unwrap();
        assert_eq!(round_trip(&vector), vector);

        let matrix = ArrayData::from_array(arr2(&[[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]])).unwrap();
        let back = round_trip(&matrix);
        assert_eq!(back.get::<f32>().unwrap()[[1, 0]], 4.0);
        assert_eq!(back, matrix);

        let block = Array4::from_shape_fn((2, 3, 4, 5), |(i, j, k, l)| (i * 1000 + j * 100 + k * 10 + l) as f64);
        let block = ArrayData::from_array(block).unwrap();
        assert_eq!(round_trip(&block), block);

        let complex = ArrayData::from_array(arr2(&[
            [Complex::new(1.0f64, -1.0), Complex::new(2.0, -2.0)],
            [Complex::new(3.0, -3.0), Complex::new(4.0, -4.0)],
        ]))
        .unwrap();
        assert_eq!(round_trip(&complex), complex);

        let flags = ArrayData::from_array(Array3::from_shape_fn((2, 2, 3), |(i, j, k)| (i + j + k) % 2 == 0)).unwrap();
        assert_eq!(round_trip(&flags), flags);

        let ints = ArrayData::from_vec(vec![-5i16, 7, i16::MAX]).unwrap();
        assert_eq!(round_trip(&ints), ints);
    }

    #[test]
    fn test_vector_shapes() {
        let column = ArrayData::from_array(arr2(&[[1.0f64], [2.0], [3.0]])).unwrap();
        assert_eq!(round_trip(&column), column);

        // a 1 x n matrix is indistinguishable from a vector once stored
        let row = ArrayData::from_array(arr2(&[[1.0f64, 2.0, 3.0]])).unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("row.mat");
        MatCodec::new().save(&path, &row).unwrap();
        assert_eq!(MatCodec::new().peek(&path).unwrap().shape, vec![3]);
        assert_eq!(MatCodec::new().load(&path).unwrap(), ArrayData::from_vec(vec![1.0f64, 2.0, 3.0]).unwrap());
    }

    #[test]
    fn test_data_is_written_column_major() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("col.mat");
        let matrix = ArrayData::from_array(arr2(&[[1u8, 2, 3], [4, 5, 6]])).unwrap();
        MatCodec::new().save(&path, &matrix).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let needle = [1u8, 4, 2, 5, 3, 6];
        assert!(bytes.windows(needle.len()).any(|w| w == needle));
    }

    /// Builds a file the way MATLAB writes a double matrix with small
    /// integer values: storage narrowed to uint8 and a packed name element.
    fn matlab_style_file(extents: &[i32]) -> Vec<u8> {
        let mut out = Vec::new();
        write_header(&mut out).unwrap();

        let mut body = Vec::new();
        let mut flag_bytes = Vec::new();
        flag_bytes.write_u32::<LittleEndian>(mx::DOUBLE).unwrap();
        flag_bytes.write_u32::<LittleEndian>(0).unwrap();
        write_element(&mut body, mi::UINT32, &flag_bytes).unwrap();
        let mut dims = Vec::new();
        for &extent in extents {
            dims.write_i32::<LittleEndian>(extent).unwrap();
        }
        write_element(&mut body, mi::INT32, &dims).unwrap();
        body.write_u32::<LittleEndian>(mi::INT8 | (1 << 16)).unwrap();
        body.extend_from_slice(b"x\0\0\0");
        write_element(&mut body, mi::UINT8, &[1, 3, 2, 4]).unwrap();
        write_element(&mut out, mi::MATRIX, &body).unwrap();
        out
    }

    #[test]
    fn test_reads_narrowed_storage_and_small_elements() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("matlab.mat");
        std::fs::write(&path, matlab_style_file(&[2, 2])).unwrap();

        let codec = MatCodec::new();
        let vars = codec.list_variables(&path).unwrap();
        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].name, "x");

        let data = codec.load_named(&path, "x").unwrap();
        assert_eq!(data.dtype(), ElementType::Float64);
        assert_eq!(data.get::<f64>().unwrap(), arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn());
        assert!(matches!(codec.load_named(&path, "y"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_huge_dimensions_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("huge.mat");
        std::fs::write(&path, matlab_style_file(&[i32::MAX, i32::MAX, i32::MAX])).unwrap();

        let codec = MatCodec::new();
        assert!(matches!(codec.peek(&path), Err(Error::Format(_))));
        assert!(matches!(codec.load_named(&path, "x"), Err(Error::Format(_))));

        // fits in memory terms, but not in the four bytes stored
        std::fs::write(&path, matlab_style_file(&[1 << 20, 1 << 20])).unwrap();
        assert!(matches!(codec.load_named(&path, "x"), Err(Error::Format(_))));
    }

    #[test]
    fn test_rejects_non_mat_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.mat");
        std::fs::write(&path, vec![0u8; 200]).unwrap();
        assert!(matches!(MatCodec::new().peek(&path), Err(Error::Format(_))));

        std::fs::write(&path, b"short").unwrap();
        assert!(matches!(MatCodec::new().load(&path), Err(Error::Format(_))));
    }

    #[test]
    fn test_arrayset_variables() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("set.mat");
        let codec = MatCodec::new();

        let mut arrays = BTreeMap::new();
        arrays.insert(1, ArrayData::from_vec(vec![1.0f64, 2.0]).unwrap());
        arrays.insert(3, ArrayData::from_vec(vec![5.0f64, 6.0]).unwrap());
        codec.save_set(&path, &arrays).unwrap();

        let (info, count) = codec.peek_set(&path).unwrap();
        assert_eq!(info, TypeInfo::new(ElementType::Float64, vec![2]).unwrap());
        assert_eq!(count, 2);
        assert_eq!(codec.list_ids(&path).unwrap(), vec![1, 3]);
        assert_eq!(codec.load_set(&path).unwrap(), arrays);
        assert_eq!(codec.load_one(&path, 3).unwrap(), arrays[&3]);
        assert!(matches!(codec.load_one(&path, 2), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_arrayset_skips_foreign_variables() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mixed.mat");
        let codec = MatCodec::new();
        let data = ArrayData::from_vec(vec![1i32, 2, 3]).unwrap();

        codec.save_named(&path, &[("weights", &data), ("array_", &data)]).unwrap();
        assert!(matches!(codec.peek_set(&path), Err(Error::Uninitialized(_))));

        codec.save_named(&path, &[("weights", &data), ("array_7", &data)]).unwrap();
        let set = codec.load_set(&path).unwrap();
        assert_eq!(set.keys().copied().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn test_variable_names() {
        assert!(is_valid_name("array_12"));
        assert!(!is_valid_name("12array"));
        assert!(!is_valid_name("has space"));
        assert_eq!(set_id("array_12"), Some(12));
        assert_eq!(set_id("array_"), None);
        assert_eq!(set_id("array_1x"), None);
    }
}
