//! Element types, type descriptors and the dynamically typed array container.
//!
//! Arrays are always held row-major (C order). Codecs that store another
//! order (MAT files) convert on the way in and out.

use std::fmt;
use std::str::FromStr;

use ndarray::{ArrayD, IxDyn};
use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, ResultExt};

/// Maximum number of dimensions an array may have.
pub const MAX_DIM: usize = 4;

/// Scalar type of the elements stored in an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    /// Boolean, one byte per element.
    Bool,
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Unsigned 64-bit integer.
    UInt64,
    /// Single precision float.
    Float32,
    /// Double precision float.
    Float64,
    /// Complex number made of two `f32`.
    Complex64,
    /// Complex number made of two `f64`.
    Complex128,
}

impl ElementType {
    /// Every supported element type.
    pub const ALL: [ElementType; 13] = [
        ElementType::Bool,
        ElementType::Int8,
        ElementType::Int16,
        ElementType::Int32,
        ElementType::Int64,
        ElementType::UInt8,
        ElementType::UInt16,
        ElementType::UInt32,
        ElementType::UInt64,
        ElementType::Float32,
        ElementType::Float64,
        ElementType::Complex64,
        ElementType::Complex128,
    ];

    /// Size of one element in bytes
    pub fn size(self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 | Self::Complex64 => 8,
            Self::Complex128 => 16,
        }
    }

    /// Stable lowercase name, also used by serde
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Complex64 => "complex64",
            Self::Complex128 => "complex128",
        }
    }

    /// Whether elements carry an imaginary part
    pub fn is_complex(self) -> bool {
        matches!(self, Self::Complex64 | Self::Complex128)
    }

    /// Type of one real component: the part type for complex types, itself otherwise
    pub fn component(self) -> Self {
        match self {
            Self::Complex64 => Self::Float32,
            Self::Complex128 => Self::Float64,
            other => other,
        }
    }

    /// On-disk code used by the native binary format.
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Bool => 1,
            Self::Int8 => 2,
            Self::Int16 => 3,
            Self::Int32 => 4,
            Self::Int64 => 5,
            Self::UInt8 => 6,
            Self::UInt16 => 7,
            Self::UInt32 => 8,
            Self::UInt64 => 9,
            Self::Float32 => 10,
            Self::Float64 => 11,
            Self::Complex64 => 12,
            Self::Complex128 => 13,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.code() == code)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown element type '{}'", s)))
    }
}

/// Element type and shape of an array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeInfo {
    /// Element type
    pub dtype: ElementType,
    /// Extent of every dimension, slowest varying first
    pub shape: Vec<usize>,
}

impl TypeInfo {
    /// Creates a descriptor, checking the dimension count and that no extent is zero.
    pub fn new(dtype: ElementType, shape: impl Into<Vec<usize>>) -> Result<Self> {
        let shape = shape.into();
        if shape.is_empty() || shape.len() > MAX_DIM {
            return Err(Error::Dimension {
                got: shape.len(),
                max: MAX_DIM,
            });
        }
        if shape.iter().any(|&extent| extent == 0) {
            return Err(Error::InvalidInput(format!(
                "array extents must be non-zero, got {:?}",
                shape
            )));
        }
        shape
            .iter()
            .try_fold(dtype.size(), |bytes, &extent| bytes.checked_mul(extent))
            .ok_or_else(|| Error::InvalidInput(format!("{} array of shape {:?} is too large", dtype, shape)))?;
        Ok(Self { dtype, shape })
    }

    /// Number of dimensions
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements
    pub fn size(&self) -> usize {
        self.shape.iter().fold(1usize, |n, &extent| n.saturating_mul(extent))
    }

    /// Number of bytes needed to hold the elements
    ///
    /// Saturates instead of overflowing, so that a size check against real
    /// data fails for descriptors that were not built through [`TypeInfo::new`].
    pub fn buffer_size(&self) -> usize {
        self.size().saturating_mul(self.dtype.size())
    }

    /// Row-major strides, in elements
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1; self.shape.len()];
        for i in (0..self.shape.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.shape[i + 1];
        }
        strides
    }

    /// Same element type and same shape
    pub fn is_compatible(&self, other: &TypeInfo) -> bool {
        self == other
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.dtype, self.shape)
    }
}

/// Rust scalar types that can be stored in an [`ArrayData`].
pub trait Element: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Element type tag
    const DTYPE: ElementType;

    /// Value as a `(real, imaginary)` pair
    fn to_parts(self) -> (f64, f64);

    /// Converts from a `(real, imaginary)` pair, dropping what does not fit
    fn from_parts(re: f64, im: f64) -> Self;

    /// Exact value of integer and boolean elements
    fn to_integer(self) -> Option<i128> {
        None
    }

    /// Converts from an integer, saturating at the bounds of integer types
    fn from_integer(value: i128) -> Self {
        Self::from_parts(value as f64, 0.0)
    }

    /// Appends the little-endian encoding
    fn write_le(self, out: &mut Vec<u8>);

    /// Decodes from exactly `DTYPE.size()` little-endian bytes
    fn read_le(bytes: &[u8]) -> Self;

    #[doc(hidden)]
    fn wrap(array: ArrayD<Self>) -> ArrayData;

    #[doc(hidden)]
    fn unwrap_ref(data: &ArrayData) -> Option<&ArrayD<Self>>;
}

macro_rules! real_element {
    ($t:ty, $variant:ident $(, { $($integer:tt)* })?) => {
        impl Element for $t {
            const DTYPE: ElementType = ElementType::$variant;

            fn to_parts(self) -> (f64, f64) {
                (self as f64, 0.0)
            }

            fn from_parts(re: f64, _im: f64) -> Self {
                re as $t
            }

            $($($integer)*)?

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
                <$t>::from_le_bytes(buf)
            }

            fn wrap(array: ArrayD<Self>) -> ArrayData {
                ArrayData::$variant(array)
            }

            fn unwrap_ref(data: &ArrayData) -> Option<&ArrayD<Self>> {
                match data {
                    ArrayData::$variant(a) => Some(a),
                    _ => None,
                }
            }
        }
    };
}

macro_rules! integer_element {
    ($t:ty, $variant:ident) => {
        real_element!($t, $variant, {
            fn to_integer(self) -> Option<i128> {
                Some(self as i128)
            }

            fn from_integer(value: i128) -> Self {
                value.clamp(<$t>::MIN as i128, <$t>::MAX as i128) as $t
            }
        });
    };
}

integer_element!(i8, Int8);
integer_element!(i16, Int16);
integer_element!(i32, Int32);
integer_element!(i64, Int64);
integer_element!(u8, UInt8);
integer_element!(u16, UInt16);
integer_element!(u32, UInt32);
integer_element!(u64, UInt64);
real_element!(f32, Float32);
real_element!(f64, Float64);

impl Element for bool {
    const DTYPE: ElementType = ElementType::Bool;

    fn to_parts(self) -> (f64, f64) {
        (if self { 1.0 } else { 0.0 }, 0.0)
    }

    fn from_parts(re: f64, im: f64) -> Self {
        re != 0.0 || im != 0.0
    }

    fn to_integer(self) -> Option<i128> {
        Some(self as i128)
    }

    fn from_integer(value: i128) -> Self {
        value != 0
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.push(self as u8);
    }

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn wrap(array: ArrayD<Self>) -> ArrayData {
        ArrayData::Bool(array)
    }

    fn unwrap_ref(data: &ArrayData) -> Option<&ArrayD<Self>> {
        match data {
            ArrayData::Bool(a) => Some(a),
            _ => None,
        }
    }
}

macro_rules! complex_element {
    ($t:ty, $variant:ident) => {
        impl Element for Complex<$t> {
            const DTYPE: ElementType = ElementType::$variant;

            fn to_parts(self) -> (f64, f64) {
                (self.re as f64, self.im as f64)
            }

            fn from_parts(re: f64, im: f64) -> Self {
                Complex::new(re as $t, im as $t)
            }

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.re.to_le_bytes());
                out.extend_from_slice(&self.im.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                let half = std::mem::size_of::<$t>();
                Complex::new(<$t>::read_le(&bytes[..half]), <$t>::read_le(&bytes[half..]))
            }

            fn wrap(array: ArrayD<Self>) -> ArrayData {
                ArrayData::$variant(array)
            }

            fn unwrap_ref(data: &ArrayData) -> Option<&ArrayD<Self>> {
                match data {
                    ArrayData::$variant(a) => Some(a),
                    _ => None,
                }
            }
        }
    };
}

complex_element!(f32, Complex64);
complex_element!(f64, Complex128);

/// Runs `$body` with `$t` bound to the Rust type of an [`ElementType`].
macro_rules! with_element_type {
    ($dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            ElementType::Bool => {
                type $t = bool;
                $body
            }
            ElementType::Int8 => {
                type $t = i8;
                $body
            }
            ElementType::Int16 => {
                type $t = i16;
                $body
            }
            ElementType::Int32 => {
                type $t = i32;
                $body
            }
            ElementType::Int64 => {
                type $t = i64;
                $body
            }
            ElementType::UInt8 => {
                type $t = u8;
                $body
            }
            ElementType::UInt16 => {
                type $t = u16;
                $body
            }
            ElementType::UInt32 => {
                type $t = u32;
                $body
            }
            ElementType::UInt64 => {
                type $t = u64;
                $body
            }
            ElementType::Float32 => {
                type $t = f32;
                $body
            }
            ElementType::Float64 => {
                type $t = f64;
                $body
            }
            ElementType::Complex64 => {
                type $t = num_complex::Complex<f32>;
                $body
            }
            ElementType::Complex128 => {
                type $t = num_complex::Complex<f64>;
                $body
            }
        }
    };
}

/// Runs `$body` with `$a` bound to the inner `ArrayD` of an [`ArrayData`].
macro_rules! each_variant {
    ($data:expr, $a:ident => $body:expr) => {
        match $data {
            ArrayData::Bool($a) => $body,
            ArrayData::Int8($a) => $body,
            ArrayData::Int16($a) => $body,
            ArrayData::Int32($a) => $body,
            ArrayData::Int64($a) => $body,
            ArrayData::UInt8($a) => $body,
            ArrayData::UInt16($a) => $body,
            ArrayData::UInt32($a) => $body,
            ArrayData::UInt64($a) => $body,
            ArrayData::Float32($a) => $body,
            ArrayData::Float64($a) => $body,
            ArrayData::Complex64($a) => $body,
            ArrayData::Complex128($a) => $body,
        }
    };
}

/// An owned, row-major array whose element type is known at runtime.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum ArrayData {
    Bool(ArrayD<bool>),
    Int8(ArrayD<i8>),
    Int16(ArrayD<i16>),
    Int32(ArrayD<i32>),
    Int64(ArrayD<i64>),
    UInt8(ArrayD<u8>),
    UInt16(ArrayD<u16>),
    UInt32(ArrayD<u32>),
    UInt64(ArrayD<u64>),
    Float32(ArrayD<f32>),
    Float64(ArrayD<f64>),
    Complex64(ArrayD<Complex<f32>>),
    Complex128(ArrayD<Complex<f64>>),
}

impl ArrayData {
    /// Wraps a typed array, validating its dimensionality.
    pub fn from_array<T: Element, D: ndarray::Dimension>(array: ndarray::Array<T, D>) -> Result<Self> {
        TypeInfo::new(T::DTYPE, array.shape().to_vec())?;
        let array = array.into_dyn();
        let array = if array.is_standard_layout() {
            array
        } else {
            array.as_standard_layout().into_owned()
        };
        Ok(T::wrap(array))
    }

    /// Builds a one-dimensional array from a vector.
    pub fn from_vec<T: Element>(values: Vec<T>) -> Result<Self> {
        Self::from_array(ndarray::Array1::from(values))
    }

    /// Array of the given type filled with the default value (zero / false).
    pub fn zeros(info: &TypeInfo) -> Self {
        fn filled<T: Element>(shape: &[usize]) -> ArrayData {
            T::wrap(ArrayD::from_elem(IxDyn(shape), T::default()))
        }
        with_element_type!(info.dtype, T => filled::<T>(&info.shape))
    }

    /// Element type of the stored values
    pub fn dtype(&self) -> ElementType {
        match self {
            Self::Bool(_) => ElementType::Bool,
            Self::Int8(_) => ElementType::Int8,
            Self::Int16(_) => ElementType::Int16,
            Self::Int32(_) => ElementType::Int32,
            Self::Int64(_) => ElementType::Int64,
            Self::UInt8(_) => ElementType::UInt8,
            Self::UInt16(_) => ElementType::UInt16,
            Self::UInt32(_) => ElementType::UInt32,
            Self::UInt64(_) => ElementType::UInt64,
            Self::Float32(_) => ElementType::Float32,
            Self::Float64(_) => ElementType::Float64,
            Self::Complex64(_) => ElementType::Complex64,
            Self::Complex128(_) => ElementType::Complex128,
        }
    }

    /// Extents of every dimension
    pub fn shape(&self) -> &[usize] {
        each_variant!(self, a => a.shape())
    }

    /// Element type and shape
    pub fn type_info(&self) -> TypeInfo {
        TypeInfo {
            dtype: self.dtype(),
            shape: self.shape().to_vec(),
        }
    }

    /// Borrows the values when they are stored as `T`.
    pub fn as_array<T: Element>(&self) -> Result<&ArrayD<T>> {
        T::unwrap_ref(self).ok_or(Error::TypeMismatch {
            expected: T::DTYPE,
            actual: self.dtype(),
        })
    }

    /// Copies the values out when they are stored as `T`.
    pub fn get<T: Element>(&self) -> Result<ArrayD<T>> {
        self.as_array::<T>().cloned()
    }

    /// Converts every value to `T`.
    ///
    /// Complex to real keeps the real part, float to integer truncates and
    /// saturates, integer to integer saturates, anything to `bool` tests
    /// against zero. Integers never pass through `f64` on the way to another
    /// integer type, so 64-bit values keep every bit.
    pub fn cast<T: Element>(&self) -> ArrayD<T> {
        if let Ok(same) = self.as_array::<T>() {
            return same.clone();
        }
        each_variant!(self, a => a.mapv(|v| match v.to_integer() {
            Some(n) => T::from_integer(n),
            None => {
                let (re, im) = v.to_parts();
                T::from_parts(re, im)
            }
        }))
    }

    /// Converts the values into another runtime element type.
    pub fn cast_to(&self, dtype: ElementType) -> ArrayData {
        if dtype == self.dtype() {
            return self.clone();
        }
        with_element_type!(dtype, T => T::wrap(self.cast::<T>()))
    }

    /// Copy with the axes in reverse order, laid out row-major.
    ///
    /// The row-major order of the result is the column-major (Fortran) order
    /// of `self`.
    pub fn reversed_axes(&self) -> ArrayData {
        each_variant!(self, a => Element::wrap(a.t().as_standard_layout().into_owned()))
    }

    /// Real components, typed [`ElementType::component`]. Real arrays are returned as is.
    pub fn real_part(&self) -> ArrayData {
        self.cast_to(self.dtype().component())
    }

    /// Imaginary components of a complex array
    pub fn imag_part(&self) -> Option<ArrayData> {
        match self {
            Self::Complex64(a) => Some(ArrayData::Float32(a.mapv(|c| c.im))),
            Self::Complex128(a) => Some(ArrayData::Float64(a.mapv(|c| c.im))),
            _ => None,
        }
    }

    /// Joins separately stored real and imaginary parts into an array of `dtype`.
    pub fn from_real_imag(re: &ArrayData, im: &ArrayData, dtype: ElementType) -> Result<ArrayData> {
        if re.shape() != im.shape() {
            return Err(Error::ShapeMismatch {
                expected: re.shape().to_vec(),
                actual: im.shape().to_vec(),
            });
        }
        let re = re.cast::<f64>();
        let im = im.cast::<f64>();
        Ok(with_element_type!(dtype, T => T::wrap(
            ndarray::Zip::from(&re).and(&im).map_collect(|&r, &i| T::from_parts(r, i))
        )))
    }

    /// Row-major little-endian encoding; complex values are interleaved re/im.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let info = self.type_info();
        let mut out = Vec::with_capacity(info.buffer_size());
        each_variant!(self, a => {
            for v in a.iter() {
                v.write_le(&mut out);
            }
        });
        out
    }

    /// Decodes the output of [`ArrayData::to_le_bytes`].
    pub fn from_le_bytes(info: &TypeInfo, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != info.buffer_size() {
            return Err(Error::Format(format!(
                "expected {} bytes of {} data, found {}",
                info.buffer_size(),
                info,
                bytes.len()
            )));
        }

        fn decode<T: Element>(info: &TypeInfo, bytes: &[u8]) -> Result<ArrayData> {
            let values: Vec<T> = bytes.chunks_exact(T::DTYPE.size()).map(T::read_le).collect();
            let array = ArrayD::from_shape_vec(IxDyn(&info.shape), values)
                .context("building array from decoded values")?;
            Ok(T::wrap(array))
        }

        with_element_type!(info.dtype, T => decode::<T>(info, bytes))
    }
}

impl<T: Element> TryFrom<ArrayD<T>> for ArrayData {
    type Error = Error;

    fn try_from(array: ArrayD<T>) -> Result<Self> {
        Self::from_array(array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, Array4};

    #[test]
    fn test_type_info_rejects_bad_dimensions() {
        assert!(matches!(
            TypeInfo::new(ElementType::Float64, vec![]),
            Err(Error::Dimension { got: 0, max: 4 })
        ));
        assert!(matches!(
            TypeInfo::new(ElementType::Float64, vec![1, 1, 1, 1, 1]),
            Err(Error::Dimension { got: 5, max: 4 })
        ));
        assert!(TypeInfo::new(ElementType::Float64, vec![3, 0]).is_err());
    }

    #[test]
    fn test_type_info_rejects_overflowing_shape() {
        let huge = 1usize << (usize::BITS / 2);
        assert!(matches!(
            TypeInfo::new(ElementType::Float64, vec![huge, huge, huge]),
            Err(Error::InvalidInput(_))
        ));
        assert!(TypeInfo::new(ElementType::UInt8, vec![usize::MAX]).is_ok());
        assert!(TypeInfo::new(ElementType::UInt16, vec![usize::MAX]).is_err());
    }

    #[test]
    fn test_cast_keeps_wide_integers() {
        let big = (1i64 << 53) + 1;
        let data = ArrayData::from_vec(vec![big, -1, i64::MAX]).unwrap();
        assert_eq!(data.cast::<i64>().as_slice().unwrap(), &[big, -1, i64::MAX]);
        assert_eq!(data.cast::<u64>().as_slice().unwrap(), &[big as u64, 0, i64::MAX as u64]);
        assert_eq!(data.cast::<i8>().as_slice().unwrap(), &[i8::MAX, -1, i8::MAX]);
        assert_eq!(data.cast::<bool>().as_slice().unwrap(), &[true, true, true]);

        let unsigned = ArrayData::from_vec(vec![u64::MAX - 1]).unwrap();
        assert_eq!(unsigned.cast::<u64>()[[0]], u64::MAX - 1);
        assert_eq!(unsigned.cast::<i64>()[[0]], i64::MAX);
        assert_eq!(unsigned.cast_to(ElementType::Int64).get::<i64>().unwrap()[[0]], i64::MAX);

        let flags = ArrayData::from_vec(vec![true, false]).unwrap();
        assert_eq!(flags.cast::<u64>().as_slice().unwrap(), &[1, 0]);
    }

    #[test]
    fn test_type_info_sizes_and_strides() {
        let info = TypeInfo::new(ElementType::Complex128, vec![2, 3, 4]).unwrap();
        assert_eq!(info.ndim(), 3);
        assert_eq!(info.size(), 24);
        assert_eq!(info.buffer_size(), 24 * 16);
        assert_eq!(info.strides(), vec![12, 4, 1]);
    }

    #[test]
    fn test_element_type_names_round_trip() {
        for dtype in ElementType::ALL {
            assert_eq!(dtype.name().parse::<ElementType>().unwrap(), dtype);
            assert_eq!(ElementType::from_code(dtype.code()), Some(dtype));
        }
        let json = serde_json::to_string(&ElementType::UInt16).unwrap();
        assert_eq!(json, "\"uint16\"");
    }

    #[test]
    fn test_get_requires_exact_type() {
        let data = ArrayData::from_array(arr1(&[1.0f64, 2.0, 3.0, 4.0])).unwrap();
        assert_eq!(data.dtype(), ElementType::Float64);
        assert_eq!(data.get::<f64>().unwrap(), arr1(&[1.0, 2.0, 3.0, 4.0]).into_dyn());
        match data.get::<f32>() {
            Err(Error::TypeMismatch { expected, actual }) => {
                assert_eq!(expected, ElementType::Float32);
                assert_eq!(actual, ElementType::Float64);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_cast_between_types() {
        let data = ArrayData::from_array(arr1(&[1.0f64, 2.0, 3.0, 4.0])).unwrap();
        let as_u8 = data.cast::<u8>();
        let as_f32 = data.cast::<f32>();
        for (a, b) in as_u8.iter().zip(as_f32.iter()) {
            assert_eq!(*a as f32, *b);
        }

        let complex = ArrayData::from_vec(vec![Complex::new(3.0f64, 9.0); 4]).unwrap();
        let narrowed = complex.cast::<Complex<f32>>();
        assert!(narrowed.iter().all(|c| *c == Complex::new(3.0f32, 9.0)));
        let real = complex.cast::<f64>();
        assert!(real.iter().all(|&v| v == 3.0));
    }

    #[test]
    fn test_cast_saturates_and_booleans() {
        let data = ArrayData::from_vec(vec![-1.5f64, 0.0, 300.0]).unwrap();
        assert_eq!(data.cast::<u8>().into_raw_vec(), vec![0, 0, 255]);
        assert_eq!(data.cast::<bool>().into_raw_vec(), vec![true, false, true]);
    }

    #[test]
    fn test_byte_encoding_is_row_major() {
        let data = ArrayData::from_array(arr2(&[[1i16, 2], [3, 4]])).unwrap();
        let bytes = data.to_le_bytes();
        assert_eq!(bytes, vec![1, 0, 2, 0, 3, 0, 4, 0]);
        let back = ArrayData::from_le_bytes(&data.type_info(), &bytes).unwrap();
        assert_eq!(back, data);

        let short = ArrayData::from_le_bytes(&data.type_info(), &bytes[..6]);
        assert!(matches!(short, Err(Error::Format(_))));
    }

    #[test]
    fn test_non_standard_layout_is_normalized() {
        let transposed = arr2(&[[1u32, 2, 3], [4, 5, 6]]).reversed_axes();
        let data = ArrayData::from_array(transposed).unwrap();
        assert_eq!(data.shape(), &[3, 2]);
        let bytes = data.to_le_bytes();
        let back = ArrayData::from_le_bytes(&data.type_info(), &bytes).unwrap();
        assert_eq!(back.get::<u32>().unwrap()[[0, 1]], 4);
    }

    #[test]
    fn test_zeros_and_cast_to() {
        let info = TypeInfo::new(ElementType::Float64, vec![2, 3, 4, 5]).unwrap();
        let zeros = ArrayData::zeros(&info);
        assert_eq!(zeros.type_info(), info);
        let filled = ArrayData::from_array(Array4::from_elem((2, 3, 4, 5), 37.0f64)).unwrap();
        let ints = filled.cast_to(ElementType::Int32);
        assert_eq!(ints.dtype(), ElementType::Int32);
        assert!(ints.get::<i32>().unwrap().iter().all(|&v| v == 37));
    }

    #[test]
    fn test_reversed_axes_gives_column_major_order() {
        let data = ArrayData::from_array(arr2(&[[1u8, 2, 3], [4, 5, 6]])).unwrap();
        let col = data.reversed_axes();
        assert_eq!(col.shape(), &[3, 2]);
        assert_eq!(col.to_le_bytes(), vec![1, 4, 2, 5, 3, 6]);
        assert_eq!(col.reversed_axes(), data);
    }

    #[test]
    fn test_split_and_join_complex() {
        let data = ArrayData::from_vec(vec![Complex::new(1.0f32, -1.0), Complex::new(2.5, 4.0)]).unwrap();
        let re = data.real_part();
        let im = data.imag_part().unwrap();
        assert_eq!(re.dtype(), ElementType::Float32);
        assert_eq!(im.get::<f32>().unwrap().into_raw_vec(), vec![-1.0, 4.0]);
        let joined = ArrayData::from_real_imag(&re, &im, ElementType::Complex64).unwrap();
        assert_eq!(joined, data);

        let plain = ArrayData::from_vec(vec![1.0f64]).unwrap();
        assert!(plain.imag_part().is_none());
        assert_eq!(plain.real_part(), plain);
    }
}
