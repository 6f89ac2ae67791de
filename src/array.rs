//! In-memory array types.
//!
//! [`NdArray`] is a homogeneous, row-major n-dimensional array. [`RecordArray`]
//! is a structured array: a shape plus an ordered list of named columns, each
//! holding one element per record (a row-oriented table viewed by column).

use crate::dtype::{DType, Element};
use crate::error::{Result, SchemaError};
use std::fmt;

/// Typed, flat element storage.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    /// `bool` elements.
    Bool(Vec<bool>),
    /// `i8` elements.
    I8(Vec<i8>),
    /// `i16` elements.
    I16(Vec<i16>),
    /// `i32` elements.
    I32(Vec<i32>),
    /// `i64` elements.
    I64(Vec<i64>),
    /// `u8` elements.
    U8(Vec<u8>),
    /// `u16` elements.
    U16(Vec<u16>),
    /// `u32` elements.
    U32(Vec<u32>),
    /// `u64` elements.
    U64(Vec<u64>),
    /// `f32` elements.
    F32(Vec<f32>),
    /// `f64` elements.
    F64(Vec<f64>),
    /// Byte strings, one `Vec<u8>` per element.
    Bytes(Vec<Vec<u8>>),
    /// Unicode strings.
    Unicode(Vec<String>),
}

// Applies `$body` to every element of a numeric variant, collecting into
// `Option<Vec<_>>`. String variants yield `None`. Booleans are seen as `u8`.
macro_rules! numeric_map {
    ($data:expr, |$x:ident| $body:expr) => {
        match $data {
            ArrayData::Bool(v) => Some(
                v.iter()
                    .map(|&$x| {
                        let $x = u8::from($x);
                        $body
                    })
                    .collect(),
            ),
            ArrayData::I8(v) => Some(v.iter().map(|&$x| $body).collect()),
            ArrayData::I16(v) => Some(v.iter().map(|&$x| $body).collect()),
            ArrayData::I32(v) => Some(v.iter().map(|&$x| $body).collect()),
            ArrayData::I64(v) => Some(v.iter().map(|&$x| $body).collect()),
            ArrayData::U8(v) => Some(v.iter().map(|&$x| $body).collect()),
            ArrayData::U16(v) => Some(v.iter().map(|&$x| $body).collect()),
            ArrayData::U32(v) => Some(v.iter().map(|&$x| $body).collect()),
            ArrayData::U64(v) => Some(v.iter().map(|&$x| $body).collect()),
            ArrayData::F32(v) => Some(v.iter().map(|&$x| $body).collect()),
            ArrayData::F64(v) => Some(v.iter().map(|&$x| $body).collect()),
            ArrayData::Bytes(_) | ArrayData::Unicode(_) => None,
        }
    };
}

impl ArrayData {
    /// Element dtype of this storage.
    pub fn dtype(&self) -> DType {
        match self {
            ArrayData::Bool(_) => DType::Bool,
            ArrayData::I8(_) => DType::I8,
            ArrayData::I16(_) => DType::I16,
            ArrayData::I32(_) => DType::I32,
            ArrayData::I64(_) => DType::I64,
            ArrayData::U8(_) => DType::U8,
            ArrayData::U16(_) => DType::U16,
            ArrayData::U32(_) => DType::U32,
            ArrayData::U64(_) => DType::U64,
            ArrayData::F32(_) => DType::F32,
            ArrayData::F64(_) => DType::F64,
            ArrayData::Bytes(_) => DType::Bytes,
            ArrayData::Unicode(_) => DType::Unicode,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Bool(v) => v.len(),
            ArrayData::I8(v) => v.len(),
            ArrayData::I16(v) => v.len(),
            ArrayData::I32(v) => v.len(),
            ArrayData::I64(v) => v.len(),
            ArrayData::U8(v) => v.len(),
            ArrayData::U16(v) => v.len(),
            ArrayData::U32(v) => v.len(),
            ArrayData::U64(v) => v.len(),
            ArrayData::F32(v) => v.len(),
            ArrayData::F64(v) => v.len(),
            ArrayData::Bytes(v) => v.len(),
            ArrayData::Unicode(v) => v.len(),
        }
    }

    /// True when there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empty storage of the given dtype.
    pub fn empty(dtype: DType) -> Self {
        Self::zeros(dtype, 0)
    }

    /// `len` zero elements (empty strings for string dtypes).
    pub fn zeros(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::Bool => ArrayData::Bool(vec![false; len]),
            DType::I8 => ArrayData::I8(vec![0; len]),
            DType::I16 => ArrayData::I16(vec![0; len]),
            DType::I32 => ArrayData::I32(vec![0; len]),
            DType::I64 => ArrayData::I64(vec![0; len]),
            DType::U8 => ArrayData::U8(vec![0; len]),
            DType::U16 => ArrayData::U16(vec![0; len]),
            DType::U32 => ArrayData::U32(vec![0; len]),
            DType::U64 => ArrayData::U64(vec![0; len]),
            DType::F32 => ArrayData::F32(vec![0.0; len]),
            DType::F64 => ArrayData::F64(vec![0.0; len]),
            DType::Bytes => ArrayData::Bytes(vec![Vec::new(); len]),
            DType::Unicode => ArrayData::Unicode(vec![String::new(); len]),
        }
    }

    /// Converts to `dtype` with `as`-cast semantics between numeric types.
    ///
    /// Returns `None` when either side is a string dtype and the dtypes differ.
    pub fn cast(&self, dtype: DType) -> Option<ArrayData> {
        if self.dtype() == dtype {
            return Some(self.clone());
        }
        let cast = match dtype {
            DType::Bool => ArrayData::Bool(numeric_map!(self, |x| x as f64 != 0.0)?),
            DType::I8 => ArrayData::I8(numeric_map!(self, |x| x as i8)?),
            DType::I16 => ArrayData::I16(numeric_map!(self, |x| x as i16)?),
            DType::I32 => ArrayData::I32(numeric_map!(self, |x| x as i32)?),
            DType::I64 => ArrayData::I64(numeric_map!(self, |x| x as i64)?),
            DType::U8 => ArrayData::U8(numeric_map!(self, |x| x as u8)?),
            DType::U16 => ArrayData::U16(numeric_map!(self, |x| x as u16)?),
            DType::U32 => ArrayData::U32(numeric_map!(self, |x| x as u32)?),
            DType::U64 => ArrayData::U64(numeric_map!(self, |x| x as u64)?),
            DType::F32 => ArrayData::F32(numeric_map!(self, |x| x as f32)?),
            DType::F64 => ArrayData::F64(numeric_map!(self, |x| x as f64)?),
            DType::Bytes | DType::Unicode => return None,
        };
        Some(cast)
    }

    /// All elements widened to `f64`, or `None` for string dtypes.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        numeric_map!(self, |x| x as f64)
    }

    /// Renders element `index` for display.
    pub fn element_string(&self, index: usize) -> Option<String> {
        let s = match self {
            ArrayData::Bool(v) => v.get(index)?.to_string(),
            ArrayData::I8(v) => v.get(index)?.to_string(),
            ArrayData::I16(v) => v.get(index)?.to_string(),
            ArrayData::I32(v) => v.get(index)?.to_string(),
            ArrayData::I64(v) => v.get(index)?.to_string(),
            ArrayData::U8(v) => v.get(index)?.to_string(),
            ArrayData::U16(v) => v.get(index)?.to_string(),
            ArrayData::U32(v) => v.get(index)?.to_string(),
            ArrayData::U64(v) => v.get(index)?.to_string(),
            ArrayData::F32(v) => format!("{:?}", v.get(index)?),
            ArrayData::F64(v) => format!("{:?}", v.get(index)?),
            ArrayData::Bytes(v) => format!("b{:?}", String::from_utf8_lossy(v.get(index)?)),
            ArrayData::Unicode(v) => format!("{:?}", v.get(index)?),
        };
        Some(s)
    }
}

fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

fn checked_element_count(shape: &[usize]) -> Result<usize> {
    shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| SchemaError::InvalidArray(format!("shape {shape:?} overflows usize")))
}

/// Writes at most a handful of elements, numpy style.
fn fmt_preview(data: &ArrayData, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    const PREVIEW: usize = 6;
    let len = data.len();
    let items: Vec<String> = if len <= PREVIEW {
        (0..len).filter_map(|i| data.element_string(i)).collect()
    } else {
        let mut head: Vec<String> = (0..3).filter_map(|i| data.element_string(i)).collect();
        head.push("...".to_string());
        head.extend((len - 3..len).filter_map(|i| data.element_string(i)));
        head
    };
    write!(f, "[{}]", items.join(", "))
}

/// A homogeneous n-dimensional array stored in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    shape: Vec<usize>,
    data: ArrayData,
}

impl NdArray {
    /// Creates an array, checking that `shape` matches the element count.
    pub fn new(shape: Vec<usize>, data: ArrayData) -> Result<Self> {
        let count = checked_element_count(&shape)?;
        if count != data.len() {
            return Err(SchemaError::InvalidArray(format!(
                "shape {:?} holds {count} elements but {} were given",
                shape,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// Caller guarantees `shape` matches the element count.
    pub(crate) fn from_parts(shape: Vec<usize>, data: ArrayData) -> Self {
        debug_assert_eq!(element_count(&shape), data.len());
        Self { shape, data }
    }

    /// One-dimensional array from typed storage.
    pub fn from_data(data: ArrayData) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    /// One-dimensional numeric array.
    pub fn from_vec<T: Element>(values: Vec<T>) -> Self {
        Self::from_data(T::into_data(values))
    }

    /// Zero-dimensional numeric array holding a single value.
    pub fn scalar<T: Element>(value: T) -> Self {
        Self {
            shape: Vec::new(),
            data: T::into_data(vec![value]),
        }
    }

    /// One-dimensional unicode array.
    pub fn from_strings<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_data(ArrayData::Unicode(values.into_iter().map(Into::into).collect()))
    }

    /// One-dimensional byte-string array.
    pub fn from_byte_strings<I, B>(values: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        Self::from_data(ArrayData::Bytes(values.into_iter().map(Into::into).collect()))
    }

    /// Array of zeros (empty strings for string dtypes).
    pub fn zeros(dtype: DType, shape: Vec<usize>) -> Self {
        let data = ArrayData::zeros(dtype, element_count(&shape));
        Self { shape, data }
    }

    /// Empty one-dimensional array.
    pub fn empty(dtype: DType) -> Self {
        Self::zeros(dtype, vec![0])
    }

    /// `0.0, 1.0, ..., (n - 1)` as `float64`.
    pub fn arange(n: usize) -> Self {
        Self::from_vec((0..n).map(|i| i as f64).collect::<Vec<f64>>())
    }

    /// Dimensions, outermost first. Empty for 0-d arrays.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Element dtype.
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Borrows the flat element storage.
    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// Consumes the array, keeping only its storage.
    pub fn into_data(self) -> ArrayData {
        self.data
    }

    /// Splits into shape and storage.
    pub fn into_parts(self) -> (Vec<usize>, ArrayData) {
        (self.shape, self.data)
    }

    /// Same elements under a new shape.
    pub fn reshape(self, shape: Vec<usize>) -> Result<Self> {
        Self::new(shape, self.data)
    }

    /// Borrows the elements as `T` if the dtype matches exactly.
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::as_slice(&self.data)
    }

    /// Borrows the elements of a unicode array.
    pub fn as_strings(&self) -> Option<&[String]> {
        match &self.data {
            ArrayData::Unicode(v) => Some(v),
            _ => None,
        }
    }

    /// Borrows the elements of a byte-string array.
    pub fn as_byte_strings(&self) -> Option<&[Vec<u8>]> {
        match &self.data {
            ArrayData::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// Converts to another dtype, see [`ArrayData::cast`].
    pub fn cast(&self, dtype: DType) -> Option<NdArray> {
        Some(Self {
            shape: self.shape.clone(),
            data: self.data.cast(dtype)?,
        })
    }
}

impl fmt::Display for NdArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_preview(&self.data, f)?;
        write!(f, " ({}, shape {:?})", self.dtype(), self.shape)
    }
}

/// A structured array: named columns sharing one shape.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordArray {
    shape: Vec<usize>,
    columns: Vec<(String, ArrayData)>,
}

impl RecordArray {
    /// Creates a record array, checking names are unique and every column
    /// holds one element per record.
    pub fn new(shape: Vec<usize>, columns: Vec<(String, ArrayData)>) -> Result<Self> {
        if columns.is_empty() {
            return Err(SchemaError::InvalidArray(
                "record arrays need at least one column".into(),
            ));
        }
        let count = checked_element_count(&shape)?;
        for (i, (name, data)) in columns.iter().enumerate() {
            if columns[..i].iter().any(|(other, _)| other == name) {
                return Err(SchemaError::InvalidArray(format!(
                    "duplicate record column '{name}'"
                )));
            }
            if data.len() != count {
                return Err(SchemaError::InvalidArray(format!(
                    "column '{name}' has {} elements, shape {:?} needs {count}",
                    data.len(),
                    shape
                )));
            }
        }
        Ok(Self { shape, columns })
    }

    /// One-dimensional record array; the length comes from the first column.
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ArrayData)>,
        S: Into<String>,
    {
        let columns: Vec<(String, ArrayData)> = columns
            .into_iter()
            .map(|(name, data)| (name.into(), data))
            .collect();
        let len = columns.first().map_or(0, |(_, data)| data.len());
        Self::new(vec![len], columns)
    }

    /// Shape shared by every column.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        element_count(&self.shape)
    }

    /// True when there are no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Columns in storage order.
    pub fn columns(&self) -> &[(String, ArrayData)] {
        &self.columns
    }

    /// Splits into shape and columns.
    pub fn into_columns(self) -> (Vec<usize>, Vec<(String, ArrayData)>) {
        (self.shape, self.columns)
    }

    /// Column names in storage order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Column by name.
    pub fn column(&self, name: &str) -> Option<&ArrayData> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, data)| data)
    }

    /// True if any column holds the given dtype.
    pub fn has_dtype(&self, dtype: DType) -> bool {
        self.columns.iter().any(|(_, data)| data.dtype() == dtype)
    }

    /// Rebuilds every column through `f`, keeping names and shape.
    pub fn try_map_columns<F>(self, mut f: F) -> Result<Self>
    where
        F: FnMut(&str, ArrayData) -> Result<ArrayData>,
    {
        let (shape, columns) = self.into_columns();
        let columns = columns
            .into_iter()
            .map(|(name, data)| {
                let data = f(&name, data)?;
                Ok((name, data))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(shape, columns)
    }
}

impl fmt::Display for RecordArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rec.array(")?;
        for (i, (name, data)) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: ")?;
            fmt_preview(data, f)?;
        }
        write!(f, ", shape {:?})", self.shape)
    }
}
