//! Element data types.
//!
//! A [`DType`] names the element type of an array column. String dtypes carry
//! no width in memory; the fixed width required by the on-disk layouts is
//! computed from the data when it is written (see [`crate::npy`]).

use crate::array::ArrayData;
use crate::error::{Result, SchemaError};
use std::fmt;

/// Data type of array elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// Boolean.
    Bool,
    /// Signed 8-bit integer.
    I8,
    /// Signed 16-bit integer.
    I16,
    /// Signed 32-bit integer.
    I32,
    /// Signed 64-bit integer.
    I64,
    /// Unsigned 8-bit integer.
    U8,
    /// Unsigned 16-bit integer.
    U16,
    /// Unsigned 32-bit integer.
    U32,
    /// Unsigned 64-bit integer.
    U64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// Fixed-width byte strings (`|S<n>` on disk).
    Bytes,
    /// Unicode text (`<U<n>` on disk, UCS-4).
    Unicode,
}

impl DType {
    /// Size in bytes of a single numeric element. `None` for string dtypes,
    /// whose width depends on the data.
    pub fn element_size(self) -> Option<usize> {
        match self {
            DType::Bool | DType::I8 | DType::U8 => Some(1),
            DType::I16 | DType::U16 => Some(2),
            DType::I32 | DType::U32 | DType::F32 => Some(4),
            DType::I64 | DType::U64 | DType::F64 => Some(8),
            DType::Bytes | DType::Unicode => None,
        }
    }

    /// True for booleans, integers and floats.
    pub fn is_numeric(self) -> bool {
        self.element_size().is_some()
    }

    /// True for byte and unicode strings.
    pub fn is_string(self) -> bool {
        !self.is_numeric()
    }

    /// Parses a dtype name such as `"float64"`, `"f8"`, `"int32"`, `"str"`.
    pub fn from_name(name: &str) -> Result<Self> {
        let dtype = match name.to_ascii_lowercase().as_str() {
            "bool" | "b1" => DType::Bool,
            "int8" | "i8" | "i1" => DType::I8,
            "int16" | "i16" | "i2" => DType::I16,
            "int32" | "i32" | "i4" => DType::I32,
            "int64" | "i64" | "int" => DType::I64,
            "uint8" | "u8" | "u1" => DType::U8,
            "uint16" | "u16" | "u2" => DType::U16,
            "uint32" | "u32" | "u4" => DType::U32,
            "uint64" | "u64" => DType::U64,
            "float32" | "f32" | "f4" => DType::F32,
            "float64" | "f64" | "f8" | "float" => DType::F64,
            "bytes" | "s" => DType::Bytes,
            "unicode" | "str" | "string" | "u" => DType::Unicode,
            other => {
                return Err(SchemaError::InvalidArray(format!(
                    "unknown dtype name '{other}'"
                )));
            }
        };
        Ok(dtype)
    }

    /// Canonical lowercase name, e.g. `float64`.
    pub fn name(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::I8 => "int8",
            DType::I16 => "int16",
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::U8 => "uint8",
            DType::U16 => "uint16",
            DType::U32 => "uint32",
            DType::U64 => "uint64",
            DType::F32 => "float32",
            DType::F64 => "float64",
            DType::Bytes => "bytes",
            DType::Unicode => "unicode",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Numeric element types that can be stored in an [`NdArray`](crate::NdArray).
pub trait Element: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// The dtype this element maps to.
    const DTYPE: DType;

    /// Wraps a vector of elements into typed array storage.
    fn into_data(values: Vec<Self>) -> ArrayData;

    /// Borrows the elements if `data` holds this element type.
    fn as_slice(data: &ArrayData) -> Option<&[Self]>;
}

macro_rules! impl_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = DType::$variant;

                fn into_data(values: Vec<Self>) -> ArrayData {
                    ArrayData::$variant(values)
                }

                fn as_slice(data: &ArrayData) -> Option<&[Self]> {
                    match data {
                        ArrayData::$variant(v) => Some(v.as_slice()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_element!(
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
);
