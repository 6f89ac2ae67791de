//! Field values.

use crate::array::{NdArray, RecordArray};
use crate::dtype::Element;
use std::fmt;

/// A value held by a schema field. Absence is modelled as `Option<Value>::None`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 64-bit float scalar.
    Float(f64),
    /// String scalar.
    Str(String),
    /// Homogeneous n-dimensional array.
    Array(NdArray),
    /// Structured record array.
    Record(RecordArray),
}

impl Value {
    /// Short description of the value's kind, used in error messages.
    pub fn kind(&self) -> String {
        match self {
            Value::Float(_) => "float".to_string(),
            Value::Str(_) => "str".to_string(),
            Value::Array(a) => format!("{} array of shape {:?}", a.dtype(), a.shape()),
            Value::Record(r) => format!("record array of shape {:?}", r.shape()),
        }
    }

    /// The float, for `Float` values.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The string, for `Str` values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The array, for `Array` values.
    pub fn as_array(&self) -> Option<&NdArray> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The record array, for `Record` values.
    pub fn as_record(&self) -> Option<&RecordArray> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// True for record arrays.
    pub fn is_record(&self) -> bool {
        matches!(self, Value::Record(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Array(a) => write!(f, "{a}"),
            Value::Record(r) => write!(f, "{r}"),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<NdArray> for Value {
    fn from(a: NdArray) -> Self {
        Value::Array(a)
    }
}

impl From<RecordArray> for Value {
    fn from(r: RecordArray) -> Self {
        Value::Record(r)
    }
}

impl<T: Element> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(NdArray::from_vec(v))
    }
}
