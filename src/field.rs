//! Field descriptors and the typed setter.
//!
//! Each schema field is declared once, at definition time, as a
//! [`FieldDescriptor`]. Assignment goes through [`FieldType::coerce`], which
//! performs the conversions a reloaded value needs (0-d arrays back to
//! scalars, numeric dtype casts) and rejects everything else.

use crate::array::{ArrayData, NdArray};
use crate::dtype::DType;
use crate::error::{Result, SchemaError};
use crate::value::Value;
use std::fmt;

/// Constraints of an array-valued field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArraySpec {
    /// Required element dtype. `None` accepts any dtype, including record arrays.
    pub dtype: Option<DType>,
    /// Required shape. `None` accepts any shape.
    pub shape: Option<Vec<usize>>,
}

/// Semantic type of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// 64-bit float scalar.
    Float,
    /// String scalar.
    Str,
    /// Homogeneous array (or any array when no dtype is set).
    Array(ArraySpec),
    /// Structured record array.
    Records,
}

impl FieldType {
    /// Array field of any dtype and shape.
    pub fn array() -> Self {
        FieldType::Array(ArraySpec::default())
    }

    /// Array field with a fixed dtype.
    pub fn array_of(dtype: DType) -> Self {
        FieldType::Array(ArraySpec {
            dtype: Some(dtype),
            shape: None,
        })
    }

    /// Restricts an array field to `dtype`. Other field types are unchanged.
    pub fn with_dtype(self, dtype: DType) -> Self {
        match self {
            FieldType::Array(spec) => FieldType::Array(ArraySpec {
                dtype: Some(dtype),
                ..spec
            }),
            other => other,
        }
    }

    /// Restricts an array field to `shape`. Other field types are unchanged.
    pub fn with_shape(self, shape: Vec<usize>) -> Self {
        match self {
            FieldType::Array(spec) => FieldType::Array(ArraySpec {
                shape: Some(shape),
                ..spec
            }),
            other => other,
        }
    }

    /// True for array and record fields.
    pub fn is_array(&self) -> bool {
        matches!(self, FieldType::Array(_) | FieldType::Records)
    }

    /// The value a field of this type holds before any assignment.
    pub fn default_value(&self) -> Option<Value> {
        match self {
            FieldType::Float => Some(Value::Float(0.0)),
            FieldType::Str => Some(Value::Str(String::new())),
            FieldType::Array(spec) => {
                let dtype = spec.dtype.unwrap_or(DType::F64);
                let array = match &spec.shape {
                    Some(shape) => NdArray::zeros(dtype, shape.clone()),
                    None => NdArray::empty(dtype),
                };
                Some(Value::Array(array))
            }
            FieldType::Records => None,
        }
    }

    /// Validates `value` against this type, converting where a lossless or
    /// declared conversion exists.
    pub fn coerce(&self, field: &str, value: Value) -> Result<Value> {
        match (self, value) {
            (FieldType::Float, Value::Float(v)) => Ok(Value::Float(v)),
            (FieldType::Float, Value::Array(a)) if a.len() == 1 => {
                let first = a.data().to_f64_vec().and_then(|v| v.first().copied());
                match first {
                    Some(v) => Ok(Value::Float(v)),
                    None => Err(SchemaError::mismatch(field, self, Value::Array(a).kind())),
                }
            }
            (FieldType::Str, Value::Str(s)) => Ok(Value::Str(s)),
            (FieldType::Str, Value::Array(a)) if a.ndim() == 0 => match a.into_data() {
                ArrayData::Unicode(mut v) => Ok(Value::Str(v.pop().unwrap_or_default())),
                ArrayData::Bytes(mut v) => {
                    let bytes = v.pop().unwrap_or_default();
                    String::from_utf8(bytes).map(Value::Str).map_err(|e| {
                        SchemaError::Encoding(format!("field '{field}': {e}"))
                    })
                }
                other => Err(SchemaError::mismatch(
                    field,
                    self,
                    format!("0-d {} array", other.dtype()),
                )),
            },
            (FieldType::Array(spec), Value::Array(a)) => {
                Ok(Value::Array(coerce_array(field, self, spec, a)?))
            }
            // Scalars come back from text as plain numbers and strings.
            (FieldType::Array(spec), Value::Float(v)) => {
                Ok(Value::Array(coerce_array(field, self, spec, NdArray::scalar(v))?))
            }
            (FieldType::Array(spec), Value::Str(s)) => {
                let a = NdArray::new(Vec::new(), ArrayData::Unicode(vec![s]))?;
                Ok(Value::Array(coerce_array(field, self, spec, a)?))
            }
            (FieldType::Array(spec), Value::Record(r)) if spec.dtype.is_none() => {
                check_shape(field, spec, r.shape())?;
                Ok(Value::Record(r))
            }
            (FieldType::Records, Value::Record(r)) => Ok(Value::Record(r)),
            (_, value) => Err(SchemaError::mismatch(field, self, value.kind())),
        }
    }
}

fn coerce_array(field: &str, ty: &FieldType, spec: &ArraySpec, a: NdArray) -> Result<NdArray> {
    let a = match spec.dtype {
        Some(dtype) if dtype != a.dtype() => match a.cast(dtype) {
            Some(cast) => cast,
            None if a.is_empty() => NdArray::new(a.shape().to_vec(), ArrayData::empty(dtype))?,
            None => match recode_strings(field, dtype, &a)? {
                Some(recoded) => recoded,
                None => return Err(SchemaError::mismatch(field, ty, Value::Array(a).kind())),
            },
        },
        _ => a,
    };
    check_shape(field, spec, a.shape())?;
    Ok(a)
}

/// Moves string data between the unicode and byte dtypes as UTF-8. `None` for
/// any other pairing.
fn recode_strings(field: &str, dtype: DType, a: &NdArray) -> Result<Option<NdArray>> {
    let data = match (dtype, a.data()) {
        (DType::Bytes, ArrayData::Unicode(v)) => {
            ArrayData::Bytes(v.iter().map(|s| s.as_bytes().to_vec()).collect())
        }
        (DType::Unicode, ArrayData::Bytes(v)) => ArrayData::Unicode(
            v.iter()
                .map(|b| {
                    String::from_utf8(b.clone())
                        .map_err(|e| SchemaError::Encoding(format!("field '{field}': {e}")))
                })
                .collect::<Result<_>>()?,
        ),
        _ => return Ok(None),
    };
    Ok(Some(NdArray::from_parts(a.shape().to_vec(), data)))
}

fn check_shape(field: &str, spec: &ArraySpec, shape: &[usize]) -> Result<()> {
    match &spec.shape {
        Some(expected) if expected.as_slice() != shape => Err(SchemaError::mismatch(
            field,
            format!("shape {expected:?}"),
            format!("shape {shape:?}"),
        )),
        _ => Ok(()),
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Float => f.write_str("float"),
            FieldType::Str => f.write_str("str"),
            FieldType::Array(spec) => {
                match spec.dtype {
                    Some(dtype) => write!(f, "{dtype} array")?,
                    None => f.write_str("array")?,
                }
                if let Some(shape) = &spec.shape {
                    write!(f, " of shape {shape:?}")?;
                }
                Ok(())
            }
            FieldType::Records => f.write_str("record array"),
        }
    }
}

/// Static metadata of one declared field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    name: String,
    ty: FieldType,
    desc: Option<String>,
    default: Option<Value>,
}

impl FieldDescriptor {
    /// Declares a field with the type's default value.
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        let default = ty.default_value();
        Self {
            name: name.into(),
            ty,
            desc: None,
            default,
        }
    }

    /// Human-readable description, stored as the `desc` attribute in containers.
    pub fn describe(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    /// Makes the field start out absent instead of holding a default.
    pub fn optional(mut self) -> Self {
        self.default = None;
        self
    }

    /// Explicit default. The value is checked against the field type.
    pub fn with_default(mut self, value: impl Into<Value>) -> Result<Self> {
        let value = self.ty.coerce(&self.name, value.into())?;
        self.default = Some(value);
        Ok(self)
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Semantic type.
    pub fn field_type(&self) -> &FieldType {
        &self.ty
    }

    /// Description, if declared.
    pub fn desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    /// Value a new instance starts with; `None` when absent.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// True if values of this field are arrays (chunked in containers).
    pub fn is_array(&self) -> bool {
        self.ty.is_array()
    }
}
