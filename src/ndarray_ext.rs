//! ndarray integration.
//!
//! Conversions between [`NdArray`] and `ndarray::ArrayD`, and `ArrayD<T>` as a
//! derived schema field type. Enable with the `ndarray` feature flag.

use crate::array::NdArray;
use crate::dtype::Element;
use crate::error::{Result, SchemaError};
use crate::field::FieldType;
use crate::schema::FieldValue;
use crate::value::Value;
use ndarray::{ArrayD, IxDyn};

impl NdArray {
    /// Copies an `ArrayD` in logical (row-major) order.
    pub fn from_ndarray<T: Element>(array: &ArrayD<T>) -> Self {
        let data = T::into_data(array.iter().copied().collect());
        Self::from_parts(array.shape().to_vec(), data)
    }

    /// Copies into an `ArrayD<T>`.
    ///
    /// # Errors
    /// `TypeMismatch` when the dtype is not `T`'s.
    pub fn to_ndarray<T: Element>(&self) -> Result<ArrayD<T>> {
        let values = self
            .as_slice::<T>()
            .ok_or_else(|| SchemaError::mismatch("ndarray", T::DTYPE, self.dtype()))?;
        ArrayD::from_shape_vec(IxDyn(self.shape()), values.to_vec())
            .map_err(|e| SchemaError::InvalidArray(e.to_string()))
    }
}

impl<T: Element> From<ArrayD<T>> for Value {
    fn from(array: ArrayD<T>) -> Self {
        Value::Array(NdArray::from_ndarray(&array))
    }
}

impl<T: Element> FieldValue for ArrayD<T> {
    fn field_type() -> FieldType {
        FieldType::array_of(T::DTYPE)
    }

    fn to_value(&self) -> Option<Value> {
        Some(Value::Array(NdArray::from_ndarray(self)))
    }

    fn from_value(field: &str, value: Option<Value>) -> Result<Self> {
        match value {
            Some(Value::Array(a)) => a
                .to_ndarray()
                .map_err(|_| SchemaError::mismatch(field, T::DTYPE, a.dtype())),
            Some(other) => Err(SchemaError::mismatch(field, Self::field_type(), other.kind())),
            None => Err(SchemaError::mismatch(field, Self::field_type(), "an absent value")),
        }
    }
}
