//! Schema definitions and instances.
//!
//! A [`SchemaDef`] is the explicit field-descriptor table of one schema type,
//! built once when the type is defined. A [`SchemaInstance`] owns the values of
//! one object of that type and routes every assignment through the typed
//! setter of the declared field.
//!
//! Typed structs implement [`Schema`], normally through
//! `#[derive(Schema)]`, and convert to and from instances for serialization.
//!
//! ```rust
//! use schemata::{FieldDescriptor, FieldType, NdArray, SchemaDef, SchemaInstance};
//!
//! let def = SchemaDef::builder("Measurement", "lab")
//!     .field(FieldDescriptor::new("x", FieldType::array_of(schemata::DType::F64)))
//!     .field(FieldDescriptor::new("name", FieldType::Str).describe("sample name"))
//!     .build();
//!
//! let mut m = SchemaInstance::new(def);
//! m.set("x", vec![1i32, 2, 3])?;
//! m.set("name", "probe")?;
//! assert_eq!(m.get("x").and_then(|v| v.as_array()), Some(&NdArray::from_vec(vec![1.0, 2.0, 3.0])));
//! # Ok::<(), schemata::SchemaError>(())
//! ```

use crate::array::{NdArray, RecordArray};
use crate::codec::{LoadOptions, SaveOptions};
use crate::dtype::{DType, Element};
use crate::error::{Result, SchemaError};
use crate::field::{FieldDescriptor, FieldType};
use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// The declared field table of a schema type.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDef {
    classname: String,
    module: String,
    fields: Vec<FieldDescriptor>,
}

impl SchemaDef {
    /// Starts a definition for class `classname` living in `module`.
    pub fn builder(classname: impl Into<String>, module: impl Into<String>) -> SchemaDefBuilder {
        SchemaDefBuilder {
            def: SchemaDef {
                classname: classname.into(),
                module: module.into(),
                fields: Vec::new(),
            },
        }
    }

    /// Class name.
    pub fn classname(&self) -> &str {
        &self.classname
    }

    /// Module path.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Registry key of this type: `module::classname`.
    pub fn type_tag(&self) -> String {
        type_tag(&self.module, &self.classname)
    }

    /// Declared fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Declared field names in declaration order.
    pub fn declared_fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(FieldDescriptor::name)
    }

    /// Descriptor of field `name`.
    pub fn describe(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name() == name)
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f.name() == name)
            .ok_or_else(|| SchemaError::UnknownField {
                schema: self.classname.clone(),
                field: name.to_string(),
            })
    }
}

pub(crate) fn type_tag(module: &str, classname: &str) -> String {
    format!("{module}::{classname}")
}

/// Builder for [`SchemaDef`].
#[derive(Debug)]
pub struct SchemaDefBuilder {
    def: SchemaDef,
}

impl SchemaDefBuilder {
    /// Declares a field. A later declaration with the same name replaces the
    /// earlier one in place.
    pub fn field(mut self, descriptor: FieldDescriptor) -> Self {
        match self
            .def
            .fields
            .iter_mut()
            .find(|f| f.name() == descriptor.name())
        {
            Some(slot) => *slot = descriptor,
            None => self.def.fields.push(descriptor),
        }
        self
    }

    /// Finishes the definition.
    pub fn build(self) -> Arc<SchemaDef> {
        Arc::new(self.def)
    }
}

/// One object of a schema type: an ordered mapping from declared field to value.
#[derive(Debug, Clone)]
pub struct SchemaInstance {
    def: Arc<SchemaDef>,
    values: Vec<Option<Value>>,
}

impl SchemaInstance {
    /// Instance holding every field's default.
    pub fn new(def: Arc<SchemaDef>) -> Self {
        let values = def
            .fields
            .iter()
            .map(|f| f.default_value().cloned())
            .collect();
        Self { def, values }
    }

    /// Instance with the given assignments applied over the defaults.
    ///
    /// Every key is checked against the declared fields before anything is
    /// assigned; an undeclared key fails with [`SchemaError::UnknownField`].
    pub fn with_fields<I, K, V>(def: Arc<SchemaDef>, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let fields: Vec<(K, V)> = fields.into_iter().collect();
        for (key, _) in &fields {
            def.index_of(key.as_ref())?;
        }
        let mut instance = Self::new(def);
        for (key, value) in fields {
            instance.set(key.as_ref(), value)?;
        }
        Ok(instance)
    }

    /// Definition of this instance's class.
    pub fn definition(&self) -> &Arc<SchemaDef> {
        &self.def
    }

    /// Class name of the definition.
    pub fn classname(&self) -> &str {
        self.def.classname()
    }

    /// Declared field names in declaration order.
    pub fn declared_fields(&self) -> impl Iterator<Item = &str> {
        self.def.declared_fields()
    }

    /// Descriptor of field `name`.
    pub fn describe(&self, name: &str) -> Option<&FieldDescriptor> {
        self.def.describe(name)
    }

    /// Current value of `name`; `None` if absent or undeclared.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let index = self.def.index_of(name).ok()?;
        self.values.get(index).and_then(Option::as_ref)
    }

    /// True if `name` is declared and currently holds a value.
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Assigns `value` through the field's typed setter.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let index = self.def.index_of(name)?;
        let value = self.def.fields[index].field_type().coerce(name, value.into())?;
        self.values[index] = Some(value);
        Ok(())
    }

    /// Makes `name` absent.
    pub fn unset(&mut self, name: &str) -> Result<()> {
        let index = self.def.index_of(name)?;
        self.values[index] = None;
        Ok(())
    }

    /// Sets `name` to `value`, or unsets it for `None`.
    pub fn assign(&mut self, name: &str, value: Option<Value>) -> Result<()> {
        match value {
            Some(value) => self.set(name, value),
            None => self.unset(name),
        }
    }

    /// Moves the value of `name` out, leaving it absent.
    pub fn take(&mut self, name: &str) -> Result<Option<Value>> {
        let index = self.def.index_of(name)?;
        Ok(self.values[index].take())
    }

    /// Declared fields paired with their current values.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldDescriptor, Option<&Value>)> {
        self.def.fields.iter().zip(self.values.iter().map(Option::as_ref))
    }

    /// Present fields as a name-to-value map.
    pub fn to_dict(&self) -> BTreeMap<String, Value> {
        self.iter()
            .filter_map(|(field, value)| Some((field.name().to_string(), value?.clone())))
            .collect()
    }
}

impl PartialEq for SchemaInstance {
    fn eq(&self, other: &Self) -> bool {
        self.def.classname == other.def.classname
            && self.def.module == other.def.module
            && self.values == other.values
    }
}

impl fmt::Display for SchemaInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}(", self.def.classname)?;
        for (i, (field, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, "\n    ")?;
            }
            match value {
                Some(value) => write!(f, "{}={value}", field.name())?,
                None => write!(f, "{}=None", field.name())?,
            }
        }
        write!(f, ")>")
    }
}

/// A typed struct with a schema definition.
///
/// Usually derived:
///
/// ```rust
/// use schemata::{NdArray, Schema};
///
/// #[derive(Debug, Clone, PartialEq, Schema)]
/// struct NamedMatrix {
///     #[schema(desc = "who the matrix belongs to")]
///     name: String,
///     #[schema(dtype = "float64", shape = "2, 2")]
///     data: NdArray,
/// }
///
/// let def = NamedMatrix::definition();
/// assert_eq!(def.classname(), "NamedMatrix");
/// assert_eq!(def.describe("name").and_then(|f| f.desc()), Some("who the matrix belongs to"));
/// ```
pub trait Schema: Sized {
    /// The field table of this type, built once.
    fn definition() -> Arc<SchemaDef>;

    /// Copies the struct's fields into a new instance.
    fn to_instance(&self) -> Result<SchemaInstance>;

    /// Builds the struct from an instance of its definition.
    fn from_instance(instance: SchemaInstance) -> Result<Self>;

    /// Saves to `path` in the format chosen by its extension.
    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.to_instance()?.save(path)
    }

    /// Saves with explicit options.
    fn save_with<P: AsRef<Path>>(&self, path: P, options: &SaveOptions) -> Result<()> {
        self.to_instance()?.save_with(path, options)
    }

    /// Loads from `path` in the format chosen by its extension.
    fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_instance(SchemaInstance::load(Self::definition(), path)?)
    }

    /// Loads with explicit options.
    fn load_with<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<Self> {
        Self::from_instance(SchemaInstance::load_with(Self::definition(), path, options)?)
    }
}

/// Rust types usable as fields of a derived [`Schema`].
pub trait FieldValue: Sized {
    /// Declared type of a field holding `Self`.
    fn field_type() -> FieldType;

    /// True if the field starts out absent.
    fn is_optional() -> bool {
        false
    }

    /// Current value, `None` when absent.
    fn to_value(&self) -> Option<Value>;

    /// Rebuilds `Self` from an already coerced field value.
    fn from_value(field: &str, value: Option<Value>) -> Result<Self>;
}

fn absent(field: &str, ty: &FieldType) -> SchemaError {
    SchemaError::mismatch(field, ty, "an absent value")
}

impl FieldValue for f64 {
    fn field_type() -> FieldType {
        FieldType::Float
    }

    fn to_value(&self) -> Option<Value> {
        Some(Value::Float(*self))
    }

    fn from_value(field: &str, value: Option<Value>) -> Result<Self> {
        match value {
            Some(Value::Float(v)) => Ok(v),
            Some(other) => Err(SchemaError::mismatch(field, "float", other.kind())),
            None => Err(absent(field, &FieldType::Float)),
        }
    }
}

impl FieldValue for String {
    fn field_type() -> FieldType {
        FieldType::Str
    }

    fn to_value(&self) -> Option<Value> {
        Some(Value::Str(self.clone()))
    }

    fn from_value(field: &str, value: Option<Value>) -> Result<Self> {
        match value {
            Some(Value::Str(s)) => Ok(s),
            Some(other) => Err(SchemaError::mismatch(field, "str", other.kind())),
            None => Err(absent(field, &FieldType::Str)),
        }
    }
}

impl FieldValue for NdArray {
    fn field_type() -> FieldType {
        FieldType::array()
    }

    fn to_value(&self) -> Option<Value> {
        Some(Value::Array(self.clone()))
    }

    fn from_value(field: &str, value: Option<Value>) -> Result<Self> {
        match value {
            Some(Value::Array(a)) => Ok(a),
            Some(other) => Err(SchemaError::mismatch(field, "array", other.kind())),
            None => Err(absent(field, &Self::field_type())),
        }
    }
}

impl FieldValue for RecordArray {
    fn field_type() -> FieldType {
        FieldType::Records
    }

    fn to_value(&self) -> Option<Value> {
        Some(Value::Record(self.clone()))
    }

    fn from_value(field: &str, value: Option<Value>) -> Result<Self> {
        match value {
            Some(Value::Record(r)) => Ok(r),
            Some(other) => Err(SchemaError::mismatch(field, "record array", other.kind())),
            None => Err(absent(field, &FieldType::Records)),
        }
    }
}

impl<T: Element> FieldValue for Vec<T> {
    fn field_type() -> FieldType {
        FieldType::array_of(T::DTYPE)
    }

    fn to_value(&self) -> Option<Value> {
        Some(Value::Array(NdArray::from_vec(self.clone())))
    }

    fn from_value(field: &str, value: Option<Value>) -> Result<Self> {
        match value {
            Some(Value::Array(a)) => match a.as_slice::<T>() {
                Some(values) => Ok(values.to_vec()),
                None => Err(SchemaError::mismatch(field, T::DTYPE, a.dtype())),
            },
            Some(other) => Err(SchemaError::mismatch(field, Self::field_type(), other.kind())),
            None => Err(absent(field, &Self::field_type())),
        }
    }
}

impl FieldValue for Vec<String> {
    fn field_type() -> FieldType {
        FieldType::array_of(DType::Unicode)
    }

    fn to_value(&self) -> Option<Value> {
        Some(Value::Array(NdArray::from_strings(self.iter().cloned())))
    }

    fn from_value(field: &str, value: Option<Value>) -> Result<Self> {
        match value {
            Some(Value::Array(a)) => match a.as_strings() {
                Some(values) => Ok(values.to_vec()),
                None => Err(SchemaError::mismatch(field, DType::Unicode, a.dtype())),
            },
            Some(other) => Err(SchemaError::mismatch(field, Self::field_type(), other.kind())),
            None => Err(absent(field, &Self::field_type())),
        }
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn field_type() -> FieldType {
        T::field_type()
    }

    fn is_optional() -> bool {
        true
    }

    fn to_value(&self) -> Option<Value> {
        self.as_ref().and_then(T::to_value)
    }

    fn from_value(field: &str, value: Option<Value>) -> Result<Self> {
        match value {
            Some(value) => T::from_value(field, Some(value)).map(Some),
            None => Ok(None),
        }
    }
}

/// Descriptor for a derived field of Rust type `T`.
#[doc(hidden)]
pub fn field_descriptor<T: FieldValue>(
    name: &str,
    dtype: Option<DType>,
    shape: Option<Vec<usize>>,
    desc: Option<&str>,
) -> FieldDescriptor {
    let mut ty = T::field_type();
    if let Some(dtype) = dtype {
        ty = ty.with_dtype(dtype);
    }
    if let Some(shape) = shape {
        ty = ty.with_shape(shape);
    }
    let mut descriptor = FieldDescriptor::new(name, ty);
    if let Some(desc) = desc {
        descriptor = descriptor.describe(desc);
    }
    if T::is_optional() {
        descriptor = descriptor.optional();
    }
    descriptor
}
