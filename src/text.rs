//! Text codec (`.json`).
//!
//! The document is a single object keyed by field name. Values pass through
//! [`value_to_json`] before serialization: arrays become nested lists
//! following their shape, byte strings are decoded as UTF-8, and record arrays
//! are rejected. Absent fields are written as `null`.

use crate::array::{ArrayData, NdArray};
use crate::codec::{Codec, Format, LoadOptions, SaveOptions};
use crate::dtype::DType;
use crate::error::{Result, SchemaError};
use crate::schema::{SchemaDef, SchemaInstance};
use crate::value::Value;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::{Map, Number, Value as Json};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::trace;

/// Codec for the JSON text format.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn format(&self) -> Format {
        Format::Json
    }

    fn encode(&self, instance: &SchemaInstance, path: &Path, options: &SaveOptions) -> Result<()> {
        // Transform everything first so a record array leaves no file behind.
        let document = to_json_map(instance)?;
        let mut writer = BufWriter::new(File::create(path)?);
        write_document(&mut writer, &document, options.indent)?;
        writer.flush()?;
        Ok(())
    }

    fn decode(
        &self,
        def: &Arc<SchemaDef>,
        path: &Path,
        _options: &LoadOptions,
    ) -> Result<SchemaInstance> {
        read_json(def, BufReader::new(File::open(path)?))
    }
}

/// Serializes `instance` to a JSON string.
pub fn to_json_string(instance: &SchemaInstance, indent: Option<usize>) -> Result<String> {
    let document = to_json_map(instance)?;
    let mut buf = Vec::new();
    write_document(&mut buf, &document, indent)?;
    String::from_utf8(buf).map_err(SchemaError::serialization)
}

/// Parses a JSON document from `reader` into a new instance of `def`.
pub fn read_json<R: Read>(def: &Arc<SchemaDef>, reader: R) -> Result<SchemaInstance> {
    let document: Json = serde_json::from_reader(reader)?;
    from_json_document(def, document)
}

/// Parses a JSON string into a new instance of `def`.
pub fn from_json_str(def: &Arc<SchemaDef>, text: &str) -> Result<SchemaInstance> {
    let document: Json = serde_json::from_str(text)?;
    from_json_document(def, document)
}

fn write_document<W: Write>(
    writer: &mut W,
    document: &Map<String, Json>,
    indent: Option<usize>,
) -> Result<()> {
    match indent {
        Some(width) => {
            let indent = " ".repeat(width);
            let formatter = PrettyFormatter::with_indent(indent.as_bytes());
            let mut ser = Serializer::with_formatter(writer, formatter);
            document.serialize(&mut ser)?;
        }
        None => serde_json::to_writer(writer, document)?,
    }
    Ok(())
}

/// Field-name to JSON value map for every declared field.
pub fn to_json_map(instance: &SchemaInstance) -> Result<Map<String, Json>> {
    let mut document = Map::new();
    for (field, value) in instance.iter() {
        let json = match value {
            Some(value) => value_to_json(field.name(), value)?,
            None => Json::Null,
        };
        document.insert(field.name().to_string(), json);
    }
    Ok(document)
}

fn from_json_document(def: &Arc<SchemaDef>, document: Json) -> Result<SchemaInstance> {
    let Json::Object(document) = document else {
        return Err(SchemaError::format("JSON document must be an object"));
    };
    for key in document.keys() {
        if def.describe(key).is_none() {
            return Err(SchemaError::UnknownField {
                schema: def.classname().to_string(),
                field: key.clone(),
            });
        }
    }

    let mut instance = SchemaInstance::new(Arc::clone(def));
    for (key, json) in document {
        trace!(field = %key, "reading json field");
        let value = json_to_value(&key, json)?;
        instance.assign(&key, value)?;
    }
    Ok(instance)
}

/// Converts a value to its JSON-native form.
///
/// Record arrays have no JSON form and fail with
/// [`SchemaError::StructuredDataUnsupported`].
pub fn value_to_json(field: &str, value: &Value) -> Result<Json> {
    match value {
        Value::Float(v) => float_to_json(field, *v),
        Value::Str(s) => Ok(Json::String(s.clone())),
        Value::Array(array) => array_to_json(field, array),
        Value::Record(_) => Err(SchemaError::StructuredDataUnsupported {
            field: field.to_string(),
        }),
    }
}

fn float_to_json(field: &str, v: f64) -> Result<Json> {
    Number::from_f64(v).map(Json::Number).ok_or_else(|| {
        SchemaError::Serialization(format!("field '{field}': {v} has no JSON representation"))
    })
}

fn array_to_json(field: &str, array: &NdArray) -> Result<Json> {
    let data = array.data();
    let leaves = (0..array.len())
        .map(|i| element_to_json(field, data, i))
        .collect::<Result<Vec<_>>>()?;
    let mut leaves = leaves.into_iter();
    Ok(nest(array.shape(), &mut leaves))
}

/// Folds a flat row-major sequence into nested lists of `shape`.
fn nest(shape: &[usize], leaves: &mut impl Iterator<Item = Json>) -> Json {
    match shape.split_first() {
        None => leaves.next().unwrap_or(Json::Null),
        Some((&n, rest)) => Json::Array((0..n).map(|_| nest(rest, leaves)).collect()),
    }
}

fn element_to_json(field: &str, data: &ArrayData, i: usize) -> Result<Json> {
    let json = match data {
        ArrayData::Bool(v) => Json::Bool(v[i]),
        ArrayData::I8(v) => Json::from(v[i]),
        ArrayData::I16(v) => Json::from(v[i]),
        ArrayData::I32(v) => Json::from(v[i]),
        ArrayData::I64(v) => Json::from(v[i]),
        ArrayData::U8(v) => Json::from(v[i]),
        ArrayData::U16(v) => Json::from(v[i]),
        ArrayData::U32(v) => Json::from(v[i]),
        ArrayData::U64(v) => Json::from(v[i]),
        ArrayData::F32(v) => float_to_json(field, f64::from(v[i]))?,
        ArrayData::F64(v) => float_to_json(field, v[i])?,
        ArrayData::Bytes(v) => Json::String(String::from_utf8(v[i].clone()).map_err(|e| {
            SchemaError::Encoding(format!("field '{field}': {e}"))
        })?),
        ArrayData::Unicode(v) => Json::String(v[i].clone()),
    };
    Ok(json)
}

/// Converts a JSON value back to a field value. `null` means absent.
pub fn json_to_value(field: &str, json: Json) -> Result<Option<Value>> {
    match json {
        Json::Null => Ok(None),
        // Integers keep full precision as 0-d arrays; the setter narrows them.
        Json::Number(n) => match n.as_i64() {
            Some(i) => Ok(Some(Value::Array(NdArray::scalar(i)))),
            None => n.as_f64().map(|v| Some(Value::Float(v))).ok_or_else(|| {
                SchemaError::Serialization(format!("field '{field}': number {n} out of range"))
            }),
        },
        Json::String(s) => Ok(Some(Value::Str(s))),
        Json::Bool(b) => Ok(Some(Value::Array(NdArray::scalar(b)))),
        Json::Array(items) => {
            let mut shape = Vec::new();
            let mut leaves = Vec::new();
            flatten(field, Json::Array(items), 0, &mut shape, &mut leaves)?;
            let data = leaves_to_data(field, leaves)?;
            Ok(Some(Value::Array(NdArray::new(shape, data)?)))
        }
        Json::Object(_) => Err(SchemaError::InvalidArray(format!(
            "field '{field}': JSON objects cannot be stored in a field"
        ))),
    }
}

/// Walks nested lists, recording the shape on first visit of each depth and
/// rejecting ragged nesting.
fn flatten(
    field: &str,
    json: Json,
    depth: usize,
    shape: &mut Vec<usize>,
    leaves: &mut Vec<Json>,
) -> Result<()> {
    let ragged = || SchemaError::InvalidArray(format!("field '{field}': ragged nested list"));
    match json {
        Json::Array(items) => {
            match shape.get(depth) {
                Some(&n) if n != items.len() => return Err(ragged()),
                Some(_) => {}
                None if depth == shape.len() && leaves.is_empty() => shape.push(items.len()),
                None => return Err(ragged()),
            }
            for item in items {
                flatten(field, item, depth + 1, shape, leaves)?;
            }
            Ok(())
        }
        leaf if depth == shape.len() => {
            leaves.push(leaf);
            Ok(())
        }
        _ => Err(ragged()),
    }
}

fn leaves_to_data(field: &str, leaves: Vec<Json>) -> Result<ArrayData> {
    let mixed = || SchemaError::InvalidArray(format!("field '{field}': mixed element types"));
    let Some(first) = leaves.first() else {
        return Ok(ArrayData::empty(DType::F64));
    };
    match first {
        Json::Bool(_) => leaves
            .iter()
            .map(|j| j.as_bool().ok_or_else(mixed))
            .collect::<Result<Vec<_>>>()
            .map(ArrayData::Bool),
        Json::String(_) => leaves
            .into_iter()
            .map(|j| match j {
                Json::String(s) => Ok(s),
                _ => Err(mixed()),
            })
            .collect::<Result<Vec<_>>>()
            .map(ArrayData::Unicode),
        Json::Number(_) => {
            if leaves.iter().all(|j| j.is_i64()) {
                leaves
                    .iter()
                    .map(|j| j.as_i64().ok_or_else(mixed))
                    .collect::<Result<Vec<_>>>()
                    .map(ArrayData::I64)
            } else {
                leaves
                    .iter()
                    .map(|j| j.as_f64().ok_or_else(mixed))
                    .collect::<Result<Vec<_>>>()
                    .map(ArrayData::F64)
            }
        }
        _ => Err(mixed()),
    }
}
