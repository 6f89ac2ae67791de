//! Structured container codec (`.h5`).
//!
//! Every present field becomes one named dataset. Array and record fields are
//! chunked and may be compressed; scalars are stored as 0-d datasets. The
//! root carries `classname` and `module` attributes, and each dataset a `type`
//! attribute (`float`, `str`, `ndarray` or `recarray`) plus `desc` when the
//! field declares one.

use crate::array::{ArrayData, NdArray};
use crate::codec::{Codec, Format, LoadOptions, Mode, SaveOptions};
use crate::compression::{CompressionSpec, Compressor, NoCompression};
use crate::error::{Result, SchemaError};
use crate::field::FieldDescriptor;
use crate::format::{
    self, Attributes, ChunkRef, ContainerIndex, DatasetEntry, DatasetPayload, GlobalHeader, MetaByte,
};
use crate::io::SeqWriter;
use crate::npy::RawArray;
use crate::reader::ContainerReader;
use crate::schema::{SchemaDef, SchemaInstance};
use crate::strings;
use crate::value::Value;
use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Root attribute holding the schema class name.
pub const CLASSNAME_ATTR: &str = "classname";
/// Root attribute holding the schema module path.
pub const MODULE_ATTR: &str = "module";
/// Dataset attribute holding the value kind.
pub const TYPE_ATTR: &str = "type";
/// Dataset attribute holding the field description.
pub const DESC_ATTR: &str = "desc";
/// Dataset attribute naming the text encoding unicode data was stored with.
pub const ENCODED_ATTR: &str = "encoded";
/// Dataset attribute listing the record columns that were encoded, as JSON.
pub const ENCODED_COLUMNS_ATTR: &str = "encoded_columns";

/// Kind of value a dataset holds, as written to its `type` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetType {
    /// A float scalar.
    Float,
    /// A string scalar.
    Str,
    /// A homogeneous array.
    NdArray,
    /// A record array.
    RecArray,
}

impl DatasetType {
    /// Kind of `value`.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Float(_) => DatasetType::Float,
            Value::Str(_) => DatasetType::Str,
            Value::Array(_) => DatasetType::NdArray,
            Value::Record(_) => DatasetType::RecArray,
        }
    }

    /// Name written to the `type` attribute.
    pub fn name(self) -> &'static str {
        match self {
            DatasetType::Float => "float",
            DatasetType::Str => "str",
            DatasetType::NdArray => "ndarray",
            DatasetType::RecArray => "recarray",
        }
    }

    /// Parses a `type` attribute.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "float" => Some(DatasetType::Float),
            "str" => Some(DatasetType::Str),
            "ndarray" => Some(DatasetType::NdArray),
            "recarray" => Some(DatasetType::RecArray),
            _ => None,
        }
    }

    /// Arrays are chunked; scalars are not.
    pub fn is_chunked(self) -> bool {
        matches!(self, DatasetType::NdArray | DatasetType::RecArray)
    }
}

/// A dataset ready to be written.
struct Prepared<'a> {
    name: &'a str,
    kind: DatasetType,
    payload: Vec<u8>,
    attrs: Attributes,
}

/// Codec for the chunked container format.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerCodec;

impl ContainerCodec {
    fn prepare<'a>(
        descriptor: &'a FieldDescriptor,
        value: &Value,
        options: &SaveOptions,
    ) -> Result<Prepared<'a>> {
        let name = descriptor.name();
        let kind = DatasetType::of(value);

        let mut attrs = Attributes::new();
        attrs.insert(TYPE_ATTR.to_string(), kind.name().to_string());
        if let Some(desc) = descriptor.desc() {
            attrs.insert(DESC_ATTR.to_string(), desc.to_string());
        }

        let stored = match value {
            Value::Str(s) => Value::Array(NdArray::new(
                Vec::new(),
                ArrayData::Bytes(vec![s.as_bytes().to_vec()]),
            )?),
            other if strings::has_unicode(other) => {
                if !options.encode_string_arrays {
                    return Err(SchemaError::Encoding(format!(
                        "field '{name}' holds unicode strings, which containers only store encoded"
                    )));
                }
                attrs.insert(ENCODED_ATTR.to_string(), options.encoding.name().to_string());
                if let Value::Record(records) = other {
                    let columns = strings::unicode_columns(records);
                    attrs.insert(
                        ENCODED_COLUMNS_ATTR.to_string(),
                        serde_json::to_string(&columns)?,
                    );
                }
                strings::encode_value(other.clone(), options.encoding)?
            }
            other => other.clone(),
        };

        let raw = RawArray::from_value(&stored)?;
        let payload = format::encode(&DatasetPayload {
            descr: raw.descr.to_literal(),
            shape: raw.shape.iter().map(|&d| d as u64).collect(),
            data: raw.data,
        })?;

        Ok(Prepared {
            name,
            kind,
            payload,
            attrs,
        })
    }

    fn existing_index(path: &Path, mode: Mode) -> Result<Option<ContainerIndex>> {
        if mode == Mode::Append && path.exists() {
            let reader = ContainerReader::open(path)?;
            return Ok(Some(reader.index().clone()));
        }
        Ok(None)
    }
}

impl Codec for ContainerCodec {
    fn format(&self) -> Format {
        Format::Container
    }

    fn encode(&self, instance: &SchemaInstance, path: &Path, options: &SaveOptions) -> Result<()> {
        let spec = CompressionSpec::new(options.compression, options.compression_level)?;
        let compressor: Box<dyn Compressor> = match &spec {
            Some(spec) => spec.compressor()?,
            None => Box::new(NoCompression),
        };

        let mut prepared = Vec::new();
        for (descriptor, value) in instance.iter() {
            match value {
                Some(value) => prepared.push(Self::prepare(descriptor, value, options)?),
                None => debug!(field = %descriptor.name(), "skipping absent field"),
            }
        }

        let existing = Self::existing_index(path, options.mode)?;
        if let Some(index) = &existing
            && let Some(dup) = prepared.iter().find(|p| index.contains(p.name))
        {
            return Err(SchemaError::DuplicateDataset(dup.name.to_string()));
        }

        let (mut writer, mut index) = match existing {
            Some(index) => (SeqWriter::append(path)?, index),
            None => (SeqWriter::create(path)?, ContainerIndex::default()),
        };
        let def = instance.definition();
        index
            .attrs
            .insert(CLASSNAME_ATTR.to_string(), def.classname().to_string());
        index
            .attrs
            .insert(MODULE_ATTR.to_string(), def.module().to_string());

        for dataset in prepared {
            let chunked = dataset.kind.is_chunked();
            let (bytes, algo) = if chunked {
                (compressor.compress(&dataset.payload)?, compressor.id())
            } else {
                (Cow::Borrowed(dataset.payload.as_slice()), 0)
            };
            let location = writer.write_chunk(&bytes, MetaByte::new(chunked, algo))?;
            trace!(
                field = %dataset.name,
                kind = dataset.kind.name(),
                offset = location.offset,
                length = location.length,
                "wrote dataset"
            );
            index.datasets.push(DatasetEntry {
                name: dataset.name.to_string(),
                location,
                attrs: dataset.attrs,
            });
        }

        let mut index_chunk = format::encode(&index)?;
        index_chunk.push(MetaByte::new(false, 0).as_u8());
        let offset = writer.write_all(&index_chunk)?;
        let header = GlobalHeader::new(
            ChunkRef {
                offset,
                length: index_chunk.len() as u64,
            },
            format::checksum(&index_chunk),
        );
        writer.write_all(&header.to_bytes())?;
        writer.flush()?;

        debug!(
            path = %path.display(),
            datasets = index.datasets.len(),
            compression = ?spec.map(|s| s.algorithm),
            "container written"
        );
        Ok(())
    }

    fn decode(
        &self,
        def: &Arc<SchemaDef>,
        path: &Path,
        options: &LoadOptions,
    ) -> Result<SchemaInstance> {
        let reader = ContainerReader::open(path)?;

        if let Some(stored) = reader.attrs().get(CLASSNAME_ATTR)
            && stored != def.classname()
        {
            warn!(
                stored = %stored,
                expected = %def.classname(),
                "container was written by a different schema class"
            );
        }

        let mut instance = SchemaInstance::new(Arc::clone(def));
        for field in def.fields() {
            let Some(entry) = reader.dataset(field.name()) else {
                trace!(field = %field.name(), "no dataset, keeping default");
                continue;
            };
            let kind = entry
                .attrs
                .get(TYPE_ATTR)
                .and_then(|t| DatasetType::from_name(t));
            let mut value = reader.read_raw(entry)?.into_value()?;
            if options.decode_string_arrays && entry.attrs.contains_key(ENCODED_ATTR) {
                value = decode_stored(entry, value, options)?;
            }
            trace!(field = %entry.name, kind = ?kind, "read dataset");
            instance.set(&entry.name, value)?;
        }
        for entry in reader.datasets() {
            if def.describe(&entry.name).is_none() {
                trace!(dataset = %entry.name, "skipping undeclared dataset");
            }
        }
        Ok(instance)
    }
}

/// Turns the byte strings written for unicode data back into text. Record
/// arrays decode only the columns listed at write time.
fn decode_stored(entry: &DatasetEntry, value: Value, options: &LoadOptions) -> Result<Value> {
    match (value, entry.attrs.get(ENCODED_COLUMNS_ATTR)) {
        (Value::Record(records), Some(columns)) => {
            let columns: Vec<String> = serde_json::from_str(columns).map_err(|e| {
                SchemaError::format(format!("dataset '{}': bad encoded columns: {e}", entry.name))
            })?;
            Ok(Value::Record(strings::decode_columns(
                records,
                &columns,
                options.encoding,
            )?))
        }
        (value, _) => strings::decode_value(value, options.encoding),
    }
}
