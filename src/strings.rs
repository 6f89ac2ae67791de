//! Text encodings for string arrays.
//!
//! The container format stores byte strings only, so unicode arrays are
//! re-encoded on write and decoded back on read. Encoding and decoding work
//! element by element and, for record arrays, column by column; non-string
//! columns pass through untouched.
//!
//! Encoded record columns are capped at [`MAX_RECORD_STRING_BYTES`] per
//! element. The cap is per record column; plain string arrays are unbounded.

use crate::array::{ArrayData, NdArray, RecordArray};
use crate::error::{Result, SchemaError};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Widest byte column a unicode record column may be encoded into.
pub const MAX_RECORD_STRING_BYTES: usize = 256;

/// Byte encoding used for string arrays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextEncoding {
    /// UTF-8.
    #[default]
    Utf8,
    /// 7-bit ASCII.
    Ascii,
    /// ISO-8859-1.
    Latin1,
}

impl TextEncoding {
    /// Canonical name, e.g. `utf-8`.
    pub fn name(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Ascii => "ascii",
            TextEncoding::Latin1 => "latin-1",
        }
    }

    /// Encodes one string.
    pub fn encode(self, text: &str) -> Result<Vec<u8>> {
        match self {
            TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::Ascii => text
                .chars()
                .map(|c| {
                    if c.is_ascii() {
                        Ok(c as u8)
                    } else {
                        Err(self.unencodable(c))
                    }
                })
                .collect(),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| self.unencodable(c)))
                .collect(),
        }
    }

    /// Decodes one byte string.
    pub fn decode(self, bytes: &[u8]) -> Result<String> {
        match self {
            TextEncoding::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| SchemaError::Encoding(format!("invalid utf-8: {e}"))),
            TextEncoding::Ascii => match bytes.iter().find(|b| !b.is_ascii()) {
                Some(b) => Err(SchemaError::Encoding(format!(
                    "byte 0x{b:02x} is not valid ascii"
                ))),
                None => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            },
            TextEncoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }

    fn unencodable(self, c: char) -> SchemaError {
        SchemaError::Encoding(format!("{c:?} cannot be encoded as {}", self.name()))
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TextEncoding {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf8" | "utf-8" => Ok(TextEncoding::Utf8),
            "ascii" | "us-ascii" => Ok(TextEncoding::Ascii),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(TextEncoding::Latin1),
            other => Err(SchemaError::Encoding(format!("unknown encoding '{other}'"))),
        }
    }
}

/// Encodes unicode data to byte strings; other dtypes are returned unchanged.
pub fn encode_data(data: ArrayData, encoding: TextEncoding) -> Result<ArrayData> {
    match data {
        ArrayData::Unicode(values) => values
            .iter()
            .map(|s| encoding.encode(s))
            .collect::<Result<Vec<_>>>()
            .map(ArrayData::Bytes),
        other => Ok(other),
    }
}

/// Decodes byte-string data to unicode; other dtypes are returned unchanged.
pub fn decode_data(data: ArrayData, encoding: TextEncoding) -> Result<ArrayData> {
    match data {
        ArrayData::Bytes(values) => values
            .iter()
            .map(|b| encoding.decode(b))
            .collect::<Result<Vec<_>>>()
            .map(ArrayData::Unicode),
        other => Ok(other),
    }
}

fn encode_record(records: RecordArray, encoding: TextEncoding) -> Result<RecordArray> {
    records.try_map_columns(|name, data| {
        let encoded = encode_data(data, encoding)?;
        if let ArrayData::Bytes(values) = &encoded
            && let Some(widest) = values.iter().map(Vec::len).max()
            && widest > MAX_RECORD_STRING_BYTES
        {
            return Err(SchemaError::Encoding(format!(
                "record column '{name}' needs {widest} bytes, the limit is {MAX_RECORD_STRING_BYTES}"
            )));
        }
        Ok(encoded)
    })
}

/// Names of the unicode columns of a record array, in storage order.
pub fn unicode_columns(records: &RecordArray) -> Vec<String> {
    records
        .columns()
        .iter()
        .filter(|(_, data)| data.dtype() == crate::DType::Unicode)
        .map(|(name, _)| name.clone())
        .collect()
}

/// Decodes the byte-string columns named in `columns`, leaving the rest as stored.
pub fn decode_columns(
    records: RecordArray,
    columns: &[String],
    encoding: TextEncoding,
) -> Result<RecordArray> {
    records.try_map_columns(|name, data| {
        if columns.iter().any(|c| c == name) {
            decode_data(data, encoding)
        } else {
            Ok(data)
        }
    })
}

/// True if the value holds unicode text (directly or in a record column).
pub fn has_unicode(value: &Value) -> bool {
    match value {
        Value::Array(a) => a.dtype() == crate::DType::Unicode,
        Value::Record(r) => r.has_dtype(crate::DType::Unicode),
        Value::Float(_) | Value::Str(_) => false,
    }
}

/// True if the value holds byte strings (directly or in a record column).
pub fn has_bytes(value: &Value) -> bool {
    match value {
        Value::Array(a) => a.dtype() == crate::DType::Bytes,
        Value::Record(r) => r.has_dtype(crate::DType::Bytes),
        Value::Float(_) | Value::Str(_) => false,
    }
}

/// Re-encodes every unicode element of an array or record value.
pub fn encode_value(value: Value, encoding: TextEncoding) -> Result<Value> {
    match value {
        Value::Array(a) => {
            let (shape, data) = a.into_parts();
            Ok(Value::Array(NdArray::new(shape, encode_data(data, encoding)?)?))
        }
        Value::Record(r) => Ok(Value::Record(encode_record(r, encoding)?)),
        scalar => Ok(scalar),
    }
}

/// Decodes every byte-string element of an array or record value.
pub fn decode_value(value: Value, encoding: TextEncoding) -> Result<Value> {
    match value {
        Value::Array(a) => {
            let (shape, data) = a.into_parts();
            Ok(Value::Array(NdArray::new(shape, decode_data(data, encoding)?)?))
        }
        Value::Record(r) => Ok(Value::Record(
            r.try_map_columns(|_, data| decode_data(data, encoding))?,
        )),
        scalar => Ok(scalar),
    }
}
