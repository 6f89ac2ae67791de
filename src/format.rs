//! Physical layout of `.h5` container files.
//!
//! The file is a sequence of chunks followed by a fixed-size Global Header at
//! the very end:
//!
//! `[Dataset 0] [Dataset 1] ... [Index] [Global Header]`
//!
//! ## Chunk Anatomy
//! `[ Payload (possibly compressed) ] [ MetaByte ]`
//!
//! Dataset payloads are bincode-encoded [`DatasetPayload`]s. The index chunk
//! holds the root attributes and, for every dataset, its location and
//! attributes. Appending writes new chunks plus a fresh index and header after
//! the old tail, so the last header always describes the whole file.

use crate::error::{Result, SchemaError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::Hasher;
use twox_hash::XxHash64;

/// Magic bytes identifying the container format: "SCHC".
pub const MAGIC_BYTES: [u8; 4] = *b"SCHC";

/// Current container layout version.
pub const FORMAT_VERSION: u16 = 1;

/// Magic(4) + Version(2) + IndexOffset(8) + IndexLength(8) + Checksum(4) = 26
pub const GLOBAL_HEADER_SIZE: usize = 26;

/// Configuration flags for a chunk, stored in its last byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaByte(u8);

impl MetaByte {
    const CHUNKED_MASK: u8 = 0b0000_0001; // Bit 0
    const COMPRESSION_MASK: u8 = 0b0000_1110; // Bits 1-3

    /// Meta-byte for a chunk.
    pub fn new(is_chunked: bool, compression_id: u8) -> Self {
        let mut byte = 0;
        if is_chunked {
            byte |= Self::CHUNKED_MASK;
        }
        byte |= (compression_id & 0x07) << 1;
        Self(byte)
    }

    /// Wraps a raw meta-byte.
    pub fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// True for array datasets, which are the only ones that may be compressed.
    pub fn is_chunked(&self) -> bool {
        (self.0 & Self::CHUNKED_MASK) != 0
    }

    /// Compression algorithm ID (0-7).
    pub fn compression_method(&self) -> u8 {
        (self.0 & Self::COMPRESSION_MASK) >> 1
    }

    /// Raw byte value.
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

/// Location of a chunk in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef {
    /// Absolute offset where the chunk starts.
    pub offset: u64,
    /// Total length of the chunk, meta-byte included.
    pub length: u64,
}

impl ChunkRef {
    /// Offset one past the chunk's last byte.
    pub fn end(&self) -> Result<u64> {
        self.offset
            .checked_add(self.length)
            .ok_or_else(|| SchemaError::format("chunk reference overflows"))
    }
}

/// The Global Header located at the very end of the file (Tail).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalHeader {
    /// Must equal [`MAGIC_BYTES`].
    pub magic: [u8; 4],
    /// Format version.
    pub version: u16,
    /// Where the index chunk lives.
    pub index: ChunkRef,
    /// Truncated xxHash64 of the index chunk bytes.
    pub checksum: u32,
}

impl GlobalHeader {
    /// Header for the current format version.
    pub fn new(index: ChunkRef, checksum: u32) -> Self {
        Self {
            magic: MAGIC_BYTES,
            version: FORMAT_VERSION,
            index,
            checksum,
        }
    }

    /// Serialized header, little-endian.
    pub fn to_bytes(&self) -> [u8; GLOBAL_HEADER_SIZE] {
        let mut buf = [0u8; GLOBAL_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6..14].copy_from_slice(&self.index.offset.to_le_bytes());
        buf[14..22].copy_from_slice(&self.index.length.to_le_bytes());
        buf[22..26].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Parses and validates a header.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: &[u8; GLOBAL_HEADER_SIZE] = bytes
            .try_into()
            .map_err(|_| SchemaError::format("global header has the wrong size"))?;
        let (magic, rest) = bytes.split_at(4);
        if magic != MAGIC_BYTES {
            return Err(SchemaError::format("invalid magic bytes, not a container file"));
        }
        let (version, rest) = rest.split_at(2);
        let (offset, rest) = rest.split_at(8);
        let (length, checksum) = rest.split_at(8);

        let version = u16::from_le_bytes([version[0], version[1]]);
        if version != FORMAT_VERSION {
            return Err(SchemaError::format(format!(
                "unsupported container version: {version}"
            )));
        }

        Ok(Self {
            magic: MAGIC_BYTES,
            version,
            index: ChunkRef {
                offset: read_u64(offset)?,
                length: read_u64(length)?,
            },
            checksum: u32::from_le_bytes(
                checksum
                    .try_into()
                    .map_err(|_| SchemaError::format("truncated checksum"))?,
            ),
        })
    }
}

fn read_u64(bytes: &[u8]) -> Result<u64> {
    bytes
        .try_into()
        .map(u64::from_le_bytes)
        .map_err(|_| SchemaError::format("truncated integer"))
}

/// Checksum stored in the Global Header.
pub fn checksum(bytes: &[u8]) -> u32 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(bytes);
    // Low 32 bits are enough to catch truncation and stray writes.
    (hasher.finish() & u64::from(u32::MAX)) as u32
}

/// Attributes attached to the root or to a dataset.
pub type Attributes = BTreeMap<String, String>;

/// Contents of the index chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerIndex {
    /// Root attributes (`classname`, `module`).
    pub attrs: Attributes,
    /// Datasets in write order.
    pub datasets: Vec<DatasetEntry>,
}

impl ContainerIndex {
    /// Entry named `name`.
    pub fn dataset(&self, name: &str) -> Option<&DatasetEntry> {
        self.datasets.iter().find(|d| d.name == name)
    }

    /// True if a dataset named `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.dataset(name).is_some()
    }
}

/// One named dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntry {
    /// Dataset name (the field name).
    pub name: String,
    /// Location of the dataset chunk.
    pub location: ChunkRef,
    /// `type` and, when declared, `desc`.
    pub attrs: Attributes,
}

/// Decoded payload of a dataset chunk: an array in `.npy` element layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetPayload {
    /// Element descriptor literal, e.g. `'<f8'` or a compound list.
    pub descr: String,
    /// Dimensions.
    pub shape: Vec<u64>,
    /// Raw element bytes.
    pub data: Vec<u8>,
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(SchemaError::serialization)
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map(|(obj, _)| obj)
        .map_err(SchemaError::serialization)
}
