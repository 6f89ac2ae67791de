//! The read side of the container format.
//!
//! Memory-maps the file, validates the tail header and the index checksum, and
//! gives random access to datasets by name.

use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

use crate::compression::CompressorRegistry;
use crate::error::{Result, SchemaError};
use crate::format::{
    self, Attributes, ChunkRef, ContainerIndex, DatasetEntry, DatasetPayload, GLOBAL_HEADER_SIZE,
    GlobalHeader, MetaByte,
};
use crate::npy::{Descr, RawArray};

/// An open container file.
#[derive(Debug)]
pub struct ContainerReader {
    mmap: Mmap,
    header: GlobalHeader,
    index: ContainerIndex,
    registry: CompressorRegistry,
}

/// A view of one chunk: raw payload bytes and its meta-byte.
#[derive(Debug, Clone, Copy)]
pub struct ChunkView<'a> {
    /// Where the chunk sits in the file.
    pub location: ChunkRef,
    /// Chunk flags.
    pub meta: MetaByte,
    /// Chunk bytes without the meta-byte.
    pub payload: &'a [u8],
}

impl ContainerReader {
    /// Opens a container file and validates its integrity.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < GLOBAL_HEADER_SIZE as u64 {
            return Err(SchemaError::format("file smaller than the container header"));
        }

        // The map is read-only and lives as long as the reader. Concurrent
        // external modification of the file is not supported.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };

        let header_start = mmap.len() - GLOBAL_HEADER_SIZE;
        let header = GlobalHeader::from_bytes(&mmap[header_start..])?;

        let index_chunk = chunk_at(&mmap, header.index)?;
        let raw_index = mmap
            .get(slice_range(header.index)?)
            .ok_or_else(|| SchemaError::format("index chunk out of file bounds"))?;
        if format::checksum(raw_index) != header.checksum {
            return Err(SchemaError::format("index checksum mismatch"));
        }
        let index: ContainerIndex = format::decode(index_chunk.payload)?;

        Ok(Self {
            mmap,
            header,
            index,
            registry: CompressorRegistry::new(),
        })
    }

    /// Tail header.
    pub fn header(&self) -> &GlobalHeader {
        &self.header
    }

    /// Decoded index.
    pub fn index(&self) -> &ContainerIndex {
        &self.index
    }

    /// Root attributes.
    pub fn attrs(&self) -> &Attributes {
        &self.index.attrs
    }

    /// Size of the mapped file.
    pub fn file_size(&self) -> u64 {
        self.mmap.len() as u64
    }

    /// Every dataset, in write order.
    pub fn datasets(&self) -> &[DatasetEntry] {
        &self.index.datasets
    }

    /// Entry named `name`.
    pub fn dataset(&self, name: &str) -> Option<&DatasetEntry> {
        self.index.dataset(name)
    }

    /// Raw chunk of a dataset, still compressed.
    pub fn chunk(&self, entry: &DatasetEntry) -> Result<ChunkView<'_>> {
        chunk_at(&self.mmap, entry.location)
    }

    /// Decompresses and decodes a dataset.
    pub fn read_raw(&self, entry: &DatasetEntry) -> Result<RawArray> {
        let chunk = self.chunk(entry)?;
        let compressor = self.registry.get(chunk.meta.compression_method())?;
        let bytes = compressor.decompress(chunk.payload)?;
        let payload: DatasetPayload = format::decode(&bytes)?;

        let shape = payload
            .shape
            .iter()
            .map(|&d| {
                usize::try_from(d).map_err(|_| SchemaError::format("dimension overflows usize"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RawArray {
            descr: Descr::from_literal(&payload.descr)?,
            shape,
            data: payload.data,
        })
    }
}

fn slice_range(location: ChunkRef) -> Result<std::ops::Range<usize>> {
    let start = usize::try_from(location.offset)
        .map_err(|_| SchemaError::format("chunk offset overflows usize"))?;
    let end = usize::try_from(location.end()?)
        .map_err(|_| SchemaError::format("chunk end overflows usize"))?;
    Ok(start..end)
}

fn chunk_at(mmap: &Mmap, location: ChunkRef) -> Result<ChunkView<'_>> {
    let bytes = mmap
        .get(slice_range(location)?)
        .ok_or_else(|| SchemaError::format("chunk out of file bounds"))?;
    let (&meta, payload) = bytes
        .split_last()
        .ok_or_else(|| SchemaError::format("empty chunk"))?;
    Ok(ChunkView {
        location,
        meta: MetaByte::from_byte(meta),
        payload,
    })
}
