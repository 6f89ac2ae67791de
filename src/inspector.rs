//! Tools for inspecting the physical structure of container files.

use crate::compression::CompressorRegistry;
use crate::error::Result;
use crate::format::{Attributes, DatasetEntry};
use crate::reader::ContainerReader;
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// A structural report of a container file.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerReport {
    /// Total size of the file on disk.
    pub file_size: u64,
    /// Format version from the tail header.
    pub version: u16,
    /// Offset where the index chunk starts.
    pub index_offset: u64,
    /// Root attributes.
    pub attrs: Attributes,
    /// Datasets in write order.
    pub datasets: Vec<DatasetInfo>,
}

/// Metadata of one dataset.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    /// Dataset name.
    pub name: String,
    /// Element descriptor, e.g. `'<f8'`.
    pub descr: String,
    /// Dimensions.
    pub shape: Vec<usize>,
    /// Dataset attributes.
    pub attrs: Attributes,
    /// Compression algorithm name, `none` if uncompressed.
    pub compression: String,
    /// True for chunked datasets.
    pub chunked: bool,
    /// Byte offset of the chunk.
    pub offset: u64,
    /// Bytes on disk, meta-byte included.
    pub stored_size: u64,
    /// Bytes of element data after decompression.
    pub data_size: u64,
}

impl ContainerReport {
    /// Dataset named `name`.
    pub fn dataset(&self, name: &str) -> Option<&DatasetInfo> {
        self.datasets.iter().find(|d| d.name == name)
    }
}

/// The container inspector tool.
#[derive(Debug)]
pub struct ContainerInspector;

impl ContainerInspector {
    /// Analyzes a file and returns a structural report.
    pub fn inspect<P: AsRef<Path>>(path: P) -> Result<ContainerReport> {
        let reader = ContainerReader::open(path)?;
        let datasets = reader
            .datasets()
            .iter()
            .map(|entry| Self::inspect_dataset(&reader, entry))
            .collect::<Result<Vec<_>>>()?;

        Ok(ContainerReport {
            file_size: reader.file_size(),
            version: reader.header().version,
            index_offset: reader.header().index.offset,
            attrs: reader.attrs().clone(),
            datasets,
        })
    }

    fn inspect_dataset(reader: &ContainerReader, entry: &DatasetEntry) -> Result<DatasetInfo> {
        let chunk = reader.chunk(entry)?;
        let raw = reader.read_raw(entry)?;
        Ok(DatasetInfo {
            name: entry.name.clone(),
            descr: raw.descr.to_literal(),
            shape: raw.shape,
            attrs: entry.attrs.clone(),
            compression: CompressorRegistry::name(chunk.meta.compression_method()),
            chunked: chunk.meta.is_chunked(),
            offset: entry.location.offset,
            stored_size: entry.location.length,
            data_size: raw.data.len() as u64,
        })
    }
}

impl fmt::Display for ContainerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== CONTAINER REPORT ===")?;
        writeln!(f, "File Size:      {}b", self.file_size)?;
        writeln!(f, "Version:        {}", self.version)?;
        writeln!(f, "Index Offset:   {}", self.index_offset)?;
        for (key, value) in &self.attrs {
            writeln!(f, "@{key} = {value}")?;
        }
        writeln!(f, "\n[DATASETS]")?;
        for (i, dataset) in self.datasets.iter().enumerate() {
            let connector = if i + 1 == self.datasets.len() {
                "└── "
            } else {
                "├── "
            };
            writeln!(
                f,
                "{connector}{} {} {:?} | Stored: {}b | Algo: {}{}",
                dataset.name,
                dataset.descr,
                dataset.shape,
                dataset.stored_size,
                dataset.compression,
                if dataset.chunked { " | chunked" } else { "" }
            )?;
        }
        Ok(())
    }
}
