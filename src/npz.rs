//! Numeric archive codec (`.npz`).
//!
//! An `.npz` file is a zip archive with one `<field>.npy` entry per present
//! field. The archive carries no per-field metadata: record arrays are stored
//! with their compound descriptor as-is and scalars as 0-d arrays, which the
//! typed setters turn back into scalars on load.

use crate::codec::{Codec, Format, LoadOptions, SaveOptions};
use crate::error::Result;
use crate::npy::{RawArray, read_npy, write_npy};
use crate::schema::{SchemaDef, SchemaInstance};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::trace;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Codec for the zip-of-npy numeric archive format.
#[derive(Debug, Clone, Copy, Default)]
pub struct NpzCodec;

impl Codec for NpzCodec {
    fn format(&self) -> Format {
        Format::Npz
    }

    fn encode(&self, instance: &SchemaInstance, path: &Path, options: &SaveOptions) -> Result<()> {
        // Lay out every array before the archive is created.
        let entries = instance
            .iter()
            .filter_map(|(field, value)| Some((field.name(), value?)))
            .map(|(name, value)| Ok((name, RawArray::from_value(value)?)))
            .collect::<Result<Vec<_>>>()?;

        let method = if options.compress {
            CompressionMethod::Deflated
        } else {
            CompressionMethod::Stored
        };
        let file_options = SimpleFileOptions::default().compression_method(method);

        let mut archive = ZipWriter::new(BufWriter::new(File::create(path)?));
        for (name, raw) in &entries {
            trace!(field = %name, bytes = raw.data.len(), "writing npz entry");
            archive.start_file(format!("{name}.npy"), file_options)?;
            write_npy(&mut archive, raw)?;
        }
        archive.finish()?.flush()?;
        Ok(())
    }

    fn decode(
        &self,
        def: &Arc<SchemaDef>,
        path: &Path,
        _options: &LoadOptions,
    ) -> Result<SchemaInstance> {
        let mut archive = ZipArchive::new(BufReader::new(File::open(path)?))?;
        let mut fields = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let name = entry
                .name()
                .strip_suffix(".npy")
                .unwrap_or(entry.name())
                .to_string();
            trace!(field = %name, "reading npz entry");
            let value = read_npy(&mut entry)?.into_value()?;
            fields.push((name, value));
        }
        SchemaInstance::with_fields(Arc::clone(def), fields)
    }
}
