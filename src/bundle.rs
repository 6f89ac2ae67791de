//! Bundles: several schema objects packed into one archive.
//!
//! A bundle is a zip archive with one saved schema file per entry and an
//! `index.json` describing how to rebuild each one:
//!
//! ```json
//! {"schema": {"a": {"filename": "…", "classname": "A", "module": "my_crate"}}, "bundle_version": 1}
//! ```
//!
//! Loading resolves every entry's class through an explicit
//! [`SchemaRegistry`] keyed by module and class name.

use crate::codec::{Format, SaveOptions};
use crate::error::{Result, SchemaError};
use crate::schema::{self, Schema, SchemaDef, SchemaInstance};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::hash::Hasher;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, trace, warn};
use twox_hash::XxHash64;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Version written to every bundle index.
pub const BUNDLE_VERSION: u32 = 1;

/// Key under which [`Bundle::keys`] lists the index metadata.
pub const META_KEY: &str = "__meta__";

/// Name of the index document inside the archive.
pub const INDEX_FILE: &str = "index.json";

const SCHEMA_KEY: &str = "schema";

/// Archive types a bundle can be written as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// A `.zip` archive.
    Zip,
}

impl ArchiveFormat {
    /// Archive type of `path`, from its extension.
    ///
    /// # Errors
    /// `UnsupportedArchiveFormat` for anything but `.zip`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("zip") => Ok(ArchiveFormat::Zip),
            _ => Err(SchemaError::UnsupportedArchiveFormat(
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            )),
        }
    }
}

/// Bundle writing options.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleOptions {
    /// Format each entry is saved in.
    pub format: Format,
    /// Options passed to every entry's save.
    pub save: SaveOptions,
    /// Deflate archive members.
    pub compress: bool,
}

impl Default for BundleOptions {
    fn default() -> Self {
        Self {
            format: Format::Npz,
            save: SaveOptions::default(),
            compress: true,
        }
    }
}

impl BundleOptions {
    /// Default options: numeric archive entries, deflated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Format each entry is saved in.
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Options passed to every entry's save.
    pub fn save_options(mut self, save: SaveOptions) -> Self {
        self.save = save;
        self
    }

    /// Deflate archive members.
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

/// One index row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleEntry {
    /// File name inside the archive.
    pub filename: String,
    /// Class name of the saved schema.
    pub classname: String,
    /// Module path of the saved schema.
    pub module: String,
}

/// The `index.json` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleIndex {
    /// Entries by bundle key.
    pub schema: BTreeMap<String, BundleEntry>,
    /// Layout version of the bundle.
    pub bundle_version: u32,
}

impl Default for BundleIndex {
    fn default() -> Self {
        Self {
            schema: BTreeMap::new(),
            bundle_version: BUNDLE_VERSION,
        }
    }
}

/// Schema types loadable from bundles, keyed by module and class name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    defs: HashMap<String, Arc<SchemaDef>>,
}

impl SchemaRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition, replacing one with the same type tag.
    pub fn register_def(&mut self, def: Arc<SchemaDef>) -> &mut Self {
        self.defs.insert(def.type_tag(), def);
        self
    }

    /// Registers a typed schema.
    pub fn register<T: Schema>(&mut self) -> &mut Self {
        self.register_def(T::definition())
    }

    /// Definition registered for `module` and `classname`.
    ///
    /// # Errors
    /// `UnknownSchemaType` if nothing was registered under that tag.
    pub fn get(&self, module: &str, classname: &str) -> Result<&Arc<SchemaDef>> {
        self.defs
            .get(&schema::type_tag(module, classname))
            .ok_or_else(|| SchemaError::UnknownSchemaType {
                module: module.to_string(),
                classname: classname.to_string(),
            })
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

/// A loaded bundle: reconstructed entries plus the index metadata.
#[derive(Debug, Clone)]
pub struct Bundle {
    entries: BTreeMap<String, SchemaInstance>,
    meta: Map<String, Json>,
}

impl Bundle {
    /// Loaded instance stored under `key`.
    pub fn get(&self, key: &str) -> Option<&SchemaInstance> {
        self.entries.get(key)
    }

    /// Entry keys followed by [`META_KEY`].
    pub fn keys(&self) -> Vec<&str> {
        self.entries
            .keys()
            .map(String::as_str)
            .chain(std::iter::once(META_KEY))
            .collect()
    }

    /// Index fields other than the schema table, e.g. `bundle_version`.
    pub fn meta(&self) -> &Map<String, Json> {
        &self.meta
    }

    /// Bundle format version recorded in the index.
    pub fn version(&self) -> Option<u64> {
        self.meta.get("bundle_version").and_then(Json::as_u64)
    }

    /// Number of schema entries, not counting metadata.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the bundle holds no schema entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes `key` and converts it to a typed schema.
    pub fn take_as<T: Schema>(&mut self, key: &str) -> Result<Option<T>> {
        self.entries.remove(key).map(T::from_instance).transpose()
    }

    /// Consumes the bundle, keeping only the schema entries.
    pub fn into_entries(self) -> BTreeMap<String, SchemaInstance> {
        self.entries
    }
}

/// Archive member name of an entry: hex xxHash64 of the key plus the format
/// extension.
pub fn entry_filename(key: &str, format: Format) -> String {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(key.as_bytes());
    format!("{:016x}.{}", hasher.finish(), format.extension())
}

/// Saves every instance of `schemas` into the zip archive `outfile`.
///
/// Entries are written into a private scratch directory that is removed on
/// every exit path. The archive is staged next to `outfile` and moved into
/// place once complete.
pub fn bundle_schema<P: AsRef<Path>>(
    outfile: P,
    schemas: &BTreeMap<String, SchemaInstance>,
    options: &BundleOptions,
) -> Result<()> {
    let outfile = outfile.as_ref();
    ArchiveFormat::from_path(outfile)?;

    let scratch = tempfile::tempdir()?;
    let mut index = BundleIndex::default();
    for (key, instance) in schemas {
        let filename = entry_filename(key, options.format);
        trace!(key = %key, file = %filename, "bundling entry");
        instance.save_with(scratch.path().join(&filename), &options.save)?;
        let def = instance.definition();
        index.schema.insert(
            key.clone(),
            BundleEntry {
                filename,
                classname: def.classname().to_string(),
                module: def.module().to_string(),
            },
        );
    }

    {
        let mut writer = BufWriter::new(File::create(scratch.path().join(INDEX_FILE))?);
        serde_json::to_writer_pretty(&mut writer, &index)?;
        writer.flush()?;
    }

    let method = if options.compress {
        CompressionMethod::Deflated
    } else {
        CompressionMethod::Stored
    };
    let file_options = SimpleFileOptions::default().compression_method(method);

    let parent = match outfile.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(parent)?;
    {
        let mut archive = ZipWriter::new(staged.as_file_mut());
        let members = std::iter::once(INDEX_FILE)
            .chain(index.schema.values().map(|e| e.filename.as_str()));
        for name in members {
            archive.start_file(name, file_options)?;
            let mut source = BufReader::new(File::open(scratch.path().join(name))?);
            std::io::copy(&mut source, &mut archive)?;
        }
        archive.finish()?;
    }
    staged
        .persist(outfile)
        .map_err(|e| SchemaError::from(e.error))?;

    debug!(
        path = %outfile.display(),
        entries = index.schema.len(),
        "bundle written"
    );
    Ok(())
}

/// Loads a bundle written by [`bundle_schema`].
///
/// Every entry's class must be registered in `registry`.
pub fn load_bundle<P: AsRef<Path>>(path: P, registry: &SchemaRegistry) -> Result<Bundle> {
    let path = path.as_ref();
    ArchiveFormat::from_path(path)?;

    let scratch = tempfile::tempdir()?;
    let mut archive = ZipArchive::new(BufReader::new(File::open(path)?))?;
    archive.extract(scratch.path())?;

    let index_file = BufReader::new(File::open(scratch.path().join(INDEX_FILE))?);
    let mut meta: Map<String, Json> = serde_json::from_reader(index_file)?;
    let table = meta
        .remove(SCHEMA_KEY)
        .ok_or_else(|| SchemaError::format("bundle index has no 'schema' table"))?;
    let table: BTreeMap<String, BundleEntry> = serde_json::from_value(table)?;

    if let Some(version) = meta.get("bundle_version").and_then(Json::as_u64)
        && version > u64::from(BUNDLE_VERSION)
    {
        warn!(version, supported = BUNDLE_VERSION, "bundle written by a newer version");
    }

    let mut entries = BTreeMap::new();
    for (key, entry) in table {
        if Path::new(&entry.filename).file_name().and_then(|n| n.to_str())
            != Some(entry.filename.as_str())
        {
            return Err(SchemaError::format(format!(
                "bundle entry '{key}' has an invalid file name '{}'",
                entry.filename
            )));
        }
        let def = registry.get(&entry.module, &entry.classname)?;
        trace!(key = %key, file = %entry.filename, "loading bundle entry");
        let instance = SchemaInstance::load(Arc::clone(def), scratch.path().join(&entry.filename))?;
        entries.insert(key, instance);
    }

    debug!(path = %path.display(), entries = entries.len(), "bundle loaded");
    Ok(Bundle { entries, meta })
}
