//! Format-agnostic save/load entry points.

use crate::codec::{CodecRegistry, LoadOptions, SaveOptions};
use crate::error::Result;
use crate::schema::{SchemaDef, SchemaInstance};
use crate::text;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

impl SchemaInstance {
    /// Saves to `path` with default options. The format follows the extension:
    /// `.npz`, `.h5` or `.json`.
    ///
    /// # Errors
    /// `UnsupportedFormat` for any other extension, before the file is touched.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.save_with(path, &SaveOptions::default())
    }

    /// Saves to `path` with explicit options.
    pub fn save_with<P: AsRef<Path>>(&self, path: P, options: &SaveOptions) -> Result<()> {
        let path = path.as_ref();
        let codec = CodecRegistry::global().resolve(path)?;
        debug!(
            path = %path.display(),
            format = %codec.format(),
            class = %self.classname(),
            "saving schema"
        );
        codec.encode(self, path, options)
    }

    /// Loads a new instance of `def` from `path` with default options.
    pub fn load<P: AsRef<Path>>(def: Arc<SchemaDef>, path: P) -> Result<Self> {
        Self::load_with(def, path, &LoadOptions::default())
    }

    /// Loads a new instance of `def` from `path` with explicit options.
    pub fn load_with<P: AsRef<Path>>(
        def: Arc<SchemaDef>,
        path: P,
        options: &LoadOptions,
    ) -> Result<Self> {
        let path = path.as_ref();
        let codec = CodecRegistry::global().resolve(path)?;
        debug!(
            path = %path.display(),
            format = %codec.format(),
            class = %def.classname(),
            "loading schema"
        );
        codec.decode(&def, path, options)
    }

    /// Serializes to a JSON string, pretty-printed when `indent` is given.
    pub fn to_json_string(&self, indent: Option<usize>) -> Result<String> {
        text::to_json_string(self, indent)
    }

    /// Parses a JSON string into a new instance of `def`.
    pub fn from_json_str(def: Arc<SchemaDef>, json: &str) -> Result<Self> {
        text::from_json_str(&def, json)
    }

    /// Parses JSON from an open reader into a new instance of `def`.
    pub fn from_json_reader<R: Read>(def: Arc<SchemaDef>, reader: R) -> Result<Self> {
        text::read_json(&def, reader)
    }
}
