//! Format dispatch.
//!
//! A [`CodecRegistry`] maps each [`Format`] to the [`Codec`] that encodes and
//! decodes it, and resolves a path to its codec through the file extension.
//! `save`/`load` never look at formats themselves; they only ask the registry.

use crate::compression::CompressionAlgorithm;
use crate::error::{Result, SchemaError};
use crate::npz::NpzCodec;
use crate::schema::{SchemaDef, SchemaInstance};
use crate::strings::TextEncoding;
use crate::text::JsonCodec;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

/// On-disk formats, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Zip archive of `.npy` arrays (`.npz`).
    Npz,
    /// Chunked binary container with attributes (`.h5`).
    Container,
    /// JSON text (`.json`).
    Json,
}

impl Format {
    /// Every format, in registry order.
    pub const ALL: [Format; 3] = [Format::Npz, Format::Container, Format::Json];

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Npz => "npz",
            Format::Container => "h5",
            Format::Json => "json",
        }
    }

    /// Format for an extension (without the dot, case-insensitive).
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "npz" => Ok(Format::Npz),
            "h5" | "hdf5" => Ok(Format::Container),
            "json" => Ok(Format::Json),
            _ => Err(SchemaError::UnsupportedFormat(ext.to_string())),
        }
    }

    /// Format of `path`, from its extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self::from_extension(ext)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// How the container file is opened on save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Create the file, truncating any existing one.
    #[default]
    Write,
    /// Add datasets to an existing file, creating it if missing.
    Append,
}

/// Options for saving. Every format reads only the options that apply to it.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOptions {
    /// Container open mode.
    pub mode: Mode,
    /// Container compression for array datasets.
    pub compression: Option<CompressionAlgorithm>,
    /// Container compression level, validated against `compression`.
    pub compression_level: Option<u32>,
    /// Deflate the entries of numeric archives.
    pub compress: bool,
    /// Re-encode unicode arrays to byte strings in containers.
    pub encode_string_arrays: bool,
    /// Encoding used when `encode_string_arrays` is set.
    pub encoding: TextEncoding,
    /// Pretty-print JSON with this many spaces of indentation.
    pub indent: Option<usize>,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Write,
            compression: None,
            compression_level: None,
            compress: false,
            encode_string_arrays: true,
            encoding: TextEncoding::Utf8,
            indent: None,
        }
    }
}

impl SaveOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Container open mode.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Container compression algorithm.
    pub fn compression(mut self, algorithm: Option<CompressionAlgorithm>) -> Self {
        self.compression = algorithm;
        self
    }

    /// Container compression level.
    pub fn compression_level(mut self, level: Option<u32>) -> Self {
        self.compression_level = level;
        self
    }

    /// Deflate numeric archive entries.
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Encode unicode arrays before writing containers.
    pub fn encode_string_arrays(mut self, encode: bool) -> Self {
        self.encode_string_arrays = encode;
        self
    }

    /// Text encoding for string arrays.
    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Pretty-print JSON with `indent` spaces.
    pub fn indent(mut self, indent: Option<usize>) -> Self {
        self.indent = indent;
        self
    }
}

/// Options for loading.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    /// Decode byte-string arrays read from containers back to unicode.
    pub decode_string_arrays: bool,
    /// Encoding used when `decode_string_arrays` is set.
    pub encoding: TextEncoding,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            decode_string_arrays: true,
            encoding: TextEncoding::Utf8,
        }
    }
}

impl LoadOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode byte-string arrays written from unicode.
    pub fn decode_string_arrays(mut self, decode: bool) -> Self {
        self.decode_string_arrays = decode;
        self
    }

    /// Text encoding for string arrays.
    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }
}

/// Encoder/decoder pair for one format.
pub trait Codec: Send + Sync + fmt::Debug {
    /// The format this codec handles.
    fn format(&self) -> Format;

    /// Writes every present field of `instance` to `path`.
    fn encode(&self, instance: &SchemaInstance, path: &Path, options: &SaveOptions) -> Result<()>;

    /// Reads `path` into a new instance of `def`.
    fn decode(
        &self,
        def: &Arc<SchemaDef>,
        path: &Path,
        options: &LoadOptions,
    ) -> Result<SchemaInstance>;
}

/// Stand-in for a codec whose backend was not compiled in.
#[derive(Debug, Clone, Copy)]
pub struct Unavailable {
    format: Format,
    dependency: &'static str,
}

impl Unavailable {
    /// Codec for `format` that reports `dependency` as missing.
    pub fn new(format: Format, dependency: &'static str) -> Self {
        Self { format, dependency }
    }

    fn error(&self) -> SchemaError {
        SchemaError::MissingDependency(format!(
            "the '.{}' format needs the '{}' feature",
            self.format.extension(),
            self.dependency
        ))
    }
}

impl Codec for Unavailable {
    fn format(&self) -> Format {
        self.format
    }

    fn encode(&self, _: &SchemaInstance, _: &Path, _: &SaveOptions) -> Result<()> {
        Err(self.error())
    }

    fn decode(&self, _: &Arc<SchemaDef>, _: &Path, _: &LoadOptions) -> Result<SchemaInstance> {
        Err(self.error())
    }
}

/// Storage backends compiled into this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// The chunked container backend (`.h5`) is available.
    pub container: bool,
}

/// Backends available in this process, determined once.
pub fn capabilities() -> Capabilities {
    static CAPABILITIES: OnceLock<Capabilities> = OnceLock::new();
    *CAPABILITIES.get_or_init(|| Capabilities {
        container: cfg!(feature = "container"),
    })
}

/// Maps formats to codecs.
#[derive(Debug)]
pub struct CodecRegistry {
    codecs: Vec<Box<dyn Codec>>,
}

impl CodecRegistry {
    /// Registry with every built-in codec. The container slot holds
    /// [`Unavailable`] when its backend is not compiled in.
    pub fn new() -> Self {
        let mut registry = Self { codecs: Vec::new() };
        registry.register(Box::new(NpzCodec));
        if capabilities().container {
            registry.register(container_codec());
        } else {
            registry.register(Box::new(Unavailable::new(Format::Container, "container")));
        }
        registry.register(Box::new(JsonCodec));
        registry
    }

    /// The process-wide registry used by `save`/`load`.
    pub fn global() -> &'static CodecRegistry {
        static REGISTRY: OnceLock<CodecRegistry> = OnceLock::new();
        REGISTRY.get_or_init(CodecRegistry::new)
    }

    /// Registers a codec, replacing any codec for the same format.
    pub fn register(&mut self, codec: Box<dyn Codec>) {
        let format = codec.format();
        match self.codecs.iter_mut().find(|c| c.format() == format) {
            Some(slot) => *slot = codec,
            None => self.codecs.push(codec),
        }
    }

    /// Codec for `format`.
    pub fn get(&self, format: Format) -> Result<&dyn Codec> {
        self.codecs
            .iter()
            .find(|c| c.format() == format)
            .map(|c| c.as_ref())
            .ok_or_else(|| SchemaError::UnsupportedFormat(format.extension().to_string()))
    }

    /// Codec for `path`, chosen by its extension.
    pub fn resolve<P: AsRef<Path>>(&self, path: P) -> Result<&dyn Codec> {
        self.get(Format::from_path(path)?)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "container")]
fn container_codec() -> Box<dyn Codec> {
    Box::new(crate::container::ContainerCodec)
}

#[cfg(not(feature = "container"))]
fn container_codec() -> Box<dyn Codec> {
    Box::new(Unavailable::new(Format::Container, "container"))
}
