//! Pluggable compression backend for container datasets.
//!
//! Defines the [`Compressor`] trait, the [`CompressorRegistry`] that maps the
//! algorithm ID stored in each chunk's `MetaByte` to an implementation, and the
//! user-facing [`CompressionAlgorithm`]/[`CompressionSpec`] pair whose
//! validation runs before anything is written.

use crate::error::{Result, SchemaError};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Compression level used for gzip when none is given.
pub const DEFAULT_GZIP_LEVEL: u32 = 4;

/// Highest accepted gzip level.
pub const MAX_GZIP_LEVEL: u32 = 9;

/// Compression algorithms selectable for container datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionAlgorithm {
    /// Deflate (zlib stream); accepts a level of 0 to 9.
    Gzip,
    /// LZ4 block compression; takes no level.
    Lz4,
}

impl CompressionAlgorithm {
    /// Lower-case algorithm name.
    pub fn name(self) -> &'static str {
        match self {
            CompressionAlgorithm::Gzip => "gzip",
            CompressionAlgorithm::Lz4 => "lz4",
        }
    }

    /// Whether the algorithm takes a compression level.
    pub fn supports_level(self) -> bool {
        match self {
            CompressionAlgorithm::Gzip => true,
            CompressionAlgorithm::Lz4 => false,
        }
    }

    /// ID stored in the `MetaByte` of compressed chunks.
    pub fn id(self) -> u8 {
        match self {
            CompressionAlgorithm::Lz4 => 1,
            CompressionAlgorithm::Gzip => 2,
        }
    }
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CompressionAlgorithm {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gzip" | "deflate" | "zlib" => Ok(CompressionAlgorithm::Gzip),
            "lz4" => Ok(CompressionAlgorithm::Lz4),
            other => Err(SchemaError::InvalidCompressionOptions(format!(
                "unknown compression algorithm '{other}'"
            ))),
        }
    }
}

/// A validated algorithm and level pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionSpec {
    /// Selected algorithm.
    pub algorithm: CompressionAlgorithm,
    /// Level, when the algorithm takes one.
    pub level: Option<u32>,
}

impl CompressionSpec {
    /// Validates the requested combination.
    ///
    /// A level without an algorithm selects gzip. A level for an algorithm
    /// that takes none, or a gzip level above 9, fails with
    /// [`SchemaError::InvalidCompressionOptions`].
    pub fn new(algorithm: Option<CompressionAlgorithm>, level: Option<u32>) -> Result<Option<Self>> {
        let algorithm = match (algorithm, level) {
            (None, None) => return Ok(None),
            (None, Some(_)) => CompressionAlgorithm::Gzip,
            (Some(algorithm), _) => algorithm,
        };
        match level {
            Some(level) if !algorithm.supports_level() => {
                Err(SchemaError::InvalidCompressionOptions(format!(
                    "{algorithm} does not take a compression level (got {level})"
                )))
            }
            Some(level) if level > MAX_GZIP_LEVEL => {
                Err(SchemaError::InvalidCompressionOptions(format!(
                    "{algorithm} level must be between 0 and {MAX_GZIP_LEVEL}, got {level}"
                )))
            }
            _ => Ok(Some(Self { algorithm, level })),
        }
    }

    /// Compressor configured for this spec.
    pub fn compressor(&self) -> Result<Box<dyn Compressor>> {
        match self.algorithm {
            #[cfg(feature = "container")]
            CompressionAlgorithm::Lz4 => Ok(Box::new(Lz4Compressor)),
            #[cfg(feature = "container")]
            CompressionAlgorithm::Gzip => Ok(Box::new(GzipCompressor {
                level: self.level.unwrap_or(DEFAULT_GZIP_LEVEL),
            })),
            #[cfg(not(feature = "container"))]
            other => Err(SchemaError::MissingDependency(format!(
                "{other} compression needs the 'container' feature"
            ))),
        }
    }
}

/// Interface for compression algorithms.
///
/// Each compressor is identified by a unique ID stored in the chunk `MetaByte`
/// (bits 1-3). ID 0 is reserved for no compression.
pub trait Compressor: Send + Sync + fmt::Debug {
    /// The unique ID stored in the `MetaByte`.
    fn id(&self) -> u8;

    /// Compresses the data. May borrow the input when nothing is done.
    fn compress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>>;

    /// Decompresses the data.
    fn decompress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>>;
}

/// Pass-through compressor (ID 0).
#[derive(Debug, Clone, Copy)]
pub struct NoCompression;

impl Compressor for NoCompression {
    fn id(&self) -> u8 {
        0
    }

    fn compress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        Ok(Cow::Borrowed(data))
    }

    fn decompress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        Ok(Cow::Borrowed(data))
    }
}

/// LZ4 block compression with a prepended size (ID 1).
#[cfg(feature = "container")]
#[derive(Debug, Clone, Copy)]
pub struct Lz4Compressor;

#[cfg(feature = "container")]
impl Compressor for Lz4Compressor {
    fn id(&self) -> u8 {
        CompressionAlgorithm::Lz4.id()
    }

    fn compress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        Ok(Cow::Owned(lz4_flex::compress_prepend_size(data)))
    }

    fn decompress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        let vec = lz4_flex::decompress_size_prepended(data)
            .map_err(|e| SchemaError::Compression(e.to_string()))?;
        Ok(Cow::Owned(vec))
    }
}

/// Deflate compression in a zlib stream (ID 2).
#[cfg(feature = "container")]
#[derive(Debug, Clone, Copy)]
pub struct GzipCompressor {
    /// Level 0 (store) to 9 (best).
    pub level: u32,
}

#[cfg(feature = "container")]
impl Default for GzipCompressor {
    fn default() -> Self {
        Self {
            level: DEFAULT_GZIP_LEVEL,
        }
    }
}

#[cfg(feature = "container")]
impl Compressor for GzipCompressor {
    fn id(&self) -> u8 {
        CompressionAlgorithm::Gzip.id()
    }

    fn compress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        use std::io::Write;

        let mut encoder = flate2::write::ZlibEncoder::new(
            Vec::with_capacity(data.len() / 2),
            flate2::Compression::new(self.level),
        );
        encoder
            .write_all(data)
            .map_err(|e| SchemaError::Compression(e.to_string()))?;
        let compressed = encoder
            .finish()
            .map_err(|e| SchemaError::Compression(e.to_string()))?;
        Ok(Cow::Owned(compressed))
    }

    fn decompress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        use std::io::Read;

        let mut out = Vec::new();
        flate2::read::ZlibDecoder::new(data)
            .read_to_end(&mut out)
            .map_err(|e| SchemaError::Compression(e.to_string()))?;
        Ok(Cow::Owned(out))
    }
}

/// Maps algorithm IDs (stored in the file format) to compressors.
#[derive(Debug)]
pub struct CompressorRegistry {
    algorithms: Vec<Option<Box<dyn Compressor>>>,
}

impl CompressorRegistry {
    /// Registry with the built-in algorithms.
    ///
    /// *   ID 0: `NoCompression`
    /// *   ID 1: `Lz4Compressor` (with the `container` feature)
    /// *   ID 2: `GzipCompressor` (with the `container` feature)
    pub fn new() -> Self {
        let mut reg = Self {
            algorithms: (0..8).map(|_| None).collect(),
        };
        reg.register(Box::new(NoCompression));

        #[cfg(feature = "container")]
        {
            reg.register(Box::new(Lz4Compressor));
            reg.register(Box::new(GzipCompressor::default()));
        }

        reg
    }

    /// Registers a compressor in the slot of its ID, replacing any previous one.
    pub fn register(&mut self, algo: Box<dyn Compressor>) {
        let id = usize::from(algo.id());
        if id >= self.algorithms.len() {
            self.algorithms.resize_with(id + 1, || None);
        }
        if let Some(slot) = self.algorithms.get_mut(id) {
            *slot = Some(algo);
        }
    }

    /// Retrieves a compressor by its ID.
    ///
    /// # Errors
    /// Returns `SchemaError::Compression` if the ID is not registered.
    pub fn get(&self, id: u8) -> Result<&dyn Compressor> {
        if let Some(algo) = self
            .algorithms
            .get(usize::from(id))
            .and_then(|opt| opt.as_ref())
        {
            return Ok(algo.as_ref());
        }

        Err(SchemaError::Compression(format!(
            "Algorithm ID {id} is not registered or available"
        )))
    }

    /// Display name of an algorithm ID.
    pub fn name(id: u8) -> String {
        match id {
            0 => "none".to_string(),
            1 => CompressionAlgorithm::Lz4.name().to_string(),
            2 => CompressionAlgorithm::Gzip.name().to_string(),
            other => format!("unknown({other})"),
        }
    }
}

impl Default for CompressorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
