//! # Schemata
//!
//! Declarative typed schemas with round-trip serialization to numeric
//! archives (`.npz`), structured containers (`.h5`) and JSON text (`.json`),
//! plus bundles that pack several schema objects into one zip archive.
//!
//! ## Overview
//!
//! A schema type is an explicit table of field descriptors ([`SchemaDef`]):
//! each field has a name, a semantic type (float, string, typed n-d array or
//! record array), an optional description and a default. A [`SchemaInstance`]
//! owns the values of one object and routes every assignment through the
//! field's typed setter, so a value read back from disk is validated and
//! coerced exactly like one assigned by hand.
//!
//! Saving and loading are format-agnostic: the [`CodecRegistry`] picks the
//! codec from the file extension.
//!
//! | Extension | Codec | Notes |
//! |-----------|-------|-------|
//! | `.npz`  | [`npz::NpzCodec`] | zip of `.npy` arrays, optional deflate |
//! | `.h5`   | `container::ContainerCodec` | chunked container with attributes and compression |
//! | `.json` | [`text::JsonCodec`] | nested lists, no record arrays |
//!
//! ## Typed structs
//!
//! ```rust
//! use schemata::{NdArray, Schema};
//!
//! #[derive(Debug, Clone, PartialEq, Schema)]
//! struct Trace {
//!     #[schema(dtype = "float64")]
//!     x: NdArray,
//!     name: String,
//! }
//!
//! # fn main() -> schemata::Result<()> {
//! let dir = tempfile::tempdir()?;
//! let trace = Trace { x: NdArray::arange(10), name: "whatever".into() };
//!
//! let path = dir.path().join("trace.json");
//! trace.save(&path)?;
//! assert_eq!(Trace::load(&path)?, trace);
//! # Ok(())
//! # }
//! ```
//!
//! ## Container layout
//!
//! ```text
//! [Dataset Chunk] ... [Dataset Chunk] [Index Chunk] [Global Header]
//! ```
//!
//! Each chunk is `[Payload][MetaByte]`; the index carries the `classname` and
//! `module` root attributes and each dataset's `type`/`desc` attributes. The
//! backend sits behind the default `container` feature; without it `.h5`
//! paths fail with [`SchemaError::MissingDependency`].
//!
//! ### Safety and Error Handling
//!
//! * **Encapsulated Unsafe:** the only `unsafe` is the read-only memory map
//!   in the container reader.
//! * **No Panics:** no `unwrap()` or `panic!()` in the library (enforced by
//!   clippy lints).
//! * **Validate First:** extension, compression options, unknown fields and
//!   record arrays bound for JSON are all rejected before a file is created.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

extern crate self as schemata;

// --- PUBLIC API MODULES ---
pub mod api;
pub mod array;
pub mod bundle;
pub mod codec;
pub mod compression;
pub mod dtype;
pub mod error;
pub mod field;
pub mod npy;
pub mod npz;
pub mod schema;
pub mod strings;
pub mod text;
pub mod value;

// --- CONTAINER BACKEND ---
#[cfg(feature = "container")]
pub mod container;
#[cfg(feature = "container")]
pub mod format;
#[cfg(feature = "container")]
pub mod inspector;
#[cfg(feature = "container")]
#[doc(hidden)]
pub mod io;
#[cfg(feature = "container")]
pub mod reader;

#[cfg(feature = "ndarray")]
pub mod ndarray_ext;

// --- RE-EXPORTS ---

pub use array::{ArrayData, NdArray, RecordArray};
pub use bundle::{
    BUNDLE_VERSION, Bundle, BundleOptions, META_KEY, SchemaRegistry, bundle_schema, load_bundle,
};
pub use codec::{
    Capabilities, Codec, CodecRegistry, Format, LoadOptions, Mode, SaveOptions, capabilities,
};
pub use compression::{CompressionAlgorithm, CompressionSpec};
pub use dtype::{DType, Element};
pub use error::{Result, SchemaError};
pub use field::{ArraySpec, FieldDescriptor, FieldType};
pub use schema::{FieldValue, Schema, SchemaDef, SchemaInstance};
pub use strings::TextEncoding;
pub use value::Value;

#[cfg(feature = "container")]
pub use container::ContainerCodec;
#[cfg(feature = "container")]
pub use inspector::{ContainerInspector, ContainerReport, DatasetInfo};

// Re-export the derive macro so it is accessible as `schemata::Schema`
pub use schemata_derive::Schema;
