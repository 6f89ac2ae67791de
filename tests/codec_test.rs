mod common;

use schemata::{
    CodecRegistry, CompressionAlgorithm, CompressionSpec, Format, SchemaError, TextEncoding,
};

#[test]
fn extensions_map_to_formats() {
    assert_eq!(Format::from_path("a/b/data.npz").ok(), Some(Format::Npz));
    assert_eq!(Format::from_path("data.H5").ok(), Some(Format::Container));
    assert_eq!(Format::from_path("data.json").ok(), Some(Format::Json));
    assert!(matches!(
        Format::from_path("data"),
        Err(SchemaError::UnsupportedFormat(ref ext)) if ext.is_empty()
    ));
}

#[test]
fn registry_has_a_codec_per_format() -> schemata::Result<()> {
    let registry = CodecRegistry::global();
    for format in Format::ALL {
        assert_eq!(registry.get(format)?.format(), format);
    }
    assert_eq!(registry.resolve("x.json")?.format(), Format::Json);
    Ok(())
}

#[test]
fn capabilities_match_the_build() {
    assert_eq!(schemata::capabilities().container, cfg!(feature = "container"));
}

#[test]
#[cfg(not(feature = "container"))]
fn container_without_backend_is_a_missing_dependency() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sample.h5");
    let err = common::sample_instance().save(&path).expect_err("no backend");
    assert!(matches!(err, SchemaError::MissingDependency(_)));
    assert!(!path.exists());
}

#[test]
fn compression_specs() {
    assert_eq!(CompressionSpec::new(None, None).ok(), Some(None));
    assert_eq!(
        CompressionSpec::new(None, Some(3)).ok().flatten().map(|s| s.algorithm),
        Some(CompressionAlgorithm::Gzip)
    );
    assert!(CompressionSpec::new(Some(CompressionAlgorithm::Lz4), None).is_ok());
    assert!(matches!(
        CompressionSpec::new(Some(CompressionAlgorithm::Lz4), Some(0)),
        Err(SchemaError::InvalidCompressionOptions(_))
    ));
    assert!(matches!(
        CompressionSpec::new(Some(CompressionAlgorithm::Gzip), Some(10)),
        Err(SchemaError::InvalidCompressionOptions(_))
    ));
    assert_eq!("LZ4".parse::<CompressionAlgorithm>().ok(), Some(CompressionAlgorithm::Lz4));
    assert!("zstd".parse::<CompressionAlgorithm>().is_err());
}

#[test]
fn text_encodings() -> schemata::Result<()> {
    assert_eq!("latin-1".parse::<TextEncoding>()?, TextEncoding::Latin1);
    assert_eq!(TextEncoding::Latin1.encode("é")?, vec![0xE9]);
    assert_eq!(TextEncoding::Latin1.decode(&[0xE9])?, "é");
    assert!(matches!(TextEncoding::Latin1.encode("€"), Err(SchemaError::Encoding(_))));
    assert!(matches!(TextEncoding::Ascii.decode(&[0xE9]), Err(SchemaError::Encoding(_))));
    assert!(matches!(TextEncoding::Utf8.decode(&[0xFF]), Err(SchemaError::Encoding(_))));
    Ok(())
}
