#![cfg(feature = "container")]

mod common;

use common::{sample_def, sample_instance};
use schemata::{
    ArrayData, CompressionAlgorithm, ContainerInspector, DType, FieldDescriptor, FieldType,
    LoadOptions, Mode, NdArray, RecordArray, SaveOptions, SchemaDef, SchemaError, SchemaInstance,
    TextEncoding,
};
use std::sync::Arc;

#[test]
fn root_and_dataset_attributes() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("attrs.h5");
    sample_instance().save_with(&path, &SaveOptions::new().mode(Mode::Write))?;

    let report = ContainerInspector::inspect(&path)?;
    assert_eq!(report.attrs.get("classname").map(String::as_str), Some("Sample"));
    assert_eq!(report.attrs.get("module").map(String::as_str), Some("tests::common"));

    let names: Vec<&str> = report.datasets.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, ["v", "w", "x", "y", "z", "name"]);
    for dataset in &report.datasets {
        assert!(dataset.attrs.contains_key("type"), "{} has no type", dataset.name);
    }

    let kind = |name: &str| {
        report
            .dataset(name)
            .and_then(|d| d.attrs.get("type"))
            .cloned()
    };
    assert_eq!(kind("v").as_deref(), Some("recarray"));
    assert_eq!(kind("w").as_deref(), Some("float"));
    assert_eq!(kind("x").as_deref(), Some("ndarray"));
    assert_eq!(kind("name").as_deref(), Some("str"));

    let desc = |name: &str| report.dataset(name).and_then(|d| d.attrs.get("desc")).cloned();
    assert_eq!(desc("v").as_deref(), Some("a record array"));
    assert_eq!(desc("w").as_deref(), Some("a float"));
    assert_eq!(desc("x"), None);
    Ok(())
}

#[test]
fn only_arrays_are_chunked() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("chunks.h5");
    let options = SaveOptions::new()
        .compression(Some(CompressionAlgorithm::Gzip))
        .compression_level(Some(6));
    sample_instance().save_with(&path, &options)?;

    let report = ContainerInspector::inspect(&path)?;
    let x = report.dataset("x").expect("x");
    assert!(x.chunked);
    assert_eq!(x.compression, "gzip");
    assert_eq!(x.shape, vec![10]);
    assert_eq!(x.descr, "'<f8'");

    let w = report.dataset("w").expect("w");
    assert!(!w.chunked);
    assert_eq!(w.compression, "none");
    assert!(w.shape.is_empty());
    Ok(())
}

#[test]
fn compressed_round_trips() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let original = sample_instance();
    let cases = [
        (CompressionAlgorithm::Gzip, None),
        (CompressionAlgorithm::Gzip, Some(0)),
        (CompressionAlgorithm::Gzip, Some(9)),
        (CompressionAlgorithm::Lz4, None),
    ];
    for (i, (algorithm, level)) in cases.into_iter().enumerate() {
        let path = dir.path().join(format!("compressed_{i}.h5"));
        let options = SaveOptions::new()
            .compression(Some(algorithm))
            .compression_level(level);
        original.save_with(&path, &options)?;
        assert_eq!(SchemaInstance::load(sample_def(), &path)?, original);
    }
    Ok(())
}

#[test]
fn lz4_with_level_fails_before_creating_the_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("lz4.h5");
    let options = SaveOptions::new()
        .compression(Some(CompressionAlgorithm::Lz4))
        .compression_level(Some(1));

    let err = sample_instance()
        .save_with(&path, &options)
        .expect_err("lz4 takes no level");
    assert!(matches!(err, SchemaError::InvalidCompressionOptions(_)));
    assert!(!path.exists());
}

#[test]
fn gzip_level_out_of_range_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("gzip.h5");
    let options = SaveOptions::new()
        .compression(Some(CompressionAlgorithm::Gzip))
        .compression_level(Some(10));

    let err = sample_instance().save_with(&path, &options).expect_err("level 10");
    assert!(matches!(err, SchemaError::InvalidCompressionOptions(_)));
    assert!(!path.exists());
}

#[test]
fn level_without_algorithm_selects_gzip() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("level.h5");
    sample_instance().save_with(&path, &SaveOptions::new().compression_level(Some(6)))?;

    let report = ContainerInspector::inspect(&path)?;
    assert_eq!(report.dataset("x").map(|d| d.compression.as_str()), Some("gzip"));
    Ok(())
}

fn strings_def() -> Arc<SchemaDef> {
    SchemaDef::builder("Strings", "tests::container")
        .field(FieldDescriptor::new("z", FieldType::array_of(DType::Unicode)))
        .build()
}

#[test]
fn unicode_round_trip_in_each_encoding() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let cases = [
        (TextEncoding::Ascii, vec!["plain", "text", ""]),
        (TextEncoding::Latin1, vec!["café", "naïve", "über"]),
        (TextEncoding::Utf8, vec!["日本語", "Ωmega", "emoji 🚀"]),
    ];
    for (encoding, strings) in cases {
        let path = dir.path().join(format!("strings_{encoding}.h5"));
        let mut original = SchemaInstance::new(strings_def());
        original.set("z", NdArray::from_strings(strings.iter().copied()))?;

        original.save_with(&path, &SaveOptions::new().encoding(encoding))?;
        let loaded = SchemaInstance::load_with(
            strings_def(),
            &path,
            &LoadOptions::new().encoding(encoding),
        )?;
        assert_eq!(loaded, original, "{encoding}");
    }
    Ok(())
}

#[test]
fn ascii_rejects_non_ascii_text() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ascii.h5");
    let mut s = SchemaInstance::new(strings_def());
    s.set("z", NdArray::from_strings(["café"])).expect("z");

    let err = s
        .save_with(&path, &SaveOptions::new().encoding(TextEncoding::Ascii))
        .expect_err("not ascii");
    assert!(matches!(err, SchemaError::Encoding(_)));
}

#[test]
fn unicode_without_string_encoding_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("raw.h5");

    let err = sample_instance()
        .save_with(&path, &SaveOptions::new().encode_string_arrays(false))
        .expect_err("unicode needs encoding");
    assert!(matches!(err, SchemaError::Encoding(_)));
    assert!(!path.exists());
}

#[test]
fn byte_strings_stay_encoded_without_decoding() -> schemata::Result<()> {
    let def = SchemaDef::builder("Raw", "tests::container")
        .field(FieldDescriptor::new("z", FieldType::array()))
        .build();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bytes.h5");

    let mut s = SchemaInstance::new(Arc::clone(&def));
    s.set("z", NdArray::from_strings(["é", "ab"]))?;
    s.save(&path)?;

    let loaded = SchemaInstance::load_with(
        def,
        &path,
        &LoadOptions::new().decode_string_arrays(false),
    )?;
    let z = loaded.get("z").and_then(|v| v.as_array()).expect("z");
    assert_eq!(z.dtype(), DType::Bytes);
    assert_eq!(
        z.as_byte_strings(),
        Some(&["é".as_bytes().to_vec(), b"ab".to_vec()][..])
    );
    Ok(())
}

#[test]
fn byte_string_fields_stay_bytes() -> schemata::Result<()> {
    let def = SchemaDef::builder("Blobs", "tests::container")
        .field(FieldDescriptor::new("b", FieldType::array_of(DType::Bytes)))
        .field(FieldDescriptor::new("r", FieldType::Records))
        .build();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("blobs.h5");

    let mut s = SchemaInstance::new(Arc::clone(&def));
    s.set("b", NdArray::from_byte_strings([b"ab".to_vec(), b"cd".to_vec()]))?;
    s.set(
        "r",
        RecordArray::from_columns(vec![
            ("raw", ArrayData::Bytes(vec![b"\xff\x00x".to_vec(), b"y".to_vec()])),
            ("text", ArrayData::Unicode(vec!["é".into(), "z".into()])),
        ])?,
    )?;
    s.save(&path)?;

    let report = ContainerInspector::inspect(&path)?;
    let r = report.dataset("r").expect("r");
    assert_eq!(r.attrs.get("encoded").map(String::as_str), Some("utf-8"));
    assert_eq!(
        r.attrs.get("encoded_columns").map(String::as_str),
        Some(r#"["text"]"#)
    );
    assert!(!report.dataset("b").expect("b").attrs.contains_key("encoded"));

    assert_eq!(SchemaInstance::load(def, &path)?, s);
    Ok(())
}

#[test]
fn record_columns_are_capped_at_256_bytes() {
    let def = SchemaDef::builder("Wide", "tests::container")
        .field(FieldDescriptor::new("v", FieldType::Records))
        .build();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("wide.h5");

    let records = RecordArray::from_columns(vec![(
        "text",
        ArrayData::Unicode(vec!["x".repeat(257)]),
    )])
    .expect("records");
    let mut s = SchemaInstance::new(def);
    s.set("v", records).expect("v");

    let err = s.save(&path).expect_err("column too wide");
    assert!(matches!(err, SchemaError::Encoding(_)));
}

fn pair_def() -> Arc<SchemaDef> {
    SchemaDef::builder("Pair", "tests::container")
        .field(FieldDescriptor::new("a", FieldType::Float).optional())
        .field(FieldDescriptor::new("b", FieldType::array_of(DType::I64)).optional())
        .build()
}

#[test]
fn append_adds_datasets_to_an_existing_file() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("append.h5");

    let mut first = SchemaInstance::new(pair_def());
    first.set("a", 1.5)?;
    first.save(&path)?;

    let mut second = SchemaInstance::new(pair_def());
    second.set("b", NdArray::from_vec(vec![7i64, 8, 9]))?;
    second.save_with(&path, &SaveOptions::new().mode(Mode::Append))?;

    let loaded = SchemaInstance::load(pair_def(), &path)?;
    assert_eq!(loaded.get("a").and_then(|v| v.as_float()), Some(1.5));
    assert_eq!(
        loaded.get("b").and_then(|v| v.as_array()),
        Some(&NdArray::from_vec(vec![7i64, 8, 9]))
    );

    let err = first
        .save_with(&path, &SaveOptions::new().mode(Mode::Append))
        .expect_err("a already exists");
    assert!(matches!(err, SchemaError::DuplicateDataset(ref name) if name == "a"));
    Ok(())
}

#[test]
fn schemas_sharing_a_file_load_their_own_fields() -> schemata::Result<()> {
    let first_def = SchemaDef::builder("First", "tests::container")
        .field(FieldDescriptor::new("x", FieldType::array_of(DType::F64)))
        .build();
    let second_def = SchemaDef::builder("Second", "tests::container")
        .field(FieldDescriptor::new("y", FieldType::array_of(DType::I32)))
        .build();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("shared.h5");

    let mut first = SchemaInstance::new(Arc::clone(&first_def));
    first.set("x", NdArray::arange(3))?;
    first.save(&path)?;

    let mut second = SchemaInstance::new(Arc::clone(&second_def));
    second.set("y", NdArray::from_vec(vec![4i32, 5]))?;
    second.save_with(&path, &SaveOptions::new().mode(Mode::Append))?;

    assert_eq!(SchemaInstance::load(first_def, &path)?, first);
    assert_eq!(SchemaInstance::load(second_def, &path)?, second);
    Ok(())
}

#[test]
fn append_creates_a_missing_file() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("fresh.h5");

    let mut s = SchemaInstance::new(pair_def());
    s.set("a", 2.0)?;
    s.save_with(&path, &SaveOptions::new().mode(Mode::Append))?;

    assert_eq!(SchemaInstance::load(pair_def(), &path)?, s);
    Ok(())
}

#[test]
fn fields_missing_from_the_file_keep_their_defaults() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("partial.h5");
    let mut s = SchemaInstance::new(sample_def());
    s.unset("x")?;
    s.unset("y")?;
    s.unset("z")?;
    s.unset("name")?;
    s.unset("w")?;
    s.save(&path)?;

    let loaded = SchemaInstance::load(sample_def(), &path)?;
    assert_eq!(loaded, SchemaInstance::new(sample_def()));
    Ok(())
}

#[test]
fn corrupted_files_are_format_errors() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("corrupt.h5");
    sample_instance().save(&path)?;

    let mut bytes = std::fs::read(&path)?;
    let last = bytes.len() - 30;
    bytes[last] ^= 0xFF;
    std::fs::write(&path, &bytes)?;

    let err = SchemaInstance::load(sample_def(), &path).expect_err("checksum");
    assert!(matches!(err, SchemaError::Format(_)));

    std::fs::write(&path, b"short")?;
    let err = SchemaInstance::load(sample_def(), &path).expect_err("too small");
    assert!(matches!(err, SchemaError::Format(_)));
    Ok(())
}
