mod common;

use common::{sample_def, sample_instance, text_def, text_instance};
use schemata::{Format, SaveOptions, SchemaError, SchemaInstance};

#[test]
fn npz_round_trip() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("sample.npz");
    let original = sample_instance();

    original.save(&path)?;
    let loaded = SchemaInstance::load(sample_def(), &path)?;

    assert_eq!(loaded, original);
    Ok(())
}

#[test]
fn npz_compressed_round_trip() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("sample.npz");
    let original = sample_instance();

    original.save_with(&path, &SaveOptions::new().compress(true))?;
    let loaded = SchemaInstance::load(sample_def(), &path)?;

    assert_eq!(loaded, original);
    Ok(())
}

#[test]
#[cfg(feature = "container")]
fn container_round_trip() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("sample.h5");
    let original = sample_instance();

    original.save(&path)?;
    let loaded = SchemaInstance::load(sample_def(), &path)?;

    assert_eq!(loaded, original);
    Ok(())
}

#[test]
fn json_round_trip() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("sample.json");
    let original = text_instance();

    original.save(&path)?;
    let loaded = SchemaInstance::load(text_def(), &path)?;

    assert_eq!(loaded, original);
    Ok(())
}

#[test]
fn absent_fields_round_trip_as_absent() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let original = sample_instance();
    assert!(!original.is_set("u"));

    let mut formats = vec![Format::Npz];
    if schemata::capabilities().container {
        formats.push(Format::Container);
    }
    for format in formats {
        let path = dir.path().join(format!("absent.{}", format.extension()));
        original.save(&path)?;
        let loaded = SchemaInstance::load(sample_def(), &path)?;
        assert!(!loaded.is_set("u"), "u came back from {format}");
    }
    Ok(())
}

#[test]
fn absent_field_is_not_an_npz_entry() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("absent.npz");
    sample_instance().save(&path)?;

    let archive = zip::ZipArchive::new(std::fs::File::open(&path)?)?;
    let mut names: Vec<&str> = archive.file_names().collect();
    names.sort_unstable();
    assert_eq!(
        names,
        ["name.npy", "v.npy", "w.npy", "x.npy", "y.npy", "z.npy"]
    );
    Ok(())
}

#[test]
fn saving_twice_is_idempotent() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let original = sample_instance();

    let mut extensions = vec!["npz"];
    if schemata::capabilities().container {
        extensions.push("h5");
    }
    for ext in extensions {
        let path = dir.path().join(format!("twice.{ext}"));
        original.save(&path)?;
        let first = SchemaInstance::load(sample_def(), &path)?;
        original.save(&path)?;
        let second = SchemaInstance::load(sample_def(), &path)?;
        assert_eq!(first, second);
        assert_eq!(second, original);
    }
    Ok(())
}

#[test]
fn unknown_extension_is_rejected_before_writing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sample.csv");

    let err = sample_instance().save(&path).expect_err("csv is not a format");
    assert!(matches!(err, SchemaError::UnsupportedFormat(ref ext) if ext == "csv"));
    assert!(!path.exists());

    let err = SchemaInstance::load(sample_def(), &path).expect_err("csv is not a format");
    assert!(matches!(err, SchemaError::UnsupportedFormat(_)));
}

#[test]
fn loaded_values_keep_their_dtypes() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("dtypes.npz");
    sample_instance().save(&path)?;

    let loaded = SchemaInstance::load(sample_def(), &path)?;
    let y = loaded.get("y").and_then(|v| v.as_array()).expect("y");
    assert_eq!(y.dtype(), schemata::DType::I32);
    assert_eq!(y.as_slice::<i32>(), Some(&[1, -2, 3, -4][..]));
    assert_eq!(loaded.get("w").and_then(|v| v.as_float()), Some(3.25));
    assert_eq!(loaded.get("name").and_then(|v| v.as_str()), Some("sample"));
    Ok(())
}
