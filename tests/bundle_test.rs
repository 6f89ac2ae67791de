mod common;

use common::{sample_def, sample_instance};
use schemata::bundle::{ArchiveFormat, INDEX_FILE, entry_filename};
use schemata::{
    BUNDLE_VERSION, BundleOptions, FieldDescriptor, FieldType, Format, META_KEY, NdArray,
    SchemaDef, SchemaError, SchemaInstance, SchemaRegistry, bundle_schema, load_bundle,
};
use std::collections::BTreeMap;
use std::sync::Arc;

fn other_def() -> Arc<SchemaDef> {
    SchemaDef::builder("Other", "tests::bundle")
        .field(FieldDescriptor::new("values", FieldType::array()))
        .field(FieldDescriptor::new("label", FieldType::Str))
        .build()
}

fn other_instance() -> SchemaInstance {
    let mut s = SchemaInstance::new(other_def());
    s.set("values", NdArray::from_vec(vec![1u8, 2, 3])).expect("values");
    s.set("label", "second").expect("label");
    s
}

fn registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry.register_def(sample_def()).register_def(other_def());
    registry
}

fn entries() -> BTreeMap<String, SchemaInstance> {
    BTreeMap::from([
        ("a".to_string(), sample_instance()),
        ("b".to_string(), other_instance()),
    ])
}

#[test]
fn bundle_round_trip() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bundle.zip");

    bundle_schema(&path, &entries(), &BundleOptions::default())?;
    let bundle = load_bundle(&path, &registry())?;

    assert_eq!(bundle.keys(), ["a", "b", META_KEY]);
    assert_eq!(bundle.meta()["bundle_version"], serde_json::json!(1));
    assert_eq!(bundle.version(), Some(u64::from(BUNDLE_VERSION)));
    assert_eq!(bundle.get("a"), Some(&sample_instance()));
    assert_eq!(bundle.get("b"), Some(&other_instance()));
    Ok(())
}

#[test]
fn bundle_entries_in_every_format() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut formats = vec![Format::Npz];
    if schemata::capabilities().container {
        formats.push(Format::Container);
    }
    for format in formats {
        let path = dir.path().join(format!("bundle_{format}.zip"));
        bundle_schema(&path, &entries(), &BundleOptions::new().format(format))?;
        let bundle = load_bundle(&path, &registry())?;
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.get("b"), Some(&other_instance()));
    }
    Ok(())
}

#[test]
fn archive_holds_the_index_and_hashed_entries() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("layout.zip");
    bundle_schema(&path, &entries(), &BundleOptions::default())?;

    let mut archive = zip::ZipArchive::new(std::fs::File::open(&path)?)?;
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    let mut expected = vec![
        INDEX_FILE.to_string(),
        entry_filename("a", Format::Npz),
        entry_filename("b", Format::Npz),
    ];
    expected.sort();
    assert_eq!(names, expected);

    let index: serde_json::Value = serde_json::from_reader(archive.by_name(INDEX_FILE)?)?;
    assert_eq!(index["bundle_version"], serde_json::json!(1));
    assert_eq!(index["schema"]["a"]["classname"], serde_json::json!("Sample"));
    assert_eq!(index["schema"]["a"]["module"], serde_json::json!("tests::common"));
    assert_eq!(
        index["schema"]["b"]["filename"],
        serde_json::json!(entry_filename("b", Format::Npz))
    );
    Ok(())
}

#[test]
fn entry_names_are_stable_hashes() {
    let name = entry_filename("a", Format::Npz);
    assert_eq!(name, entry_filename("a", Format::Npz));
    assert_ne!(name, entry_filename("b", Format::Npz));
    assert!(name.ends_with(".npz"));
    assert_eq!(name.len(), 16 + ".npz".len());
}

#[test]
fn unsupported_archive_types_fail_before_writing() {
    let dir = tempfile::tempdir().expect("tempdir");
    for name in ["bundle.tar", "bundle.tar.gz", "bundle.7z", "bundle"] {
        let path = dir.path().join(name);
        let err = bundle_schema(&path, &entries(), &BundleOptions::default())
            .expect_err("only zip is supported");
        assert!(matches!(err, SchemaError::UnsupportedArchiveFormat(_)), "{name}");
        assert!(!path.exists());
    }
    assert!(ArchiveFormat::from_path("x.ZIP").is_ok());
}

#[test]
fn unregistered_types_fail_to_load() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("unregistered.zip");
    bundle_schema(&path, &entries(), &BundleOptions::default())?;

    let mut partial = SchemaRegistry::new();
    partial.register_def(sample_def());
    let err = load_bundle(&path, &partial).expect_err("Other is not registered");
    assert!(matches!(
        err,
        SchemaError::UnknownSchemaType { ref classname, .. } if classname == "Other"
    ));
    Ok(())
}

#[test]
fn failed_bundles_leave_no_archive() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("records.zip");
    let options = BundleOptions::new().format(Format::Json);

    // The record array in "a" has no JSON form.
    let err = bundle_schema(&path, &entries(), &options).expect_err("records");
    assert!(matches!(err, SchemaError::StructuredDataUnsupported { .. }));
    assert!(!path.exists());
    let leftovers = std::fs::read_dir(dir.path()).expect("read_dir").count();
    assert_eq!(leftovers, 0);
}
