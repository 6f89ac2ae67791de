use schemata::{
    ArraySpec, BundleOptions, DType, FieldType, Format, NdArray, Schema, SchemaError,
    SchemaRegistry, bundle_schema, load_bundle,
};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Schema)]
#[schema(name = "Measurement", module = "lab.instruments")]
struct Measurement {
    #[schema(desc = "sample name")]
    name: String,
    gain: f64,
    #[schema(dtype = "float64", shape = "2, 2")]
    calibration: NdArray,
    counts: Vec<i32>,
    labels: Vec<String>,
    #[schema(rename = "notes")]
    comment: Option<String>,
    extra: Option<NdArray>,
}

#[derive(Clone, Debug, PartialEq, Schema)]
struct Plain {
    value: f64,
}

fn measurement() -> Measurement {
    Measurement {
        name: "probe".into(),
        gain: 1.25,
        calibration: NdArray::from_vec(vec![1.0, 0.0, 0.0, 1.0])
            .reshape(vec![2, 2])
            .expect("2x2"),
        counts: vec![3, 1, 4, 1, 5],
        labels: vec!["left".into(), "right".into()],
        comment: Some("calibrated".into()),
        extra: None,
    }
}

#[test]
fn derived_definition() {
    let def = Measurement::definition();
    assert_eq!(def.classname(), "Measurement");
    assert_eq!(def.module(), "lab.instruments");
    assert_eq!(
        def.declared_fields().collect::<Vec<_>>(),
        ["name", "gain", "calibration", "counts", "labels", "notes", "extra"]
    );
    assert_eq!(def.describe("name").and_then(|f| f.desc()), Some("sample name"));
    assert_eq!(
        def.describe("calibration").map(|f| f.field_type().clone()),
        Some(FieldType::Array(ArraySpec {
            dtype: Some(DType::F64),
            shape: Some(vec![2, 2]),
        }))
    );
    assert_eq!(
        def.describe("counts").map(|f| f.field_type().clone()),
        Some(FieldType::array_of(DType::I32))
    );
    assert!(def.describe("notes").and_then(|f| f.default_value()).is_none());
    assert!(def.describe("comment").is_none());
}

#[test]
fn module_defaults_to_the_module_path() {
    assert_eq!(Plain::definition().module(), module_path!());
    assert_eq!(Plain::definition().classname(), "Plain");
}

#[test]
fn definition_is_built_once() {
    assert!(std::sync::Arc::ptr_eq(
        &Measurement::definition(),
        &Measurement::definition()
    ));
}

#[test]
fn derived_round_trip_in_every_format() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let original = measurement();

    let mut formats = vec![Format::Npz, Format::Json];
    if schemata::capabilities().container {
        formats.push(Format::Container);
    }
    for format in formats {
        let path = dir.path().join(format!("measurement.{}", format.extension()));
        original.save(&path)?;
        assert_eq!(Measurement::load(&path)?, original, "{format}");
    }
    Ok(())
}

#[test]
fn empty_collections_survive_json() -> schemata::Result<()> {
    let file = tempfile::Builder::new().suffix(".json").tempfile()?;
    let mut original = measurement();
    original.counts.clear();
    original.labels.clear();
    original.comment = None;

    original.save(file.path())?;
    assert_eq!(Measurement::load(file.path())?, original);
    Ok(())
}

#[test]
fn wrong_shape_is_rejected() {
    let mut m = measurement();
    m.calibration = NdArray::arange(3);
    let err = m.to_instance().expect_err("shape (3,) is not (2, 2)");
    assert!(matches!(err, SchemaError::TypeMismatch { ref field, .. } if field == "calibration"));
}

#[test]
fn instance_view_uses_renamed_fields() -> schemata::Result<()> {
    let instance = measurement().to_instance()?;
    assert_eq!(instance.get("notes").and_then(|v| v.as_str()), Some("calibrated"));
    assert!(!instance.is_set("extra"));
    assert_eq!(Measurement::from_instance(instance)?, measurement());
    Ok(())
}

#[test]
fn derived_types_bundle_through_the_registry() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("derived.zip");
    let entries = BTreeMap::from([
        ("m".to_string(), measurement().to_instance()?),
        ("p".to_string(), Plain { value: 2.0 }.to_instance()?),
    ]);
    bundle_schema(&path, &entries, &BundleOptions::default())?;

    let mut registry = SchemaRegistry::new();
    registry.register::<Measurement>().register::<Plain>();
    let mut bundle = load_bundle(&path, &registry)?;

    assert_eq!(bundle.take_as::<Measurement>("m")?, Some(measurement()));
    assert_eq!(bundle.take_as::<Plain>("p")?, Some(Plain { value: 2.0 }));
    assert_eq!(bundle.take_as::<Plain>("missing")?, None);
    Ok(())
}
