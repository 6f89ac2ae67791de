mod common;

use common::{sample_def, sample_instance};
use schemata::{
    DType, FieldDescriptor, FieldType, NdArray, SchemaDef, SchemaError, SchemaInstance, Value,
};
use std::sync::Arc;

#[test]
fn defaults_follow_the_field_type() {
    let s = SchemaInstance::new(sample_def());
    assert!(!s.is_set("u"));
    assert!(!s.is_set("v"));
    assert_eq!(s.get("w"), Some(&Value::Float(0.0)));
    assert_eq!(s.get("name"), Some(&Value::Str(String::new())));
    assert_eq!(s.get("y").and_then(|v| v.as_array()), Some(&NdArray::empty(DType::I32)));
}

#[test]
fn fixed_shapes_default_to_zeros() {
    let def = SchemaDef::builder("Grid", "tests::schema")
        .field(FieldDescriptor::new(
            "g",
            FieldType::array_of(DType::F32).with_shape(vec![2, 3]),
        ))
        .build();
    let s = SchemaInstance::new(def);
    assert_eq!(
        s.get("g").and_then(|v| v.as_array()),
        Some(&NdArray::zeros(DType::F32, vec![2, 3]))
    );
}

#[test]
fn unknown_fields_fail_construction() {
    let err = SchemaInstance::with_fields(sample_def(), [("w", Value::Float(1.0)), ("bogus", Value::Float(2.0))])
        .expect_err("bogus is not declared");
    assert!(matches!(
        err,
        SchemaError::UnknownField { ref schema, ref field } if schema == "Sample" && field == "bogus"
    ));

    let mut s = SchemaInstance::new(sample_def());
    assert!(matches!(s.set("bogus", 1.0), Err(SchemaError::UnknownField { .. })));
    assert!(s.get("bogus").is_none());
}

#[test]
fn unknown_npz_entries_fail_load() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("wide.npz");
    sample_instance().save(&path)?;

    let narrow = SchemaDef::builder("Sample", "tests::common")
        .field(FieldDescriptor::new("w", FieldType::Float))
        .build();
    let err = SchemaInstance::load(narrow, &path).expect_err("extra entries");
    assert!(matches!(err, SchemaError::UnknownField { .. }));
    Ok(())
}

#[test]
fn setter_coercions() -> schemata::Result<()> {
    let mut s = SchemaInstance::new(sample_def());

    s.set("w", NdArray::scalar(2i32))?;
    assert_eq!(s.get("w"), Some(&Value::Float(2.0)));

    s.set("x", NdArray::from_vec(vec![1u8, 2]))?;
    assert_eq!(
        s.get("x").and_then(|v| v.as_array()).map(|a| a.dtype()),
        Some(DType::F64)
    );

    let err = s.set("w", "text").expect_err("str is not float");
    assert!(matches!(err, SchemaError::TypeMismatch { ref field, .. } if field == "w"));

    let err = s.set("z", NdArray::from_vec(vec![1.0])).expect_err("floats are not text");
    assert!(matches!(err, SchemaError::TypeMismatch { .. }));

    let err = s.set("v", NdArray::arange(2)).expect_err("not a record array");
    assert!(matches!(err, SchemaError::TypeMismatch { .. }));
    Ok(())
}

#[test]
fn untyped_arrays_accept_record_arrays() -> schemata::Result<()> {
    let mut s = SchemaInstance::new(sample_def());
    s.set("u", common::sample_records())?;
    assert!(s.get("u").is_some_and(Value::is_record));
    Ok(())
}

#[test]
fn unset_and_to_dict() -> schemata::Result<()> {
    let mut s = sample_instance();
    s.unset("name")?;
    let dict = s.to_dict();
    assert!(!dict.contains_key("name"));
    assert!(!dict.contains_key("u"));
    assert_eq!(dict.get("w"), Some(&Value::Float(3.25)));
    Ok(())
}

#[test]
fn explicit_defaults_are_checked() {
    let field = FieldDescriptor::new("w", FieldType::Float)
        .with_default(1.5)
        .expect("float default");
    assert_eq!(field.default_value(), Some(&Value::Float(1.5)));

    let err = FieldDescriptor::new("w", FieldType::Float)
        .with_default("nope")
        .expect_err("str default for a float");
    assert!(matches!(err, SchemaError::TypeMismatch { .. }));
}

#[test]
fn redeclared_fields_replace_in_place() {
    let def: Arc<SchemaDef> = SchemaDef::builder("Twice", "tests::schema")
        .field(FieldDescriptor::new("a", FieldType::Float))
        .field(FieldDescriptor::new("b", FieldType::Str))
        .field(FieldDescriptor::new("a", FieldType::Str).describe("second"))
        .build();
    assert_eq!(def.declared_fields().collect::<Vec<_>>(), ["a", "b"]);
    assert_eq!(def.describe("a").map(|f| f.field_type()), Some(&FieldType::Str));
}

#[test]
fn display_lists_every_field() {
    let text = sample_instance().to_string();
    assert!(text.starts_with("<Sample("), "{text}");
    assert!(text.contains("u=None"), "{text}");
    assert!(text.contains("w=3.25"), "{text}");
    assert!(text.ends_with(")>"), "{text}");
}

#[test]
fn numbers_cast_to_bool_by_nonzero() -> schemata::Result<()> {
    let def = SchemaDef::builder("Mask", "tests::schema")
        .field(FieldDescriptor::new("m", FieldType::array_of(DType::Bool)))
        .build();
    let mut s = SchemaInstance::new(def);

    s.set("m", NdArray::from_vec(vec![0i64, 3, -1]))?;
    let m = s.get("m").and_then(|v| v.as_array()).expect("m");
    assert_eq!(m.as_slice::<bool>(), Some(&[false, true, true][..]));

    s.set("m", NdArray::from_vec(vec![0.0f32, 0.5]))?;
    let m = s.get("m").and_then(|v| v.as_array()).expect("m");
    assert_eq!(m.as_slice::<bool>(), Some(&[false, true][..]));
    Ok(())
}

#[test]
fn scalars_fill_zero_dimensional_array_fields() -> schemata::Result<()> {
    let mut s = SchemaInstance::new(sample_def());
    s.set("y", 7.0)?;
    assert_eq!(
        s.get("y").and_then(|v| v.as_array()),
        Some(&NdArray::scalar(7i32))
    );

    s.set("z", "word")?;
    let z = s.get("z").and_then(|v| v.as_array()).expect("z");
    assert_eq!((z.ndim(), z.as_strings()), (0, Some(&["word".to_string()][..])));
    Ok(())
}
