#![allow(dead_code)]

use schemata::{
    ArrayData, DType, FieldDescriptor, FieldType, NdArray, RecordArray, SchemaDef, SchemaInstance,
};
use std::sync::Arc;

/// Every field kind: absent array, record array, float, float64 array, int32
/// array, unicode array and a string scalar.
pub fn sample_def() -> Arc<SchemaDef> {
    SchemaDef::builder("Sample", "tests::common")
        .field(FieldDescriptor::new("u", FieldType::array()).optional())
        .field(FieldDescriptor::new("v", FieldType::Records).describe("a record array"))
        .field(FieldDescriptor::new("w", FieldType::Float).describe("a float"))
        .field(FieldDescriptor::new("x", FieldType::array_of(DType::F64)))
        .field(FieldDescriptor::new("y", FieldType::array_of(DType::I32)))
        .field(FieldDescriptor::new("z", FieldType::array_of(DType::Unicode)))
        .field(FieldDescriptor::new("name", FieldType::Str))
        .build()
}

pub fn sample_records() -> RecordArray {
    RecordArray::from_columns(vec![
        (
            "field_1",
            ArrayData::Unicode(vec!["a".into(), "bb".into(), "ccc".into()]),
        ),
        ("field_2", ArrayData::I64(vec![1, 2, 3])),
    ])
    .expect("valid record array")
}

pub fn sample_instance() -> SchemaInstance {
    let mut s = SchemaInstance::new(sample_def());
    s.set("v", sample_records()).expect("v");
    s.set("w", 3.25).expect("w");
    s.set("x", NdArray::arange(10)).expect("x");
    s.set("y", NdArray::from_vec(vec![1i32, -2, 3, -4])).expect("y");
    s.set("z", NdArray::from_strings(["alpha", "beta", "gamma"])).expect("z");
    s.set("name", "sample").expect("name");
    s
}

/// Same fields as `sample_def` minus the record array, so JSON can hold it.
pub fn text_def() -> Arc<SchemaDef> {
    SchemaDef::builder("TextSample", "tests::common")
        .field(FieldDescriptor::new("u", FieldType::array()).optional())
        .field(FieldDescriptor::new("w", FieldType::Float))
        .field(FieldDescriptor::new("x", FieldType::array_of(DType::F64)))
        .field(FieldDescriptor::new("y", FieldType::array_of(DType::I32)))
        .field(FieldDescriptor::new("z", FieldType::array_of(DType::Unicode)))
        .field(FieldDescriptor::new("name", FieldType::Str))
        .build()
}

pub fn text_instance() -> SchemaInstance {
    let mut s = SchemaInstance::new(text_def());
    s.set("w", 3.25).expect("w");
    s.set("x", NdArray::arange(10)).expect("x");
    s.set("y", NdArray::from_vec(vec![1i32, -2, 3, -4])).expect("y");
    s.set("z", NdArray::from_strings(["alpha", "beta", "gamma"])).expect("z");
    s.set("name", "sample").expect("name");
    s
}
