#![cfg(feature = "ndarray")]

use ndarray::{ArrayD, IxDyn};
use schemata::{DType, NdArray, Schema, SchemaError, Value};

#[derive(Debug, Clone, PartialEq, Schema)]
#[schema(name = "Grid", module = "tests::ndarray")]
struct Grid {
    #[schema(desc = "cell values")]
    cells: ArrayD<f64>,
    counts: ArrayD<i32>,
}

fn grid() -> Grid {
    let cells = ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![0.5, 1.0, 1.5, 2.0, 2.5, 3.0])
        .expect("2x3");
    let counts = ArrayD::from_shape_vec(IxDyn(&[3]), vec![1, -2, 3]).expect("3");
    Grid { cells, counts }
}

#[test]
fn conversions_keep_shape_and_order() -> schemata::Result<()> {
    let source = grid().cells;
    let array = NdArray::from_ndarray(&source);
    assert_eq!(array.shape(), &[2, 3]);
    assert_eq!(array.dtype(), DType::F64);
    assert_eq!(array.as_slice::<f64>(), Some(&[0.5, 1.0, 1.5, 2.0, 2.5, 3.0][..]));
    assert_eq!(array.to_ndarray::<f64>()?, source);

    let value = Value::from(source.t().to_owned());
    let transposed = value.as_array().expect("array");
    assert_eq!(transposed.shape(), &[3, 2]);
    assert_eq!(transposed.as_slice::<f64>(), Some(&[0.5, 2.0, 1.0, 2.5, 1.5, 3.0][..]));
    Ok(())
}

#[test]
fn wrong_element_type_is_a_mismatch() {
    let array = NdArray::from_vec(vec![1i64, 2]);
    let err = array.to_ndarray::<f64>().expect_err("i64 is not f64");
    assert!(matches!(err, SchemaError::TypeMismatch { .. }));
}

#[test]
fn ndarray_fields_round_trip_through_npz() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("grid.npz");
    let original = grid();
    original.save(&path)?;
    assert_eq!(Grid::load(&path)?, original);
    Ok(())
}

#[test]
fn ndarray_fields_round_trip_through_json() -> schemata::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("grid.json");
    let original = grid();
    original.save(&path)?;
    assert_eq!(Grid::load(&path)?, original);
    Ok(())
}
