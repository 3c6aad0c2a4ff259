// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::sync::Arc;

use cascade::array::{ArrayImpl, DataChunk};
use cascade::executor::*;
use cascade::types::{DataType, DataTypeKind, DataValue};
use futures::TryStreamExt;

fn types() -> Vec<DataType> {
    vec![
        DataTypeKind::Int64.not_null(),
        DataTypeKind::String.nullable(),
    ]
}

fn source() -> ValuesOperator {
    let keys = [1, 2, 3, 3, 1, 1, 1, 2, 2, 2];
    let rows = keys
        .iter()
        .enumerate()
        .map(|(i, &k)| vec![DataValue::Int64(k), DataValue::from(format!("row {i}"))]);
    ValuesOperator::from_rows(types(), rows, 3)
}

fn factory() -> RowNumberLimitOperatorFactory {
    RowNumberLimitOperatorFactory::new(
        types(),
        vec![1, 0],
        vec![0],
        vec![DataTypeKind::Int64.not_null()],
        3,
        16,
    )
}

/// `(payload, key, row number)` of every output row.
fn rows(chunks: &[DataChunk]) -> Vec<(String, i64, i64)> {
    chunks
        .iter()
        .flat_map(|chunk| chunk.rows())
        .map(|row| {
            (
                row[0].as_str().unwrap().to_string(),
                row[1].as_i64().unwrap(),
                row[2].as_i64().unwrap(),
            )
        })
        .collect()
}

fn check(rows: &[(String, i64, i64)]) {
    assert!(rows.iter().all(|(_, _, n)| *n <= 3));
    let partition = |key| {
        rows.iter()
            .filter(|(_, k, _)| *k == key)
            .map(|(payload, _, n)| (payload.as_str(), *n))
            .collect::<Vec<_>>()
    };
    assert_eq!(partition(1), vec![("row 0", 1), ("row 4", 2), ("row 5", 3)]);
    assert_eq!(partition(2), vec![("row 1", 1), ("row 7", 2), ("row 8", 3)]);
    assert_eq!(partition(3), vec![("row 2", 1), ("row 3", 2)]);
}

#[test]
fn driver() {
    let options = Arc::new(ExecutorOptions::default());
    let factory = factory();
    let operator = factory.create_operator(OperatorContext::new(1, options));
    let outputs = Driver::new(vec![Box::new(source()), operator])
        .collect()
        .unwrap();
    for chunk in &outputs {
        assert_eq!(chunk.column_count(), factory.output_types().len());
    }
    check(&rows(&outputs));
}

#[tokio::test]
async fn stream() {
    let operator = factory().create_operator(OperatorContext::for_test(1));
    let outputs: Vec<DataChunk> = into_stream(operator, source().into_stream())
        .try_collect()
        .await
        .unwrap();
    check(&rows(&outputs));
}

#[test]
fn empty_chunk_keeps_shape() {
    let empty: DataChunk = [
        ArrayImpl::new_null(&DataTypeKind::Int64.not_null(), 0),
        ArrayImpl::new_null(&DataTypeKind::String.nullable(), 0),
    ]
    .into_iter()
    .collect();
    let source = ValuesOperator::new(types(), vec![empty]);
    let operator = factory().create_operator(OperatorContext::for_test(1));
    let outputs = Driver::new(vec![Box::new(source), operator])
        .collect()
        .unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].cardinality(), 0);
    assert_eq!(outputs[0].column_count(), 3);
}
