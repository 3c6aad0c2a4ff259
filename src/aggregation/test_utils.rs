// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Drives an aggregate function through every execution mode and checks that they agree.
//!
//! Arguments live in channels `0..n` of the input chunks, in parameter order.

use std::iter::{once, repeat};

use super::*;
use crate::array::{DataChunk, F64Array, I64Array, Utf8Array};
use crate::types::{DataValue, F64};

pub fn bigint_chunk(values: &[Option<i64>]) -> DataChunk {
    [ArrayImpl::new_int64(values.iter().copied().collect::<I64Array>())]
        .into_iter()
        .collect()
}

pub fn double_chunk(values: &[Option<f64>]) -> DataChunk {
    [ArrayImpl::new_float64(
        values.iter().map(|v| v.map(F64::from)).collect::<F64Array>(),
    )]
    .into_iter()
    .collect()
}

pub fn varchar_chunk(values: &[Option<&str>]) -> DataChunk {
    [ArrayImpl::new_utf8(values.iter().copied().collect::<Utf8Array>())]
        .into_iter()
        .collect()
}

/// A chunk holding only a BIGINT sample weight column.
pub fn weighted_chunk(weights: &[Option<i64>]) -> DataChunk {
    bigint_chunk(weights)
}

/// Assert that every execution mode of `function` yields `expected` over `chunks`.
pub fn assert_aggregation(
    function: &dyn InternalAggregationFunction,
    confidence: f64,
    expected: DataValue,
    chunks: &[DataChunk],
) {
    assert_eq!(aggregation(function, confidence, chunks), expected, "single");
    assert_eq!(
        partial_aggregation(function, confidence, chunks),
        expected,
        "partial"
    );
    assert_eq!(
        split_aggregation(function, confidence, chunks),
        expected,
        "split"
    );
    if !chunks.is_empty() {
        assert_eq!(
            grouped_aggregation(function, confidence, chunks),
            expected,
            "grouped"
        );
        assert_eq!(
            grouped_partial_aggregation(function, confidence, chunks),
            expected,
            "grouped partial"
        );
        assert_eq!(
            masked_aggregation(function, confidence, chunks),
            expected,
            "masked"
        );
    }
}

/// Run `run` over the plain, reversed and offset channel layouts and check they agree.
fn with_layouts<T: PartialEq + std::fmt::Debug>(
    function: &dyn InternalAggregationFunction,
    chunks: &[DataChunk],
    run: impl Fn(Vec<usize>, &[DataChunk]) -> T,
) -> T {
    let arity = function.signature().parameter_types.len();
    let args = (0..arity).collect::<Vec<_>>();
    let result = run(args.clone(), chunks);

    if arity > 1 {
        let reversed = args.iter().rev().copied().collect();
        let reversed_result = run(reversed, &reverse_columns(chunks));
        assert_eq!(
            reversed_result, result,
            "inconsistent results with reversed channels"
        );
    }

    let offset = args.iter().map(|a| a + 3).collect();
    let offset_result = run(offset, &offset_columns(chunks, 3));
    assert_eq!(offset_result, result, "inconsistent results with channel offset");

    result
}

fn reverse_columns(chunks: &[DataChunk]) -> Vec<DataChunk> {
    chunks
        .iter()
        .map(|chunk| {
            let reversed = (0..chunk.column_count()).rev().collect::<Vec<_>>();
            chunk.project(&reversed)
        })
        .collect()
}

/// Prepend `offset` constant NULL columns.
fn offset_columns(chunks: &[DataChunk], offset: usize) -> Vec<DataChunk> {
    chunks
        .iter()
        .map(|chunk| {
            let fillers = repeat(ArrayImpl::new_null(
                &DataTypeKind::Bool.into(),
                chunk.cardinality(),
            ))
            .take(offset);
            let arrays = fillers.chain(chunk.arrays().iter().cloned()).collect();
            DataChunk::new(arrays, chunk.cardinality())
        })
        .collect()
}

fn only_value(array: &ArrayImpl) -> DataValue {
    assert_eq!(array.len(), 1, "expected a single value");
    array.get(0)
}

pub fn aggregation(
    function: &dyn InternalAggregationFunction,
    confidence: f64,
    chunks: &[DataChunk],
) -> DataValue {
    with_layouts(function, chunks, |args, chunks| {
        aggregation_with(function, args, None, confidence, chunks)
    })
}

fn aggregation_with(
    function: &dyn InternalAggregationFunction,
    args: Vec<usize>,
    mask_channel: Option<usize>,
    confidence: f64,
    chunks: &[DataChunk],
) -> DataValue {
    let factory = function
        .bind(args, mask_channel, None, confidence)
        .unwrap();
    let mut accumulator = factory.create_accumulator();
    for chunk in chunks.iter().filter(|c| !c.is_empty()) {
        accumulator.add_input(chunk).unwrap();
    }
    only_value(&accumulator.evaluate_final())
}

pub fn partial_aggregation(
    function: &dyn InternalAggregationFunction,
    confidence: f64,
    chunks: &[DataChunk],
) -> DataValue {
    with_layouts(function, chunks, |args, chunks| {
        let factory = function.bind(args, None, None, confidence).unwrap();
        let mut partial = factory.create_accumulator();
        for chunk in chunks.iter().filter(|c| !c.is_empty()) {
            partial.add_input(chunk).unwrap();
        }
        let intermediate = partial.evaluate_intermediate();

        let mut last = factory.create_intermediate_accumulator();
        // the intermediate of an untouched state and a zero-row chunk are both no-ops
        let empty = factory.create_accumulator().evaluate_intermediate();
        last.add_intermediate(&empty).unwrap();
        last.add_intermediate(&DataChunk::no_column(0)).unwrap();
        last.add_intermediate(&intermediate).unwrap();
        (intermediate, only_value(&last.evaluate_final()))
    })
    .1
}

/// One partial accumulator per chunk, merged in reverse order.
pub fn split_aggregation(
    function: &dyn InternalAggregationFunction,
    confidence: f64,
    chunks: &[DataChunk],
) -> DataValue {
    let args = (0..function.signature().parameter_types.len()).collect();
    let factory = function.bind(args, None, None, confidence).unwrap();
    let intermediates = chunks
        .iter()
        .map(|chunk| {
            let mut partial = factory.create_accumulator();
            partial.add_input(chunk).unwrap();
            partial.evaluate_intermediate()
        })
        .collect::<Vec<_>>();
    let mut last = factory.create_intermediate_accumulator();
    for intermediate in intermediates.iter().rev() {
        last.add_intermediate(intermediate).unwrap();
    }
    only_value(&last.evaluate_final())
}

fn group_ids(group_id: i64, len: usize) -> ArrayImpl {
    // ids are given both expanded and run-length encoded
    if group_id == 0 {
        ArrayImpl::new_int64(repeat(group_id).take(len).collect())
    } else {
        ArrayImpl::new_constant(&DataValue::Int64(group_id), &DataTypeKind::Int64.into(), len)
    }
}

fn group_value(accumulator: &mut dyn GroupedAccumulator, group_id: i64) -> DataValue {
    let mut builder = ArrayBuilderImpl::new(&accumulator.final_type());
    accumulator.evaluate_final(group_id, &mut builder);
    only_value(&builder.finish())
}

pub fn grouped_aggregation(
    function: &dyn InternalAggregationFunction,
    confidence: f64,
    chunks: &[DataChunk],
) -> DataValue {
    with_layouts(function, chunks, |args, chunks| {
        let factory = function.bind(args, None, None, confidence).unwrap();
        let mut grouped = factory.create_grouped_accumulator();
        for chunk in chunks {
            grouped
                .add_input(&group_ids(0, chunk.cardinality()), chunk)
                .unwrap();
        }
        let value = group_value(grouped.as_mut(), 0);

        for chunk in chunks {
            grouped
                .add_input(&group_ids(4000, chunk.cardinality()), chunk)
                .unwrap();
        }
        let large_value = group_value(grouped.as_mut(), 4000);
        assert_eq!(large_value, value, "inconsistent results with large group id");
        value
    })
}

pub fn grouped_partial_aggregation(
    function: &dyn InternalAggregationFunction,
    confidence: f64,
    chunks: &[DataChunk],
) -> DataValue {
    with_layouts(function, chunks, |args, chunks| {
        let factory = function.bind(args, None, None, confidence).unwrap();
        let intermediate_of = |grouped: &mut dyn GroupedAccumulator| {
            let mut builders = factory
                .intermediate_types()
                .iter()
                .map(ArrayBuilderImpl::new)
                .collect::<Vec<_>>();
            grouped.evaluate_intermediate(0, &mut builders);
            builders.into_iter().collect::<DataChunk>()
        };

        let mut partial = factory.create_grouped_accumulator();
        for chunk in chunks {
            partial
                .add_input(&group_ids(0, chunk.cardinality()), chunk)
                .unwrap();
        }
        let intermediate = intermediate_of(partial.as_mut());
        let empty = intermediate_of(factory.create_grouped_accumulator().as_mut());

        let mut last = factory.create_grouped_intermediate_accumulator();
        last.add_intermediate(&group_ids(0, empty.cardinality()), &empty)
            .unwrap();
        last.add_intermediate(&group_ids(0, intermediate.cardinality()), &intermediate)
            .unwrap();
        (intermediate, group_value(last.as_mut(), 0))
    })
    .1
}

/// Append a mask as the last column, once expanded and once run-length encoded.
fn mask_chunks(mask: bool, chunks: &[DataChunk]) -> Vec<DataChunk> {
    chunks
        .iter()
        .map(|chunk| {
            let n = chunk.cardinality();
            let column = if mask {
                ArrayImpl::new_bool(repeat(mask).take(n).collect())
            } else {
                ArrayImpl::new_constant(&DataValue::Bool(mask), &DataTypeKind::Bool.into(), n)
            };
            chunk.append_column(column)
        })
        .collect()
}

/// Aggregating every chunk twice, once masked off, must equal aggregating it once.
pub fn masked_aggregation(
    function: &dyn InternalAggregationFunction,
    confidence: f64,
    chunks: &[DataChunk],
) -> DataValue {
    let mask_channel = Some(chunks[0].column_count());
    let args = (0..function.signature().parameter_types.len()).collect::<Vec<_>>();
    let value = aggregation_with(
        function,
        args.clone(),
        mask_channel,
        confidence,
        &mask_chunks(true, chunks),
    );
    let mut duped = mask_chunks(true, chunks);
    duped.extend(mask_chunks(false, chunks));
    let duped_value = aggregation_with(function, args.clone(), mask_channel, confidence, &duped);
    assert_eq!(duped_value, value, "inconsistent results with mask");

    // the mask ahead of the arguments
    let mask_first = duped
        .iter()
        .map(|chunk| {
            let last = chunk.column_count() - 1;
            let order = once(last).chain(0..last).collect::<Vec<_>>();
            chunk.project(&order)
        })
        .collect::<Vec<_>>();
    let shifted = args.iter().map(|a| a + 1).collect();
    let mask_first_value = aggregation_with(function, shifted, Some(0), confidence, &mask_first);
    assert_eq!(mask_first_value, value, "inconsistent results with mask at channel 0");
    value
}

/// Assert that the `"<estimate> +/- <error>"` result brackets `expected` in every mode.
///
/// The sample weight is the channel right after the arguments. Each mode runs once with the
/// weight last and once with it first, behind constant NULL fillers, and must give the same
/// intermediate and final values in both.
pub fn assert_approximate_aggregation(
    function: &dyn InternalAggregationFunction,
    confidence: f64,
    expected: f64,
    chunks: &[DataChunk],
) {
    let arity = function.signature().parameter_types.len();
    let weight_first = chunks
        .iter()
        .map(|chunk| {
            let order = once(arity).chain(0..arity).collect::<Vec<_>>();
            chunk.project(&order)
        })
        .collect::<Vec<_>>();
    let layouts = [
        ((0..arity).collect::<Vec<_>>(), arity, chunks.to_vec()),
        ((4..4 + arity).collect(), 3, offset_columns(&weight_first, 3)),
    ];
    let results = layouts
        .into_iter()
        .map(|(args, weight, chunks)| approximate_modes(function, confidence, args, weight, &chunks))
        .collect::<Vec<_>>();
    assert_eq!(results[0], results[1], "inconsistent results with moved weight channel");
    let (intermediate, values) = &results[0];
    assert_eq!(intermediate.cardinality(), 1);
    for value in values {
        assert_within_error_bound(value, expected);
    }
}

/// Intermediate and final values of the single, partial and grouped modes.
fn approximate_modes(
    function: &dyn InternalAggregationFunction,
    confidence: f64,
    args: Vec<usize>,
    weight_channel: usize,
    chunks: &[DataChunk],
) -> (DataChunk, Vec<DataValue>) {
    let factory = function
        .bind(args, None, Some(weight_channel), confidence)
        .unwrap();

    let mut single = factory.create_accumulator();
    for chunk in chunks {
        single.add_input(chunk).unwrap();
    }
    let single = only_value(&single.evaluate_final());

    let mut partial = factory.create_accumulator();
    for chunk in chunks {
        partial.add_input(chunk).unwrap();
    }
    let intermediate = partial.evaluate_intermediate();
    let mut last = factory.create_intermediate_accumulator();
    last.add_intermediate(&intermediate).unwrap();
    let merged = only_value(&last.evaluate_final());

    let mut grouped = factory.create_grouped_accumulator();
    for chunk in chunks {
        grouped
            .add_input(&group_ids(0, chunk.cardinality()), chunk)
            .unwrap();
    }
    let grouped = group_value(grouped.as_mut(), 0);

    (intermediate, vec![single, merged, grouped])
}

fn assert_within_error_bound(value: &DataValue, expected: f64) {
    let text = value.as_str().expect("approximate result must be VARCHAR");
    let parts = text.split(' ').collect::<Vec<_>>();
    assert_eq!(parts.len(), 3, "malformed approximate result {text:?}");
    let actual: f64 = parts[0].parse().unwrap();
    let error: f64 = parts[2].parse().unwrap();
    assert!(
        (expected - actual).abs() <= error && error.is_finite(),
        "{expected} is not within {text}"
    );
}
