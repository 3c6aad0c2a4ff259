// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Two-phase aggregation across several simulated workers, fed by decoded connector records.

use std::sync::Arc;

use cascade::aggregation::{AccumulatorFactory, AggregationRegistry, InternalAggregationFunction};
use cascade::array::DataChunk;
use cascade::connector::{
    channel_layout, decode_records, ColumnHandle, DecoderOptions, DecoderRegistry,
};
use cascade::executor::*;
use cascade::types::{DataTypeKind, DataValue};
use tracing_subscriber::EnvFilter;

/// Set `RUST_LOG=cascade=trace` to see operator progress.
fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn columns() -> Vec<ColumnHandle> {
    vec![
        ColumnHandle::new("region", 0, DataTypeKind::String.not_null()),
        ColumnHandle::new("amount", 1, DataTypeKind::Int64.nullable()),
        ColumnHandle::new("_partition", 2, DataTypeKind::Int64.not_null()).hidden(),
    ]
}

/// One chunk per worker.
fn splits() -> Vec<DataChunk> {
    let layout = channel_layout(&columns());
    let decoder = DecoderRegistry::with_builtins()
        .create("csv", &DecoderOptions::default())
        .unwrap();
    let splits: [&[&str]; 3] = [
        &["east,10", "west,5", "east,"],
        &[],
        &["west,7", "north,1", "east,3"],
    ];
    splits
        .iter()
        .enumerate()
        .map(|(i, records)| {
            decode_records(
                decoder.as_ref(),
                &format!("split-{i}"),
                layout.columns(),
                records.iter().enumerate().map(|(o, r)| (o as u64, r.as_bytes())),
            )
            .unwrap()
        })
        .collect()
}

fn factories() -> Vec<Arc<dyn AccumulatorFactory>> {
    let registry = AggregationRegistry::with_builtins();
    let bigint = [DataTypeKind::Int64];
    vec![
        registry.resolve("count", &[]).unwrap().bind(vec![], None, None, 1.0).unwrap(),
        registry.resolve("sum", &bigint).unwrap().bind(vec![1], None, None, 1.0).unwrap(),
        registry.resolve("avg", &bigint).unwrap().bind(vec![1], None, None, 1.0).unwrap(),
        registry.resolve("min", &bigint).unwrap().bind(vec![1], None, None, 1.0).unwrap(),
    ]
}

fn hash_agg(step: AggregationStep) -> HashAggregationOperatorFactory {
    HashAggregationOperatorFactory::new(
        step,
        vec![0],
        vec![DataTypeKind::String.not_null()],
        factories(),
        16,
    )
}

fn run(factory: &dyn OperatorFactory, chunks: Vec<DataChunk>, id: usize) -> Vec<DataChunk> {
    let types = channel_layout(&columns()).types();
    let source = Box::new(ValuesOperator::new(types, chunks));
    let operator = factory.create_operator(OperatorContext::for_test(id));
    Driver::new(vec![source, operator]).collect().unwrap()
}

fn sorted_rows(chunks: &[DataChunk]) -> Vec<Vec<DataValue>> {
    let mut rows = chunks
        .iter()
        .flat_map(|c| c.rows().map(|r| r.to_vec()))
        .collect::<Vec<_>>();
    rows.sort();
    rows
}

fn row(region: &str, count: i64, sum: i64, avg: f64, min: i64) -> Vec<DataValue> {
    vec![
        region.into(),
        count.into(),
        sum.into(),
        avg.into(),
        min.into(),
    ]
}

#[test]
fn grouped_two_phase_equals_single() {
    init_logger();
    let single = sorted_rows(&run(&hash_agg(AggregationStep::Single), splits(), 0));
    assert_eq!(
        single,
        vec![
            row("east", 3, 13, 6.5, 3),
            row("north", 1, 1, 1.0, 1),
            row("west", 2, 12, 6.0, 5),
        ]
    );

    let partial = hash_agg(AggregationStep::Partial);
    let intermediates = splits()
        .into_iter()
        .enumerate()
        .flat_map(|(worker, split)| run(&partial, vec![split], worker + 1))
        .collect::<Vec<_>>();
    let last = HashAggregationOperator::new(
        OperatorContext::for_test(9),
        AggregationStep::Final,
        vec![0],
        vec![DataTypeKind::String.not_null()],
        factories(),
        16,
    );
    let source = ValuesOperator::new(partial.output_types().to_vec(), intermediates);
    let outputs = Driver::new(vec![Box::new(source), Box::new(last)])
        .collect()
        .unwrap();
    assert_eq!(sorted_rows(&outputs), single);
}

#[test]
fn global_two_phase_equals_single() {
    init_logger();
    let single = run(
        &AggregationOperatorFactory::new(AggregationStep::Single, factories()),
        splits(),
        0,
    );
    assert_eq!(
        single[0].row(0).to_vec(),
        row("", 6, 26, 5.2, 1)[1..].to_vec()
    );

    let partial = AggregationOperatorFactory::new(AggregationStep::Partial, factories());
    let intermediates = splits()
        .into_iter()
        .flat_map(|split| run(&partial, vec![split], 1))
        .collect::<Vec<_>>();
    // the empty split still contributes one intermediate row
    assert_eq!(intermediates.len(), 3);
    let source = ValuesOperator::new(partial.output_types().to_vec(), intermediates);
    let last = AggregationOperator::new(
        OperatorContext::for_test(2),
        AggregationStep::Final,
        factories(),
    );
    let outputs = Driver::new(vec![Box::new(source), Box::new(last)])
        .collect()
        .unwrap();
    assert_eq!(outputs, single);
}

#[test]
fn malformed_intermediate_fails_the_driver() {
    init_logger();
    let last = AggregationOperator::new(
        OperatorContext::for_test(2),
        AggregationStep::Final,
        factories(),
    );
    let raw = splits().remove(0);
    let types = channel_layout(&columns()).types();
    let source = ValuesOperator::new(types, vec![raw]);
    let e = Driver::new(vec![Box::new(source), Box::new(last)])
        .collect()
        .unwrap_err();
    assert!(e.to_string().starts_with("malformed intermediate chunk"), "{e}");
}
