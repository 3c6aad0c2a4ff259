// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::ops::Range;
use std::sync::Arc;

use tracing::debug;

use super::*;
use crate::aggregation::{Accumulator, AccumulatorFactory};
use crate::Error;

/// Where an aggregation operator sits in a two-phase plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationStep {
    /// Raw input, final output.
    Single,
    /// Raw input, intermediate output.
    Partial,
    /// Intermediate input, final output.
    Final,
}

impl AggregationStep {
    pub fn is_input_raw(self) -> bool {
        self != Self::Final
    }

    pub fn is_output_partial(self) -> bool {
        self == Self::Partial
    }

    /// Output types of one aggregation in this step.
    pub(super) fn output_types(self, factory: &dyn AccumulatorFactory) -> Vec<DataType> {
        if self.is_output_partial() {
            factory.intermediate_types().to_vec()
        } else {
            vec![factory.final_type()]
        }
    }
}

/// Column ranges of each aggregation's intermediate state in a chunk produced by the
/// partial step, starting at column `offset`.
pub(super) fn intermediate_ranges(
    factories: &[Arc<dyn AccumulatorFactory>],
    offset: usize,
) -> Vec<Range<usize>> {
    let mut start = offset;
    factories
        .iter()
        .map(|factory| {
            let end = start + factory.intermediate_types().len();
            let range = start..end;
            start = end;
            range
        })
        .collect()
}

/// The intermediate columns of one aggregation. A zero-row chunk projects to a zero-row chunk
/// whatever its columns.
pub(super) fn project_intermediate(chunk: &DataChunk, range: &Range<usize>) -> Result<DataChunk> {
    if chunk.is_empty() {
        return Ok(DataChunk::no_column(0));
    }
    if range.end > chunk.column_count() {
        return Err(Error::invalid_channel(range.end - 1, chunk.column_count()));
    }
    Ok(chunk.project(&range.clone().collect::<Vec<_>>()))
}

/// Aggregation without group-by. Always outputs exactly one row.
///
/// In the final step, the input holds the intermediate columns of every aggregation
/// side by side, in the order of the factories.
pub struct AggregationOperator {
    context: OperatorContext,
    step: AggregationStep,
    accumulators: Vec<Box<dyn Accumulator>>,
    intermediate_ranges: Vec<Range<usize>>,
    output_types: Vec<DataType>,
    output: Option<DataChunk>,
    finishing: bool,
}

impl AggregationOperator {
    pub fn new(
        context: OperatorContext,
        step: AggregationStep,
        factories: Vec<Arc<dyn AccumulatorFactory>>,
    ) -> Self {
        let accumulators = factories
            .iter()
            .map(|factory| {
                if step.is_input_raw() {
                    factory.create_accumulator()
                } else {
                    factory.create_intermediate_accumulator()
                }
            })
            .collect();
        let output_types = factories
            .iter()
            .flat_map(|factory| step.output_types(factory.as_ref()))
            .collect();
        debug!(
            operator_id = context.operator_id(),
            ?step,
            aggregations = factories.len(),
            "create aggregation operator"
        );
        AggregationOperator {
            context,
            step,
            accumulators,
            intermediate_ranges: intermediate_ranges(&factories, 0),
            output_types,
            output: None,
            finishing: false,
        }
    }

    fn evaluate(&mut self) -> DataChunk {
        let accumulators = std::mem::take(&mut self.accumulators);
        let mut arrays = vec![];
        for accumulator in accumulators {
            if self.step.is_output_partial() {
                arrays.extend(accumulator.evaluate_intermediate().arrays().iter().cloned());
            } else {
                arrays.push(accumulator.evaluate_final());
            }
        }
        DataChunk::new(arrays, 1)
    }
}

impl Operator for AggregationOperator {
    fn output_types(&self) -> &[DataType] {
        &self.output_types
    }

    fn needs_input(&self) -> bool {
        !self.finishing
    }

    fn add_input(&mut self, chunk: DataChunk) -> Result<()> {
        assert!(self.needs_input(), "operator does not need input");
        for (accumulator, range) in self.accumulators.iter_mut().zip(&self.intermediate_ranges) {
            if self.step.is_input_raw() {
                accumulator.add_input(&chunk)?;
            } else {
                accumulator.add_intermediate(&project_intermediate(&chunk, range)?)?;
            }
        }
        let size = self.estimated_size();
        self.context.set_memory_reservation(size);
        Ok(())
    }

    fn output(&mut self) -> Result<Option<DataChunk>> {
        Ok(self.output.take())
    }

    fn finish(&mut self) {
        if self.finishing {
            return;
        }
        self.finishing = true;
        self.output = Some(self.evaluate());
        debug!(operator_id = self.context.operator_id(), "aggregation finished");
    }

    fn is_finished(&self) -> bool {
        self.finishing && self.output.is_none()
    }

    fn estimated_size(&self) -> usize {
        self.accumulators.iter().map(|a| a.estimated_size()).sum()
    }
}

/// Creates [`AggregationOperator`]s.
pub struct AggregationOperatorFactory {
    step: AggregationStep,
    factories: Vec<Arc<dyn AccumulatorFactory>>,
    output_types: Vec<DataType>,
}

impl AggregationOperatorFactory {
    pub fn new(step: AggregationStep, factories: Vec<Arc<dyn AccumulatorFactory>>) -> Self {
        let output_types = factories
            .iter()
            .flat_map(|factory| step.output_types(factory.as_ref()))
            .collect();
        AggregationOperatorFactory {
            step,
            factories,
            output_types,
        }
    }
}

impl OperatorFactory for AggregationOperatorFactory {
    fn output_types(&self) -> &[DataType] {
        &self.output_types
    }

    fn create_operator(&self, context: OperatorContext) -> BoxedOperator {
        Box::new(AggregationOperator::new(
            context,
            self.step,
            self.factories.clone(),
        ))
    }
}
