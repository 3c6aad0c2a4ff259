// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::ops::Range;
use std::sync::Arc;

use tracing::debug;

use super::*;
use crate::aggregation::{AccumulatorFactory, GroupedAccumulator};
use crate::array::ArrayBuilderImpl;

/// Aggregation with group-by.
///
/// The output has one row per group: the key values followed by the outputs of every
/// aggregation, in chunks of at most the processing window size. Groups come out in order
/// of first appearance. In the final step the input is the output of the partial step, so
/// the intermediate columns follow the group-by channels.
pub struct HashAggregationOperator {
    context: OperatorContext,
    step: AggregationStep,
    groups: GroupByHash,
    accumulators: Vec<Box<dyn GroupedAccumulator>>,
    intermediate_ranges: Vec<Range<usize>>,
    output_types: Vec<DataType>,
    /// The next group to output once finishing.
    next_group: usize,
    finishing: bool,
}

impl HashAggregationOperator {
    pub fn new(
        context: OperatorContext,
        step: AggregationStep,
        group_by_channels: Vec<usize>,
        group_by_types: Vec<DataType>,
        factories: Vec<Arc<dyn AccumulatorFactory>>,
        expected_groups: usize,
    ) -> Self {
        let accumulators = factories
            .iter()
            .map(|factory| {
                if step.is_input_raw() {
                    factory.create_grouped_accumulator()
                } else {
                    factory.create_grouped_intermediate_accumulator()
                }
            })
            .collect();
        let output_types = group_by_types
            .iter()
            .cloned()
            .chain(
                factories
                    .iter()
                    .flat_map(|factory| step.output_types(factory.as_ref())),
            )
            .collect();
        let intermediate_ranges = intermediate_ranges(&factories, group_by_channels.len());
        debug!(
            operator_id = context.operator_id(),
            ?step,
            keys = group_by_channels.len(),
            aggregations = factories.len(),
            "create hash aggregation operator"
        );
        HashAggregationOperator {
            context,
            step,
            groups: GroupByHash::new(group_by_channels, group_by_types, expected_groups),
            accumulators,
            intermediate_ranges,
            output_types,
            next_group: 0,
            finishing: false,
        }
    }

    /// Build the output rows of the next window of groups.
    fn build_output(&mut self) -> Option<DataChunk> {
        let end = self.groups.group_count();
        if self.next_group == end {
            return None;
        }
        let window = self.context.options().processing_window_size.max(1);
        let range = self.next_group..end.min(self.next_group + window);
        let mut builders = self
            .output_types
            .iter()
            .map(|ty| ArrayBuilderImpl::with_capacity(range.len(), ty))
            .collect::<Vec<_>>();
        let (key_builders, agg_builders) = builders.split_at_mut(self.groups.types().len());
        for group_id in range.clone() {
            let group_id = group_id as i64;
            self.groups.append_keys_to(group_id, key_builders);
            let mut rest = &mut *agg_builders;
            for accumulator in &mut self.accumulators {
                if self.step.is_output_partial() {
                    let width = accumulator.intermediate_types().len();
                    let (current, tail) = std::mem::take(&mut rest).split_at_mut(width);
                    accumulator.evaluate_intermediate(group_id, current);
                    rest = tail;
                } else {
                    let (current, tail) = std::mem::take(&mut rest).split_at_mut(1);
                    accumulator.evaluate_final(group_id, &mut current[0]);
                    rest = tail;
                }
            }
        }
        self.next_group = range.end;
        Some(DataChunk::new(
            builders.into_iter().map(ArrayBuilderImpl::finish).collect(),
            range.len(),
        ))
    }
}

impl Operator for HashAggregationOperator {
    fn output_types(&self) -> &[DataType] {
        &self.output_types
    }

    fn needs_input(&self) -> bool {
        !self.finishing
    }

    fn add_input(&mut self, chunk: DataChunk) -> Result<()> {
        assert!(self.needs_input(), "operator does not need input");
        if chunk.is_empty() && !self.step.is_input_raw() {
            return Ok(());
        }
        let group_ids = self.groups.get_group_ids(&chunk)?;
        for (accumulator, range) in self.accumulators.iter_mut().zip(&self.intermediate_ranges) {
            if self.step.is_input_raw() {
                accumulator.add_input(&group_ids, &chunk)?;
            } else {
                let intermediate = project_intermediate(&chunk, range)?;
                accumulator.add_intermediate(&group_ids, &intermediate)?;
            }
        }
        let size = self.estimated_size();
        self.context.set_memory_reservation(size);
        Ok(())
    }

    fn output(&mut self) -> Result<Option<DataChunk>> {
        if !self.finishing {
            return Ok(None);
        }
        Ok(self.build_output())
    }

    fn finish(&mut self) {
        if !self.finishing {
            debug!(
                operator_id = self.context.operator_id(),
                groups = self.groups.group_count(),
                "hash aggregation input finished"
            );
        }
        self.finishing = true;
    }

    fn is_finished(&self) -> bool {
        self.finishing && self.next_group == self.groups.group_count()
    }

    fn estimated_size(&self) -> usize {
        self.groups.estimated_size()
            + self
                .accumulators
                .iter()
                .map(|a| a.estimated_size())
                .sum::<usize>()
    }
}

/// Creates [`HashAggregationOperator`]s.
pub struct HashAggregationOperatorFactory {
    step: AggregationStep,
    group_by_channels: Vec<usize>,
    group_by_types: Vec<DataType>,
    factories: Vec<Arc<dyn AccumulatorFactory>>,
    expected_groups: usize,
    output_types: Vec<DataType>,
}

impl HashAggregationOperatorFactory {
    pub fn new(
        step: AggregationStep,
        group_by_channels: Vec<usize>,
        group_by_types: Vec<DataType>,
        factories: Vec<Arc<dyn AccumulatorFactory>>,
        expected_groups: usize,
    ) -> Self {
        let output_types = group_by_types
            .iter()
            .cloned()
            .chain(
                factories
                    .iter()
                    .flat_map(|factory| step.output_types(factory.as_ref())),
            )
            .collect();
        HashAggregationOperatorFactory {
            step,
            group_by_channels,
            group_by_types,
            factories,
            expected_groups,
            output_types,
        }
    }
}

impl OperatorFactory for HashAggregationOperatorFactory {
    fn output_types(&self) -> &[DataType] {
        &self.output_types
    }

    fn create_operator(&self, context: OperatorContext) -> BoxedOperator {
        Box::new(HashAggregationOperator::new(
            context,
            self.step,
            self.group_by_channels.clone(),
            self.group_by_types.clone(),
            self.factories.clone(),
            self.expected_groups,
        ))
    }
}
