// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::collections::VecDeque;

use tracing::debug;

use super::*;
use crate::array::{ArrayImpl, I64Array};
use crate::types::DataTypeKind;

/// Numbers rows within their partition in arrival order and keeps the first `limit` of each.
///
/// The output is the projected input with one BIGINT column appended holding the 1-based
/// row number. Every input chunk yields one output chunk, possibly empty.
/// Without partition channels all rows form one partition and the operator finishes as soon
/// as `limit` rows were emitted.
pub struct RowNumberLimitOperator {
    context: OperatorContext,
    output_channels: Vec<usize>,
    output_types: Vec<DataType>,
    limit: u64,
    /// `None` when there are no partition channels.
    partitions: Option<GroupByHash>,
    /// Rows emitted so far, indexed by partition id.
    counts: Vec<u64>,
    outputs: VecDeque<DataChunk>,
    finishing: bool,
}

impl RowNumberLimitOperator {
    pub fn new(
        context: OperatorContext,
        source_types: &[DataType],
        output_channels: Vec<usize>,
        partition_channels: Vec<usize>,
        partition_types: Vec<DataType>,
        limit: u64,
        expected_partitions: usize,
    ) -> Self {
        assert!(limit > 0, "row number limit must be positive");
        let output_types = row_number_output_types(source_types, &output_channels);
        let partitions = (!partition_channels.is_empty()).then(|| {
            GroupByHash::new(partition_channels, partition_types, expected_partitions)
        });
        debug!(
            operator_id = context.operator_id(),
            limit,
            partitioned = partitions.is_some(),
            "create row number limit operator"
        );
        RowNumberLimitOperator {
            context,
            output_channels,
            output_types,
            limit,
            partitions,
            counts: vec![],
            outputs: VecDeque::new(),
            finishing: false,
        }
    }

    /// A single partition that reached the limit can take no more rows.
    fn is_exhausted(&self) -> bool {
        self.partitions.is_none() && self.counts.first() == Some(&self.limit)
    }

    fn number_rows(&mut self, chunk: &DataChunk) -> Result<(Vec<bool>, I64Array)> {
        let partition_ids = match &mut self.partitions {
            Some(partitions) => {
                let ids = partitions.get_group_ids(chunk)?;
                self.counts.resize(partitions.group_count(), 0);
                ids
            }
            None => {
                self.counts.resize(1, 0);
                ArrayImpl::new_constant(
                    &0i64.into(),
                    &DataTypeKind::Int64.not_null(),
                    chunk.cardinality(),
                )
            }
        };
        let mut selected = Vec::with_capacity(chunk.cardinality());
        let mut row_numbers = Vec::new();
        for row in 0..chunk.cardinality() {
            // ids come from the hash table and are never null
            let id = partition_ids.get_i64(row).unwrap_or_default() as usize;
            let count = &mut self.counts[id];
            if *count < self.limit {
                *count += 1;
                row_numbers.push(*count as i64);
                selected.push(true);
            } else {
                selected.push(false);
            }
        }
        Ok((selected, row_numbers.into_iter().collect()))
    }
}

impl Operator for RowNumberLimitOperator {
    fn output_types(&self) -> &[DataType] {
        &self.output_types
    }

    fn needs_input(&self) -> bool {
        !self.finishing && !self.is_exhausted() && self.outputs.is_empty()
    }

    fn add_input(&mut self, chunk: DataChunk) -> Result<()> {
        assert!(self.needs_input(), "operator does not need input");
        let (selected, row_numbers) = self.number_rows(&chunk)?;
        let output = chunk
            .project(&self.output_channels)
            .filter(&selected)
            .append_column(ArrayImpl::new_int64(row_numbers));
        self.outputs.push_back(output);
        self.context.set_memory_reservation(self.estimated_size());
        Ok(())
    }

    fn output(&mut self) -> Result<Option<DataChunk>> {
        Ok(self.outputs.pop_front())
    }

    fn finish(&mut self) {
        self.finishing = true;
    }

    fn is_finished(&self) -> bool {
        (self.finishing || self.is_exhausted()) && self.outputs.is_empty()
    }

    fn estimated_size(&self) -> usize {
        self.partitions
            .as_ref()
            .map_or(0, GroupByHash::estimated_size)
            + self.counts.capacity() * std::mem::size_of::<u64>()
            + self.outputs.iter().map(DataChunk::estimated_size).sum::<usize>()
    }
}

fn row_number_output_types(source_types: &[DataType], output_channels: &[usize]) -> Vec<DataType> {
    output_channels
        .iter()
        .map(|&channel| source_types[channel])
        .chain(std::iter::once(DataTypeKind::Int64.not_null()))
        .collect()
}

/// Creates [`RowNumberLimitOperator`]s sharing one configuration.
pub struct RowNumberLimitOperatorFactory {
    source_types: Vec<DataType>,
    output_channels: Vec<usize>,
    partition_channels: Vec<usize>,
    partition_types: Vec<DataType>,
    limit: u64,
    expected_partitions: usize,
    output_types: Vec<DataType>,
}

impl RowNumberLimitOperatorFactory {
    pub fn new(
        source_types: Vec<DataType>,
        output_channels: Vec<usize>,
        partition_channels: Vec<usize>,
        partition_types: Vec<DataType>,
        limit: u64,
        expected_partitions: usize,
    ) -> Self {
        assert!(
            output_channels.iter().all(|&c| c < source_types.len()),
            "output channel out of range"
        );
        assert_eq!(partition_channels.len(), partition_types.len());
        let output_types = row_number_output_types(&source_types, &output_channels);
        RowNumberLimitOperatorFactory {
            source_types,
            output_channels,
            partition_channels,
            partition_types,
            limit,
            expected_partitions,
            output_types,
        }
    }
}

impl OperatorFactory for RowNumberLimitOperatorFactory {
    fn output_types(&self) -> &[DataType] {
        &self.output_types
    }

    fn create_operator(&self, context: OperatorContext) -> BoxedOperator {
        Box::new(RowNumberLimitOperator::new(
            context,
            &self.source_types,
            self.output_channels.clone(),
            self.partition_channels.clone(),
            self.partition_types.clone(),
            self.limit,
            self.expected_partitions,
        ))
    }
}
