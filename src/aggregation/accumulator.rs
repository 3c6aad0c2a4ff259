// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::sync::Arc;

use super::factory::{Binding, Step};
use super::*;
use crate::array::DataChunk;

/// Accumulates one aggregate over a single group.
///
/// Evaluation consumes the accumulator, so a state can be read only once and never fed
/// again afterwards.
pub trait Accumulator: Send {
    fn final_type(&self) -> DataType;

    fn intermediate_types(&self) -> &[DataType];

    /// Fold the selected rows of a raw input chunk.
    ///
    /// # Panics
    ///
    /// Panics if this accumulator was created for intermediate input.
    fn add_input(&mut self, chunk: &DataChunk) -> Result<()>;

    /// Merge every row of a serialized state. An empty chunk is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if this accumulator was created for raw input.
    fn add_intermediate(&mut self, chunk: &DataChunk) -> Result<()>;

    /// Serialize the state into a one-row chunk of [`Self::intermediate_types`].
    fn evaluate_intermediate(self: Box<Self>) -> DataChunk;

    /// Produce the one-row final value.
    fn evaluate_final(self: Box<Self>) -> ArrayImpl;

    fn estimated_size(&self) -> usize;
}

pub(super) struct GenericAccumulator<F: AggregateFunction> {
    binding: Arc<Binding<F>>,
    state: F::State,
    step: Step,
}

impl<F: AggregateFunction> GenericAccumulator<F> {
    pub(super) fn new(binding: Arc<Binding<F>>, step: Step) -> Self {
        let state = binding.function.create_state();
        Self {
            binding,
            state,
            step,
        }
    }
}

impl<F: AggregateFunction> Accumulator for GenericAccumulator<F> {
    fn final_type(&self) -> DataType {
        self.binding.function.signature().final_type
    }

    fn intermediate_types(&self) -> &[DataType] {
        &self.binding.function.signature().intermediate_types
    }

    fn add_input(&mut self, chunk: &DataChunk) -> Result<()> {
        assert_eq!(
            self.step,
            Step::Raw,
            "raw input fed to an intermediate accumulator"
        );
        let selection = self.binding.select(chunk)?;
        for &(row, weight) in &selection.rows {
            self.state.update(&selection.args, row, weight)?;
        }
        Ok(())
    }

    fn add_intermediate(&mut self, chunk: &DataChunk) -> Result<()> {
        assert_eq!(
            self.step,
            Step::Intermediate,
            "intermediate input fed to a raw accumulator"
        );
        if chunk.is_empty() {
            return Ok(());
        }
        let columns = self.binding.check_intermediate(chunk)?;
        for row in 0..chunk.cardinality() {
            self.state.merge(&columns, row)?;
        }
        Ok(())
    }

    fn evaluate_intermediate(self: Box<Self>) -> DataChunk {
        let types = &self.binding.function.signature().intermediate_types;
        let mut builders = types
            .iter()
            .map(|ty| ArrayBuilderImpl::with_capacity(1, ty))
            .collect::<Vec<_>>();
        self.state.output_intermediate(&mut builders);
        builders.into_iter().collect()
    }

    fn evaluate_final(self: Box<Self>) -> ArrayImpl {
        let ty = self.binding.function.signature().final_type;
        let mut builder = ArrayBuilderImpl::with_capacity(1, &ty);
        self.state
            .output_final(&mut builder, self.binding.confidence);
        builder.finish()
    }

    fn estimated_size(&self) -> usize {
        self.state.estimated_size()
    }
}
