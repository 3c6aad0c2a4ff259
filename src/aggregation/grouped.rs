// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::sync::Arc;

use ahash::HashMap;
use bitvec::vec::BitVec;

use super::factory::{Binding, Step};
use super::*;
use crate::array::DataChunk;
use crate::Error;

/// Accumulates one aggregate for many groups, addressed by group id.
///
/// Group ids are non-negative and may be sparse: touching ids 0 and 4000 allocates two
/// states, not 4001.
pub trait GroupedAccumulator: Send {
    fn final_type(&self) -> DataType;

    fn intermediate_types(&self) -> &[DataType];

    /// Route each selected row of `chunk` to the group in the same position of `group_ids`.
    ///
    /// # Panics
    ///
    /// Panics if this accumulator was created for intermediate input, or if a row is routed
    /// to a group that was already evaluated.
    fn add_input(&mut self, group_ids: &ArrayImpl, chunk: &DataChunk) -> Result<()>;

    /// Merge each row of a serialized state into its group.
    ///
    /// # Panics
    ///
    /// Panics if this accumulator was created for raw input, or if a row is routed to a group
    /// that was already evaluated.
    fn add_intermediate(&mut self, group_ids: &ArrayImpl, chunk: &DataChunk) -> Result<()>;

    /// Append the serialized state of `group_id`, one value per builder.
    ///
    /// # Panics
    ///
    /// Panics if `group_id` was already evaluated.
    fn evaluate_intermediate(&mut self, group_id: i64, builders: &mut [ArrayBuilderImpl]);

    /// Append the final value of `group_id`.
    ///
    /// # Panics
    ///
    /// Panics if `group_id` was already evaluated.
    fn evaluate_final(&mut self, group_id: i64, builder: &mut ArrayBuilderImpl);

    /// Number of groups holding a state.
    fn group_count(&self) -> usize;

    fn estimated_size(&self) -> usize;
}

/// States stored densely in insertion order, found through an id to slot index.
pub struct GroupedStates<S> {
    slots: Vec<S>,
    index: HashMap<i64, usize>,
}

impl<S> Default for GroupedStates<S> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::default(),
        }
    }
}

impl<S> GroupedStates<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the slot of `group_id`, creating its state with `create` on first use.
    pub fn slot_or_insert_with(&mut self, group_id: i64, create: impl FnOnce() -> S) -> usize {
        let slots = &mut self.slots;
        *self.index.entry(group_id).or_insert_with(|| {
            slots.push(create());
            slots.len() - 1
        })
    }

    pub fn slot(&self, group_id: i64) -> Option<usize> {
        self.index.get(&group_id).copied()
    }

    pub fn get(&self, group_id: i64) -> Option<&S> {
        self.slot(group_id).map(|slot| &self.slots[slot])
    }

    pub fn get_mut_by_slot(&mut self, slot: usize) -> &mut S {
        &mut self.slots[slot]
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &S> {
        self.slots.iter()
    }

    /// Memory used by the index, not counting the states themselves.
    pub fn index_size(&self) -> usize {
        self.index.capacity() * (std::mem::size_of::<i64>() + std::mem::size_of::<usize>())
    }
}

fn group_id_at(group_ids: &ArrayImpl, position: usize) -> Result<i64> {
    match group_ids.get_i64(position) {
        Some(id) if id >= 0 => Ok(id),
        Some(id) => Err(Error::invalid_group_id(position, id)),
        None => Err(Error::invalid_group_id(position, "NULL")),
    }
}

fn check_group_ids(group_ids: &ArrayImpl, chunk: &DataChunk) -> Result<()> {
    assert_eq!(
        group_ids.len(),
        chunk.cardinality(),
        "group ids must have one entry per row"
    );
    if !group_ids.is_compatible(DataTypeKind::Int64) {
        return Err(Error::type_mismatch(DataTypeKind::Int64, group_ids.type_string()));
    }
    Ok(())
}

pub(super) struct GenericGroupedAccumulator<F: AggregateFunction> {
    binding: Arc<Binding<F>>,
    states: GroupedStates<F::State>,
    /// Slots that have been evaluated and must not receive more rows.
    finalized: BitVec,
    step: Step,
}

impl<F: AggregateFunction> GenericGroupedAccumulator<F> {
    pub(super) fn new(binding: Arc<Binding<F>>, step: Step) -> Self {
        Self {
            binding,
            states: GroupedStates::new(),
            finalized: BitVec::new(),
            step,
        }
    }

    fn slot_for_update(&mut self, group_id: i64) -> usize {
        let function = &self.binding.function;
        let slot = self
            .states
            .slot_or_insert_with(group_id, || function.create_state());
        if slot == self.finalized.len() {
            self.finalized.push(false);
        }
        assert!(
            !self.finalized[slot],
            "group {group_id} received input after it was evaluated"
        );
        slot
    }

    fn slot_for_evaluate(&mut self, group_id: i64) -> usize {
        let function = &self.binding.function;
        let slot = self
            .states
            .slot_or_insert_with(group_id, || function.create_state());
        if slot == self.finalized.len() {
            self.finalized.push(true);
        } else {
            assert!(!self.finalized[slot], "group {group_id} was already evaluated");
            self.finalized.set(slot, true);
        }
        slot
    }
}

impl<F: AggregateFunction> GroupedAccumulator for GenericGroupedAccumulator<F> {
    fn final_type(&self) -> DataType {
        self.binding.function.signature().final_type
    }

    fn intermediate_types(&self) -> &[DataType] {
        &self.binding.function.signature().intermediate_types
    }

    fn add_input(&mut self, group_ids: &ArrayImpl, chunk: &DataChunk) -> Result<()> {
        assert_eq!(
            self.step,
            Step::Raw,
            "raw input fed to an intermediate accumulator"
        );
        check_group_ids(group_ids, chunk)?;
        let binding = self.binding.clone();
        let selection = binding.select(chunk)?;
        let ids = selection
            .rows
            .iter()
            .map(|&(row, _)| group_id_at(group_ids, row))
            .collect::<Result<Vec<_>>>()?;
        for (&(row, weight), group_id) in selection.rows.iter().zip(ids) {
            let slot = self.slot_for_update(group_id);
            self.states
                .get_mut_by_slot(slot)
                .update(&selection.args, row, weight)?;
        }
        Ok(())
    }

    fn add_intermediate(&mut self, group_ids: &ArrayImpl, chunk: &DataChunk) -> Result<()> {
        assert_eq!(
            self.step,
            Step::Intermediate,
            "intermediate input fed to a raw accumulator"
        );
        if chunk.is_empty() {
            return Ok(());
        }
        check_group_ids(group_ids, chunk)?;
        let binding = self.binding.clone();
        let columns = binding.check_intermediate(chunk)?;
        let ids = (0..chunk.cardinality())
            .map(|row| group_id_at(group_ids, row))
            .collect::<Result<Vec<_>>>()?;
        for (row, group_id) in ids.into_iter().enumerate() {
            let slot = self.slot_for_update(group_id);
            self.states.get_mut_by_slot(slot).merge(&columns, row)?;
        }
        Ok(())
    }

    fn evaluate_intermediate(&mut self, group_id: i64, builders: &mut [ArrayBuilderImpl]) {
        let slot = self.slot_for_evaluate(group_id);
        self.states.get_mut_by_slot(slot).output_intermediate(builders);
    }

    fn evaluate_final(&mut self, group_id: i64, builder: &mut ArrayBuilderImpl) {
        let slot = self.slot_for_evaluate(group_id);
        let confidence = self.binding.confidence;
        self.states
            .get_mut_by_slot(slot)
            .output_final(builder, confidence);
    }

    fn group_count(&self) -> usize {
        self.states.len()
    }

    fn estimated_size(&self) -> usize {
        self.states.iter().map(|s| s.estimated_size()).sum::<usize>()
            + self.states.index_size()
            + self.finalized.capacity() / 8
    }
}
