// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! The aggregation state protocol.
//!
//! An aggregate function only describes how to fold one row into a state, how to merge a
//! serialized state, and how to output one. [`bind`] fixes the channels it reads and yields
//! an [`AccumulatorFactory`] whose accumulators run the same function in every mode:
//! single-stage, partial (intermediate output), final (intermediate input) and grouped.

use std::fmt;
use std::sync::Arc;

use crate::array::{ArrayBuilderImpl, ArrayImpl};
use crate::types::{DataType, DataTypeKind};
use crate::Result;

mod accumulator;
mod approx_count;
mod avg;
mod count;
mod factory;
mod grouped;
mod min_max;
mod registry;
mod sum;
#[cfg(test)]
pub(crate) mod test_utils;

pub use self::accumulator::*;
pub use self::approx_count::*;
pub use self::avg::*;
pub use self::count::*;
pub use self::factory::*;
pub use self::grouped::*;
pub use self::min_max::*;
pub use self::registry::*;
pub use self::sum::*;

/// The declared shape of an aggregate function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: &'static str,
    pub parameter_types: Vec<DataTypeKind>,
    /// The serialized state may span several columns, e.g. `avg` keeps a count and a sum.
    pub intermediate_types: Vec<DataType>,
    pub final_type: DataType,
    /// Whether the result depends on the sample weight and the confidence.
    pub approximate: bool,
}

impl Signature {
    pub fn new(
        name: &'static str,
        parameter_types: Vec<DataTypeKind>,
        intermediate_types: Vec<DataType>,
        final_type: DataType,
    ) -> Self {
        Signature {
            name,
            parameter_types,
            intermediate_types,
            final_type,
            approximate: false,
        }
    }

    pub fn approximate(mut self) -> Self {
        self.approximate = true;
        self
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, ty) in self.parameter_types.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{ty}")?;
        }
        write!(f, ") -> {}", self.final_type)
    }
}

/// `AggregationState` records the state of an aggregation over one group.
///
/// Arguments have already been checked against the signature and rows excluded by the mask
/// or the sample weight never reach the state.
pub trait AggregationState: Send + 'static {
    /// Fold row `row` of `args` into the state. `weight` is the number of input rows the row
    /// stands for, 1 unless a sample weight channel is bound.
    fn update(&mut self, args: &[&ArrayImpl], row: usize, weight: u64) -> Result<()>;

    /// Merge row `row` of a serialized state.
    fn merge(&mut self, intermediate: &[&ArrayImpl], row: usize) -> Result<()>;

    /// Append the serialized state, one value per intermediate column.
    fn output_intermediate(&self, builders: &mut [ArrayBuilderImpl]);

    /// Append the final value.
    fn output_final(&self, builder: &mut ArrayBuilderImpl, confidence: f64);

    fn estimated_size(&self) -> usize {
        std::mem::size_of_val(self)
    }
}

/// An aggregate function instantiated for concrete argument types.
pub trait AggregateFunction: Clone + Send + Sync + 'static {
    type State: AggregationState;

    fn signature(&self) -> &Signature;

    /// Create an empty state.
    fn create_state(&self) -> Self::State;
}

/// Type-erased aggregate function, as stored in the registry and handed to operators.
pub trait InternalAggregationFunction: Send + Sync {
    fn signature(&self) -> &Signature;

    fn bind(
        &self,
        input_channels: Vec<usize>,
        mask_channel: Option<usize>,
        sample_weight_channel: Option<usize>,
        confidence: f64,
    ) -> Result<Arc<dyn AccumulatorFactory>>;
}

pub type AggregationFunctionRef = Arc<dyn InternalAggregationFunction>;

impl<F: AggregateFunction> InternalAggregationFunction for F {
    fn signature(&self) -> &Signature {
        AggregateFunction::signature(self)
    }

    fn bind(
        &self,
        input_channels: Vec<usize>,
        mask_channel: Option<usize>,
        sample_weight_channel: Option<usize>,
        confidence: f64,
    ) -> Result<Arc<dyn AccumulatorFactory>> {
        let bound = bind(
            self.clone(),
            input_channels,
            mask_channel,
            sample_weight_channel,
            confidence,
        )?;
        Ok(Arc::new(bound))
    }
}
