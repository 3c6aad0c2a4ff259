// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::sync::Arc;

use itertools::Itertools;
use smallvec::SmallVec;
use tracing::debug;

use super::*;
use crate::array::DataChunk;
use crate::Error;

/// Creates accumulators that share one binding of an aggregate function.
pub trait AccumulatorFactory: Send + Sync {
    fn input_channels(&self) -> &[usize];

    fn final_type(&self) -> DataType;

    fn intermediate_types(&self) -> &[DataType];

    /// An accumulator over raw input rows.
    fn create_accumulator(&self) -> Box<dyn Accumulator>;

    /// An accumulator over intermediate chunks produced by other accumulators.
    fn create_intermediate_accumulator(&self) -> Box<dyn Accumulator>;

    fn create_grouped_accumulator(&self) -> Box<dyn GroupedAccumulator>;

    fn create_grouped_intermediate_accumulator(&self) -> Box<dyn GroupedAccumulator>;
}

/// Bind `function` to the channels it reads.
///
/// `input_channels` must have one entry per parameter, in parameter order, and may point
/// anywhere in the input chunks. Rows whose mask is false or null are skipped, as are rows
/// whose sample weight is null or zero.
pub fn bind<F: AggregateFunction>(
    function: F,
    input_channels: Vec<usize>,
    mask_channel: Option<usize>,
    sample_weight_channel: Option<usize>,
    confidence: f64,
) -> Result<BoundAggregation<F>> {
    let signature = function.signature();
    if input_channels.len() != signature.parameter_types.len() {
        return Err(Error::arity_mismatch(
            signature.name,
            signature.parameter_types.len(),
            input_channels.len(),
        ));
    }
    if !(confidence > 0.0 && confidence <= 1.0) {
        return Err(Error::invalid_confidence(confidence));
    }
    debug!(
        function = %signature,
        ?input_channels,
        ?mask_channel,
        ?sample_weight_channel,
        confidence,
        "bind aggregation"
    );
    Ok(BoundAggregation {
        inner: Arc::new(Binding {
            function,
            input_channels,
            mask_channel,
            sample_weight_channel,
            confidence,
        }),
    })
}

/// An aggregate function bound to concrete channels.
pub struct BoundAggregation<F: AggregateFunction> {
    inner: Arc<Binding<F>>,
}

impl<F: AggregateFunction> Clone for BoundAggregation<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<F: AggregateFunction> BoundAggregation<F> {
    pub fn function(&self) -> &F {
        &self.inner.function
    }

    pub fn confidence(&self) -> f64 {
        self.inner.confidence
    }
}

impl<F: AggregateFunction> AccumulatorFactory for BoundAggregation<F> {
    fn input_channels(&self) -> &[usize] {
        &self.inner.input_channels
    }

    fn final_type(&self) -> DataType {
        self.inner.function.signature().final_type
    }

    fn intermediate_types(&self) -> &[DataType] {
        &self.inner.function.signature().intermediate_types
    }

    fn create_accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(GenericAccumulator::new(self.inner.clone(), Step::Raw))
    }

    fn create_intermediate_accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(GenericAccumulator::new(self.inner.clone(), Step::Intermediate))
    }

    fn create_grouped_accumulator(&self) -> Box<dyn GroupedAccumulator> {
        Box::new(GenericGroupedAccumulator::new(self.inner.clone(), Step::Raw))
    }

    fn create_grouped_intermediate_accumulator(&self) -> Box<dyn GroupedAccumulator> {
        Box::new(GenericGroupedAccumulator::new(
            self.inner.clone(),
            Step::Intermediate,
        ))
    }
}

/// Which kind of chunk an accumulator ingests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Step {
    Raw,
    Intermediate,
}

/// The immutable configuration shared by every accumulator of one binding.
pub(super) struct Binding<F> {
    pub(super) function: F,
    input_channels: Vec<usize>,
    mask_channel: Option<usize>,
    sample_weight_channel: Option<usize>,
    pub(super) confidence: f64,
}

/// Input rows that survived the mask and the sample weight.
pub(super) struct Selection<'a> {
    pub args: SmallVec<[&'a ArrayImpl; 4]>,
    /// `(row, weight)` pairs in input order.
    pub rows: Vec<(usize, u64)>,
}

fn column<'a>(chunk: &'a DataChunk, channel: usize) -> Result<&'a ArrayImpl> {
    if channel >= chunk.column_count() {
        return Err(Error::invalid_channel(channel, chunk.column_count()));
    }
    Ok(chunk.array_at(channel))
}

fn check_type(array: &ArrayImpl, expected: DataTypeKind) -> Result<()> {
    if !array.is_compatible(expected) {
        return Err(Error::type_mismatch(expected, array.type_string()));
    }
    Ok(())
}

impl<F: AggregateFunction> Binding<F> {
    /// Resolve the bound channels of `chunk` and the rows that take part in the aggregation.
    pub(super) fn select<'a>(&self, chunk: &'a DataChunk) -> Result<Selection<'a>> {
        let signature = self.function.signature();
        let args = self
            .input_channels
            .iter()
            .zip_eq(&signature.parameter_types)
            .map(|(&channel, &ty)| {
                let array = column(chunk, channel)?;
                check_type(array, ty)?;
                Ok(array)
            })
            .collect::<Result<SmallVec<_>>>()?;

        let mask = match self.mask_channel {
            Some(channel) => {
                let array = column(chunk, channel)?;
                check_type(array, DataTypeKind::Bool)?;
                Some(array)
            }
            None => None,
        };
        let weights = match self.sample_weight_channel {
            Some(channel) => {
                let array = column(chunk, channel)?;
                check_type(array, DataTypeKind::Int64)?;
                Some(array)
            }
            None => None,
        };

        let mut rows = Vec::with_capacity(chunk.cardinality());
        for row in 0..chunk.cardinality() {
            if let Some(mask) = mask {
                if mask.get_bool(row) != Some(true) {
                    continue;
                }
            }
            let weight = match weights.map(|w| w.get_i64(row)) {
                None => 1,
                Some(None) | Some(Some(0)) => continue,
                Some(Some(w)) if w < 0 => return Err(Error::negative_weight(w)),
                Some(Some(w)) => w as u64,
            };
            rows.push((row, weight));
        }
        Ok(Selection { args, rows })
    }

    /// Check that `chunk` is a serialized state of this function.
    pub(super) fn check_intermediate<'a>(
        &self,
        chunk: &'a DataChunk,
    ) -> Result<SmallVec<[&'a ArrayImpl; 4]>> {
        let expected = &self.function.signature().intermediate_types;
        let matches = chunk.column_count() == expected.len()
            && chunk
                .arrays()
                .iter()
                .zip(expected)
                .all(|(array, ty)| array.is_compatible(ty.kind()));
        if !matches {
            return Err(Error::intermediate_mismatch(
                format!("[{}]", expected.iter().format(", ")),
                format!(
                    "[{}]",
                    chunk.arrays().iter().map(|a| a.type_string()).format(", ")
                ),
            ));
        }
        Ok(chunk.arrays().iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{BoolArray, I64Array};
    use crate::types::DataValue;

    #[test]
    fn arity_and_confidence_are_checked() {
        let e = bind(Sum::<i64>::new(), vec![0, 1], None, None, 1.0).err().unwrap();
        assert_eq!(e.to_string(), "function sum expects 1 arguments but got 2");
        assert!(bind(Sum::<i64>::new(), vec![0], None, None, 0.0).is_err());
        assert!(bind(Sum::<i64>::new(), vec![0], None, None, 1.5).is_err());
        assert!(bind(Sum::<i64>::new(), vec![0], None, None, f64::NAN).is_err());
        assert!(bind(Sum::<i64>::new(), vec![0], None, None, 0.5).is_ok());
    }

    #[test]
    fn selection_skips_masked_and_unweighted_rows() {
        let binding = bind(Count::star(), vec![], Some(0), Some(1), 1.0).unwrap();
        let chunk: DataChunk = [
            ArrayImpl::new_bool(
                [Some(true), Some(false), None, Some(true), Some(true)]
                    .into_iter()
                    .collect::<BoolArray>(),
            ),
            ArrayImpl::new_int64(
                [Some(2), Some(2), Some(2), None, Some(0)]
                    .into_iter()
                    .collect::<I64Array>(),
            ),
        ]
        .into_iter()
        .collect();
        let selection = binding.inner.select(&chunk).unwrap();
        assert_eq!(selection.rows, vec![(0, 2)]);
    }

    #[test]
    fn negative_weight_is_an_error() {
        let binding = bind(Count::star(), vec![], None, Some(0), 1.0).unwrap();
        let chunk: DataChunk = [ArrayImpl::new_int64([1, -1].into_iter().collect())]
            .into_iter()
            .collect();
        assert!(binding.inner.select(&chunk).is_err());
    }

    #[test]
    fn channel_out_of_range() {
        let binding = bind(Sum::<i64>::new(), vec![3], None, None, 1.0).unwrap();
        let chunk: DataChunk = [ArrayImpl::new_int64([1].into_iter().collect())]
            .into_iter()
            .collect();
        let e = binding.inner.select(&chunk).err().unwrap();
        assert_eq!(
            e.to_string(),
            "channel 3 is out of range for a chunk with 1 columns"
        );
    }

    #[test]
    fn argument_type_is_checked() {
        let binding = bind(Sum::<i64>::new(), vec![0], None, None, 1.0).unwrap();
        let chunk: DataChunk = [ArrayImpl::new_utf8([Some("x")].into_iter().collect())]
            .into_iter()
            .collect();
        assert!(binding.inner.select(&chunk).is_err());

        // a constant NULL column is accepted for any parameter type
        let chunk: DataChunk = [ArrayImpl::new_null(&DataTypeKind::Bool.into(), 1)]
            .into_iter()
            .collect();
        let selection = binding.inner.select(&chunk).unwrap();
        assert_eq!(selection.args[0].get(0), DataValue::Null);

        let nulls: DataChunk = [ArrayImpl::new_null(&DataTypeKind::Null.into(), 2)]
            .into_iter()
            .collect();
        let mut accumulator = binding.create_accumulator();
        accumulator.add_input(&chunk).unwrap();
        accumulator.add_input(&nulls).unwrap();
        assert_eq!(accumulator.evaluate_final().get(0), DataValue::Null);
    }

    #[test]
    fn null_constant_intermediate() {
        let chunk: DataChunk = [ArrayImpl::new_null(&DataTypeKind::Bool.into(), 1)]
            .into_iter()
            .collect();

        let sum = bind(Sum::<i64>::new(), vec![0], None, None, 1.0).unwrap();
        let mut merger = sum.create_intermediate_accumulator();
        merger.add_intermediate(&chunk).unwrap();
        assert_eq!(merger.evaluate_final().get(0), DataValue::Null);

        let count = bind(Count::star(), vec![], None, None, 1.0).unwrap();
        let mut merger = count.create_intermediate_accumulator();
        merger.add_intermediate(&chunk).unwrap();
        assert_eq!(merger.evaluate_final().get(0), DataValue::Int64(0));

        // a non-null constant of the wrong type is still rejected
        let chunk: DataChunk = [ArrayImpl::new_constant(
            &DataValue::Bool(true),
            &DataTypeKind::Bool.into(),
            1,
        )]
        .into_iter()
        .collect();
        let mut merger = count.create_intermediate_accumulator();
        let e = merger.add_intermediate(&chunk).unwrap_err();
        assert!(e.to_string().starts_with("malformed intermediate chunk"), "{e}");
    }
}
