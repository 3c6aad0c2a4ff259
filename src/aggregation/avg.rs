// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::marker::PhantomData;

use super::*;
use crate::types::DataValue;
use crate::Error;

/// `avg(x)` over BIGINT or DOUBLE, producing DOUBLE.
///
/// The serialized state is two columns: the row count and the running sum.
pub struct Avg<T> {
    signature: Signature,
    _type: PhantomData<fn() -> T>,
}

impl<T> Clone for Avg<T> {
    fn clone(&self) -> Self {
        Self {
            signature: self.signature.clone(),
            _type: PhantomData,
        }
    }
}

impl<T: SumType> Avg<T> {
    pub fn new() -> Self {
        Avg {
            signature: Signature::new(
                "avg",
                vec![T::KIND],
                vec![DataTypeKind::Int64.not_null(), T::KIND.not_null()],
                DataTypeKind::Float64.nullable(),
            ),
            _type: PhantomData,
        }
    }
}

impl<T: SumType> Default for Avg<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SumType> AggregateFunction for Avg<T> {
    type State = AvgState<T>;

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn create_state(&self) -> AvgState<T> {
        AvgState {
            count: 0,
            sum: T::default(),
        }
    }
}

pub struct AvgState<T> {
    count: i64,
    sum: T,
}

impl<T: SumType> AvgState<T> {
    fn add(&mut self, count: i64, sum: T) -> Result<()> {
        self.count = self
            .count
            .checked_add(count)
            .ok_or_else(|| Error::overflow("avg"))?;
        self.sum = self
            .sum
            .checked_add(sum)
            .ok_or_else(|| Error::overflow("avg"))?;
        Ok(())
    }
}

impl<T: SumType> AggregationState for AvgState<T> {
    fn update(&mut self, args: &[&ArrayImpl], row: usize, weight: u64) -> Result<()> {
        if let Some(value) = T::read(args[0], row) {
            let value = value
                .checked_scale(weight)
                .ok_or_else(|| Error::overflow("avg"))?;
            self.add(weight as i64, value)?;
        }
        Ok(())
    }

    fn merge(&mut self, intermediate: &[&ArrayImpl], row: usize) -> Result<()> {
        let count = intermediate[0].get_i64(row).unwrap_or(0);
        let sum = T::read(intermediate[1], row).unwrap_or_default();
        self.add(count, sum)
    }

    fn output_intermediate(&self, builders: &mut [ArrayBuilderImpl]) {
        builders[0].push(&DataValue::Int64(self.count));
        builders[1].push(&self.sum.into_value());
    }

    fn output_final(&self, builder: &mut ArrayBuilderImpl, _confidence: f64) {
        if self.count == 0 {
            builder.push(&DataValue::Null);
            return;
        }
        let sum = self.sum.to_f64().unwrap_or(f64::NAN);
        builder.push(&DataValue::from(sum / self.count as f64));
    }
}
