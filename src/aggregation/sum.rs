// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::marker::PhantomData;

use num_traits::ToPrimitive;

use super::*;
use crate::types::DataValue;
use crate::Error;

/// Numeric types `sum` and `avg` accumulate in.
pub trait SumType: ToPrimitive + Copy + Default + Send + Sync + 'static {
    const KIND: DataTypeKind;

    fn read(array: &ArrayImpl, row: usize) -> Option<Self>;

    fn checked_add(self, rhs: Self) -> Option<Self>;

    /// Scale a value by its sample weight.
    fn checked_scale(self, weight: u64) -> Option<Self>;

    fn into_value(self) -> DataValue;
}

impl SumType for i64 {
    const KIND: DataTypeKind = DataTypeKind::Int64;

    fn read(array: &ArrayImpl, row: usize) -> Option<Self> {
        array.get_i64(row)
    }

    fn checked_add(self, rhs: Self) -> Option<Self> {
        i64::checked_add(self, rhs)
    }

    fn checked_scale(self, weight: u64) -> Option<Self> {
        i64::try_from(weight).ok().and_then(|w| self.checked_mul(w))
    }

    fn into_value(self) -> DataValue {
        DataValue::Int64(self)
    }
}

impl SumType for f64 {
    const KIND: DataTypeKind = DataTypeKind::Float64;

    fn read(array: &ArrayImpl, row: usize) -> Option<Self> {
        array.get_f64(row)
    }

    fn checked_add(self, rhs: Self) -> Option<Self> {
        Some(self + rhs)
    }

    fn checked_scale(self, weight: u64) -> Option<Self> {
        Some(self * weight as f64)
    }

    fn into_value(self) -> DataValue {
        DataValue::from(self)
    }
}

/// `sum(x)` over BIGINT or DOUBLE. Null on empty input.
pub struct Sum<T> {
    signature: Signature,
    _type: PhantomData<fn() -> T>,
}

impl<T> Clone for Sum<T> {
    fn clone(&self) -> Self {
        Self {
            signature: self.signature.clone(),
            _type: PhantomData,
        }
    }
}

impl<T: SumType> Sum<T> {
    pub fn new() -> Self {
        Sum {
            signature: Signature::new(
                "sum",
                vec![T::KIND],
                vec![T::KIND.nullable()],
                T::KIND.nullable(),
            ),
            _type: PhantomData,
        }
    }
}

impl<T: SumType> Default for Sum<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SumType> AggregateFunction for Sum<T> {
    type State = SumState<T>;

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn create_state(&self) -> SumState<T> {
        SumState { sum: None }
    }
}

pub struct SumState<T> {
    sum: Option<T>,
}

impl<T: SumType> SumState<T> {
    fn add(&mut self, value: T) -> Result<()> {
        let sum = self
            .sum
            .unwrap_or_default()
            .checked_add(value)
            .ok_or_else(|| Error::overflow("sum"))?;
        self.sum = Some(sum);
        Ok(())
    }

    fn value(&self) -> DataValue {
        self.sum.map_or(DataValue::Null, T::into_value)
    }
}

impl<T: SumType> AggregationState for SumState<T> {
    fn update(&mut self, args: &[&ArrayImpl], row: usize, weight: u64) -> Result<()> {
        if let Some(value) = T::read(args[0], row) {
            let value = value
                .checked_scale(weight)
                .ok_or_else(|| Error::overflow("sum"))?;
            self.add(value)?;
        }
        Ok(())
    }

    fn merge(&mut self, intermediate: &[&ArrayImpl], row: usize) -> Result<()> {
        match T::read(intermediate[0], row) {
            Some(value) => self.add(value),
            None => Ok(()),
        }
    }

    fn output_intermediate(&self, builders: &mut [ArrayBuilderImpl]) {
        builders[0].push(&self.value());
    }

    fn output_final(&self, builder: &mut ArrayBuilderImpl, _confidence: f64) {
        builder.push(&self.value());
    }
}
