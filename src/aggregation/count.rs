// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use super::*;
use crate::types::DataValue;
use crate::Error;

/// `count(*)` and `count(x)`.
#[derive(Debug, Clone)]
pub struct Count {
    signature: Signature,
}

impl Count {
    /// Count every row.
    pub fn star() -> Self {
        Self::with_parameters(vec![])
    }

    /// Count rows where the argument is not null.
    pub fn new(kind: DataTypeKind) -> Self {
        Self::with_parameters(vec![kind])
    }

    fn with_parameters(parameter_types: Vec<DataTypeKind>) -> Self {
        Count {
            signature: Signature::new(
                "count",
                parameter_types,
                vec![DataTypeKind::Int64.not_null()],
                DataTypeKind::Int64.not_null(),
            ),
        }
    }
}

impl AggregateFunction for Count {
    type State = CountState;

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn create_state(&self) -> CountState {
        CountState {
            count: 0,
            star: self.signature.parameter_types.is_empty(),
        }
    }
}

pub struct CountState {
    count: i64,
    star: bool,
}

impl CountState {
    fn add(&mut self, n: i64) -> Result<()> {
        self.count = self
            .count
            .checked_add(n)
            .ok_or_else(|| Error::overflow("count"))?;
        Ok(())
    }
}

impl AggregationState for CountState {
    fn update(&mut self, args: &[&ArrayImpl], row: usize, weight: u64) -> Result<()> {
        if self.star || !args[0].is_null(row) {
            self.add(weight as i64)?;
        }
        Ok(())
    }

    fn merge(&mut self, intermediate: &[&ArrayImpl], row: usize) -> Result<()> {
        self.add(intermediate[0].get_i64(row).unwrap_or(0))
    }

    fn output_intermediate(&self, builders: &mut [ArrayBuilderImpl]) {
        builders[0].push(&DataValue::Int64(self.count));
    }

    fn output_final(&self, builder: &mut ArrayBuilderImpl, _confidence: f64) {
        builder.push(&DataValue::Int64(self.count));
    }
}
