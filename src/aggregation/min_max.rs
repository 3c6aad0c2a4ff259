// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use super::*;
use crate::types::DataValue;

/// `min(x)` or `max(x)` for any orderable type. Null on empty input.
#[derive(Debug, Clone)]
pub struct MinMax {
    signature: Signature,
    is_min: bool,
}

impl MinMax {
    pub fn min(kind: DataTypeKind) -> Self {
        Self::new(kind, true)
    }

    pub fn max(kind: DataTypeKind) -> Self {
        Self::new(kind, false)
    }

    fn new(kind: DataTypeKind, is_min: bool) -> Self {
        MinMax {
            signature: Signature::new(
                if is_min { "min" } else { "max" },
                vec![kind],
                vec![kind.nullable()],
                kind.nullable(),
            ),
            is_min,
        }
    }
}

impl AggregateFunction for MinMax {
    type State = MinMaxState;

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn create_state(&self) -> MinMaxState {
        MinMaxState {
            result: DataValue::Null,
            is_min: self.is_min,
        }
    }
}

/// State for min or max aggregation
pub struct MinMaxState {
    result: DataValue,
    is_min: bool,
}

impl MinMaxState {
    fn offer(&mut self, value: DataValue) {
        if value.is_null() {
            return;
        }
        let replace = match self.result {
            DataValue::Null => true,
            ref result if self.is_min => value < *result,
            ref result => value > *result,
        };
        if replace {
            self.result = value;
        }
    }
}

impl AggregationState for MinMaxState {
    fn update(&mut self, args: &[&ArrayImpl], row: usize, _weight: u64) -> Result<()> {
        self.offer(args[0].get(row));
        Ok(())
    }

    fn merge(&mut self, intermediate: &[&ArrayImpl], row: usize) -> Result<()> {
        self.offer(intermediate[0].get(row));
        Ok(())
    }

    fn output_intermediate(&self, builders: &mut [ArrayBuilderImpl]) {
        builders[0].push(&self.result);
    }

    fn output_final(&self, builder: &mut ArrayBuilderImpl, _confidence: f64) {
        builder.push(&self.result);
    }

    fn estimated_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.result.as_str().map_or(0, str::len)
    }
}
