// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use serde::{Deserialize, Serialize};

use super::ArrayImpl;

/// One value repeated `len` times.
///
/// The value is kept as a single-row array so that it carries its physical type, including
/// for NULL.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConstantArray {
    value: ArrayImpl,
    len: usize,
}

impl ConstantArray {
    /// Creates a constant array from a single-row `value`.
    ///
    /// Nested constants are flattened.
    pub fn new(value: ArrayImpl, len: usize) -> Self {
        assert_eq!(value.len(), 1, "constant value must have exactly one row");
        let value = match value {
            ArrayImpl::Constant(inner) => inner.value.clone(),
            value => value,
        };
        Self { value, len }
    }

    /// The single-row array holding the repeated value.
    pub fn value(&self) -> &ArrayImpl {
        &self.value
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(super) fn check_index(&self, idx: usize) {
        assert!(
            idx < self.len,
            "index out of bounds: the len is {} but the index is {idx}",
            self.len
        );
    }
}
