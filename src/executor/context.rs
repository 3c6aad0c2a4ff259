// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Deserialize;

use super::PROCESSING_WINDOW_SIZE;

/// Options for operators
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExecutorOptions {
    /// Maximum number of rows in an output chunk
    pub processing_window_size: usize,

    /// Confidence used by approximate aggregates when the plan does not request one
    pub default_confidence: f64,

    /// Sizing hint for partition and group tables
    pub expected_partitions: usize,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            processing_window_size: PROCESSING_WINDOW_SIZE,
            default_confidence: 1.0,
            expected_partitions: 10_000,
        }
    }
}

impl ExecutorOptions {
    /// Small windows so that tests cross chunk boundaries.
    pub fn default_for_test() -> Self {
        Self {
            processing_window_size: 4,
            default_confidence: 1.0,
            expected_partitions: 16,
        }
    }
}

/// What an operator instance knows about the task running it.
#[derive(Debug, Clone)]
pub struct OperatorContext {
    operator_id: usize,
    options: Arc<ExecutorOptions>,
    memory_reservation: Arc<AtomicUsize>,
}

impl OperatorContext {
    pub fn new(operator_id: usize, options: Arc<ExecutorOptions>) -> Self {
        OperatorContext {
            operator_id,
            options,
            memory_reservation: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn for_test(operator_id: usize) -> Self {
        Self::new(operator_id, Arc::new(ExecutorOptions::default_for_test()))
    }

    pub fn operator_id(&self) -> usize {
        self.operator_id
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    pub fn default_confidence(&self) -> f64 {
        self.options.default_confidence
    }

    /// Report the operator's current footprint in bytes.
    ///
    /// The context only records the number; admission control is up to the reader.
    pub fn set_memory_reservation(&self, bytes: usize) {
        self.memory_reservation.store(bytes, Ordering::Relaxed);
    }

    /// The last footprint reported by the operator. Clones of a context share it.
    pub fn memory_reservation(&self) -> usize {
        self.memory_reservation.load(Ordering::Relaxed)
    }
}
