// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::iter::IntoIterator;

use itertools::Itertools;

use super::{ArrayBuilderImpl, DataChunk};
use crate::types::{DataType, DataValue};

/// A helper struct to build a [`DataChunk`] row by row.
///
/// Rows are pushed into the builder and a chunk is returned every `capacity` rows.
pub struct DataChunkBuilder {
    array_builders: Vec<ArrayBuilderImpl>,
    data_types: Vec<DataType>,
    size: usize,
    capacity: usize,
}

impl DataChunkBuilder {
    pub fn new<'a>(data_types: impl IntoIterator<Item = &'a DataType>, capacity: usize) -> Self {
        assert_ne!(capacity, 0);
        let data_types: Vec<DataType> = data_types.into_iter().cloned().collect();
        let array_builders = data_types
            .iter()
            .map(|ty| ArrayBuilderImpl::with_capacity(capacity, ty))
            .collect();
        DataChunkBuilder {
            array_builders,
            data_types,
            size: 0,
            capacity,
        }
    }

    /// Push a row in the Iterator.
    ///
    /// The row is accepted as an iterator of [`DataValue`], and it's required that the size of row
    /// should be the same as the number of columns.
    ///
    /// A [`DataChunk`] will be returned when `size == capacity`.
    #[must_use]
    pub fn push_row(&mut self, row: impl IntoIterator<Item = DataValue>) -> Option<DataChunk> {
        self.array_builders
            .iter_mut()
            .zip_eq(row)
            .for_each(|(builder, v)| builder.push(&v));
        self.size += 1;
        if self.size == self.capacity {
            self.take()
        } else {
            None
        }
    }

    /// Generate a [`DataChunk`] with the remaining rows.
    ///
    /// If there are no remaining rows, `None` will be returned.
    #[must_use]
    pub fn take(&mut self) -> Option<DataChunk> {
        let size = std::mem::take(&mut self.size);
        if size == 0 {
            return None;
        }
        let arrays = self
            .array_builders
            .iter_mut()
            .zip(&self.data_types)
            .map(|(builder, ty)| {
                std::mem::replace(builder, ArrayBuilderImpl::with_capacity(self.capacity, ty))
                    .finish()
            })
            .collect();
        Some(DataChunk::new(arrays, size))
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}
