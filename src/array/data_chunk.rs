// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::*;
use crate::types::DataValue;

/// A collection of arrays.
///
/// A chunk is a horizontal subset of a query result. It may have no columns at all and
/// still carry a cardinality, which is what count-only queries consume.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct DataChunk {
    arrays: Arc<[ArrayImpl]>,
    cardinality: usize,
}

/// Create [`DataChunk`] from a list of column arrays.
///
/// # Panics
///
/// Panics if the list is empty or the arrays have different lengths.
impl FromIterator<ArrayImpl> for DataChunk {
    fn from_iter<I: IntoIterator<Item = ArrayImpl>>(iter: I) -> Self {
        let arrays: Arc<[ArrayImpl]> = iter.into_iter().collect();
        assert!(!arrays.is_empty(), "use `DataChunk::no_column` for a chunk without arrays");
        let cardinality = arrays[0].len();
        assert!(
            arrays.iter().map(|a| a.len()).all(|l| l == cardinality),
            "all arrays must have the same length"
        );
        DataChunk {
            arrays,
            cardinality,
        }
    }
}

impl FromIterator<ArrayBuilderImpl> for DataChunk {
    fn from_iter<I: IntoIterator<Item = ArrayBuilderImpl>>(iter: I) -> Self {
        iter.into_iter().map(|b| b.finish()).collect()
    }
}

impl DataChunk {
    /// Return a [`DataChunk`] with `cardinality` rows and no array.
    pub fn no_column(cardinality: usize) -> Self {
        DataChunk {
            arrays: Arc::new([]),
            cardinality,
        }
    }

    /// Create a chunk with `cardinality` rows from a possibly empty list of arrays.
    ///
    /// # Panics
    ///
    /// Panics if any array length differs from `cardinality`.
    pub fn new(arrays: Vec<ArrayImpl>, cardinality: usize) -> Self {
        for (i, a) in arrays.iter().enumerate() {
            assert_eq!(
                a.len(),
                cardinality,
                "array {i} has {} rows but the chunk has {cardinality}",
                a.len()
            );
        }
        DataChunk {
            arrays: arrays.into(),
            cardinality,
        }
    }

    /// Return the number of rows in the chunk.
    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    pub fn is_empty(&self) -> bool {
        self.cardinality == 0
    }

    pub fn column_count(&self) -> usize {
        self.arrays.len()
    }

    /// Get the reference of array by index.
    pub fn array_at(&self, idx: usize) -> &ArrayImpl {
        &self.arrays[idx]
    }

    /// Get all arrays.
    pub fn arrays(&self) -> &[ArrayImpl] {
        &self.arrays
    }

    /// Get the values of a row.
    pub fn row(&self, idx: usize) -> SmallVec<[DataValue; 16]> {
        assert!(idx < self.cardinality, "row {idx} out of bounds");
        self.arrays.iter().map(|arr| arr.get(idx)).collect()
    }

    /// Get an iterator over the rows.
    pub fn rows(&self) -> impl Iterator<Item = SmallVec<[DataValue; 16]>> + '_ {
        (0..self.cardinality).map(|i| self.row(i))
    }

    /// Filter elements and create a new chunk.
    pub fn filter(&self, visibility: &[bool]) -> Self {
        assert_eq!(visibility.len(), self.cardinality, "visibility length mismatch");
        let cardinality = visibility.iter().filter(|&&v| v).count();
        let arrays = self.arrays.iter().map(|a| a.filter(visibility)).collect();
        DataChunk {
            arrays,
            cardinality,
        }
    }

    /// Select and reorder columns.
    pub fn project(&self, indexes: &[usize]) -> Self {
        DataChunk {
            arrays: indexes.iter().map(|&i| self.arrays[i].clone()).collect(),
            cardinality: self.cardinality,
        }
    }

    /// Return a new chunk with `array` appended as the last column.
    pub fn append_column(&self, array: ArrayImpl) -> Self {
        assert_eq!(array.len(), self.cardinality, "column length mismatch");
        DataChunk {
            arrays: self.arrays.iter().cloned().chain([array]).collect(),
            cardinality: self.cardinality,
        }
    }

    /// Estimated memory footprint in bytes.
    pub fn estimated_size(&self) -> usize {
        self.arrays.iter().map(|a| a.estimated_size()).sum()
    }
}

impl fmt::Debug for DataChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataChunk")
            .field("cardinality", &self.cardinality)
            .field("arrays", &self.arrays)
            .finish()
    }
}

/// Print the chunk as a pretty table.
impl fmt::Display for DataChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use prettytable::{format, Table};
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        for i in 0..self.cardinality() {
            let row = self.arrays.iter().map(|a| a.get_to_string(i)).collect();
            table.add_row(row);
        }
        write!(f, "{}", table)
    }
}

/// Concatenate chunks of the same schema into one.
pub fn concat_chunks(types: &[DataType], chunks: &[DataChunk]) -> DataChunk {
    let cardinality = chunks.iter().map(|c| c.cardinality()).sum();
    let arrays = types
        .iter()
        .enumerate()
        .map(|(i, ty)| {
            let mut builder = ArrayBuilderImpl::with_capacity(cardinality, ty);
            for chunk in chunks {
                builder.append(chunk.array_at(i));
            }
            builder.finish()
        })
        .collect();
    DataChunk::new(arrays, cardinality)
}
