// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::collections::VecDeque;

use futures::stream::{self, StreamExt};

use super::*;
use crate::array::DataChunkBuilder;
use crate::types::DataValue;

/// A source operator over prebuilt chunks.
pub struct ValuesOperator {
    column_types: Vec<DataType>,
    chunks: VecDeque<DataChunk>,
}

impl ValuesOperator {
    pub fn new(column_types: Vec<DataType>, chunks: Vec<DataChunk>) -> Self {
        for chunk in &chunks {
            assert_eq!(
                chunk.column_count(),
                column_types.len(),
                "chunk does not match the column types"
            );
        }
        ValuesOperator {
            column_types,
            chunks: chunks.into(),
        }
    }

    /// Build chunks of at most `window` rows from literal rows.
    pub fn from_rows(
        column_types: Vec<DataType>,
        rows: impl IntoIterator<Item = Vec<DataValue>>,
        window: usize,
    ) -> Self {
        let mut builder = DataChunkBuilder::new(column_types.iter(), window);
        let mut chunks = vec![];
        for row in rows {
            if let Some(chunk) = builder.push_row(row) {
                chunks.push(chunk);
            }
        }
        if let Some(chunk) = builder.take() {
            chunks.push(chunk);
        }
        Self::new(column_types, chunks)
    }

    /// The remaining chunks as an executor stream.
    pub fn into_stream(self) -> BoxedExecutor {
        stream::iter(self.chunks.into_iter().map(Ok)).boxed()
    }
}

impl Operator for ValuesOperator {
    fn output_types(&self) -> &[DataType] {
        &self.column_types
    }

    fn needs_input(&self) -> bool {
        false
    }

    fn add_input(&mut self, _chunk: DataChunk) -> Result<()> {
        panic!("values operator does not take input");
    }

    fn output(&mut self) -> Result<Option<DataChunk>> {
        Ok(self.chunks.pop_front())
    }

    fn finish(&mut self) {}

    fn is_finished(&self) -> bool {
        self.chunks.is_empty()
    }

    fn estimated_size(&self) -> usize {
        self.chunks.iter().map(DataChunk::estimated_size).sum()
    }
}
