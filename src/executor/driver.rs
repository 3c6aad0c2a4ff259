// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use tracing::{debug, trace};

use super::*;

/// Drives a pipeline of operators on the current thread.
///
/// The first operator is the source and the output of the last one goes to a sink.
/// Chunks move one hop at a time, from an operator with output to a successor that
/// needs input, until the last operator is finished.
pub struct Driver {
    operators: Vec<BoxedOperator>,
    /// Whether `finish` was sent to the operator at the same index.
    finish_sent: Vec<bool>,
}

impl Driver {
    pub fn new(operators: Vec<BoxedOperator>) -> Self {
        assert!(!operators.is_empty(), "a pipeline needs at least one operator");
        let finish_sent = vec![false; operators.len()];
        Driver {
            operators,
            finish_sent,
        }
    }

    /// Run until the last operator finishes, handing every output chunk to `sink`.
    ///
    /// # Panics
    ///
    /// Panics if the pipeline stalls: a full pass moves no chunk and the last operator is not
    /// finished.
    pub fn run(mut self, mut sink: impl FnMut(DataChunk) -> Result<()>) -> Result<()> {
        debug!(operators = self.operators.len(), "start driver");
        let mut rows = 0;
        loop {
            let mut moved = false;
            for i in 1..self.operators.len() {
                let (head, tail) = self.operators.split_at_mut(i);
                let current = &mut head[i - 1];
                let next = &mut tail[0];
                if current.is_finished() {
                    if !self.finish_sent[i] {
                        trace!(operator = i, "finish operator");
                        next.finish();
                        self.finish_sent[i] = true;
                        moved = true;
                    }
                    continue;
                }
                if next.needs_input() {
                    if let Some(chunk) = current.output()? {
                        next.add_input(chunk)?;
                        moved = true;
                    }
                }
            }
            let Some(last) = self.operators.last_mut() else {
                unreachable!("the pipeline is not empty");
            };
            while let Some(chunk) = last.output()? {
                rows += chunk.cardinality();
                sink(chunk)?;
                moved = true;
            }
            if last.is_finished() {
                debug!(rows, "driver finished");
                return Ok(());
            }
            if !moved {
                panic!("pipeline stalled: no operator made progress");
            }
        }
    }

    /// Run to completion and collect the output.
    pub fn collect(self) -> Result<Vec<DataChunk>> {
        let mut outputs = vec![];
        self.run(|chunk| {
            outputs.push(chunk);
            Ok(())
        })?;
        Ok(outputs)
    }
}
