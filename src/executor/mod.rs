// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Pull-based operators.
//!
//! An [`Operator`] is driven by one thread through a small state machine: while
//! [`needs_input`](Operator::needs_input) is true it is fed chunks, [`output`](Operator::output)
//! drains what it produced, and [`finish`](Operator::finish) tells it no more input will come.
//! Nothing blocks; a [`Driver`] or [`into_stream`] supplies the loop.

use futures::stream::{self, BoxStream, StreamExt};
use tracing::trace;

use crate::array::DataChunk;
use crate::types::DataType;
use crate::Result;

mod aggregation;
mod context;
mod driver;
mod group_by_hash;
mod hash_agg;
mod row_number_limit;
mod values;

pub use self::aggregation::*;
pub use self::context::*;
pub use self::driver::*;
pub use self::group_by_hash::*;
pub use self::hash_agg::*;
pub use self::row_number_limit::*;
pub use self::values::*;

/// The maximum chunk length produced by an operator.
pub const PROCESSING_WINDOW_SIZE: usize = 1024;

/// A stream of chunks, the shape of an asynchronous executor.
pub type BoxedExecutor = BoxStream<'static, Result<DataChunk>>;

/// A pull-based transform over chunks.
pub trait Operator: Send {
    /// Types of the output columns.
    fn output_types(&self) -> &[DataType];

    /// Whether [`add_input`](Operator::add_input) may be called now.
    fn needs_input(&self) -> bool;

    /// Feed a chunk. Only valid while [`needs_input`](Operator::needs_input) is true.
    fn add_input(&mut self, chunk: DataChunk) -> Result<()>;

    /// Take the next output chunk, if one is ready.
    fn output(&mut self) -> Result<Option<DataChunk>>;

    /// Signal the end of input.
    fn finish(&mut self);

    /// Whether the operator has finished and all of its output was taken.
    fn is_finished(&self) -> bool;

    /// Best-effort memory footprint in bytes.
    fn estimated_size(&self) -> usize {
        0
    }
}

pub type BoxedOperator = Box<dyn Operator>;

/// Creates operator instances for a pipeline.
///
/// One factory serves every parallel instance of the same pipeline stage.
pub trait OperatorFactory: Send + Sync {
    fn output_types(&self) -> &[DataType];

    fn create_operator(&self, context: OperatorContext) -> BoxedOperator;
}

/// Adapt an operator into a stream that pulls from `child`.
///
/// # Panics
///
/// The stream panics if the operator stalls: it wants no input, has no output, and is not
/// finished.
pub fn into_stream(operator: BoxedOperator, child: BoxedExecutor) -> BoxedExecutor {
    struct State {
        operator: BoxedOperator,
        child: Option<BoxedExecutor>,
    }

    stream::unfold(
        State {
            operator,
            child: Some(child),
        },
        |mut state| async move {
            loop {
                match state.operator.output() {
                    Ok(Some(chunk)) => return Some((Ok(chunk), state)),
                    Ok(None) => {}
                    Err(e) => {
                        state.child = None;
                        state.operator.finish();
                        return Some((Err(e), state));
                    }
                }
                if state.operator.is_finished() {
                    return None;
                }
                if !state.operator.needs_input() {
                    panic!("operator stalled: needs no input but produced no output");
                }
                let next = match state.child.as_mut() {
                    Some(child) => child.next().await,
                    None => None,
                };
                match next {
                    Some(Ok(chunk)) => {
                        trace!(cardinality = chunk.cardinality(), "operator input");
                        if let Err(e) = state.operator.add_input(chunk) {
                            return Some((Err(e), state));
                        }
                    }
                    Some(Err(e)) => return Some((Err(e), state)),
                    None => {
                        state.child = None;
                        state.operator.finish();
                    }
                }
            }
        },
    )
    .boxed()
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;

    use super::*;
    use crate::array::ArrayImpl;
    use crate::types::{DataTypeKind, DataValue};

    #[tokio::test]
    async fn stream_through_operator() {
        let types = vec![DataTypeKind::Int64.not_null()];
        let chunks = (0..3)
            .map(|i| {
                [ArrayImpl::new_int64([i, i].into_iter().collect())]
                    .into_iter()
                    .collect::<DataChunk>()
            })
            .collect::<Vec<_>>();
        let child = ValuesOperator::new(types.clone(), chunks).into_stream();
        let operator = RowNumberLimitOperator::new(
            OperatorContext::for_test(0),
            &types,
            vec![0],
            vec![],
            vec![],
            4,
            10,
        );
        let output: Vec<DataChunk> = into_stream(Box::new(operator), child)
            .try_collect()
            .await
            .unwrap();
        let rows = output
            .iter()
            .flat_map(|c| c.rows().map(|r| r.to_vec()))
            .collect::<Vec<_>>();
        assert_eq!(
            rows,
            vec![
                vec![DataValue::Int64(0), DataValue::Int64(1)],
                vec![DataValue::Int64(0), DataValue::Int64(2)],
                vec![DataValue::Int64(1), DataValue::Int64(3)],
                vec![DataValue::Int64(1), DataValue::Int64(4)],
            ]
        );
    }
}
