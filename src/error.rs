// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::sync::Arc;

use crate::types::ConvertError;

/// The result type of the execution core.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type of the execution core.
///
/// Only recoverable failures are reported through this type: data coming from upstream
/// that cannot be interpreted, and bad configuration handed to a constructor that returns
/// `Result`. Broken invariants inside the core panic instead.
#[derive(thiserror::Error, Debug, Clone)]
#[error(transparent)]
pub struct Error {
    inner: Arc<Inner>,
}

#[derive(thiserror::Error, Debug)]
enum Inner {
    #[error("conversion error: {0}")]
    Convert(#[from] ConvertError),
    #[error("function {function} expects {expected} arguments but got {actual}")]
    ArityMismatch {
        function: String,
        expected: usize,
        actual: usize,
    },
    #[error("confidence must be in (0, 1], got {0}")]
    InvalidConfidence(f64),
    #[error("channel {channel} is out of range for a chunk with {column_count} columns")]
    InvalidChannel { channel: usize, column_count: usize },
    #[error("type mismatch: expected {expected} but got {actual}")]
    TypeMismatch { expected: String, actual: String },
    #[error("malformed intermediate chunk: expected {expected} but got {actual}")]
    IntermediateMismatch { expected: String, actual: String },
    #[error("{function} overflowed")]
    Overflow { function: &'static str },
    #[error("invalid group id at position {position}: {value}")]
    InvalidGroupId { position: usize, value: String },
    #[error("sample weight must not be negative, got {0}")]
    NegativeWeight(i64),
    #[error("unknown aggregate function: {0}")]
    UnknownFunction(String),
    #[error("unknown record format: {0}")]
    UnknownFormat(String),
    #[error("failed to decode {locator} at offset {offset}: {cause}")]
    Decode {
        locator: String,
        offset: u64,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl From<Inner> for Error {
    fn from(e: Inner) -> Self {
        Error { inner: Arc::new(e) }
    }
}

impl From<ConvertError> for Error {
    fn from(e: ConvertError) -> Self {
        Inner::from(e).into()
    }
}

impl Error {
    pub fn arity_mismatch(function: impl Into<String>, expected: usize, actual: usize) -> Self {
        Inner::ArityMismatch {
            function: function.into(),
            expected,
            actual,
        }
        .into()
    }

    pub fn invalid_confidence(confidence: f64) -> Self {
        Inner::InvalidConfidence(confidence).into()
    }

    pub fn invalid_channel(channel: usize, column_count: usize) -> Self {
        Inner::InvalidChannel {
            channel,
            column_count,
        }
        .into()
    }

    pub fn type_mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        Inner::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
        .into()
    }

    pub fn intermediate_mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        Inner::IntermediateMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
        .into()
    }

    pub fn overflow(function: &'static str) -> Self {
        Inner::Overflow { function }.into()
    }

    pub fn invalid_group_id(position: usize, value: impl ToString) -> Self {
        Inner::InvalidGroupId {
            position,
            value: value.to_string(),
        }
        .into()
    }

    pub fn negative_weight(weight: i64) -> Self {
        Inner::NegativeWeight(weight).into()
    }

    pub fn unknown_function(name: impl Into<String>) -> Self {
        Inner::UnknownFunction(name.into()).into()
    }

    pub fn unknown_format(format: impl Into<String>) -> Self {
        Inner::UnknownFormat(format.into()).into()
    }

    pub fn decode(
        locator: impl Into<String>,
        offset: u64,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Inner::Decode {
            locator: locator.into(),
            offset,
            cause: cause.into(),
        }
        .into()
    }

    /// Returns true if the error was raised while decoding connector records.
    ///
    /// Only these errors are worth retrying by an external policy; everything else is
    /// deterministic for the same input.
    pub fn is_decode(&self) -> bool {
        matches!(*self.inner, Inner::Decode { .. })
    }
}
