// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use chrono::FixedOffset;
use ordered_float::OrderedFloat;
use parse_display::Display;
use serde::{Deserialize, Serialize};

use super::*;

/// Primitive SQL value.
///
/// Unlike SQL comparison, `DataValue` equality is total: `Null == Null` and `NaN == NaN`.
/// This is the semantics needed by grouping and partitioning keys.
#[derive(Debug, Display, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataValue {
    // NOTE: Null comes first.
    // => NULL is less than any non-NULL values
    #[display("null")]
    Null,
    #[display("{0}")]
    Bool(bool),
    #[display("{0}")]
    Int64(i64),
    #[display("{0}")]
    Float64(F64),
    #[display("'{0}'")]
    String(String),
}

/// A wrapper around floats providing implementations of `Eq`, `Ord`, and `Hash`.
pub type F64 = OrderedFloat<f64>;

impl DataValue {
    /// Returns `true` if value is null.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type of value. `None` means NULL.
    pub fn data_type(&self) -> Option<DataTypeKind> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(DataTypeKind::Bool),
            Self::Int64(_) => Some(DataTypeKind::Int64),
            Self::Float64(_) => Some(DataTypeKind::Float64),
            Self::String(_) => Some(DataTypeKind::String),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float64(v) => Some(v.0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Parses a textual field as a value of `kind`.
    ///
    /// Timestamps are interpreted in `zone` and stored as epoch milliseconds.
    pub fn parse_as(s: &str, kind: DataTypeKind, zone: &FixedOffset) -> Result<Self, ConvertError> {
        let parse_err = || ConvertError::Parse(s.into(), kind);
        Ok(match kind {
            DataTypeKind::Null => Self::Null,
            DataTypeKind::Bool => Self::Bool(s.trim().parse().map_err(|_| parse_err())?),
            DataTypeKind::Int64 => Self::Int64(s.trim().parse().map_err(|_| parse_err())?),
            DataTypeKind::Float64 => Self::Float64(
                s.trim()
                    .parse::<f64>()
                    .map_err(|_| parse_err())?
                    .into(),
            ),
            DataTypeKind::String => Self::String(s.into()),
            DataTypeKind::Timestamp => Self::Int64(parse_timestamp(s, zone)?),
        })
    }
}

impl From<bool> for DataValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for DataValue {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f64> for DataValue {
    fn from(v: f64) -> Self {
        Self::Float64(v.into())
    }
}

impl From<&str> for DataValue {
    fn from(v: &str) -> Self {
        Self::String(v.into())
    }
}

impl From<String> for DataValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl<T: Into<DataValue>> From<Option<T>> for DataValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
