// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::str::FromStr;

use parse_display::Display;
use serde::{Deserialize, Serialize};

mod native;
mod timestamp;
mod value;

pub use self::native::*;
pub use self::timestamp::*;
pub use self::value::*;

/// Logical data type.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataTypeKind {
    #[display("NULL")]
    Null,
    #[display("BOOLEAN")]
    Bool,
    #[display("BIGINT")]
    Int64,
    #[display("DOUBLE")]
    Float64,
    #[display("VARCHAR")]
    String,
    /// Milliseconds since the unix epoch.
    #[display("TIMESTAMP")]
    Timestamp,
}

/// Physical representation of a [`DataTypeKind`] inside a column vector.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalDataTypeKind {
    Null,
    Bool,
    Int64,
    Float64,
    Bytes,
}

impl DataTypeKind {
    pub const fn nullable(self) -> DataType {
        DataType::new(self, true)
    }

    pub const fn not_null(self) -> DataType {
        DataType::new(self, false)
    }

    /// Returns the storage used for values of this type.
    pub const fn physical_kind(self) -> PhysicalDataTypeKind {
        match self {
            Self::Null => PhysicalDataTypeKind::Null,
            Self::Bool => PhysicalDataTypeKind::Bool,
            Self::Int64 | Self::Timestamp => PhysicalDataTypeKind::Int64,
            Self::Float64 => PhysicalDataTypeKind::Float64,
            Self::String => PhysicalDataTypeKind::Bytes,
        }
    }

    pub const fn is_fixed_width(self) -> bool {
        !matches!(self.physical_kind(), PhysicalDataTypeKind::Bytes)
    }

    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Int64 | Self::Float64)
    }
}

impl FromStr for DataTypeKind {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "null" => Ok(Self::Null),
            "boolean" | "bool" => Ok(Self::Bool),
            "bigint" | "int8" | "long" => Ok(Self::Int64),
            "double" | "float8" => Ok(Self::Float64),
            "varchar" | "string" | "text" => Ok(Self::String),
            "timestamp" => Ok(Self::Timestamp),
            _ => Err(ConvertError::UnknownType(s.into())),
        }
    }
}

/// Data type with nullable.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[display("{kind}")]
pub struct DataType {
    pub kind: DataTypeKind,
    pub nullable: bool,
}

impl DataType {
    pub const fn new(kind: DataTypeKind, nullable: bool) -> DataType {
        DataType { kind, nullable }
    }

    pub const fn kind(&self) -> DataTypeKind {
        self.kind
    }

    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub const fn physical_kind(&self) -> PhysicalDataTypeKind {
        self.kind.physical_kind()
    }
}

impl From<DataTypeKind> for DataType {
    fn from(kind: DataTypeKind) -> Self {
        kind.nullable()
    }
}

/// The error type of value type convention.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error("unknown type: {0}")]
    UnknownType(String),
    #[error("failed to parse {0:?} as {1}")]
    Parse(String, DataTypeKind),
    #[error("invalid timestamp: {0}")]
    ParseTimestamp(String),
    #[error("failed to cast {0} to {1}")]
    Cast(String, &'static str),
}
