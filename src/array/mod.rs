// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Column vectors and row batches.
//!
//! An [`ArrayImpl`] is an immutable column vector with a null bitmap. A [`DataChunk`] is a
//! row batch: an ordered list of arrays sharing one cardinality.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{DataType, DataTypeKind, DataValue, PhysicalDataTypeKind, F64};

mod constant_array;
mod data_chunk;
mod data_chunk_builder;
mod iterator;
mod primitive_array;
mod utf8_array;

pub use self::constant_array::*;
pub use self::data_chunk::*;
pub use self::data_chunk_builder::*;
pub use self::iterator::ArrayIter;
pub use self::primitive_array::*;
pub use self::utf8_array::*;

/// A trait over all array builders.
///
/// `ArrayBuilder` is a trait over all builders. You could build an array with
/// `push` with the help of `ArrayBuilder` trait. The `push` function always
/// accepts reference to an element. e.g. for `PrimitiveArray`,
/// you must do `builder.push(Some(&1))`. For `Utf8Array`, you must do
/// `builder.push(Some("xxx"))`. Note that you don't need to construct a `String`.
///
/// The associated type `Array` is the type of the corresponding array. It is the
/// return type of `finish`.
pub trait ArrayBuilder: Send + Sync + 'static {
    /// Corresponding `Array` of this builder
    type Array: Array<Builder = Self>;

    /// Create a new builder with `capacity`.
    fn with_capacity(capacity: usize) -> Self;

    /// Append a value to builder.
    fn push(&mut self, value: Option<&<Self::Array as Array>::Item>);

    /// Append an array to builder.
    fn append(&mut self, other: &Self::Array);

    /// Number of values pushed so far.
    fn len(&self) -> usize;

    /// Returns true if nothing has been pushed.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finish build and return a new array.
    fn finish(self) -> Self::Array;
}

/// A trait over all array.
///
/// `Array` must be built with an `ArrayBuilder`. The array trait provides several
/// unified interface on an array, like `len`, `get` and `iter`.
///
/// The `Builder` associated type is the builder for this array.
/// The `Item` is the item you could retrieve from this array.
///
/// For example, `PrimitiveArray` could return an `Option<&i64>`, and `Utf8Array` will
/// return an `Option<&str>`.
pub trait Array: Sized + Send + Sync + 'static {
    /// Corresponding builder of this array.
    type Builder: ArrayBuilder<Array = Self>;

    /// Type of element in the array.
    type Item: ?Sized;

    /// Retrieve a reference to value.
    fn get(&self, idx: usize) -> Option<&Self::Item>;

    /// Number of items of array.
    fn len(&self) -> usize;

    /// Estimated memory footprint in bytes.
    fn estimated_size(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_null(&self, idx: usize) -> bool {
        self.get(idx).is_none()
    }

    /// Get iterator of current array.
    fn iter(&self) -> ArrayIter<'_, Self> {
        ArrayIter::new(self)
    }

    /// Filter the elements and return a new array.
    fn filter(&self, visibility: &[bool]) -> Self {
        assert_eq!(visibility.len(), self.len(), "visibility length mismatch");
        let mut builder = Self::Builder::with_capacity(self.len());
        for (value, &visible) in self.iter().zip(visibility) {
            if visible {
                builder.push(value);
            }
        }
        builder.finish()
    }
}

/// A column vector of any supported type.
///
/// `Constant` is the run-length encoding of one value repeated `len` times. Every method
/// here treats it exactly like the expanded array, so readers never need to special-case it.
#[derive(Clone, Serialize, Deserialize)]
pub enum ArrayImpl {
    Bool(Arc<BoolArray>),
    Int64(Arc<I64Array>),
    Float64(Arc<F64Array>),
    Utf8(Arc<Utf8Array>),
    Constant(Arc<ConstantArray>),
}

pub type BoolArray = PrimitiveArray<bool>;
pub type I64Array = PrimitiveArray<i64>;
pub type F64Array = PrimitiveArray<F64>;

pub type BoolArrayBuilder = PrimitiveArrayBuilder<bool>;
pub type I64ArrayBuilder = PrimitiveArrayBuilder<i64>;
pub type F64ArrayBuilder = PrimitiveArrayBuilder<F64>;

macro_rules! impl_into {
    ($x:ty, $y:ident) => {
        impl From<$x> for ArrayImpl {
            fn from(array: $x) -> Self {
                Self::$y(Arc::new(array))
            }
        }
    };
}

impl_into! { BoolArray, Bool }
impl_into! { I64Array, Int64 }
impl_into! { F64Array, Float64 }
impl_into! { Utf8Array, Utf8 }
impl_into! { ConstantArray, Constant }

impl ArrayImpl {
    pub fn new_bool(array: BoolArray) -> Self {
        array.into()
    }

    pub fn new_int64(array: I64Array) -> Self {
        array.into()
    }

    pub fn new_float64(array: F64Array) -> Self {
        array.into()
    }

    pub fn new_utf8(array: Utf8Array) -> Self {
        array.into()
    }

    /// Creates an array holding `value` repeated `len` times, without expanding it.
    pub fn new_constant(value: &DataValue, ty: &DataType, len: usize) -> Self {
        let mut builder = ArrayBuilderImpl::with_capacity(1, ty);
        builder.push(value);
        ConstantArray::new(builder.finish(), len).into()
    }

    /// Creates a constant array of NULLs.
    pub fn new_null(ty: &DataType, len: usize) -> Self {
        Self::new_constant(&DataValue::Null, ty, len)
    }

    /// Number of positions.
    pub fn len(&self) -> usize {
        match self {
            Self::Bool(a) => a.len(),
            Self::Int64(a) => a.len(),
            Self::Float64(a) => a.len(),
            Self::Utf8(a) => a.len(),
            Self::Constant(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Self::Constant(_))
    }

    pub fn physical_kind(&self) -> PhysicalDataTypeKind {
        match self {
            Self::Bool(_) => PhysicalDataTypeKind::Bool,
            Self::Int64(_) => PhysicalDataTypeKind::Int64,
            Self::Float64(_) => PhysicalDataTypeKind::Float64,
            Self::Utf8(_) => PhysicalDataTypeKind::Bytes,
            Self::Constant(a) => a.value().physical_kind(),
        }
    }

    /// Returns true if the array can hold values of `ty`.
    ///
    /// A constant NULL array is accepted for every type.
    pub fn is_compatible(&self, ty: DataTypeKind) -> bool {
        if let Self::Constant(a) = self {
            if a.value().is_null(0) {
                return true;
            }
        }
        ty == DataTypeKind::Null || self.physical_kind() == ty.physical_kind()
    }

    /// Get the name of physical type.
    pub fn type_string(&self) -> &'static str {
        match self.physical_kind() {
            PhysicalDataTypeKind::Null => "NULL",
            PhysicalDataTypeKind::Bool => "BOOLEAN",
            PhysicalDataTypeKind::Int64 => "BIGINT",
            PhysicalDataTypeKind::Float64 => "DOUBLE",
            PhysicalDataTypeKind::Bytes => "VARCHAR",
        }
    }

    pub fn is_null(&self, idx: usize) -> bool {
        match self {
            Self::Bool(a) => a.is_null(idx),
            Self::Int64(a) => a.is_null(idx),
            Self::Float64(a) => a.is_null(idx),
            Self::Utf8(a) => a.is_null(idx),
            Self::Constant(a) => {
                a.check_index(idx);
                a.value().is_null(0)
            }
        }
    }

    /// Get the value at the given index.
    pub fn get(&self, idx: usize) -> DataValue {
        match self {
            Self::Bool(a) => a.get(idx).copied().into(),
            Self::Int64(a) => a.get(idx).copied().into(),
            Self::Float64(a) => a.get(idx).map(|v| v.0).into(),
            Self::Utf8(a) => a.get(idx).into(),
            Self::Constant(a) => {
                a.check_index(idx);
                a.value().get(0)
            }
        }
    }

    pub fn get_bool(&self, idx: usize) -> Option<bool> {
        match self {
            Self::Bool(a) => a.get(idx).copied(),
            Self::Constant(a) => {
                a.check_index(idx);
                if a.value().is_null(0) {
                    return None;
                }
                a.value().get_bool(0)
            }
            _ => panic!("expected BOOLEAN array, got {}", self.type_string()),
        }
    }

    pub fn get_i64(&self, idx: usize) -> Option<i64> {
        match self {
            Self::Int64(a) => a.get(idx).copied(),
            Self::Constant(a) => {
                a.check_index(idx);
                if a.value().is_null(0) {
                    return None;
                }
                a.value().get_i64(0)
            }
            _ => panic!("expected BIGINT array, got {}", self.type_string()),
        }
    }

    pub fn get_f64(&self, idx: usize) -> Option<f64> {
        match self {
            Self::Float64(a) => a.get(idx).map(|v| v.0),
            Self::Constant(a) => {
                a.check_index(idx);
                if a.value().is_null(0) {
                    return None;
                }
                a.value().get_f64(0)
            }
            _ => panic!("expected DOUBLE array, got {}", self.type_string()),
        }
    }

    pub fn get_str(&self, idx: usize) -> Option<&str> {
        match self {
            Self::Utf8(a) => a.get(idx),
            Self::Constant(a) => {
                a.check_index(idx);
                if a.value().is_null(0) {
                    return None;
                }
                a.value().get_str(0)
            }
            _ => panic!("expected VARCHAR array, got {}", self.type_string()),
        }
    }

    /// Get the value and convert it to string.
    pub fn get_to_string(&self, idx: usize) -> String {
        match self.get(idx) {
            DataValue::Null => "NULL".into(),
            DataValue::String(s) => s,
            v => v.to_string(),
        }
    }

    /// Filter the elements and return a new array.
    ///
    /// A constant array stays constant.
    pub fn filter(&self, visibility: &[bool]) -> Self {
        match self {
            Self::Bool(a) => a.filter(visibility).into(),
            Self::Int64(a) => a.filter(visibility).into(),
            Self::Float64(a) => a.filter(visibility).into(),
            Self::Utf8(a) => a.filter(visibility).into(),
            Self::Constant(a) => {
                assert_eq!(visibility.len(), a.len(), "visibility length mismatch");
                let len = visibility.iter().filter(|&&v| v).count();
                ConstantArray::new(a.value().clone(), len).into()
            }
        }
    }

    /// Estimated memory footprint in bytes.
    pub fn estimated_size(&self) -> usize {
        match self {
            Self::Bool(a) => a.estimated_size(),
            Self::Int64(a) => a.estimated_size(),
            Self::Float64(a) => a.estimated_size(),
            Self::Utf8(a) => a.estimated_size(),
            Self::Constant(a) => a.value().estimated_size(),
        }
    }
}

/// Arrays compare by their logical values, so a constant array equals its expansion.
impl PartialEq for ArrayImpl {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && (0..self.len()).all(|i| self.get(i) == other.get(i))
    }
}

impl fmt::Debug for ArrayImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_string())?;
        if self.is_constant() {
            write!(f, "(constant)")?;
        }
        f.debug_list()
            .entries((0..self.len()).map(|i| self.get(i)))
            .finish()
    }
}

/// Embeds all possible array builders in `array` module.
pub enum ArrayBuilderImpl {
    Bool(BoolArrayBuilder),
    Int64(I64ArrayBuilder),
    Float64(F64ArrayBuilder),
    Utf8(Utf8ArrayBuilder),
}

impl ArrayBuilderImpl {
    /// Create a new array builder from data type.
    pub fn new(ty: &DataType) -> Self {
        Self::with_capacity(0, ty)
    }

    /// Create a new array builder with capacity from data type.
    ///
    /// Values of the NULL type are stored in a boolean vector that only holds nulls.
    pub fn with_capacity(capacity: usize, ty: &DataType) -> Self {
        match ty.physical_kind() {
            PhysicalDataTypeKind::Null | PhysicalDataTypeKind::Bool => {
                Self::Bool(BoolArrayBuilder::with_capacity(capacity))
            }
            PhysicalDataTypeKind::Int64 => Self::Int64(I64ArrayBuilder::with_capacity(capacity)),
            PhysicalDataTypeKind::Float64 => {
                Self::Float64(F64ArrayBuilder::with_capacity(capacity))
            }
            PhysicalDataTypeKind::Bytes => Self::Utf8(Utf8ArrayBuilder::with_capacity(capacity)),
        }
    }

    /// Appends an element to the back of array.
    pub fn push(&mut self, v: &DataValue) {
        match (self, v) {
            (Self::Bool(a), DataValue::Bool(v)) => a.push(Some(v)),
            (Self::Int64(a), DataValue::Int64(v)) => a.push(Some(v)),
            (Self::Float64(a), DataValue::Float64(v)) => a.push(Some(v)),
            (Self::Utf8(a), DataValue::String(v)) => a.push(Some(v)),
            (this, DataValue::Null) => this.push_null(),
            (this, v) => panic!("failed to push value: type mismatch {} <- {v:?}", this.type_string()),
        }
    }

    pub fn push_null(&mut self) {
        match self {
            Self::Bool(a) => a.push(None),
            Self::Int64(a) => a.push(None),
            Self::Float64(a) => a.push(None),
            Self::Utf8(a) => a.push(None),
        }
    }

    /// Appends all values of an array. Constant arrays are expanded.
    pub fn append(&mut self, array: &ArrayImpl) {
        match (self, array) {
            (Self::Bool(builder), ArrayImpl::Bool(arr)) => builder.append(arr),
            (Self::Int64(builder), ArrayImpl::Int64(arr)) => builder.append(arr),
            (Self::Float64(builder), ArrayImpl::Float64(arr)) => builder.append(arr),
            (Self::Utf8(builder), ArrayImpl::Utf8(arr)) => builder.append(arr),
            (this, ArrayImpl::Constant(arr)) => {
                let value = arr.value().get(0);
                for _ in 0..arr.len() {
                    this.push(&value);
                }
            }
            (this, arr) => panic!(
                "failed to append array: type mismatch {} <- {}",
                this.type_string(),
                arr.type_string()
            ),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Bool(a) => a.len(),
            Self::Int64(a) => a.len(),
            Self::Float64(a) => a.len(),
            Self::Utf8(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn type_string(&self) -> &'static str {
        match self {
            Self::Bool(_) => "BOOLEAN",
            Self::Int64(_) => "BIGINT",
            Self::Float64(_) => "DOUBLE",
            Self::Utf8(_) => "VARCHAR",
        }
    }

    /// Finish build and return a new array.
    pub fn finish(self) -> ArrayImpl {
        match self {
            Self::Bool(a) => a.finish().into(),
            Self::Int64(a) => a.finish().into(),
            Self::Float64(a) => a.finish().into(),
            Self::Utf8(a) => a.finish().into(),
        }
    }

    /// Finish the current array and leave an empty builder of the same type behind.
    pub fn take(&mut self) -> ArrayImpl {
        let empty = match self {
            Self::Bool(_) => Self::Bool(BoolArrayBuilder::with_capacity(0)),
            Self::Int64(_) => Self::Int64(I64ArrayBuilder::with_capacity(0)),
            Self::Float64(_) => Self::Float64(F64ArrayBuilder::with_capacity(0)),
            Self::Utf8(_) => Self::Utf8(Utf8ArrayBuilder::with_capacity(0)),
        };
        std::mem::replace(self, empty).finish()
    }
}

/// Collects values into an array of the given type.
pub fn array_from_values<'a>(
    ty: &DataType,
    values: impl IntoIterator<Item = &'a DataValue>,
) -> ArrayImpl {
    let mut builder = ArrayBuilderImpl::new(ty);
    for v in values {
        builder.push(v);
    }
    builder.finish()
}
