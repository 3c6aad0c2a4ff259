// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fmt::Debug;
use std::hash::Hash;

use super::F64;

/// Fixed-width values that can be stored in a [`PrimitiveArray`](crate::array::PrimitiveArray).
pub trait NativeType:
    PartialOrd + PartialEq + Eq + Hash + Debug + Copy + Send + Sync + Sized + Default + 'static
{
}

macro_rules! impl_native {
    ($($t:ty),*) => {
        $(impl NativeType for $t {})*
    }
}

impl_native!(bool, i64, F64);
