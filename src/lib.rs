// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Execution core of a distributed SQL engine.
//!
//! The crate provides the columnar data model ([`array`]), the aggregation state protocol
//! that makes one aggregate function work in single-stage, partial/final and grouped modes
//! ([`aggregation`]), and pull-based operators built on top of them ([`executor`]).

#![deny(unused_must_use)]

pub mod aggregation;
pub mod array;
pub mod connector;
mod error;
pub mod executor;
pub mod types;

pub use self::error::{Error, Result};
