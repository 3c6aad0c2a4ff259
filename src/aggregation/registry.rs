// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::sync::Arc;

use ahash::HashMap;
use itertools::Itertools;

use super::*;
use crate::Error;

/// Builds a function for the given argument types, or `None` if it does not accept them.
pub type FunctionConstructor = fn(&[DataTypeKind]) -> Option<AggregationFunctionRef>;

fn builtin<F: AggregateFunction>(function: F) -> Option<AggregationFunctionRef> {
    Some(Arc::new(function))
}

/// Maps function names to constructors.
///
/// Populated once at startup and then only read.
#[derive(Default)]
pub struct AggregationRegistry {
    functions: HashMap<String, Vec<FunctionConstructor>>,
}

impl AggregationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in aggregate function.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("count", |args| match args {
            [] => builtin(Count::star()),
            [kind] => builtin(Count::new(*kind)),
            _ => None,
        });
        registry.register("sum", |args| match args {
            [DataTypeKind::Int64] => builtin(Sum::<i64>::new()),
            [DataTypeKind::Float64] => builtin(Sum::<f64>::new()),
            _ => None,
        });
        registry.register("avg", |args| match args {
            [DataTypeKind::Int64] => builtin(Avg::<i64>::new()),
            [DataTypeKind::Float64] => builtin(Avg::<f64>::new()),
            _ => None,
        });
        registry.register("min", |args| match args {
            [kind] if *kind != DataTypeKind::Null => builtin(MinMax::min(*kind)),
            _ => None,
        });
        registry.register("max", |args| match args {
            [kind] if *kind != DataTypeKind::Null => builtin(MinMax::max(*kind)),
            _ => None,
        });
        registry.register("approx_count", |args| match args {
            [] => builtin(ApproxCount::new()),
            _ => None,
        });
        registry
    }

    /// Add a constructor for `name`. Constructors registered earlier take precedence.
    pub fn register(&mut self, name: &str, constructor: FunctionConstructor) {
        self.functions
            .entry(name.to_lowercase())
            .or_default()
            .push(constructor);
    }

    /// Find the function `name` accepting `arg_types`.
    pub fn resolve(
        &self,
        name: &str,
        arg_types: &[DataTypeKind],
    ) -> Result<AggregationFunctionRef> {
        let constructors = self
            .functions
            .get(&name.to_lowercase())
            .ok_or_else(|| Error::unknown_function(name))?;
        constructors
            .iter()
            .find_map(|constructor| constructor(arg_types))
            .ok_or_else(|| {
                Error::unknown_function(format!("{name}({})", arg_types.iter().format(", ")))
            })
    }

    /// Names of all registered functions, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.functions.keys().map(String::as_str).sorted().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_builtins() {
        let registry = AggregationRegistry::with_builtins();
        let sum = registry.resolve("SUM", &[DataTypeKind::Float64]).unwrap();
        assert_eq!(sum.signature().to_string(), "sum(DOUBLE) -> DOUBLE");
        let count = registry.resolve("count", &[]).unwrap();
        assert_eq!(count.signature().to_string(), "count() -> BIGINT");
        let max = registry.resolve("max", &[DataTypeKind::Timestamp]).unwrap();
        assert_eq!(max.signature().final_type.kind(), DataTypeKind::Timestamp);
        assert!(registry.resolve("approx_count", &[]).unwrap().signature().approximate);
        assert_eq!(
            registry.names(),
            vec!["approx_count", "avg", "count", "max", "min", "sum"]
        );
    }

    #[test]
    fn unknown_functions() {
        let registry = AggregationRegistry::with_builtins();
        let e = registry.resolve("median", &[DataTypeKind::Int64]).err().unwrap();
        assert_eq!(e.to_string(), "unknown aggregate function: median");
        let e = registry.resolve("sum", &[DataTypeKind::String]).err().unwrap();
        assert_eq!(e.to_string(), "unknown aggregate function: sum(VARCHAR)");
    }
}
