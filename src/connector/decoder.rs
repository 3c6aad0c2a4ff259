// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use ahash::HashMap;
use chrono::{FixedOffset, Offset, Utc};
use itertools::Itertools;
use serde_json::Value;
use tracing::{debug, warn};

use super::ColumnHandle;
use crate::array::{ArrayBuilderImpl, DataChunk};
use crate::types::{parse_timestamp, DataTypeKind, DataValue};
use crate::{Error, Result};

/// The cause of a failed decode.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Turns one raw record into the values of the requested columns.
pub trait RowDecoder: Send + Sync {
    /// The format identifier this decoder was registered under.
    fn format(&self) -> &str;

    /// Decode `record` into one value per column, in column order.
    ///
    /// A value must match the physical type of its column.
    fn decode_row(
        &self,
        record: &[u8],
        columns: &[ColumnHandle],
    ) -> std::result::Result<Vec<DataValue>, BoxError>;
}

/// Options shared by all decoders created from a registry.
#[derive(Debug, Clone, Copy)]
pub struct DecoderOptions {
    /// Zone of timestamps without an explicit offset.
    pub time_zone: FixedOffset,
    pub csv_delimiter: u8,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            time_zone: Utc.fix(),
            csv_delimiter: b',',
        }
    }
}

pub type DecoderConstructor = fn(&DecoderOptions) -> Box<dyn RowDecoder>;

/// Maps format identifiers to decoder constructors.
#[derive(Default)]
pub struct DecoderRegistry {
    decoders: HashMap<String, DecoderConstructor>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the `csv` and `json` decoders.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("csv", |options| Box::new(CsvRowDecoder::new(options)));
        registry.register("json", |options| Box::new(JsonRowDecoder::new(options)));
        registry
    }

    /// Register a decoder. A later registration of the same format replaces the earlier one.
    pub fn register(&mut self, format: &str, constructor: DecoderConstructor) {
        if self
            .decoders
            .insert(format.to_lowercase(), constructor)
            .is_some()
        {
            warn!(format, "decoder replaced");
        }
    }

    pub fn create(&self, format: &str, options: &DecoderOptions) -> Result<Box<dyn RowDecoder>> {
        let constructor = self
            .decoders
            .get(&format.to_lowercase())
            .ok_or_else(|| Error::unknown_format(format))?;
        Ok(constructor(options))
    }

    /// Registered formats, sorted.
    pub fn formats(&self) -> Vec<&str> {
        self.decoders.keys().map(String::as_str).sorted().collect()
    }
}

/// Decode `(offset, record)` pairs read from the split at `locator` into one chunk.
///
/// The first failing record aborts decoding; the error carries its offset.
pub fn decode_records<'a>(
    decoder: &dyn RowDecoder,
    locator: &str,
    columns: &[ColumnHandle],
    records: impl IntoIterator<Item = (u64, &'a [u8])>,
) -> Result<DataChunk> {
    let mut builders = columns
        .iter()
        .map(|c| ArrayBuilderImpl::new(&c.data_type))
        .collect::<Vec<_>>();
    let mut cardinality = 0;
    for (offset, record) in records {
        let values = decoder
            .decode_row(record, columns)
            .and_then(|values| check_row(columns, values))
            .map_err(|cause| Error::decode(locator, offset, cause))?;
        for (builder, value) in builders.iter_mut().zip(&values) {
            builder.push(value);
        }
        cardinality += 1;
    }
    debug!(
        locator,
        format = decoder.format(),
        cardinality,
        "decoded records"
    );
    Ok(DataChunk::new(
        builders.into_iter().map(ArrayBuilderImpl::finish).collect(),
        cardinality,
    ))
}

fn check_row(
    columns: &[ColumnHandle],
    values: Vec<DataValue>,
) -> std::result::Result<Vec<DataValue>, BoxError> {
    if values.len() != columns.len() {
        return Err(format!(
            "decoder produced {} values for {} columns",
            values.len(),
            columns.len()
        )
        .into());
    }
    for (column, value) in columns.iter().zip(&values) {
        if value.is_null() && !column.data_type.is_nullable() {
            return Err(format!("null value for not-null column {}", column.name).into());
        }
        let physical = value.data_type().map(DataTypeKind::physical_kind);
        if physical.is_some_and(|p| p != column.data_type.physical_kind()) {
            return Err(format!("value {value} does not fit column {}", column.name).into());
        }
    }
    Ok(values)
}

/// Decodes delimited text. A column's mapping is its field index, defaulting to its
/// ordinal position. Empty fields are null.
pub struct CsvRowDecoder {
    options: DecoderOptions,
}

impl CsvRowDecoder {
    pub fn new(options: &DecoderOptions) -> Self {
        CsvRowDecoder { options: *options }
    }
}

impl RowDecoder for CsvRowDecoder {
    fn format(&self) -> &str {
        "csv"
    }

    fn decode_row(
        &self,
        record: &[u8],
        columns: &[ColumnHandle],
    ) -> std::result::Result<Vec<DataValue>, BoxError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(self.options.csv_delimiter)
            .from_reader(record);
        let fields = match reader.records().next() {
            Some(fields) => fields?,
            None => csv::StringRecord::new(),
        };
        columns
            .iter()
            .map(|column| {
                let index = match &column.mapping {
                    Some(mapping) => mapping.trim().parse::<usize>().map_err(|_| {
                        format!("invalid csv mapping {mapping:?} for column {}", column.name)
                    })?,
                    None => column.ordinal_position,
                };
                match fields.get(index) {
                    None | Some("") => Ok(DataValue::Null),
                    Some(field) => Ok(DataValue::parse_as(
                        field,
                        column.data_type.kind(),
                        &self.options.time_zone,
                    )?),
                }
            })
            .collect()
    }
}

/// Decodes JSON objects. A column's mapping is a `/`-separated path of field names,
/// defaulting to the column name. Missing fields are null.
pub struct JsonRowDecoder {
    options: DecoderOptions,
}

impl JsonRowDecoder {
    pub fn new(options: &DecoderOptions) -> Self {
        JsonRowDecoder { options: *options }
    }

    fn convert(
        &self,
        value: &Value,
        kind: DataTypeKind,
    ) -> std::result::Result<DataValue, BoxError> {
        let mismatch = || format!("cannot read {value} as {kind}");
        Ok(match (kind, value) {
            (_, Value::Null) | (DataTypeKind::Null, _) => DataValue::Null,
            (DataTypeKind::Bool, Value::Bool(b)) => DataValue::Bool(*b),
            (DataTypeKind::Int64, Value::Number(n)) => {
                DataValue::Int64(n.as_i64().ok_or_else(mismatch)?)
            }
            (DataTypeKind::Float64, Value::Number(n)) => {
                DataValue::from(n.as_f64().ok_or_else(mismatch)?)
            }
            (DataTypeKind::String, Value::String(s)) => DataValue::String(s.clone()),
            (DataTypeKind::String, other) => DataValue::String(other.to_string()),
            // numbers are epoch milliseconds
            (DataTypeKind::Timestamp, Value::Number(n)) => {
                DataValue::Int64(n.as_i64().ok_or_else(mismatch)?)
            }
            (DataTypeKind::Timestamp, Value::String(s)) => {
                DataValue::Int64(parse_timestamp(s, &self.options.time_zone)?)
            }
            (kind, Value::String(s)) => DataValue::parse_as(s, kind, &self.options.time_zone)?,
            _ => return Err(mismatch().into()),
        })
    }
}

impl RowDecoder for JsonRowDecoder {
    fn format(&self) -> &str {
        "json"
    }

    fn decode_row(
        &self,
        record: &[u8],
        columns: &[ColumnHandle],
    ) -> std::result::Result<Vec<DataValue>, BoxError> {
        let root: Value = serde_json::from_slice(record)?;
        columns
            .iter()
            .map(|column| {
                let path = column.mapping.as_deref().unwrap_or(&column.name);
                let value = path
                    .split('/')
                    .try_fold(&root, |value, field| value.get(field));
                match value {
                    Some(value) => self.convert(value, column.data_type.kind()),
                    None => Ok(DataValue::Null),
                }
            })
            .collect()
    }
}
