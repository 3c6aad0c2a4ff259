// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! What the execution core needs to know about connector columns.
//!
//! A connector describes its columns with [`ColumnHandle`]s. The core only turns them into a
//! channel layout and decodes raw records into chunks with a [`RowDecoder`].

use serde::{Deserialize, Serialize};

use crate::types::DataType;

mod decoder;

pub use self::decoder::*;

/// Metadata of one connector column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnHandle {
    pub name: String,
    pub ordinal_position: usize,
    pub data_type: DataType,
    /// Hidden columns can be read explicitly but are not part of the default layout.
    #[serde(default)]
    pub hidden: bool,
    /// Internal columns are provided by the connector rather than by the record.
    #[serde(default)]
    pub internal: bool,
    /// Selects the decoder.
    #[serde(default)]
    pub data_format: Option<String>,
    /// Where the decoder finds the value in a record.
    #[serde(default)]
    pub mapping: Option<String>,
}

impl ColumnHandle {
    pub fn new(name: impl Into<String>, ordinal_position: usize, data_type: DataType) -> Self {
        ColumnHandle {
            name: name.into(),
            ordinal_position,
            data_type,
            hidden: false,
            internal: false,
            data_format: None,
            mapping: None,
        }
    }

    pub fn with_mapping(mut self, mapping: impl Into<String>) -> Self {
        self.mapping = Some(mapping.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// The channel layout of a row batch built from connector columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLayout {
    columns: Vec<ColumnHandle>,
}

impl ChannelLayout {
    /// Columns in channel order.
    pub fn columns(&self) -> &[ColumnHandle] {
        &self.columns
    }

    pub fn types(&self) -> Vec<DataType> {
        self.columns.iter().map(|c| c.data_type).collect()
    }

    /// The channel of the column named `name`.
    pub fn channel_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// Lay out the visible columns in ordinal order.
pub fn channel_layout(handles: &[ColumnHandle]) -> ChannelLayout {
    let mut columns = handles
        .iter()
        .filter(|c| !c.hidden)
        .cloned()
        .collect::<Vec<_>>();
    columns.sort_by_key(|c| c.ordinal_position);
    ChannelLayout { columns }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataTypeKind;

    #[test]
    fn layout_orders_visible_columns() {
        let handles = [
            ColumnHandle::new("price", 2, DataTypeKind::Float64.nullable()),
            ColumnHandle::new("_offset", 0, DataTypeKind::Int64.not_null()).hidden(),
            ColumnHandle::new("id", 1, DataTypeKind::Int64.not_null()),
        ];
        let layout = channel_layout(&handles);
        assert_eq!(
            layout.types(),
            vec![
                DataTypeKind::Int64.not_null(),
                DataTypeKind::Float64.nullable()
            ]
        );
        assert_eq!(layout.channel_of("price"), Some(1));
        assert_eq!(layout.channel_of("_offset"), None);
    }

    #[test]
    fn deserialize_handle() {
        let json = r#"{
            "name": "ts",
            "ordinal_position": 3,
            "data_type": { "kind": "Timestamp", "nullable": true },
            "mapping": "meta/created"
        }"#;
        let handle: ColumnHandle = serde_json::from_str(json).unwrap();
        assert_eq!(
            handle,
            ColumnHandle::new("ts", 3, DataTypeKind::Timestamp.nullable())
                .with_mapping("meta/created")
        );
    }
}
