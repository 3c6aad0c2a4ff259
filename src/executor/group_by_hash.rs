// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use ahash::{HashMap, HashMapExt};
use smallvec::SmallVec;

use crate::array::{ArrayBuilderImpl, ArrayImpl, DataChunk, I64Array};
use crate::types::{DataType, DataValue};
use crate::{Error, Result};

/// A set of values from group-by columns.
pub type GroupKeys = SmallVec<[DataValue; 4]>;

/// Assigns a dense id to every distinct combination of values in the key channels.
///
/// Ids start from 0 in order of first appearance. Keys compare by value, so two nulls are
/// the same key. With no key channels every row lands in group 0.
pub struct GroupByHash {
    channels: Vec<usize>,
    types: Vec<DataType>,
    groups: HashMap<GroupKeys, i64>,
    keys: Vec<GroupKeys>,
}

impl GroupByHash {
    pub fn new(channels: Vec<usize>, types: Vec<DataType>, expected_groups: usize) -> Self {
        assert_eq!(
            channels.len(),
            types.len(),
            "each key channel needs exactly one type"
        );
        GroupByHash {
            channels,
            types,
            groups: HashMap::with_capacity(expected_groups),
            keys: Vec::with_capacity(expected_groups),
        }
    }

    pub fn types(&self) -> &[DataType] {
        &self.types
    }

    pub fn group_count(&self) -> usize {
        self.keys.len()
    }

    /// The group id of every row in `chunk`, as a BIGINT vector.
    ///
    /// New keys are assigned the next free id.
    pub fn get_group_ids(&mut self, chunk: &DataChunk) -> Result<ArrayImpl> {
        let arrays = self
            .channels
            .iter()
            .map(|&channel| {
                if channel >= chunk.column_count() {
                    return Err(Error::invalid_channel(channel, chunk.column_count()));
                }
                Ok(chunk.array_at(channel))
            })
            .collect::<Result<SmallVec<[&ArrayImpl; 4]>>>()?;
        let ids: I64Array = (0..chunk.cardinality())
            .map(|row| {
                let key: GroupKeys = arrays.iter().map(|a| a.get(row)).collect();
                self.put_if_absent(key)
            })
            .collect();
        Ok(ArrayImpl::new_int64(ids))
    }

    fn put_if_absent(&mut self, key: GroupKeys) -> i64 {
        if let Some(&id) = self.groups.get(&key) {
            return id;
        }
        let id = self.keys.len() as i64;
        self.keys.push(key.clone());
        self.groups.insert(key, id);
        id
    }

    /// Append the key values of `group_id` to one builder per key channel.
    ///
    /// # Panics
    ///
    /// Panics if the id was never handed out.
    pub fn append_keys_to(&self, group_id: i64, builders: &mut [ArrayBuilderImpl]) {
        let key = &self.keys[group_id as usize];
        for (builder, value) in builders.iter_mut().zip(key) {
            builder.push(value);
        }
    }

    pub fn estimated_size(&self) -> usize {
        let key_size = std::mem::size_of::<GroupKeys>() + std::mem::size_of::<i64>();
        let heap: usize = self
            .keys
            .iter()
            .flat_map(|key| key.iter())
            .filter_map(DataValue::as_str)
            .map(str::len)
            .sum();
        // the key is stored in both the table and the id list
        self.keys.len() * key_size * 2 + heap * 2
    }
}
