// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::types::*;

use super::data_set_meta_data::DataSetMetaData;

/// One named value of a DataSet.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: DataValue,
    /// The node the value is read from on the publisher or written to on the subscriber.
    pub target_node_id: NodeId,
}

impl Field {
    pub fn new<T>(name: T, value: DataValue) -> Self
    where
        T: Into<String>,
    {
        Self {
            name: name.into(),
            value,
            target_node_id: NodeId::null(),
        }
    }
}

/// A sampled set of values destined for, or received from, one DataSetWriter. Fields are in
/// metadata order. A `None` field is one that a delta frame did not carry.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    pub name: String,
    pub meta_data: DataSetMetaData,
    pub fields: Vec<Option<Field>>,
}

impl DataSet {
    pub fn new(meta_data: DataSetMetaData, fields: Vec<Field>) -> Self {
        Self {
            name: meta_data.name.clone(),
            meta_data,
            fields: fields.into_iter().map(Some).collect(),
        }
    }

    /// True if any field is absent, i.e. the set only holds changes.
    pub fn is_delta(&self) -> bool {
        self.fields.iter().any(|f| f.is_none())
    }

    /// Iterates over the fields that are present along with their index.
    pub fn present_fields(&self) -> impl Iterator<Item = (usize, &Field)> {
        self.fields
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.as_ref().map(|f| (i, f)))
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .flatten()
            .find(|f| f.name == name)
    }

    /// Overlays the fields present in `delta` onto this set.
    pub fn merge(&mut self, delta: &DataSet) {
        if self.fields.len() < delta.fields.len() {
            self.fields.resize(delta.fields.len(), None);
        }
        for (i, field) in delta.present_fields() {
            self.fields[i] = Some(field.clone());
        }
    }
}
