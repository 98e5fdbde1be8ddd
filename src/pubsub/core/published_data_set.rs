// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::types::NodeId;

use super::data_set_meta_data::DataSetMetaData;

/// A named DataSet a publisher samples. Each published variable supplies the field at the same
/// position in the metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishedDataSet {
    pub name: String,
    pub data_set_meta_data: DataSetMetaData,
    pub published_variables: Vec<NodeId>,
}

impl PublishedDataSet {
    pub fn new(data_set_meta_data: DataSetMetaData, published_variables: Vec<NodeId>) -> Self {
        Self {
            name: data_set_meta_data.name.clone(),
            data_set_meta_data,
            published_variables,
        }
    }

    pub fn is_valid(&self) -> bool {
        if self.published_variables.len() != self.data_set_meta_data.fields.len() {
            error!(
                "PublishedDataSet {} has {} variables for {} fields",
                self.name,
                self.published_variables.len(),
                self.data_set_meta_data.fields.len()
            );
            false
        } else {
            true
        }
    }
}
