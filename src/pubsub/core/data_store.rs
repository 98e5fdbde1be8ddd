// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The values a publisher samples from and a subscriber writes into.

use std::{collections::HashMap, sync::Arc};

use crate::{sync::*, types::*};

use super::{
    data_set::{DataSet, Field},
    data_set_meta_data::DataSetMetaData,
    published_data_set::PublishedDataSet,
};

/// A thread safe map of node id to its latest value.
#[derive(Debug, Default)]
pub struct DataStore {
    values: RwLock<HashMap<NodeId, DataValue>>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_value(&self, node_id: &NodeId, value: DataValue) {
        let mut values = trace_write_lock!(self.values);
        values.insert(node_id.clone(), value);
    }

    pub fn read_value(&self, node_id: &NodeId) -> Option<DataValue> {
        let values = trace_read_lock!(self.values);
        values.get(node_id).cloned()
    }
}

/// Supplies the current DataSet of a published data set when a writer group publishes.
pub trait DataCollector: Send + Sync {
    /// Samples the named data set. Returns `None` if there is no such data set.
    fn collect_data(&self, data_set_name: &str) -> Option<DataSet>;

    /// The metadata of the named data set.
    fn meta_data(&self, data_set_name: &str) -> Option<DataSetMetaData>;
}

/// Collects published data sets from a `DataStore`.
pub struct DataStoreCollector {
    data_store: Arc<DataStore>,
    published_data_sets: RwLock<Vec<PublishedDataSet>>,
}

impl DataStoreCollector {
    pub fn new(data_store: Arc<DataStore>, published_data_sets: Vec<PublishedDataSet>) -> Self {
        Self {
            data_store,
            published_data_sets: RwLock::new(published_data_sets),
        }
    }

    /// Replaces the metadata of a published data set, e.g. to announce a new version.
    pub fn set_meta_data(&self, meta_data: DataSetMetaData) {
        let mut published_data_sets = trace_write_lock!(self.published_data_sets);
        if let Some(p) = published_data_sets
            .iter_mut()
            .find(|p| p.name == meta_data.name)
        {
            p.data_set_meta_data = meta_data;
        }
    }
}

impl DataCollector for DataStoreCollector {
    fn collect_data(&self, data_set_name: &str) -> Option<DataSet> {
        let published_data_sets = trace_read_lock!(self.published_data_sets);
        let published = published_data_sets
            .iter()
            .find(|p| p.name == data_set_name)?;
        let fields = published
            .data_set_meta_data
            .fields
            .iter()
            .zip(published.published_variables.iter())
            .map(|(field_meta_data, node_id)| {
                let value = self.data_store.read_value(node_id).unwrap_or_else(|| DataValue {
                    status: Some(StatusCode::BadNoData),
                    ..Default::default()
                });
                Field {
                    name: field_meta_data.name.clone(),
                    value,
                    target_node_id: node_id.clone(),
                }
            })
            .collect();
        Some(DataSet::new(published.data_set_meta_data.clone(), fields))
    }

    fn meta_data(&self, data_set_name: &str) -> Option<DataSetMetaData> {
        let published_data_sets = trace_read_lock!(self.published_data_sets);
        published_data_sets
            .iter()
            .find(|p| p.name == data_set_name)
            .map(|p| p.data_set_meta_data.clone())
    }
}
