// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::types::NodeId;

use super::{data_set_meta_data::DataSetMetaData, publisher_id::PublisherId};

/// Subscribe side counterpart of a DataSetWriter. Selects DataSetMessages by publisher, writer
/// group and writer and holds the metadata needed to decode them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Derivative)]
#[derivative(Default)]
#[serde(default)]
pub struct DataSetReader {
    pub name: String,
    #[derivative(Default(value = "true"))]
    pub enabled: bool,
    /// None matches any publisher
    pub publisher_id: Option<PublisherId>,
    /// 0 matches any writer group
    pub writer_group_id: u16,
    /// 0 matches any writer
    pub data_set_writer_id: u16,
    pub data_set_meta_data: DataSetMetaData,
    /// Nodes in the data store that received fields are written to, in field order.
    pub target_variables: Vec<NodeId>,
    /// Broker topic for MQTT connections
    pub queue_name: Option<String>,
}

impl DataSetReader {
    pub fn new<T>(
        name: T,
        publisher_id: Option<PublisherId>,
        writer_group_id: u16,
        data_set_writer_id: u16,
        data_set_meta_data: DataSetMetaData,
    ) -> Self
    where
        T: Into<String>,
    {
        Self {
            name: name.into(),
            publisher_id,
            writer_group_id,
            data_set_writer_id,
            data_set_meta_data,
            ..Default::default()
        }
    }

    /// Tests if a message from the publisher, group and writer is meant for this reader. A value
    /// missing from the message matches anything.
    pub fn matches(
        &self,
        publisher_id: Option<&PublisherId>,
        writer_group_id: Option<u16>,
        data_set_writer_id: Option<u16>,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        if let (Some(expected), Some(actual)) = (self.publisher_id.as_ref(), publisher_id) {
            if expected != actual {
                return false;
            }
        }
        if let Some(writer_group_id) = writer_group_id {
            if self.writer_group_id != 0 && self.writer_group_id != writer_group_id {
                return false;
            }
        }
        if let Some(data_set_writer_id) = data_set_writer_id {
            if self.data_set_writer_id != 0 && self.data_set_writer_id != data_set_writer_id {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Derivative)]
#[derivative(Default)]
#[serde(default)]
pub struct ReaderGroup {
    pub name: String,
    #[derivative(Default(value = "true"))]
    pub enabled: bool,
    pub data_set_readers: Vec<DataSetReader>,
}

impl ReaderGroup {
    pub fn new<T>(name: T, data_set_readers: Vec<DataSetReader>) -> Self
    where
        T: Into<String>,
    {
        Self {
            name: name.into(),
            enabled: true,
            data_set_readers,
        }
    }

    /// The readers that take part in decoding, i.e. enabled readers of an enabled group.
    pub fn operational_readers(&self) -> impl Iterator<Item = &DataSetReader> {
        self.data_set_readers
            .iter()
            .filter(move |r| self.enabled && r.enabled)
    }
}
