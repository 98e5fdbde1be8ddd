// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::{
    collections::HashMap,
    io::{Read, Write},
};

use crate::{pubsub::uadp::flags::UadpNetworkMessageContentMask, types::*};

use super::{
    configuration_version::ConfigurationVersion, data_set::DataSet,
    data_set_meta_data::DataSetMetaData, data_set_writer::DataSetWriter,
};

/// Quality of service requested from a broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BrokerTransportQualityOfService {
    #[default]
    NotSpecified,
    BestEffort,
    AtLeastOnce,
    AtMostOnce,
    ExactlyOnce,
}

fn default_network_message_content_mask() -> UadpNetworkMessageContentMask {
    UadpNetworkMessageContentMask::PUBLISHER_ID
        | UadpNetworkMessageContentMask::GROUP_HEADER
        | UadpNetworkMessageContentMask::WRITER_GROUP_ID
        | UadpNetworkMessageContentMask::PAYLOAD_HEADER
}

/// Publish side grouping of DataSetWriters. All writers of a group go out together in one
/// NetworkMessage each publishing interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Derivative)]
#[derivative(Default)]
#[serde(default)]
pub struct WriterGroup {
    pub name: String,
    #[derivative(Default(value = "true"))]
    pub enabled: bool,
    pub writer_group_id: u16,
    /// Publishing interval in ms
    #[derivative(Default(value = "1000.0"))]
    pub publishing_interval: f64,
    /// Keep alive time in ms
    #[derivative(Default(value = "5000.0"))]
    pub keep_alive_time: f64,
    pub priority: u8,
    #[derivative(Default(value = "1500"))]
    pub max_network_message_size: u32,
    pub group_version: u32,
    #[derivative(Default(value = "default_network_message_content_mask()"))]
    pub network_message_content_mask: UadpNetworkMessageContentMask,
    /// Broker topic for MQTT connections
    pub queue_name: Option<String>,
    pub qos: BrokerTransportQualityOfService,
    pub data_set_writers: Vec<DataSetWriter>,
}

impl WriterGroup {
    pub fn new<T>(name: T, writer_group_id: u16, publishing_interval: f64) -> Self
    where
        T: Into<String>,
    {
        Self {
            name: name.into(),
            writer_group_id,
            publishing_interval,
            ..Default::default()
        }
    }

    pub fn add_writer(&mut self, writer: DataSetWriter) {
        self.data_set_writers.push(writer);
    }

    pub fn find_writer(&self, data_set_writer_id: u16) -> Option<&DataSetWriter> {
        self.data_set_writers
            .iter()
            .find(|w| w.data_set_writer_id == data_set_writer_id)
    }

    pub fn enabled_writers(&self) -> impl Iterator<Item = &DataSetWriter> {
        self.data_set_writers.iter().filter(|w| w.enabled)
    }

    pub fn is_valid(&self) -> bool {
        let mut valid = true;
        if !(self.publishing_interval > 0.0) {
            error!(
                "WriterGroup {} has an invalid publishing interval {}",
                self.name, self.publishing_interval
            );
            valid = false;
        }
        if !self.data_set_writers.iter().all(|w| w.is_valid()) {
            valid = false;
        }
        valid
    }
}

/// The configuration that a DataSetWriterConfiguration discovery response carries.
impl BinaryEncoder<WriterGroup> for WriterGroup {
    fn byte_len(&self) -> usize {
        UAString::from(self.name.as_str()).byte_len()
            + 1
            + 2
            + 8
            + 8
            + 1
            + 4
            + 4
            + 4
            + 4
            + self
                .data_set_writers
                .iter()
                .map(|w| w.byte_len())
                .sum::<usize>()
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = UAString::from(self.name.as_str()).encode(stream)?;
        size += self.enabled.encode(stream)?;
        size += write_u16(stream, self.writer_group_id)?;
        size += write_f64(stream, self.publishing_interval)?;
        size += write_f64(stream, self.keep_alive_time)?;
        size += write_u8(stream, self.priority)?;
        size += write_u32(stream, self.max_network_message_size)?;
        size += write_u32(stream, self.group_version)?;
        size += write_u32(stream, self.network_message_content_mask.bits())?;
        size += write_i32(stream, self.data_set_writers.len() as i32)?;
        for writer in &self.data_set_writers {
            size += writer.encode(stream)?;
        }
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let name = String::from(UAString::decode(stream, decoding_options)?);
        let enabled = bool::decode(stream, decoding_options)?;
        let writer_group_id = read_u16(stream)?;
        let publishing_interval = read_f64(stream)?;
        let keep_alive_time = read_f64(stream)?;
        let priority = read_u8(stream)?;
        let max_network_message_size = read_u32(stream)?;
        let group_version = read_u32(stream)?;
        let network_message_content_mask =
            UadpNetworkMessageContentMask::from_bits_truncate(read_u32(stream)?);
        let data_set_writers: Option<Vec<DataSetWriter>> = read_array(stream, decoding_options)?;
        Ok(WriterGroup {
            name,
            enabled,
            writer_group_id,
            publishing_interval,
            keep_alive_time,
            priority,
            max_network_message_size,
            group_version,
            network_message_content_mask,
            queue_name: None,
            qos: BrokerTransportQualityOfService::NotSpecified,
            data_set_writers: data_set_writers.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Default)]
struct WriterPublishState {
    message_count: u32,
    last_data_set: Option<DataSet>,
    last_meta_data_version: Option<ConfigurationVersion>,
}

/// Per writer publishing history of a writer group. Holds the snapshot that delta frames are
/// computed against and the metadata version last announced. Never shared between groups.
#[derive(Debug, Default)]
pub struct WriterGroupPublishState {
    writers: HashMap<u16, WriterPublishState>,
}

impl WriterGroupPublishState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tests if the next message of the writer is a delta frame. A cycle of `key_frame_count`
    /// messages starts with a key frame, and there is no delta without a snapshot to compare to.
    pub fn is_delta_frame(&self, writer: &DataSetWriter) -> bool {
        if writer.key_frame_count <= 1 {
            return false;
        }
        match self.writers.get(&writer.data_set_writer_id) {
            Some(state) => {
                state.last_data_set.is_some()
                    && state.message_count % writer.key_frame_count != 0
            }
            None => false,
        }
    }

    /// Turns a freshly collected data set into what the writer sends next. For a delta frame
    /// every field that did not change since the snapshot is removed. Returns `None` when a delta
    /// frame has nothing to carry, in which case the message counts as sent.
    pub fn exclude_unchanged_fields(
        &mut self,
        writer: &DataSetWriter,
        data_set: DataSet,
    ) -> Option<DataSet> {
        if !self.is_delta_frame(writer) {
            return Some(data_set);
        }
        let state = self.writers.entry(writer.data_set_writer_id).or_default();
        let last = state.last_data_set.as_ref()?;

        let mut changed = false;
        let fields = data_set
            .fields
            .into_iter()
            .enumerate()
            .map(|(i, field)| {
                let field = field?;
                let unchanged = matches!(
                    last.fields.get(i),
                    Some(Some(previous)) if previous.value.value == field.value.value
                        && previous.value.status == field.value.status
                );
                if unchanged {
                    None
                } else {
                    changed = true;
                    Some(field)
                }
            })
            .collect::<Vec<_>>();

        if changed {
            Some(DataSet {
                name: data_set.name,
                meta_data: data_set.meta_data,
                fields,
            })
        } else {
            trace!(
                "Writer {} has no changes for its delta frame",
                writer.data_set_writer_id
            );
            state.message_count = state.message_count.wrapping_add(1);
            None
        }
    }

    /// Records that a data set was published. A key frame replaces the snapshot, a delta frame is
    /// merged into it.
    pub fn on_message_published(&mut self, writer: &DataSetWriter, data_set: &DataSet) {
        let state = self.writers.entry(writer.data_set_writer_id).or_default();
        match state.last_data_set {
            Some(ref mut last) if data_set.is_delta() => last.merge(data_set),
            _ => state.last_data_set = Some(data_set.clone()),
        }
        state.message_count = state.message_count.wrapping_add(1);
    }

    /// Tests if the writer's metadata is new or changed since the last call. A change restarts
    /// the key frame cycle so the next message is a key frame.
    pub fn has_meta_data_changed(
        &mut self,
        writer: &DataSetWriter,
        meta_data: &DataSetMetaData,
    ) -> bool {
        let state = self.writers.entry(writer.data_set_writer_id).or_default();
        if state.last_meta_data_version == Some(meta_data.configuration_version) {
            false
        } else {
            debug!(
                "Metadata of writer {} is now version {}",
                writer.data_set_writer_id, meta_data.configuration_version
            );
            state.last_meta_data_version = Some(meta_data.configuration_version);
            state.message_count = 0;
            state.last_data_set = None;
            true
        }
    }

    /// Number of messages published by the writer in its current cycle history.
    pub fn message_count(&self, data_set_writer_id: u16) -> u32 {
        self.writers
            .get(&data_set_writer_id)
            .map(|s| s.message_count)
            .unwrap_or(0)
    }
}
