// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The transport independent half of a PubSub connection. It turns writer groups into
//! NetworkMessages, answers what a discovery response should contain and decodes received bytes
//! against the connection's readers.

use std::collections::BTreeSet;

use crate::{
    pubsub::{
        core::*,
        uadp::{
            DiscoveryInformationType, DiscoveryRequest, DiscoveryResponse, NetworkMessagePayload,
            UadpDataSetMessage, UadpNetworkMessage, UadpNetworkMessageContentMask,
        },
    },
    sync::*,
    types::*,
};

#[derive(Debug, Default)]
struct SequenceNumbers {
    network_message: u16,
    data_set_message: u16,
    discovery: u16,
}

fn next(counter: &mut u16) -> u16 {
    *counter = counter.wrapping_add(1);
    *counter
}

#[derive(Debug)]
pub struct PubSubConnection {
    config: PubSubConnectionConfig,
    /// Operational readers of all reader groups. Their metadata is replaced when discovery
    /// delivers newer metadata.
    readers: RwLock<Vec<DataSetReader>>,
    sequence_numbers: Mutex<SequenceNumbers>,
    decoding_options: DecodingOptions,
}

impl PubSubConnection {
    pub fn new(config: PubSubConnectionConfig) -> Self {
        let readers = config
            .reader_groups
            .iter()
            .flat_map(|g| g.operational_readers())
            .cloned()
            .collect();
        Self {
            config,
            readers: RwLock::new(readers),
            sequence_numbers: Mutex::new(SequenceNumbers::default()),
            decoding_options: DecodingOptions::default(),
        }
    }

    pub fn config(&self) -> &PubSubConnectionConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn publisher_id(&self) -> Option<&PublisherId> {
        self.config.publisher_id.as_ref()
    }

    pub fn enabled_writer_groups(&self) -> impl Iterator<Item = &WriterGroup> {
        self.config.writer_groups.iter().filter(|g| g.enabled)
    }

    pub fn has_writers(&self) -> bool {
        self.enabled_writer_groups().next().is_some()
    }

    pub fn has_readers(&self) -> bool {
        !trace_read_lock!(self.readers).is_empty()
    }

    /// A copy of the operational readers.
    pub fn readers(&self) -> Vec<DataSetReader> {
        trace_read_lock!(self.readers).clone()
    }

    fn find_writer(&self, data_set_writer_id: u16) -> Option<(&WriterGroup, &DataSetWriter)> {
        self.enabled_writer_groups().find_map(|g| {
            g.find_writer(data_set_writer_id)
                .filter(|w| w.enabled)
                .map(|w| (g, w))
        })
    }

    /// Builds what a writer group sends for one publishing interval: a MetaData message for each
    /// writer whose metadata is new or changed, followed by the data. The data of all writers goes
    /// into one NetworkMessage when the group has a payload header, otherwise each writer gets its
    /// own.
    pub fn create_network_messages(
        &self,
        writer_group: &WriterGroup,
        publish_state: &mut WriterGroupPublishState,
        collector: &dyn DataCollector,
    ) -> Vec<UadpNetworkMessage> {
        let mut meta_data_messages = Vec::new();
        let mut data_set_messages = Vec::new();

        for writer in writer_group.enabled_writers() {
            let meta_data = match collector.meta_data(&writer.data_set_name) {
                Some(meta_data) => meta_data,
                None => {
                    warn!(
                        "Writer {} refers to unknown data set {}",
                        writer.name, writer.data_set_name
                    );
                    continue;
                }
            };
            if publish_state.has_meta_data_changed(writer, &meta_data) {
                if let Some(message) =
                    self.create_meta_data_message(writer.data_set_writer_id, meta_data)
                {
                    meta_data_messages.push(message);
                }
            }

            let data_set = match collector.collect_data(&writer.data_set_name) {
                Some(data_set) => data_set,
                None => continue,
            };
            if let Some(data_set) = publish_state.exclude_unchanged_fields(writer, data_set) {
                publish_state.on_message_published(writer, &data_set);
                let sequence_number = self.next_data_set_sequence_number();
                data_set_messages.push(UadpDataSetMessage::new(writer, data_set, sequence_number));
            }
        }

        let mut messages = meta_data_messages;
        if data_set_messages.is_empty() {
            return messages;
        }
        if writer_group
            .network_message_content_mask
            .contains(UadpNetworkMessageContentMask::PAYLOAD_HEADER)
        {
            messages.push(self.create_data_network_message(writer_group, data_set_messages));
        } else {
            for data_set_message in data_set_messages {
                messages
                    .push(self.create_data_network_message(writer_group, vec![data_set_message]));
            }
        }
        messages
    }

    /// A NetworkMessage holding a keep alive for the enabled writers of the group. Without a
    /// payload header only the first writer can speak for the group.
    pub fn create_keep_alive_network_message(
        &self,
        writer_group: &WriterGroup,
    ) -> Option<UadpNetworkMessage> {
        let limit = if writer_group
            .network_message_content_mask
            .contains(UadpNetworkMessageContentMask::PAYLOAD_HEADER)
        {
            usize::MAX
        } else {
            1
        };
        let data_set_messages = writer_group
            .enabled_writers()
            .take(limit)
            .map(|w| UadpDataSetMessage::keep_alive(w, self.next_data_set_sequence_number()))
            .collect::<Vec<_>>();
        if data_set_messages.is_empty() {
            None
        } else {
            Some(self.create_data_network_message(writer_group, data_set_messages))
        }
    }

    fn create_data_network_message(
        &self,
        writer_group: &WriterGroup,
        data_set_messages: Vec<UadpDataSetMessage>,
    ) -> UadpNetworkMessage {
        let mut message = UadpNetworkMessage::new(
            writer_group.network_message_content_mask,
            self.config.publisher_id.clone(),
            NetworkMessagePayload::DataSetMessages(data_set_messages),
        );
        message.writer_group_id = writer_group.writer_group_id;
        message.group_version = writer_group.group_version;
        message.network_message_number = 1;
        message.sequence_number = self.next_network_message_sequence_number();
        message.timestamp = DateTime::now();
        message
    }

    fn create_meta_data_message(
        &self,
        data_set_writer_id: u16,
        meta_data: DataSetMetaData,
    ) -> Option<UadpNetworkMessage> {
        let publisher_id = self.discovery_publisher_id()?;
        let response = DiscoveryResponse::DataSetMetaData {
            sequence_number: self.next_discovery_sequence_number(),
            data_set_writer_id,
            meta_data,
            status_code: StatusCode::Good,
        };
        Some(UadpNetworkMessage::discovery_response(publisher_id, response))
    }

    fn discovery_publisher_id(&self) -> Option<PublisherId> {
        let publisher_id = self.config.publisher_id.clone();
        if publisher_id.is_none() {
            error!(
                "Connection {} cannot send discovery responses without a publisher id",
                self.config.name
            );
        }
        publisher_id
    }

    /// One MetaData response per requested writer of this connection. Writers that belong to
    /// someone else are not answered since other publishers share the discovery address.
    pub fn create_data_set_meta_data_network_messages(
        &self,
        data_set_writer_ids: &[u16],
        collector: &dyn DataCollector,
    ) -> Vec<UadpNetworkMessage> {
        data_set_writer_ids
            .iter()
            .filter_map(|id| {
                let (_, writer) = self.find_writer(*id)?;
                let meta_data = collector.meta_data(&writer.data_set_name)?;
                self.create_meta_data_message(*id, meta_data)
            })
            .collect()
    }

    pub fn create_publisher_endpoints_network_message(
        &self,
        endpoints: Vec<EndpointDescription>,
    ) -> Option<UadpNetworkMessage> {
        let publisher_id = self.discovery_publisher_id()?;
        let status_code = if endpoints.is_empty() {
            StatusCode::BadNotFound
        } else {
            StatusCode::Good
        };
        let response = DiscoveryResponse::PublisherEndpoints {
            sequence_number: self.next_discovery_sequence_number(),
            endpoints,
            status_code,
        };
        Some(UadpNetworkMessage::discovery_response(publisher_id, response))
    }

    /// One response per writer group holding any of the requested writers, carrying the group with
    /// just those writers.
    pub fn create_data_set_writer_configuration_network_messages(
        &self,
        data_set_writer_ids: &[u16],
    ) -> Vec<UadpNetworkMessage> {
        let publisher_id = match self.discovery_publisher_id() {
            Some(publisher_id) => publisher_id,
            None => return Vec::new(),
        };
        let requested = data_set_writer_ids.iter().copied().collect::<BTreeSet<_>>();
        self.enabled_writer_groups()
            .filter_map(|writer_group| {
                let writers = writer_group
                    .enabled_writers()
                    .filter(|w| requested.contains(&w.data_set_writer_id))
                    .cloned()
                    .collect::<Vec<_>>();
                if writers.is_empty() {
                    return None;
                }
                let data_set_writer_ids = writers
                    .iter()
                    .map(|w| w.data_set_writer_id)
                    .collect::<Vec<_>>();
                let status_codes = vec![StatusCode::Good; writers.len()];
                let mut writer_group = writer_group.clone();
                writer_group.data_set_writers = writers;
                let response = DiscoveryResponse::DataSetWriterConfiguration {
                    sequence_number: self.next_discovery_sequence_number(),
                    data_set_writer_ids,
                    writer_group,
                    status_codes,
                };
                Some(UadpNetworkMessage::discovery_response(
                    publisher_id.clone(),
                    response,
                ))
            })
            .collect()
    }

    pub fn create_discovery_request_message(
        &self,
        information_type: DiscoveryInformationType,
        data_set_writer_ids: Vec<u16>,
    ) -> UadpNetworkMessage {
        UadpNetworkMessage::discovery_request(
            self.config.publisher_id.clone(),
            DiscoveryRequest::new(information_type, data_set_writer_ids),
        )
    }

    pub fn decode_network_message(&self, data: &[u8]) -> EncodingResult<UadpNetworkMessage> {
        let readers = trace_read_lock!(self.readers);
        UadpNetworkMessage::decode(data, &readers, &self.decoding_options)
    }

    /// Stores metadata received for a writer in every reader of that exact writer. Returns true if
    /// any reader was updated.
    pub fn update_reader_meta_data(
        &self,
        publisher_id: Option<&PublisherId>,
        data_set_writer_id: u16,
        meta_data: &DataSetMetaData,
    ) -> bool {
        let mut readers = trace_write_lock!(self.readers);
        let mut updated = false;
        for reader in readers.iter_mut().filter(|r| {
            r.data_set_writer_id == data_set_writer_id && r.matches(publisher_id, None, None)
        }) {
            if reader.data_set_meta_data != *meta_data {
                debug!(
                    "Reader {} now has metadata version {}",
                    reader.name, meta_data.configuration_version
                );
                reader.data_set_meta_data = meta_data.clone();
                updated = true;
            }
        }
        updated
    }

    /// Writer ids of readers that have no usable metadata and need to ask for it.
    pub fn writer_ids_without_meta_data(&self) -> Vec<u16> {
        let readers = trace_read_lock!(self.readers);
        readers
            .iter()
            .filter(|r| {
                r.data_set_writer_id != 0
                    && !r.data_set_meta_data.configuration_version.is_usable()
            })
            .map(|r| r.data_set_writer_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn next_network_message_sequence_number(&self) -> u16 {
        next(&mut trace_lock!(self.sequence_numbers).network_message)
    }

    fn next_data_set_sequence_number(&self) -> u16 {
        next(&mut trace_lock!(self.sequence_numbers).data_set_message)
    }

    pub fn next_discovery_sequence_number(&self) -> u16 {
        next(&mut trace_lock!(self.sequence_numbers).discovery)
    }
}
