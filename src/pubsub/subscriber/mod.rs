// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The receiving half of a connection. Every received datagram or broker message ends up in
//! `MessageDispatcher::dispatch`.

use std::{collections::HashMap, sync::Arc};

use crate::{
    core::debug,
    pubsub::{
        connection::PubSubConnection,
        core::{DataSet, DataSetDecodeErrorReason, DataStore, PublisherId},
        discovery::{UdpDiscoveryPublisher, UdpDiscoverySubscriber},
        events::{PubSubEvent, PubSubEventSender},
        uadp::{
            DataSetMessageType, DiscoveryResponse, NetworkMessagePayload, UadpDataSetMessage,
            UadpNetworkMessage,
        },
    },
    sync::*,
};

type BaselineKey = (Option<PublisherId>, u16, u16);

pub struct MessageDispatcher {
    connection: Arc<PubSubConnection>,
    data_store: Arc<DataStore>,
    events: Option<PubSubEventSender>,
    discovery_publisher: Option<Arc<UdpDiscoveryPublisher>>,
    discovery_subscriber: Option<Arc<UdpDiscoverySubscriber>>,
    /// The last complete data set of each writer, delta frames are applied to it.
    baselines: Mutex<HashMap<BaselineKey, DataSet>>,
}

impl MessageDispatcher {
    pub fn new(
        connection: Arc<PubSubConnection>,
        data_store: Arc<DataStore>,
        events: Option<PubSubEventSender>,
    ) -> Self {
        Self {
            connection,
            data_store,
            events,
            discovery_publisher: None,
            discovery_subscriber: None,
            baselines: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_discovery(
        mut self,
        discovery_publisher: Option<Arc<UdpDiscoveryPublisher>>,
        discovery_subscriber: Option<Arc<UdpDiscoverySubscriber>>,
    ) -> Self {
        self.discovery_publisher = discovery_publisher;
        self.discovery_subscriber = discovery_subscriber;
        self
    }

    /// Decodes received bytes and acts on what they hold. Malformed input is logged and dropped.
    pub fn dispatch(&self, data: &[u8]) {
        debug::log_buffer("Received NetworkMessage", data);
        let message = match self.connection.decode_network_message(data) {
            Ok(message) => message,
            Err(err) => {
                debug!(
                    "Connection {} dropped a NetworkMessage of {} bytes, status = {}",
                    self.connection.name(),
                    data.len(),
                    err
                );
                return;
            }
        };
        self.dispatch_message(message);
    }

    pub fn dispatch_message(&self, message: UadpNetworkMessage) {
        let publisher_id = message.publisher_id.clone();
        let writer_group_id = message.writer_group_id;
        match message.payload {
            NetworkMessagePayload::DataSetMessages(data_set_messages) => {
                for data_set_message in data_set_messages {
                    self.on_data_set_message(publisher_id.as_ref(), writer_group_id, data_set_message);
                }
            }
            NetworkMessagePayload::DiscoveryRequest(request) => {
                if let Some(ref discovery_publisher) = self.discovery_publisher {
                    discovery_publisher.on_request(&request);
                }
            }
            NetworkMessagePayload::DiscoveryResponse(response) => {
                self.on_discovery_response(publisher_id, response);
            }
        }
    }

    fn on_data_set_message(
        &self,
        publisher_id: Option<&PublisherId>,
        writer_group_id: u16,
        message: UadpDataSetMessage,
    ) {
        let data_set_writer_id = message.data_set_writer_id;
        if message.decode_error_reason != DataSetDecodeErrorReason::NoError {
            if message.is_metadata_major_version_change {
                if let Some(ref discovery_subscriber) = self.discovery_subscriber {
                    discovery_subscriber.request_meta_data(&[data_set_writer_id]);
                }
            }
            self.send_event(PubSubEvent::DataSetDecodeErrorOccurred {
                connection_name: self.connection.name().to_string(),
                publisher_id: publisher_id.cloned(),
                data_set_writer_id,
                reason: message.decode_error_reason,
            });
            return;
        }
        if message.message_type == DataSetMessageType::KeepAlive {
            trace!("Keep alive from writer {}", data_set_writer_id);
            return;
        }
        let data_set = match message.data_set {
            Some(data_set) => data_set,
            None => return,
        };

        let key = (publisher_id.cloned(), writer_group_id, data_set_writer_id);
        let data_set = {
            let mut baselines = trace_lock!(self.baselines);
            if message.message_type == DataSetMessageType::DeltaFrame {
                match baselines.get_mut(&key) {
                    Some(baseline) => {
                        baseline.merge(&data_set);
                        baseline.clone()
                    }
                    None => {
                        debug!(
                            "Delta frame from writer {} arrived before any key frame, discarded",
                            data_set_writer_id
                        );
                        return;
                    }
                }
            } else {
                baselines.insert(key, data_set.clone());
                data_set
            }
        };

        // Delta fields are the ones that changed, only those need writing
        for (_, field) in data_set.present_fields() {
            if !field.target_node_id.is_null() {
                self.data_store
                    .write_value(&field.target_node_id, field.value.clone());
            }
        }

        self.send_event(PubSubEvent::DataReceived {
            connection_name: self.connection.name().to_string(),
            publisher_id: publisher_id.cloned(),
            writer_group_id,
            data_set_writer_id,
            sequence_number: message.sequence_number,
            data_set,
        });
    }

    fn on_discovery_response(&self, publisher_id: Option<PublisherId>, response: DiscoveryResponse) {
        let connection_name = self.connection.name().to_string();
        match response {
            DiscoveryResponse::DataSetMetaData {
                data_set_writer_id,
                meta_data,
                status_code,
                ..
            } => {
                if status_code.is_bad() {
                    debug!(
                        "Publisher has no metadata for writer {}, status = {}",
                        data_set_writer_id, status_code
                    );
                    return;
                }
                if self.connection.update_reader_meta_data(
                    publisher_id.as_ref(),
                    data_set_writer_id,
                    &meta_data,
                ) {
                    // Data sets of the old version cannot take deltas of the new one
                    trace_lock!(self.baselines).retain(|k, _| k.2 != data_set_writer_id);
                }
                if let Some(ref discovery_subscriber) = self.discovery_subscriber {
                    discovery_subscriber.on_meta_data_received(data_set_writer_id);
                }
                self.send_event(PubSubEvent::MetaDataReceived {
                    connection_name,
                    publisher_id,
                    data_set_writer_id,
                    meta_data,
                });
            }
            DiscoveryResponse::PublisherEndpoints {
                endpoints,
                status_code,
                ..
            } => {
                if let Some(ref discovery_subscriber) = self.discovery_subscriber {
                    discovery_subscriber.on_publisher_endpoints_received();
                }
                self.send_event(PubSubEvent::PublisherEndpointsReceived {
                    connection_name,
                    publisher_id,
                    endpoints,
                    status_code,
                });
            }
            DiscoveryResponse::DataSetWriterConfiguration {
                data_set_writer_ids,
                writer_group,
                status_codes,
                ..
            } => {
                if let Some(ref discovery_subscriber) = self.discovery_subscriber {
                    discovery_subscriber.on_writer_configuration_received(&data_set_writer_ids);
                }
                self.send_event(PubSubEvent::DataSetWriterConfigurationReceived {
                    connection_name,
                    publisher_id,
                    data_set_writer_ids,
                    writer_group,
                    status_codes,
                });
            }
        }
    }

    fn send_event(&self, event: PubSubEvent) {
        if let Some(ref events) = self.events {
            if events.send(event).is_err() {
                trace!("Event receiver has gone away");
            }
        }
    }
}
