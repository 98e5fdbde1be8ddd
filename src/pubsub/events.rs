// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::{
    pubsub::core::{
        DataSet, DataSetDecodeErrorReason, DataSetMetaData, EndpointDescription, PublisherId,
        WriterGroup,
    },
    types::StatusCode,
};

/// Notifications a subscriber application receives from its connections.
#[derive(Debug, Clone, PartialEq)]
pub enum PubSubEvent {
    DataReceived {
        connection_name: String,
        publisher_id: Option<PublisherId>,
        writer_group_id: u16,
        data_set_writer_id: u16,
        sequence_number: u16,
        /// Always a full data set, delta frames are merged before delivery.
        data_set: DataSet,
    },
    MetaDataReceived {
        connection_name: String,
        publisher_id: Option<PublisherId>,
        data_set_writer_id: u16,
        meta_data: DataSetMetaData,
    },
    DataSetDecodeErrorOccurred {
        connection_name: String,
        publisher_id: Option<PublisherId>,
        data_set_writer_id: u16,
        reason: DataSetDecodeErrorReason,
    },
    PublisherEndpointsReceived {
        connection_name: String,
        publisher_id: Option<PublisherId>,
        endpoints: Vec<EndpointDescription>,
        status_code: StatusCode,
    },
    DataSetWriterConfigurationReceived {
        connection_name: String,
        publisher_id: Option<PublisherId>,
        data_set_writer_ids: Vec<u16>,
        writer_group: WriterGroup,
        status_codes: Vec<StatusCode>,
    },
}

pub type PubSubEventSender = UnboundedSender<PubSubEvent>;
pub type PubSubEventReceiver = UnboundedReceiver<PubSubEvent>;
