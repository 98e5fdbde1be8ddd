// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Transport bindings. A binding owns sockets or a broker client, runs the receive loop that
//! feeds the subscriber dispatcher and sends what the publisher produces.

use std::sync::Arc;

use crate::{
    pubsub::{
        connection::PubSubConnection,
        core::{DataCollector, DataStore, EndpointDescription},
        discovery::UdpDiscoverySubscriber,
        events::PubSubEventSender,
        uadp::UadpNetworkMessage,
    },
    types::StatusCode,
};

pub mod mqtt;
pub mod udp;

pub use crate::pubsub::core::{MQTT_UADP_TRANSPORT_PROFILE, UDP_UADP_TRANSPORT_PROFILE};

/// Supplies the endpoints a publisher announces in a PublisherEndpoints discovery response.
pub type EndpointsProvider = Arc<dyn Fn() -> Vec<EndpointDescription> + Send + Sync>;

/// Something NetworkMessages can be sent through.
pub trait NetworkMessageSink: Send + Sync {
    /// Sends an encoded message. The message is passed along so the sink can pick a destination
    /// by its kind. Returns false if nothing could be sent.
    fn send(&self, message: &UadpNetworkMessage, bytes: &[u8]) -> bool;

    /// Encodes and sends a message. Failures are logged and reported through the return value.
    fn publish_network_message(&self, message: &UadpNetworkMessage) -> bool {
        match message.encode_to_vec() {
            Ok(bytes) => self.send(message, &bytes),
            Err(err) => {
                error!("Cannot encode NetworkMessage, status = {}", err);
                false
            }
        }
    }
}

/// A connection bound to a transport.
pub trait PubSubTransport: NetworkMessageSink {
    fn connection(&self) -> &Arc<PubSubConnection>;

    /// Opens the transport and starts publishing, receiving and discovery. Must be called from
    /// within a tokio runtime.
    fn start(&self) -> Result<(), StatusCode>;

    /// Stops every task of the connection and closes its sockets or broker client.
    fn stop(&self);

    fn is_running(&self) -> bool;

    /// The discovery requester of a running connection, for transports that have one.
    fn discovery_subscriber(&self) -> Option<Arc<UdpDiscoverySubscriber>> {
        None
    }
}

/// What a transport needs from the application besides its connection.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct ConnectionContext {
    #[derivative(Debug = "ignore")]
    pub collector: Arc<dyn DataCollector>,
    pub data_store: Arc<DataStore>,
    pub events: Option<PubSubEventSender>,
    #[derivative(Debug = "ignore")]
    pub endpoints_provider: Option<EndpointsProvider>,
}

impl ConnectionContext {
    pub fn new(collector: Arc<dyn DataCollector>, data_store: Arc<DataStore>) -> Self {
        Self {
            collector,
            data_store,
            events: None,
            endpoints_provider: None,
        }
    }

    pub fn endpoints(&self) -> Vec<EndpointDescription> {
        self.endpoints_provider
            .as_ref()
            .map(|provider| provider())
            .unwrap_or_default()
    }
}
