// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! PubSub. A publisher samples published data sets into NetworkMessages through its writer
//! groups and a subscriber decodes them through its readers. Both talk over a connection, which
//! is bound to UDP or an MQTT broker.

pub mod application;
pub mod connection;
pub mod core;
pub mod discovery;
pub mod events;
pub mod publisher;
pub mod subscriber;
pub mod transport;
pub mod uadp;

#[cfg(test)]
mod tests;

pub mod prelude {
    pub use super::{
        application::PubSubApplication,
        connection::PubSubConnection,
        core::*,
        discovery::{UdpDiscoveryPublisher, UdpDiscoverySubscriber},
        events::*,
        publisher::WriterGroupPublisher,
        subscriber::MessageDispatcher,
        transport::{ConnectionContext, EndpointsProvider, NetworkMessageSink, PubSubTransport},
        uadp::{
            DataSetFieldContentMask, DataSetMessageType, DiscoveryInformationType,
            DiscoveryRequest, DiscoveryResponse, NetworkMessagePayload, UadpDataSetMessage,
            UadpDataSetMessageContentMask, UadpNetworkMessage, UadpNetworkMessageContentMask,
            UadpNetworkMessageType,
        },
    };
}
