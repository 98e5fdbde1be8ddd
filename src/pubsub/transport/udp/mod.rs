// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The `pubsub-udp-uadp` transport: unicast, broadcast and multicast datagrams.

pub mod client;
pub mod connection;
pub mod endpoint;

pub use self::{
    client::{get_udp_clients, UdpClient, UdpClientRole},
    connection::{UdpPubSubConnection, UdpSender},
    endpoint::{get_endpoint, UdpAddressType},
};

#[cfg(test)]
mod tests;
