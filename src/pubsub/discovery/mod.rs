// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! UADP discovery over the discovery address of a UDP connection.

pub mod publisher;
pub mod subscriber;

pub use self::{
    publisher::{UdpDiscoveryPublisher, RESPONSE_DELAY},
    subscriber::{UdpDiscoverySubscriber, INITIAL_REQUEST_INTERVAL, MAX_REQUEST_INTERVAL},
};
