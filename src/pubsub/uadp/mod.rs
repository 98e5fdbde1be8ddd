// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The UADP message mapping. Message security and chunking are not implemented, such messages are
//! rejected when decoded.

pub mod data_set_message;
pub mod discovery;
pub mod flags;
pub mod network_message;

pub use self::{
    data_set_message::UadpDataSetMessage,
    discovery::{DiscoveryInformationType, DiscoveryRequest, DiscoveryResponse},
    flags::{
        DataSetFieldContentMask, DataSetMessageType, UadpDataSetMessageContentMask,
        UadpNetworkMessageContentMask, UadpNetworkMessageType,
    },
    network_message::{NetworkMessagePayload, UadpNetworkMessage},
};
