// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The subset of OPC UA built-in types that UADP messages carry, together with their binary
//! encoding.

pub mod constants {
    /// Maximum number of elements in an array
    pub const MAX_ARRAY_LENGTH: usize = 100_000;
    /// Maximum size of a string in chars
    pub const MAX_STRING_LENGTH: usize = 65_535;
    /// Maximum size of a byte string in bytes
    pub const MAX_BYTE_STRING_LENGTH: usize = 65_535;
    /// Maximum size of a UADP datagram or MQTT payload that will be decoded
    pub const MAX_MESSAGE_SIZE: usize = 65_535;
    /// Default maximum decoding depth for recursive data structures, i.e. if data is nested deeper
    /// than this it is an error during decoding. This is a security measure to stop deeply nested
    /// junk being sent to a subscriber.
    pub const MAX_DECODING_DEPTH: usize = 10;
}

pub mod basic_types;
pub mod byte_string;
pub mod data_value;
pub mod date_time;
pub mod encoding;
pub mod guid;
pub mod localized_text;
pub mod node_id;
pub mod status_code;
pub mod string;
pub mod variant;
pub mod variant_type_id;

pub use self::{
    byte_string::ByteString,
    data_value::DataValue,
    date_time::{DateTime, DateTimeUtc},
    encoding::*,
    guid::Guid,
    localized_text::LocalizedText,
    node_id::{Identifier, NodeId},
    status_code::StatusCode,
    string::UAString,
    variant::{Array, Variant},
    variant_type_id::BuiltInType,
};

#[cfg(test)]
mod tests;
