// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::io::{Read, Write};

use crate::types::*;

/// Security mode of a publisher endpoint. Only the numeric value is exchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MessageSecurityMode {
    #[default]
    Invalid = 0,
    None = 1,
    Sign = 2,
    SignAndEncrypt = 3,
}

impl From<u32> for MessageSecurityMode {
    fn from(value: u32) -> Self {
        match value {
            1 => MessageSecurityMode::None,
            2 => MessageSecurityMode::Sign,
            3 => MessageSecurityMode::SignAndEncrypt,
            _ => MessageSecurityMode::Invalid,
        }
    }
}

/// An endpoint of the publisher as returned in a PublisherEndpoints discovery response. Server
/// and certificate details are not carried.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointDescription {
    pub endpoint_url: String,
    pub security_mode: MessageSecurityMode,
    pub security_policy_uri: String,
    pub transport_profile_uri: String,
    pub security_level: u8,
}

impl EndpointDescription {
    pub fn new<T>(endpoint_url: T, transport_profile_uri: T) -> Self
    where
        T: Into<String>,
    {
        Self {
            endpoint_url: endpoint_url.into(),
            security_mode: MessageSecurityMode::None,
            security_policy_uri: "http://opcfoundation.org/UA/SecurityPolicy#None".to_string(),
            transport_profile_uri: transport_profile_uri.into(),
            security_level: 0,
        }
    }
}

impl BinaryEncoder<EndpointDescription> for EndpointDescription {
    fn byte_len(&self) -> usize {
        UAString::from(self.endpoint_url.as_str()).byte_len()
            + 4
            + UAString::from(self.security_policy_uri.as_str()).byte_len()
            + UAString::from(self.transport_profile_uri.as_str()).byte_len()
            + 1
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = UAString::from(self.endpoint_url.as_str()).encode(stream)?;
        size += write_u32(stream, self.security_mode as u32)?;
        size += UAString::from(self.security_policy_uri.as_str()).encode(stream)?;
        size += UAString::from(self.transport_profile_uri.as_str()).encode(stream)?;
        size += write_u8(stream, self.security_level)?;
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let endpoint_url = String::from(UAString::decode(stream, decoding_options)?);
        let security_mode = MessageSecurityMode::from(read_u32(stream)?);
        let security_policy_uri = String::from(UAString::decode(stream, decoding_options)?);
        let transport_profile_uri = String::from(UAString::decode(stream, decoding_options)?);
        let security_level = read_u8(stream)?;
        Ok(EndpointDescription {
            endpoint_url,
            security_mode,
            security_policy_uri,
            transport_profile_uri,
            security_level,
        })
    }
}
