// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::{
    convert::TryFrom,
    fmt,
    io::{Read, Write},
};

use crate::types::*;

/// Identifies the publisher of a NetworkMessage. Only integer and string ids exist on the wire,
/// so there is no way to hold a floating point id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PublisherId {
    Byte(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    String(String),
}

impl fmt::Display for PublisherId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PublisherId::Byte(v) => write!(f, "{}", v),
            PublisherId::UInt16(v) => write!(f, "{}", v),
            PublisherId::UInt32(v) => write!(f, "{}", v),
            PublisherId::UInt64(v) => write!(f, "{}", v),
            PublisherId::String(v) => write!(f, "{}", v),
        }
    }
}

impl From<u8> for PublisherId {
    fn from(v: u8) -> Self {
        PublisherId::Byte(v)
    }
}

impl From<u16> for PublisherId {
    fn from(v: u16) -> Self {
        PublisherId::UInt16(v)
    }
}

impl From<u32> for PublisherId {
    fn from(v: u32) -> Self {
        PublisherId::UInt32(v)
    }
}

impl From<u64> for PublisherId {
    fn from(v: u64) -> Self {
        PublisherId::UInt64(v)
    }
}

impl From<&str> for PublisherId {
    fn from(v: &str) -> Self {
        PublisherId::String(v.to_string())
    }
}

impl From<String> for PublisherId {
    fn from(v: String) -> Self {
        PublisherId::String(v)
    }
}

impl TryFrom<Variant> for PublisherId {
    type Error = StatusCode;

    fn try_from(value: Variant) -> Result<Self, Self::Error> {
        match value {
            Variant::Byte(v) => Ok(PublisherId::Byte(v)),
            Variant::UInt16(v) => Ok(PublisherId::UInt16(v)),
            Variant::UInt32(v) => Ok(PublisherId::UInt32(v)),
            Variant::UInt64(v) => Ok(PublisherId::UInt64(v)),
            Variant::String(v) if !v.is_null() => Ok(PublisherId::String(v.as_ref().to_string())),
            value => {
                error!(
                    "Value of type {:?} cannot be used as a publisher id",
                    value.type_id()
                );
                Err(StatusCode::BadTypeMismatch)
            }
        }
    }
}

impl From<&PublisherId> for Variant {
    fn from(v: &PublisherId) -> Self {
        match v {
            PublisherId::Byte(v) => Variant::Byte(*v),
            PublisherId::UInt16(v) => Variant::UInt16(*v),
            PublisherId::UInt32(v) => Variant::UInt32(*v),
            PublisherId::UInt64(v) => Variant::UInt64(*v),
            PublisherId::String(v) => Variant::from(v.as_str()),
        }
    }
}

impl PublisherId {
    /// The publisher id type as carried in bits 0-2 of ExtendedFlags1.
    pub fn type_id(&self) -> u8 {
        match self {
            PublisherId::Byte(_) => 0,
            PublisherId::UInt16(_) => 1,
            PublisherId::UInt32(_) => 2,
            PublisherId::UInt64(_) => 3,
            PublisherId::String(_) => 4,
        }
    }

    pub fn byte_len(&self) -> usize {
        match self {
            PublisherId::Byte(_) => 1,
            PublisherId::UInt16(_) => 2,
            PublisherId::UInt32(_) => 4,
            PublisherId::UInt64(_) => 8,
            PublisherId::String(v) => 4 + v.len(),
        }
    }

    pub fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        match self {
            PublisherId::Byte(v) => write_u8(stream, *v),
            PublisherId::UInt16(v) => write_u16(stream, *v),
            PublisherId::UInt32(v) => write_u32(stream, *v),
            PublisherId::UInt64(v) => write_u64(stream, *v),
            PublisherId::String(v) => UAString::from(v.as_str()).encode(stream),
        }
    }

    pub fn decode<S: Read>(
        stream: &mut S,
        type_id: u8,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let id = match type_id {
            0 => PublisherId::Byte(read_u8(stream)?),
            1 => PublisherId::UInt16(read_u16(stream)?),
            2 => PublisherId::UInt32(read_u32(stream)?),
            3 => PublisherId::UInt64(read_u64(stream)?),
            4 => {
                let value = UAString::decode(stream, decoding_options)?;
                match value.value() {
                    Some(v) => PublisherId::String(v.clone()),
                    None => {
                        error!("Publisher id string is null");
                        return Err(StatusCode::BadDecodingError);
                    }
                }
            }
            _ => {
                error!("Publisher id type {} is reserved", type_id);
                return Err(StatusCode::BadDecodingError);
            }
        };
        Ok(id)
    }
}
