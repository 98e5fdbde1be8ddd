// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `DataValue`.

use std::io::{Read, Write};

use crate::types::{date_time::*, encoding::*, status_code::StatusCode, variant::Variant};

bitflags! {
    pub struct DataValueFlags: u8 {
        /// False if the Value is Null.
        const HAS_VALUE = 0x1;
        /// False if the StatusCode is Good.
        const HAS_STATUS = 0x2;
        /// False if the Source Timestamp is DateTime.MinValue.
        const HAS_SOURCE_TIMESTAMP = 0x4;
        /// False if the Server Timestamp is DateTime.MinValue.
        const HAS_SERVER_TIMESTAMP = 0x8;
        /// False if the Source Picoseconds is 0.
        const HAS_SOURCE_PICOSECONDS = 0x10;
        /// False if the Server Picoseconds is 0.
        const HAS_SERVER_PICOSECONDS = 0x20;
    }
}

/// A value together with its quality and timestamps. This is what a dataset field carries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataValue {
    /// The value. Not present if the Value bit in the EncodingMask is False.
    pub value: Option<Variant>,
    /// The status associated with the value. Not present if Good.
    pub status: Option<StatusCode>,
    /// The source timestamp associated with the value.
    pub source_timestamp: Option<DateTime>,
    /// The number of 10 picosecond intervals for the SourceTimestamp.
    pub source_picoseconds: Option<u16>,
    /// The Server timestamp associated with the value.
    pub server_timestamp: Option<DateTime>,
    /// The number of 10 picosecond intervals for the ServerTimestamp.
    pub server_picoseconds: Option<u16>,
}

impl BinaryEncoder<DataValue> for DataValue {
    fn byte_len(&self) -> usize {
        let mut size = 1;
        if let Some(ref value) = self.value {
            size += value.byte_len();
        }
        if self.status.is_some() {
            size += 4;
        }
        if self.source_timestamp.is_some() {
            size += 8;
        }
        if self.source_picoseconds.is_some() {
            size += 2;
        }
        if self.server_timestamp.is_some() {
            size += 8;
        }
        if self.server_picoseconds.is_some() {
            size += 2;
        }
        size
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = write_u8(stream, self.encoding_mask().bits())?;
        if let Some(ref value) = self.value {
            size += value.encode(stream)?;
        }
        if let Some(status) = self.status {
            size += status.encode(stream)?;
        }
        if let Some(ref timestamp) = self.source_timestamp {
            size += timestamp.encode(stream)?;
        }
        if let Some(picoseconds) = self.source_picoseconds {
            size += write_u16(stream, picoseconds)?;
        }
        if let Some(ref timestamp) = self.server_timestamp {
            size += timestamp.encode(stream)?;
        }
        if let Some(picoseconds) = self.server_picoseconds {
            size += write_u16(stream, picoseconds)?;
        }
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let encoding_mask = DataValueFlags::from_bits_truncate(read_u8(stream)?);
        let value = if encoding_mask.contains(DataValueFlags::HAS_VALUE) {
            let _depth_lock = decoding_options.depth_lock()?;
            Some(Variant::decode(stream, decoding_options)?)
        } else {
            None
        };
        let status = if encoding_mask.contains(DataValueFlags::HAS_STATUS) {
            Some(StatusCode::decode(stream, decoding_options)?)
        } else {
            None
        };
        let source_timestamp = if encoding_mask.contains(DataValueFlags::HAS_SOURCE_TIMESTAMP) {
            Some(DateTime::decode(stream, decoding_options)?)
        } else {
            None
        };
        let source_picoseconds = if encoding_mask.contains(DataValueFlags::HAS_SOURCE_PICOSECONDS)
        {
            Some(read_u16(stream)?)
        } else {
            None
        };
        let server_timestamp = if encoding_mask.contains(DataValueFlags::HAS_SERVER_TIMESTAMP) {
            Some(DateTime::decode(stream, decoding_options)?)
        } else {
            None
        };
        let server_picoseconds = if encoding_mask.contains(DataValueFlags::HAS_SERVER_PICOSECONDS)
        {
            Some(read_u16(stream)?)
        } else {
            None
        };
        Ok(DataValue {
            value,
            status,
            source_timestamp,
            source_picoseconds,
            server_timestamp,
            server_picoseconds,
        })
    }
}

macro_rules! from_value {
    ( $( $t:ty ),* ) => {
        $(
            impl From<$t> for DataValue {
                fn from(v: $t) -> Self {
                    DataValue::value_only(v)
                }
            }
        )*
    };
}

from_value!(bool, i8, u8, i16, u16, i32, u32, i64, u64, f32, f64, &str, String, Variant);

impl DataValue {
    /// Creates a data value from the supplied value with nothing else.
    pub fn value_only<V>(value: V) -> DataValue
    where
        V: Into<Variant>,
    {
        DataValue {
            value: Some(value.into()),
            ..Default::default()
        }
    }

    /// Creates a data value with a value and source timestamp.
    pub fn new_at<V>(value: V, source_timestamp: DateTime) -> DataValue
    where
        V: Into<Variant>,
    {
        DataValue {
            value: Some(value.into()),
            source_timestamp: Some(source_timestamp),
            ..Default::default()
        }
    }

    /// Creates an empty DataValue
    pub fn null() -> DataValue {
        DataValue::default()
    }

    /// Returns the status code or Good if there is no code on the value
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::Good)
    }

    /// Test if the value held by this data value is known to be good
    pub fn is_valid(&self) -> bool {
        self.status().is_good()
    }

    fn encoding_mask(&self) -> DataValueFlags {
        let mut encoding_mask = DataValueFlags::empty();
        if self.value.is_some() {
            encoding_mask |= DataValueFlags::HAS_VALUE;
        }
        if self.status.is_some() {
            encoding_mask |= DataValueFlags::HAS_STATUS;
        }
        if self.source_timestamp.is_some() {
            encoding_mask |= DataValueFlags::HAS_SOURCE_TIMESTAMP;
        }
        if self.source_picoseconds.is_some() {
            encoding_mask |= DataValueFlags::HAS_SOURCE_PICOSECONDS;
        }
        if self.server_timestamp.is_some() {
            encoding_mask |= DataValueFlags::HAS_SERVER_TIMESTAMP;
        }
        if self.server_picoseconds.is_some() {
            encoding_mask |= DataValueFlags::HAS_SERVER_PICOSECONDS;
        }
        encoding_mask
    }
}
