// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::io::{Read, Write};

use crate::{pubsub::uadp::flags::*, types::*};

/// An entity creating DataSetMessages from DataSets and publishing them through a writer group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Derivative)]
#[derivative(Default)]
#[serde(default)]
pub struct DataSetWriter {
    pub name: String,
    #[derivative(Default(value = "true"))]
    pub enabled: bool,
    /// Unique within the connection, 0 is invalid.
    pub data_set_writer_id: u16,
    /// Name of the published data set the writer takes its values from.
    pub data_set_name: String,
    pub data_set_field_content_mask: DataSetFieldContentMask,
    pub data_set_message_content_mask: UadpDataSetMessageContentMask,
    /// Number of messages per key frame cycle. 0 and 1 both mean every message is a key frame.
    #[derivative(Default(value = "1"))]
    pub key_frame_count: u32,
    /// Period in ms at which metadata is republished. 0 means only when it changes.
    pub meta_data_update_time: u64,
}

impl DataSetWriter {
    pub fn new<T>(name: T, data_set_writer_id: u16, data_set_name: T) -> Self
    where
        T: Into<String>,
    {
        Self {
            name: name.into(),
            data_set_writer_id,
            data_set_name: data_set_name.into(),
            ..Default::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        if self.data_set_writer_id == 0 {
            error!("DataSetWriter {} has an id of 0", self.name);
            false
        } else if self.data_set_name.is_empty() {
            error!("DataSetWriter {} does not name a published data set", self.name);
            false
        } else {
            true
        }
    }
}

/// The parts of a writer that go into a DataSetWriterConfiguration discovery response.
impl BinaryEncoder<DataSetWriter> for DataSetWriter {
    fn byte_len(&self) -> usize {
        UAString::from(self.name.as_str()).byte_len()
            + 1
            + 2
            + UAString::from(self.data_set_name.as_str()).byte_len()
            + 4
            + 4
            + 4
            + 8
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = UAString::from(self.name.as_str()).encode(stream)?;
        size += self.enabled.encode(stream)?;
        size += write_u16(stream, self.data_set_writer_id)?;
        size += UAString::from(self.data_set_name.as_str()).encode(stream)?;
        size += write_u32(stream, self.data_set_field_content_mask.bits())?;
        size += write_u32(stream, self.data_set_message_content_mask.bits())?;
        size += write_u32(stream, self.key_frame_count)?;
        size += write_u64(stream, self.meta_data_update_time)?;
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let name = String::from(UAString::decode(stream, decoding_options)?);
        let enabled = bool::decode(stream, decoding_options)?;
        let data_set_writer_id = read_u16(stream)?;
        let data_set_name = String::from(UAString::decode(stream, decoding_options)?);
        let data_set_field_content_mask =
            DataSetFieldContentMask::from_bits_truncate(read_u32(stream)?);
        let data_set_message_content_mask =
            UadpDataSetMessageContentMask::from_bits_truncate(read_u32(stream)?);
        let key_frame_count = read_u32(stream)?;
        let meta_data_update_time = read_u64(stream)?;
        Ok(DataSetWriter {
            name,
            enabled,
            data_set_writer_id,
            data_set_name,
            data_set_field_content_mask,
            data_set_message_content_mask,
            key_frame_count,
            meta_data_update_time,
        })
    }
}
