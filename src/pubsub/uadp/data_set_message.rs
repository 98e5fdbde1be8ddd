// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The UADP DataSetMessage, one writer's DataSet inside a NetworkMessage.

use std::io::{Cursor, Read, Write};

use crate::{
    pubsub::core::{
        reconcile_versions, ConfigurationVersion, DataSet, DataSetDecodeErrorReason,
        DataSetReader, DataSetWriter, Field, FieldMetaData,
    },
    types::*,
};

use super::flags::*;

#[derive(Debug, Clone, PartialEq)]
pub struct UadpDataSetMessage {
    pub data_set_writer_id: u16,
    pub content_mask: UadpDataSetMessageContentMask,
    pub field_content_mask: DataSetFieldContentMask,
    pub message_type: DataSetMessageType,
    pub is_valid: bool,
    pub sequence_number: u16,
    pub timestamp: DateTime,
    pub pico_seconds: u16,
    pub status: StatusCode,
    pub meta_data_version: ConfigurationVersion,
    /// The fields. Always present when encoding anything but a keep alive. After decoding it is
    /// `None` if the message could not be turned into a DataSet.
    pub data_set: Option<DataSet>,
    pub decode_error_reason: DataSetDecodeErrorReason,
    pub is_metadata_major_version_change: bool,
}

impl Default for UadpDataSetMessage {
    fn default() -> Self {
        Self {
            data_set_writer_id: 0,
            content_mask: UadpDataSetMessageContentMask::empty(),
            field_content_mask: DataSetFieldContentMask::empty(),
            message_type: DataSetMessageType::KeyFrame,
            is_valid: true,
            sequence_number: 0,
            timestamp: DateTime::null(),
            pico_seconds: 0,
            status: StatusCode::Good,
            meta_data_version: ConfigurationVersion::default(),
            data_set: None,
            decode_error_reason: DataSetDecodeErrorReason::NoError,
            is_metadata_major_version_change: false,
        }
    }
}

impl UadpDataSetMessage {
    /// Creates the message a writer sends for a data set. A data set with missing fields becomes a
    /// delta frame.
    pub fn new(writer: &DataSetWriter, data_set: DataSet, sequence_number: u16) -> Self {
        let message_type = if data_set.is_delta() {
            DataSetMessageType::DeltaFrame
        } else {
            DataSetMessageType::KeyFrame
        };
        Self {
            data_set_writer_id: writer.data_set_writer_id,
            content_mask: writer.data_set_message_content_mask,
            field_content_mask: writer.data_set_field_content_mask,
            message_type,
            sequence_number,
            timestamp: DateTime::now(),
            meta_data_version: data_set.meta_data.configuration_version,
            data_set: Some(data_set),
            ..Default::default()
        }
    }

    pub fn keep_alive(writer: &DataSetWriter, sequence_number: u16) -> Self {
        Self {
            data_set_writer_id: writer.data_set_writer_id,
            content_mask: writer.data_set_message_content_mask,
            field_content_mask: writer.data_set_field_content_mask,
            message_type: DataSetMessageType::KeepAlive,
            sequence_number,
            timestamp: DateTime::now(),
            ..Default::default()
        }
    }

    fn field_encoding(&self) -> FieldEncoding {
        FieldEncoding::from(self.field_content_mask)
    }

    pub fn encode_to_vec(&self) -> EncodingResult<Vec<u8>> {
        let mut stream = Cursor::new(Vec::with_capacity(64));
        self.encode(&mut stream)?;
        Ok(stream.into_inner())
    }

    pub fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let field_encoding = self.field_encoding();
        let flags = DataSetMessageFlags::new(
            self.content_mask,
            field_encoding,
            self.message_type,
            self.is_valid,
        );
        let mut size = write_u8(stream, flags.flags1_byte())?;
        if let Some(flags2) = flags.flags2_byte() {
            size += write_u8(stream, flags2)?;
        }

        for field in data_set_message_layout(self.content_mask) {
            size += match field {
                DataSetMessageHeaderField::SequenceNumber => {
                    write_u16(stream, self.sequence_number)?
                }
                DataSetMessageHeaderField::Timestamp => self.timestamp.encode(stream)?,
                DataSetMessageHeaderField::PicoSeconds => write_u16(stream, self.pico_seconds)?,
                DataSetMessageHeaderField::Status => write_u16(stream, self.status.high_word())?,
                DataSetMessageHeaderField::MajorVersion => {
                    write_u32(stream, self.meta_data_version.major_version)?
                }
                DataSetMessageHeaderField::MinorVersion => {
                    write_u32(stream, self.meta_data_version.minor_version)?
                }
            };
        }

        if self.message_type == DataSetMessageType::KeepAlive {
            return Ok(size);
        }
        let data_set = self.data_set.as_ref().ok_or_else(|| {
            error!(
                "DataSetMessage of writer {} has no data set to encode",
                self.data_set_writer_id
            );
            StatusCode::BadInvalidArgument
        })?;
        let meta_fields = &data_set.meta_data.fields;
        if data_set.fields.len() != meta_fields.len() {
            error!(
                "DataSet {} has {} fields but its metadata describes {}",
                data_set.name,
                data_set.fields.len(),
                meta_fields.len()
            );
            return Err(StatusCode::BadInvalidArgument);
        }
        // Field counts and indices are UInt16 on the wire
        if data_set.fields.len() > u16::MAX as usize {
            error!(
                "DataSet {} has {} fields, more than a DataSetMessage can carry",
                data_set.name,
                data_set.fields.len()
            );
            return Err(StatusCode::BadEncodingLimitsExceeded);
        }

        if self.message_type == DataSetMessageType::DeltaFrame {
            let present = data_set.present_fields().collect::<Vec<_>>();
            size += write_u16(stream, present.len() as u16)?;
            for (i, field) in present {
                size += write_u16(stream, i as u16)?;
                size += self.encode_field(stream, field_encoding, &field.value, &meta_fields[i])?;
            }
        } else {
            if field_encoding != FieldEncoding::RawData {
                size += write_u16(stream, data_set.fields.len() as u16)?;
            }
            let null = DataValue::null();
            for (field, meta_field) in data_set.fields.iter().zip(meta_fields.iter()) {
                let value = field.as_ref().map(|f| &f.value).unwrap_or(&null);
                size += self.encode_field(stream, field_encoding, value, meta_field)?;
            }
        }
        Ok(size)
    }

    fn encode_field<S: Write>(
        &self,
        stream: &mut S,
        field_encoding: FieldEncoding,
        value: &DataValue,
        meta_field: &FieldMetaData,
    ) -> EncodingResult<usize> {
        match field_encoding {
            FieldEncoding::Variant => {
                let status = value.status();
                let variant = if status.is_bad() {
                    Variant::StatusCode(status)
                } else if status.is_uncertain() {
                    Variant::from(DataValue {
                        value: value.value.clone(),
                        status: Some(status),
                        ..Default::default()
                    })
                } else {
                    value.value.clone().unwrap_or_default()
                };
                variant.encode(stream)
            }
            FieldEncoding::DataValue => {
                let mask = self.field_content_mask;
                let data_value = DataValue {
                    value: value.value.clone(),
                    status: value
                        .status
                        .filter(|_| mask.contains(DataSetFieldContentMask::STATUS_CODE)),
                    source_timestamp: value
                        .source_timestamp
                        .filter(|_| mask.contains(DataSetFieldContentMask::SOURCE_TIMESTAMP)),
                    source_picoseconds: value
                        .source_picoseconds
                        .filter(|_| mask.contains(DataSetFieldContentMask::SOURCE_PICO_SECONDS)),
                    server_timestamp: value
                        .server_timestamp
                        .filter(|_| mask.contains(DataSetFieldContentMask::SERVER_TIMESTAMP)),
                    server_picoseconds: value
                        .server_picoseconds
                        .filter(|_| mask.contains(DataSetFieldContentMask::SERVER_PICO_SECONDS)),
                };
                data_value.encode(stream)
            }
            FieldEncoding::RawData => encode_raw_field(stream, value, meta_field),
        }
    }

    /// Decodes a DataSetMessage for a reader. Never fails, a message that cannot be decoded is
    /// returned without a data set and with the reason set.
    pub fn decode<S: Read>(
        stream: &mut S,
        data_set_writer_id: u16,
        reader: &DataSetReader,
        decoding_options: &DecodingOptions,
    ) -> Self {
        let mut message = UadpDataSetMessage {
            data_set_writer_id,
            ..Default::default()
        };
        if let Err(err) = message.decode_inner(stream, reader, decoding_options) {
            debug!(
                "DataSetMessage of writer {} failed to decode, status = {}",
                data_set_writer_id, err
            );
            message.data_set = None;
            message.decode_error_reason = DataSetDecodeErrorReason::DecodingError;
        }
        message
    }

    fn decode_inner<S: Read>(
        &mut self,
        stream: &mut S,
        reader: &DataSetReader,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<()> {
        let flags1 = read_u8(stream)?;
        let flags2 = if flags1 & DataSetFlags1::DATA_SET_FLAGS2.bits() != 0 {
            Some(read_u8(stream)?)
        } else {
            None
        };
        let flags = DataSetMessageFlags::from_bytes(flags1, flags2).ok_or_else(|| {
            error!("DataSetMessage flags {:#04x} are invalid", flags1);
            StatusCode::BadDecodingError
        })?;
        self.content_mask = flags.content_mask();
        self.message_type = flags.message_type;
        self.is_valid = flags.is_valid();
        let field_encoding = flags.field_encoding();
        // The wire only tells the encoding, a DataValue says for itself which parts it carries
        self.field_content_mask = match field_encoding {
            FieldEncoding::RawData => DataSetFieldContentMask::RAW_DATA,
            FieldEncoding::Variant => DataSetFieldContentMask::empty(),
            FieldEncoding::DataValue => {
                DataSetFieldContentMask::all() - DataSetFieldContentMask::RAW_DATA
            }
        };

        let mut major_version = None;
        let mut minor_version = None;
        for field in data_set_message_layout(self.content_mask) {
            match field {
                DataSetMessageHeaderField::SequenceNumber => {
                    self.sequence_number = read_u16(stream)?
                }
                DataSetMessageHeaderField::Timestamp => {
                    self.timestamp = DateTime::decode(stream, decoding_options)?
                }
                DataSetMessageHeaderField::PicoSeconds => self.pico_seconds = read_u16(stream)?,
                DataSetMessageHeaderField::Status => {
                    self.status = StatusCode::from_high_word(read_u16(stream)?)
                }
                DataSetMessageHeaderField::MajorVersion => {
                    let v = read_u32(stream)?;
                    self.meta_data_version.major_version = v;
                    major_version = Some(v);
                }
                DataSetMessageHeaderField::MinorVersion => {
                    let v = read_u32(stream)?;
                    self.meta_data_version.minor_version = v;
                    minor_version = Some(v);
                }
            }
        }

        if self.message_type == DataSetMessageType::KeepAlive {
            return Ok(());
        }

        let meta_data = &reader.data_set_meta_data;
        let reconciliation =
            reconcile_versions(major_version, minor_version, &meta_data.configuration_version);
        if !reconciliation.can_decode() {
            debug!(
                "DataSetMessage of writer {} has version {} but reader {} holds {}",
                self.data_set_writer_id,
                self.meta_data_version,
                reader.name,
                meta_data.configuration_version
            );
            self.decode_error_reason = DataSetDecodeErrorReason::MetadataMajorVersion;
            self.is_metadata_major_version_change = true;
            self.data_set = None;
            return Ok(());
        }

        let meta_fields = &meta_data.fields;
        let mut fields: Vec<Option<Field>> = vec![None; meta_fields.len()];
        let field_for = |i: usize, value: DataValue| Field {
            name: meta_fields[i].name.clone(),
            value,
            target_node_id: reader
                .target_variables
                .get(i)
                .cloned()
                .unwrap_or_else(NodeId::null),
        };

        if self.message_type == DataSetMessageType::DeltaFrame {
            let count = read_u16(stream)? as usize;
            for _ in 0..count {
                let i = read_u16(stream)? as usize;
                if i >= meta_fields.len() {
                    error!(
                        "Delta frame field index {} is beyond the {} fields of the metadata",
                        i,
                        meta_fields.len()
                    );
                    return Err(StatusCode::BadDecodingError);
                }
                let value =
                    decode_field(stream, field_encoding, &meta_fields[i], decoding_options)?;
                fields[i] = Some(field_for(i, value));
            }
        } else {
            if field_encoding != FieldEncoding::RawData {
                let count = read_u16(stream)? as usize;
                if count != meta_fields.len() {
                    error!(
                        "DataSetMessage has {} fields but the metadata describes {}",
                        count,
                        meta_fields.len()
                    );
                    return Err(StatusCode::BadDecodingError);
                }
            }
            for (i, meta_field) in meta_fields.iter().enumerate() {
                let value = decode_field(stream, field_encoding, meta_field, decoding_options)?;
                fields[i] = Some(field_for(i, value));
            }
        }

        self.data_set = Some(DataSet {
            name: meta_data.name.clone(),
            meta_data: meta_data.clone(),
            fields,
        });
        self.decode_error_reason = DataSetDecodeErrorReason::NoError;
        Ok(())
    }
}

/// Metadata types that say nothing about the layout of the value, so the value is written with
/// its type tag even in a RawData message.
fn is_untyped(meta_field: &FieldMetaData) -> bool {
    matches!(
        meta_field.built_in_type,
        BuiltInType::Null | BuiltInType::Variant
    )
}

fn encode_raw_field<S: Write>(
    stream: &mut S,
    value: &DataValue,
    meta_field: &FieldMetaData,
) -> EncodingResult<usize> {
    let value = value.value.as_ref();
    if is_untyped(meta_field) {
        return value.cloned().unwrap_or_default().encode(stream);
    }
    let expected = meta_field.built_in_type;
    if meta_field.is_array() {
        match value {
            Some(v @ Variant::Array(array)) if array.value_type == expected => v.encode_raw(stream),
            _ => write_i32(stream, -1),
        }
    } else {
        match value {
            Some(v) if !v.is_array() && v.type_id() == expected => v.encode_raw(stream),
            _ => {
                trace!(
                    "Raw field {} has no value of type {:?}, writing the default",
                    meta_field.name,
                    expected
                );
                Variant::default_of_type(expected).encode_raw(stream)
            }
        }
    }
}

fn decode_field<S: Read>(
    stream: &mut S,
    field_encoding: FieldEncoding,
    meta_field: &FieldMetaData,
    decoding_options: &DecodingOptions,
) -> EncodingResult<DataValue> {
    match field_encoding {
        FieldEncoding::Variant => {
            let variant = Variant::decode(stream, decoding_options)?;
            let expected = meta_field.built_in_type;
            let data_value = match variant {
                Variant::Empty => DataValue::null(),
                Variant::StatusCode(status) if expected != BuiltInType::StatusCode => DataValue {
                    status: Some(status),
                    ..Default::default()
                },
                Variant::DataValue(data_value) if expected != BuiltInType::DataValue => {
                    *data_value
                }
                variant => DataValue::value_only(variant),
            };
            Ok(data_value)
        }
        FieldEncoding::DataValue => DataValue::decode(stream, decoding_options),
        FieldEncoding::RawData => {
            let value = if is_untyped(meta_field) {
                Variant::decode(stream, decoding_options)?
            } else if meta_field.is_array() {
                Variant::decode_raw_array(stream, meta_field.built_in_type, decoding_options)?
            } else {
                Variant::decode_raw(stream, meta_field.built_in_type, decoding_options)?
            };
            Ok(DataValue::value_only(value))
        }
    }
}
