// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The UADP NetworkMessage, the unit that is sent as one datagram or one broker message.

use std::io::{Cursor, Write};

use crate::{
    pubsub::core::{DataSetReader, PublisherId},
    types::*,
};

use super::{
    data_set_message::UadpDataSetMessage,
    discovery::{DiscoveryRequest, DiscoveryResponse},
    flags::*,
};

#[derive(Debug, Clone, PartialEq)]
pub enum NetworkMessagePayload {
    DataSetMessages(Vec<UadpDataSetMessage>),
    DiscoveryRequest(DiscoveryRequest),
    DiscoveryResponse(DiscoveryResponse),
}

impl NetworkMessagePayload {
    fn message_type(&self) -> UadpNetworkMessageType {
        match self {
            NetworkMessagePayload::DataSetMessages(_) => UadpNetworkMessageType::DataSetMessage,
            NetworkMessagePayload::DiscoveryRequest(_) => UadpNetworkMessageType::DiscoveryRequest,
            NetworkMessagePayload::DiscoveryResponse(_) => {
                UadpNetworkMessageType::DiscoveryResponse
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UadpNetworkMessage {
    pub content_mask: UadpNetworkMessageContentMask,
    pub publisher_id: Option<PublisherId>,
    pub data_set_class_id: Guid,
    pub writer_group_id: u16,
    pub group_version: u32,
    pub network_message_number: u16,
    pub sequence_number: u16,
    pub timestamp: DateTime,
    pub pico_seconds: u16,
    pub payload: NetworkMessagePayload,
}

impl UadpNetworkMessage {
    pub fn new(
        content_mask: UadpNetworkMessageContentMask,
        publisher_id: Option<PublisherId>,
        payload: NetworkMessagePayload,
    ) -> Self {
        Self {
            content_mask,
            publisher_id,
            data_set_class_id: Guid::null(),
            writer_group_id: 0,
            group_version: 0,
            network_message_number: 0,
            sequence_number: 0,
            timestamp: DateTime::null(),
            pico_seconds: 0,
            payload,
        }
    }

    /// A discovery request. Requests carry the publisher id of the sender if it has one.
    pub fn discovery_request(publisher_id: Option<PublisherId>, request: DiscoveryRequest) -> Self {
        let content_mask = if publisher_id.is_some() {
            UadpNetworkMessageContentMask::PUBLISHER_ID
        } else {
            UadpNetworkMessageContentMask::empty()
        };
        Self::new(
            content_mask,
            publisher_id,
            NetworkMessagePayload::DiscoveryRequest(request),
        )
    }

    /// A discovery response, always identifying the publisher that sends it.
    pub fn discovery_response(publisher_id: PublisherId, response: DiscoveryResponse) -> Self {
        Self::new(
            UadpNetworkMessageContentMask::PUBLISHER_ID,
            Some(publisher_id),
            NetworkMessagePayload::DiscoveryResponse(response),
        )
    }

    pub fn message_type(&self) -> UadpNetworkMessageType {
        self.payload.message_type()
    }

    pub fn data_set_messages(&self) -> &[UadpDataSetMessage] {
        match self.payload {
            NetworkMessagePayload::DataSetMessages(ref messages) => messages,
            _ => &[],
        }
    }

    pub fn is_discovery(&self) -> bool {
        !matches!(self.payload, NetworkMessagePayload::DataSetMessages(_))
    }

    pub fn encode_to_vec(&self) -> EncodingResult<Vec<u8>> {
        let mut stream = Cursor::new(Vec::with_capacity(256));
        self.encode(&mut stream)?;
        Ok(stream.into_inner())
    }

    pub fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let message_type = self.message_type();
        let publisher_id = if self
            .content_mask
            .contains(UadpNetworkMessageContentMask::PUBLISHER_ID)
        {
            Some(self.publisher_id.as_ref().ok_or_else(|| {
                error!("NetworkMessage content mask selects a publisher id but there is none");
                StatusCode::BadInvalidArgument
            })?)
        } else {
            None
        };

        // Data set messages are encoded first since their sizes may precede them
        let data_set_messages = match self.payload {
            NetworkMessagePayload::DataSetMessages(ref messages) => {
                let has_payload_header = self
                    .content_mask
                    .contains(UadpNetworkMessageContentMask::PAYLOAD_HEADER);
                if messages.len() > 1 && !has_payload_header {
                    error!(
                        "{} DataSetMessages cannot be sent without a payload header",
                        messages.len()
                    );
                    return Err(StatusCode::BadInvalidArgument);
                }
                if messages.len() > u8::MAX as usize {
                    error!("Too many DataSetMessages for one NetworkMessage");
                    return Err(StatusCode::BadEncodingLimitsExceeded);
                }
                messages
                    .iter()
                    .map(|m| m.encode_to_vec())
                    .collect::<EncodingResult<Vec<_>>>()?
            }
            _ => Vec::new(),
        };

        let flags = NetworkMessageFlags::new(
            self.content_mask,
            message_type,
            publisher_id.map(|p| p.type_id()).unwrap_or(0),
        );
        let mut size = write_u8(stream, flags.uadp_flags_byte())?;
        if let Some(ext1) = flags.extended_flags1_byte() {
            size += write_u8(stream, ext1)?;
        }
        if let Some(ext2) = flags.extended_flags2_byte() {
            size += write_u8(stream, ext2)?;
        }

        for field in network_message_layout(self.content_mask, message_type) {
            size += match field {
                NetworkMessageHeaderField::PublisherId => match publisher_id {
                    Some(publisher_id) => publisher_id.encode(stream)?,
                    None => 0,
                },
                NetworkMessageHeaderField::DataSetClassId => self.data_set_class_id.encode(stream)?,
                NetworkMessageHeaderField::GroupFlags => {
                    write_u8(stream, group_flags(self.content_mask).bits())?
                }
                NetworkMessageHeaderField::WriterGroupId => {
                    write_u16(stream, self.writer_group_id)?
                }
                NetworkMessageHeaderField::GroupVersion => write_u32(stream, self.group_version)?,
                NetworkMessageHeaderField::NetworkMessageNumber => {
                    write_u16(stream, self.network_message_number)?
                }
                NetworkMessageHeaderField::SequenceNumber => {
                    write_u16(stream, self.sequence_number)?
                }
                NetworkMessageHeaderField::PayloadHeader => {
                    let messages = self.data_set_messages();
                    let mut size = write_u8(stream, messages.len() as u8)?;
                    for message in messages {
                        size += write_u16(stream, message.data_set_writer_id)?;
                    }
                    size
                }
                NetworkMessageHeaderField::Timestamp => self.timestamp.encode(stream)?,
                NetworkMessageHeaderField::PicoSeconds => write_u16(stream, self.pico_seconds)?,
            };
        }

        match self.payload {
            NetworkMessagePayload::DataSetMessages(_) => {
                if data_set_messages.len() > 1 {
                    for bytes in &data_set_messages {
                        if bytes.len() > u16::MAX as usize {
                            error!("DataSetMessage of {} bytes is too large", bytes.len());
                            return Err(StatusCode::BadEncodingLimitsExceeded);
                        }
                        size += write_u16(stream, bytes.len() as u16)?;
                    }
                }
                for bytes in &data_set_messages {
                    size += process_encode_io_result(stream.write_all(bytes).map(|_| bytes.len()))?;
                }
            }
            NetworkMessagePayload::DiscoveryRequest(ref request) => {
                size += request.encode(stream)?;
            }
            NetworkMessagePayload::DiscoveryResponse(ref response) => {
                size += response.encode(stream)?;
            }
        }
        Ok(size)
    }

    /// Decodes a NetworkMessage. DataSetMessages are decoded against the first reader that
    /// matches them, those that match no reader are skipped. A DataSetMessage that fails to
    /// decode is still returned, with its error reason set, and the rest are decoded as usual.
    pub fn decode(
        data: &[u8],
        readers: &[DataSetReader],
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        if decoding_options.max_message_size > 0 && data.len() > decoding_options.max_message_size
        {
            error!(
                "NetworkMessage of {} bytes exceeds the limit of {}",
                data.len(),
                decoding_options.max_message_size
            );
            return Err(StatusCode::BadEncodingLimitsExceeded);
        }
        let mut stream = Cursor::new(data);

        let uadp_flags = read_u8(&mut stream)?;
        let extended_flags1 = if uadp_flags & UadpFlags::EXTENDED_FLAGS1.bits() != 0 {
            Some(read_u8(&mut stream)?)
        } else {
            None
        };
        let extended_flags2 = match extended_flags1 {
            Some(ext1) if ext1 & ExtendedFlags1::EXTENDED_FLAGS2.bits() != 0 => {
                Some(read_u8(&mut stream)?)
            }
            _ => None,
        };
        let flags = NetworkMessageFlags::from_bytes(uadp_flags, extended_flags1, extended_flags2)
            .ok_or(StatusCode::BadDecodingError)?;
        if flags.is_secured() || flags.is_chunk() {
            debug!("Secured and chunked NetworkMessages are not supported");
            return Err(StatusCode::BadNotSupported);
        }
        let message_type = flags.message_type();

        let mut message = UadpNetworkMessage::new(
            flags.content_mask(),
            None,
            NetworkMessagePayload::DataSetMessages(Vec::new()),
        );
        let mut writer_ids = Vec::new();

        let mut layout = network_message_layout(message.content_mask, message_type);
        let mut i = 0;
        while i < layout.len() {
            match layout[i] {
                NetworkMessageHeaderField::PublisherId => {
                    message.publisher_id = Some(PublisherId::decode(
                        &mut stream,
                        flags.publisher_id_type,
                        decoding_options,
                    )?);
                }
                NetworkMessageHeaderField::DataSetClassId => {
                    message.data_set_class_id = Guid::decode(&mut stream, decoding_options)?;
                }
                NetworkMessageHeaderField::GroupFlags => {
                    // The group flags add fields that follow, the layout up to here is unchanged
                    let group_flags = read_u8(&mut stream)?;
                    message.content_mask =
                        content_mask_with_group_flags(message.content_mask, group_flags);
                    layout = network_message_layout(message.content_mask, message_type);
                }
                NetworkMessageHeaderField::WriterGroupId => {
                    message.writer_group_id = read_u16(&mut stream)?;
                }
                NetworkMessageHeaderField::GroupVersion => {
                    message.group_version = read_u32(&mut stream)?;
                }
                NetworkMessageHeaderField::NetworkMessageNumber => {
                    message.network_message_number = read_u16(&mut stream)?;
                }
                NetworkMessageHeaderField::SequenceNumber => {
                    message.sequence_number = read_u16(&mut stream)?;
                }
                NetworkMessageHeaderField::PayloadHeader => {
                    let count = read_u8(&mut stream)?;
                    for _ in 0..count {
                        writer_ids.push(read_u16(&mut stream)?);
                    }
                }
                NetworkMessageHeaderField::Timestamp => {
                    message.timestamp = DateTime::decode(&mut stream, decoding_options)?;
                }
                NetworkMessageHeaderField::PicoSeconds => {
                    message.pico_seconds = read_u16(&mut stream)?;
                }
            }
            i += 1;
        }

        message.payload = match message_type {
            UadpNetworkMessageType::DiscoveryRequest => NetworkMessagePayload::DiscoveryRequest(
                DiscoveryRequest::decode(&mut stream, decoding_options)?,
            ),
            UadpNetworkMessageType::DiscoveryResponse => NetworkMessagePayload::DiscoveryResponse(
                DiscoveryResponse::decode(&mut stream, decoding_options)?,
            ),
            UadpNetworkMessageType::DataSetMessage => {
                let has_payload_header = message
                    .content_mask
                    .contains(UadpNetworkMessageContentMask::PAYLOAD_HEADER);
                NetworkMessagePayload::DataSetMessages(message.decode_data_set_messages(
                    &mut stream,
                    has_payload_header,
                    &writer_ids,
                    readers,
                    decoding_options,
                )?)
            }
        };
        Ok(message)
    }

    fn decode_data_set_messages(
        &self,
        stream: &mut Cursor<&[u8]>,
        has_payload_header: bool,
        writer_ids: &[u16],
        readers: &[DataSetReader],
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Vec<UadpDataSetMessage>> {
        let publisher_id = self.publisher_id.as_ref();
        let writer_group_id = if self
            .content_mask
            .contains(UadpNetworkMessageContentMask::WRITER_GROUP_ID)
        {
            Some(self.writer_group_id)
        } else {
            None
        };

        if !has_payload_header {
            // A single message of unknown writer, it goes to the first reader that would accept it
            let reader = readers
                .iter()
                .find(|r| r.matches(publisher_id, writer_group_id, None));
            return Ok(match reader {
                Some(reader) => vec![UadpDataSetMessage::decode(
                    stream,
                    reader.data_set_writer_id,
                    reader,
                    decoding_options,
                )],
                None => {
                    trace!("NetworkMessage matches no reader");
                    Vec::new()
                }
            });
        }

        let sizes = if writer_ids.len() > 1 {
            let mut sizes = Vec::with_capacity(writer_ids.len());
            for _ in writer_ids {
                sizes.push(read_u16(stream)? as usize);
            }
            Some(sizes)
        } else {
            None
        };

        let data = *stream.get_ref();
        let mut position = stream.position() as usize;
        let mut messages = Vec::with_capacity(writer_ids.len());
        for (idx, writer_id) in writer_ids.iter().enumerate() {
            let end = match sizes {
                Some(ref sizes) => position + sizes[idx],
                None => data.len(),
            };
            if end > data.len() {
                error!(
                    "DataSetMessage of writer {} runs past the end of the NetworkMessage",
                    writer_id
                );
                return Err(StatusCode::BadDecodingError);
            }
            let reader = readers
                .iter()
                .find(|r| r.matches(publisher_id, writer_group_id, Some(*writer_id)));
            match reader {
                Some(reader) => {
                    let mut message_stream = Cursor::new(&data[position..end]);
                    messages.push(UadpDataSetMessage::decode(
                        &mut message_stream,
                        *writer_id,
                        reader,
                        decoding_options,
                    ));
                }
                None => trace!("No reader for DataSetMessage of writer {}", writer_id),
            }
            position = end;
        }
        Ok(messages)
    }
}
