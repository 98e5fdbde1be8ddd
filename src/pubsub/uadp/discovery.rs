// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Bodies of UADP discovery request and response NetworkMessages.

use std::{
    convert::TryFrom,
    io::{Read, Write},
};

use crate::{
    pubsub::core::{DataSetMetaData, EndpointDescription, WriterGroup},
    types::*,
};

/// The only request type defined for UADP discovery.
const DISCOVERY_REQUEST_TYPE: u8 = 1;

/// What a discovery request asks for, or a discovery response carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DiscoveryInformationType {
    PublisherEndpoints = 1,
    DataSetMetaData = 2,
    DataSetWriterConfiguration = 3,
}

impl TryFrom<u8> for DiscoveryInformationType {
    type Error = StatusCode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(DiscoveryInformationType::PublisherEndpoints),
            2 => Ok(DiscoveryInformationType::DataSetMetaData),
            3 => Ok(DiscoveryInformationType::DataSetWriterConfiguration),
            _ => {
                error!("Discovery information type {} is not supported", value);
                Err(StatusCode::BadDecodingError)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryRequest {
    pub information_type: DiscoveryInformationType,
    /// Empty for a PublisherEndpoints request.
    pub data_set_writer_ids: Vec<u16>,
}

impl DiscoveryRequest {
    pub fn new(information_type: DiscoveryInformationType, data_set_writer_ids: Vec<u16>) -> Self {
        Self {
            information_type,
            data_set_writer_ids,
        }
    }
}

impl BinaryEncoder<DiscoveryRequest> for DiscoveryRequest {
    fn byte_len(&self) -> usize {
        1 + 1 + 4 + 2 * self.data_set_writer_ids.len()
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = write_u8(stream, DISCOVERY_REQUEST_TYPE)?;
        size += write_u8(stream, self.information_type as u8)?;
        size += write_i32(stream, self.data_set_writer_ids.len() as i32)?;
        for id in &self.data_set_writer_ids {
            size += write_u16(stream, *id)?;
        }
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let request_type = read_u8(stream)?;
        if request_type != DISCOVERY_REQUEST_TYPE {
            error!("Discovery request type {} is not supported", request_type);
            return Err(StatusCode::BadDecodingError);
        }
        let information_type = DiscoveryInformationType::try_from(read_u8(stream)?)?;
        let data_set_writer_ids: Option<Vec<u16>> = read_array(stream, decoding_options)?;
        Ok(DiscoveryRequest {
            information_type,
            data_set_writer_ids: data_set_writer_ids.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryResponse {
    PublisherEndpoints {
        sequence_number: u16,
        endpoints: Vec<EndpointDescription>,
        status_code: StatusCode,
    },
    DataSetMetaData {
        sequence_number: u16,
        data_set_writer_id: u16,
        meta_data: DataSetMetaData,
        status_code: StatusCode,
    },
    DataSetWriterConfiguration {
        sequence_number: u16,
        data_set_writer_ids: Vec<u16>,
        /// The group the writers belong to, only the listed writers are included.
        writer_group: WriterGroup,
        /// One per writer id
        status_codes: Vec<StatusCode>,
    },
}

impl DiscoveryResponse {
    pub fn information_type(&self) -> DiscoveryInformationType {
        match self {
            DiscoveryResponse::PublisherEndpoints { .. } => {
                DiscoveryInformationType::PublisherEndpoints
            }
            DiscoveryResponse::DataSetMetaData { .. } => DiscoveryInformationType::DataSetMetaData,
            DiscoveryResponse::DataSetWriterConfiguration { .. } => {
                DiscoveryInformationType::DataSetWriterConfiguration
            }
        }
    }

    pub fn sequence_number(&self) -> u16 {
        match self {
            DiscoveryResponse::PublisherEndpoints {
                sequence_number, ..
            }
            | DiscoveryResponse::DataSetMetaData {
                sequence_number, ..
            }
            | DiscoveryResponse::DataSetWriterConfiguration {
                sequence_number, ..
            } => *sequence_number,
        }
    }
}

impl BinaryEncoder<DiscoveryResponse> for DiscoveryResponse {
    fn byte_len(&self) -> usize {
        let body = match self {
            DiscoveryResponse::PublisherEndpoints { endpoints, .. } => {
                4 + endpoints.iter().map(|e| e.byte_len()).sum::<usize>() + 4
            }
            DiscoveryResponse::DataSetMetaData { meta_data, .. } => 2 + meta_data.byte_len() + 4,
            DiscoveryResponse::DataSetWriterConfiguration {
                data_set_writer_ids,
                writer_group,
                status_codes,
                ..
            } => {
                4 + 2 * data_set_writer_ids.len()
                    + writer_group.byte_len()
                    + 4
                    + 4 * status_codes.len()
            }
        };
        1 + 2 + body
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = write_u8(stream, self.information_type() as u8)?;
        size += write_u16(stream, self.sequence_number())?;
        match self {
            DiscoveryResponse::PublisherEndpoints {
                endpoints,
                status_code,
                ..
            } => {
                size += write_i32(stream, endpoints.len() as i32)?;
                for endpoint in endpoints {
                    size += endpoint.encode(stream)?;
                }
                size += status_code.encode(stream)?;
            }
            DiscoveryResponse::DataSetMetaData {
                data_set_writer_id,
                meta_data,
                status_code,
                ..
            } => {
                size += write_u16(stream, *data_set_writer_id)?;
                size += meta_data.encode(stream)?;
                size += status_code.encode(stream)?;
            }
            DiscoveryResponse::DataSetWriterConfiguration {
                data_set_writer_ids,
                writer_group,
                status_codes,
                ..
            } => {
                size += write_i32(stream, data_set_writer_ids.len() as i32)?;
                for id in data_set_writer_ids {
                    size += write_u16(stream, *id)?;
                }
                size += writer_group.encode(stream)?;
                size += write_i32(stream, status_codes.len() as i32)?;
                for status_code in status_codes {
                    size += status_code.encode(stream)?;
                }
            }
        }
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let information_type = DiscoveryInformationType::try_from(read_u8(stream)?)?;
        let sequence_number = read_u16(stream)?;
        let response = match information_type {
            DiscoveryInformationType::PublisherEndpoints => {
                let endpoints: Option<Vec<EndpointDescription>> =
                    read_array(stream, decoding_options)?;
                DiscoveryResponse::PublisherEndpoints {
                    sequence_number,
                    endpoints: endpoints.unwrap_or_default(),
                    status_code: StatusCode::decode(stream, decoding_options)?,
                }
            }
            DiscoveryInformationType::DataSetMetaData => {
                let data_set_writer_id = read_u16(stream)?;
                let meta_data = {
                    let _depth_lock = decoding_options.depth_lock()?;
                    DataSetMetaData::decode(stream, decoding_options)?
                };
                DiscoveryResponse::DataSetMetaData {
                    sequence_number,
                    data_set_writer_id,
                    meta_data,
                    status_code: StatusCode::decode(stream, decoding_options)?,
                }
            }
            DiscoveryInformationType::DataSetWriterConfiguration => {
                let data_set_writer_ids: Option<Vec<u16>> = read_array(stream, decoding_options)?;
                let writer_group = WriterGroup::decode(stream, decoding_options)?;
                let status_codes: Option<Vec<StatusCode>> = read_array(stream, decoding_options)?;
                DiscoveryResponse::DataSetWriterConfiguration {
                    sequence_number,
                    data_set_writer_ids: data_set_writer_ids.unwrap_or_default(),
                    writer_group,
                    status_codes: status_codes.unwrap_or_default(),
                }
            }
        };
        Ok(response)
    }
}
