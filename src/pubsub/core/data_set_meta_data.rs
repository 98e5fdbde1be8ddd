// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Describes the shape of a DataSet: its fields, their types and the configuration version. A
//! subscriber needs this to decode RawData fields and to know when the layout changed.

use std::io::{Read, Write};

use crate::types::*;

use super::configuration_version::ConfigurationVersion;

/// A property of a field, a qualified name and a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub namespace_index: u16,
    pub key: String,
    pub value: Variant,
}

impl BinaryEncoder<KeyValuePair> for KeyValuePair {
    fn byte_len(&self) -> usize {
        2 + UAString::from(self.key.as_str()).byte_len() + self.value.byte_len()
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = write_u16(stream, self.namespace_index)?;
        size += UAString::from(self.key.as_str()).encode(stream)?;
        size += self.value.encode(stream)?;
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let namespace_index = read_u16(stream)?;
        let key = String::from(UAString::decode(stream, decoding_options)?);
        let value = Variant::decode(stream, decoding_options)?;
        Ok(KeyValuePair {
            namespace_index,
            key,
            value,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Derivative)]
#[derivative(Default)]
#[serde(default)]
pub struct FieldMetaData {
    pub name: String,
    pub description: LocalizedText,
    /// Bit 0 marks a promoted field.
    pub field_flags: u16,
    pub built_in_type: BuiltInType,
    pub data_type: NodeId,
    /// -1 scalar, 1 or more for an array of that many dimensions.
    #[derivative(Default(value = "-1"))]
    pub value_rank: i32,
    pub array_dimensions: Option<Vec<u32>>,
    pub max_string_length: u32,
    pub data_set_field_id: Guid,
    pub properties: Vec<KeyValuePair>,
}

impl BinaryEncoder<FieldMetaData> for FieldMetaData {
    fn byte_len(&self) -> usize {
        UAString::from(self.name.as_str()).byte_len()
            + self.description.byte_len()
            + 2
            + 1
            + self.data_type.byte_len()
            + 4
            + byte_len_array(&self.array_dimensions)
            + 4
            + self.data_set_field_id.byte_len()
            + 4
            + self.properties.iter().map(|p| p.byte_len()).sum::<usize>()
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = UAString::from(self.name.as_str()).encode(stream)?;
        size += self.description.encode(stream)?;
        size += write_u16(stream, self.field_flags)?;
        size += write_u8(stream, self.built_in_type as u8)?;
        size += self.data_type.encode(stream)?;
        size += write_i32(stream, self.value_rank)?;
        size += write_array(stream, &self.array_dimensions)?;
        size += write_u32(stream, self.max_string_length)?;
        size += self.data_set_field_id.encode(stream)?;
        size += write_i32(stream, self.properties.len() as i32)?;
        for property in &self.properties {
            size += property.encode(stream)?;
        }
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let name = String::from(UAString::decode(stream, decoding_options)?);
        let description = LocalizedText::decode(stream, decoding_options)?;
        let field_flags = read_u16(stream)?;
        let built_in_type = BuiltInType::try_from(read_u8(stream)?)?;
        let data_type = NodeId::decode(stream, decoding_options)?;
        let value_rank = read_i32(stream)?;
        let array_dimensions = read_array(stream, decoding_options)?;
        let max_string_length = read_u32(stream)?;
        let data_set_field_id = Guid::decode(stream, decoding_options)?;
        let properties: Option<Vec<KeyValuePair>> = read_array(stream, decoding_options)?;
        Ok(FieldMetaData {
            name,
            description,
            field_flags,
            built_in_type,
            data_type,
            value_rank,
            array_dimensions,
            max_string_length,
            data_set_field_id,
            properties: properties.unwrap_or_default(),
        })
    }
}

impl FieldMetaData {
    pub fn new<T>(name: T, built_in_type: BuiltInType) -> Self
    where
        T: Into<String>,
    {
        Self {
            name: name.into(),
            built_in_type,
            data_type: built_in_type.data_type_id(),
            data_set_field_id: Guid::new(),
            ..Default::default()
        }
    }

    pub fn is_array(&self) -> bool {
        self.value_rank >= 1
    }
}

/// The metadata of a published DataSet.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSetMetaData {
    pub namespaces: Vec<String>,
    pub name: String,
    pub description: LocalizedText,
    pub fields: Vec<FieldMetaData>,
    pub data_set_class_id: Guid,
    pub configuration_version: ConfigurationVersion,
}

fn byte_len_strings(values: &[String]) -> usize {
    4 + values
        .iter()
        .map(|v| UAString::from(v.as_str()).byte_len())
        .sum::<usize>()
}

fn write_strings<S: Write>(stream: &mut S, values: &[String]) -> EncodingResult<usize> {
    let mut size = write_i32(stream, values.len() as i32)?;
    for value in values {
        size += UAString::from(value.as_str()).encode(stream)?;
    }
    Ok(size)
}

/// Structure, enum and simple type descriptions are not supported, they are written as null
/// arrays and a peer that sends any is rejected.
fn read_unsupported_type_descriptions<S: Read>(stream: &mut S) -> EncodingResult<()> {
    let len = read_i32(stream)?;
    if len > 0 {
        error!("DataSetMetaData carries {} type descriptions which are not supported", len);
        Err(StatusCode::BadDecodingError)
    } else {
        Ok(())
    }
}

impl BinaryEncoder<DataSetMetaData> for DataSetMetaData {
    fn byte_len(&self) -> usize {
        byte_len_strings(&self.namespaces)
            + 4 * 3
            + UAString::from(self.name.as_str()).byte_len()
            + self.description.byte_len()
            + 4
            + self.fields.iter().map(|f| f.byte_len()).sum::<usize>()
            + self.data_set_class_id.byte_len()
            + self.configuration_version.byte_len()
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = write_strings(stream, &self.namespaces)?;
        // structure, enum and simple data types
        for _ in 0..3 {
            size += write_i32(stream, -1)?;
        }
        size += UAString::from(self.name.as_str()).encode(stream)?;
        size += self.description.encode(stream)?;
        size += write_i32(stream, self.fields.len() as i32)?;
        for field in &self.fields {
            size += field.encode(stream)?;
        }
        size += self.data_set_class_id.encode(stream)?;
        size += self.configuration_version.encode(stream)?;
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let namespaces: Option<Vec<UAString>> = read_array(stream, decoding_options)?;
        for _ in 0..3 {
            read_unsupported_type_descriptions(stream)?;
        }
        let name = String::from(UAString::decode(stream, decoding_options)?);
        let description = LocalizedText::decode(stream, decoding_options)?;
        let fields: Option<Vec<FieldMetaData>> = read_array(stream, decoding_options)?;
        let data_set_class_id = Guid::decode(stream, decoding_options)?;
        let configuration_version = ConfigurationVersion::decode(stream, decoding_options)?;
        Ok(DataSetMetaData {
            namespaces: namespaces
                .unwrap_or_default()
                .into_iter()
                .map(String::from)
                .collect(),
            name,
            description,
            fields: fields.unwrap_or_default(),
            data_set_class_id,
            configuration_version,
        })
    }
}

impl DataSetMetaData {
    pub fn new<T>(name: T, fields: Vec<FieldMetaData>, configuration_version: ConfigurationVersion) -> Self
    where
        T: Into<String>,
    {
        Self {
            name: name.into(),
            fields,
            configuration_version,
            ..Default::default()
        }
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}
