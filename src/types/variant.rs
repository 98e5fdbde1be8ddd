// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `Variant` and `Array`.

use std::{
    fmt,
    io::{Read, Write},
};

use crate::types::{
    byte_string::ByteString, data_value::DataValue, date_time::DateTime, encoding::*,
    guid::Guid, localized_text::LocalizedText, node_id::NodeId, status_code::StatusCode,
    string::UAString, variant_type_id::BuiltInType,
};

/// Bit indicates an array with dimensions
const ARRAY_DIMENSIONS_BIT: u8 = 1 << 6;
/// Bit indicates an array with values
const ARRAY_VALUES_BIT: u8 = 1 << 7;
const ARRAY_MASK: u8 = ARRAY_DIMENSIONS_BIT | ARRAY_VALUES_BIT;

/// A `Variant` holds a built-in OPC UA value, or a single / multi dimensional array of them.
///
/// Boxes are used for the larger types to keep the size of the enum down since dataset
/// fields are held in vectors of these.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub enum Variant {
    /// Empty type has no value. It is equivalent to a Null value
    #[default]
    Empty,
    Boolean(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(UAString),
    DateTime(Box<DateTime>),
    Guid(Box<Guid>),
    StatusCode(StatusCode),
    ByteString(ByteString),
    NodeId(Box<NodeId>),
    LocalizedText(Box<LocalizedText>),
    /// A value with quality and timestamps. UADP uses this to carry an uncertain status
    /// alongside a field value in variant field encoding.
    DataValue(Box<DataValue>),
    Array(Box<Array>),
}

/// A homogeneous array of values, optionally with the dimensions of a multi dimensional array.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Array {
    pub value_type: BuiltInType,
    pub values: Vec<Variant>,
    pub dimensions: Option<Vec<u32>>,
}

impl Array {
    /// Creates a single dimension array. Fails if any value is not of the value type.
    pub fn new(value_type: BuiltInType, values: Vec<Variant>) -> EncodingResult<Array> {
        if values.iter().any(|v| v.type_id() != value_type) {
            error!("Array contains values that are not {:?}", value_type);
            Err(StatusCode::BadTypeMismatch)
        } else {
            Ok(Array {
                value_type,
                values,
                dimensions: None,
            })
        }
    }

    /// Creates a multi dimension array. The product of the dimensions must equal the number of values.
    pub fn new_multi(
        value_type: BuiltInType,
        values: Vec<Variant>,
        dimensions: Vec<u32>,
    ) -> EncodingResult<Array> {
        let mut expected = 1u32;
        for d in &dimensions {
            expected = expected.checked_mul(*d).ok_or_else(|| {
                error!("Array dimension overflow!");
                StatusCode::BadDecodingError
            })?;
        }
        if expected as usize != values.len() {
            error!(
                "Array dimensions {:?} do not match array length {}",
                dimensions,
                values.len()
            );
            return Err(StatusCode::BadDecodingError);
        }
        let mut array = Array::new(value_type, values)?;
        array.dimensions = Some(dimensions);
        Ok(array)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Variant::Empty => write!(f, "Empty"),
            Variant::Boolean(v) => write!(f, "{}", v),
            Variant::SByte(v) => write!(f, "{}", v),
            Variant::Byte(v) => write!(f, "{}", v),
            Variant::Int16(v) => write!(f, "{}", v),
            Variant::UInt16(v) => write!(f, "{}", v),
            Variant::Int32(v) => write!(f, "{}", v),
            Variant::UInt32(v) => write!(f, "{}", v),
            Variant::Int64(v) => write!(f, "{}", v),
            Variant::UInt64(v) => write!(f, "{}", v),
            Variant::Float(v) => write!(f, "{}", v),
            Variant::Double(v) => write!(f, "{}", v),
            Variant::String(v) => write!(f, "{}", v),
            Variant::DateTime(v) => write!(f, "{}", v),
            Variant::Guid(v) => write!(f, "{}", v),
            Variant::StatusCode(v) => write!(f, "{}", v),
            Variant::ByteString(v) => write!(f, "{:02x?}", v.as_ref()),
            Variant::NodeId(v) => write!(f, "{}", v),
            Variant::LocalizedText(v) => write!(f, "{}", v),
            Variant::DataValue(v) => write!(f, "{:?}", v),
            Variant::Array(v) => write!(f, "{:?}", v.values),
        }
    }
}

macro_rules! from_scalar {
    ( $t:ty, $variant:ident ) => {
        impl From<$t> for Variant {
            fn from(v: $t) -> Self {
                Variant::$variant(v)
            }
        }
    };
}

from_scalar!(bool, Boolean);
from_scalar!(i8, SByte);
from_scalar!(u8, Byte);
from_scalar!(i16, Int16);
from_scalar!(u16, UInt16);
from_scalar!(i32, Int32);
from_scalar!(u32, UInt32);
from_scalar!(i64, Int64);
from_scalar!(u64, UInt64);
from_scalar!(f32, Float);
from_scalar!(f64, Double);
from_scalar!(UAString, String);
from_scalar!(StatusCode, StatusCode);
from_scalar!(ByteString, ByteString);

impl<'a> From<&'a str> for Variant {
    fn from(v: &'a str) -> Self {
        Variant::String(UAString::from(v))
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::String(UAString::from(v))
    }
}

impl From<DateTime> for Variant {
    fn from(v: DateTime) -> Self {
        Variant::DateTime(Box::new(v))
    }
}

impl From<Guid> for Variant {
    fn from(v: Guid) -> Self {
        Variant::Guid(Box::new(v))
    }
}

impl From<NodeId> for Variant {
    fn from(v: NodeId) -> Self {
        Variant::NodeId(Box::new(v))
    }
}

impl From<LocalizedText> for Variant {
    fn from(v: LocalizedText) -> Self {
        Variant::LocalizedText(Box::new(v))
    }
}

impl From<DataValue> for Variant {
    fn from(v: DataValue) -> Self {
        Variant::DataValue(Box::new(v))
    }
}

impl From<Array> for Variant {
    fn from(v: Array) -> Self {
        Variant::Array(Box::new(v))
    }
}

impl BinaryEncoder<Variant> for Variant {
    fn byte_len(&self) -> usize {
        let mut size: usize = 1;
        match self {
            Variant::Array(array) => {
                size += 4;
                size += array
                    .values
                    .iter()
                    .map(|v| v.raw_byte_len())
                    .sum::<usize>();
                if let Some(ref dimensions) = array.dimensions {
                    size += byte_len_array(&Some(dimensions.clone()));
                }
            }
            _ => size += self.raw_byte_len(),
        }
        size
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size: usize = 0;
        match self {
            Variant::Array(array) => {
                let mut encoding_mask = array.value_type as u8 | ARRAY_VALUES_BIT;
                if array.dimensions.is_some() {
                    encoding_mask |= ARRAY_DIMENSIONS_BIT;
                }
                size += write_u8(stream, encoding_mask)?;
                size += write_i32(stream, array.values.len() as i32)?;
                for value in &array.values {
                    size += value.encode_raw(stream)?;
                }
                if let Some(ref dimensions) = array.dimensions {
                    size += write_array(stream, &Some(dimensions.clone()))?;
                }
            }
            _ => {
                size += write_u8(stream, self.type_id() as u8)?;
                size += self.encode_raw(stream)?;
            }
        }
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let encoding_mask = read_u8(stream)?;
        let value_type = BuiltInType::try_from(encoding_mask & !ARRAY_MASK)?;

        if encoding_mask & ARRAY_VALUES_BIT == 0 {
            if encoding_mask & ARRAY_DIMENSIONS_BIT != 0 {
                error!("Array dimensions bit specified without any values");
                return Err(StatusCode::BadDecodingError);
            }
            return Variant::decode_raw(stream, value_type, decoding_options);
        }

        let array_length = read_i32(stream)?;
        let values = if array_length == -1 {
            Vec::new()
        } else if array_length < -1 {
            error!("Invalid array_length {}", array_length);
            return Err(StatusCode::BadDecodingError);
        } else if array_length as usize > decoding_options.max_array_length {
            return Err(StatusCode::BadEncodingLimitsExceeded);
        } else {
            let mut values = Vec::with_capacity(array_length as usize);
            for _ in 0..array_length {
                values.push(Variant::decode_raw(stream, value_type, decoding_options)?);
            }
            values
        };

        let array = if encoding_mask & ARRAY_DIMENSIONS_BIT != 0 {
            match read_array::<S, u32>(stream, decoding_options)? {
                Some(dimensions) if dimensions.iter().all(|d| *d > 0) => {
                    Array::new_multi(value_type, values, dimensions)?
                }
                _ => {
                    error!("Invalid or missing array dimensions");
                    return Err(StatusCode::BadDecodingError);
                }
            }
        } else {
            Array::new(value_type, values)?
        };
        Ok(Variant::from(array))
    }
}

impl Variant {
    /// Returns the built-in type of the value. Arrays report the type of their elements.
    pub fn type_id(&self) -> BuiltInType {
        match self {
            Variant::Empty => BuiltInType::Null,
            Variant::Boolean(_) => BuiltInType::Boolean,
            Variant::SByte(_) => BuiltInType::SByte,
            Variant::Byte(_) => BuiltInType::Byte,
            Variant::Int16(_) => BuiltInType::Int16,
            Variant::UInt16(_) => BuiltInType::UInt16,
            Variant::Int32(_) => BuiltInType::Int32,
            Variant::UInt32(_) => BuiltInType::UInt32,
            Variant::Int64(_) => BuiltInType::Int64,
            Variant::UInt64(_) => BuiltInType::UInt64,
            Variant::Float(_) => BuiltInType::Float,
            Variant::Double(_) => BuiltInType::Double,
            Variant::String(_) => BuiltInType::String,
            Variant::DateTime(_) => BuiltInType::DateTime,
            Variant::Guid(_) => BuiltInType::Guid,
            Variant::StatusCode(_) => BuiltInType::StatusCode,
            Variant::ByteString(_) => BuiltInType::ByteString,
            Variant::NodeId(_) => BuiltInType::NodeId,
            Variant::LocalizedText(_) => BuiltInType::LocalizedText,
            Variant::DataValue(_) => BuiltInType::DataValue,
            Variant::Array(array) => array.value_type,
        }
    }

    /// The zero / null value of a built-in type, used where a value of a fixed type must be
    /// written but none is available.
    pub fn default_of_type(value_type: BuiltInType) -> Variant {
        match value_type {
            BuiltInType::Boolean => Variant::Boolean(false),
            BuiltInType::SByte => Variant::SByte(0),
            BuiltInType::Byte => Variant::Byte(0),
            BuiltInType::Int16 => Variant::Int16(0),
            BuiltInType::UInt16 => Variant::UInt16(0),
            BuiltInType::Int32 => Variant::Int32(0),
            BuiltInType::UInt32 => Variant::UInt32(0),
            BuiltInType::Int64 => Variant::Int64(0),
            BuiltInType::UInt64 => Variant::UInt64(0),
            BuiltInType::Float => Variant::Float(0.0),
            BuiltInType::Double => Variant::Double(0.0),
            BuiltInType::String => Variant::String(UAString::null()),
            BuiltInType::DateTime => Variant::from(DateTime::null()),
            BuiltInType::Guid => Variant::from(Guid::null()),
            BuiltInType::StatusCode => Variant::StatusCode(StatusCode::Good),
            BuiltInType::ByteString => Variant::ByteString(ByteString::null()),
            BuiltInType::NodeId => Variant::from(NodeId::null()),
            BuiltInType::LocalizedText => Variant::from(LocalizedText::null()),
            BuiltInType::DataValue => Variant::from(DataValue::null()),
            _ => Variant::Empty,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Variant::Array(_))
    }

    /// Length in bytes of the value without the encoding mask, i.e. the size it occupies in a
    /// RawData field.
    pub fn raw_byte_len(&self) -> usize {
        match self {
            Variant::Empty => 0,
            Variant::Boolean(v) => v.byte_len(),
            Variant::SByte(v) => v.byte_len(),
            Variant::Byte(v) => v.byte_len(),
            Variant::Int16(v) => v.byte_len(),
            Variant::UInt16(v) => v.byte_len(),
            Variant::Int32(v) => v.byte_len(),
            Variant::UInt32(v) => v.byte_len(),
            Variant::Int64(v) => v.byte_len(),
            Variant::UInt64(v) => v.byte_len(),
            Variant::Float(v) => v.byte_len(),
            Variant::Double(v) => v.byte_len(),
            Variant::String(v) => v.byte_len(),
            Variant::DateTime(v) => v.byte_len(),
            Variant::Guid(v) => v.byte_len(),
            Variant::StatusCode(v) => v.byte_len(),
            Variant::ByteString(v) => v.byte_len(),
            Variant::NodeId(v) => v.byte_len(),
            Variant::LocalizedText(v) => v.byte_len(),
            Variant::DataValue(v) => v.byte_len(),
            Variant::Array(array) => {
                4 + array
                    .values
                    .iter()
                    .map(|v| v.raw_byte_len())
                    .sum::<usize>()
            }
        }
    }

    /// Encodes the value without the variant encoding mask. Arrays are written as an Int32
    /// length followed by the raw elements.
    pub fn encode_raw<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        match self {
            Variant::Empty => Ok(0),
            Variant::Boolean(v) => v.encode(stream),
            Variant::SByte(v) => v.encode(stream),
            Variant::Byte(v) => v.encode(stream),
            Variant::Int16(v) => v.encode(stream),
            Variant::UInt16(v) => v.encode(stream),
            Variant::Int32(v) => v.encode(stream),
            Variant::UInt32(v) => v.encode(stream),
            Variant::Int64(v) => v.encode(stream),
            Variant::UInt64(v) => v.encode(stream),
            Variant::Float(v) => v.encode(stream),
            Variant::Double(v) => v.encode(stream),
            Variant::String(v) => v.encode(stream),
            Variant::DateTime(v) => v.encode(stream),
            Variant::Guid(v) => v.encode(stream),
            Variant::StatusCode(v) => v.encode(stream),
            Variant::ByteString(v) => v.encode(stream),
            Variant::NodeId(v) => v.encode(stream),
            Variant::LocalizedText(v) => v.encode(stream),
            Variant::DataValue(v) => v.encode(stream),
            Variant::Array(array) => {
                let mut size = write_i32(stream, array.values.len() as i32)?;
                for value in &array.values {
                    size += value.encode_raw(stream)?;
                }
                Ok(size)
            }
        }
    }

    /// Decodes a single value of the given type that was written without an encoding mask.
    pub fn decode_raw<S: Read>(
        stream: &mut S,
        value_type: BuiltInType,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Variant> {
        let value = match value_type {
            BuiltInType::Null => Variant::Empty,
            BuiltInType::Boolean => Variant::from(bool::decode(stream, decoding_options)?),
            BuiltInType::SByte => Variant::from(i8::decode(stream, decoding_options)?),
            BuiltInType::Byte => Variant::from(u8::decode(stream, decoding_options)?),
            BuiltInType::Int16 => Variant::from(i16::decode(stream, decoding_options)?),
            BuiltInType::UInt16 => Variant::from(u16::decode(stream, decoding_options)?),
            BuiltInType::Int32 => Variant::from(i32::decode(stream, decoding_options)?),
            BuiltInType::UInt32 => Variant::from(u32::decode(stream, decoding_options)?),
            BuiltInType::Int64 => Variant::from(i64::decode(stream, decoding_options)?),
            BuiltInType::UInt64 => Variant::from(u64::decode(stream, decoding_options)?),
            BuiltInType::Float => Variant::from(f32::decode(stream, decoding_options)?),
            BuiltInType::Double => Variant::from(f64::decode(stream, decoding_options)?),
            BuiltInType::String => Variant::from(UAString::decode(stream, decoding_options)?),
            BuiltInType::DateTime => Variant::from(DateTime::decode(stream, decoding_options)?),
            BuiltInType::Guid => Variant::from(Guid::decode(stream, decoding_options)?),
            BuiltInType::StatusCode => {
                Variant::from(StatusCode::decode(stream, decoding_options)?)
            }
            BuiltInType::ByteString => {
                Variant::from(ByteString::decode(stream, decoding_options)?)
            }
            BuiltInType::NodeId => Variant::from(NodeId::decode(stream, decoding_options)?),
            BuiltInType::LocalizedText => {
                Variant::from(LocalizedText::decode(stream, decoding_options)?)
            }
            BuiltInType::DataValue => {
                let _depth_lock = decoding_options.depth_lock()?;
                Variant::from(DataValue::decode(stream, decoding_options)?)
            }
            _ => {
                error!("Variant of type {:?} is not supported", value_type);
                return Err(StatusCode::BadDecodingError);
            }
        };
        Ok(value)
    }

    /// Decodes a raw array of the given element type, i.e. an Int32 length and raw elements.
    pub fn decode_raw_array<S: Read>(
        stream: &mut S,
        value_type: BuiltInType,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Variant> {
        let len = read_i32(stream)?;
        if len < -1 {
            error!("Raw array length is a negative number {}", len);
            return Err(StatusCode::BadDecodingError);
        }
        if len > 0 && len as usize > decoding_options.max_array_length {
            return Err(StatusCode::BadEncodingLimitsExceeded);
        }
        let len = len.max(0) as usize;
        let mut values = Vec::with_capacity(len);
        for _ in 0..len {
            values.push(Variant::decode_raw(stream, value_type, decoding_options)?);
        }
        Array::new(value_type, values).map(Variant::from)
    }
}
