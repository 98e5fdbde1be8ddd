// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::types::{node_id::NodeId, status_code::StatusCode};

/// The OPC UA built-in types. The discriminant is the built-in type id, which is also the
/// variant encoding mask value and the numeric id of the data type node in namespace 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BuiltInType {
    Null = 0,
    Boolean = 1,
    SByte = 2,
    Byte = 3,
    Int16 = 4,
    UInt16 = 5,
    Int32 = 6,
    UInt32 = 7,
    Int64 = 8,
    UInt64 = 9,
    Float = 10,
    Double = 11,
    String = 12,
    DateTime = 13,
    Guid = 14,
    ByteString = 15,
    XmlElement = 16,
    NodeId = 17,
    ExpandedNodeId = 18,
    StatusCode = 19,
    QualifiedName = 20,
    LocalizedText = 21,
    ExtensionObject = 22,
    DataValue = 23,
    Variant = 24,
    DiagnosticInfo = 25,
}

impl Default for BuiltInType {
    fn default() -> Self {
        BuiltInType::Null
    }
}

impl TryFrom<u8> for BuiltInType {
    type Error = StatusCode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use BuiltInType::*;
        const TYPES: [BuiltInType; 26] = [
            Null,
            Boolean,
            SByte,
            Byte,
            Int16,
            UInt16,
            Int32,
            UInt32,
            Int64,
            UInt64,
            Float,
            Double,
            String,
            DateTime,
            Guid,
            ByteString,
            XmlElement,
            NodeId,
            ExpandedNodeId,
            StatusCode,
            QualifiedName,
            LocalizedText,
            ExtensionObject,
            DataValue,
            Variant,
            DiagnosticInfo,
        ];
        TYPES.get(value as usize).copied().ok_or_else(|| {
            error!("Unrecognized built-in type id {}", value);
            crate::types::StatusCode::BadDecodingError
        })
    }
}

impl BuiltInType {
    /// The data type node id for this built-in type, e.g. i=11 for Double.
    pub fn data_type_id(&self) -> NodeId {
        NodeId::new(0, *self as u32)
    }

    /// Resolves a namespace 0 data type id to its built-in type. Anything else is treated as
    /// `Variant`, i.e. the encoder sends whatever type the value has.
    pub fn from_data_type_id(data_type: &NodeId) -> BuiltInType {
        data_type
            .as_ns0_numeric()
            .filter(|v| *v <= 25)
            .and_then(|v| BuiltInType::try_from(v as u8).ok())
            .unwrap_or(BuiltInType::Variant)
    }

    /// Size of the value in bytes if it has a fixed size encoding.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            BuiltInType::Boolean | BuiltInType::SByte | BuiltInType::Byte => Some(1),
            BuiltInType::Int16 | BuiltInType::UInt16 => Some(2),
            BuiltInType::Int32
            | BuiltInType::UInt32
            | BuiltInType::Float
            | BuiltInType::StatusCode => Some(4),
            BuiltInType::Int64
            | BuiltInType::UInt64
            | BuiltInType::Double
            | BuiltInType::DateTime => Some(8),
            BuiltInType::Guid => Some(16),
            _ => None,
        }
    }
}
