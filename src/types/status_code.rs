// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The `StatusCode` type. Only the codes that PubSub produces or inspects are named here, any
//! other value still round trips through encoding unchanged.

use std::{
    error::Error,
    fmt,
    fmt::Formatter,
    io::{self, Read, Write},
};

use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::types::encoding::*;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatusCode(u32);

#[allow(non_upper_case_globals)]
impl StatusCode {
    pub const Good: StatusCode = StatusCode(0);
    pub const Uncertain: StatusCode = StatusCode(0x4000_0000);
    pub const UncertainLastUsableValue: StatusCode = StatusCode(0x4090_0000);
    pub const UncertainSubstituteValue: StatusCode = StatusCode(0x4091_0000);
    pub const Bad: StatusCode = StatusCode(0x8000_0000);
    pub const BadUnexpectedError: StatusCode = StatusCode(0x8001_0000);
    pub const BadInternalError: StatusCode = StatusCode(0x8002_0000);
    pub const BadResourceUnavailable: StatusCode = StatusCode(0x8004_0000);
    pub const BadCommunicationError: StatusCode = StatusCode(0x8005_0000);
    pub const BadEncodingError: StatusCode = StatusCode(0x8006_0000);
    pub const BadDecodingError: StatusCode = StatusCode(0x8007_0000);
    pub const BadEncodingLimitsExceeded: StatusCode = StatusCode(0x8008_0000);
    pub const BadTimeout: StatusCode = StatusCode(0x800A_0000);
    pub const BadNoCommunication: StatusCode = StatusCode(0x8031_0000);
    pub const BadNodeIdInvalid: StatusCode = StatusCode(0x8033_0000);
    pub const BadOutOfRange: StatusCode = StatusCode(0x803C_0000);
    pub const BadNotSupported: StatusCode = StatusCode(0x803D_0000);
    pub const BadNotFound: StatusCode = StatusCode(0x803E_0000);
    pub const BadTypeMismatch: StatusCode = StatusCode(0x8074_0000);
    pub const BadTcpEndpointUrlInvalid: StatusCode = StatusCode(0x8083_0000);
    pub const BadConfigurationError: StatusCode = StatusCode(0x8089_0000);
    pub const BadNoData: StatusCode = StatusCode(0x809B_0000);
    pub const BadInvalidArgument: StatusCode = StatusCode(0x80AB_0000);
    pub const BadInvalidState: StatusCode = StatusCode(0x80AF_0000);

    /// Mask for the severity and sub code portion of the status code.
    pub const STATUS_MASK: u32 = 0xffff_0000;
    /// Mask for the info bits.
    pub const BIT_MASK: u32 = 0x0000_ffff;

    const IS_ERROR: u32 = 0x8000_0000;
    const IS_UNCERTAIN: u32 = 0x4000_0000;

    const NAMES: &'static [(StatusCode, &'static str)] = &[
        (StatusCode::Good, "Good"),
        (StatusCode::Uncertain, "Uncertain"),
        (
            StatusCode::UncertainLastUsableValue,
            "UncertainLastUsableValue",
        ),
        (
            StatusCode::UncertainSubstituteValue,
            "UncertainSubstituteValue",
        ),
        (StatusCode::Bad, "Bad"),
        (StatusCode::BadUnexpectedError, "BadUnexpectedError"),
        (StatusCode::BadInternalError, "BadInternalError"),
        (StatusCode::BadResourceUnavailable, "BadResourceUnavailable"),
        (StatusCode::BadCommunicationError, "BadCommunicationError"),
        (StatusCode::BadEncodingError, "BadEncodingError"),
        (StatusCode::BadDecodingError, "BadDecodingError"),
        (
            StatusCode::BadEncodingLimitsExceeded,
            "BadEncodingLimitsExceeded",
        ),
        (StatusCode::BadTimeout, "BadTimeout"),
        (StatusCode::BadNoCommunication, "BadNoCommunication"),
        (StatusCode::BadNodeIdInvalid, "BadNodeIdInvalid"),
        (StatusCode::BadOutOfRange, "BadOutOfRange"),
        (StatusCode::BadNotSupported, "BadNotSupported"),
        (StatusCode::BadNotFound, "BadNotFound"),
        (StatusCode::BadTypeMismatch, "BadTypeMismatch"),
        (
            StatusCode::BadTcpEndpointUrlInvalid,
            "BadTcpEndpointUrlInvalid",
        ),
        (StatusCode::BadConfigurationError, "BadConfigurationError"),
        (StatusCode::BadNoData, "BadNoData"),
        (StatusCode::BadInvalidArgument, "BadInvalidArgument"),
        (StatusCode::BadInvalidState, "BadInvalidState"),
    ];

    pub const fn from_bits_truncate(bits: u32) -> StatusCode {
        StatusCode(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Returns the bit flags of the status code, i.e. it masks out the actual status code value
    pub fn bitflags(&self) -> u32 {
        self.0 & Self::BIT_MASK
    }

    /// Returns the status only, i.e. it masks out any bit flags that come with the status code
    pub fn status(&self) -> StatusCode {
        StatusCode(self.0 & Self::STATUS_MASK)
    }

    /// Tests if the status code is bad
    pub fn is_bad(&self) -> bool {
        self.0 & Self::IS_ERROR != 0
    }

    /// Tests if the status code is uncertain
    pub fn is_uncertain(&self) -> bool {
        !self.is_bad() && self.0 & Self::IS_UNCERTAIN != 0
    }

    /// Tests if the status code is good (i.e. not bad or uncertain)
    pub fn is_good(&self) -> bool {
        !self.is_bad() && !self.is_uncertain()
    }

    /// The upper 16 bits of the code. UADP DataSetMessage headers carry only this portion.
    pub fn high_word(&self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// Rebuilds a status code from the upper 16 bits carried in a DataSetMessage header.
    pub fn from_high_word(value: u16) -> StatusCode {
        StatusCode((value as u32) << 16)
    }

    /// Returns the symbolic name of the code, ignoring info bits.
    pub fn name(&self) -> &'static str {
        let status = self.status();
        Self::NAMES
            .iter()
            .find(|(code, _)| *code == status)
            .map(|(_, name)| *name)
            .unwrap_or("Unknown")
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        StatusCode::Good
    }
}

impl From<u32> for StatusCode {
    fn from(value: u32) -> Self {
        StatusCode(value)
    }
}

impl From<StatusCode> for u32 {
    fn from(value: StatusCode) -> Self {
        value.0
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let bits = self.bitflags();
        if bits == 0 {
            write!(f, "{}", self.name())
        } else {
            write!(f, "{}+{:#06x}", self.name(), bits)
        }
    }
}

impl fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.name() == "Unknown" {
            write!(f, "StatusCode({:#010x})", self.0)
        } else {
            fmt::Display::fmt(self, f)
        }
    }
}

impl BinaryEncoder<StatusCode> for StatusCode {
    fn byte_len(&self) -> usize {
        4
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        write_u32(stream, self.bits())
    }

    fn decode<S: Read>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(StatusCode::from_bits_truncate(read_u32(stream)?))
    }
}

impl Error for StatusCode {}

impl From<StatusCode> for io::Error {
    fn from(e: StatusCode) -> io::Error {
        io::Error::new(io::ErrorKind::Other, format!("StatusCode {}", e))
    }
}

// Serialize / Deserialize are manually implemented so the code is persisted as its numeric value.

impl Serialize for StatusCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(self.bits())
    }
}

struct StatusCodeVisitor;

impl<'de> Visitor<'de> for StatusCodeVisitor {
    type Value = u32;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an unsigned 32-bit integer")
    }

    fn visit_u32<E>(self, value: u32) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(value)
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        u32::try_from(value).map_err(|_| E::custom("status code out of range"))
    }

    fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        u32::try_from(value).map_err(|_| E::custom("status code out of range"))
    }
}

impl<'de> Deserialize<'de> for StatusCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, <D as Deserializer<'de>>::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(StatusCode::from_bits_truncate(
            deserializer.deserialize_u32(StatusCodeVisitor)?,
        ))
    }
}

#[test]
fn status_code() {
    assert!(StatusCode::Good.is_good());
    assert!(!StatusCode::Good.is_bad());
    assert!(!StatusCode::Good.is_uncertain());

    assert!(StatusCode::UncertainLastUsableValue.is_uncertain());
    assert!(!StatusCode::UncertainLastUsableValue.is_bad());
    assert!(!StatusCode::UncertainLastUsableValue.is_good());

    assert!(StatusCode::BadDecodingError.is_bad());
    assert!(!StatusCode::BadDecodingError.is_uncertain());
    assert!(!StatusCode::BadDecodingError.is_good());

    let with_info = StatusCode::from_bits_truncate(StatusCode::BadDecodingError.bits() | 0x0400);
    assert_eq!(with_info.status(), StatusCode::BadDecodingError);
    assert_eq!(with_info.bitflags(), 0x0400);
    assert_eq!(StatusCode::BadNotFound.to_string(), "BadNotFound");
}

#[test]
fn status_code_high_word() {
    let code = StatusCode::UncertainLastUsableValue;
    assert_eq!(code.high_word(), 0x4090);
    assert_eq!(StatusCode::from_high_word(code.high_word()), code);
}
