// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The metadata version of a DataSet and the rules a subscriber applies when a message carries a
//! different version than the metadata it holds.

use std::{
    fmt,
    io::{Read, Write},
};

use crate::types::*;

/// Version of a DataSet's metadata. A major version change means the field layout changed, a
/// minor version change means something compatible changed (e.g. a description).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ConfigurationVersion {
    pub major_version: u32,
    pub minor_version: u32,
}

impl fmt::Display for ConfigurationVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major_version, self.minor_version)
    }
}

impl BinaryEncoder<ConfigurationVersion> for ConfigurationVersion {
    fn byte_len(&self) -> usize {
        8
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = write_u32(stream, self.major_version)?;
        size += write_u32(stream, self.minor_version)?;
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        let major_version = read_u32(stream)?;
        let minor_version = read_u32(stream)?;
        Ok(ConfigurationVersion {
            major_version,
            minor_version,
        })
    }
}

impl ConfigurationVersion {
    pub fn new(major_version: u32, minor_version: u32) -> Self {
        Self {
            major_version,
            minor_version,
        }
    }

    /// A major version of 0 means the metadata was never received or configured, so it cannot be
    /// used to decode anything. The minor version plays no part.
    pub fn is_usable(&self) -> bool {
        self.major_version != 0
    }
}

/// Why a DataSetMessage produced no DataSet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataSetDecodeErrorReason {
    #[default]
    NoError,
    /// The major version in the message differs from the reader's metadata.
    MetadataMajorVersion,
    /// The bytes are malformed or do not fit the reader's metadata.
    DecodingError,
}

/// Outcome of comparing a received metadata version with the cached one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionReconciliation {
    Match,
    /// Fields still line up, decoding proceeds.
    MinorMismatch,
    /// Field layout may differ, decoding must not proceed.
    MajorMismatch,
}

impl VersionReconciliation {
    pub fn can_decode(&self) -> bool {
        !matches!(self, VersionReconciliation::MajorMismatch)
    }
}

/// Compares the versions carried in a DataSetMessage header against the reader's cached metadata
/// version. A version not present on the wire is not compared. Cached metadata that is not usable
/// never decodes.
pub fn reconcile_versions(
    received_major: Option<u32>,
    received_minor: Option<u32>,
    cached: &ConfigurationVersion,
) -> VersionReconciliation {
    if !cached.is_usable() {
        return VersionReconciliation::MajorMismatch;
    }
    match received_major {
        Some(major) if major != cached.major_version => VersionReconciliation::MajorMismatch,
        _ => match received_minor {
            Some(minor) if minor != cached.minor_version => VersionReconciliation::MinorMismatch,
            _ => VersionReconciliation::Match,
        },
    }
}
