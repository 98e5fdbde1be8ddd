// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Content masks and the UADP flag bytes derived from them.
//!
//! The content masks are what configuration selects. The flag bytes are what goes on the wire and
//! what a decoder reads first. Both the encoder and the decoder get the ordered list of header
//! fields from the same layout functions, [`network_message_layout`] and
//! [`data_set_message_layout`], so the two directions cannot disagree about field order.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Implements serde for a bitflags mask as its numeric value, ignoring unknown bits on input.
macro_rules! mask_serde {
    ( $t:ty, $bits:ty ) => {
        impl Serialize for $t {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                self.bits().serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $t {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                Ok(<$t>::from_bits_truncate(<$bits>::deserialize(deserializer)?))
            }
        }
    };
}

bitflags! {
    /// Selects how each field of a DataSetMessage is represented.
    #[derive(Default)]
    pub struct DataSetFieldContentMask: u32 {
        const STATUS_CODE = 0x1;
        const SOURCE_TIMESTAMP = 0x2;
        const SERVER_TIMESTAMP = 0x4;
        const SOURCE_PICO_SECONDS = 0x8;
        const SERVER_PICO_SECONDS = 0x10;
        const RAW_DATA = 0x20;
    }
}

bitflags! {
    /// Selects the optional header fields of a DataSetMessage.
    #[derive(Default)]
    pub struct UadpDataSetMessageContentMask: u32 {
        const TIMESTAMP = 0x1;
        const PICO_SECONDS = 0x2;
        const STATUS = 0x4;
        const MAJOR_VERSION = 0x8;
        const MINOR_VERSION = 0x10;
        const SEQUENCE_NUMBER = 0x20;
    }
}

bitflags! {
    /// Selects the optional header sections and fields of a NetworkMessage.
    #[derive(Default)]
    pub struct UadpNetworkMessageContentMask: u32 {
        const PUBLISHER_ID = 0x1;
        const GROUP_HEADER = 0x2;
        const WRITER_GROUP_ID = 0x4;
        const GROUP_VERSION = 0x8;
        const NETWORK_MESSAGE_NUMBER = 0x10;
        const SEQUENCE_NUMBER = 0x20;
        const PAYLOAD_HEADER = 0x40;
        const TIMESTAMP = 0x80;
        const PICO_SECONDS = 0x100;
        const DATA_SET_CLASS_ID = 0x200;
        const PROMOTED_FIELDS = 0x400;
    }
}

mask_serde!(DataSetFieldContentMask, u32);
mask_serde!(UadpDataSetMessageContentMask, u32);
mask_serde!(UadpNetworkMessageContentMask, u32);

bitflags! {
    pub struct UadpFlags: u8 {
        const PUBLISHER_ID = 0x10;
        const GROUP_HEADER = 0x20;
        const PAYLOAD_HEADER = 0x40;
        const EXTENDED_FLAGS1 = 0x80;
    }
}

bitflags! {
    pub struct ExtendedFlags1: u8 {
        const DATA_SET_CLASS_ID = 0x08;
        const SECURITY = 0x10;
        const TIMESTAMP = 0x20;
        const PICO_SECONDS = 0x40;
        const EXTENDED_FLAGS2 = 0x80;
    }
}

bitflags! {
    pub struct ExtendedFlags2: u8 {
        const CHUNK = 0x01;
        const PROMOTED_FIELDS = 0x02;
        const DISCOVERY_REQUEST = 0x04;
        const DISCOVERY_RESPONSE = 0x08;
    }
}

bitflags! {
    pub struct GroupFlags: u8 {
        const WRITER_GROUP_ID = 0x01;
        const GROUP_VERSION = 0x02;
        const NETWORK_MESSAGE_NUMBER = 0x04;
        const SEQUENCE_NUMBER = 0x08;
    }
}

bitflags! {
    pub struct DataSetFlags1: u8 {
        const MESSAGE_IS_VALID = 0x01;
        const RAW_DATA = 0x02;
        const DATA_VALUE = 0x04;
        const SEQUENCE_NUMBER = 0x08;
        const STATUS = 0x10;
        const MAJOR_VERSION = 0x20;
        const MINOR_VERSION = 0x40;
        const DATA_SET_FLAGS2 = 0x80;
    }
}

bitflags! {
    pub struct DataSetFlags2: u8 {
        const TIMESTAMP = 0x10;
        const PICO_SECONDS = 0x20;
    }
}

/// UADP protocol version carried in the low nibble of the UADPFlags byte.
pub const UADP_VERSION: u8 = 1;
const UADP_VERSION_MASK: u8 = 0x0f;
const PUBLISHER_ID_TYPE_MASK: u8 = 0x07;
const NETWORK_MESSAGE_TYPE_MASK: u8 = 0x1c;
const DATA_SET_MESSAGE_TYPE_MASK: u8 = 0x0f;

/// The kind of payload a NetworkMessage carries, taken from ExtendedFlags2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UadpNetworkMessageType {
    DataSetMessage,
    DiscoveryRequest,
    DiscoveryResponse,
}

impl UadpNetworkMessageType {
    fn flags(&self) -> ExtendedFlags2 {
        match self {
            UadpNetworkMessageType::DataSetMessage => ExtendedFlags2::empty(),
            UadpNetworkMessageType::DiscoveryRequest => ExtendedFlags2::DISCOVERY_REQUEST,
            UadpNetworkMessageType::DiscoveryResponse => ExtendedFlags2::DISCOVERY_RESPONSE,
        }
    }

    fn from_flags(flags: u8) -> Option<Self> {
        match flags & NETWORK_MESSAGE_TYPE_MASK {
            0x00 => Some(UadpNetworkMessageType::DataSetMessage),
            0x04 => Some(UadpNetworkMessageType::DiscoveryRequest),
            0x08 => Some(UadpNetworkMessageType::DiscoveryResponse),
            _ => None,
        }
    }
}

/// How the fields of a DataSetMessage are encoded, bits 1-2 of DataSetFlags1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldEncoding {
    Variant,
    RawData,
    DataValue,
}

impl From<DataSetFieldContentMask> for FieldEncoding {
    fn from(mask: DataSetFieldContentMask) -> Self {
        if mask.contains(DataSetFieldContentMask::RAW_DATA) {
            FieldEncoding::RawData
        } else if mask.is_empty() {
            FieldEncoding::Variant
        } else {
            FieldEncoding::DataValue
        }
    }
}

/// DataSetMessage type held in the low nibble of DataSetFlags2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSetMessageType {
    KeyFrame = 0,
    DeltaFrame = 1,
    Event = 2,
    KeepAlive = 3,
}

impl DataSetMessageType {
    fn from_flags(flags: u8) -> Option<Self> {
        match flags & DATA_SET_MESSAGE_TYPE_MASK {
            0 => Some(DataSetMessageType::KeyFrame),
            1 => Some(DataSetMessageType::DeltaFrame),
            2 => Some(DataSetMessageType::Event),
            3 => Some(DataSetMessageType::KeepAlive),
            _ => None,
        }
    }
}

/// An element of the NetworkMessage header, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkMessageHeaderField {
    PublisherId,
    DataSetClassId,
    GroupFlags,
    WriterGroupId,
    GroupVersion,
    NetworkMessageNumber,
    SequenceNumber,
    PayloadHeader,
    Timestamp,
    PicoSeconds,
}

/// Returns the ordered NetworkMessage header fields present for the mask. The group fields only
/// appear when the group header does. Discovery messages never carry a payload header.
pub fn network_message_layout(
    mask: UadpNetworkMessageContentMask,
    message_type: UadpNetworkMessageType,
) -> Vec<NetworkMessageHeaderField> {
    use NetworkMessageHeaderField as F;
    use UadpNetworkMessageContentMask as M;

    let mut layout = Vec::with_capacity(10);
    if mask.contains(M::PUBLISHER_ID) {
        layout.push(F::PublisherId);
    }
    if mask.contains(M::DATA_SET_CLASS_ID) {
        layout.push(F::DataSetClassId);
    }
    if mask.contains(M::GROUP_HEADER) {
        layout.push(F::GroupFlags);
        for (bit, field) in [
            (M::WRITER_GROUP_ID, F::WriterGroupId),
            (M::GROUP_VERSION, F::GroupVersion),
            (M::NETWORK_MESSAGE_NUMBER, F::NetworkMessageNumber),
            (M::SEQUENCE_NUMBER, F::SequenceNumber),
        ] {
            if mask.contains(bit) {
                layout.push(field);
            }
        }
    }
    if mask.contains(M::PAYLOAD_HEADER) && message_type == UadpNetworkMessageType::DataSetMessage
    {
        layout.push(F::PayloadHeader);
    }
    if mask.contains(M::TIMESTAMP) {
        layout.push(F::Timestamp);
    }
    if mask.contains(M::PICO_SECONDS) {
        layout.push(F::PicoSeconds);
    }
    layout
}

/// An element of the DataSetMessage header after the flag bytes, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSetMessageHeaderField {
    SequenceNumber,
    Timestamp,
    PicoSeconds,
    Status,
    MajorVersion,
    MinorVersion,
}

pub fn data_set_message_layout(mask: UadpDataSetMessageContentMask) -> Vec<DataSetMessageHeaderField> {
    use DataSetMessageHeaderField as F;
    use UadpDataSetMessageContentMask as M;

    [
        (M::SEQUENCE_NUMBER, F::SequenceNumber),
        (M::TIMESTAMP, F::Timestamp),
        (M::PICO_SECONDS, F::PicoSeconds),
        (M::STATUS, F::Status),
        (M::MAJOR_VERSION, F::MajorVersion),
        (M::MINOR_VERSION, F::MinorVersion),
    ]
    .into_iter()
    .filter(|(bit, _)| mask.contains(*bit))
    .map(|(_, field)| field)
    .collect()
}

/// The three leading flag bytes of a NetworkMessage. ExtendedFlags2 is only written when it is
/// non-zero, ExtendedFlags1 only when it or ExtendedFlags2 is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkMessageFlags {
    pub uadp_flags: UadpFlags,
    pub extended_flags1: ExtendedFlags1,
    pub extended_flags2: ExtendedFlags2,
    pub publisher_id_type: u8,
}

impl NetworkMessageFlags {
    pub fn new(
        mask: UadpNetworkMessageContentMask,
        message_type: UadpNetworkMessageType,
        publisher_id_type: u8,
    ) -> Self {
        use UadpNetworkMessageContentMask as M;

        let mut uadp_flags = UadpFlags::empty();
        let mut extended_flags1 = ExtendedFlags1::empty();
        let extended_flags2 = message_type.flags();

        if mask.contains(M::PUBLISHER_ID) {
            uadp_flags |= UadpFlags::PUBLISHER_ID;
        }
        if mask.contains(M::GROUP_HEADER) {
            uadp_flags |= UadpFlags::GROUP_HEADER;
        }
        if mask.contains(M::PAYLOAD_HEADER) && message_type == UadpNetworkMessageType::DataSetMessage
        {
            uadp_flags |= UadpFlags::PAYLOAD_HEADER;
        }
        if mask.contains(M::DATA_SET_CLASS_ID) {
            extended_flags1 |= ExtendedFlags1::DATA_SET_CLASS_ID;
        }
        if mask.contains(M::TIMESTAMP) {
            extended_flags1 |= ExtendedFlags1::TIMESTAMP;
        }
        if mask.contains(M::PICO_SECONDS) {
            extended_flags1 |= ExtendedFlags1::PICO_SECONDS;
        }
        if !extended_flags2.is_empty() {
            extended_flags1 |= ExtendedFlags1::EXTENDED_FLAGS2;
        }
        // A non Byte publisher id type is only expressible through ExtendedFlags1
        if !extended_flags1.is_empty() || publisher_id_type != 0 {
            uadp_flags |= UadpFlags::EXTENDED_FLAGS1;
        }
        Self {
            uadp_flags,
            extended_flags1,
            extended_flags2,
            publisher_id_type: publisher_id_type & PUBLISHER_ID_TYPE_MASK,
        }
    }

    pub fn uadp_flags_byte(&self) -> u8 {
        self.uadp_flags.bits() | UADP_VERSION
    }

    pub fn extended_flags1_byte(&self) -> Option<u8> {
        if self.uadp_flags.contains(UadpFlags::EXTENDED_FLAGS1) {
            Some(self.extended_flags1.bits() | self.publisher_id_type)
        } else {
            None
        }
    }

    pub fn extended_flags2_byte(&self) -> Option<u8> {
        if self
            .extended_flags1
            .contains(ExtendedFlags1::EXTENDED_FLAGS2)
        {
            Some(self.extended_flags2.bits())
        } else {
            None
        }
    }

    /// Parses the flag bytes, `None` standing for a byte that is not present.
    pub fn from_bytes(
        uadp_flags: u8,
        extended_flags1: Option<u8>,
        extended_flags2: Option<u8>,
    ) -> Option<Self> {
        if uadp_flags & UADP_VERSION_MASK != UADP_VERSION {
            error!(
                "Unsupported UADP version {}",
                uadp_flags & UADP_VERSION_MASK
            );
            return None;
        }
        let ext1 = extended_flags1.unwrap_or(0);
        let ext2 = extended_flags2.unwrap_or(0);
        UadpNetworkMessageType::from_flags(ext2)?;
        Some(Self {
            uadp_flags: UadpFlags::from_bits_truncate(uadp_flags),
            extended_flags1: ExtendedFlags1::from_bits_truncate(ext1),
            extended_flags2: ExtendedFlags2::from_bits_truncate(ext2),
            publisher_id_type: ext1 & PUBLISHER_ID_TYPE_MASK,
        })
    }

    pub fn message_type(&self) -> UadpNetworkMessageType {
        UadpNetworkMessageType::from_flags(self.extended_flags2.bits())
            .unwrap_or(UadpNetworkMessageType::DataSetMessage)
    }

    pub fn is_secured(&self) -> bool {
        self.extended_flags1.contains(ExtendedFlags1::SECURITY)
    }

    pub fn is_chunk(&self) -> bool {
        self.extended_flags2.contains(ExtendedFlags2::CHUNK)
    }

    /// The content mask described by the flag bytes. Group fields are not known until the group
    /// flags byte is read, see [`content_mask_with_group_flags`].
    pub fn content_mask(&self) -> UadpNetworkMessageContentMask {
        use UadpNetworkMessageContentMask as M;

        let mut mask = M::empty();
        if self.uadp_flags.contains(UadpFlags::PUBLISHER_ID) {
            mask |= M::PUBLISHER_ID;
        }
        if self.uadp_flags.contains(UadpFlags::GROUP_HEADER) {
            mask |= M::GROUP_HEADER;
        }
        if self.uadp_flags.contains(UadpFlags::PAYLOAD_HEADER) {
            mask |= M::PAYLOAD_HEADER;
        }
        if self
            .extended_flags1
            .contains(ExtendedFlags1::DATA_SET_CLASS_ID)
        {
            mask |= M::DATA_SET_CLASS_ID;
        }
        if self.extended_flags1.contains(ExtendedFlags1::TIMESTAMP) {
            mask |= M::TIMESTAMP;
        }
        if self.extended_flags1.contains(ExtendedFlags1::PICO_SECONDS) {
            mask |= M::PICO_SECONDS;
        }
        mask
    }
}

/// Returns the group flags byte for the mask.
pub fn group_flags(mask: UadpNetworkMessageContentMask) -> GroupFlags {
    use UadpNetworkMessageContentMask as M;

    let mut flags = GroupFlags::empty();
    if mask.contains(M::WRITER_GROUP_ID) {
        flags |= GroupFlags::WRITER_GROUP_ID;
    }
    if mask.contains(M::GROUP_VERSION) {
        flags |= GroupFlags::GROUP_VERSION;
    }
    if mask.contains(M::NETWORK_MESSAGE_NUMBER) {
        flags |= GroupFlags::NETWORK_MESSAGE_NUMBER;
    }
    if mask.contains(M::SEQUENCE_NUMBER) {
        flags |= GroupFlags::SEQUENCE_NUMBER;
    }
    flags
}

/// Adds the group fields announced by a group flags byte to a content mask.
pub fn content_mask_with_group_flags(
    mask: UadpNetworkMessageContentMask,
    group_flags: u8,
) -> UadpNetworkMessageContentMask {
    use UadpNetworkMessageContentMask as M;

    let group_flags = GroupFlags::from_bits_truncate(group_flags);
    let mut mask = mask;
    if group_flags.contains(GroupFlags::WRITER_GROUP_ID) {
        mask |= M::WRITER_GROUP_ID;
    }
    if group_flags.contains(GroupFlags::GROUP_VERSION) {
        mask |= M::GROUP_VERSION;
    }
    if group_flags.contains(GroupFlags::NETWORK_MESSAGE_NUMBER) {
        mask |= M::NETWORK_MESSAGE_NUMBER;
    }
    if group_flags.contains(GroupFlags::SEQUENCE_NUMBER) {
        mask |= M::SEQUENCE_NUMBER;
    }
    mask
}

/// The flag bytes that start a DataSetMessage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataSetMessageFlags {
    pub flags1: DataSetFlags1,
    pub flags2: DataSetFlags2,
    pub message_type: DataSetMessageType,
}

impl DataSetMessageFlags {
    pub fn new(
        mask: UadpDataSetMessageContentMask,
        field_encoding: FieldEncoding,
        message_type: DataSetMessageType,
        is_valid: bool,
    ) -> Self {
        use UadpDataSetMessageContentMask as M;

        let mut flags1 = DataSetFlags1::empty();
        let mut flags2 = DataSetFlags2::empty();
        if is_valid {
            flags1 |= DataSetFlags1::MESSAGE_IS_VALID;
        }
        match field_encoding {
            FieldEncoding::Variant => {}
            FieldEncoding::RawData => flags1 |= DataSetFlags1::RAW_DATA,
            FieldEncoding::DataValue => flags1 |= DataSetFlags1::DATA_VALUE,
        }
        if mask.contains(M::SEQUENCE_NUMBER) {
            flags1 |= DataSetFlags1::SEQUENCE_NUMBER;
        }
        if mask.contains(M::STATUS) {
            flags1 |= DataSetFlags1::STATUS;
        }
        if mask.contains(M::MAJOR_VERSION) {
            flags1 |= DataSetFlags1::MAJOR_VERSION;
        }
        if mask.contains(M::MINOR_VERSION) {
            flags1 |= DataSetFlags1::MINOR_VERSION;
        }
        if mask.contains(M::TIMESTAMP) {
            flags2 |= DataSetFlags2::TIMESTAMP;
        }
        if mask.contains(M::PICO_SECONDS) {
            flags2 |= DataSetFlags2::PICO_SECONDS;
        }
        if !flags2.is_empty() || message_type != DataSetMessageType::KeyFrame {
            flags1 |= DataSetFlags1::DATA_SET_FLAGS2;
        }
        Self {
            flags1,
            flags2,
            message_type,
        }
    }

    pub fn flags1_byte(&self) -> u8 {
        self.flags1.bits()
    }

    pub fn flags2_byte(&self) -> Option<u8> {
        if self.flags1.contains(DataSetFlags1::DATA_SET_FLAGS2) {
            Some(self.flags2.bits() | self.message_type as u8)
        } else {
            None
        }
    }

    pub fn from_bytes(flags1: u8, flags2: Option<u8>) -> Option<Self> {
        let flags1 = DataSetFlags1::from_bits_truncate(flags1);
        if flags1.contains(DataSetFlags1::RAW_DATA | DataSetFlags1::DATA_VALUE) {
            error!("DataSetMessage field encoding bits are reserved value 11");
            return None;
        }
        let flags2_byte = flags2.unwrap_or(0);
        let message_type = DataSetMessageType::from_flags(flags2_byte)?;
        Some(Self {
            flags1,
            flags2: DataSetFlags2::from_bits_truncate(flags2_byte),
            message_type,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.flags1.contains(DataSetFlags1::MESSAGE_IS_VALID)
    }

    pub fn field_encoding(&self) -> FieldEncoding {
        if self.flags1.contains(DataSetFlags1::RAW_DATA) {
            FieldEncoding::RawData
        } else if self.flags1.contains(DataSetFlags1::DATA_VALUE) {
            FieldEncoding::DataValue
        } else {
            FieldEncoding::Variant
        }
    }

    pub fn content_mask(&self) -> UadpDataSetMessageContentMask {
        use UadpDataSetMessageContentMask as M;

        let mut mask = M::empty();
        if self.flags1.contains(DataSetFlags1::SEQUENCE_NUMBER) {
            mask |= M::SEQUENCE_NUMBER;
        }
        if self.flags1.contains(DataSetFlags1::STATUS) {
            mask |= M::STATUS;
        }
        if self.flags1.contains(DataSetFlags1::MAJOR_VERSION) {
            mask |= M::MAJOR_VERSION;
        }
        if self.flags1.contains(DataSetFlags1::MINOR_VERSION) {
            mask |= M::MINOR_VERSION;
        }
        if self.flags2.contains(DataSetFlags2::TIMESTAMP) {
            mask |= M::TIMESTAMP;
        }
        if self.flags2.contains(DataSetFlags2::PICO_SECONDS) {
            mask |= M::PICO_SECONDS;
        }
        mask
    }
}
