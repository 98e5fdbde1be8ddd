// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `DateTime`.

use std::{
    fmt,
    io::{Read, Write},
    str::FromStr,
};

use chrono::{TimeZone, Utc};

use crate::types::encoding::*;

const NANOS_PER_TICK: i64 = 100;
const TICKS_PER_SECOND: i64 = 1_000_000_000 / NANOS_PER_TICK;
/// Seconds between the OPC UA epoch (1601-01-01) and the unix epoch
const SECONDS_TO_UNIX_EPOCH: i64 = 11_644_473_600;

pub type DateTimeUtc = chrono::DateTime<Utc>;

/// A date/time value held as OPC UA ticks, i.e. 100 nanosecond intervals since
/// Jan 1 1601 00:00:00 UTC. Holding the ticks means a decoded value compares equal to the
/// value that was encoded.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DateTime {
    ticks: i64,
}

impl BinaryEncoder<DateTime> for DateTime {
    fn byte_len(&self) -> usize {
        8
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        write_i64(stream, self.ticks)
    }

    fn decode<S: Read>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(DateTime::from(read_i64(stream)?))
    }
}

impl From<i64> for DateTime {
    fn from(ticks: i64) -> Self {
        // Negative ticks are invalid and treated as null
        DateTime {
            ticks: ticks.max(0),
        }
    }
}

impl From<DateTime> for i64 {
    fn from(value: DateTime) -> Self {
        value.ticks
    }
}

impl From<DateTimeUtc> for DateTime {
    fn from(date_time: DateTimeUtc) -> Self {
        let seconds = date_time.timestamp() + SECONDS_TO_UNIX_EPOCH;
        let ticks = seconds
            .saturating_mul(TICKS_PER_SECOND)
            .saturating_add(date_time.timestamp_subsec_nanos() as i64 / NANOS_PER_TICK);
        DateTime::from(ticks)
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.as_chrono() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "ticks({})", self.ticks),
        }
    }
}

impl FromStr for DateTime {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DateTimeUtc::from_str(s).map(DateTime::from).map_err(|e| {
            error!("Cannot parse date {}, error = {}", s, e);
        })
    }
}

impl DateTime {
    /// Constructs from the current time
    pub fn now() -> DateTime {
        DateTime::from(Utc::now())
    }

    /// Creates a null date time (i.e. the epoch)
    pub fn null() -> DateTime {
        DateTime { ticks: 0 }
    }

    pub fn is_null(&self) -> bool {
        self.ticks == 0
    }

    /// Returns the time in ticks, of 100 nanosecond intervals
    pub fn ticks(&self) -> i64 {
        self.ticks
    }

    /// Converts to a chrono date time if the value is representable
    pub fn as_chrono(&self) -> Option<DateTimeUtc> {
        let seconds = self.ticks / TICKS_PER_SECOND - SECONDS_TO_UNIX_EPOCH;
        let nanos = (self.ticks % TICKS_PER_SECOND) * NANOS_PER_TICK;
        Utc.timestamp_opt(seconds, nanos as u32).single()
    }
}

#[test]
fn date_time_unix_epoch() {
    let unix_epoch = Utc.timestamp_opt(0, 0).single().unwrap();
    let dt = DateTime::from(unix_epoch);
    assert_eq!(dt.ticks(), SECONDS_TO_UNIX_EPOCH * TICKS_PER_SECOND);
    assert_eq!(dt.as_chrono().unwrap(), unix_epoch);
    assert!(DateTime::null().is_null());
    assert!(!DateTime::now().is_null());
}
