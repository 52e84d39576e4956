//! Wire format for capture timestamps: RFC 3339 with millisecond precision and
//! the host's UTC offset, e.g. `2024-05-01T12:00:00.123+09:00`.
//!
//! Usable as a serde `with` module.

use jiff::Timestamp;
use jiff::fmt::temporal::DateTimePrinter;
use jiff::tz::TimeZone;
use serde::{Deserialize, Deserializer, Serializer};

pub fn format(timestamp: &Timestamp) -> String {
    let offset = TimeZone::system().to_offset(*timestamp);
    DateTimePrinter::new()
        .precision(Some(3))
        .timestamp_with_offset_to_string(timestamp, offset)
}

pub fn parse(text: &str) -> Result<Timestamp, jiff::Error> {
    text.parse()
}

pub fn serialize<S>(timestamp: &Timestamp, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(timestamp))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Timestamp, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse(&text).map_err(serde::de::Error::custom)
}
