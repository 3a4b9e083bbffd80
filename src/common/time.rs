//! Hong Kong Time helpers.
//!
//! Every timestamp the archiver reads or writes carries an explicit `+08:00`
//! offset at whole-second precision. The system-local zone is never consulted.

use crate::common::constants::HKT_OFFSET_SECS;
use chrono::{DateTime, FixedOffset, SecondsFormat, Timelike, Utc};

pub type HktDateTime = DateTime<FixedOffset>;

/// The fixed UTC+8 offset.
pub fn hkt() -> FixedOffset {
    FixedOffset::east_opt(HKT_OFFSET_SECS).expect("UTC+8 is within the FixedOffset range")
}

/// Converts any UTC instant into HKT, dropping sub-second precision.
pub fn to_hkt(instant: DateTime<Utc>) -> HktDateTime {
    truncate_to_second(instant.with_timezone(&hkt()))
}

pub fn truncate_to_second(t: HktDateTime) -> HktDateTime {
    t.with_nanosecond(0).unwrap_or(t)
}

/// ISO-8601 with an explicit offset, e.g. `2024-01-01T12:05:00+08:00`.
pub fn format_timestamp(t: &HktDateTime) -> String {
    t.with_timezone(&hkt())
        .to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Parses an RFC 3339 timestamp with any offset and normalizes it to HKT.
pub fn parse_timestamp(s: &str) -> Result<HktDateTime, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|t| truncate_to_second(t.with_timezone(&hkt())))
}

/// Serde adapter so stored timestamps always use [`format_timestamp`].
pub mod serde_hkt {
    use super::{format_timestamp, parse_timestamp, HktDateTime};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(t: &HktDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_timestamp(t))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<HktDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}
