// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, TimeZone};

use super::ConvertError;

/// Accepted layouts, most specific first. Month, day and time fields may omit leading zeros.
const TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f", // 2011-05-06 07:08:09.123456789
    "%Y-%m-%d %H:%M:%S",    // 2011-5-6 7:8:9
    "%Y-%m-%d %H:%M",       // 2011-5-6 7:8
];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses a timestamp without time zone, interpreting it in `zone`.
///
/// Returns milliseconds since the unix epoch. Sub-millisecond digits are truncated.
pub fn parse_timestamp(value: &str, zone: &FixedOffset) -> Result<i64, ConvertError> {
    let value = value.trim();
    let naive = TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, DATE_FORMAT)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| ConvertError::ParseTimestamp(value.into()))?;
    let local = zone
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| ConvertError::ParseTimestamp(value.into()))?;
    Ok(local.timestamp_millis())
}
