// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Timestamp parsing and formatting.
//!
//! The backend emits ISO-8601 timestamps with or without an offset; naive
//! values are taken as UTC. Submitted timestamps always use UTC with
//! millisecond precision and a `Z` suffix.

use crate::error::ValueError;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse an ISO-8601 timestamp, with or without offset.
///
/// Also accepts the `YYYY-MM-DDTHH:MM` shape produced by
/// `datetime-local` inputs.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, ValueError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ValueError::Timestamp(s.to_string()))
}

/// Wire form: `2024-03-05T14:30:00.000Z`.
pub fn to_wire(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Value for a `datetime-local` input.
pub fn to_input_value(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M").to_string()
}

/// `05/03/2024`
pub fn format_date(dt: &DateTime<Utc>) -> String {
    dt.format("%d/%m/%Y").to_string()
}

/// `05/03/2024 14:30`
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%d/%m/%Y %H:%M").to_string()
}

/// Serde adapter for required timestamps.
pub mod iso {
    use super::*;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_wire(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for optional timestamps; use with `#[serde(default)]`.
pub mod iso_opt {
    use super::*;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        dt: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match dt {
            Some(dt) => serializer.serialize_some(&to_wire(dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) if !raw.trim().is_empty() => parse_timestamp(&raw)
                .map(Some)
                .map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_variants() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-05T14:30:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-05T11:30:00-03:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-05T14:30:00.000").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-05T14:30").unwrap(), expected);
        assert!(parse_timestamp("05/03/2024").is_err());
    }

    #[test]
    fn test_wire_and_display_formats() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap();
        assert_eq!(to_wire(&dt), "2024-03-05T14:30:00.000Z");
        assert_eq!(to_input_value(&dt), "2024-03-05T14:30");
        assert_eq!(format_date(&dt), "05/03/2024");
        assert_eq!(format_datetime(&dt), "05/03/2024 14:30");
    }
}
