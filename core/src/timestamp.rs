//! ISO-8601 timestamps as they appear on the wire.
//!
//! A `Timestamp` keeps the exact text it was parsed from (so records are
//! written back byte-for-byte) alongside the UTC instant used for ordering
//! and window arithmetic. Timestamps without an offset are read as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, ParseError, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

#[derive(Debug, Clone)]
pub struct Timestamp {
    raw: String,
    instant: DateTime<Utc>,
}

impl Timestamp {
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let trimmed = raw.trim();
        let instant = match DateTime::parse_from_rfc3339(trimmed) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(rfc_err) => parse_naive(trimmed).ok_or(rfc_err)?,
        };
        Ok(Self { raw: raw.to_string(), instant })
    }

    /// Build from a UTC instant, rendering naive ISO-8601 seconds.
    pub fn from_instant(instant: DateTime<Utc>) -> Self {
        Self {
            raw: instant.naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string(),
            instant,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }

    /// Absolute distance to `other` in whole seconds.
    pub fn seconds_between(&self, other: &Timestamp) -> i64 {
        (self.instant - other.instant).num_seconds().abs()
    }
}

fn parse_naive(text: &str) -> Option<DateTime<Utc>> {
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.instant == other.instant
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.instant.cmp(&other.instant)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Timestamp::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naive_and_fractional_forms_parse() {
        let a = Timestamp::parse("2024-03-01T10:00:00").unwrap();
        let b = Timestamp::parse("2024-03-01T10:00:00.250000").unwrap();
        assert_eq!(a.seconds_between(&b), 0);
        assert!(a < b);
        assert_eq!(b.as_str(), "2024-03-01T10:00:00.250000");
    }

    #[test]
    fn offset_forms_normalise_to_utc() {
        let utc = Timestamp::parse("2024-03-01T10:00:00Z").unwrap();
        let shifted = Timestamp::parse("2024-03-01T12:00:00+02:00").unwrap();
        assert_eq!(utc, shifted);
        assert_eq!(shifted.as_str(), "2024-03-01T12:00:00+02:00");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(Timestamp::parse("yesterday at noon").is_err());
        assert!(Timestamp::parse("").is_err());
    }

    #[test]
    fn serializes_as_raw_text() {
        let ts = Timestamp::parse("2024-03-01 10:00:00").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2024-03-01 10:00:00\"");
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }
}
