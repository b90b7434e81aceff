//! Datetime conventions shared by the wire format and the store.
//!
//! Timestamps are kept as RFC 3339 text with millisecond precision in UTC
//! ("2025-06-30T12:00:00.000Z"). The format is fixed-width, so lexicographic
//! order of stored values is chronological order — `ORDER BY` and range
//! predicates on the TEXT columns just work.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer};
use tracing::warn;

/// Canonical stored/wire form of a timestamp.
pub fn format_stored(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a timestamp we wrote ourselves. Rows are only ever written through
/// [`format_stored`], so a parse failure means the file was edited by hand;
/// substitute the epoch rather than failing the whole read.
pub fn parse_stored(text: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(text) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(_) => {
            warn!(value = %text, "unparseable stored timestamp, substituting epoch");
            DateTime::<Utc>::UNIX_EPOCH
        }
    }
}

/// Serde module for timestamp fields: serializes through [`format_stored`],
/// accepts RFC 3339 text or integer epoch milliseconds on the way in.
pub mod rfc3339_millis {
    use super::*;
    use serde::Serializer;

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_stored(dt))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = super::RawDateTime::deserialize(deserializer)?;
        raw.resolve().map_err(serde::de::Error::custom)
    }
}

/// Lenient deserializer for optional timestamp payload fields: absent or
/// `null` means "not supplied", otherwise RFC 3339 text or epoch millis.
pub fn lenient_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawDateTime>::deserialize(deserializer)? {
        Some(raw) => raw.resolve().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDateTime {
    Text(String),
    Millis(i64),
}

impl RawDateTime {
    fn resolve(self) -> Result<DateTime<Utc>, String> {
        match self {
            RawDateTime::Text(s) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| format!("invalid datetime: {s}")),
            RawDateTime::Millis(ms) => DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| format!("datetime out of range: {ms}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "lenient_opt")]
        when: Option<DateTime<Utc>>,
    }

    #[test]
    fn stored_format_is_millis_utc_z() {
        let dt = DateTime::parse_from_rfc3339("2025-06-30T14:30:00+02:00")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_stored(&dt), "2025-06-30T12:30:00.000Z");
    }

    #[test]
    fn stored_format_round_trips_lexicographically() {
        let early = format_stored(&DateTime::from_timestamp_millis(1_000).unwrap());
        let late = format_stored(&DateTime::from_timestamp_millis(2_000).unwrap());
        assert!(early < late);
        assert_eq!(parse_stored(&early).timestamp_millis(), 1_000);
    }

    #[test]
    fn garbage_stored_value_falls_back_to_epoch() {
        assert_eq!(parse_stored("not a date").timestamp(), 0);
    }

    #[test]
    fn lenient_accepts_text_and_millis() {
        let h: Holder = serde_json::from_str(r#"{"when": "2025-01-01T00:00:00Z"}"#).unwrap();
        assert_eq!(h.when.unwrap().timestamp(), 1_735_689_600);

        let h: Holder = serde_json::from_str(r#"{"when": 1735689600000}"#).unwrap();
        assert_eq!(h.when.unwrap().timestamp(), 1_735_689_600);

        let h: Holder = serde_json::from_str(r#"{"when": null}"#).unwrap();
        assert!(h.when.is_none());

        let h: Holder = serde_json::from_str("{}").unwrap();
        assert!(h.when.is_none());
    }

    #[test]
    fn lenient_rejects_garbage_text() {
        assert!(serde_json::from_str::<Holder>(r#"{"when": "tomorrow"}"#).is_err());
    }
}
