use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::storage::models::RawTimestamp;

/// Largest distance from the epoch, in milliseconds, that a browser `Date` accepts.
pub const MAX_EPOCH_MILLIS: i64 = 8_640_000_000_000_000;

const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

/// Thời điểm đã chuẩn hoá của một tin nhắn phía client.
///
/// `Invalid` is the sentinel for a source value that could not be read as an
/// instant. It serializes as `null`, the same way an invalid `Date` does in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientTimestamp {
    Valid(DateTime<Utc>),
    Invalid,
}

impl ClientTimestamp {
    pub fn parse(raw: &RawTimestamp) -> Self {
        let parsed = match raw {
            RawTimestamp::EpochMillis(millis) => from_epoch_millis(*millis),
            RawTimestamp::Text(text) => parse_text(text),
            RawTimestamp::Unrepresentable(_) => None,
        };

        match parsed {
            Some(instant) => ClientTimestamp::Valid(instant),
            None => {
                log::debug!("Unparseable message timestamp {raw}");
                ClientTimestamp::Invalid
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ClientTimestamp::Valid(_))
    }

    pub fn as_datetime(&self) -> Option<&DateTime<Utc>> {
        match self {
            ClientTimestamp::Valid(instant) => Some(instant),
            ClientTimestamp::Invalid => None,
        }
    }

    pub fn timestamp_millis(&self) -> Option<i64> {
        self.as_datetime().map(DateTime::timestamp_millis)
    }
}

impl From<DateTime<Utc>> for ClientTimestamp {
    fn from(instant: DateTime<Utc>) -> Self {
        ClientTimestamp::Valid(instant)
    }
}

impl fmt::Display for ClientTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientTimestamp::Valid(instant) => {
                f.write_str(&instant.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            ClientTimestamp::Invalid => f.write_str("Invalid Date"),
        }
    }
}

impl Serialize for ClientTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ClientTimestamp::Valid(instant) => serializer
                .serialize_str(&instant.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ClientTimestamp::Invalid => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for ClientTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<RawTimestamp>::deserialize(deserializer)?;
        Ok(raw
            .map(|raw| ClientTimestamp::parse(&raw))
            .unwrap_or(ClientTimestamp::Invalid))
    }
}

fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    if !(-MAX_EPOCH_MILLIS..=MAX_EPOCH_MILLIS).contains(&millis) {
        return None;
    }
    DateTime::from_timestamp_millis(millis)
}

fn parse_text(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Some(instant.with_timezone(&Utc));
    }
    if let Ok(instant) = DateTime::parse_from_rfc2822(text) {
        return Some(instant.with_timezone(&Utc));
    }

    // Postgres text output: "2024-01-01 10:00:00.123+00"
    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(instant) = DateTime::parse_from_str(text, format) {
            return Some(instant.with_timezone(&Utc));
        }
    }

    // No offset given: read as UTC.
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn text(value: &str) -> ClientTimestamp {
        ClientTimestamp::parse(&RawTimestamp::Text(value.to_string()))
    }

    #[test]
    fn epoch_values_are_milliseconds() {
        let ts = ClientTimestamp::parse(&RawTimestamp::EpochMillis(1000));
        assert_eq!(ts.as_datetime(), Some(&Utc.timestamp_opt(1, 0).unwrap()));
        assert_eq!(ts.timestamp_millis(), Some(1000));
    }

    #[test]
    fn epoch_out_of_range_is_invalid() {
        let ts = ClientTimestamp::parse(&RawTimestamp::EpochMillis(MAX_EPOCH_MILLIS + 1));
        assert_eq!(ts, ClientTimestamp::Invalid);
        let ts = ClientTimestamp::parse(&RawTimestamp::EpochMillis(i64::MIN));
        assert!(!ts.is_valid());
    }

    #[test]
    fn parses_common_text_forms() {
        let midnight = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(text("2024-01-01T00:00:00Z").as_datetime(), Some(&midnight));
        assert_eq!(text("2024-01-01T02:00:00+02:00").as_datetime(), Some(&midnight));
        assert_eq!(text("2024-01-01").as_datetime(), Some(&midnight));
        assert_eq!(text("2024-01-01 00:00:00").as_datetime(), Some(&midnight));
        assert_eq!(text("2024-01-01T00:00:00.000").as_datetime(), Some(&midnight));
        assert_eq!(text("2024-01-01 00:00:00+00").as_datetime(), Some(&midnight));
        assert_eq!(text("Mon, 01 Jan 2024 00:00:00 GMT").as_datetime(), Some(&midnight));
        assert_eq!(text("  2024-01-01T00:00:00Z  ").as_datetime(), Some(&midnight));
    }

    #[test]
    fn garbage_text_is_invalid() {
        assert_eq!(text("not-a-date"), ClientTimestamp::Invalid);
        assert_eq!(text(""), ClientTimestamp::Invalid);
        assert_eq!(text("2024-13-40"), ClientTimestamp::Invalid);
    }

    #[test]
    fn json_shape_matches_browser_dates() {
        let valid = ClientTimestamp::from(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(
            serde_json::to_string(&valid).unwrap(),
            "\"2024-01-01T00:00:00.000Z\""
        );
        assert_eq!(
            serde_json::to_string(&ClientTimestamp::Invalid).unwrap(),
            "null"
        );

        let back: ClientTimestamp = serde_json::from_str("null").unwrap();
        assert_eq!(back, ClientTimestamp::Invalid);
        let back: ClientTimestamp = serde_json::from_str("\"2024-01-01T00:00:00.000Z\"").unwrap();
        assert_eq!(back, valid);
        let back: ClientTimestamp = serde_json::from_str("1704067200000").unwrap();
        assert_eq!(back, valid);
    }
}
