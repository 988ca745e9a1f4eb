//! Timestamp renderers and numeric rounding shared by the event generators.
//!
//! Every function here is pure: the caller supplies the instant, so the same
//! input always renders the same text.

use chrono::{DateTime, SecondsFormat, Utc};

/// Render a timestamp the way Apache and syslog lines print it,
/// e.g. `10/Oct/2024:13:55:36 +0000`.
pub fn format_apache_timestamp(time: &DateTime<Utc>) -> String {
    time.format("%d/%b/%Y:%H:%M:%S %z").to_string()
}

/// Render a timestamp in Splunk's display format, e.g. `2024-10-10 13:55:36.123`.
pub fn format_splunk_timestamp(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/// ISO-8601 with millisecond precision and a `Z` suffix, the form used for
/// `_time` and for the `timestamp` keys inside structured payloads.
pub fn format_iso8601(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Seconds since the Unix epoch with millisecond resolution, as HEC expects.
pub fn epoch_seconds(time: &DateTime<Utc>) -> f64 {
    time.timestamp_millis() as f64 / 1000.0
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Serde adapter rendering `DateTime<Utc>` through [`format_iso8601`].
pub mod iso8601 {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_iso8601(time))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&text)
            .map(|time| time.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
