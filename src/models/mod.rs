pub mod car;
pub mod service_record;
pub mod user;

pub use car::*;
pub use service_record::*;
pub use user::*;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use mongodb::bson::DateTime as BsonDateTime;

/// Wire format for every timestamp in API responses.
pub fn to_rfc3339(dt: BsonDateTime) -> String {
    DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis())
        .map(|d| d.to_rfc3339())
        .unwrap_or_default()
}

/// Accepts full RFC 3339 timestamps and plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date(input: &str) -> Option<BsonDateTime> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(BsonDateTime::from_millis(dt.timestamp_millis()));
    }

    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(BsonDateTime::from_millis(
        Utc.from_utc_datetime(&midnight).timestamp_millis(),
    ))
}

/// Lenient field decoding for JSON bodies and multipart forms, where numbers
/// often arrive as strings and cleared inputs arrive as `""`.
pub mod flexible {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        Text(String),
    }

    pub fn option_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<NumberOrString>::deserialize(deserializer)? {
            None => Ok(None),
            Some(NumberOrString::Number(n)) => Ok(Some(n)),
            Some(NumberOrString::Text(s)) if s.trim().is_empty() => Ok(None),
            Some(NumberOrString::Text(s)) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("'{}' is not a number", s))),
        }
    }

    pub fn option_i32<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match option_f64(deserializer)? {
            None => Ok(None),
            Some(n) if n.fract() == 0.0 && n >= i32::MIN as f64 && n <= i32::MAX as f64 => {
                Ok(Some(n as i32))
            }
            Some(n) => Err(D::Error::custom(format!("'{}' is not a whole number", n))),
        }
    }

    /// Like [`option_string`] but keeps the value byte-for-byte. Used for
    /// gateway ids and signatures, which must match exactly what was signed.
    pub fn option_exact_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.is_empty()))
    }

    pub fn option_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<String>::deserialize(deserializer)?
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()))
    }
}
