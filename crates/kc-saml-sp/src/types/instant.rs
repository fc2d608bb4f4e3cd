//! xs:dateTime parsing.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Parses an `xs:dateTime` value as used in SAML timestamps.
///
/// Accepts RFC 3339 (`2024-01-01T00:00:00Z`, offsets, fractional seconds)
/// and zone-less values, which are taken to be UTC.
#[must_use]
pub fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Some(instant.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_utc() {
        assert_eq!(
            parse_instant("2024-03-01T12:30:00Z"),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap())
        );
    }

    #[test]
    fn parses_offsets_and_fractions() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap();
        assert_eq!(parse_instant("2024-03-01T12:30:00+02:00"), Some(expected));
        assert_eq!(
            parse_instant("2024-03-01T10:30:00.000Z"),
            Some(expected)
        );
    }

    #[test]
    fn zoneless_is_utc() {
        assert_eq!(
            parse_instant("2024-03-01T12:30:00"),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap())
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_instant("yesterday"), None);
        assert_eq!(parse_instant(""), None);
        assert_eq!(parse_instant("2024-13-01T00:00:00Z"), None);
    }
}
