//! Time utility functions

use chrono::DateTime;

/// Parse a provider timestamp into seconds since Unix epoch.
///
/// Accepts RFC 3339, ISO 8601 with compact offsets (Facebook sends
/// `2024-01-15T10:30:00+0000`), and plain numeric epoch values in
/// seconds or milliseconds.
pub fn parse_flexible_timestamp(ts: &str) -> Option<i64> {
    let ts = ts.trim();
    if ts.is_empty() {
        return None;
    }

    if let Ok(n) = ts.parse::<i64>() {
        // Millisecond epochs are 13+ digits for any modern date
        return Some(if n.abs() >= 1_000_000_000_000 {
            n / 1000
        } else {
            n
        });
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.timestamp());
    }

    DateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%z")
        .map(|dt| dt.timestamp())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flexible_rfc3339() {
        assert_eq!(
            parse_flexible_timestamp("2024-01-01T00:00:00Z"),
            Some(1704067200)
        );
    }

    #[test]
    fn test_parse_flexible_compact_offset() {
        // Facebook created_time format
        assert_eq!(
            parse_flexible_timestamp("2024-01-01T00:00:00+0000"),
            Some(1704067200)
        );
        assert_eq!(
            parse_flexible_timestamp("2024-01-01T05:00:00+0500"),
            Some(1704067200)
        );
    }

    #[test]
    fn test_parse_flexible_numeric_seconds() {
        assert_eq!(parse_flexible_timestamp("1704067200"), Some(1704067200));
    }

    #[test]
    fn test_parse_flexible_numeric_millis() {
        assert_eq!(parse_flexible_timestamp("1704067200000"), Some(1704067200));
    }

    #[test]
    fn test_parse_flexible_invalid() {
        assert_eq!(parse_flexible_timestamp(""), None);
        assert_eq!(parse_flexible_timestamp("not-a-timestamp"), None);
    }
}
