//! Timestamp parsing for request payloads and query strings.

use chrono::{DateTime, Utc};

use crate::error::ValidationError;

/// Parse an RFC 3339 timestamp and normalize it to UTC.
pub fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>, ValidationError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ValidationError::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}
