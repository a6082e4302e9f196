//! # Domain Models
//!
//! A flag is keyed by the content hash of the tile it targets. Timestamps are
//! kept in the textual form the store holds them in, since records written
//! by older producers are not guaranteed to parse.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};

/// Flags expire this long after creation unless configured otherwise.
pub const DEFAULT_FLAG_TTL_DAYS: i64 = 30;

/// Stable content identifier of a tile; primary key of the flag table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileHash(String);

impl TileHash {
    pub const MAX_LEN: usize = 256;

    /// Validates caller-supplied input. Surrounding whitespace is trimmed.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::Validation("tile hash must not be empty".into()));
        }
        if trimmed.len() > Self::MAX_LEN {
            return Err(DomainError::Validation(format!(
                "tile hash exceeds {} characters",
                Self::MAX_LEN
            )));
        }
        if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(DomainError::Validation(
                "tile hash must not contain whitespace or control characters".into(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TileHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for TileHash {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Moderation state of a flag. Only `flagged` exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagStatus {
    #[default]
    Flagged,
}

impl FlagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flagged => "flagged",
        }
    }
}

impl fmt::Display for FlagStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlagStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flagged" => Ok(Self::Flagged),
            other => Err(DomainError::Validation(format!("unknown flag status '{other}'"))),
        }
    }
}

/// One flag per tile. `flagged_at` and `flagged_by_ip` never change after
/// creation; the store purges the record some time after `ttl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagRecord {
    pub tile_hash: TileHash,
    /// Location hint for the tile asset. May be empty.
    #[serde(default)]
    pub tile_path: String,
    #[serde(default)]
    pub flag_status: FlagStatus,
    /// ISO-8601 UTC, as stored.
    #[serde(default)]
    pub flagged_at: Option<String>,
    #[serde(default)]
    pub flagged_by_ip: String,
    /// Absolute expiry, unix seconds.
    #[serde(default)]
    pub ttl: Option<i64>,
}

impl FlagRecord {
    /// Builds a fresh record stamped at `now` and expiring after `ttl`.
    pub fn new(
        tile_hash: TileHash,
        tile_path: impl Into<String>,
        client_ip: impl Into<String>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            tile_hash,
            tile_path: tile_path.into(),
            flag_status: FlagStatus::Flagged,
            flagged_at: Some(format_timestamp(now)),
            flagged_by_ip: client_ip.into(),
            ttl: Some((now + ttl).timestamp()),
        }
    }

    /// `None` when the timestamp is missing or unparseable.
    pub fn flagged_at_utc(&self) -> Option<DateTime<Utc>> {
        self.flagged_at.as_deref().and_then(parse_timestamp)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.ttl.is_some_and(|ttl| ttl <= now.timestamp())
    }
}

/// Renders a timestamp the way flag records store it: RFC 3339 with `Z`.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Accepts RFC 3339 and zone-less ISO-8601, the latter read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// A fixed rate-limit window for one client, keyed by `(client_ip, window_start)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateWindow {
    pub client_ip: String,
    /// Unix seconds, aligned to the window length.
    pub window_start: i64,
}

impl RateWindow {
    /// The window containing `now`: `floor(now / window_secs) * window_secs`.
    pub fn containing(client_ip: &str, now: DateTime<Utc>, window_secs: u64) -> Self {
        let secs = window_secs.max(1) as i64;
        let window_start = now.timestamp().div_euclid(secs) * secs;
        Self {
            client_ip: client_ip.to_string(),
            window_start,
        }
    }

    /// Single-attribute key used by stores without composite keys.
    pub fn storage_key(&self) -> String {
        format!("{}:{}", self.client_ip, self.window_start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn tile_hash_trims_and_rejects_blank_input() {
        assert_eq!(TileHash::parse("  abc123 ").unwrap().as_str(), "abc123");
        assert!(matches!(TileHash::parse("   "), Err(DomainError::Validation(_))));
        assert!(matches!(TileHash::parse("ab c"), Err(DomainError::Validation(_))));
        assert!(TileHash::parse(&"a".repeat(TileHash::MAX_LEN + 1)).is_err());
    }

    #[test]
    fn new_record_sets_timestamp_and_expiry() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let record = FlagRecord::new(
            TileHash::parse("abc").unwrap(),
            "/tiles/x.png",
            "1.2.3.4",
            now,
            Duration::days(DEFAULT_FLAG_TTL_DAYS),
        );

        assert_eq!(record.flag_status, FlagStatus::Flagged);
        assert_eq!(record.flagged_at.as_deref(), Some("2026-10-19T12:00:00.000000Z"));
        assert_eq!(record.flagged_at_utc(), Some(now));
        assert_eq!(record.ttl, Some(now.timestamp() + 30 * 24 * 3600));
        assert!(!record.is_expired(now));
        assert!(record.is_expired(now + Duration::days(31)));
    }

    #[test]
    fn parses_zone_less_timestamps_as_utc() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01T08:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T08:30:00.000000"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T08:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T10:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn rate_window_aligns_to_minute() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 34, 56).unwrap();
        let window = RateWindow::containing("1.2.3.4", now, 60);
        assert_eq!(window.window_start % 60, 0);
        assert_eq!(now.timestamp() - window.window_start, 56);
        assert_eq!(window.storage_key(), format!("1.2.3.4:{}", window.window_start));
    }

    #[test]
    fn flag_status_serializes_lowercase() {
        let json = serde_json::to_string(&FlagStatus::Flagged).unwrap();
        assert_eq!(json, "\"flagged\"");
        assert!("revoked".parse::<FlagStatus>().is_err());
    }
}
