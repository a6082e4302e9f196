//! # PaginationCursor
//!
//! Continuation tokens are base64 of the store's resume key in JSON form.
//! They come back from clients, so decoding never trusts them.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use domains::{DomainError, DomainResult, ScanKey};
use tracing::warn;

pub struct PaginationCursor;

impl PaginationCursor {
    pub fn encode(key: &ScanKey) -> String {
        let json = serde_json::json!({ "tile_hash": key.tile_hash });
        STANDARD.encode(json.to_string())
    }

    pub fn decode(token: &str) -> DomainResult<ScanKey> {
        // Query-string decoding turns '+' into ' '.
        let token = token.trim().replace(' ', "+");
        let bytes = STANDARD
            .decode(&token)
            .or_else(|_| URL_SAFE.decode(&token))
            .map_err(|e| DomainError::InvalidCursor(e.to_string()))?;
        let key: ScanKey =
            serde_json::from_slice(&bytes).map_err(|e| DomainError::InvalidCursor(e.to_string()))?;
        if key.tile_hash.is_empty() {
            return Err(DomainError::InvalidCursor("empty resume key".into()));
        }
        Ok(key)
    }

    /// Decodes an optional token, degrading to "start from the beginning"
    /// on failure. The second value carries the warning to show operators.
    pub fn decode_or_restart(token: Option<&str>) -> (Option<ScanKey>, Option<String>) {
        let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
            return (None, None);
        };
        match Self::decode(token) {
            Ok(key) => (Some(key), None),
            Err(err) => {
                warn!(error = %err, "ignoring pagination token");
                (None, Some(format!("Invalid pagination token ignored: {err}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> ScanKey {
        ScanKey {
            tile_hash: raw.to_string(),
        }
    }

    #[test]
    fn round_trips_resume_keys() {
        for raw in ["abc", "d41d8cd98f00b204e9800998ecf8427e", "tile/with\"quote"] {
            let token = PaginationCursor::encode(&key(raw));
            assert_eq!(PaginationCursor::decode(&token).unwrap(), key(raw));
        }
    }

    #[test]
    fn accepts_tokens_from_the_previous_producer() {
        // json.dumps puts a space after the colon.
        let token = STANDARD.encode(r#"{"tile_hash": "abc"}"#);
        assert_eq!(PaginationCursor::decode(&token).unwrap(), key("abc"));
    }

    #[test]
    fn tolerates_plus_mangled_into_space() {
        let token = STANDARD.encode(r#"{"tile_hash":"~~~>>>"}"#);
        assert!(token.contains('+'));
        let mangled = token.replace('+', " ");
        assert_eq!(PaginationCursor::decode(&mangled).unwrap(), key("~~~>>>"));
    }

    #[test]
    fn malformed_tokens_degrade_to_no_cursor() {
        assert!(matches!(
            PaginationCursor::decode("not-base64"),
            Err(DomainError::InvalidCursor(_))
        ));

        let (cursor, warning) = PaginationCursor::decode_or_restart(Some("not-base64"));
        assert_eq!(cursor, None);
        assert!(warning.is_some());

        let not_a_key = STANDARD.encode(r#"{"other":1}"#);
        let (cursor, warning) = PaginationCursor::decode_or_restart(Some(&not_a_key));
        assert_eq!(cursor, None);
        assert!(warning.is_some());
    }

    #[test]
    fn absent_or_blank_token_is_silent() {
        assert_eq!(PaginationCursor::decode_or_restart(None), (None, None));
        assert_eq!(PaginationCursor::decode_or_restart(Some("  ")), (None, None));
    }
}
