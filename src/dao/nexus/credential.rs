use std::fmt;

use serde::Deserialize;
use serde_json::Value;
use time::{Duration, OffsetDateTime};

use super::error::{NexusDaoError, NexusResult};

/// Credentials are refreshed this long before they actually expire.
pub const REFRESH_MARGIN: Duration = Duration::seconds(300);

/// Short-lived id token plus the refresh token it can be renewed with.
#[derive(Clone)]
pub struct Credential {
    /// Token attached to database reads.
    pub id_token: String,
    /// Long-lived token exchanged for new id tokens.
    pub refresh_token: String,
    /// When `id_token` stops being accepted.
    pub expires_at: OffsetDateTime,
}

impl Credential {
    /// Build a credential issued now that expires after `expires_in` seconds.
    pub fn issued_now(id_token: String, refresh_token: String, expires_in: &Value) -> NexusResult<Self> {
        let seconds = match expires_in {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.trim().parse::<i64>().ok(),
            _ => None,
        }
        .ok_or_else(|| NexusDaoError::InvalidExpiry {
            value: expires_in.to_string(),
        })?;

        Ok(Self {
            id_token,
            refresh_token,
            expires_at: OffsetDateTime::now_utc() + Duration::seconds(seconds),
        })
    }

    /// Whether the id token is expired or about to expire at `now`.
    pub fn needs_refresh(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at - REFRESH_MARGIN
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Body returned by `accounts:signInWithEmailLink`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignInResponse {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: Value,
}

/// Body returned by the secure token endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct RefreshResponse {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: Value,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn refresh_is_due_inside_the_margin() {
        let credential =
            Credential::issued_now("id".into(), "rt".into(), &json!("3600")).unwrap();
        let now = OffsetDateTime::now_utc();

        assert!(!credential.needs_refresh(now));
        assert!(credential.needs_refresh(now + Duration::seconds(3600 - 299)));
        assert!(credential.needs_refresh(credential.expires_at));
    }

    #[test]
    fn short_lived_credential_needs_refresh_immediately() {
        let credential = Credential::issued_now("id".into(), "rt".into(), &json!(120)).unwrap();
        assert!(credential.needs_refresh(OffsetDateTime::now_utc()));
    }

    #[test]
    fn malformed_expiry_is_rejected() {
        let err = Credential::issued_now("id".into(), "rt".into(), &json!("soon")).unwrap_err();
        assert!(matches!(err, NexusDaoError::InvalidExpiry { .. }));
    }

    #[test]
    fn debug_output_hides_tokens() {
        let credential = Credential::issued_now("secret-id".into(), "secret-rt".into(), &json!(60))
            .unwrap();
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("secret"));
    }
}
