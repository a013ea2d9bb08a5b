use std::fmt;

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;

/// Tokens are refreshed this long before the platform would reject them.
const EXPIRY_MARGIN_SECS: i64 = 60;
const DEFAULT_LIFETIME_SECS: i64 = 3_600;

#[derive(Clone)]
pub struct AccessToken {
    token: SecretString,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self { token: SecretString::from(token.into()), expires_at }
    }

    pub fn secret(&self) -> &str {
        self.token.expose_secret()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now.checked_add_signed(Duration::seconds(EXPIRY_MARGIN_SECS))
            .is_some_and(|deadline| deadline < self.expires_at)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: Option<Value>,
}

/// Parses the password-grant response. `expires_in` arrives either as a number or as a
/// numeric string.
pub fn parse_token_response(body: &str, now: DateTime<Utc>) -> Result<AccessToken, ApiError> {
    let response: TokenResponse =
        serde_json::from_str(body).map_err(|error| ApiError::Decode(error.to_string()))?;
    if response.access_token.trim().is_empty() {
        return Err(ApiError::Auth("token endpoint returned empty access token".to_owned()));
    }

    let lifetime = match response.expires_in {
        Some(Value::Number(number)) => number.as_i64(),
        Some(Value::String(raw)) => raw.trim().parse::<i64>().ok(),
        _ => None,
    }
    .filter(|secs| *secs > 0)
    .unwrap_or(DEFAULT_LIFETIME_SECS);

    let expires_at = Duration::try_seconds(lifetime)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| ApiError::Decode(format!("token lifetime out of range: {lifetime}s")))?;

    Ok(AccessToken::new(response.access_token, expires_at))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use reviewbot_core::ApplicationError;

    use super::{parse_token_response, AccessToken};
    use crate::error::ApiError;

    #[test]
    fn accepts_string_and_numeric_lifetimes() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().expect("valid instant");

        let token = parse_token_response(r#"{"access_token":"abc","expires_in":"359999"}"#, now)
            .expect("string lifetime");
        assert_eq!(token.expires_at(), now + Duration::seconds(359_999));
        assert_eq!(token.secret(), "abc");

        let token = parse_token_response(r#"{"access_token":"abc","expires_in":120}"#, now)
            .expect("numeric lifetime");
        assert_eq!(token.expires_at(), now + Duration::seconds(120));
    }

    #[test]
    fn missing_lifetime_falls_back_to_one_hour() {
        let now = Utc::now();
        let token = parse_token_response(r#"{"access_token":"abc"}"#, now).expect("token");
        assert_eq!(token.expires_at(), now + Duration::seconds(3_600));
    }

    #[test]
    fn unrepresentable_lifetime_is_an_upstream_failure() {
        let now = Utc::now();
        for body in [
            format!(r#"{{"access_token":"abc","expires_in":{}}}"#, i64::MAX),
            format!(r#"{{"access_token":"abc","expires_in":"{}"}}"#, i64::MAX),
        ] {
            let error = parse_token_response(&body, now).expect_err("lifetime overflows");
            assert!(matches!(error, ApiError::Decode(_)));
            assert!(matches!(ApplicationError::from(error), ApplicationError::UpstreamRequest(_)));
        }
    }

    #[test]
    fn empty_token_is_an_auth_failure() {
        let error = parse_token_response(r#"{"access_token":""}"#, Utc::now()).expect_err("empty");
        assert!(matches!(error, ApiError::Auth(_)));
    }

    #[test]
    fn token_goes_stale_inside_expiry_margin() {
        let now = Utc::now();
        let token = AccessToken::new("abc", now + Duration::seconds(90));

        assert!(token.is_fresh_at(now));
        assert!(!token.is_fresh_at(now + Duration::seconds(31)));
        assert!(!format!("{token:?}").contains("abc"));
    }
}
