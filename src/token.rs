//! JSON web tokens carrying a user ID.
//!
//! [`JwtTokens`] signs HS256 tokens whose `userID` claim identifies the
//! caller, and parses them back out of `Authorization: Bearer <token>`
//! headers for the authentication middleware.

use std::time::Duration;

use axum::http::{header, HeaderMap};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, encode, get_current_timestamp, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::middleware::{BoxError, TokenParser};
use crate::options::JwtOptions;

/// The claim holding the user ID.
pub const IDENTITY_KEY: &str = "userID";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub iat: u64,
    pub nbf: u64,
    pub exp: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("the length of the `Authorization` header is zero")]
    MissingHeader,

    #[error("the `Authorization` header must be `Bearer <token>`")]
    MalformedHeader,

    #[error("{0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

pub struct JwtTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    expiration: Duration,
}

impl JwtTokens {
    #[must_use]
    pub fn new(opts: &JwtOptions) -> Self {
        let mut validation = Validation::default();
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf"]);
        Self {
            encoding: EncodingKey::from_secret(opts.key.as_bytes()),
            decoding: DecodingKey::from_secret(opts.key.as_bytes()),
            validation,
            expiration: opts.expiration,
        }
    }

    /// Signs a token for `user_id`, returning it with its expiry.
    pub fn sign(&self, user_id: &str) -> Result<(String, DateTime<Utc>), TokenError> {
        let now = get_current_timestamp();
        let exp = now + self.expiration.as_secs();
        let claims = Claims {
            user_id: user_id.to_string(),
            iat: now,
            nbf: now,
            exp,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        let expires_at = i64::try_from(exp)
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Ok((token, expires_at))
    }

    /// Returns the user ID carried by a signed, unexpired token.
    pub fn parse(&self, token: &str) -> Result<String, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(data.claims.user_id)
    }
}

/// Extracts the token from `Authorization: Bearer <token>`.
pub fn bearer(headers: &HeaderMap) -> Result<&str, TokenError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(TokenError::MissingHeader)?;
    let (scheme, token) = value.split_once(' ').ok_or(TokenError::MalformedHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(TokenError::MalformedHeader);
    }
    Ok(token.trim())
}

impl TokenParser for JwtTokens {
    fn parse_request(&self, headers: &HeaderMap) -> Result<String, BoxError> {
        let token = bearer(headers)?;
        Ok(self.parse(token)?)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn tokens(key: &str) -> JwtTokens {
        JwtTokens::new(&JwtOptions {
            key: key.into(),
            ..JwtOptions::default()
        })
    }

    #[test]
    fn signed_tokens_parse_back() {
        let jwt = tokens("Rtg8BPKNEf2mB4mgvKONGPZZQSaJWNLijxR42qRgq0iBb5");
        let (token, expires_at) = jwt.sign("user-42").unwrap();
        assert_eq!(jwt.parse(&token).unwrap(), "user-42");
        assert!(expires_at > Utc::now());
    }

    #[test]
    fn other_keys_are_rejected() {
        let (token, _) = tokens("first-secret").sign("user-42").unwrap();
        assert!(matches!(
            tokens("second-secret").parse(&token),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn bearer_header_shapes() {
        let mut headers = HeaderMap::new();
        assert!(matches!(bearer(&headers), Err(TokenError::MissingHeader)));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(bearer(&headers), Err(TokenError::MalformedHeader)));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer(&headers).unwrap(), "abc.def");
    }

    #[test]
    fn parse_request_reads_the_header() {
        let jwt = tokens("Rtg8BPKNEf2mB4mgvKONGPZZQSaJWNLijxR42qRgq0iBb5");
        let (token, _) = jwt.sign("user-7").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        assert_eq!(jwt.parse_request(&headers).unwrap(), "user-7");
    }
}
