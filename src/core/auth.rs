//! Bearer token issuance and verification.
//!
//! Tokens are stateless HS256 JWTs carrying only issue and expiry instants:
//! possession plus a valid signature and an unexpired timestamp is
//! sufficient, and no server-side session record exists. The validity window
//! is fully determined by the embedded `exp` and the shared secret, so
//! verification needs no state beyond the [`TokenAuthority`] built at
//! startup.
use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The presented API key does not match the configured key.
    #[error("invalid API key")]
    InvalidApiKey,

    /// No usable bearer token in the authorization header.
    #[error("missing or malformed authorization header")]
    MissingCredentials,

    /// Signature invalid, token malformed, or expiry passed.
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

/// The claims embedded in every issued token. There is deliberately nothing
/// here beyond the validity window — the gateway authenticates "holder of a
/// token minted against the shared API key", not individual users.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub iat: i64,
    pub exp: i64,
}

/// Mints and verifies tokens against the shared secret and API key.
pub struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    api_key: String,
    ttl: Duration,
}

impl TokenAuthority {
    pub fn new(secret: &str, api_key: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // A token is accepted until, but not after, its expiry instant.
        validation.leeway = 0;
        validation.validate_exp = true;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            api_key: api_key.to_string(),
            ttl,
        }
    }

    /// Mint a token for a caller presenting the configured API key.
    ///
    /// The expiration horizon is fixed per process, independent of the
    /// caller. A mismatched key yields [`AuthError::InvalidApiKey`] and no
    /// token.
    pub fn issue(&self, presented_api_key: &str) -> Result<String, AuthError> {
        if presented_api_key != self.api_key {
            return Err(AuthError::InvalidApiKey);
        }

        let issued_at = chrono::Utc::now();
        let claims = Claims {
            iat: issued_at.timestamp(),
            exp: issued_at.timestamp() + self.ttl.as_secs() as i64,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    /// Verify a bearer token: signature, structure, and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }

    /// Extract and verify the token from an `Authorization: Bearer <token>`
    /// header value.
    pub fn verify_header(&self, header: Option<&str>) -> Result<Claims, AuthError> {
        let token = header
            .and_then(|value| value.strip_prefix("Bearer "))
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingCredentials)?;
        self.verify(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority() -> TokenAuthority {
        TokenAuthority::new("test-secret", "test-api-key", Duration::from_secs(3600))
    }

    #[test]
    fn issues_token_for_correct_api_key() {
        let authority = authority();
        let token = authority.issue("test-api-key").unwrap();
        let claims = authority.verify(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn rejects_wrong_api_key() {
        assert!(matches!(
            authority().issue("wrong"),
            Err(AuthError::InvalidApiKey)
        ));
    }

    #[test]
    fn rejects_tampered_signature() {
        let authority = authority();
        let token = authority.issue("test-api-key").unwrap();

        // Flip one byte of the signature segment.
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let mut sig = parts[2].clone().into_bytes();
        sig[0] = if sig[0] == b'A' { b'B' } else { b'A' };
        parts[2] = String::from_utf8(sig).unwrap();
        let tampered = parts.join(".");

        assert!(authority.verify(&tampered).is_err());
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let other = TokenAuthority::new("other-secret", "test-api-key", Duration::from_secs(3600));
        let token = other.issue("test-api-key").unwrap();
        assert!(authority().verify(&token).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let authority = authority();
        let expired = Claims {
            iat: chrono::Utc::now().timestamp() - 120,
            exp: chrono::Utc::now().timestamp() - 60,
        };
        let token = encode(
            &Header::default(),
            &expired,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(matches!(
            authority.verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn header_extraction() {
        let authority = authority();
        let token = authority.issue("test-api-key").unwrap();

        assert!(
            authority
                .verify_header(Some(&format!("Bearer {token}")))
                .is_ok()
        );
        assert!(matches!(
            authority.verify_header(None),
            Err(AuthError::MissingCredentials)
        ));
        assert!(matches!(
            authority.verify_header(Some(&token)),
            Err(AuthError::MissingCredentials)
        ));
        assert!(matches!(
            authority.verify_header(Some("Bearer ")),
            Err(AuthError::MissingCredentials)
        ));
        assert!(authority.verify_header(Some("Bearer not.a.jwt")).is_err());
    }
}
