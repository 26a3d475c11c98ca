//! Signed bearer tokens.
//!
//! Tokens are HS256 JWTs carrying a subject (the user's email) and an
//! absolute expiry. There is no refresh mechanism: an expired token forces a
//! full re-authentication. The signing secret and TTL come from `AuthConfig`
//! and are fixed at construction.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    /// Covers bad signatures, malformed tokens, and expired tokens alike.
    /// Callers must not distinguish between them.
    #[error("invalid or expired token")]
    Invalid,
    #[error("failed to sign token")]
    Signing,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the authenticated user's email.
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    /// Issue a signed token for the given subject.
    pub fn issue(&self, subject: &str) -> Result<String, TokenError> {
        let claims = Claims {
            sub: subject.to_string(),
            exp: (Utc::now() + self.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding).map_err(|_| TokenError::Signing)
    }

    /// Verify a token and return its claims. Fails closed: any decode error
    /// maps to `TokenError::Invalid`.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| TokenError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify_round_trip() {
        let issuer = TokenIssuer::new("test-secret", 60);
        let token = issuer.issue("alice@example.com").unwrap();
        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.sub, "alice@example.com");
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn test_expired_token_rejected() {
        // TTL well in the past, beyond the default validation leeway
        let issuer = TokenIssuer::new("test-secret", -5);
        let token = issuer.issue("alice@example.com").unwrap();
        assert!(matches!(issuer.verify(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = TokenIssuer::new("test-secret", 60);
        let other = TokenIssuer::new("other-secret", 60);
        let token = issuer.issue("alice@example.com").unwrap();
        assert!(matches!(other.verify(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_malformed_token_rejected() {
        let issuer = TokenIssuer::new("test-secret", 60);
        assert!(matches!(
            issuer.verify("not-a-token"),
            Err(TokenError::Invalid)
        ));
        assert!(matches!(issuer.verify(""), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let issuer = TokenIssuer::new("test-secret", 60);
        let token = issuer.issue("alice@example.com").unwrap();
        let mut tampered = token.clone();
        tampered.pop();
        tampered.push('x');
        assert!(issuer.verify(&tampered).is_err());
    }
}
