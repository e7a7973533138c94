//! JWT token generation and validation.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Token duration: 24 hours
pub const TOKEN_DURATION_SECS: u64 = 24 * 60 * 60;

/// JWT claims carried by every bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,
    /// Database user ID
    pub id: i64,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Configuration for JWT operations.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

/// Result of issuing a token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The JWT token string
    pub token: String,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token duration in seconds
    pub duration: u64,
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Issue a token for a user, valid for [`TOKEN_DURATION_SECS`] from now.
    pub fn issue(&self, user_id: i64, username: &str) -> Result<IssuedToken, JwtError> {
        self.issue_at(user_id, username, unix_now()?)
    }

    /// Issue a token as if the current time were `now` (Unix seconds).
    pub fn issue_at(
        &self,
        user_id: i64,
        username: &str,
        now: u64,
    ) -> Result<IssuedToken, JwtError> {
        let exp = now + TOKEN_DURATION_SECS;

        let claims = Claims {
            sub: username.to_string(),
            id: user_id,
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)?;

        Ok(IssuedToken {
            token,
            expires_at: exp,
            duration: TOKEN_DURATION_SECS,
        })
    }

    /// Validate and decode a token against the system clock.
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        self.verify_at(token, unix_now()?)
    }

    /// Validate and decode a token as if the current time were `now`.
    ///
    /// A token is expired from the second named in its `exp` claim onwards.
    pub fn verify_at(&self, token: &str, now: u64) -> Result<Claims, JwtError> {
        // Expiry is checked below against the caller's clock, with no leeway.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        let token_data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(JwtError::Decoding)?;

        if now >= token_data.claims.exp {
            return Err(JwtError::Expired);
        }

        Ok(token_data.claims)
    }
}

fn unix_now() -> Result<u64, JwtError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| JwtError::TimeError)
}

/// Errors that can occur during JWT operations.
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
    #[error("Failed to decode token: {0}")]
    Decoding(#[source] jsonwebtoken::errors::Error),
    #[error("Token has expired")]
    Expired,
    #[error("System time error")]
    TimeError,
}
