//! GitHub App authentication.
//!
//! The app signs a short-lived RS256 JWT with its private key and trades it
//! for an installation access token on every delivery.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::HostError;

/// GitHub rejects tokens that live longer than ten minutes.
const JWT_LIFETIME_SECS: u64 = 9 * 60;
/// Backdated to absorb clock drift between us and GitHub.
const JWT_CLOCK_SKEW_SECS: u64 = 60;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iat: u64,
    exp: u64,
    iss: String,
}

/// App id plus the parsed signing key.
pub struct AppCredentials {
    app_id: String,
    key: EncodingKey,
}

impl AppCredentials {
    pub fn from_pem(app_id: impl Into<String>, pem: &[u8]) -> Result<Self, HostError> {
        let key = EncodingKey::from_rsa_pem(pem)
            .map_err(|e| HostError::Auth(format!("invalid private key: {e}")))?;
        Ok(Self {
            app_id: app_id.into(),
            key,
        })
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Sign an app JWT valid from one minute ago for the next nine minutes.
    pub fn jwt(&self) -> Result<String, HostError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .map_err(|e| HostError::Auth(format!("system clock before epoch: {e}")))?;
        let claims = Claims {
            iat: now.saturating_sub(JWT_CLOCK_SKEW_SECS),
            exp: now + JWT_LIFETIME_SECS,
            iss: self.app_id.clone(),
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| HostError::Auth(format!("failed to sign app JWT: {e}")))
    }
}
