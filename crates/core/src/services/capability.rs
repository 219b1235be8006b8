//! Capability tokens.
//!
//! A capability is a signed statement of what the bearer may do: manage one
//! poll as its organizer, or act as a site account. Tokens have the form
//! `base64url(claims).hex(hmac_sha256(secret, base64url(claims)))` and are
//! checked on every request, so the server keeps no session state.

use agora_common::{AppError, AppResult, config::AuthConfig};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Who the bearer is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Subject {
    /// Organizer of the poll with this token.
    Organizer { poll_token: String },
    /// Signed-in site account.
    Account { user_id: String, is_admin: bool },
}

/// Verified token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub subject: Subject,
    /// Unix timestamp (seconds) after which the token is refused.
    pub expires_at: i64,
}

impl Capability {
    /// Whether this is an admin account.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.subject, Subject::Account { is_admin: true, .. })
    }

    /// Whether the bearer may manage the poll and see individual ballots.
    #[must_use]
    pub fn can_manage(&self, poll_token: &str) -> bool {
        match &self.subject {
            Subject::Organizer { poll_token: token } => token == poll_token,
            Subject::Account { is_admin, .. } => *is_admin,
        }
    }
}

/// Issues and verifies capability tokens.
#[derive(Clone)]
pub struct CapabilityService {
    secret: Vec<u8>,
    ttl: Duration,
}

impl CapabilityService {
    /// Create a new capability service.
    pub fn new(config: &AuthConfig) -> AppResult<Self> {
        if config.secret.trim().is_empty() {
            return Err(AppError::Config("auth.secret must not be empty".to_string()));
        }
        if config.token_ttl_secs <= 0 {
            return Err(AppError::Config(
                "auth.token_ttl_secs must be positive".to_string(),
            ));
        }

        Ok(Self {
            secret: config.secret.as_bytes().to_vec(),
            ttl: Duration::seconds(config.token_ttl_secs),
        })
    }

    /// Issue a token for `subject`, valid from now.
    pub fn issue(&self, subject: Subject) -> AppResult<String> {
        self.issue_at(subject, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(&self, subject: Subject, now: DateTime<Utc>) -> AppResult<String> {
        let claims = Capability {
            subject,
            expires_at: (now + self.ttl).timestamp(),
        };
        let json = serde_json::to_vec(&claims)
            .map_err(|e| AppError::Internal(format!("Failed to encode claims: {e}")))?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = hex::encode(self.mac(&payload)?.finalize().into_bytes());

        Ok(format!("{payload}.{signature}"))
    }

    /// Verify a token and return its claims.
    pub fn verify(&self, token: &str) -> AppResult<Capability> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as if the current time were `now`.
    ///
    /// Malformed, forged and expired tokens all fail with
    /// [`AppError::Unauthorized`].
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> AppResult<Capability> {
        let (payload, signature) = token.split_once('.').ok_or(AppError::Unauthorized)?;
        let signature = hex::decode(signature).map_err(|_| AppError::Unauthorized)?;

        self.mac(payload)?
            .verify_slice(&signature)
            .map_err(|_| AppError::Unauthorized)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AppError::Unauthorized)?;
        let claims: Capability =
            serde_json::from_slice(&json).map_err(|_| AppError::Unauthorized)?;

        if now.timestamp() >= claims.expires_at {
            tracing::debug!(expires_at = claims.expires_at, "Rejected expired capability");
            return Err(AppError::Unauthorized);
        }

        Ok(claims)
    }

    fn mac(&self, payload: &str) -> AppResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AppError::Internal(format!("Invalid HMAC key: {e}")))?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }
}
