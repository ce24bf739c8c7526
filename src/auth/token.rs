use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Seconds before the recorded expiry at which a token is no longer usable
pub const EXPIRY_BUFFER_SECS: i64 = 60;

/// OAuth2 access/refresh token pair with absolute expiry
///
/// The sole durable session credential. Replaced wholesale on every
/// successful refresh or re-authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute expiry, seconds since the Unix epoch
    #[serde(rename = "token_expires_at")]
    pub expires_at: i64,
}

impl Token {
    pub fn new(access_token: String, refresh_token: Option<String>, expires_at: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at,
        }
    }

    /// A token is usable only while `now < expires_at - buffer`; at the
    /// buffered boundary it already counts as expired
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at - EXPIRY_BUFFER_SECS
    }

    /// Expiry check against the current wall clock
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }
}
