use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cached session credential for the remote host list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub token: String,
    pub expiry: Option<DateTime<Utc>>,
}

impl SessionToken {
    pub fn new(token: impl Into<String>, expiry: Option<DateTime<Utc>>) -> Self {
        Self {
            token: token.into(),
            expiry,
        }
    }

    /// A token with no expiry never expires locally; the server has the final word.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry.map(|exp| exp <= now).unwrap_or(false)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}
