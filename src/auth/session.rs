use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Persisted session record, written to the local store under
/// [`crate::storage::keys::SESSION`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub token: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    pub fn new(token: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            email: email.into(),
            created_at: Utc::now(),
        }
    }

    /// Time since the token was issued. Informational only; expiry is
    /// decided by the backend, never locally.
    pub fn age(&self) -> Duration {
        Utc::now() - self.created_at
    }
}
