//! Authentication token lifecycle tracking.
//!
//! The [`TokenManager`] owns the current token and answers validity
//! questions; it performs no network calls. Acquiring or renewing the raw
//! token is the job of a [`TokenProvider`](crate::auth::TokenProvider),
//! whose results are fed in through [`TokenManager::reissue`] and
//! [`TokenManager::update`].

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Opaque credential with expiry and hash algorithm identifier.
///
/// Serializable so callers can persist a token across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    value: String,
    valid_until: i64,
    hash_alg: String,
}

impl Token {
    /// Create a token from its parts. `valid_until` is unix seconds.
    pub fn new(value: impl Into<String>, valid_until: i64, hash_alg: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            valid_until,
            hash_alg: hash_alg.into(),
        }
    }

    /// The opaque token string.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Expiry as unix seconds.
    pub fn valid_until(&self) -> i64 {
        self.valid_until
    }

    /// Hash algorithm identifier (e.g. "SHA256").
    pub fn hash_alg(&self) -> &str {
        &self.hash_alg
    }

    /// Replace the token string.
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    /// Replace the expiry timestamp.
    pub fn set_valid_until(&mut self, valid_until: i64) {
        self.valid_until = valid_until;
    }

    /// Replace the hash algorithm identifier.
    pub fn set_hash_alg(&mut self, hash_alg: impl Into<String>) {
        self.hash_alg = hash_alg.into();
    }
}

/// Current unix time in seconds.
pub fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Tracks the session's token and signals refresh need.
#[derive(Debug, Default)]
pub struct TokenManager {
    token: Token,
}

impl TokenManager {
    /// Create a manager holding an empty, expired token.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current token.
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Whether a non-empty token has been stored.
    pub fn has_token(&self) -> bool {
        !self.token.value.is_empty()
    }

    /// Replace the token outright (fresh acquisition).
    pub fn reissue(&mut self, token: Token) {
        self.token = token;
    }

    /// Install a refreshed token.
    ///
    /// A refresh must not silently shorten validity: if the new expiry is
    /// earlier than the current one, the current expiry is kept.
    pub fn update(&mut self, mut token: Token) {
        if token.valid_until < self.token.valid_until {
            tracing::warn!(
                current = self.token.valid_until,
                refreshed = token.valid_until,
                "refresh reported earlier expiry, keeping current"
            );
            token.valid_until = self.token.valid_until;
        }
        self.token = token;
    }

    /// Seconds until the token expires, negative if already expired.
    pub fn seconds_to_expire(&self) -> i64 {
        self.seconds_to_expire_at(now_epoch())
    }

    /// Seconds until expiry relative to an explicit `now` (unix seconds).
    pub fn seconds_to_expire_at(&self, now: i64) -> i64 {
        self.token.valid_until - now
    }

    /// Whether the token should be proactively refreshed: missing, expired,
    /// or expiring within `margin`.
    pub fn needs_refresh(&self, margin: Duration) -> bool {
        !self.has_token() || self.seconds_to_expire() <= margin.as_secs() as i64
    }
}
