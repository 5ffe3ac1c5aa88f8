//! Credential boundary: token acquisition and in-band auth replies.
//!
//! Acquiring and renewing the raw token happens outside the core (typically
//! an HTTP exchange with the server); implementations plug in through
//! [`TokenProvider`]. The session only sees the resulting [`Token`] and the
//! JSON confirmation the server sends back in a text frame.

use std::fmt;

use serde::Deserialize;

use crate::error::{HomewireError, Result};
use crate::token::Token;
use crate::BoxFuture;

/// User credentials handed to [`TokenProvider::acquire`].
#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Collaborator that obtains and renews tokens.
///
/// Failures should map to [`HomewireError::Request`] or
/// [`HomewireError::HttpStatus`].
pub trait TokenProvider: Send + Sync + 'static {
    /// Obtain a fresh token for the given credentials and server.
    fn acquire<'a>(
        &'a self,
        credentials: &'a Credentials,
        server: &'a str,
    ) -> BoxFuture<'a, Result<Token>>;

    /// Renew an existing token.
    fn refresh<'a>(&'a self, current: &'a Token) -> BoxFuture<'a, Result<Token>>;
}

/// JSON reply to a token command, carried in a text-typed frame.
#[derive(Debug, Deserialize)]
pub struct AuthReply {
    /// HTTP-shaped status code.
    pub code: u16,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub valid_until: Option<i64>,
    #[serde(default)]
    pub hash_alg: Option<String>,
}

impl AuthReply {
    /// Whether the server accepted the command.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Token carried in the reply, if the server included one.
    pub fn into_token(self) -> Option<Token> {
        match (self.token, self.valid_until) {
            (Some(value), Some(valid_until)) => Some(Token::new(
                value,
                valid_until,
                self.hash_alg.unwrap_or_default(),
            )),
            _ => None,
        }
    }
}

/// Parse the payload of a text frame as an auth reply.
pub fn parse_auth_reply(payload: &[u8]) -> Result<AuthReply> {
    serde_json::from_slice(payload).map_err(HomewireError::from)
}

/// The command confirming a token over the live connection.
pub fn auth_command(token: &Token) -> String {
    format!("authwithtoken/{}", token.value())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_auth_reply_success() {
        let reply = parse_auth_reply(
            br#"{"code": 200, "token": "abc", "valid_until": 1900000000, "hash_alg": "SHA256"}"#,
        )
        .unwrap();

        assert!(reply.is_success());
        let token = reply.into_token().unwrap();
        assert_eq!(token.value(), "abc");
        assert_eq!(token.valid_until(), 1_900_000_000);
        assert_eq!(token.hash_alg(), "SHA256");
    }

    #[test]
    fn test_parse_auth_reply_rejection_without_token() {
        let reply = parse_auth_reply(br#"{"code": 401}"#).unwrap();
        assert!(!reply.is_success());
        assert!(reply.into_token().is_none());
    }

    #[test]
    fn test_parse_auth_reply_garbage_is_error() {
        assert!(parse_auth_reply(b"not json").is_err());
    }

    #[test]
    fn test_auth_command_format() {
        let token = Token::new("abc123", 0, "SHA256");
        assert_eq!(auth_command(&token), "authwithtoken/abc123");
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("admin", "hunter2");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }
}
