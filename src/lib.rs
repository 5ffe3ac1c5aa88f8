//! # homewire-client
//!
//! Async Rust client runtime for a binary home-automation control protocol.
//!
//! The crate keeps a long-lived connection to a control hub: it extracts
//! frames from the byte stream, decodes state-update tables, authenticates
//! with expiring tokens, probes liveness with keepalives, and reconnects
//! with capped exponential backoff when the connection drops.
//!
//! ## Architecture
//!
//! - **Protocol** ([`protocol`]): frame extraction from arbitrary byte
//!   chunks, header validation with resynchronization, and table decoding
//! - **Session** ([`session`]): one task owning the connect/authenticate/
//!   keepalive/reconnect lifecycle
//! - **Dispatch** ([`dispatch`]): a bounded queue and single task invoking
//!   type-filtered consumers and lifecycle observers in arrival order
//! - **Transport** ([`transport`]) and **auth** ([`auth`]) are trait seams;
//!   TCP and caller-supplied token providers plug in there
//!
//! ## Example
//!
//! ```ignore
//! use homewire_client::{Client, MessageType, SessionEvent};
//!
//! #[tokio::main]
//! async fn main() -> homewire_client::Result<()> {
//!     let mut client = Client::builder()
//!         .token_provider(my_provider)
//!         .consume(&[MessageType::ValueStates], |msg| async move {
//!             println!("{} value updates", msg.len());
//!             Ok(())
//!         })
//!         .observe(&SessionEvent::ALL, |event| {
//!             println!("session: {:?}", event);
//!             Ok(())
//!         })
//!         .connect("admin", "secret", "192.168.1.10", true, 5)
//!         .await?;
//!
//!     client.wait_until_closed().await;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::pin::Pin;

pub mod auth;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod session;
pub mod token;
pub mod transport;

mod client;

/// Boxed future used at the crate's trait seams.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use auth::{AuthReply, Credentials, TokenProvider};
pub use client::{Client, ClientBuilder};
pub use dispatch::{MessageRouter, SessionEvent};
pub use error::{HomewireError, Result};
pub use protocol::{DecodeMode, DecodedMessage, FrameDecoder, MessageType};
pub use session::{SessionConfig, SessionState};
pub use token::{Token, TokenManager};
pub use transport::{Connector, TcpConnector};
