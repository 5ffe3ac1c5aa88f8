//! Transport boundary.
//!
//! The session consumes any byte stream implementing [`TransportStream`];
//! it never assumes a specific transport. A [`Connector`] produces fresh
//! streams, which is what makes reconnection (and in-memory test
//! transports) possible.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;
use crate::BoxFuture;

mod tcp;

pub use tcp::TcpConnector;

/// Byte-stream abstraction the session reads from and writes to.
pub trait TransportStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> TransportStream for T {}

/// Owned, type-erased transport stream.
pub type BoxedTransport = Box<dyn TransportStream>;

/// Factory for transport streams, invoked on every (re)connect attempt.
pub trait Connector: Send + Sync + 'static {
    /// Establish a new transport to `addr`.
    fn connect<'a>(&'a self, addr: &'a str) -> BoxFuture<'a, Result<BoxedTransport>>;
}
