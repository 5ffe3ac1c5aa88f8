//! TCP transport connector.

use std::time::Duration;

use tokio::net::TcpStream;

use super::{BoxedTransport, Connector};
use crate::error::Result;
use crate::BoxFuture;

/// Default port when the server address carries none.
const DEFAULT_PORT: u16 = 80;

/// Default connect timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connector establishing plain TCP streams.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl TcpConnector {
    /// Create a connector with the default timeout.
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Create a connector with a custom connect timeout.
    pub fn with_timeout(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for TcpConnector {
    fn connect<'a>(&'a self, addr: &'a str) -> BoxFuture<'a, Result<BoxedTransport>> {
        Box::pin(async move {
            let addr = normalize_addr(addr);
            tracing::debug!(%addr, "opening TCP transport");

            let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&addr))
                .await
                .map_err(|_| {
                    std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("connect to {} timed out", addr),
                    )
                })??;
            stream.set_nodelay(true)?;

            Ok(Box::new(stream) as BoxedTransport)
        })
    }
}

/// Reduce a server URL to a `host:port` dial string.
///
/// Accepts bare `host`, `host:port`, or an `http(s)://` / `ws(s)://` URL,
/// since server addresses are commonly configured as URLs.
fn normalize_addr(addr: &str) -> String {
    let stripped = addr
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("wss://")
        .trim_start_matches("ws://");
    let host = stripped.split('/').next().unwrap_or(stripped);

    if host.contains(':') {
        host.to_string()
    } else {
        format!("{}:{}", host, DEFAULT_PORT)
    }
}
