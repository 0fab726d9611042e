//! Listener binding for the reload channel.
//!
//! The address is bound exactly as configured. A port in use is reported,
//! never silently replaced by a neighbouring one: the injected agent has the
//! address baked into the adapted background script.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

/// Default reload channel port.
pub const DEFAULT_PORT: u16 = 8002;

/// The listening address could not be bound.
#[derive(Debug, Error)]
#[error("failed to bind reload channel on {addr}")]
pub struct ChannelBindError {
    pub addr: SocketAddr,
    #[source]
    pub source: std::io::Error,
}

/// Bind the channel listener on `addr`.
///
/// Returns the listener and its actual local address (differs from `addr`
/// only when port 0 was requested).
pub async fn bind(addr: SocketAddr) -> Result<(TcpListener, SocketAddr), ChannelBindError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ChannelBindError { addr, source })?;
    let local = listener
        .local_addr()
        .map_err(|source| ChannelBindError { addr, source })?;
    Ok((listener, local))
}

/// WebSocket URL agents use to reach `addr`.
pub fn endpoint_url(addr: SocketAddr) -> String {
    format!("ws://{addr}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_in_use_reports_address() {
        let (_held, addr) = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();

        let err = bind(addr).await.unwrap_err();
        assert_eq!(err.addr, addr);
        assert!(err.to_string().contains(&addr.to_string()));
    }

    #[test]
    fn test_endpoint_url() {
        let addr: SocketAddr = "127.0.0.1:8002".parse().unwrap();
        assert_eq!(endpoint_url(addr), "ws://127.0.0.1:8002");
    }
}
