//! `[reload]` section configuration.
//!
//! Reload channel and build event source.
//!
//! # Example
//!
//! ```toml
//! [reload]
//! enable = true               # Inject the agent and serve the channel
//! host = "127.0.0.1"          # Channel interface
//! port = 8002                 # Channel port
//! stats = true                # Summary line per change batch
//! source = "watch"            # watch | stdin
//! ack_timeout_ms = 10000
//! reconnect_window_ms = 2000
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::actor::channel::{ACK_TIMEOUT, ChannelConfig, HANDSHAKE_TIMEOUT, RECONNECT_WINDOW};
use crate::cli::SourceArg;
use crate::config::FieldPath;
use crate::reload::server::DEFAULT_PORT;

/// Reload channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Inject the reload agent and serve the channel.
    pub enable: bool,

    /// Interface the channel binds.
    pub host: IpAddr,

    /// Channel port, baked into the injected agent.
    pub port: u16,

    /// Print a summary per change batch.
    pub stats: bool,

    /// Where build events come from.
    pub source: SourceArg,

    pub handshake_timeout_ms: u64,
    pub ack_timeout_ms: u64,
    pub reconnect_window_ms: u64,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            enable: true,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            stats: true,
            source: SourceArg::Watch,
            handshake_timeout_ms: millis(HANDSHAKE_TIMEOUT),
            ack_timeout_ms: millis(ACK_TIMEOUT),
            reconnect_window_ms: millis(RECONNECT_WINDOW),
        }
    }
}

impl ReloadConfig {
    pub const PORT: FieldPath = FieldPath::new("reload.port");
    pub const ACK_TIMEOUT: FieldPath = FieldPath::new("reload.ack_timeout_ms");
    pub const HANDSHAKE_TIMEOUT: FieldPath = FieldPath::new("reload.handshake_timeout_ms");

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn channel_config(&self) -> ChannelConfig {
        let mut channel = ChannelConfig::new(self.addr());
        channel.handshake_timeout = Duration::from_millis(self.handshake_timeout_ms);
        channel.ack_timeout = Duration::from_millis(self.ack_timeout_ms);
        channel.reconnect_window = Duration::from_millis(self.reconnect_window_ms);
        channel
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_reload_defaults() {
        let config = test_parse_config("");
        assert!(config.reload.enable);
        assert!(config.reload.stats);
        assert_eq!(config.reload.port, 8002);
        assert_eq!(config.reload.source, SourceArg::Watch);
        assert_eq!(config.reload.addr().to_string(), "127.0.0.1:8002");

        let channel = config.reload.channel_config();
        assert_eq!(channel.ack_timeout, ACK_TIMEOUT);
        assert_eq!(channel.reconnect_window, RECONNECT_WINDOW);
    }

    #[test]
    fn test_reload_overrides() {
        let config = test_parse_config(
            "[reload]\nenable = false\nport = 9000\nsource = \"stdin\"\nack_timeout_ms = 250",
        );
        assert!(!config.reload.enable);
        assert_eq!(config.reload.port, 9000);
        assert_eq!(config.reload.source, SourceArg::Stdin);
        assert_eq!(
            config.reload.channel_config().ack_timeout,
            Duration::from_millis(250)
        );
    }
}
