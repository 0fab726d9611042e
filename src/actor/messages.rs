//! Actor Message Definitions
//!
//! Message types for inter-actor communication.
//!
//! ```text
//! FsActor / StdinSource --Build--> Session --Broadcast--> ChannelActor --Send--> peer tasks
//!                                     ^                        |
//!                                     +------ChannelEvent------+
//! ```

use std::net::SocketAddr;

use tokio::sync::{mpsc, oneshot};

use crate::core::{BuildEvent, ReloadAction};
use crate::reload::message::{ChannelMessage, PeerId, Role};
use crate::reload::report::DeliveryReport;

// =============================================================================
// Session Messages
// =============================================================================

/// Messages to the Session (orchestrator) from change sources
#[derive(Debug)]
pub enum SessionMsg {
    /// A compilation finished
    Build(BuildEvent),
    /// A source stopped producing events
    SourceEnded {
        source: &'static str,
        /// `None` on clean end of input
        error: Option<String>,
    },
}

// =============================================================================
// ChannelActor Messages
// =============================================================================

/// Commands to the Channel Actor, which owns the connection map
#[derive(Debug)]
pub enum ChannelCmd {
    /// A peer completed the `hello` handshake
    Register {
        role: Role,
        addr: SocketAddr,
        outbound: mpsc::UnboundedSender<PeerMsg>,
        reply: oneshot::Sender<PeerId>,
    },
    /// A registered peer sent a message
    Inbound { peer: PeerId, msg: ChannelMessage },
    /// A peer's socket closed
    Disconnect { peer: PeerId },
    /// Enqueue an action for every peer whose role accepts it
    Broadcast {
        action: ReloadAction,
        reply: oneshot::Sender<DeliveryReport>,
    },
    /// Close every connection and exit
    Stop,
}

/// Outbound queue item for one peer task
#[derive(Debug)]
pub enum PeerMsg {
    /// Write a message frame
    Send(ChannelMessage),
    /// Optionally write a final message, then close the socket
    Close(Option<ChannelMessage>),
}
