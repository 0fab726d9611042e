//! Channel Actor - Reload Control Channel
//!
//! Long-lived WebSocket server the injected agents connect to.
//!
//! - one actor task owns the connection map and processes commands in order
//! - one task per connection performs socket I/O from a FIFO outbound queue
//! - the accept loop hands new streams to connection tasks
//!
//! # Architecture
//!
//! ```text
//! Session --[broadcast]--> ChannelActor --[PeerMsg]--> peer task --> agent
//!    ^                         |    ^                       |
//!    +------[ChannelEvent]-----+    +-------[Inbound]-------+
//! ```
//!
//! Delivery is at most once per connected peer. Nothing is replayed to a
//! peer that connects after a broadcast.

mod peer;
mod registry;


pub use registry::AgentConnection;

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::messages::ChannelCmd;
use crate::core::ReloadAction;
use crate::reload::message::{AckStatus, ChannelMessage, InstructionId, PeerId, Role};
use crate::reload::report::DeliveryReport;
use crate::reload::server::{self, ChannelBindError};
use registry::Registry;

/// A peer must send `hello` within this time after connecting.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
/// A peer must ack an instruction within this time.
pub const ACK_TIMEOUT: Duration = Duration::from_secs(10);
/// Same-role reconnects within this window count as the same logical peer.
pub const RECONNECT_WINDOW: Duration = Duration::from_secs(2);

/// Channel settings.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub addr: SocketAddr,
    pub handshake_timeout: Duration,
    pub ack_timeout: Duration,
    pub reconnect_window: Duration,
}

impl ChannelConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            handshake_timeout: HANDSHAKE_TIMEOUT,
            ack_timeout: ACK_TIMEOUT,
            reconnect_window: RECONNECT_WINDOW,
        }
    }
}

/// A peer did not acknowledge an instruction in time.
#[derive(Debug, Clone, Error)]
#[error("peer {peer} did not ack instruction {instruction} within {}ms", .timeout.as_millis())]
pub struct PeerTimeoutError {
    pub peer: PeerId,
    pub instruction: InstructionId,
    pub timeout: Duration,
}

/// Connection lifecycle notifications.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Registered(AgentConnection),
    Disconnected {
        id: PeerId,
        role: Role,
    },
    Acked {
        peer: PeerId,
        instruction: InstructionId,
        status: AckStatus,
        detail: Option<String>,
    },
    TimedOut(PeerTimeoutError),
}

/// Handle to a running reload channel.
///
/// Dropping the handle stops the server as well; [`ReloadChannel::stop`]
/// additionally waits until the socket is released.
pub struct ReloadChannel {
    local_addr: SocketAddr,
    cmd_tx: mpsc::UnboundedSender<ChannelCmd>,
    events: Option<mpsc::UnboundedReceiver<ChannelEvent>>,
    manager: watch::Receiver<Option<PeerId>>,
    stop_tx: watch::Sender<bool>,
    actor: JoinHandle<()>,
    acceptor: JoinHandle<()>,
}

impl ReloadChannel {
    /// Bind the listening socket and start serving.
    pub async fn start(config: ChannelConfig) -> Result<Self, ChannelBindError> {
        let (listener, local_addr) = server::bind(config.addr).await?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (manager_tx, manager_rx) = watch::channel(None);
        let (stop_tx, stop_rx) = watch::channel(false);

        let actor = ChannelActor {
            rx: cmd_rx,
            registry: Registry::new(config.reconnect_window),
            events: event_tx,
            manager: manager_tx,
            ack_timeout: config.ack_timeout,
            next_instruction: 1,
        };
        let actor = tokio::spawn(actor.run());
        let acceptor = tokio::spawn(accept_loop(
            listener,
            cmd_tx.clone(),
            config.handshake_timeout,
            stop_rx,
        ));

        Ok(Self {
            local_addr,
            cmd_tx,
            events: Some(event_rx),
            manager: manager_rx,
            stop_tx,
            actor,
            acceptor,
        })
    }

    #[cfg(test)]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// URL agents connect to.
    pub fn endpoint(&self) -> String {
        server::endpoint_url(self.local_addr)
    }

    /// Take the event stream. Only the first call returns it.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<ChannelEvent>> {
        self.events.take()
    }

    /// Id of the active manager connection.
    pub fn manager(&self) -> watch::Receiver<Option<PeerId>> {
        self.manager.clone()
    }

    /// Enqueue `action` for every connected peer whose role accepts it.
    ///
    /// Returns once enqueued; acks arrive as [`ChannelEvent::Acked`].
    pub async fn broadcast(&self, action: &ReloadAction) -> DeliveryReport {
        let (reply, rx) = oneshot::channel();
        let cmd = ChannelCmd::Broadcast {
            action: action.clone(),
            reply,
        };
        if self.cmd_tx.send(cmd).is_err() {
            crate::debug!("channel"; "broadcast after stop dropped");
            return DeliveryReport::empty();
        }
        rx.await.unwrap_or_default()
    }

    /// Close every connection and release the socket.
    pub async fn stop(self) {
        let _ = self.cmd_tx.send(ChannelCmd::Stop);
        self.stop_tx.send_replace(true);
        let _ = self.acceptor.await;
        let _ = self.actor.await;
        crate::debug!("channel"; "stopped");
    }
}

// =============================================================================
// Accept loop
// =============================================================================

async fn accept_loop(
    listener: TcpListener,
    cmd_tx: mpsc::UnboundedSender<ChannelCmd>,
    handshake_timeout: Duration,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    crate::debug!("channel"; "connection from {}", addr);
                    tokio::spawn(peer::serve(
                        stream,
                        addr,
                        cmd_tx.clone(),
                        handshake_timeout,
                        stop.clone(),
                    ));
                }
                Err(e) => crate::debug!("channel"; "accept failed: {}", e),
            },
            _ = stop.changed() => break,
        }
    }
}

// =============================================================================
// Actor
// =============================================================================

struct ChannelActor {
    rx: mpsc::UnboundedReceiver<ChannelCmd>,
    registry: Registry,
    events: mpsc::UnboundedSender<ChannelEvent>,
    manager: watch::Sender<Option<PeerId>>,
    ack_timeout: Duration,
    next_instruction: u64,
}

impl ChannelActor {
    async fn run(mut self) {
        let period = (self.ack_timeout / 4).clamp(Duration::from_millis(10), Duration::from_millis(500));
        let mut sweep = tokio::time::interval(period);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = self.rx.recv() => match cmd {
                    Some(ChannelCmd::Stop) | None => break,
                    Some(cmd) => self.handle(cmd),
                },
                _ = sweep.tick() => self.expire(Instant::now()),
            }
        }

        let closed = self.registry.clear();
        if !closed.is_empty() {
            crate::debug!("channel"; "closed {} connections", closed.len());
        }
        self.manager.send_replace(None);
    }

    fn handle(&mut self, cmd: ChannelCmd) {
        let now = Instant::now();
        match cmd {
            ChannelCmd::Register {
                role,
                addr,
                outbound,
                reply,
            } => {
                let reg = self.registry.register(role, addr, outbound, now);
                let id = reg.conn.id;

                if let Some(old) = reg.superseded {
                    crate::log!("channel"; "{} {} superseded by {}", old.role, old.id, id);
                    self.emit(ChannelEvent::Disconnected {
                        id: old.id,
                        role: old.role,
                    });
                }
                match reg.conn.reconnected_from {
                    Some(prev) => crate::log!("channel"; "{} reconnected as {} (was {})", role, id, prev),
                    None => crate::log!("channel"; "{} connected as {}", role, id),
                }

                // Publish before the peer task can flush hello-ack
                self.publish_manager();
                if reply.send(id).is_err() {
                    self.registry.remove(id, None, now);
                    self.publish_manager();
                    return;
                }
                self.emit(ChannelEvent::Registered(reg.conn));
            }

            ChannelCmd::Inbound { peer, msg } => {
                self.registry.touch(peer, now);
                match msg {
                    ChannelMessage::Ack {
                        id,
                        status,
                        detail,
                    } => {
                        if !self.registry.ack(peer, id, now) {
                            crate::debug!("channel"; "stray ack {} from {}", id, peer);
                            return;
                        }
                        match (status, &detail) {
                            (AckStatus::Failed, Some(d)) => {
                                crate::log!("warning"; "{} failed to apply {}: {}", peer, id, d)
                            }
                            (AckStatus::Failed, None) => {
                                crate::log!("warning"; "{} failed to apply {}", peer, id)
                            }
                            (AckStatus::Applied, _) => crate::debug!("channel"; "{} applied {}", peer, id),
                        }
                        self.emit(ChannelEvent::Acked {
                            peer,
                            instruction: id,
                            status,
                            detail,
                        });
                    }
                    ChannelMessage::Error { message } => {
                        crate::log!("warning"; "agent {}: {}", peer, message);
                    }
                    other => crate::debug!("channel"; "unexpected message from {}: {:?}", peer, other),
                }
            }

            ChannelCmd::Disconnect { peer } => {
                if let Some(conn) = self.registry.remove(peer, None, now) {
                    crate::log!("channel"; "{} {} disconnected", conn.role, conn.id);
                    self.emit(ChannelEvent::Disconnected {
                        id: conn.id,
                        role: conn.role,
                    });
                    self.publish_manager();
                }
            }

            ChannelCmd::Broadcast { action, reply } => {
                let report = self.broadcast(&action, now);
                let _ = reply.send(report);
            }

            ChannelCmd::Stop => {}
        }
    }

    fn broadcast(&mut self, action: &ReloadAction, now: Instant) -> DeliveryReport {
        if action.is_ignore() {
            return DeliveryReport::empty();
        }
        if self.registry.is_empty() {
            crate::debug!("channel"; "no peers for {}", action.label());
            return DeliveryReport::empty();
        }

        let instruction = InstructionId(self.next_instruction);
        self.next_instruction += 1;

        let (report, dead) = self
            .registry
            .deliver(instruction, action, now + self.ack_timeout);
        for id in dead {
            self.drop_peer(id, None, now);
        }

        crate::debug!(
            "channel";
            "{} {} to {} peers ({} skipped)",
            action.label(),
            instruction,
            report.delivered_count(),
            report.skipped
        );
        report
    }

    fn expire(&mut self, now: Instant) {
        for (peer, instruction) in self.registry.overdue(now) {
            let err = PeerTimeoutError {
                peer,
                instruction,
                timeout: self.ack_timeout,
            };
            crate::log!("error"; "{}", err);
            self.emit(ChannelEvent::TimedOut(err.clone()));
            self.drop_peer(peer, Some(ChannelMessage::error(err.to_string())), now);
        }
    }

    fn drop_peer(&mut self, id: PeerId, reason: Option<ChannelMessage>, now: Instant) {
        if let Some(conn) = self.registry.remove(id, reason, now) {
            self.emit(ChannelEvent::Disconnected {
                id: conn.id,
                role: conn.role,
            });
            self.publish_manager();
        }
    }

    fn publish_manager(&self) {
        let holder = self.registry.holder(Role::Manager);
        self.manager.send_if_modified(|current| {
            if *current == holder {
                false
            } else {
                *current = holder;
                true
            }
        });
    }

    fn emit(&self, event: ChannelEvent) {
        let _ = self.events.send(event);
    }
}
