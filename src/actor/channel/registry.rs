//! Connection registry owned by the channel actor.
//!
//! Plain data structure: no I/O, no tasks. Outbound queues are the only
//! handles to the peer tasks, and dropping one makes its task close the
//! socket.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use tokio::sync::mpsc;

use crate::actor::messages::PeerMsg;
use crate::core::ReloadAction;
use crate::reload::message::{ChannelMessage, InstructionId, PeerId, Role};
use crate::reload::report::DeliveryReport;

/// A registered agent connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConnection {
    pub id: PeerId,
    pub role: Role,
    pub addr: SocketAddr,
    pub connected_at: Instant,
    pub last_seen_at: Instant,
    /// Logical predecessor when this peer reconnected within the window
    pub reconnected_from: Option<PeerId>,
}

struct Slot {
    conn: AgentConnection,
    outbound: mpsc::UnboundedSender<PeerMsg>,
    /// Unacked instructions with their deadlines
    pending: FxHashMap<InstructionId, Instant>,
}

struct Departure {
    id: PeerId,
    role: Role,
    at: Instant,
}

/// Outcome of a registration.
#[derive(Debug)]
pub struct Registration {
    pub conn: AgentConnection,
    /// Previous holder of an exclusive role, already removed
    pub superseded: Option<AgentConnection>,
}

/// Connected peers in registration order.
pub struct Registry {
    peers: BTreeMap<PeerId, Slot>,
    departures: Vec<Departure>,
    next_peer: u64,
    reconnect_window: Duration,
}

impl Registry {
    pub fn new(reconnect_window: Duration) -> Self {
        Self {
            peers: BTreeMap::new(),
            departures: Vec::new(),
            next_peer: 1,
            reconnect_window,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Current holder of `role`, first registered if several.
    pub fn holder(&self, role: Role) -> Option<PeerId> {
        self.peers
            .values()
            .find(|s| s.conn.role == role)
            .map(|s| s.conn.id)
    }

    /// Register a peer and queue its `hello-ack`.
    ///
    /// An exclusive role already held is taken over: the previous holder is
    /// told why and closed.
    pub fn register(
        &mut self,
        role: Role,
        addr: SocketAddr,
        outbound: mpsc::UnboundedSender<PeerMsg>,
        now: Instant,
    ) -> Registration {
        let id = PeerId(self.next_peer);
        self.next_peer += 1;

        let superseded = if role.is_exclusive() {
            self.holder(role).and_then(|old| {
                let slot = self.peers.remove(&old)?;
                let _ = slot.outbound.send(PeerMsg::Close(Some(ChannelMessage::error(
                    format!("superseded by peer {id}"),
                ))));
                Some(slot.conn)
            })
        } else {
            None
        };

        // A superseded peer leaves no departure behind. Links chain one hop at
        // a time: a later reconnect within the window points at this peer,
        // never at the one it replaced.
        let reconnected_from = superseded
            .as_ref()
            .map(|c| c.id)
            .or_else(|| self.take_departure(role, now));

        let conn = AgentConnection {
            id,
            role,
            addr,
            connected_at: now,
            last_seen_at: now,
            reconnected_from,
        };
        let _ = outbound.send(PeerMsg::Send(ChannelMessage::HelloAck { id }));
        self.peers.insert(
            id,
            Slot {
                conn: conn.clone(),
                outbound,
                pending: FxHashMap::default(),
            },
        );

        Registration { conn, superseded }
    }

    /// Remove a peer, closing its socket and remembering the departure.
    pub fn remove(&mut self, id: PeerId, reason: Option<ChannelMessage>, now: Instant) -> Option<AgentConnection> {
        let slot = self.peers.remove(&id)?;
        let _ = slot.outbound.send(PeerMsg::Close(reason));
        self.departures.push(Departure {
            id,
            role: slot.conn.role,
            at: now,
        });
        Some(slot.conn)
    }

    /// Remove every peer.
    pub fn clear(&mut self) -> Vec<AgentConnection> {
        let peers = std::mem::take(&mut self.peers);
        self.departures.clear();
        peers
            .into_values()
            .map(|slot| {
                let _ = slot.outbound.send(PeerMsg::Close(None));
                slot.conn
            })
            .collect()
    }

    /// Enqueue `action` for every peer whose role accepts it.
    ///
    /// A peer whose queue is already closed is dropped and not counted.
    pub fn deliver(
        &mut self,
        instruction: InstructionId,
        action: &ReloadAction,
        deadline: Instant,
    ) -> (DeliveryReport, Vec<PeerId>) {
        let mut report = DeliveryReport {
            instruction: Some(instruction),
            ..DeliveryReport::empty()
        };
        let mut dead = Vec::new();

        for slot in self.peers.values_mut() {
            if !slot.conn.role.accepts(action) {
                report.skipped += 1;
                continue;
            }
            let msg = ChannelMessage::Instruction {
                id: instruction,
                action: action.clone(),
            };
            if slot.outbound.send(PeerMsg::Send(msg)).is_ok() {
                slot.pending.insert(instruction, deadline);
                report.delivered.push(slot.conn.id);
            } else {
                dead.push(slot.conn.id);
            }
        }

        (report, dead)
    }

    /// Record an ack; `false` if the instruction was not pending for `peer`.
    pub fn ack(&mut self, peer: PeerId, instruction: InstructionId, now: Instant) -> bool {
        let Some(slot) = self.peers.get_mut(&peer) else {
            return false;
        };
        slot.conn.last_seen_at = now;
        slot.pending.remove(&instruction).is_some()
    }

    /// Mark any inbound traffic from `peer`.
    pub fn touch(&mut self, peer: PeerId, now: Instant) {
        if let Some(slot) = self.peers.get_mut(&peer) {
            slot.conn.last_seen_at = now;
        }
    }

    /// Oldest overdue instruction per peer.
    pub fn overdue(&self, now: Instant) -> Vec<(PeerId, InstructionId)> {
        self.peers
            .values()
            .filter_map(|slot| {
                slot.pending
                    .iter()
                    .filter(|(_, deadline)| **deadline <= now)
                    .min_by_key(|(id, _)| **id)
                    .map(|(id, _)| (slot.conn.id, *id))
            })
            .collect()
    }

    fn take_departure(&mut self, role: Role, now: Instant) -> Option<PeerId> {
        let window = self.reconnect_window;
        self.departures
            .retain(|d| now.saturating_duration_since(d.at) <= window);
        let index = self.departures.iter().rposition(|d| d.role == role)?;
        Some(self.departures.remove(index).id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn queue() -> (mpsc::UnboundedSender<PeerMsg>, mpsc::UnboundedReceiver<PeerMsg>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn test_register_queues_hello_ack_first() {
        let mut registry = Registry::new(Duration::from_secs(2));
        let (tx, mut rx) = queue();
        let reg = registry.register(Role::Content, addr(), tx, Instant::now());

        assert_eq!(reg.conn.id, PeerId(1));
        assert!(matches!(
            rx.try_recv(),
            Ok(PeerMsg::Send(ChannelMessage::HelloAck { id: PeerId(1) }))
        ));
    }

    #[test]
    fn test_exclusive_role_is_superseded() {
        let mut registry = Registry::new(Duration::from_secs(2));
        let now = Instant::now();
        let (old_tx, mut old_rx) = queue();
        let (new_tx, _new_rx) = queue();

        let first = registry.register(Role::Manager, addr(), old_tx, now);
        let second = registry.register(Role::Manager, addr(), new_tx, now);

        assert_eq!(second.superseded.map(|c| c.id), Some(first.conn.id));
        assert_eq!(second.conn.reconnected_from, Some(first.conn.id));
        assert_eq!(registry.len(), 1);

        let _hello_ack = old_rx.try_recv();
        match old_rx.try_recv() {
            Ok(PeerMsg::Close(Some(ChannelMessage::Error { message }))) => {
                assert_eq!(message, "superseded by peer #2");
            }
            other => panic!("expected close, got {other:?}"),
        }
    }

    #[test]
    fn test_reconnect_after_supersede_links_to_latest_peer() {
        let mut registry = Registry::new(Duration::from_secs(2));
        let now = Instant::now();
        let (a, _ra) = queue();
        let (b, _rb) = queue();
        let (c, _rc) = queue();

        let first = registry.register(Role::Manager, addr(), a, now);
        let second = registry.register(Role::Manager, addr(), b, now);
        registry.remove(second.conn.id, None, now);

        let third = registry.register(Role::Manager, addr(), c, now + Duration::from_millis(500));
        assert_eq!(third.conn.reconnected_from, Some(second.conn.id));
        assert_ne!(third.conn.reconnected_from, Some(first.conn.id));
    }

    #[test]
    fn test_content_peers_coexist() {
        let mut registry = Registry::new(Duration::from_secs(2));
        let now = Instant::now();
        let (a, _ra) = queue();
        let (b, _rb) = queue();
        registry.register(Role::Content, addr(), a, now);
        let second = registry.register(Role::Content, addr(), b, now);

        assert!(second.superseded.is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_reconnect_window() {
        let window = Duration::from_secs(2);
        let mut registry = Registry::new(window);
        let start = Instant::now();
        let (a, _ra) = queue();
        let first = registry.register(Role::Background, addr(), a, start);
        registry.remove(first.conn.id, None, start);

        let (b, _rb) = queue();
        let inside = registry.register(Role::Background, addr(), b, start + Duration::from_secs(1));
        assert_eq!(inside.conn.reconnected_from, Some(first.conn.id));
        registry.remove(inside.conn.id, None, start + Duration::from_secs(1));

        let (c, _rc) = queue();
        let outside = registry.register(Role::Background, addr(), c, start + Duration::from_secs(4));
        assert_eq!(outside.conn.reconnected_from, None);
    }

    #[test]
    fn test_deliver_routes_by_role() {
        let mut registry = Registry::new(Duration::from_secs(2));
        let now = Instant::now();
        let (bg, _rbg) = queue();
        let (mgr, _rmgr) = queue();
        registry.register(Role::Background, addr(), bg, now);
        registry.register(Role::Manager, addr(), mgr, now);

        let hot = ReloadAction::HotUpdate { targets: vec![] };
        let (report, dead) = registry.deliver(InstructionId(1), &hot, now);
        assert_eq!(report.delivered, vec![PeerId(1)]);
        assert_eq!(report.skipped, 1);
        assert!(dead.is_empty());
    }

    #[test]
    fn test_closed_queue_is_reported_dead() {
        let mut registry = Registry::new(Duration::from_secs(2));
        let (tx, rx) = queue();
        registry.register(Role::Content, addr(), tx, Instant::now());
        drop(rx);

        let (report, dead) =
            registry.deliver(InstructionId(1), &ReloadAction::full_reload("manifest"), Instant::now());
        assert!(report.is_empty());
        assert_eq!(dead, vec![PeerId(1)]);
    }

    #[test]
    fn test_overdue_and_ack() {
        let mut registry = Registry::new(Duration::from_secs(2));
        let now = Instant::now();
        let (tx, _rx) = queue();
        registry.register(Role::Content, addr(), tx, now);

        let deadline = now + Duration::from_millis(10);
        let action = ReloadAction::full_reload("locale");
        registry.deliver(InstructionId(1), &action, deadline);
        registry.deliver(InstructionId(2), &action, deadline);

        assert!(registry.overdue(now).is_empty());
        assert_eq!(
            registry.overdue(deadline),
            vec![(PeerId(1), InstructionId(1))]
        );

        assert!(registry.ack(PeerId(1), InstructionId(1), now));
        assert!(!registry.ack(PeerId(1), InstructionId(1), now));
        assert!(registry.ack(PeerId(1), InstructionId(2), now));
        assert!(registry.overdue(deadline).is_empty());
    }
}
