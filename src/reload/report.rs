//! Broadcast delivery reports.

use super::message::{InstructionId, PeerId};

/// Result of one `broadcast` call.
///
/// Describes enqueueing, not acknowledgement: acks arrive later as channel
/// events correlated by `instruction`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Correlation id, `None` when nothing was sent
    pub instruction: Option<InstructionId>,
    /// Peers the instruction was enqueued for, in registration order
    pub delivered: Vec<PeerId>,
    /// Connected peers whose role does not act on this action
    pub skipped: usize,
}

impl DeliveryReport {
    /// Report for a broadcast that reached nobody.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.len()
    }

    /// No peer received the instruction.
    pub fn is_empty(&self) -> bool {
        self.delivered.is_empty()
    }

    /// Nobody was connected at all (the `BroadcastNoPeersWarning` case).
    pub fn had_no_peers(&self) -> bool {
        self.delivered.is_empty() && self.skipped == 0
    }
}
