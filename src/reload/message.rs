//! Reload Channel Message Protocol
//!
//! JSON envelopes exchanged between the reload channel and the agents
//! running inside the browser.
//!
//! Every message is `{"type": ..., "payload": {...}}`:
//!
//! - `hello` (agent → server): announce role
//! - `hello-ack` (server → agent): assigned connection id
//! - `instruction` (server → agent): a reload action with correlation id
//! - `ack` (agent → server): outcome of an instruction
//! - `error` (both directions): protocol or agent failure

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::ReloadAction;

/// Opaque connection id assigned at handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Correlation id of one broadcast instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstructionId(pub u64);

impl fmt::Display for InstructionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// Execution context an agent runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Extension background page / service worker
    Background,
    /// Content-script bridge
    Content,
    /// Developer-facing control surface (extensions management page)
    Manager,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::Content => "content",
            Self::Manager => "manager",
        }
    }

    /// Whether a connection with this role receives the given action.
    ///
    /// Full reloads go to everyone; hot updates only reach extension
    /// runtime contexts, never the manager.
    pub fn accepts(self, action: &ReloadAction) -> bool {
        match action {
            ReloadAction::FullReload { .. } => true,
            ReloadAction::HotUpdate { .. } => matches!(self, Self::Background | Self::Content),
            ReloadAction::Ignore => false,
        }
    }

    /// Roles where only one connection may be active at a time.
    pub fn is_exclusive(self) -> bool {
        matches!(self, Self::Background | Self::Manager)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome reported by an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Applied,
    Failed,
}

/// Channel message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ChannelMessage {
    Hello {
        role: Role,
    },
    HelloAck {
        id: PeerId,
    },
    Instruction {
        id: InstructionId,
        action: ReloadAction,
    },
    Ack {
        id: InstructionId,
        status: AckStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    Error {
        message: String,
    },
}

impl ChannelMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"type":"error","payload":{"message":"encode failed"}}"#.into())
    }

    /// Parse from JSON string
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ChangeEvent, ChangeKind};

    #[test]
    fn test_hello_parsing() {
        let msg = ChannelMessage::from_json(r#"{"type":"hello","payload":{"role":"content"}}"#)
            .unwrap();
        assert_eq!(msg, ChannelMessage::Hello { role: Role::Content });
    }

    #[test]
    fn test_hello_ack_serialization() {
        let json = ChannelMessage::HelloAck { id: PeerId(4) }.to_json();
        assert_eq!(json, r#"{"type":"hello-ack","payload":{"id":4}}"#);
    }

    #[test]
    fn test_instruction_serialization() {
        let msg = ChannelMessage::Instruction {
            id: InstructionId(9),
            action: ReloadAction::HotUpdate {
                targets: vec![ChangeEvent::new("content.css", ChangeKind::Stylesheet)],
            },
        };
        let json = msg.to_json();
        assert!(json.starts_with(r#"{"type":"instruction","payload":{"id":9,"action":{"kind":"hot-update""#));
        assert_eq!(ChannelMessage::from_json(&json).unwrap(), msg);
    }

    #[test]
    fn test_ack_detail_is_optional() {
        let msg = ChannelMessage::from_json(r#"{"type":"ack","payload":{"id":2,"status":"applied"}}"#)
            .unwrap();
        assert_eq!(
            msg,
            ChannelMessage::Ack {
                id: InstructionId(2),
                status: AckStatus::Applied,
                detail: None
            }
        );

        let msg = ChannelMessage::from_json(
            r#"{"type":"ack","payload":{"id":3,"status":"failed","detail":"no tab"}}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            ChannelMessage::Ack { status: AckStatus::Failed, detail: Some(ref d), .. } if d == "no tab"
        ));
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert!(ChannelMessage::from_json(r#"{"type":"hello","payload":{"role":"popup"}}"#).is_err());
    }

    #[test]
    fn test_role_routing() {
        let hot = ReloadAction::HotUpdate { targets: vec![] };
        let full = ReloadAction::full_reload("manifest");

        assert!(Role::Background.accepts(&hot));
        assert!(Role::Content.accepts(&hot));
        assert!(!Role::Manager.accepts(&hot));

        assert!(Role::Background.accepts(&full));
        assert!(Role::Content.accepts(&full));
        assert!(Role::Manager.accepts(&full));

        assert!(!Role::Background.accepts(&ReloadAction::Ignore));
    }
}
