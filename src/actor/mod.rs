//! Actor System for Reload Coordination
//!
//! Message-passing concurrency for a development session:
//!
//! ```text
//! FsActor / StdinSource --> Session --> ChannelActor --> agents
//!   (build events)       (classify)      (broadcast)
//!                            |
//!                            +--> BrowserSupervisor (process)
//! ```
//!
//! # Module Structure
//!
//! - `messages` - Message types for inter-actor communication
//! - `fs` - Output directory watcher with debouncing
//! - `stdin` - NDJSON build events from stdin
//! - `channel` - WebSocket reload channel
//! - `browser` - Browser process supervision
//! - `coordinator` - Wires up and runs a session

pub mod browser;
pub mod channel;
pub mod coordinator;
pub mod fs;
pub mod messages;
pub mod stdin;

pub use coordinator::{Session, SessionConfig, SessionSummary, SourceKind};
