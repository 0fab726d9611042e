//! Reload Module
//!
//! Decision logic and wire protocol for extension reloads.
//!
//! # Architecture
//!
//! ```text
//! ChangeEvent[] -> classify -> ReloadAction -> ReloadChannel -> Agents
//! ```
//!
//! # Modules
//!
//! - `classify` - Batch classification and output path categorization
//! - `message` - Channel message envelopes (hello, instruction, ack, error)
//! - `report` - Broadcast delivery reports
//! - `server` - Listener binding for the reload channel

pub mod classify;
pub mod message;
pub mod report;
pub mod server;
