//! Session Coordinator - Wires up the Reload Actor System
//!
//! The Session is the orchestrator of one development session:
//! - adapts the extension and writes the patch
//! - starts the reload channel
//! - launches the browser
//! - turns every development build into a reload broadcast
//!
//! # Architecture
//!
//! ```text
//! FsActor / StdinSource --Build--> Session --broadcast--> ReloadChannel --> agents
//!                                     |
//!                                     +--launch/stop--> BrowserSupervisor --> browser
//! ```
//!
//! Channel and supervisor are owned by the session, never global, so two
//! sessions (e.g. two browser targets) can run side by side.

mod runtime;


use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch};

use super::browser::{BrowserConfig, LaunchError};
use super::channel::ChannelConfig;
use super::messages::SessionMsg;
use crate::manifest::AdaptationError;
use crate::manifest::package::SelfWrites;
use crate::reload::server::ChannelBindError;

const CHANNEL_BUFFER: usize = 32;

/// Where development build events come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    /// Watch the extension output directory
    #[default]
    Watch,
    /// NDJSON build events on stdin
    Stdin,
    /// Only [`Session::build_sink`]
    #[cfg(test)]
    External,
}

/// Everything a session needs, already validated.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub manifest_path: PathBuf,
    pub extension_dir: PathBuf,
    pub auto_reload: bool,
    pub stats: bool,
    pub source: SourceKind,
    pub channel: ChannelConfig,
    /// `manager_dir` here also selects manager readiness
    pub browser: BrowserConfig,
    pub auto_restart: bool,
    pub max_restarts: u32,
    /// Restart the browser after this many full reloads, 0 = never
    pub restart_after_full_reloads: u32,
}

/// Fatal session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Adaptation(#[from] AdaptationError),

    #[error("cannot write adapted files into the extension directory")]
    Package(#[source] std::io::Error),

    #[error(transparent)]
    Bind(#[from] ChannelBindError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("cannot watch `{}`", .0.display())]
    Watch(PathBuf, #[source] notify::Error),
}

/// Counters reported when a session ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub batches: usize,
    pub hot_updates: usize,
    pub full_reloads: usize,
    pub browser_restarts: u32,
}

/// One development session.
pub struct Session {
    config: SessionConfig,
    build_tx: mpsc::Sender<SessionMsg>,
    build_rx: mpsc::Receiver<SessionMsg>,
    shutdown: watch::Receiver<bool>,
    self_writes: Arc<SelfWrites>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let (build_tx, build_rx) = mpsc::channel(CHANNEL_BUFFER);
        Self {
            config,
            build_tx,
            build_rx,
            shutdown: crate::core::shutdown_signal(),
            self_writes: Arc::new(SelfWrites::new()),
        }
    }

    /// Replace the process-wide Ctrl+C signal.
    #[cfg(test)]
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Sender feeding build events straight into the session.
    #[cfg(test)]
    pub fn build_sink(&self) -> mpsc::Sender<SessionMsg> {
        self.build_tx.clone()
    }

    /// Run until Ctrl+C, the source ends, the browser exits, or a fatal error.
    ///
    /// Teardown (browser, then channel) happens on every exit path.
    pub async fn run(self) -> Result<SessionSummary, SessionError> {
        crate::debug!("dev"; "start");
        let mut runtime = runtime::Runtime::start(self).await?;
        let result = runtime.event_loop().await;
        let summary = runtime.teardown().await;
        crate::debug!("dev"; "stopped");
        result.map(|()| summary)
    }
}
