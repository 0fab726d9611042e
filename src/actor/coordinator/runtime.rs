//! Session runtime: start sequence, event loop, teardown.

use std::future::pending;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::{Session, SessionConfig, SessionError, SessionSummary, SourceKind};
use crate::actor::browser::{
    BrowserProcessHandle, BrowserSupervisor, LaunchError, ProcessStatus, Readiness, Transition,
};
use crate::actor::channel::{ChannelEvent, ReloadChannel};
use crate::actor::fs::FsActor;
use crate::actor::messages::SessionMsg;
use crate::actor::stdin::StdinSource;
use crate::core::{BuildEvent, ChangeEvent, ReloadAction};
use crate::logger::{status_error, status_success, status_warning};
use crate::manifest::package::{SelfWrites, write_patch};
use crate::manifest::{ManifestAdapter, ManifestLayout};
use crate::reload::classify::{classify, touches_adaptation};
use crate::reload::message::AckStatus;
use crate::reload::report::DeliveryReport;
use crate::reload::server::endpoint_url;
use crate::utils::plural::plural_count;

/// Live state of a started session.
pub(super) struct Runtime {
    config: SessionConfig,
    build_rx: mpsc::Receiver<SessionMsg>,
    shutdown: watch::Receiver<bool>,
    self_writes: Arc<SelfWrites>,
    adapter: Option<ManifestAdapter>,
    layout: ManifestLayout,
    channel: Option<ReloadChannel>,
    channel_events: Option<mpsc::UnboundedReceiver<ChannelEvent>>,
    supervisor: BrowserSupervisor,
    transitions: Option<mpsc::UnboundedReceiver<Transition>>,
    browser: Option<BrowserProcessHandle>,
    source: Option<JoinHandle<()>>,
    summary: SessionSummary,
}

impl Runtime {
    /// Adapt, start the channel, launch the browser, then start the source.
    ///
    /// Whatever was started before a failure is torn down again.
    pub(super) async fn start(session: Session) -> Result<Self, SessionError> {
        let Session {
            config,
            build_tx,
            build_rx,
            shutdown,
            self_writes,
        } = session;

        let mut supervisor = BrowserSupervisor::new()
            .with_auto_restart(config.auto_restart, config.max_restarts);
        let transitions = supervisor.take_events();

        let adapter = config
            .auto_reload
            .then(|| ManifestAdapter::new(endpoint_url(config.channel.addr)));

        let mut runtime = Self {
            config,
            build_rx,
            shutdown,
            self_writes,
            adapter,
            layout: ManifestLayout::default(),
            channel: None,
            channel_events: None,
            supervisor,
            transitions,
            browser: None,
            source: None,
            summary: SessionSummary::default(),
        };

        if let Err(e) = runtime.start_services(build_tx).await {
            runtime.teardown().await;
            return Err(e);
        }
        Ok(runtime)
    }

    async fn start_services(&mut self, build_tx: mpsc::Sender<SessionMsg>) -> Result<(), SessionError> {
        // Attached before anything is written; events buffer until the actor runs
        let watcher = match self.config.source {
            SourceKind::Watch => {
                let dir = self.config.extension_dir.clone();
                let actor = FsActor::new(dir.clone(), build_tx.clone(), Arc::clone(&self.self_writes))
                    .map_err(|e| SessionError::Watch(dir, e))?;
                Some(actor)
            }
            _ => None,
        };

        if self.config.auto_reload {
            self.adapt()?;
            let mut channel = ReloadChannel::start(self.config.channel.clone()).await?;
            crate::log!("channel"; "listening on {}", channel.endpoint());
            self.channel_events = channel.take_events();
            self.channel = Some(channel);
        } else {
            crate::log!("dev"; "auto reload off, launching the extension unmodified");
        }

        self.browser = Some(self.launch().await?);

        self.source = match self.config.source {
            SourceKind::Watch => watcher.map(|actor| {
                crate::log!("watch"; "watching {}", self.config.extension_dir.display());
                tokio::spawn(actor.run())
            }),
            SourceKind::Stdin => {
                crate::log!("source"; "reading build events from stdin");
                Some(tokio::spawn(StdinSource::stdin(build_tx).run()))
            }
            #[cfg(test)]
            SourceKind::External => None,
        };
        Ok(())
    }

    // =========================================================================
    // Event loop
    // =========================================================================

    pub(super) async fn event_loop(&mut self) -> Result<(), SessionError> {
        loop {
            tokio::select! {
                () = shutdown_requested(&mut self.shutdown) => {
                    crate::debug!("dev"; "shutdown requested");
                    return Ok(());
                }
                msg = self.build_rx.recv() => match msg {
                    Some(SessionMsg::Build(event)) => self.on_build(event).await?,
                    Some(SessionMsg::SourceEnded { source, error }) => {
                        match error {
                            Some(e) => crate::log!("source"; "{} ended: {}", source, e),
                            None => crate::log!("source"; "{} ended", source),
                        }
                        return Ok(());
                    }
                    None => {
                        crate::debug!("dev"; "build sink closed");
                        return Ok(());
                    }
                },
                Some(event) = recv_opt(&mut self.channel_events) => self.on_channel_event(event),
                status = wait_browser(self.browser.as_ref()) => {
                    if !self.on_browser_end(status).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn on_build(&mut self, event: BuildEvent) -> Result<(), SessionError> {
        if !event.mode.is_dev() {
            crate::debug!("dev"; "production build ignored");
            return Ok(());
        }
        if event.changed_files.is_empty() {
            return Ok(());
        }
        self.summary.batches += 1;

        let changes = event.changed_files;
        let action = classify(&changes);

        if self.adapter.is_some() && touches_adaptation(&changes, &self.layout) {
            // A broken manifest mid-session skips this batch, the next edit retries
            if let Err(e) = self.adapt() {
                status_error("adaptation failed", &error_chain(&e));
                return Ok(());
            }
        }

        let report = match &self.channel {
            Some(channel) => Some(channel.broadcast(&action).await),
            None => None,
        };

        match &action {
            ReloadAction::HotUpdate { .. } => self.summary.hot_updates += 1,
            ReloadAction::FullReload { .. } => self.summary.full_reloads += 1,
            ReloadAction::Ignore => {}
        }
        self.report_batch(&changes, &action, report.as_ref());

        let every = self.config.restart_after_full_reloads as usize;
        if action.is_full_reload() && every > 0 && self.summary.full_reloads % every == 0 {
            crate::log!("browser"; "restarting after {} full reloads", self.summary.full_reloads);
            self.relaunch().await?;
        }
        Ok(())
    }

    fn report_batch(&self, changes: &[ChangeEvent], action: &ReloadAction, report: Option<&DeliveryReport>) {
        if let Some(warning) = undelivered(action, report) {
            status_warning(&warning);
            return;
        }
        if !self.config.stats {
            return;
        }

        let delivery = match report {
            Some(r) if !action.is_ignore() => format!(", {} delivered", r.delivered_count()),
            _ => String::new(),
        };
        status_success(&format!(
            "{} ({}) -> {}{}",
            plural_count(changes.len(), "file"),
            kinds_summary(changes),
            action.label(),
            delivery
        ));
    }

    fn on_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Registered(conn) => {
                crate::debug!("dev"; "{} agent connected as {}", conn.role.label(), conn.id);
            }
            ChannelEvent::Disconnected { id, role } => {
                crate::debug!("dev"; "{} agent {} disconnected", role.label(), id);
            }
            ChannelEvent::Acked {
                peer,
                instruction,
                status: AckStatus::Failed,
                detail,
            } => status_warning(&format!(
                "agent {} failed to apply {}: {}",
                peer,
                instruction,
                detail.as_deref().unwrap_or("no detail")
            )),
            ChannelEvent::Acked {
                peer, instruction, ..
            } => crate::debug!("dev"; "agent {} applied {}", peer, instruction),
            ChannelEvent::TimedOut(e) => status_warning(&e.to_string()),
        }
    }

    /// Returns whether the session continues.
    async fn on_browser_end(&mut self, status: ProcessStatus) -> Result<bool, SessionError> {
        let detail = self.last_transition_detail();
        if let Some(handle) = self.browser.take() {
            handle.stop().await;
        }

        if status != ProcessStatus::Crashed {
            crate::log!("browser"; "browser closed, ending session");
            return Ok(false);
        }

        if self.supervisor.on_crash()? {
            crate::log!("browser"; "crashed ({}), restarting", detail);
            self.browser = Some(self.launch().await?);
            self.summary.browser_restarts += 1;
            Ok(true)
        } else {
            Err(LaunchError::Crashed { status: detail }.into())
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Re-adapt from the source manifest and write the patch.
    fn adapt(&mut self) -> Result<(), SessionError> {
        let Some(adapter) = &self.adapter else {
            return Ok(());
        };
        let patch = adapter.adapt_files(&self.config.manifest_path, &self.config.extension_dir)?;
        let written = write_patch(&self.config.extension_dir, &patch, &self.self_writes)
            .map_err(SessionError::Package)?;

        for path in &written {
            crate::debug!("adapt"; "wrote {}", path.display());
        }
        if !written.is_empty() {
            crate::log!("adapt"; "agent injected into {}", patch.background_path);
        }
        self.layout = patch.layout;
        Ok(())
    }

    async fn launch(&self) -> Result<BrowserProcessHandle, LaunchError> {
        let readiness = match (&self.channel, &self.config.browser.manager_dir) {
            (Some(channel), Some(_)) => Readiness::Manager(channel.manager()),
            _ => Readiness::Spawned,
        };
        let handle = self.supervisor.launch(&self.config.browser, readiness).await?;
        crate::debug!(
            "browser";
            "pid {} on {} profile {}",
            handle.pid(),
            if handle.is_ephemeral() { "temporary" } else { "persistent" },
            handle.profile_dir().display()
        );
        Ok(handle)
    }

    async fn relaunch(&mut self) -> Result<(), SessionError> {
        if let Some(handle) = self.browser.take() {
            self.supervisor.stop(handle).await;
        }
        self.browser = Some(self.launch().await?);
        self.summary.browser_restarts += 1;
        Ok(())
    }

    /// Detail of the most recent transition, draining the stream.
    fn last_transition_detail(&mut self) -> String {
        let mut detail = None;
        if let Some(rx) = &mut self.transitions {
            while let Ok(t) = rx.try_recv() {
                if t.detail.is_some() {
                    detail = t.detail;
                }
            }
        }
        detail.unwrap_or_else(|| "unknown status".into())
    }

    /// Stop the source, the browser, then the channel.
    pub(super) async fn teardown(&mut self) -> SessionSummary {
        if let Some(source) = self.source.take() {
            source.abort();
        }
        if let Some(handle) = self.browser.take() {
            self.supervisor.stop(handle).await;
        }
        if let Some(channel) = self.channel.take() {
            channel.stop().await;
        }
        self.summary.clone()
    }
}

// =============================================================================
// Select helpers
// =============================================================================

/// Resolves once shutdown is signalled; never if the sender is gone.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        pending::<()>().await;
    }
}

async fn recv_opt<T>(rx: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

async fn wait_browser(handle: Option<&BrowserProcessHandle>) -> ProcessStatus {
    match handle {
        Some(handle) => handle.wait().await,
        None => pending().await,
    }
}

// =============================================================================
// Formatting
// =============================================================================

/// `2 script, 1 stylesheet`, kinds in first-seen order.
fn kinds_summary(changes: &[ChangeEvent]) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for change in changes {
        let label = change.kind.label();
        match counts.iter_mut().find(|(l, _)| *l == label) {
            Some((_, n)) => *n += 1,
            None => counts.push((label, 1)),
        }
    }
    counts
        .iter()
        .map(|(label, n)| format!("{n} {label}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The single zero-peer warning for a batch; the channel itself stays quiet.
fn undelivered(action: &ReloadAction, report: Option<&DeliveryReport>) -> Option<String> {
    let report = report?;
    (!action.is_ignore() && report.had_no_peers())
        .then(|| format!("{}: no agent connected", action.label()))
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(e) = source {
        out.push_str(": ");
        out.push_str(&e.to_string());
        source = e.source();
    }
    out
}
