//! Browser Supervisor - Process Lifecycle
//!
//! Spawns the browser with the extension under test and watches it.
//!
//! ```text
//! launch --> starting --[spawned + ready]--> running --[exit 0]--> exited
//!               |                               |
//!               +--[spawn error/early exit/timeout]--> crashed <--[exit != 0]--+
//! ```
//!
//! One task per process owns the `Child`. `stop` always ends in `exited`:
//! graceful termination, forced kill after the grace period, then the
//! ephemeral profile is removed.

mod error;
mod launch;
mod profile;
mod terminate;

#[cfg(test)]
mod tests;

pub use error::LaunchError;
pub use launch::{BrowserTarget, LaunchArgs, resolve_executable, validate_flags};
pub use profile::Profile;

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::manifest::ManifestLayout;
use crate::reload::message::PeerId;

/// Time allowed to reach `running`.
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(15);
/// Time allowed to exit after a termination request.
pub const STOP_GRACE: Duration = Duration::from_secs(3);
/// Default bound on automatic restarts.
pub const MAX_RESTARTS: u32 = 3;

// =============================================================================
// Types
// =============================================================================

/// Browser process state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Starting,
    Running,
    Exited,
    Crashed,
}

impl ProcessStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Exited => "exited",
            Self::Crashed => "crashed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Exited | Self::Crashed)
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub pid: Option<u32>,
    pub from: ProcessStatus,
    pub to: ProcessStatus,
    /// Exit status or failure reason
    pub detail: Option<String>,
}

/// What a launch waits for before `running`.
#[derive(Debug, Clone)]
pub enum Readiness {
    /// Spawning is enough
    Spawned,
    /// The manager extension registered on the reload channel
    Manager(watch::Receiver<Option<PeerId>>),
}

impl Readiness {
    /// Manager registered before this launch, i.e. one from an earlier browser.
    fn stale_manager(&self) -> Option<PeerId> {
        match self {
            Self::Spawned => None,
            Self::Manager(rx) => *rx.borrow(),
        }
    }

    /// Only a manager other than `stale` counts as the new browser's.
    async fn wait(self, stale: Option<PeerId>) {
        match self {
            Self::Spawned => {}
            Self::Manager(mut rx) => {
                if rx
                    .wait_for(|manager| manager.is_some() && *manager != stale)
                    .await
                    .is_err()
                {
                    // Channel gone: never ready, the startup timeout decides
                    std::future::pending::<()>().await;
                }
            }
        }
    }
}

/// Launch settings.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub target: BrowserTarget,
    pub executable: Option<PathBuf>,
    pub extension_dir: PathBuf,
    pub manager_dir: Option<PathBuf>,
    pub flags: Vec<String>,
    pub user_data_dir: Option<PathBuf>,
    pub starting_url: Option<String>,
    pub startup_timeout: Duration,
    pub stop_grace: Duration,
}

impl BrowserConfig {
    pub fn new(target: BrowserTarget, extension_dir: impl Into<PathBuf>) -> Self {
        Self {
            target,
            executable: None,
            extension_dir: extension_dir.into(),
            manager_dir: None,
            flags: Vec::new(),
            user_data_dir: None,
            starting_url: None,
            startup_timeout: STARTUP_TIMEOUT,
            stop_grace: STOP_GRACE,
        }
    }
}

// =============================================================================
// Handle
// =============================================================================

/// A running (or finished) browser process.
pub struct BrowserProcessHandle {
    pid: u32,
    profile_dir: PathBuf,
    ephemeral: bool,
    status: Arc<watch::Sender<ProcessStatus>>,
    events: mpsc::UnboundedSender<Transition>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl BrowserProcessHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn profile_dir(&self) -> &Path {
        &self.profile_dir
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    pub fn status(&self) -> ProcessStatus {
        *self.status.borrow()
    }

    /// Wait until the process has exited or crashed.
    pub async fn wait(&self) -> ProcessStatus {
        let mut rx = self.status.subscribe();
        match rx.wait_for(|s| s.is_terminal()).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        }
    }

    /// Terminate the process and release its profile.
    pub async fn stop(mut self) -> ProcessStatus {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        transition(
            &self.status,
            &self.events,
            Some(self.pid),
            ProcessStatus::Exited,
            Some("stopped".into()),
        );
        ProcessStatus::Exited
    }
}

// =============================================================================
// Supervisor
// =============================================================================

/// Launches browser processes and reports their transitions.
pub struct BrowserSupervisor {
    events_tx: mpsc::UnboundedSender<Transition>,
    events_rx: Option<mpsc::UnboundedReceiver<Transition>>,
    auto_restart: bool,
    max_restarts: u32,
    restarts: u32,
}

impl Default for BrowserSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserSupervisor {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            events_tx,
            events_rx: Some(events_rx),
            auto_restart: false,
            max_restarts: MAX_RESTARTS,
            restarts: 0,
        }
    }

    /// Enable automatic restarts after a crash, at most `max` times.
    pub fn with_auto_restart(mut self, enabled: bool, max: u32) -> Self {
        self.auto_restart = enabled;
        self.max_restarts = max;
        self
    }

    /// Take the transition stream. Only the first call returns it.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<Transition>> {
        self.events_rx.take()
    }

    /// Decide whether a crash is followed by a relaunch.
    ///
    /// `Ok(true)` to relaunch, `Ok(false)` if restarts are off, and an error
    /// once the restart budget is spent.
    pub fn on_crash(&mut self) -> Result<bool, LaunchError> {
        if !self.auto_restart {
            return Ok(false);
        }
        if self.restarts >= self.max_restarts {
            return Err(LaunchError::RestartLimit(self.restarts));
        }
        self.restarts += 1;
        Ok(true)
    }

    /// Spawn the browser and wait until it is ready.
    pub async fn launch(
        &self,
        config: &BrowserConfig,
        readiness: Readiness,
    ) -> Result<BrowserProcessHandle, LaunchError> {
        let status = Arc::new(watch::Sender::new(ProcessStatus::Starting));
        let fail = |pid: Option<u32>, err: LaunchError| {
            transition(&status, &self.events_tx, pid, ProcessStatus::Crashed, Some(err.to_string()));
            err
        };

        let stale = readiness.stale_manager();
        let (mut child, profile, program) = match prepare_and_spawn(config) {
            Ok(spawned) => spawned,
            Err(err) => return Err(fail(None, err)),
        };
        let pid = child.id().unwrap_or_default();
        crate::log!("browser"; "started {} (pid {})", program.display(), pid);

        let ready = tokio::time::timeout(config.startup_timeout, async {
            tokio::select! {
                exit = child.wait() => Err(exit),
                () = readiness.wait(stale) => Ok(()),
            }
        })
        .await;

        match ready {
            Ok(Ok(())) => {}
            Ok(Err(exit)) => {
                let status = match exit {
                    Ok(s) => s.to_string(),
                    Err(e) => e.to_string(),
                };
                return Err(fail(Some(pid), LaunchError::EarlyExit { status }));
            }
            Err(_) => {
                let _ = terminate::terminate(&mut child, Duration::ZERO).await;
                return Err(fail(Some(pid), LaunchError::StartupTimeout(config.startup_timeout)));
            }
        }

        transition(&status, &self.events_tx, Some(pid), ProcessStatus::Running, None);

        let (stop_tx, stop_rx) = oneshot::channel();
        let profile_dir = profile.path().to_path_buf();
        let ephemeral = profile.is_ephemeral();
        let task = tokio::spawn(supervise(
            child,
            pid,
            config.stop_grace,
            stop_rx,
            Arc::clone(&status),
            self.events_tx.clone(),
            profile,
        ));

        Ok(BrowserProcessHandle {
            pid,
            profile_dir,
            ephemeral,
            status,
            events: self.events_tx.clone(),
            stop_tx: Some(stop_tx),
            task: Some(task),
        })
    }

    /// Stop a process; always ends in `exited`.
    pub async fn stop(&self, handle: BrowserProcessHandle) -> ProcessStatus {
        handle.stop().await
    }
}

/// Validate, prepare the profile, and spawn.
fn prepare_and_spawn(config: &BrowserConfig) -> Result<(Child, Profile, PathBuf), LaunchError> {
    validate_flags(&config.flags)?;
    let program = resolve_executable(config.target, config.executable.as_deref())?;

    let profile = Profile::prepare(config.user_data_dir.as_deref()).map_err(|source| {
        LaunchError::Profile {
            path: config.user_data_dir.clone().unwrap_or_default(),
            source,
        }
    })?;

    if config.target.is_gecko() {
        install_gecko(&profile, &config.extension_dir)?;
        if let Some(manager) = &config.manager_dir {
            install_gecko(&profile, manager)?;
        }
    }

    let args = LaunchArgs {
        target: config.target,
        profile: profile.path(),
        extension_dir: &config.extension_dir,
        manager_dir: config.manager_dir.as_deref(),
        flags: &config.flags,
        starting_url: config.starting_url.as_deref(),
    }
    .build();
    crate::debug!("browser"; "{} {:?}", program.display(), args);

    let child = Command::new(&program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| LaunchError::Spawn {
            program: program.clone(),
            source,
        })?;

    Ok((child, profile, program))
}

fn install_gecko(profile: &Profile, extension_dir: &Path) -> Result<(), LaunchError> {
    let manifest = extension_dir.join("manifest.json");
    let gecko_id = std::fs::read_to_string(&manifest)
        .ok()
        .and_then(|text| ManifestLayout::from_json(&text))
        .and_then(|layout| layout.gecko_id)
        .ok_or_else(|| LaunchError::MissingGeckoId(manifest.clone()))?;

    profile::install_firefox_extension(profile.path(), &gecko_id, extension_dir).map_err(|source| {
        LaunchError::Profile {
            path: profile.path().to_path_buf(),
            source,
        }
    })
}

/// Own the child until it exits or a stop is requested.
async fn supervise(
    mut child: Child,
    pid: u32,
    grace: Duration,
    mut stop_rx: oneshot::Receiver<()>,
    status: Arc<watch::Sender<ProcessStatus>>,
    events: mpsc::UnboundedSender<Transition>,
    profile: Profile,
) {
    tokio::select! {
        exit = child.wait() => {
            let (to, detail) = match exit {
                Ok(s) if s.success() => (ProcessStatus::Exited, s.to_string()),
                Ok(s) => (ProcessStatus::Crashed, s.to_string()),
                Err(e) => (ProcessStatus::Crashed, e.to_string()),
            };
            transition(&status, &events, Some(pid), to, Some(detail));
        }
        _ = &mut stop_rx => {
            let detail = match terminate::terminate(&mut child, grace).await {
                Ok(s) => s.to_string(),
                Err(e) => e.to_string(),
            };
            transition(&status, &events, Some(pid), ProcessStatus::Exited, Some(detail));
        }
    }

    if profile.is_ephemeral() {
        crate::debug!("browser"; "removing profile {}", profile.path().display());
    }
    drop(profile);
}

fn transition(
    status: &watch::Sender<ProcessStatus>,
    events: &mpsc::UnboundedSender<Transition>,
    pid: Option<u32>,
    to: ProcessStatus,
    detail: Option<String>,
) {
    let from = status.send_replace(to);
    if from == to {
        return;
    }
    match (&detail, pid) {
        (Some(d), Some(pid)) => crate::log!("browser"; "pid {}: {} -> {} ({})", pid, from, to, d),
        (Some(d), None) => crate::log!("browser"; "{} -> {} ({})", from, to, d),
        (None, Some(pid)) => crate::log!("browser"; "pid {}: {} -> {}", pid, from, to),
        (None, None) => crate::log!("browser"; "{} -> {}", from, to),
    }
    let _ = events.send(Transition {
        pid,
        from,
        to,
        detail,
    });
}
