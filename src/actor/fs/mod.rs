//! FileSystem Actor
//!
//! Watches the built extension directory and turns debounced output changes
//! into development build events for the Session.
//! Implements the "Watcher-First" pattern: the session creates the watcher
//! before it adapts the extension and launches the browser, and events
//! written meanwhile buffer until [`FsActor::run`].
//!
//! Architecture:
//! ```text
//! Watcher → Debouncer (pure timing) → OutputClassifier → SessionMsg::Build
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use notify::RecommendedWatcher;
use tokio::sync::mpsc;

use super::messages::SessionMsg;
use crate::manifest::package::SelfWrites;
use crate::utils::path::normalize_path;

// Output change classification (raw changes -> build event).
mod classifier;
// Pure timing and deduplication.
mod debouncer;
// Watch root attach/re-attach lifecycle.
mod watch_roots;


use classifier::OutputClassifier;
use debouncer::Debouncer;
use watch_roots::WatchRoot;

const SOURCE: &str = "watch";

/// FileSystem Actor - watches the extension output directory
pub struct FsActor {
    /// Channel to receive notify events (sync -> async bridge)
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// Watcher handle (must be kept alive)
    watcher: RecommendedWatcher,
    root: WatchRoot,
    /// Normalized extension directory
    extension_dir: PathBuf,
    session_tx: mpsc::Sender<SessionMsg>,
    debouncer: Debouncer,
    self_writes: Arc<SelfWrites>,
}

impl FsActor {
    /// Create the actor and start watching immediately.
    ///
    /// Events buffer in the notify channel until [`FsActor::run`].
    pub fn new(
        extension_dir: PathBuf,
        session_tx: mpsc::Sender<SessionMsg>,
        self_writes: Arc<SelfWrites>,
    ) -> notify::Result<Self> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        let extension_dir = normalize_path(&extension_dir);
        let mut root = WatchRoot::new(extension_dir.clone());
        root.attach(&mut watcher)?;

        Ok(Self {
            notify_rx,
            watcher,
            root,
            extension_dir,
            session_tx,
            debouncer: Debouncer::new(),
            self_writes,
        })
    }

    /// Run the actor event loop until the Session goes away.
    pub async fn run(self) {
        let Self {
            notify_rx,
            mut watcher,
            mut root,
            extension_dir,
            session_tx,
            mut debouncer,
            self_writes,
        } = self;

        let (async_tx, mut async_rx) = mpsc::channel::<notify::Event>(64);

        // Poll notify on a thread and forward to the async side
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break; // Receiver dropped
                        }
                    }
                    Err(e) => crate::log!("watch"; "notify error: {}", e),
                }
            }
        });

        let classifier = OutputClassifier {
            root: &extension_dir,
            self_writes: &self_writes,
        };

        loop {
            tokio::select! {
                biased;
                event = async_rx.recv() => match event {
                    Some(event) => debouncer.add_event(&event),
                    None => {
                        let _ = session_tx
                            .send(SessionMsg::SourceEnded {
                                source: SOURCE,
                                error: Some("watcher stopped".into()),
                            })
                            .await;
                        break;
                    }
                },
                _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                    root.maintain(&mut watcher);
                    let Some(raw) = debouncer.take_if_ready() else {
                        continue;
                    };
                    let Some(build) = classifier.classify(raw) else {
                        continue;
                    };
                    crate::debug!("watch"; "{} changed", build.changed_files.len());
                    if session_tx.send(SessionMsg::Build(build)).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}
