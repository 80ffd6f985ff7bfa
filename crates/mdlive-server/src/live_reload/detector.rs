//! Filesystem change detection.
//!
//! Watches the root directory recursively and publishes a single
//! "changed" message to the [`Hub`] for every burst of filesystem events.
//! The watch stays open between bursts; a burst ends once no change has
//! arrived for the debounce window, or once it has lasted ten windows.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::{MetadataKind, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::hub::Hub;

/// Message published for every detected change.
pub const CHANGE_MESSAGE: &str = "Files have been changed.";

/// Default quiet period that ends a burst of events.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// A burst is published after at most this many debounce windows, even if
/// changes keep arriving.
pub(crate) const MAX_WAIT_FACTOR: u32 = 10;

/// Delay before re-establishing a failed watch.
const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Raw events buffered between the notify thread and the detector task.
const EVENT_BUFFER: usize = 100;

type EventReceiver = mpsc::Receiver<notify::Result<Event>>;

/// Change detector errors.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    /// The recursive watch could not be established.
    #[error("Failed to watch {}: {source}", path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// The watcher reported an error while running.
    #[error("Watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// The watcher stopped delivering events.
    #[error("Watcher event stream ended")]
    Disconnected,

    /// The watched root was removed or renamed away.
    #[error("Watched directory {} was removed", .0.display())]
    RootRemoved(PathBuf),
}

/// How a burst of changes ended.
#[derive(Debug, PartialEq, Eq)]
enum Burst {
    /// Something under the root changed.
    Changed,
    /// The root itself went away; the watch no longer sees anything.
    RootLost,
}

/// One active recursive watch on the root directory.
pub(crate) struct WatchSession {
    // Dropping the watcher stops the watch.
    _watcher: RecommendedWatcher,
    events: EventReceiver,
}

impl WatchSession {
    /// Start watching `root` recursively.
    pub(crate) fn establish(root: &Path) -> Result<Self, DetectorError> {
        let (tx, events) = mpsc::channel(EVENT_BUFFER);

        // The callback runs on the notify backend thread, outside the runtime.
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.blocking_send(res);
        })?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|source| DetectorError::Watch {
                path: root.to_path_buf(),
                source,
            })?;

        Ok(Self {
            _watcher: watcher,
            events,
        })
    }

    /// Wait for the next burst of changes.
    async fn next_change(
        &mut self,
        root: &Path,
        debounce: Duration,
    ) -> Result<Burst, DetectorError> {
        wait_for_change(&mut self.events, root, debounce).await
    }
}

/// Watches the root directory and publishes changes to the hub.
pub struct ChangeDetector {
    root: PathBuf,
    hub: Hub,
    debounce: Duration,
}

impl ChangeDetector {
    /// Create a detector for `root` publishing to `hub`.
    #[must_use]
    pub fn new(root: PathBuf, hub: Hub) -> Self {
        Self {
            root,
            hub,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Set the quiet period that ends a burst of events.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Start detecting changes.
    ///
    /// The first watch is established before this returns, so changes made
    /// afterwards are observed. The returned task runs until aborted.
    pub fn start(self) -> JoinHandle<()> {
        let session = self.establish();
        tokio::spawn(self.run(session))
    }

    fn establish(&self) -> Option<WatchSession> {
        match WatchSession::establish(&self.root) {
            Ok(session) => {
                tracing::info!(root = %self.root.display(), "Watching for changes");
                Some(session)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Error watching directory");
                None
            }
        }
    }

    async fn run(self, mut session: Option<WatchSession>) {
        loop {
            let Some(active) = session.as_mut() else {
                tokio::time::sleep(RETRY_INTERVAL).await;
                session = self.establish();
                continue;
            };

            match active.next_change(&self.root, self.debounce).await {
                Ok(burst) => {
                    // A removed root may already be back, under a new inode
                    let root_lost = burst == Burst::RootLost || !self.root.is_dir();

                    tracing::info!(root = %self.root.display(), "Files changed");
                    self.hub.publish(CHANGE_MESSAGE);

                    if root_lost {
                        let e = DetectorError::RootRemoved(self.root.clone());
                        tracing::warn!(error = %e, "Watch session ended, re-establishing");
                        session = None;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Watch session ended, re-establishing");
                    session = None;
                }
            }
        }
    }
}

/// Whether an event counts as a change to the watched tree.
///
/// Creation, modification (including renames), and removal count; access
/// events do not, so serving a file never triggers a reload.
fn is_change(kind: EventKind) -> bool {
    match kind {
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)) => false,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => true,
        _ => false,
    }
}

/// Whether an event removes or renames away the watched root itself.
fn removes_root(event: &Event, root: &Path) -> bool {
    matches!(
        event.kind,
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
    ) && event.paths.iter().any(|p| p == root)
}

/// Wait for a change event, then absorb changes until `debounce` passes
/// without one or the burst reaches its maximum length.
///
/// Only changes restart the quiet period; access events never do.
async fn wait_for_change(
    events: &mut EventReceiver,
    root: &Path,
    debounce: Duration,
) -> Result<Burst, DetectorError> {
    let mut burst = loop {
        match events.recv().await {
            Some(Ok(event)) if is_change(event.kind) => {
                break if removes_root(&event, root) {
                    Burst::RootLost
                } else {
                    Burst::Changed
                };
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
            None => return Err(DetectorError::Disconnected),
        }
    };

    let deadline = Instant::now() + debounce * MAX_WAIT_FACTOR;
    let mut quiet_until = Instant::now() + debounce;
    let mut absorbed = 0usize;

    loop {
        match tokio::time::timeout_at(quiet_until.min(deadline), events.recv()).await {
            Ok(Some(Ok(event))) if is_change(event.kind) => {
                absorbed += 1;
                if removes_root(&event, root) {
                    burst = Burst::RootLost;
                }
                quiet_until = Instant::now() + debounce;
            }
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(e))) => {
                // The change already happened; report it and let the next
                // wait surface any lasting failure.
                tracing::warn!(error = %e, "Watcher error during change burst");
                break;
            }
            Ok(None) | Err(_) => break,
        }
    }

    tracing::debug!(absorbed, ?burst, "Coalesced filesystem events");
    Ok(burst)
}
