//! Recursive filesystem watching.

use std::path::{Path, PathBuf};

use notify::Config as NotifyConfig;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::ignore::IgnoreSet;

/// A raw change notification; bursts are not coalesced here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub paths: Vec<PathBuf>,
}

/// Watches a directory tree and forwards relevant changes into a channel.
///
/// The underlying watcher stops when this value is dropped.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    receiver: mpsc::UnboundedReceiver<ChangeEvent>,
}

impl FileWatcher {
    pub fn new(root: impl Into<PathBuf>, ignore: IgnoreSet) -> Result<Self> {
        let root = root.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let filter_root = root.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if let Some(change) = Self::relevant_change(event, &filter_root, &ignore) {
                        // The receiver is gone once the runner shuts down.
                        let _ = tx.send(change);
                    }
                }
                Err(e) => warn!(error = %e, "watcher error"),
            },
            NotifyConfig::default(),
        )
        .map_err(|e| Error::Watch(format!("Failed to create watcher: {}", e)))?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| {
                Error::Watch(format!("Failed to watch {}: {}", root.display(), e))
            })?;

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
        })
    }

    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }

    /// Splits the watcher into its guard and the change stream.
    ///
    /// Keep the guard alive for as long as changes should be delivered.
    pub fn into_parts(self) -> (WatchGuard, mpsc::UnboundedReceiver<ChangeEvent>) {
        (
            WatchGuard {
                _watcher: self._watcher,
            },
            self.receiver,
        )
    }

    fn relevant_change(event: Event, root: &Path, ignore: &IgnoreSet) -> Option<ChangeEvent> {
        if matches!(event.kind, EventKind::Access(_)) {
            return None;
        }

        let paths: Vec<PathBuf> = event
            .paths
            .into_iter()
            .filter(|path| !ignore.is_ignored(path, root))
            .collect();

        if paths.is_empty() {
            trace!("ignored change event");
            return None;
        }
        Some(ChangeEvent { paths })
    }
}

/// Keeps the underlying OS watcher registered.
pub struct WatchGuard {
    _watcher: RecommendedWatcher,
}
