//! Optional deletion bridge: watch curator root folders for on-disk deletions and
//! tell the curator to refresh the affected item.
//!
//! Deletes are batched into 5-second windows (grounded on the original
//! implementation's `DeletionHandler`) and grouped by parent folder before querying
//! the curator, mirroring the debounce shape the teacher uses for its own folder
//! watcher.

use crate::error::{Error, Result};
use crate::gateway::CuratorGateway;
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

const DEBOUNCE_WINDOW: Duration = Duration::from_secs(5);

/// Watches a curator's accessible root folders for file deletions and triggers a
/// media refresh on the affected item.
pub struct DeletionBridge {
    watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    curator: Arc<dyn CuratorGateway>,
    pending: Arc<Mutex<HashSet<PathBuf>>>,
}

impl DeletionBridge {
    /// Build a bridge for one curator, ready to watch the given root folder paths.
    pub fn new(curator: Arc<dyn CuratorGateway>, root_folders: &[String]) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                if let Err(err) = tx.send(res) {
                    error!(error = %err, "failed to forward filesystem event");
                }
            },
            NotifyConfig::default(),
        )
        .map_err(|err| Error::Io(std::io::Error::other(err)))?;

        for path in root_folders {
            if let Err(err) = watcher.watch(Path::new(path), RecursiveMode::Recursive) {
                warn!(path, error = %err, "failed to watch root folder for deletions");
            }
        }

        Ok(Self {
            watcher,
            rx,
            curator,
            pending: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    /// Run the event loop until the watcher's channel closes (on drop).
    pub async fn run(mut self) {
        info!(curator = self.curator.name(), "deletion bridge started");
        while let Some(result) = self.rx.recv().await {
            match result {
                Ok(event) => self.handle_event(event).await,
                Err(err) => error!(error = %err, "filesystem watcher error"),
            }
        }
        info!(curator = self.curator.name(), "deletion bridge stopped");
    }

    async fn handle_event(&mut self, event: Event) {
        if !matches!(event.kind, EventKind::Remove(_)) {
            return;
        }

        let mut pending = self.pending.lock().await;
        let was_empty = pending.is_empty();
        pending.extend(event.paths);
        drop(pending);

        if was_empty {
            let pending = self.pending.clone();
            let curator = self.curator.clone();
            tokio::spawn(async move {
                tokio::time::sleep(DEBOUNCE_WINDOW).await;
                let batch: Vec<PathBuf> = {
                    let mut pending = pending.lock().await;
                    pending.drain().collect()
                };
                process_batch(curator.as_ref(), batch).await;
            });
        }
    }
}

async fn process_batch(curator: &dyn CuratorGateway, paths: Vec<PathBuf>) {
    let mut by_folder: HashMap<PathBuf, Vec<PathBuf>> = HashMap::new();
    for path in paths {
        let Some(parent) = path.parent() else { continue };
        by_folder.entry(parent.to_path_buf()).or_default().push(path);
    }

    for (folder, files) in by_folder {
        let folder_str = folder.to_string_lossy().to_string();
        match curator.find_item_by_path(&folder_str).await {
            Ok(Some(detail_item_id)) => {
                if let Err(err) = curator.refresh_item(detail_item_id).await {
                    warn!(folder = %folder_str, error = %err, "failed to refresh item after deletion");
                } else {
                    info!(folder = %folder_str, detail_item_id, "refreshed item after on-disk deletion");
                }
            }
            Ok(None) => {
                debug!(folder = %folder_str, "deleted file had no corresponding media item");
            }
            Err(err) => {
                warn!(folder = %folder_str, error = %err, "failed to resolve deleted file's media item");
            }
        }
        for file in &files {
            debug!(file = %file.display(), "deleted file");
        }
    }
}
