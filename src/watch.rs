//! Watches a base directory for folders created directly inside it.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

use notify::event::CreateKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Result as NotifyResult, Watcher};
use thiserror::Error;
use tracing::{debug, warn};

/// A filesystem entry created directly under the watched root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Errors from the folder watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Watch root is not a directory: {0}")]
    InvalidRoot(PathBuf),
    #[error("Failed to initialize folder watcher: {0}")]
    Init(#[source] notify::Error),
    #[error("Failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    #[error("Folder watcher stopped")]
    Disconnected,
}

/// Non-recursive watcher yielding newly created folders one at a time.
pub struct FolderWatcher {
    root: PathBuf,
    _watcher: RecommendedWatcher,
    event_rx: Receiver<NotifyResult<Event>>,
    queue: CreationQueue,
}

impl FolderWatcher {
    pub fn new(root: &Path) -> Result<Self, WatchError> {
        if !root.is_dir() {
            return Err(WatchError::InvalidRoot(root.to_path_buf()));
        }
        let (event_tx, event_rx) = std::sync::mpsc::channel::<NotifyResult<Event>>();
        let mut watcher = notify::recommended_watcher(move |event| {
            let _ = event_tx.send(event);
        })
        .map_err(WatchError::Init)?;
        watcher
            .watch(root, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Watch {
                path: root.to_path_buf(),
                source,
            })?;
        Ok(Self {
            root: root.to_path_buf(),
            _watcher: watcher,
            event_rx,
            queue: CreationQueue::default(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Block until a new folder is available.
    ///
    /// Events already waiting are drained first, so a folder reported several
    /// times while a previous one was being handled is returned once.
    pub fn next_folder(&mut self) -> Result<PathBuf, WatchError> {
        loop {
            if let Some(path) = self.drain_and_pop() {
                return Ok(path);
            }
            let event = self.event_rx.recv().map_err(|_| WatchError::Disconnected)?;
            self.accept(event);
        }
    }

    fn drain_and_pop(&mut self) -> Option<PathBuf> {
        while let Ok(event) = self.event_rx.try_recv() {
            self.accept(event);
        }
        self.queue.pop()
    }

    fn accept(&mut self, event: NotifyResult<Event>) {
        let event = match event {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "Folder watcher error");
                return;
            }
        };
        for created in creation_events(&self.root, &event) {
            if created.is_dir {
                debug!(path = %created.path.display(), "Folder created");
                self.queue.push(created.path);
            }
        }
    }
}

/// Entries created directly under `root` reported by `event`.
pub(crate) fn creation_events(root: &Path, event: &Event) -> Vec<WatchEvent> {
    let EventKind::Create(kind) = event.kind else {
        return Vec::new();
    };
    event
        .paths
        .iter()
        .filter(|path| path.parent() == Some(root))
        .map(|path| WatchEvent {
            path: path.clone(),
            is_dir: matches!(kind, CreateKind::Folder)
                || (!matches!(kind, CreateKind::File) && path.is_dir()),
        })
        .collect()
}

/// FIFO of pending folders that ignores paths already queued.
#[derive(Debug, Default)]
pub(crate) struct CreationQueue {
    order: VecDeque<PathBuf>,
    queued: HashSet<PathBuf>,
}

impl CreationQueue {
    pub(crate) fn push(&mut self, path: PathBuf) -> bool {
        if !self.queued.insert(path.clone()) {
            return false;
        }
        self.order.push_back(path);
        true
    }

    pub(crate) fn pop(&mut self) -> Option<PathBuf> {
        let path = self.order.pop_front()?;
        self.queued.remove(&path);
        Some(path)
    }
}
