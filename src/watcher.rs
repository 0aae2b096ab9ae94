//! Change notification for the tailed file using the notify crate.

use crate::error::Result;
use notify::event::{AccessKind, AccessMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::trace;

/// Watches a single file and reports when it may have grown.
///
/// The subscription lives in an optional handle that is set up once and
/// dropped by [`ChangeWatcher::stop`].
pub(crate) struct ChangeWatcher {
    watcher: Option<RecommendedWatcher>,
    receiver: mpsc::UnboundedReceiver<notify::Result<Event>>,
    file_path: PathBuf,
    file_name: String,
}

impl ChangeWatcher {
    /// Creates a watcher for the specified path without subscribing yet.
    pub(crate) fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file_path = path.as_ref().to_path_buf();
        let file_name = file_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        let (tx, rx) = mpsc::unbounded_channel();

        let watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;

        Ok(Self {
            watcher: Some(watcher),
            receiver: rx,
            file_path,
            file_name,
        })
    }

    /// Subscribes to changes in the file's directory.
    pub(crate) fn start_watching(&mut self) -> Result<()> {
        let watch_path = watch_dir(&self.file_path).to_path_buf();
        if let Some(watcher) = self.watcher.as_mut() {
            watcher.watch(&watch_path, RecursiveMode::NonRecursive)?;
            trace!(path = %watch_path.display(), "subscribed to change notifications");
        }
        Ok(())
    }

    /// Waits for the next change to the file.
    ///
    /// Returns `None` once the watcher is stopped or the backend hangs up.
    pub(crate) async fn next_change(&mut self) -> Option<Result<()>> {
        if self.watcher.is_none() {
            return None;
        }
        loop {
            match self.receiver.recv().await? {
                Ok(event) if is_event_relevant_to_file(&event, &self.file_name) => {
                    return Some(Ok(()));
                }
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    /// Returns an already delivered change without waiting.
    pub(crate) fn try_next_change(&mut self) -> Option<Result<()>> {
        if self.watcher.is_none() {
            return None;
        }
        while let Ok(res) = self.receiver.try_recv() {
            match res {
                Ok(event) if is_event_relevant_to_file(&event, &self.file_name) => {
                    return Some(Ok(()));
                }
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
        None
    }

    /// Unsubscribes. Returns false if the watcher was already stopped.
    pub(crate) fn stop(&mut self) -> bool {
        self.watcher.take().is_some()
    }

    pub(crate) fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    #[cfg(test)]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

fn watch_dir(file_path: &Path) -> &Path {
    match file_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Check if a notify event may mean new content in a specific file.
/// Reads of the file are ignored, closing it after a write is not.
pub(crate) fn is_event_relevant_to_file(event: &Event, target_file_name: &str) -> bool {
    match event.kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => {}
        EventKind::Access(_) => return false,
        _ => {}
    }
    event.paths.iter().any(|path| {
        path.file_name()
            .map(|name| name.to_string_lossy() == target_file_name)
            .unwrap_or(false)
    })
}
