//! Hot reload: watch the script file and enqueue a reload after each burst
//! of changes.
//!
//! The watcher reads the file itself, so the pipeline only ever sees complete
//! script text. Deleting the file is ignored (editors often delete and
//! recreate on save); the last good tree stays up.

mod debounce;
mod status;

pub use debounce::Debouncer;
pub use status::{ReloadState, ReloadStatus, StatusSnapshot};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::ReloadError;
use crate::queue::{MutationQueue, Request};

/// How often an idle worker checks whether the queue was closed.
const IDLE_TICK: Duration = Duration::from_millis(250);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// A change notification for the watched script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl FileChange {
    /// The changes in `event` that concern `target`. Only file names are
    /// compared, since the watch is on `target`'s own directory.
    pub fn from_event(event: &notify::Event, target: &Path) -> Vec<FileChange> {
        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Modify(_) => ChangeKind::Modified,
            EventKind::Remove(_) => ChangeKind::Removed,
            _ => return Vec::new(),
        };
        event
            .paths
            .iter()
            .filter(|p| p.file_name().is_some() && p.file_name() == target.file_name())
            .map(|p| FileChange { path: p.clone(), kind })
            .collect()
    }
}

/// Watches one script file on a background thread.
///
/// Dropping the watcher (or calling [`stop`](Self::stop)) ends the thread.
pub struct FileWatcher {
    path: PathBuf,
    watcher: Option<RecommendedWatcher>,
    worker: Option<JoinHandle<()>>,
}

impl FileWatcher {
    pub fn start(
        path: impl Into<PathBuf>,
        debounce: Duration,
        queue: Arc<MutationQueue>,
        status: ReloadStatus,
    ) -> notify::Result<Self> {
        let path = path.into();
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        log::info!("watching {} for changes", path.display());

        let worker = {
            let path = path.clone();
            thread::Builder::new()
                .name("nabu-watch".into())
                .spawn(move || watch_loop(&path, rx, Debouncer::new(debounce), &queue, &status))
                .map_err(notify::Error::io)?
        };

        Ok(Self { path, watcher: Some(watcher), worker: Some(worker) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the watcher drops the channel sender, which ends the loop.
        self.watcher.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("watcher thread for {} panicked", self.path.display());
            }
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn watch_loop(
    path: &Path,
    rx: Receiver<notify::Result<notify::Event>>,
    mut debouncer: Debouncer,
    queue: &MutationQueue,
    status: &ReloadStatus,
) {
    loop {
        let timeout = debouncer.remaining(Instant::now()).unwrap_or(IDLE_TICK);
        match rx.recv_timeout(timeout) {
            Ok(Ok(event)) => {
                for change in FileChange::from_event(&event, path) {
                    let now = Instant::now();
                    match change.kind {
                        ChangeKind::Removed => {
                            log::warn!("{} was removed; keeping the current tree", change.path.display());
                        }
                        ChangeKind::Created | ChangeKind::Modified => {
                            debouncer.touch(now);
                            status.mark_pending(now);
                        }
                    }
                }
            }
            Ok(Err(e)) => log::warn!("watch error on {}: {e}", path.display()),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if queue.is_closed() {
            break;
        }
        if debouncer.poll(Instant::now()) {
            enqueue_reload(path, queue, status);
        }
    }
    log::debug!("watcher for {} stopped", path.display());
}

/// Read `path` and queue a reload of its contents. A read failure marks the
/// reload as failed without touching the queue.
pub(crate) fn enqueue_reload(path: &Path, queue: &MutationQueue, status: &ReloadStatus) -> bool {
    match std::fs::read_to_string(path) {
        Ok(source) => {
            log::info!("{} changed; reloading", path.display());
            queue.push(Request::Reload { source })
        }
        Err(e) => {
            let err = ReloadError::Read { path: path.to_path_buf(), message: e.to_string() };
            log::error!("{err}");
            status.fail(err, Instant::now());
            false
        }
    }
}
