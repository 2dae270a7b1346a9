//! Embedding entry point: load a script, keep it hot, route events.
//!
//! ```no_run
//! use nabu_runtime::{InputEvent, LogSink, ScriptHost};
//!
//! let host = ScriptHost::new("ui/main.nabu").sink(LogSink).start()?;
//! host.dispatch(InputEvent::new("save_btn", "handle_button_click"));
//! let pipeline = host.join();
//! # Ok::<(), nabu_runtime::StartError>(())
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::RuntimeConfig;
use crate::pipeline::Pipeline;
use crate::queue::{MutationQueue, Request};
use crate::router::InputEvent;
use crate::sink::{CommandSink, LogSink};
use crate::watch::{self, FileWatcher, ReloadStatus};

/// Stack for the pipeline thread. Evaluation recurses once per widget level
/// and per script call, both of which are bounded.
const PIPELINE_STACK: usize = 32 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum StartError {
    #[error("failed to watch {}: {source}", .path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("failed to start the pipeline thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Builder for a running script host.
pub struct ScriptHost {
    path: PathBuf,
    config: RuntimeConfig,
    watch: bool,
    sink: Box<dyn CommandSink>,
}

impl ScriptHost {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), config: RuntimeConfig::default(), watch: true, sink: Box::new(LogSink) }
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Quiet period before a file change triggers a reload.
    pub fn debounce(mut self, quiet: Duration) -> Self {
        self.config.debounce = quiet;
        self
    }

    /// Reload on file changes (default `true`).
    pub fn watch(mut self, enabled: bool) -> Self {
        self.watch = enabled;
        self
    }

    /// Where commands and errors go. Defaults to [`LogSink`].
    pub fn sink(mut self, sink: impl CommandSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Spawn the pipeline thread, queue the initial load and start watching.
    ///
    /// A script that fails to load is not a start error: the live tree stays
    /// empty until a later reload succeeds.
    pub fn start(self) -> Result<HostHandle, StartError> {
        let queue = Arc::new(MutationQueue::new());
        let status = ReloadStatus::new(Instant::now());

        let watcher = if self.watch {
            let w = FileWatcher::start(&self.path, self.config.debounce, Arc::clone(&queue), status.clone())
                .map_err(|source| StartError::Watch { path: self.path.clone(), source })?;
            Some(w)
        } else {
            None
        };

        let mut pipeline = Pipeline::new(self.sink, &self.config, status.clone());
        let worker = {
            let queue = Arc::clone(&queue);
            thread::Builder::new()
                .name("nabu-pipeline".into())
                .stack_size(PIPELINE_STACK)
                .spawn(move || {
                    pipeline.run(&queue);
                    pipeline
                })?
        };

        status.mark_pending(Instant::now());
        watch::enqueue_reload(&self.path, &queue, &status);

        Ok(HostHandle { path: self.path, queue, status, watcher, worker: Some(worker) })
    }
}

/// A running host. Dropping it shuts the pipeline down.
pub struct HostHandle {
    path: PathBuf,
    queue: Arc<MutationQueue>,
    status: ReloadStatus,
    watcher: Option<FileWatcher>,
    worker: Option<JoinHandle<Pipeline>>,
}

impl HostHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue an input event. Returns `false` after shutdown.
    pub fn dispatch(&self, event: InputEvent) -> bool {
        self.queue.push(Request::Dispatch(event))
    }

    /// Re-read the script now, skipping the debounce window.
    pub fn reload_now(&self) -> bool {
        self.status.mark_pending(Instant::now());
        watch::enqueue_reload(&self.path, &self.queue, &self.status)
    }

    pub fn status(&self) -> &ReloadStatus {
        &self.status
    }

    /// Ask the pipeline to stop after the requests already queued.
    pub fn shutdown(&self) {
        self.queue.push(Request::Shutdown);
    }

    /// Shut down and wait for the pipeline. Returns it for inspection, or
    /// `None` if its thread panicked.
    pub fn join(mut self) -> Option<Pipeline> {
        self.stop()
    }

    fn stop(&mut self) -> Option<Pipeline> {
        self.shutdown();
        if let Some(watcher) = self.watcher.take() {
            watcher.stop();
        }
        let worker = self.worker.take()?;
        match worker.join() {
            Ok(pipeline) => Some(pipeline),
            Err(_) => {
                log::error!("pipeline thread panicked");
                None
            }
        }
    }
}

impl Drop for HostHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
