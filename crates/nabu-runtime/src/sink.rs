//! The boundary between the runtime and whatever renders the widgets.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::RuntimeError;
use crate::reconcile::Command;

/// Receives reconciler commands, in order, after they have been applied to
/// the live tree.
///
/// A batch of commands is only delivered once its whole pass succeeded, so a
/// sink never sees a partial reload.
pub trait CommandSink: Send {
    fn apply(&mut self, cmd: &Command);

    /// Called for every failure the pipeline surfaces. Logs by default.
    fn report(&mut self, err: &RuntimeError) {
        log::error!("{err}");
    }
}

impl<S: CommandSink + ?Sized> CommandSink for Box<S> {
    fn apply(&mut self, cmd: &Command) {
        (**self).apply(cmd);
    }

    fn report(&mut self, err: &RuntimeError) {
        (**self).report(err);
    }
}

// ── LogSink ───────────────────────────────────────────────────────────────

/// Logs each command at debug level and drops it.
#[derive(Debug, Default)]
pub struct LogSink;

impl CommandSink for LogSink {
    fn apply(&mut self, cmd: &Command) {
        log::debug!("{cmd:?}");
    }
}

// ── RecordingSink ─────────────────────────────────────────────────────────

/// Keeps every command and error in shared buffers; clones share them.
///
/// Handy for tests and for hosts that poll instead of being called back.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    commands: Arc<Mutex<Vec<Command>>>,
    errors: Arc<Mutex<Vec<RuntimeError>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the recorded commands.
    pub fn take(&self) -> Vec<Command> {
        std::mem::take(&mut *self.commands.lock())
    }

    /// Drain the recorded errors.
    pub fn take_errors(&self) -> Vec<RuntimeError> {
        std::mem::take(&mut *self.errors.lock())
    }

    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CommandSink for RecordingSink {
    fn apply(&mut self, cmd: &Command) {
        self.commands.lock().push(cmd.clone());
    }

    fn report(&mut self, err: &RuntimeError) {
        log::warn!("{err}");
        self.errors.lock().push(err.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;

    #[test]
    fn clones_share_buffers() {
        let sink = RecordingSink::new();
        let mut boxed: Box<dyn CommandSink> = Box::new(sink.clone());
        boxed.apply(&Command::Destroy { id: "x".into() });
        boxed.report(&DispatchError::UnknownHandler { name: "h".into() }.into());
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.take(), vec![Command::Destroy { id: "x".into() }]);
        assert!(sink.is_empty());
        assert_eq!(sink.take_errors().len(), 1);
    }
}
