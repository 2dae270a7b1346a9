//! The single mutation pipeline.
//!
//! Reloads and input events both end in a reconcile pass against the same
//! live tree, and both are run here, one request at a time.

use std::time::Instant;

use crate::config::RuntimeConfig;
use crate::decl::DeclForest;
use crate::error::{ReloadError, RuntimeError};
use crate::eval::{self, HandlerTable};
use crate::live::LiveTree;
use crate::queue::{MutationQueue, Request};
use crate::reconcile::{Command, reconcile};
use crate::router::{self, DispatchOutcome, InputEvent};
use crate::sink::CommandSink;
use crate::watch::ReloadStatus;

/// Sole owner of the handler table, the declaration forest, the live tree
/// and the sink.
pub struct Pipeline<S: CommandSink = Box<dyn CommandSink>> {
    handlers: HandlerTable,
    forest: DeclForest,
    live: LiveTree,
    sink: S,
    status: ReloadStatus,
    max_call_depth: usize,
}

impl<S: CommandSink> Pipeline<S> {
    pub fn new(sink: S, config: &RuntimeConfig, status: ReloadStatus) -> Self {
        Self {
            handlers: HandlerTable::new(),
            forest: DeclForest::default(),
            live: LiveTree::new(),
            sink,
            status,
            max_call_depth: config.max_call_depth,
        }
    }

    pub fn live(&self) -> &LiveTree {
        &self.live
    }

    pub fn forest(&self) -> &DeclForest {
        &self.forest
    }

    pub fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn status(&self) -> &ReloadStatus {
        &self.status
    }

    /// Run a full pass over `source`.
    ///
    /// Nothing is changed unless parsing, evaluation and reconciliation all
    /// succeed; on failure the previous tree and handlers stay in place and
    /// the error is reported to the sink. Returns the number of commands
    /// applied.
    pub fn reload(&mut self, source: &str) -> Result<usize, ReloadError> {
        self.status.begin(Instant::now());
        match self.prepare(source) {
            Ok((evaluation, commands)) => {
                self.apply(&commands);
                self.forest = evaluation.forest;
                self.handlers = evaluation.handlers;
                self.status.succeed(Instant::now());
                log::info!(
                    "reloaded: {} window(s), {} widget(s), {} command(s)",
                    self.forest.roots.len(),
                    self.forest.len(),
                    commands.len()
                );
                Ok(commands.len())
            }
            Err(err) => {
                self.status.fail(err.clone(), Instant::now());
                self.sink.report(&RuntimeError::Reload(err.clone()));
                Err(err)
            }
        }
    }

    fn prepare(&self, source: &str) -> Result<(eval::Evaluation, Vec<Command>), ReloadError> {
        let script = nabu_script::parse_str(source)?;
        let evaluation = eval::evaluate(&script, self.max_call_depth)?;
        let commands = reconcile(&self.live, &evaluation.forest)?;
        Ok((evaluation, commands))
    }

    /// Route one input event. Errors are reported to the sink; directives
    /// that succeeded stay applied.
    pub fn dispatch(&mut self, event: &InputEvent) -> DispatchOutcome {
        let outcome = router::dispatch(&self.handlers, &mut self.forest, &self.live, event, self.max_call_depth);
        self.apply(&outcome.commands);
        for err in &outcome.errors {
            self.sink.report(&RuntimeError::Dispatch(err.clone()));
        }
        log::debug!(
            "event `{}` on `{}`: {} command(s), {} error(s)",
            event.handler_name,
            event.widget_id,
            outcome.commands.len(),
            outcome.errors.len()
        );
        outcome
    }

    fn apply(&mut self, commands: &[Command]) {
        for cmd in commands {
            self.live.apply(cmd);
            self.sink.apply(cmd);
        }
    }

    /// Handle one request. Returns `false` on shutdown.
    pub fn handle(&mut self, request: Request) -> bool {
        match request {
            Request::Reload { source } => {
                // failures are already reported
                let _ = self.reload(&source);
            }
            Request::Dispatch(event) => {
                self.dispatch(&event);
            }
            Request::Shutdown => return false,
        }
        true
    }

    /// Consume `queue` until a `Shutdown` request.
    pub fn run(&mut self, queue: &MutationQueue) {
        log::debug!("pipeline started");
        while self.handle(queue.pop()) {}
        log::debug!("pipeline stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;
    use crate::prop::PropValue;
    use crate::sink::RecordingSink;
    use crate::watch::ReloadState;

    const V1: &str = r#"
def greet(params)
  [{target_id: "msg", action: "setText", value: "hi #{params['id']}"}]
end

window(id: "w1") do
  button(id: "b1", text: "Go", on_click: "greet")
  text(id: "msg", content: "")
end
"#;

    fn pipeline() -> (Pipeline<RecordingSink>, RecordingSink) {
        let sink = RecordingSink::new();
        (Pipeline::new(sink.clone(), &RuntimeConfig::default(), ReloadStatus::default()), sink)
    }

    #[test]
    fn initial_load_creates_everything() {
        let (mut p, sink) = pipeline();
        assert_eq!(p.reload(V1), Ok(3));
        assert_eq!(sink.len(), 3);
        assert_eq!(p.live().ids(), ["w1", "b1", "msg"]);
        assert_eq!(p.status().state(), ReloadState::Idle);
        assert!(p.handlers().contains("greet"));
    }

    #[test]
    fn same_source_twice_is_silent() {
        let (mut p, sink) = pipeline();
        p.reload(V1).unwrap();
        sink.take();
        assert_eq!(p.reload(V1), Ok(0));
        assert!(sink.is_empty());
    }

    #[test]
    fn failed_reload_keeps_last_good_state() {
        let (mut p, sink) = pipeline();
        p.reload(V1).unwrap();
        sink.take();
        let handle = p.live().get("b1").unwrap().handle;

        let broken = V1.replace("text(id: \"msg\"", "slider(id: \"msg\"");
        assert!(matches!(p.reload(&broken), Err(ReloadError::Semantic(_))));
        assert!(p.reload("window(id: \"w1\") do").is_err());

        assert!(sink.is_empty());
        assert_eq!(sink.take_errors().len(), 2);
        assert_eq!(p.live().get("b1").unwrap().handle, handle);
        assert!(p.handlers().contains("greet"));
        let snap = p.status().snapshot();
        assert_eq!(snap.state, ReloadState::Failed);
        assert!(matches!(snap.last_error, Some(ReloadError::Syntax(_))));
    }

    #[test]
    fn runaway_nesting_fails_the_pass() {
        let (mut p, sink) = pipeline();
        p.reload(V1).unwrap();
        sink.take();

        let blocks = format!("window(id: \"w1\") do\n{}{}", "column do\n".repeat(10_000), "end\n".repeat(10_001));
        assert!(matches!(p.reload(&blocks), Err(ReloadError::Syntax(_))));

        let recursive = "def nest(n)\n  column(id: \"c#{n}\") do\n    nest(n + 1)\n  end\nend\nwindow(id: \"w1\") do\n  nest(0)\nend\n";
        let mut p = std::thread::Builder::new()
            .stack_size(32 * 1024 * 1024)
            .spawn(move || {
                assert!(matches!(p.reload(recursive), Err(ReloadError::Semantic(_))));
                p
            })
            .unwrap()
            .join()
            .unwrap();

        assert!(sink.is_empty());
        assert_eq!(sink.take_errors().len(), 2);
        assert_eq!(p.live().ids(), ["w1", "b1", "msg"]);
        assert_eq!(p.reload(V1), Ok(0));
    }

    #[test]
    fn initial_failure_leaves_tree_empty() {
        let (mut p, _) = pipeline();
        assert!(p.reload("button(id: \"b\")").is_err());
        assert!(p.live().is_empty());
    }

    #[test]
    fn events_flow_through_the_same_sink() {
        let (mut p, sink) = pipeline();
        p.reload(V1).unwrap();
        sink.take();

        let outcome = p.dispatch(&InputEvent::new("b1", "greet"));
        assert!(outcome.errors.is_empty());
        assert_eq!(sink.take().len(), 1);
        assert_eq!(p.live().get("msg").unwrap().props["text"], PropValue::from("hi b1"));

        p.dispatch(&InputEvent::new("b1", "missing"));
        assert!(sink.is_empty());
        let errors = sink.take_errors();
        assert_eq!(
            errors,
            vec![RuntimeError::Dispatch(DispatchError::UnknownHandler { name: "missing".into() })]
        );
    }

    #[test]
    fn reload_swaps_handlers_wholesale() {
        let (mut p, sink) = pipeline();
        p.reload(V1).unwrap();
        let v2 = V1.replace("def greet", "def wave");
        p.reload(&v2).unwrap();
        sink.take();
        assert!(!p.handlers().contains("greet"));
        p.dispatch(&InputEvent::new("b1", "greet"));
        assert_eq!(sink.take_errors().len(), 1);
    }

    #[test]
    fn run_drains_queue_in_order() {
        let (mut p, sink) = pipeline();
        let queue = MutationQueue::new();
        queue.push(Request::Reload { source: V1.to_string() });
        queue.push(Request::Dispatch(InputEvent::new("b1", "greet")));
        queue.push(Request::Shutdown);
        p.run(&queue);
        assert_eq!(sink.len(), 4);
        assert!(queue.is_empty());
    }
}
