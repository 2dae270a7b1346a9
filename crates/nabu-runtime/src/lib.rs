//! Runtime for Nabu UI scripts: turns a parsed `.nabu` script into a live,
//! hot-reloadable widget tree and routes input events back into script
//! handlers.
//!
//! Rendering is not done here. The runtime emits a stream of [`Command`]s
//! (create, update, reorder, destroy) to a [`CommandSink`] supplied by the
//! host.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`eval`] | `evaluate`, `HandlerTable`, builtins |
//! | [`decl`] | `DeclNode`, `DeclForest` (what the script declares) |
//! | [`live`] | `LiveTree`, `LiveEntity`, `Handle` (what currently exists) |
//! | [`reconcile`] | `reconcile`, `Command` |
//! | [`router`] | `dispatch`, `InputEvent`, update directives |
//! | [`pipeline`] | `Pipeline`, the single consumer of all mutations |
//! | [`queue`] | `MutationQueue`, `Request` |
//! | [`watch`] | `FileWatcher`, `Debouncer`, `ReloadStatus` |
//! | [`host`] | `ScriptHost` builder and `HostHandle` |
//! | [`value`], [`prop`], [`kind`] | script values, property values, widget kinds |
//! | [`error`] | `SemanticError`, `ReconcileError`, `ReloadError`, `DispatchError` |
//! | [`config`], [`logging`] | `RuntimeConfig`, `init_logging` |
//!
//! # Quick start
//!
//! ```rust
//! use nabu_runtime::{Pipeline, RecordingSink, ReloadStatus, RuntimeConfig, InputEvent};
//!
//! let sink = RecordingSink::new();
//! let mut pipeline = Pipeline::new(sink.clone(), &RuntimeConfig::default(), ReloadStatus::default());
//!
//! pipeline.reload(r#"
//!     def hello(params)
//!       [{target_id: "label", action: "setText", value: "clicked"}]
//!     end
//!
//!     window(id: "main") do
//!       button(id: "go", text: "Go", on_click: "hello")
//!       text(id: "label", content: "")
//!     end
//! "#).unwrap();
//! assert_eq!(sink.take().len(), 3);
//!
//! pipeline.dispatch(&InputEvent::new("go", "hello"));
//! assert_eq!(sink.take().len(), 1);
//! ```

pub mod config;
pub mod decl;
pub mod error;
pub mod eval;
pub mod host;
pub mod kind;
pub mod live;
pub mod logging;
pub mod pipeline;
pub mod prop;
pub mod queue;
pub mod reconcile;
pub mod router;
pub mod sink;
pub mod value;
pub mod watch;

pub use config::RuntimeConfig;
pub use decl::{DeclForest, DeclNode};
pub use error::{DispatchError, ReconcileError, ReloadError, RuntimeError, SemanticError};
pub use eval::{Evaluation, HandlerTable, evaluate};
pub use host::{HostHandle, ScriptHost, StartError};
pub use kind::WidgetKind;
pub use live::{Handle, LiveEntity, LiveTree};
pub use logging::{LoggingConfig, init_logging};
pub use pipeline::Pipeline;
pub use prop::{PropMap, PropValue};
pub use queue::{MutationQueue, Request};
pub use reconcile::{Command, NodeSpec, reconcile};
pub use router::{DispatchOutcome, InputEvent};
pub use sink::{CommandSink, LogSink, RecordingSink};
pub use value::{Color, Value};
pub use watch::{ReloadState, ReloadStatus};
