use std::path::PathBuf;

use nabu_script::SyntaxError;
use nabu_script::ast::Span;
use thiserror::Error;

use crate::kind::WidgetKind;

/// The script parsed but does not describe a valid UI, or failed while running.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SemanticError {
    #[error("{span}: unknown widget kind or function `{name}`")]
    UnknownCall { name: String, span: Span },

    #[error("{span}: `{kind}` is missing an `id`")]
    MissingId { kind: WidgetKind, span: Span },

    #[error("{span}: `{kind}` id must be a non-empty string")]
    InvalidId { kind: WidgetKind, span: Span },

    #[error("{span}: duplicate id `{id}` (first declared at {first})")]
    DuplicateId { id: String, span: Span, first: Span },

    #[error("{span}: malformed property `{key}`: {reason}")]
    MalformedProperty { key: String, reason: String, span: Span },

    #[error("{span}: window `{id}` must be declared at the top level")]
    MisplacedWindow { id: String, span: Span },

    #[error("{span}: top-level `{kind}` `{id}` must be inside a window")]
    NotAWindow { kind: WidgetKind, id: String, span: Span },

    #[error("{span}: `{kind}` `{id}` cannot have children")]
    LeafWithChildren { kind: WidgetKind, id: String, span: Span },

    #[error("{span}: `{kind}` takes keyword arguments only")]
    PositionalWidgetArgs { kind: WidgetKind, span: Span },

    #[error("{span}: `{name}` takes positional arguments only")]
    KeywordArgs { name: String, span: Span },

    #[error("{span}: `{name}` does not take a block")]
    UnexpectedBlock { name: String, span: Span },

    #[error("{span}: `def {name}` is only allowed at the top level")]
    NestedDef { name: String, span: Span },

    #[error("{span}: `{name}` expects {expected} argument(s), got {got}")]
    Arity { name: String, expected: usize, got: usize, span: Span },

    #[error("{span}: {message}")]
    Type { message: String, span: Span },

    #[error("{span}: call depth limit ({limit}) exceeded in `{name}`")]
    RecursionLimit { name: String, limit: usize, span: Span },

    #[error("{span}: widgets nested deeper than {limit} levels")]
    TooDeep { limit: usize, span: Span },
}

/// The reconciler found the live tree and the declaration in a state it
/// cannot express as commands.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconcileError {
    #[error("widget `{id}` changed kind from `{live}` to `{declared}` at the same position")]
    KindMismatch { id: String, live: WidgetKind, declared: WidgetKind },
}

/// A load or reload pass was aborted. The previous live tree and handler
/// table are kept.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReloadError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("semantic error at {0}")]
    Semantic(#[from] SemanticError),

    #[error("reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("failed to read {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },
}

/// An input event or its update payload could not be (fully) applied.
///
/// Never fatal: directives applied before the error are kept.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("no handler named `{name}`")]
    UnknownHandler { name: String },

    #[error("handler `{name}` takes {params} parameters; at most one (the event params) is supported")]
    Arity { name: String, params: usize },

    #[error("handler `{name}` failed: {source}")]
    Handler {
        name: String,
        #[source]
        source: SemanticError,
    },

    #[error("malformed event: {reason}")]
    MalformedEvent { reason: String },

    #[error("malformed update payload: {reason}")]
    MalformedPayload { reason: String },

    #[error("update `{action}` targets unknown widget `{id}`")]
    UnknownTarget { id: String, action: String },

    #[error("unknown update action `{action}` for `{id}`")]
    UnknownAction { id: String, action: String },

    #[error("bad value for `{action}` on `{id}`: {reason}")]
    BadValue { id: String, action: String, reason: String },

    #[error("`{action}` would duplicate widget id `{id}`")]
    DuplicateId { id: String, action: String },

    #[error("reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),
}

/// Anything the pipeline reports to a [`CommandSink`](crate::sink::CommandSink).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("reload failed: {0}")]
    Reload(#[from] ReloadError),

    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semantic_errors_lead_with_position() {
        let e = SemanticError::DuplicateId { id: "b1".into(), span: Span::new(4, 3), first: Span::new(2, 3) };
        assert_eq!(e.to_string(), "4:3: duplicate id `b1` (first declared at 2:3)");
    }

    #[test]
    fn reload_error_wraps_sources() {
        let e: ReloadError = SemanticError::UnknownCall { name: "sldier".into(), span: Span::new(1, 1) }.into();
        assert_eq!(e.to_string(), "semantic error at 1:1: unknown widget kind or function `sldier`");
        let e: ReloadError = nabu_script::parse_str("x = )").unwrap_err().into();
        assert!(e.to_string().starts_with("syntax error at 1:5"));
    }

    #[test]
    fn read_error_shows_path() {
        let e = ReloadError::Read { path: PathBuf::from("ui/main.nabu"), message: "gone".into() };
        assert_eq!(e.to_string(), "failed to read ui/main.nabu: gone");
    }
}
