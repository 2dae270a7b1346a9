//! Event router: run the named handler for an input event and turn its
//! update payload into reconciler commands.
//!
//! A handler returns either `nil`, a list of directives, or a map with an
//! `updates` list. A JSON string of the same shape is accepted too. Each
//! directive is a map:
//!
//! ```nabu
//! {target_id: "result_text", action: "setText", value: "Saved"}
//! ```
//!
//! (`id` is accepted in place of `target_id`.) Directives are applied in
//! order to the declaration forest; a directive that fails is reported and
//! skipped, and earlier ones stay applied. One reconcile pass then produces
//! the commands.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::decl::{DeclForest, DeclNode, MAX_TREE_DEPTH};
use crate::error::DispatchError;
use crate::eval::{self, HandlerTable};
use crate::kind::WidgetKind;
use crate::live::LiveTree;
use crate::prop::{self, PropMap};
use crate::reconcile::{Command, reconcile};
use crate::value::Value;

// ── InputEvent ────────────────────────────────────────────────────────────

/// An input event addressed to a handler by name.
#[derive(Debug, Clone, PartialEq)]
pub struct InputEvent {
    pub widget_id: String,
    pub handler_name: String,
    /// Extra event data, e.g. `value` for a submitted input or `event`
    /// (`"click"`, `"submit"`).
    pub params: IndexMap<String, Value>,
}

#[derive(Deserialize)]
struct WireEvent {
    widget_id: String,
    handler_name: String,
    #[serde(default)]
    params: serde_json::Map<String, serde_json::Value>,
}

impl InputEvent {
    pub fn new(widget_id: impl Into<String>, handler_name: impl Into<String>) -> Self {
        Self { widget_id: widget_id.into(), handler_name: handler_name.into(), params: IndexMap::new() }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Parse `{"widget_id": ..., "handler_name": ..., "params": {...}}`.
    pub fn from_json(src: &str) -> Result<Self, DispatchError> {
        let wire: WireEvent = serde_json::from_str(src)
            .map_err(|e| DispatchError::MalformedEvent { reason: e.to_string() })?;
        Ok(Self {
            widget_id: wire.widget_id,
            handler_name: wire.handler_name,
            params: wire.params.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect(),
        })
    }

    /// The map a one-parameter handler receives. Contains `id` (the widget
    /// id) unless the event supplied its own.
    pub fn params_value(&self) -> Value {
        let mut map = IndexMap::with_capacity(self.params.len() + 1);
        if !self.params.contains_key("id") {
            map.insert("id".to_string(), Value::Str(self.widget_id.clone()));
        }
        map.extend(self.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        Value::Map(map)
    }
}

// ── Directives ────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    SetText,
    SetValue,
    SetVisible,
    SetImage,
    SetPosition,
    SetSize,
    SetStyle,
    SetProperty,
    AppendChild,
    RemoveChild,
    Replace,
}

impl Action {
    const ALL: [Action; 11] = [
        Action::SetText,
        Action::SetValue,
        Action::SetVisible,
        Action::SetImage,
        Action::SetPosition,
        Action::SetSize,
        Action::SetStyle,
        Action::SetProperty,
        Action::AppendChild,
        Action::RemoveChild,
        Action::Replace,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.name() == name)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Action::SetText     => "setText",
            Action::SetValue    => "setValue",
            Action::SetVisible  => "setVisible",
            Action::SetImage    => "setImage",
            Action::SetPosition => "setPosition",
            Action::SetSize     => "setSize",
            Action::SetStyle    => "setStyle",
            Action::SetProperty => "setProperty",
            Action::AppendChild => "appendChild",
            Action::RemoveChild => "removeChild",
            Action::Replace     => "replace",
        }
    }
}

/// One parsed `{target_id, action, value}` entry of an update payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub target: String,
    pub action: Action,
    pub value: Value,
}

/// Commands produced by one event, plus every non-fatal error met on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchOutcome {
    pub commands: Vec<Command>,
    pub errors: Vec<DispatchError>,
}

// ── Dispatch ──────────────────────────────────────────────────────────────

/// Handle one input event.
///
/// The handler table is only read. `forest` is edited in place by the
/// directives. A directive that would change the kind of a live widget is
/// rejected on its own, so the final reconcile sees only directives that
/// applied. Should it still fail, the forest is restored to its state before
/// the event and no commands are produced.
pub fn dispatch(
    handlers: &HandlerTable,
    forest: &mut DeclForest,
    live: &LiveTree,
    event: &InputEvent,
    max_call_depth: usize,
) -> DispatchOutcome {
    let mut outcome = DispatchOutcome::default();

    let Some(closure) = handlers.get(&event.handler_name) else {
        outcome.errors.push(DispatchError::UnknownHandler { name: event.handler_name.clone() });
        return outcome;
    };
    let args = match closure.params.len() {
        0 => Vec::new(),
        1 => vec![event.params_value()],
        n => {
            outcome.errors.push(DispatchError::Arity { name: closure.name.clone(), params: n });
            return outcome;
        }
    };

    let payload = match eval::call_closure(handlers, &closure, args, max_call_depth) {
        Ok(value) => value,
        Err(source) => {
            outcome.errors.push(DispatchError::Handler { name: closure.name.clone(), source });
            return outcome;
        }
    };

    let entries = match payload_entries(payload, true) {
        Ok(entries) => entries,
        Err(e) => {
            outcome.errors.push(e);
            return outcome;
        }
    };
    log::debug!(
        "`{}` from `{}` returned {} directive(s)",
        event.handler_name,
        event.widget_id,
        entries.len()
    );
    if entries.is_empty() {
        return outcome;
    }

    let snapshot = forest.clone();
    for entry in entries {
        if let Err(e) = parse_directive(entry).and_then(|d| apply_directive(forest, live, d)) {
            outcome.errors.push(e);
        }
    }

    match reconcile(live, forest) {
        Ok(commands) => outcome.commands = commands,
        Err(e) => {
            *forest = snapshot;
            outcome.errors.push(e.into());
        }
    }
    outcome
}

fn malformed(reason: impl Into<String>) -> DispatchError {
    DispatchError::MalformedPayload { reason: reason.into() }
}

/// The raw directive values of a payload. `allow_json` permits one level of
/// JSON-string decoding.
fn payload_entries(payload: Value, allow_json: bool) -> Result<Vec<Value>, DispatchError> {
    match payload {
        Value::Nil => Ok(Vec::new()),
        Value::List(items) => Ok(items),
        Value::Str(json) if allow_json => {
            let parsed: serde_json::Value =
                serde_json::from_str(&json).map_err(|e| malformed(format!("invalid JSON: {e}")))?;
            payload_entries(Value::from_json(parsed), false)
        }
        Value::Map(mut map) => match map.shift_remove("updates") {
            Some(Value::List(items)) => Ok(items),
            Some(Value::Nil) => Ok(Vec::new()),
            Some(other) => Err(malformed(format!("`updates` must be a list, got {}", other.type_name()))),
            None if map.contains_key("action") => Ok(vec![Value::Map(map)]),
            None => Err(malformed("expected an `updates` list")),
        },
        other => Err(malformed(format!("expected a map, a list, or nil, got {}", other.type_name()))),
    }
}

fn parse_directive(entry: Value) -> Result<Directive, DispatchError> {
    let mut map = match entry {
        Value::Map(map) => map,
        other => return Err(malformed(format!("directive must be a map, got {}", other.type_name()))),
    };
    let target = match map.shift_remove("target_id").or_else(|| map.shift_remove("id")) {
        Some(v) => v.as_str().map(str::to_string).ok_or_else(|| malformed("`target_id` must be a string"))?,
        None => return Err(malformed("directive has no `target_id`")),
    };
    let action_name = match map.shift_remove("action") {
        Some(v) => v.as_str().map(str::to_string).ok_or_else(|| malformed("`action` must be a string"))?,
        None => return Err(malformed(format!("directive for `{target}` has no `action`"))),
    };
    let action = Action::from_name(&action_name)
        .ok_or(DispatchError::UnknownAction { id: target.clone(), action: action_name })?;
    let value = map.shift_remove("value").unwrap_or(Value::Nil);
    Ok(Directive { target, action, value })
}

fn apply_directive(forest: &mut DeclForest, live: &LiveTree, d: Directive) -> Result<(), DispatchError> {
    let bad = |reason: String| DispatchError::BadValue {
        id: d.target.clone(),
        action: d.action.name().to_string(),
        reason,
    };
    if !forest.contains(&d.target) {
        return Err(DispatchError::UnknownTarget { id: d.target.clone(), action: d.action.name().to_string() });
    }

    match d.action {
        Action::AppendChild => {
            let child = node_from_value(d.value.clone()).map_err(bad)?;
            let is_container = forest.find(&d.target).is_some_and(|n| n.kind.is_container());
            if !is_container {
                return Err(bad("target cannot have children".to_string()));
            }
            if contains_window(&child) {
                return Err(bad("windows can only be top-level".to_string()));
            }
            check_new_ids(forest, &child, &HashSet::new(), d.action)?;
            check_kinds(live, &child, Some(d.target.as_str())).map_err(bad)?;
            check_depth(forest, &d.target, &child, 1).map_err(bad)?;
            if let Some(target) = forest.find_mut(&d.target) {
                target.children.push(child);
            }
            Ok(())
        }
        Action::RemoveChild => {
            let child_id = d.value.as_str().ok_or_else(|| bad("expected the child id".to_string()))?;
            let target = forest.find_mut(&d.target).ok_or_else(|| bad("target vanished".to_string()))?;
            let pos = target
                .children
                .iter()
                .position(|c| c.id == child_id)
                .ok_or_else(|| bad(format!("`{child_id}` is not a child")))?;
            target.children.remove(pos);
            Ok(())
        }
        Action::Replace => {
            let node = node_from_value(d.value.clone()).map_err(bad)?;
            if node.id != d.target {
                return Err(bad(format!("replacement has id `{}`", node.id)));
            }
            let is_root = forest.roots.iter().any(|r| r.id == d.target);
            let nested_window = node.children.iter().any(contains_window);
            if nested_window || (node.kind == WidgetKind::Window) != is_root {
                return Err(bad("windows can only be top-level".to_string()));
            }
            let mut old_ids = HashSet::new();
            if let Some(old) = forest.find(&d.target) {
                old.walk(&mut |n| {
                    old_ids.insert(n.id.clone());
                });
            }
            check_new_ids(forest, &node, &old_ids, d.action)?;
            let parent = parent_of(forest, &d.target);
            check_kinds(live, &node, parent.as_deref()).map_err(bad)?;
            check_depth(forest, &d.target, &node, 0).map_err(bad)?;
            if let Some(target) = forest.find_mut(&d.target) {
                *target = node;
            }
            Ok(())
        }
        action => {
            let updates = property_updates(action, d.value.clone()).map_err(bad)?;
            let mut props = PropMap::new();
            let mut removed = Vec::new();
            for (key, value) in updates {
                if key == "id" {
                    return Err(bad("`id` cannot be changed".to_string()));
                }
                match prop::coerce(&key, value) {
                    Ok(Some(p)) => {
                        props.insert(key, p);
                    }
                    Ok(None) => removed.push(key),
                    Err(reason) => return Err(bad(format!("`{key}`: {reason}"))),
                }
            }
            if let Some(target) = forest.find_mut(&d.target) {
                for key in removed {
                    target.props.shift_remove(&key);
                }
                target.props.extend(props);
            }
            Ok(())
        }
    }
}

/// The `(key, value)` pairs a property action sets.
fn property_updates(action: Action, value: Value) -> Result<Vec<(String, Value)>, String> {
    let single = |key: &str, value: Value| Ok(vec![(key.to_string(), value)]);
    match action {
        Action::SetText => single("text", value),
        Action::SetValue => single("value", value),
        Action::SetImage => match value {
            Value::Str(_) | Value::Symbol(_) => single("source", value),
            other => Err(format!("expected an image path, got {}", other.type_name())),
        },
        Action::SetVisible => match value {
            Value::Bool(_) => single("visible", value),
            other => Err(format!("expected true or false, got {}", other.type_name())),
        },
        Action::SetPosition => pair(value, ("x", "y")),
        Action::SetSize => pair(value, ("width", "height")),
        Action::SetStyle => match value {
            Value::Map(map) => Ok(map.into_iter().collect()),
            other => Err(format!("expected a map of properties, got {}", other.type_name())),
        },
        Action::SetProperty => match value {
            Value::Map(mut map) => {
                let name = map
                    .shift_remove("name")
                    .and_then(|n| n.as_str().map(str::to_string))
                    .ok_or_else(|| "expected `name`".to_string())?;
                single(&name, map.shift_remove("value").unwrap_or(Value::Nil))
            }
            other => Err(format!("expected {{name:, value:}}, got {}", other.type_name())),
        },
        Action::AppendChild | Action::RemoveChild | Action::Replace => Ok(Vec::new()),
    }
}

/// `[a, b]` or `{a_key: a, b_key: b}` → two number updates.
fn pair(value: Value, (a_key, b_key): (&str, &str)) -> Result<Vec<(String, Value)>, String> {
    let (a, b) = match value {
        Value::List(items) => match items.as_slice() {
            [Value::Number(a), Value::Number(b)] => (*a, *b),
            _ => return Err("expected two numbers".to_string()),
        },
        Value::Map(map) => match (map.get(a_key), map.get(b_key)) {
            (Some(Value::Number(a)), Some(Value::Number(b))) => (*a, *b),
            _ => return Err(format!("expected numeric `{a_key}` and `{b_key}`")),
        },
        other => return Err(format!("expected [{a_key}, {b_key}], got {}", other.type_name())),
    };
    Ok(vec![(a_key.to_string(), Value::Number(a)), (b_key.to_string(), Value::Number(b))])
}

/// A widget value, or a map with `kind`, `id`, optional `children`, and
/// properties.
fn node_from_value(value: Value) -> Result<DeclNode, String> {
    match value {
        Value::Node(node) => Ok(*node),
        Value::Map(mut map) => {
            let kind_name = map.shift_remove("kind").and_then(|k| k.as_str().map(str::to_string));
            let kind = kind_name
                .as_deref()
                .and_then(WidgetKind::from_name)
                .ok_or_else(|| format!("unknown widget kind {:?}", kind_name.unwrap_or_default()))?;
            let id = match map.shift_remove("id") {
                Some(v) => v.as_str().filter(|s| !s.is_empty()).map(str::to_string),
                None => None,
            }
            .ok_or_else(|| "widget needs a non-empty string `id`".to_string())?;
            let children = match map.shift_remove("children") {
                None | Some(Value::Nil) => Vec::new(),
                Some(Value::List(items)) => items.into_iter().map(node_from_value).collect::<Result<_, _>>()?,
                Some(other) => return Err(format!("`children` must be a list, got {}", other.type_name())),
            };
            if !kind.is_container() && !children.is_empty() {
                return Err(format!("`{kind}` cannot have children"));
            }
            let mut node = DeclNode::new(kind, id);
            node.children = children;
            for (key, v) in map {
                if let Some(p) = prop::coerce(&key, v).map_err(|e| format!("`{key}`: {e}"))? {
                    node.props.insert(key, p);
                }
            }
            Ok(node)
        }
        other => Err(format!("expected a widget, got {}", other.type_name())),
    }
}

fn contains_window(node: &DeclNode) -> bool {
    node.kind == WidgetKind::Window || node.children.iter().any(contains_window)
}

/// A node that lands under the same parent as a live widget with its id must
/// keep that widget's kind.
fn check_kinds(live: &LiveTree, node: &DeclNode, parent: Option<&str>) -> Result<(), String> {
    if let Some(entity) = live.get(&node.id) {
        if entity.parent.as_deref() == parent && entity.kind != node.kind {
            return Err(format!("`{}` is a {}, not a {}", node.id, entity.kind, node.kind));
        }
    }
    node.children.iter().try_for_each(|c| check_kinds(live, c, Some(node.id.as_str())))
}

/// `node` placed `below` levels under `target` must not push the tree past
/// [`MAX_TREE_DEPTH`].
fn check_depth(forest: &DeclForest, target: &str, node: &DeclNode, below: usize) -> Result<(), String> {
    let level = level_of(&forest.roots, target, 1).unwrap_or(1);
    if level - 1 + below + node.depth() > MAX_TREE_DEPTH {
        return Err(format!("widgets would nest deeper than {MAX_TREE_DEPTH} levels"));
    }
    Ok(())
}

/// 1-based level of `id` among `nodes` and their descendants.
fn level_of(nodes: &[DeclNode], id: &str, level: usize) -> Option<usize> {
    nodes.iter().find_map(|n| if n.id == id { Some(level) } else { level_of(&n.children, id, level + 1) })
}

/// The id of the node holding `id` in `forest`, or `None` for a root.
fn parent_of(forest: &DeclForest, id: &str) -> Option<String> {
    let mut parent = None;
    forest.walk(&mut |n| {
        if n.children.iter().any(|c| c.id == id) {
            parent = Some(n.id.clone());
        }
    });
    parent
}

/// Every id in `node` must be new to `forest` (ids in `replaced` are about to
/// go away) and unique within `node`.
fn check_new_ids(
    forest: &DeclForest,
    node: &DeclNode,
    replaced: &HashSet<String>,
    action: Action,
) -> Result<(), DispatchError> {
    let mut seen = HashSet::new();
    let mut dup = None;
    node.walk(&mut |n| {
        let clash = !seen.insert(n.id.as_str()) || (forest.contains(&n.id) && !replaced.contains(&n.id));
        if clash && dup.is_none() {
            dup = Some(n.id.clone());
        }
    });
    match dup {
        Some(id) => Err(DispatchError::DuplicateId { id, action: action.name().to_string() }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::evaluate;
    use crate::prop::PropValue;

    const DEPTH: usize = 64;

    struct Fixture {
        handlers: HandlerTable,
        forest: DeclForest,
        live: LiveTree,
    }

    impl Fixture {
        fn new(src: &str) -> Self {
            let ev = evaluate(&nabu_script::parse_str(src).unwrap(), DEPTH).unwrap();
            let mut live = LiveTree::new();
            for cmd in reconcile(&live, &ev.forest).unwrap() {
                live.apply(&cmd);
            }
            Self { handlers: ev.handlers, forest: ev.forest, live }
        }

        fn fire(&mut self, event: InputEvent) -> DispatchOutcome {
            let outcome = dispatch(&self.handlers, &mut self.forest, &self.live, &event, DEPTH);
            for cmd in &outcome.commands {
                self.live.apply(cmd);
            }
            outcome
        }
    }

    const UI: &str = r#"
window(id: "w") do
  column(id: "col") do
    button(id: "b1", text: "Click", on_click: "clicked")
    text(id: "result_text", content: "...")
  end
end
"#;

    fn with_handler(body: &str) -> Fixture {
        Fixture::new(&format!("def clicked(params)\n{body}\nend\n{UI}"))
    }

    fn changed(pairs: &[(&str, PropValue)]) -> PropMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn set_text_is_one_update() {
        let mut fx = with_handler(r#"  {updates: [{target_id: "result_text", action: "setText", value: "X"}]}"#);
        let outcome = fx.fire(InputEvent::new("b1", "clicked"));
        assert!(outcome.errors.is_empty());
        assert_eq!(
            outcome.commands,
            vec![Command::UpdateProperties {
                id: "result_text".into(),
                changed: changed(&[("text", PropValue::from("X"))]),
            }]
        );
    }

    #[test]
    fn missing_handler_changes_nothing() {
        let mut fx = Fixture::new(UI);
        let before = fx.forest.clone();
        let outcome = fx.fire(InputEvent::new("b1", "clicked"));
        assert_eq!(outcome.errors, vec![DispatchError::UnknownHandler { name: "clicked".into() }]);
        assert!(outcome.commands.is_empty());
        assert_eq!(fx.forest, before);
    }

    #[test]
    fn params_carry_widget_id() {
        let mut fx = with_handler(r#"  [{id: "result_text", action: "setText", value: "from #{params['id']} #{params['event']}"}]"#);
        let outcome = fx.fire(InputEvent::new("b1", "clicked").param("event", "click"));
        let Command::UpdateProperties { changed, .. } = &outcome.commands[0] else { panic!("expected update") };
        assert_eq!(changed["text"], PropValue::from("from b1 click"));
    }

    #[test]
    fn unknown_target_does_not_stop_later_directives() {
        let mut fx = with_handler(
            r#"  {updates: [
    {target_id: "nope", action: "setText", value: "A"},
    {target_id: "result_text", action: "explode"},
    {target_id: "result_text", action: "setText", value: "B"}
  ]}"#,
        );
        let outcome = fx.fire(InputEvent::new("b1", "clicked"));
        assert_eq!(outcome.errors.len(), 2);
        assert!(matches!(&outcome.errors[0], DispatchError::UnknownTarget { id, .. } if id == "nope"));
        assert!(matches!(&outcome.errors[1], DispatchError::UnknownAction { action, .. } if action == "explode"));
        assert_eq!(outcome.commands.len(), 1);
    }

    #[test]
    fn json_string_payload() {
        let mut fx = with_handler(
            r#"  '{"updates": [{"id": "result_text", "action": "setText", "value": "json"}]}'"#,
        );
        let outcome = fx.fire(InputEvent::new("b1", "clicked"));
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        assert_eq!(outcome.commands.len(), 1);
        assert_eq!(fx.live.get("result_text").unwrap().props["text"], PropValue::from("json"));
    }

    #[test]
    fn nil_payload_is_a_no_op() {
        let mut fx = with_handler("  log(params)");
        let outcome = fx.fire(InputEvent::new("b1", "clicked"));
        assert_eq!(outcome, DispatchOutcome::default());
    }

    #[test]
    fn malformed_payload() {
        let mut fx = with_handler("  42");
        let outcome = fx.fire(InputEvent::new("b1", "clicked"));
        assert!(matches!(&outcome.errors[..], [DispatchError::MalformedPayload { .. }]));
    }

    #[test]
    fn append_child_built_in_handler() {
        let mut fx = with_handler(
            r#"  [{target_id: "col", action: "appendChild", value: text(id: "note", content: "added")}]"#,
        );
        let outcome = fx.fire(InputEvent::new("b1", "clicked"));
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        assert!(
            matches!(&outcome.commands[..], [Command::Create { parent: Some(p), node }] if p == "col" && node.id == "note")
        );
        assert_eq!(fx.live.get("col").unwrap().children, ["b1", "result_text", "note"]);
    }

    #[test]
    fn append_child_from_map_with_children() {
        let mut fx = with_handler(
            r#"  [{target_id: "col", action: "appendChild", value: {kind: "row", id: "r", children: [{kind: "button", id: "rb", text: "hi"}]}}]"#,
        );
        let outcome = fx.fire(InputEvent::new("b1", "clicked"));
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        assert_eq!(outcome.commands.len(), 2);
        assert_eq!(fx.live.get("rb").unwrap().parent.as_deref(), Some("r"));
    }

    #[test]
    fn append_child_rejects_duplicate_ids() {
        let mut fx = with_handler(r#"  [{target_id: "col", action: "appendChild", value: text(id: "b1")}]"#);
        let outcome = fx.fire(InputEvent::new("b1", "clicked"));
        assert_eq!(outcome.errors, vec![DispatchError::DuplicateId { id: "b1".into(), action: "appendChild".into() }]);
        assert!(outcome.commands.is_empty());
    }

    #[test]
    fn append_child_to_leaf_is_rejected() {
        let mut fx = with_handler(r#"  [{target_id: "b1", action: "appendChild", value: text(id: "t")}]"#);
        let outcome = fx.fire(InputEvent::new("b1", "clicked"));
        assert!(matches!(&outcome.errors[..], [DispatchError::BadValue { .. }]));
    }

    #[test]
    fn remove_child_destroys() {
        let mut fx = with_handler(r#"  [{target_id: "col", action: "removeChild", value: "b1"}]"#);
        let outcome = fx.fire(InputEvent::new("b1", "clicked"));
        assert_eq!(outcome.commands, vec![Command::Destroy { id: "b1".into() }]);
        assert!(!fx.forest.contains("b1"));
    }

    #[test]
    fn replace_subtree() {
        let mut fx = with_handler(
            r#"  [{target_id: "col", action: "replace", value: column(id: "col", spacing: 4) { text(id: "result_text", content: "...") }}]"#,
        );
        let outcome = fx.fire(InputEvent::new("b1", "clicked"));
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        assert_eq!(
            outcome.commands,
            vec![
                Command::Destroy { id: "b1".into() },
                Command::UpdateProperties { id: "col".into(), changed: changed(&[("spacing", PropValue::from(4.0))]) },
            ]
        );
    }

    #[test]
    fn kind_change_rejects_only_that_directive() {
        let mut fx = with_handler(
            r#"  [
    {target_id: "result_text", action: "setText", value: "X"},
    {target_id: "b1", action: "replace", value: text(id: "b1")}
  ]"#,
        );
        let outcome = fx.fire(InputEvent::new("b1", "clicked"));
        assert!(
            matches!(&outcome.errors[..], [DispatchError::BadValue { id, action, .. }] if id == "b1" && action == "replace"),
            "{:?}",
            outcome.errors
        );
        assert_eq!(
            outcome.commands,
            vec![Command::UpdateProperties {
                id: "result_text".into(),
                changed: changed(&[("text", PropValue::from("X"))]),
            }]
        );
        assert_eq!(fx.forest.find("b1").map(|n| n.kind), Some(WidgetKind::Button));
        assert_eq!(fx.live.get("b1").map(|e| e.kind), Some(WidgetKind::Button));
    }

    #[test]
    fn readding_a_removed_id_with_another_kind_is_rejected() {
        let mut fx = with_handler(
            r#"  [
    {target_id: "col", action: "removeChild", value: "b1"},
    {target_id: "col", action: "appendChild", value: text(id: "b1")}
  ]"#,
        );
        let outcome = fx.fire(InputEvent::new("b1", "clicked"));
        assert!(matches!(&outcome.errors[..], [DispatchError::BadValue { action, .. }] if action == "appendChild"));
        assert_eq!(outcome.commands, vec![Command::Destroy { id: "b1".into() }]);
    }

    #[test]
    fn appended_widgets_cannot_nest_past_the_limit() {
        let mut fx = with_handler(
            r#"  [{target_id: params['parent'], action: "appendChild", value: column(id: params['child'])}]"#,
        );
        let mut parent = "col".to_string();
        let mut accepted = 0;
        for i in 0..MAX_TREE_DEPTH {
            let child = format!("n{i}");
            let event = InputEvent::new("b1", "clicked").param("parent", parent.as_str()).param("child", child.as_str());
            let outcome = fx.fire(event);
            if !outcome.errors.is_empty() {
                assert!(matches!(&outcome.errors[..], [DispatchError::BadValue { action, .. }] if action == "appendChild"));
                break;
            }
            accepted += 1;
            parent = child;
        }
        // `col` sits at level 2, so its descendants can fill the rest
        assert_eq!(accepted, MAX_TREE_DEPTH - 2);
        assert_eq!(fx.live.len(), 4 + accepted);
    }

    #[test]
    fn property_actions() {
        let mut fx = with_handler(
            r##"  [
    {target_id: "b1", action: "setPosition", value: [10, 20]},
    {target_id: "b1", action: "setSize", value: {width: 100, height: 30}},
    {target_id: "b1", action: "setVisible", value: false},
    {target_id: "b1", action: "setStyle", value: {bg: "#102030", corner_radius: 4}},
    {target_id: "b1", action: "setProperty", value: {name: "tooltip", value: "Press"}},
    {target_id: "b1", action: "setImage", value: "assets/icon.png"},
    {target_id: "b1", action: "setValue", value: 3}
  ]"##,
        );
        let outcome = fx.fire(InputEvent::new("b1", "clicked"));
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        let [Command::UpdateProperties { id, changed }] = &outcome.commands[..] else {
            panic!("expected one update, got {:?}", outcome.commands)
        };
        assert_eq!(id, "b1");
        let keys: Vec<_> = changed.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            ["x", "y", "width", "height", "visible", "bg", "corner_radius", "tooltip", "source", "value"]
        );
        assert_eq!(changed["bg"], PropValue::Color(crate::value::Color::rgb(0x10, 0x20, 0x30)));
    }

    #[test]
    fn bad_values_are_reported() {
        let mut fx = with_handler(
            r#"  [
    {target_id: "b1", action: "setVisible", value: "yes"},
    {target_id: "b1", action: "setPosition", value: [1]},
    {target_id: "b1", action: "setProperty", value: {name: "id", value: "x"}}
  ]"#,
        );
        let outcome = fx.fire(InputEvent::new("b1", "clicked"));
        assert_eq!(outcome.errors.len(), 3);
        assert!(outcome.errors.iter().all(|e| matches!(e, DispatchError::BadValue { .. })));
        assert!(outcome.commands.is_empty());
    }

    #[test]
    fn handler_arity_and_failures() {
        let mut fx = Fixture::new(&format!("def clicked(a, b)\n  nil\nend\n{UI}"));
        let outcome = fx.fire(InputEvent::new("b1", "clicked"));
        assert_eq!(outcome.errors, vec![DispatchError::Arity { name: "clicked".into(), params: 2 }]);

        let mut fx = Fixture::new(&format!("def clicked\n  1 + nil\nend\n{UI}"));
        let outcome = fx.fire(InputEvent::new("b1", "clicked"));
        assert!(matches!(&outcome.errors[..], [DispatchError::Handler { name, .. }] if name == "clicked"));
    }

    #[test]
    fn event_from_json() {
        let event = InputEvent::from_json(r#"{"widget_id": "name_input", "handler_name": "submit", "params": {"value": "Ada"}}"#).unwrap();
        assert_eq!(event.widget_id, "name_input");
        let Value::Map(params) = event.params_value() else { panic!("expected map") };
        assert_eq!(params.keys().collect::<Vec<_>>(), ["id", "value"]);
        assert_eq!(params["value"], Value::from("Ada"));
        assert!(matches!(InputEvent::from_json("{}"), Err(DispatchError::MalformedEvent { .. })));
    }
}
