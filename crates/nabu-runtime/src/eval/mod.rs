//! Script evaluation: one top-to-bottom pass over the AST producing the
//! declaration forest and the handler table.
//!
//! # Declaration context
//!
//! A widget call in statement position is *attached*: at the top level it
//! becomes a root (and must be a `window`); inside a widget's block it becomes
//! a child of that widget. Function bodies inherit the caller's context, so a
//! function can act as a reusable component that emits several widgets.
//!
//! A widget call anywhere else (an argument, an assignment, the body of a
//! handler running for an event) just evaluates to a [`Value::Node`].
//!
//! ```nabu
//! def field(name)
//!   text(id: "#{name}_label", content: name)
//!   input(id: "#{name}_input")
//! end
//!
//! window(id: "main") do
//!   field("email")          # attaches two widgets
//! end
//! ```

mod builtins;
mod handler;

pub use handler::{Closure, HandlerTable};

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;

use indexmap::IndexMap;
use nabu_script::ast::{
    BinaryOp, Block, Call, Expr, FunctionDef, Literal, Script, Span, Stmt, StrPart, UnaryOp,
};

use crate::decl::{DeclForest, DeclNode, MAX_TREE_DEPTH};
use crate::error::SemanticError;
use crate::kind::WidgetKind;
use crate::prop::{self, PropMap};
use crate::value::Value;

/// Output of a successful evaluation pass.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub forest: DeclForest,
    pub handlers: HandlerTable,
}

/// Evaluate a whole script.
///
/// `def`s are registered without running their bodies. Widget calls run
/// immediately, in order. Ids must be unique across the whole pass.
pub fn evaluate(script: &Script, max_call_depth: usize) -> Result<Evaluation, SemanticError> {
    let mut ev = Evaluator::new(Cow::Owned(HandlerTable::new()), max_call_depth);
    ev.targets.push(Target::Roots(Vec::new()));
    ev.exec_body(&script.body)?;

    let roots = match ev.targets.pop() {
        Some(Target::Roots(roots)) => roots,
        _ => Vec::new(),
    };
    let forest = DeclForest::new(roots);
    if let Some((dup, first)) = forest.first_duplicate() {
        return Err(SemanticError::DuplicateId { id: dup.id.clone(), span: dup.span, first: first.span });
    }

    let handlers = ev.handlers.into_owned();
    log::debug!(
        "evaluated {} window(s), {} widget(s), {} function(s)",
        forest.roots.len(),
        forest.len(),
        handlers.len()
    );
    Ok(Evaluation { forest, handlers })
}

/// Run `closure` with `args` outside any declaration context, as the event
/// router does for handlers.
pub fn call_closure(
    handlers: &HandlerTable,
    closure: &Closure,
    args: Vec<Value>,
    max_call_depth: usize,
) -> Result<Value, SemanticError> {
    let mut ev = Evaluator::new(Cow::Borrowed(handlers), max_call_depth);
    ev.invoke(closure, args, closure.span)
}

// ── Evaluator ─────────────────────────────────────────────────────────────

/// Where attached widgets go.
enum Target {
    Roots(Vec<DeclNode>),
    Children(Vec<DeclNode>),
}

struct Evaluator<'h> {
    handlers: Cow<'h, HandlerTable>,
    /// One variable frame per active function call, plus the top level.
    frames: Vec<HashMap<String, Value>>,
    targets: Vec<Target>,
    /// Nesting of blocks and `if` bodies in the current frame.
    block_depth: usize,
    /// Widget blocks currently open; a widget built now sits one level below.
    widget_depth: usize,
    call_depth: usize,
    max_call_depth: usize,
}

impl<'h> Evaluator<'h> {
    fn new(handlers: Cow<'h, HandlerTable>, max_call_depth: usize) -> Self {
        Self {
            handlers,
            frames: vec![HashMap::new()],
            targets: Vec::new(),
            block_depth: 0,
            widget_depth: 0,
            call_depth: 0,
            max_call_depth,
        }
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.frames.last().and_then(|frame| frame.get(name))
    }

    fn set_var(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), value);
        }
    }

    // ── Statements ────────────────────────────────────────────────────────

    /// Runs `body` and returns the value of its last statement.
    fn exec_body(&mut self, body: &[Stmt]) -> Result<Value, SemanticError> {
        let mut last = Value::Nil;
        for stmt in body {
            last = self.exec_stmt(stmt)?;
        }
        Ok(last)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Value, SemanticError> {
        match stmt {
            Stmt::Expr(Expr::Call(call)) if !self.targets.is_empty() => {
                match WidgetKind::from_name(&call.name) {
                    Some(kind) => {
                        let node = self.build_widget(call, kind)?;
                        self.attach(node)?;
                        Ok(Value::Nil)
                    }
                    None => self.eval_call(call),
                }
            }
            // A bare name naming a zero-parameter function calls it, so
            // components can be used as `header` as well as `header()`.
            Stmt::Expr(Expr::Ident(name, span)) if self.lookup(name).is_none() => {
                match self.handlers.get(name) {
                    Some(closure) if closure.params.is_empty() => self.invoke(&closure, Vec::new(), *span),
                    _ => Ok(Value::Symbol(name.clone())),
                }
            }
            Stmt::Expr(expr) => self.eval(expr),
            Stmt::Assignment(assign) => {
                let value = self.eval(&assign.value)?;
                self.set_var(&assign.name, value.clone());
                Ok(value)
            }
            Stmt::Def(def) => self.define(def),
            Stmt::If(stmt) => {
                let cond = self.eval(&stmt.cond)?;
                let branch = if cond.is_truthy() { &stmt.then_body } else { &stmt.else_body };
                self.block_depth += 1;
                let result = self.exec_body(branch);
                self.block_depth -= 1;
                result
            }
        }
    }

    fn define(&mut self, def: &FunctionDef) -> Result<Value, SemanticError> {
        if self.call_depth > 0 || self.block_depth > 0 {
            return Err(SemanticError::NestedDef { name: def.name.clone(), span: def.span });
        }
        if WidgetKind::from_name(&def.name).is_some() {
            return Err(SemanticError::Type {
                message: format!("`{}` is a widget kind and cannot be redefined", def.name),
                span: def.span,
            });
        }
        let captured = self.frames.last().cloned().unwrap_or_default();
        self.handlers.to_mut().define(Closure {
            name: def.name.clone(),
            params: def.params.clone(),
            body: def.body.clone(),
            captured,
            span: def.span,
        });
        Ok(Value::Nil)
    }

    // ── Widgets ───────────────────────────────────────────────────────────

    fn build_widget(&mut self, call: &Call, kind: WidgetKind) -> Result<DeclNode, SemanticError> {
        if self.widget_depth >= MAX_TREE_DEPTH {
            return Err(SemanticError::TooDeep { limit: MAX_TREE_DEPTH, span: call.span });
        }
        if !call.args.is_empty() {
            return Err(SemanticError::PositionalWidgetArgs { kind, span: call.span });
        }

        let mut id = None;
        let mut props = PropMap::new();
        for kwarg in &call.kwargs {
            let value = self.eval(&kwarg.value)?;
            if kwarg.key == "id" {
                match value.as_str() {
                    Some(s) if !s.is_empty() => id = Some(s.to_string()),
                    _ => return Err(SemanticError::InvalidId { kind, span: kwarg.span }),
                }
                continue;
            }
            match prop::coerce(&kwarg.key, value) {
                Ok(Some(p)) => {
                    props.insert(kwarg.key.clone(), p);
                }
                Ok(None) => {}
                Err(reason) => {
                    return Err(SemanticError::MalformedProperty {
                        key: kwarg.key.clone(),
                        reason,
                        span: kwarg.span,
                    });
                }
            }
        }
        let id = id.ok_or(SemanticError::MissingId { kind, span: call.span })?;

        let children = match &call.block {
            None => Vec::new(),
            Some(block) if !kind.is_container() => {
                return Err(SemanticError::LeafWithChildren { kind, id, span: block.span });
            }
            Some(block) => self.eval_children(block)?,
        };

        Ok(DeclNode { kind, id, props, children, span: call.span })
    }

    fn eval_children(&mut self, block: &Block) -> Result<Vec<DeclNode>, SemanticError> {
        self.targets.push(Target::Children(Vec::new()));
        self.block_depth += 1;
        self.widget_depth += 1;
        let result = self.exec_body(&block.body);
        self.widget_depth -= 1;
        self.block_depth -= 1;
        let target = self.targets.pop();
        result?;
        match target {
            Some(Target::Children(nodes)) => Ok(nodes),
            _ => Ok(Vec::new()),
        }
    }

    fn attach(&mut self, node: DeclNode) -> Result<(), SemanticError> {
        match self.targets.last_mut() {
            Some(Target::Roots(roots)) => {
                if node.kind != WidgetKind::Window {
                    return Err(SemanticError::NotAWindow { kind: node.kind, id: node.id, span: node.span });
                }
                roots.push(node);
            }
            Some(Target::Children(children)) => {
                if node.kind == WidgetKind::Window {
                    return Err(SemanticError::MisplacedWindow { id: node.id, span: node.span });
                }
                children.push(node);
            }
            None => {}
        }
        Ok(())
    }

    // ── Calls ─────────────────────────────────────────────────────────────

    fn eval_call(&mut self, call: &Call) -> Result<Value, SemanticError> {
        if let Some(kind) = WidgetKind::from_name(&call.name) {
            return self.build_widget(call, kind).map(|node| Value::Node(Box::new(node)));
        }

        let closure = self.handlers.get(&call.name);
        if closure.is_none() && !builtins::is_builtin(&call.name) {
            return Err(SemanticError::UnknownCall { name: call.name.clone(), span: call.span });
        }
        if !call.kwargs.is_empty() {
            return Err(SemanticError::KeywordArgs { name: call.name.clone(), span: call.span });
        }
        if call.block.is_some() {
            return Err(SemanticError::UnexpectedBlock { name: call.name.clone(), span: call.span });
        }

        let args = call.args.iter().map(|arg| self.eval(arg)).collect::<Result<Vec<_>, _>>()?;
        match closure {
            Some(closure) => self.invoke(&closure, args, call.span),
            None => builtins::call(&call.name, args, call.span)
                .unwrap_or_else(|| Err(SemanticError::UnknownCall { name: call.name.clone(), span: call.span })),
        }
    }

    fn invoke(&mut self, closure: &Closure, args: Vec<Value>, span: Span) -> Result<Value, SemanticError> {
        if args.len() != closure.params.len() {
            return Err(SemanticError::Arity {
                name: closure.name.clone(),
                expected: closure.params.len(),
                got: args.len(),
                span,
            });
        }
        if self.call_depth >= self.max_call_depth {
            return Err(SemanticError::RecursionLimit {
                name: closure.name.clone(),
                limit: self.max_call_depth,
                span,
            });
        }

        let mut frame = closure.captured.clone();
        for (param, arg) in closure.params.iter().zip(args) {
            frame.insert(param.clone(), arg);
        }
        self.frames.push(frame);
        self.call_depth += 1;
        let result = self.exec_body(&closure.body);
        self.call_depth -= 1;
        self.frames.pop();
        result
    }

    // ── Expressions ───────────────────────────────────────────────────────

    fn eval(&mut self, expr: &Expr) -> Result<Value, SemanticError> {
        match expr {
            Expr::Literal(lit, _) => Ok(match lit {
                Literal::Str(s) => Value::Str(s.clone()),
                Literal::Number(n) => Value::Number(*n),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Nil => Value::Nil,
            }),
            Expr::Interpolated(parts, _) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        StrPart::Text(text) => out.push_str(text),
                        StrPart::Interp(expr) => out.push_str(&self.eval(expr)?.to_string()),
                    }
                }
                Ok(Value::Str(out))
            }
            Expr::Ident(name, _) => Ok(self.lookup(name).cloned().unwrap_or_else(|| Value::Symbol(name.clone()))),
            Expr::Symbol(name, _) => Ok(Value::Symbol(name.clone())),
            Expr::List(items, _) => {
                items.iter().map(|item| self.eval(item)).collect::<Result<_, _>>().map(Value::List)
            }
            Expr::Map(entries, _) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for entry in entries {
                    let value = self.eval(&entry.value)?;
                    map.insert(entry.key.clone(), value);
                }
                Ok(Value::Map(map))
            }
            Expr::Call(call) => self.eval_call(call),
            Expr::Index { target, index, span } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                index_value(target, index, *span)
            }
            Expr::Field { target, name, span } => {
                let target = self.eval(target)?;
                field_value(target, name, *span)
            }
            Expr::Unary { op, operand, span } => {
                let value = self.eval(operand)?;
                match (op, value) {
                    (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
                    (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
                    (UnaryOp::Neg, other) => Err(SemanticError::Type {
                        message: format!("cannot negate {}", other.type_name()),
                        span: *span,
                    }),
                }
            }
            Expr::Binary { op, lhs, rhs, span } => {
                // `and` / `or` short-circuit and yield an operand, not a bool.
                match op {
                    BinaryOp::And => {
                        let l = self.eval(lhs)?;
                        return if l.is_truthy() { self.eval(rhs) } else { Ok(l) };
                    }
                    BinaryOp::Or => {
                        let l = self.eval(lhs)?;
                        return if l.is_truthy() { Ok(l) } else { self.eval(rhs) };
                    }
                    _ => {}
                }
                let l = self.eval(lhs)?;
                let r = self.eval(rhs)?;
                binary(*op, l, r, *span)
            }
        }
    }
}

fn op_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add   => "+",
        BinaryOp::Sub   => "-",
        BinaryOp::Mul   => "*",
        BinaryOp::Div   => "/",
        BinaryOp::Eq    => "==",
        BinaryOp::NotEq => "!=",
        BinaryOp::Lt    => "<",
        BinaryOp::Le    => "<=",
        BinaryOp::Gt    => ">",
        BinaryOp::Ge    => ">=",
        BinaryOp::And   => "and",
        BinaryOp::Or    => "or",
    }
}

fn binary(op: BinaryOp, l: Value, r: Value, span: Span) -> Result<Value, SemanticError> {
    use Value::{List, Number, Str};

    let ordering = |ord: Option<Ordering>| -> Value {
        Value::Bool(match (op, ord) {
            (BinaryOp::Lt, Some(o)) => o.is_lt(),
            (BinaryOp::Le, Some(o)) => o.is_le(),
            (BinaryOp::Gt, Some(o)) => o.is_gt(),
            (BinaryOp::Ge, Some(o)) => o.is_ge(),
            _ => false,
        })
    };

    Ok(match (op, l, r) {
        (BinaryOp::Eq, l, r) => Value::Bool(l.loose_eq(&r)),
        (BinaryOp::NotEq, l, r) => Value::Bool(!l.loose_eq(&r)),
        (BinaryOp::Add, Number(a), Number(b)) => Number(a + b),
        (BinaryOp::Add, List(mut a), List(b)) => {
            a.extend(b);
            List(a)
        }
        (BinaryOp::Add, Str(a), r) => Str(format!("{a}{r}")),
        (BinaryOp::Sub, Number(a), Number(b)) => Number(a - b),
        (BinaryOp::Mul, Number(a), Number(b)) => Number(a * b),
        (BinaryOp::Div, Number(_), Number(b)) if b == 0.0 => {
            return Err(SemanticError::Type { message: "division by zero".to_string(), span });
        }
        (BinaryOp::Div, Number(a), Number(b)) => Number(a / b),
        (BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge, Number(a), Number(b)) => {
            ordering(a.partial_cmp(&b))
        }
        (BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge, l, r)
            if l.as_str().is_some() && r.as_str().is_some() =>
        {
            ordering(l.as_str().partial_cmp(&r.as_str()))
        }
        (op, l, r) => {
            return Err(SemanticError::Type {
                message: format!("cannot apply `{}` to {} and {}", op_symbol(op), l.type_name(), r.type_name()),
                span,
            });
        }
    })
}

fn index_value(target: Value, index: Value, span: Span) -> Result<Value, SemanticError> {
    match (target, index) {
        (Value::List(items), Value::Number(n)) => Ok(list_get(items, n)),
        (Value::Points(points), Value::Number(n)) => Ok(list_get(
            points.into_iter().map(|[x, y]| Value::List(vec![Value::Number(x), Value::Number(y)])).collect(),
            n,
        )),
        (Value::Str(s), Value::Number(n)) => Ok(list_get(
            s.chars().map(|c| Value::Str(c.to_string())).collect(),
            n,
        )),
        (Value::Map(mut map), key) if key.as_str().is_some() => {
            Ok(key.as_str().and_then(|k| map.swap_remove(k)).unwrap_or(Value::Nil))
        }
        (Value::Node(node), key) if key.as_str().is_some() => {
            Ok(key.as_str().map(|k| node_field(&node, k)).unwrap_or(Value::Nil))
        }
        (target, index) => Err(SemanticError::Type {
            message: format!("cannot index {} with {}", target.type_name(), index.type_name()),
            span,
        }),
    }
}

/// Integral index; negative counts from the end. Out of range is `nil`.
fn list_get(mut items: Vec<Value>, n: f64) -> Value {
    if n.fract() != 0.0 {
        return Value::Nil;
    }
    let len = items.len() as i64;
    let i = if n < 0.0 { len + n as i64 } else { n as i64 };
    if (0..len).contains(&i) { items.swap_remove(i as usize) } else { Value::Nil }
}

fn field_value(target: Value, name: &str, span: Span) -> Result<Value, SemanticError> {
    match target {
        Value::Map(mut map) => Ok(map.swap_remove(name).unwrap_or(Value::Nil)),
        Value::Node(node) => Ok(node_field(&node, name)),
        Value::Color(c) => match name {
            "r" => Ok(Value::Number(c.r.into())),
            "g" => Ok(Value::Number(c.g.into())),
            "b" => Ok(Value::Number(c.b.into())),
            "a" => Ok(Value::Number(c.a.into())),
            _ => Err(no_field("color", name, span)),
        },
        other => Err(no_field(other.type_name(), name, span)),
    }
}

fn no_field(type_name: &str, name: &str, span: Span) -> SemanticError {
    SemanticError::Type { message: format!("{type_name} has no field `{name}`"), span }
}

fn node_field(node: &DeclNode, name: &str) -> Value {
    match name {
        "id" => Value::Str(node.id.clone()),
        "kind" => Value::Str(node.kind.name().to_string()),
        "children" => Value::List(node.children.iter().cloned().map(|c| Value::Node(Box::new(c))).collect()),
        _ => node.props.get(name).map(|p| p.to_value()).unwrap_or(Value::Nil),
    }
}
