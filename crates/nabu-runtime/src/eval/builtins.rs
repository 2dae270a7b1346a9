use nabu_script::ast::Span;

use crate::error::SemanticError;
use crate::value::{Color, Value};

/// Functions every script can call. User `def`s with the same name shadow them.
const BUILTINS: &[&str] = &["rgb", "rgba", "hex", "points", "str", "len", "log", "puts"];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Call builtin `name`. Returns `None` if there is no such builtin.
pub fn call(name: &str, args: Vec<Value>, span: Span) -> Option<Result<Value, SemanticError>> {
    let result = match name {
        "rgb" => color(name, &args, 3, span),
        "rgba" => color(name, &args, 4, span),
        "hex" => match args.as_slice() {
            [v] => match v.as_str() {
                Some(s) => Color::parse(s).map(Value::Color).ok_or_else(|| SemanticError::Type {
                    message: format!("`{s}` is not a color"),
                    span,
                }),
                None => Err(type_error(name, "a string", v, span)),
            },
            _ => Err(arity(name, 1, args.len(), span)),
        },
        "points" => match args.as_slice() {
            [Value::Points(p)] => Ok(Value::Points(p.clone())),
            [Value::List(items)] => items
                .iter()
                .map(Value::as_point)
                .collect::<Option<Vec<_>>>()
                .map(Value::Points)
                .ok_or_else(|| SemanticError::Type {
                    message: "`points` expects a list of [x, y] pairs".to_string(),
                    span,
                }),
            [other] => Err(type_error(name, "a list", other, span)),
            _ => Err(arity(name, 1, args.len(), span)),
        },
        "str" => match args.as_slice() {
            [v] => Ok(Value::Str(v.to_string())),
            _ => Err(arity(name, 1, args.len(), span)),
        },
        "len" => match args.as_slice() {
            [Value::Str(s)] | [Value::Symbol(s)] => Ok(Value::Number(s.chars().count() as f64)),
            [Value::List(items)] => Ok(Value::Number(items.len() as f64)),
            [Value::Map(map)] => Ok(Value::Number(map.len() as f64)),
            [Value::Points(p)] => Ok(Value::Number(p.len() as f64)),
            [Value::Node(node)] => Ok(Value::Number(node.children.len() as f64)),
            [other] => Err(type_error(name, "a string, list, or map", other, span)),
            _ => Err(arity(name, 1, args.len(), span)),
        },
        "log" | "puts" => {
            let line = args.iter().map(Value::to_string).collect::<Vec<_>>().join(" ");
            log::info!(target: "nabu::script", "{line}");
            Ok(Value::Nil)
        }
        _ => return None,
    };
    Some(result)
}

fn color(name: &str, args: &[Value], expected: usize, span: Span) -> Result<Value, SemanticError> {
    if args.len() != expected {
        return Err(arity(name, expected, args.len(), span));
    }
    let mut channels = [0.0, 0.0, 0.0, 1.0];
    for (slot, arg) in channels.iter_mut().zip(args) {
        *slot = arg.as_number().ok_or_else(|| type_error(name, "numbers", arg, span))?;
    }
    let [r, g, b, a] = channels;
    Color::from_channels(r, g, b, a).map(Value::Color).ok_or_else(|| SemanticError::Type {
        message: format!("`{name}` channels out of range"),
        span,
    })
}

fn arity(name: &str, expected: usize, got: usize, span: Span) -> SemanticError {
    SemanticError::Arity { name: name.to_string(), expected, got, span }
}

fn type_error(name: &str, expected: &str, got: &Value, span: Span) -> SemanticError {
    SemanticError::Type {
        message: format!("`{name}` expects {expected}, got {}", got.type_name()),
        span,
    }
}
