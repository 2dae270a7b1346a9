//! Typed widget properties and the conversion from script values.
//!
//! Properties form a closed set of value shapes ([`PropValue`]). Which shape a
//! script value becomes depends partly on the property key: `on_*` keys hold
//! handler names, color keys parse color strings, and `points` holds a
//! polyline.

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::value::{Color, Point, Value};

/// Ordered property map. Key order follows the declaration.
pub type PropMap = IndexMap<String, PropValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Str(String),
    Number(f64),
    Bool(bool),
    Color(Color),
    Points(Vec<Point>),
    /// Name of a handler function. Resolved when an event is dispatched,
    /// never at declaration time.
    Handler(String),
    List(Vec<PropValue>),
    Record(PropMap),
}

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Back to a script value, e.g. for reading node fields in handlers.
    pub fn to_value(&self) -> Value {
        match self {
            PropValue::Str(s)     => Value::Str(s.clone()),
            PropValue::Number(n)  => Value::Number(*n),
            PropValue::Bool(b)    => Value::Bool(*b),
            PropValue::Color(c)   => Value::Color(*c),
            PropValue::Points(p)  => Value::Points(p.clone()),
            PropValue::Handler(h) => Value::Symbol(h.clone()),
            PropValue::List(items) => Value::List(items.iter().map(PropValue::to_value).collect()),
            PropValue::Record(map) => {
                Value::Map(map.iter().map(|(k, v)| (k.clone(), v.to_value())).collect())
            }
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::Str(s.to_string())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        PropValue::Str(s)
    }
}

impl From<f64> for PropValue {
    fn from(n: f64) -> Self {
        PropValue::Number(n)
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        PropValue::Bool(b)
    }
}

impl From<Color> for PropValue {
    fn from(c: Color) -> Self {
        PropValue::Color(c)
    }
}

/// Plain JSON shapes; handlers serialize as `{"handler": name}` so they stay
/// distinguishable from strings.
impl Serialize for PropValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PropValue::Str(s)    => serializer.serialize_str(s),
            PropValue::Number(n) => serializer.serialize_f64(*n),
            PropValue::Bool(b)   => serializer.serialize_bool(*b),
            PropValue::Color(c)  => c.serialize(serializer),
            PropValue::Points(points) => points.serialize(serializer),
            PropValue::Handler(name) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("handler", name)?;
                map.end()
            }
            PropValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            PropValue::Record(map) => map.serialize(serializer),
        }
    }
}

// ── Coercion ──────────────────────────────────────────────────────────────

/// `color`, `bg`, `background`, and any `*_color` / `*_bg` key.
pub fn is_color_key(key: &str) -> bool {
    matches!(key, "color" | "bg" | "background") || key.ends_with("_color") || key.ends_with("_bg")
}

pub fn is_handler_key(key: &str) -> bool {
    key.starts_with("on_")
}

/// Convert a script value into the property stored under `key`.
///
/// `Ok(None)` means the property is omitted (`nil`). The error string says
/// why the value does not fit.
pub fn coerce(key: &str, value: Value) -> Result<Option<PropValue>, String> {
    if value == Value::Nil {
        return Ok(None);
    }
    if !all_finite(&value) {
        return Err("numbers must be finite".to_string());
    }
    if is_handler_key(key) {
        return match value {
            Value::Str(name) | Value::Symbol(name) if !name.is_empty() => Ok(Some(PropValue::Handler(name))),
            other => Err(format!("expected a handler name, got {}", other.type_name())),
        };
    }
    if is_color_key(key) {
        return match value {
            Value::Color(c) => Ok(Some(PropValue::Color(c))),
            Value::Str(s) | Value::Symbol(s) => Color::parse(&s)
                .map(|c| Some(PropValue::Color(c)))
                .ok_or_else(|| format!("`{s}` is not a color")),
            other => Err(format!("expected a color, got {}", other.type_name())),
        };
    }
    if key == "points" {
        return match value {
            Value::Points(p) => Ok(Some(PropValue::Points(p))),
            Value::List(items) => points_of(&items)
                .map(|p| Some(PropValue::Points(p)))
                .ok_or_else(|| "expected a list of [x, y] pairs".to_string()),
            other => Err(format!("expected points, got {}", other.type_name())),
        };
    }
    plain(value).map(Some)
}

fn plain(value: Value) -> Result<PropValue, String> {
    Ok(match value {
        Value::Nil => return Err("nil is not allowed inside a list".to_string()),
        Value::Bool(b) => PropValue::Bool(b),
        Value::Number(n) => PropValue::Number(n),
        Value::Str(s) | Value::Symbol(s) => PropValue::Str(s),
        Value::Color(c) => PropValue::Color(c),
        Value::Points(p) => PropValue::Points(p),
        Value::List(items) => match points_of(&items) {
            Some(points) => PropValue::Points(points),
            None => PropValue::List(items.into_iter().map(plain).collect::<Result<_, _>>()?),
        },
        Value::Map(entries) => {
            let mut record = PropMap::new();
            for (k, v) in entries {
                if let Some(p) = coerce(&k, v).map_err(|e| format!("in `{k}`: {e}"))? {
                    record.insert(k, p);
                }
            }
            PropValue::Record(record)
        }
        Value::Node(node) => {
            return Err(format!("a widget (`{}`) cannot be a property value", node.id));
        }
    })
}

/// A non-empty list whose every element is a `[x, y]` number pair.
fn all_finite(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_finite(),
        Value::Points(points) => points.iter().flatten().all(|n| n.is_finite()),
        Value::List(items) => items.iter().all(all_finite),
        Value::Map(entries) => entries.values().all(all_finite),
        _ => true,
    }
}

fn points_of(items: &[Value]) -> Option<Vec<Point>> {
    if items.is_empty() {
        return None;
    }
    items.iter().map(Value::as_point).collect()
}

/// Entries of `new` whose value differs from (or is absent in) `old`.
///
/// Keys present in `old` but missing from `new` are not reported: an omitted
/// property keeps its last applied value.
pub fn diff(old: &PropMap, new: &PropMap) -> PropMap {
    new.iter()
        .filter(|(k, v)| old.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
