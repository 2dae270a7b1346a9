use std::fmt;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::decl::DeclNode;

// ── Color ─────────────────────────────────────────────────────────────────

/// Straight-alpha sRGB color with 8-bit channels.
///
/// Colors are carried opaquely to the renderer; no premultiplication or
/// color-space conversion happens here.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    #[inline]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Builds a color from numeric channels as written in scripts.
    ///
    /// `r`, `g`, `b` must lie in `0..=255`. `a` is a fraction when it lies in
    /// `0..=1` and a byte value otherwise, so `1` means fully opaque.
    pub fn from_channels(r: f64, g: f64, b: f64, a: f64) -> Option<Self> {
        fn byte(v: f64) -> Option<u8> {
            (v.is_finite() && (0.0..=255.0).contains(&v)).then(|| v.round() as u8)
        }
        let alpha = if (0.0..=1.0).contains(&a) { byte(a * 255.0)? } else { byte(a)? };
        Some(Self::rgba(byte(r)?, byte(g)?, byte(b)?, alpha))
    }

    /// Parses `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)` or `rgba(r, g, b, a)`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return Self::parse_hex(hex);
        }
        let (args, with_alpha) = if let Some(rest) = s.strip_prefix("rgba(") {
            (rest.strip_suffix(')')?, true)
        } else if let Some(rest) = s.strip_prefix("rgb(") {
            (rest.strip_suffix(')')?, false)
        } else {
            return None;
        };
        let nums = args
            .split(',')
            .map(|part| part.trim().parse::<f64>().ok())
            .collect::<Option<Vec<_>>>()?;
        match (nums.as_slice(), with_alpha) {
            ([r, g, b], false) => Self::from_channels(*r, *g, *b, 1.0),
            ([r, g, b, a], true) => Self::from_channels(*r, *g, *b, *a),
            _ => None,
        }
    }

    fn parse_hex(hex: &str) -> Option<Self> {
        if !(hex.len() == 6 || hex.len() == 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        let a = if hex.len() == 8 { channel(6)? } else { 255 };
        Some(Self::rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }
}

/// Serialized as its `#rrggbbaa` string form.
impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A 2D point, `[x, y]`.
pub type Point = [f64; 2];

// ── Value ─────────────────────────────────────────────────────────────────

/// A runtime value produced by evaluating a script expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
    /// `:name`, or a bare identifier with no variable bound to it.
    Symbol(String),
    Color(Color),
    Points(Vec<Point>),
    List(Vec<Value>),
    /// Insertion-ordered map.
    Map(IndexMap<String, Value>),
    /// A widget built in expression position (e.g. the value of an
    /// `appendChild` directive).
    Node(Box<DeclNode>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil       => "nil",
            Value::Bool(_)   => "bool",
            Value::Number(_) => "number",
            Value::Str(_)    => "string",
            Value::Symbol(_) => "symbol",
            Value::Color(_)  => "color",
            Value::Points(_) => "points",
            Value::List(_)   => "list",
            Value::Map(_)    => "map",
            Value::Node(_)   => "node",
        }
    }

    /// Only `nil` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Text of a string or symbol.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// `[x, y]` with two numbers.
    pub fn as_point(&self) -> Option<Point> {
        match self {
            Value::List(items) => match items.as_slice() {
                [Value::Number(x), Value::Number(y)] => Some([*x, *y]),
                _ => None,
            },
            _ => None,
        }
    }

    /// Equality where a string and a symbol with the same text are equal.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self.as_str(), other.as_str()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }

    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null      => Value::Nil,
            serde_json::Value::Bool(b)   => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Value::Nil, Value::Number),
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

pub(crate) fn fmt_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{n}")
    }
}

/// The text produced by string interpolation and `str(...)`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => fmt_number(*n, f),
            Value::Str(s) | Value::Symbol(s) => f.write_str(s),
            Value::Color(c) => write!(f, "{c}"),
            Value::Points(points) => {
                f.write_str("[")?;
                for (i, [x, y]) in points.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str("[")?;
                    fmt_number(*x, f)?;
                    f.write_str(", ")?;
                    fmt_number(*y, f)?;
                    f.write_str("]")?;
                }
                f.write_str("]")
            }
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Value::Node(node) => write!(f, "<{} #{}>", node.kind, node.id),
        }
    }
}
