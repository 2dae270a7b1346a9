// ── Span ──────────────────────────────────────────────────────────────────

/// 1-based source position of the token that starts a node.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

impl Span {
    #[inline]
    pub const fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

// ── Literal ───────────────────────────────────────────────────────────────

/// A literal value whose form was fixed by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// String without interpolation: `"hello"` or `'raw'`
    Str(String),
    /// Numeric literal: `16`, `0.75`
    Number(f64),
    /// `true` / `false`
    Bool(bool),
    /// `nil`
    Nil,
}

/// One piece of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum StrPart {
    Text(String),
    /// `#{expr}`
    Interp(Expr),
}

// ── Operators ─────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

// ── Expr ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal, Span),
    /// String containing at least one `#{...}` placeholder.
    Interpolated(Vec<StrPart>, Span),
    /// Bare identifier: a variable if one is bound, otherwise a symbol.
    Ident(String, Span),
    /// Explicit symbol: `:center`
    Symbol(String, Span),
    List(Vec<Expr>, Span),
    Map(Vec<MapEntry>, Span),
    Call(Call),
    Index { target: Box<Expr>, index: Box<Expr>, span: Span },
    Field { target: Box<Expr>, name: String, span: Span },
    Unary { op: UnaryOp, operand: Box<Expr>, span: Span },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr>, span: Span },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(_, span)
            | Expr::Interpolated(_, span)
            | Expr::Ident(_, span)
            | Expr::Symbol(_, span)
            | Expr::List(_, span)
            | Expr::Map(_, span) => *span,
            Expr::Call(call) => call.span,
            Expr::Index { span, .. }
            | Expr::Field { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. } => *span,
        }
    }
}

/// `key: value` inside a `{ ... }` map literal.
#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub key: String,
    pub value: Expr,
    pub span: Span,
}

// ── Call ──────────────────────────────────────────────────────────────────

/// A function or widget call, optionally followed by a nested block.
///
/// ```nabu
/// row(id: "toolbar", spacing: 5) do
///   button(id: "save", text: "Save", on_click: save)
/// end
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    /// Positional arguments, in source order.
    pub args: Vec<Expr>,
    /// Keyword arguments, in source order. Keys are unique.
    pub kwargs: Vec<KwArg>,
    pub block: Option<Block>,
    pub span: Span,
}

impl Call {
    /// Look up a keyword argument by key.
    pub fn kwarg(&self, key: &str) -> Option<&Expr> {
        self.kwargs.iter().find(|k| k.key == key).map(|k| &k.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KwArg {
    pub key: String,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BlockDelimiter {
    /// `do ... end`
    DoEnd,
    /// `{ ... }`
    Braces,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub delimiter: BlockDelimiter,
    pub body: Vec<Stmt>,
    pub span: Span,
}

// ── Statements ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Assignment(Assignment),
    Def(FunctionDef),
    If(IfStmt),
}

/// `name = value`
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: String,
    pub value: Expr,
    pub span: Span,
}

/// `def name(params) ... end`
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// `if cond ... else ... end`
#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_body: Vec<Stmt>,
    pub else_body: Vec<Stmt>,
    pub span: Span,
}

// ── Script ────────────────────────────────────────────────────────────────

/// The top-level parse result for a `.nabu` source file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    pub body: Vec<Stmt>,
}
