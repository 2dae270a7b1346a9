use std::collections::HashSet;

use crate::ast::{
    Assignment, BinaryOp, Block, BlockDelimiter, Call, Expr, FunctionDef, IfStmt, KwArg, Literal,
    MapEntry, Script, Span, Stmt, StrPart, UnaryOp,
};
use crate::error::SyntaxError;
use crate::lexer::{Lexer, StrSegment, Token, TokenWithPos};

/// What closes the statement list currently being parsed.
#[derive(Debug, Copy, Clone)]
enum Closer {
    Eof,
    /// `end`, for `def`, `if` without `else`, and `do` blocks.
    End { opened: Span, what: &'static str },
    /// `else` or `end`, for the then-branch of an `if`.
    ElseOrEnd { opened: Span },
    /// `}` for brace blocks.
    Brace { opened: Span },
}

impl Closer {
    fn accepts(&self, tok: &Token) -> bool {
        match self {
            Closer::Eof => tok == &Token::Eof,
            Closer::End { .. } => tok == &Token::End,
            Closer::ElseOrEnd { .. } => matches!(tok, Token::Else | Token::End),
            Closer::Brace { .. } => tok == &Token::RBrace,
        }
    }

    fn describe(&self) -> String {
        match self {
            Closer::Eof => "end of input".to_string(),
            Closer::End { opened, what } => {
                format!("`end` to close the {what} opened at {}:{}", opened.line, opened.col)
            }
            Closer::ElseOrEnd { opened } => {
                format!("`else` or `end` to close the `if` opened at {}:{}", opened.line, opened.col)
            }
            Closer::Brace { opened } => {
                format!("`}}` to close the block opened at {}:{}", opened.line, opened.col)
            }
        }
    }
}

fn binary_op(tok: &Token) -> Option<(BinaryOp, u8)> {
    Some(match tok {
        Token::Or    => (BinaryOp::Or, 1),
        Token::And   => (BinaryOp::And, 2),
        Token::EqEq  => (BinaryOp::Eq, 3),
        Token::NotEq => (BinaryOp::NotEq, 3),
        Token::Lt    => (BinaryOp::Lt, 4),
        Token::Le    => (BinaryOp::Le, 4),
        Token::Gt    => (BinaryOp::Gt, 4),
        Token::Ge    => (BinaryOp::Ge, 4),
        Token::Plus  => (BinaryOp::Add, 5),
        Token::Minus => (BinaryOp::Sub, 5),
        Token::Star  => (BinaryOp::Mul, 6),
        Token::Slash => (BinaryOp::Div, 6),
        _ => return None,
    })
}

// ── Parser ────────────────────────────────────────────────────────────────

/// Deepest nesting of blocks and expressions the parser accepts. Each
/// widget block counts twice (its call and its body).
pub const MAX_NESTING: usize = 64;

pub struct Parser {
    tokens: Vec<TokenWithPos>,
    pos: usize,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<TokenWithPos>) -> Self {
        Self { tokens, pos: 0, depth: 0 }
    }

    /// Run `f` one nesting level deeper, failing before the level is entered
    /// once [`MAX_NESTING`] is reached.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, SyntaxError>) -> Result<T, SyntaxError> {
        if self.depth >= MAX_NESTING {
            return Err(self.err(format!("nesting too deep (limit {MAX_NESTING})")));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn current_pos(&self) -> (usize, usize) {
        self.tokens
            .get(self.pos)
            .map(|t| (t.line, t.col))
            .or_else(|| self.tokens.last().map(|t| (t.line, t.col)))
            .unwrap_or((1, 1))
    }

    fn span(&self) -> Span {
        let (line, col) = self.current_pos();
        Span::new(line, col)
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map(|t| &t.token).unwrap_or(&Token::Eof)
    }

    /// Look at the token `offset` positions ahead of current without consuming.
    fn peek_ahead(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).map(|t| &t.token).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens.get(self.pos)
            .map(|t| t.token.clone())
            .unwrap_or(Token::Eof);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    /// Error pointing at the current (not yet consumed) token.
    fn err(&self, msg: impl Into<String>) -> SyntaxError {
        let (line, col) = self.current_pos();
        SyntaxError::new(msg, line, col).with_token(self.peek().to_string())
    }

    fn err_at(&self, msg: impl Into<String>, span: Span, tok: &Token) -> SyntaxError {
        SyntaxError::new(msg, span.line, span.col).with_token(tok.to_string())
    }

    fn expect_token(&mut self, expected: &Token) -> Result<Span, SyntaxError> {
        let span = self.span();
        if self.peek() == expected {
            self.advance();
            Ok(span)
        } else {
            Err(self.err(format!("expected {expected}")))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Span), SyntaxError> {
        let span = self.span();
        if let Token::Ident(s) = self.peek() {
            let s = s.clone();
            self.advance();
            Ok((s, span))
        } else {
            Err(self.err("expected identifier"))
        }
    }

    fn skip_newlines(&mut self) {
        while self.peek() == &Token::Newline {
            self.advance();
        }
    }

    // ── Script ────────────────────────────────────────────────────────────

    pub fn parse_script(&mut self) -> Result<Script, SyntaxError> {
        let body = self.parse_body(Closer::Eof)?;
        Ok(Script { body })
    }

    /// Parse statements until `closer` is the next token. The closer itself
    /// is left for the caller to consume.
    fn parse_body(&mut self, closer: Closer) -> Result<Vec<Stmt>, SyntaxError> {
        self.nested(|p| p.parse_stmts(closer))
    }

    fn parse_stmts(&mut self, closer: Closer) -> Result<Vec<Stmt>, SyntaxError> {
        let mut body = Vec::new();
        loop {
            self.skip_newlines();
            let tok = self.peek();
            if closer.accepts(tok) {
                break;
            }
            match tok {
                Token::Eof => {
                    return Err(self.err(format!("unexpected end of input, expected {}", closer.describe())));
                }
                Token::End | Token::RBrace | Token::Else => {
                    return Err(self.err(format!("mismatched block terminator, expected {}", closer.describe())));
                }
                _ => {}
            }

            body.push(self.parse_stmt()?);

            match self.peek() {
                Token::Newline => {
                    self.advance();
                }
                Token::Eof | Token::End | Token::RBrace | Token::Else => {}
                _ => return Err(self.err("expected end of statement")),
            }
        }
        Ok(body)
    }

    // ── Statements ────────────────────────────────────────────────────────

    fn parse_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        match self.peek() {
            Token::Def => Ok(Stmt::Def(self.parse_def()?)),
            Token::If => Ok(Stmt::If(self.parse_if()?)),
            Token::Ident(_) if self.peek_ahead(1) == &Token::Assign => {
                let (name, span) = self.expect_ident()?;
                self.advance(); // consume `=`
                self.skip_newlines();
                let value = self.parse_expr()?;
                Ok(Stmt::Assignment(Assignment { name, value, span }))
            }
            _ => Ok(Stmt::Expr(self.parse_expr()?)),
        }
    }

    fn parse_def(&mut self) -> Result<FunctionDef, SyntaxError> {
        let span = self.span();
        self.advance(); // consume `def`
        let (name, _) = self.expect_ident()?;

        let mut params = Vec::new();
        if self.peek() == &Token::LParen {
            self.advance();
            self.skip_newlines();
            let mut seen = HashSet::new();
            while self.peek() != &Token::RParen {
                let (param, pspan) = self.expect_ident()?;
                if !seen.insert(param.clone()) {
                    return Err(self.err_at(
                        format!("duplicate parameter `{param}`"),
                        pspan,
                        &Token::Ident(param),
                    ));
                }
                params.push(param);
                self.skip_newlines();
                if self.peek() == &Token::Comma {
                    self.advance();
                    self.skip_newlines();
                } else if self.peek() != &Token::RParen {
                    return Err(self.err("expected `,` or `)` in parameter list"));
                }
            }
            self.advance(); // consume `)`
        }

        let body = self.parse_body(Closer::End { opened: span, what: "`def`" })?;
        self.expect_token(&Token::End)?;
        Ok(FunctionDef { name, params, body, span })
    }

    fn parse_if(&mut self) -> Result<IfStmt, SyntaxError> {
        let span = self.span();
        self.advance(); // consume `if`
        let cond = self.parse_expr()?;
        let then_body = self.parse_body(Closer::ElseOrEnd { opened: span })?;
        let else_body = if self.peek() == &Token::Else {
            self.advance();
            self.parse_body(Closer::End { opened: span, what: "`if`" })?
        } else {
            Vec::new()
        };
        self.expect_token(&Token::End)?;
        Ok(IfStmt { cond, then_body, else_body, span })
    }

    // ── Expressions ───────────────────────────────────────────────────────

    pub fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.nested(|p| p.parse_binary(1))
    }

    /// Precedence climbing over [`binary_op`]. All operators are left-associative.
    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_unary()?;
        while let Some((op, prec)) = binary_op(self.peek()) {
            if prec < min_prec {
                break;
            }
            let span = self.span();
            self.advance();
            self.skip_newlines();
            let rhs = self.parse_binary(prec + 1)?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        let span = self.span();
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Bang | Token::Not => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expr::Unary { op, operand: Box::new(operand), span })
    }

    fn parse_postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_primary()?;
        loop {
            let span = self.span();
            match self.peek() {
                Token::LBracket => {
                    self.advance();
                    self.skip_newlines();
                    let index = self.parse_expr()?;
                    self.skip_newlines();
                    self.expect_token(&Token::RBracket)?;
                    expr = Expr::Index { target: Box::new(expr), index: Box::new(index), span };
                }
                Token::Dot => {
                    self.advance();
                    let (name, _) = self.expect_ident()?;
                    expr = Expr::Field { target: Box::new(expr), name, span };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let span = self.span();
        let tok = self.advance();
        match tok {
            Token::Number(n) => Ok(Expr::Literal(Literal::Number(n), span)),
            Token::True      => Ok(Expr::Literal(Literal::Bool(true), span)),
            Token::False     => Ok(Expr::Literal(Literal::Bool(false), span)),
            Token::Nil       => Ok(Expr::Literal(Literal::Nil, span)),
            Token::Symbol(s) => Ok(Expr::Symbol(s, span)),
            Token::Str(segments) => self.string_expr(segments, span),
            Token::Ident(name) => match self.peek() {
                Token::LParen => self.parse_call(name, span),
                Token::Do => {
                    let block = self.parse_block()?;
                    Ok(Expr::Call(Call { name, args: Vec::new(), kwargs: Vec::new(), block: Some(block), span }))
                }
                _ => Ok(Expr::Ident(name, span)),
            },
            Token::LBracket => self.parse_list(span),
            Token::LBrace => self.parse_map(span),
            Token::LParen => {
                self.skip_newlines();
                let inner = self.parse_expr()?;
                self.skip_newlines();
                self.expect_token(&Token::RParen)?;
                Ok(inner)
            }
            tok => Err(self.err_at("expected a value", span, &tok)),
        }
    }

    // ── Call ──────────────────────────────────────────────────────────────

    /// `name(args) block?`. The name has been consumed; `(` is next.
    ///
    /// Arguments are positional (`expr`) or keyword (`key: expr`), in any
    /// order. A keyword key may appear only once per call.
    fn parse_call(&mut self, name: String, span: Span) -> Result<Expr, SyntaxError> {
        self.advance(); // consume `(`
        let mut args = Vec::new();
        let mut kwargs: Vec<KwArg> = Vec::new();

        loop {
            self.skip_newlines();
            if self.peek() == &Token::RParen {
                break;
            }
            if matches!(self.peek(), Token::Ident(_)) && self.peek_ahead(1) == &Token::Colon {
                let (key, kspan) = self.expect_ident()?;
                if kwargs.iter().any(|k| k.key == key) {
                    return Err(self.err_at(
                        format!("duplicate keyword argument `{key}` in call to `{name}`"),
                        kspan,
                        &Token::Ident(key),
                    ));
                }
                self.advance(); // consume `:`
                self.skip_newlines();
                let value = self.parse_expr()?;
                kwargs.push(KwArg { key, value, span: kspan });
            } else {
                args.push(self.parse_expr()?);
            }
            self.skip_newlines();
            match self.peek() {
                Token::Comma => {
                    self.advance();
                }
                Token::RParen => {}
                _ => return Err(self.err(format!("expected `,` or `)` in call to `{name}`"))),
            }
        }
        self.advance(); // consume `)`

        let block = if matches!(self.peek(), Token::Do | Token::LBrace) {
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(Expr::Call(Call { name, args, kwargs, block, span }))
    }

    /// `do ... end` or `{ ... }`. The opener is the current token.
    fn parse_block(&mut self) -> Result<Block, SyntaxError> {
        let span = self.span();
        match self.advance() {
            Token::Do => {
                let body = self.parse_body(Closer::End { opened: span, what: "`do` block" })?;
                self.expect_token(&Token::End)?;
                Ok(Block { delimiter: BlockDelimiter::DoEnd, body, span })
            }
            Token::LBrace => {
                let body = self.parse_body(Closer::Brace { opened: span })?;
                self.expect_token(&Token::RBrace)?;
                Ok(Block { delimiter: BlockDelimiter::Braces, body, span })
            }
            tok => Err(self.err_at("expected `do` or `{`", span, &tok)),
        }
    }

    // ── Collections ───────────────────────────────────────────────────────

    fn parse_list(&mut self, span: Span) -> Result<Expr, SyntaxError> {
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            if self.peek() == &Token::RBracket {
                break;
            }
            items.push(self.parse_expr()?);
            self.skip_newlines();
            match self.peek() {
                Token::Comma => {
                    self.advance();
                }
                Token::RBracket => {}
                _ => return Err(self.err("expected `,` or `]` in list")),
            }
        }
        self.advance(); // consume `]`
        Ok(Expr::List(items, span))
    }

    fn parse_map(&mut self, span: Span) -> Result<Expr, SyntaxError> {
        let mut entries: Vec<MapEntry> = Vec::new();
        loop {
            self.skip_newlines();
            if self.peek() == &Token::RBrace {
                break;
            }
            let kspan = self.span();
            let key = match self.advance() {
                Token::Ident(k) => k,
                Token::Str(segments) => match segments.as_slice() {
                    [StrSegment::Text(k)] => k.clone(),
                    _ => {
                        return Err(self.err_at(
                            "map keys cannot be interpolated",
                            kspan,
                            &Token::Str(segments.clone()),
                        ));
                    }
                },
                tok => return Err(self.err_at("expected a map key", kspan, &tok)),
            };
            if entries.iter().any(|e| e.key == key) {
                return Err(self.err_at(
                    format!("duplicate key `{key}` in map literal"),
                    kspan,
                    &Token::Ident(key),
                ));
            }
            self.expect_token(&Token::Colon)?;
            self.skip_newlines();
            let value = self.parse_expr()?;
            entries.push(MapEntry { key, value, span: kspan });
            self.skip_newlines();
            match self.peek() {
                Token::Comma => {
                    self.advance();
                }
                Token::RBrace => {}
                _ => return Err(self.err("expected `,` or `}` in map")),
            }
        }
        self.advance(); // consume `}`
        Ok(Expr::Map(entries, span))
    }

    // ── Strings ───────────────────────────────────────────────────────────

    fn string_expr(&self, segments: Vec<StrSegment>, span: Span) -> Result<Expr, SyntaxError> {
        if segments.iter().all(|s| matches!(s, StrSegment::Text(_))) {
            let text = segments
                .into_iter()
                .map(|s| match s {
                    StrSegment::Text(t) => t,
                    StrSegment::Interp { .. } => String::new(),
                })
                .collect();
            return Ok(Expr::Literal(Literal::Str(text), span));
        }

        let mut parts = Vec::with_capacity(segments.len());
        for segment in segments {
            match segment {
                StrSegment::Text(t) => parts.push(StrPart::Text(t)),
                StrSegment::Interp { src, line, col } => {
                    parts.push(StrPart::Interp(parse_interpolation(&src, line, col, self.depth)?));
                }
            }
        }
        Ok(Expr::Interpolated(parts, span))
    }
}

/// Parse the body of a `#{...}` placeholder as a single expression.
fn parse_interpolation(src: &str, line: usize, col: usize, depth: usize) -> Result<Expr, SyntaxError> {
    let tokens = Lexer::with_origin(src, line, col).tokenize()?;
    let mut parser = Parser { tokens, pos: 0, depth };
    parser.skip_newlines();
    if parser.peek() == &Token::Eof {
        return Err(SyntaxError::new("empty interpolation", line, col));
    }
    let expr = parser.parse_expr()?;
    parser.skip_newlines();
    if parser.peek() != &Token::Eof {
        return Err(parser.err("unexpected token in interpolation"));
    }
    Ok(expr)
}

// ── Public parse entry point ──────────────────────────────────────────────

/// Parse a `.nabu` source string into a [`Script`].
pub fn parse_str(src: &str) -> Result<Script, SyntaxError> {
    let tokens = Lexer::new(src).tokenize()?;
    Parser::new(tokens).parse_script()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_call(src: &str) -> Call {
        match parse_str(src).unwrap().body.into_iter().next() {
            Some(Stmt::Expr(Expr::Call(call))) => call,
            other => panic!("expected a call, got {other:?}"),
        }
    }

    #[test]
    fn brace_block_on_one_line() {
        let w = first_call(r#"window(id:"w1") { button(id:"b1", text:"Click") }"#);
        assert_eq!(w.name, "window");
        let block = w.block.unwrap();
        assert_eq!(block.delimiter, BlockDelimiter::Braces);
        match &block.body[0] {
            Stmt::Expr(Expr::Call(b)) => {
                assert_eq!(b.name, "button");
                assert_eq!(b.kwargs.iter().map(|k| k.key.as_str()).collect::<Vec<_>>(), ["id", "text"]);
            }
            other => panic!("expected button call, got {other:?}"),
        }
    }

    #[test]
    fn kwargs_keep_source_order() {
        let c = first_call("text(size: 12, id: \"t\", content: \"x\")");
        let keys: Vec<_> = c.kwargs.iter().map(|k| k.key.as_str()).collect();
        assert_eq!(keys, ["size", "id", "content"]);
        assert!(matches!(c.kwarg("size"), Some(Expr::Literal(Literal::Number(n), _)) if *n == 12.0));
    }

    #[test]
    fn duplicate_kwarg_points_at_second_key() {
        let err = parse_str("button(id: \"a\",\n       id: \"b\")").unwrap_err();
        assert_eq!((err.line, err.col), (2, 8));
        assert!(err.message.contains("duplicate keyword argument `id`"));
    }

    #[test]
    fn mismatched_terminator_names_token() {
        let err = parse_str("row(id: \"r\") do\n  text(id: \"t\")\n}").unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(err.token.as_deref(), Some("`}`"));
        assert!(err.message.contains("`end`"));
    }

    #[test]
    fn brace_closed_by_end_is_rejected() {
        let err = parse_str("row(id: \"r\") {\n  text(id: \"t\")\nend").unwrap_err();
        assert_eq!(err.token.as_deref(), Some("`end`"));
    }

    #[test]
    fn unclosed_block_reports_opener() {
        let err = parse_str("column(id: \"c\") do\n  text(id: \"t\")\n").unwrap_err();
        assert!(err.message.contains("opened at 1:17"), "{}", err.message);
    }

    #[test]
    fn def_is_a_statement() {
        let script = parse_str("def on_save(params)\n  log(params.id)\nend").unwrap();
        match &script.body[0] {
            Stmt::Def(def) => {
                assert_eq!(def.name, "on_save");
                assert_eq!(def.params, ["params"]);
                assert_eq!(def.body.len(), 1);
            }
            other => panic!("expected def, got {other:?}"),
        }
    }

    #[test]
    fn handler_returns_map_literal() {
        let src = r#"
def handle(params)
  {updates: [{target_id: "out", action: "setText", value: "Hi #{params["id"]}"}]}
end
"#;
        let script = parse_str(src).unwrap();
        let Stmt::Def(def) = &script.body[0] else { panic!("expected def") };
        assert!(matches!(&def.body[0], Stmt::Expr(Expr::Map(entries, _)) if entries[0].key == "updates"));
    }

    #[test]
    fn precedence_and_grouping() {
        let script = parse_str("x = 1 + 2 * 3\ny = (1 + 2) * 3").unwrap();
        let Stmt::Assignment(x) = &script.body[0] else { panic!() };
        assert!(matches!(&x.value, Expr::Binary { op: BinaryOp::Add, .. }));
        let Stmt::Assignment(y) = &script.body[1] else { panic!() };
        assert!(matches!(&y.value, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn if_else() {
        let script = parse_str("if a == 1\n  b = 2\nelse\n  b = 3\nend").unwrap();
        let Stmt::If(stmt) = &script.body[0] else { panic!() };
        assert_eq!(stmt.then_body.len(), 1);
        assert_eq!(stmt.else_body.len(), 1);
    }

    #[test]
    fn interpolation_errors_point_into_string() {
        let err = parse_str("t = \"a #{1 +} b\"").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.col > 5);
    }

    #[test]
    fn two_statements_on_one_line_need_separator() {
        parse_str("a = 1; b = 2").unwrap();
        parse_str("a = 1 b = 2").unwrap_err();
    }

    #[test]
    fn nesting_is_bounded() {
        let deep = format!("x = {}1{}", "[".repeat(100_000), "]".repeat(100_000));
        let err = parse_str(&deep).unwrap_err();
        assert!(err.message.contains("nesting too deep"), "{err}");

        let shallow = format!("x = {}1{}", "[".repeat(20), "]".repeat(20));
        parse_str(&shallow).unwrap();

        let blocks = format!("window(id: \"w\") do\n{}{}", "column do\n".repeat(500), "end\n".repeat(501));
        assert!(parse_str(&blocks).unwrap_err().message.contains("nesting too deep"));

        let negations = format!("x = {}1", "-".repeat(100_000));
        assert!(parse_str(&negations).unwrap_err().message.contains("nesting too deep"));
    }

    #[test]
    fn reparse_is_deterministic() {
        let src = "def h(p)\n  {updates: []}\nend\nwindow(id: \"w\", title: \"T #{1}\") do\n  row(id: \"r\") { text(id: \"t\", content: :x) }\nend";
        assert_eq!(parse_str(src).unwrap(), parse_str(src).unwrap());
    }
}
