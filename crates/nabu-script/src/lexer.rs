use std::fmt;

use crate::error::SyntaxError;

// ── Token ─────────────────────────────────────────────────────────────────

/// Raw piece of a double-quoted string as seen by the lexer.
///
/// Interpolations are kept as source text; the parser sub-parses them.
#[derive(Debug, Clone, PartialEq)]
pub enum StrSegment {
    Text(String),
    Interp { src: String, line: usize, col: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Ident(String),
    Str(Vec<StrSegment>),
    Number(f64),
    /// `:name`
    Symbol(String),
    // Keywords
    Def,
    Do,
    End,
    If,
    Else,
    True,
    False,
    Nil,
    And,
    Or,
    Not,
    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Assign,
    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Bang,
    /// Statement separator: newline or `;`. Consecutive separators collapse.
    Newline,
    // Sentinel
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Token::Ident(name) => return write!(f, "identifier `{name}`"),
            Token::Str(_) => "string literal",
            Token::Number(n) => return write!(f, "number `{n}`"),
            Token::Symbol(name) => return write!(f, "symbol `:{name}`"),
            Token::Def => "`def`",
            Token::Do => "`do`",
            Token::End => "`end`",
            Token::If => "`if`",
            Token::Else => "`else`",
            Token::True => "`true`",
            Token::False => "`false`",
            Token::Nil => "`nil`",
            Token::And => "`and`",
            Token::Or => "`or`",
            Token::Not => "`not`",
            Token::LParen => "`(`",
            Token::RParen => "`)`",
            Token::LBracket => "`[`",
            Token::RBracket => "`]`",
            Token::LBrace => "`{`",
            Token::RBrace => "`}`",
            Token::Comma => "`,`",
            Token::Colon => "`:`",
            Token::Dot => "`.`",
            Token::Assign => "`=`",
            Token::Plus => "`+`",
            Token::Minus => "`-`",
            Token::Star => "`*`",
            Token::Slash => "`/`",
            Token::EqEq => "`==`",
            Token::NotEq => "`!=`",
            Token::Lt => "`<`",
            Token::Le => "`<=`",
            Token::Gt => "`>`",
            Token::Ge => "`>=`",
            Token::Bang => "`!`",
            Token::Newline => "end of line",
            Token::Eof => "end of input",
        };
        f.write_str(s)
    }
}

/// A token plus the 1-based position of its first character.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenWithPos {
    pub token: Token,
    pub line: usize,
    pub col: usize,
}

// ── Lexer ─────────────────────────────────────────────────────────────────

pub struct Lexer<'s> {
    src: &'s str,
    pos: usize,
    line: usize,
    col: usize,
}

impl<'s> Lexer<'s> {
    pub fn new(src: &'s str) -> Self {
        Self::with_origin(src, 1, 1)
    }

    /// Lex `src` as if it started at `line:col` of an enclosing file.
    /// Used for string interpolations so errors point into the real source.
    pub fn with_origin(src: &'s str, line: usize, col: usize) -> Self {
        Self { src, pos: 0, line, col }
    }

    pub fn tokenize(mut self) -> Result<Vec<TokenWithPos>, SyntaxError> {
        let mut tokens: Vec<TokenWithPos> = Vec::new();
        loop {
            self.skip_blanks_and_comments();
            let (line, col) = (self.line, self.col);
            let token = self.next_token(tokens.last().map(|t| &t.token))?;
            if token == Token::Newline
                && matches!(tokens.last().map(|t| &t.token), None | Some(Token::Newline))
            {
                continue;
            }
            let eof = token == Token::Eof;
            tokens.push(TokenWithPos { token, line, col });
            if eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.src[self.pos..].chars().next()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    /// Skips spaces and `#` comments, but not newlines: those are tokens.
    fn skip_blanks_and_comments(&mut self) {
        loop {
            while matches!(self.peek(), Some(c) if c != '\n' && c.is_whitespace()) {
                self.advance();
            }
            match self.peek() {
                Some('#') => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.advance();
                    }
                }
                // explicit line continuation
                Some('\\') if self.peek_second() == Some('\n') => {
                    self.advance();
                    self.advance();
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self, prev: Option<&Token>) -> Result<Token, SyntaxError> {
        let (line, col) = (self.line, self.col);
        let ch = match self.peek() {
            None => return Ok(Token::Eof),
            Some(c) => c,
        };

        let single = |lexer: &mut Self, tok: Token| -> Result<Token, SyntaxError> {
            lexer.advance();
            Ok(tok)
        };
        let pair = |lexer: &mut Self, next: char, yes: Token, no: Token| -> Result<Token, SyntaxError> {
            lexer.advance();
            if lexer.peek() == Some(next) {
                lexer.advance();
                Ok(yes)
            } else {
                Ok(no)
            }
        };

        match ch {
            '\n' | ';' => single(self, Token::Newline),
            '(' => single(self, Token::LParen),
            ')' => single(self, Token::RParen),
            '[' => single(self, Token::LBracket),
            ']' => single(self, Token::RBracket),
            '{' => single(self, Token::LBrace),
            '}' => single(self, Token::RBrace),
            ',' => single(self, Token::Comma),
            '.' => single(self, Token::Dot),
            '+' => single(self, Token::Plus),
            '-' => single(self, Token::Minus),
            '*' => single(self, Token::Star),
            '/' => single(self, Token::Slash),
            '=' => pair(self, '=', Token::EqEq, Token::Assign),
            '!' => pair(self, '=', Token::NotEq, Token::Bang),
            '<' => pair(self, '=', Token::Le, Token::Lt),
            '>' => pair(self, '=', Token::Ge, Token::Gt),
            '&' | '|' => {
                self.advance();
                if self.peek() == Some(ch) {
                    self.advance();
                    Ok(if ch == '&' { Token::And } else { Token::Or })
                } else {
                    Err(SyntaxError::new(format!("expected `{ch}{ch}`"), line, col)
                        .with_token(format!("`{ch}`")))
                }
            }
            ':' => {
                // `:name` is a symbol unless it follows a key (`text: ...`, `"k": ...`).
                let after_key = matches!(prev, Some(Token::Ident(_)) | Some(Token::Str(_)));
                if !after_key && matches!(self.peek_second(), Some(c) if c.is_alphabetic() || c == '_') {
                    self.advance();
                    Ok(Token::Symbol(self.lex_word()))
                } else {
                    single(self, Token::Colon)
                }
            }
            '"' => self.lex_string(),
            '\'' => self.lex_raw_string(),
            c if c.is_ascii_digit() => self.lex_number(),
            c if c.is_alphabetic() || c == '_' => Ok(self.lex_ident_or_keyword()),
            other => Err(SyntaxError::new("unexpected character", line, col)
                .with_token(format!("{other:?}"))),
        }
    }

    fn lex_string(&mut self) -> Result<Token, SyntaxError> {
        let (line, col) = (self.line, self.col);
        self.advance(); // consume opening `"`
        let mut segments = Vec::new();
        let mut text = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(SyntaxError::new("unterminated string literal", line, col)
                        .with_token("`\"`"));
                }
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some(c) => text.push(c),
                    None => {
                        return Err(SyntaxError::new("unterminated escape sequence", line, col));
                    }
                },
                Some('#') if self.peek() == Some('{') => {
                    self.advance(); // consume `{`
                    if !text.is_empty() {
                        segments.push(StrSegment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(self.lex_interpolation()?);
                }
                Some(c) => text.push(c),
            }
        }
        if !text.is_empty() || segments.is_empty() {
            segments.push(StrSegment::Text(text));
        }
        Ok(Token::Str(segments))
    }

    /// Called just after `#{`. Captures the source up to the matching `}`.
    fn lex_interpolation(&mut self) -> Result<StrSegment, SyntaxError> {
        let (line, col) = (self.line, self.col);
        let start = self.pos;
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None => {
                    return Err(SyntaxError::new("unterminated interpolation", line, col - 2)
                        .with_token("`#{`"));
                }
                Some('}') if depth == 0 => break,
                Some('}') => {
                    depth -= 1;
                    self.advance();
                }
                Some('{') => {
                    depth += 1;
                    self.advance();
                }
                Some(quote @ ('"' | '\'')) => {
                    self.advance();
                    while let Some(c) = self.advance() {
                        match c {
                            '\\' => {
                                self.advance();
                            }
                            c if c == quote => break,
                            _ => {}
                        }
                    }
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
        let src = self.src[start..self.pos].to_string();
        self.advance(); // consume `}`
        Ok(StrSegment::Interp { src, line, col })
    }

    fn lex_raw_string(&mut self) -> Result<Token, SyntaxError> {
        let (line, col) = (self.line, self.col);
        self.advance(); // consume opening `'`
        let mut s = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(SyntaxError::new("unterminated string literal", line, col)
                        .with_token("`'`"));
                }
                Some('\'') => break,
                Some('\\') if matches!(self.peek(), Some('\'') | Some('\\')) => {
                    if let Some(c) = self.advance() {
                        s.push(c);
                    }
                }
                Some(c) => s.push(c),
            }
        }
        Ok(Token::Str(vec![StrSegment::Text(s)]))
    }

    fn lex_number(&mut self) -> Result<Token, SyntaxError> {
        let (line, col) = (self.line, self.col);
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '_') {
            self.advance();
        }
        // `1.5` is a number, `list.len` style access is not.
        if self.peek() == Some('.') && matches!(self.peek_second(), Some(c) if c.is_ascii_digit()) {
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        let s = self.src[start..self.pos].replace('_', "");
        s.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| SyntaxError::new("invalid number", line, col).with_token(s.clone()))
    }

    fn lex_word(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        // Ruby-style predicate / bang suffixes: `visible?`, `reset!`
        if matches!(self.peek(), Some('?') | Some('!')) && self.peek_second() != Some('=') {
            self.advance();
        }
        self.src[start..self.pos].to_string()
    }

    fn lex_ident_or_keyword(&mut self) -> Token {
        let word = self.lex_word();
        match word.as_str() {
            "def"   => Token::Def,
            "do"    => Token::Do,
            "end"   => Token::End,
            "if"    => Token::If,
            "else"  => Token::Else,
            "true"  => Token::True,
            "false" => Token::False,
            "nil"   => Token::Nil,
            "and"   => Token::And,
            "or"    => Token::Or,
            "not"   => Token::Not,
            _       => Token::Ident(word),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        Lexer::new(src).tokenize().unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn positions_are_one_based() {
        let toks = Lexer::new("window(\n  id: \"w\")").tokenize().unwrap();
        assert_eq!((toks[0].line, toks[0].col), (1, 1));
        // `id` on the second line, after two spaces
        let id = toks.iter().find(|t| t.token == Token::Ident("id".into())).unwrap();
        assert_eq!((id.line, id.col), (2, 3));
    }

    #[test]
    fn comments_are_discarded() {
        assert_eq!(
            kinds("# header\nx = 1 # trailing\n"),
            vec![
                Token::Ident("x".into()),
                Token::Assign,
                Token::Number(1.0),
                Token::Newline,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn newlines_collapse() {
        assert_eq!(kinds("a\n\n;\nb"), vec![
            Token::Ident("a".into()),
            Token::Newline,
            Token::Ident("b".into()),
            Token::Eof,
        ]);
    }

    #[test]
    fn symbol_versus_key_colon() {
        assert_eq!(kinds("align: :center"), vec![
            Token::Ident("align".into()),
            Token::Colon,
            Token::Symbol("center".into()),
            Token::Eof,
        ]);
        assert_eq!(kinds("id:\"w1\"")[1], Token::Colon);
        assert_eq!(kinds("a:b")[1], Token::Colon);
    }

    #[test]
    fn interpolation_segments() {
        let toks = kinds(r#""Hi #{name}!""#);
        match &toks[0] {
            Token::Str(segs) => {
                assert_eq!(segs.len(), 3);
                assert_eq!(segs[0], StrSegment::Text("Hi ".into()));
                assert!(matches!(&segs[1], StrSegment::Interp { src, .. } if src == "name"));
                assert_eq!(segs[2], StrSegment::Text("!".into()));
            }
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn interpolation_may_contain_braces_and_strings() {
        let toks = kinds(r##""#{ {a: "}"}["a"] }""##);
        match &toks[0] {
            Token::Str(segs) => assert!(
                matches!(&segs[0], StrSegment::Interp { src, .. } if src == r#" {a: "}"}["a"] "#)
            ),
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn single_quoted_brace_inside_interpolation() {
        let toks = kinds(r##""#{m['}']}!""##);
        match &toks[0] {
            Token::Str(segs) => {
                assert!(matches!(&segs[0], StrSegment::Interp { src, .. } if src == "m['}']"));
                assert_eq!(segs[1], StrSegment::Text("!".into()));
            }
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn raw_string_does_not_interpolate() {
        assert_eq!(kinds("'#{x}'")[0], Token::Str(vec![StrSegment::Text("#{x}".into())]));
    }

    #[test]
    fn number_then_field_access() {
        assert_eq!(kinds("1.5")[0], Token::Number(1.5));
        assert_eq!(kinds("xs.len")[1], Token::Dot);
    }

    #[test]
    fn unterminated_string_reports_start() {
        let err = Lexer::new("x = \"oops").tokenize().unwrap_err();
        assert_eq!((err.line, err.col), (1, 5));
    }

    #[test]
    fn stray_character() {
        let err = Lexer::new("a @ b").tokenize().unwrap_err();
        assert_eq!(err.col, 3);
        assert_eq!(err.token.as_deref(), Some("'@'"));
    }
}
