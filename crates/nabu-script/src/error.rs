use std::fmt;

/// A syntax error from the `.nabu` lexer or parser.
///
/// Parsing never recovers: the first error aborts the pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub message: String,
    /// 1-based source line number where the error occurred.
    pub line: usize,
    /// 1-based source column number where the error occurred.
    pub col: usize,
    /// The offending token as it appeared in the source, if there was one.
    pub token: Option<String>,
}

impl SyntaxError {
    pub(crate) fn new(msg: impl Into<String>, line: usize, col: usize) -> Self {
        Self { message: msg.into(), line, col, token: None }
    }

    pub(crate) fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "syntax error at {}:{}: {}", self.line, self.col, self.message)?;
        if let Some(token) = &self.token {
            write!(f, " (found {token})")?;
        }
        Ok(())
    }
}

impl std::error::Error for SyntaxError {}
