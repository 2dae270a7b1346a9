//! Lexer, parser, and AST for the **Nabu UI scripting language** (`.nabu`).
//!
//! This crate is intentionally dependency-free so it can be consumed by
//! editor tooling and linters without pulling in the runtime or the file
//! watcher.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`ast`] | `Script`, `Stmt`, `Expr`, `Call`, `Block` |
//! | [`error`] | `SyntaxError` |
//! | [`lexer`] | `Lexer`, `Token` |
//! | [`parser`] | `parse_str` entry point |
//!
//! # Quick start
//!
//! ```rust
//! use nabu_script::{parse_str, ast::{Expr, Stmt}};
//!
//! let src = r#"
//!     window(id: "main", title: "Hello") do
//!       text(id: "greeting", content: "Hi")
//!     end
//! "#;
//!
//! let script = parse_str(src).unwrap();
//! match &script.body[0] {
//!     Stmt::Expr(Expr::Call(call)) => assert_eq!(call.name, "window"),
//!     _ => unreachable!(),
//! }
//! ```

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;

pub use ast::Script;
pub use error::SyntaxError;
pub use parser::parse_str;

#[cfg(test)]
mod parse_tests {
    use super::*;

    fn ok(src: &str) { parse_str(src).unwrap(); }
    fn err(src: &str) { parse_str(src).unwrap_err(); }

    #[test] fn empty_script() { ok(""); }
    #[test] fn comments_only() { ok("# nothing here\n# at all\n"); }
    #[test] fn empty_block() { ok(r#"window(id: "w") do end"#); }
    #[test] fn empty_brace_block() { ok(r#"window(id: "w") { }"#); }
    #[test] fn nested_blocks() {
        ok(r#"window(id: "w") do
            column(id: "c", spacing: 10) do
              row(id: "r") { button(id: "b", text: "Go") }
            end
          end"#);
    }
    #[test] fn bare_call_with_block() { ok("section do\n  x = 1\nend"); }
    #[test] fn symbols_and_idents() { ok(r#"text(id: "t", align: :center, weight: bold)"#); }
    #[test] fn negative_number() { ok("x = -10 + 4"); }
    #[test] fn float_number() { ok("progress(id: \"p\", value: 0.75)"); }
    #[test] fn string_escape() { ok(r#"text(id: "t", content: "say \"hi\"")"#); }
    #[test] fn interpolation() { ok(r#"title = "Count: #{count + 1}""#); }
    #[test] fn points_literal() { ok(r#"canvas(id: "c", points: [[0, 0], [10, 5]])"#); }
    #[test] fn map_literal_string_keys() { ok(r#"m = {"a b": 1, c: 2}"#); }
    #[test] fn trailing_commas() { ok("f(1, 2,)\nl = [1, 2,]\nm = {a: 1,}"); }
    #[test] fn multiline_kwargs() {
        ok("button(\n  id: \"b\",\n  text: \"OK\",\n  on_click: submit\n)");
    }
    #[test] fn line_continuation() { ok("x = 1 \\\n  + 2"); }
    #[test] fn index_and_field() { ok(r#"v = params["value"].len"#); }
    #[test] fn logical_operators() { ok("ok = a and not b || c && !d"); }
    #[test] fn def_without_parens() { ok("def header\n  text(id: \"h\")\nend"); }
    #[test] fn if_inside_block() {
        ok("column(id: \"c\") do\n  if show\n    text(id: \"t\")\n  end\nend");
    }
    #[test] fn err_unclosed_string() { err(r#"text(id: "oops)"#); }
    #[test] fn err_unclosed_do() { err(r#"window(id: "w") do"#); }
    #[test] fn err_stray_end() { err("x = 1\nend"); }
    #[test] fn err_stray_brace() { err("x = 1\n}"); }
    #[test] fn err_double_colon() { err("text(id: : 8)"); }
    #[test] fn err_duplicate_kwarg() { err(r#"text(id: "a", id: "b")"#); }
    #[test] fn err_duplicate_map_key() { err("m = {a: 1, a: 2}"); }
    #[test] fn err_duplicate_param() { err("def f(a, a)\nend"); }
    #[test] fn err_empty_interpolation() { err(r#"t = "x #{} y""#); }
    #[test] fn err_missing_comma() { err("f(1 2)"); }
    #[test] fn err_else_without_if() { err("else\n"); }

    #[test]
    fn error_display_has_position_and_token() {
        let e = parse_str("x = )").unwrap_err();
        assert_eq!(e.to_string(), "syntax error at 1:5: expected a value (found `)`)");
    }

    #[test]
    fn same_source_same_tree() {
        let src = include_str!("../../nabu-studio/ui/demo.nabu");
        assert_eq!(parse_str(src).unwrap(), parse_str(src).unwrap());
    }
}
