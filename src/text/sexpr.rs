//! Grouping of tokens into S-expression trees.

use crate::diag::{Diagnostic, DiagnosticKind};
use crate::text::token::{Token, TokenKind};

/// An S-expression: either a leaf token,
/// or a head keyword followed by a tail of S-expressions enclosed in `( )`.
#[derive(Clone, Debug, PartialEq)]
pub enum SExpr {
    Token(Token),
    List(SList),
}

impl SExpr {
    /// The source position of the expression.
    pub fn position(&self) -> (usize, usize) {
        match self {
            SExpr::Token(token) => (token.line, token.column),
            SExpr::List(list) => (list.line, list.column),
        }
    }

    /// A short description for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            SExpr::Token(token) => token.describe(),
            SExpr::List(list) => format!("`({} …)`", list.keyword),
        }
    }
}

/// A parenthesized S-expression with its head keyword.
#[derive(Clone, Debug, PartialEq)]
pub struct SList {
    pub keyword: String,
    pub items: Vec<SExpr>,
    pub line: usize,
    pub column: usize,
}

/// Parses a token stream into a sequence of top-level S-expressions.
pub fn parse(tokens: Vec<Token>) -> Result<Vec<SExpr>, Diagnostic> {
    let mut tokens = tokens.into_iter().peekable();
    let mut roots = Vec::new();

    while tokens.peek().is_some() {
        roots.push(parse_expression(&mut tokens)?);
    }

    Ok(roots)
}

fn parse_expression(
    tokens: &mut std::iter::Peekable<std::vec::IntoIter<Token>>,
) -> Result<SExpr, Diagnostic> {
    let token = tokens.next().expect("caller checked for a next token");

    match token.kind {
        TokenKind::LeftParen => {
            let (line, column) = (token.line, token.column);
            let keyword = match tokens.next() {
                Some(Token {
                    kind: TokenKind::Keyword(keyword),
                    ..
                }) => keyword,
                Some(other) => {
                    return Err(Diagnostic::error(
                        DiagnosticKind::Syntax,
                        format!("expected a keyword after `(`, found {}", other.describe()),
                        other.line,
                        other.column,
                    ))
                }
                None => {
                    return Err(Diagnostic::error(
                        DiagnosticKind::Syntax,
                        "unbalanced parentheses: `(` at end of input".to_string(),
                        line,
                        column,
                    ))
                }
            };

            let mut items = Vec::new();

            loop {
                match tokens.peek() {
                    Some(Token {
                        kind: TokenKind::RightParen,
                        ..
                    }) => {
                        tokens.next();
                        break;
                    }
                    Some(_) => items.push(parse_expression(tokens)?),
                    None => {
                        return Err(Diagnostic::error(
                            DiagnosticKind::Syntax,
                            format!("unbalanced parentheses: `({keyword}` is never closed"),
                            line,
                            column,
                        ))
                    }
                }
            }

            Ok(SExpr::List(SList {
                keyword,
                items,
                line,
                column,
            }))
        }
        TokenKind::RightParen => Err(Diagnostic::error(
            DiagnosticKind::Syntax,
            "unbalanced parentheses: unexpected `)`".to_string(),
            token.line,
            token.column,
        )),
        _ => Ok(SExpr::Token(token)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::lexer::tokenize;

    fn parse_source(source: &str) -> Result<Vec<SExpr>, Diagnostic> {
        parse(tokenize(source).unwrap())
    }

    #[test]
    fn empty_module_parses() {
        let roots = parse_source("(module)").unwrap();

        assert_eq!(roots.len(), 1);
        match &roots[0] {
            SExpr::List(list) => {
                assert_eq!(list.keyword, "module");
                assert!(list.items.is_empty());
            }
            other => panic!("expected a list, found {other:?}"),
        }
    }

    #[test]
    fn nesting_is_preserved() {
        let roots = parse_source("(module (func (result i32) i32.const 42))").unwrap();

        match &roots[0] {
            SExpr::List(module) => match &module.items[0] {
                SExpr::List(func) => {
                    assert_eq!(func.keyword, "func");
                    assert_eq!(func.items.len(), 3);
                }
                other => panic!("expected a func list, found {other:?}"),
            },
            other => panic!("expected a module list, found {other:?}"),
        }
    }

    #[test]
    fn unbalanced_parentheses_are_rejected() {
        assert!(parse_source("(module").is_err());
        assert!(parse_source("module)").is_err());
        assert!(parse_source("(module))").is_err());
    }

    #[test]
    fn list_heads_must_be_keywords() {
        assert!(parse_source("($x)").is_err());
        assert!(parse_source("(42)").is_err());
    }
}
