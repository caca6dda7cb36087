//! Lexer for the WebAssembly text format.

use crate::diag::{Diagnostic, DiagnosticKind};
use crate::text::token::{FloatBody, FloatLiteral, Token, TokenKind};

/// Characters permitted inside bare words
/// (mnemonics, identifiers, numbers, reserved tokens).
fn is_word_char(character: char) -> bool {
    character.is_ascii_alphanumeric()
        || matches!(
            character,
            '!' | '#'
                | '$'
                | '%'
                | '&'
                | '\''
                | '*'
                | '+'
                | '-'
                | '.'
                | '/'
                | ':'
                | '<'
                | '='
                | '>'
                | '?'
                | '@'
                | '\\'
                | '^'
                | '_'
                | '`'
                | '|'
                | '~'
        )
}

/// Tokenizes WebAssembly text-format source.
/// Whitespace and comments are elided;
/// every malformed construct is a `Syntax` diagnostic.
pub fn tokenize(source: &str) -> Result<Vec<Token>, Diagnostic> {
    Lexer::new(source).run()
}

struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Lexer {
            input: source.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let character = self.current()?;

        if character == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        self.position += 1;

        Some(character)
    }

    fn error(&self, message: String) -> Diagnostic {
        Diagnostic::error(DiagnosticKind::Syntax, message, self.line, self.column)
    }

    fn run(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();

        loop {
            self.skip_trivia()?;

            let (line, column) = (self.line, self.column);
            let character = match self.current() {
                Some(character) => character,
                None => break,
            };

            let kind = match character {
                '(' => {
                    self.advance();
                    TokenKind::LeftParen
                }
                ')' => {
                    self.advance();
                    TokenKind::RightParen
                }
                '"' => self.lex_string()?,
                character if is_word_char(character) => self.lex_word()?,
                other => return Err(self.error(format!("unexpected character `{other}`"))),
            };

            tokens.push(Token::new(kind, line, column));
        }

        Ok(tokens)
    }

    /// Skips whitespace, `;;` line comments,
    /// and nested `(; … ;)` block comments.
    fn skip_trivia(&mut self) -> Result<(), Diagnostic> {
        loop {
            match (self.current(), self.peek(1)) {
                (Some(character), _) if character.is_whitespace() => {
                    self.advance();
                }
                (Some(';'), Some(';')) => {
                    while let Some(character) = self.current() {
                        if character == '\n' {
                            break;
                        }

                        self.advance();
                    }
                }
                (Some('('), Some(';')) => {
                    self.advance();
                    self.advance();

                    let mut depth = 1usize;

                    while depth > 0 {
                        match (self.current(), self.peek(1)) {
                            (Some('('), Some(';')) => {
                                self.advance();
                                self.advance();
                                depth += 1;
                            }
                            (Some(';'), Some(')')) => {
                                self.advance();
                                self.advance();
                                depth -= 1;
                            }
                            (Some(_), _) => {
                                self.advance();
                            }
                            (None, _) => {
                                return Err(self.error("unterminated block comment".to_string()));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Lexes a string literal to its byte payload.
    /// The payload need not be valid UTF-8.
    fn lex_string(&mut self) -> Result<TokenKind, Diagnostic> {
        self.advance();

        let mut bytes = Vec::new();

        loop {
            match self.advance() {
                None => return Err(self.error("unterminated string literal".to_string())),
                Some('"') => return Ok(TokenKind::String(bytes)),
                Some('\\') => match self.advance() {
                    Some('n') => bytes.push(b'\n'),
                    Some('t') => bytes.push(b'\t'),
                    Some('r') => bytes.push(b'\r'),
                    Some('\\') => bytes.push(b'\\'),
                    Some('"') => bytes.push(b'"'),
                    Some('\'') => bytes.push(b'\''),
                    Some('u') => {
                        if self.advance() != Some('{') {
                            return Err(self.error("expected `{` after `\\u`".to_string()));
                        }

                        let mut digits = String::new();

                        loop {
                            match self.advance() {
                                Some('}') => break,
                                Some(digit) if digit.is_ascii_hexdigit() => digits.push(digit),
                                _ => {
                                    return Err(
                                        self.error("malformed `\\u{…}` escape".to_string())
                                    )
                                }
                            }
                        }

                        let scalar = u32::from_str_radix(&digits, 16)
                            .ok()
                            .and_then(char::from_u32)
                            .ok_or_else(|| {
                                self.error(format!("`\\u{{{digits}}}` is not a scalar value"))
                            })?;

                        let mut encoded = [0u8; 4];
                        bytes.extend_from_slice(scalar.encode_utf8(&mut encoded).as_bytes());
                    }
                    Some('x') => {
                        let high = self
                            .advance()
                            .filter(char::is_ascii_hexdigit)
                            .ok_or_else(|| self.error("malformed `\\xNN` escape".to_string()))?;
                        let low = self
                            .advance()
                            .filter(char::is_ascii_hexdigit)
                            .ok_or_else(|| self.error("malformed `\\xNN` escape".to_string()))?;

                        bytes.push(
                            (high.to_digit(16).unwrap() * 16 + low.to_digit(16).unwrap()) as u8,
                        );
                    }
                    Some(high) if high.is_ascii_hexdigit() => {
                        let low = self
                            .advance()
                            .filter(char::is_ascii_hexdigit)
                            .ok_or_else(|| self.error("malformed `\\xx` escape".to_string()))?;
                        let byte = (high.to_digit(16).unwrap() * 16 + low.to_digit(16).unwrap())
                            as u8;

                        bytes.push(byte);
                    }
                    _ => return Err(self.error("unknown string escape".to_string())),
                },
                Some(character) => {
                    let mut encoded = [0u8; 4];
                    bytes.extend_from_slice(character.encode_utf8(&mut encoded).as_bytes());
                }
            }
        }
    }

    /// Lexes a bare word and classifies it as an identifier, a number,
    /// a keyword, or a reserved token.
    fn lex_word(&mut self) -> Result<TokenKind, Diagnostic> {
        let mut word = String::new();

        while let Some(character) = self.current() {
            if !is_word_char(character) {
                break;
            }

            word.push(character);
            self.advance();
        }

        if let Some(name) = word.strip_prefix('$') {
            if name.is_empty() {
                return Err(self.error("`$` must be followed by an identifier".to_string()));
            }

            return Ok(TokenKind::Identifier(name.to_string()));
        }

        if let Some(kind) = classify_number(&word) {
            return match kind {
                Ok(kind) => Ok(kind),
                Err(message) => Err(self.error(message)),
            };
        }

        if word.starts_with(|character: char| character.is_ascii_lowercase()) {
            return Ok(TokenKind::Keyword(word));
        }

        Ok(TokenKind::Reserved(word))
    }
}

/// Classifies a word that begins like a number.
/// Returns `None` when the word is not numeric at all,
/// `Some(Err(…))` when it is numeric but malformed.
fn classify_number(word: &str) -> Option<Result<TokenKind, String>> {
    let (negative, explicit_sign, digits) = match word.strip_prefix('-') {
        Some(rest) => (true, true, rest),
        None => match word.strip_prefix('+') {
            Some(rest) => (false, true, rest),
            None => (false, false, word),
        },
    };

    if !digits.starts_with(|character: char| character.is_ascii_digit()) {
        // `inf` and `nan` are numbers too.
        return classify_symbolic_float(digits)
            .map(|body| Ok(TokenKind::Float(FloatLiteral { negative, body })));
    }

    let normalized: String = digits.chars().filter(|&c| c != '_').collect();

    if let Some(hex) = normalized.strip_prefix("0x").or(normalized.strip_prefix("0X")) {
        if hex.contains(['.', 'p', 'P']) {
            return Some(Ok(TokenKind::Float(FloatLiteral {
                negative,
                body: FloatBody::Hex(hex.to_string()),
            })));
        }

        return Some(match u128::from_str_radix(hex, 16) {
            Ok(value) if explicit_sign => signed_token(negative, value),
            Ok(value) => Ok(TokenKind::UnsignedInteger(value)),
            Err(_) => Err(format!("`{word}` is not a valid integer literal")),
        });
    }

    if normalized.contains(['.', 'e', 'E']) {
        return Some(Ok(TokenKind::Float(FloatLiteral {
            negative,
            body: FloatBody::Decimal(normalized),
        })));
    }

    Some(match normalized.parse::<u128>() {
        Ok(value) if explicit_sign => signed_token(negative, value),
        Ok(value) => Ok(TokenKind::UnsignedInteger(value)),
        Err(_) => Err(format!("`{word}` is not a valid integer literal")),
    })
}

fn signed_token(negative: bool, magnitude: u128) -> Result<TokenKind, String> {
    let value = if negative {
        (magnitude as i128).checked_neg()
    } else if magnitude <= i128::MAX as u128 {
        Some(magnitude as i128)
    } else {
        None
    };

    match value {
        Some(value) => Ok(TokenKind::SignedInteger(value)),
        None => Err("integer literal is out of range".to_string()),
    }
}

/// Classifies the symbolic float spellings: `inf`, `nan`, `nan:0x…`,
/// `nan:canonical`, and `nan:arithmetic`.
fn classify_symbolic_float(word: &str) -> Option<FloatBody> {
    match word {
        "inf" => Some(FloatBody::Infinity),
        "nan" => Some(FloatBody::Nan(None)),
        "nan:canonical" => Some(FloatBody::NanCanonical),
        "nan:arithmetic" => Some(FloatBody::NanArithmetic),
        _ => {
            let payload = word.strip_prefix("nan:0x")?;
            let normalized: String = payload.chars().filter(|&c| c != '_').collect();

            u64::from_str_radix(&normalized, 16)
                .ok()
                .map(|payload| FloatBody::Nan(Some(payload)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn parentheses_and_keywords() {
        assert_eq!(
            kinds("(module)"),
            vec![
                TokenKind::LeftParen,
                TokenKind::Keyword("module".to_string()),
                TokenKind::RightParen,
            ]
        );
    }

    #[test]
    fn identifiers_drop_the_sigil() {
        assert_eq!(
            kinds("$add $f-2"),
            vec![
                TokenKind::Identifier("add".to_string()),
                TokenKind::Identifier("f-2".to_string()),
            ]
        );
    }

    #[test]
    fn integers_classify_by_sign() {
        assert_eq!(
            kinds("42 -8 +10 0xFF_FF"),
            vec![
                TokenKind::UnsignedInteger(42),
                TokenKind::SignedInteger(-8),
                TokenKind::SignedInteger(10),
                TokenKind::UnsignedInteger(0xFFFF),
            ]
        );
    }

    #[test]
    fn floats_classify_by_spelling() {
        let tokens = kinds("6.28 -0x1.8p3 inf nan:0x7ff");

        assert_eq!(
            tokens[0],
            TokenKind::Float(FloatLiteral {
                negative: false,
                body: FloatBody::Decimal("6.28".to_string()),
            })
        );
        assert_eq!(
            tokens[1],
            TokenKind::Float(FloatLiteral {
                negative: true,
                body: FloatBody::Hex("1.8p3".to_string()),
            })
        );
        assert_eq!(
            tokens[2],
            TokenKind::Float(FloatLiteral {
                negative: false,
                body: FloatBody::Infinity,
            })
        );
        assert_eq!(
            tokens[3],
            TokenKind::Float(FloatLiteral {
                negative: false,
                body: FloatBody::Nan(Some(0x7FF)),
            })
        );
    }

    #[test]
    fn strings_decode_escapes_to_bytes() {
        assert_eq!(
            kinds(r#""hello\n" "\de\ad" "\u{2603}""#),
            vec![
                TokenKind::String(b"hello\n".to_vec()),
                TokenKind::String(vec![0xDE, 0xAD]),
                TokenKind::String("☃".as_bytes().to_vec()),
            ]
        );
    }

    #[test]
    fn comments_are_elided() {
        assert_eq!(
            kinds(";; line\n(module (; inner (; nested ;) ;) )"),
            vec![
                TokenKind::LeftParen,
                TokenKind::Keyword("module".to_string()),
                TokenKind::RightParen,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(tokenize("\"abc").is_err());
        assert!(tokenize("(; never closed").is_err());
    }

    #[test]
    fn annotated_arguments_stay_keywords() {
        assert_eq!(
            kinds("offset=8 align=4"),
            vec![
                TokenKind::Keyword("offset=8".to_string()),
                TokenKind::Keyword("align=4".to_string()),
            ]
        );
    }
}
