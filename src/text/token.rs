//! Tokens of the WebAssembly text format.

/// A lexical token with its position in the source text.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize, column: usize) -> Self {
        Token { kind, line, column }
    }

    /// A short description of the token for diagnostics.
    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::LeftParen => "`(`".to_string(),
            TokenKind::RightParen => "`)`".to_string(),
            TokenKind::Keyword(word) => format!("keyword `{word}`"),
            TokenKind::Identifier(name) => format!("identifier `${name}`"),
            TokenKind::String(_) => "string literal".to_string(),
            TokenKind::UnsignedInteger(value) => format!("integer `{value}`"),
            TokenKind::SignedInteger(value) => format!("integer `{value}`"),
            TokenKind::Float(_) => "float literal".to_string(),
            TokenKind::Reserved(text) => format!("reserved token `{text}`"),
        }
    }
}

/// The kinds of token the lexer produces.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    /// A bare word starting with a lowercase letter: a mnemonic, a field
    /// keyword, or an annotated argument such as `offset=8`.
    Keyword(String),
    /// A `$`-prefixed symbolic identifier, stored without the sigil.
    Identifier(String),
    /// A string literal decoded to its byte payload.
    /// The payload is used verbatim for data segments and as UTF-8 for names.
    String(Vec<u8>),
    /// An integer literal without a sign.
    UnsignedInteger(u128),
    /// An integer literal with an explicit `+` or `-` sign.
    SignedInteger(i128),
    /// A float literal, preserved precisely enough to reconstruct its bits.
    Float(FloatLiteral),
    /// A token matching no other class.
    Reserved(String),
}

/// A float literal in one of the text format's spellings.
#[derive(Clone, Debug, PartialEq)]
pub struct FloatLiteral {
    pub negative: bool,
    pub body: FloatBody,
}

/// The unsigned part of a float literal.
#[derive(Clone, Debug, PartialEq)]
pub enum FloatBody {
    /// A decimal spelling such as `6.28` or `1e-5`, with separators removed.
    Decimal(String),
    /// A hexadecimal spelling such as `0x1.8p3`, stored without the prefix.
    Hex(String),
    /// `inf`.
    Infinity,
    /// `nan`, or `nan:0x…` with an explicit payload.
    Nan(Option<u64>),
    /// `nan:canonical`.
    NanCanonical,
    /// `nan:arithmetic`.
    NanArithmetic,
}

/// The canonical NaN payload for binary32: sign 0, exponent all-ones,
/// mantissa top bit set and all other bits zero.
const F32_CANONICAL_NAN: u32 = 0x7FC0_0000;

/// The canonical NaN payload for binary64.
const F64_CANONICAL_NAN: u64 = 0x7FF8_0000_0000_0000;

impl FloatLiteral {
    /// The literal interpreted as an IEEE-754 binary32 value.
    /// Returns `None` when the spelling is not meaningful at this width
    /// (e.g. a NaN payload that does not fit the 23-bit mantissa).
    pub fn to_f32(&self) -> Option<f32> {
        let value = match &self.body {
            FloatBody::Decimal(text) => text.parse::<f32>().ok()?,
            FloatBody::Hex(text) => parse_hex_float(text).map(|value| value as f32)?,
            FloatBody::Infinity => f32::INFINITY,
            FloatBody::Nan(None) => f32::from_bits(F32_CANONICAL_NAN),
            FloatBody::Nan(Some(payload)) => {
                if *payload == 0 || *payload >= 1 << 23 {
                    return None;
                }

                f32::from_bits(0x7F80_0000 | *payload as u32)
            }
            FloatBody::NanCanonical | FloatBody::NanArithmetic => {
                f32::from_bits(F32_CANONICAL_NAN)
            }
        };

        Some(if self.negative { -value } else { value })
    }

    /// The literal interpreted as an IEEE-754 binary64 value.
    pub fn to_f64(&self) -> Option<f64> {
        let value = match &self.body {
            FloatBody::Decimal(text) => text.parse::<f64>().ok()?,
            FloatBody::Hex(text) => parse_hex_float(text)?,
            FloatBody::Infinity => f64::INFINITY,
            FloatBody::Nan(None) => f64::from_bits(F64_CANONICAL_NAN),
            FloatBody::Nan(Some(payload)) => {
                if *payload == 0 || *payload >= 1 << 52 {
                    return None;
                }

                f64::from_bits(0x7FF0_0000_0000_0000 | *payload)
            }
            FloatBody::NanCanonical | FloatBody::NanArithmetic => {
                f64::from_bits(F64_CANONICAL_NAN)
            }
        };

        Some(if self.negative { -value } else { value })
    }
}

/// Parses a hexadecimal float spelling (without the `0x` prefix):
/// hex digits, an optional hex fraction, and an optional binary exponent
/// introduced by `p`.
fn parse_hex_float(text: &str) -> Option<f64> {
    let (mantissa_text, exponent) = match text.split_once(['p', 'P']) {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().ok()?),
        None => (text, 0),
    };

    let (integral, fraction) = match mantissa_text.split_once('.') {
        Some((integral, fraction)) => (integral, fraction),
        None => (mantissa_text, ""),
    };

    if integral.is_empty() && fraction.is_empty() {
        return None;
    }

    let mut mantissa: u64 = 0;
    let mut scale = exponent;
    let mut saturated = false;

    for digit in integral.chars() {
        let digit = digit.to_digit(16)? as u64;

        if saturated || mantissa > (u64::MAX - digit) / 16 {
            saturated = true;
            scale = scale.checked_add(4)?;
        } else {
            mantissa = mantissa * 16 + digit;
        }
    }

    for digit in fraction.chars() {
        let digit = digit.to_digit(16)? as u64;

        if saturated || mantissa > (u64::MAX - digit) / 16 {
            break;
        }

        mantissa = mantissa * 16 + digit;
        scale = scale.checked_sub(4)?;
    }

    Some(mantissa as f64 * 2f64.powi(scale))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(body: FloatBody) -> FloatLiteral {
        FloatLiteral {
            negative: false,
            body,
        }
    }

    #[test]
    fn decimal_floats_convert() {
        assert_eq!(
            literal(FloatBody::Decimal("6.28".to_string())).to_f64(),
            Some(6.28)
        );
        assert_eq!(
            literal(FloatBody::Decimal("1e-5".to_string())).to_f32(),
            Some(1e-5f32)
        );
    }

    #[test]
    fn hex_floats_convert() {
        assert_eq!(
            literal(FloatBody::Hex("1.8p3".to_string())).to_f64(),
            Some(12.0)
        );
        assert_eq!(literal(FloatBody::Hex("10".to_string())).to_f64(), Some(16.0));
        assert_eq!(
            literal(FloatBody::Hex("1p-1".to_string())).to_f32(),
            Some(0.5)
        );
    }

    #[test]
    fn infinity_and_sign() {
        let negative = FloatLiteral {
            negative: true,
            body: FloatBody::Infinity,
        };

        assert_eq!(negative.to_f64(), Some(f64::NEG_INFINITY));
    }

    #[test]
    fn nan_payloads_place_their_bits() {
        let canonical = literal(FloatBody::Nan(None)).to_f32().unwrap();
        assert_eq!(canonical.to_bits(), 0x7FC0_0000);

        let custom = literal(FloatBody::Nan(Some(0x200001))).to_f32().unwrap();
        assert_eq!(custom.to_bits(), 0x7FA0_0001);

        assert!(literal(FloatBody::Nan(Some(1 << 23))).to_f32().is_none());
    }

    #[test]
    fn canonical_and_arithmetic_nans_are_quiet() {
        assert_eq!(
            literal(FloatBody::NanCanonical).to_f64().unwrap().to_bits(),
            0x7FF8_0000_0000_0000
        );
        assert!(literal(FloatBody::NanArithmetic).to_f32().unwrap().is_nan());
    }
}
