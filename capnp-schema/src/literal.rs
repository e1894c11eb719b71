//! Decoding of numeric [literals] into values, checked against the limits of
//! the primitive type they are written for.
//!
//! One algorithm serves every integer width and both float widths: the target
//! type is described by a [`NumericLimits`] value rather than by a type
//! parameter. Out of range literals are rejected, never wrapped.
//!
//! [literals]: https://en.wikipedia.org/wiki/Literal_%28computer_programming%29

use logos::Logos;
use std::fmt;

/// The sign of a numeric literal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Sign {
    Positive,
    Negative,
}

/// The [base] of a numeric digit.
///
/// [base]: https://en.wikipedia.org/wiki/Radix
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Base {
    Octal,
    Decimal,
    Hexadecimal,
}

impl Base {
    pub fn to_u8(self) -> u8 {
        match self {
            Base::Octal => 8,
            Base::Decimal => 10,
            Base::Hexadecimal => 16,
        }
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Base::Octal => write!(f, "octal"),
            Base::Decimal => write!(f, "decimal"),
            Base::Hexadecimal => write!(f, "hexadecimal"),
        }
    }
}

/// The representation of a primitive numeric type.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NumericKind {
    Signed,
    Unsigned,
    Float,
}

/// Bit width, signedness and range of one primitive numeric type.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NumericLimits {
    name: &'static str,
    bits: u32,
    kind: NumericKind,
}

impl NumericLimits {
    pub const INT8: NumericLimits = NumericLimits::new("Int8", 8, NumericKind::Signed);
    pub const INT16: NumericLimits = NumericLimits::new("Int16", 16, NumericKind::Signed);
    pub const INT32: NumericLimits = NumericLimits::new("Int32", 32, NumericKind::Signed);
    pub const INT64: NumericLimits = NumericLimits::new("Int64", 64, NumericKind::Signed);
    pub const UINT8: NumericLimits = NumericLimits::new("UInt8", 8, NumericKind::Unsigned);
    pub const UINT16: NumericLimits = NumericLimits::new("UInt16", 16, NumericKind::Unsigned);
    pub const UINT32: NumericLimits = NumericLimits::new("UInt32", 32, NumericKind::Unsigned);
    pub const UINT64: NumericLimits = NumericLimits::new("UInt64", 64, NumericKind::Unsigned);
    pub const FLOAT32: NumericLimits = NumericLimits::new("Float32", 32, NumericKind::Float);
    pub const FLOAT64: NumericLimits = NumericLimits::new("Float64", 64, NumericKind::Float);

    const fn new(name: &'static str, bits: u32, kind: NumericKind) -> NumericLimits {
        NumericLimits { name, bits, kind }
    }

    /// The name of the type these limits describe.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn bits(&self) -> u32 {
        self.bits
    }

    pub const fn kind(&self) -> NumericKind {
        self.kind
    }

    /// The largest value representable by the type.
    pub fn max(&self) -> Number {
        match self.kind {
            NumericKind::Signed | NumericKind::Unsigned => Number::Integer(self.max_integer()),
            NumericKind::Float => Number::Float(self.max_float()),
        }
    }

    /// The smallest value representable by the type.
    pub fn min(&self) -> Number {
        match self.kind {
            NumericKind::Signed | NumericKind::Unsigned => Number::Integer(self.min_integer()),
            NumericKind::Float => Number::Float(-self.max_float()),
        }
    }

    fn max_integer(&self) -> i128 {
        match self.kind {
            NumericKind::Signed => (1 << (self.bits - 1)) - 1,
            NumericKind::Unsigned => (1 << self.bits) - 1,
            NumericKind::Float => 0,
        }
    }

    fn min_integer(&self) -> i128 {
        match self.kind {
            NumericKind::Signed => -(1 << (self.bits - 1)),
            NumericKind::Unsigned | NumericKind::Float => 0,
        }
    }

    fn max_float(&self) -> f64 {
        match self.bits {
            32 => f64::from(f32::MAX),
            _ => f64::MAX,
        }
    }
}

/// A decoded numeric value.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Number {
    Integer(i128),
    Float(f64),
}

/// The shape of a numeric literal, as decided by its prefix and punctuation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Shape {
    Integer(Base),
    Float,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiteralError {
    #[error("unexpected end of numeric literal")]
    UnexpectedEnd,
    #[error("expected {0} digit")]
    ExpectedDigit(Base),
    #[error("hexadecimal literals must start with a lowercase `0x`")]
    UppercaseHexPrefix,
    #[error("expected a `0x` prefix")]
    ExpectedHexPrefix,
    #[error("negative literal for unsigned type `{0}`")]
    NegativeUnsigned(&'static str),
    #[error("literal out of range for `{0}`")]
    OutOfRange(&'static str),
    #[error("{0} literals cannot be used for `{1}`")]
    UnsupportedBase(Base, &'static str),
    #[error("expected an integer literal for `{0}`")]
    ExpectedInteger(&'static str),
}

/// Convert the first byte of the source string to a digit.
fn ascii_digit<'source, Token>(lexer: &mut logos::Lexer<'source, Token>) -> Option<u8>
where
    Token: Logos<'source, Source = [u8]>,
{
    match lexer.slice().first()? {
        byte @ b'0'..=b'9' => Some(byte - b'0'),
        byte @ b'a'..=b'z' => Some(byte - b'a' + 10),
        byte @ b'A'..=b'Z' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Numeric literal tokens.
#[derive(Debug, Clone, Logos)]
enum NumericLiteral {
    #[token(b"-")]
    Minus,
    #[token(b"0x")]
    HexPrefix,
    #[token(b"0X")]
    UppercaseHexPrefix,
    #[regex(b"[0-9]", ascii_digit)]
    Digit(u8),

    #[error]
    Error,
}

/// Digits up to base 16, along with any other letters so that they can be
/// reported as invalid digits.
#[derive(Debug, Clone, Logos)]
enum Digit16 {
    #[regex(b"[0-9a-zA-Z]", ascii_digit)]
    Digit(u8),

    #[error]
    Error,
}

/// Digits up to base 10, with the punctuation of float literals.
#[derive(Debug, Clone, Logos)]
enum Digit10 {
    #[regex(b"[0-9]")]
    Digit,
    #[token(b".")]
    StartFractional,
    #[token(b"e")]
    #[token(b"E")]
    StartExponent,
    #[token(b"+")]
    Plus,
    #[token(b"-")]
    Minus,

    #[error]
    Error,
}

/// Classify a numeric literal by its prefix: `0x` is hexadecimal, a leading
/// `0` followed by more digits is octal, and anything with a fraction or an
/// exponent is a float.
pub fn classify(text: &str) -> Result<Shape, LiteralError> {
    let digits = text.strip_prefix('-').unwrap_or(text);

    if digits.starts_with("0x") {
        Ok(Shape::Integer(Base::Hexadecimal))
    } else if digits.starts_with("0X") {
        Err(LiteralError::UppercaseHexPrefix)
    } else if digits.contains(['.', 'e', 'E']) {
        Ok(Shape::Float)
    } else if digits.len() > 1 && digits.starts_with('0') {
        Ok(Shape::Integer(Base::Octal))
    } else {
        Ok(Shape::Integer(Base::Decimal))
    }
}

/// Parse a literal of any base, choosing the base from the literal's prefix.
pub fn parse_number(text: &str, limits: &NumericLimits) -> Result<Number, LiteralError> {
    match classify(text)? {
        Shape::Integer(Base::Hexadecimal) => try_parse_hexadecimal(text, limits),
        Shape::Integer(Base::Octal) => try_parse_octal(text, limits),
        Shape::Integer(Base::Decimal) | Shape::Float => try_parse_decimal_or_float(text, limits),
    }
}

/// Parse a decimal integer, or a float if `limits` describes a float type.
pub fn try_parse_decimal_or_float(
    text: &str,
    limits: &NumericLimits,
) -> Result<Number, LiteralError> {
    match limits.kind {
        NumericKind::Float => parse_float(text, limits).map(Number::Float),
        NumericKind::Signed | NumericKind::Unsigned => match classify(text) {
            Ok(Shape::Float) => Err(LiteralError::ExpectedInteger(limits.name)),
            _ => parse_integer(text, limits, Base::Decimal).map(Number::Integer),
        },
    }
}

/// Parse a base 8 integer. Leading zeros are permitted.
pub fn try_parse_octal(text: &str, limits: &NumericLimits) -> Result<Number, LiteralError> {
    match limits.kind {
        NumericKind::Float => Err(LiteralError::UnsupportedBase(Base::Octal, limits.name)),
        NumericKind::Signed | NumericKind::Unsigned => {
            parse_integer(text, limits, Base::Octal).map(Number::Integer)
        }
    }
}

/// Parse a base 16 integer, which must start with a lowercase `0x` prefix.
pub fn try_parse_hexadecimal(text: &str, limits: &NumericLimits) -> Result<Number, LiteralError> {
    match limits.kind {
        NumericKind::Float => Err(LiteralError::UnsupportedBase(Base::Hexadecimal, limits.name)),
        NumericKind::Signed | NumericKind::Unsigned => {
            parse_integer(text, limits, Base::Hexadecimal).map(Number::Integer)
        }
    }
}

fn parse_integer(text: &str, limits: &NumericLimits, base: Base) -> Result<i128, LiteralError> {
    let mut lexer = NumericLiteral::lexer(text.as_bytes());

    let (sign, token) = match lexer.next() {
        Some(NumericLiteral::Minus) => (Sign::Negative, lexer.next()),
        token => (Sign::Positive, token),
    };

    if sign == Sign::Negative && limits.kind == NumericKind::Unsigned {
        return Err(LiteralError::NegativeUnsigned(limits.name));
    }

    let start_digit = match (base, token) {
        (_, None) => return Err(LiteralError::UnexpectedEnd),
        (_, Some(NumericLiteral::UppercaseHexPrefix)) => {
            return Err(LiteralError::UppercaseHexPrefix)
        }
        (Base::Hexadecimal, Some(NumericLiteral::HexPrefix)) => None,
        (Base::Hexadecimal, Some(_)) => return Err(LiteralError::ExpectedHexPrefix),
        (_, Some(NumericLiteral::Digit(digit))) if digit < base.to_u8() => Some(digit),
        (_, Some(_)) => return Err(LiteralError::ExpectedDigit(base)),
    };

    let mut value = 0;
    let mut num_digits = 0;

    if let Some(digit) = start_digit {
        value = accumulate(limits, sign, base, value, digit)?;
        num_digits += 1;
    }

    let mut lexer = lexer.morph::<Digit16>();
    while let Some(token) = lexer.next() {
        match token {
            Digit16::Digit(digit) if digit < base.to_u8() => {
                value = accumulate(limits, sign, base, value, digit)?;
                num_digits += 1;
            }
            Digit16::Digit(_) | Digit16::Error => return Err(LiteralError::ExpectedDigit(base)),
        }
    }

    if num_digits == 0 {
        return Err(LiteralError::UnexpectedEnd);
    }

    Ok(value)
}

/// Shift a digit onto the accumulated value, failing as soon as the value
/// leaves the range of the target type.
fn accumulate(
    limits: &NumericLimits,
    sign: Sign,
    base: Base,
    value: i128,
    digit: u8,
) -> Result<i128, LiteralError> {
    let shifted = value.checked_mul(i128::from(base.to_u8()));
    let next = match sign {
        Sign::Positive => shifted.and_then(|value| value.checked_add(i128::from(digit))),
        Sign::Negative => shifted.and_then(|value| value.checked_sub(i128::from(digit))),
    };

    next.filter(|next| (limits.min_integer()..=limits.max_integer()).contains(next))
        .ok_or(LiteralError::OutOfRange(limits.name))
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum FloatPart {
    Integer,
    Fraction,
    Exponent,
}

/// Validate the digits of a decimal float literal, then decode it with the
/// locale independent float parser of the standard library.
fn parse_float(text: &str, limits: &NumericLimits) -> Result<f64, LiteralError> {
    let mut lexer = NumericLiteral::lexer(text.as_bytes());

    let token = match lexer.next() {
        Some(NumericLiteral::Minus) => lexer.next(),
        token => token,
    };

    match token {
        Some(NumericLiteral::Digit(_)) => {}
        Some(NumericLiteral::HexPrefix) => {
            return Err(LiteralError::UnsupportedBase(Base::Hexadecimal, limits.name))
        }
        Some(NumericLiteral::UppercaseHexPrefix) => return Err(LiteralError::UppercaseHexPrefix),
        Some(NumericLiteral::Minus | NumericLiteral::Error) => {
            return Err(LiteralError::ExpectedDigit(Base::Decimal))
        }
        None => return Err(LiteralError::UnexpectedEnd),
    }

    let mut lexer = lexer.morph::<Digit10>();
    let mut part = FloatPart::Integer;
    let mut part_digits = 1;
    let mut exponent_signed = false;

    while let Some(token) = lexer.next() {
        match token {
            Digit10::Digit => part_digits += 1,
            Digit10::StartFractional if part == FloatPart::Integer => {
                part = FloatPart::Fraction;
                part_digits = 0;
            }
            Digit10::StartExponent if part != FloatPart::Exponent && part_digits > 0 => {
                part = FloatPart::Exponent;
                part_digits = 0;
            }
            Digit10::Plus | Digit10::Minus
                if part == FloatPart::Exponent && part_digits == 0 && !exponent_signed =>
            {
                exponent_signed = true;
            }
            _ => return Err(LiteralError::ExpectedDigit(Base::Decimal)),
        }
    }

    if part_digits == 0 {
        return Err(LiteralError::UnexpectedEnd);
    }

    let value = text
        .parse::<f64>()
        .map_err(|_| LiteralError::ExpectedDigit(Base::Decimal))?;

    if value.is_finite() && value.abs() <= limits.max_float() {
        Ok(value)
    } else {
        Err(LiteralError::OutOfRange(limits.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_int32() {
        let value = try_parse_decimal_or_float("3", &NumericLimits::INT32);
        assert_eq!(value, Ok(Number::Integer(3)));
    }

    #[test]
    fn unsigned_32_bit_maximum() {
        assert_eq!(
            NumericLimits::UINT32.max(),
            Number::Integer(i128::from(u32::MAX))
        );
        assert_eq!(
            try_parse_decimal_or_float("4294967295", &NumericLimits::UINT32),
            Ok(NumericLimits::UINT32.max()),
        );
        assert_eq!(
            try_parse_decimal_or_float("4294967296", &NumericLimits::UINT32),
            Err(LiteralError::OutOfRange("UInt32")),
        );
    }

    #[test]
    fn octal_maximum_is_accepted() {
        let value = try_parse_octal("17777777777", &NumericLimits::INT32);
        assert_eq!(value, Ok(NumericLimits::INT32.max()));
        assert_eq!(value, Ok(Number::Integer(i128::from(i32::MAX))));
    }

    #[test]
    fn octal_one_past_maximum_fails() {
        assert!(try_parse_octal("17777777778", &NumericLimits::INT32).is_err());
        assert_eq!(
            try_parse_octal("20000000000", &NumericLimits::INT32),
            Err(LiteralError::OutOfRange("Int32")),
        );
    }

    #[test]
    fn octal_uses_base_eight() {
        assert_eq!(
            try_parse_octal("123", &NumericLimits::INT32),
            Ok(Number::Integer(83))
        );
        assert_eq!(
            parse_number("0123", &NumericLimits::INT32),
            Ok(Number::Integer(83))
        );
        assert_eq!(
            try_parse_octal("0009", &NumericLimits::INT32),
            Err(LiteralError::ExpectedDigit(Base::Octal)),
        );
    }

    #[test]
    fn signed_bounds() {
        assert_eq!(
            try_parse_decimal_or_float("-128", &NumericLimits::INT8),
            Ok(Number::Integer(-128)),
        );
        assert_eq!(
            try_parse_decimal_or_float("-129", &NumericLimits::INT8),
            Err(LiteralError::OutOfRange("Int8")),
        );
        assert_eq!(
            try_parse_decimal_or_float("128", &NumericLimits::INT8),
            Err(LiteralError::OutOfRange("Int8")),
        );
        assert_eq!(
            NumericLimits::INT64.min(),
            Number::Integer(i128::from(i64::MIN))
        );
    }

    #[test]
    fn negative_unsigned_fails() {
        assert_eq!(
            try_parse_decimal_or_float("-1", &NumericLimits::UINT8),
            Err(LiteralError::NegativeUnsigned("UInt8")),
        );
    }

    #[test]
    fn float64() {
        assert_eq!(
            try_parse_decimal_or_float("-3.1415", &NumericLimits::FLOAT64),
            Ok(Number::Float(-3.1415)),
        );
        assert_eq!(
            try_parse_decimal_or_float("1.5e3", &NumericLimits::FLOAT64),
            Ok(Number::Float(1500.0)),
        );
        assert_eq!(
            try_parse_decimal_or_float("2E-2", &NumericLimits::FLOAT64),
            Ok(Number::Float(0.02)),
        );
        assert_eq!(
            try_parse_decimal_or_float("7", &NumericLimits::FLOAT64),
            Ok(Number::Float(7.0)),
        );
    }

    #[test]
    fn float_out_of_range() {
        assert_eq!(
            try_parse_decimal_or_float("1e400", &NumericLimits::FLOAT64),
            Err(LiteralError::OutOfRange("Float64")),
        );
        assert_eq!(
            try_parse_decimal_or_float("3.5e38", &NumericLimits::FLOAT32),
            Err(LiteralError::OutOfRange("Float32")),
        );
    }

    #[test]
    fn malformed_floats() {
        assert_eq!(
            try_parse_decimal_or_float("1.", &NumericLimits::FLOAT64),
            Err(LiteralError::UnexpectedEnd),
        );
        assert_eq!(
            try_parse_decimal_or_float("1.2.3", &NumericLimits::FLOAT64),
            Err(LiteralError::ExpectedDigit(Base::Decimal)),
        );
        assert_eq!(
            try_parse_decimal_or_float("1.5", &NumericLimits::INT32),
            Err(LiteralError::ExpectedInteger("Int32")),
        );
    }

    #[test]
    fn hexadecimal() {
        assert_eq!(
            parse_number("0x1F", &NumericLimits::UINT8),
            Ok(Number::Integer(31))
        );
        assert_eq!(
            parse_number("0xdbb9ad1f14bf0b36", &NumericLimits::UINT64),
            Ok(Number::Integer(0xdbb9ad1f14bf0b36)),
        );
        assert_eq!(
            parse_number("0x100", &NumericLimits::UINT8),
            Err(LiteralError::OutOfRange("UInt8")),
        );
        assert_eq!(
            parse_number("0x", &NumericLimits::UINT8),
            Err(LiteralError::UnexpectedEnd)
        );
        assert_eq!(
            parse_number("0xfg", &NumericLimits::UINT8),
            Err(LiteralError::ExpectedDigit(Base::Hexadecimal)),
        );
    }

    #[test]
    fn uppercase_hex_prefix_fails() {
        assert_eq!(
            parse_number("0X123", &NumericLimits::INT32),
            Err(LiteralError::UppercaseHexPrefix),
        );
        assert_eq!(
            try_parse_hexadecimal("0X123", &NumericLimits::INT32),
            Err(LiteralError::UppercaseHexPrefix),
        );
    }

    #[test]
    fn classify_literals() {
        assert_eq!(classify("0"), Ok(Shape::Integer(Base::Decimal)));
        assert_eq!(classify("-17"), Ok(Shape::Integer(Base::Decimal)));
        assert_eq!(classify("017"), Ok(Shape::Integer(Base::Octal)));
        assert_eq!(classify("0x1e"), Ok(Shape::Integer(Base::Hexadecimal)));
        assert_eq!(classify("1e10"), Ok(Shape::Float));
        assert_eq!(classify("-0.5"), Ok(Shape::Float));
    }
}
