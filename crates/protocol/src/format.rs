//! Format grammar codec
//!
//! Payloads are described by compact format strings, one character per field:
//!
//! | tag | wire type |
//! |-----|-----------|
//! | `b` | i8 |
//! | `B` | u8 |
//! | `s` | i16, little-endian |
//! | `S` | u16, little-endian |
//! | `i` | i32, little-endian |
//! | `I` | u32, little-endian |
//! | `f` | f32, little-endian IEEE 754 |
//! | `u` | UTF-16LE string: u32 count (code units + 1), code units, 0x0000 |
//! | `[...]` | repetition group, matched greedily, no count prefix |
//!
//! A format string is parsed once into a [`Format`] token tree and can then be
//! applied to any number of buffers. Decoding walks an explicit [`Reader`]
//! cursor; recursion depth is bounded by bracket nesting, never by payload size.

use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;

use crate::error::{ProtocolError, Result};

/// Fixed-width scalar types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
}

impl Scalar {
    /// Width on the wire in bytes
    pub fn width(&self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::F32 => "f32",
        }
    }
}

/// One element of a parsed format
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Scalar(Scalar),
    String,
    Group(Vec<Token>),
}

impl Token {
    fn from_tag(tag: char) -> Result<Self> {
        let token = match tag {
            'b' => Self::Scalar(Scalar::I8),
            'B' => Self::Scalar(Scalar::U8),
            's' => Self::Scalar(Scalar::I16),
            'S' => Self::Scalar(Scalar::U16),
            'i' => Self::Scalar(Scalar::I32),
            'I' => Self::Scalar(Scalar::U32),
            'f' => Self::Scalar(Scalar::F32),
            'u' => Self::String,
            other => return Err(ProtocolError::UnknownFormatTag(other)),
        };
        Ok(token)
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Scalar(scalar) => scalar.name(),
            Self::String => "string",
            Self::Group(_) => "group",
        }
    }
}

/// A decoded field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    F32(f32),
    Str(String),
    /// One inner value sequence per repetition
    Group(Vec<Vec<Value>>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Self::I8(_) => "i8",
            Self::U8(_) => "u8",
            Self::I16(_) => "i16",
            Self::U16(_) => "u16",
            Self::I32(_) => "i32",
            Self::U32(_) => "u32",
            Self::F32(_) => "f32",
            Self::Str(_) => "string",
            Self::Group(_) => "group",
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

/// Parsed, immutable format description
#[derive(Debug, Clone, PartialEq)]
pub struct Format {
    tokens: Vec<Token>,
}

impl Format {
    /// Parse a format string into a token tree
    ///
    /// # Errors
    /// `UnknownFormatTag` for characters outside the grammar,
    /// `UnbalancedBrackets` when `[` and `]` do not pair up.
    pub fn parse(pattern: &str) -> Result<Self> {
        let mut stack: Vec<Vec<Token>> = vec![Vec::new()];

        for tag in pattern.chars() {
            match tag {
                '[' => stack.push(Vec::new()),
                ']' => {
                    if stack.len() < 2 {
                        return Err(ProtocolError::UnbalancedBrackets);
                    }
                    let group = stack.pop().ok_or(ProtocolError::UnbalancedBrackets)?;
                    stack
                        .last_mut()
                        .ok_or(ProtocolError::UnbalancedBrackets)?
                        .push(Token::Group(group));
                }
                other => {
                    let token = Token::from_tag(other)?;
                    stack
                        .last_mut()
                        .ok_or(ProtocolError::UnbalancedBrackets)?
                        .push(token);
                }
            }
        }

        if stack.len() != 1 {
            return Err(ProtocolError::UnbalancedBrackets);
        }
        let tokens = stack.pop().ok_or(ProtocolError::UnbalancedBrackets)?;
        Ok(Self { tokens })
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Encode `values` against this format, appending to `buf`
    pub fn encode(&self, values: &[Value], buf: &mut BytesMut) -> Result<()> {
        encode_tokens(&self.tokens, values, buf)
    }

    /// Decode the whole of `data`; leftover bytes are an error
    pub fn decode(&self, data: &[u8]) -> Result<Vec<Value>> {
        let (values, rest) = self.decode_prefix(data)?;
        if !rest.is_empty() {
            return Err(ProtocolError::TrailingBytes(rest.len()));
        }
        Ok(values)
    }

    /// Decode a prefix of `data`, returning the unconsumed tail
    pub fn decode_prefix<'a>(&self, data: &'a [u8]) -> Result<(Vec<Value>, &'a [u8])> {
        let mut reader = Reader::new(data);
        let values = self.read(&mut reader)?;
        Ok((values, reader.rest()))
    }

    /// Decode from an existing cursor, leaving it after the last field
    pub fn read(&self, reader: &mut Reader<'_>) -> Result<Vec<Value>> {
        decode_tokens(&self.tokens, reader)
    }
}

impl std::str::FromStr for Format {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Parse `pattern` once and cache it for the life of the process
///
/// Evaluates to `Result<&'static Format>`.
macro_rules! layout {
    ($pattern:literal) => {{
        static LAYOUT: ::std::sync::OnceLock<$crate::error::Result<$crate::format::Format>> =
            ::std::sync::OnceLock::new();
        LAYOUT
            .get_or_init(|| $crate::format::Format::parse($pattern))
            .as_ref()
            .map_err(Clone::clone)
    }};
}
pub(crate) use layout;

/// Encode `values` with a one-off format string
pub fn encode(pattern: &str, values: &[Value]) -> Result<BytesMut> {
    let mut buf = BytesMut::new();
    Format::parse(pattern)?.encode(values, &mut buf)?;
    Ok(buf)
}

/// Decode `data` with a one-off format string
pub fn decode(pattern: &str, data: &[u8]) -> Result<Vec<Value>> {
    Format::parse(pattern)?.decode(data)
}

fn encode_tokens(tokens: &[Token], values: &[Value], buf: &mut BytesMut) -> Result<()> {
    if values.len() < tokens.len() {
        return Err(ProtocolError::MissingValue);
    }
    if values.len() > tokens.len() {
        return Err(ProtocolError::ExtraValues(values.len() - tokens.len()));
    }

    for (token, value) in tokens.iter().zip(values) {
        match (token, value) {
            (Token::Scalar(Scalar::I8), Value::I8(v)) => buf.put_i8(*v),
            (Token::Scalar(Scalar::U8), Value::U8(v)) => buf.put_u8(*v),
            (Token::Scalar(Scalar::I16), Value::I16(v)) => buf.put_i16_le(*v),
            (Token::Scalar(Scalar::U16), Value::U16(v)) => buf.put_u16_le(*v),
            (Token::Scalar(Scalar::I32), Value::I32(v)) => buf.put_i32_le(*v),
            (Token::Scalar(Scalar::U32), Value::U32(v)) => buf.put_u32_le(*v),
            (Token::Scalar(Scalar::F32), Value::F32(v)) => buf.put_f32_le(*v),
            (Token::String, Value::Str(text)) => write_string(buf, text),
            (Token::Group(inner), Value::Group(records)) => {
                for record in records {
                    encode_tokens(inner, record, buf)?;
                }
            }
            (token, value) => {
                return Err(ProtocolError::ValueMismatch {
                    expected: token.name(),
                    found: value.kind(),
                })
            }
        }
    }
    Ok(())
}

fn decode_tokens(tokens: &[Token], reader: &mut Reader<'_>) -> Result<Vec<Value>> {
    let mut values = Vec::with_capacity(tokens.len());
    for token in tokens {
        let value = match token {
            Token::Scalar(scalar) => reader.read_scalar(*scalar)?,
            Token::String => Value::Str(reader.read_string()?),
            Token::Group(inner) => Value::Group(decode_group(inner, reader)),
        };
        values.push(value);
    }
    Ok(values)
}

/// Outcome of applying a group's inner format once
enum Step<'a> {
    Matched { values: Vec<Value>, after: Reader<'a> },
    NoMatch,
}

fn apply_once<'a>(inner: &[Token], reader: &Reader<'a>) -> Step<'a> {
    let mut attempt = *reader;
    match decode_tokens(inner, &mut attempt) {
        Ok(values) => Step::Matched {
            values,
            after: attempt,
        },
        Err(_) => Step::NoMatch,
    }
}

/// Match `inner` repeatedly; the cursor stays at the last complete repetition
fn decode_group(inner: &[Token], reader: &mut Reader<'_>) -> Vec<Vec<Value>> {
    let mut records = Vec::new();
    loop {
        match apply_once(inner, reader) {
            // a repetition that consumes nothing would match forever
            Step::Matched { values, after } if after.position() > reader.position() => {
                records.push(values);
                *reader = after;
            }
            _ => break,
        }
    }
    records
}

/// Append a UTF-16LE string with its count prefix and NUL terminator
pub fn write_string(buf: &mut BytesMut, text: &str) {
    let units: Vec<u16> = text.encode_utf16().collect();
    buf.put_u32_le(units.len() as u32 + 1);
    for unit in units {
        buf.put_u16_le(unit);
    }
    buf.put_u16_le(0);
}

/// Byte cursor over a borrowed buffer
///
/// Copying a reader snapshots its position, which is how repetition groups
/// rewind to the last successful boundary.
#[derive(Debug, Clone, Copy)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Unconsumed bytes
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Look at the next byte without consuming it
    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(ProtocolError::Truncated {
                needed: len,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Advance past `len` bytes without interpreting them
    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    pub fn read_scalar(&mut self, scalar: Scalar) -> Result<Value> {
        let mut bytes = self.take(scalar.width())?;
        let value = match scalar {
            Scalar::I8 => Value::I8(bytes.get_i8()),
            Scalar::U8 => Value::U8(bytes.get_u8()),
            Scalar::I16 => Value::I16(bytes.get_i16_le()),
            Scalar::U16 => Value::U16(bytes.get_u16_le()),
            Scalar::I32 => Value::I32(bytes.get_i32_le()),
            Scalar::U32 => Value::U32(bytes.get_u32_le()),
            Scalar::F32 => Value::F32(bytes.get_f32_le()),
        };
        Ok(value)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?.get_u8())
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.take(2)?.get_i16_le())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(self.take(2)?.get_u16_le())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.take(4)?.get_u32_le())
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(self.take(4)?.get_f32_le())
    }

    /// Read a count-prefixed, NUL-terminated UTF-16LE string
    pub fn read_string(&mut self) -> Result<String> {
        let count = self.read_u32()? as usize;
        if count == 0 {
            return Err(ProtocolError::ZeroLengthString);
        }
        let needed = count.checked_mul(2).ok_or(ProtocolError::Truncated {
            needed: usize::MAX,
            available: self.remaining(),
        })?;
        if self.remaining() < needed {
            return Err(ProtocolError::Truncated {
                needed,
                available: self.remaining(),
            });
        }

        let mut units = self.take((count - 1) * 2)?;
        let code_units = std::iter::from_fn(|| (units.remaining() >= 2).then(|| units.get_u16_le()));
        let text = char::decode_utf16(code_units)
            .collect::<std::result::Result<String, _>>()
            .map_err(|_| ProtocolError::InvalidUtf16)?;

        if self.take(2)?.iter().any(|byte| *byte != 0) {
            return Err(ProtocolError::MissingNulTerminator);
        }
        Ok(text)
    }
}

/// Typed, in-order access to a decoded value sequence
#[derive(Debug)]
pub struct Values {
    inner: std::vec::IntoIter<Value>,
}

macro_rules! take_scalar {
    ($name:ident, $variant:ident, $ty:ty) => {
        pub fn $name(&mut self) -> Result<$ty> {
            match self.inner.next() {
                Some(Value::$variant(v)) => Ok(v),
                Some(other) => Err(ProtocolError::ValueMismatch {
                    expected: stringify!($ty),
                    found: other.kind(),
                }),
                None => Err(ProtocolError::MissingValue),
            }
        }
    };
}

impl Values {
    take_scalar!(i8, I8, i8);
    take_scalar!(u8, U8, u8);
    take_scalar!(i16, I16, i16);
    take_scalar!(u16, U16, u16);
    take_scalar!(i32, I32, i32);
    take_scalar!(u32, U32, u32);
    take_scalar!(f32, F32, f32);
    take_scalar!(string, Str, String);

    /// Next group, one `Values` per repetition
    pub fn group(&mut self) -> Result<Vec<Values>> {
        match self.inner.next() {
            Some(Value::Group(records)) => Ok(records.into_iter().map(Values::from).collect()),
            Some(other) => Err(ProtocolError::ValueMismatch {
                expected: "group",
                found: other.kind(),
            }),
            None => Err(ProtocolError::MissingValue),
        }
    }
}

impl From<Vec<Value>> for Values {
    fn from(values: Vec<Value>) -> Self {
        Self {
            inner: values.into_iter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Vec<(&'static str, Vec<u8>, Vec<Value>)> {
        vec![
            ("", vec![], vec![]),
            ("b", vec![0x00], vec![Value::I8(0)]),
            ("BB", vec![0x12, 0xfe], vec![Value::U8(0x12), Value::U8(0xfe)]),
            ("bb", vec![0x12, 0xfe], vec![Value::I8(0x12), Value::I8(-2)]),
            ("s", vec![0x12, 0x34], vec![Value::I16(0x3412)]),
            ("s", vec![0xff, 0xff], vec![Value::I16(-1)]),
            ("S", vec![0xff, 0xff], vec![Value::U16(0xffff)]),
            ("i", vec![0x12, 0x34, 0x56, 0x78], vec![Value::I32(0x7856_3412)]),
            ("I", vec![0xff, 0xff, 0xff, 0xff], vec![Value::U32(0xffff_ffff)]),
            ("i", vec![0xff, 0xff, 0xff, 0xff], vec![Value::I32(-1)]),
            ("f", vec![0x00, 0x00, 0x80, 0x3f], vec![Value::F32(1.0)]),
            (
                "u",
                vec![
                    0x05, 0x00, 0x00, 0x00, 0x62, 0x00, 0x65, 0x00, 0x65, 0x00, 0x73, 0x00, 0x00,
                    0x00,
                ],
                vec![Value::from("bees")],
            ),
            (
                "[B]",
                vec![0x12, 0x34, 0x56, 0x78],
                vec![Value::Group(vec![
                    vec![Value::U8(0x12)],
                    vec![Value::U8(0x34)],
                    vec![Value::U8(0x56)],
                    vec![Value::U8(0x78)],
                ])],
            ),
            (
                "[BB]",
                vec![0x12, 0x34, 0x56, 0x78],
                vec![Value::Group(vec![
                    vec![Value::U8(0x12), Value::U8(0x34)],
                    vec![Value::U8(0x56), Value::U8(0x78)],
                ])],
            ),
            (
                "B[BB]B",
                vec![0x12, 0x34, 0x56, 0x78],
                vec![
                    Value::U8(0x12),
                    Value::Group(vec![vec![Value::U8(0x34), Value::U8(0x56)]]),
                    Value::U8(0x78),
                ],
            ),
            ("B[]", vec![0x12], vec![Value::U8(0x12), Value::Group(vec![])]),
        ]
    }

    #[test]
    fn test_decode_table() {
        for (pattern, coded, uncoded) in table() {
            assert_eq!(decode(pattern, &coded).unwrap(), uncoded, "format {:?}", pattern);
        }
    }

    #[test]
    fn test_encode_table() {
        for (pattern, coded, uncoded) in table() {
            assert_eq!(&encode(pattern, &uncoded).unwrap()[..], &coded[..], "format {:?}", pattern);
        }
    }

    #[test]
    fn test_unbalanced_brackets() {
        assert_eq!(Format::parse("[B"), Err(ProtocolError::UnbalancedBrackets));
        assert_eq!(Format::parse("B]"), Err(ProtocolError::UnbalancedBrackets));
        assert_eq!(Format::parse("[[B]"), Err(ProtocolError::UnbalancedBrackets));
        assert!(Format::parse("[[B]S]").is_ok());
    }

    #[test]
    fn test_unknown_tag() {
        assert_eq!(Format::parse("Bq"), Err(ProtocolError::UnknownFormatTag('q')));
    }

    #[test]
    fn test_truncated_scalar() {
        assert_eq!(
            decode("I", &[0x01, 0x02]),
            Err(ProtocolError::Truncated {
                needed: 4,
                available: 2
            })
        );
    }

    #[test]
    fn test_trailing_bytes_rejected_unless_prefix() {
        assert_eq!(decode("B", &[1, 2, 3]), Err(ProtocolError::TrailingBytes(2)));

        let format = Format::parse("B").unwrap();
        let (values, rest) = format.decode_prefix(&[1, 2, 3]).unwrap();
        assert_eq!(values, vec![Value::U8(1)]);
        assert_eq!(rest, &[2, 3]);
    }

    #[test]
    fn test_group_rewinds_to_last_complete_repetition() {
        let format = Format::parse("[BB]").unwrap();
        let (values, rest) = format.decode_prefix(&[1, 2, 3]).unwrap();
        assert_eq!(
            values,
            vec![Value::Group(vec![vec![Value::U8(1), Value::U8(2)]])]
        );
        assert_eq!(rest, &[3]);
    }

    #[test]
    fn test_nested_groups() {
        // each outer repetition: a u8 then as many u16s as fit, so the inner
        // group swallows the rest of the buffer on the first pass
        let values = decode("[B[S]]", &[7, 1, 0, 2, 0]).unwrap();
        assert_eq!(
            values,
            vec![Value::Group(vec![vec![
                Value::U8(7),
                Value::Group(vec![vec![Value::U16(1)], vec![Value::U16(2)]]),
            ]])]
        );
    }

    #[test]
    fn test_string_errors() {
        assert_eq!(decode("u", &[0, 0, 0, 0]), Err(ProtocolError::ZeroLengthString));
        assert_eq!(
            decode("u", &[2, 0, 0, 0, 0x41, 0x00, 0x01, 0x00]),
            Err(ProtocolError::MissingNulTerminator)
        );
        assert!(matches!(
            decode("u", &[3, 0, 0, 0, 0x41, 0x00, 0x00, 0x00]),
            Err(ProtocolError::Truncated { .. })
        ));
        // lone high surrogate
        assert_eq!(
            decode("u", &[2, 0, 0, 0, 0x00, 0xd8, 0x00, 0x00]),
            Err(ProtocolError::InvalidUtf16)
        );
    }

    #[test]
    fn test_string_non_bmp_roundtrip() {
        let encoded = encode("u", &[Value::from("ship \u{1F680}")]).unwrap();
        // 5 ascii + one surrogate pair + terminator
        assert_eq!(&encoded[..4], &[8, 0, 0, 0]);
        assert_eq!(decode("u", &encoded).unwrap(), vec![Value::from("ship \u{1F680}")]);
    }

    #[test]
    fn test_encode_type_checks() {
        assert_eq!(
            encode("B", &[Value::U32(1)]),
            Err(ProtocolError::ValueMismatch {
                expected: "u8",
                found: "u32"
            })
        );
        assert_eq!(encode("BB", &[Value::U8(1)]), Err(ProtocolError::MissingValue));
        assert_eq!(
            encode("B", &[Value::U8(1), Value::U8(2)]),
            Err(ProtocolError::ExtraValues(1))
        );
    }

    #[test]
    fn test_values_typed_access() {
        let mut values = Values::from(decode("IB[S]", &[1, 0, 0, 0, 9, 4, 0]).unwrap());
        assert_eq!(values.u32().unwrap(), 1);
        assert!(values.u32().is_err());
        let mut records = values.group().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].u16().unwrap(), 4);
        assert_eq!(values.u8(), Err(ProtocolError::MissingValue));
    }

    #[test]
    fn test_layout_is_cached() {
        let first = layout!("IfIII").unwrap();
        assert_eq!(first.tokens().len(), 5);
    }
}
