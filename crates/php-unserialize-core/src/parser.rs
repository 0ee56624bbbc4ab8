//! Strict PHP unserialize parser.
//!
//! A recursive-descent parser over the raw input bytes. Every production
//! tracks its own byte offset, so a failure names the exact byte that broke
//! the grammar. There is no recovery: the first failure abandons the decode.
//!
//! # Reference table
//!
//! PHP numbers the values of one `unserialize()` call from 1 in the order
//! they start. Containers take their slot before their children, array keys
//! and property names take none, and `R:` aliases take none. `r:`/`R:`
//! indices are checked against the slots produced so far.
//!
//! # Tracing Support
//!
//! Enable the `tracing` feature for parsing instrumentation:
//!
//! ```toml
//! php-unserialize-core = { version = "0.1", features = ["tracing"] }
//! ```

use std::borrow::Cow;

#[cfg(feature = "tracing")]
use tracing::{debug, instrument, trace, warn};

use crate::error::{DecodeError, ErrorKind, Result};
use crate::syntax::SyntaxError;
use crate::types::{ReferenceKind, Value};

/// Maximum nesting depth. Deep enough for real data, shallow enough for
/// the recursion to fit a default 2 MiB thread stack in debug builds.
const MAX_DEPTH: usize = 128;

/// Maximum number of values and keys decoded in one call.
const MAX_ELEMENTS: usize = 1 << 24;

/// Maximum number of values produced while expanding back-references.
const MAX_EXPANDED_ELEMENTS: usize = 1 << 20;

/// Upper bound on pre-allocated pairs for a declared count.
const MAX_PREALLOC: usize = 1024;

/// Parser configuration options.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Maximum nesting depth for arrays and objects.
    pub max_depth: usize,
    /// Maximum number of values and keys decoded in one call.
    pub max_elements: usize,
    /// Whether bytes after the top-level value are ignored.
    ///
    /// PHP's own `unserialize()` stops reading once the first value is
    /// complete, so this defaults to `true`. Set it to `false` to report
    /// trailing bytes as a syntax error at the first trailing byte.
    pub allow_trailing_data: bool,
    /// Maximum number of values produced by
    /// [`Value::resolve_references_with_config`]. Every back-reference is
    /// expanded into a copy of its target, so a small input can otherwise
    /// expand exponentially.
    pub max_expanded_elements: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
            max_elements: MAX_ELEMENTS,
            allow_trailing_data: true,
            max_expanded_elements: MAX_EXPANDED_ELEMENTS,
        }
    }
}

/// A zero-copy PHP unserialize parser.
pub struct Parser<'a> {
    /// Input data.
    data: &'a [u8],
    /// Current position in the input.
    pos: usize,
    /// Parser configuration.
    config: ParserConfig,
    /// Current nesting depth.
    depth: usize,
    /// Values and keys decoded so far.
    elements: usize,
    /// Start offset of every value holding a reference slot, in slot order.
    references: Vec<usize>,
}

impl<'a> Parser<'a> {
    /// Create a new parser with default configuration.
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_config(data, ParserConfig::default())
    }

    /// Create a new parser with custom configuration.
    pub fn with_config(data: &'a [u8], config: ParserConfig) -> Self {
        Self {
            data,
            pos: 0,
            config,
            depth: 0,
            elements: 0,
            references: Vec::new(),
        }
    }

    /// Parse the input and return the top-level value.
    ///
    /// This is the main entry point for parsing PHP serialized data.
    /// If the `tracing` feature is enabled, this method will emit trace events.
    #[cfg_attr(feature = "tracing", instrument(skip(self), fields(data_len = self.data.len())))]
    pub fn parse(&mut self) -> Result<Value<'a>> {
        #[cfg(feature = "tracing")]
        debug!(data_len = self.data.len(), "Starting PHP unserialize");

        let result = self.parse_value().and_then(|value| {
            self.check_trailing()?;
            Ok(value)
        });

        #[cfg(feature = "tracing")]
        match &result {
            Ok(value) => debug!(
                value_type = value.type_name(),
                slots = self.references.len(),
                consumed = self.pos,
                "Parse completed successfully"
            ),
            Err(e) => warn!(error = %e, "Parse failed"),
        }

        result
    }

    /// Byte offset of the next unread byte.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Parse a single value at the current position.
    ///
    /// This is the dispatch function that routes to type-specific parsers
    /// and assigns reference slots.
    #[cfg_attr(feature = "tracing", instrument(skip(self), level = "trace", fields(pos = self.pos, depth = self.depth)))]
    fn parse_value(&mut self) -> Result<Value<'a>> {
        if self.depth > self.config.max_depth {
            #[cfg(feature = "tracing")]
            warn!(depth = self.depth, max_depth = self.config.max_depth, "Max depth exceeded");
            return Err(DecodeError::new(
                ErrorKind::MaxDepthExceeded(self.config.max_depth),
                self.pos,
            ));
        }
        self.count_element()?;

        let start = self.pos;
        let type_byte = self.peek_byte()?;

        #[cfg(feature = "tracing")]
        trace!(type_marker = %char::from(type_byte), pos = self.pos, "Parsing value");

        match type_byte {
            b'R' => return self.parse_reference(ReferenceKind::Alias),
            b'r' => {
                let value = self.parse_reference(ReferenceKind::Value)?;
                self.references.push(start);
                return Ok(value);
            }
            b'N' | b'b' | b'i' | b'd' | b's' | b'a' | b'O' | b'C' => {}
            b'}' => return Err(self.make_unexpected_end()),
            _ => return Err(self.make_unknown_type_error(type_byte)),
        }

        // Containers take their slot before any child is parsed
        self.references.push(start);

        match type_byte {
            b'N' => self.parse_null(),
            b'b' => self.parse_bool(),
            b'i' => self.parse_int(),
            b'd' => self.parse_float(),
            b's' => self.parse_string(),
            b'a' => self.parse_array(),
            b'O' => self.parse_object(),
            _ => self.parse_custom_object(),
        }
    }

    /// Parse an array key or property name. Keys never take a reference slot.
    fn parse_key(&mut self) -> Result<Value<'a>> {
        self.count_element()?;

        let type_byte = self.peek_byte()?;
        match type_byte {
            b'i' => self.parse_int(),
            b's' => self.parse_string(),
            b'}' => Err(self.make_unexpected_end()),
            b'N' | b'b' | b'd' | b'a' | b'O' | b'C' | b'r' | b'R' => Err(DecodeError::new(
                ErrorKind::InvalidKey(tag_type_name(type_byte)),
                self.pos,
            )),
            _ => Err(self.make_unknown_type_error(type_byte)),
        }
    }

    /// Parse a null value: `N;`
    fn parse_null(&mut self) -> Result<Value<'a>> {
        self.expect_byte(b'N')?;
        self.expect_byte(b';')?;
        Ok(Value::Null)
    }

    /// Parse a boolean value: `b:0;` or `b:1;`
    fn parse_bool(&mut self) -> Result<Value<'a>> {
        self.expect_byte(b'b')?;
        self.expect_byte(b':')?;

        let value = match self.peek_byte()? {
            b'0' => false,
            b'1' => true,
            other => {
                return Err(DecodeError::new(ErrorKind::InvalidBoolean(other), self.pos));
            }
        };
        self.pos += 1;

        self.expect_byte(b';')?;
        Ok(Value::Bool(value))
    }

    /// Parse an integer value: `i:<value>;`
    fn parse_int(&mut self) -> Result<Value<'a>> {
        self.expect_byte(b'i')?;
        self.expect_byte(b':')?;

        let start = self.pos;
        self.skip_sign()?;
        self.require_digits(ErrorKind::InvalidInteger)?;

        let int_str = self.ascii_since(start);
        let int_value: i64 = int_str.parse().map_err(|_| {
            DecodeError::new(ErrorKind::InvalidInteger(int_str.to_string()), start)
                .with_context("integer out of range")
        })?;

        self.expect_byte(b';')?;
        Ok(Value::Int(int_value))
    }

    /// Parse a float/double value: `d:<value>;`
    ///
    /// Accepts `[+-]?digits[.digits][(e|E)[+-]?digits]`, a mantissa with the
    /// integer or fraction part omitted, and the literals `NAN`, `INF`, `-INF`.
    fn parse_float(&mut self) -> Result<Value<'a>> {
        self.expect_byte(b'd')?;
        self.expect_byte(b':')?;

        let rest = &self.data[self.pos..];
        for (literal, value) in [
            (&b"NAN"[..], f64::NAN),
            (&b"INF"[..], f64::INFINITY),
            (&b"-INF"[..], f64::NEG_INFINITY),
        ] {
            if rest.starts_with(literal) {
                self.pos += literal.len();
                self.expect_byte(b';')?;
                return Ok(Value::Float(value));
            }
        }

        let start = self.pos;
        self.skip_sign()?;
        let int_digits = self.skip_digits();
        let mut frac_digits = 0;
        if self.data.get(self.pos) == Some(&b'.') {
            self.pos += 1;
            frac_digits = self.skip_digits();
        }
        if int_digits + frac_digits == 0 {
            return Err(self.make_literal_error(start, ErrorKind::InvalidFloat));
        }
        if matches!(self.data.get(self.pos), Some(b'e' | b'E')) {
            self.pos += 1;
            self.skip_sign()?;
            self.require_digits(ErrorKind::InvalidFloat)?;
        }

        let float_str = self.ascii_since(start);
        let float_value: f64 = float_str.parse().map_err(|_| {
            DecodeError::new(ErrorKind::InvalidFloat(float_str.to_string()), start)
        })?;

        self.expect_byte(b';')?;
        Ok(Value::Float(float_value))
    }

    /// Parse a string value: `s:<len>:"<data>";`
    ///
    /// The declared length is authoritative; the payload may contain quotes
    /// and semicolons.
    fn parse_string(&mut self) -> Result<Value<'a>> {
        self.expect_byte(b's')?;
        self.expect_byte(b':')?;

        let len_start = self.pos;
        let len = self.parse_length()?;

        self.expect_byte(b':')?;
        self.expect_byte(b'"')?;

        let string_data = self.take_bytes(len, len_start)?;

        self.expect_byte(b'"')?;
        self.expect_byte(b';')?;
        Ok(Value::String(Cow::Borrowed(string_data)))
    }

    /// Parse an array value: `a:<count>:{<key><value>...}`
    fn parse_array(&mut self) -> Result<Value<'a>> {
        self.expect_byte(b'a')?;
        self.expect_byte(b':')?;

        let count = self.parse_length()?;

        self.expect_byte(b':')?;
        self.expect_byte(b'{')?;

        let items = self.parse_pairs(count)?;

        self.expect_byte(b'}')?;
        Ok(Value::Array(items))
    }

    /// Parse an object value: `O:<namelen>:"<name>":<count>:{<prop>...}`
    fn parse_object(&mut self) -> Result<Value<'a>> {
        self.expect_byte(b'O')?;
        self.expect_byte(b':')?;

        let class_name = self.parse_class_name()?;

        self.expect_byte(b':')?;
        let count = self.parse_length()?;

        self.expect_byte(b':')?;
        self.expect_byte(b'{')?;

        let properties = self.parse_pairs(count)?;

        self.expect_byte(b'}')?;
        Ok(Value::Object {
            class_name: Cow::Borrowed(class_name),
            properties,
        })
    }

    /// Parse a custom serialized object: `C:<namelen>:"<name>":<datalen>:{<data>}`
    fn parse_custom_object(&mut self) -> Result<Value<'a>> {
        self.expect_byte(b'C')?;
        self.expect_byte(b':')?;

        let class_name = self.parse_class_name()?;

        self.expect_byte(b':')?;
        let data_len_start = self.pos;
        let data_len = self.parse_length()?;

        self.expect_byte(b':')?;
        self.expect_byte(b'{')?;

        let payload = self.take_bytes(data_len, data_len_start)?;

        self.expect_byte(b'}')?;
        Ok(Value::CustomObject {
            class_name: Cow::Borrowed(class_name),
            payload: Cow::Borrowed(payload),
        })
    }

    /// Parse a reference: `R:<index>;` or `r:<index>;`
    fn parse_reference(&mut self, kind: ReferenceKind) -> Result<Value<'a>> {
        self.expect_byte(kind.tag())?;
        self.expect_byte(b':')?;

        let idx_start = self.pos;
        let index = self.parse_length()?;

        self.expect_byte(b';')?;

        // PHP references are 1-indexed
        if index == 0 || index > self.references.len() {
            #[cfg(feature = "tracing")]
            warn!(index, available = self.references.len(), "Dangling reference");
            return Err(DecodeError::new(
                ErrorKind::InvalidReference {
                    index,
                    available: self.references.len(),
                },
                idx_start,
            ));
        }

        Ok(Value::Reference { index, kind })
    }

    /// Parse `count` key/value pairs one level deeper.
    fn parse_pairs(&mut self, count: usize) -> Result<Vec<(Value<'a>, Value<'a>)>> {
        self.depth += 1;
        let mut items = Vec::with_capacity(count.min(MAX_PREALLOC));

        for _ in 0..count {
            let key = self.parse_key()?;
            let value = self.parse_value()?;
            items.push((key, value));
        }

        self.depth -= 1;
        Ok(items)
    }

    /// Parse `<len>:"<name>"` for `O` and `C`.
    fn parse_class_name(&mut self) -> Result<&'a [u8]> {
        let len_start = self.pos;
        let name_len = self.parse_length()?;

        self.expect_byte(b':')?;
        self.expect_byte(b'"')?;

        if name_len == 0 {
            return Err(DecodeError::new(ErrorKind::EmptyClassName, len_start));
        }
        let class_name = self.take_bytes(name_len, len_start)?;

        self.expect_byte(b'"')?;
        Ok(class_name)
    }

    // Helper methods - marked #[inline] for performance on hot paths

    /// Parse an unsigned decimal length, count or index.
    #[inline]
    fn parse_length(&mut self) -> Result<usize> {
        let start = self.pos;
        self.require_digits(ErrorKind::InvalidLength)?;

        let len_str = self.ascii_since(start);
        len_str.parse().map_err(|_| {
            DecodeError::new(ErrorKind::InvalidLength(len_str.to_string()), start)
                .with_context("length out of range")
        })
    }

    /// Consume exactly `len` raw bytes. An overrun is reported at the
    /// length field that declared it.
    #[inline]
    fn take_bytes(&mut self, len: usize, len_start: usize) -> Result<&'a [u8]> {
        let remaining = self.data.len() - self.pos;
        if len > remaining {
            #[cfg(feature = "tracing")]
            warn!(declared = len, remaining, pos = self.pos, "Declared length overruns input");
            return Err(DecodeError::new(
                ErrorKind::LengthOverrun {
                    declared: len,
                    remaining,
                },
                len_start,
            ));
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Skip an optional `+` or `-`.
    #[inline]
    fn skip_sign(&mut self) -> Result<()> {
        if matches!(self.peek_byte()?, b'+' | b'-') {
            self.pos += 1;
        }
        Ok(())
    }

    /// Skip ASCII digits and return how many were skipped.
    #[inline]
    fn skip_digits(&mut self) -> usize {
        let digits = self.data[self.pos..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        self.pos += digits;
        digits
    }

    /// Skip one or more ASCII digits.
    #[inline]
    fn require_digits(&mut self, kind: fn(String) -> ErrorKind) -> Result<()> {
        let start = self.pos;
        if self.skip_digits() == 0 {
            return Err(self.make_literal_error(start, kind));
        }
        Ok(())
    }

    /// The bytes from `start` to the current position, already validated as ASCII.
    #[inline]
    fn ascii_since(&self, start: usize) -> &'a str {
        // Only ASCII digits, signs, dots and exponents are ever skipped
        std::str::from_utf8(&self.data[start..self.pos]).unwrap_or_default()
    }

    /// Peek at the current byte without consuming it.
    #[inline(always)]
    fn peek_byte(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.make_unexpected_end())
    }

    /// Expect a specific byte, returning an error if it doesn't match.
    #[inline]
    fn expect_byte(&mut self, expected: u8) -> Result<()> {
        let byte = self.peek_byte()?;
        if byte != expected {
            return Err(self.make_unexpected_byte_error(expected, byte));
        }
        self.pos += 1;
        Ok(())
    }

    /// Reject trailing bytes unless configured to ignore them.
    fn check_trailing(&self) -> Result<()> {
        if self.pos < self.data.len() {
            if !self.config.allow_trailing_data {
                return Err(DecodeError::new(ErrorKind::TrailingData, self.pos));
            }
            #[cfg(feature = "tracing")]
            trace!(
                trailing = self.data.len() - self.pos,
                "Ignoring trailing data after value"
            );
        }
        Ok(())
    }

    /// Count one more decoded value or key against the configured limit.
    #[inline]
    fn count_element(&mut self) -> Result<()> {
        self.elements += 1;
        if self.elements > self.config.max_elements {
            return Err(DecodeError::new(
                ErrorKind::MaxElementsExceeded(self.config.max_elements),
                self.pos,
            ));
        }
        Ok(())
    }

    #[cold]
    #[inline(never)]
    fn make_unexpected_end(&self) -> DecodeError {
        DecodeError::new(ErrorKind::UnexpectedEnd, self.pos)
    }

    #[cold]
    #[inline(never)]
    fn make_unknown_type_error(&self, type_byte: u8) -> DecodeError {
        #[cfg(feature = "tracing")]
        warn!(type_byte = %char::from(type_byte), pos = self.pos, "Unknown type marker");
        DecodeError::new(ErrorKind::UnknownType(type_byte), self.pos)
    }

    /// Create an unexpected byte error at the current position.
    #[cold]
    #[inline(never)]
    fn make_unexpected_byte_error(&self, expected: u8, found: u8) -> DecodeError {
        DecodeError::new(ErrorKind::UnexpectedByte { expected, found }, self.pos)
    }

    /// Error for a literal that stopped matching at the current position.
    /// Running out of input mid-literal is an unexpected end instead.
    #[cold]
    #[inline(never)]
    fn make_literal_error(&self, start: usize, kind: fn(String) -> ErrorKind) -> DecodeError {
        if self.pos >= self.data.len() {
            return self.make_unexpected_end();
        }
        let text = String::from_utf8_lossy(&self.data[start..=self.pos]).into_owned();
        DecodeError::new(kind(text), self.pos)
    }
}

/// Type name for a value tag, for key errors.
fn tag_type_name(type_byte: u8) -> &'static str {
    match type_byte {
        b'N' => "null",
        b'b' => "boolean",
        b'i' => "integer",
        b'd' => "float",
        b's' => "string",
        b'a' => "array",
        b'O' => "object",
        b'C' => "custom object",
        b'r' | b'R' => "reference",
        _ => "unknown",
    }
}

/// Parse PHP serialized data from bytes, returning the raw decoder failure.
///
/// Prefer [`decode`] unless the failure's production is needed.
///
/// # Example
///
/// ```rust
/// use php_unserialize_core::from_bytes;
///
/// let value = from_bytes(b"i:42;").unwrap();
/// assert_eq!(value.as_int(), Some(42));
/// ```
#[inline]
pub fn from_bytes(data: &[u8]) -> Result<Value<'_>> {
    #[cfg(feature = "tracing")]
    trace!(data_len = data.len(), "from_bytes called");

    let mut parser = Parser::new(data);
    parser.parse()
}

/// Parse PHP serialized data from bytes with custom configuration.
///
/// # Example
///
/// ```rust
/// use php_unserialize_core::{from_bytes_with_config, ParserConfig};
///
/// let config = ParserConfig {
///     max_depth: 64,
///     allow_trailing_data: false,
///     ..Default::default()
/// };
/// let value = from_bytes_with_config(b"i:42;", config).unwrap();
/// assert_eq!(value.as_int(), Some(42));
/// ```
#[inline]
pub fn from_bytes_with_config(data: &[u8], config: ParserConfig) -> Result<Value<'_>> {
    #[cfg(feature = "tracing")]
    trace!(data_len = data.len(), ?config, "from_bytes_with_config called");

    let mut parser = Parser::with_config(data, config);
    parser.parse()
}

/// Strictly decode PHP serialized data.
///
/// Failures are classified into a [`SyntaxError`] that carries the input.
/// `b:0;` is an ordinary successful decode of `false`.
///
/// # Example
///
/// ```rust
/// use php_unserialize_core::{decode, SyntaxError, Value};
///
/// assert_eq!(decode(b"b:0;").unwrap(), Value::Bool(false));
///
/// let err = decode(b"a:1:{}").unwrap_err();
/// assert!(matches!(err, SyntaxError::UnexpectedEnd { .. }));
/// ```
pub fn decode(input: &[u8]) -> std::result::Result<Value<'_>, SyntaxError> {
    decode_with_config(input, ParserConfig::default())
}

/// Strictly decode PHP serialized data with custom configuration.
pub fn decode_with_config(
    input: &[u8],
    config: ParserConfig,
) -> std::result::Result<Value<'_>, SyntaxError> {
    from_bytes_with_config(input, config).map_err(|e| SyntaxError::from_decode_error(input, e))
}
