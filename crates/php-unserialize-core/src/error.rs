//! Raw decoder failures.
//!
//! A [`DecodeError`] names the production that failed and the byte offset
//! where it failed. It is the decoder's own view of a failure; callers normally
//! see it through [`SyntaxError`](crate::SyntaxError), which classifies it into
//! one of three reporter kinds.

use std::fmt;
use thiserror::Error;

/// A failure raised by the decoder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    /// The kind of failure.
    pub kind: ErrorKind,
    /// The byte offset where the failure was detected.
    pub position: usize,
    /// Optional context about what was being parsed.
    pub context: Option<String>,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at position {}", self.kind, self.position)?;
        if let Some(ref ctx) = self.context {
            write!(f, " ({})", ctx)?;
        }
        Ok(())
    }
}

/// Specific kinds of decoder failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input ran out before the current token was complete, or a closing
    /// brace appeared where a value was expected.
    #[error("unexpected end of serialized data")]
    UnexpectedEnd,

    /// Expected a specific byte but found something else.
    #[error("expected '{}', found '{}'", byte_char(.expected), byte_char(.found))]
    UnexpectedByte {
        /// The byte that was expected.
        expected: u8,
        /// The byte that was found.
        found: u8,
    },

    /// Unknown type tag.
    #[error("unknown type tag '{}'", byte_char(.0))]
    UnknownType(u8),

    /// Malformed integer literal.
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Malformed float literal.
    #[error("invalid float: {0}")]
    InvalidFloat(String),

    /// Boolean payload other than `0` or `1`.
    #[error("invalid boolean value: {}", byte_char(.0))]
    InvalidBoolean(u8),

    /// Malformed length or count field.
    #[error("invalid length: {0}")]
    InvalidLength(String),

    /// Declared byte length runs past the end of the input.
    #[error("declared length {declared} exceeds remaining {remaining} bytes")]
    LengthOverrun {
        /// The length declared in the input.
        declared: usize,
        /// The number of bytes left after the opening delimiter.
        remaining: usize,
    },

    /// Array key or property name that is neither an integer nor a string.
    #[error("invalid key type {0}: expected string or integer")]
    InvalidKey(&'static str),

    /// Object or custom object with an empty class name.
    #[error("empty class name")]
    EmptyClassName,

    /// Bytes after the top-level value when trailing data is disallowed.
    #[error("trailing data after value")]
    TrailingData,

    /// Back-reference to a slot that has not been produced yet.
    #[error("invalid reference index {index} ({available} slots available)")]
    InvalidReference {
        /// The 1-based index from the input.
        index: usize,
        /// The number of slots in the table when the reference was read.
        available: usize,
    },

    /// Nesting depth exceeded.
    #[error("maximum nesting depth ({0}) exceeded")]
    MaxDepthExceeded(usize),

    /// Total number of decoded elements exceeded.
    #[error("maximum element count ({0}) exceeded")]
    MaxElementsExceeded(usize),
}

fn byte_char(byte: &u8) -> char {
    char::from(*byte)
}

/// How a raw failure is reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The input was exhausted mid-token.
    UnexpectedEnd,
    /// A specific byte violated the grammar.
    AtOffset,
    /// Semantic or resource-limit failure.
    Unknown,
}

impl ErrorKind {
    /// Classify this failure for reporting.
    pub fn class(&self) -> FailureClass {
        match self {
            ErrorKind::UnexpectedEnd => FailureClass::UnexpectedEnd,
            ErrorKind::UnexpectedByte { .. }
            | ErrorKind::UnknownType(_)
            | ErrorKind::InvalidInteger(_)
            | ErrorKind::InvalidFloat(_)
            | ErrorKind::InvalidBoolean(_)
            | ErrorKind::InvalidLength(_)
            | ErrorKind::LengthOverrun { .. }
            | ErrorKind::InvalidKey(_)
            | ErrorKind::EmptyClassName
            | ErrorKind::TrailingData => FailureClass::AtOffset,
            ErrorKind::InvalidReference { .. }
            | ErrorKind::MaxDepthExceeded(_)
            | ErrorKind::MaxElementsExceeded(_) => FailureClass::Unknown,
        }
    }
}

impl DecodeError {
    /// Create a new error with the given kind and position.
    #[inline]
    pub fn new(kind: ErrorKind, position: usize) -> Self {
        Self {
            kind,
            position,
            context: None,
        }
    }

    /// Add context to the error.
    #[inline]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Classify this failure for reporting.
    #[inline]
    pub fn class(&self) -> FailureClass {
        self.kind.class()
    }
}

/// Result type alias for raw decoding.
pub type Result<T> = std::result::Result<T, DecodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_context() {
        let err = DecodeError::new(ErrorKind::UnknownType(b'S'), 0).with_context("value tag");
        assert_eq!(err.to_string(), "unknown type tag 'S' at position 0 (value tag)");
    }

    #[test]
    fn test_unexpected_byte_display() {
        let kind = ErrorKind::UnexpectedByte {
            expected: b'"',
            found: b';',
        };
        assert_eq!(kind.to_string(), "expected '\"', found ';'");
    }

    #[test]
    fn test_classification() {
        assert_eq!(ErrorKind::UnexpectedEnd.class(), FailureClass::UnexpectedEnd);
        assert_eq!(ErrorKind::UnknownType(b'X').class(), FailureClass::AtOffset);
        assert_eq!(
            ErrorKind::LengthOverrun {
                declared: 100,
                remaining: 2
            }
            .class(),
            FailureClass::AtOffset
        );
        assert_eq!(
            ErrorKind::InvalidReference {
                index: 5,
                available: 1
            }
            .class(),
            FailureClass::Unknown
        );
        assert_eq!(ErrorKind::MaxDepthExceeded(8).class(), FailureClass::Unknown);
    }
}
