//! Syntax errors reported to callers.
//!
//! Every decoder failure is reported as one of three kinds:
//!
//! | Kind | Raised when |
//! |------|-------------|
//! | [`SyntaxError::UnexpectedEnd`] | the input ran out mid-token, or `}` appeared where a value was expected |
//! | [`SyntaxError::ErrorAtOffset`] | a specific byte violated the grammar |
//! | [`SyntaxError::Unknown`] | anything else (dangling references, resource limits) |
//!
//! Each kind keeps a copy of the input so the caller can log it or render a
//! [snippet](render_snippet) later.

use std::iter;

use bstr::{BStr, BString, ByteSlice};
use thiserror::Error;

use crate::error::{DecodeError, ErrorKind, FailureClass};

/// Width of a rendered snippet, including truncation markers.
pub const SNIPPET_LENGTH: usize = 80;

const UNEXPECTED_END_MESSAGE: &str = "Unexpected end of serialized data";

/// A classified unserialize failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    /// End of data occurred when it was not expected.
    #[error("Unexpected end of serialized data")]
    UnexpectedEnd {
        /// The serialized input.
        input: BString,
        /// The decoder failure this was classified from.
        raw: Option<DecodeError>,
    },

    /// A specific byte of the input violated the grammar.
    #[error("Syntax error at byte {offset} of {length} bytes in serialized input")]
    ErrorAtOffset {
        /// The serialized input.
        input: BString,
        /// 0-based offset of the offending byte.
        offset: usize,
        /// Total input length in bytes.
        length: usize,
        /// The decoder failure this was classified from.
        raw: Option<DecodeError>,
    },

    /// An unrecognised failure.
    #[error("{}", unknown_message(.message))]
    Unknown {
        /// The serialized input.
        input: BString,
        /// Underlying reason; may be empty.
        message: String,
        /// The decoder failure this was classified from.
        raw: Option<DecodeError>,
    },
}

fn unknown_message(reason: &str) -> String {
    if reason.is_empty() {
        "Unknown syntax error occurred".to_string()
    } else {
        format!("Unknown syntax error occurred: {}", reason)
    }
}

impl SyntaxError {
    /// Classify a decoder failure for `input`.
    pub fn from_decode_error(input: &[u8], error: DecodeError) -> Self {
        let input = BString::from(input);
        match error.class() {
            FailureClass::UnexpectedEnd => SyntaxError::UnexpectedEnd {
                input,
                raw: Some(error),
            },
            FailureClass::AtOffset => SyntaxError::ErrorAtOffset {
                length: input.len(),
                input,
                offset: error.position,
                raw: Some(error),
            },
            FailureClass::Unknown => SyntaxError::Unknown {
                input,
                message: error.kind.to_string(),
                raw: Some(error),
            },
        }
    }

    /// Classify a notice emitted by PHP's own `unserialize()`.
    ///
    /// Recognises `Unexpected end of serialized data` and
    /// `Error at offset N of M bytes`, with or without the `unserialize(): `
    /// prefix. Anything else becomes [`SyntaxError::Unknown`] carrying the
    /// message verbatim.
    ///
    /// ```rust
    /// use php_unserialize_core::SyntaxError;
    ///
    /// let err = SyntaxError::from_legacy_message(
    ///     b"s:6:\"foobar\";",
    ///     "unserialize(): Error at offset 2000 of 4000 bytes",
    /// );
    /// assert_eq!(err.offset(), Some(2000));
    /// assert_eq!(
    ///     err.to_string(),
    ///     "Syntax error at byte 2000 of 4000 bytes in serialized input"
    /// );
    /// ```
    pub fn from_legacy_message(input: &[u8], message: &str) -> Self {
        let input = BString::from(input);
        let stripped = strip_legacy_prefix(message);

        if stripped == UNEXPECTED_END_MESSAGE {
            return SyntaxError::UnexpectedEnd { input, raw: None };
        }

        if let Some((offset, length)) = parse_offset_message(stripped) {
            return SyntaxError::ErrorAtOffset {
                input,
                offset,
                length,
                raw: None,
            };
        }

        SyntaxError::Unknown {
            input,
            message: message.to_string(),
            raw: None,
        }
    }

    /// The serialized input that failed to decode.
    pub fn input(&self) -> &BStr {
        match self {
            SyntaxError::UnexpectedEnd { input, .. }
            | SyntaxError::ErrorAtOffset { input, .. }
            | SyntaxError::Unknown { input, .. } => input.as_bstr(),
        }
    }

    /// Byte offset of the offending byte, for [`SyntaxError::ErrorAtOffset`].
    pub fn offset(&self) -> Option<usize> {
        match self {
            SyntaxError::ErrorAtOffset { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    /// The decoder failure this error was classified from, if any.
    pub fn raw(&self) -> Option<&DecodeError> {
        match self {
            SyntaxError::UnexpectedEnd { raw, .. }
            | SyntaxError::ErrorAtOffset { raw, .. }
            | SyntaxError::Unknown { raw, .. } => raw.as_ref(),
        }
    }

    /// The decoder's reason for the failure. `None` for errors built from
    /// legacy messages.
    ///
    /// ```rust
    /// use php_unserialize_core::{decode, ErrorKind};
    ///
    /// let err = decode(b"b:2;").unwrap_err();
    /// assert_eq!(err.source_kind(), Some(&ErrorKind::InvalidBoolean(b'2')));
    /// ```
    pub fn source_kind(&self) -> Option<&ErrorKind> {
        self.raw().map(|raw| &raw.kind)
    }

    /// Render the input around the offending byte, for
    /// [`SyntaxError::ErrorAtOffset`]. See [`render_snippet`].
    pub fn snippet(&self) -> Option<BString> {
        match self {
            SyntaxError::ErrorAtOffset { input, offset, .. } => {
                Some(render_snippet(input, *offset))
            }
            _ => None,
        }
    }

    /// The message followed by the snippet, when there is one.
    ///
    /// ```text
    /// Syntax error at byte 0 of 8 bytes in serialized input:
    ///
    /// S:"foo";
    /// ^
    /// ```
    pub fn report(&self) -> BString {
        let mut report = BString::from(self.to_string());
        if let Some(snippet) = self.snippet() {
            report.extend_from_slice(b":\n\n");
            report.extend_from_slice(&snippet);
        }
        report
    }
}

/// Extract up to [`SNIPPET_LENGTH`] bytes of `input` around `offset`, with
/// a caret line underneath pointing at the offending byte.
///
/// The extract starts 40 bytes before `offset` (or at 0). When it does not
/// start at 0 its first three bytes are replaced by `...`; when it is
/// longer than 80 bytes it is cut to 77 bytes followed by `...`.
///
/// ```rust
/// use php_unserialize_core::render_snippet;
///
/// assert_eq!(render_snippet(b"s:100:\"\";", 2), "s:100:\"\";\n  ^");
/// ```
pub fn render_snippet(input: &[u8], offset: usize) -> BString {
    let start = offset.saturating_sub(SNIPPET_LENGTH / 2);
    let mut snippet = input.get(start..).unwrap_or_default().to_vec();

    if start > 0 {
        for byte in snippet.iter_mut().take(3) {
            *byte = b'.';
        }
    }

    if snippet.len() > SNIPPET_LENGTH {
        snippet.truncate(SNIPPET_LENGTH - 3);
        snippet.extend_from_slice(b"...");
    }

    snippet.push(b'\n');
    snippet.extend(iter::repeat(b' ').take(offset - start));
    snippet.push(b'^');

    BString::from(snippet)
}

fn strip_legacy_prefix(message: &str) -> &str {
    match message.strip_prefix("unserialize():") {
        Some(rest) => rest.trim_start(),
        None => message,
    }
}

/// Parse `Error at offset <offset> of <length> bytes`.
fn parse_offset_message(message: &str) -> Option<(usize, usize)> {
    let rest = message.strip_prefix("Error at offset ")?;
    let (offset, rest) = rest.split_once(" of ")?;
    let length = rest.strip_suffix(" bytes")?;

    let is_number = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !is_number(offset) || !is_number(length) {
        return None;
    }
    Some((offset.parse().ok()?, length.parse().ok()?))
}
