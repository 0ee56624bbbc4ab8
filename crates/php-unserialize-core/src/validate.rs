//! Quick "is this serialized data?" checks.
//!
//! [`looks_serialized`] throws out obviously wrong input by looking at a few
//! fixed bytes. [`is_serialized`] confirms a passing sniff with a full
//! decode and hands back the decoded value. Decode failures are swallowed;
//! call [`decode`](crate::decode) directly when the reason matters.

#[cfg(feature = "tracing")]
use tracing::trace;

use crate::parser::decode;
use crate::types::Value;

/// Expected last byte and minimum total length for a leading type tag.
#[inline]
fn shape(tag: u8) -> Option<(u8, usize)> {
    match tag {
        b'N' => Some((b';', 2)),
        b'b' | b'i' | b'd' => Some((b';', 4)),
        b's' => Some((b';', 7)),
        b'a' => Some((b'}', 6)),
        b'O' | b'C' => Some((b'}', 12)),
        _ => None,
    }
}

/// Cheap structural sniff.
///
/// Checks the leading tag, the minimum length for that tag, the last byte,
/// and for every tag except `N` that the input continues with `:` and an
/// ASCII digit. Strings must also end in `";`.
///
/// Passing the sniff does not mean the input decodes.
///
/// ```rust
/// use php_unserialize_core::looks_serialized;
///
/// assert!(looks_serialized(b"a:0:{}"));
/// assert!(looks_serialized(b"a:1:{}")); // sniff only
/// assert!(!looks_serialized(b"N"));
/// ```
pub fn looks_serialized(input: &[u8]) -> bool {
    let len = input.len();
    if len < 2 {
        return false;
    }

    let tag = input[0];
    let Some((terminator, min_len)) = shape(tag) else {
        return false;
    };
    if len < min_len {
        return false;
    }

    if tag == b's' && input[len - 2] != b'"' {
        return false;
    }

    if tag != b'N' && (input[1] != b':' || !input[2].is_ascii_digit()) {
        return false;
    }

    input[len - 1] == terminator
}

/// Sniff, then fully decode. Returns the resolved value on success.
///
/// Input whose back-references would expand past the default
/// [`ParserConfig`](crate::ParserConfig) limits is rejected.
///
/// ```rust
/// use php_unserialize_core::{validate_and_decode, Value};
///
/// assert_eq!(validate_and_decode(b"i:1729;"), Some(Value::Int(1729)));
/// assert_eq!(validate_and_decode(b"a:1:{}"), None);
/// ```
pub fn validate_and_decode(input: &[u8]) -> Option<Value<'_>> {
    if !looks_serialized(input) {
        #[cfg(feature = "tracing")]
        trace!(data_len = input.len(), "Rejected by quick sniff");
        return None;
    }

    match decode(input) {
        Ok(value) => value.resolve_references(),
        Err(_e) => {
            #[cfg(feature = "tracing")]
            trace!(error = %_e, "Sniff passed but decode failed");
            None
        }
    }
}

/// Test whether `input` is PHP serialized data.
///
/// On success the decoded value is returned alongside `true`, so callers
/// need not decode a second time.
///
/// ```rust
/// use php_unserialize_core::{is_serialized, Value};
///
/// assert_eq!(is_serialized("b:0;"), (true, Some(Value::Bool(false))));
/// assert_eq!(is_serialized(""), (false, None));
/// ```
pub fn is_serialized<T: AsRef<[u8]> + ?Sized>(input: &T) -> (bool, Option<Value<'_>>) {
    let value = validate_and_decode(input.as_ref());
    (value.is_some(), value)
}

#[cfg(test)]
#[allow(clippy::approx_constant)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn test_is_serialized_valid() {
        let cases: Vec<(&str, Value<'static>)> = vec![
            ("N;", Value::Null),
            ("b:1;", Value::Bool(true)),
            ("b:0;", Value::Bool(false)),
            ("i:1729;", Value::Int(1729)),
            ("d:3.14159;", Value::Float(3.14159)),
            ("s:3:\"php\";", Value::String(Cow::Borrowed(b"php"))),
            (
                "a:2:{i:0;b:1;s:1:\"x\";i:32;}",
                Value::Array(vec![
                    (Value::Int(0), Value::Bool(true)),
                    (Value::String(Cow::Borrowed(b"x")), Value::Int(32)),
                ]),
            ),
            (
                "O:8:\"stdClass\":0:{}",
                Value::Object {
                    class_name: Cow::Borrowed(b"stdClass"),
                    properties: vec![],
                },
            ),
            (
                r#"C:41:"Cs278\SerializationHelpers\Tests\TestStub":6:{ROBOTS}"#,
                Value::CustomObject {
                    class_name: Cow::Borrowed(b"Cs278\\SerializationHelpers\\Tests\\TestStub"),
                    payload: Cow::Borrowed(b"ROBOTS"),
                },
            ),
        ];

        for (input, expected) in cases {
            let (ok, value) = is_serialized(input);
            assert!(ok, "{}", input);
            assert_eq!(value, Some(expected), "{}", input);
        }
    }

    #[test]
    fn test_is_serialized_invalid() {
        for input in [
            "",
            "N",
            "b:x;",
            "b:2;",
            "i:;",
            "d:3.14.159;",
            "s:3:\"php\"",
            "a:2:{i:0;s:1:\"x\";i:32;}",
            "O:8:\"stdClas\":0:{}",
            "a:1:{}",
        ] {
            assert_eq!(is_serialized(input), (false, None), "{:?}", input);
        }
    }

    #[test]
    fn test_is_serialized_resolves_references() {
        let (ok, value) = is_serialized("a:4:{i:0;i:1;i:1;R:2;i:2;i:2;i:3;i:3;}");
        assert!(ok);
        let value = value.unwrap();
        assert!(!value.has_references());
        assert_eq!(value.as_array().unwrap()[1].1, Value::Int(1));
    }

    #[test]
    fn test_is_serialized_accepts_byte_inputs() {
        assert!(is_serialized(b"N;").0);
        assert!(is_serialized(&b"N;".to_vec()).0);
        assert!(is_serialized(&String::from("N;")).0);
    }

    #[test]
    fn test_sniff_minimum_lengths() {
        assert!(looks_serialized(b"N;"));
        assert!(looks_serialized(b"b:0;"));
        assert!(looks_serialized(b"i:0;"));
        assert!(looks_serialized(b"d:0;"));
        assert!(looks_serialized(b"a:0:{}"));
        assert!(looks_serialized(b"s:0:\"\";"));
        assert!(looks_serialized(b"O:1:\"a\":0:{}"));
        assert!(looks_serialized(b"C:1:\"b\":0:{}"));

        assert!(!looks_serialized(b"b:;"));
        assert!(!looks_serialized(b"a:0{}"));
        assert!(!looks_serialized(b"s:0:\"\""));
        assert!(!looks_serialized(b"O:1:\"\":0:{}"));
    }

    #[test]
    fn test_sniff_field_separator_and_digit() {
        assert!(!looks_serialized(b"i;00;"));
        assert!(!looks_serialized(b"i:x0;"));
        assert!(!looks_serialized(b"a:x:{}"));
        // The digit rule also rejects signed and special literals at offset 2
        assert!(!looks_serialized(b"i:-1;"));
        assert!(!looks_serialized(b"d:NAN;"));
    }

    #[test]
    fn test_sniff_terminator() {
        assert!(!looks_serialized(b"N}"));
        assert!(!looks_serialized(b"i:10}"));
        assert!(!looks_serialized(b"a:0:{};"));
        assert!(!looks_serialized(b"s:1:\"a\"}"));
    }

    #[test]
    fn test_sniff_unknown_tag() {
        assert!(!looks_serialized(b"S:1:\"a\";"));
        assert!(!looks_serialized(b"r:1;"));
        assert!(!looks_serialized(b"x;"));
    }

    #[test]
    fn test_sniff_passes_but_decode_fails() {
        assert!(looks_serialized(b"a:1:{}"));
        assert_eq!(validate_and_decode(b"a:1:{}"), None);
    }
}
