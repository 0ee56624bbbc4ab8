//! Decoded value types.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use bstr::ByteSlice;
use memchr::memchr;

#[cfg(feature = "serde")]
use serde::Serialize;

/// A value produced by unserializing PHP data.
///
/// Byte payloads borrow from the input where possible; call
/// [`Value::into_owned`] to detach the tree from the input buffer.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value<'a> {
    /// `N;`
    #[default]
    Null,

    /// `b:0;` / `b:1;`
    Bool(bool),

    /// `i:<digits>;`
    Int(i64),

    /// `d:<literal>;`, including `NAN`, `INF` and `-INF`.
    Float(f64),

    /// `s:<len>:"<bytes>";`
    ///
    /// The payload is raw bytes. It is not required to be valid UTF-8.
    String(Cow<'a, [u8]>),

    /// `a:<count>:{...}`
    ///
    /// Pairs are kept in wire order. Duplicate keys are preserved.
    Array(Vec<(Value<'a>, Value<'a>)>),

    /// `O:<len>:"<class>":<count>:{...}`
    Object {
        /// Class name, taken verbatim from the input.
        class_name: Cow<'a, [u8]>,
        /// Property name/value pairs in wire order. Names keep their
        /// visibility mangling; see [`PropertyName::parse`].
        properties: Vec<(Value<'a>, Value<'a>)>,
    },

    /// `C:<len>:"<class>":<len>:{<payload>}`
    CustomObject {
        /// Class name, taken verbatim from the input.
        class_name: Cow<'a, [u8]>,
        /// Opaque payload produced by the class's own serializer.
        payload: Cow<'a, [u8]>,
    },

    /// `r:<index>;` or `R:<index>;`
    ///
    /// `index` is the 1-based slot in the decode-order reference table.
    Reference {
        /// 1-based slot index.
        index: usize,
        /// Which wire tag produced the reference.
        kind: ReferenceKind,
    },
}

/// Distinguishes the two reference tags of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(rename_all = "lowercase"))]
pub enum ReferenceKind {
    /// `r:` - the same value (object identity). Occupies its own slot.
    Value,
    /// `R:` - a PHP reference alias (`&$x`). Does not occupy a slot.
    Alias,
}

impl ReferenceKind {
    /// The wire tag byte for this kind.
    #[inline]
    pub fn tag(self) -> u8 {
        match self {
            ReferenceKind::Value => b'r',
            ReferenceKind::Alias => b'R',
        }
    }
}

/// Object property visibility, as encoded in the property name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Public property.
    Public,
    /// Protected property (prefixed with `\0*\0`).
    Protected,
    /// Private property (prefixed with `\0ClassName\0`).
    Private,
}

/// A property name split into its visibility parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyName<'v> {
    /// Bare property name.
    pub name: &'v [u8],
    /// Visibility encoded in the prefix.
    pub visibility: Visibility,
    /// For private properties, the class that declared it.
    pub declaring_class: Option<&'v [u8]>,
}

impl<'v> PropertyName<'v> {
    /// Split a mangled property name.
    ///
    /// ```rust
    /// use php_unserialize_core::{PropertyName, Visibility};
    ///
    /// let prop = PropertyName::parse(b"\0*\0secret");
    /// assert_eq!(prop.name, b"secret");
    /// assert_eq!(prop.visibility, Visibility::Protected);
    /// ```
    pub fn parse(raw: &'v [u8]) -> Self {
        let public = PropertyName {
            name: raw,
            visibility: Visibility::Public,
            declaring_class: None,
        };

        let Some(rest) = raw.strip_prefix(b"\0") else {
            return public;
        };
        // Malformed mangling is treated as a public name
        let Some(split) = memchr(0, rest) else {
            return public;
        };

        let prefix = &rest[..split];
        let name = &rest[split + 1..];
        if prefix == b"*" {
            PropertyName {
                name,
                visibility: Visibility::Protected,
                declaring_class: None,
            }
        } else {
            PropertyName {
                name,
                visibility: Visibility::Private,
                declaring_class: Some(prefix),
            }
        }
    }
}

impl<'a> Value<'a> {
    /// Check if the value is null.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if the value is a boolean.
    #[inline]
    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    /// Check if the value is an integer.
    #[inline]
    pub fn is_int(&self) -> bool {
        matches!(self, Value::Int(_))
    }

    /// Check if the value is a float.
    #[inline]
    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    /// Check if the value is a string.
    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// Check if the value is an array.
    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// Check if the value is a plain or custom object.
    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object { .. } | Value::CustomObject { .. })
    }

    /// Check if the value is a back-reference.
    #[inline]
    pub fn is_reference(&self) -> bool {
        matches!(self, Value::Reference { .. })
    }

    /// Get the value as a boolean.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the value as an integer.
    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the value as a float.
    #[inline]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get the value as a byte slice.
    #[inline]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// Get the value as a UTF-8 string.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => std::str::from_utf8(s.as_ref()).ok(),
            _ => None,
        }
    }

    /// Get the value as an array.
    #[inline]
    pub fn as_array(&self) -> Option<&[(Value<'a>, Value<'a>)]> {
        match self {
            Value::Array(a) => Some(a.as_slice()),
            _ => None,
        }
    }

    /// Class name of a plain or custom object.
    #[inline]
    pub fn class_name(&self) -> Option<&[u8]> {
        match self {
            Value::Object { class_name, .. } | Value::CustomObject { class_name, .. } => {
                Some(class_name.as_ref())
            }
            _ => None,
        }
    }

    /// Look up the last entry with the given string key in an array or
    /// the last property with the given name in an object.
    ///
    /// Later duplicates win, matching PHP's own key collapsing.
    pub fn get(&self, key: &[u8]) -> Option<&Value<'a>> {
        let pairs = match self {
            Value::Array(items) => items,
            Value::Object { properties, .. } => properties,
            _ => return None,
        };
        pairs.iter().rev().find_map(|(k, v)| match k {
            Value::String(s) if s.as_ref() == key => Some(v),
            Value::String(s) if PropertyName::parse(s).name == key => Some(v),
            _ => None,
        })
    }

    /// Convert the array to a HashMap if all keys are strings or integers.
    pub fn as_string_map(&self) -> Option<HashMap<String, &Value<'a>>> {
        let arr = self.as_array()?;
        let mut map = HashMap::with_capacity(arr.len());
        for (k, v) in arr {
            let key = match k {
                Value::String(s) => String::from_utf8_lossy(s).into_owned(),
                Value::Int(i) => i.to_string(),
                _ => return None,
            };
            map.insert(key, v);
        }
        Some(map)
    }

    /// Convert to an owned value that doesn't borrow from the input.
    pub fn into_owned(self) -> Value<'static> {
        fn own_pairs(pairs: Vec<(Value<'_>, Value<'_>)>) -> Vec<(Value<'static>, Value<'static>)> {
            pairs
                .into_iter()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        }

        match self {
            Value::Null => Value::Null,
            Value::Bool(b) => Value::Bool(b),
            Value::Int(i) => Value::Int(i),
            Value::Float(f) => Value::Float(f),
            Value::String(s) => Value::String(Cow::Owned(s.into_owned())),
            Value::Array(arr) => Value::Array(own_pairs(arr)),
            Value::Object {
                class_name,
                properties,
            } => Value::Object {
                class_name: Cow::Owned(class_name.into_owned()),
                properties: own_pairs(properties),
            },
            Value::CustomObject {
                class_name,
                payload,
            } => Value::CustomObject {
                class_name: Cow::Owned(class_name.into_owned()),
                payload: Cow::Owned(payload.into_owned()),
            },
            Value::Reference { index, kind } => Value::Reference { index, kind },
        }
    }

    /// Get a type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object { .. } => "object",
            Value::CustomObject { .. } => "custom object",
            Value::Reference { .. } => "reference",
        }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => match std::str::from_utf8(s) {
                Ok(s) => write!(f, "\"{}\"", s),
                Err(_) => write!(f, "<binary {} bytes>", s.len()),
            },
            Value::Array(arr) => {
                write!(f, "[")?;
                for (i, (k, v)) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} => {}", k, v)?;
                }
                write!(f, "]")
            }
            Value::Object { class_name, .. } => write!(f, "{}{{...}}", class_name.as_bstr()),
            Value::CustomObject {
                class_name,
                payload,
            } => write!(f, "{}<{} bytes>", class_name.as_bstr(), payload.len()),
            Value::Reference { index, kind } => write!(f, "&{}{}", char::from(kind.tag()), index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_name_public() {
        let prop = PropertyName::parse(b"name");
        assert_eq!(prop.name, b"name");
        assert_eq!(prop.visibility, Visibility::Public);
        assert_eq!(prop.declaring_class, None);
    }

    #[test]
    fn test_property_name_private() {
        let prop = PropertyName::parse(b"\0Test\0priv");
        assert_eq!(prop.name, b"priv");
        assert_eq!(prop.visibility, Visibility::Private);
        assert_eq!(prop.declaring_class, Some(&b"Test"[..]));
    }

    #[test]
    fn test_property_name_malformed_is_public() {
        let prop = PropertyName::parse(b"\0broken");
        assert_eq!(prop.name, b"\0broken");
        assert_eq!(prop.visibility, Visibility::Public);
    }

    #[test]
    fn test_get_last_duplicate_wins() {
        let value = Value::Array(vec![
            (Value::String(Cow::Borrowed(b"k")), Value::Int(1)),
            (Value::String(Cow::Borrowed(b"k")), Value::Int(2)),
        ]);
        assert_eq!(value.get(b"k"), Some(&Value::Int(2)));
        assert_eq!(value.get(b"missing"), None);
    }

    #[test]
    fn test_into_owned_preserves_structure() {
        let owned = {
            let data = b"payload".to_vec();
            let value = Value::CustomObject {
                class_name: Cow::Borrowed(b"Stub"),
                payload: Cow::Borrowed(&data),
            };
            value.into_owned()
        };
        assert_eq!(owned.class_name(), Some(&b"Stub"[..]));
        assert!(owned.is_object());
    }

    #[test]
    fn test_display() {
        let value = Value::Array(vec![
            (Value::Int(0), Value::Bool(true)),
            (
                Value::String(Cow::Borrowed(b"x")),
                Value::Reference {
                    index: 2,
                    kind: ReferenceKind::Alias,
                },
            ),
        ]);
        assert_eq!(value.to_string(), "[0 => true, \"x\" => &R2]");
    }
}
