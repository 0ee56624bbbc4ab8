//! Strict PHP unserialize decoder.
//!
//! This crate decodes the textual format produced by PHP's `serialize()`
//! into a [`Value`] tree, and reports malformed input with the exact byte
//! offset that broke the grammar.
//!
//! # Features
//!
//! - **Zero-copy parsing** - String payloads and class names borrow from the input
//! - **Strict grammar** - Declared lengths are authoritative, no recovery heuristics
//! - **Offset-accurate errors** - Three error kinds with a caret snippet for display
//! - **Quick validation** - Cheap sniff before a full decode
//! - **Back-references** - `r:`/`R:` kept as tokens, resolvable on demand
//!
//! # Quick Start
//!
//! ```rust
//! use php_unserialize_core::{decode, Value};
//!
//! let data = br#"a:2:{s:4:"name";s:5:"Alice";s:3:"age";i:30;}"#;
//! let value = decode(data).unwrap();
//!
//! if let Value::Array(items) = value {
//!     for (key, val) in items {
//!         println!("{} => {}", key, val);
//!     }
//! }
//! ```
//!
//! # Reporting Errors
//!
//! ```rust
//! use php_unserialize_core::decode;
//!
//! let err = decode(b"s:100:\"\";").unwrap_err();
//! assert_eq!(err.offset(), Some(2));
//! assert_eq!(err.snippet().unwrap(), "s:100:\"\";\n  ^");
//! ```
//!
//! # Supported Types
//!
//! | PHP Type | Rust Type |
//! |----------|-----------|
//! | `null` | `Value::Null` |
//! | `bool` | `Value::Bool(bool)` |
//! | `int` | `Value::Int(i64)` |
//! | `float` | `Value::Float(f64)` |
//! | `string` | `Value::String(Cow<[u8]>)` |
//! | `array` | `Value::Array(Vec<(Value, Value)>)` |
//! | `object` | `Value::Object { class_name, properties }` |
//! | `Serializable` object | `Value::CustomObject { class_name, payload }` |
//! | `reference` | `Value::Reference { index, kind }` |

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::inline_always)]
#![allow(clippy::trivially_copy_pass_by_ref)]

pub mod error;
pub mod parser;
mod resolve;
pub mod syntax;
pub mod types;
pub mod validate;

#[cfg(feature = "serde")]
pub mod json;

pub use error::{DecodeError, ErrorKind, FailureClass, Result};
pub use parser::{decode, decode_with_config, from_bytes, from_bytes_with_config, Parser, ParserConfig};
pub use syntax::{render_snippet, SyntaxError, SNIPPET_LENGTH};
pub use types::{PropertyName, ReferenceKind, Value, Visibility};
pub use validate::{is_serialized, looks_serialized, validate_and_decode};

#[cfg(feature = "serde")]
pub use json::to_json;
