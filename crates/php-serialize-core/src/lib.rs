//! Byte-exact PHP serialize/unserialize codec.
//!
//! This crate reads and writes PHP's `serialize()` format, plus the `php`
//! session storage format built on top of it. Decoding borrows from the input
//! wherever possible and never trusts the input's structure: every length is
//! checked against a configurable limit before anything is read.
//!
//! # Features
//!
//! - **Zero-copy decoding** - Strings and payloads borrow from the input
//! - **Length-exact strings** - Declared lengths are honored, embedded quotes included
//! - **Ordered arrays** - Insertion order is preserved through decode and encode
//! - **Custom-serialized objects** - `C:` payloads kept raw or decoded through a hook
//! - **Bounded** - Maximum length and nesting depth are enforced
//! - **Detailed errors** - Byte positions and context on every failure
//!
//! # Quick Start
//!
//! ```rust
//! use php_serialize_core::{from_bytes, to_bytes, PhpValue};
//!
//! let data = br#"a:2:{s:4:"name";s:5:"Alice";s:3:"age";i:30;}"#;
//! let value = from_bytes(data).unwrap();
//!
//! if let PhpValue::Array(items) = &value {
//!     for (key, val) in items {
//!         println!("{} => {}", key, val);
//!     }
//! }
//!
//! assert_eq!(to_bytes(&value).unwrap(), data.to_vec());
//! ```
//!
//! # Custom-Serialized Objects
//!
//! [`unserialize`] and [`serialize`] treat `C:` payloads as nested documents:
//!
//! ```rust
//! use php_serialize_core::{serialize, unserialize};
//!
//! let data = br#"C:3:"Foo":12:{s:5:"hello";}"#;
//! let value = unserialize(data).unwrap();
//! let inner = value.as_serialized().and_then(|o| o.value()).unwrap();
//! assert_eq!(inner.as_str(), Some("hello"));
//! assert_eq!(serialize(&value).unwrap(), data.to_vec());
//! ```
//!
//! # Supported Types
//!
//! | PHP Type | Tag | Rust Type |
//! |----------|-----|-----------|
//! | `null` | `N` | `PhpValue::Null` |
//! | `bool` | `b` | `PhpValue::Bool(bool)` |
//! | `int` | `i` | `PhpValue::Int(i64)` |
//! | `float` | `d` | `PhpValue::Float(f64)` |
//! | `string` | `s` | `PhpValue::String(Cow<[u8]>)` |
//! | `array` | `a` | `PhpValue::Array(PhpArray)` |
//! | `object` | `O` | `PhpValue::Object(PhpObject)` |
//! | `Serializable` object | `C` | `PhpValue::Serialized(PhpSerializedObject)` |
//! | SPL array | `x` | `PhpValue::SplArray(Box<PhpSplArray>)` |
//! | `reference` | `R`/`r` | `PhpValue::Reference` (decode only) |

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

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod hook;
pub mod session;
pub mod types;

#[cfg(feature = "serde")]
pub mod json;

pub use decoder::{
    from_bytes, from_bytes_with_config, unserialize, Decoder, DecoderConfig, DEFAULT_MAX_LENGTH,
};
pub use encoder::{serialize, to_bytes, to_bytes_with_config, Encoder, EncoderConfig};
pub use error::{ErrorKind, PhpSerializeError, Result};
pub use hook::{DecodeHook, EncodeHook};
pub use session::{
    decode_session, decode_session_with, encode_session, encode_session_with, PhpSession,
};
pub use types::{
    parse_member_name, MemberName, PhpArray, PhpObject, PhpSerializedObject, PhpSplArray,
    PhpValue, Visibility,
};

#[cfg(feature = "serde")]
pub use json::to_json;
