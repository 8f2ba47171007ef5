//! Hooks for custom-serialized (`C:`) object payloads.
//!
//! PHP classes implementing `Serializable` write an opaque payload, which in
//! practice is very often another serialized document. A hook tells the
//! decoder or encoder what to do with that payload:
//!
//! - no hook: the payload stays raw bytes and is written back verbatim
//! - [`DecodeHook::Recursive`] / [`EncodeHook::Recursive`]: treat the payload
//!   as a nested document, using the same configuration and depth budget
//! - [`DecodeHook::custom`] / [`EncodeHook::custom`]: call a function
//!
//! ```rust
//! use php_serialize_core::{Decoder, DecodeHook, PhpValue};
//!
//! let data = br#"C:3:"Foo":4:{i:7;}"#;
//! let mut decoder = Decoder::new(data);
//! decoder.set_decode_hook(DecodeHook::Recursive);
//! let value = decoder.decode().unwrap();
//! assert_eq!(value.as_serialized().unwrap().value(), Some(&PhpValue::Int(7)));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::types::PhpValue;

/// Signature of a caller-supplied payload decoder.
pub type DecodeFn = dyn for<'b> Fn(&'b [u8]) -> Result<PhpValue<'b>> + Send + Sync;

/// Signature of a caller-supplied payload encoder.
pub type EncodeFn = dyn Fn(&PhpValue<'_>) -> Result<Vec<u8>> + Send + Sync;

/// How the decoder treats non-empty `C:` payloads.
#[derive(Clone)]
pub enum DecodeHook {
    /// Decode the payload as a nested serialized value.
    Recursive,
    /// Decode the payload with a caller-supplied function.
    Custom(Arc<DecodeFn>),
}

impl DecodeHook {
    /// Wrap a function as a decode hook.
    pub fn custom<F>(hook: F) -> Self
    where
        F: for<'b> Fn(&'b [u8]) -> Result<PhpValue<'b>> + Send + Sync + 'static,
    {
        DecodeHook::Custom(Arc::new(hook))
    }
}

impl fmt::Debug for DecodeHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeHook::Recursive => f.write_str("Recursive"),
            DecodeHook::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// How the encoder produces `C:` payloads for objects carrying a decoded value.
#[derive(Clone)]
pub enum EncodeHook {
    /// Encode the attached value as a nested serialized value.
    Recursive,
    /// Encode the attached value with a caller-supplied function.
    Custom(Arc<EncodeFn>),
}

impl EncodeHook {
    /// Wrap a function as an encode hook.
    pub fn custom<F>(hook: F) -> Self
    where
        F: Fn(&PhpValue<'_>) -> Result<Vec<u8>> + Send + Sync + 'static,
    {
        EncodeHook::Custom(Arc::new(hook))
    }
}

impl fmt::Debug for EncodeHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeHook::Recursive => f.write_str("Recursive"),
            EncodeHook::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
