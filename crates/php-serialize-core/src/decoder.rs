//! PHP unserialize decoder.
//!
//! A recursive-descent decoder over a byte cursor. Each call to
//! [`Decoder::decode`] consumes exactly one value starting at the current
//! position, so the same decoder can walk a stream of concatenated values
//! (the session format relies on this).
//!
//! # Safety Limits
//!
//! - **Exact-length reads**: strings and payloads are read by their declared
//!   byte length, never by searching for a closing quote
//! - **Length bound**: declared lengths and pair counts above
//!   [`DecoderConfig::max_length`] are rejected before anything is read
//! - **Depth bound**: nesting deeper than [`DecoderConfig::max_depth`] fails
//!   with [`ErrorKind::DepthExceeded`] instead of exhausting the stack
//!
//! The first error aborts the whole decode; there is no partial recovery.

use std::borrow::Cow;

use memchr::memchr;
use tracing::{debug, instrument, trace, warn};

use crate::error::{ErrorKind, PhpSerializeError, Result};
use crate::hook::DecodeHook;
use crate::types::{PhpArray, PhpObject, PhpSerializedObject, PhpSplArray, PhpValue};

/// Maximum nesting depth to prevent stack overflow.
///
/// Each level costs several frames, so this stays well inside a 2 MiB
/// thread stack in unoptimized builds.
pub(crate) const MAX_DEPTH: usize = 128;

/// Default bound on declared lengths and pair counts (10 MiB).
pub const DEFAULT_MAX_LENGTH: usize = 10 * 1024 * 1024;

/// Decoder configuration options.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Maximum nesting depth for arrays, objects, SPL arrays and nested payloads.
    pub max_depth: usize,
    /// Maximum declared string length or array pair count.
    pub max_length: usize,
    /// Log the full source and cursor state when a token mismatch occurs.
    pub debug: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
            max_length: DEFAULT_MAX_LENGTH,
            debug: false,
        }
    }
}

/// A zero-copy PHP unserialize decoder.
pub struct Decoder<'a> {
    /// Input data.
    data: &'a [u8],
    /// Current position in the input.
    pos: usize,
    /// Decoder configuration.
    config: DecoderConfig,
    /// Current nesting depth.
    depth: usize,
    /// What to do with custom-serialized payloads.
    hook: Option<DecodeHook>,
}

impl<'a> Decoder<'a> {
    /// Create a new decoder with default configuration.
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_config(data, DecoderConfig::default())
    }

    /// Create a new decoder with custom configuration.
    pub fn with_config(data: &'a [u8], config: DecoderConfig) -> Self {
        Self {
            data,
            pos: 0,
            config,
            depth: 0,
            hook: None,
        }
    }

    /// Install the hook used for non-empty `C:` payloads.
    pub fn set_decode_hook(&mut self, hook: DecodeHook) -> &mut Self {
        self.hook = Some(hook);
        self
    }

    /// Install a caller-supplied function as the `C:` payload hook.
    pub fn set_serialized_decode_hook<F>(&mut self, hook: F) -> &mut Self
    where
        F: for<'b> Fn(&'b [u8]) -> Result<PhpValue<'b>> + Send + Sync + 'static,
    {
        self.set_decode_hook(DecodeHook::custom(hook))
    }

    /// Current byte offset into the input.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether all input has been consumed.
    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Decode one value at the current position.
    ///
    /// This is the main entry point; nested values re-enter the same dispatch.
    #[instrument(skip(self), level = "debug", fields(data_len = self.data.len(), pos = self.pos))]
    pub fn decode(&mut self) -> Result<PhpValue<'a>> {
        debug!(data_len = self.data.len(), "Starting PHP unserialize");

        let result = self.decode_value();

        match &result {
            Ok(value) => debug!(value_type = value.type_name(), pos = self.pos, "Decode completed"),
            Err(e) => warn!(error = %e, "Decode failed"),
        }

        result
    }

    /// Decode one value that must span the rest of the input.
    fn decode_whole(mut self) -> Result<PhpValue<'a>> {
        let value = self.decode_value()?;
        if !self.is_at_end() {
            return Err(PhpSerializeError::new(
                ErrorKind::TrailingData {
                    remaining: self.data.len() - self.pos,
                },
                self.pos,
            )
            .with_input_preview(self.data, self.pos));
        }
        Ok(value)
    }

    /// Read a type tag and dispatch to the matching sub-decoder.
    fn decode_value(&mut self) -> Result<PhpValue<'a>> {
        let tag_pos = self.pos;
        let tag = self.read_byte()?;

        trace!(tag = %char::from(tag), pos = tag_pos, depth = self.depth, "Decoding value");

        match tag {
            b'N' => self.decode_null(),
            b'b' => self.decode_bool(),
            b'i' => self.decode_int(),
            b'd' => self.decode_float(),
            b's' => self.decode_string(),
            b'a' => self.decode_array(),
            b'O' => self.decode_object(),
            b'C' => self.decode_serialized(),
            b'R' | b'r' => self.decode_reference(),
            b'x' => self.decode_spl_array(),
            _ => {
                warn!(tag = %char::from(tag), pos = tag_pos, "Unknown type tag");
                self.log_mismatch();
                Err(
                    PhpSerializeError::new(ErrorKind::UnknownTypeTag(char::from(tag)), tag_pos)
                        .with_input_preview(self.data, tag_pos),
                )
            }
        }
    }

    /// `N;`
    fn decode_null(&mut self) -> Result<PhpValue<'a>> {
        self.expect_byte(b';')?;
        Ok(PhpValue::Null)
    }

    /// `b:<0|1>;`. Any byte other than `1` reads as false.
    fn decode_bool(&mut self) -> Result<PhpValue<'a>> {
        self.expect_byte(b':')?;
        let value_byte = self.read_byte()?;
        self.expect_byte(b';')?;
        Ok(PhpValue::Bool(value_byte == b'1'))
    }

    /// `i:<value>;`
    fn decode_int(&mut self) -> Result<PhpValue<'a>> {
        self.read_int().map(PhpValue::Int)
    }

    /// `d:<value>;`
    fn decode_float(&mut self) -> Result<PhpValue<'a>> {
        self.expect_byte(b':')?;
        let (raw, start) = self.read_terminated()?;

        // PHP spells the special values in upper case
        let value = match raw {
            b"INF" => f64::INFINITY,
            b"-INF" => f64::NEG_INFINITY,
            b"NAN" => f64::NAN,
            _ => parse_number::<f64>(raw, "float", start)?,
        };
        Ok(PhpValue::Float(value))
    }

    /// `s:<len>:"<data>";`
    fn decode_string(&mut self) -> Result<PhpValue<'a>> {
        let bytes = self.read_delimited(b'"', b'"')?;
        self.expect_byte(b';')?;
        Ok(PhpValue::String(Cow::Borrowed(bytes)))
    }

    /// `a:<count>:{<key><value>...}`
    fn decode_array(&mut self) -> Result<PhpValue<'a>> {
        self.read_pairs().map(PhpValue::Array)
    }

    /// `O:<namelen>:"<name>":<count>:{<key><value>...}`
    fn decode_object(&mut self) -> Result<PhpValue<'a>> {
        let class_name = self.read_class_name()?;
        let members = self.read_pairs()?;
        Ok(PhpValue::Object(PhpObject {
            class_name,
            members,
        }))
    }

    /// `C:<namelen>:"<name>":<datalen>:{<data>}`
    fn decode_serialized(&mut self) -> Result<PhpValue<'a>> {
        let class_name = self.read_class_name()?;
        let payload_pos = self.pos;
        let payload = self.read_delimited(b'{', b'}')?;

        let mut object = PhpSerializedObject {
            class_name,
            payload: Cow::Borrowed(payload),
            value: None,
        };

        if let Some(hook) = self.hook.clone() {
            if !payload.is_empty() {
                trace!(class_name = %object.class_name, len = payload.len(), "Decoding payload through hook");
                self.enter()?;
                let decoded = match hook {
                    DecodeHook::Recursive => self.nested(payload).decode_whole(),
                    DecodeHook::Custom(f) => f(payload),
                };
                self.leave();

                let value = decoded.map_err(|cause| {
                    PhpSerializeError::new(
                        ErrorKind::HookFailure {
                            class_name: object.class_name.to_string(),
                            cause: Box::new(cause),
                        },
                        payload_pos,
                    )
                })?;
                object.value = Some(Box::new(value));
            }
        }

        Ok(PhpValue::Serialized(object))
    }

    /// `R:<index>;` or `r:<index>;`
    ///
    /// The index is validated and then dropped; no aliasing is reconstructed.
    fn decode_reference(&mut self) -> Result<PhpValue<'a>> {
        self.expect_byte(b':')?;
        let (raw, start) = self.read_terminated()?;
        parse_number::<i64>(raw, "integer", start)?;
        Ok(PhpValue::Reference)
    }

    /// `x:i:<flags>;<array>;m:<properties>`
    fn decode_spl_array(&mut self) -> Result<PhpValue<'a>> {
        self.expect_byte(b':')?;
        self.expect_byte(b'i')?;
        let flags = self.read_int()?;

        self.enter()?;
        let array = self.decode_value()?;
        self.expect_byte(b';')?;
        self.expect_byte(b'm')?;
        self.expect_byte(b':')?;
        let properties = self.decode_value()?;
        self.leave();

        Ok(PhpValue::SplArray(Box::new(PhpSplArray {
            flags,
            array,
            properties,
        })))
    }

    /// Read `:<count>:{` followed by `count` key/value pairs and `}`.
    ///
    /// Shared by arrays and object member lists.
    fn read_pairs(&mut self) -> Result<PhpArray<'a>> {
        let count = self.read_length()?;
        self.expect_byte(b'{')?;

        self.enter()?;
        // Cap initial allocation
        let mut items = Vec::with_capacity(count.min(1024));

        for _ in 0..count {
            let key_pos = self.pos;
            let key = self.decode_value()?;

            match &key {
                PhpValue::String(_) | PhpValue::Int(_) => {}
                other => {
                    return Err(PhpSerializeError::new(
                        ErrorKind::InvalidKeyType {
                            actual: other.type_name(),
                        },
                        key_pos,
                    )
                    .with_input_preview(self.data, key_pos));
                }
            }

            let value = self.decode_value()?;
            items.push((key, value));
        }

        self.leave();
        self.expect_byte(b'}')?;

        Ok(items)
    }

    /// Read `:<len>:"<name>"` as a UTF-8 class name.
    fn read_class_name(&mut self) -> Result<Cow<'a, str>> {
        let start = self.pos;
        let bytes = self.read_delimited(b'"', b'"')?;
        std::str::from_utf8(bytes)
            .map(Cow::Borrowed)
            .map_err(|_| PhpSerializeError::new(ErrorKind::InvalidUtf8, start))
    }

    /// Read `:<len>:<left><exactly len bytes><right>`.
    fn read_delimited(&mut self, left: u8, right: u8) -> Result<&'a [u8]> {
        let len = self.read_length()?;
        self.expect_byte(left)?;
        let bytes = self.read_exact(len)?;
        self.expect_byte(right)?;
        Ok(bytes)
    }

    /// Read `:<decimal>:` and check it against the length bound.
    fn read_length(&mut self) -> Result<usize> {
        self.expect_byte(b':')?;
        let start = self.pos;
        let raw = self.read_until(b':')?;
        let len = match parse_number::<usize>(raw, "length", start) {
            // All digits but too wide for usize: over any limit
            Err(_) if !raw.is_empty() && raw.iter().all(u8::is_ascii_digit) => usize::MAX,
            other => other?,
        };

        if len > self.config.max_length {
            warn!(declared = len, limit = self.config.max_length, "Declared length over limit");
            return Err(PhpSerializeError::new(
                ErrorKind::LengthExceedsLimit {
                    declared: len,
                    limit: self.config.max_length,
                },
                start,
            ));
        }

        self.expect_byte(b':')?;
        Ok(len)
    }

    /// Read `:<integer>;`.
    fn read_int(&mut self) -> Result<i64> {
        self.expect_byte(b':')?;
        let (raw, start) = self.read_terminated()?;
        parse_number(raw, "integer", start)
    }

    /// Read the text up to `;` and consume the `;`.
    fn read_terminated(&mut self) -> Result<(&'a [u8], usize)> {
        let start = self.pos;
        let raw = self.read_until(b';')?;
        self.expect_byte(b';')?;
        Ok((raw, start))
    }

    /// Read the next session variable name, up to and past the `|` separator.
    ///
    /// Returns `None` when the input is exhausted.
    pub(crate) fn read_name(&mut self) -> Result<Option<&'a [u8]>> {
        if self.is_at_end() {
            return Ok(None);
        }
        let name = self.read_until(b'|')?;
        self.pos += 1;
        Ok(Some(name))
    }

    /// A child decoder for a nested payload, sharing config, hook and depth.
    fn nested(&self, payload: &'a [u8]) -> Decoder<'a> {
        Decoder {
            data: payload,
            pos: 0,
            config: self.config.clone(),
            depth: self.depth,
            hook: self.hook.clone(),
        }
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= self.config.max_depth {
            warn!(depth = self.depth, max_depth = self.config.max_depth, "Max depth exceeded");
            return Err(PhpSerializeError::new(
                ErrorKind::DepthExceeded(self.config.max_depth),
                self.pos,
            ));
        }
        self.depth += 1;
        Ok(())
    }

    #[inline]
    fn leave(&mut self) {
        self.depth -= 1;
    }

    // Helper methods - marked #[inline] for performance on hot paths

    /// Read and consume the current byte.
    #[inline(always)]
    fn read_byte(&mut self) -> Result<u8> {
        let byte = self
            .data
            .get(self.pos)
            .copied()
            .ok_or_else(|| PhpSerializeError::new(ErrorKind::UnexpectedEof, self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    /// Expect a specific byte, returning an error if it doesn't match.
    #[inline]
    fn expect_byte(&mut self, expected: u8) -> Result<()> {
        let byte = self.read_byte().map_err(|e| {
            e.with_context(format!("expected '{}'", char::from(expected)))
        })?;
        if byte != expected {
            return Err(self.make_unexpected_token_error(expected, byte));
        }
        Ok(())
    }

    /// Read exactly `len` bytes.
    #[inline]
    fn read_exact(&mut self, len: usize) -> Result<&'a [u8]> {
        let available = self.data.len() - self.pos;
        if len > available {
            return Err(PhpSerializeError::new(
                ErrorKind::TruncatedString {
                    expected: len,
                    found: available,
                },
                self.pos,
            ));
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Read bytes until the delimiter (exclusive), using SIMD-accelerated search.
    #[inline]
    fn read_until(&mut self, delimiter: u8) -> Result<&'a [u8]> {
        let start = self.pos;
        match memchr(delimiter, &self.data[start..]) {
            Some(offset) => {
                self.pos = start + offset;
                Ok(&self.data[start..start + offset])
            }
            None => Err(PhpSerializeError::new(ErrorKind::UnexpectedEof, self.data.len())
                .with_context(format!("looking for '{}'", char::from(delimiter)))),
        }
    }

    /// Create an unexpected token error with proper context.
    #[cold]
    #[inline(never)]
    fn make_unexpected_token_error(&self, expected: u8, found: u8) -> PhpSerializeError {
        self.log_mismatch();
        PhpSerializeError::new(
            ErrorKind::UnexpectedToken {
                expected: char::from(expected),
                found: char::from(found),
            },
            self.pos - 1,
        )
        .with_input_preview(self.data, self.pos.saturating_sub(1))
    }

    /// Dump the source and cursor state when debugging is on.
    #[cold]
    fn log_mismatch(&self) {
        if self.config.debug {
            debug!(
                source = %String::from_utf8_lossy(self.data),
                pos = self.pos,
                depth = self.depth,
                "Token mismatch"
            );
        }
    }
}

/// Parse ASCII number text, reporting the raw text on failure.
fn parse_number<T: std::str::FromStr>(raw: &[u8], target: &'static str, pos: usize) -> Result<T> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            PhpSerializeError::new(
                ErrorKind::InvalidNumber {
                    raw: String::from_utf8_lossy(raw).into_owned(),
                    target,
                },
                pos,
            )
        })
}

/// Decode PHP serialized data from bytes.
///
/// `C:` payloads are kept as raw bytes. Use [`unserialize`] to decode them
/// as nested documents.
///
/// # Example
///
/// ```rust
/// use php_serialize_core::from_bytes;
///
/// let value = from_bytes(b"i:42;").unwrap();
/// assert_eq!(value.as_int(), Some(42));
/// ```
#[inline]
pub fn from_bytes(data: &[u8]) -> Result<PhpValue<'_>> {
    trace!(data_len = data.len(), "from_bytes called");
    Decoder::new(data).decode()
}

/// Decode PHP serialized data from bytes with custom configuration.
///
/// # Example
///
/// ```rust
/// use php_serialize_core::{from_bytes_with_config, DecoderConfig};
///
/// let config = DecoderConfig {
///     max_depth: 64,
///     max_length: 1024,
///     debug: true,
/// };
/// let value = from_bytes_with_config(b"i:42;", config).unwrap();
/// assert_eq!(value.as_int(), Some(42));
/// ```
#[inline]
pub fn from_bytes_with_config(data: &[u8], config: DecoderConfig) -> Result<PhpValue<'_>> {
    trace!(data_len = data.len(), ?config, "from_bytes_with_config called");
    Decoder::with_config(data, config).decode()
}

/// Decode PHP serialized data, decoding `C:` payloads as nested documents.
///
/// ```rust
/// use php_serialize_core::{unserialize, PhpValue};
///
/// let value = unserialize(br#"C:11:"ArrayObject":21:{x:i:0;a:0:{};m:a:0:{}}"#).unwrap();
/// let inner = value.as_serialized().unwrap().value().unwrap();
/// assert!(inner.as_spl_array().is_some());
/// ```
pub fn unserialize(data: &[u8]) -> Result<PhpValue<'_>> {
    let mut decoder = Decoder::new(data);
    decoder.set_decode_hook(DecodeHook::Recursive);
    decoder.decode()
}
