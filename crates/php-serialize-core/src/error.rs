//! Error types for PHP serialization and deserialization.
//!
//! Decoding and encoding share one error type. The `position` field is the
//! input offset for decode errors and the output offset for encode errors.

use std::fmt;
use thiserror::Error;

/// The main error type for the codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct PhpSerializeError {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// The byte position where the error occurred.
    pub position: usize,
    /// Optional context about what was being processed.
    pub context: Option<String>,
    /// Preview of input around error position for debugging.
    pub input_preview: Option<String>,
}

impl fmt::Display for PhpSerializeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at position {}", self.kind, self.position)?;
        if let Some(ref ctx) = self.context {
            write!(f, " ({})", ctx)?;
        }
        if let Some(ref preview) = self.input_preview {
            write!(f, "\n{}", preview)?;
        }
        Ok(())
    }
}

/// Specific kinds of codec errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unexpected end of input.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Expected a specific token but found something else.
    #[error("expected '{expected}', found '{found}'")]
    UnexpectedToken {
        /// The token that was expected.
        expected: char,
        /// The token that was found.
        found: char,
    },

    /// Unknown leading type tag.
    #[error("unknown type tag '{0}'")]
    UnknownTypeTag(char),

    /// A number or length prefix could not be parsed.
    #[error("invalid {target}: {raw:?}")]
    InvalidNumber {
        /// The raw text that failed to parse.
        raw: String,
        /// What the text was parsed as (`integer`, `float` or `length`).
        target: &'static str,
    },

    /// A declared length or pair count is above the configured bound.
    #[error("declared length {declared} exceeds limit {limit}")]
    LengthExceedsLimit {
        /// The length found in the input.
        declared: usize,
        /// The configured maximum.
        limit: usize,
    },

    /// Fewer bytes remain than a length prefix declares.
    #[error("truncated string: expected {expected} bytes, found {found}")]
    TruncatedString {
        /// The declared length in bytes.
        expected: usize,
        /// The number of bytes actually available.
        found: usize,
    },

    /// Array key that is neither a string nor an integer.
    #[error("invalid array key type: expected string or integer, found {actual}")]
    InvalidKeyType {
        /// Type name of the offending key.
        actual: &'static str,
    },

    /// A value shape the encoder cannot emit.
    #[error("cannot encode value of type {shape}")]
    UnsupportedValue {
        /// Type name of the offending value.
        shape: &'static str,
    },

    /// A serialized-payload hook failed.
    #[error("payload hook failed for class '{class_name}': {cause}")]
    HookFailure {
        /// Class name of the custom-serialized object.
        class_name: String,
        /// The error returned by the hook.
        #[source]
        cause: Box<PhpSerializeError>,
    },

    /// Bytes left over after the value filling a nested payload.
    #[error("{remaining} trailing bytes after payload value")]
    TrailingData {
        /// Number of unread bytes.
        remaining: usize,
    },

    /// Nesting depth exceeded.
    #[error("maximum nesting depth ({0}) exceeded")]
    DepthExceeded(usize),

    /// Invalid UTF-8 in a class or session name.
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,

    /// A session variable name that cannot be written.
    #[error("invalid session variable name {0:?}")]
    InvalidSessionName(String),

    /// Error raised by caller-supplied code, typically a payload hook.
    #[error("{0}")]
    Custom(String),
}

impl PhpSerializeError {
    /// Create a new error with the given kind and position.
    #[inline]
    pub fn new(kind: ErrorKind, position: usize) -> Self {
        Self {
            kind,
            position,
            context: None,
            input_preview: None,
        }
    }

    /// Create an error carrying a free-form message.
    ///
    /// Meant for payload hooks that need to reject input on their own terms.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Custom(message.into()), 0)
    }

    /// Add context to the error.
    #[inline]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add input preview around the error position for debugging.
    ///
    /// Shows up to 20 bytes before and after the error position.
    #[cold]
    pub fn with_input_preview(mut self, data: &[u8], error_pos: usize) -> Self {
        let start = error_pos.saturating_sub(20).min(data.len());
        let end = (error_pos + 20).min(data.len());

        if start < end {
            let slice = &data[start..end];
            let preview = String::from_utf8_lossy(slice);

            let relative_pos = error_pos.saturating_sub(start);
            let mut result = String::with_capacity(preview.len() + relative_pos + 2);
            result.push_str(&preview);
            result.push('\n');
            result.push_str(&" ".repeat(relative_pos));
            result.push('^');

            self.input_preview = Some(result);
        }
        self
    }
}

/// Result type alias for the codec.
pub type Result<T> = std::result::Result<T, PhpSerializeError>;
