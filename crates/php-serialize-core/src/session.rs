//! PHP session storage format (`session.serialize_handler = php`).
//!
//! A session file is a flat run of `name|value` pairs, where each value uses
//! the regular serialize grammar:
//!
//! ```text
//! user|s:5:"alice";visits|i:3;
//! ```
//!
//! Names carry no length prefix and end at the first `|`.

use std::borrow::Cow;

use tracing::debug;

use crate::decoder::{Decoder, DecoderConfig};
use crate::encoder::{Encoder, EncoderConfig};
use crate::error::{ErrorKind, PhpSerializeError, Result};
use crate::hook::{DecodeHook, EncodeHook};
use crate::types::PhpValue;

/// Separator between a variable name and its value.
const NAME_SEPARATOR: u8 = b'|';

/// Session variables in storage order.
pub type PhpSession<'a> = Vec<(Cow<'a, str>, PhpValue<'a>)>;

/// Decode a session blob with default configuration and no payload hook.
///
/// # Example
///
/// ```rust
/// use php_serialize_core::decode_session;
///
/// let session = decode_session(br#"user|s:5:"alice";visits|i:3;"#).unwrap();
/// assert_eq!(session[0].0, "user");
/// assert_eq!(session[1].1.as_int(), Some(3));
/// ```
pub fn decode_session(data: &[u8]) -> Result<PhpSession<'_>> {
    decode_session_with(data, DecoderConfig::default(), None)
}

/// Decode a session blob with custom configuration and an optional payload hook.
///
/// Running out of input where a name would start ends the session. Any other
/// failure, including a trailing name without `|`, aborts the whole decode.
pub fn decode_session_with(
    data: &[u8],
    config: DecoderConfig,
    hook: Option<DecodeHook>,
) -> Result<PhpSession<'_>> {
    let mut decoder = Decoder::with_config(data, config);
    if let Some(hook) = hook {
        decoder.set_decode_hook(hook);
    }

    let mut session = Vec::new();
    loop {
        let name_pos = decoder.position();
        let Some(raw_name) = decoder
            .read_name()
            .map_err(|e| e.with_context("reading session variable name"))?
        else {
            break;
        };

        let name = std::str::from_utf8(raw_name)
            .map_err(|_| PhpSerializeError::new(ErrorKind::InvalidUtf8, name_pos))?;
        let value = decoder
            .decode()
            .map_err(|e| e.with_context(format!("session variable {name:?}")))?;

        session.push((Cow::Borrowed(name), value));
    }

    debug!(variables = session.len(), "Session decoded");
    Ok(session)
}

/// Encode session variables with default configuration and no payload hook.
///
/// # Example
///
/// ```rust
/// use std::borrow::Cow;
/// use php_serialize_core::{encode_session, PhpValue};
///
/// let session = vec![(Cow::Borrowed("visits"), PhpValue::Int(3))];
/// assert_eq!(encode_session(&session).unwrap(), b"visits|i:3;");
/// ```
pub fn encode_session(session: &[(Cow<'_, str>, PhpValue<'_>)]) -> Result<Vec<u8>> {
    encode_session_with(session, EncoderConfig::default(), None)
}

/// Encode session variables with custom configuration and an optional payload hook.
pub fn encode_session_with(
    session: &[(Cow<'_, str>, PhpValue<'_>)],
    config: EncoderConfig,
    hook: Option<EncodeHook>,
) -> Result<Vec<u8>> {
    let mut encoder = Encoder::with_config(config);
    if let Some(hook) = hook {
        encoder.set_encode_hook(hook);
    }

    let mut out = Vec::new();
    for (name, value) in session {
        if name.as_bytes().contains(&NAME_SEPARATOR) {
            return Err(PhpSerializeError::new(
                ErrorKind::InvalidSessionName(name.to_string()),
                out.len(),
            ));
        }

        out.extend_from_slice(name.as_bytes());
        out.push(NAME_SEPARATOR);

        let offset = out.len();
        let encoded = encoder.encode(value).map_err(|mut e| {
            e.position += offset;
            e.with_context(format!("session variable {name:?}"))
        })?;
        out.extend_from_slice(&encoded);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PhpSerializedObject;

    #[test]
    fn test_decode_session() {
        let data = br#"user|s:5:"alice";visits|i:3;cart|a:1:{i:0;s:4:"book";}"#;
        let session = decode_session(data).unwrap();
        assert_eq!(session.len(), 3);
        assert_eq!(session[0].0, "user");
        assert_eq!(session[0].1.as_str(), Some("alice"));
        assert_eq!(session[1].0, "visits");
        assert_eq!(session[1].1, PhpValue::Int(3));
        assert_eq!(
            session[2].1.get_index(0).and_then(|v| v.as_str()),
            Some("book")
        );
    }

    #[test]
    fn test_decode_empty_session() {
        assert!(decode_session(b"").unwrap().is_empty());
    }

    #[test]
    fn test_separator_inside_value() {
        let session = decode_session(br#"a|s:3:"x|y";b|N;"#).unwrap();
        assert_eq!(session[0].1.as_str(), Some("x|y"));
        assert_eq!(session[1].0, "b");
        assert!(session[1].1.is_null());
    }

    #[test]
    fn test_trailing_name_without_separator() {
        let err = decode_session(b"a|i:1;dangling").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnexpectedEof);
        assert_eq!(err.context.as_deref(), Some("reading session variable name"));
    }

    #[test]
    fn test_missing_value() {
        assert_eq!(
            decode_session(b"a|").unwrap_err().kind,
            ErrorKind::UnexpectedEof
        );
    }

    #[test]
    fn test_value_error_aborts() {
        let err = decode_session(b"a|i:1;b|i:x;c|N;").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidNumber { .. }));
        assert_eq!(err.context.as_deref(), Some("session variable \"b\""));
    }

    #[test]
    fn test_crasher_inputs_fail_cleanly() {
        for input in [
            "|C2984619140625:",
            "|C9478759765625:",
            "|C :590791705756156:",
            "|C298461940625:",
        ] {
            assert!(decode_session(input.as_bytes()).is_err());
        }
    }

    #[test]
    fn test_decode_with_hook() {
        let data = br#"obj|C:3:"Foo":4:{i:7;}"#;
        let session =
            decode_session_with(data, DecoderConfig::default(), Some(DecodeHook::Recursive))
                .unwrap();
        let custom = session[0].1.as_serialized().unwrap();
        assert_eq!(custom.value(), Some(&PhpValue::Int(7)));
    }

    #[test]
    fn test_encode_session_keeps_order() {
        let session: PhpSession = vec![
            (Cow::Borrowed("z"), PhpValue::from("last")),
            (Cow::Borrowed("a"), PhpValue::Bool(true)),
        ];
        assert_eq!(
            encode_session(&session).unwrap(),
            br#"z|s:4:"last";a|b:1;"#.to_vec()
        );
    }

    #[test]
    fn test_encode_rejects_separator_in_name() {
        let session: PhpSession = vec![(Cow::Borrowed("a|b"), PhpValue::Null)];
        assert_eq!(
            encode_session(&session).unwrap_err().kind,
            ErrorKind::InvalidSessionName("a|b".into())
        );
    }

    #[test]
    fn test_encode_error_names_variable() {
        let session: PhpSession = vec![
            (Cow::Borrowed("ok"), PhpValue::Null),
            (Cow::Borrowed("bad"), PhpValue::Reference),
        ];
        let err = encode_session(&session).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedValue { shape: "reference" });
        assert_eq!(err.context.as_deref(), Some("session variable \"bad\""));
        assert_eq!(err.position, 9);
    }

    #[test]
    fn test_session_round_trip_with_hooks() {
        let bag = PhpSerializedObject::new("Bag", b"".as_slice())
            .with_value(PhpValue::list(vec![PhpValue::from("x")]));
        let session: PhpSession = vec![
            (Cow::Borrowed("bag"), PhpValue::Serialized(bag)),
            (Cow::Borrowed("n"), PhpValue::Float(0.5)),
        ];

        let bytes =
            encode_session_with(&session, EncoderConfig::default(), Some(EncodeHook::Recursive))
                .unwrap();
        let decoded =
            decode_session_with(&bytes, DecoderConfig::default(), Some(DecodeHook::Recursive))
                .unwrap();

        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].0, "bag");
        assert_eq!(
            decoded[0].1.as_serialized().and_then(|o| o.value()),
            Some(&PhpValue::list(vec![PhpValue::from("x")]))
        );
        assert_eq!(decoded[1].1, PhpValue::Float(0.5));
    }
}
