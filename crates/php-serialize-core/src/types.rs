//! PHP value types.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use bstr::ByteSlice;
use memchr::memchr;

/// Ordered key/value pairs backing PHP arrays and object members.
///
/// PHP arrays are ordered maps, so pairs are kept in insertion order.
pub type PhpArray<'a> = Vec<(PhpValue<'a>, PhpValue<'a>)>;

/// A PHP value that can be serialized or deserialized.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PhpValue<'a> {
    /// PHP null value.
    #[default]
    Null,

    /// PHP boolean value.
    Bool(bool),

    /// PHP integer value.
    Int(i64),

    /// PHP float/double value.
    Float(f64),

    /// PHP string value (may contain non-UTF8 bytes).
    /// Uses Cow for zero-copy when possible.
    String(Cow<'a, [u8]>),

    /// PHP array value (ordered map).
    /// Keys are expected to be `String` or `Int`; the encoder rejects anything else.
    Array(PhpArray<'a>),

    /// PHP object with its member array.
    Object(PhpObject<'a>),

    /// Object implementing PHP's `Serializable` interface (`C:` tag).
    Serialized(PhpSerializedObject<'a>),

    /// Back-reference (`R:`/`r:`). The target is not resolved.
    Reference,

    /// SPL array wrapper (`x:` tag), as written by `ArrayObject` and friends.
    SplArray(Box<PhpSplArray<'a>>),
}

/// A PHP object: class name plus members keyed by their mangled names.
///
/// Member names follow PHP's convention: `"\0Class\0name"` for private,
/// `"\0*\0name"` for protected and plain `"name"` for public members.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PhpObject<'a> {
    /// The class name of the object.
    pub class_name: Cow<'a, str>,
    /// Member pairs in declaration order.
    pub members: PhpArray<'a>,
}

/// An object whose payload is opaque to the generic member grammar.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PhpSerializedObject<'a> {
    /// The class name of the object.
    pub class_name: Cow<'a, str>,
    /// Raw payload bytes between the braces.
    pub payload: Cow<'a, [u8]>,
    /// Payload decoded by a decode hook, if one ran.
    pub value: Option<Box<PhpValue<'a>>>,
}

/// PHP `ArrayObject`/`ArrayIterator` serialized state.
#[derive(Debug, Clone, PartialEq)]
pub struct PhpSplArray<'a> {
    /// Storage flags.
    pub flags: i64,
    /// Backing storage, usually an array.
    pub array: PhpValue<'a>,
    /// Extra properties, usually an array.
    pub properties: PhpValue<'a>,
}

impl Default for PhpSplArray<'_> {
    fn default() -> Self {
        Self {
            flags: 0,
            array: PhpValue::Array(Vec::new()),
            properties: PhpValue::Array(Vec::new()),
        }
    }
}

/// PHP property visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Public property.
    Public,
    /// Protected property (prefixed with `\0*\0`).
    Protected,
    /// Private property (prefixed with `\0ClassName\0`).
    Private,
}

/// A member name split into its visibility parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberName<'n> {
    /// The bare property name.
    pub name: &'n [u8],
    /// Visibility implied by the prefix.
    pub visibility: Visibility,
    /// For private members, the class that declared it.
    pub declaring_class: Option<&'n [u8]>,
}

/// Split a mangled member name into visibility and bare name.
///
/// Names that start with a NUL byte but lack the second NUL are treated as public.
pub fn parse_member_name(name: &[u8]) -> MemberName<'_> {
    let public = MemberName {
        name,
        visibility: Visibility::Public,
        declaring_class: None,
    };

    if name.first() != Some(&0) {
        return public;
    }

    match memchr(0, &name[1..]) {
        Some(second_null) => {
            let prefix = &name[1..1 + second_null];
            let bare = &name[2 + second_null..];
            if prefix == b"*" {
                MemberName {
                    name: bare,
                    visibility: Visibility::Protected,
                    declaring_class: None,
                }
            } else {
                MemberName {
                    name: bare,
                    visibility: Visibility::Private,
                    declaring_class: Some(prefix),
                }
            }
        }
        None => public,
    }
}

fn mangled_name(prefix: &[u8], name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + name.len() + 2);
    key.push(0);
    key.extend_from_slice(prefix);
    key.push(0);
    key.extend_from_slice(name.as_bytes());
    key
}

fn find_pair<'v, 'a>(pairs: &'v PhpArray<'a>, key: &[u8]) -> Option<&'v PhpValue<'a>> {
    pairs.iter().find_map(|(k, v)| match k {
        PhpValue::String(s) if &s[..] == key => Some(v),
        _ => None,
    })
}

fn upsert_pair<'a>(pairs: &mut PhpArray<'a>, key: Vec<u8>, value: PhpValue<'a>) {
    let existing = pairs
        .iter_mut()
        .find(|(k, _)| matches!(k, PhpValue::String(s) if s[..] == key[..]));
    match existing {
        Some((_, slot)) => *slot = value,
        None => pairs.push((PhpValue::String(Cow::Owned(key)), value)),
    }
}

impl<'a> PhpObject<'a> {
    /// Create an object with no members.
    pub fn new(class_name: impl Into<Cow<'a, str>>) -> Self {
        Self {
            class_name: class_name.into(),
            members: Vec::new(),
        }
    }

    /// The class name.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Replace the class name.
    pub fn set_class_name(&mut self, name: impl Into<Cow<'a, str>>) -> &mut Self {
        self.class_name = name.into();
        self
    }

    /// All members, keyed by mangled name.
    pub fn members(&self) -> &[(PhpValue<'a>, PhpValue<'a>)] {
        &self.members
    }

    /// Replace all members.
    pub fn set_members(&mut self, members: PhpArray<'a>) -> &mut Self {
        self.members = members;
        self
    }

    /// Look up a public member.
    pub fn get_public(&self, name: &str) -> Option<&PhpValue<'a>> {
        find_pair(&self.members, name.as_bytes())
    }

    /// Insert or replace a public member.
    pub fn set_public(&mut self, name: &str, value: PhpValue<'a>) -> &mut Self {
        upsert_pair(&mut self.members, name.as_bytes().to_vec(), value);
        self
    }

    /// Look up a protected member.
    pub fn get_protected(&self, name: &str) -> Option<&PhpValue<'a>> {
        find_pair(&self.members, &mangled_name(b"*", name))
    }

    /// Insert or replace a protected member.
    pub fn set_protected(&mut self, name: &str, value: PhpValue<'a>) -> &mut Self {
        upsert_pair(&mut self.members, mangled_name(b"*", name), value);
        self
    }

    /// Look up a private member declared by this object's class.
    pub fn get_private(&self, name: &str) -> Option<&PhpValue<'a>> {
        find_pair(&self.members, &mangled_name(self.class_name.as_bytes(), name))
    }

    /// Insert or replace a private member declared by this object's class.
    pub fn set_private(&mut self, name: &str, value: PhpValue<'a>) -> &mut Self {
        let key = mangled_name(self.class_name.as_bytes(), name);
        upsert_pair(&mut self.members, key, value);
        self
    }
}

impl<'a> PhpSerializedObject<'a> {
    /// Create a custom-serialized object with a raw payload.
    pub fn new(class_name: impl Into<Cow<'a, str>>, payload: impl Into<Cow<'a, [u8]>>) -> Self {
        Self {
            class_name: class_name.into(),
            payload: payload.into(),
            value: None,
        }
    }

    /// Attach a decoded payload value, used by the encoder's hook.
    pub fn with_value(mut self, value: PhpValue<'a>) -> Self {
        self.value = Some(Box::new(value));
        self
    }

    /// The decoded payload, if a hook produced one.
    pub fn value(&self) -> Option<&PhpValue<'a>> {
        self.value.as_deref()
    }
}

impl<'a> PhpSplArray<'a> {
    /// Create an SPL array wrapper.
    pub fn new(flags: i64, array: PhpValue<'a>, properties: PhpValue<'a>) -> Self {
        Self {
            flags,
            array,
            properties,
        }
    }
}

impl<'a> PhpValue<'a> {
    /// Build a 0-indexed array from a sequence of values.
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator<Item = PhpValue<'a>>,
    {
        PhpValue::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (PhpValue::Int(i as i64), v))
                .collect(),
        )
    }

    /// Check if the value is null.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, PhpValue::Null)
    }

    /// Check if the value is a boolean.
    #[inline]
    pub fn is_bool(&self) -> bool {
        matches!(self, PhpValue::Bool(_))
    }

    /// Check if the value is an integer.
    #[inline]
    pub fn is_int(&self) -> bool {
        matches!(self, PhpValue::Int(_))
    }

    /// Check if the value is a float.
    #[inline]
    pub fn is_float(&self) -> bool {
        matches!(self, PhpValue::Float(_))
    }

    /// Check if the value is a string.
    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, PhpValue::String(_))
    }

    /// Check if the value is an array.
    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self, PhpValue::Array(_))
    }

    /// Check if the value is an object.
    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(self, PhpValue::Object(_))
    }

    /// Get the value as a boolean.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PhpValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the value as an integer.
    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PhpValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the value as a float.
    #[inline]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            PhpValue::Float(f) => Some(*f),
            PhpValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get the value as a byte slice.
    #[inline]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PhpValue::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// Get the value as a UTF-8 string.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PhpValue::String(s) => std::str::from_utf8(s.as_ref()).ok(),
            _ => None,
        }
    }

    /// Get the value as an array.
    #[inline]
    pub fn as_array(&self) -> Option<&[(PhpValue<'a>, PhpValue<'a>)]> {
        match self {
            PhpValue::Array(a) => Some(a.as_slice()),
            _ => None,
        }
    }

    /// Get the value as an object.
    #[inline]
    pub fn as_object(&self) -> Option<&PhpObject<'a>> {
        match self {
            PhpValue::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Get the value as a custom-serialized object.
    #[inline]
    pub fn as_serialized(&self) -> Option<&PhpSerializedObject<'a>> {
        match self {
            PhpValue::Serialized(o) => Some(o),
            _ => None,
        }
    }

    /// Get the value as an SPL array.
    #[inline]
    pub fn as_spl_array(&self) -> Option<&PhpSplArray<'a>> {
        match self {
            PhpValue::SplArray(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a string key in an array.
    pub fn get(&self, key: &str) -> Option<&PhpValue<'a>> {
        find_pair(self.as_array_vec()?, key.as_bytes())
    }

    /// Look up an integer key in an array.
    pub fn get_index(&self, index: i64) -> Option<&PhpValue<'a>> {
        self.as_array_vec()?.iter().find_map(|(k, v)| match k {
            PhpValue::Int(i) if *i == index => Some(v),
            _ => None,
        })
    }

    fn as_array_vec(&self) -> Option<&PhpArray<'a>> {
        match self {
            PhpValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Convert the array to a HashMap if all keys are strings or integers.
    pub fn as_string_map(&self) -> Option<HashMap<String, &PhpValue<'a>>> {
        let arr = self.as_array()?;
        let mut map = HashMap::with_capacity(arr.len());
        for (k, v) in arr {
            let key = match k {
                PhpValue::String(s) => String::from_utf8_lossy(s).into_owned(),
                PhpValue::Int(i) => i.to_string(),
                _ => return None,
            };
            map.insert(key, v);
        }
        Some(map)
    }

    /// Convert to an owned value that doesn't borrow from the input.
    pub fn into_owned(self) -> PhpValue<'static> {
        match self {
            PhpValue::Null => PhpValue::Null,
            PhpValue::Bool(b) => PhpValue::Bool(b),
            PhpValue::Int(i) => PhpValue::Int(i),
            PhpValue::Float(f) => PhpValue::Float(f),
            PhpValue::String(s) => PhpValue::String(Cow::Owned(s.into_owned())),
            PhpValue::Array(arr) => PhpValue::Array(owned_pairs(arr)),
            PhpValue::Object(obj) => PhpValue::Object(PhpObject {
                class_name: Cow::Owned(obj.class_name.into_owned()),
                members: owned_pairs(obj.members),
            }),
            PhpValue::Serialized(obj) => PhpValue::Serialized(PhpSerializedObject {
                class_name: Cow::Owned(obj.class_name.into_owned()),
                payload: Cow::Owned(obj.payload.into_owned()),
                value: obj.value.map(|v| Box::new(v.into_owned())),
            }),
            PhpValue::Reference => PhpValue::Reference,
            PhpValue::SplArray(spl) => {
                let PhpSplArray {
                    flags,
                    array,
                    properties,
                } = *spl;
                PhpValue::SplArray(Box::new(PhpSplArray {
                    flags,
                    array: array.into_owned(),
                    properties: properties.into_owned(),
                }))
            }
        }
    }

    /// Get a type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            PhpValue::Null => "null",
            PhpValue::Bool(_) => "boolean",
            PhpValue::Int(_) => "integer",
            PhpValue::Float(_) => "float",
            PhpValue::String(_) => "string",
            PhpValue::Array(_) => "array",
            PhpValue::Object(_) => "object",
            PhpValue::Serialized(_) => "serialized object",
            PhpValue::Reference => "reference",
            PhpValue::SplArray(_) => "spl array",
        }
    }
}

fn owned_pairs(pairs: PhpArray<'_>) -> PhpArray<'static> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

impl From<bool> for PhpValue<'_> {
    fn from(value: bool) -> Self {
        PhpValue::Bool(value)
    }
}

impl From<i64> for PhpValue<'_> {
    fn from(value: i64) -> Self {
        PhpValue::Int(value)
    }
}

impl From<i32> for PhpValue<'_> {
    fn from(value: i32) -> Self {
        PhpValue::Int(i64::from(value))
    }
}

impl From<f64> for PhpValue<'_> {
    fn from(value: f64) -> Self {
        PhpValue::Float(value)
    }
}

impl<'a> From<&'a str> for PhpValue<'a> {
    fn from(value: &'a str) -> Self {
        PhpValue::String(Cow::Borrowed(value.as_bytes()))
    }
}

impl From<String> for PhpValue<'_> {
    fn from(value: String) -> Self {
        PhpValue::String(Cow::Owned(value.into_bytes()))
    }
}

impl<'a> From<&'a [u8]> for PhpValue<'a> {
    fn from(value: &'a [u8]) -> Self {
        PhpValue::String(Cow::Borrowed(value))
    }
}

impl From<Vec<u8>> for PhpValue<'_> {
    fn from(value: Vec<u8>) -> Self {
        PhpValue::String(Cow::Owned(value))
    }
}

impl<'a> From<PhpObject<'a>> for PhpValue<'a> {
    fn from(value: PhpObject<'a>) -> Self {
        PhpValue::Object(value)
    }
}

impl<'a> From<PhpSerializedObject<'a>> for PhpValue<'a> {
    fn from(value: PhpSerializedObject<'a>) -> Self {
        PhpValue::Serialized(value)
    }
}

impl<'a> From<PhpSplArray<'a>> for PhpValue<'a> {
    fn from(value: PhpSplArray<'a>) -> Self {
        PhpValue::SplArray(Box::new(value))
    }
}

impl fmt::Display for PhpValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhpValue::Null => write!(f, "null"),
            PhpValue::Bool(b) => write!(f, "{}", b),
            PhpValue::Int(i) => write!(f, "{}", i),
            PhpValue::Float(fl) => write!(f, "{}", fl),
            PhpValue::String(s) => write!(f, "\"{}\"", s.as_bstr()),
            PhpValue::Array(arr) => {
                write!(f, "[")?;
                for (i, (k, v)) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} => {}", k, v)?;
                }
                write!(f, "]")
            }
            PhpValue::Object(obj) => write!(f, "{}{{...}}", obj.class_name),
            PhpValue::Serialized(obj) => {
                write!(f, "{}({} bytes)", obj.class_name, obj.payload.len())
            }
            PhpValue::Reference => write!(f, "&ref"),
            PhpValue::SplArray(spl) => {
                write!(f, "spl({}, {}, {})", spl.flags, spl.array, spl.properties)
            }
        }
    }
}
