//! Property key classification
//!
//! A property access names its target with a namespace plus one of three
//! discriminants. The discriminant is fixed when the key is classified and
//! decides the resolution path; an access never falls back from one kind to
//! another.

use crate::handle::ObjectRef;
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

/// The public (empty) namespace
pub const PUBLIC_NS: &str = "";

/// Namespace holding the proxy override hooks
pub const FLASH_PROXY_NS: &str = "http://www.adobe.com/2006/actionscript/flash/proxy";

/// Namespace-qualified name
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct QName {
    /// Namespace URI (empty for public)
    pub ns: Rc<str>,
    /// Local name
    pub name: Rc<str>,
}

impl QName {
    /// Create a qualified name
    pub fn new(name: &str, ns: &str) -> Self {
        Self {
            ns: Rc::from(ns),
            name: Rc::from(name),
        }
    }

    /// Create a name in the public namespace
    pub fn public(name: &str) -> Self {
        Self::new(name, PUBLIC_NS)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ns.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}::{}", self.ns, self.name)
        }
    }
}

impl fmt::Debug for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QName({})", self)
    }
}

/// Key discriminant
#[derive(Clone, Debug)]
pub enum KeyName {
    /// Plain local name
    Qualified(Rc<str>),
    /// Non-negative integer index
    Index(u32),
    /// Object used as a key by reference
    Identity(ObjectRef),
}

/// A classified property key
///
/// A key carrying an identity handle owns it: containers that store the key
/// take it by value.
#[derive(Clone, Debug)]
pub struct Key {
    ns: Rc<str>,
    name: KeyName,
    /// Source text of an index classified from a string (`"007"`)
    spelling: Option<Rc<str>>,
}

impl Key {
    /// Qualified key
    pub fn qualified(name: &str, ns: &str) -> Self {
        Self {
            ns: Rc::from(ns),
            name: KeyName::Qualified(Rc::from(name)),
            spelling: None,
        }
    }

    /// Public qualified key
    pub fn public(name: &str) -> Self {
        Self::qualified(name, PUBLIC_NS)
    }

    /// Index key in the public namespace
    pub fn index(index: u32) -> Self {
        Self {
            ns: Rc::from(PUBLIC_NS),
            name: KeyName::Index(index),
            spelling: None,
        }
    }

    /// Identity key in the public namespace
    pub fn identity(obj: ObjectRef) -> Self {
        Self {
            ns: Rc::from(PUBLIC_NS),
            name: KeyName::Identity(obj),
            spelling: None,
        }
    }

    /// Key from an already qualified name
    pub fn from_qname(qname: QName) -> Self {
        Self {
            ns: qname.ns,
            name: KeyName::Qualified(qname.name),
            spelling: None,
        }
    }

    /// Namespace
    pub fn ns(&self) -> &str {
        &self.ns
    }

    /// Discriminant
    pub fn name(&self) -> &KeyName {
        &self.name
    }

    /// Split into namespace and discriminant
    pub fn into_parts(self) -> (Rc<str>, KeyName) {
        (self.ns, self.name)
    }

    /// Qualified name, if this key is qualified
    pub fn qname(&self) -> Option<QName> {
        match &self.name {
            KeyName::Qualified(name) => Some(QName {
                ns: Rc::clone(&self.ns),
                name: Rc::clone(name),
            }),
            _ => None,
        }
    }

    /// Text of an index key as it was written, decimal form otherwise
    pub fn index_spelling(&self) -> Option<Rc<str>> {
        match (&self.name, &self.spelling) {
            (KeyName::Index(_), Some(text)) => Some(Rc::clone(text)),
            (KeyName::Index(i), None) => Some(Rc::from(i.to_string())),
            _ => None,
        }
    }

    /// Local name flattened to a plain string
    ///
    /// The namespace is not part of the result.
    pub fn local_name(&self) -> Rc<str> {
        match &self.name {
            KeyName::Qualified(name) => Rc::clone(name),
            KeyName::Index(i) => match &self.spelling {
                Some(text) => Rc::clone(text),
                None => Rc::from(i.to_string()),
            },
            KeyName::Identity(obj) => Value::Object(obj.clone()).to_string_value(),
        }
    }

    /// Whether the key is qualified
    pub fn is_qualified(&self) -> bool {
        matches!(self.name, KeyName::Qualified(_))
    }

    /// Whether the key is an index
    pub fn is_index(&self) -> bool {
        matches!(self.name, KeyName::Index(_))
    }

    /// Whether the key is an identity key
    pub fn is_identity(&self) -> bool {
        matches!(self.name, KeyName::Identity(_))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.ns.is_empty() {
            write!(f, "{}::", self.ns)?;
        }
        match &self.name {
            KeyName::Qualified(name) => write!(f, "{}", name),
            KeyName::Index(i) => write!(f, "[{}]", i),
            KeyName::Identity(obj) => write!(f, "[{:?}]", obj),
        }
    }
}

/// Parse a raw name that consists entirely of decimal digits
fn parse_index(raw: &str) -> Option<u32> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<u32>().ok()
}

/// Classify a raw property name
///
/// A name made only of decimal digits that fits in `u32` becomes an index;
/// everything else, including strings with a numeric prefix, stays qualified.
pub fn classify(raw: &str, ns: &str) -> Key {
    match parse_index(raw) {
        Some(index) => Key {
            ns: Rc::from(ns),
            name: KeyName::Index(index),
            spelling: Some(Rc::from(raw)),
        },
        None => Key::qualified(raw, ns),
    }
}

/// Classify a runtime value used as a property name
///
/// Objects become identity keys and take over the handle. Strings go through
/// [`classify`]; integral non-negative numbers become indices; every other
/// value is converted to its string form.
pub fn classify_value(name: Value, ns: &str) -> Key {
    match name {
        Value::Object(obj) => Key {
            ns: Rc::from(ns),
            name: KeyName::Identity(obj),
            spelling: None,
        },
        Value::String(s) => classify(&s, ns),
        Value::Int(i) if i >= 0 => Key {
            ns: Rc::from(ns),
            name: KeyName::Index(i as u32),
            spelling: None,
        },
        Value::Number(n) if n >= 0.0 && n.fract() == 0.0 && n <= f64::from(u32::MAX) => Key {
            ns: Rc::from(ns),
            name: KeyName::Index(n as u32),
            spelling: None,
        },
        other => Key::qualified(&other.to_string_value(), ns),
    }
}
