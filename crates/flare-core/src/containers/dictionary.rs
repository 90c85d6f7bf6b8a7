//! Identity/content hybrid associative container
//!
//! Object keys are matched by reference, through an index on object
//! identity. String keys are matched by contents, by scanning the entries
//! whose key is a boxed string. The two partitions share one insertion-ordered
//! entry list but never match each other.

use crate::class::{ClassBuilder, ClassRef};
use crate::context::VmContext;
use crate::handle::{ObjectId, ObjectRef};
use crate::object::Backing;
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// Stored dictionary key
#[derive(Clone, Debug)]
pub enum DictKey {
    /// Object matched by reference; the entry owns the handle
    Identity(ObjectRef),
    /// Boxed string matched by contents
    Content(Rc<str>),
}

impl DictKey {
    /// The key as a script value
    pub fn to_value(&self) -> Value {
        match self {
            DictKey::Identity(obj) => Value::Object(obj.clone()),
            DictKey::Content(s) => Value::String(Rc::clone(s)),
        }
    }
}

/// Associative container with identity and content keys
#[derive(Default)]
pub struct Dictionary {
    entries: Vec<(DictKey, Value)>,
    identity: FxHashMap<ObjectId, usize>,
}

impl Dictionary {
    /// Create an empty dictionary
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries across both partitions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store `value` under an object key
    ///
    /// The dictionary takes the key handle. If the object is already present
    /// the stored key stays authoritative, the passed handle is released, and
    /// the previous value is returned.
    pub fn set_identity(&mut self, key: ObjectRef, value: Value) -> Option<Value> {
        match self.identity.get(&key.id()) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.identity.insert(key.id(), self.entries.len());
                self.entries.push((DictKey::Identity(key), value));
                None
            }
        }
    }

    /// Look up an object key
    ///
    /// The search handle is consumed: on a hit the stored key is the one
    /// that stays alive.
    pub fn get_identity(&self, key: ObjectRef) -> Option<Value> {
        self.identity
            .get(&key.id())
            .map(|&i| self.entries[i].1.clone())
    }

    /// Whether an object key is present
    pub fn contains_identity(&self, key: &ObjectRef) -> bool {
        self.identity.contains_key(&key.id())
    }

    /// Remove an object key, handing back the stored key and value
    pub fn delete_identity(&mut self, key: &ObjectRef) -> Option<(DictKey, Value)> {
        let i = *self.identity.get(&key.id())?;
        Some(self.remove_at(i))
    }

    fn content_position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| match k {
            DictKey::Content(s) => &**s == name,
            DictKey::Identity(_) => false,
        })
    }

    /// Store `value` under a string key, returning the previous value
    pub fn set_content(&mut self, name: &str, value: Value) -> Option<Value> {
        match self.content_position(name) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.entries.push((DictKey::Content(Rc::from(name)), value));
                None
            }
        }
    }

    /// Look up a string key by contents
    pub fn get_content(&self, name: &str) -> Option<Value> {
        self.content_position(name)
            .map(|i| self.entries[i].1.clone())
    }

    /// Whether a string key is present
    pub fn contains_content(&self, name: &str) -> bool {
        self.content_position(name).is_some()
    }

    /// Remove a string key, handing back the stored key and value
    pub fn delete_content(&mut self, name: &str) -> Option<(DictKey, Value)> {
        let i = self.content_position(name)?;
        Some(self.remove_at(i))
    }

    fn remove_at(&mut self, i: usize) -> (DictKey, Value) {
        let entry = self.entries.remove(i);
        if let DictKey::Identity(obj) = &entry.0 {
            self.identity.remove(&obj.id());
        }
        for (pos, (k, _)) in self.entries.iter().enumerate().skip(i) {
            if let DictKey::Identity(obj) = k {
                self.identity.insert(obj.id(), pos);
            }
        }
        entry
    }

    /// Key at insertion position `i`
    pub fn key_at(&self, i: usize) -> Option<&DictKey> {
        self.entries.get(i).map(|(k, _)| k)
    }

    /// Value at insertion position `i`
    pub fn value_at(&self, i: usize) -> Option<&Value> {
        self.entries.get(i).map(|(_, v)| v)
    }
}

/// Register `flash.utils::Dictionary`
pub(crate) fn register(cx: &mut VmContext, object_class: &ClassRef) -> ClassRef {
    cx.register_class(
        ClassBuilder::new("Dictionary", "flash.utils")
            .extends(object_class)
            .backing(|| Backing::Dictionary(Dictionary::new())),
    )
}
