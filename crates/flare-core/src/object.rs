//! Object instances and the property access protocol
//!
//! An instance layers a dynamic property map over the trait tables of its
//! class chain. Every access carries a classified [`Key`]:
//!
//! - qualified keys search the dynamic slots, then per-instance bound traits,
//!   then the class chain from most-derived to root;
//! - index keys go to the instance's native backing (ByteArray, Dictionary)
//!   and abort on instances that are not indexable;
//! - identity keys are only understood by Dictionary backings.
//!
//! Values handed back to the caller are fresh handles; the caller releases
//! them by dropping.

use crate::class::{ClassRef, Trait, TraitTable};
use crate::containers::{proxy, ByteArray, Dictionary, ProxyState};
use crate::context::VmContext;
use crate::function::FunctionRef;
use crate::handle::ObjectRef;
use crate::key::{Key, KeyName, QName};
use crate::value::Value;
use crate::{VmError, VmResult};
use rustc_hash::FxHashMap;
use std::any::Any;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;
use tracing::{trace, warn};

/// Native storage behind an instance
pub enum Backing {
    /// Dynamic slots only
    Plain,
    /// Raw byte buffer, index-addressable
    ByteArray(ByteArray),
    /// Identity/content associative container
    Dictionary(Dictionary),
    /// Property interception state
    Proxy(ProxyState),
    /// Host-defined payload (timers, media objects, ...)
    Host(Box<dyn Any>),
}

impl Backing {
    /// Short name for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Backing::Plain => "plain",
            Backing::ByteArray(_) => "ByteArray",
            Backing::Dictionary(_) => "Dictionary",
            Backing::Proxy(_) => "Proxy",
            Backing::Host(_) => "host",
        }
    }
}

/// Insertion-ordered dynamic property map
#[derive(Default)]
pub struct PropertyMap {
    entries: Vec<(QName, Value)>,
    index: FxHashMap<QName, usize>,
}

impl PropertyMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a slot
    pub fn get(&self, name: &QName) -> Option<&Value> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    /// Whether a slot exists
    pub fn contains(&self, name: &QName) -> bool {
        self.index.contains_key(name)
    }

    /// Write a slot, returning the previous value
    ///
    /// Overwriting keeps the slot's original position.
    pub fn insert(&mut self, name: QName, value: Value) -> Option<Value> {
        match self.index.get(&name) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, value));
                None
            }
        }
    }

    /// Remove a slot, returning its value
    pub fn remove(&mut self, name: &QName) -> Option<Value> {
        let i = self.index.remove(name)?;
        let (_, value) = self.entries.remove(i);
        for (pos, (n, _)) in self.entries.iter().enumerate().skip(i) {
            self.index.insert(n.clone(), pos);
        }
        Some(value)
    }

    /// Slot at insertion position `i`
    pub fn entry_at(&self, i: usize) -> Option<(&QName, &Value)> {
        self.entries.get(i).map(|(n, v)| (n, v))
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Object instance
pub struct Object {
    class: ClassRef,
    slots: RefCell<PropertyMap>,
    bound_traits: RefCell<TraitTable>,
    traits_installed: Cell<bool>,
    backing: RefCell<Backing>,
}

impl Object {
    /// Class of this instance
    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    /// Dynamic slots
    pub fn slots(&self) -> Ref<'_, PropertyMap> {
        self.slots.borrow()
    }

    /// Native backing
    pub fn backing(&self) -> Ref<'_, Backing> {
        self.backing.borrow()
    }

    /// Whether `install_traits` already ran
    pub fn traits_installed(&self) -> bool {
        self.traits_installed.get()
    }

    /// Whether the instance is index-addressable
    pub fn is_indexable(&self) -> bool {
        matches!(
            *self.backing.borrow(),
            Backing::ByteArray(_) | Backing::Dictionary(_)
        )
    }

    /// ByteArray backing
    ///
    /// # Panics
    ///
    /// Panics if the instance is not a ByteArray.
    pub fn byte_array(&self) -> RefMut<'_, ByteArray> {
        RefMut::map(self.backing.borrow_mut(), |b| match b {
            Backing::ByteArray(ba) => ba,
            other => panic!("expected ByteArray, found {} instance", other.kind()),
        })
    }

    /// ByteArray backing, if any
    pub fn try_byte_array(&self) -> Option<RefMut<'_, ByteArray>> {
        RefMut::filter_map(self.backing.borrow_mut(), |b| match b {
            Backing::ByteArray(ba) => Some(ba),
            _ => None,
        })
        .ok()
    }

    /// Dictionary backing
    ///
    /// # Panics
    ///
    /// Panics if the instance is not a Dictionary.
    pub fn dictionary(&self) -> RefMut<'_, Dictionary> {
        RefMut::map(self.backing.borrow_mut(), |b| match b {
            Backing::Dictionary(d) => d,
            other => panic!("expected Dictionary, found {} instance", other.kind()),
        })
    }

    /// Proxy state, if this instance intercepts property access
    pub fn proxy_state(&self) -> Option<ProxyState> {
        match &*self.backing.borrow() {
            Backing::Proxy(state) => Some(state.clone()),
            _ => None,
        }
    }

    /// Host payload of type `T`
    ///
    /// # Panics
    ///
    /// Panics if the instance has no host payload of that type.
    pub fn host<T: Any>(&self) -> RefMut<'_, T> {
        let class = self.class.name().clone();
        RefMut::map(self.backing.borrow_mut(), |b| match b {
            Backing::Host(data) => match data.downcast_mut::<T>() {
                Some(data) => data,
                None => panic!(
                    "{} instance does not carry {}",
                    class,
                    std::any::type_name::<T>()
                ),
            },
            other => panic!("{} instance is {}, not a host object", class, other.kind()),
        })
    }

    /// Host payload of type `T`, if present
    pub fn try_host<T: Any>(&self) -> Option<RefMut<'_, T>> {
        RefMut::filter_map(self.backing.borrow_mut(), |b| match b {
            Backing::Host(data) => data.downcast_mut::<T>(),
            _ => None,
        })
        .ok()
    }

    /// Readable trait for `name`: bound traits first, then the class chain
    fn readable_trait(&self, name: &QName) -> Option<Trait> {
        let bound = self.bound_traits.borrow();
        if let Some(t) = bound.get(name).filter(|t| t.is_readable()) {
            return Some(t.clone());
        }
        drop(bound);
        self.class.find_trait(name, Trait::is_readable).cloned()
    }

    fn find_setter(&self, name: &QName) -> Option<FunctionRef> {
        let bound = self.bound_traits.borrow();
        if let Some(setter) = bound.get(name).and_then(|t| t.setter.clone()) {
            return Some(setter);
        }
        drop(bound);
        self.class
            .find_trait(name, |t| t.setter.is_some())
            .and_then(|t| t.setter.clone())
    }

    fn has_trait(&self, name: &QName) -> bool {
        self.bound_traits.borrow().contains(name) || self.class.declares(name)
    }
}

impl Drop for Object {
    fn drop(&mut self) {
        trace!(class = %self.class.name(), "object destroyed");
    }
}

/// Value stored when writing into a byte slot
fn to_byte(value: &Value) -> u8 {
    if value.is_undefined() {
        0
    } else {
        value.to_int() as u8
    }
}

impl ObjectRef {
    /// Allocate an instance without running its constructor or trait hooks
    pub fn instantiate(class: &ClassRef) -> ObjectRef {
        let backing = class.backing_factory().map_or(Backing::Plain, |factory| factory());
        Self::instantiate_with(class, backing)
    }

    /// Allocate an instance around an explicit backing
    ///
    /// Used for host objects whose payload is produced outside the VM.
    pub fn instantiate_with(class: &ClassRef, backing: Backing) -> ObjectRef {
        ObjectRef::new(Object {
            class: class.clone(),
            slots: RefCell::new(PropertyMap::new()),
            bound_traits: RefCell::new(TraitTable::new()),
            traits_installed: Cell::new(false),
            backing: RefCell::new(backing),
        })
    }

    /// Run the per-instance trait hooks of the class chain, root first
    ///
    /// Dynamic slots already present (for example written by a constructor
    /// that ran first) are left untouched. A second call is a no-op.
    pub fn install_traits(&self) {
        if self.traits_installed.replace(true) {
            warn!(class = %self.class.name(), "traits already installed");
            return;
        }
        let hooks: Vec<_> = self
            .class
            .ancestors()
            .filter_map(|c| c.build_traits().cloned())
            .collect();
        for hook in hooks.iter().rev() {
            hook(self);
        }
        trace!(class = %self.class.name(), hooks = hooks.len(), "traits installed");
    }

    /// Bind a getter on this instance only
    pub fn bind_getter(&self, name: QName, getter: FunctionRef) {
        self.bound_traits.borrow_mut().define_getter(name, getter);
    }

    /// Bind a setter on this instance only
    pub fn bind_setter(&self, name: QName, setter: FunctionRef) {
        self.bound_traits.borrow_mut().define_setter(name, setter);
    }

    /// Bind a method on this instance only
    pub fn bind_method(&self, name: QName, method: FunctionRef) {
        self.bound_traits
            .borrow_mut()
            .define_method(name, Value::Function(method));
    }

    /// Split a key for resolution
    ///
    /// Dictionaries and proxies address an index key by its source text, so
    /// the index turns back into a qualified name there. `"007"` and `"7"`
    /// stay distinct.
    fn resolve_parts(&self, key: Key) -> (Rc<str>, KeyName) {
        let spelling = key.index_spelling();
        let (ns, name) = key.into_parts();
        let by_text = matches!(
            &*self.backing.borrow(),
            Backing::Dictionary(_) | Backing::Proxy(_)
        );
        match (name, spelling) {
            (KeyName::Index(_), Some(text)) if by_text => (ns, KeyName::Qualified(text)),
            (name, _) => (ns, name),
        }
    }

    /// Read a property
    ///
    /// Returns `Ok(None)` when nothing answers to the key, which is distinct
    /// from a property holding `undefined`.
    ///
    /// # Panics
    ///
    /// Index keys on an instance that is not indexable, and reads at or past
    /// the end of a ByteArray, abort.
    pub fn get(&self, cx: &mut VmContext, key: Key) -> VmResult<Option<Value>> {
        if let Some(value) = proxy::intercept_get(self, cx, &key)? {
            return Ok(Some(value));
        }

        let (ns, name) = self.resolve_parts(key);
        match name {
            KeyName::Qualified(local) => {
                let content = match &*self.backing.borrow() {
                    Backing::Dictionary(d) => d.get_content(&local),
                    _ => None,
                };
                if content.is_some() {
                    return Ok(content);
                }
                self.get_default(cx, &QName { ns, name: local })
            }
            KeyName::Index(i) => match &*self.backing.borrow() {
                Backing::ByteArray(ba) => Ok(Some(Value::Int(i32::from(ba.get(i as usize))))),
                _ => panic!("{} instance is not indexable", self.class.name()),
            },
            KeyName::Identity(obj) => match &*self.backing.borrow() {
                Backing::Dictionary(d) => Ok(d.get_identity(obj)),
                Backing::Proxy(_) => Ok(None),
                _ => Err(VmError::TypeError(format!(
                    "{} does not support object keys",
                    self.class.name()
                ))),
            },
        }
    }

    /// Qualified lookup without interception: dynamic slots, then traits
    pub fn get_default(&self, cx: &mut VmContext, name: &QName) -> VmResult<Option<Value>> {
        let slot = self.slots.borrow().get(name).cloned();
        if slot.is_some() {
            return Ok(slot);
        }

        match self.readable_trait(name) {
            Some(Trait {
                getter: Some(getter),
                ..
            }) => getter.call(cx, self, &[]).map(Some),
            Some(t) => Ok(t.method),
            None => Ok(None),
        }
    }

    /// Write a property
    ///
    /// # Panics
    ///
    /// Index keys on an instance that is not indexable, and writes past the
    /// end of a fixed-length ByteArray, abort.
    pub fn set(&self, cx: &mut VmContext, key: Key, value: Value) -> VmResult<()> {
        if self.proxy_state().is_some() && !self.has_property(&key) {
            trace!(class = %self.class.name(), key = %key, "proxy set adds a property");
        }
        let (ns, name) = self.resolve_parts(key);
        let replaced = match name {
            KeyName::Qualified(local) => {
                if let Backing::Dictionary(d) = &mut *self.backing.borrow_mut() {
                    let old = d.set_content(&local, value);
                    drop(old);
                    return Ok(());
                }
                let qname = QName { ns, name: local };
                if let Some(setter) = self.find_setter(&qname) {
                    setter.call(cx, self, &[value])?;
                    return Ok(());
                }
                let old = self.slots.borrow_mut().insert(qname, value);
                old
            }
            KeyName::Index(i) => match &mut *self.backing.borrow_mut() {
                Backing::ByteArray(ba) => {
                    ba.set(i as usize, to_byte(&value));
                    None
                }
                _ => panic!("{} instance is not indexable", self.class.name()),
            },
            KeyName::Identity(obj) => match &mut *self.backing.borrow_mut() {
                Backing::Dictionary(d) => d.set_identity(obj, value),
                _ => {
                    return Err(VmError::TypeError(format!(
                        "{} does not support object keys",
                        self.class.name()
                    )))
                }
            },
        };
        drop(replaced);
        Ok(())
    }

    /// Delete a property, reporting whether an entry existed
    ///
    /// Trait-backed properties cannot be deleted.
    pub fn delete(&self, _cx: &mut VmContext, key: Key) -> VmResult<bool> {
        let (ns, name) = self.resolve_parts(key);
        match name {
            KeyName::Qualified(local) => {
                let removed = match &mut *self.backing.borrow_mut() {
                    Backing::Dictionary(d) => d.delete_content(&local),
                    _ => None,
                };
                if removed.is_some() {
                    return Ok(true);
                }
                let qname = QName { ns, name: local };
                let removed = self.slots.borrow_mut().remove(&qname);
                if removed.is_some() {
                    return Ok(true);
                }
                if self.has_trait(&qname) {
                    return Err(VmError::CannotDelete(qname.to_string()));
                }
                Ok(false)
            }
            KeyName::Index(i) => {
                let removed: Option<(crate::containers::dictionary::DictKey, Value)> = match &mut *self.backing.borrow_mut() {
                    Backing::ByteArray(_) => None,
                    _ => panic!("{} instance is not indexable", self.class.name()),
                };
                Ok(removed.is_some())
            }
            KeyName::Identity(obj) => {
                let removed = match &mut *self.backing.borrow_mut() {
                    Backing::Dictionary(d) => d.delete_identity(&obj),
                    _ => {
                        return Err(VmError::TypeError(format!(
                            "{} does not support object keys",
                            self.class.name()
                        )))
                    }
                };
                Ok(removed.is_some())
            }
        }
    }

    /// Whether something answers to `key`, without invoking getters
    pub fn has_property(&self, key: &Key) -> bool {
        if let Some(text) = key.index_spelling() {
            if !matches!(&*self.backing.borrow(), Backing::ByteArray(_)) {
                return self.has_property(&Key::qualified(&text, key.ns()));
            }
        }
        match key.name() {
            KeyName::Qualified(local) => {
                if let Backing::Dictionary(d) = &*self.backing.borrow() {
                    if d.contains_content(local) {
                        return true;
                    }
                }
                key.qname()
                    .map_or(false, |q| self.slots.borrow().contains(&q) || self.has_trait(&q))
            }
            KeyName::Index(i) => match &*self.backing.borrow() {
                Backing::ByteArray(ba) => (*i as usize) < ba.len(),
                _ => false,
            },
            KeyName::Identity(obj) => match &*self.backing.borrow() {
                Backing::Dictionary(d) => d.contains_identity(obj),
                _ => false,
            },
        }
    }

    /// Look up `name` and call it with this object as receiver
    pub fn call_method(&self, cx: &mut VmContext, name: &QName, args: &[Value]) -> VmResult<Value> {
        match self.get_default(cx, name)? {
            Some(Value::Function(f)) => f.call(cx, self, args),
            Some(other) => Err(VmError::TypeError(format!(
                "{} is not a function (found {})",
                name,
                other.type_name()
            ))),
            None => Err(VmError::ReferenceError(format!(
                "{} not found on {}",
                name,
                self.class.name()
            ))),
        }
    }
}
