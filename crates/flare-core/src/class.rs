//! Class descriptors and trait tables
//!
//! A class is registered once at bootstrap and never changes afterwards. It
//! carries its superclass link, its depth in the hierarchy, an ordered trait
//! table (getters, setters, methods), an optional constructor, and an
//! optional per-instance trait hook run by `install_traits`.

use crate::function::FunctionRef;
use crate::handle::ObjectRef;
use crate::key::QName;
use crate::object::Backing;
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;
use tracing::debug;

/// A declared class member
#[derive(Clone, Default)]
pub struct Trait {
    /// Getter invoked on read
    pub getter: Option<FunctionRef>,
    /// Setter invoked on write
    pub setter: Option<FunctionRef>,
    /// Method or constant slot value
    pub method: Option<Value>,
}

impl Trait {
    /// Whether a read can be served by this trait
    pub fn is_readable(&self) -> bool {
        self.getter.is_some() || self.method.is_some()
    }
}

/// Ordered name -> trait table
#[derive(Clone, Default)]
pub struct TraitTable {
    entries: Vec<(QName, Trait)>,
    index: FxHashMap<QName, usize>,
}

impl TraitTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a trait
    pub fn get(&self, name: &QName) -> Option<&Trait> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    /// Whether a trait with this name exists
    pub fn contains(&self, name: &QName) -> bool {
        self.index.contains_key(name)
    }

    fn entry_mut(&mut self, name: QName) -> &mut Trait {
        let slot = match self.index.get(&name) {
            Some(&i) => i,
            None => {
                self.entries.push((name.clone(), Trait::default()));
                let i = self.entries.len() - 1;
                self.index.insert(name, i);
                i
            }
        };
        &mut self.entries[slot].1
    }

    /// Install or replace a getter
    pub fn define_getter(&mut self, name: QName, getter: FunctionRef) {
        self.entry_mut(name).getter = Some(getter);
    }

    /// Install or replace a setter
    pub fn define_setter(&mut self, name: QName, setter: FunctionRef) {
        self.entry_mut(name).setter = Some(setter);
    }

    /// Install or replace a method slot
    pub fn define_method(&mut self, name: QName, method: Value) {
        self.entry_mut(name).method = Some(method);
    }

    /// Number of traits
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-instance trait hook
pub type BuildTraitsFn = Rc<dyn Fn(&ObjectRef)>;

/// Creates the native backing of a new instance
pub type BackingFactory = fn() -> Backing;

/// Class descriptor
pub struct Class {
    name: QName,
    super_class: Option<ClassRef>,
    depth: u32,
    traits: TraitTable,
    constructor: Option<FunctionRef>,
    build_traits: Option<BuildTraitsFn>,
    backing: Option<BackingFactory>,
}

impl Class {
    /// Qualified class name
    pub fn name(&self) -> &QName {
        &self.name
    }

    /// Superclass, if any
    pub fn super_class(&self) -> Option<&ClassRef> {
        self.super_class.as_ref()
    }

    /// Distance from the root class (0 for roots)
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Statically declared traits of this class only
    pub fn traits(&self) -> &TraitTable {
        &self.traits
    }

    /// Constructor declared by this class
    pub fn constructor(&self) -> Option<&FunctionRef> {
        self.constructor.as_ref()
    }

    /// Per-instance trait hook declared by this class
    pub fn build_traits(&self) -> Option<&BuildTraitsFn> {
        self.build_traits.as_ref()
    }

    /// This class followed by its superclasses, most-derived first
    pub fn ancestors(&self) -> impl Iterator<Item = &Class> {
        std::iter::successors(Some(self), |c| c.super_class.as_deref())
    }

    /// Nearest constructor in the chain
    pub fn find_constructor(&self) -> Option<&FunctionRef> {
        self.ancestors().find_map(|c| c.constructor.as_ref())
    }

    /// Nearest backing factory in the chain
    pub fn backing_factory(&self) -> Option<BackingFactory> {
        self.ancestors().find_map(|c| c.backing)
    }

    /// Find a trait by name, walking from this class to the root
    ///
    /// Each class in the chain is searched in turn; the first trait that
    /// matches `accept` wins.
    pub fn find_trait<F>(&self, name: &QName, accept: F) -> Option<&Trait>
    where
        F: Fn(&Trait) -> bool,
    {
        self.ancestors()
            .filter_map(|c| c.traits.get(name))
            .find(|&t| accept(t))
    }

    /// Whether any class in the chain declares `name`
    pub fn declares(&self, name: &QName) -> bool {
        self.ancestors().any(|c| c.traits.contains(name))
    }

    /// Whether this class is `other` or derives from it
    pub fn is_subclass_of(&self, other: &Class) -> bool {
        self.ancestors().any(|c| std::ptr::eq(c, other))
    }
}

/// Shared handle to a class descriptor
#[derive(Clone)]
pub struct ClassRef(Rc<Class>);

impl ClassRef {
    /// Reference equality
    pub fn ptr_eq(a: &ClassRef, b: &ClassRef) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }
}

impl Deref for ClassRef {
    type Target = Class;

    #[inline]
    fn deref(&self) -> &Class {
        &self.0
    }
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class({}, depth={})", self.name, self.depth)
    }
}

/// Builder collecting a class descriptor before registration
pub struct ClassBuilder {
    name: QName,
    super_class: Option<ClassRef>,
    traits: TraitTable,
    constructor: Option<FunctionRef>,
    build_traits: Option<BuildTraitsFn>,
    backing: Option<BackingFactory>,
}

impl ClassBuilder {
    /// Start a class named `ns::name`
    pub fn new(name: &str, ns: &str) -> Self {
        Self {
            name: QName::new(name, ns),
            super_class: None,
            traits: TraitTable::new(),
            constructor: None,
            build_traits: None,
            backing: None,
        }
    }

    /// Set the superclass
    pub fn extends(mut self, super_class: &ClassRef) -> Self {
        self.super_class = Some(super_class.clone());
        self
    }

    /// Declare a getter trait
    pub fn getter(mut self, name: QName, getter: FunctionRef) -> Self {
        self.traits.define_getter(name, getter);
        self
    }

    /// Declare a setter trait
    pub fn setter(mut self, name: QName, setter: FunctionRef) -> Self {
        self.traits.define_setter(name, setter);
        self
    }

    /// Declare a method trait
    pub fn method(mut self, name: QName, method: FunctionRef) -> Self {
        self.traits.define_method(name, Value::Function(method));
        self
    }

    /// Set the constructor
    pub fn constructor(mut self, constructor: FunctionRef) -> Self {
        self.constructor = Some(constructor);
        self
    }

    /// Set the per-instance trait hook
    pub fn build_traits<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ObjectRef) + 'static,
    {
        self.build_traits = Some(Rc::new(hook));
        self
    }

    /// Set the native backing created for every instance
    pub fn backing(mut self, factory: BackingFactory) -> Self {
        self.backing = Some(factory);
        self
    }
}

/// Registry of bootstrapped classes
#[derive(Default)]
pub struct ClassRegistry {
    by_name: FxHashMap<QName, ClassRef>,
}

impl ClassRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class
    ///
    /// # Panics
    ///
    /// Registering the same qualified name twice is a bootstrap-ordering bug
    /// and aborts.
    pub fn register(&mut self, builder: ClassBuilder) -> ClassRef {
        assert!(
            !self.by_name.contains_key(&builder.name),
            "class {} registered twice",
            builder.name
        );

        let depth = builder.super_class.as_ref().map_or(0, |s| s.depth + 1);
        let class = ClassRef(Rc::new(Class {
            name: builder.name,
            super_class: builder.super_class,
            depth,
            traits: builder.traits,
            constructor: builder.constructor,
            build_traits: builder.build_traits,
            backing: builder.backing,
        }));

        debug!(class = %class.name, depth, traits = class.traits.len(), "registered class");
        self.by_name.insert(class.name.clone(), class.clone());
        class
    }

    /// Look up a class by qualified name
    pub fn get(&self, name: &QName) -> Option<&ClassRef> {
        self.by_name.get(name)
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether no class is registered
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(name: &str, v: i32) -> FunctionRef {
        FunctionRef::native(name, move |_, _, _| Ok(Value::Int(v)))
    }

    #[test]
    fn test_depth_follows_superclass() {
        let mut registry = ClassRegistry::new();
        let root = registry.register(ClassBuilder::new("Root", ""));
        let mid = registry.register(ClassBuilder::new("Mid", "").extends(&root));
        let leaf = registry.register(ClassBuilder::new("Leaf", "").extends(&mid));

        assert_eq!(root.depth(), 0);
        assert_eq!(mid.depth(), 1);
        assert_eq!(leaf.depth(), 2);
        assert!(leaf.is_subclass_of(&root));
        assert!(!root.is_subclass_of(&leaf));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn test_double_registration_is_fatal() {
        let mut registry = ClassRegistry::new();
        registry.register(ClassBuilder::new("Timer", "flash.utils"));
        registry.register(ClassBuilder::new("Timer", "flash.utils"));
    }

    #[test]
    fn test_trait_table_merges_getter_and_setter() {
        let mut table = TraitTable::new();
        let name = QName::public("width");
        table.define_getter(name.clone(), constant("get", 1));
        table.define_setter(name.clone(), constant("set", 2));

        assert_eq!(table.len(), 1);
        let t = table.get(&name).unwrap();
        assert!(t.getter.is_some());
        assert!(t.setter.is_some());
        assert!(t.is_readable());
    }

    #[test]
    fn test_find_trait_prefers_most_derived() {
        let mut registry = ClassRegistry::new();
        let name = QName::public("size");
        let base = registry.register(
            ClassBuilder::new("Base", "").getter(name.clone(), constant("base", 1)),
        );
        let derived = registry.register(
            ClassBuilder::new("Derived", "")
                .extends(&base)
                .getter(name.clone(), constant("derived", 2)),
        );

        let t = derived.find_trait(&name, Trait::is_readable).unwrap();
        assert_eq!(t.getter.as_ref().unwrap().name(), "derived");
        assert!(derived.declares(&name));
    }

    #[test]
    fn test_find_trait_skips_setter_only_override() {
        let mut registry = ClassRegistry::new();
        let name = QName::public("x");
        let base = registry.register(
            ClassBuilder::new("Base", "").getter(name.clone(), constant("base", 1)),
        );
        let derived = registry.register(
            ClassBuilder::new("Derived", "")
                .extends(&base)
                .setter(name.clone(), constant("set", 0)),
        );

        let t = derived.find_trait(&name, Trait::is_readable).unwrap();
        assert_eq!(t.getter.as_ref().unwrap().name(), "base");
    }

    #[test]
    fn test_constructor_inherited() {
        let mut registry = ClassRegistry::new();
        let base = registry.register(
            ClassBuilder::new("Base", "").constructor(constant("ctor", 0)),
        );
        let derived = registry.register(ClassBuilder::new("Derived", "").extends(&base));
        assert_eq!(derived.find_constructor().unwrap().name(), "ctor");
        assert!(derived.constructor().is_none());
    }
}
