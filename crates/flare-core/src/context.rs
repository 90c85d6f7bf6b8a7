//! VM context
//!
//! A [`VmContext`] owns everything a script sees as global: the class
//! registry, the global definitions table and the clock behind `getTimer`.
//! The embedder creates it and passes it as `&mut VmContext` into every
//! property operation. Several contexts can coexist; nothing is shared
//! between them.

use crate::class::{ClassBuilder, ClassRef, ClassRegistry};
use crate::containers::{byte_array, dictionary, proxy};
use crate::handle::ObjectRef;
use crate::key::{QName, PUBLIC_NS};
use crate::object::{Backing, PropertyMap};
use crate::utils;
use crate::value::Value;
use crate::VmResult;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::debug;

/// Unique identifier for a VM context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VmContextId(u64);

impl VmContextId {
    /// Create a new unique context ID
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        VmContextId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for VmContextId {
    fn default() -> Self {
        Self::new()
    }
}

/// Execution context of one player instance
pub struct VmContext {
    id: VmContextId,
    classes: ClassRegistry,
    globals: PropertyMap,
    started: Instant,
    object_class: ClassRef,
    byte_array_class: ClassRef,
    dictionary_class: ClassRef,
    proxy_class: ClassRef,
}

impl VmContext {
    /// Create a context with the core classes bootstrapped
    pub fn new() -> Self {
        let mut classes = ClassRegistry::new();
        let object_class = classes.register(ClassBuilder::new("Object", PUBLIC_NS));

        // Container classes are registered through the context below and
        // replace these placeholders.
        let mut cx = VmContext {
            id: VmContextId::new(),
            classes,
            globals: PropertyMap::new(),
            started: Instant::now(),
            byte_array_class: object_class.clone(),
            dictionary_class: object_class.clone(),
            proxy_class: object_class.clone(),
            object_class: object_class.clone(),
        };
        cx.define_global(object_class.name().clone(), Value::Class(object_class.clone()));

        cx.byte_array_class = byte_array::register(&mut cx, &object_class);
        cx.dictionary_class = dictionary::register(&mut cx, &object_class);
        cx.proxy_class = proxy::register(&mut cx, &object_class);
        utils::install(&mut cx);

        debug!(id = cx.id.as_u64(), classes = cx.classes.len(), "context created");
        cx
    }

    /// Context identifier
    pub fn id(&self) -> VmContextId {
        self.id
    }

    /// Class registry
    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    /// Register a class and expose it as a global definition
    ///
    /// # Panics
    ///
    /// Panics if a class with the same qualified name is already registered.
    pub fn register_class(&mut self, builder: ClassBuilder) -> ClassRef {
        let class = self.classes.register(builder);
        self.define_global(class.name().clone(), Value::Class(class.clone()));
        class
    }

    /// Define or replace a global
    pub fn define_global(&mut self, name: QName, value: Value) {
        let old = self.globals.insert(name, value);
        drop(old);
    }

    /// Look up a global definition
    pub fn global(&self, name: &QName) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    /// Global definitions in definition order
    pub fn globals(&self) -> &PropertyMap {
        &self.globals
    }

    /// Create an instance: allocate, install traits, run the constructor
    ///
    /// Traits are installed before the nearest constructor in the chain runs,
    /// so constructors may use accessors bound by `build_traits` hooks. The
    /// returned handle is the only one.
    pub fn construct(&mut self, class: &ClassRef, args: &[Value]) -> VmResult<ObjectRef> {
        let obj = ObjectRef::instantiate(class);
        self.initialize(class, obj, args)
    }

    /// Like [`construct`](Self::construct), with an explicit native backing
    pub fn construct_with(
        &mut self,
        class: &ClassRef,
        backing: Backing,
        args: &[Value],
    ) -> VmResult<ObjectRef> {
        let obj = ObjectRef::instantiate_with(class, backing);
        self.initialize(class, obj, args)
    }

    fn initialize(
        &mut self,
        class: &ClassRef,
        obj: ObjectRef,
        args: &[Value],
    ) -> VmResult<ObjectRef> {
        obj.install_traits();
        if let Some(ctor) = class.find_constructor().cloned() {
            ctor.call(self, &obj, args)?;
        }
        Ok(obj)
    }

    /// Create a plain `Object` instance
    pub fn new_object(&mut self) -> ObjectRef {
        let obj = ObjectRef::instantiate(&self.object_class);
        obj.install_traits();
        obj
    }

    /// Milliseconds since the context was created
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// The root `Object` class
    pub fn object_class(&self) -> &ClassRef {
        &self.object_class
    }

    /// `flash.utils::ByteArray`
    pub fn byte_array_class(&self) -> &ClassRef {
        &self.byte_array_class
    }

    /// `flash.utils::Dictionary`
    pub fn dictionary_class(&self) -> &ClassRef {
        &self.dictionary_class
    }

    /// `flash.utils::Proxy`
    pub fn proxy_class(&self) -> &ClassRef {
        &self.proxy_class
    }
}

impl Default for VmContext {
    fn default() -> Self {
        Self::new()
    }
}
