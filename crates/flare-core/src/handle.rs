//! Reference-counted object handles
//!
//! All object lifetimes follow one contract:
//!
//! - Returning an existing object to a caller hands out a new handle
//!   (`ObjectRef::clone`), which increments the count.
//! - A component that keeps a caller-supplied handle takes it by value. The
//!   caller's binding is moved out and can no longer be used.
//! - Dropping a handle decrements the count.
//! - The object is destroyed exactly once, when the last handle is dropped,
//!   and destroying it drops every handle it owns.
//!
//! `Rc` gives the last two rules for free; the first two are expressed by
//! signatures throughout the crate (`&ObjectRef` to look, `ObjectRef` to keep).

use crate::object::Object;
use std::fmt;
use std::ops::Deref;
use std::rc::{Rc, Weak};

/// Identity of a live object (its address)
///
/// Only meaningful while some handle keeps the object alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(usize);

/// Owning handle to an object instance
#[derive(Clone)]
pub struct ObjectRef(Rc<Object>);

impl ObjectRef {
    pub(crate) fn new(object: Object) -> Self {
        ObjectRef(Rc::new(object))
    }

    /// Current number of live handles
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Reference equality
    #[inline]
    pub fn ptr_eq(a: &ObjectRef, b: &ObjectRef) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    /// Identity of the referenced object
    #[inline]
    pub fn id(&self) -> ObjectId {
        ObjectId(Rc::as_ptr(&self.0) as usize)
    }

    /// Create a non-owning handle
    pub fn downgrade(&self) -> WeakObjectRef {
        WeakObjectRef(Rc::downgrade(&self.0))
    }
}

impl Deref for ObjectRef {
    type Target = Object;

    #[inline]
    fn deref(&self) -> &Object {
        &self.0
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "object({}@{:#x}, rc={})",
            self.class().name(),
            self.id().0,
            self.ref_count()
        )
    }
}

/// Non-owning handle; does not keep the object alive
#[derive(Clone)]
pub struct WeakObjectRef(Weak<Object>);

impl WeakObjectRef {
    /// Retain the object if it is still alive
    pub fn upgrade(&self) -> Option<ObjectRef> {
        self.0.upgrade().map(ObjectRef)
    }

    /// Whether the object has not been destroyed yet
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}
