//! Flare VM object model
//!
//! This crate provides the script-visible object model of the player:
//! - Tagged values and reference-counted object handles
//! - Property key classification (qualified names, indices, identity keys)
//! - Class descriptors and trait tables
//! - Per-instance dynamic property storage and the get/set/delete protocol
//! - Built-in containers (ByteArray, Dictionary, Proxy)
//! - Cursor-based enumeration
//!
//! The object model is single-writer: every operation runs on the thread that
//! owns the [`VmContext`]. Handles are `!Send` so the compiler enforces this.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod class;
pub mod containers;
pub mod context;
pub mod enumerate;
pub mod function;
pub mod handle;
pub mod key;
pub mod object;
pub mod utils;
pub mod value;

pub use class::{Class, ClassBuilder, ClassRef, ClassRegistry, Trait, TraitTable};
pub use containers::{ByteArray, DictKey, Dictionary, ProxyState};
pub use context::{VmContext, VmContextId};
pub use enumerate::{Cursor, Enumerable};
pub use function::{Function, FunctionRef};
pub use handle::{ObjectId, ObjectRef, WeakObjectRef};
pub use key::{classify, classify_value, Key, KeyName, QName};
pub use object::{Backing, Object, PropertyMap};
pub use value::Value;

/// Script-domain errors
///
/// These are recoverable conditions surfaced to the interpreter, which turns
/// them into catchable script errors. Violations of VM invariants are not
/// represented here: they panic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
    /// A value had the wrong dynamic type at a script-visible boundary
    #[error("TypeError: {0}")]
    TypeError(String),

    /// A named definition does not exist
    #[error("ReferenceError: {0}")]
    ReferenceError(String),

    /// Attempt to delete a property backed by a class trait
    #[error("cannot delete trait-backed property {0}")]
    CannotDelete(String),

    /// Operation intentionally left unimplemented
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// A script argument is out of its accepted domain
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result of an object-model operation
pub type VmResult<T> = Result<T, VmError>;
