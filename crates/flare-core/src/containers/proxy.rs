//! Property interception for `flash.utils::Proxy` subclasses
//!
//! A proxy instance routes reads through a `flash_proxy::getProperty`
//! override when one is defined. The override receives the key's local name
//! as a plain string: the namespace of the original access is not passed on.
//!
//! While the override runs, a per-instance guard is set so that property
//! reads the override performs on its own receiver take the default path
//! instead of recursing. Writes are never intercepted.

use crate::class::{ClassBuilder, ClassRef};
use crate::context::VmContext;
use crate::handle::ObjectRef;
use crate::key::{Key, QName, FLASH_PROXY_NS};
use crate::object::Backing;
use crate::value::Value;
use crate::{VmError, VmResult};
use std::cell::Cell;
use std::rc::Rc;
use tracing::trace;

/// Reentrancy guard of one proxy instance
#[derive(Clone, Debug, Default)]
pub struct ProxyState {
    active: Rc<Cell<bool>>,
}

impl ProxyState {
    /// Fresh state with the guard clear
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an override call is in progress on this instance
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    fn enter(&self) -> ActiveGuard {
        self.active.set(true);
        ActiveGuard {
            active: Rc::clone(&self.active),
        }
    }
}

/// Clears the guard when the override call returns, errors or unwinds
struct ActiveGuard {
    active: Rc<Cell<bool>>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.set(false);
    }
}

/// Name of the read override
pub fn get_property_name() -> QName {
    QName::new("getProperty", FLASH_PROXY_NS)
}

/// Give a proxy's override the first chance at a read
///
/// Returns `Ok(None)` ("not handled") when `this` is not a proxy, when the
/// guard is already set, or when no override is defined.
pub fn intercept_get(
    this: &ObjectRef,
    cx: &mut VmContext,
    key: &Key,
) -> VmResult<Option<Value>> {
    let state = match this.proxy_state() {
        Some(state) if !state.is_active() => state,
        _ => return Ok(None),
    };

    let hook = match this.get_default(cx, &get_property_name())? {
        Some(Value::Function(f)) => f,
        Some(other) => {
            return Err(VmError::TypeError(format!(
                "flash_proxy::getProperty must be a function, found {}",
                other.type_name()
            )))
        }
        None => return Ok(None),
    };

    let name = key.local_name();
    trace!(class = %this.class().name(), name = %name, "proxy getProperty");
    let _guard = state.enter();
    hook.call(cx, this, &[Value::String(name)]).map(Some)
}

/// Register `flash.utils::Proxy`
pub(crate) fn register(cx: &mut VmContext, object_class: &ClassRef) -> ClassRef {
    cx.register_class(
        ClassBuilder::new("Proxy", "flash.utils")
            .extends(object_class)
            .backing(|| Backing::Proxy(ProxyState::new())),
    )
}
