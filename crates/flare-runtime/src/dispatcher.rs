//! `flash.events::EventDispatcher` and `flash.events::Event`
//!
//! Dispatchers keep their listener list in an [`EventTarget`] host payload.
//! Subclasses that need native state of their own (timers) store it in the
//! target's `state` slot and reach it through [`target_state`].

use flare_core::function::{arg, require_args};
use flare_core::{
    Backing, ClassBuilder, ClassRef, FunctionRef, Key, ObjectRef, QName, Value, VmContext,
    VmError, VmResult,
};
use std::any::Any;
use std::cell::RefMut;
use std::rc::Rc;
use tracing::{trace, warn};

/// Package of the event classes
pub const EVENTS_NS: &str = "flash.events";

/// Listener list plus optional subclass state
#[derive(Default)]
pub struct EventTarget {
    listeners: Vec<(Rc<str>, FunctionRef)>,
    state: Option<Box<dyn Any>>,
}

impl EventTarget {
    /// Target without subclass state
    pub fn new() -> Self {
        Self::default()
    }

    /// Target carrying `state`
    pub fn with_state<T: Any>(state: T) -> Self {
        Self {
            listeners: Vec::new(),
            state: Some(Box::new(state)),
        }
    }

    /// Register a listener; registering the same pair twice has no effect
    pub fn add(&mut self, kind: &str, listener: FunctionRef) {
        let exists = self
            .listeners
            .iter()
            .any(|(k, f)| &**k == kind && FunctionRef::ptr_eq(f, &listener));
        if !exists {
            self.listeners.push((Rc::from(kind), listener));
        }
    }

    /// Unregister a listener, reporting whether it was registered
    pub fn remove(&mut self, kind: &str, listener: &FunctionRef) -> bool {
        let before = self.listeners.len();
        self.listeners
            .retain(|(k, f)| !(&**k == kind && FunctionRef::ptr_eq(f, listener)));
        self.listeners.len() != before
    }

    /// Whether any listener is registered for `kind`
    pub fn has(&self, kind: &str) -> bool {
        self.listeners.iter().any(|(k, _)| &**k == kind)
    }

    /// Listeners for `kind`, in registration order
    pub fn listeners_for(&self, kind: &str) -> Vec<FunctionRef> {
        self.listeners
            .iter()
            .filter(|(k, _)| &**k == kind)
            .map(|(_, f)| f.clone())
            .collect()
    }
}

/// Listener list of a dispatcher
///
/// # Panics
///
/// Panics if `obj` is not an EventDispatcher.
pub fn event_target(obj: &ObjectRef) -> RefMut<'_, EventTarget> {
    obj.host::<EventTarget>()
}

/// Subclass state stored in a dispatcher
///
/// # Panics
///
/// Panics if `obj` is not a dispatcher carrying a `T`.
pub fn target_state<T: Any>(obj: &ObjectRef) -> RefMut<'_, T> {
    let class = obj.class().name().clone();
    RefMut::map(event_target(obj), |target| {
        match target.state.as_mut().and_then(|s| s.downcast_mut::<T>()) {
            Some(state) => state,
            None => panic!(
                "{} instance does not carry {}",
                class,
                std::any::type_name::<T>()
            ),
        }
    })
}

fn listener_arg(name: &str, args: &[Value]) -> VmResult<(Rc<str>, FunctionRef)> {
    require_args(name, args, 2);
    let kind = args[0].to_string_value();
    match &args[1] {
        Value::Function(f) => Ok((kind, f.clone())),
        other => Err(VmError::TypeError(format!(
            "{} expects a Function listener, got {}",
            name,
            other.type_name()
        ))),
    }
}

/// Invoke the listeners of `target` for `kind`
///
/// A fresh `Event` instance carrying `type` and `target` is passed to each
/// listener. A listener that fails is logged and skipped. Returns the number
/// of listeners invoked.
pub fn dispatch(
    cx: &mut VmContext,
    event_class: &ClassRef,
    target: &ObjectRef,
    kind: &str,
) -> VmResult<usize> {
    let listeners = event_target(target).listeners_for(kind);
    if listeners.is_empty() {
        return Ok(0);
    }

    let event = cx.construct(event_class, &[Value::string(kind)])?;
    event.set(cx, Key::public("target"), Value::Object(target.clone()))?;
    for listener in &listeners {
        if let Err(err) = listener.call(cx, target, &[Value::Object(event.clone())]) {
            warn!(event = kind, listener = listener.name(), %err, "event listener failed");
        }
    }
    trace!(event = kind, listeners = listeners.len(), "dispatched");
    Ok(listeners.len())
}

/// Register `flash.events::Event`
pub(crate) fn register_event(cx: &mut VmContext, object_class: &ClassRef) -> ClassRef {
    cx.register_class(
        ClassBuilder::new("Event", EVENTS_NS)
            .extends(object_class)
            .constructor(FunctionRef::native("Event", |cx, this, args| {
                require_args("Event", args, 1);
                let kind = Value::String(args[0].to_string_value());
                this.set(cx, Key::public("type"), kind)?;
                this.set(cx, Key::public("target"), Value::Null)?;
                Ok(Value::Undefined)
            })),
    )
}

/// Register `flash.events::EventDispatcher`
pub(crate) fn register_dispatcher(
    cx: &mut VmContext,
    object_class: &ClassRef,
    event_class: &ClassRef,
) -> ClassRef {
    let dispatch_class = event_class.clone();
    cx.register_class(
        ClassBuilder::new("EventDispatcher", EVENTS_NS)
            .extends(object_class)
            .backing(|| Backing::Host(Box::new(EventTarget::new())))
            .method(
                QName::public("addEventListener"),
                FunctionRef::native("addEventListener", |_, this, args| {
                    let (kind, listener) = listener_arg("addEventListener", args)?;
                    event_target(this).add(&kind, listener);
                    Ok(Value::Undefined)
                }),
            )
            .method(
                QName::public("removeEventListener"),
                FunctionRef::native("removeEventListener", |_, this, args| {
                    let (kind, listener) = listener_arg("removeEventListener", args)?;
                    event_target(this).remove(&kind, &listener);
                    Ok(Value::Undefined)
                }),
            )
            .method(
                QName::public("hasEventListener"),
                FunctionRef::native("hasEventListener", |_, this, args| {
                    require_args("hasEventListener", args, 1);
                    let kind = args[0].to_string_value();
                    Ok(Value::Bool(event_target(this).has(&kind)))
                }),
            )
            .method(
                QName::public("dispatchEvent"),
                FunctionRef::native("dispatchEvent", move |cx, this, args| {
                    let kind = match arg(args, 0) {
                        Value::Object(event) => event
                            .get(cx, Key::public("type"))?
                            .map(|v| v.to_string_value()),
                        _ => None,
                    };
                    let kind = kind.ok_or_else(|| {
                        VmError::TypeError("dispatchEvent expects an Event".to_string())
                    })?;
                    let invoked = dispatch(cx, &dispatch_class, this, &kind)?;
                    Ok(Value::Bool(invoked > 0))
                }),
            ),
    )
}
