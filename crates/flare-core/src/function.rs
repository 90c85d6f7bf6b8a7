//! Callable values
//!
//! Built-ins are native closures receiving the context, the receiver and the
//! argument list. Trait tables and proxy hooks store them as [`FunctionRef`].

use crate::context::VmContext;
use crate::handle::ObjectRef;
use crate::value::Value;
use crate::VmResult;
use std::fmt;
use std::rc::Rc;

/// Native function signature
pub type NativeFn = dyn Fn(&mut VmContext, &ObjectRef, &[Value]) -> VmResult<Value>;

/// A callable
pub struct Function {
    name: Rc<str>,
    body: Box<NativeFn>,
}

impl Function {
    /// Function name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Shared handle to a function
#[derive(Clone)]
pub struct FunctionRef(Rc<Function>);

impl FunctionRef {
    /// Wrap a native closure
    pub fn native<F>(name: &str, body: F) -> Self
    where
        F: Fn(&mut VmContext, &ObjectRef, &[Value]) -> VmResult<Value> + 'static,
    {
        FunctionRef(Rc::new(Function {
            name: Rc::from(name),
            body: Box::new(body),
        }))
    }

    /// Invoke with an explicit receiver
    pub fn call(&self, cx: &mut VmContext, this: &ObjectRef, args: &[Value]) -> VmResult<Value> {
        (self.0.body)(cx, this, args)
    }

    /// Function name
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// Reference equality
    pub fn ptr_eq(a: &FunctionRef, b: &FunctionRef) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    /// Current number of live handles
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function({})", self.name())
    }
}

/// Assert a built-in received at least `min` arguments
///
/// Arity mismatches on built-ins are interpreter bugs, not script errors.
pub fn require_args(name: &str, args: &[Value], min: usize) {
    assert!(
        args.len() >= min,
        "{} expects at least {} argument(s), got {}",
        name,
        min,
        args.len()
    );
}

/// Argument at `index`, or `undefined` when absent
pub fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_call() {
        let mut cx = VmContext::new();
        let this = cx.new_object();
        let add = FunctionRef::native("add", |_, _, args| {
            Ok(Value::Int(args[0].to_int() + args[1].to_int()))
        });
        let result = add.call(&mut cx, &this, &[Value::Int(2), Value::Int(3)]).unwrap();
        assert_eq!(result, Value::Int(5));
        assert_eq!(add.name(), "add");
    }

    #[test]
    #[should_panic(expected = "expects at least 2 argument(s)")]
    fn test_require_args_is_fatal() {
        require_args("f", &[Value::Int(1)], 2);
    }

    #[test]
    fn test_arg_defaults_to_undefined() {
        assert!(arg(&[], 0).is_undefined());
        assert_eq!(arg(&[Value::Int(1)], 0), Value::Int(1));
    }
}
