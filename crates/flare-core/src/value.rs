//! Script-visible value representation
//!
//! Every value the interpreter handles is one of a closed set of variants.
//! Primitive variants are stored inline; strings are boxed and shared;
//! objects, functions and classes are reference-counted handles, so cloning
//! a `Value` retains and dropping it releases.

use crate::class::ClassRef;
use crate::function::FunctionRef;
use crate::handle::ObjectRef;
use std::fmt;
use std::rc::Rc;

/// Tagged script value
#[derive(Clone, Default)]
pub enum Value {
    /// `undefined`
    #[default]
    Undefined,
    /// `null`
    Null,
    /// Boolean
    Bool(bool),
    /// 32-bit integer (`int`)
    Int(i32),
    /// IEEE double (`Number`)
    Number(f64),
    /// Boxed, immutable string
    String(Rc<str>),
    /// Object instance handle
    Object(ObjectRef),
    /// Callable
    Function(FunctionRef),
    /// Class object
    Class(ClassRef),
}

impl Value {
    /// Box a string
    pub fn string(s: &str) -> Self {
        Value::String(Rc::from(s))
    }

    /// Check for `undefined`
    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Check for `null`
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the object handle, if this is an object
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Borrow the function handle, if this is a function
    pub fn as_function(&self) -> Option<&FunctionRef> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Borrow the class handle, if this is a class
    pub fn as_class(&self) -> Option<&ClassRef> {
        match self {
            Value::Class(c) => Some(c),
            _ => None,
        }
    }

    /// Borrow the string contents, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric conversion (`ToNumber`)
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Int(i) => f64::from(*i),
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            Value::Object(_) | Value::Function(_) | Value::Class(_) => f64::NAN,
        }
    }

    /// Integer conversion (`ToInt32`)
    ///
    /// Non-finite numbers convert to 0; finite ones are truncated and wrapped
    /// modulo 2^32.
    pub fn to_int(&self) -> i32 {
        if let Value::Int(i) = self {
            return *i;
        }
        let n = self.to_number();
        if !n.is_finite() {
            return 0;
        }
        let wrapped = n.trunc().rem_euclid(4_294_967_296.0);
        wrapped as u32 as i32
    }

    /// String conversion (`ToString`)
    pub fn to_string_value(&self) -> Rc<str> {
        match self {
            Value::String(s) => Rc::clone(s),
            other => Rc::from(other.to_string()),
        }
    }

    /// Strict equality (`===`)
    ///
    /// Strings compare by contents; objects, functions and classes compare by
    /// identity.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(a), Value::Number(b)) | (Value::Number(b), Value::Int(a)) => {
                f64::from(*a) == *b
            }
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => ObjectRef::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => FunctionRef::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => ClassRef::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "void",
            Value::Null => "null",
            Value::Bool(_) => "Boolean",
            Value::Int(_) => "int",
            Value::Number(_) => "Number",
            Value::String(_) => "String",
            Value::Object(_) => "Object",
            Value::Function(_) => "Function",
            Value::Class(_) => "Class",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "bool({})", b),
            Value::Int(i) => write!(f, "int({})", i),
            Value::Number(n) => write!(f, "number({})", n),
            Value::String(s) => write!(f, "string({:?})", s),
            Value::Object(obj) => write!(f, "{:?}", obj),
            Value::Function(func) => write!(f, "{:?}", func),
            Value::Class(class) => write!(f, "{:?}", class),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Number(n) => {
                if n.is_nan() {
                    write!(f, "NaN")
                } else if n.is_infinite() {
                    write!(f, "{}Infinity", if *n < 0.0 { "-" } else { "" })
                } else if n.fract() == 0.0 && n.abs() < 1e21 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{}", s),
            Value::Object(obj) => write!(f, "[object {}]", obj.class().name().name),
            Value::Function(_) => write!(f, "function Function() {{}}"),
            Value::Class(class) => write!(f, "[class {}]", class.name().name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_int_truncates_and_wraps() {
        assert_eq!(Value::Number(3.9).to_int(), 3);
        assert_eq!(Value::Number(-3.9).to_int(), -3);
        assert_eq!(Value::Number(4_294_967_297.0).to_int(), 1);
        assert_eq!(Value::Number(2_147_483_648.0).to_int(), i32::MIN);
        assert_eq!(Value::Number(f64::NAN).to_int(), 0);
        assert_eq!(Value::Number(f64::INFINITY).to_int(), 0);
    }

    #[test]
    fn test_to_int_coercions() {
        assert_eq!(Value::Undefined.to_int(), 0);
        assert_eq!(Value::Null.to_int(), 0);
        assert_eq!(Value::Bool(true).to_int(), 1);
        assert_eq!(Value::string(" 42 ").to_int(), 42);
        assert_eq!(Value::string("4x").to_int(), 0);
        assert_eq!(Value::string("").to_int(), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Undefined.to_string(), "undefined");
        assert_eq!(Value::Number(5.0).to_string(), "5");
        assert_eq!(Value::Number(0.5).to_string(), "0.5");
        assert_eq!(Value::Number(f64::NEG_INFINITY).to_string(), "-Infinity");
        assert_eq!(Value::Int(-7).to_string(), "-7");
        assert_eq!(&*Value::Bool(false).to_string_value(), "false");
    }

    #[test]
    fn test_strict_equality() {
        assert_eq!(Value::string("abc"), Value::string("abc"));
        assert_eq!(Value::Int(2), Value::Number(2.0));
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        assert_ne!(Value::Null, Value::Undefined);
        assert_ne!(Value::Int(0), Value::Bool(false));
    }

    #[test]
    fn test_default_is_undefined() {
        assert!(Value::default().is_undefined());
    }
}
