//! `flash.utils` package-level functions

use crate::context::VmContext;
use crate::function::{arg, require_args, FunctionRef};
use crate::key::{QName, PUBLIC_NS};
use crate::value::Value;
use crate::{VmError, VmResult};

const PACKAGE: &str = "flash.utils";

/// `getQualifiedClassName(value)`
pub fn qualified_class_name(value: &Value) -> Value {
    match value {
        Value::Object(obj) => Value::string(&obj.class().name().to_string()),
        Value::Class(class) => Value::string(&class.name().to_string()),
        other => Value::string(other.type_name()),
    }
}

/// `getQualifiedSuperclassName(value)`
///
/// `null` for root classes and for `null`/`undefined`.
pub fn qualified_superclass_name(value: &Value) -> Value {
    let class = match value {
        Value::Object(obj) => obj.class().clone(),
        Value::Class(class) => class.clone(),
        Value::Undefined | Value::Null => return Value::Null,
        _ => return Value::string("Object"),
    };
    match class.super_class() {
        Some(parent) => Value::string(&parent.name().to_string()),
        None => Value::Null,
    }
}

/// Split `ns::Name` or `a.b.Name` into a qualified name
fn parse_definition_name(name: &str) -> QName {
    if let Some((ns, local)) = name.rsplit_once("::") {
        QName::new(local, ns)
    } else if let Some((ns, local)) = name.rsplit_once('.') {
        QName::new(local, ns)
    } else {
        QName::new(name, PUBLIC_NS)
    }
}

/// `getDefinitionByName(name)`
pub fn definition_by_name(cx: &VmContext, name: &Value) -> VmResult<Value> {
    let raw = name.as_str().ok_or_else(|| {
        VmError::TypeError(format!(
            "getDefinitionByName expects a String, got {}",
            name.type_name()
        ))
    })?;
    let qname = parse_definition_name(raw);
    match cx.global(&qname) {
        Some(class @ Value::Class(_)) => Ok(class),
        Some(other) => Err(VmError::TypeError(format!(
            "{} is a {}, not a class",
            qname,
            other.type_name()
        ))),
        None => Err(VmError::ReferenceError(format!(
            "variable {} is not defined",
            raw
        ))),
    }
}

/// `getTimer()`: milliseconds since the context started
pub fn timer(cx: &VmContext) -> Value {
    let ms = cx.elapsed_ms();
    i32::try_from(ms).map_or(Value::Number(ms as f64), Value::Int)
}

/// Define the package functions as globals
pub(crate) fn install(cx: &mut VmContext) {
    let functions = [
        FunctionRef::native("getQualifiedClassName", |_, _, args| {
            require_args("getQualifiedClassName", args, 1);
            Ok(qualified_class_name(&args[0]))
        }),
        FunctionRef::native("getQualifiedSuperclassName", |_, _, args| {
            require_args("getQualifiedSuperclassName", args, 1);
            Ok(qualified_superclass_name(&args[0]))
        }),
        FunctionRef::native("getDefinitionByName", |cx, _, args| {
            definition_by_name(cx, &arg(args, 0))
        }),
        FunctionRef::native("getTimer", |cx, _, _| Ok(timer(cx))),
    ];
    for f in functions {
        let name = QName::new(f.name(), PACKAGE);
        cx.define_global(name, Value::Function(f));
    }
}
