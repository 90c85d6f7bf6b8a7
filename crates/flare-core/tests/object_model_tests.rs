//! Integration tests for the property protocol
//!
//! Tests cover:
//! - Qualified get/set round trips through slots and traits
//! - ByteArray growth and bounds
//! - Dictionary identity vs content keys and enumeration order
//! - Proxy interception and its reentrancy guard
//! - `has_property` for every key kind

use flare_core::containers::proxy::{get_property_name, intercept_get};
use flare_core::{
    classify, classify_value, ClassBuilder, Cursor, Enumerable, FunctionRef, Key, QName, Value,
    VmContext, VmError,
};
use std::cell::Cell;
use std::rc::Rc;

#[test]
fn test_qualified_round_trip_across_namespaces() {
    let mut cx = VmContext::new();
    let obj = cx.new_object();

    for (name, ns, v) in [("a", "", 1), ("a", "flash.display", 2), ("long_name", "x.y", 3)] {
        obj.set(&mut cx, classify(name, ns), Value::Int(v)).unwrap();
    }
    assert_eq!(obj.get(&mut cx, classify("a", "")).unwrap(), Some(Value::Int(1)));
    assert_eq!(obj.get(&mut cx, classify("a", "flash.display")).unwrap(), Some(Value::Int(2)));
    assert_eq!(obj.get(&mut cx, classify("long_name", "x.y")).unwrap(), Some(Value::Int(3)));
}

#[test]
fn test_getter_on_superclass_serves_subclass_instances() {
    let mut cx = VmContext::new();
    let object = cx.object_class().clone();
    let shape = cx.register_class(
        ClassBuilder::new("Shape", "test")
            .extends(&object)
            .getter(
                QName::public("sides"),
                FunctionRef::native("sides", |_, _, _| Ok(Value::Int(0))),
            ),
    );
    let square = cx.register_class(
        ClassBuilder::new("Square", "test")
            .extends(&shape)
            .getter(
                QName::public("sides"),
                FunctionRef::native("sides", |_, _, _| Ok(Value::Int(4))),
            ),
    );
    let blob = cx.register_class(ClassBuilder::new("Blob", "test").extends(&shape));

    let sq = cx.construct(&square, &[]).unwrap();
    let bl = cx.construct(&blob, &[]).unwrap();
    assert_eq!(square.depth(), 2);
    assert_eq!(sq.get(&mut cx, Key::public("sides")).unwrap(), Some(Value::Int(4)));
    assert_eq!(bl.get(&mut cx, Key::public("sides")).unwrap(), Some(Value::Int(0)));
}

#[test]
fn test_byte_array_growth_preserves_prefix() {
    let mut cx = VmContext::new();
    let class = cx.byte_array_class().clone();
    let ba = cx.construct(&class, &[]).unwrap();
    for (i, b) in [10, 20, 30].iter().enumerate() {
        ba.set(&mut cx, Key::index(i as u32), Value::Int(*b)).unwrap();
    }

    ba.set(&mut cx, classify("7", ""), Value::Int(0x1ff)).unwrap();
    assert_eq!(ba.byte_array().as_slice(), &[10, 20, 30, 0, 0, 0, 0, 0xff]);
    assert_eq!(ba.get(&mut cx, Key::public("length")).unwrap(), Some(Value::Int(8)));

    ba.set(&mut cx, Key::index(1), Value::Undefined).unwrap();
    assert_eq!(ba.get(&mut cx, Key::index(1)).unwrap(), Some(Value::Int(0)));
}

#[test]
fn test_byte_array_read_does_not_mutate() {
    let mut cx = VmContext::new();
    let class = cx.byte_array_class().clone();
    let ba = cx.construct(&class, &[]).unwrap();
    ba.byte_array().adopt_buffer(vec![1, 2, 3]);

    for _ in 0..3 {
        assert_eq!(ba.get(&mut cx, Key::index(2)).unwrap(), Some(Value::Int(3)));
    }
    assert_eq!(ba.byte_array().len(), 3);
    assert_eq!(ba.byte_array().position(), 0);
}

#[test]
#[should_panic(expected = "out of range")]
fn test_byte_array_read_at_length_is_fatal() {
    let mut cx = VmContext::new();
    let class = cx.byte_array_class().clone();
    let ba = cx.construct(&class, &[]).unwrap();
    ba.byte_array().adopt_buffer(vec![1, 2, 3]);
    let _ = ba.get(&mut cx, Key::index(3));
}

#[test]
fn test_read_bytes_through_script_surface() {
    let mut cx = VmContext::new();
    let class = cx.byte_array_class().clone();
    let src = cx.construct(&class, &[]).unwrap();
    let dest = cx.construct(&class, &[]).unwrap();
    src.byte_array().adopt_buffer(vec![5, 6, 7, 8]);
    src.set(&mut cx, Key::public("position"), Value::Int(1)).unwrap();

    src.call_method(
        &mut cx,
        &QName::public("readBytes"),
        &[Value::Object(dest.clone()), Value::Int(0), Value::Int(2)],
    )
    .unwrap();

    assert_eq!(dest.byte_array().as_slice(), &[6, 7]);
    assert_eq!(src.get(&mut cx, Key::public("bytesAvailable")).unwrap(), Some(Value::Int(1)));

    let err = src
        .call_method(
            &mut cx,
            &QName::public("readBytes"),
            &[Value::Int(0), Value::Int(0), Value::Int(1)],
        )
        .unwrap_err();
    assert!(matches!(err, VmError::TypeError(_)));
}

#[test]
fn test_dictionary_identity_not_structure() {
    let mut cx = VmContext::new();
    let class = cx.dictionary_class().clone();
    let dict = cx.construct(&class, &[]).unwrap();
    let a = cx.new_object();
    let b = cx.new_object();
    a.set(&mut cx, Key::public("same"), Value::Int(1)).unwrap();
    b.set(&mut cx, Key::public("same"), Value::Int(1)).unwrap();

    dict.set(&mut cx, classify_value(Value::Object(a.clone()), ""), Value::string("for a"))
        .unwrap();

    assert_eq!(
        dict.get(&mut cx, Key::identity(a.clone())).unwrap(),
        Some(Value::string("for a"))
    );
    assert_eq!(dict.get(&mut cx, Key::identity(b.clone())).unwrap(), None);
}

#[test]
fn test_dictionary_content_keys_compare_by_characters() {
    let mut cx = VmContext::new();
    let class = cx.dictionary_class().clone();
    let dict = cx.construct(&class, &[]).unwrap();

    let stored = String::from("key");
    dict.set(&mut cx, Key::public(&stored), Value::string("x")).unwrap();
    let fresh: String = ['k', 'e', 'y'].iter().collect();
    assert_eq!(dict.get(&mut cx, Key::public(&fresh)).unwrap(), Some(Value::string("x")));
}

#[test]
fn test_dictionary_index_keys_use_decimal_spelling() {
    let mut cx = VmContext::new();
    let class = cx.dictionary_class().clone();
    let dict = cx.construct(&class, &[]).unwrap();

    dict.set(&mut cx, Key::index(12), Value::Bool(true)).unwrap();
    assert_eq!(dict.get(&mut cx, Key::public("12")).unwrap(), Some(Value::Bool(true)));
    assert!(dict.delete(&mut cx, classify("12", "")).unwrap());
    assert!(!dict.delete(&mut cx, Key::index(12)).unwrap());
}

#[test]
fn test_dictionary_keeps_numeric_key_spelling() {
    let mut cx = VmContext::new();
    let class = cx.dictionary_class().clone();
    let dict = cx.construct(&class, &[]).unwrap();

    dict.set(&mut cx, classify("007", ""), Value::string("bond")).unwrap();
    dict.set(&mut cx, classify("7", ""), Value::string("seven")).unwrap();
    assert_eq!(dict.enum_len(), 2);
    assert_eq!(dict.get(&mut cx, classify("007", "")).unwrap(), Some(Value::string("bond")));
    assert_eq!(dict.get(&mut cx, Key::index(7)).unwrap(), Some(Value::string("seven")));

    let names: Vec<_> = (0..dict.enum_len()).map(|i| dict.next_name(Cursor::at(i))).collect();
    assert_eq!(names, [Value::string("007"), Value::string("7")]);

    assert!(dict.delete(&mut cx, classify("007", "")).unwrap());
    assert_eq!(dict.get(&mut cx, Key::index(7)).unwrap(), Some(Value::string("seven")));
}

#[test]
fn test_dictionary_enumerates_in_insertion_order() {
    let mut cx = VmContext::new();
    let class = cx.dictionary_class().clone();
    let dict = cx.construct(&class, &[]).unwrap();
    let k2 = cx.new_object();

    dict.set(&mut cx, Key::public("k1"), Value::Int(1)).unwrap();
    dict.set(&mut cx, Key::identity(k2.clone()), Value::Int(2)).unwrap();
    dict.set(&mut cx, Key::public("k3"), Value::Int(3)).unwrap();

    let mut names = Vec::new();
    let mut values = Vec::new();
    let mut cursor = Cursor::new();
    while dict.has_next(cursor) {
        names.push(dict.next_name(cursor));
        values.push(dict.next_value(cursor));
        cursor.advance();
    }

    assert_eq!(names, [Value::string("k1"), Value::Object(k2.clone()), Value::string("k3")]);
    assert_eq!(values, [Value::Int(1), Value::Int(2), Value::Int(3)]);

    let end = Cursor::at(dict.enum_len());
    assert!(!dict.has_next(end));
    assert!(!dict.has_next(end));
}

#[test]
fn test_proxy_single_override_call_with_nested_access() {
    let mut cx = VmContext::new();
    let calls = Rc::new(Cell::new(0u32));
    let seen = Rc::clone(&calls);
    let proxy = cx.proxy_class().clone();
    let class = cx.register_class(
        ClassBuilder::new("Lazy", "test").extends(&proxy).method(
            get_property_name(),
            FunctionRef::native("getProperty", move |cx, this, args| {
                seen.set(seen.get() + 1);
                let backing = this.get(cx, Key::qualified(&args[0].to_string_value(), "store"))?;
                Ok(backing.unwrap_or(Value::Undefined))
            }),
        ),
    );
    let obj = cx.construct(&class, &[]).unwrap();
    obj.set(&mut cx, Key::qualified("answer", "store"), Value::Int(42)).unwrap();

    assert_eq!(obj.get(&mut cx, Key::public("answer")).unwrap(), Some(Value::Int(42)));
    assert_eq!(calls.get(), 1);
    assert!(!obj.proxy_state().unwrap().is_active());
}

#[test]
fn test_proxy_without_override_never_aborts() {
    let mut cx = VmContext::new();
    let class = cx.proxy_class().clone();
    let obj = cx.construct(&class, &[]).unwrap();

    let other = cx.new_object();
    for key in [Key::public("anything"), Key::index(0), Key::identity(other.clone())] {
        assert_eq!(intercept_get(&obj, &mut cx, &key).unwrap(), None);
    }
    assert_eq!(obj.get(&mut cx, Key::public("anything")).unwrap(), None);
    assert_eq!(obj.get(&mut cx, Key::index(0)).unwrap(), None);
    assert_eq!(obj.get(&mut cx, Key::identity(other.clone())).unwrap(), None);
    assert_eq!(other.ref_count(), 1);

    obj.set(&mut cx, classify("5", ""), Value::Int(5)).unwrap();
    assert_eq!(obj.get(&mut cx, Key::index(5)).unwrap(), Some(Value::Int(5)));
    assert_eq!(obj.get(&mut cx, Key::public("5")).unwrap(), Some(Value::Int(5)));
    assert!(obj.delete(&mut cx, Key::index(5)).unwrap());
}

#[test]
fn test_proxy_override_reenters_with_numeric_name() {
    let mut cx = VmContext::new();
    let proxy = cx.proxy_class().clone();
    let class = cx.register_class(
        ClassBuilder::new("Rows", "test").extends(&proxy).method(
            get_property_name(),
            FunctionRef::native("getProperty", |cx, this, args| {
                let name = args[0].to_string_value();
                let row = this.get(cx, classify(&name, ""))?;
                Ok(row.unwrap_or(Value::Null))
            }),
        ),
    );
    let obj = cx.construct(&class, &[]).unwrap();
    obj.set(&mut cx, Key::index(3), Value::string("third")).unwrap();

    assert_eq!(obj.get(&mut cx, Key::index(3)).unwrap(), Some(Value::string("third")));
    assert_eq!(obj.get(&mut cx, classify("4", "")).unwrap(), Some(Value::Null));
}

#[test]
fn test_has_property_across_key_kinds() {
    let mut cx = VmContext::new();
    let object = cx.object_class().clone();
    let class = cx.register_class(ClassBuilder::new("Gauge", "test").extends(&object).getter(
        QName::public("level"),
        FunctionRef::native("level", |_, _, _| Ok(Value::Int(1))),
    ));
    let gauge = cx.construct(&class, &[]).unwrap();
    gauge.set(&mut cx, Key::public("extra"), Value::Null).unwrap();
    assert!(gauge.has_property(&Key::public("level")));
    assert!(gauge.has_property(&Key::public("extra")));
    assert!(!gauge.has_property(&Key::public("missing")));

    let bytes_class = cx.byte_array_class().clone();
    let bytes = cx.construct(&bytes_class, &[]).unwrap();
    bytes.set(&mut cx, Key::index(1), Value::Int(9)).unwrap();
    assert!(bytes.has_property(&Key::index(1)));
    assert!(!bytes.has_property(&Key::index(2)));

    let dict_class = cx.dictionary_class().clone();
    let dict = cx.construct(&dict_class, &[]).unwrap();
    let owner = cx.new_object();
    dict.set(&mut cx, Key::identity(owner.clone()), Value::Int(1)).unwrap();
    dict.set(&mut cx, classify("08", ""), Value::Int(8)).unwrap();
    assert!(dict.has_property(&Key::identity(owner.clone())));
    assert!(dict.has_property(&classify("08", "")));
    assert!(!dict.has_property(&Key::index(8)));
    assert_eq!(owner.ref_count(), 2);
}
