//! Cursor-based enumeration
//!
//! The cursor belongs to the caller. Containers only answer "is there an
//! element at this position" and "what is at this position", in insertion
//! order. The usual loop is:
//!
//! ```text
//! let mut cursor = Cursor::new();
//! while obj.has_next(cursor) {
//!     let name = obj.next_name(cursor);
//!     cursor.advance();
//! }
//! ```
//!
//! Mutating the container between `has_next` and `next_name`/`next_value`
//! invalidates the cursor. Nothing detects this; the caller must not do it.

use crate::containers::Dictionary;
use crate::handle::ObjectRef;
use crate::object::{Backing, PropertyMap};
use crate::value::Value;

/// Caller-owned enumeration position
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor(usize);

impl Cursor {
    /// Cursor at the first element
    pub fn new() -> Self {
        Self(0)
    }

    /// Cursor at `index`
    pub fn at(index: usize) -> Self {
        Self(index)
    }

    /// Position
    pub fn index(self) -> usize {
        self.0
    }

    /// Step to the next position
    pub fn advance(&mut self) {
        self.0 += 1;
    }
}

fn past_end(cursor: Cursor, len: usize) -> ! {
    panic!(
        "enumeration cursor {} past end (size {})",
        cursor.index(),
        len
    )
}

/// Insertion-order enumeration
pub trait Enumerable {
    /// Number of enumerable entries
    fn enum_len(&self) -> usize;

    /// Whether an entry exists at `cursor`
    fn has_next(&self, cursor: Cursor) -> bool {
        cursor.index() < self.enum_len()
    }

    /// Name (key) at `cursor`
    ///
    /// # Panics
    ///
    /// Panics if `cursor` is at or past the end.
    fn next_name(&self, cursor: Cursor) -> Value;

    /// Value at `cursor`
    ///
    /// # Panics
    ///
    /// Panics if `cursor` is at or past the end.
    fn next_value(&self, cursor: Cursor) -> Value;
}

impl Enumerable for PropertyMap {
    fn enum_len(&self) -> usize {
        self.len()
    }

    fn next_name(&self, cursor: Cursor) -> Value {
        match self.entry_at(cursor.index()) {
            Some((name, _)) => Value::String(name.name.clone()),
            None => past_end(cursor, self.len()),
        }
    }

    fn next_value(&self, cursor: Cursor) -> Value {
        match self.entry_at(cursor.index()) {
            Some((_, value)) => value.clone(),
            None => past_end(cursor, self.len()),
        }
    }
}

impl Enumerable for Dictionary {
    fn enum_len(&self) -> usize {
        self.len()
    }

    fn next_name(&self, cursor: Cursor) -> Value {
        match self.key_at(cursor.index()) {
            Some(key) => key.to_value(),
            None => past_end(cursor, self.len()),
        }
    }

    fn next_value(&self, cursor: Cursor) -> Value {
        match self.value_at(cursor.index()) {
            Some(value) => value.clone(),
            None => past_end(cursor, self.len()),
        }
    }
}

/// Objects enumerate their native backing when it is a container, otherwise
/// their dynamic slots. ByteArrays yield indices and byte values.
impl Enumerable for ObjectRef {
    fn enum_len(&self) -> usize {
        match &*self.backing() {
            Backing::ByteArray(ba) => ba.len(),
            Backing::Dictionary(d) => d.enum_len(),
            _ => self.slots().enum_len(),
        }
    }

    fn next_name(&self, cursor: Cursor) -> Value {
        match &*self.backing() {
            Backing::ByteArray(ba) => {
                if cursor.index() >= ba.len() {
                    past_end(cursor, ba.len());
                }
                Value::Int(cursor.index() as i32)
            }
            Backing::Dictionary(d) => d.next_name(cursor),
            _ => self.slots().next_name(cursor),
        }
    }

    fn next_value(&self, cursor: Cursor) -> Value {
        match &*self.backing() {
            Backing::ByteArray(ba) => {
                if cursor.index() >= ba.len() {
                    past_end(cursor, ba.len());
                }
                Value::Int(i32::from(ba.get(cursor.index())))
            }
            Backing::Dictionary(d) => d.next_value(cursor),
            _ => self.slots().next_value(cursor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::VmContext;
    use crate::key::Key;

    fn drain(obj: &ObjectRef) -> Vec<(Value, Value)> {
        let mut out = Vec::new();
        let mut cursor = Cursor::new();
        while obj.has_next(cursor) {
            out.push((obj.next_name(cursor), obj.next_value(cursor)));
            cursor.advance();
        }
        out
    }

    #[test]
    fn test_slots_enumerate_in_insertion_order() {
        let mut cx = VmContext::new();
        let obj = cx.new_object();
        for (i, name) in ["z", "a", "m"].iter().enumerate() {
            obj.set(&mut cx, Key::public(name), Value::Int(i as i32)).unwrap();
        }

        let names: Vec<_> = drain(&obj).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, [Value::string("z"), Value::string("a"), Value::string("m")]);
    }

    #[test]
    fn test_byte_array_enumerates_indices() {
        let mut cx = VmContext::new();
        let class = cx.byte_array_class().clone();
        let obj = cx.construct(&class, &[]).unwrap();
        obj.byte_array().adopt_buffer(vec![4, 5]);

        assert_eq!(
            drain(&obj),
            [(Value::Int(0), Value::Int(4)), (Value::Int(1), Value::Int(5))]
        );
    }

    #[test]
    fn test_cursor_at_end_stays_exhausted() {
        let mut dict = Dictionary::new();
        dict.set_content("only", Value::Null);
        let mut cursor = Cursor::at(1);
        for _ in 0..3 {
            assert!(!dict.has_next(cursor));
            cursor.advance();
        }
    }

    #[test]
    #[should_panic(expected = "past end")]
    fn test_next_name_past_end_is_fatal() {
        let dict = Dictionary::new();
        dict.next_name(Cursor::new());
    }
}
