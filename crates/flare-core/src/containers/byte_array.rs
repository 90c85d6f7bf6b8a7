//! Raw byte buffer addressable by index
//!
//! A ByteArray is reachable two ways: as an index-keyed object through the
//! regular property protocol, and as a plain buffer through
//! [`ByteArray::acquire_buffer`] / [`ByteArray::adopt_buffer`], used by
//! decoders and loaders to fill it without going through script values.

use crate::class::{ClassBuilder, ClassRef};
use crate::context::VmContext;
use crate::function::{arg, require_args, FunctionRef};
use crate::handle::ObjectRef;
use crate::key::QName;
use crate::object::Backing;
use crate::value::Value;
use crate::{VmError, VmResult};

/// Byte buffer with a read cursor
#[derive(Debug, Default)]
pub struct ByteArray {
    bytes: Option<Vec<u8>>,
    position: usize,
    fixed: bool,
}

impl ByteArray {
    /// Empty, growable buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero-filled buffer of `len` bytes that never grows
    pub fn fixed(len: usize) -> Self {
        Self {
            bytes: Some(vec![0; len]),
            position: 0,
            fixed: true,
        }
    }

    /// Current length in bytes
    pub fn len(&self) -> usize {
        self.bytes.as_ref().map_or(0, Vec::len)
    }

    /// Whether the buffer holds no bytes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether indexed writes past the end may extend the buffer
    pub fn is_growable(&self) -> bool {
        !self.fixed
    }

    /// Read cursor
    pub fn position(&self) -> usize {
        self.position
    }

    /// Move the read cursor
    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    /// Bytes between the cursor and the end
    pub fn bytes_available(&self) -> usize {
        self.len().saturating_sub(self.position)
    }

    /// Contents
    pub fn as_slice(&self) -> &[u8] {
        self.bytes.as_deref().unwrap_or(&[])
    }

    /// Storage for a producer to fill
    ///
    /// The first call allocates `size` zeroed bytes and fixes the length.
    /// Later calls must ask for no more than the existing length; the buffer
    /// is never reallocated here.
    pub fn acquire_buffer(&mut self, size: usize) -> &mut [u8] {
        let bytes = self.bytes.get_or_insert_with(|| vec![0; size]);
        assert!(
            size <= bytes.len(),
            "ByteArray buffer of {} bytes cannot serve a request for {}",
            bytes.len(),
            size
        );
        bytes
    }

    /// Replace the contents with an externally produced buffer
    ///
    /// Any previous buffer is dropped and the cursor returns to 0.
    pub fn adopt_buffer(&mut self, bytes: Vec<u8>) {
        self.bytes = Some(bytes);
        self.position = 0;
    }

    /// Byte at `index`
    ///
    /// # Panics
    ///
    /// Reading at or past the end aborts; reads never grow the buffer.
    pub fn get(&self, index: usize) -> u8 {
        let len = self.len();
        assert!(index < len, "ByteArray index {} out of range (length {})", index, len);
        self.as_slice()[index]
    }

    /// Write the byte at `index`
    ///
    /// Writing past the end of a growable buffer extends it to `index + 1`,
    /// keeping existing bytes and zero-filling the gap.
    ///
    /// # Panics
    ///
    /// Writing past the end of a fixed-length buffer aborts.
    pub fn set(&mut self, index: usize, byte: u8) {
        let len = self.len();
        if index >= len {
            assert!(
                !self.fixed,
                "ByteArray index {} out of range for fixed length {}",
                index,
                len
            );
            self.bytes.get_or_insert_with(Vec::new).resize(index + 1, 0);
        }
        if let Some(bytes) = &mut self.bytes {
            bytes[index] = byte;
        }
    }

    /// Copy `length` bytes from the cursor into the start of `dest`
    ///
    /// Only `offset == 0` is supported. The cursor advances by `length`. The
    /// source range is not validated beyond slice bounds.
    pub fn copy_slice(&mut self, dest: &mut ByteArray, offset: usize, length: usize) {
        let chunk = self.take_chunk(offset, length);
        dest.acquire_buffer(length)[..length].copy_from_slice(&chunk);
    }

    fn take_chunk(&mut self, offset: usize, length: usize) -> Vec<u8> {
        assert_eq!(offset, 0, "ByteArray copy supports offset 0 only");
        let start = self.position;
        let chunk = self.as_slice()[start..start + length].to_vec();
        self.position += length;
        chunk
    }
}

fn public(name: &str) -> QName {
    QName::public(name)
}

fn len_value(n: usize) -> Value {
    i32::try_from(n).map_or(Value::Number(n as f64), Value::Int)
}

/// `readBytes(dest, offset, length)`
fn read_bytes(_cx: &mut VmContext, this: &ObjectRef, args: &[Value]) -> VmResult<Value> {
    require_args("ByteArray.readBytes", args, 3);
    let dest = match arg(args, 0) {
        Value::Object(obj) if obj.try_byte_array().is_some() => obj,
        other => {
            return Err(VmError::TypeError(format!(
                "readBytes expects a ByteArray, got {}",
                other.type_name()
            )))
        }
    };
    let offset = usize::try_from(args[1].to_int())
        .map_err(|_| VmError::InvalidArgument("negative offset".to_string()))?;
    let length = usize::try_from(args[2].to_int())
        .map_err(|_| VmError::InvalidArgument("negative length".to_string()))?;

    // `this` and `dest` may be the same object; never hold both borrows.
    let chunk = this.byte_array().take_chunk(offset, length);
    dest.byte_array().acquire_buffer(length)[..length].copy_from_slice(&chunk);
    Ok(Value::Undefined)
}

fn build_traits(obj: &ObjectRef) {
    obj.bind_getter(
        public("length"),
        FunctionRef::native("length", |_, this, _| Ok(len_value(this.byte_array().len()))),
    );
    obj.bind_getter(
        public("bytesAvailable"),
        FunctionRef::native("bytesAvailable", |_, this, _| {
            Ok(len_value(this.byte_array().bytes_available()))
        }),
    );
    obj.bind_getter(
        public("position"),
        FunctionRef::native("position", |_, this, _| {
            Ok(len_value(this.byte_array().position()))
        }),
    );
    obj.bind_setter(
        public("position"),
        FunctionRef::native("position", |_, this, args| {
            require_args("ByteArray.position", args, 1);
            let pos = usize::try_from(args[0].to_int())
                .map_err(|_| VmError::InvalidArgument("negative position".to_string()))?;
            this.byte_array().set_position(pos);
            Ok(Value::Undefined)
        }),
    );
    obj.bind_method(public("readBytes"), FunctionRef::native("readBytes", read_bytes));
}

/// Register `flash.utils::ByteArray`
pub(crate) fn register(cx: &mut VmContext, object_class: &ClassRef) -> ClassRef {
    cx.register_class(
        ClassBuilder::new("ByteArray", "flash.utils")
            .extends(object_class)
            .backing(|| Backing::ByteArray(ByteArray::new()))
            .build_traits(build_traits),
    )
}
