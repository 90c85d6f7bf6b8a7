//! Built-in containers backed by native storage

pub mod byte_array;
pub mod dictionary;
pub mod proxy;

pub use byte_array::ByteArray;
pub use dictionary::{DictKey, Dictionary};
pub use proxy::ProxyState;
