//! Flat byte streams.
//!
//! Command payloads are serialized as raw POD values with no tags or length
//! prefixes; the reader must know the layout it expects. `BinaryCursor` is the
//! only place that touches the bytes, and every access is bounds-checked.

mod cursor;
mod error;

pub use cursor::BinaryCursor;
pub use error::StreamError;

pub use std::io::SeekFrom;
