use std::fmt;

/// Failure while reading or writing a [`BinaryCursor`](super::BinaryCursor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// An access or seek would leave the buffer.
    OutOfBounds {
        offset: usize,
        requested: usize,
        capacity: usize,
    },
    /// Bytes were read successfully but do not decode to a legal value.
    InvalidValue { what: &'static str, raw: u32 },
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds { offset, requested, capacity } => write!(
                f,
                "stream access out of bounds: {requested} byte(s) at offset {offset} (capacity {capacity})"
            ),
            Self::InvalidValue { what, raw } => {
                write!(f, "invalid {what} value in stream: {raw:#x}")
            }
        }
    }
}

impl std::error::Error for StreamError {}
