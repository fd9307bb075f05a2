use std::fmt;

use crate::backend::{BackendError, IndexType};
use crate::vertex::LayoutError;

/// Staging buffer failure. The buffer is unchanged when one is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum StagingError {
    /// Not enough vertex slots left.
    VertexOverflow { requested: u32, filled: u32, capacity: u32 },
    /// Not enough index slots left.
    IndexOverflow { requested: u32, filled: u32, capacity: u32 },
    /// A local index pushed past the range of `IndexType`.
    IndexBaseOverflow { base: IndexType, local: IndexType },
    /// A typed vertex does not match the layout stride.
    VertexSizeMismatch { expected: u32, actual: u32 },
    /// The layout cannot back a buffer.
    Layout(LayoutError),
    /// The buffer's GPU handle was already released.
    AlreadyDestroyed,
    Backend(BackendError),
}

impl fmt::Display for StagingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VertexOverflow { requested, filled, capacity } => write!(
                f,
                "requested {requested} vertices with {filled}/{capacity} already filled"
            ),
            Self::IndexOverflow { requested, filled, capacity } => write!(
                f,
                "appending {requested} indices with {filled}/{capacity} already filled"
            ),
            Self::IndexBaseOverflow { base, local } => write!(
                f,
                "local index {local} does not fit above index base {base}"
            ),
            Self::VertexSizeMismatch { expected, actual } => write!(
                f,
                "vertex type is {actual} bytes but the layout stride is {expected}"
            ),
            Self::Layout(e) => write!(f, "invalid layout: {e}"),
            Self::AlreadyDestroyed => f.write_str("staging buffer already destroyed"),
            Self::Backend(e) => write!(f, "backend: {e}"),
        }
    }
}

impl std::error::Error for StagingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Layout(e) => Some(e),
            Self::Backend(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BackendError> for StagingError {
    fn from(e: BackendError) -> Self {
        Self::Backend(e)
    }
}

impl From<LayoutError> for StagingError {
    fn from(e: LayoutError) -> Self {
        Self::Layout(e)
    }
}
