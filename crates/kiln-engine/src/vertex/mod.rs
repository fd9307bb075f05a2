//! Data-driven vertex layouts.
//!
//! A layout is an ordered list of attribute kinds. The order defines the
//! physical interleaving inside each vertex, so two layouts are only
//! compatible when their sequences are identical.

mod layout;

pub use layout::{AttributeInfo, AttributeKind, LayoutError, VertexLayout, MAX_ATTRIBUTES};
