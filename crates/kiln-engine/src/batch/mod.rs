//! Flush-on-full batching of textured quads.

mod quad;

pub use quad::{BatchError, QuadBatch, QuadBatchConfig, Sprite, SpriteVertex, QUAD_INDICES};
