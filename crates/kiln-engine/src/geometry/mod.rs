//! Host-side geometry staging.

mod error;
mod staging;

pub use error::StagingError;
pub use staging::GeometryStagingBuffer;
