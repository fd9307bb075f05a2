//! GPU device acquisition.
//!
//! Creates the wgpu Instance/Adapter/Device/Queue without a window. The
//! result is handed to backend selection as [`Capabilities`](crate::backend::Capabilities).

mod gpu;

pub use gpu::{probe, Gpu, GpuInit};
