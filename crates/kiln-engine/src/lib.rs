//! Kiln engine crate.
//!
//! Deferred rendering: draw work is recorded into a compact binary command
//! stream, geometry is staged on the CPU and uploaded in batches, and a
//! backend chosen at startup plays the stream back.

pub mod backend;
pub mod batch;
pub mod command;
pub mod context;
pub mod device;
pub mod geometry;
pub mod logging;
pub mod stream;
pub mod vertex;

pub use context::RenderContext;
