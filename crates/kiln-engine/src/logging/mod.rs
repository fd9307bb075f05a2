//! Logging utilities.
//!
//! Centralizes logger initialization. Library code only uses the `log`
//! facade; binaries and tests decide where records go.

mod init;

pub use init::{init_logging, LoggingConfig};
