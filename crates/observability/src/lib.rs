//! Tracing/logging setup shared by the binaries.
//!
//! Called once from `main` before any component is built; library crates only
//! emit through `tracing` macros and never install a subscriber themselves.

pub mod tracing;

pub use crate::tracing::{InitReport, LogConfig, resolve_directive};

/// Initialize process-wide tracing/logging.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init(config: &LogConfig) -> InitReport {
    crate::tracing::init(config)
}
