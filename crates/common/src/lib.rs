//! Steadyframe Common Utilities
//!
//! Shared infrastructure for all Steadyframe crates:
//! - Error types and result aliases
//! - Cooperative cancellation between frames
//! - Tracing/logging initialization
//! - Configuration loading

pub mod cancel;
pub mod config;
pub mod error;
pub mod logging;

pub use cancel::*;
pub use config::*;
pub use error::*;
