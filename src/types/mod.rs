//! Core types for the RPC host.
//!
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration structures for server, transport, and logging

mod config;
mod errors;

pub use config::{Config, IpcConfig, ObservabilityConfig, ServerConfig, MAX_FRAME_PAYLOAD};
pub use errors::{CodecError, Error, FrameError, Result};
