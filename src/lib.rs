//! # BLE Host RPC
//!
//! eRPC-compatible TCP host exposing the BLE stack to remote callers:
//! - **host** service: `init`, `start`, `deinit`
//! - **gap** service: `set_param(param, value) -> param - 1`
//!
//! ## Architecture
//!
//! ```text
//!              ┌──────────────────────────────────────────────┐
//!   TCP  →     │ frame (len + crc16) → codec (header + args)  │
//!              │            ↓                                  │
//!              │   ServiceRegistry ── id ──→ HostService       │
//!              │                     └──────→ GapService       │
//!              │            ↓                                  │
//!   TCP  ←     │ frame ← codec (reply header + results)        │
//!              └──────────────────────────────────────────────┘
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod ipc;
pub mod types;

// Internal utilities
pub mod observability;

pub use types::{Config, Error, IpcConfig, Result};
