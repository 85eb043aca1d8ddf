//! Service bindings exposed by the host.
//!
//! Each module pairs a handler trait with the [`Service`](crate::ipc::router::Service)
//! that decodes its arguments and a typed client for callers.

pub mod gap;
pub mod host;

pub use gap::{GapClient, GapHandler, GapService, LoggingGapHandler, GAP_SERVICE_ID};
pub use host::{HostClient, HostHandler, HostMethod, HostService, LoggingHostHandler, HOST_SERVICE_ID};
