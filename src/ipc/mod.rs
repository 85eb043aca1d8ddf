//! TCP RPC transport layer.
//!
//! Implements CRC-framed messages carrying the basic codec, wire-compatible
//! with eRPC's `BasicCodec` over its framed TCP transport.

pub mod client;
pub mod codec;
pub mod crc16;
pub mod frame;
pub mod handlers;
pub mod router;
pub mod server;

pub use client::RpcClient;
pub use router::{DispatchResponse, Service, ServiceRegistry};
pub use server::RpcServer;
