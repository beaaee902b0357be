//! # WeeKV RESP Client
//!
//! Purpose: Provide the store collaborator behind the facade: a bounded pool
//! of synchronous RESP2 connections to a Redis-compatible server.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Reuse TCP connections to avoid repeated connects.
//! 2. **Scoped Leases**: `PooledConnection` returns itself to the pool on drop.
//! 3. **Minimal Allocation**: Reuse buffers for RESP framing and parsing.
//! 4. **Protocol Clarity**: Encode/parse RESP2 explicitly for correctness.

mod config;
mod error;
mod pool;
mod resp;
mod store;

pub use config::PoolConfig;
pub use error::{ClientError, ClientResult};
pub use pool::{ConnectionPool, PoolStats, PooledConnection};
pub use resp::RespValue;
