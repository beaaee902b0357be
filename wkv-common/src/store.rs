//! # Store Collaborator Contracts
//!
//! Purpose: Describe the two collaborators the facade depends on, a pool that
//! leases connections and the single-key primitives a leased connection
//! exposes, without committing to a transport or a pooling strategy.
//!
//! ## Design Principles
//! 1. **Scoped Acquisition**: Release is the `Drop` of the leased connection,
//!    so every exit path returns it exactly once.
//! 2. **Validation Belongs to the Pool**: Whether a released connection goes
//!    back to the idle set or is discarded is decided in its `Drop`.
//! 3. **Strategy Pattern**: Backends (RESP over TCP, in-memory) plug in behind
//!    the same traits.

use std::sync::Arc;

use bytes::Bytes;

use crate::types::Ttl;

/// Single-key primitives issued over one leased connection.
///
/// Implementations issue each call verbatim: no retries, no batching and no
/// pipelining.
pub trait StoreConnection {
    /// Error raised by a failed store call.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Writes or overwrites `key`. Returns the store acknowledgement (e.g. "OK").
    fn set(&mut self, key: &str, value: &[u8]) -> Result<String, Self::Error>;

    /// Writes `key` and attaches an expiration.
    ///
    /// The default issues `set` then `expire` on this connection. It is not
    /// atomic: a failure between the two calls leaves the key without a TTL.
    /// `expire` is skipped when `set` fails. Backends with a single-call form
    /// should override this.
    fn set_ex(&mut self, key: &str, value: &[u8], ttl: Ttl) -> Result<String, Self::Error> {
        let status = self.set(key, value)?;
        // The key may already be gone again; the set status is still reported.
        self.expire(key, ttl)?;
        Ok(status)
    }

    /// Reads `key`; `None` when it is absent or expired.
    fn get(&mut self, key: &str) -> Result<Option<Bytes>, Self::Error>;

    /// Removes `key`. Returns the number of keys removed.
    fn del(&mut self, key: &str) -> Result<u64, Self::Error>;

    /// Sets a TTL on `key`. Returns false when the key does not exist.
    fn expire(&mut self, key: &str, ttl: Ttl) -> Result<bool, Self::Error>;
}

/// Source of leased store connections.
pub trait Pool {
    /// Leased connection; dropping it releases it back to the pool.
    type Connection: StoreConnection;

    /// Error raised when no connection can be supplied.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Leases a connection. Implementations bound any waiting internally.
    fn acquire(&self) -> Result<Self::Connection, Self::Error>;

    /// Tears the pool down. Later acquisitions fail.
    fn close(&self) {}
}

impl<P: Pool + ?Sized> Pool for Arc<P> {
    type Connection = P::Connection;
    type Error = P::Error;

    fn acquire(&self) -> Result<Self::Connection, Self::Error> {
        (**self).acquire()
    }

    fn close(&self) {
        (**self).close()
    }
}
