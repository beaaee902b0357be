//! # Key-Value Facade
//!
//! Every public call follows the same acquire, execute, release sequence:
//!
//! ```text
//! caller ──► validate key ──► pool.acquire() ──► one store call ──► drop(lease)
//!                 │                 │                  │
//!            InvalidKey        Unavailable       OperationFailed
//! ```
//!
//! The lease lives inside `execute`, so it is released before control returns
//! to the caller on every path.

use bytes::Bytes;
use tracing::{debug, error, warn};

use wkv_client::{ClientResult, ConnectionPool, PoolConfig};
use wkv_common::{Operation, Pool, StoreConnection, Ttl};

use crate::error::{FacadeError, FacadeResult};

type StoreError<P> = <<P as Pool>::Connection as StoreConnection>::Error;

/// Single-key operations over a pooled store.
///
/// Holds no mutable state of its own; it is `Send + Sync` whenever the pool
/// is, and concurrent calls each lease their own connection.
#[derive(Debug)]
pub struct KeyValueFacade<P> {
    pool: P,
}

impl KeyValueFacade<ConnectionPool> {
    /// Builds a facade over a RESP connection pool.
    pub fn from_config(config: PoolConfig) -> ClientResult<Self> {
        Ok(KeyValueFacade::new(ConnectionPool::new(config)?))
    }
}

impl<P: Pool> KeyValueFacade<P> {
    /// Wraps an existing pool.
    pub fn new(pool: P) -> Self {
        KeyValueFacade { pool }
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &P {
        &self.pool
    }

    /// Writes or overwrites `key`. Returns the store acknowledgement.
    pub fn set(&self, key: &str, value: impl AsRef<[u8]>) -> FacadeResult<String> {
        self.execute(Operation::Set, key, |conn| conn.set(key, value.as_ref()))
    }

    /// Writes `key` with an expiration.
    ///
    /// Atomic when the store supports a single-call set-with-expiry. Otherwise
    /// set and expire are issued back to back on the same connection, and a
    /// failure between them leaves the key without a TTL.
    pub fn set_with_ttl(&self, key: &str, value: impl AsRef<[u8]>, ttl: Ttl) -> FacadeResult<String> {
        self.execute(Operation::SetWithTtl, key, |conn| conn.set_ex(key, value.as_ref(), ttl))
    }

    /// Reads `key`. `Ok(None)` means the key is absent.
    pub fn get(&self, key: &str) -> FacadeResult<Option<Bytes>> {
        self.execute(Operation::Get, key, |conn| conn.get(key))
    }

    /// Removes `key`. Returns the number of keys removed (0 or 1).
    pub fn delete(&self, key: &str) -> FacadeResult<u64> {
        self.execute(Operation::Delete, key, |conn| conn.del(key))
    }

    /// Sets a TTL on `key`. Returns false when the key does not exist.
    pub fn expire(&self, key: &str, ttl: Ttl) -> FacadeResult<bool> {
        self.execute(Operation::Expire, key, |conn| conn.expire(key, ttl))
    }

    /// Closes the pool. Later calls fail with `Unavailable`.
    pub fn shutdown(&self) {
        debug!("shutting down key-value facade");
        self.pool.close();
    }

    fn execute<T, F>(&self, op: Operation, key: &str, call: F) -> FacadeResult<T>
    where
        F: FnOnce(&mut P::Connection) -> Result<T, StoreError<P>>,
    {
        if key.is_empty() {
            warn!(%op, "rejected empty key");
            return Err(FacadeError::InvalidKey { op });
        }

        let mut conn = self.pool.acquire().map_err(|err| {
            warn!(%op, key, error = %err, "no store connection available");
            FacadeError::Unavailable {
                op,
                source: Box::new(err),
            }
        })?;

        let outcome = call(&mut conn);
        drop(conn);

        match outcome {
            Ok(value) => {
                debug!(%op, key, "store call completed");
                Ok(value)
            }
            Err(err) => {
                error!(%op, key, error = %err, "store call failed");
                Err(FacadeError::OperationFailed {
                    op,
                    source: Box::new(err),
                })
            }
        }
    }
}
