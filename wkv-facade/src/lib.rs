//! # WeeKV Facade
//!
//! Purpose: Give in-process callers a small, uniform surface for single-key
//! operations against a pooled (possibly sharded) key-value store.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `KeyValueFacade` hides pool acquisition, release and
//!    failure normalization behind five calls.
//! 2. **Scoped Acquisition**: Every call leases one connection and the lease is
//!    released by `Drop`, whatever the outcome.
//! 3. **Explicit Outcomes**: Absent keys are `Ok(None)`; failures are a
//!    `FacadeError` naming whether the pool or the store call failed.
//! 4. **Explicit Wiring**: The pool is passed in at construction and torn down
//!    with `shutdown`; there is no global instance.

mod error;
mod facade;
pub mod memory;

pub use error::{BoxError, FacadeError, FacadeResult};
pub use facade::KeyValueFacade;
pub use wkv_common::{Operation, Pool, StoreConnection, Ttl, TypeError};
