// wkv-common - Shared types and collaborator contracts for WeeKV
//
// This crate defines the narrow interface the facade talks to: a pool that
// leases connections and the store primitives a leased connection exposes.

pub mod store;
pub mod types;

// Re-export for convenience
pub use store::*;
pub use types::*;
