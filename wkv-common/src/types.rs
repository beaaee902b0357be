//! # Key/TTL Type Definitions
//!
//! Small value types shared by the facade and its store collaborators.
//!
//! ## Design Principles
//!
//! 1. **Invalid States Unrepresentable**: `Ttl` cannot hold zero seconds, so
//!    callers never reach the store with a TTL that would delete the key.
//! 2. **Store-Native Units**: TTLs are whole seconds, matching `EXPIRE` and
//!    `SET .. EX` on the wire.
//! 3. **Log-Friendly**: `Operation` renders as the lowercase operation name
//!    for structured `tracing` fields.

use std::fmt;
use std::num::NonZeroU64;
use std::time::Duration;

use thiserror::Error;

/// Errors produced while building shared value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TypeError {
    /// A TTL of zero seconds was requested.
    #[error("ttl must be at least one second")]
    ZeroTtl,
}

/// Time-to-live in whole seconds, always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ttl(NonZeroU64);

impl Ttl {
    /// Creates a TTL from seconds.
    ///
    /// # Errors
    /// Returns `TypeError::ZeroTtl` when `seconds` is zero.
    ///
    /// # Examples
    /// ```rust
    /// use wkv_common::{Ttl, TypeError};
    ///
    /// let ttl = Ttl::from_secs(10).expect("positive ttl");
    /// assert_eq!(ttl.as_secs(), 10);
    /// assert_eq!(Ttl::from_secs(0), Err(TypeError::ZeroTtl));
    /// ```
    pub fn from_secs(seconds: u64) -> Result<Self, TypeError> {
        NonZeroU64::new(seconds).map(Ttl).ok_or(TypeError::ZeroTtl)
    }

    /// Creates a TTL from a duration, truncating sub-second precision.
    ///
    /// Durations shorter than one second are rejected rather than rounded up.
    pub fn from_duration(duration: Duration) -> Result<Self, TypeError> {
        Self::from_secs(duration.as_secs())
    }

    /// Returns the TTL in seconds.
    #[inline]
    pub const fn as_secs(&self) -> u64 {
        self.0.get()
    }

    /// Returns the TTL as a `Duration`.
    #[inline]
    pub const fn as_duration(&self) -> Duration {
        Duration::from_secs(self.0.get())
    }
}

impl TryFrom<u64> for Ttl {
    type Error = TypeError;

    fn try_from(seconds: u64) -> Result<Self, Self::Error> {
        Ttl::from_secs(seconds)
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.as_secs())
    }
}

/// Single-key operations the facade performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Set,
    SetWithTtl,
    Get,
    Delete,
    Expire,
}

impl Operation {
    /// Lowercase name used in log fields and error messages.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Operation::Set => "set",
            Operation::SetWithTtl => "set_with_ttl",
            Operation::Get => "get",
            Operation::Delete => "delete",
            Operation::Expire => "expire",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_rejects_zero() {
        assert_eq!(Ttl::from_secs(0), Err(TypeError::ZeroTtl));
        assert_eq!(Ttl::try_from(0u64), Err(TypeError::ZeroTtl));
    }

    #[test]
    fn test_ttl_from_duration_truncates() {
        let ttl = Ttl::from_duration(Duration::from_millis(2_900)).unwrap();
        assert_eq!(ttl.as_secs(), 2);
        assert_eq!(ttl.as_duration(), Duration::from_secs(2));

        // Sub-second durations would truncate to zero.
        assert!(Ttl::from_duration(Duration::from_millis(999)).is_err());
    }

    #[test]
    fn test_ttl_display() {
        assert_eq!(Ttl::from_secs(30).unwrap().to_string(), "30s");
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::SetWithTtl.to_string(), "set_with_ttl");
        assert_eq!(Operation::Delete.as_str(), "delete");
    }
}
