//! # Pool Configuration
//!
//! `PoolConfig` can be built in code, parsed from JSON, or read from `WKV_*`
//! environment variables. Durations are expressed in milliseconds outside of
//! Rust code.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{ClientError, ClientResult};

/// Pool configuration for the RESP client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Server address, e.g. "127.0.0.1:6379" or "localhost:6379".
    pub addr: String,
    /// Maximum number of idle connections to keep.
    pub max_idle: usize,
    /// Maximum total connections (idle + in-use).
    pub max_total: usize,
    /// TCP read timeout; 2 s by default, `None` waits forever.
    #[serde(rename = "read_timeout_ms", with = "millis")]
    pub read_timeout: Option<Duration>,
    /// TCP write timeout; 2 s by default.
    #[serde(rename = "write_timeout_ms", with = "millis")]
    pub write_timeout: Option<Duration>,
    /// TCP connect timeout; 2 s by default.
    #[serde(rename = "connect_timeout_ms", with = "millis")]
    pub connect_timeout: Option<Duration>,
    /// How long `acquire` waits for a free slot. `None` fails immediately.
    #[serde(rename = "acquire_timeout_ms", with = "millis")]
    pub acquire_timeout: Option<Duration>,
    /// PING idle connections before handing them out.
    pub test_on_borrow: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            addr: "127.0.0.1:6379".to_string(),
            max_idle: 8,
            max_total: 16,
            read_timeout: Some(Self::DEFAULT_TIMEOUT),
            write_timeout: Some(Self::DEFAULT_TIMEOUT),
            connect_timeout: Some(Self::DEFAULT_TIMEOUT),
            acquire_timeout: Some(Self::DEFAULT_TIMEOUT),
            test_on_borrow: false,
        }
    }
}

impl PoolConfig {
    const ENV_PREFIX: &'static str = "WKV_";
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

    /// Default configuration pointing at `addr`.
    pub fn with_addr(addr: impl Into<String>) -> Self {
        PoolConfig {
            addr: addr.into(),
            ..PoolConfig::default()
        }
    }

    /// Parses a JSON document. Missing fields take their defaults.
    pub fn from_json(text: &str) -> ClientResult<Self> {
        let config: PoolConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `WKV_*` environment variables over the defaults.
    ///
    /// Recognised: `WKV_ADDR`, `WKV_MAX_IDLE`, `WKV_MAX_TOTAL`,
    /// `WKV_READ_TIMEOUT_MS`, `WKV_WRITE_TIMEOUT_MS`, `WKV_CONNECT_TIMEOUT_MS`,
    /// `WKV_ACQUIRE_TIMEOUT_MS` and `WKV_TEST_ON_BORROW`. A timeout of `0`
    /// disables it.
    pub fn from_env() -> ClientResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> ClientResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{}{}", Self::ENV_PREFIX, suffix));
        let mut config = PoolConfig::default();

        if let Some(addr) = var("ADDR") {
            config.addr = addr;
        }
        if let Some(raw) = var("MAX_IDLE") {
            config.max_idle = parse_field("max_idle", &raw)?;
        }
        if let Some(raw) = var("MAX_TOTAL") {
            config.max_total = parse_field("max_total", &raw)?;
        }
        if let Some(raw) = var("READ_TIMEOUT_MS") {
            config.read_timeout = parse_millis("read_timeout_ms", &raw)?;
        }
        if let Some(raw) = var("WRITE_TIMEOUT_MS") {
            config.write_timeout = parse_millis("write_timeout_ms", &raw)?;
        }
        if let Some(raw) = var("CONNECT_TIMEOUT_MS") {
            config.connect_timeout = parse_millis("connect_timeout_ms", &raw)?;
        }
        if let Some(raw) = var("ACQUIRE_TIMEOUT_MS") {
            config.acquire_timeout = parse_millis("acquire_timeout_ms", &raw)?;
        }
        if let Some(raw) = var("TEST_ON_BORROW") {
            config.test_on_borrow = parse_field("test_on_borrow", &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks the limits are usable.
    pub fn validate(&self) -> ClientResult<()> {
        if self.addr.trim().is_empty() {
            return Err(invalid("addr", "must not be empty"));
        }
        if self.max_total == 0 {
            return Err(invalid("max_total", "must be at least 1"));
        }
        if self.max_idle > self.max_total {
            return Err(invalid("max_idle", "must not exceed max_total"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ClientError {
    ClientError::InvalidConfig {
        field,
        reason: reason.into(),
    }
}

fn parse_field<T>(field: &'static str, raw: &str) -> ClientResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|err: T::Err| invalid(field, err.to_string()))
}

fn parse_millis(field: &'static str, raw: &str) -> ClientResult<Option<Duration>> {
    let ms: u64 = parse_field(field, raw)?;
    Ok((ms > 0).then(|| Duration::from_millis(ms)))
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = Option::<u64>::deserialize(deserializer)?;
        Ok(ms.filter(|ms| *ms > 0).map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_json_defaults_and_overrides() {
        let config = PoolConfig::from_json(
            r#"{ "addr": "10.0.0.5:6380", "max_total": 4, "max_idle": 2, "read_timeout_ms": 250 }"#,
        )
        .unwrap();
        assert_eq!(config.addr, "10.0.0.5:6380");
        assert_eq!(config.max_total, 4);
        assert_eq!(config.max_idle, 2);
        assert_eq!(config.read_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.acquire_timeout, PoolConfig::default().acquire_timeout);
        assert!(!config.test_on_borrow);
    }

    #[test]
    fn test_json_zero_timeout_disables() {
        let config = PoolConfig::from_json(r#"{ "acquire_timeout_ms": 0, "read_timeout_ms": 0 }"#).unwrap();
        assert_eq!(config.acquire_timeout, None);
        assert_eq!(config.read_timeout, None);
        assert_eq!(config.write_timeout, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_default_bounds_every_wait() {
        let config = PoolConfig::default();
        let two_seconds = Some(Duration::from_secs(2));
        assert_eq!(config.read_timeout, two_seconds);
        assert_eq!(config.write_timeout, two_seconds);
        assert_eq!(config.connect_timeout, two_seconds);
        assert_eq!(config.acquire_timeout, two_seconds);
    }

    #[test]
    fn test_json_rejects_bad_limits() {
        let err = PoolConfig::from_json(r#"{ "max_total": 2, "max_idle": 3 }"#).unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfig { field: "max_idle", .. }));

        let err = PoolConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ClientError::ConfigFormat(_)));
    }

    #[test]
    fn test_env_lookup() {
        let vars: HashMap<&str, &str> = [
            ("WKV_ADDR", "cache.internal:6379"),
            ("WKV_MAX_TOTAL", "32"),
            ("WKV_ACQUIRE_TIMEOUT_MS", "0"),
            ("WKV_TEST_ON_BORROW", "true"),
        ]
        .into_iter()
        .collect();

        let config = PoolConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(config.addr, "cache.internal:6379");
        assert_eq!(config.max_total, 32);
        assert_eq!(config.max_idle, 8);
        assert_eq!(config.acquire_timeout, None);
        assert!(config.test_on_borrow);
    }

    #[test]
    fn test_env_lookup_rejects_garbage() {
        let err = PoolConfig::from_lookup(|name| {
            (name == "WKV_MAX_IDLE").then(|| "many".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfig { field: "max_idle", .. }));
    }
}
