//! # Store Probe
//!
//! Purpose: Check a live Redis-compatible store end to end through the facade:
//! set, get, delete, get-after-delete, expire-on-missing and a TTL write.
//!
//! Usage: `wkv-probe [config.json]`. Without a path the pool is configured from
//! `WKV_*` environment variables. Log verbosity follows `RUST_LOG`.

use std::env;
use std::fs;

use anyhow::{ensure, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use wkv_client::PoolConfig;
use wkv_facade::{KeyValueFacade, Pool, Ttl};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match env::args().nth(1) {
        Some(path) => {
            let text = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            PoolConfig::from_json(&text).with_context(|| format!("parsing {path}"))?
        }
        None => PoolConfig::from_env().context("reading WKV_* environment")?,
    };
    info!(addr = %config.addr, max_total = config.max_total, "probing store");

    let facade = KeyValueFacade::from_config(config)?;
    let outcome = run_probe(&facade, &format!("wkv-probe:{}", std::process::id()));
    facade.shutdown();
    outcome
}

fn run_probe<P: Pool>(facade: &KeyValueFacade<P>, key: &str) -> Result<()> {
    let status = facade.set(key, "1")?;
    info!(key, %status, "set");

    let value = facade.get(key)?;
    ensure!(value.as_deref() == Some(&b"1"[..]), "get returned {value:?}, expected \"1\"");

    let removed = facade.delete(key)?;
    ensure!(removed == 1, "delete removed {removed} keys, expected 1");
    ensure!(facade.get(key)?.is_none(), "key still present after delete");

    let ttl = Ttl::from_secs(10)?;
    ensure!(!facade.expire(key, ttl)?, "expire reported success on a deleted key");

    facade.set_with_ttl(key, "2", ttl)?;
    ensure!(facade.expire(key, ttl)?, "expire failed on a key written with a ttl");
    facade.delete(key)?;

    info!(key, "probe passed");
    Ok(())
}
