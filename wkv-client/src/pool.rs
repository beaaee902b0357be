//! # Connection Pool
//!
//! Purpose: Lease RESP connections to callers one operation at a time and take
//! them back, validating each one on release.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Keep a bounded set of reusable connections.
//! 2. **Minimal Locking**: Hold the mutex only while moving idle connections;
//!    connects and PINGs happen outside it.
//! 3. **Bounded Waiting**: With `acquire_timeout` set, callers park on a
//!    condvar until a slot frees or the deadline passes; without it an
//!    exhausted pool fails fast.
//! 4. **Validate on Release**: Connections that saw IO or framing errors are
//!    discarded instead of returning to the idle set.

use std::collections::VecDeque;
use std::fmt;
use std::io::{BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::config::PoolConfig;
use crate::error::{ClientError, ClientResult};
use crate::resp::{encode_command, read_response, RespValue};

/// Point-in-time view of the pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections parked in the idle set.
    pub idle: usize,
    /// Connections alive (idle + leased).
    pub total: usize,
    /// Leases handed out since creation.
    pub acquired: u64,
    /// Leases returned since creation.
    pub released: u64,
    /// Connections dropped because they were broken.
    pub discarded: u64,
}

struct PoolState {
    idle: VecDeque<Connection>,
    total: usize,
    closed: bool,
}

#[derive(Default)]
struct Counters {
    acquired: AtomicU64,
    released: AtomicU64,
    discarded: AtomicU64,
}

struct PoolInner {
    config: PoolConfig,
    state: Mutex<PoolState>,
    // Signalled whenever a connection or a slot is handed back.
    available: Condvar,
    counters: Counters,
}

enum Claim {
    Idle(Connection),
    Reserved,
}

/// Connection pool handle. Clones share the same pool.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Creates a new connection pool. No connection is opened until the first
    /// `acquire`.
    pub fn new(config: PoolConfig) -> ClientResult<Self> {
        config.validate()?;
        let state = PoolState {
            idle: VecDeque::with_capacity(config.max_idle),
            total: 0,
            closed: false,
        };
        Ok(ConnectionPool {
            inner: Arc::new(PoolInner {
                config,
                state: Mutex::new(state),
                available: Condvar::new(),
                counters: Counters::default(),
            }),
        })
    }

    /// Returns the configuration the pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Acquires a connection from the pool.
    ///
    /// Prefers an idle connection, then opens a new one while under
    /// `max_total`, then waits up to `acquire_timeout` for a release.
    pub fn acquire(&self) -> ClientResult<PooledConnection> {
        let deadline = self.inner.config.acquire_timeout.map(|wait| Instant::now() + wait);

        loop {
            match self.claim(deadline)? {
                Claim::Idle(mut conn) => {
                    if self.inner.config.test_on_borrow {
                        if let Err(err) = conn.ping() {
                            debug!(error = %err, "discarding idle connection that failed PING");
                            self.inner.counters.discarded.fetch_add(1, Ordering::Relaxed);
                            self.inner.release_slot();
                            continue;
                        }
                    }
                    return Ok(self.lease(conn));
                }
                Claim::Reserved => {
                    return match Connection::connect(&self.inner.config) {
                        Ok(conn) => {
                            debug!(addr = %self.inner.config.addr, "opened pooled connection");
                            Ok(self.lease(conn))
                        }
                        Err(err) => {
                            warn!(addr = %self.inner.config.addr, error = %err, "connect failed");
                            self.inner.release_slot();
                            Err(err)
                        }
                    };
                }
            }
        }
    }

    /// Closes the pool: idle connections are dropped, leased ones are dropped
    /// when released, and later `acquire` calls fail with `PoolClosed`.
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        let dropped = state.idle.len();
        state.idle.clear();
        state.total = state.total.saturating_sub(dropped);
        self.inner.available.notify_all();
        debug!(dropped, "connection pool closed");
    }

    /// Returns true once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Returns a snapshot of pool occupancy and lease counters.
    pub fn stats(&self) -> PoolStats {
        let (idle, total) = {
            let state = self.inner.state.lock();
            (state.idle.len(), state.total)
        };
        let counters = &self.inner.counters;
        PoolStats {
            idle,
            total,
            acquired: counters.acquired.load(Ordering::Relaxed),
            released: counters.released.load(Ordering::Relaxed),
            discarded: counters.discarded.load(Ordering::Relaxed),
        }
    }

    fn claim(&self, deadline: Option<Instant>) -> ClientResult<Claim> {
        let mut state = self.inner.state.lock();
        let mut timed_out = false;

        loop {
            if state.closed {
                return Err(ClientError::PoolClosed);
            }
            if let Some(conn) = state.idle.pop_front() {
                return Ok(Claim::Idle(conn));
            }
            if state.total < self.inner.config.max_total {
                state.total += 1;
                return Ok(Claim::Reserved);
            }

            match deadline {
                None => return Err(ClientError::PoolExhausted),
                Some(_) if timed_out => {
                    let waited = self.inner.config.acquire_timeout.unwrap_or(Duration::ZERO);
                    return Err(ClientError::AcquireTimeout(waited));
                }
                Some(deadline) => {
                    timed_out = self.inner.available.wait_until(&mut state, deadline).timed_out();
                }
            }
        }
    }

    fn lease(&self, conn: Connection) -> PooledConnection {
        self.inner.counters.acquired.fetch_add(1, Ordering::Relaxed);
        PooledConnection {
            pool: self.inner.clone(),
            conn: Some(conn),
            valid: true,
        }
    }
}

impl PoolInner {
    fn release_slot(&self) {
        let mut state = self.state.lock();
        state.total = state.total.saturating_sub(1);
        self.available.notify_one();
    }

    fn return_connection(&self, conn: Connection, valid: bool) {
        self.counters.released.fetch_add(1, Ordering::Relaxed);
        if !valid {
            self.counters.discarded.fetch_add(1, Ordering::Relaxed);
        }

        let mut state = self.state.lock();
        if valid && !state.closed && state.idle.len() < self.config.max_idle {
            state.idle.push_back(conn);
        } else {
            state.total = state.total.saturating_sub(1);
            drop(conn);
        }
        self.available.notify_one();
    }
}

/// RAII lease returning a connection to the pool on drop.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    conn: Option<Connection>,
    valid: bool,
}

impl PooledConnection {
    /// Executes a RESP command and returns the parsed reply.
    ///
    /// IO and framing failures mark the lease broken so it is discarded on
    /// release. Error replies from the server do not.
    pub fn exec(&mut self, args: &[&[u8]]) -> ClientResult<RespValue> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(ClientError::PoolClosed);
        };
        let response = conn.exec(args);
        if let Err(err) = &response {
            if err.poisons_connection() {
                self.valid = false;
            }
        }
        response
    }

    /// Returns false once an IO or framing error has been observed.
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("valid", &self.valid)
            .finish_non_exhaustive()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.return_connection(conn, self.valid);
        }
    }
}

/// Single TCP connection with reusable buffers.
struct Connection {
    // Buffered reader reduces syscalls while still allowing direct writes.
    reader: BufReader<TcpStream>,
    line_buf: Vec<u8>,
    write_buf: Vec<u8>,
}

impl Connection {
    fn connect(config: &PoolConfig) -> ClientResult<Self> {
        let stream = connect_stream(config)?;
        stream.set_read_timeout(config.read_timeout)?;
        stream.set_write_timeout(config.write_timeout)?;
        // Disable Nagle to keep request latency low for small payloads.
        stream.set_nodelay(true)?;

        Ok(Connection {
            reader: BufReader::new(stream),
            line_buf: Vec::with_capacity(128),
            write_buf: Vec::with_capacity(256),
        })
    }

    fn exec(&mut self, args: &[&[u8]]) -> ClientResult<RespValue> {
        self.write_buf.clear();
        encode_command(args, &mut self.write_buf);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buf)?;
        stream.flush()?;

        read_response(&mut self.reader, &mut self.line_buf)
    }

    fn ping(&mut self) -> ClientResult<()> {
        match self.exec(&[b"PING"])? {
            RespValue::Simple(_) => Ok(()),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}

fn connect_stream(config: &PoolConfig) -> ClientResult<TcpStream> {
    let addrs = config
        .addr
        .to_socket_addrs()
        .map_err(|_| ClientError::InvalidAddress(config.addr.clone()))?;

    let mut last_err = None;
    for addr in addrs {
        let attempt = match config.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }

    match last_err {
        Some(err) => Err(err.into()),
        None => Err(ClientError::InvalidAddress(config.addr.clone())),
    }
}
