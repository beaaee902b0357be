use std::io::{BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use wkv_client::{ClientError, ConnectionPool, PoolConfig};
use wkv_common::{StoreConnection, Ttl};

type Handler = fn(usize, Vec<Vec<u8>>, &mut TcpStream);

/// Serves `expected_commands` commands on the first accepted connection.
fn spawn_server(expected_commands: usize, handler: Handler) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
        let mut reader = BufReader::new(stream.try_clone().expect("clone"));
        for idx in 0..expected_commands {
            let args = match read_command(&mut reader) {
                Ok(args) => args,
                Err(_) => return,
            };
            handler(idx, args, &mut stream);
        }
    });

    addr
}

fn invalid_data(msg: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg.to_string())
}

fn read_command(reader: &mut BufReader<TcpStream>) -> std::io::Result<Vec<Vec<u8>>> {
    let line = read_line(reader)?;
    let count = line
        .strip_prefix(b"*")
        .and_then(parse_usize)
        .ok_or_else(|| invalid_data("expected array"))?;

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        let line = read_line(reader)?;
        let len = line
            .strip_prefix(b"$")
            .and_then(parse_usize)
            .ok_or_else(|| invalid_data("expected bulk"))?;
        let mut data = vec![0u8; len + 2];
        reader.read_exact(&mut data)?;
        if !data.ends_with(b"\r\n") {
            return Err(invalid_data("missing crlf"));
        }
        data.truncate(len);
        args.push(data);
    }
    Ok(args)
}

fn read_line(reader: &mut BufReader<TcpStream>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf)? == 0 {
        return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"));
    }
    if !buf.ends_with(b"\r\n") {
        return Err(invalid_data("invalid line"));
    }
    buf.truncate(buf.len() - 2);
    Ok(buf)
}

fn parse_usize(data: &[u8]) -> Option<usize> {
    std::str::from_utf8(data).ok()?.parse().ok()
}

fn write_raw(stream: &mut TcpStream, reply: &[u8]) {
    let _ = stream.write_all(reply);
    let _ = stream.flush();
}

fn pool_with_addr(addr: String, acquire_timeout: Option<Duration>) -> ConnectionPool {
    let config = PoolConfig {
        addr,
        max_idle: 1,
        max_total: 1,
        read_timeout: Some(Duration::from_secs(1)),
        write_timeout: Some(Duration::from_secs(1)),
        connect_timeout: Some(Duration::from_secs(1)),
        acquire_timeout,
        test_on_borrow: false,
    };
    ConnectionPool::new(config).expect("pool")
}

/// Listener that never answers; connects still succeed through the backlog.
fn silent_listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();
    (listener, addr)
}

#[test]
fn set_get_roundtrip_reuses_one_connection() {
    let addr = spawn_server(2, |idx, args, stream| {
        if idx == 0 {
            assert_eq!(args, vec![b"SET".to_vec(), b"key".to_vec(), b"value".to_vec()]);
            write_raw(stream, b"+OK\r\n");
        } else {
            assert_eq!(args, vec![b"GET".to_vec(), b"key".to_vec()]);
            write_raw(stream, b"$5\r\nvalue\r\n");
        }
    });

    let pool = pool_with_addr(addr, None);
    {
        let mut conn = pool.acquire().expect("acquire");
        assert_eq!(conn.set("key", b"value").expect("set"), "OK");
    }
    {
        // The server only accepts once, so this must be the same socket.
        let mut conn = pool.acquire().expect("acquire");
        assert_eq!(conn.get("key").expect("get"), Some(Bytes::from_static(b"value")));
    }

    let stats = pool.stats();
    assert_eq!(stats.acquired, 2);
    assert_eq!(stats.released, 2);
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.total, 1);
}

#[test]
fn set_ex_is_a_single_command() {
    let addr = spawn_server(2, |idx, args, stream| {
        if idx == 0 {
            assert_eq!(
                args,
                vec![
                    b"SET".to_vec(),
                    b"session".to_vec(),
                    b"abc".to_vec(),
                    b"EX".to_vec(),
                    b"30".to_vec(),
                ]
            );
            write_raw(stream, b"+OK\r\n");
        } else {
            assert_eq!(args[0], b"GET");
            write_raw(stream, b"$-1\r\n");
        }
    });

    let pool = pool_with_addr(addr, None);
    let mut conn = pool.acquire().expect("acquire");
    let ttl = Ttl::from_secs(30).unwrap();
    assert_eq!(conn.set_ex("session", b"abc", ttl).expect("set_ex"), "OK");
    assert_eq!(conn.get("missing").expect("get"), None);
}

#[test]
fn del_and_expire_replies() {
    let addr = spawn_server(3, |idx, args, stream| match idx {
        0 => {
            assert_eq!(args, vec![b"DEL".to_vec(), b"key".to_vec()]);
            write_raw(stream, b":1\r\n");
        }
        1 => {
            assert_eq!(args, vec![b"EXPIRE".to_vec(), b"key".to_vec(), b"10".to_vec()]);
            write_raw(stream, b":0\r\n");
        }
        _ => {
            assert_eq!(args[0], b"EXPIRE");
            write_raw(stream, b":1\r\n");
        }
    });

    let pool = pool_with_addr(addr, None);
    let mut conn = pool.acquire().expect("acquire");
    let ttl = Ttl::from_secs(10).unwrap();
    assert_eq!(conn.del("key").expect("del"), 1);
    assert!(!conn.expire("key", ttl).expect("expire missing"));
    assert!(conn.expire("key", ttl).expect("expire present"));
}

#[test]
fn server_error_reply_keeps_connection() {
    let addr = spawn_server(2, |idx, _args, stream| {
        if idx == 0 {
            write_raw(stream, b"-WRONGTYPE Operation against a key\r\n");
        } else {
            write_raw(stream, b":0\r\n");
        }
    });

    let pool = pool_with_addr(addr, None);
    {
        let mut conn = pool.acquire().expect("acquire");
        let err = conn.get("list").unwrap_err();
        assert!(matches!(err, ClientError::Server { .. }));
        assert!(conn.is_valid());
    }

    let mut conn = pool.acquire().expect("acquire");
    assert_eq!(conn.del("list").expect("del"), 0);
    drop(conn);
    assert_eq!(pool.stats().discarded, 0);
}

#[test]
fn broken_connection_is_discarded_on_release() {
    let addr = spawn_server(1, |_idx, _args, stream| {
        let _ = stream.shutdown(Shutdown::Both);
    });

    let pool = pool_with_addr(addr, None);
    {
        let mut conn = pool.acquire().expect("acquire");
        assert!(format!("{conn:?}").contains("valid: true"));
        assert!(conn.get("key").is_err());
        assert!(!conn.is_valid());
        assert!(format!("{conn:?}").contains("valid: false"));
    }

    let stats = pool.stats();
    assert_eq!(stats.released, 1);
    assert_eq!(stats.discarded, 1);
    assert_eq!(stats.idle, 0);
    assert_eq!(stats.total, 0);
}

#[test]
fn exhausted_pool_fails_fast_without_timeout() {
    let (_listener, addr) = silent_listener();
    let pool = pool_with_addr(addr, None);

    let held = pool.acquire().expect("first lease");
    assert!(matches!(pool.acquire(), Err(ClientError::PoolExhausted)));
    drop(held);
    assert!(pool.acquire().is_ok());
}

#[test]
fn exhausted_pool_times_out_after_waiting() {
    let (_listener, addr) = silent_listener();
    let wait = Duration::from_millis(100);
    let pool = pool_with_addr(addr, Some(wait));

    let _held = pool.acquire().expect("first lease");
    let start = Instant::now();
    let err = pool.acquire().unwrap_err();
    assert!(matches!(err, ClientError::AcquireTimeout(d) if d == wait));
    assert!(start.elapsed() >= wait);
}

#[test]
fn waiter_receives_released_connection() {
    let (_listener, addr) = silent_listener();
    let pool = pool_with_addr(addr, Some(Duration::from_secs(2)));

    let held = pool.acquire().expect("first lease");
    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || pool.acquire().map(|_| ()))
    };

    thread::sleep(Duration::from_millis(50));
    drop(held);
    waiter.join().expect("join").expect("waiter acquires");

    let stats = pool.stats();
    assert_eq!(stats.acquired, 2);
    assert_eq!(stats.released, 2);
    assert_eq!(stats.total, 1);
}

#[test]
fn closed_pool_rejects_acquire_and_drops_returns() {
    let (_listener, addr) = silent_listener();
    let pool = pool_with_addr(addr, None);

    let held = pool.acquire().expect("lease");
    pool.close();
    assert!(pool.is_closed());
    assert!(matches!(pool.acquire(), Err(ClientError::PoolClosed)));

    drop(held);
    let stats = pool.stats();
    assert_eq!(stats.idle, 0);
    assert_eq!(stats.total, 0);
}

#[test]
fn unreachable_server_frees_the_slot() {
    // Bind then drop to get a port nobody listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").to_string()
    };
    let pool = pool_with_addr(addr, None);

    assert!(matches!(pool.acquire(), Err(ClientError::Io(_))));
    assert_eq!(pool.stats().total, 0);
    assert_eq!(pool.stats().acquired, 0);
}

#[test]
fn test_on_borrow_pings_idle_connections() {
    let addr = spawn_server(2, |idx, args, stream| {
        if idx == 0 {
            assert_eq!(args[0], b"DEL");
            write_raw(stream, b":0\r\n");
        } else {
            assert_eq!(args, vec![b"PING".to_vec()]);
            write_raw(stream, b"+PONG\r\n");
        }
    });

    let mut config = PoolConfig::with_addr(addr);
    config.max_idle = 1;
    config.max_total = 1;
    config.read_timeout = Some(Duration::from_secs(1));
    config.test_on_borrow = true;
    let pool = ConnectionPool::new(config).expect("pool");

    // First lease is freshly opened, so no PING precedes DEL.
    pool.acquire().expect("acquire").del("k").expect("del");
    // Second lease comes from the idle set and is PINGed first.
    let conn = pool.acquire().expect("acquire idle");
    assert!(conn.is_valid());
}
