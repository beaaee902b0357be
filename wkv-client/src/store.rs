//! Store primitives over a leased RESP connection.

use bytes::Bytes;

use wkv_common::{Pool, StoreConnection, Ttl};

use crate::error::{ClientError, ClientResult};
use crate::pool::{ConnectionPool, PooledConnection};
use crate::resp::{push_decimal, RespValue};

impl StoreConnection for PooledConnection {
    type Error = ClientError;

    fn set(&mut self, key: &str, value: &[u8]) -> ClientResult<String> {
        let reply = self.exec(&[b"SET", key.as_bytes(), value])?;
        status_reply(reply)
    }

    /// Uses `SET key value EX seconds`, so value and TTL land atomically.
    fn set_ex(&mut self, key: &str, value: &[u8], ttl: Ttl) -> ClientResult<String> {
        let mut seconds = Vec::with_capacity(20);
        push_decimal(&mut seconds, ttl.as_secs());
        let reply = self.exec(&[b"SET", key.as_bytes(), value, b"EX", &seconds])?;
        status_reply(reply)
    }

    fn get(&mut self, key: &str) -> ClientResult<Option<Bytes>> {
        match self.exec(&[b"GET", key.as_bytes()])? {
            RespValue::Bulk(data) => Ok(data),
            RespValue::Error(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    fn del(&mut self, key: &str) -> ClientResult<u64> {
        match self.exec(&[b"DEL", key.as_bytes()])? {
            RespValue::Integer(count) if count >= 0 => Ok(count as u64),
            RespValue::Error(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    fn expire(&mut self, key: &str, ttl: Ttl) -> ClientResult<bool> {
        let mut seconds = Vec::with_capacity(20);
        push_decimal(&mut seconds, ttl.as_secs());
        match self.exec(&[b"EXPIRE", key.as_bytes(), &seconds])? {
            RespValue::Integer(flag) => Ok(flag == 1),
            RespValue::Error(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}

impl Pool for ConnectionPool {
    type Connection = PooledConnection;
    type Error = ClientError;

    fn acquire(&self) -> ClientResult<PooledConnection> {
        ConnectionPool::acquire(self)
    }

    fn close(&self) {
        ConnectionPool::close(self)
    }
}

fn status_reply(reply: RespValue) -> ClientResult<String> {
    match reply {
        RespValue::Simple(status) => Ok(String::from_utf8_lossy(&status).into_owned()),
        RespValue::Error(message) => Err(ClientError::Server { message }),
        _ => Err(ClientError::UnexpectedResponse),
    }
}
