//! # RESP2 Encoding and Parsing
//!
//! Purpose: Frame client commands and decode server replies for the pooled
//! connections, keeping per-call allocations to the reply payload itself.
//!
//! ## Design Principles
//! 1. **Top-Down Parsing**: One reply is read per call, recursing for arrays.
//! 2. **Buffer Reuse**: Callers own the line and write buffers.
//! 3. **Binary-Safe**: Bulk strings are raw bytes (`Bytes`), never decoded.
//! 4. **Fail Fast**: Any framing violation is `ClientError::Protocol`.

use std::io::{BufRead, Read};

use bytes::Bytes;

use crate::error::{ClientError, ClientResult};

const CRLF: &[u8] = b"\r\n";

/// Largest bulk string accepted, matching the server-side 512 MiB limit.
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;
/// Largest element count accepted in one array header.
const MAX_ARRAY_LEN: i64 = 1024 * 1024;
/// Deepest array nesting accepted in one reply.
const MAX_DEPTH: usize = 32;

/// RESP reply value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// +OK or +PONG style replies.
    Simple(Vec<u8>),
    /// -ERR ... replies.
    Error(Vec<u8>),
    /// :123 replies.
    Integer(i64),
    /// $... bulk strings, with None for the null bulk string.
    Bulk(Option<Bytes>),
    /// *... arrays; a null array decodes as empty.
    Array(Vec<RespValue>),
}

/// Appends `args` to `out` as a RESP2 array of bulk strings.
pub fn encode_command(args: &[&[u8]], out: &mut Vec<u8>) {
    push_header(out, b'*', args.len());
    for arg in args {
        push_header(out, b'$', arg.len());
        out.extend_from_slice(arg);
        out.extend_from_slice(CRLF);
    }
}

/// Reads one complete reply from `reader`.
pub fn read_response<R: BufRead>(reader: &mut R, line_buf: &mut Vec<u8>) -> ClientResult<RespValue> {
    read_value(reader, line_buf, 0)
}

fn read_value<R: BufRead>(reader: &mut R, line_buf: &mut Vec<u8>, depth: usize) -> ClientResult<RespValue> {
    read_line(reader, line_buf)?;
    let (&tag, rest) = line_buf.split_first().ok_or(ClientError::Protocol)?;

    match tag {
        b'+' => Ok(RespValue::Simple(rest.to_vec())),
        b'-' => Ok(RespValue::Error(rest.to_vec())),
        b':' => parse_i64(rest).map(RespValue::Integer),
        b'$' => {
            let len = parse_i64(rest)?;
            read_bulk(reader, len)
        }
        b'*' => {
            let len = parse_i64(rest)?;
            if len == -1 {
                return Ok(RespValue::Array(Vec::new()));
            }
            if !(0..=MAX_ARRAY_LEN).contains(&len) || depth >= MAX_DEPTH {
                return Err(ClientError::Protocol);
            }
            let mut items = Vec::with_capacity(len.min(64) as usize);
            for _ in 0..len {
                items.push(read_value(reader, line_buf, depth + 1)?);
            }
            Ok(RespValue::Array(items))
        }
        _ => Err(ClientError::Protocol),
    }
}

fn read_bulk<R: BufRead>(reader: &mut R, len: i64) -> ClientResult<RespValue> {
    if len == -1 {
        return Ok(RespValue::Bulk(None));
    }
    if !(0..=MAX_BULK_LEN).contains(&len) {
        return Err(ClientError::Protocol);
    }

    // Payload and trailing CRLF; the buffer grows with the bytes actually
    // received rather than with the advertised length.
    let expected = len as usize + CRLF.len();
    let mut data = Vec::with_capacity(expected.min(64 * 1024));
    reader.by_ref().take(expected as u64).read_to_end(&mut data)?;
    if data.len() != expected {
        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
    }
    if !data.ends_with(CRLF) {
        return Err(ClientError::Protocol);
    }
    data.truncate(len as usize);
    Ok(RespValue::Bulk(Some(Bytes::from(data))))
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> ClientResult<()> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Err(ClientError::Protocol);
    }
    if !buf.ends_with(CRLF) {
        return Err(ClientError::Protocol);
    }
    buf.truncate(buf.len() - CRLF.len());
    Ok(())
}

fn parse_i64(digits: &[u8]) -> ClientResult<i64> {
    std::str::from_utf8(digits)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or(ClientError::Protocol)
}

fn push_header(out: &mut Vec<u8>, tag: u8, len: usize) {
    out.push(tag);
    push_decimal(out, len as u64);
    out.extend_from_slice(CRLF);
}

/// Appends the decimal digits of `value` without allocating.
pub(crate) fn push_decimal(out: &mut Vec<u8>, value: u64) {
    let mut digits = [0u8; 20];
    let mut pos = digits.len();
    let mut rest = value;
    loop {
        pos -= 1;
        digits[pos] = b'0' + (rest % 10) as u8;
        rest /= 10;
        if rest == 0 {
            break;
        }
    }
    out.extend_from_slice(&digits[pos..]);
}
