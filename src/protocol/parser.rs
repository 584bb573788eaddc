use super::types::RespValue;
use crate::error::{RedismapError, Result};
use bytes::{Buf, Bytes, BytesMut};
use std::io::Cursor;

/// Outcome of a parse attempt that did not produce a value
enum Stall {
    /// The buffer ends in the middle of a value
    Incomplete,
    /// The buffer holds bytes that are not RESP
    Invalid(String),
}

type Step<T> = std::result::Result<T, Stall>;

/// Deepest array nesting accepted in a reply
pub const MAX_NESTING: usize = 32;

/// Incremental RESP reply parser
pub struct RespParser {
    buffer: BytesMut,
}

impl RespParser {
    /// Create a new parser with a given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Add data to the parser buffer
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Get a mutable reference to the buffer
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Bytes received but not yet consumed by a complete value
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Try to parse a complete RESP value from the buffer.
    ///
    /// Returns `Ok(None)` when more data is needed and an error when the
    /// buffered bytes can never form a valid value.
    pub fn parse(&mut self) -> Result<Option<RespValue>> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let mut cursor = Cursor::new(&self.buffer[..]);
        match parse_value(&mut cursor, 0) {
            Ok(value) => {
                let pos = cursor.position() as usize;
                self.buffer.advance(pos);
                Ok(Some(value))
            }
            Err(Stall::Incomplete) => Ok(None),
            Err(Stall::Invalid(msg)) => Err(RedismapError::Protocol(msg)),
        }
    }
}

fn parse_value(cursor: &mut Cursor<&[u8]>, depth: usize) -> Step<RespValue> {
    let pos = cursor.position() as usize;
    let Some(&marker) = cursor.get_ref().get(pos) else {
        return Err(Stall::Incomplete);
    };
    cursor.set_position(pos as u64 + 1);

    match marker {
        b'+' => Ok(RespValue::SimpleString(read_line(cursor)?)),
        b'-' => Ok(RespValue::Error(read_line(cursor)?)),
        b':' => {
            let line = read_line(cursor)?;
            line.parse::<i64>()
                .map(RespValue::Integer)
                .map_err(|_| Stall::Invalid(format!("Invalid integer: {}", line)))
        }
        b'$' => parse_bulk_string(cursor),
        b'*' => parse_array(cursor, depth),
        other => Err(Stall::Invalid(format!(
            "Invalid RESP type marker: {}",
            other as char
        ))),
    }
}

fn parse_bulk_string(cursor: &mut Cursor<&[u8]>) -> Step<RespValue> {
    let len = read_length(cursor, "bulk string")?;
    let Some(len) = len else {
        return Ok(RespValue::BulkString(None));
    };

    let pos = cursor.position() as usize;
    let data = cursor.get_ref();
    if pos + len + 2 > data.len() {
        return Err(Stall::Incomplete);
    }
    if &data[pos + len..pos + len + 2] != b"\r\n" {
        return Err(Stall::Invalid(
            "Bulk string not terminated by CRLF".to_string(),
        ));
    }

    let bytes = Bytes::copy_from_slice(&data[pos..pos + len]);
    cursor.set_position((pos + len + 2) as u64);
    Ok(RespValue::BulkString(Some(bytes)))
}

fn parse_array(cursor: &mut Cursor<&[u8]>, depth: usize) -> Step<RespValue> {
    if depth >= MAX_NESTING {
        return Err(Stall::Invalid(format!(
            "Array nesting deeper than {} levels",
            MAX_NESTING
        )));
    }
    let Some(len) = read_length(cursor, "array")? else {
        return Ok(RespValue::Array(None));
    };

    let mut array = Vec::with_capacity(len.min(1024));
    for _ in 0..len {
        array.push(parse_value(cursor, depth + 1)?);
    }
    Ok(RespValue::Array(Some(array)))
}

/// Reads a length header. `-1` is the null marker.
fn read_length(cursor: &mut Cursor<&[u8]>, what: &str) -> Step<Option<usize>> {
    let line = read_line(cursor)?;
    let len = line
        .parse::<i64>()
        .map_err(|_| Stall::Invalid(format!("Invalid {} length: {}", what, line)))?;

    match len {
        -1 => Ok(None),
        n if n < 0 => Err(Stall::Invalid(format!("Invalid {} length: {}", what, n))),
        n => Ok(Some(n as usize)),
    }
}

fn read_line(cursor: &mut Cursor<&[u8]>) -> Step<String> {
    let start = cursor.position() as usize;
    let data = cursor.get_ref();
    let rest = data.get(start..).unwrap_or_default();

    match rest.windows(2).position(|w| w == b"\r\n") {
        Some(offset) => {
            let line = String::from_utf8_lossy(&rest[..offset]).into_owned();
            cursor.set_position((start + offset + 2) as u64);
            Ok(line)
        }
        None => Err(Stall::Incomplete),
    }
}
