//! Replication status probe
//!
//! Opens a short-lived connection to one host, sends `INFO replication`
//! and hands back the parsed field map. Every call carries its own timeout.

pub mod info;

pub use info::{parse_info, InfoMap, Role};

use crate::error::{RedismapError, Result};
use crate::protocol::{RespParser, RespValue};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Fetches the replication fields of one host
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe `address` (`host:port`), giving up after `timeout` per attempt.
    async fn probe(&self, address: &str, timeout: Duration) -> Result<InfoMap>;
}

/// Probe speaking RESP over TCP
#[derive(Debug, Clone, Default)]
pub struct RedisProbe {
    retry: RetryPolicy,
}

/// Largest reply buffered before the host is given up on
pub const MAX_REPLY_BYTES: usize = 1024 * 1024;

impl RedisProbe {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }
}

#[async_trait]
impl Prober for RedisProbe {
    async fn probe(&self, address: &str, timeout: Duration) -> Result<InfoMap> {
        let reply = self
            .retry
            .run_if(address, move || fetch_reply(address, timeout), is_transient)
            .await
            .map_err(|e| attribute(address, e))?;
        let text = reply_text(address, reply)?;
        let info = parse_info(&text);
        debug!("{} answered with {} replication fields", address, info.len());
        Ok(info)
    }
}

/// Connection, write and read failures and timeouts; a reply that could not
/// be decoded is not retried.
fn is_transient(err: &RedismapError) -> bool {
    matches!(err, RedismapError::Probe { .. })
}

/// Tie a decoding failure to the host that sent it
fn attribute(address: &str, err: RedismapError) -> RedismapError {
    match err {
        RedismapError::Protocol(reason) => RedismapError::probe(address, reason),
        other => other,
    }
}

/// One `INFO replication` round trip bounded by `timeout`.
async fn fetch_reply(address: &str, timeout: Duration) -> Result<RespValue> {
    match tokio::time::timeout(timeout, exchange(address)).await {
        Ok(result) => result,
        Err(_) => Err(RedismapError::probe(
            address,
            format!("timed out after {:?}", timeout),
        )),
    }
}

async fn exchange(address: &str) -> Result<RespValue> {
    let mut stream = TcpStream::connect(address)
        .await
        .map_err(|e| RedismapError::probe(address, e))?;

    let request = RespValue::command(["INFO", "replication"]).serialize();
    stream
        .write_all(&request)
        .await
        .map_err(|e| RedismapError::probe(address, e))?;

    let mut parser = RespParser::new(4096);
    loop {
        if let Some(reply) = parser.parse()? {
            return Ok(reply);
        }
        if parser.buffered() > MAX_REPLY_BYTES {
            return Err(RedismapError::Protocol(format!(
                "reply larger than {} bytes",
                MAX_REPLY_BYTES
            )));
        }

        let n = stream
            .read_buf(parser.buffer_mut())
            .await
            .map_err(|e| RedismapError::probe(address, e))?;
        if n == 0 {
            return Err(RedismapError::probe(
                address,
                "connection closed before a complete reply",
            ));
        }
    }
}

fn reply_text(address: &str, reply: RespValue) -> Result<String> {
    match reply {
        RespValue::Error(msg) => Err(RedismapError::probe(address, format!("server error: {}", msg))),
        other => other.as_text().ok_or_else(|| {
            RedismapError::probe(address, format!("unexpected {} reply", other.kind()))
        }),
    }
}
