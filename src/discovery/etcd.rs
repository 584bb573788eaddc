//! etcd v2 keys API client
//!
//! Reads are recursive and sorted. Endpoints are tried in order; a transport
//! failure or a 5xx moves on to the next one, a 4xx answer does not.

use super::{CoordinationStore, KeyNode};
use crate::error::{RedismapError, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct KeysResponse {
    node: KeyNode,
}

#[derive(Debug, Deserialize)]
struct KeysError {
    #[serde(rename = "errorCode")]
    error_code: i64,
    message: String,
    #[serde(default)]
    cause: Option<String>,
}

/// HTTP client for the etcd v2 keys API
#[derive(Debug, Clone)]
pub struct EtcdStore {
    client: Client,
    endpoints: Vec<String>,
}

impl EtcdStore {
    /// Create a client for `endpoints` (e.g. `http://127.0.0.1:2379`), each
    /// request bounded by `request_timeout`.
    pub fn new<I, S>(endpoints: I, request_timeout: Duration) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let endpoints: Vec<String> = endpoints
            .into_iter()
            .map(|e| e.into().trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty())
            .collect();
        if endpoints.is_empty() {
            return Err(RedismapError::Config(
                "at least one etcd endpoint is required".to_string(),
            ));
        }

        let client = ClientBuilder::new()
            .timeout(request_timeout)
            .connect_timeout(request_timeout)
            .build()
            .map_err(|e| RedismapError::Config(format!("etcd client: {}", e)))?;

        Ok(Self { client, endpoints })
    }

    fn keys_url(endpoint: &str, path: &str) -> String {
        format!("{}/v2/keys/{}", endpoint, path.trim_start_matches('/'))
    }

    async fn get_from(&self, endpoint: &str, path: &str) -> std::result::Result<KeyNode, Attempt> {
        let url = Self::keys_url(endpoint, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[("recursive", "true"), ("sorted", "true")])
            .send()
            .await
            .map_err(|e| Attempt::Unreachable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Attempt::Unreachable(e.to_string()))?;

        if !status.is_success() {
            let reason = match serde_json::from_str::<KeysError>(&body) {
                Ok(err) => match err.cause {
                    Some(cause) => format!("{} ({}) [code {}]", err.message, cause, err.error_code),
                    None => format!("{} [code {}]", err.message, err.error_code),
                },
                Err(_) => format!("HTTP {}", status),
            };
            if status.is_server_error() {
                return Err(Attempt::Unreachable(reason));
            }
            return Err(Attempt::Rejected(reason));
        }

        serde_json::from_str::<KeysResponse>(&body)
            .map(|r| r.node)
            .map_err(|e| Attempt::Rejected(format!("malformed response: {}", e)))
    }
}

enum Attempt {
    Unreachable(String),
    Rejected(String),
}

#[async_trait]
impl CoordinationStore for EtcdStore {
    async fn get_tree(&self, path: &str) -> Result<KeyNode> {
        let mut failures = Vec::new();
        for endpoint in &self.endpoints {
            match self.get_from(endpoint, path).await {
                Ok(node) => return Ok(node),
                Err(Attempt::Rejected(reason)) => {
                    return Err(RedismapError::discovery(path, reason));
                }
                Err(Attempt::Unreachable(reason)) => {
                    warn!("etcd endpoint {} unreachable: {}", endpoint, reason);
                    failures.push(format!("{}: {}", endpoint, reason));
                }
            }
        }
        Err(RedismapError::discovery(
            path,
            format!("all endpoints failed ({})", failures.join("; ")),
        ))
    }
}
