//! Reverse lookup of replica addresses into display names.

use crate::error::{RedismapError, Result};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::warn;

/// Source of reverse-lookup answers
#[async_trait]
pub trait ReverseLookup: Send + Sync {
    /// Names registered for `ip`, best candidate first
    async fn lookup(&self, ip: IpAddr) -> std::io::Result<Vec<String>>;
}

/// `getnameinfo` through the system resolver, run on the blocking pool
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLookup;

#[async_trait]
impl ReverseLookup for SystemLookup {
    async fn lookup(&self, ip: IpAddr) -> std::io::Result<Vec<String>> {
        let name = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&ip))
            .await
            .map_err(std::io::Error::other)??;
        Ok(vec![name])
    }
}

/// Turns replica IPs into hostnames, falling back to the address itself
#[derive(Clone)]
pub struct HostnameResolver {
    lookup: Arc<dyn ReverseLookup>,
    retry: RetryPolicy,
}

impl HostnameResolver {
    pub fn new(lookup: Arc<dyn ReverseLookup>, retry: RetryPolicy) -> Self {
        Self { lookup, retry }
    }

    /// Resolver backed by the system resolver
    pub fn system(retry: RetryPolicy) -> Self {
        Self::new(Arc::new(SystemLookup), retry)
    }

    /// Reverse-resolve `address`, surfacing why it failed.
    pub async fn try_resolve(&self, address: &str) -> Result<String> {
        let ip: IpAddr = address
            .parse()
            .map_err(|e| RedismapError::resolution(address, e))?;

        let names = self
            .retry
            .run(address, move || async move {
                self.lookup
                    .lookup(ip)
                    .await
                    .map_err(|e| RedismapError::resolution(address, e))
            })
            .await?;

        names
            .into_iter()
            .map(|name| name.trim_end_matches('.').to_string())
            .find(|name| !name.is_empty())
            .ok_or_else(|| RedismapError::resolution(address, "no names returned"))
    }

    /// Reverse-resolve `address`; any failure yields `address` unchanged.
    pub async fn resolve(&self, address: &str) -> String {
        match self.try_resolve(address).await {
            Ok(name) => name,
            Err(e) => {
                warn!("{}", e);
                address.to_string()
            }
        }
    }
}
