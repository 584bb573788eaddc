//! Cluster membership discovery from the coordination store
//!
//! Members live under `<prefix>/<cluster_key>/...`. Each leaf is one host:
//! the segments between the prefix and the leaf, joined with `-`, name the
//! host and the leaf supplies the port. Grouping depth is not fixed.

pub mod etcd;
pub mod memory;

pub use etcd::EtcdStore;
pub use memory::MemoryStore;

use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default root of the cluster namespace
pub const DEFAULT_PREFIX: &str = "/redis/cluster/site";

/// One node of the store's key tree
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct KeyNode {
    pub key: String,
    #[serde(default)]
    pub dir: bool,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub nodes: Vec<KeyNode>,
}

impl KeyNode {
    /// Depth-first visit of every non-directory node, children in stored order
    pub fn leaves(&self) -> Vec<&KeyNode> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a KeyNode>) {
        if !self.dir {
            out.push(self);
            return;
        }
        for child in &self.nodes {
            child.collect_leaves(out);
        }
    }
}

/// Read access to the hierarchical coordination store
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// The whole subtree rooted at `path`, children sorted by key
    async fn get_tree(&self, path: &str) -> Result<KeyNode>;
}

/// Resolves a cluster key into the `host:port` addresses of its members
#[derive(Clone)]
pub struct TopologyResolver {
    store: Arc<dyn CoordinationStore>,
    prefix: String,
}

impl TopologyResolver {
    pub fn new(store: Arc<dyn CoordinationStore>, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into().trim_end_matches('/').to_string();
        Self { store, prefix }
    }

    /// Store path holding the members of `cluster_key`
    pub fn cluster_path(&self, cluster_key: &str) -> String {
        format!("{}/{}", self.prefix, cluster_key.trim_matches('/'))
    }

    /// Member addresses of `cluster_key` in store order, duplicates removed.
    ///
    /// Any store failure is returned as a discovery error.
    pub async fn resolve_hosts(&self, cluster_key: &str) -> Result<Vec<String>> {
        let path = self.cluster_path(cluster_key);
        let tree = self.store.get_tree(&path).await?;

        let mut seen = HashSet::new();
        let mut hosts = Vec::new();
        for leaf in tree.leaves() {
            let Some(address) = leaf_address(&self.prefix, leaf) else {
                warn!("Skipping key '{}': cannot derive host:port", leaf.key);
                continue;
            };
            debug!("full host: {}", address);
            if seen.insert(address.clone()) {
                hosts.push(address);
            }
        }
        Ok(hosts)
    }
}

/// Hostname label for a leaf key: every segment after `prefix` except the
/// last, joined with `-`. `None` when no grouping segment remains.
pub fn host_label(prefix: &str, key: &str) -> Option<String> {
    let rest = key.strip_prefix(prefix)?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    match segments.split_last() {
        Some((_, groups)) if !groups.is_empty() => Some(groups.join("-")),
        _ => None,
    }
}

/// Port of a leaf: its value when that is a valid port, otherwise the final
/// key segment.
pub fn leaf_port(leaf: &KeyNode) -> Option<u16> {
    leaf.value
        .as_deref()
        .and_then(|value| value.trim().parse().ok())
        .or_else(|| leaf.key.rsplit('/').next()?.parse().ok())
}

/// `host:port` for one leaf under `prefix`
pub fn leaf_address(prefix: &str, leaf: &KeyNode) -> Option<String> {
    let label = host_label(prefix, &leaf.key)?;
    let port = leaf_port(leaf)?;
    Some(format!("{}:{}", label, port))
}
