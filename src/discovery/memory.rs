//! In-memory coordination store, for tests and dry runs.

use super::{CoordinationStore, KeyNode};
use crate::error::{RedismapError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Flat `path -> value` leaves served as a sorted key tree
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    leaves: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut store = Self::new();
        for (key, value) in entries {
            store.insert(key, value);
        }
        store
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = format!("/{}", key.into().trim_matches('/'));
        self.leaves.insert(key, value.into());
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn get_tree(&self, path: &str) -> Result<KeyNode> {
        let root = format!("/{}", path.trim_matches('/'));
        let below = format!("{}/", root.trim_end_matches('/'));

        let entries: Vec<(&str, &str)> = self
            .leaves
            .iter()
            .filter(|(k, _)| **k == root || k.starts_with(&below))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        if entries.is_empty() {
            return Err(RedismapError::discovery(&root, "Key not found"));
        }
        Ok(build_node(&root, &entries))
    }
}

fn build_node(path: &str, entries: &[(&str, &str)]) -> KeyNode {
    if let [(key, value)] = entries {
        if *key == path {
            return KeyNode {
                key: path.to_string(),
                dir: false,
                value: Some(value.to_string()),
                nodes: Vec::new(),
            };
        }
    }

    let base = path.trim_end_matches('/');
    let mut children: BTreeMap<&str, Vec<(&str, &str)>> = BTreeMap::new();
    for &(key, value) in entries {
        let Some(rest) = key.strip_prefix(base).and_then(|r| r.strip_prefix('/')) else {
            continue;
        };
        let segment = rest.split('/').next().unwrap_or(rest);
        children.entry(segment).or_default().push((key, value));
    }

    KeyNode {
        key: path.to_string(),
        dir: true,
        value: None,
        nodes: children
            .into_iter()
            .map(|(segment, group)| build_node(&format!("{}/{}", base, segment), &group))
            .collect(),
    }
}
