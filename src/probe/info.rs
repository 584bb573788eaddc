//! Parsing of `INFO` text blocks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Raw `INFO` fields of one host
pub type InfoMap = BTreeMap<String, String>;

/// Parse an `INFO` reply body into a field map.
///
/// Every line holding a colon is split at its first colon, so values such as
/// `master_host:::1` keep their own colons. Section headers and blank lines
/// carry no colon and are skipped.
pub fn parse_info(text: &str) -> InfoMap {
    text.split('\n')
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.to_string(), value.trim().to_string()))
        .collect()
}

/// Replication role reported by a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Master,
    Slave,
    Unknown,
}

impl Role {
    /// Derive the role from the `role` field, anything but an exact
    /// `master` or `slave` is unknown.
    pub fn from_info(info: &InfoMap) -> Self {
        match info.get("role").map(String::as_str) {
            Some("master") => Role::Master,
            Some("slave") => Role::Slave,
            _ => Role::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Master => "master",
            Role::Slave => "slave",
            Role::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
