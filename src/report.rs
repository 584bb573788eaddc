//! Report data model
//!
//! Serialized as `cluster_key -> host_address -> {host, role, info, replicas}`.

use crate::error::RedismapError;
use crate::probe::{InfoMap, Role};
use crate::replica::ReplicaRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Category of a non-fatal problem recorded against a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Probe,
    MalformedRecord,
    Resolution,
    Cancelled,
}

/// A recorded problem that did not stop the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub message: String,
}

impl Issue {
    pub fn cancelled() -> Self {
        Self {
            kind: IssueKind::Cancelled,
            message: "run cancelled before the probe finished".to_string(),
        }
    }
}

impl From<&RedismapError> for Issue {
    fn from(err: &RedismapError) -> Self {
        let kind = match err {
            RedismapError::MalformedRecord { .. } => IssueKind::MalformedRecord,
            RedismapError::Resolution { .. } => IssueKind::Resolution,
            _ => IssueKind::Probe,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// Replication view of one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    pub host: String,
    pub role: Role,
    pub info: InfoMap,
    #[serde(default)]
    pub replicas: Vec<ReplicaRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Issue>,
}

impl HostInfo {
    /// Host whose probe produced the given fields
    pub fn probed(host: impl Into<String>, info: InfoMap) -> Self {
        Self {
            host: host.into(),
            role: Role::from_info(&info),
            info,
            replicas: Vec::new(),
            issues: Vec::new(),
        }
    }

    /// Placeholder for a host that could not be probed
    pub fn unreachable(host: impl Into<String>, issue: Issue) -> Self {
        Self {
            host: host.into(),
            role: Role::Unknown,
            info: InfoMap::new(),
            replicas: Vec::new(),
            issues: vec![issue],
        }
    }

    pub fn is_master(&self) -> bool {
        self.role == Role::Master
    }

    /// Replicas as `hostname:port`, resolved name preferred
    pub fn replica_hosts(&self) -> Vec<String> {
        self.replicas
            .iter()
            .map(ReplicaRecord::display_address)
            .collect()
    }
}

/// Hosts of one cluster keyed by address
pub type ClusterHosts = BTreeMap<String, HostInfo>;

/// Full report keyed by cluster key
pub type ClusterReport = BTreeMap<String, ClusterHosts>;

/// Result of one run: the report plus the cluster keys that could not be
/// discovered
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterMapOutcome {
    pub report: ClusterReport,
    pub discovery_errors: BTreeMap<String, String>,
}

impl ClusterMapOutcome {
    pub fn host_count(&self) -> usize {
        self.report.values().map(BTreeMap::len).sum()
    }

    /// Masters that report no replicas, as `(cluster_key, address)`
    pub fn masters_without_replicas(&self) -> Vec<(&str, &str)> {
        self.report
            .iter()
            .flat_map(|(key, hosts)| {
                hosts
                    .iter()
                    .filter(|(_, h)| h.is_master() && h.replicas.is_empty())
                    .map(move |(addr, _)| (key.as_str(), addr.as_str()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::parse_info;
    use serde_json::json;

    #[test]
    fn test_serialized_shape() {
        let host = HostInfo::probed("prod-web:6379", parse_info("role:master\nconnected_slaves:0"));
        let mut hosts = ClusterHosts::new();
        hosts.insert(host.host.clone(), host);
        let mut report = ClusterReport::new();
        report.insert("prod".to_string(), hosts);

        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(
            value,
            json!({
                "prod": {
                    "prod-web:6379": {
                        "host": "prod-web:6379",
                        "role": "master",
                        "info": {"role": "master", "connected_slaves": "0"},
                        "replicas": []
                    }
                }
            })
        );
    }

    #[test]
    fn test_unreachable_host() {
        let err = RedismapError::probe("prod-web:6380", "connection refused");
        let host = HostInfo::unreachable("prod-web:6380", Issue::from(&err));

        assert_eq!(host.role, Role::Unknown);
        assert!(host.info.is_empty());
        assert_eq!(host.issues[0].kind, IssueKind::Probe);

        let value = serde_json::to_value(&host).unwrap();
        assert_eq!(value["issues"][0]["kind"], "probe");
    }

    #[test]
    fn test_issue_kind_from_error() {
        let malformed = RedismapError::malformed("slave0", "missing lag");
        assert_eq!(Issue::from(&malformed).kind, IssueKind::MalformedRecord);

        let resolution = RedismapError::resolution("10.0.0.5", "no PTR");
        assert_eq!(Issue::from(&resolution).kind, IssueKind::Resolution);
    }

    #[test]
    fn test_masters_without_replicas() {
        let mut outcome = ClusterMapOutcome::default();
        let lonely = HostInfo::probed("a:1", parse_info("role:master\nconnected_slaves:0"));
        let replica = HostInfo::probed("b:1", parse_info("role:slave"));
        let hosts: ClusterHosts = [("a:1".to_string(), lonely), ("b:1".to_string(), replica)]
            .into_iter()
            .collect();
        outcome.report.insert("prod".to_string(), hosts);

        assert_eq!(outcome.masters_without_replicas(), vec![("prod", "a:1")]);
        assert_eq!(outcome.host_count(), 2);
    }
}
