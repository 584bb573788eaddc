//! Replica records embedded in a master's `INFO replication` output.
//!
//! A master lists each connected replica under `slave<N>`, with a value of the
//! form `ip=10.0.0.5,port=6379,state=online,offset=100,lag=0`.

use crate::error::{RedismapError, Result};
use crate::probe::{InfoMap, Role};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

const REQUIRED_FIELDS: [&str; 5] = ["ip", "port", "state", "offset", "lag"];

/// One connected replica as seen by its master
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaRecord {
    pub address: String,
    pub port: u16,
    pub state: String,
    pub offset: u64,
    pub lag: u64,
    /// Reverse-resolved name of `address`, filled in after parsing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

impl ReplicaRecord {
    /// `host:port` using the resolved name when there is one
    pub fn display_address(&self) -> String {
        format!(
            "{}:{}",
            self.hostname.as_deref().unwrap_or(&self.address),
            self.port
        )
    }
}

/// Index `N` of a `slave<N>` key. Keys such as `slave_repl_offset` are not
/// replica entries.
pub fn replica_index(key: &str) -> Option<u32> {
    let digits = key.strip_prefix("slave")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Decode one `slave<N>` value. Segments without `=` are skipped; any missing
/// or unparseable required field rejects the whole record.
pub fn parse_record(key: &str, value: &str) -> Result<ReplicaRecord> {
    let fields: HashMap<&str, &str> = value
        .split(',')
        .filter_map(|segment| segment.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
        .collect();

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|f| !fields.contains_key(f))
        .collect();
    if !missing.is_empty() {
        return Err(RedismapError::malformed(
            key,
            format!("missing {}", missing.join(", ")),
        ));
    }

    Ok(ReplicaRecord {
        address: fields["ip"].to_string(),
        port: numeric(key, "port", fields["port"])?,
        state: fields["state"].to_string(),
        offset: numeric(key, "offset", fields["offset"])?,
        lag: numeric(key, "lag", fields["lag"])?,
        hostname: None,
    })
}

fn numeric<T: FromStr>(key: &str, field: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| RedismapError::malformed(key, format!("{} is not a number: '{}'", field, raw)))
}

/// Replica records of a host, ordered by replica index.
///
/// Only masters with `connected_slaves` other than `"0"` carry replicas;
/// every other host yields nothing. Malformed entries are returned as errors
/// next to the well-formed records.
pub fn extract_replicas(info: &InfoMap) -> (Vec<ReplicaRecord>, Vec<RedismapError>) {
    if Role::from_info(info) != Role::Master
        || info.get("connected_slaves").map(String::as_str) == Some("0")
    {
        return (Vec::new(), Vec::new());
    }

    let mut indexed: Vec<(u32, &str, &str)> = info
        .iter()
        .filter_map(|(key, value)| replica_index(key).map(|n| (n, key.as_str(), value.as_str())))
        .collect();
    indexed.sort_by_key(|(n, _, _)| *n);

    let mut records = Vec::with_capacity(indexed.len());
    let mut errors = Vec::new();
    for (_, key, value) in indexed {
        match parse_record(key, value) {
            Ok(record) => records.push(record),
            Err(e) => errors.push(e),
        }
    }
    (records, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::parse_info;

    #[test]
    fn test_replica_index() {
        assert_eq!(replica_index("slave0"), Some(0));
        assert_eq!(replica_index("slave12"), Some(12));
        assert_eq!(replica_index("slave"), None);
        assert_eq!(replica_index("slave_repl_offset"), None);
        assert_eq!(replica_index("slave_read_only"), None);
        assert_eq!(replica_index("slave1a"), None);
        assert_eq!(replica_index("master0"), None);
    }

    #[test]
    fn test_single_replica() {
        let info = parse_info(
            "role:master\nconnected_slaves:1\nslave0:ip=10.0.0.5,port=6379,state=online,offset=100,lag=0",
        );

        let (records, errors) = extract_replicas(&info);

        assert!(errors.is_empty());
        assert_eq!(
            records,
            vec![ReplicaRecord {
                address: "10.0.0.5".to_string(),
                port: 6379,
                state: "online".to_string(),
                offset: 100,
                lag: 0,
                hostname: None,
            }]
        );
    }

    #[test]
    fn test_records_sorted_by_numeric_index() {
        let mut info = InfoMap::new();
        info.insert("role".into(), "master".into());
        info.insert("connected_slaves".into(), "3".into());
        for n in [10, 2, 1] {
            info.insert(
                format!("slave{}", n),
                format!("ip=10.0.0.{},port=6379,state=online,offset=1,lag=0", n),
            );
        }

        let (records, _) = extract_replicas(&info);
        let addrs: Vec<&str> = records.iter().map(|r| r.address.as_str()).collect();

        assert_eq!(addrs, vec!["10.0.0.1", "10.0.0.2", "10.0.0.10"]);
    }

    #[test]
    fn test_malformed_record_dropped() {
        let info = parse_info(
            "role:master\n\
             connected_slaves:2\n\
             slave0:ip=10.0.0.5,port=6379,state=online,offset=100\n\
             slave1:ip=10.0.0.6,port=6380,state=wait_bgsave,offset=0,lag=3\n",
        );

        let (records, errors) = extract_replicas(&info);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].port, 6380);
        assert_eq!(errors.len(), 1);
        let msg = errors[0].to_string();
        assert!(msg.contains("slave0") && msg.contains("lag"));
    }

    #[test]
    fn test_non_numeric_field_rejected() {
        let err = parse_record("slave0", "ip=a,port=http,state=online,offset=1,lag=0").unwrap_err();
        assert!(matches!(err, RedismapError::MalformedRecord { .. }));
    }

    #[test]
    fn test_segment_without_equals_skipped() {
        let record = parse_record("slave3", "ip=10.1.1.1,junk,port=7000,state=online,offset=5,lag=1")
            .unwrap();
        assert_eq!(record.port, 7000);
        assert_eq!(record.display_address(), "10.1.1.1:7000");
    }

    #[test]
    fn test_no_replicas_when_zero_connected() {
        let info = parse_info(
            "role:master\nconnected_slaves:0\nslave0:ip=10.0.0.5,port=6379,state=online,offset=100,lag=0",
        );
        let (records, errors) = extract_replicas(&info);
        assert!(records.is_empty() && errors.is_empty());
    }

    #[test]
    fn test_no_replicas_for_slave_role() {
        let info = parse_info(
            "role:slave\nmaster_host:10.0.0.1\nslave_repl_offset:100\nslave_read_only:1",
        );
        let (records, errors) = extract_replicas(&info);
        assert!(records.is_empty() && errors.is_empty());
    }

    #[test]
    fn test_master_ignores_non_replica_slave_keys() {
        let info = parse_info(
            "role:master\nconnected_slaves:1\nslave_read_only:1\nslave0:ip=1.2.3.4,port=1,state=online,offset=0,lag=0",
        );
        let (records, errors) = extract_replicas(&info);
        assert_eq!(records.len(), 1);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_display_address_prefers_hostname() {
        let mut record = parse_record("slave0", "ip=10.0.0.5,port=6379,state=online,offset=1,lag=0").unwrap();
        record.hostname = Some("cache-2.example".to_string());
        assert_eq!(record.display_address(), "cache-2.example:6379");
    }
}
