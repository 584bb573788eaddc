//! End-to-end report assembly: in-memory topology, real TCP probes

mod common;

use async_trait::async_trait;
use common::{closed_port, master_info, slave_info, spawn_server, Reply};
use redismap::discovery::MemoryStore;
use redismap::report::IssueKind;
use redismap::resolver::ReverseLookup;
use redismap::retry::RetryPolicy;
use redismap::{
    BuilderOptions, ClusterMapBuilder, HostnameResolver, RedisProbe, Role, TopologyResolver,
};
use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const PREFIX: &str = "/redis/cluster/site";
// The cluster key doubles as the host label, so leaves directly under it
// resolve to 127.0.0.1:<port>.
const LOCAL: &str = "127.0.0.1";

struct FixedLookup;

#[async_trait]
impl ReverseLookup for FixedLookup {
    async fn lookup(&self, ip: IpAddr) -> io::Result<Vec<String>> {
        if ip.is_loopback() {
            Ok(vec!["localhost.".to_string(), "loopback.".to_string()])
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, "no PTR record"))
        }
    }
}

fn builder(store: MemoryStore, timeout: Duration) -> ClusterMapBuilder {
    ClusterMapBuilder::new(
        TopologyResolver::new(Arc::new(store), PREFIX),
        Arc::new(RedisProbe::new(RetryPolicy::none())),
        HostnameResolver::new(Arc::new(FixedLookup), RetryPolicy::none()),
        BuilderOptions {
            probe_timeout: timeout,
            concurrency: 4,
        },
    )
}

fn leaf(port: u16) -> (String, String) {
    (format!("{}/{}/{}", PREFIX, LOCAL, port), String::new())
}

#[tokio::test]
async fn test_master_slave_pair_with_dead_host() {
    let slave = spawn_server(Reply::Info(slave_info(6379))).await;
    let master = spawn_server(Reply::Info(master_info(&[
        (1, "10.1.1.1", 6381, 4),
        (0, "127.0.0.1", slave.port(), 0),
    ])))
    .await;
    let dead = closed_port().await;

    let store = MemoryStore::from_entries([leaf(master.port()), leaf(slave.port()), leaf(dead)]);
    let outcome = builder(store, Duration::from_millis(500))
        .build(&[LOCAL.to_string()], &CancellationToken::new())
        .await;

    assert!(outcome.discovery_errors.is_empty());
    let cluster = &outcome.report[LOCAL];
    assert_eq!(cluster.len(), 3);

    let m = &cluster[&master.to_string()];
    assert_eq!(m.role, Role::Master);
    assert_eq!(m.replicas.len(), 2);
    assert_eq!(m.replicas[0].address, "127.0.0.1");
    assert_eq!(m.replicas[0].hostname.as_deref(), Some("localhost"));
    assert_eq!(m.replicas[1].lag, 4);
    assert_eq!(
        m.replica_hosts(),
        vec![format!("localhost:{}", slave.port()), "10.1.1.1:6381".to_string()]
    );
    assert_eq!(m.issues.len(), 1);
    assert_eq!(m.issues[0].kind, IssueKind::Resolution);

    let s = &cluster[&slave.to_string()];
    assert_eq!(s.role, Role::Slave);
    assert!(s.replicas.is_empty());
    assert!(s.issues.is_empty());

    let d = &cluster[&format!("127.0.0.1:{}", dead)];
    assert_eq!(d.role, Role::Unknown);
    assert!(d.info.is_empty());
    assert_eq!(d.issues[0].kind, IssueKind::Probe);
}

#[tokio::test]
async fn test_silent_host_does_not_stall_report() {
    let silent = spawn_server(Reply::Silent).await;
    let slave = spawn_server(Reply::Info(slave_info(6379))).await;

    let store = MemoryStore::from_entries([leaf(silent.port()), leaf(slave.port())]);
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        builder(store, Duration::from_millis(200))
            .build(&[LOCAL.to_string()], &CancellationToken::new()),
    )
    .await
    .expect("report stalled on a silent host");

    let cluster = &outcome.report[LOCAL];
    assert_eq!(cluster[&silent.to_string()].role, Role::Unknown);
    assert_eq!(cluster[&slave.to_string()].role, Role::Slave);
}

#[tokio::test]
async fn test_missing_cluster_key_leaves_others() {
    let slave = spawn_server(Reply::Info(slave_info(6379))).await;
    let store = MemoryStore::from_entries([leaf(slave.port())]);

    let keys = vec!["ghost".to_string(), LOCAL.to_string()];
    let outcome = builder(store, Duration::from_millis(500))
        .build(&keys, &CancellationToken::new())
        .await;

    assert_eq!(outcome.report.len(), 1);
    assert!(outcome.discovery_errors.contains_key("ghost"));

    let json = serde_json::to_value(&outcome.report).unwrap();
    let host = &json[LOCAL][slave.to_string()];
    assert_eq!(host["role"], "slave");
    assert_eq!(host["host"], slave.to_string());
    assert!(host.get("issues").is_none());
}
