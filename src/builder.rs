//! Cluster map assembly
//!
//! For each cluster key the builder resolves the member hosts, probes them
//! concurrently under a permit limit, classifies every host once and merges
//! the results into the report. Failures stay local: a probe failure marks
//! its host `unknown`, a discovery failure drops only its cluster key.

use crate::config::Config;
use crate::discovery::{EtcdStore, TopologyResolver};
use crate::error::{RedismapError, Result};
use crate::probe::{Prober, RedisProbe, Role};
use crate::replica::extract_replicas;
use crate::report::{ClusterHosts, ClusterMapOutcome, HostInfo, Issue, IssueKind};
use crate::resolver::HostnameResolver;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Per-run probe settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuilderOptions {
    /// Timeout applied to every probe attempt
    pub probe_timeout: Duration,
    /// Maximum probes in flight per cluster key
    pub concurrency: usize,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(2),
            concurrency: 16,
        }
    }
}

/// Builds the replication report for a set of cluster keys
#[derive(Clone)]
pub struct ClusterMapBuilder {
    topology: TopologyResolver,
    prober: Arc<dyn Prober>,
    resolver: HostnameResolver,
    options: BuilderOptions,
}

impl ClusterMapBuilder {
    pub fn new(
        topology: TopologyResolver,
        prober: Arc<dyn Prober>,
        resolver: HostnameResolver,
        options: BuilderOptions,
    ) -> Self {
        Self {
            topology,
            prober,
            resolver,
            options,
        }
    }

    /// Wire the etcd store, RESP probe and system resolver from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = EtcdStore::new(config.etcd.endpoints.clone(), config.etcd.request_timeout())?;
        let retry = config.probe.retry_policy();
        Ok(Self::new(
            TopologyResolver::new(Arc::new(store), config.etcd.prefix.clone()),
            Arc::new(RedisProbe::new(retry)),
            HostnameResolver::system(retry),
            config.probe.builder_options(),
        ))
    }

    /// Build the report for `cluster_keys`, in order.
    ///
    /// Keys whose topology cannot be read are recorded in
    /// `discovery_errors` and left out of the report. Once `cancel` fires,
    /// in-flight probes report their host as cancelled and remaining keys
    /// are skipped.
    pub async fn build(
        &self,
        cluster_keys: &[String],
        cancel: &CancellationToken,
    ) -> ClusterMapOutcome {
        let mut outcome = ClusterMapOutcome::default();

        for cluster_key in cluster_keys {
            if cancel.is_cancelled() {
                outcome
                    .discovery_errors
                    .insert(cluster_key.clone(), "cancelled".to_string());
                continue;
            }

            let resolved = tokio::select! {
                _ = cancel.cancelled() => {
                    outcome
                        .discovery_errors
                        .insert(cluster_key.clone(), "cancelled".to_string());
                    continue;
                }
                resolved = self.topology.resolve_hosts(cluster_key) => resolved,
            };

            let hosts = match resolved {
                Ok(hosts) => hosts,
                Err(e) => {
                    error!("Skipping cluster '{}': {}", cluster_key, e);
                    outcome
                        .discovery_errors
                        .insert(cluster_key.clone(), e.to_string());
                    continue;
                }
            };
            info!("serverlist for '{}': {:?}", cluster_key, hosts);

            let span = info_span!("cluster", key = %cluster_key);
            let cluster = self
                .probe_cluster(hosts, cancel)
                .instrument(span)
                .await;
            log_summary(cluster_key, &cluster);
            outcome.report.insert(cluster_key.clone(), cluster);
        }

        outcome
    }

    /// Probe and classify `hosts`. Every host appears in the result.
    pub async fn probe_cluster(
        &self,
        hosts: Vec<String>,
        cancel: &CancellationToken,
    ) -> ClusterHosts {
        let permits = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for host in hosts.iter().cloned() {
            let permits = permits.clone();
            let prober = self.prober.clone();
            let resolver = self.resolver.clone();
            let cancel = cancel.clone();
            let timeout = self.options.probe_timeout;
            let span = info_span!("probe", host = %host);

            tasks.spawn(
                async move {
                    let _permit = tokio::select! {
                        _ = cancel.cancelled() => return HostInfo::unreachable(host, Issue::cancelled()),
                        permit = permits.acquire_owned() => permit,
                    };
                    classify_host(prober.as_ref(), &resolver, &host, timeout, &cancel).await
                }
                .instrument(span),
            );
        }

        let mut cluster = ClusterHosts::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(host_info) => {
                    cluster.insert(host_info.host.clone(), host_info);
                }
                Err(e) => error!("Probe task failed: {}", e),
            }
        }

        for host in hosts {
            cluster.entry(host.clone()).or_insert_with(|| {
                HostInfo::unreachable(
                    host,
                    Issue {
                        kind: IssueKind::Probe,
                        message: "probe task aborted".to_string(),
                    },
                )
            });
        }
        cluster
    }
}

/// Probe one host and derive its role and replicas.
///
/// Cancellation during the probe reports the host as cancelled. Once the
/// probe has answered, cancellation only skips the remaining reverse
/// lookups and their replicas keep the raw address.
pub async fn classify_host(
    prober: &dyn Prober,
    resolver: &HostnameResolver,
    host: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> HostInfo {
    let probed = tokio::select! {
        biased;
        _ = cancel.cancelled() => return HostInfo::unreachable(host, Issue::cancelled()),
        probed = prober.probe(host, timeout) => probed,
    };
    let info = match probed {
        Ok(info) => info,
        Err(e) => {
            warn!("Error on host {}: {}", host, e);
            return HostInfo::unreachable(host, Issue::from(&e));
        }
    };

    let mut host_info = HostInfo::probed(host, info);
    let (mut replicas, malformed) = extract_replicas(&host_info.info);
    for e in &malformed {
        warn!("{}: {}", host, e);
        host_info.issues.push(Issue::from(e));
    }

    for replica in &mut replicas {
        let resolved = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RedismapError::resolution(&replica.address, "lookup cancelled")),
            resolved = resolver.try_resolve(&replica.address) => resolved,
        };
        let name = match resolved {
            Ok(name) => name,
            Err(e) => {
                debug!("Lookup error on {}: {}", replica.address, e);
                host_info.issues.push(Issue::from(&e));
                replica.address.clone()
            }
        };
        replica.hostname = Some(name);
    }
    host_info.replicas = replicas;
    host_info
}

fn log_summary(cluster_key: &str, cluster: &ClusterHosts) {
    let count = |role: Role| cluster.values().filter(|h| h.role == role).count();
    info!(
        "cluster '{}': {} hosts, {} masters, {} slaves, {} unknown",
        cluster_key,
        cluster.len(),
        count(Role::Master),
        count(Role::Slave),
        count(Role::Unknown)
    );

    for (address, host) in cluster.iter().filter(|(_, h)| h.is_master()) {
        let replicas = host.replica_hosts();
        if !replicas.is_empty() {
            info!("{} -> {}", address, replicas.join(", "));
        }
    }
}
