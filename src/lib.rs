pub mod builder;
pub mod config;
pub mod discovery;
pub mod error;
pub mod observability;
pub mod probe;
pub mod protocol;
pub mod replica;
pub mod report;
pub mod resolver;
pub mod retry;

pub use builder::{BuilderOptions, ClusterMapBuilder};
pub use config::Config;
pub use discovery::{CoordinationStore, TopologyResolver};
pub use error::{RedismapError, Result};
pub use probe::{Prober, RedisProbe, Role};
pub use replica::ReplicaRecord;
pub use report::{ClusterMapOutcome, ClusterReport, HostInfo};
pub use resolver::HostnameResolver;
