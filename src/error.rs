use thiserror::Error;

#[derive(Error, Debug)]
pub enum RedismapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Discovery error on '{path}': {reason}")]
    Discovery { path: String, reason: String },

    #[error("Probe error on {host}: {reason}")]
    Probe { host: String, reason: String },

    #[error("Malformed replica record '{key}': {reason}")]
    MalformedRecord { key: String, reason: String },

    #[error("Resolution error for {address}: {reason}")]
    Resolution { address: String, reason: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl RedismapError {
    pub fn discovery(path: impl Into<String>, reason: impl ToString) -> Self {
        RedismapError::Discovery {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn probe(host: impl Into<String>, reason: impl ToString) -> Self {
        RedismapError::Probe {
            host: host.into(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(key: impl Into<String>, reason: impl ToString) -> Self {
        RedismapError::MalformedRecord {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn resolution(address: impl Into<String>, reason: impl ToString) -> Self {
        RedismapError::Resolution {
            address: address.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RedismapError>;
