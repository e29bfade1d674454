use thiserror::Error;

use crate::analyzer::stig::cluster::ClusterError;
use crate::analyzer::stig::duration::DurationError;
use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum StigError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("Invalid timeout: {0}")]
    Timeout(#[from] DurationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown rule: {0}")]
    UnknownRule(String),
}

pub type Result<T> = std::result::Result<T, StigError>;
