//! Evaluation errors.
//!
//! Failures while evaluating one object. Rules turn them into `Errored` (or,
//! for [`EvalError::AmbiguousOption`], `Warning`) check results for that
//! object; they never abort the whole rule.

use crate::analyzer::stig::cluster::ClusterError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    /// A ConfigMap or Secret lacks the requested key.
    #[error("{kind}: {name} does not contain field: {field} in Data field")]
    MissingField {
        kind: &'static str,
        name: String,
        field: String,
    },

    #[error("deployment: {deployment} does not contain container: {container}")]
    MissingContainer { deployment: String, container: String },

    #[error("deployment does not contain container with name: {0}")]
    ContainerNotFound(String),

    #[error("deployment does not contain volume with name: {0}")]
    VolumeNotFound(String),

    #[error("cannot find volume with path {0}")]
    VolumePathNotFound(String),

    /// The volume is neither a ConfigMap nor a Secret.
    #[error("cannot handle volume: {0}")]
    UnsupportedSource(String),

    /// A required option is absent.
    #[error("{0}")]
    OptionNotSet(String),

    /// An option that must be unique was given more than once.
    #[error("{0}")]
    AmbiguousOption(String),

    /// Malformed duration or structured config.
    #[error("{0}")]
    Parse(String),
}

impl EvalError {
    pub fn parse(err: impl std::fmt::Display) -> Self {
        Self::Parse(err.to_string())
    }
}
