// src/error.rs
//! Error kinds surfaced by the clustering core.

use crate::cluster::GroupId;

/// Failures of the clustering core. Config, I/O and repository errors use `anyhow`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClusterError {
    /// A required item field (id, title) is missing or blank.
    #[error("invalid input: missing required field `{0}`")]
    InvalidInput(&'static str),

    /// `add` was called with an id that the store never handed out.
    #[error("unknown group id {0}")]
    UnknownGroup(GroupId),

    /// Vector similarity could not be computed; callers score it as 0.
    #[error("similarity scoring degraded: {0}")]
    ScoringDegraded(String),
}

pub type ClusterResult<T> = Result<T, ClusterError>;
