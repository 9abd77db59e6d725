//! Error taxonomy for the agent.
//!
//! Library-facing modules use `thiserror` enums so callers can match on
//! specific failure modes (in particular, `ResolverError::ConfigDirNotFound`
//! and `ConfigFileNotFound` are not failures but signals to park a file in
//! the `PendingQueue`). The binary entrypoint collapses everything into
//! `anyhow::Error` at its edges.

use std::path::PathBuf;

use thiserror::Error;

/// Failures from `fileid`.
#[derive(Debug, Error)]
pub enum FileIdError {
    #[error("failed to stat {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures from `resolver`. `ConfigDirNotFound` and `ConfigFileNotFound` are
/// recoverable: callers should enqueue the file into the `PendingQueue`
/// rather than discard it.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("config directory not found for {name}_{id}")]
    ConfigDirNotFound { name: String, id: u8 },

    #[error("workgroup.yml not found in {0}")]
    ConfigFileNotFound(PathBuf),

    #[error("invalid configuration in {path}: {source}")]
    InvalidConfig {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ResolverError {
    /// True for the two variants that mean "not yet discoverable" rather
    /// than "broken": the caller should park the file, not warn-and-skip.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            ResolverError::ConfigDirNotFound { .. } | ResolverError::ConfigFileNotFound(_)
        )
    }
}

/// Failures from the `formats` parsers.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse xml in {path}: {source}")]
    Xml {
        path: PathBuf,
        #[source]
        source: quick_xml::Error,
    },

    #[error("invalid configuration in {0}")]
    InvalidConfig(PathBuf),

    #[error("failed to compile derived regex: {0}")]
    Regex(#[from] regex::Error),
}

/// Failures surfaced by a running file follower. Non-fatal to the pipeline:
/// the owning task logs and drops the file.
#[derive(Debug, Error)]
pub enum FollowerError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
