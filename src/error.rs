use std::path::PathBuf;

use thiserror::Error;

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("no candidate urls and no url sources configured, cannot resolve")]
    NoCandidates,
}

/// Session lifecycle errors.
///
/// Both variants are guards, not faults: the caller asked to start a
/// resolution session at a moment when the process must not run one.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("a resolution session is already waiting for outcomes")]
    AlreadyWaiting,

    #[error("direct connection confirmed earlier; resolution suppressed until reset")]
    DirectModeActive,
}

/// Crate-level convenience error.
///
/// A thin wrapper over the capability errors above.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),
}
