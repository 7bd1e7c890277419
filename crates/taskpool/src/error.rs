//! Pool errors

/// Rejected construction parameters
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Worker count must be at least 1")]
    ZeroWorkers,

    #[error("Worker count {requested} exceeds hardware concurrency {available}")]
    TooManyWorkers { requested: usize, available: usize },

    #[error("Backlog capacity must be at least 1")]
    ZeroBacklog,
}

/// Worker pool error
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
