use thiserror::Error;

/// Errors surfaced by the ingestion core.
///
/// Per the propagation policy, most failures encountered in the hot loops (transient
/// I/O, malformed lines, missing timestamps, catalog misses) are absorbed where they
/// occur and never become an `IngestError`. Only conditions that should abort a run
/// reach this type.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to spawn analyzer process: {0}")]
    AnalyzerSpawn(String),

    #[error("failed to start filesystem watcher: {0}")]
    Watcher(#[from] notify::Error),

    #[error("profiler queue closed")]
    ProfilerClosed,

    #[error("invalid input descriptor: {0}")]
    InvalidDescriptor(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;
