use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failures of the pipeline machinery itself. Malformed markup is never one
/// of these; it only produces diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to spawn parse worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("parse worker channel closed")]
    ChannelClosed,
    #[error(transparent)]
    Config(#[from] ConfigError),
}
