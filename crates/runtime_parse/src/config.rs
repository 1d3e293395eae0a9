use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::scheduler::SchedulerConfig;

/// Parser pipeline configuration. Every field has a default, so a TOML file
/// only lists what it changes:
///
/// ```toml
/// speculative = true
/// chunk_token_limit = 32
///
/// [scheduler]
/// token_budget = 256
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
    /// Tokenize on a background worker. Off means the coordinator tokenizes
    /// network input itself.
    pub speculative: bool,
    /// Maximum tokens per worker chunk.
    pub chunk_token_limit: usize,
    /// Capacity of the worker-to-coordinator event channel, in messages.
    pub channel_capacity: usize,
    /// Base for resolving preload URLs.
    pub document_url: Option<String>,
    /// Send resource requests to the loader, both those found ahead of the
    /// parser and those queued by tree construction. Off means the loader
    /// sees nothing.
    pub preload: bool,
    /// Run parser-blocking scripts. Off means scripts never suspend.
    pub scripting: bool,
    pub scheduler: SchedulerConfig,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            speculative: true,
            chunk_token_limit: 64,
            channel_capacity: 16,
            document_url: None,
            preload: true,
            scripting: true,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl ParserConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = [
            ("chunk_token_limit", self.chunk_token_limit),
            ("channel_capacity", self.channel_capacity),
            ("scheduler.token_budget", self.scheduler.token_budget),
            ("scheduler.max_buffered_tokens", self.scheduler.max_buffered_tokens),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{name} must be at least 1")));
        }
        if let Some(raw) = &self.document_url {
            url::Url::parse(raw)
                .map_err(|err| ConfigError::Invalid(format!("document_url {raw:?}: {err}")))?;
        }
        Ok(())
    }
}
