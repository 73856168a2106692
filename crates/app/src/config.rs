use std::path::Path;

use anyhow::Context;
use lesson_core::EngineConfig;
use serde::Deserialize;
use services::RetryConfig;

/// Optional TOML settings file.
///
/// ```toml
/// [engine]
/// answer_policy = "require_correct"
/// idle_cap = { fixed_secs = 600 }
///
/// [retry]
/// max_attempts = 5
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub retry: RetryConfig,
}

impl AppConfig {
    /// Read `path`, or fall back to defaults when no path was given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.engine = config.engine.validate()?;
        Ok(config)
    }
}
