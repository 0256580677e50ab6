use std::{fs, path::Path};

use anyhow::{Context, Result};
use matrix_code_core::EngineConfig;

/// Loads the engine configuration, falling back to defaults when no file is given.
///
/// Missing sections and fields keep their default values.
pub(crate) fn load(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };

    let text = fs::read_to_string(path)
        .with_context(|| format!("could not read configuration file {}", path.display()))?;
    let config = parse(&text)
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    tracing::debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}

fn parse(text: &str) -> Result<EngineConfig> {
    let config: EngineConfig = toml::from_str(text).context("malformed TOML")?;
    config.validate()?;
    Ok(config)
}
