use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tether::EngineConfig;

use crate::Args;

/// Engine settings from the optional config file, with command-line values
/// taking precedence.
pub fn load(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => from_file(path)?,
        None => EngineConfig::default(),
    };

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(host) = &args.host {
        config.authority_host = host.clone();
    }

    Ok(config)
}

fn from_file(path: &Path) -> Result<EngineConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    parse(&text).with_context(|| format!("parsing config file {}", path.display()))
}

fn parse(text: &str) -> Result<EngineConfig> {
    Ok(toml::from_str(text)?)
}
