use std::path::Path;

use anyhow::{Context, Result};
use cdf_core::CdfConfig;
use tracing::debug;

/// Explicit config file, else `~/.cdf/config.toml`, else defaults.
pub fn load_config(path: Option<&Path>) -> Result<CdfConfig> {
    let config = match path {
        Some(path) => CdfConfig::load_from(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => CdfConfig::load().context("loading default config")?,
    };
    debug!(?config, "effective configuration");
    Ok(config)
}

/// "auto" (or 0) means one worker per CPU.
pub fn parse_threads(spec: &str) -> Result<usize> {
    if spec.eq_ignore_ascii_case("auto") {
        return Ok(0);
    }
    spec.parse()
        .with_context(|| format!("invalid thread count '{spec}'; use 'auto' or a number"))
}

pub fn parse_partitions(spec: Option<&String>) -> Vec<String> {
    spec.map_or("", String::as_str)
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_skip_blanks() {
        let spec = "region, ,resource_type".to_string();
        assert_eq!(parse_partitions(Some(&spec)), vec!["region", "resource_type"]);
        assert!(parse_partitions(None).is_empty());
    }

    #[test]
    fn threads_accept_auto() {
        assert_eq!(parse_threads("AUTO").unwrap(), 0);
        assert_eq!(parse_threads("3").unwrap(), 3);
        assert!(parse_threads("many").is_err());
    }
}
