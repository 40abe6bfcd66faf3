use std::path::Path;

use anyhow::{anyhow, bail, Result};
use cdf_cli::cli::ConfigCommands;
use cdf_core::CdfConfig;
use tracing::info;

use crate::commands::util::load_config;

pub fn handle(command: &ConfigCommands, explicit: Option<&Path>) -> Result<()> {
    match command {
        ConfigCommands::Init { path, force } => {
            let target = match path.as_deref().or(explicit) {
                Some(path) => path.to_path_buf(),
                None => CdfConfig::config_path()
                    .ok_or_else(|| anyhow!("cannot determine the home directory; pass --path"))?,
            };
            if target.exists() && !force {
                bail!("{} already exists; pass --force to overwrite", target.display());
            }
            CdfConfig::default().save_to(&target)?;
            info!(path = %target.display(), "wrote default configuration");
            Ok(())
        }
        ConfigCommands::Show => {
            let config = load_config(explicit)?;
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
