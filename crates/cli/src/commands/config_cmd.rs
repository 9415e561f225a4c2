//! `linefit config`: Resolver settings commands.

use super::load_settings;
use linefit_config::ResolverSettings;
use std::path::{Path, PathBuf};

pub async fn show(settings_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_settings(settings_path)?;
    let toml_str = toml::to_string_pretty(&settings)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path(settings_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", settings_file(settings_path).display());
    Ok(())
}

fn settings_file(settings_path: Option<&Path>) -> PathBuf {
    settings_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| ResolverSettings::config_dir().join("config.toml"))
}
