//! Bundle command implementation.

use anyhow::{Context, Result};
use couchify_core::{Config, DesignBuilder};
use couchify_types::DesignDocument;
use std::path::Path;

/// Name used when neither the command line nor the config file gives one
pub const DEFAULT_NAME: &str = "default";

/// Load the config file, if any, and apply command line overrides
pub fn load_config(
    config_path: Option<&Path>,
    dir: Option<&Path>,
    name: Option<String>,
) -> Result<Config> {
    let mut config = match config_path {
        Some(path) => {
            tracing::info!("Loading config from {:?}", path);
            Config::from_file(path).context("could not couchify: failed to load configuration")?
        }
        None => Config::default(),
    };

    if let Some(dir) = dir {
        let dir = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            std::env::current_dir()
                .context("could not couchify: failed to read working directory")?
                .join(dir)
        };
        config.base_dir = Some(dir);
    }

    config.id = name
        .or(config.id.take())
        .or_else(|| Some(DEFAULT_NAME.to_string()));

    Ok(config)
}

/// Build the design document described by `config`
pub async fn bundle(config: Config) -> Result<DesignDocument> {
    let builder = DesignBuilder::new(config).context("could not couchify")?;
    builder.build().await.context("could not couchify")
}

/// Print the document as pretty JSON on stdout
pub fn print_document(doc: &DesignDocument) -> Result<()> {
    let json = serde_json::to_string_pretty(doc).context("failed to serialize design document")?;
    println!("{}", json);
    Ok(())
}
