//! Configuration parsing and management.

use couchify_types::Category;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("you must provide a directory")]
    MissingBaseDir,

    #[error("you must provide a design document name")]
    MissingId,

    #[error("design function directory names must be unique")]
    NonUniqueDirNames,

    #[error("unknown source transform: {0}")]
    UnknownTransform(String),
}

/// Bundler configuration, loadable from `couchify.yml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Design document name (`_design/<id>`)
    #[serde(default)]
    pub id: Option<String>,

    /// Root of the design document tree
    #[serde(default)]
    pub base_dir: Option<PathBuf>,

    #[serde(default = "default_attachments_dir")]
    pub attachments_dir: String,

    #[serde(default = "default_filters_dir")]
    pub filters_dir: String,

    #[serde(default = "default_lists_dir")]
    pub lists_dir: String,

    #[serde(default = "default_shows_dir")]
    pub shows_dir: String,

    #[serde(default = "default_updates_dir")]
    pub updates_dir: String,

    #[serde(default = "default_views_dir")]
    pub views_dir: String,

    /// Glob patterns (relative paths) skipped during discovery
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// Built-in source transforms applied before dependency discovery
    #[serde(default = "default_transforms")]
    pub transforms: Vec<String>,

    #[serde(default = "default_template_file")]
    pub template_file: String,

    #[serde(default = "default_rewrites_file")]
    pub rewrites_file: String,

    // Internal: path to config file (for relative path resolution)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

fn default_attachments_dir() -> String {
    String::from("public")
}

fn default_filters_dir() -> String {
    String::from("filters")
}

fn default_lists_dir() -> String {
    String::from("lists")
}

fn default_shows_dir() -> String {
    String::from("shows")
}

fn default_updates_dir() -> String {
    String::from("updates")
}

fn default_views_dir() -> String {
    String::from("views")
}

fn default_ignore_patterns() -> Vec<String> {
    vec![String::from("**/node_modules/**")]
}

fn default_transforms() -> Vec<String> {
    vec![String::from(crate::transform::ES_MODULES)]
}

fn default_template_file() -> String {
    String::from("template.json")
}

fn default_rewrites_file() -> String {
    String::from("rewrites.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id: None,
            base_dir: None,
            attachments_dir: default_attachments_dir(),
            filters_dir: default_filters_dir(),
            lists_dir: default_lists_dir(),
            shows_dir: default_shows_dir(),
            updates_dir: default_updates_dir(),
            views_dir: default_views_dir(),
            ignore_patterns: default_ignore_patterns(),
            transforms: default_transforms(),
            template_file: default_template_file(),
            rewrites_file: default_rewrites_file(),
            config_path: None,
        }
    }
}

impl Config {
    /// Configuration with defaults for everything but the base directory and name
    pub fn new(base_dir: impl Into<PathBuf>, id: impl Into<String>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
            id: Some(id.into()),
            ..Default::default()
        }
    }

    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;

        // Store config file path for relative path resolution
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Check everything that can be checked before touching the filesystem
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.base_dir {
            Some(dir) if !dir.as_os_str().is_empty() => {}
            _ => return Err(ConfigError::MissingBaseDir),
        }

        match &self.id {
            Some(id) if !id.trim().is_empty() => {}
            _ => return Err(ConfigError::MissingId),
        }

        let unique: HashSet<&str> = self.category_dirs().iter().map(|(_, dir)| *dir).collect();
        if unique.len() != Category::ALL.len() {
            return Err(ConfigError::NonUniqueDirNames);
        }

        for name in &self.transforms {
            if !crate::transform::is_builtin(name) {
                return Err(ConfigError::UnknownTransform(name.clone()));
            }
        }

        Ok(())
    }

    /// Design document name; empty until validated
    pub fn design_name(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    /// Base directory, resolved relative to the config file
    pub fn base_dir(&self) -> Result<PathBuf, ConfigError> {
        self.base_dir
            .as_ref()
            .map(|p| self.resolve_path(p))
            .ok_or(ConfigError::MissingBaseDir)
    }

    /// Category directory names, paired with their category
    pub fn category_dirs(&self) -> [(Category, &str); 5] {
        [
            (Category::Filters, self.filters_dir.as_str()),
            (Category::Lists, self.lists_dir.as_str()),
            (Category::Shows, self.shows_dir.as_str()),
            (Category::Updates, self.updates_dir.as_str()),
            (Category::Views, self.views_dir.as_str()),
        ]
    }

    /// Resolve a path relative to the config file location
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else if let Some(config_path) = &self.config_path {
            if let Some(parent) = config_path.parent() {
                parent.join(path)
            } else {
                path.to_path_buf()
            }
        } else {
            path.to_path_buf()
        }
    }
}
