//! Discovery of design function files and attachments under the base directory.

use crate::config::Config;
use couchify_types::Category;
use glob_match::glob_match;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("Failed to list {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
}

/// Extensions a design function file may have
const DESIGN_EXTENSIONS: [&str; 2] = ["js", "json"];

/// A design function file found directly inside a category directory
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DesignFile {
    /// Path relative to the base directory, `/`-separated
    pub relative_path: String,
    pub category: Category,
}

#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Sorted by relative path
    pub design_files: Vec<DesignFile>,
    /// Paths relative to the attachments directory, sorted
    pub attachment_files: Vec<String>,
}

/// List design function files and attachments
///
/// Design files sit directly in a category directory; attachments are found at
/// any depth. Ignore patterns match paths relative to the base directory, and
/// missing directories simply contribute nothing.
pub fn discover(config: &Config, base_dir: &Path) -> Result<Discovery, DiscoverError> {
    let mut design_files = Vec::new();
    for (category, dir) in config.category_dirs() {
        for rel in list_files(base_dir, dir, Some(1), &config.ignore_patterns)? {
            let is_design_file = Path::new(&rel)
                .extension()
                .and_then(|e| e.to_str())
                .map(|ext| DESIGN_EXTENSIONS.contains(&ext))
                .unwrap_or(false);
            if is_design_file {
                design_files.push(DesignFile {
                    relative_path: rel,
                    category,
                });
            }
        }
    }
    design_files.sort();

    let attachments_prefix = format!("{}/", config.attachments_dir.trim_end_matches('/'));
    let mut attachment_files: Vec<String> = list_files(
        base_dir,
        &config.attachments_dir,
        None,
        &config.ignore_patterns,
    )?
    .into_iter()
    .map(|rel| {
        rel.strip_prefix(&attachments_prefix)
            .map(str::to_string)
            .unwrap_or(rel)
    })
    .collect();
    attachment_files.sort();

    tracing::debug!(
        "Discovered {} design files, {} attachments",
        design_files.len(),
        attachment_files.len()
    );

    Ok(Discovery {
        design_files,
        attachment_files,
    })
}

/// Files under `base_dir/dir`, as `/`-separated paths relative to `base_dir`
fn list_files(
    base_dir: &Path,
    dir: &str,
    max_depth: Option<usize>,
    ignore_patterns: &[String],
) -> Result<Vec<String>, DiscoverError> {
    let root = base_dir.join(dir);
    if !root.is_dir() {
        tracing::debug!("Skipping missing directory {:?}", root);
        return Ok(Vec::new());
    }

    let mut walker = WalkDir::new(&root).min_depth(1);
    if let Some(depth) = max_depth {
        walker = walker.max_depth(depth);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|source| DiscoverError::Walk {
            path: root.clone(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = relative_path(base_dir, entry.path());
        if should_ignore(&rel, ignore_patterns) {
            tracing::debug!("Ignoring {} due to ignore_patterns", rel);
            continue;
        }
        files.push(rel);
    }

    Ok(files)
}

fn relative_path(base_dir: &Path, path: &Path) -> String {
    path.strip_prefix(base_dir)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn should_ignore(path: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| glob_match(pattern, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_design_files_are_sorted_and_shallow() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "views/b.js");
        write(dir.path(), "shows/z.js");
        write(dir.path(), "shows/a.json");
        write(dir.path(), "shows/readme.md");
        write(dir.path(), "shows/nested/deep.js");
        write(dir.path(), "lib/util.js");

        let config = Config::new(dir.path(), "app");
        let found = discover(&config, dir.path()).unwrap();
        let paths: Vec<_> = found
            .design_files
            .iter()
            .map(|f| f.relative_path.as_str())
            .collect();
        assert_eq!(paths, vec!["shows/a.json", "shows/z.js", "views/b.js"]);
        assert_eq!(found.design_files[2].category, Category::Views);
    }

    #[test]
    fn test_attachments_are_recursive_and_ignore_node_modules() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "public/index.html");
        write(dir.path(), "public/img/logo.png");
        write(dir.path(), "public/node_modules/pkg/index.js");

        let config = Config::new(dir.path(), "app");
        let found = discover(&config, dir.path()).unwrap();
        assert_eq!(found.attachment_files, vec!["img/logo.png", "index.html"]);
        assert!(found.design_files.is_empty());
    }

    #[test]
    fn test_custom_directories() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "s/a.js");
        write(dir.path(), "shows/ignored.js");
        write(dir.path(), "assets/app.css");

        let config = Config {
            shows_dir: "s".into(),
            attachments_dir: "assets".into(),
            ..Config::new(dir.path(), "app")
        };
        let found = discover(&config, dir.path()).unwrap();
        assert_eq!(found.design_files.len(), 1);
        assert_eq!(found.design_files[0].relative_path, "s/a.js");
        assert_eq!(found.design_files[0].category, Category::Shows);
        assert_eq!(found.attachment_files, vec!["app.css"]);
    }

    #[test]
    fn test_extra_ignore_patterns() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "shows/a.js");
        write(dir.path(), "shows/a.test.js");

        let config = Config {
            ignore_patterns: vec!["**/*.test.js".into()],
            ..Config::new(dir.path(), "app")
        };
        let found = discover(&config, dir.path()).unwrap();
        assert_eq!(found.design_files.len(), 1);
        assert_eq!(found.design_files[0].relative_path, "shows/a.js");
    }
}
