//! Node-style `require` specifier resolution.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("cannot find module '{specifier}' from {from}")]
    NotFound { specifier: String, from: PathBuf },

    #[error("Failed to canonicalize {path}: {source}")]
    Canonicalize {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Extensions tried, in order, when a specifier names a file without one
pub const EXTENSIONS: [&str; 2] = ["js", "json"];

#[derive(Deserialize)]
struct PackageManifest {
    #[serde(default)]
    main: Option<String>,
}

/// Resolve `specifier` as required from the file `from`
///
/// Relative and absolute specifiers resolve against the requiring file's
/// directory; bare specifiers search `node_modules` in every ancestor.
pub fn resolve(specifier: &str, from: &Path) -> Result<PathBuf, ResolveError> {
    let base = from.parent().unwrap_or_else(|| Path::new("/"));

    let found = if is_path_specifier(specifier) {
        resolve_as_file_or_dir(&base.join(specifier))
    } else {
        base.ancestors()
            .filter(|dir| dir.file_name().map(|n| n != "node_modules").unwrap_or(true))
            .find_map(|dir| resolve_as_file_or_dir(&dir.join("node_modules").join(specifier)))
    };

    let path = found.ok_or_else(|| ResolveError::NotFound {
        specifier: specifier.to_string(),
        from: from.to_path_buf(),
    })?;

    canonical(&path)
}

/// Canonical form of a path, the identity of a module
pub fn canonical(path: &Path) -> Result<PathBuf, ResolveError> {
    std::fs::canonicalize(path).map_err(|source| ResolveError::Canonicalize {
        path: path.to_path_buf(),
        source,
    })
}

fn is_path_specifier(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
}

fn resolve_as_file_or_dir(candidate: &Path) -> Option<PathBuf> {
    resolve_as_file(candidate).or_else(|| resolve_as_dir(candidate))
}

fn resolve_as_file(candidate: &Path) -> Option<PathBuf> {
    if candidate.is_file() {
        return Some(candidate.to_path_buf());
    }
    let file_name = candidate.file_name()?.to_str()?;
    EXTENSIONS
        .iter()
        .map(|ext| candidate.with_file_name(format!("{}.{}", file_name, ext)))
        .find(|p| p.is_file())
}

fn resolve_as_dir(candidate: &Path) -> Option<PathBuf> {
    if !candidate.is_dir() {
        return None;
    }

    let manifest = candidate.join("package.json");
    if let Ok(contents) = std::fs::read_to_string(&manifest) {
        match serde_json::from_str::<PackageManifest>(&contents) {
            Ok(PackageManifest { main: Some(main) }) => {
                let target = candidate.join(main);
                if let Some(found) = resolve_as_file(&target).or_else(|| resolve_index(&target)) {
                    return Some(found);
                }
            }
            Ok(_) => {}
            Err(err) => tracing::warn!("Ignoring malformed {:?}: {}", manifest, err),
        }
    }

    resolve_index(candidate)
}

fn resolve_index(dir: &Path) -> Option<PathBuf> {
    EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("index.{}", ext)))
        .find(|p| p.is_file())
}
