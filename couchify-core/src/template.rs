//! Optional inputs that shape the document: a template and a rewrites file.
//!
//! Both are best effort. A missing file is silent and a malformed one is
//! reported as a warning; neither fails the build.

use couchify_types::Rewrite;
use serde_json::{Map, Value};
use std::path::Path;

/// Load the document template, JSON or YAML by extension
pub async fn load_template(base_dir: &Path, file_name: &str) -> Option<Map<String, Value>> {
    let path = base_dir.join(file_name);
    let contents = read_optional(&path).await?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml") | Some("yaml")
    );
    let parsed: Result<Value, String> = if is_yaml {
        serde_yaml::from_str(&contents).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&contents).map_err(|e| e.to_string())
    };

    match parsed {
        Ok(Value::Object(map)) => {
            tracing::debug!("Loaded template {:?} with {} keys", path, map.len());
            Some(map)
        }
        Ok(_) => {
            tracing::warn!("Ignoring template {:?}: not an object", path);
            None
        }
        Err(err) => {
            tracing::warn!("Ignoring malformed template {:?}: {}", path, err);
            None
        }
    }
}

/// Load URL rewrite rules; an empty list counts as none
pub async fn load_rewrites(base_dir: &Path, file_name: &str) -> Option<Vec<Rewrite>> {
    let path = base_dir.join(file_name);
    let contents = read_optional(&path).await?;

    match serde_json::from_str::<Vec<Rewrite>>(&contents) {
        Ok(rewrites) if rewrites.is_empty() => None,
        Ok(rewrites) => {
            tracing::debug!("Loaded {} rewrites from {:?}", rewrites.len(), path);
            Some(rewrites)
        }
        Err(err) => {
            tracing::warn!("malformed {}: {}", file_name, err);
            None
        }
    }
}

async fn read_optional(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Some(contents),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            tracing::warn!("Could not read {:?}: {}", path, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_files_are_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_template(dir.path(), "template.json").await.is_none());
        assert!(load_rewrites(dir.path(), "rewrites.json").await.is_none());
    }

    #[tokio::test]
    async fn test_json_and_yaml_templates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("template.json"),
            r#"{"validate_doc_update": "function(){}", "options": {"local_seq": true}}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("template.yml"),
            "validate_doc_update: \"function(){}\"\n",
        )
        .unwrap();

        let json = load_template(dir.path(), "template.json").await.unwrap();
        assert_eq!(json["options"]["local_seq"], true);

        let yaml = load_template(dir.path(), "template.yml").await.unwrap();
        assert_eq!(yaml["validate_doc_update"], "function(){}");
    }

    #[tokio::test]
    async fn test_malformed_inputs_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("template.json"), "[1, 2]").unwrap();
        std::fs::write(dir.path().join("rewrites.json"), "{not json").unwrap();

        assert!(load_template(dir.path(), "template.json").await.is_none());
        assert!(load_rewrites(dir.path(), "rewrites.json").await.is_none());
    }

    #[tokio::test]
    async fn test_rewrites_parse() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("rewrites.json"),
            r#"[{"from": "/", "to": "index.html", "method": "GET"}, {"from": "/api/*", "to": "../../*"}]"#,
        )
        .unwrap();

        let rewrites = load_rewrites(dir.path(), "rewrites.json").await.unwrap();
        assert_eq!(rewrites.len(), 2);
        assert_eq!(rewrites[0].method.as_deref(), Some("GET"));
        assert!(rewrites[1].query.is_none());
    }
}
