//! Final document assembly from rewritten fragments and library modules.

use crate::extract::DEFAULT_EXPORT;
use crate::slots::SlotUsage;
use couchify_types::{Attachment, Category, DesignDocument, Rewrite, ViewFunctions};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A design function whose fragments have had their requires rewritten
#[derive(Debug, Clone)]
pub struct RewrittenEntry {
    pub category: Category,
    pub name: String,
    pub fragments: BTreeMap<String, String>,
}

/// Everything that goes into one design document
#[derive(Debug, Default)]
pub struct Assembly {
    pub name: String,
    pub entries: Vec<RewrittenEntry>,
    /// Rewritten library module text, indexed by slot
    pub modules: Vec<String>,
    /// Indexed by slot
    pub usage: Vec<SlotUsage>,
    pub attachments: Vec<Attachment>,
    pub rewrites: Option<Vec<Rewrite>>,
    pub template: Option<Map<String, Value>>,
}

/// Build the design document
///
/// Computed fields always win over template keys of the same name; fields
/// with nothing to hold are left out entirely.
pub fn assemble(assembly: Assembly) -> DesignDocument {
    let mut doc = DesignDocument::new(&assembly.name);

    if !assembly.attachments.is_empty() {
        doc.attachments = Some(
            assembly
                .attachments
                .iter()
                .map(|a| (a.id.clone(), a.body()))
                .collect(),
        );
    }

    for entry in assembly.entries {
        place_entry(&mut doc, entry);
    }

    let mut commons = BTreeMap::new();
    let mut lib = BTreeMap::new();
    for (slot, (code, usage)) in assembly.modules.into_iter().zip(assembly.usage).enumerate() {
        if usage.commons {
            commons.insert(slot.to_string(), code.clone());
        }
        if usage.views {
            lib.insert(slot.to_string(), code);
        }
    }
    if !commons.is_empty() {
        doc.commons = Some(commons);
    }
    if !lib.is_empty() {
        doc.views_mut().lib = Some(lib);
    }

    doc.rewrites = assembly.rewrites.filter(|r| !r.is_empty());

    if let Some(template) = assembly.template {
        merge_template(&mut doc, template);
    }

    doc
}

fn place_entry(doc: &mut DesignDocument, mut entry: RewrittenEntry) {
    if entry.category.is_view() {
        let functions = ViewFunctions {
            map: entry.fragments.remove("map"),
            reduce: entry.fragments.remove("reduce"),
        };
        doc.views_mut().functions.insert(entry.name, functions);
        return;
    }

    if let (Some(functions), Some(fragment)) = (
        doc.functions_mut(entry.category),
        entry.fragments.remove(DEFAULT_EXPORT),
    ) {
        functions.insert(entry.name, fragment);
    }
}

/// Copy template keys that no computed field occupies
///
/// `_rev` is never taken from the template; the revision belongs to the server.
pub fn merge_template(doc: &mut DesignDocument, template: Map<String, Value>) {
    for (key, value) in template {
        if key == "_rev" {
            tracing::debug!("Ignoring template revision {}", value);
            continue;
        }
        if doc.sets(&key) {
            tracing::debug!("Template key '{}' overridden by computed value", key);
            continue;
        }
        doc.extra.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn show(name: &str, code: &str) -> RewrittenEntry {
        RewrittenEntry {
            category: Category::Shows,
            name: name.to_string(),
            fragments: BTreeMap::from([(DEFAULT_EXPORT.to_string(), code.to_string())]),
        }
    }

    #[test]
    fn test_minimal_document() {
        let doc = assemble(Assembly {
            name: "app".into(),
            entries: vec![show("simple", "(function(){\n\nreturn 'ok'\n\n}())")],
            ..Default::default()
        });

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value,
            json!({
                "_id": "_design/app",
                "language": "javascript",
                "shows": {"simple": "(function(){\n\nreturn 'ok'\n\n}())"}
            })
        );
    }

    #[test]
    fn test_modules_split_by_usage() {
        let doc = assemble(Assembly {
            name: "app".into(),
            entries: vec![RewrittenEntry {
                category: Category::Views,
                name: "agg".into(),
                fragments: BTreeMap::from([("map".to_string(), "m".to_string())]),
            }],
            modules: vec!["zero".into(), "one".into(), "two".into()],
            usage: vec![
                SlotUsage {
                    views: false,
                    commons: true,
                },
                SlotUsage {
                    views: true,
                    commons: true,
                },
                SlotUsage {
                    views: true,
                    commons: false,
                },
            ],
            ..Default::default()
        });

        let commons = doc.commons.as_ref().unwrap();
        assert_eq!(commons.keys().collect::<Vec<_>>(), vec!["0", "1"]);
        let views = doc.views.as_ref().unwrap();
        let lib = views.lib.as_ref().unwrap();
        assert_eq!(lib.keys().collect::<Vec<_>>(), vec!["1", "2"]);
        assert_eq!(views.functions["agg"].map.as_deref(), Some("m"));
        assert!(views.functions["agg"].reduce.is_none());
    }

    #[test]
    fn test_empty_fields_are_omitted() {
        let doc = assemble(Assembly {
            name: "app".into(),
            rewrites: Some(vec![]),
            ..Default::default()
        });
        assert!(doc.commons.is_none());
        assert!(doc.views.is_none());
        assert!(doc.attachments.is_none());
        assert!(doc.rewrites.is_none());
    }

    #[test]
    fn test_template_does_not_override_computed_fields() {
        let template = json!({
            "_id": "_design/other",
            "shows": {"stale": "x"},
            "validate_doc_update": "function(){}",
            "rewrites": [{"from": "/old", "to": "old"}]
        });
        let doc = assemble(Assembly {
            name: "app".into(),
            entries: vec![show("fresh", "y")],
            rewrites: Some(vec![Rewrite {
                from: "/".into(),
                to: "index.html".into(),
                method: None,
                query: None,
            }]),
            template: template.as_object().cloned(),
            ..Default::default()
        });

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["_id"], "_design/app");
        assert_eq!(value["shows"], json!({"fresh": "y"}));
        assert_eq!(value["validate_doc_update"], "function(){}");
        assert_eq!(value["rewrites"], json!([{"from": "/", "to": "index.html"}]));
    }

    #[test]
    fn test_template_fills_absent_fields() {
        let template = json!({"filters": {"by_type": "function(doc){}"}});
        let doc = assemble(Assembly {
            name: "app".into(),
            template: template.as_object().cloned(),
            ..Default::default()
        });
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["filters"]["by_type"], "function(doc){}");
    }

    #[test]
    fn test_template_revision_is_ignored() {
        let template = json!({"_rev": "1-abc", "validate_doc_update": "function(){}"});
        let mut doc = assemble(Assembly {
            name: "app".into(),
            template: template.as_object().cloned(),
            ..Default::default()
        });
        assert!(doc.rev.is_none());
        assert!(!doc.extra.contains_key("_rev"));

        doc.rev = Some("2-def".into());
        let text = serde_json::to_string(&doc).unwrap();
        assert_eq!(text.matches("\"_rev\"").count(), 1);
        assert!(text.contains("\"_rev\":\"2-def\""));
    }

    #[test]
    fn test_attachments_keyed_by_id() {
        let doc = assemble(Assembly {
            name: "app".into(),
            attachments: vec![Attachment {
                id: "img/a.png".into(),
                content_type: "image/png".into(),
                data: "AAAA".into(),
            }],
            ..Default::default()
        });
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value["_attachments"]["img/a.png"],
            json!({"content_type": "image/png", "data": "AAAA"})
        );
    }
}
