//! Shared types for couchify
//!
//! This crate provides the design document model produced by the bundler
//! and consumed by the delivery client.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Prefix CouchDB uses for design document identifiers
pub const DESIGN_PREFIX: &str = "_design/";

/// Design function category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Filters,
    Lists,
    Shows,
    Updates,
    Views,
}

impl Category {
    /// All categories, in the order their directories are configured
    pub const ALL: [Category; 5] = [
        Category::Filters,
        Category::Lists,
        Category::Shows,
        Category::Updates,
        Category::Views,
    ];

    /// Field name of this category in the design document
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Filters => "filters",
            Category::Lists => "lists",
            Category::Shows => "shows",
            Category::Updates => "updates",
            Category::Views => "views",
        }
    }

    pub fn is_view(&self) -> bool {
        matches!(self, Category::Views)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A binary file collected from the attachments directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Path relative to the attachments directory, `/`-separated
    pub id: String,
    pub content_type: String,
    /// Base64-encoded file contents
    pub data: String,
}

impl Attachment {
    pub fn body(&self) -> AttachmentBody {
        AttachmentBody {
            content_type: self.content_type.clone(),
            data: self.data.clone(),
        }
    }
}

/// Inline attachment as stored under `_attachments`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentBody {
    pub content_type: String,
    pub data: String,
}

/// The map/reduce pair of a single view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewFunctions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reduce: Option<String>,
}

/// The `views` field: named views plus the optional `lib` module map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Views {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lib: Option<BTreeMap<String, String>>,

    #[serde(flatten)]
    pub functions: BTreeMap<String, ViewFunctions>,
}

/// URL rewrite rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rewrite {
    pub from: String,
    pub to: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<BTreeMap<String, Value>>,
}

/// A CouchDB design document
///
/// Optional fields are omitted from the serialized form when unset; they are
/// never written as `null` or as empty maps. Keys that come from a template and
/// have no typed counterpart are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignDocument {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,

    pub language: String,

    #[serde(rename = "_attachments", default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<BTreeMap<String, AttachmentBody>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commons: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub views: Option<Views>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lists: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shows: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updates: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrites: Option<Vec<Rewrite>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DesignDocument {
    /// Create an empty JavaScript design document named `_design/<name>`
    pub fn new(name: &str) -> Self {
        Self {
            id: format!("{}{}", DESIGN_PREFIX, name),
            language: "javascript".to_string(),
            ..Default::default()
        }
    }

    /// Name without the `_design/` prefix
    pub fn name(&self) -> &str {
        self.id.strip_prefix(DESIGN_PREFIX).unwrap_or(&self.id)
    }

    /// Whether the typed field serialized under `key` currently holds a value
    pub fn sets(&self, key: &str) -> bool {
        match key {
            "_id" | "language" => true,
            "_rev" => self.rev.is_some(),
            "_attachments" => self.attachments.is_some(),
            "commons" => self.commons.is_some(),
            "views" => self.views.is_some(),
            "filters" => self.filters.is_some(),
            "lists" => self.lists.is_some(),
            "shows" => self.shows.is_some(),
            "updates" => self.updates.is_some(),
            "rewrites" => self.rewrites.is_some(),
            _ => false,
        }
    }

    /// Function map of a non-view category, created on first use
    ///
    /// Views have their own shape; use [`DesignDocument::views_mut`].
    pub fn functions_mut(&mut self, category: Category) -> Option<&mut BTreeMap<String, String>> {
        let slot = match category {
            Category::Filters => &mut self.filters,
            Category::Lists => &mut self.lists,
            Category::Shows => &mut self.shows,
            Category::Updates => &mut self.updates,
            Category::Views => return None,
        };
        Some(slot.get_or_insert_with(BTreeMap::new))
    }

    /// The `views` field, created on first use
    pub fn views_mut(&mut self) -> &mut Views {
        self.views.get_or_insert_with(Views::default)
    }
}
