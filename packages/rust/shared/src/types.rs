//! Core domain types for exported pages.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PageRecord
// ---------------------------------------------------------------------------

/// A page retrieved from the remote service, ready for export.
///
/// Records are produced by discovery (metadata only) or a direct fetch and
/// receive their body from the fetch coordinator. Exporters only read them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Opaque identifier, unique per page.
    pub id: String,
    /// Display title; not guaranteed unique.
    pub title: String,
    /// Space grouping identifier, when the service reported one.
    pub space_key: Option<String>,
    /// Raw storage-format markup. Empty when the body was not requested.
    pub body: String,
    /// Ancestor titles, root-first, excluding the page itself.
    pub hierarchy_path: Vec<String>,
    /// Always `hierarchy_path.len()`.
    pub hierarchy_depth: usize,
    /// Immediate parent, absent for roots.
    pub parent_id: Option<String>,
}

impl PageRecord {
    /// A record with no hierarchy information (top-level page).
    pub fn top_level(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            space_key: None,
            body: String::new(),
            hierarchy_path: Vec::new(),
            hierarchy_depth: 0,
            parent_id: None,
        }
    }

    pub fn with_space_key(mut self, space_key: Option<String>) -> Self {
        self.space_key = space_key;
        self
    }

    pub fn with_parent_id(mut self, parent_id: Option<String>) -> Self {
        self.parent_id = parent_id;
        self
    }

    pub fn with_body(mut self, body: String) -> Self {
        self.body = body;
        self
    }

    /// Sort key used for hierarchy-preserving output: depth, then title.
    pub fn hierarchy_key(&self) -> (usize, &str) {
        (self.hierarchy_depth, self.title.as_str())
    }
}

// ---------------------------------------------------------------------------
// DiscoveredNode
// ---------------------------------------------------------------------------

/// Metadata-only result of hierarchy discovery, consumed by the body fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredNode {
    pub id: String,
    pub title: String,
    /// Ancestor titles from the export root down to the parent.
    pub parent_path: Vec<String>,
    /// Always `parent_path.len()`.
    pub depth: usize,
    pub parent_id: Option<String>,
}

impl DiscoveredNode {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        parent_path: Vec<String>,
        parent_id: Option<String>,
    ) -> Self {
        let depth = parent_path.len();
        Self {
            id: id.into(),
            title: title.into(),
            parent_path,
            depth,
            parent_id,
        }
    }

    /// Turn this node into a page record carrying `body`.
    pub fn into_record(self, body: String) -> PageRecord {
        PageRecord {
            id: self.id,
            title: self.title,
            space_key: None,
            body,
            hierarchy_depth: self.parent_path.len(),
            hierarchy_path: self.parent_path,
            parent_id: self.parent_id,
        }
    }
}

// ---------------------------------------------------------------------------
// FetchFailure
// ---------------------------------------------------------------------------

/// A page that was skipped because its retrieval failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub id: String,
    /// Title, when discovery already knew it.
    pub title: Option<String>,
    pub message: String,
}

impl FetchFailure {
    /// Label for user-facing output: the title when known, else the id.
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_depth_matches_path() {
        let node = DiscoveredNode::new(
            "42",
            "Leaf",
            vec!["Root".into(), "Mid".into()],
            Some("41".into()),
        );
        assert_eq!(node.depth, 2);

        let record = node.into_record("<p>body</p>".into());
        assert_eq!(record.hierarchy_depth, record.hierarchy_path.len());
        assert_eq!(record.hierarchy_path, vec!["Root", "Mid"]);
        assert_eq!(record.parent_id.as_deref(), Some("41"));
        assert_eq!(record.body, "<p>body</p>");
    }

    #[test]
    fn top_level_record_has_no_hierarchy() {
        let record = PageRecord::top_level("7", "Home").with_space_key(Some("DOCS".into()));
        assert!(record.hierarchy_path.is_empty());
        assert_eq!(record.hierarchy_depth, 0);
        assert_eq!(record.space_key.as_deref(), Some("DOCS"));
        assert!(record.body.is_empty());
    }

    #[test]
    fn failure_label_prefers_title() {
        let with_title = FetchFailure {
            id: "1".into(),
            title: Some("Intro".into()),
            message: "boom".into(),
        };
        assert_eq!(with_title.label(), "Intro");

        let without = FetchFailure {
            id: "2".into(),
            title: None,
            message: "boom".into(),
        };
        assert_eq!(without.label(), "2");
    }
}
