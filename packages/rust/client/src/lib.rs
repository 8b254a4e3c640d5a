//! Remote content client for Confluence Cloud.
//!
//! The fetch engine and the PDF exporter only see the [`ContentApi`] trait;
//! [`ConfluenceClient`] is the HTTP implementation with authentication,
//! retry/backoff and pagination handled internally. Every call either
//! succeeds or fails once with an [`ExportError`](confluence_export_shared::ExportError).

mod confluence;
mod page_ref;

use async_trait::async_trait;

use confluence_export_shared::Result;

pub use confluence::{ConfluenceClient, RetryPolicy};
pub use page_ref::{extract_page_id, resolve_page_id};

// ---------------------------------------------------------------------------
// Data returned by the service
// ---------------------------------------------------------------------------

/// Kind of a content node. Folders are grouping nodes without a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Page,
    Folder,
}

impl ContentKind {
    /// Map the service's `type` field. Anything that is not a folder is
    /// treated as a page.
    pub fn from_type(value: &str) -> Self {
        if value.eq_ignore_ascii_case("folder") {
            Self::Folder
        } else {
            Self::Page
        }
    }
}

/// Page metadata without the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSummary {
    pub id: String,
    pub title: String,
    pub parent_id: Option<String>,
    pub space_key: Option<String>,
}

/// Type and title of any content node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentInfo {
    pub id: String,
    pub title: String,
    pub kind: ContentKind,
    pub space_key: Option<String>,
}

/// An `{id, title}` pair, used for children and ancestor chains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    pub id: String,
    pub title: String,
}

impl NodeRef {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// A transitive descendant returned by the ancestor search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descendant {
    pub id: String,
    pub title: String,
    pub kind: ContentKind,
    /// Ancestor chain, outermost first.
    pub ancestors: Vec<NodeRef>,
}

/// Representation requested for a page body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyFormat {
    #[default]
    Storage,
}

impl BodyFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Storage => "storage",
        }
    }
}

// ---------------------------------------------------------------------------
// ContentApi
// ---------------------------------------------------------------------------

/// The operations the export core needs from the remote service.
///
/// List operations are fully paginated: callers always see the complete,
/// flattened result.
#[async_trait]
pub trait ContentApi: Send + Sync {
    /// Page metadata, without the body.
    async fn get_page(&self, id: &str) -> Result<PageSummary>;

    /// Raw body in `format`; empty when the page has none.
    async fn get_page_body(&self, id: &str, format: BodyFormat) -> Result<String>;

    /// Type, title and space of any content node.
    async fn get_content_info(&self, id: &str) -> Result<ContentInfo>;

    /// Whether `id` is a page or a folder.
    async fn get_content_type(&self, id: &str) -> Result<ContentKind> {
        Ok(self.get_content_info(id).await?.kind)
    }

    /// Immediate children of a page, in service order.
    async fn list_children(&self, id: &str) -> Result<Vec<NodeRef>>;

    /// Every transitive descendant of a folder, each with its ancestors.
    async fn list_descendants_by_ancestor(&self, folder_id: &str) -> Result<Vec<Descendant>>;

    /// Every page in a space.
    async fn list_space_pages(&self, space_key: &str) -> Result<Vec<PageSummary>>;

    /// The service's native PDF rendering of a page.
    async fn export_as_pdf(&self, id: &str) -> Result<Vec<u8>>;
}
