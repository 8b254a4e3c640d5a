//! In-memory [`ContentApi`] used by the fetch engine tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use confluence_export_client::{
    BodyFormat, ContentApi, ContentInfo, ContentKind, Descendant, NodeRef, PageSummary,
};
use confluence_export_shared::{ExportError, Result};

#[derive(Clone)]
struct FakeNode {
    id: String,
    title: String,
    kind: ContentKind,
    parent: Option<String>,
}

#[derive(Default)]
pub struct FakeApi {
    nodes: Vec<FakeNode>,
    extra_children: Vec<(String, NodeRef)>,
    failing_children: HashSet<String>,
    failing_fetches: HashSet<String>,
    delay: Option<Duration>,
    pub body_fetches: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, id: &str, title: &str, parent: Option<&str>) -> Self {
        self.node(id, title, ContentKind::Page, parent)
    }

    pub fn folder(self, id: &str, title: &str, parent: Option<&str>) -> Self {
        self.node(id, title, ContentKind::Folder, parent)
    }

    fn node(mut self, id: &str, title: &str, kind: ContentKind, parent: Option<&str>) -> Self {
        self.nodes.push(FakeNode {
            id: id.into(),
            title: title.into(),
            kind,
            parent: parent.map(str::to_string),
        });
        self
    }

    /// List `child_id` under `parent_id` in addition to the real tree.
    pub fn extra_child(mut self, parent_id: &str, child_id: &str, title: &str) -> Self {
        self.extra_children
            .push((parent_id.into(), NodeRef::new(child_id, title)));
        self
    }

    pub fn fail_children(mut self, id: &str) -> Self {
        self.failing_children.insert(id.into());
        self
    }

    pub fn fail_fetch(mut self, id: &str) -> Self {
        self.failing_fetches.insert(id.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn find(&self, id: &str) -> Result<&FakeNode> {
        self.nodes
            .iter()
            .find(|n| n.id == id)
            .ok_or_else(|| ExportError::api(404, format!("API request failed with status 404: {id}")))
    }

    fn ancestors_of(&self, node: &FakeNode) -> Vec<NodeRef> {
        let mut chain = Vec::new();
        let mut current = node.parent.clone();
        while let Some(id) = current {
            match self.nodes.iter().find(|n| n.id == id) {
                Some(parent) => {
                    chain.push(NodeRef::new(&parent.id, &parent.title));
                    current = parent.parent.clone();
                }
                None => break,
            }
        }
        chain.reverse();
        chain
    }

    async fn simulate_fetch(&self, id: &str) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_fetches.contains(id) {
            return Err(ExportError::api(500, "API request failed with status 500"));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentApi for FakeApi {
    async fn get_page(&self, id: &str) -> Result<PageSummary> {
        self.simulate_fetch(id).await?;
        let node = self.find(id)?;
        Ok(PageSummary {
            id: node.id.clone(),
            title: node.title.clone(),
            parent_id: node.parent.clone(),
            space_key: Some("DOCS".into()),
        })
    }

    async fn get_page_body(&self, id: &str, _format: BodyFormat) -> Result<String> {
        self.simulate_fetch(id).await?;
        self.body_fetches.fetch_add(1, Ordering::SeqCst);
        let node = self.find(id)?;
        Ok(format!("<p>Body of {}</p>", node.title))
    }

    async fn get_content_info(&self, id: &str) -> Result<ContentInfo> {
        let node = self.find(id)?;
        Ok(ContentInfo {
            id: node.id.clone(),
            title: node.title.clone(),
            kind: node.kind,
            space_key: Some("DOCS".into()),
        })
    }

    async fn list_children(&self, id: &str) -> Result<Vec<NodeRef>> {
        if self.failing_children.contains(id) {
            return Err(ExportError::api(403, "API request failed with status 403"));
        }
        let mut children: Vec<NodeRef> = self
            .nodes
            .iter()
            .filter(|n| n.parent.as_deref() == Some(id))
            .map(|n| NodeRef::new(&n.id, &n.title))
            .collect();
        children.extend(
            self.extra_children
                .iter()
                .filter(|(parent, _)| parent == id)
                .map(|(_, child)| child.clone()),
        );
        Ok(children)
    }

    async fn list_descendants_by_ancestor(&self, folder_id: &str) -> Result<Vec<Descendant>> {
        if self.failing_children.contains(folder_id) {
            return Err(ExportError::api(403, "API request failed with status 403"));
        }
        Ok(self
            .nodes
            .iter()
            .filter(|n| n.id != folder_id)
            .filter_map(|n| {
                let ancestors = self.ancestors_of(n);
                ancestors
                    .iter()
                    .any(|a| a.id == folder_id)
                    .then(|| Descendant {
                        id: n.id.clone(),
                        title: n.title.clone(),
                        kind: n.kind,
                        ancestors,
                    })
            })
            .collect())
    }

    async fn list_space_pages(&self, _space_key: &str) -> Result<Vec<PageSummary>> {
        Ok(self
            .nodes
            .iter()
            .filter(|n| n.kind == ContentKind::Page)
            .map(|n| PageSummary {
                id: n.id.clone(),
                title: n.title.clone(),
                parent_id: n.parent.clone(),
                space_key: Some("DOCS".into()),
            })
            .collect())
    }

    async fn export_as_pdf(&self, id: &str) -> Result<Vec<u8>> {
        self.find(id)?;
        Ok(b"%PDF-1.4 fake".to_vec())
    }
}
