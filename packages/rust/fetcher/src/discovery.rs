//! Hierarchy discovery: expand a root into its descendant pages without
//! fetching any bodies.

use std::collections::HashSet;

use tracing::{debug, instrument, warn};

use confluence_export_client::{ContentApi, ContentKind, Descendant};
use confluence_export_shared::{DiscoveredNode, ExportError, Result};

/// One pending node on the page-root worklist.
struct Frame {
    id: String,
    title: String,
    /// Ancestor titles above this node.
    path: Vec<String>,
    parent_id: Option<String>,
    /// The root itself is listed but never emitted.
    emit: bool,
}

/// Enumerate every descendant page of `root_id`.
///
/// Folder roots use a single ancestor search and never contribute their own
/// title to the paths. Page roots are walked depth-first in pre-order, with
/// `root_title` as the first path segment of every descendant.
#[instrument(skip_all, fields(root_id = %root_id, kind = ?kind))]
pub async fn discover_descendants(
    api: &dyn ContentApi,
    root_id: &str,
    root_title: &str,
    kind: ContentKind,
    skip_errors: bool,
) -> Result<Vec<DiscoveredNode>> {
    match kind {
        ContentKind::Folder => discover_folder(api, root_id, skip_errors).await,
        ContentKind::Page => discover_page_tree(api, root_id, root_title, skip_errors).await,
    }
}

async fn discover_folder(
    api: &dyn ContentApi,
    root_id: &str,
    skip_errors: bool,
) -> Result<Vec<DiscoveredNode>> {
    let items = match api.list_descendants_by_ancestor(root_id).await {
        Ok(items) => items,
        Err(e) if skip_errors => {
            warn!(root_id, error = %e, "failed to list folder contents, skipping");
            return Ok(Vec::new());
        }
        Err(e) => return Err(ExportError::discovery(root_id, e)),
    };

    Ok(folder_nodes(root_id, items))
}

/// Flatten ancestor-search results into page nodes. Folders are dropped and
/// each path starts below the root folder.
fn folder_nodes(root_id: &str, items: Vec<Descendant>) -> Vec<DiscoveredNode> {
    let mut seen = HashSet::new();
    let mut nodes = Vec::with_capacity(items.len());

    for item in items {
        if item.kind == ContentKind::Folder || item.id == root_id {
            continue;
        }
        if !seen.insert(item.id.clone()) {
            debug!(page_id = %item.id, "duplicate search result, ignoring");
            continue;
        }

        let below_root = match item.ancestors.iter().position(|a| a.id == root_id) {
            Some(index) => &item.ancestors[index + 1..],
            None => &item.ancestors[..],
        };
        let parent_path = below_root.iter().map(|a| a.title.clone()).collect();
        let parent_id = item
            .ancestors
            .last()
            .map(|a| a.id.clone())
            .unwrap_or_else(|| root_id.to_string());

        nodes.push(DiscoveredNode::new(
            item.id,
            item.title,
            parent_path,
            Some(parent_id),
        ));
    }

    nodes
}

async fn discover_page_tree(
    api: &dyn ContentApi,
    root_id: &str,
    root_title: &str,
    skip_errors: bool,
) -> Result<Vec<DiscoveredNode>> {
    let mut visited: HashSet<String> = HashSet::from([root_id.to_string()]);
    let mut nodes = Vec::new();
    let mut stack = vec![Frame {
        id: root_id.to_string(),
        title: root_title.to_string(),
        path: Vec::new(),
        parent_id: None,
        emit: false,
    }];

    while let Some(frame) = stack.pop() {
        if frame.emit {
            nodes.push(DiscoveredNode::new(
                frame.id.clone(),
                frame.title.clone(),
                frame.path.clone(),
                frame.parent_id.clone(),
            ));
        }

        let children = match api.list_children(&frame.id).await {
            Ok(children) => children,
            Err(e) if skip_errors => {
                warn!(page_id = %frame.id, error = %e, "failed to list children, skipping subtree");
                continue;
            }
            Err(e) => return Err(ExportError::discovery(&frame.id, e)),
        };

        let mut child_path = frame.path;
        // An untitled root contributes no path segment.
        if frame.emit || !frame.title.is_empty() {
            child_path.push(frame.title);
        }

        let mut pending = Vec::with_capacity(children.len());
        for child in children {
            if !visited.insert(child.id.clone()) {
                return Err(ExportError::Integrity(format!(
                    "page {} is reachable more than once from root {root_id} (again under {})",
                    child.id, frame.id
                )));
            }
            pending.push(Frame {
                id: child.id,
                title: child.title,
                path: child_path.clone(),
                parent_id: Some(frame.id.clone()),
                emit: true,
            });
        }

        // Reversed so the first child is popped first.
        stack.extend(pending.into_iter().rev());
    }

    debug!(count = nodes.len(), "page tree discovered");
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeApi;

    fn titles(nodes: &[DiscoveredNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.title.as_str()).collect()
    }

    #[tokio::test]
    async fn page_tree_is_preorder_with_paths() {
        let api = FakeApi::new()
            .page("1", "Root", None)
            .page("2", "A", Some("1"))
            .page("3", "A1", Some("2"))
            .page("4", "B", Some("1"))
            .page("5", "A2", Some("2"));

        let nodes = discover_descendants(&api, "1", "Root", ContentKind::Page, true)
            .await
            .unwrap();

        assert_eq!(titles(&nodes), vec!["A", "A1", "A2", "B"]);
        assert_eq!(nodes[0].parent_path, vec!["Root"]);
        assert_eq!(nodes[1].parent_path, vec!["Root", "A"]);
        assert_eq!(nodes[1].parent_id.as_deref(), Some("2"));
        assert_eq!(nodes[3].parent_id.as_deref(), Some("1"));
        for node in &nodes {
            assert_eq!(node.depth, node.parent_path.len());
        }
    }

    #[tokio::test]
    async fn leaf_page_has_no_descendants() {
        let api = FakeApi::new().page("1", "Lonely", None);
        let nodes = discover_descendants(&api, "1", "Lonely", ContentKind::Page, false)
            .await
            .unwrap();
        assert!(nodes.is_empty());
    }

    #[tokio::test]
    async fn failed_subtree_is_skipped() {
        let api = FakeApi::new()
            .page("1", "Root", None)
            .page("2", "Broken", Some("1"))
            .page("3", "Hidden", Some("2"))
            .page("4", "Fine", Some("1"))
            .page("5", "Fine child", Some("4"))
            .fail_children("2");

        let nodes = discover_descendants(&api, "1", "Root", ContentKind::Page, true)
            .await
            .unwrap();
        assert_eq!(titles(&nodes), vec!["Broken", "Fine", "Fine child"]);
    }

    #[tokio::test]
    async fn failed_subtree_aborts_without_skip() {
        let api = FakeApi::new()
            .page("1", "Root", None)
            .page("2", "Broken", Some("1"))
            .fail_children("2");

        let err = discover_descendants(&api, "1", "Root", ContentKind::Page, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Discovery { ref id, .. } if id == "2"));
    }

    #[tokio::test]
    async fn cycle_is_an_integrity_error() {
        let api = FakeApi::new()
            .page("1", "Root", None)
            .page("2", "Child", Some("1"))
            .extra_child("2", "1", "Root");

        let err = discover_descendants(&api, "1", "Root", ContentKind::Page, true)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Integrity(_)));
    }

    #[tokio::test]
    async fn self_parent_is_an_integrity_error() {
        let api = FakeApi::new()
            .page("1", "Root", None)
            .extra_child("1", "1", "Root");

        let err = discover_descendants(&api, "1", "Root", ContentKind::Page, true)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Integrity(_)));
    }

    #[tokio::test]
    async fn folder_contents_exclude_folders_and_root() {
        let api = FakeApi::new()
            .folder("10", "Team", None)
            .page("11", "Overview", Some("10"))
            .folder("12", "Designs", Some("10"))
            .page("13", "Spec", Some("12"))
            .page("14", "Detail", Some("13"));

        let nodes = discover_descendants(&api, "10", "Team", ContentKind::Folder, true)
            .await
            .unwrap();

        assert_eq!(titles(&nodes), vec!["Overview", "Spec", "Detail"]);
        assert!(nodes[0].parent_path.is_empty());
        assert_eq!(nodes[0].parent_id.as_deref(), Some("10"));
        assert_eq!(nodes[1].parent_path, vec!["Designs"]);
        assert_eq!(nodes[2].parent_path, vec!["Designs", "Spec"]);
        assert_eq!(nodes[2].parent_id.as_deref(), Some("13"));
        assert!(nodes.iter().all(|n| !n.parent_path.contains(&"Team".to_string())));
    }

    #[test]
    fn folder_paths_start_below_root() {
        use confluence_export_client::NodeRef;

        let items = vec![
            Descendant {
                id: "5".into(),
                title: "Page".into(),
                kind: ContentKind::Page,
                ancestors: vec![
                    NodeRef::new("0", "Space Home"),
                    NodeRef::new("10", "Root Folder"),
                    NodeRef::new("4", "Parent"),
                ],
            },
            Descendant {
                id: "6".into(),
                title: "Orphan".into(),
                kind: ContentKind::Page,
                ancestors: vec![],
            },
            Descendant {
                id: "5".into(),
                title: "Page".into(),
                kind: ContentKind::Page,
                ancestors: vec![],
            },
        ];

        let nodes = folder_nodes("10", items);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].parent_path, vec!["Parent"]);
        assert_eq!(nodes[0].parent_id.as_deref(), Some("4"));
        assert!(nodes[1].parent_path.is_empty());
        assert_eq!(nodes[1].parent_id.as_deref(), Some("10"));
    }

    #[tokio::test]
    async fn folder_listing_failure_respects_skip_errors() {
        let api = FakeApi::new().folder("10", "Team", None).fail_children("10");

        let nodes = discover_descendants(&api, "10", "Team", ContentKind::Folder, true)
            .await
            .unwrap();
        assert!(nodes.is_empty());

        let err = discover_descendants(&api, "10", "Team", ContentKind::Folder, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Discovery { .. }));
    }
}
