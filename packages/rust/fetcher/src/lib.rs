//! Hierarchy discovery and parallel page retrieval.
//!
//! [`discover_and_fetch`] is the entry point used by the CLI: it expands the
//! requested roots (when children are included), fetches every page body
//! through a bounded worker pool and returns the deduplicated records.

pub mod coordinator;
pub mod discovery;

#[cfg(test)]
mod testing;

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use confluence_export_client::{ContentApi, ContentKind};
use confluence_export_shared::{
    DEFAULT_WORKERS, FetchFailure, PageRecord, ProgressEvent, ProgressObserver, Result,
};

pub use coordinator::{FetchBatch, FetchCoordinator, FetchTarget};
pub use discovery::discover_descendants;

/// Options for [`discover_and_fetch`].
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Expand each root into its descendants.
    pub include_children: bool,
    /// Retrieve page bodies, not only metadata.
    pub include_body: bool,
    /// Record failures and continue instead of aborting.
    pub skip_errors: bool,
    pub workers: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            include_children: false,
            include_body: true,
            skip_errors: true,
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Outcome of a whole fetch run.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Unique records. Per root: the root page, then its descendants sorted by
    /// `(depth, title)`. Without children: input order.
    pub pages: Vec<PageRecord>,
    /// Pages skipped because their retrieval failed.
    pub failures: Vec<FetchFailure>,
}

/// Resolve `root_ids` into page records.
#[instrument(skip_all, fields(roots = root_ids.len(), include_children = options.include_children))]
pub async fn discover_and_fetch(
    api: Arc<dyn ContentApi>,
    root_ids: &[String],
    options: FetchOptions,
    observer: Arc<dyn ProgressObserver>,
) -> Result<FetchReport> {
    let mut unique_roots = Vec::with_capacity(root_ids.len());
    let mut requested = HashSet::new();
    for id in root_ids {
        if requested.insert(id.as_str()) {
            unique_roots.push(id.clone());
        }
    }

    let coordinator = FetchCoordinator::new(Arc::clone(&api))
        .workers(options.workers)
        .include_body(options.include_body)
        .skip_errors(options.skip_errors);

    let mut report = FetchReport::default();

    if !options.include_children {
        let targets = unique_roots.into_iter().map(FetchTarget::Id).collect();
        let batch = coordinator.fetch_all(targets, observer).await?;
        report.pages = batch.pages;
        report.failures = batch.failures;
        return Ok(report);
    }

    let mut seen: HashSet<String> = HashSet::new();
    let total = unique_roots.len();

    for (index, root_id) in unique_roots.iter().enumerate() {
        observer.on_progress(ProgressEvent::RootStarted {
            id: root_id,
            current: index + 1,
            total,
        });

        let kind = match api.get_content_type(root_id).await {
            Ok(kind) => kind,
            Err(e) => {
                debug!(root_id = %root_id, error = %e, "content type unknown, treating as page");
                ContentKind::Page
            }
        };

        let mut root_page = None;
        if kind == ContentKind::Page && !seen.contains(root_id) {
            let batch = coordinator
                .fetch_all(vec![FetchTarget::Id(root_id.clone())], Arc::clone(&observer))
                .await?;
            report.failures.extend(batch.failures);
            root_page = batch.pages.into_iter().next();
        }

        let root_title = match &root_page {
            Some(page) => page.title.clone(),
            None => api
                .get_content_info(root_id)
                .await
                .map(|info| info.title)
                .unwrap_or_default(),
        };

        let nodes =
            discover_descendants(api.as_ref(), root_id, &root_title, kind, options.skip_errors)
                .await?;
        observer.on_progress(ProgressEvent::Discovered {
            root_id,
            count: nodes.len(),
        });
        info!(root_id = %root_id, descendants = nodes.len(), "discovered descendants");

        let targets: Vec<FetchTarget> = nodes
            .into_iter()
            .filter(|node| node.id != *root_id && !seen.contains(&node.id))
            .map(FetchTarget::Node)
            .collect();

        let batch = coordinator.fetch_all(targets, Arc::clone(&observer)).await?;
        report.failures.extend(batch.failures);

        let mut descendants = batch.pages;
        descendants.sort_by(|a, b| a.hierarchy_key().cmp(&b.hierarchy_key()));

        for page in root_page.into_iter().chain(descendants) {
            if seen.insert(page.id.clone()) {
                report.pages.push(page);
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeApi;
    use confluence_export_shared::{ExportError, SilentProgress};

    fn silent() -> Arc<dyn ProgressObserver> {
        Arc::new(SilentProgress)
    }

    fn ids(report: &FetchReport) -> Vec<&str> {
        report.pages.iter().map(|p| p.id.as_str()).collect()
    }

    fn tree() -> FakeApi {
        FakeApi::new()
            .page("1", "Root", None)
            .page("2", "Zeta", Some("1"))
            .page("3", "Alpha", Some("1"))
            .page("4", "Deep", Some("2"))
            .page("5", "Other root", None)
    }

    fn with_children() -> FetchOptions {
        FetchOptions {
            include_children: true,
            ..FetchOptions::default()
        }
    }

    #[tokio::test]
    async fn roots_only_keep_input_order() {
        let api: Arc<dyn ContentApi> = Arc::new(tree());
        let roots = vec!["5".to_string(), "1".to_string(), "5".to_string()];

        let report = discover_and_fetch(api, &roots, FetchOptions::default(), silent())
            .await
            .unwrap();

        assert_eq!(ids(&report), vec!["5", "1"]);
        assert!(report.pages.iter().all(|p| p.hierarchy_path.is_empty()));
    }

    #[tokio::test]
    async fn children_sorted_by_depth_then_title() {
        let api: Arc<dyn ContentApi> = Arc::new(tree());
        let report = discover_and_fetch(api, &["1".to_string()], with_children(), silent())
            .await
            .unwrap();

        assert_eq!(ids(&report), vec!["1", "3", "2", "4"]);
        let deep = &report.pages[3];
        assert_eq!(deep.hierarchy_path, vec!["Root", "Zeta"]);
        for page in &report.pages {
            assert_eq!(page.hierarchy_depth, page.hierarchy_path.len());
        }
        assert_eq!(report.pages[0].body, "<p>Body of Root</p>");
    }

    #[tokio::test]
    async fn overlapping_roots_are_deduplicated() {
        let api: Arc<dyn ContentApi> = Arc::new(tree());
        let roots = vec!["1".to_string(), "2".to_string(), "5".to_string()];

        let report = discover_and_fetch(api, &roots, with_children(), silent())
            .await
            .unwrap();

        let mut unique = ids(&report);
        let count = unique.len();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), count);
        assert_eq!(count, 5);
        // First sighting wins: page 4 keeps the path from root 1.
        let deep = report.pages.iter().find(|p| p.id == "4").unwrap();
        assert_eq!(deep.hierarchy_path, vec!["Root", "Zeta"]);
    }

    #[tokio::test]
    async fn folder_root_is_transparent() {
        let api: Arc<dyn ContentApi> = Arc::new(
            FakeApi::new()
                .folder("10", "Team", None)
                .page("11", "Overview", Some("10"))
                .folder("12", "Archive", Some("10"))
                .page("13", "Old notes", Some("12")),
        );

        let report = discover_and_fetch(api, &["10".to_string()], with_children(), silent())
            .await
            .unwrap();

        assert_eq!(ids(&report), vec!["11", "13"]);
        assert!(report.pages.iter().all(|p| p.id != "10" && p.id != "12"));
        assert_eq!(report.pages[1].hierarchy_path, vec!["Archive"]);
    }

    #[tokio::test]
    async fn descendant_failures_are_reported() {
        let api: Arc<dyn ContentApi> = Arc::new(tree().fail_fetch("4"));
        let report = discover_and_fetch(api, &["1".to_string()], with_children(), silent())
            .await
            .unwrap();

        assert_eq!(ids(&report), vec!["1", "3", "2"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id, "4");
        assert_eq!(report.failures[0].label(), "Deep");
    }

    #[tokio::test]
    async fn failed_root_still_exports_children() {
        let api: Arc<dyn ContentApi> = Arc::new(tree().fail_fetch("1"));
        let report = discover_and_fetch(api, &["1".to_string()], with_children(), silent())
            .await
            .unwrap();

        assert_eq!(ids(&report), vec!["3", "2", "4"]);
        assert_eq!(report.pages[0].hierarchy_path, vec!["Root"]);
        assert_eq!(report.failures[0].id, "1");
    }

    #[tokio::test]
    async fn abort_without_skip_errors() {
        let api: Arc<dyn ContentApi> = Arc::new(tree().fail_fetch("4"));
        let options = FetchOptions {
            skip_errors: false,
            ..with_children()
        };

        let err = discover_and_fetch(api, &["1".to_string()], options, silent())
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Fetch { ref id, .. } if id == "4"));
    }
}
