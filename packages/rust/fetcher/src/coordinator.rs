//! Bounded-concurrency page retrieval with per-item failure isolation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, instrument, warn};

use confluence_export_client::{BodyFormat, ContentApi};
use confluence_export_shared::{
    DEFAULT_WORKERS, DiscoveredNode, ExportError, FetchFailure, PageRecord, ProgressEvent,
    ProgressObserver, Result,
};

// ---------------------------------------------------------------------------
// FetchTarget
// ---------------------------------------------------------------------------

/// A unit of fetch work.
#[derive(Debug, Clone)]
pub enum FetchTarget {
    /// An independently requested page; metadata comes from the service.
    Id(String),
    /// A page found by discovery; metadata is already known.
    Node(DiscoveredNode),
}

impl FetchTarget {
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Node(node) => &node.id,
        }
    }

    fn title(&self) -> Option<&str> {
        match self {
            Self::Id(_) => None,
            Self::Node(node) => Some(&node.title),
        }
    }
}

/// Records retrieved by one batch plus the items that were skipped.
#[derive(Debug, Default)]
pub struct FetchBatch {
    /// Successful records, in input order.
    pub pages: Vec<PageRecord>,
    pub failures: Vec<FetchFailure>,
}

// ---------------------------------------------------------------------------
// FetchCoordinator
// ---------------------------------------------------------------------------

/// Retrieves page bodies for a batch of targets with at most `workers`
/// requests in flight.
#[derive(Clone)]
pub struct FetchCoordinator {
    api: Arc<dyn ContentApi>,
    workers: usize,
    include_body: bool,
    skip_errors: bool,
}

impl FetchCoordinator {
    pub fn new(api: Arc<dyn ContentApi>) -> Self {
        Self {
            api,
            workers: DEFAULT_WORKERS,
            include_body: true,
            skip_errors: true,
        }
    }

    /// Maximum concurrent fetches; zero is treated as one.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn include_body(mut self, include_body: bool) -> Self {
        self.include_body = include_body;
        self
    }

    pub fn skip_errors(mut self, skip_errors: bool) -> Self {
        self.skip_errors = skip_errors;
        self
    }

    /// Fetch every target.
    ///
    /// With `skip_errors` a failing item is recorded in
    /// [`FetchBatch::failures`] and the rest continue. Without it the first
    /// failure stops new work from starting, lets in-flight fetches finish and
    /// is returned as the batch error.
    #[instrument(skip_all, fields(total = targets.len(), workers = self.workers))]
    pub async fn fetch_all(
        &self,
        targets: Vec<FetchTarget>,
        observer: Arc<dyn ProgressObserver>,
    ) -> Result<FetchBatch> {
        match targets.len() {
            0 => Ok(FetchBatch::default()),
            1 => self.fetch_inline(targets, observer.as_ref()).await,
            _ => self.fetch_pooled(targets, observer).await,
        }
    }

    async fn fetch_inline(
        &self,
        mut targets: Vec<FetchTarget>,
        observer: &dyn ProgressObserver,
    ) -> Result<FetchBatch> {
        let mut batch = FetchBatch::default();
        let Some(target) = targets.pop() else {
            return Ok(batch);
        };

        observer.on_progress(ProgressEvent::FetchStarted { total: 1 });
        match fetch_one(self.api.as_ref(), &target, self.include_body).await {
            Ok(record) => {
                observer.on_progress(ProgressEvent::PageFetched {
                    id: &record.id,
                    title: &record.title,
                });
                batch.pages.push(record);
            }
            Err(err) if self.skip_errors => {
                let failure = failure_for(&target, &err);
                observer.on_progress(ProgressEvent::PageSkipped {
                    id: &failure.id,
                    error: &failure.message,
                });
                warn!(page_id = %failure.id, error = %failure.message, "skipped page");
                batch.failures.push(failure);
            }
            Err(err) => return Err(err),
        }
        Ok(batch)
    }

    async fn fetch_pooled(
        &self,
        targets: Vec<FetchTarget>,
        observer: Arc<dyn ProgressObserver>,
    ) -> Result<FetchBatch> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let results = Arc::new(Mutex::new(Vec::<(usize, PageRecord)>::with_capacity(
            targets.len(),
        )));
        let failures = Arc::new(Mutex::new(Vec::<FetchFailure>::new()));
        let first_error = Arc::new(Mutex::new(None::<ExportError>));
        let abort = Arc::new(AtomicBool::new(false));

        observer.on_progress(ProgressEvent::FetchStarted {
            total: targets.len(),
        });

        let mut handles = Vec::with_capacity(targets.len());

        for (index, target) in targets.into_iter().enumerate() {
            let api = Arc::clone(&self.api);
            let sem = Arc::clone(&semaphore);
            let results = Arc::clone(&results);
            let failures = Arc::clone(&failures);
            let first_error = Arc::clone(&first_error);
            let abort = Arc::clone(&abort);
            let observer = Arc::clone(&observer);
            let include_body = self.include_body;
            let skip_errors = self.skip_errors;
            let target_id = target.id().to_string();

            let handle = tokio::spawn(async move {
                let Ok(_permit) = sem.acquire().await else {
                    return;
                };
                if abort.load(Ordering::SeqCst) {
                    return;
                }

                match fetch_one(api.as_ref(), &target, include_body).await {
                    Ok(record) => {
                        observer.on_progress(ProgressEvent::PageFetched {
                            id: &record.id,
                            title: &record.title,
                        });
                        results.lock().await.push((index, record));
                    }
                    Err(err) if skip_errors => {
                        let failure = failure_for(&target, &err);
                        observer.on_progress(ProgressEvent::PageSkipped {
                            id: &failure.id,
                            error: &failure.message,
                        });
                        warn!(page_id = %failure.id, error = %failure.message, "skipped page");
                        failures.lock().await.push(failure);
                    }
                    Err(err) => {
                        abort.store(true, Ordering::SeqCst);
                        first_error.lock().await.get_or_insert(err);
                    }
                }
            });
            handles.push((target_id, handle));
        }

        for (id, handle) in handles {
            if let Err(e) = handle.await {
                warn!(page_id = %id, error = %e, "fetch task failed to complete");
                failures.lock().await.push(FetchFailure {
                    id,
                    title: None,
                    message: format!("fetch task failed: {e}"),
                });
            }
        }

        if let Some(err) = first_error.lock().await.take() {
            return Err(err);
        }

        let mut indexed = std::mem::take(&mut *results.lock().await);
        indexed.sort_by_key(|(index, _)| *index);
        let pages: Vec<PageRecord> = indexed.into_iter().map(|(_, record)| record).collect();
        let failures = std::mem::take(&mut *failures.lock().await);

        debug!(
            fetched = pages.len(),
            failed = failures.len(),
            "fetch batch complete"
        );

        Ok(FetchBatch { pages, failures })
    }
}

/// Retrieve one target as a [`PageRecord`]. Failures are scoped to its id.
async fn fetch_one(
    api: &dyn ContentApi,
    target: &FetchTarget,
    include_body: bool,
) -> Result<PageRecord> {
    fetch_record(api, target, include_body)
        .await
        .map_err(|e| ExportError::fetch(target.id(), e))
}

async fn fetch_record(
    api: &dyn ContentApi,
    target: &FetchTarget,
    include_body: bool,
) -> Result<PageRecord> {
    let id = target.id();
    let body = if include_body {
        api.get_page_body(id, BodyFormat::Storage).await?
    } else {
        String::new()
    };

    Ok(match target {
        FetchTarget::Id(_) => {
            let summary = api.get_page(id).await?;
            PageRecord::top_level(summary.id, summary.title)
                .with_space_key(summary.space_key)
                .with_parent_id(summary.parent_id)
                .with_body(body)
        }
        FetchTarget::Node(node) => node.clone().into_record(body),
    })
}

fn failure_for(target: &FetchTarget, err: &ExportError) -> FetchFailure {
    FetchFailure {
        id: target.id().to_string(),
        title: target.title().map(str::to_string),
        message: err.to_string(),
    }
}
