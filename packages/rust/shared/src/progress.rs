//! Progress reporting seam shared by the fetch engine and the exporters.
//!
//! Observers are injected explicitly; nothing in the library writes to the
//! terminal on its own.

/// A single progress notification.
#[derive(Debug, Clone, Copy)]
pub enum ProgressEvent<'a> {
    /// Starting work on an export root (`current` is 1-based).
    RootStarted {
        id: &'a str,
        current: usize,
        total: usize,
    },
    /// Discovery finished for a root.
    Discovered { root_id: &'a str, count: usize },
    /// A batch of body fetches is about to start.
    FetchStarted { total: usize },
    /// A page body was retrieved.
    PageFetched { id: &'a str, title: &'a str },
    /// A page was skipped after a fetch failure.
    PageSkipped { id: &'a str, error: &'a str },
    /// The export phase is about to write `total` page/format pairs.
    ExportStarted { total: usize },
    /// A page was written in one format.
    PageExported {
        title: &'a str,
        format: &'a str,
        path: &'a str,
    },
    /// Writing a page in one format failed.
    ExportFailed {
        title: &'a str,
        format: &'a str,
        error: &'a str,
    },
}

/// Receives progress events. Implementations must be callable from
/// concurrent fetch tasks.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: ProgressEvent<'_>);
}

/// No-op observer for headless/test usage.
pub struct SilentProgress;

impl ProgressObserver for SilentProgress {
    fn on_progress(&self, _event: ProgressEvent<'_>) {}
}
