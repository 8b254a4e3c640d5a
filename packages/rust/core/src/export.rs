//! Export runner: writes every page in every requested format.
//!
//! Each page/format pair is independent. A conversion or write failure is
//! recorded and the run moves on to the next pair.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use confluence_export_shared::{
    ExportError, PageRecord, ProgressEvent, ProgressObserver, Result,
};

use crate::exporters::Exporter;
use crate::paths::page_file_path;

/// Where and how files are laid out.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    /// Ignore hierarchy and write every file into `output_dir`.
    pub flat: bool,
}

/// A file written for one page in one format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub page_id: String,
    pub title: String,
    pub format: String,
    pub path: PathBuf,
    pub sha256: String,
    pub size_bytes: u64,
}

/// A page/format pair that could not be exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFailure {
    pub page_id: String,
    pub title: String,
    pub format: String,
    pub error: String,
}

/// Result of an export run.
#[derive(Debug, Default)]
pub struct ExportOutcome {
    pub files: Vec<ExportedFile>,
    pub failures: Vec<ExportFailure>,
}

impl ExportOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Export `pages` with every exporter.
///
/// Only failing to create the output directory aborts the run; everything
/// else is collected in [`ExportOutcome::failures`].
#[instrument(skip_all, fields(pages = pages.len(), formats = exporters.len(), output = %options.output_dir.display()))]
pub async fn export_pages(
    pages: &[PageRecord],
    exporters: &[Box<dyn Exporter>],
    options: &ExportOptions,
    observer: &dyn ProgressObserver,
) -> Result<ExportOutcome> {
    std::fs::create_dir_all(&options.output_dir)
        .map_err(|e| ExportError::io(&options.output_dir, e))?;

    observer.on_progress(ProgressEvent::ExportStarted {
        total: pages.len() * exporters.len(),
    });

    let mut outcome = ExportOutcome::default();

    for page in pages {
        for exporter in exporters {
            let format = exporter.name();
            match export_one(page, exporter.as_ref(), options).await {
                Ok(file) => {
                    observer.on_progress(ProgressEvent::PageExported {
                        title: &page.title,
                        format,
                        path: &file.path.display().to_string(),
                    });
                    outcome.files.push(file);
                }
                Err(e) => {
                    let error = e.to_string();
                    warn!(page_id = %page.id, format, error = %error, "export failed");
                    observer.on_progress(ProgressEvent::ExportFailed {
                        title: &page.title,
                        format,
                        error: &error,
                    });
                    outcome.failures.push(ExportFailure {
                        page_id: page.id.clone(),
                        title: page.title.clone(),
                        format: format.to_string(),
                        error,
                    });
                }
            }
        }
    }

    info!(
        files = outcome.files.len(),
        failures = outcome.failures.len(),
        "export complete"
    );
    Ok(outcome)
}

async fn export_one(
    page: &PageRecord,
    exporter: &dyn Exporter,
    options: &ExportOptions,
) -> Result<ExportedFile> {
    let path = page_file_path(
        &options.output_dir,
        page,
        exporter.file_extension(),
        options.flat,
    );
    let content = exporter.convert(page).await?;
    write_atomic(&path, &content)?;

    let mut hasher = Sha256::new();
    hasher.update(&content);

    debug!(page_id = %page.id, path = %path.display(), size = content.len(), "wrote file");

    Ok(ExportedFile {
        page_id: page.id.clone(),
        title: page.title.clone(),
        format: exporter.name().to_string(),
        path,
        sha256: format!("{:x}", hasher.finalize()),
        size_bytes: content.len() as u64,
    })
}

/// Write to a sibling temp file, then rename over the target.
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| ExportError::io(parent, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = parent.join(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| ExportError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| {
        let _ = std::fs::remove_file(&temp);
        ExportError::io(path, e)
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::exporters::{MarkdownExporter, TextExporter};
    use confluence_export_shared::SilentProgress;

    /// Fails for one page id, echoes the title otherwise.
    struct Flaky {
        failing_id: &'static str,
    }

    #[async_trait]
    impl Exporter for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }
        fn file_extension(&self) -> &'static str {
            "out"
        }
        async fn convert(&self, page: &PageRecord) -> Result<Vec<u8>> {
            if page.id == self.failing_id {
                return Err(ExportError::Conversion(format!("cannot render {}", page.id)));
            }
            Ok(page.title.clone().into_bytes())
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl ProgressObserver for Recorder {
        fn on_progress(&self, event: ProgressEvent<'_>) {
            let line = match event {
                ProgressEvent::ExportStarted { total } => format!("start {total}"),
                ProgressEvent::PageExported { title, format, .. } => format!("ok {title} {format}"),
                ProgressEvent::ExportFailed { title, format, .. } => format!("fail {title} {format}"),
                _ => return,
            };
            self.0.lock().unwrap().push(line);
        }
    }

    fn pages() -> Vec<PageRecord> {
        ["One", "Two", "Three"]
            .iter()
            .enumerate()
            .map(|(i, title)| {
                PageRecord::top_level((i + 1).to_string(), *title)
                    .with_body(format!("<p>{title} body</p>"))
            })
            .collect()
    }

    #[tokio::test]
    async fn one_failing_page_does_not_stop_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let options = ExportOptions {
            output_dir: dir.path().to_path_buf(),
            flat: true,
        };
        let exporters: Vec<Box<dyn Exporter>> = vec![Box::new(Flaky { failing_id: "2" })];
        let recorder = Recorder::default();

        let outcome = export_pages(&pages(), &exporters, &options, &recorder)
            .await
            .unwrap();

        assert!(!outcome.is_success());
        assert_eq!(outcome.files.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        let failure = &outcome.failures[0];
        assert_eq!((failure.page_id.as_str(), failure.format.as_str()), ("2", "flaky"));
        assert!(failure.error.contains("cannot render 2"));

        assert!(dir.path().join("One-1.out").exists());
        assert!(!dir.path().join("Two-2.out").exists());
        assert!(dir.path().join("Three-3.out").exists());

        let events = recorder.0.lock().unwrap().clone();
        assert_eq!(
            events,
            ["start 3", "ok One flaky", "fail Two flaky", "ok Three flaky"]
        );
    }

    #[tokio::test]
    async fn every_format_is_written_with_checksums() {
        let dir = tempfile::tempdir().unwrap();
        let options = ExportOptions {
            output_dir: dir.path().join("out"),
            flat: false,
        };
        let mut page = PageRecord::top_level("9", "Leaf Page").with_body("<p>Hi</p>".into());
        page.hierarchy_path = vec!["Parent".into()];
        page.hierarchy_depth = 1;

        let exporters: Vec<Box<dyn Exporter>> =
            vec![Box::new(MarkdownExporter::new()), Box::new(TextExporter::new())];
        let outcome = export_pages(&[page], &exporters, &options, &SilentProgress)
            .await
            .unwrap();

        assert!(outcome.is_success());
        let md_path = dir.path().join("out/Parent/Leaf_Page-9.md");
        let txt_path = dir.path().join("out/Parent/Leaf_Page-9.txt");
        assert_eq!(outcome.files[0].path, md_path);
        assert_eq!(outcome.files[1].path, txt_path);

        let md = std::fs::read_to_string(&md_path).unwrap();
        assert_eq!(md, "# Leaf Page\n\nHi");
        assert_eq!(outcome.files[0].size_bytes, md.len() as u64);
        assert_eq!(outcome.files[0].sha256.len(), 64);
        assert_eq!(
            std::fs::read_to_string(&txt_path).unwrap(),
            "Leaf Page\n=========\n\nHi"
        );
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/file.md");
        write_atomic(&target, b"content").unwrap();
        write_atomic(&target, b"replaced").unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "replaced");
        let names: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, ["file.md"]);
    }
}
