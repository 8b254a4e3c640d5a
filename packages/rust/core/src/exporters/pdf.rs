use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use confluence_export_client::ContentApi;
use confluence_export_shared::{PageRecord, Result};

use super::Exporter;

/// PDF bytes produced by the service's own export endpoints.
pub struct PdfExporter {
    api: Arc<dyn ContentApi>,
}

impl PdfExporter {
    pub fn new(api: Arc<dyn ContentApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Exporter for PdfExporter {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn file_extension(&self) -> &'static str {
        "pdf"
    }

    async fn convert(&self, page: &PageRecord) -> Result<Vec<u8>> {
        let bytes = self.api.export_as_pdf(&page.id).await?;
        debug!(page_id = %page.id, size = bytes.len(), "received PDF export");
        Ok(bytes)
    }
}
