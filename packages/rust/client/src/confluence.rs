//! reqwest-backed [`ContentApi`] for Confluence Cloud.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use confluence_export_shared::{ExportError, Result};

use crate::{
    BodyFormat, ContentApi, ContentInfo, ContentKind, Descendant, NodeRef, PageSummary,
};

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("confluence-export/", env!("CARGO_PKG_VERSION"));

const API_V2_PATH: &str = "/wiki/api/v2";
const API_V1_PATH: &str = "/wiki/rest/api";

const REQUEST_TIMEOUT_SECS: u64 = 30;
const PDF_TIMEOUT_SECS: u64 = 60;

/// Page size for every paginated listing.
const PAGE_LIMIT: usize = 250;

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Retry behaviour for rate limits and connection failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles on each further attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

// ---------------------------------------------------------------------------
// ConfluenceClient
// ---------------------------------------------------------------------------

/// Authenticated client for the Confluence Cloud REST APIs (v1 and v2).
///
/// The underlying connection pool is shared by every clone; configuration
/// is fixed after construction.
#[derive(Debug, Clone)]
pub struct ConfluenceClient {
    http: Client,
    base_url: String,
    email: String,
    token: String,
    retry: RetryPolicy,
}

impl ConfluenceClient {
    /// Create a client for `base_url` (e.g. `https://yoursite.atlassian.net`).
    pub fn new(
        base_url: &str,
        email: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let parsed = Url::parse(trimmed)
            .map_err(|e| ExportError::config(format!("invalid base URL '{base_url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ExportError::config(format!(
                "base URL must use http or https: {base_url}"
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ExportError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: trimmed.to_string(),
            email: email.into(),
            token: token.into(),
            retry: RetryPolicy::default(),
        })
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn v1(&self, endpoint: &str) -> String {
        format!("{}{API_V1_PATH}{endpoint}", self.base_url)
    }

    fn v2(&self, endpoint: &str) -> String {
        format!("{}{API_V2_PATH}{endpoint}", self.base_url)
    }

    /// GET `url` with `query` and decode the JSON response.
    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self
            .send_with_retry(|| self.http.get(url).query(query))
            .await?;

        response
            .json::<T>()
            .await
            .map_err(|e| ExportError::parse(format!("{url}: invalid JSON response: {e}")))
    }

    /// Send the request built by `build`, retrying rate limits and
    /// connection failures with exponential backoff. Other error statuses
    /// fail immediately.
    async fn send_with_retry<F>(&self, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_error: Option<ExportError> = None;

        for attempt in 0..self.retry.max_attempts {
            let request = build().basic_auth(&self.email, Some(&self.token));

            match request.send().await {
                Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                    let wait = retry_after(&response).unwrap_or_else(|| self.retry.backoff(attempt));
                    warn!(
                        url = %response.url(),
                        attempt = attempt + 1,
                        wait_ms = wait.as_millis() as u64,
                        "rate limited, backing off"
                    );
                    last_error = Some(ExportError::api(
                        429,
                        "API request failed with status 429: rate limit exceeded",
                    ));
                    tokio::time::sleep(wait).await;
                }
                Ok(response)
                    if response.status().is_client_error()
                        || response.status().is_server_error() =>
                {
                    return Err(api_error(response).await);
                }
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "request failed");
                    last_error = Some(ExportError::Network(e.to_string()));
                    if attempt + 1 < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.backoff(attempt)).await;
                    }
                }
            }
        }

        match last_error {
            Some(err @ ExportError::Api { .. }) => Err(err),
            Some(err) => Err(ExportError::Network(format!(
                "request failed after {} attempts: {err}",
                self.retry.max_attempts
            ))),
            None => Err(ExportError::config("retry policy allows zero attempts")),
        }
    }

    /// Follow `_links.next` cursors until the listing is exhausted.
    async fn collect_cursor_pages(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<RawContent>> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut params = query.to_vec();
            if let Some(c) = &cursor {
                params.push(("cursor", c.clone()));
            }

            let list: RawList = self.get_json(url, &params).await?;
            items.extend(list.results);

            match next_cursor(list.links.as_ref()) {
                Some(next) if cursor.as_ref() != Some(&next) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(items)
    }

    /// Plain authenticated GET without retries, used by the PDF fallbacks.
    async fn get_once(&self, url: &str, query: &[(&str, &str)]) -> reqwest::Result<Response> {
        self.http
            .get(url)
            .query(query)
            .basic_auth(&self.email, Some(&self.token))
            .timeout(Duration::from_secs(PDF_TIMEOUT_SECS))
            .send()
            .await
    }
}

#[async_trait]
impl ContentApi for ConfluenceClient {
    #[instrument(skip(self), level = "debug")]
    async fn get_page(&self, id: &str) -> Result<PageSummary> {
        let raw: RawContent = self.get_json(&self.v2(&format!("/pages/{id}")), &[]).await?;
        Ok(raw.into_summary())
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_page_body(&self, id: &str, format: BodyFormat) -> Result<String> {
        let raw: RawContent = self
            .get_json(
                &self.v2(&format!("/pages/{id}")),
                &[("body-format", format.as_str().to_string())],
            )
            .await?;

        Ok(raw
            .body
            .as_ref()
            .and_then(|body| body.get(format.as_str()))
            .and_then(|repr| repr.get("value"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_content_info(&self, id: &str) -> Result<ContentInfo> {
        let raw: RawContent = self
            .get_json(
                &self.v1(&format!("/content/{id}")),
                &[("expand", "space".to_string())],
            )
            .await?;

        let kind = ContentKind::from_type(raw.kind.as_deref().unwrap_or("page"));
        let space_key = raw.space_key();
        Ok(ContentInfo {
            id: id_string(&raw.id),
            title: raw.title.unwrap_or_default(),
            kind,
            space_key,
        })
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_children(&self, id: &str) -> Result<Vec<NodeRef>> {
        let items = self
            .collect_cursor_pages(
                &self.v2(&format!("/pages/{id}/children")),
                &[("limit", PAGE_LIMIT.to_string())],
            )
            .await?;

        debug!(count = items.len(), "listed children");
        Ok(items.into_iter().map(RawContent::into_node_ref).collect())
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_descendants_by_ancestor(&self, folder_id: &str) -> Result<Vec<Descendant>> {
        let url = self.v1("/content/search");
        let mut start = 0usize;
        let mut descendants = Vec::new();

        loop {
            let params = [
                ("cql", format!("ancestor = {folder_id}")),
                ("limit", PAGE_LIMIT.to_string()),
                ("start", start.to_string()),
                ("expand", "ancestors".to_string()),
            ];
            let list: RawList = self.get_json(&url, &params).await?;
            let batch = list.results.len();

            descendants.extend(list.results.into_iter().map(|raw| Descendant {
                id: id_string(&raw.id),
                title: raw.title.clone().unwrap_or_else(|| "Untitled".into()),
                kind: ContentKind::from_type(raw.kind.as_deref().unwrap_or("page")),
                ancestors: raw
                    .ancestors
                    .into_iter()
                    .map(RawContent::into_node_ref)
                    .collect(),
            }));

            if batch < PAGE_LIMIT {
                break;
            }
            start += PAGE_LIMIT;
        }

        debug!(count = descendants.len(), "listed folder descendants");
        Ok(descendants)
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_space_pages(&self, space_key: &str) -> Result<Vec<PageSummary>> {
        let items = self
            .collect_cursor_pages(
                &self.v2("/pages"),
                &[
                    ("space-key", space_key.to_string()),
                    ("limit", PAGE_LIMIT.to_string()),
                ],
            )
            .await?;

        Ok(items.into_iter().map(RawContent::into_summary).collect())
    }

    #[instrument(skip(self), level = "debug")]
    async fn export_as_pdf(&self, id: &str) -> Result<Vec<u8>> {
        // 1. Server-side PDF export action. Only trusted when it really is a PDF.
        let action = format!("{}/wiki/spaces/flyingpdf/pdfpageexport.action", self.base_url);
        match self.get_once(&action, &[("pageId", id)]).await {
            Ok(response) if response.status().is_success() && is_pdf(&response) => {
                if let Ok(bytes) = response.bytes().await {
                    return Ok(bytes.to_vec());
                }
            }
            Ok(response) => debug!(status = response.status().as_u16(), "pdf export action unavailable"),
            Err(e) => debug!(error = %e, "pdf export action failed"),
        }

        // 2. REST content export.
        let rest = self.v1(&format!("/content/{id}/export/pdf"));
        match self
            .send_with_retry(|| {
                self.http
                    .get(&rest)
                    .header(ACCEPT, "application/pdf")
                    .timeout(Duration::from_secs(PDF_TIMEOUT_SECS))
            })
            .await
        {
            Ok(response) => match response.bytes().await {
                Ok(bytes) => return Ok(bytes.to_vec()),
                Err(e) => debug!(error = %e, "rest pdf export body unreadable"),
            },
            Err(e) => debug!(error = %e, "rest pdf export unavailable"),
        }

        // 3. Legacy export endpoint.
        let legacy = format!("{}/wiki/exportword", self.base_url);
        match self.get_once(&legacy, &[("pageId", id), ("export", "pdf")]).await {
            Ok(response) if response.status().is_success() => {
                if let Ok(bytes) = response.bytes().await {
                    return Ok(bytes.to_vec());
                }
            }
            Ok(response) => debug!(status = response.status().as_u16(), "legacy pdf export unavailable"),
            Err(e) => debug!(error = %e, "legacy pdf export failed"),
        }

        Err(ExportError::Api {
            status: Some(501),
            message: format!(
                "PDF export is not available for page {id}. \
                 This may require additional permissions or Confluence add-ons."
            ),
            body: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// Any content object from the v1 or v2 APIs. Only the fields we read.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContent {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    parent_id: Option<Value>,
    #[serde(default)]
    space_id: Option<Value>,
    #[serde(default)]
    space: Option<RawSpace>,
    #[serde(default)]
    ancestors: Vec<RawContent>,
    #[serde(default)]
    body: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawSpace {
    #[serde(default)]
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawList {
    #[serde(default)]
    results: Vec<RawContent>,
    #[serde(default, rename = "_links")]
    links: Option<RawLinks>,
}

#[derive(Debug, Deserialize)]
struct RawLinks {
    #[serde(default)]
    next: Option<String>,
}

impl RawContent {
    fn space_key(&self) -> Option<String> {
        self.space_id
            .as_ref()
            .map(id_string)
            .filter(|s| !s.is_empty())
            .or_else(|| self.space.as_ref().and_then(|s| s.key.clone()))
    }

    fn into_summary(self) -> PageSummary {
        let space_key = self.space_key();
        PageSummary {
            id: id_string(&self.id),
            title: self.title.unwrap_or_else(|| "Untitled".into()),
            parent_id: self
                .parent_id
                .as_ref()
                .map(id_string)
                .filter(|s| !s.is_empty()),
            space_key,
        }
    }

    fn into_node_ref(self) -> NodeRef {
        NodeRef {
            id: id_string(&self.id),
            title: self.title.unwrap_or_else(|| "Untitled".into()),
        }
    }
}

/// IDs arrive as strings from v2 and occasionally as numbers elsewhere.
fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// Extract the `cursor` query parameter from a `_links.next` link.
fn next_cursor(links: Option<&RawLinks>) -> Option<String> {
    let next = links?.next.as_deref()?;
    let base = Url::parse("https://confluence.invalid/").ok()?;
    let url = base.join(next).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "cursor")
        .map(|(_, value)| value.into_owned())
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn is_pdf(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains("pdf"))
}

/// Build an [`ExportError::Api`] from an error response, including the
/// service's `message` field when the body is JSON.
async fn api_error(response: Response) -> ExportError {
    let status = response.status().as_u16();
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();

    let mut message = format!("API request failed with status {status}");
    if let Some(detail) = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned))
    {
        message.push_str(": ");
        message.push_str(&detail);
    }

    debug!(%url, status, "API error response");

    ExportError::Api {
        status: Some(status),
        message,
        body: (!body.is_empty()).then_some(body),
    }
}
