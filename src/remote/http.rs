//! HTTP access to a Roundup tracker.

use std::time::Duration;

use tracing::debug;

use super::{FetchError, ItemSource, ListSource};
use crate::error::{Error, Result};
use crate::model::{IssueId, MetadataSnapshot};

/// Default tracker root.
pub const DEFAULT_BASE_URL: &str = "https://bugs.python.org/";

/// Timeout for the whole issue list request.
pub const DEFAULT_LIST_TIMEOUT: Duration = Duration::from_secs(300);

const LIST_QUERY: &str = "issue?@action=export_csv&@columns=id,status&@sort=id";

/// Roundup tracker client.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct RoundupClient {
    client: reqwest::Client,
    base_url: String,
    list_timeout: Duration,
}

impl RoundupClient {
    /// Create a client for the tracker rooted at `base_url`.
    ///
    /// A trailing `/` is added if missing.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            client: reqwest::Client::new(),
            base_url,
            list_timeout: DEFAULT_LIST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_list_timeout(mut self, timeout: Duration) -> Self {
        self.list_timeout = timeout;
        self
    }

    #[must_use]
    pub fn list_timeout(&self) -> Duration {
        self.list_timeout
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn list_url(&self) -> String {
        format!("{}{LIST_QUERY}", self.base_url)
    }

    #[must_use]
    pub fn issue_url(&self, id: IssueId) -> String {
        format!("{}issue{id}", self.base_url)
    }
}

impl Default for RoundupClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ListSource for RoundupClient {
    async fn fetch_list(&self) -> Result<MetadataSnapshot> {
        let url = self.list_url();
        debug!(url = %url, "fetching issue list");

        let body = self
            .client
            .get(&url)
            .timeout(self.list_timeout)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let snapshot = parse_issue_list(&body)?;
        debug!(entries = snapshot.len(), "issue list fetched");
        Ok(snapshot)
    }
}

impl ItemSource for RoundupClient {
    async fn fetch_item(
        &self,
        id: IssueId,
        timeout: Duration,
    ) -> std::result::Result<String, FetchError> {
        let response = self
            .client
            .get(self.issue_url(id))
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?
            .error_for_status()
            .map_err(classify)?;

        let bytes = response.bytes().await.map_err(classify)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transient(err.to_string())
    }
}

/// Parse the tracker's `id,status` CSV export.
///
/// The first line is a header and is skipped, as are blank lines.
///
/// # Errors
///
/// Returns [`Error::MalformedMetadata`] for any row that is not two integers.
pub fn parse_issue_list(body: &str) -> Result<MetadataSnapshot> {
    let mut snapshot = MetadataSnapshot::new();

    for (index, line) in body.lines().enumerate().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let row = line.split_once(',').and_then(|(id, status)| {
            let id = id.trim().trim_matches('"').parse::<IssueId>().ok()?;
            let status = status.trim().trim_matches('"').parse::<i64>().ok()?;
            Some((id, status))
        });

        match row {
            Some((id, status)) => snapshot.insert(id, status),
            None => {
                return Err(Error::MalformedMetadata(format!(
                    "issue list line {}: {line:?}",
                    index + 1
                )));
            }
        }
    }

    Ok(snapshot)
}
