//! Concurrent, best-effort issue fetching.
//!
//! Every id is an independent unit of work on a bounded pool of tokio tasks.
//! A worker owns its network calls and its retry loop; an id whose retries
//! run out is dropped from the result, and that absence is the only failure
//! signal callers see. Cancellation aborts the whole batch.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{Issue, IssueId};
use crate::remote::{FetchError, ItemSource, RecordExtractor};

/// Default number of concurrent workers.
pub const DEFAULT_CONCURRENCY: usize = 16;

/// Per-item retry policy.
///
/// A timeout grows the next attempt's timeout by `timeout_step_secs`; once
/// that would exceed `max_timeout_secs` the item is abandoned. Any other
/// failure is retried until `max_attempts` attempts have failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub initial_timeout_secs: u64,
    pub timeout_step_secs: u64,
    pub max_timeout_secs: u64,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_timeout_secs: 10,
            timeout_step_secs: 5,
            max_timeout_secs: 60,
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    /// Check that every item is eventually abandoned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the timeout never grows, no attempt is
    /// allowed, or the first timeout is already past the ceiling.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_step_secs == 0 {
            return Err(Error::Config("retry.timeout_step_secs must be positive".into()));
        }
        if self.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be positive".into()));
        }
        if self.initial_timeout_secs == 0 || self.initial_timeout_secs > self.max_timeout_secs {
            return Err(Error::Config(format!(
                "retry.initial_timeout_secs must be between 1 and max_timeout_secs ({})",
                self.max_timeout_secs
            )));
        }
        Ok(())
    }
}

/// Outcome counts for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchReport {
    pub requested: usize,
    pub fetched: usize,
    pub elapsed: Duration,
}

impl FetchReport {
    /// Ids that were requested but produced no record.
    #[must_use]
    pub fn missing(&self) -> usize {
        self.requested.saturating_sub(self.fetched)
    }
}

/// Resolve a worker count; `0` means every available core.
#[must_use]
pub fn resolve_concurrency(requested: usize) -> usize {
    if requested == 0 {
        std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
    } else {
        requested
    }
}

/// Fetches and extracts batches of issues.
pub struct FetchCoordinator<S, E> {
    source: Arc<S>,
    extractor: Arc<E>,
    concurrency: usize,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl<S, E> FetchCoordinator<S, E>
where
    S: ItemSource + 'static,
    E: RecordExtractor + 'static,
{
    #[must_use]
    pub fn new(source: S, extractor: E) -> Self {
        Self {
            source: Arc::new(source),
            extractor: Arc::new(extractor),
            concurrency: DEFAULT_CONCURRENCY,
            policy: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Set the worker count; `0` uses all available parallelism.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = resolve_concurrency(concurrency);
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Abort batches when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Fetch every id in `ids`.
    ///
    /// Records come back in completion order. Ids whose retries are
    /// exhausted are left out; compare [`FetchReport::fetched`] with
    /// [`FetchReport::requested`] to detect a shortfall.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the cancellation token fires before
    /// the batch completes. In-flight workers are aborted and no partial
    /// result is returned.
    pub async fn fetch(&self, ids: &BTreeSet<IssueId>) -> Result<(Vec<Issue>, FetchReport)> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let start = Instant::now();
        info!(
            requested = ids.len(),
            concurrency = self.concurrency,
            "fetching issues"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut workers = JoinSet::new();
        for &id in ids {
            let source = Arc::clone(&self.source);
            let extractor = Arc::clone(&self.extractor);
            let semaphore = Arc::clone(&semaphore);
            let policy = self.policy;
            workers.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                fetch_one(source.as_ref(), extractor.as_ref(), id, policy).await
            });
        }

        let mut issues = Vec::with_capacity(ids.len());
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    workers.abort_all();
                    warn!(fetched = issues.len(), "fetch cancelled");
                    return Err(Error::Cancelled);
                }
                joined = workers.join_next() => match joined {
                    None => break,
                    Some(Ok(Some(issue))) => issues.push(issue),
                    Some(Ok(None)) => {}
                    Some(Err(e)) => warn!(error = %e, "fetch worker failed"),
                },
            }
        }

        let report = FetchReport {
            requested: ids.len(),
            fetched: issues.len(),
            elapsed: start.elapsed(),
        };
        info!(
            requested = report.requested,
            fetched = report.fetched,
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "fetch complete"
        );
        Ok((issues, report))
    }
}

/// Fetch and extract one issue, retrying per `policy`.
async fn fetch_one<S, E>(source: &S, extractor: &E, id: IssueId, policy: RetryPolicy) -> Option<Issue>
where
    S: ItemSource,
    E: RecordExtractor,
{
    let mut timeout_secs = policy.initial_timeout_secs;
    let mut failures = 0u32;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let outcome = match source.fetch_item(id, Duration::from_secs(timeout_secs)).await {
            Ok(document) => extractor
                .extract(id, &document)
                .map_err(|e| FetchError::Transient(e.to_string())),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(issue) => {
                debug!(id, attempt, "issue fetched");
                return Some(issue);
            }
            Err(FetchError::Timeout) => {
                timeout_secs += policy.timeout_step_secs.max(1);
                if timeout_secs > policy.max_timeout_secs {
                    warn!(id, attempt, "request timed out at the ceiling, giving up");
                    return None;
                }
                info!(id, attempt, timeout_secs, "request timed out, retrying");
            }
            Err(FetchError::Transient(reason)) => {
                failures += 1;
                if failures >= policy.max_attempts {
                    warn!(id, attempt, reason = %reason, "issue failed, giving up");
                    return None;
                }
                info!(id, attempt, reason = %reason, "issue failed, retrying");
            }
        }
    }
}
