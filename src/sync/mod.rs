//! Synchronization engine.
//!
//! Keeps the local archive in step with the remote tracker:
//!
//! - **Diff**: old vs new metadata snapshot → ids to (re)fetch
//! - **Fetch**: bounded concurrent fetch with per-item retry
//! - **Orchestrator**: the named operations (rebuild, check, refetch, fix,
//!   update) and their persistence
//!
//! # Run pipeline
//!
//! 1. Fetch the remote `id → status` list
//! 2. Diff it against the stored snapshot
//! 3. Fetch the selected issues
//! 4. Merge them into the archive by id
//! 5. Write the archive, then the new snapshot
//!
//! # Example
//!
//! ```ignore
//! use pyissues::sync::{FetchCoordinator, SyncOrchestrator};
//!
//! let fetcher = FetchCoordinator::new(client.clone(), extractor).with_concurrency(16);
//! let mut sync = SyncOrchestrator::new(client, fetcher, metadata_store, archive_store);
//! let report = sync.update(false).await?;
//! ```

mod diff;
mod fetch;
mod orchestrator;
mod types;

pub use diff::{DiffOutcome, DiffReport, compute};
pub use fetch::{
    DEFAULT_CONCURRENCY, FetchCoordinator, FetchReport, RetryPolicy, resolve_concurrency,
};
pub use orchestrator::SyncOrchestrator;
pub use types::{Operation, RunPhase, RunReport, format_elapsed};
