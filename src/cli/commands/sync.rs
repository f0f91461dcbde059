//! Sync command implementations (rebuild, refetch, check, fix, update).
//!
//! Each command runs exactly one orchestrator operation on a fresh tokio
//! runtime. Ctrl-C cancels the fetch batch; nothing is written in that case.

use std::path::Path;

use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::text_mode;
use crate::cli::Cli;
use crate::config::{load_settings, resolve_data_path, resolve_meta_path};
use crate::error::{Error, Result};
use crate::remote::{RoundupClient, RoundupExtractor};
use crate::storage::{ArchiveStore, MetadataStore};
use crate::sync::{FetchCoordinator, Operation, RunReport, SyncOrchestrator};

/// Execute one sync operation.
///
/// # Errors
///
/// Returns an error if configuration cannot be resolved, the runtime cannot
/// start, or the operation fails.
pub fn execute(cli: &Cli, operation: Operation, json: bool) -> Result<()> {
    let settings = load_settings()?;
    let meta_path = resolve_meta_path(cli.meta.as_deref())?;
    let data_path = resolve_data_path(cli.data.as_deref())?;
    let base_url = settings.base_url(cli.base_url.as_deref()).to_string();

    let client = RoundupClient::new(base_url.as_str()).with_list_timeout(settings.list_timeout());
    let cancel = CancellationToken::new();
    let fetcher = FetchCoordinator::new(client.clone(), RoundupExtractor::new(base_url))
        .with_concurrency(settings.threads(cli.threads))
        .with_policy(settings.retry)
        .with_cancellation(cancel.clone());

    let mut sync = SyncOrchestrator::new(
        client,
        fetcher,
        MetadataStore::new(&meta_path),
        ArchiveStore::new(&data_path, text_mode(cli.raw_text)),
    );

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;

    let report = rt.block_on(async {
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling");
                cancel.cancel();
            }
        });

        let result = match operation {
            Operation::Rebuild => sync.rebuild().await,
            Operation::Check => sync.check(cli.full_update).await,
            Operation::Refetch => sync.refetch().await,
            Operation::Fix => sync.fix().await,
            Operation::Update => sync.update(cli.full_update).await,
        };

        watcher.abort();
        result
    })?;

    if json {
        let output = serde_json::json!({
            "success": true,
            "metadata": meta_path.display().to_string(),
            "archive": data_path.display().to_string(),
            "report": report,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else if !cli.quiet {
        print_report(&report, &data_path);
    }
    Ok(())
}

fn print_report(report: &RunReport, data_path: &Path) {
    if let Some(diff) = &report.diff {
        if report.operation != Operation::Refetch {
            println!("{diff}");
        }
    }

    if report.operation == Operation::Check {
        println!("{} issues would be fetched.", report.selected);
        return;
    }

    if report.selected == 0 {
        println!("{}", "No change detected.".dimmed());
        return;
    }

    println!(
        "{} of {} issues fetched in {}.",
        report.fetched,
        report.selected,
        crate::sync::format_elapsed(std::time::Duration::from_secs_f64(report.elapsed_secs))
    );
    if report.failed() > 0 {
        println!(
            "{}",
            format!(
                "{} issues could not be fetched; run `pyissues fix` to retry them.",
                report.failed()
            )
            .yellow()
        );
    }
    if report.persisted {
        println!(
            "{} issues written to {}",
            report.written.to_string().green(),
            data_path.display()
        );
    }
}
