//! Archive command implementations (load, show, merge).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use colored::Colorize;

use super::text_mode;
use crate::cli::Cli;
use crate::config::resolve_data_path;
use crate::error::{Error, Result};
use crate::model::{Issue, IssueId, ListField, NodeField, ScalarField};
use crate::storage::file::file_size;
use crate::storage::{ArchiveStore, merge_containers};

fn open_store(cli: &Cli) -> Result<ArchiveStore> {
    let path = resolve_data_path(cli.data.as_deref())?;
    Ok(ArchiveStore::new(path, text_mode(cli.raw_text)))
}

/// Render an epoch-seconds timestamp as RFC 3339, if representable.
#[allow(clippy::cast_possible_truncation)]
fn format_timestamp(seconds: f64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_micros((seconds * 1_000_000.0) as i64)
        .map(|t| t.to_rfc3339())
}

/// Load the archive and report its size.
///
/// # Errors
///
/// Returns an error if the archive is missing or cannot be decoded.
pub fn load(cli: &Cli, json: bool) -> Result<()> {
    let store = open_store(cli)?;
    let archive = store.load()?;
    let last_fetched = format_timestamp(archive.last_fetched());

    if json {
        let output = serde_json::json!({
            "path": store.path().display().to_string(),
            "issues": archive.len(),
            "last_fetched": archive.last_fetched(),
            "last_fetched_at": last_fetched,
            "size_bytes": file_size(store.path()),
        });
        println!("{}", serde_json::to_string(&output)?);
    } else if !cli.quiet {
        println!(
            "{} issues loaded from {}",
            archive.len().to_string().green(),
            store.path().display()
        );
        if let Some(at) = last_fetched {
            println!("Last fetched: {at}");
        }
    }
    Ok(())
}

/// Display one archived issue.
///
/// # Errors
///
/// Returns [`Error::IssueNotFound`] if the archive lacks `id`, or an error
/// if the archive cannot be loaded.
pub fn show(cli: &Cli, id: IssueId, json: bool) -> Result<()> {
    let archive = open_store(cli)?.load()?;
    let issue = archive.get(id).ok_or(Error::IssueNotFound { id })?;

    if json {
        println!("{}", serde_json::to_string_pretty(issue)?);
    } else {
        print_issue(issue);
    }
    Ok(())
}

fn print_issue(issue: &Issue) {
    println!(
        "{} {}",
        format!("issue{}", issue.id).cyan().bold(),
        issue.title.bold()
    );
    if issue.read_only {
        println!("{}", "(read-only)".dimmed());
    }

    for field in ScalarField::ALL {
        if field == ScalarField::Title {
            continue;
        }
        let value = issue.scalar(field);
        if !value.is_empty() {
            println!("  {:<16} {value}", field.name());
        }
    }
    for field in ListField::ALL {
        let values = issue.list(field);
        if !values.is_empty() {
            println!("  {:<16} {}", field.name(), values.join(", "));
        }
    }
    for field in NodeField::ALL {
        let records = issue.nodes(field);
        if !records.is_empty() {
            println!("  {:<16} {}", field.name(), records.len());
        }
    }

    for comment in &issue.messages {
        println!();
        let who = if comment.username.is_empty() {
            comment.author.clone()
        } else {
            format!("{} ({})", comment.author, comment.username)
        };
        println!("{} {} {}", comment.date.dimmed(), who.yellow(), comment.url.dimmed());
        println!("{}", comment.content);
    }
}

/// Merge archive files into one; files that fail to load are skipped.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if none of the inputs could be loaded,
/// or an error if the output cannot be written.
pub fn merge(cli: &Cli, inputs: &[PathBuf], output: Option<&Path>, json: bool) -> Result<()> {
    let mode = text_mode(cli.raw_text);
    let output = match output {
        Some(path) => path.to_path_buf(),
        None => resolve_data_path(cli.data.as_deref())?,
    };

    let merged = merge_containers(inputs, mode);
    if merged.loaded.is_empty() {
        return Err(Error::InvalidArgument(
            "none of the input archives could be loaded".to_string(),
        ));
    }

    let written = ArchiveStore::new(&output, mode).save(&merged.archive)?;

    if json {
        let payload = serde_json::json!({
            "output": output.display().to_string(),
            "written": written,
            "loaded": merged.loaded.len(),
            "failed": merged.failed,
            "stats": merged.stats,
        });
        println!("{}", serde_json::to_string(&payload)?);
    } else if !cli.quiet {
        for failure in &merged.failed {
            println!(
                "{} {}: {}",
                "skipped".yellow(),
                failure.path.display(),
                failure.error
            );
        }
        println!(
            "{} issues from {} files written to {}",
            written.to_string().green(),
            merged.loaded.len(),
            output.display()
        );
    }
    Ok(())
}
