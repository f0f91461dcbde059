//! Roundup issue page extraction.
//!
//! Each `<table>` on an issue page is dispatched by its first CSS class
//! through [`TABLE_HANDLERS`]; tables with no handler are ignored.

use std::collections::HashMap;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::trace;

use super::RecordExtractor;
use super::http::DEFAULT_BASE_URL;
use crate::error::{Error, Result};
use crate::model::{
    Comment, Issue, IssueBuilder, IssueId, ListField, NodeField, NodeRecord, ScalarField,
    strip_parenthesized,
};

/// Separator Roundup puts between the parts of a combined cell.
const PART_SEPARATOR: &str = ",\n   ";

/// Separator between values of a multi-valued field.
const LIST_SEPARATOR: &str = ", ";

type TableHandler = fn(&Page<'_>, ElementRef<'_>, &mut IssueBuilder) -> Result<()>;

/// Table class → handler, built once.
static TABLE_HANDLERS: LazyLock<HashMap<&'static str, TableHandler>> = LazyLock::new(|| {
    [
        ("form", parse_form as TableHandler),
        ("files", parse_files as TableHandler),
        ("messages", parse_messages as TableHandler),
    ]
    .into_iter()
    .collect()
});

static TABLE: LazyLock<Selector> = LazyLock::new(|| selector("table"));
static ROW: LazyLock<Selector> = LazyLock::new(|| selector("tr"));
static HEADER_CELL: LazyLock<Selector> = LazyLock::new(|| selector("th"));
static DATA_CELL: LazyLock<Selector> = LazyLock::new(|| selector("td"));
static LINK: LazyLock<Selector> = LazyLock::new(|| selector("a"));
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| selector("p"));
static STRONG: LazyLock<Selector> = LazyLock::new(|| selector("strong"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

/// Per-document context handed to the table handlers.
struct Page<'a> {
    home: &'a str,
    issue_url: String,
}

/// Extracts [`Issue`] records from Roundup issue pages.
#[derive(Debug, Clone)]
pub struct RoundupExtractor {
    home: String,
}

impl RoundupExtractor {
    /// Extractor for pages served from `home` (the tracker root); relative
    /// links are resolved against it.
    #[must_use]
    pub fn new(home: impl Into<String>) -> Self {
        let mut home = home.into();
        if !home.ends_with('/') {
            home.push('/');
        }
        Self { home }
    }
}

impl Default for RoundupExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl RecordExtractor for RoundupExtractor {
    fn extract(&self, id: IssueId, document: &str) -> Result<Issue> {
        let html = Html::parse_document(document);
        let page = Page {
            home: &self.home,
            issue_url: format!("{}issue{id}", self.home),
        };

        let mut builder = Issue::builder(id);
        let mut has_form = false;

        for table in html.select(&TABLE) {
            let Some(class) = table
                .value()
                .attr("class")
                .and_then(|c| c.split_whitespace().next())
            else {
                continue;
            };
            if let Some(handler) = TABLE_HANDLERS.get(class) {
                handler(&page, table, &mut builder)?;
                has_form |= class == "form";
            }
        }

        if !has_form {
            return Err(Error::Parse(format!("issue {id}: page has no issue form")));
        }

        for paragraph in html.select(&PARAGRAPH) {
            let strong: Vec<String> = paragraph.select(&STRONG).map(element_text).collect();
            if strong.len() == 4 || strong.len() == 5 {
                builder.set_read_only(strong.len() == 5);
                for (field, value) in ScalarField::PROVENANCE.iter().zip(strong) {
                    builder.set_scalar(*field, value);
                }
                break;
            }
        }

        builder.build()
    }
}

/// The issue form: `<th>` labels paired positionally with `<td>` values.
fn parse_form(_page: &Page<'_>, table: ElementRef<'_>, builder: &mut IssueBuilder) -> Result<()> {
    let labels: Vec<String> = table
        .select(&HEADER_CELL)
        .map(|cell| normalize_label(&cell_text(cell)))
        .collect();
    let values: Vec<Vec<String>> = table
        .select(&DATA_CELL)
        .map(|cell| format_value(&cell_text(cell)))
        .collect();

    for (label, parts) in labels.into_iter().zip(values) {
        if let Some(field) = ScalarField::from_name(&label) {
            builder.set_scalar(field, parts.join(LIST_SEPARATOR));
        } else if let Some(field) = ListField::from_name(&label) {
            builder.set_list(field, split_list(&parts));
        } else {
            trace!(label = %label, "ignoring form field");
        }
    }
    Ok(())
}

/// A sub-record table: title row, column-name row, then one row per record.
fn parse_files(page: &Page<'_>, table: ElementRef<'_>, builder: &mut IssueBuilder) -> Result<()> {
    let mut rows = table.select(&ROW);

    let Some(title) = rows
        .next()
        .and_then(|row| row.select(&HEADER_CELL).next())
        .map(|cell| normalize_label(&cell_text(cell)))
    else {
        return Ok(());
    };
    let Some(field) = NodeField::from_name(&title) else {
        trace!(title = %title, "ignoring sub-record table");
        return Ok(());
    };
    let (split_column, date_column) = field.split_columns();

    let columns: Vec<String> = rows
        .next()
        .map(|row| {
            row.select(&HEADER_CELL)
                .map(|cell| normalize_label(&cell_text(cell)))
                .collect()
        })
        .unwrap_or_default();

    for row in rows {
        let mut record = NodeRecord::new();
        for (column, cell) in columns.iter().zip(row.select(&DATA_CELL)) {
            let parts = format_value(&cell_value(cell, Some(page.home)));
            if column == split_column {
                let mut parts = parts.into_iter();
                record.insert(column.clone(), parts.next().unwrap_or_default());
                record.insert(date_column.to_string(), parts.next().unwrap_or_default());
            } else {
                record.insert(column.clone(), parts.join(LIST_SEPARATOR));
            }
        }
        builder.push_node(field, record);
    }
    Ok(())
}

/// Messages come in row pairs: a header row (link, author, date) followed
/// by a content row.
fn parse_messages(
    page: &Page<'_>,
    table: ElementRef<'_>,
    builder: &mut IssueBuilder,
) -> Result<()> {
    let mut rows = table.select(&ROW).skip(1);

    while let (Some(meta), Some(body)) = (rows.next(), rows.next()) {
        let mut header = meta.select(&HEADER_CELL);
        let (Some(link), Some(author), Some(date)) = (header.next(), header.next(), header.next())
        else {
            return Err(Error::Parse(format!(
                "{}: message header has fewer than three cells",
                page.issue_url
            )));
        };

        let mut url = first_part(&cell_value(link, Some(&page.issue_url)));
        if url.is_empty() {
            url = url_join(&page.issue_url, &cell_text(link));
        }
        let author = first_part(&cell_text(author));
        let date = first_part(&cell_text(date));
        let content = body.select(&DATA_CELL).next().map(cell_text).unwrap_or_default();

        builder.push_comment(Comment::new(url, &author, date, content));
    }
    Ok(())
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Cell text, trimmed, without a trailing `:`.
fn cell_text(cell: ElementRef<'_>) -> String {
    let text = element_text(cell);
    text.strip_suffix(':').unwrap_or(&text).trim().to_string()
}

/// Cell text, or the resolved target of its first link when `links` is set.
fn cell_value(cell: ElementRef<'_>, links: Option<&str>) -> String {
    let (Some(base), Some(anchor)) = (links, cell.select(&LINK).next()) else {
        return cell_text(cell);
    };
    let href = anchor.value().attr("href").unwrap_or_default().trim();
    if href.is_empty() || href.contains("http") {
        href.to_string()
    } else {
        url_join(base, href)
    }
}

fn first_part(value: &str) -> String {
    format_value(value).into_iter().next().unwrap_or_default()
}

fn split_list(parts: &[String]) -> Vec<String> {
    parts
        .iter()
        .flat_map(|part| part.split(LIST_SEPARATOR))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalize a table label into a field name: parenthesized text removed,
/// lower-cased, trailing `:` dropped, spaces replaced by `_`.
///
/// `"Nosy List:"` becomes `nosy_list`, `"Messages (3)"` becomes `messages`.
#[must_use]
pub fn normalize_label(label: &str) -> String {
    let stripped = strip_parenthesized(label).to_lowercase();
    let trimmed = stripped.trim();
    trimmed
        .strip_suffix(':')
        .unwrap_or(trimmed)
        .trim()
        .replace(' ', "_")
}

/// Clean a cell value.
///
/// `Author:` and `Date:` prefixes are removed (and the `*` marker from
/// authors); a combined cell is split into its parts. Always returns at
/// least one element.
#[must_use]
pub fn format_value(value: &str) -> Vec<String> {
    let prefix = value
        .split_once(':')
        .map(|(head, _)| head.rsplit('\n').next().unwrap_or(head))
        .unwrap_or_default();

    match prefix {
        "Author" => {
            let rest = value.strip_prefix("Author:").unwrap_or(value);
            vec![rest.replace('*', "").trim().to_string()]
        }
        "Date" => {
            let rest = value.strip_prefix("Date:").unwrap_or(value);
            vec![rest.trim().to_string()]
        }
        _ if value.contains(PART_SEPARATOR) => value
            .split(PART_SEPARATOR)
            .map(|part| part.trim().to_string())
            .collect(),
        _ => vec![value.trim().to_string()],
    }
}

/// Join a base url and a relative link, with exactly one `/` between them
/// unless the link is an absolute path or fragment.
#[must_use]
pub fn url_join(base: &str, link: &str) -> String {
    let base_slash = base.ends_with('/');
    let link_rooted = link.starts_with('/') || link.starts_with('#');
    match (base_slash, link_rooted) {
        (true, true) => format!("{}{link}", &base[..base.len() - 1]),
        (false, false) => format!("{base}/{link}"),
        _ => format!("{base}{link}"),
    }
}
