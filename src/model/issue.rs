//! Issue and comment records.
//!
//! An [`Issue`] is the fully fetched form of one tracker entry. Its fields
//! fall into four shapes, each with its own storage layout in the archive:
//!
//! - scalar text fields ([`ScalarField`])
//! - multi-valued fields, ordered lists of strings ([`ListField`])
//! - node collections, ordered lists of `key → text` records ([`NodeField`])
//! - the message thread, an ordered list of [`Comment`]s

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::status::IssueId;
use crate::error::{Error, Result};

/// One row of a node collection (an attachment or a linked change).
pub type NodeRecord = BTreeMap<String, String>;

/// Scalar text fields of an issue, named as they appear in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarField {
    Title,
    Type,
    Stage,
    Status,
    Resolution,
    Dependencies,
    Superseder,
    AssignedTo,
    Priority,
    Created,
    CreatedBy,
    LastChanged,
    LastChangedBy,
}

impl ScalarField {
    pub const ALL: [Self; 13] = [
        Self::Title,
        Self::Type,
        Self::Stage,
        Self::Status,
        Self::Resolution,
        Self::Dependencies,
        Self::Superseder,
        Self::AssignedTo,
        Self::Priority,
        Self::Created,
        Self::CreatedBy,
        Self::LastChanged,
        Self::LastChangedBy,
    ];

    /// The four provenance fields, in the order the tracker prints them.
    pub const PROVENANCE: [Self; 4] = [
        Self::Created,
        Self::CreatedBy,
        Self::LastChanged,
        Self::LastChangedBy,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Type => "type",
            Self::Stage => "stage",
            Self::Status => "status",
            Self::Resolution => "resolution",
            Self::Dependencies => "dependencies",
            Self::Superseder => "superseder",
            Self::AssignedTo => "assigned_to",
            Self::Priority => "priority",
            Self::Created => "created",
            Self::CreatedBy => "created_by",
            Self::LastChanged => "last_changed",
            Self::LastChangedBy => "last_changed_by",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

/// Multi-valued fields of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListField {
    Keywords,
    NosyList,
    Versions,
    Components,
}

impl ListField {
    pub const ALL: [Self; 4] = [Self::Keywords, Self::NosyList, Self::Versions, Self::Components];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Keywords => "keywords",
            Self::NosyList => "nosy_list",
            Self::Versions => "versions",
            Self::Components => "components",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

/// Node-collection fields of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeField {
    Files,
    PullRequests,
}

impl NodeField {
    pub const ALL: [Self; 2] = [Self::Files, Self::PullRequests];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::PullRequests => "pull_requests",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// The combined `actor, date` column of this collection and the key the
    /// date half is moved to.
    #[must_use]
    pub const fn split_columns(self) -> (&'static str, &'static str) {
        match self {
            Self::Files => ("uploaded", "date"),
            Self::PullRequests => ("linked", "date"),
        }
    }
}

/// One message on an issue. Identity is the message url.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub url: String,
    pub author: String,
    /// Tracker handle, taken from the parenthesized part of the author.
    pub username: String,
    pub date: String,
    pub content: String,
}

impl Comment {
    /// Build a comment, deriving `author` and `username` from the raw
    /// `Name (handle)` author text.
    #[must_use]
    pub fn new(url: String, raw_author: &str, date: String, content: String) -> Self {
        let (author, username) = split_author(raw_author);
        Self {
            url,
            author,
            username,
            date,
            content,
        }
    }
}

/// A fully fetched issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,

    pub title: String,
    #[serde(rename = "type")]
    pub issue_type: String,
    pub stage: String,
    pub status: String,
    pub resolution: String,
    pub dependencies: String,
    pub superseder: String,
    pub assigned_to: String,
    pub priority: String,

    pub created: String,
    pub created_by: String,
    pub last_changed: String,
    pub last_changed_by: String,

    /// Whether the tracker page was rendered read-only.
    pub read_only: bool,

    pub keywords: Vec<String>,
    pub nosy_list: Vec<String>,
    pub versions: Vec<String>,
    pub components: Vec<String>,

    pub files: Vec<NodeRecord>,
    pub pull_requests: Vec<NodeRecord>,

    pub messages: Vec<Comment>,
}

impl Issue {
    /// Start building an issue with every field at its empty default.
    #[must_use]
    pub fn builder(id: IssueId) -> IssueBuilder {
        IssueBuilder::new(id)
    }

    #[must_use]
    pub fn scalar(&self, field: ScalarField) -> &str {
        match field {
            ScalarField::Title => &self.title,
            ScalarField::Type => &self.issue_type,
            ScalarField::Stage => &self.stage,
            ScalarField::Status => &self.status,
            ScalarField::Resolution => &self.resolution,
            ScalarField::Dependencies => &self.dependencies,
            ScalarField::Superseder => &self.superseder,
            ScalarField::AssignedTo => &self.assigned_to,
            ScalarField::Priority => &self.priority,
            ScalarField::Created => &self.created,
            ScalarField::CreatedBy => &self.created_by,
            ScalarField::LastChanged => &self.last_changed,
            ScalarField::LastChangedBy => &self.last_changed_by,
        }
    }

    pub fn scalar_mut(&mut self, field: ScalarField) -> &mut String {
        match field {
            ScalarField::Title => &mut self.title,
            ScalarField::Type => &mut self.issue_type,
            ScalarField::Stage => &mut self.stage,
            ScalarField::Status => &mut self.status,
            ScalarField::Resolution => &mut self.resolution,
            ScalarField::Dependencies => &mut self.dependencies,
            ScalarField::Superseder => &mut self.superseder,
            ScalarField::AssignedTo => &mut self.assigned_to,
            ScalarField::Priority => &mut self.priority,
            ScalarField::Created => &mut self.created,
            ScalarField::CreatedBy => &mut self.created_by,
            ScalarField::LastChanged => &mut self.last_changed,
            ScalarField::LastChangedBy => &mut self.last_changed_by,
        }
    }

    #[must_use]
    pub fn list(&self, field: ListField) -> &[String] {
        match field {
            ListField::Keywords => &self.keywords,
            ListField::NosyList => &self.nosy_list,
            ListField::Versions => &self.versions,
            ListField::Components => &self.components,
        }
    }

    pub fn list_mut(&mut self, field: ListField) -> &mut Vec<String> {
        match field {
            ListField::Keywords => &mut self.keywords,
            ListField::NosyList => &mut self.nosy_list,
            ListField::Versions => &mut self.versions,
            ListField::Components => &mut self.components,
        }
    }

    #[must_use]
    pub fn nodes(&self, field: NodeField) -> &[NodeRecord] {
        match field {
            NodeField::Files => &self.files,
            NodeField::PullRequests => &self.pull_requests,
        }
    }

    pub fn nodes_mut(&mut self, field: NodeField) -> &mut Vec<NodeRecord> {
        match field {
            NodeField::Files => &mut self.files,
            NodeField::PullRequests => &mut self.pull_requests,
        }
    }
}

/// Validating constructor for [`Issue`].
///
/// Every field starts at its declared default (empty text, empty list,
/// `read_only = false`); [`build`](Self::build) rejects records that could
/// not be stored under their identity.
#[derive(Debug, Clone)]
pub struct IssueBuilder {
    issue: Issue,
}

impl IssueBuilder {
    #[must_use]
    pub fn new(id: IssueId) -> Self {
        Self {
            issue: Issue {
                id,
                ..Issue::default()
            },
        }
    }

    #[must_use]
    pub fn scalar(mut self, field: ScalarField, value: impl Into<String>) -> Self {
        self.set_scalar(field, value);
        self
    }

    #[must_use]
    pub fn list<I, S>(mut self, field: ListField, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_list(field, values);
        self
    }

    #[must_use]
    pub fn node(mut self, field: NodeField, record: NodeRecord) -> Self {
        self.push_node(field, record);
        self
    }

    #[must_use]
    pub fn comment(mut self, comment: Comment) -> Self {
        self.push_comment(comment);
        self
    }

    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.issue.read_only = read_only;
        self
    }

    pub fn set_scalar(&mut self, field: ScalarField, value: impl Into<String>) {
        *self.issue.scalar_mut(field) = value.into();
    }

    pub fn set_list<I, S>(&mut self, field: ListField, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.issue.list_mut(field) = values.into_iter().map(Into::into).collect();
    }

    pub fn push_node(&mut self, field: NodeField, record: NodeRecord) {
        self.issue.nodes_mut(field).push(record);
    }

    pub fn push_comment(&mut self, comment: Comment) {
        self.issue.messages.push(comment);
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.issue.read_only = read_only;
    }

    /// Finish the record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the id is zero or a message has
    /// no url (its identity).
    pub fn build(self) -> Result<Issue> {
        if self.issue.id == 0 {
            return Err(Error::InvalidArgument("issue id must be positive".into()));
        }
        if let Some(pos) = self.issue.messages.iter().position(|c| c.url.is_empty()) {
            return Err(Error::InvalidArgument(format!(
                "message {} of issue {} has no url",
                pos + 1,
                self.issue.id
            )));
        }
        Ok(self.issue)
    }
}

/// Remove every `(...)` group, matching each `(` with the nearest `)`.
#[must_use]
pub fn strip_parenthesized(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('(') {
        let Some(close) = rest[open..].find(')') else {
            break;
        };
        out.push_str(&rest[..open]);
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    out
}

/// Split `Name (handle)` into `("Name", "handle")`.
///
/// The handle is only taken when exactly one parenthesized group exists;
/// otherwise it is empty.
#[must_use]
pub fn split_author(raw: &str) -> (String, String) {
    let mut groups = Vec::new();
    let mut rest = raw;
    while let Some(open) = rest.find('(') {
        let Some(close) = rest[open..].find(')') else {
            break;
        };
        groups.push(&rest[open + 1..open + close]);
        rest = &rest[open + close + 1..];
    }
    let username = match groups.as_slice() {
        [single] => (*single).to_string(),
        _ => String::new(),
    };
    (strip_parenthesized(raw).trim().to_string(), username)
}
