//! Archive container codec.
//!
//! A container is a single JSON document, compressed as one unit:
//!
//! ```json
//! {"items":2,"last_fetched":1700000000.5,"issues":[
//!   {"attrs":{"_id":"MQ==","title":"..."},
//!    "multiple":{"keywords":["..."]},
//!    "nodes":{"files":[{"uploaded":"...","date":"..."}]},
//!    "complex":{"messages":[{"url":"...","author":"...","date":"...","username":"...","text":"..."}]}}
//! ]}
//! ```
//!
//! Text values pass through the container's [`TextMode`]; message identity
//! fields (`url`, `author`, `date`, `username`) are stored verbatim and only
//! the message body is transformed.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use super::text::TextMode;
use super::Archive;
use crate::error::{Error, Result};
use crate::model::{Comment, Issue, IssueId, ListField, NodeField, NodeRecord, ScalarField};

const ID_KEY: &str = "_id";
const READ_ONLY_KEY: &str = "read_only";
const MESSAGES_KEY: &str = "messages";

/// Outer framing of a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContainerFormat {
    /// Gzip-compressed document.
    #[default]
    Gzip,
    /// Uncompressed document.
    Plain,
}

impl ContainerFormat {
    /// Gzip for paths ending in `gz`, plain otherwise.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        if path.to_string_lossy().ends_with("gz") {
            Self::Gzip
        } else {
            Self::Plain
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ContainerRoot {
    items: usize,
    last_fetched: f64,
    #[serde(default)]
    issues: Vec<IssueNode>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IssueNode {
    attrs: BTreeMap<String, String>,
    #[serde(default)]
    multiple: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    nodes: BTreeMap<String, Vec<NodeRecord>>,
    #[serde(default)]
    complex: BTreeMap<String, Vec<CommentNode>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CommentNode {
    url: String,
    author: String,
    date: String,
    username: String,
    #[serde(default)]
    text: String,
}

/// Decoded container contents, in stored order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Container {
    pub last_fetched: f64,
    pub issues: Vec<Issue>,
}

/// Encoder/decoder for archive containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveCodec {
    mode: TextMode,
    format: ContainerFormat,
}

impl ArchiveCodec {
    #[must_use]
    pub fn new(mode: TextMode, format: ContainerFormat) -> Self {
        Self { mode, format }
    }

    #[must_use]
    pub fn mode(&self) -> TextMode {
        self.mode
    }

    #[must_use]
    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    /// Encode issues into container bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or compression fails.
    pub fn encode<'a, I>(&self, issues: I, last_fetched: f64) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = &'a Issue>,
    {
        if self.mode == TextMode::Raw {
            warn!(
                "writing archive without the base64 text transform; \
                 it will only reload with --raw-text"
            );
        }

        let issues: Vec<IssueNode> = issues.into_iter().map(|i| self.issue_node(i)).collect();
        let root = ContainerRoot {
            items: issues.len(),
            last_fetched,
            issues,
        };
        let document = serde_json::to_vec(&root)?;

        match self.format {
            ContainerFormat::Plain => Ok(document),
            ContainerFormat::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(&document)?;
                Ok(encoder.finish()?)
            }
        }
    }

    /// Encode a whole archive, stamping its last-fetched time.
    ///
    /// # Errors
    ///
    /// See [`encode`](Self::encode).
    pub fn encode_archive(&self, archive: &Archive) -> Result<Vec<u8>> {
        self.encode(archive.iter(), archive.last_fetched())
    }

    /// Decode container bytes, keeping the stored order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedContainer`] if the bytes are not a valid
    /// container in this codec's format and text mode.
    pub fn decode(&self, bytes: &[u8]) -> Result<Container> {
        let document = match self.format {
            ContainerFormat::Plain => bytes.to_vec(),
            ContainerFormat::Gzip => {
                let mut document = Vec::new();
                GzDecoder::new(bytes)
                    .read_to_end(&mut document)
                    .map_err(|e| Error::MalformedContainer(format!("decompression failed: {e}")))?;
                document
            }
        };

        let root: ContainerRoot = serde_json::from_slice(&document)
            .map_err(|e| Error::MalformedContainer(e.to_string()))?;

        if root.items != root.issues.len() {
            return Err(Error::MalformedContainer(format!(
                "root declares {} items but holds {}",
                root.items,
                root.issues.len()
            )));
        }

        let issues = root
            .issues
            .into_iter()
            .map(|node| self.issue_from_node(node))
            .collect::<Result<Vec<_>>>()?;

        Ok(Container {
            last_fetched: root.last_fetched,
            issues,
        })
    }

    /// Decode into an ordered sequence of issues.
    ///
    /// # Errors
    ///
    /// See [`decode`](Self::decode).
    pub fn decode_records(&self, bytes: &[u8]) -> Result<Vec<Issue>> {
        Ok(self.decode(bytes)?.issues)
    }

    /// Decode into an id-keyed archive. Later duplicates replace earlier ones.
    ///
    /// # Errors
    ///
    /// See [`decode`](Self::decode).
    pub fn decode_archive(&self, bytes: &[u8]) -> Result<Archive> {
        let container = self.decode(bytes)?;
        let mut archive = Archive::from_issues(container.issues);
        archive.set_last_fetched(container.last_fetched);
        Ok(archive)
    }

    fn issue_node(&self, issue: &Issue) -> IssueNode {
        let mode = self.mode;
        let mut node = IssueNode::default();

        node.attrs.insert(ID_KEY.to_string(), mode.encode(&issue.id.to_string()));
        node.attrs.insert(
            READ_ONLY_KEY.to_string(),
            mode.encode(if issue.read_only { "true" } else { "false" }),
        );
        for field in ScalarField::ALL {
            node.attrs
                .insert(field.name().to_string(), mode.encode(issue.scalar(field)));
        }

        for field in ListField::ALL {
            let values = issue.list(field).iter().map(|v| mode.encode(v)).collect();
            node.multiple.insert(field.name().to_string(), values);
        }

        for field in NodeField::ALL {
            let records = issue
                .nodes(field)
                .iter()
                .map(|record| {
                    record
                        .iter()
                        .map(|(k, v)| (k.clone(), mode.encode(v)))
                        .collect::<NodeRecord>()
                })
                .collect();
            node.nodes.insert(field.name().to_string(), records);
        }

        let messages = issue
            .messages
            .iter()
            .map(|c| CommentNode {
                url: c.url.clone(),
                author: c.author.clone(),
                date: c.date.clone(),
                username: c.username.clone(),
                text: mode.encode(&c.content),
            })
            .collect();
        node.complex.insert(MESSAGES_KEY.to_string(), messages);

        node
    }

    fn issue_from_node(&self, node: IssueNode) -> Result<Issue> {
        let mode = self.mode;
        let mut issue = Issue::default();
        let mut id: Option<IssueId> = None;

        for (key, raw) in &node.attrs {
            let value = mode.decode(raw)?;
            match key.as_str() {
                ID_KEY => {
                    let parsed = value.trim().parse().map_err(|_| {
                        Error::MalformedContainer(format!("invalid issue id {value:?}"))
                    })?;
                    id = Some(parsed);
                }
                READ_ONLY_KEY => issue.read_only = value == "true",
                other => match ScalarField::from_name(other) {
                    Some(field) => *issue.scalar_mut(field) = value,
                    None => trace!(key = other, "ignoring unknown issue attribute"),
                },
            }
        }
        issue.id = id.ok_or_else(|| Error::MalformedContainer("issue without _id".into()))?;

        for (key, values) in node.multiple {
            let Some(field) = ListField::from_name(&key) else {
                trace!(key = %key, "ignoring unknown multi-valued field");
                continue;
            };
            *issue.list_mut(field) = values
                .iter()
                .map(|v| mode.decode(v))
                .collect::<Result<_>>()?;
        }

        for (key, records) in node.nodes {
            let Some(field) = NodeField::from_name(&key) else {
                trace!(key = %key, "ignoring unknown node collection");
                continue;
            };
            *issue.nodes_mut(field) = records
                .into_iter()
                .map(|record| {
                    record
                        .into_iter()
                        .map(|(k, v)| Ok((k, mode.decode(&v)?)))
                        .collect::<Result<NodeRecord>>()
                })
                .collect::<Result<_>>()?;
        }

        for (key, comments) in node.complex {
            if key != MESSAGES_KEY {
                trace!(key = %key, "ignoring unknown complex collection");
                continue;
            }
            issue.messages = comments
                .into_iter()
                .map(|c| {
                    Ok(Comment {
                        content: mode.decode(&c.text)?,
                        url: c.url,
                        author: c.author,
                        username: c.username,
                        date: c.date,
                    })
                })
                .collect::<Result<_>>()?;
        }

        Ok(issue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IssueBuilder;
    use tracing_test::traced_test;

    fn full_issue(id: IssueId) -> Issue {
        let mut file = NodeRecord::new();
        file.insert("file".into(), "https://bugs.python.org/file1/patch.diff".into());
        file.insert("uploaded".into(), "loewis".into());
        file.insert("date".into(), "2008-01-01 10:00".into());
        file.insert("description".into(), "ctrl \u{1}\u{2} bytes".into());

        let mut pr = NodeRecord::new();
        pr.insert("url".into(), "https://github.com/python/cpython/pull/1".into());
        pr.insert("linked".into(), "vstinner".into());
        pr.insert("date".into(), "2017-02-02 11:00".into());

        IssueBuilder::new(id)
            .scalar(ScalarField::Title, "Segfault <in> \"parser\" & lexer\u{0}")
            .scalar(ScalarField::Type, "crash")
            .scalar(ScalarField::Status, "closed")
            .scalar(ScalarField::AssignedTo, "")
            .scalar(ScalarField::Created, "2008-01-01 09:00")
            .scalar(ScalarField::CreatedBy, "loewis")
            .scalar(ScalarField::LastChanged, "2017-02-02 11:00")
            .scalar(ScalarField::LastChangedBy, "vstinner")
            .read_only(true)
            .list(ListField::Keywords, ["patch", "easy"])
            .list(ListField::NosyList, ["loewis", "vstinner", "\u{7f}odd"])
            .list(ListField::Versions, ["Python 2.6"])
            .node(NodeField::Files, file)
            .node(NodeField::PullRequests, pr)
            .comment(Comment::new(
                "https://bugs.python.org/msg1".into(),
                "Martin v. Löwis (loewis)",
                "2008-01-01 09:00".into(),
                "line one\nline two\r\n\u{1b}[31mred\u{1b}[0m\u{b}".into(),
            ))
            .comment(Comment::new(
                "https://bugs.python.org/msg2".into(),
                "anonymous",
                "2008-01-02 09:00".into(),
                String::new(),
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn test_round_trip_preserves_every_field() {
        let codec = ArchiveCodec::default();
        let issues = vec![full_issue(1), full_issue(2), Issue { id: 3, ..Issue::default() }];

        let bytes = codec.encode(&issues, 1_700_000_000.25).unwrap();
        let container = codec.decode(&bytes).unwrap();

        assert_eq!(container.issues, issues);
        assert!((container.last_fetched - 1_700_000_000.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_gzip_compresses_whole_document() {
        let codec = ArchiveCodec::default();
        let bytes = codec.encode(&[full_issue(1)], 0.0).unwrap();

        assert_eq!(&bytes[..2], &[0x1f, 0x8b], "gzip magic at start of container");
        assert!(GzDecoder::new(&bytes[..]).bytes().all(|b| b.is_ok()));
    }

    #[test]
    fn test_plain_format_has_root_counts() {
        let codec = ArchiveCodec::new(TextMode::Base64, ContainerFormat::Plain);
        let bytes = codec.encode(&[full_issue(5), full_issue(6)], 12.5).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["items"], 2);
        assert_eq!(value["last_fetched"], 12.5);
        // Comment identity fields are stored verbatim, the body is transformed.
        let message = &value["issues"][0]["complex"]["messages"][0];
        assert_eq!(message["url"], "https://bugs.python.org/msg1");
        assert_eq!(message["username"], "loewis");
        assert_ne!(message["text"], "line one\nline two\r\n\u{1b}[31mred\u{1b}[0m\u{b}");
    }

    #[test]
    #[traced_test]
    fn test_raw_mode_warns_and_reloads_control_characters() {
        let raw = ArchiveCodec::new(TextMode::Raw, ContainerFormat::Plain);
        let issue = IssueBuilder::new(4)
            .scalar(ScalarField::Title, "bell\u{7} nul\u{0} esc\u{1b}[0m")
            .build()
            .unwrap();

        let bytes = raw.encode([&issue], 0.0).unwrap();

        assert!(logs_contain("without the base64 text transform"));
        assert_eq!(raw.decode_records(&bytes).unwrap(), vec![issue]);
        assert!(ArchiveCodec::new(TextMode::Base64, ContainerFormat::Plain)
            .decode(&bytes)
            .is_err());
    }

    #[test]
    #[traced_test]
    fn test_base64_mode_does_not_warn() {
        ArchiveCodec::default().encode(&[full_issue(1)], 0.0).unwrap();
        assert!(!logs_contain("without the base64 text transform"));
    }

    #[test]
    fn test_raw_mode_round_trips_plain_values() {
        let codec = ArchiveCodec::new(TextMode::Raw, ContainerFormat::Gzip);
        let issue = IssueBuilder::new(9)
            .scalar(ScalarField::Title, "plain title")
            .list(ListField::Components, ["Library (Lib)"])
            .build()
            .unwrap();

        let bytes = codec.encode([&issue], 1.0).unwrap();
        assert_eq!(codec.decode_records(&bytes).unwrap(), vec![issue]);
    }

    #[test]
    fn test_decode_archive_keys_by_id() {
        let codec = ArchiveCodec::default();
        let bytes = codec.encode(&[full_issue(20), full_issue(10)], 3.0).unwrap();

        let archive = codec.decode_archive(&bytes).unwrap();
        assert_eq!(archive.len(), 2);
        assert_eq!(archive.get(10), Some(&full_issue(10)));
        assert!((archive.last_fetched() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let codec = ArchiveCodec::default();
        let err = codec.decode(b"definitely not gzip").unwrap_err();
        assert!(matches!(err, Error::MalformedContainer(_)));
    }

    #[test]
    fn test_decode_rejects_item_count_mismatch() {
        let codec = ArchiveCodec::new(TextMode::Base64, ContainerFormat::Plain);
        let err = codec
            .decode(br#"{"items":3,"last_fetched":0.0,"issues":[]}"#)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedContainer(_)));
    }

    #[test]
    fn test_decode_requires_issue_id() {
        let codec = ArchiveCodec::new(TextMode::Base64, ContainerFormat::Plain);
        let err = codec
            .decode(br#"{"items":1,"last_fetched":0.0,"issues":[{"attrs":{"title":"eA=="}}]}"#)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedContainer(_)));
    }

    #[test]
    fn test_base64_container_read_as_raw_differs() {
        let encoded = ArchiveCodec::default().encode(&[full_issue(1)], 0.0).unwrap();
        let raw = ArchiveCodec::new(TextMode::Raw, ContainerFormat::Gzip);

        // Raw reading cannot even parse the base64-encoded id.
        assert!(raw.decode(&encoded).is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ContainerFormat::from_path(Path::new("issues.json.gz")), ContainerFormat::Gzip);
        assert_eq!(ContainerFormat::from_path(Path::new("issues.json")), ContainerFormat::Plain);
    }
}
