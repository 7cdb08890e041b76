//! Core knowledge type definitions.
//!
//! Defines [`Tag`] (the closed set of heading tags), [`CodeBlock`] (a fenced
//! block inside a record body), and [`Record`] (one question/answer unit of a
//! topic file).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Comment prefixes that disqualify a code line from being a command.
const COMMENT_PREFIXES: [&str; 4] = ["#", "//", "--", ";"];

/// Heading tag. Only `Command` and `Script` drive behavior; anything else is
/// kept as data.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Tag {
    /// The record's code lines are individual commands.
    Command,
    /// The record's code blocks are whole scripts.
    Script,
    /// Any other `#word` tag, stored without the `#`.
    Other(String),
}

impl Tag {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Command => "command",
            Self::Script => "script",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for Tag {
    fn from(s: &str) -> Self {
        match s {
            "command" => Self::Command,
            "script" => Self::Script,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Tag {
    fn from(s: String) -> Self {
        Tag::from(s.as_str())
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.as_str().to_string()
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

/// A fenced code block extracted from a record body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    /// Info string of the opening fence (e.g. `bash`), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub lines: Vec<String>,
}

impl CodeBlock {
    /// Non-empty, trimmed lines that are not comments.
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty() && !is_comment(line))
    }

    /// The block as one script.
    pub fn script(&self) -> String {
        self.lines.join("\n")
    }
}

fn is_comment(line: &str) -> bool {
    COMMENT_PREFIXES.iter().any(|prefix| line.starts_with(prefix))
}

/// One question/answer unit of a topic file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Filename stem of the owning topic file.
    pub topic: String,
    /// Heading text without the `#` marker and tags.
    pub heading: String,
    /// Everything between this heading and the next one, blank edges trimmed.
    pub body: String,
    #[serde(default)]
    pub tags: BTreeSet<Tag>,
    #[serde(default)]
    pub code_blocks: Vec<CodeBlock>,
    /// 0-based index of the record in its topic file.
    pub position: usize,
}

impl Record {
    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }

    /// Command lines of every code block, in order.
    pub fn commands(&self) -> Vec<String> {
        self.code_blocks
            .iter()
            .flat_map(|block| block.commands())
            .map(str::to_string)
            .collect()
    }

    /// Full text of every code block, in order.
    pub fn scripts(&self) -> Vec<String> {
        self.code_blocks.iter().map(CodeBlock::script).collect()
    }

    /// SHA-256 over the full record content. Position is excluded so that
    /// appending records elsewhere never invalidates this one.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.topic.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.heading.as_bytes());
        hasher.update([0u8]);
        for tag in &self.tags {
            hasher.update(tag.as_str().as_bytes());
            hasher.update([b',']);
        }
        hasher.update([0u8]);
        hasher.update(self.body.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
