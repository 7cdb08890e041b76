//! Topic file parser.
//!
//! A topic file is plain markdown. A level-1 heading (`# ` at the start of a
//! line, outside any fenced block) starts a new record; everything up to the
//! next such heading is its body. Tags are `#word` tokens appended to the
//! heading line. Fenced code blocks in the body are extracted in order.

use std::collections::BTreeSet;

use crate::error::{LiaError, Result};

use super::types::{CodeBlock, Record, Tag};

const FENCE: &str = "```";

struct RecordDraft {
    heading: String,
    tags: BTreeSet<Tag>,
    body: Vec<String>,
    code_blocks: Vec<CodeBlock>,
}

struct OpenFence {
    line: usize,
    language: Option<String>,
    lines: Vec<String>,
}

impl RecordDraft {
    fn from_heading_line(line: &str) -> Self {
        let (heading, tags) = split_heading(line);
        Self {
            heading,
            tags,
            body: Vec::new(),
            code_blocks: Vec::new(),
        }
    }

    fn finish(self, topic: &str, position: usize) -> Record {
        Record {
            topic: topic.to_string(),
            heading: self.heading,
            body: trim_blank_edges(&self.body),
            tags: self.tags,
            code_blocks: self.code_blocks,
            position,
        }
    }
}

/// Parse the content of one topic file into records, in file order.
///
/// Fails with [`LiaError::Parse`] when a fenced block is never closed; the
/// reported line is the opening fence.
pub fn parse_topic(topic: &str, content: &str) -> Result<Vec<Record>> {
    let mut records: Vec<Record> = Vec::new();
    let mut current: Option<RecordDraft> = None;
    let mut fence: Option<OpenFence> = None;

    for (index, line) in content.lines().enumerate() {
        let line_number = index + 1;

        if let Some(open) = fence.as_mut() {
            if is_fence(line) {
                let block = CodeBlock {
                    language: open.language.take(),
                    lines: std::mem::take(&mut open.lines),
                };
                fence = None;
                if let Some(draft) = current.as_mut() {
                    draft.code_blocks.push(block);
                    draft.body.push(line.to_string());
                }
            } else {
                open.lines.push(line.to_string());
                if let Some(draft) = current.as_mut() {
                    draft.body.push(line.to_string());
                }
            }
            continue;
        }

        if is_fence(line) {
            let info = line[FENCE.len()..].trim();
            fence = Some(OpenFence {
                line: line_number,
                language: (!info.is_empty()).then(|| info.to_string()),
                lines: Vec::new(),
            });
            if let Some(draft) = current.as_mut() {
                draft.body.push(line.to_string());
            }
            continue;
        }

        if is_heading(line) {
            if let Some(draft) = current.take() {
                let position = records.len();
                records.push(draft.finish(topic, position));
            }
            current = Some(RecordDraft::from_heading_line(line));
            continue;
        }

        // Lines before the first heading are preamble and belong to no record.
        if let Some(draft) = current.as_mut() {
            draft.body.push(line.to_string());
        }
    }

    if let Some(open) = fence {
        return Err(LiaError::Parse {
            topic: topic.to_string(),
            line: open.line,
            message: "unterminated code block".into(),
        });
    }

    if let Some(draft) = current.take() {
        let position = records.len();
        records.push(draft.finish(topic, position));
    }

    Ok(records)
}

/// `# ` followed by anything. `##` and deeper headings stay in the body.
fn is_heading(line: &str) -> bool {
    let mut chars = line.chars();
    chars.next() == Some('#') && chars.next().is_some_and(char::is_whitespace)
}

fn is_fence(line: &str) -> bool {
    line.starts_with(FENCE)
}

fn is_tag_token(token: &str) -> bool {
    token
        .strip_prefix('#')
        .is_some_and(|name| !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_'))
}

/// Split a heading line into its text and its tags.
fn split_heading(line: &str) -> (String, BTreeSet<Tag>) {
    let mut tags = BTreeSet::new();
    let mut words = Vec::new();

    // First token is the `#` marker itself.
    for token in line.split_whitespace().skip(1) {
        if is_tag_token(token) {
            tags.insert(Tag::from(&token[1..]));
        } else {
            words.push(token);
        }
    }

    (words.join(" "), tags)
}

fn trim_blank_edges(lines: &[String]) -> String {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end].join("\n"),
        _ => String::new(),
    }
}
