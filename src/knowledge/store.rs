//! Directory-backed knowledge store.
//!
//! Every `*.md` file in the data directory is a topic named after its file
//! stem. Parsed topics are memoized by file fingerprint (modification time and
//! length, then content hash) so that unchanged files are not re-parsed and
//! callers learn when a topic changed.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use sha2::{Digest, Sha256};

use crate::error::{LiaError, Result};

use super::parse::parse_topic;
use super::types::Record;

const TOPIC_EXTENSION: &str = "md";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
    content_hash: String,
}

struct TopicSnapshot {
    fingerprint: Fingerprint,
    records: Arc<Vec<Record>>,
}

/// Result of loading one topic.
#[derive(Debug, Clone)]
pub struct TopicLoad {
    pub records: Arc<Vec<Record>>,
    /// `true` when the file content differs from the previous load (or when
    /// this is the first load).
    pub changed: bool,
}

/// A topic that could not be parsed during [`KnowledgeStore::load_all`].
#[derive(Debug)]
pub struct SkippedTopic {
    pub topic: String,
    pub error: LiaError,
}

pub struct KnowledgeStore {
    data_dir: PathBuf,
    catch_all: String,
    snapshots: HashMap<String, TopicSnapshot>,
}

impl KnowledgeStore {
    /// Open the store, creating the data directory and an empty catch-all
    /// topic file if they are missing.
    pub fn open(data_dir: impl Into<PathBuf>, catch_all: &str) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;

        let catch_all_path = topic_path(&data_dir, catch_all);
        if !catch_all_path.exists() {
            fs::write(&catch_all_path, "")?;
            tracing::info!(path = %catch_all_path.display(), "created catch-all topic");
        }

        Ok(Self {
            data_dir,
            catch_all: catch_all.to_string(),
            snapshots: HashMap::new(),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn catch_all(&self) -> &str {
        &self.catch_all
    }

    /// Sorted topic names.
    pub fn topics(&self) -> Result<Vec<String>> {
        let mut topics = Vec::new();
        for entry in fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(TOPIC_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                topics.push(stem.to_string());
            }
        }
        topics.sort();
        Ok(topics)
    }

    pub fn topic_exists(&self, topic: &str) -> bool {
        topic_path(&self.data_dir, topic).is_file()
    }

    /// Parse a topic, reusing the previous parse when the file is unchanged.
    pub fn load_topic(&mut self, topic: &str) -> Result<TopicLoad> {
        let path = topic_path(&self.data_dir, topic);
        if !path.is_file() {
            return Err(LiaError::UnknownTopic(topic.to_string()));
        }

        let metadata = fs::metadata(&path)?;
        let modified = metadata.modified().ok();
        let len = metadata.len();

        if let Some(snapshot) = self.snapshots.get(topic) {
            if snapshot.fingerprint.modified.is_some()
                && snapshot.fingerprint.modified == modified
                && snapshot.fingerprint.len == len
            {
                return Ok(TopicLoad {
                    records: Arc::clone(&snapshot.records),
                    changed: false,
                });
            }
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                self.snapshots.remove(topic);
                return Err(LiaError::Parse {
                    topic: topic.to_string(),
                    line: 0,
                    message: "not valid UTF-8".into(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let content_hash = hash_content(&content);

        if let Some(snapshot) = self.snapshots.get_mut(topic) {
            if snapshot.fingerprint.content_hash == content_hash {
                // Touched but not edited.
                snapshot.fingerprint.modified = modified;
                snapshot.fingerprint.len = len;
                return Ok(TopicLoad {
                    records: Arc::clone(&snapshot.records),
                    changed: false,
                });
            }
        }

        let records = match parse_topic(topic, &content) {
            Ok(records) => Arc::new(records),
            Err(e) => {
                // A broken file must not keep serving its last good parse.
                self.snapshots.remove(topic);
                return Err(e);
            }
        };
        tracing::debug!(topic, records = records.len(), "parsed topic");

        self.snapshots.insert(
            topic.to_string(),
            TopicSnapshot {
                fingerprint: Fingerprint {
                    modified,
                    len,
                    content_hash,
                },
                records: Arc::clone(&records),
            },
        );

        Ok(TopicLoad {
            records,
            changed: true,
        })
    }

    /// Load every topic. Malformed files are skipped with a warning and
    /// returned separately; the others stay available.
    pub fn load_all(&mut self) -> Result<(Vec<(String, TopicLoad)>, Vec<SkippedTopic>)> {
        let mut loaded = Vec::new();
        let mut skipped = Vec::new();
        for topic in self.topics()? {
            match self.load_topic(&topic) {
                Ok(load) => loaded.push((topic, load)),
                Err(error) => {
                    tracing::warn!(topic = %topic, error = %error, "skipping topic");
                    skipped.push(SkippedTopic { topic, error });
                }
            }
        }
        Ok((loaded, skipped))
    }
}

fn topic_path(data_dir: &Path, topic: &str) -> PathBuf {
    data_dir.join(format!("{topic}.{TOPIC_EXTENSION}"))
}

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with(files: &[(&str, &str)]) -> (TempDir, KnowledgeStore) {
        let tmp = TempDir::new().unwrap();
        for (name, content) in files {
            fs::write(tmp.path().join(format!("{name}.md")), content).unwrap();
        }
        let store = KnowledgeStore::open(tmp.path(), "undefined").unwrap();
        (tmp, store)
    }

    #[test]
    fn open_creates_catch_all_topic() {
        let (_tmp, store) = store_with(&[]);
        assert!(store.topic_exists("undefined"));
        assert_eq!(store.topics().unwrap(), vec!["undefined"]);
    }

    #[test]
    fn topics_are_sorted_and_ignore_other_files() {
        let (tmp, store) = store_with(&[("git", "# a\n"), ("bash", "# b\n")]);
        fs::write(tmp.path().join("notes.txt"), "# not a topic").unwrap();
        assert_eq!(store.topics().unwrap(), vec!["bash", "git", "undefined"]);
    }

    #[test]
    fn unchanged_topic_is_not_reported_as_changed() {
        let (_tmp, mut store) = store_with(&[("bash", "# How to list files?\nls\n")]);
        let first = store.load_topic("bash").unwrap();
        assert!(first.changed);
        let second = store.load_topic("bash").unwrap();
        assert!(!second.changed);
        assert!(Arc::ptr_eq(&first.records, &second.records));
    }

    #[test]
    fn edited_topic_is_reparsed() {
        let (tmp, mut store) = store_with(&[("bash", "# One\nbody\n")]);
        store.load_topic("bash").unwrap();

        fs::write(tmp.path().join("bash.md"), "# One\nbody\n\n# Two\nmore body\n").unwrap();
        let reload = store.load_topic("bash").unwrap();
        assert!(reload.changed);
        assert_eq!(reload.records.len(), 2);
    }

    #[test]
    fn unknown_topic_is_an_error() {
        let (_tmp, mut store) = store_with(&[]);
        assert!(matches!(
            store.load_topic("nope"),
            Err(LiaError::UnknownTopic(t)) if t == "nope"
        ));
    }

    #[test]
    fn load_all_skips_malformed_files() {
        let (_tmp, mut store) = store_with(&[
            ("bash", "# ok\nfine\n"),
            ("broken", "# bad\n```\nnever closed\n"),
        ]);
        let (loaded, skipped) = store.load_all().unwrap();
        let names: Vec<&str> = loaded.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(names, vec!["bash", "undefined"]);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].topic, "broken");
        assert!(skipped[0].error.is_recoverable());
    }
}
