//! Append-only query history, one query per line.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

pub struct QueryHistory {
    path: PathBuf,
}

impl QueryHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `query`. Blank queries and repeats of the last entry are ignored.
    pub fn append(&self, query: &str) -> Result<()> {
        let line = query.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() || self.last()?.as_deref() == Some(line.as_str()) {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Up to `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<String>> {
        let mut entries = self.read_all()?;
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }

    fn last(&self) -> Result<Option<String>> {
        Ok(self.read_all()?.pop())
    }

    fn read_all(&self) -> Result<Vec<String>> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        BufReader::new(file)
            .lines()
            .filter(|line| !matches!(line, Ok(l) if l.trim().is_empty()))
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(Into::into)
    }
}
