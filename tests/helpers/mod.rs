#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use lia::embedding::{EmbeddingCache, EmbeddingProvider};
use lia::knowledge::KnowledgeStore;
use tempfile::TempDir;

pub const DIM: usize = 512;

pub const BASH_MD: &str = r#"# How to extract a range of lines from a file in bash? #command

```bash
# print lines 10 to 20
sed -n '10,20p' file.txt
```

# How to loop over files in a directory? #script

```bash
for f in *; do
  echo "$f"
done
```

# How to check if a variable is empty?

Use `[ -z "$var" ]`.
"#;

pub const CURL_MD: &str = r#"# How to send a POST request with JSON? #command

```bash
curl -X POST -H 'Content-Type: application/json' -d '{}' http://localhost
```

# How to follow redirects?

Use `-L`.
"#;

/// Deterministic bag-of-words embedding: every lower-cased word adds 1.0 to
/// the dimension its FNV-1a hash selects. Texts sharing words are similar.
pub struct FakeEmbeddingProvider {
    model: String,
    calls: AtomicUsize,
    delay: Duration,
    fail_on: Option<String>,
}

impl FakeEmbeddingProvider {
    pub fn new() -> Self {
        Self {
            model: "fake-bow".into(),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            fail_on: None,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.into();
        self
    }

    /// Sleep on every call, to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail for any text containing `word`.
    pub fn failing_on(mut self, word: &str) -> Self {
        self.fail_on = Some(word.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for FakeEmbeddingProvider {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if let Some(word) = &self.fail_on {
            anyhow::ensure!(!text.contains(word.as_str()), "refusing to embed {text:?}");
        }

        let mut v = vec![0.0f32; DIM];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            v[fnv1a(&word.to_lowercase()) as usize % DIM] += 1.0;
        }
        Ok(v)
    }

    fn model_version(&self) -> &str {
        &self.model
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf29ce484222325, |hash, b| {
        (hash ^ b as u64).wrapping_mul(0x100000001b3)
    })
}

/// Temporary knowledge directory holding `files` as `<name>.md`.
pub fn corpus(files: &[(&str, &str)]) -> (TempDir, KnowledgeStore) {
    let dir = TempDir::new().unwrap();
    for (name, content) in files {
        write_topic(dir.path(), name, content);
    }
    let store = KnowledgeStore::open(dir.path(), "undefined").unwrap();
    (dir, store)
}

pub fn write_topic(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(format!("{name}.md")), content).unwrap();
}

/// `count` records named "Question 0" .. "Question {count-1}".
pub fn numbered_topic(count: usize) -> String {
    (0..count)
        .map(|i| format!("# Question {i}\n\nAnswer {i}.\n\n"))
        .collect()
}

pub fn memory_cache(provider: &FakeEmbeddingProvider) -> EmbeddingCache {
    EmbeddingCache::new(provider.model_version())
}
