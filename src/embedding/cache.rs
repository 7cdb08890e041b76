//! Per-record embedding cache.
//!
//! Entries are keyed by [`Record::content_hash`] and tagged with the model
//! version that produced them, so an edited record or a model change always
//! misses. Each key owns a slot with its own lock: concurrent lookups of the
//! same record compute the vector once, lookups of different records do not
//! block each other.
//!
//! The cache lives for the lifetime of the resident service. When a database
//! connection is attached it is warmed from the `embedding_cache` table at
//! startup and written through on every insert.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use rusqlite::{params, Connection};

use super::EmbeddingProvider;
use crate::error::{LiaError, Result};
use crate::knowledge::Record;

#[derive(Debug, Clone)]
pub struct EmbeddingCacheEntry {
    pub key: String,
    pub topic: String,
    pub vector: Arc<[f32]>,
    pub model_version: String,
}

struct Slot {
    topic: String,
    entry: Mutex<Option<EmbeddingCacheEntry>>,
}

pub struct EmbeddingCache {
    model_version: String,
    slots: RwLock<HashMap<String, Arc<Slot>>>,
    store: Option<Mutex<Connection>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl EmbeddingCache {
    /// In-memory cache for vectors produced by `model_version`.
    pub fn new(model_version: impl Into<String>) -> Self {
        Self {
            model_version: model_version.into(),
            slots: RwLock::new(HashMap::new()),
            store: None,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Cache backed by the `embedding_cache` table. Rows from other model
    /// versions are purged, the rest are loaded.
    pub fn with_store(model_version: impl Into<String>, conn: Connection) -> Result<Self> {
        let mut cache = Self::new(model_version);

        let stored_model = crate::db::migrations::get_embedding_model(&conn)?;
        if stored_model.as_deref() != Some(cache.model_version.as_str()) {
            let purged = conn.execute(
                "DELETE FROM embedding_cache WHERE model_version != ?1",
                params![cache.model_version],
            )?;
            if purged > 0 {
                tracing::info!(
                    purged,
                    previous = stored_model.as_deref().unwrap_or("(none)"),
                    current = %cache.model_version,
                    "embedding model changed, dropped cached vectors"
                );
            }
            crate::db::migrations::set_embedding_model(&conn, &cache.model_version)?;
        }

        let entries = load_entries(&conn, &cache.model_version)?;
        let loaded = entries.len();
        {
            let slots = cache.slots.get_mut().unwrap_or_else(PoisonError::into_inner);
            for entry in entries {
                slots.insert(
                    entry.key.clone(),
                    Arc::new(Slot {
                        topic: entry.topic.clone(),
                        entry: Mutex::new(Some(entry)),
                    }),
                );
            }
        }
        tracing::info!(entries = loaded, "embedding cache warmed");

        cache.store = Some(Mutex::new(conn));
        Ok(cache)
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    /// Heading vector for `record`, computed with `provider` on a miss.
    pub fn get(&self, record: &Record, provider: &dyn EmbeddingProvider) -> Result<Arc<[f32]>> {
        let key = record.content_hash();
        let slot = self.slot(&key, &record.topic);

        // Held across the computation: a second caller for the same key waits
        // here and then takes the hit path.
        let mut guard = slot.entry.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = guard
            .as_ref()
            .filter(|e| e.model_version == self.model_version)
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(&entry.vector));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let vector: Arc<[f32]> = provider
            .embed(&record.heading)
            .map_err(|e| {
                LiaError::EmbeddingCompute(format!(
                    "{}#{} ({:?}): {e:#}",
                    record.topic, record.position, record.heading
                ))
            })?
            .into();

        let entry = EmbeddingCacheEntry {
            key,
            topic: record.topic.clone(),
            vector: Arc::clone(&vector),
            model_version: self.model_version.clone(),
        };
        self.persist(&entry);
        *guard = Some(entry);

        Ok(vector)
    }

    /// Drop the entries of `topic` whose key is not in `live`. Called after a
    /// topic file changed so stale vectors are never reused.
    pub fn retain_topic(&self, topic: &str, live: &HashSet<String>) -> usize {
        let evicted: Vec<String> = {
            let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
            let stale: Vec<String> = slots
                .iter()
                .filter(|(key, slot)| slot.topic == topic && !live.contains(*key))
                .map(|(key, _)| key.clone())
                .collect();
            for key in &stale {
                slots.remove(key);
            }
            stale
        };

        if !evicted.is_empty() {
            tracing::debug!(topic, evicted = evicted.len(), "evicted stale embeddings");
            self.unpersist(&evicted);
        }
        evicted.len()
    }

    pub fn len(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    fn slot(&self, key: &str, topic: &str) -> Arc<Slot> {
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Arc::clone(slot);
        }

        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key.to_string()).or_insert_with(|| {
            Arc::new(Slot {
                topic: topic.to_string(),
                entry: Mutex::new(None),
            })
        }))
    }

    fn persist(&self, entry: &EmbeddingCacheEntry) {
        let Some(store) = &self.store else { return };
        let conn = store.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = conn.execute(
            "INSERT OR REPLACE INTO embedding_cache (key, topic, model_version, vector, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.key,
                entry.topic,
                entry.model_version,
                vector_to_bytes(&entry.vector),
                chrono::Utc::now().to_rfc3339(),
            ],
        ) {
            tracing::warn!(error = %e, topic = %entry.topic, "failed to persist embedding");
        }
    }

    fn unpersist(&self, keys: &[String]) {
        let Some(store) = &self.store else { return };
        let conn = store.lock().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            if let Err(e) = conn.execute("DELETE FROM embedding_cache WHERE key = ?1", params![key]) {
                tracing::warn!(error = %e, "failed to delete cached embedding");
            }
        }
    }
}

fn load_entries(conn: &Connection, model_version: &str) -> Result<Vec<EmbeddingCacheEntry>> {
    let mut stmt = conn.prepare(
        "SELECT key, topic, vector FROM embedding_cache WHERE model_version = ?1",
    )?;
    let rows = stmt
        .query_map(params![model_version], |row| {
            let bytes: Vec<u8> = row.get(2)?;
            Ok(EmbeddingCacheEntry {
                key: row.get(0)?,
                topic: row.get(1)?,
                vector: bytes_to_vector(&bytes).into(),
                model_version: model_version.to_string(),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Little-endian f32 encoding used by the `embedding_cache.vector` column.
pub fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

pub fn bytes_to_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity in `[-1, 1]`. Zero-length or mismatched vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}
