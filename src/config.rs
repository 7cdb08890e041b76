use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the topic that is searched for every query, regardless of keywords.
pub const DEFAULT_CATCH_ALL_TOPIC: &str = "undefined";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LiaConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
    pub socket_path: String,
    pub log_file: String,
    pub start_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
    pub db_path: String,
    pub history_path: String,
    pub catch_all_topic: String,
    pub persist_embeddings: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Score below which the best match is reported as "no relevant match".
    pub relevance_threshold: f32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let cache = default_cache_dir();
        Self {
            log_level: "info".into(),
            socket_path: path_string(cache.join("lia.sock")),
            log_file: path_string(cache.join("daemon.log")),
            start_timeout_secs: 30,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let cache = default_cache_dir();
        Self {
            data_dir: path_string(default_data_dir().join("data")),
            db_path: path_string(cache.join("review_db.sqlite")),
            history_path: path_string(cache.join("history")),
            catch_all_topic: DEFAULT_CATCH_ALL_TOPIC.into(),
            persist_embeddings: true,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir: path_string(default_data_dir().join("models")),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            relevance_threshold: 0.6,
        }
    }
}

fn path_string(path: PathBuf) -> String {
    path.to_string_lossy().into_owned()
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Returns `$XDG_DATA_HOME/lia` (`~/.local/share/lia` on Linux).
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| home_dir().join(".local").join("share"))
        .join("lia")
}

/// Returns `$XDG_CACHE_HOME/lia` (`~/.cache/lia` on Linux).
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| home_dir().join(".cache"))
        .join("lia")
}

/// Returns the default config file path: `$XDG_CONFIG_HOME/lia/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| home_dir().join(".config"))
        .join("lia")
        .join("config.toml")
}

impl LiaConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            LiaConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (LIA_DATA, LIA_DB, LIA_SOCKET, LIA_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("LIA_DATA") {
            self.storage.data_dir = val;
        }
        if let Ok(val) = std::env::var("LIA_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("LIA_SOCKET") {
            self.server.socket_path = val;
        }
        if let Ok(val) = std::env::var("LIA_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    pub fn resolved_data_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.data_dir)
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn resolved_history_path(&self) -> PathBuf {
        expand_tilde(&self.storage.history_path)
    }

    pub fn resolved_socket_path(&self) -> PathBuf {
        expand_tilde(&self.server.socket_path)
    }

    pub fn resolved_log_file(&self) -> PathBuf {
        expand_tilde(&self.server.log_file)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        home_dir().join(rest)
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = LiaConfig::default();
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.storage.catch_all_topic, "undefined");
        assert_eq!(config.embedding.provider, "local");
        assert!(config.server.socket_path.ends_with("lia.sock"));
        assert!(config.storage.db_path.ends_with("review_db.sqlite"));
        assert!((config.retrieval.relevance_threshold - 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"
socket_path = "/tmp/lia-test.sock"

[storage]
data_dir = "/tmp/notes"
catch_all_topic = "misc"

[retrieval]
relevance_threshold = 0.5
"#;
        let config: LiaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.server.socket_path, "/tmp/lia-test.sock");
        assert_eq!(config.storage.data_dir, "/tmp/notes");
        assert_eq!(config.storage.catch_all_topic, "misc");
        assert!((config.retrieval.relevance_threshold - 0.5).abs() < f32::EPSILON);
        // defaults still apply for unset fields
        assert_eq!(config.server.start_timeout_secs, 30);
        assert!(config.storage.persist_embeddings);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = LiaConfig::default();
        std::env::set_var("LIA_DATA", "/tmp/override-notes");
        std::env::set_var("LIA_SOCKET", "/tmp/override.sock");
        std::env::set_var("LIA_LOG_LEVEL", "trace");

        config.apply_env_overrides();

        assert_eq!(config.storage.data_dir, "/tmp/override-notes");
        assert_eq!(config.server.socket_path, "/tmp/override.sock");
        assert_eq!(config.server.log_level, "trace");

        // Clean up
        std::env::remove_var("LIA_DATA");
        std::env::remove_var("LIA_SOCKET");
        std::env::remove_var("LIA_LOG_LEVEL");
    }

    #[test]
    fn tilde_expands_to_home() {
        let expanded = expand_tilde("~/notes");
        assert!(expanded.ends_with("notes"));
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
    }
}
