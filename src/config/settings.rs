//! Configuration settings for Kilde.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub embedding: EmbeddingSettings,
    pub normalizer: NormalizerSettings,
    pub vector_store: VectorStoreSettings,
    pub query: QuerySettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level used when no -v flag is given (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.kilde".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Embedding service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Full URL of the embedding endpoint.
    pub url: String,
    /// Embedding model to request.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
    /// Texts per embedding request during ingestion.
    pub batch_size: usize,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Attempts per single text before it is dropped.
    pub retry_count: u32,
    /// Delay between single-text attempts, in milliseconds.
    pub retry_delay_ms: u64,
    /// Pause between ingestion batches, in milliseconds.
    pub batch_delay_ms: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434/api/embed".to_string(),
            model: "bge-m3".to_string(),
            dimensions: 1024,
            batch_size: 32,
            timeout_secs: 300,
            retry_count: 3,
            retry_delay_ms: 500,
            batch_delay_ms: 200,
        }
    }
}

impl EmbeddingSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

/// Text normalization thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerSettings {
    /// Minimum cleaned length, in characters, for a text to be embedded.
    pub min_chars: usize,
    /// Minimum share of alphabetic characters.
    pub min_alpha_ratio: f32,
    /// Cleaned text is truncated to this many characters.
    pub max_chars: usize,
}

impl Default for NormalizerSettings {
    fn default() -> Self {
        Self {
            min_chars: 30,
            min_alpha_ratio: 0.3,
            max_chars: 1500,
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Directory holding the persisted index and metadata.
    pub path: String,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            path: "~/.kilde/vector_db".to_string(),
        }
    }
}

/// When a query reloads the persisted store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReloadPolicy {
    /// Reload only when `StoreHandle::reload` is called.
    #[default]
    Manual,
    /// Reload from disk before every query.
    EveryQuery,
}

impl std::str::FromStr for ReloadPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(ReloadPolicy::Manual),
            "every_query" | "every-query" | "always" => Ok(ReloadPolicy::EveryQuery),
            _ => Err(format!("Unknown reload policy: {}", s)),
        }
    }
}

impl std::fmt::Display for ReloadPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReloadPolicy::Manual => write!(f, "manual"),
            ReloadPolicy::EveryQuery => write!(f, "every_query"),
        }
    }
}

/// Default query parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    /// Neighbors requested from the index.
    pub top_k: usize,
    /// Minimum similarity score for a match to be returned.
    pub score_threshold: f32,
    /// Minimum whitespace tokens in a match's display text. 0 disables the gate.
    pub min_display_tokens: usize,
    /// When the store handle reloads persisted state.
    pub reload_policy: ReloadPolicy,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            score_threshold: 0.25,
            min_display_tokens: 6,
            reload_policy: ReloadPolicy::Manual,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Settings>(&content)?
        } else {
            Settings::default()
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::KildeError;

        if self.embedding.dimensions == 0 {
            return Err(KildeError::Config("embedding.dimensions must be > 0".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(KildeError::Config("embedding.batch_size must be > 0".into()));
        }
        if self.embedding.retry_count == 0 {
            return Err(KildeError::Config("embedding.retry_count must be > 0".into()));
        }
        url::Url::parse(&self.embedding.url).map_err(|e| {
            KildeError::Config(format!("embedding.url '{}': {}", self.embedding.url, e))
        })?;
        if !(0.0..=1.0).contains(&self.normalizer.min_alpha_ratio) {
            return Err(KildeError::Config(
                "normalizer.min_alpha_ratio must be within 0.0-1.0".into(),
            ));
        }
        Ok(())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::KildeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kilde")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded vector store directory.
    pub fn store_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_embedding_service() {
        let settings = Settings::default();
        assert_eq!(settings.embedding.dimensions, 1024);
        assert_eq!(settings.embedding.batch_size, 32);
        assert_eq!(settings.embedding.retry_count, 3);
        assert_eq!(settings.embedding.retry_delay(), Duration::from_millis(500));
        assert_eq!(settings.embedding.timeout(), Duration::from_secs(300));
        assert_eq!(settings.query.min_display_tokens, 6);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [embedding]
            model = "nomic-embed-text"
            dimensions = 768

            [query]
            reload_policy = "every_query"
            "#,
        )
        .unwrap();

        assert_eq!(settings.embedding.model, "nomic-embed-text");
        assert_eq!(settings.embedding.dimensions, 768);
        assert_eq!(settings.embedding.batch_size, 32);
        assert_eq!(settings.query.reload_policy, ReloadPolicy::EveryQuery);
        assert_eq!(settings.normalizer.min_chars, 30);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.embedding.url = "not a url".to_string();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.embedding.batch_size = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut settings = Settings::default();
        settings.query.top_k = 12;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.query.top_k, 12);
    }

    #[test]
    fn test_reload_policy_parse() {
        assert_eq!("manual".parse::<ReloadPolicy>().unwrap(), ReloadPolicy::Manual);
        assert_eq!("always".parse::<ReloadPolicy>().unwrap(), ReloadPolicy::EveryQuery);
        assert!("sometimes".parse::<ReloadPolicy>().is_err());
    }
}
