//! Configuration module for Kilde.
//!
//! Handles loading and managing application settings.

mod settings;

pub use settings::{
    EmbeddingSettings, GeneralSettings, NormalizerSettings, QuerySettings, ReloadPolicy,
    Settings, VectorStoreSettings,
};
