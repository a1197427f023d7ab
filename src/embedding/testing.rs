//! Deterministic embedder for unit tests.

use super::Embedder;
use crate::error::{KildeError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Marker that makes the fake return a NaN vector for a text.
pub(crate) const POISON: &str = "POISON";

/// Fake embedder: texts containing a registered keyword map to that keyword's
/// vector, texts containing [`POISON`] produce NaN, and everything else maps
/// to a vector derived from its bytes.
pub(crate) struct FakeEmbedder {
    dimensions: usize,
    keywords: Vec<(String, Vec<f32>)>,
    calls: AtomicUsize,
    fail_first: AtomicUsize,
    requests: Mutex<Vec<Vec<String>>>,
}

impl FakeEmbedder {
    pub(crate) fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            keywords: Vec::new(),
            calls: AtomicUsize::new(0),
            fail_first: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_keyword(mut self, keyword: &str, vector: Vec<f32>) -> Self {
        self.keywords.push((keyword.to_string(), vector));
        self
    }

    /// Fail the next `n` requests with a transient error.
    pub(crate) fn failing_first(self, n: usize) -> Self {
        self.fail_first.store(n, Ordering::SeqCst);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().unwrap().clone()
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        if text.contains(POISON) {
            return vec![f32::NAN; self.dimensions];
        }
        if let Some((_, v)) = self.keywords.iter().find(|(k, _)| text.contains(k.as_str())) {
            return v.clone();
        }

        let mut v = vec![1.0; self.dimensions];
        for (i, b) in text.bytes().enumerate() {
            v[i % self.dimensions] += b as f32;
        }
        v
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(texts.to_vec());

        let pending = self.fail_first.load(Ordering::SeqCst);
        if pending > 0 {
            self.fail_first.store(pending - 1, Ordering::SeqCst);
            return Err(KildeError::TransientService("service unavailable".to_string()));
        }

        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        "fake-embedder"
    }
}
