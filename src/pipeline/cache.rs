//! Translation cache keyed by exact text and language pair.
//!
//! Lookups are single-flight: concurrent misses on one key share a single
//! `tokio::sync::OnceCell`, so only one of them reaches the model while the
//! others await its result. A failed or empty translation never
//! initialises the cell, and the next caller tries again.
//!
//! The cache never evicts. A run owns a fresh one unless the caller injects
//! a shared `Arc<TranslationCache>` through the configuration. The source
//! language is part of the key, so a shared cache can serve runs over menus
//! in different languages: "Sopa" from Spanish and "Sopa" from Portuguese
//! stay separate entries.

use crate::language::SupportedLanguage;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

/// Cache key. Within one run the source is fixed, so entries are
/// effectively keyed by (text, target).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub text: String,
    pub source: SupportedLanguage,
    pub target: SupportedLanguage,
}

impl CacheKey {
    pub fn new(text: impl Into<String>, source: SupportedLanguage, target: SupportedLanguage) -> Self {
        Self {
            text: text.into(),
            source,
            target,
        }
    }
}

/// Memoised translations shared by every task of a run.
#[derive(Debug, Default)]
pub struct TranslationCache {
    cells: Mutex<HashMap<CacheKey, Arc<OnceCell<String>>>>,
}

impl TranslationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cell for `key`, creating an empty one on first sight.
    ///
    /// The lock is released before the cell is awaited.
    fn cell(&self, key: &CacheKey) -> Arc<OnceCell<String>> {
        let mut cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        cells.entry(key.clone()).or_default().clone()
    }

    /// A completed translation, if any.
    pub fn get(&self, key: &CacheKey) -> Option<String> {
        let cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        cells.get(key).and_then(|cell| cell.get().cloned())
    }

    /// Store a translation unless one is already present.
    pub fn put(&self, key: CacheKey, value: String) {
        let _ = self.cell(&key).set(value);
    }

    /// Number of completed entries.
    pub fn len(&self) -> usize {
        let cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        cells.values().filter(|c| c.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the cached value for `key`, or run `init` to produce it.
    ///
    /// Concurrent callers with the same key wait for the one running
    /// `init`. The returned flag is `true` when the value came from the
    /// cache rather than from this caller's `init`.
    pub async fn get_or_try_insert_with<F, Fut, E>(
        &self,
        key: &CacheKey,
        init: F,
    ) -> Result<(String, bool), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        let cell = self.cell(key);
        let mut ran = false;
        let value = cell
            .get_or_try_init(|| {
                ran = true;
                init()
            })
            .await?;
        Ok((value.clone(), !ran))
    }
}
