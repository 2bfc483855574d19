//! Translator: fill every empty target-language cell of a table.
//!
//! ## Passes
//!
//! ```text
//! pass 1 ──▶ collect missing cells ──▶ translate (≤ concurrency in flight) ──▶ write
//!    │                                                                          │
//!    └──────────── some cells still empty and passes left? ◀────────────────────┘
//! ```
//!
//! A cell is missing when its default text is non-blank and the target cell
//! is blank. Blank defaults are never sent to the model, and a cell that
//! already holds text is never rewritten, so running the translator on a
//! finished table makes no calls at all.
//!
//! Within a pass, cells sharing the same (text, target) are grouped and the
//! model is asked once per group, so a failing text is retried once per
//! pass rather than once per cell.
//!
//! A failing cell never aborts the run: after the last pass it stays blank
//! and is listed in the [`TranslationReport`].

use crate::config::{ConversionConfig, RetryPolicy};
use crate::error::TranslationError;
use crate::language::SupportedLanguage;
use crate::output::{MissingTranslation, TranslationReport};
use crate::pipeline::cache::{CacheKey, TranslationCache};
use crate::pipeline::gateway::{CompletionRequest, ModelGateway, UserContent};
use crate::pipeline::postprocess::clean_translation;
use crate::progress::ProgressCallback;
use crate::prompts::{translation_system_prompt, translation_user_prompt};
use crate::schema::{FieldKind, MenuTable};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// One (row, field, target) cell waiting for a translation.
#[derive(Debug, Clone)]
struct PendingCell {
    row: usize,
    field: FieldKind,
    language: SupportedLanguage,
    text: String,
}

impl PendingCell {
    fn slot(&self) -> (usize, FieldKind, SupportedLanguage) {
        (self.row, self.field, self.language)
    }
}

/// Pending cells sharing one cache key.
struct PendingGroup {
    key: CacheKey,
    cells: Vec<PendingCell>,
}

/// Group `pending` by cache key, keeping first-seen order.
fn group_by_key(pending: Vec<PendingCell>, source: SupportedLanguage) -> Vec<PendingGroup> {
    let mut index: HashMap<CacheKey, usize> = HashMap::new();
    let mut groups: Vec<PendingGroup> = Vec::new();
    for cell in pending {
        let key = CacheKey::new(&cell.text, source, cell.language);
        match index.get(&key) {
            Some(&i) => groups[i].cells.push(cell),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(PendingGroup {
                    key,
                    cells: vec![cell],
                });
            }
        }
    }
    groups
}

/// Every cell of `table` that still needs a translation from `source`.
fn pending_cells(table: &MenuTable, source: SupportedLanguage) -> Vec<PendingCell> {
    let mut pending = Vec::new();
    for (row_idx, row) in table.rows().iter().enumerate() {
        for field in FieldKind::ALL {
            if row.is_blank(field) {
                continue;
            }
            let text = row.default.get(field);
            for language in source.targets() {
                if row.translation(language, field).trim().is_empty() {
                    pending.push(PendingCell {
                        row: row_idx,
                        field,
                        language,
                        text: text.to_string(),
                    });
                }
            }
        }
    }
    pending
}

/// Translates menu text through a [`ModelGateway`] with a shared cache.
pub struct Translator {
    gateway: Arc<dyn ModelGateway>,
    cache: Arc<TranslationCache>,
    concurrency: usize,
    policy: RetryPolicy,
    deterministic: bool,
    progress: Option<ProgressCallback>,
    model_calls: AtomicUsize,
}

impl Translator {
    pub fn new(gateway: Arc<dyn ModelGateway>, cache: Arc<TranslationCache>) -> Self {
        Self {
            gateway,
            cache,
            concurrency: 5,
            policy: RetryPolicy::default(),
            deterministic: true,
            progress: None,
            model_calls: AtomicUsize::new(0),
        }
    }

    /// Build a translator with the concurrency, pass policy, sampling, and
    /// progress settings of `config`.
    pub fn from_config(
        gateway: Arc<dyn ModelGateway>,
        cache: Arc<TranslationCache>,
        config: &ConversionConfig,
    ) -> Self {
        let mut translator = Self::new(gateway, cache)
            .with_concurrency(config.concurrency)
            .with_policy(config.translation_retry)
            .with_deterministic(config.deterministic_translation);
        translator.progress = config.progress_callback.clone();
        translator
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_deterministic(mut self, v: bool) -> Self {
        self.deterministic = v;
        self
    }

    pub fn with_progress(mut self, cb: ProgressCallback) -> Self {
        self.progress = Some(cb);
        self
    }

    /// Gateway calls made by this translator so far.
    pub fn model_calls(&self) -> usize {
        self.model_calls.load(Ordering::SeqCst)
    }

    /// Translate one text, consulting the cache first.
    ///
    /// # Errors
    /// [`TranslationError`] when the model call failed or returned nothing
    /// usable. Neither outcome is cached.
    pub async fn translate(
        &self,
        text: &str,
        source: SupportedLanguage,
        target: SupportedLanguage,
    ) -> Result<String, TranslationError> {
        self.lookup(text, source, target).await.map(|(value, _)| value)
    }

    /// Like [`Self::translate`], also reporting whether the cache answered.
    async fn lookup(
        &self,
        text: &str,
        source: SupportedLanguage,
        target: SupportedLanguage,
    ) -> Result<(String, bool), TranslationError> {
        let key = CacheKey::new(text, source, target);
        self.cache
            .get_or_try_insert_with(&key, || self.call_model(text, source, target))
            .await
    }

    async fn call_model(
        &self,
        text: &str,
        source: SupportedLanguage,
        target: SupportedLanguage,
    ) -> Result<String, TranslationError> {
        self.model_calls.fetch_add(1, Ordering::SeqCst);
        let request = CompletionRequest {
            system_prompt: translation_system_prompt(source, target),
            content: UserContent::Text(translation_user_prompt(text)),
            deterministic: self.deterministic,
        };

        let completion = self.gateway.complete(&request).await?;
        let cleaned = clean_translation(&completion.text, text);
        if cleaned.is_empty() {
            warn!("Empty {} translation for {:?}", target.code(), text);
            return Err(TranslationError::EmptyResponse);
        }
        debug!("Translated {:?} → {} {:?}", text, target.code(), cleaned);
        Ok(cleaned)
    }

    /// Fill every missing target cell of `table` in place.
    pub async fn fill_translations(
        &self,
        table: &mut MenuTable,
        source: SupportedLanguage,
    ) -> TranslationReport {
        let calls_before = self.model_calls();
        let mut report = TranslationReport::default();
        let mut last_failure: HashMap<(usize, FieldKind, SupportedLanguage), String> = HashMap::new();

        for pass in 1..=self.policy.max_passes {
            let pending = pending_cells(table, source);
            if pending.is_empty() {
                break;
            }
            if pass > 1 && self.policy.pass_backoff_ms > 0 {
                sleep(Duration::from_millis(self.policy.pass_backoff_ms)).await;
            }

            info!("Translation pass {}/{}: {} cells", pass, self.policy.max_passes, pending.len());
            if let Some(ref cb) = self.progress {
                cb.on_translation_pass(pass, pending.len());
            }
            report.passes = pass;

            let groups = group_by_key(pending, source);
            debug!("Translation pass {}: {} distinct texts", pass, groups.len());

            let results: Vec<(PendingGroup, Result<(String, bool), TranslationError>)> =
                stream::iter(groups.into_iter().map(|group| async move {
                    let result = self
                        .lookup(&group.key.text, source, group.key.target)
                        .await;
                    if let Some(ref cb) = self.progress {
                        for _ in &group.cells {
                            cb.on_cell_translated(result.is_ok());
                        }
                    }
                    (group, result)
                }))
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

            let mut failed = 0usize;
            for (group, result) in results {
                match result {
                    Ok((text, hit)) => {
                        // Every cell after the first is served without its own call.
                        report.cache_hits += group.cells.len() - usize::from(!hit);
                        for cell in group.cells {
                            if let Some(row) = table.rows_mut().get_mut(cell.row) {
                                if row.fill_translation(cell.language, cell.field, text.clone()) {
                                    report.cells_filled += 1;
                                }
                            }
                            last_failure.remove(&cell.slot());
                        }
                    }
                    Err(e) => {
                        let reason = e.to_string();
                        failed += group.cells.len();
                        for cell in group.cells {
                            last_failure.insert(cell.slot(), reason.clone());
                        }
                    }
                }
            }

            if failed > 0 {
                warn!("Translation pass {}: {} cells unresolved", pass, failed);
            }
        }

        report.missing = pending_cells(table, source)
            .into_iter()
            .map(|cell| MissingTranslation {
                reason: last_failure
                    .remove(&cell.slot())
                    .unwrap_or_else(|| "not attempted".to_string()),
                row: cell.row,
                field: cell.field,
                language: cell.language,
            })
            .collect();
        report.model_calls = self.model_calls() - calls_before;

        if !report.missing.is_empty() {
            warn!(
                "{} translation cells left blank after {} passes",
                report.missing.len(),
                report.passes
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelCallError;
    use crate::pipeline::gateway::Completion;
    use crate::prompts::TRANSLATION_USER_PREFIX;
    use crate::schema::MenuRow;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Echoes `"<text> [<target>]"`; fails for targets listed in `broken`.
    #[derive(Default)]
    struct EchoGateway {
        broken: Vec<&'static str>,
        empty: bool,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ModelGateway for EchoGateway {
        async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ModelCallError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(request.system_prompt.clone());
            if self.broken.iter().any(|t| request.system_prompt.contains(t)) {
                return Err(ModelCallError::Failed {
                    attempts: 1,
                    detail: "HTTP 500".into(),
                });
            }
            if self.empty {
                return Ok(Completion::text("  "));
            }
            let UserContent::Text(ref user) = request.content else {
                panic!("translation requests carry no image");
            };
            let text = user.strip_prefix(TRANSLATION_USER_PREFIX).unwrap_or(user);
            let target = request.system_prompt.split(" to ").nth(1).unwrap_or("?");
            let target = target.split('.').next().unwrap_or("?");
            Ok(Completion::text(format!("{text} [{target}]")))
        }
    }

    fn row(cells: [&str; 5]) -> MenuRow {
        MenuRow::from_default_cells(cells.map(str::to_string))
    }

    fn table() -> MenuTable {
        let mut t = MenuTable::from(vec![
            row(["Starters", "", "Soup", "Tomato soup", "5.50"]),
            row(["Starters", "", "Salad", "", "4"]),
        ]);
        t.normalize_schema();
        t
    }

    fn translator(gw: Arc<EchoGateway>) -> Translator {
        Translator::new(gw, Arc::new(TranslationCache::new()))
    }

    #[tokio::test]
    async fn fills_every_non_blank_cell() {
        let gw = Arc::new(EchoGateway::default());
        let t = translator(Arc::clone(&gw));
        let mut table = table();

        let report = t.fill_translations(&mut table, SupportedLanguage::En).await;

        assert!(report.is_complete());
        assert_eq!(report.passes, 1);
        // row 0: 3 fields, row 1: 2 fields; 4 targets each
        assert_eq!(report.cells_filled, 20);
        let r0 = &table.rows()[0];
        assert_eq!(r0.translation(SupportedLanguage::Fr, FieldKind::ItemName), "Soup [French]");
        assert_eq!(r0.translation(SupportedLanguage::Fr, FieldKind::SubcategoryTitle), "");
        assert_eq!(r0.translation(SupportedLanguage::En, FieldKind::ItemName), "");
        assert_eq!(r0.item_price, "5.50");
    }

    #[tokio::test]
    async fn repeated_text_is_translated_once_per_target() {
        let gw = Arc::new(EchoGateway::default());
        let t = translator(Arc::clone(&gw)).with_concurrency(1);
        let mut table = table();

        let report = t.fill_translations(&mut table, SupportedLanguage::En).await;

        // "Starters" appears twice but is looked up once per target.
        assert_eq!(gw.calls.load(Ordering::SeqCst), 16);
        assert_eq!(report.model_calls, 16);
        assert_eq!(report.cache_hits, 4);
    }

    #[tokio::test]
    async fn second_run_makes_no_calls() {
        let gw = Arc::new(EchoGateway::default());
        let t = translator(Arc::clone(&gw));
        let mut table = table();
        t.fill_translations(&mut table, SupportedLanguage::En).await;
        let before = gw.calls.load(Ordering::SeqCst);
        let snapshot = table.clone();

        let report = t.fill_translations(&mut table, SupportedLanguage::En).await;

        assert_eq!(gw.calls.load(Ordering::SeqCst), before);
        assert_eq!(report.passes, 0);
        assert_eq!(table, snapshot);
    }

    #[tokio::test]
    async fn broken_target_stays_blank_after_all_passes() {
        let gw = Arc::new(EchoGateway {
            broken: vec!["to German"],
            ..Default::default()
        });
        let t = translator(Arc::clone(&gw));
        let mut table = table();

        let report = t.fill_translations(&mut table, SupportedLanguage::En).await;

        assert_eq!(report.passes, 3);
        assert_eq!(report.missing.len(), 5);
        assert!(report.missing.iter().all(|m| m.language == SupportedLanguage::De));
        assert!(report.missing[0].reason.contains("HTTP 500"));
        for r in table.rows() {
            for f in FieldKind::ALL {
                assert_eq!(r.translation(SupportedLanguage::De, f), "");
            }
        }
        assert_eq!(
            table.rows()[0].translation(SupportedLanguage::Es, FieldKind::ItemName),
            "Soup [Spanish]"
        );
    }

    #[tokio::test]
    async fn failing_text_is_sent_once_per_pass() {
        let gw = Arc::new(EchoGateway {
            broken: vec!["to German"],
            ..Default::default()
        });
        let t = translator(Arc::clone(&gw));
        let rows: Vec<MenuRow> = (0..20)
            .map(|i| {
                let name = format!("Dish {i}");
                row(["Starters", "", name.as_str(), "", "5"])
            })
            .collect();
        let mut table = MenuTable::from(rows);
        table.normalize_schema();

        let report = t.fill_translations(&mut table, SupportedLanguage::En).await;

        let german_calls = gw
            .prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.contains("to German"))
            .count();
        // 21 distinct texts ("Starters" + 20 names), 3 passes.
        assert_eq!(german_calls, 21 * 3);
        assert_eq!(report.passes, 3);
        assert_eq!(report.missing.len(), 40);
        assert!(report.missing.iter().all(|m| m.reason.contains("HTTP 500")));
    }

    #[tokio::test]
    async fn empty_responses_are_not_cached() {
        let gw = Arc::new(EchoGateway {
            empty: true,
            ..Default::default()
        });
        let cache = Arc::new(TranslationCache::new());
        let t = Translator::new(gw, Arc::clone(&cache));

        let err = t
            .translate("Soup", SupportedLanguage::En, SupportedLanguage::Fr)
            .await
            .unwrap_err();
        assert_eq!(err, TranslationError::EmptyResponse);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn shared_cache_keeps_source_languages_apart() {
        let gw = Arc::new(EchoGateway::default());
        let cache = Arc::new(TranslationCache::new());
        let t = Translator::new(Arc::clone(&gw) as Arc<dyn ModelGateway>, Arc::clone(&cache));

        t.translate("Sopa", SupportedLanguage::Es, SupportedLanguage::En)
            .await
            .unwrap();
        t.translate("Sopa", SupportedLanguage::Pt, SupportedLanguage::En)
            .await
            .unwrap();

        assert_eq!(gw.calls.load(Ordering::SeqCst), 2);
        let prompts = gw.prompts.lock().unwrap();
        assert!(prompts[1].contains("Translate from Portuguese to English."));
    }

    #[tokio::test]
    async fn prompt_names_both_languages() {
        let gw = Arc::new(EchoGateway::default());
        let t = translator(Arc::clone(&gw));
        t.translate("Sopa", SupportedLanguage::Pt, SupportedLanguage::De)
            .await
            .unwrap();
        let prompts = gw.prompts.lock().unwrap();
        assert!(prompts[0].contains("Translate from Portuguese to German."));
    }

    #[tokio::test]
    async fn source_language_is_never_a_target() {
        let gw = Arc::new(EchoGateway::default());
        let t = translator(Arc::clone(&gw));
        let mut table = table();

        t.fill_translations(&mut table, SupportedLanguage::Pt).await;

        let r0 = &table.rows()[0];
        assert_eq!(r0.translation(SupportedLanguage::Pt, FieldKind::ItemName), "");
        assert_eq!(r0.translation(SupportedLanguage::En, FieldKind::ItemName), "Soup [English]");
    }
}
