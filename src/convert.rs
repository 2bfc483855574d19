//! Conversion entry points: menu files in, translated table out.
//!
//! ```text
//! label ──▶ MenuLanguage           (fails before any model call)
//! inputs ──▶ resolve ──▶ render     (global page numbering, upload order)
//!        ──▶ accumulate             (vision gateway, ≤ concurrency pages)
//!        ──▶ normalize_schema       (25 columns)
//!        ──▶ fill_translations      (text gateway, cache, bounded passes)
//! ```
//!
//! A run returns `Ok` as long as one page was transcribed; failed pages and
//! blank translation cells are reported in [`ConversionOutput`].

use crate::config::{ConversionConfig, DEFAULT_TRANSLATION_MODEL, DEFAULT_VISION_MODEL};
use crate::error::MenuError;
use crate::export::{self, OutputFormat};
use crate::language::MenuLanguage;
use crate::output::{ConversionOutput, ConversionStats};
use crate::pipeline::accumulate::{accumulate, Accumulated};
use crate::pipeline::cache::TranslationCache;
use crate::pipeline::gateway::{LlmGateway, ModelGateway};
use crate::pipeline::input;
use crate::pipeline::render::{self, MenuPage};
use crate::pipeline::translate::Translator;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::future::Future;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Convert one or more menu files or URLs into a translated table.
///
/// This is the primary entry point for the library. Pages are numbered
/// across `inputs` in the order given.
///
/// # Arguments
/// * `inputs` — Local paths or HTTP/HTTPS URLs to PDF, PNG or JPEG files
/// * `language_label` — The menu's language as picked by the operator
///   (e.g. `"Português Europeu"`, `"German"`, `"fr"`)
/// * `config` — Conversion configuration
///
/// # Returns
/// `Ok(ConversionOutput)` even if some pages or cells failed
/// (check `output.is_complete()`).
///
/// # Errors
/// Returns `Err(MenuError)` only for fatal errors:
/// - Unsupported menu language
/// - File not found / unsupported format / unreadable PDF
/// - No provider configured
/// - All pages failed
/// - Run deadline exceeded
pub async fn convert<S: AsRef<str>>(
    inputs: &[S],
    language_label: &str,
    config: &ConversionConfig,
) -> Result<ConversionOutput, MenuError> {
    with_deadline(config, convert_inner(inputs, language_label, config)).await
}

async fn convert_inner<S: AsRef<str>>(
    inputs: &[S],
    language_label: &str,
    config: &ConversionConfig,
) -> Result<ConversionOutput, MenuError> {
    let total_start = Instant::now();

    // ── Step 1: Resolve the menu language ────────────────────────────────
    let language = MenuLanguage::from_label(language_label)?;
    info!(
        "Starting conversion of {} input(s), menu language {} ({})",
        inputs.len(),
        language.label(),
        language.language().code()
    );

    if inputs.is_empty() {
        return Err(MenuError::InvalidInput {
            input: String::new(),
        });
    }

    // ── Step 2: Resolve and rasterise inputs ─────────────────────────────
    let render_start = Instant::now();
    let mut pages: Vec<MenuPage> = Vec::new();
    for raw in inputs {
        let raw = raw.as_ref();
        let resolved = input::resolve_input(raw, config.download_timeout_secs).await?;
        let images =
            render::render_input(&resolved, config.max_rendered_pixels, config.password.as_deref()).await?;
        let source = input::source_label(raw);
        debug!("{}: {} page(s)", source, images.len());
        for image in images {
            let page_num = pages.len() + 1;
            pages.push(MenuPage {
                page_num,
                source: source.clone(),
                image,
            });
        }
    }
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    info!("Rendered {} pages in {}ms", pages.len(), render_duration_ms);

    // ── Step 3: Get/create gateways ──────────────────────────────────────
    let gateways = resolve_gateways(config)?;

    run_pages(pages, &language, &gateways, config, total_start, render_duration_ms).await
}

/// Transcribe and translate already-rasterised pages.
///
/// Skips input resolution and rendering; useful when pages come from
/// elsewhere (or in tests, with a stub gateway in `config`).
pub async fn convert_pages(
    pages: Vec<MenuPage>,
    language: &MenuLanguage,
    config: &ConversionConfig,
) -> Result<ConversionOutput, MenuError> {
    let total_start = Instant::now();
    let gateways = resolve_gateways(config)?;
    with_deadline(
        config,
        run_pages(pages, language, &gateways, config, total_start, 0),
    )
    .await
}

/// Convert menus and write the table directly to a file.
///
/// The format follows the file extension (`.xlsx` → Excel workbook,
/// `.json` → JSON, otherwise CSV).
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file<S: AsRef<str>>(
    inputs: &[S],
    language_label: &str,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, MenuError> {
    let output = convert(inputs, language_label, config).await?;
    let path = output_path.as_ref();
    export::write_output(&output, path, OutputFormat::from_path(path)).await?;
    info!("Wrote {} rows to {}", output.table.len(), path.display());
    Ok(output)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync<S: AsRef<str>>(
    inputs: &[S],
    language_label: &str,
    config: &ConversionConfig,
) -> Result<ConversionOutput, MenuError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| MenuError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(inputs, language_label, config))
}

/// Convert an in-memory menu file (PDF, PNG or JPEG bytes).
///
/// The bytes are written to a managed temp file that is removed on return.
pub async fn convert_from_bytes(
    bytes: &[u8],
    language_label: &str,
    config: &ConversionConfig,
) -> Result<ConversionOutput, MenuError> {
    let mut tmp = tempfile::NamedTempFile::new()
        .map_err(|e| MenuError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| MenuError::Internal(format!("tempfile write: {e}")))?;
    let path = tmp.path().to_string_lossy().to_string();
    convert(&[path], language_label, config).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Apply the optional whole-run deadline.
async fn with_deadline<F>(config: &ConversionConfig, fut: F) -> Result<ConversionOutput, MenuError>
where
    F: Future<Output = Result<ConversionOutput, MenuError>>,
{
    match config.run_timeout_secs {
        Some(secs) => tokio::time::timeout(std::time::Duration::from_secs(secs), fut)
            .await
            .map_err(|_| MenuError::RunTimedOut { secs })?,
        None => fut.await,
    }
}

async fn run_pages(
    pages: Vec<MenuPage>,
    language: &MenuLanguage,
    gateways: &Gateways,
    config: &ConversionConfig,
    total_start: Instant,
    render_duration_ms: u64,
) -> Result<ConversionOutput, MenuError> {
    let total_pages = pages.len();
    if total_pages == 0 {
        return Err(MenuError::AllPagesFailed {
            total: 0,
            first_error: "No pages to transcribe".to_string(),
        });
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(total_pages);
    }

    // ── Step 4: Transcribe every page ────────────────────────────────────
    let transcription_start = Instant::now();
    let Accumulated { mut table, pages } =
        accumulate(gateways.vision.as_ref(), pages, language, config).await;
    let transcription_duration_ms = transcription_start.elapsed().as_millis() as u64;

    let processed = pages.iter().filter(|p| p.is_ok()).count();
    if processed == 0 {
        let first_error = pages
            .iter()
            .find_map(|p| p.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(MenuError::AllPagesFailed {
            total: pages.len(),
            first_error,
        });
    }

    // ── Step 5: Normalise to the full schema ─────────────────────────────
    table.normalize_schema();

    // ── Step 6: Translate ────────────────────────────────────────────────
    let translation_start = Instant::now();
    let cache = config
        .cache
        .clone()
        .unwrap_or_else(|| Arc::new(TranslationCache::new()));
    let translator = Translator::from_config(Arc::clone(&gateways.translation), cache, config);
    let translation = translator.fill_translations(&mut table, language.language()).await;
    let translation_duration_ms = translation_start.elapsed().as_millis() as u64;

    // ── Step 7: Compute stats ────────────────────────────────────────────
    let stats = ConversionStats {
        total_pages,
        processed_pages: processed,
        failed_pages: total_pages - processed,
        total_rows: table.len(),
        malformed_rows: pages.iter().map(|p| p.malformed_rows).sum(),
        translated_cells: translation.cells_filled,
        missing_cells: translation.missing.len(),
        total_input_tokens: pages.iter().map(|p| p.input_tokens as u64).sum(),
        total_output_tokens: pages.iter().map(|p| p.output_tokens as u64).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        render_duration_ms,
        transcription_duration_ms,
        translation_duration_ms,
    };

    info!(
        "Conversion complete: {}/{} pages, {} rows, {} cells missing, {}ms total",
        processed, total_pages, stats.total_rows, stats.missing_cells, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(total_pages, processed, stats.missing_cells);
    }

    Ok(ConversionOutput {
        source_language: language.language(),
        table,
        pages,
        translation,
        stats,
    })
}

/// The gateways of the two stages; the same one when injected.
struct Gateways {
    vision: Arc<dyn ModelGateway>,
    translation: Arc<dyn ModelGateway>,
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Vision,
    Translation,
}

impl Stage {
    /// Model configured for this stage, if any.
    fn configured_model(self, config: &ConversionConfig) -> Option<&str> {
        match self {
            Stage::Vision => config.model.as_deref(),
            Stage::Translation => config.translation_model.as_deref(),
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            Stage::Vision => DEFAULT_VISION_MODEL,
            Stage::Translation => DEFAULT_TRANSLATION_MODEL,
        }
    }
}

fn resolve_gateways(config: &ConversionConfig) -> Result<Gateways, MenuError> {
    if let Some(ref gateway) = config.gateway {
        return Ok(Gateways {
            vision: Arc::clone(gateway),
            translation: Arc::clone(gateway),
        });
    }

    let wrap = |provider: Arc<dyn LLMProvider>| -> Arc<dyn ModelGateway> {
        Arc::new(
            LlmGateway::new(provider)
                .with_temperature(config.temperature)
                .with_max_tokens(config.max_tokens)
                .with_retries(config.max_retries, config.retry_backoff_ms)
                .with_call_timeout(config.api_timeout_secs),
        )
    };

    Ok(Gateways {
        vision: wrap(resolve_provider(config, Stage::Vision)?),
        translation: wrap(resolve_provider(config, Stage::Translation)?),
    })
}

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, MenuError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        MenuError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider for one stage, from most- to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used for both stages.
/// 2. **Named provider** (`config.provider_name`) with the stage's model
///    or its default.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`);
///    an explicitly configured stage model still wins over `EDGEQUAKE_MODEL`.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set, so users holding several
///    keys default to the models the prompts were tuned on.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
fn resolve_provider(config: &ConversionConfig, stage: Stage) -> Result<Arc<dyn LLMProvider>, MenuError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = stage
        .configured_model(config)
        .unwrap_or_else(|| stage.default_model());

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            let model = stage.configured_model(config).unwrap_or(env_model.as_str());
            return create_provider(&prov, model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| MenuError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    debug!("Auto-detected provider for {:?} stage", stage);
    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelCallError;
    use crate::pipeline::gateway::{Completion, CompletionRequest};
    use async_trait::async_trait;

    struct Silent;

    #[async_trait]
    impl ModelGateway for Silent {
        async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, ModelCallError> {
            Ok(Completion::text(""))
        }
    }

    fn config() -> ConversionConfig {
        ConversionConfig::builder().gateway(Arc::new(Silent)).build().unwrap()
    }

    #[test]
    fn stage_defaults() {
        let c = ConversionConfig::default();
        assert_eq!(Stage::Vision.configured_model(&c), None);
        assert_eq!(Stage::Vision.default_model(), "gpt-4.1");
        assert_eq!(Stage::Translation.default_model(), "gpt-4.1-mini");
        let c = ConversionConfig::builder().translation_model("m").build().unwrap();
        assert_eq!(Stage::Translation.configured_model(&c), Some("m"));
    }

    #[test]
    fn injected_gateway_serves_both_stages() {
        let g = resolve_gateways(&config()).unwrap();
        assert!(Arc::ptr_eq(&g.vision, &g.translation));
    }

    #[tokio::test]
    async fn unsupported_language_fails_before_input() {
        let err = convert(&["/definitely/not/here.pdf"], "Klingon", &config())
            .await
            .unwrap_err();
        assert!(matches!(err, MenuError::UnsupportedLanguage { .. }));
    }

    #[tokio::test]
    async fn no_inputs_is_invalid() {
        let inputs: [&str; 0] = [];
        let err = convert(&inputs, "English", &config()).await.unwrap_err();
        assert!(matches!(err, MenuError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn zero_pages_is_all_failed() {
        let lang = MenuLanguage::from_label("English").unwrap();
        let err = convert_pages(Vec::new(), &lang, &config()).await.unwrap_err();
        assert!(matches!(err, MenuError::AllPagesFailed { total: 0, .. }));
    }
}
