//! Configuration types for menu conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Setters clamp obviously invalid
//! values; [`ConversionConfigBuilder::build`] rejects the rest.

use crate::error::MenuError;
use crate::pipeline::cache::TranslationCache;
use crate::pipeline::gateway::ModelGateway;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default vision model for the transcription call.
pub const DEFAULT_VISION_MODEL: &str = "gpt-4.1";

/// Default text model for the translation calls.
pub const DEFAULT_TRANSLATION_MODEL: &str = "gpt-4.1-mini";

/// Configuration for a menu conversion run.
///
/// # Example
/// ```rust
/// use edgequake_menu2sheet::{ConversionConfig, RetryPolicy};
///
/// let config = ConversionConfig::builder()
///     .concurrency(4)
///     .model("gpt-4.1")
///     .translation_retry(RetryPolicy { max_passes: 5, pass_backoff_ms: 250 })
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Longest edge of a rasterised PDF page in pixels. Default: 2000.
    ///
    /// Menus are often A3 or larger; capping the edge keeps memory bounded
    /// and stays inside the image size vision models handle well.
    pub max_rendered_pixels: u32,

    /// Maximum concurrent model calls (pages, then translation cells). Default: 5.
    ///
    /// Set to 1 for strictly sequential processing.
    pub concurrency: usize,

    /// Vision model identifier for transcription. If None, uses [`DEFAULT_VISION_MODEL`].
    pub model: Option<String>,

    /// Text model identifier for translation. If None, uses [`DEFAULT_TRANSLATION_MODEL`].
    pub translation_model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider used for both stages.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed model gateway used for both stages. Takes precedence
    /// over every provider setting.
    pub gateway: Option<Arc<dyn ModelGateway>>,

    /// Translation cache shared across runs. If None, each run owns a fresh one.
    /// Entries are keyed by source language too, so one cache may serve
    /// menus in different languages.
    pub cache: Option<Arc<TranslationCache>>,

    /// Sampling temperature for non-deterministic calls. Default: 0.3.
    pub temperature: f32,

    /// Run the transcription call at temperature 0. Default: true.
    pub deterministic_transcription: bool,

    /// Run translation calls at temperature 0. Default: true.
    pub deterministic_translation: bool,

    /// Maximum tokens the model may generate per call. Default: 4096.
    ///
    /// A dense menu page can exceed 2 000 output tokens; a truncated table
    /// loses its last rows silently.
    pub max_tokens: usize,

    /// Retries per gateway call on transient failures. Default: 3.
    pub max_retries: u32,

    /// Initial gateway retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Whole-table translation pass policy.
    pub translation_retry: RetryPolicy,

    /// Strip currency symbols from transcribed prices locally. Default: true.
    pub normalize_prices: bool,

    /// Image encoding for the vision request. Default: PNG.
    pub image_encoding: ImageEncoding,

    /// PDF user password for encrypted menus.
    pub password: Option<String>,

    /// Custom transcription system prompt (`{menu_language}` is substituted).
    pub transcription_prompt: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-model-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Deadline for the whole run in seconds. Default: none.
    pub run_timeout_secs: Option<u64>,

    /// Receives per-page and per-pass progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            max_rendered_pixels: 2000,
            concurrency: 5,
            model: None,
            translation_model: None,
            provider_name: None,
            provider: None,
            gateway: None,
            cache: None,
            temperature: 0.3,
            deterministic_transcription: true,
            deterministic_translation: true,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            translation_retry: RetryPolicy::default(),
            normalize_prices: true,
            image_encoding: ImageEncoding::default(),
            password: None,
            transcription_prompt: None,
            download_timeout_secs: 120,
            api_timeout_secs: 120,
            run_timeout_secs: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("translation_model", &self.translation_model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("gateway", &self.gateway.as_ref().map(|_| "<dyn ModelGateway>"))
            .field("cache", &self.cache.as_ref().map(|c| c.len()))
            .field("temperature", &self.temperature)
            .field("deterministic_transcription", &self.deterministic_transcription)
            .field("deterministic_translation", &self.deterministic_translation)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("translation_retry", &self.translation_retry)
            .field("normalize_prices", &self.normalize_prices)
            .field("image_encoding", &self.image_encoding)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("run_timeout_secs", &self.run_timeout_secs)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn translation_model(mut self, model: impl Into<String>) -> Self {
        self.config.translation_model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn gateway(mut self, gateway: Arc<dyn ModelGateway>) -> Self {
        self.config.gateway = Some(gateway);
        self
    }

    pub fn cache(mut self, cache: Arc<TranslationCache>) -> Self {
        self.config.cache = Some(cache);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn deterministic_transcription(mut self, v: bool) -> Self {
        self.config.deterministic_transcription = v;
        self
    }

    pub fn deterministic_translation(mut self, v: bool) -> Self {
        self.config.deterministic_translation = v;
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn translation_retry(mut self, policy: RetryPolicy) -> Self {
        self.config.translation_retry = policy;
        self
    }

    pub fn normalize_prices(mut self, v: bool) -> Self {
        self.config.normalize_prices = v;
        self
    }

    pub fn image_encoding(mut self, encoding: ImageEncoding) -> Self {
        self.config.image_encoding = encoding;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn transcription_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.transcription_prompt = Some(prompt.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn run_timeout_secs(mut self, secs: u64) -> Self {
        self.config.run_timeout_secs = Some(secs);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, MenuError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(MenuError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.translation_retry.max_passes == 0 {
            return Err(MenuError::InvalidConfig(
                "Translation retry policy needs at least one pass".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(MenuError::InvalidConfig("API timeout must be ≥ 1s".into()));
        }
        if matches!(c.run_timeout_secs, Some(0)) {
            return Err(MenuError::InvalidConfig("Run timeout must be ≥ 1s".into()));
        }
        if let Some(ref prompt) = c.transcription_prompt {
            if prompt.trim().is_empty() {
                return Err(MenuError::InvalidConfig(
                    "Transcription prompt must not be empty".into(),
                ));
            }
        }
        if let ImageEncoding::Jpeg { quality } = c.image_encoding {
            if !(1..=100).contains(&quality) {
                return Err(MenuError::InvalidConfig(format!(
                    "JPEG quality must be 1–100, got {quality}"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Policies & enums ─────────────────────────────────────────────────────

/// Bounded retry over whole-table translation passes.
///
/// A pass translates every cell still missing; when some cells stay
/// unresolved another pass runs, up to `max_passes` in total. Cells still
/// empty afterwards are left blank and reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total passes, including the first. Default: 3.
    pub max_passes: u32,
    /// Delay before each extra pass in milliseconds. Default: 0.
    pub pass_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_passes: 3,
            pass_backoff_ms: 0,
        }
    }
}

/// Image format sent to the vision model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageEncoding {
    /// Lossless; keeps small print crisp. (default)
    #[default]
    Png,
    /// Smaller uploads for photographed menus.
    Jpeg { quality: u8 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.concurrency, 5);
        assert_eq!(c.translation_retry.max_passes, 3);
        assert!(c.deterministic_transcription);
        assert!(c.deterministic_translation);
        assert!(c.normalize_prices);
        assert_eq!(c.image_encoding, ImageEncoding::Png);
    }

    #[test]
    fn builder_clamps_concurrency() {
        let c = ConversionConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn zero_passes_rejected() {
        let err = ConversionConfig::builder()
            .translation_retry(RetryPolicy {
                max_passes: 0,
                pass_backoff_ms: 0,
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, MenuError::InvalidConfig(_)));
    }

    #[test]
    fn bad_jpeg_quality_rejected() {
        let err = ConversionConfig::builder()
            .image_encoding(ImageEncoding::Jpeg { quality: 0 })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("JPEG quality"));
    }

    #[test]
    fn debug_hides_provider_objects() {
        let dbg = format!("{:?}", ConversionConfig::default());
        assert!(dbg.contains("concurrency"));
        assert!(!dbg.contains("progress_callback"));
    }
}
