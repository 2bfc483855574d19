//! # edgequake-menu2sheet
//!
//! Turn restaurant menus (PDF or photos) into a multilingual spreadsheet
//! using Vision Language Models.
//!
//! ## Why this crate?
//!
//! Menus are laid out for diners, not parsers: multi-column pages, prices
//! floating next to dish names, categories set in decorative type. OCR
//! tools recover the characters but lose the structure. Instead each page
//! is rasterised and a VLM reads it as a waiter would, writing one table
//! row per dish. A text model then fills the same fields in the four other
//! supported languages.
//!
//! ## Pipeline Overview
//!
//! ```text
//! menu.pdf / photo.jpg
//!  │
//!  ├─ 1. Input      resolve local files or download URLs, sniff the format
//!  ├─ 2. Render     rasterise pages via pdfium / decode images (spawn_blocking)
//!  ├─ 3. Transcribe concurrent VLM calls, markdown table → 5-column rows
//!  ├─ 4. Normalise  every row gets all 25 columns
//!  ├─ 5. Translate  cached, single-flight calls in bounded passes
//!  └─ 6. Output     XLSX / CSV / JSON + per-page and per-cell reports
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_menu2sheet::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = ConversionConfig::default();
//!     let output = convert(&["lunch.pdf", "desserts.jpg"], "Português Europeu", &config).await?;
//!     print!("{}", edgequake_menu2sheet::export::to_csv_string(&output.table)?);
//!     eprintln!("{} rows, {} cells missing",
//!         output.stats.total_rows,
//!         output.stats.missing_cells);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `menu2sheet` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-menu2sheet = { version = "0.1", default-features = false }
//! ```
//!
//! ## Models
//!
//! | Stage | Default | Why |
//! |-------|---------|-----|
//! | Transcription | `gpt-4.1` | Small print and prices need the stronger vision model |
//! | Translation   | `gpt-4.1-mini` | Short strings, many calls |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod language;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod schema;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, ImageEncoding, RetryPolicy};
pub use convert::{convert, convert_from_bytes, convert_pages, convert_sync, convert_to_file};
pub use error::{MenuError, ModelCallError, PageError, TranslationError};
pub use export::OutputFormat;
pub use language::{MenuLanguage, SupportedLanguage};
pub use output::{ConversionOutput, ConversionStats, MissingTranslation, PageResult, TranslationReport};
pub use pipeline::cache::{CacheKey, TranslationCache};
pub use pipeline::gateway::{Completion, CompletionRequest, LlmGateway, ModelGateway, UserContent};
pub use pipeline::render::MenuPage;
pub use pipeline::translate::Translator;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use schema::{FieldKind, LocalizedFields, MenuRow, MenuTable};
