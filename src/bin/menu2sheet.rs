//! CLI binary for edgequake-menu2sheet.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_menu2sheet::export::{self, OutputFormat};
use edgequake_menu2sheet::{
    convert, ConversionConfig, ConversionOutput, ConversionProgressCallback, ImageEncoding,
    ProgressCallback, RetryPolicy, SupportedLanguage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for pages, then one per translation
/// pass. Pages complete out of order in concurrent mode.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-page wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    /// Translation cells that failed in the current pass.
    cell_failures: AtomicUsize,
}

impl CliProgressCallback {
    /// Create a callback whose bar length is set by `on_conversion_start`.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading menu…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            cell_failures: AtomicUsize::new(0),
        })
    }

    /// Switch to the counted style for `total` units.
    fn activate_bar(&self, prefix: &str, unit: &str, total: usize) {
        let template = format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  \
             [{{bar:42.green/238}}] {{pos:>4}}/{{len}} {unit}  \
             ⏱ {{elapsed_precise}}  ETA {{eta_precise}}"
        );
        let progress_style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS);

        self.bar.set_position(0);
        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix(prefix.to_string());
        self.bar.reset_eta();
    }

    fn page_elapsed(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&page_num)
            .map(|t| t.elapsed().as_millis() as f64 / 1000.0)
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar("Transcribing", "pages", total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Transcribing {total_pages} menu pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(page_num, Instant::now());
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, rows: usize) {
        let elapsed = self.page_elapsed(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{rows:>4} rows")),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let elapsed = self.page_elapsed(page_num);

        // Truncate very long error messages to keep output tidy.
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_translation_pass(&self, pass: u32, pending_cells: usize) {
        self.cell_failures.store(0, Ordering::SeqCst);
        self.activate_bar(&format!("Translating (pass {pass})"), "cells", pending_cells);
    }

    fn on_cell_translated(&self, filled: bool) {
        if !filled {
            self.cell_failures.fetch_add(1, Ordering::SeqCst);
            self.bar
                .set_message(format!("{} failed", self.cell_failures.load(Ordering::SeqCst)));
        }
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_pages: usize, success_pages: usize, missing_cells: usize) {
        let failed = total_pages.saturating_sub(success_pages);
        self.bar.finish_and_clear();

        if failed == 0 && missing_cells == 0 {
            eprintln!(
                "{} {} pages transcribed and fully translated",
                green("✔"),
                bold(&success_pages.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages transcribed  ({} failed, {} cells untranslated)",
                cyan("⚠"),
                bold(&success_pages.to_string()),
                total_pages,
                red(&failed.to_string()),
                red(&missing_cells.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One PDF menu, CSV to stdout
  menu2sheet --language "Português Europeu" menu.pdf

  # Several photos of one menu, in page order, to a file
  menu2sheet -l German page1.jpg page2.jpg page3.jpg -o menu.csv

  # Excel workbook
  menu2sheet -l en menu.pdf -o menu.xlsx

  # Full JSON report (pages, dropped rows, missing translations)
  menu2sheet -l fr menu.pdf --format json -o menu.json

  # Fail the run when any page or translation cell is missing
  menu2sheet -l en menu.pdf -o menu.csv --strict

MENU LANGUAGES:
  en  English      Inglês Britânico, British English
  pt  Portuguese   Português Europeu, European Portuguese
  fr  French       Francês Europeu, European French
  de  German       Alemão (Alemanha), German (Germany)
  es  Spanish      Espanhol Europeu, European Spanish

OUTPUT COLUMNS (25):
  CategoryTitleDefault, SubcategoryTitleDefault, ItemNameDefault,
  ItemDescriptionDefault, ItemPrice, then CategoryTitle/SubcategoryTitle/
  ItemName/ItemDescription for En, Pt, Fr, De, Es.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Directory containing libpdfium (PDF menus only)
"#;

/// Transcribe restaurant menus into a multilingual spreadsheet.
#[derive(Parser, Debug)]
#[command(
    name = "menu2sheet",
    version,
    about = "Transcribe restaurant menus (PDF, PNG, JPEG) into a 25-column multilingual spreadsheet",
    long_about = "Transcribe restaurant menus (local files or URLs) into a structured spreadsheet \
using a Vision Language Model, then translate every item into English, Portuguese, French, German \
and Spanish. Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any OpenAI-compatible \
endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Menu files or HTTP/HTTPS URLs, in page order.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Language the menu is written in (label, English name, or code).
    #[arg(short, long, env = "MENU2SHEET_LANGUAGE")]
    language: String,

    /// Write the table to this file instead of stdout.
    #[arg(short, long, env = "MENU2SHEET_OUTPUT")]
    output: Option<PathBuf>,

    /// Output format (csv, xlsx, json); defaults to the output file's
    /// extension, else csv.
    #[arg(long, env = "MENU2SHEET_FORMAT", value_enum)]
    format: Option<FormatArg>,

    /// Vision model for transcription (default: gpt-4.1).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Text model for translation (default: gpt-4.1-mini).
    #[arg(long, env = "MENU2SHEET_TRANSLATION_MODEL")]
    translation_model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Number of concurrent model calls (pages, then translation cells).
    #[arg(short, long, env = "MENU2SHEET_CONCURRENCY", default_value_t = 5)]
    concurrency: usize,

    /// Translation passes over the table before giving up on a cell.
    #[arg(long, env = "MENU2SHEET_PASSES", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..=10))]
    passes: u32,

    /// Delay before each extra translation pass, in milliseconds.
    #[arg(long, env = "MENU2SHEET_PASS_BACKOFF_MS", default_value_t = 0)]
    pass_backoff_ms: u64,

    /// Retries per model call on transient failures.
    #[arg(long, env = "MENU2SHEET_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Sampling temperature when --creative is set (0.0–2.0).
    #[arg(long, env = "MENU2SHEET_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Sample at --temperature instead of 0 for both stages.
    #[arg(long, env = "MENU2SHEET_CREATIVE")]
    creative: bool,

    /// Max output tokens per model call.
    #[arg(long, env = "MENU2SHEET_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Longest edge of rendered pages, in pixels.
    #[arg(long, env = "MENU2SHEET_MAX_PIXELS", default_value_t = 2000,
          value_parser = clap::value_parser!(u32).range(100..=8000))]
    max_pixels: u32,

    /// Send pages as JPEG at this quality (1–100) instead of PNG.
    #[arg(long, env = "MENU2SHEET_JPEG_QUALITY",
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: Option<u8>,

    /// Keep prices exactly as the model wrote them.
    #[arg(long, env = "MENU2SHEET_NO_PRICE_NORMALIZE")]
    no_price_normalize: bool,

    /// PDF user password for encrypted menus.
    #[arg(long, env = "MENU2SHEET_PASSWORD")]
    password: Option<String>,

    /// Text file with a custom transcription prompt ({menu_language} is substituted).
    #[arg(long, env = "MENU2SHEET_PROMPT")]
    prompt: Option<PathBuf>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "MENU2SHEET_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-call model timeout in seconds.
    #[arg(long, env = "MENU2SHEET_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Deadline for the whole run in seconds.
    #[arg(long, env = "MENU2SHEET_RUN_TIMEOUT")]
    run_timeout: Option<u64>,

    /// Exit non-zero when any page failed or any translation cell is empty.
    #[arg(long, env = "MENU2SHEET_STRICT")]
    strict: bool,

    /// Disable progress bar.
    #[arg(long, env = "MENU2SHEET_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MENU2SHEET_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MENU2SHEET_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Csv,
    Xlsx,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Xlsx => OutputFormat::Xlsx,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose brings them all back.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // Fail on a bad language before touching any input.
    cli.language
        .parse::<SupportedLanguage>()
        .context("Invalid --language")?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output = convert(&cli.inputs, &cli.language, &config)
        .await
        .context("Conversion failed")?;

    let format = cli
        .format
        .map(OutputFormat::from)
        .or_else(|| cli.output.as_deref().map(OutputFormat::from_path))
        .unwrap_or_default();

    if let Some(ref output_path) = cli.output {
        export::write_output(&output, output_path, format)
            .await
            .context("Failed to write output")?;
    } else {
        let rendered = export::render(&output, format).context("Failed to serialise output")?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(&rendered)
            .context("Failed to write to stdout")?;
        if format != OutputFormat::Xlsx && !rendered.ends_with(b"\n") {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet {
        print_summary(&output, cli.output.as_ref());
    }

    if cli.strict {
        output.into_result().context("Incomplete conversion (--strict)")?;
    }

    Ok(())
}

/// Report failed pages and untranslated cells on stderr.
fn print_summary(output: &ConversionOutput, path: Option<&PathBuf>) {
    let stats = &output.stats;
    eprintln!(
        "{}  {}/{} pages  {} rows  {}ms{}",
        if output.is_complete() { green("✔") } else { cyan("⚠") },
        stats.processed_pages,
        stats.total_pages,
        stats.total_rows,
        stats.total_duration_ms,
        path.map(|p| format!("  →  {}", bold(&p.display().to_string())))
            .unwrap_or_default(),
    );
    eprintln!(
        "   {} tokens in  /  {} tokens out  —  {} translation calls, {} cache hits",
        dim(&stats.total_input_tokens.to_string()),
        dim(&stats.total_output_tokens.to_string()),
        output.translation.model_calls,
        output.translation.cache_hits,
    );

    for page in output.failed_pages() {
        if let Some(ref e) = page.error {
            eprintln!("   {} page {} ({}): {}", red("✗"), page.page_num, page.source, e);
        }
    }
    if stats.malformed_rows > 0 {
        eprintln!("   {} malformed table lines dropped", stats.malformed_rows);
    }
    if !output.translation.missing.is_empty() {
        eprintln!(
            "   {} translation cells left empty after {} passes",
            red(&output.translation.missing.len().to_string()),
            output.translation.passes
        );
    }
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let prompt = if let Some(ref path) = cli.prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read transcription prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = ConversionConfig::builder()
        .concurrency(cli.concurrency)
        .max_rendered_pixels(cli.max_pixels)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .deterministic_transcription(!cli.creative)
        .deterministic_translation(!cli.creative)
        .max_retries(cli.max_retries)
        .translation_retry(RetryPolicy {
            max_passes: cli.passes,
            pass_backoff_ms: cli.pass_backoff_ms,
        })
        .normalize_prices(!cli.no_price_normalize)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(quality) = cli.jpeg_quality {
        builder = builder.image_encoding(ImageEncoding::Jpeg { quality });
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref model) = cli.translation_model {
        builder = builder.translation_model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(prompt) = prompt {
        builder = builder.transcription_prompt(prompt);
    }
    if let Some(secs) = cli.run_timeout {
        builder = builder.run_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
