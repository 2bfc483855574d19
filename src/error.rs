//! Error types for the edgequake-menu2sheet library.
//!
//! Three error types map onto three failure scopes:
//!
//! * [`MenuError`] (**fatal**): the run cannot proceed at all (unreadable
//!   input, unsupported menu language, provider not configured, every page
//!   failed). Returned as `Err(MenuError)` from the top-level `convert*`
//!   functions.
//!
//! * [`PageError`] (**non-fatal**): one page could not be rendered or
//!   transcribed. Stored inside [`crate::output::PageResult`] so the caller
//!   sees exactly which pages are missing while the other pages still
//!   produce rows.
//!
//! * [`ModelCallError`]: the single opaque failure of the model gateway
//!   (network, auth, rate limit, timeout). The transcriber propagates it
//!   untouched; the accumulator turns it into a [`PageError`] and the
//!   translator into a blank, reported cell.
//!
//! Parse-level anomalies (malformed table rows, empty translations) are
//! never errors: they are counted in the page and translation reports.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-menu2sheet library.
#[derive(Debug, Error)]
pub enum MenuError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Menu file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file was read but is neither a PDF nor a PNG/JPEG image.
    #[error("Unsupported file format: '{path}' (expected PDF, PNG or JPEG)\nFirst bytes: {magic:?}")]
    UnsupportedFormat { path: PathBuf, magic: [u8; 4] },

    /// A PNG/JPEG input could not be decoded.
    #[error("Failed to decode image '{path}': {detail}")]
    ImageDecodeFailed { path: PathBuf, detail: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDF menus need the pdfium shared library.\n\
  • Install libpdfium system-wide, or\n\
  • Set PDFIUM_LIB_PATH to the directory containing libpdfium.\n\
Image menus (PNG/JPEG) do not need pdfium."
    )]
    PdfiumBindingFailed(String),

    // ── Language / configuration errors ───────────────────────────────────
    /// The selected menu language does not map to any supported code.
    ///
    /// Raised before any model call: translation must never run with an
    /// undefined source language.
    #[error("Unsupported menu language '{label}'\nSupported: {supported}")]
    UnsupportedLanguage { label: String, supported: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every page failed; the spreadsheet would be empty.
    #[error("All {total} pages failed.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    /// Some pages or translation cells are missing.
    ///
    /// Returned by [`crate::output::ConversionOutput::into_result`] when the
    /// caller wants to treat any incompleteness as an error.
    #[error("{failed_pages}/{total_pages} pages failed and {missing_cells} translation cells are empty")]
    PartialFailure {
        failed_pages: usize,
        total_pages: usize,
        missing_cells: usize,
    },

    /// The whole run exceeded its deadline.
    #[error("Conversion did not finish within {secs}s")]
    RunTimedOut { secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV writer rejected a record.
    #[error("Failed to encode CSV: {0}")]
    Csv(#[from] csv::Error),

    /// The workbook could not be assembled.
    #[error("Failed to encode XLSX workbook: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The single opaque failure of a model gateway call.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ModelCallError {
    /// Provider unreachable, rate-limited, or returned an API error on every attempt.
    #[error("model call failed after {attempts} attempt(s): {detail}")]
    Failed { attempts: u32, detail: String },

    /// A single call exceeded the per-call timeout on its last attempt.
    #[error("model call timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// Why one translation cell could not be filled in a pass.
///
/// Soft: the cell stays blank and is retried by the next pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationError {
    #[error(transparent)]
    ModelCall(#[from] ModelCallError),

    /// The model answered with nothing usable after cleanup.
    #[error("model returned an empty translation")]
    EmptyResponse,
}

/// A non-fatal error for a single page.
///
/// Stored in [`crate::output::PageResult`] when a page fails. The run
/// continues unless every page fails.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page image could not be encoded for the model request.
    #[error("Page {page}: image encoding failed: {detail}")]
    EncodeFailed { page: usize, detail: String },

    /// The transcription call failed.
    #[error("Page {page}: transcription failed: {source}")]
    ModelCallFailed {
        page: usize,
        #[source]
        source: ModelCallError,
    },
}

impl PageError {
    /// 1-indexed page number the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::EncodeFailed { page, .. } | PageError::ModelCallFailed { page, .. } => *page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_display() {
        let e = MenuError::PartialFailure {
            failed_pages: 1,
            total_pages: 3,
            missing_cells: 4,
        };
        let msg = e.to_string();
        assert!(msg.contains("1/3"), "got: {msg}");
        assert!(msg.contains("4 translation cells"), "got: {msg}");
    }

    #[test]
    fn unsupported_language_lists_choices() {
        let e = MenuError::UnsupportedLanguage {
            label: "Klingon".into(),
            supported: "English, Portuguese".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Klingon"));
        assert!(msg.contains("Portuguese"));
    }

    #[test]
    fn page_error_carries_model_failure() {
        let e = PageError::ModelCallFailed {
            page: 2,
            source: ModelCallError::Failed {
                attempts: 4,
                detail: "HTTP 503".into(),
            },
        };
        assert_eq!(e.page(), 2);
        let msg = e.to_string();
        assert!(msg.contains("Page 2"), "got: {msg}");
        assert!(msg.contains("HTTP 503"), "got: {msg}");
    }

    #[test]
    fn translation_error_wraps_model_failure() {
        let e: TranslationError = ModelCallError::Timeout { secs: 5 }.into();
        assert!(e.to_string().contains("5s"));
        assert!(TranslationError::EmptyResponse.to_string().contains("empty"));
    }

    #[test]
    fn timeout_display() {
        let e = ModelCallError::Timeout { secs: 60 };
        assert!(e.to_string().contains("60s"));
    }
}
