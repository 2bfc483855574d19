//! Result types returned by the conversion entry points.
//!
//! A run succeeds as long as one page was transcribed. Everything that went
//! missing along the way (failed pages, dropped table lines, translation
//! cells left blank) is reported here rather than raised.

use crate::error::{MenuError, PageError};
use crate::language::SupportedLanguage;
use crate::schema::{FieldKind, MenuTable};
use serde::{Deserialize, Serialize};

/// Outcome of transcribing one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed position across all inputs.
    pub page_num: usize,
    /// File name or URL the page came from.
    pub source: String,
    /// Rows accepted from this page.
    pub rows: usize,
    /// Repeated header lines absorbed by the parser.
    pub header_echoes: usize,
    /// Table lines dropped for a wrong cell count.
    pub malformed_rows: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    /// Set when the page could not be transcribed.
    pub error: Option<PageError>,
}

impl PageResult {
    /// A page that failed before producing any rows.
    pub fn failed(page_num: usize, source: impl Into<String>, error: PageError) -> Self {
        Self {
            page_num,
            source: source.into(),
            rows: 0,
            header_echoes: 0,
            malformed_rows: 0,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// One translation cell still empty after the last pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingTranslation {
    /// 0-indexed row in the table.
    pub row: usize,
    pub field: FieldKind,
    pub language: SupportedLanguage,
    /// Last failure seen for this cell.
    pub reason: String,
}

/// What the translator did to a table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslationReport {
    /// Passes actually run (0 when nothing needed translating).
    pub passes: u32,
    /// Cells written.
    pub cells_filled: usize,
    /// Gateway calls made, failed ones included.
    pub model_calls: usize,
    /// Cells served from the translation cache.
    pub cache_hits: usize,
    /// Cells left blank.
    pub missing: Vec<MissingTranslation>,
}

impl TranslationReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Aggregate numbers for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_pages: usize,
    pub processed_pages: usize,
    pub failed_pages: usize,
    pub total_rows: usize,
    pub malformed_rows: usize,
    pub translated_cells: usize,
    pub missing_cells: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
    pub transcription_duration_ms: u64,
    pub translation_duration_ms: u64,
}

/// Everything a conversion run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Menu language the rows were transcribed in.
    pub source_language: SupportedLanguage,
    /// Normalised, translated table.
    pub table: MenuTable,
    /// Per-page outcomes, in page order.
    pub pages: Vec<PageResult>,
    pub translation: TranslationReport,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// Pages that could not be transcribed.
    pub fn failed_pages(&self) -> impl Iterator<Item = &PageResult> {
        self.pages.iter().filter(|p| !p.is_ok())
    }

    /// `true` when every page was transcribed and every cell translated.
    pub fn is_complete(&self) -> bool {
        self.stats.failed_pages == 0 && self.translation.is_complete()
    }

    /// Turn any incompleteness into [`MenuError::PartialFailure`].
    pub fn into_result(self) -> Result<Self, MenuError> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(MenuError::PartialFailure {
                failed_pages: self.stats.failed_pages,
                total_pages: self.stats.total_pages,
                missing_cells: self.translation.missing.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelCallError;

    fn output(failed_pages: usize, missing: Vec<MissingTranslation>) -> ConversionOutput {
        ConversionOutput {
            source_language: SupportedLanguage::En,
            table: MenuTable::new(),
            pages: Vec::new(),
            translation: TranslationReport {
                missing,
                ..Default::default()
            },
            stats: ConversionStats {
                total_pages: 3,
                failed_pages,
                ..Default::default()
            },
        }
    }

    #[test]
    fn complete_output_passes_through() {
        assert!(output(0, Vec::new()).into_result().is_ok());
    }

    #[test]
    fn missing_cells_become_partial_failure() {
        let missing = vec![MissingTranslation {
            row: 0,
            field: FieldKind::ItemName,
            language: SupportedLanguage::De,
            reason: "model call timed out after 5s".into(),
        }];
        match output(0, missing).into_result() {
            Err(MenuError::PartialFailure { missing_cells, .. }) => assert_eq!(missing_cells, 1),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn failed_page_is_listed() {
        let mut out = output(1, Vec::new());
        out.pages.push(PageResult::failed(
            2,
            "menu.pdf",
            PageError::ModelCallFailed {
                page: 2,
                source: ModelCallError::Timeout { secs: 1 },
            },
        ));
        assert!(!out.is_complete());
        assert_eq!(out.failed_pages().map(|p| p.page_num).collect::<Vec<_>>(), vec![2]);
    }
}
