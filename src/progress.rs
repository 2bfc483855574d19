//! Progress-callback trait for conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as pages are transcribed and translation passes run. The library
//! never renders progress itself; the CLI forwards these events to a
//! terminal progress bar.
//!
//! # Example
//!
//! ```rust
//! use edgequake_menu2sheet::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct RowCounter {
//!     rows: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for RowCounter {
//!     fn on_page_complete(&self, _page_num: usize, _total_pages: usize, rows: usize) {
//!         self.rows.fetch_add(rows, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(RowCounter { rows: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the conversion pipeline as it runs.
///
/// Pages and translation cells are processed concurrently, so every method
/// may be called from several tasks at once; protect shared state with
/// atomics or a `Mutex`. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once, after the inputs were rasterised.
    fn on_conversion_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page's transcription request is sent (1-indexed).
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page was transcribed; `rows` is the number of rows accepted.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, rows: usize) {
        let _ = (page_num, total_pages, rows);
    }

    /// Called when a page's transcription failed.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called at the start of each translation pass (1-indexed) with the
    /// number of cells still missing.
    fn on_translation_pass(&self, pass: u32, pending_cells: usize) {
        let _ = (pass, pending_cells);
    }

    /// Called each time one translation cell was attempted.
    fn on_cell_translated(&self, filled: bool) {
        let _ = filled;
    }

    /// Called once after translation finished.
    ///
    /// # Arguments
    /// * `total_pages`   — pages attempted
    /// * `success_pages` — pages transcribed without error
    /// * `missing_cells` — translation cells left blank
    fn on_conversion_complete(&self, total_pages: usize, success_pages: usize, missing_cells: usize) {
        let _ = (total_pages, success_pages, missing_cells);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
