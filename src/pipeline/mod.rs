//! Pipeline stages for menu-to-spreadsheet conversion.
//!
//! Each submodule implements exactly one transformation step, so each can
//! be tested on its own and the model-facing stages can run against a stub
//! [`gateway::ModelGateway`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ transcribe ──▶ accumulate ──▶ translate
//! (URL/path) (pdfium/  (base64)   (VLM + parse)  (page order)   (cache +
//!            image)                                              passes)
//! ```
//!
//! 1. [`input`]  — resolve a path or URL to a local file, sniff PDF/PNG/JPEG
//! 2. [`render`] — rasterise pages; runs in `spawn_blocking`
//! 3. [`encode`] — PNG/JPEG-encode and base64-wrap each page
//! 4. [`transcribe`] + [`parse`] — one vision call per page, markdown table → rows
//! 5. [`accumulate`] — bounded-concurrency page loop, rows in page order
//! 6. [`translate`] + [`cache`] — fill target-language cells in passes
//!
//! [`gateway`] is the only module with model I/O; [`postprocess`] holds
//! the text cleanup both model-facing stages share.

pub mod accumulate;
pub mod cache;
pub mod encode;
pub mod gateway;
pub mod input;
pub mod parse;
pub mod postprocess;
pub mod render;
pub mod transcribe;
pub mod translate;
