//! Row accumulator: transcribe every page and concatenate rows in page order.
//!
//! Pages run concurrently (at most `config.concurrency` requests in
//! flight) and finish in any order; results are sorted by page number
//! before their rows are appended, so the table order is always the upload
//! order regardless of scheduling.

use crate::config::ConversionConfig;
use crate::error::PageError;
use crate::language::MenuLanguage;
use crate::output::PageResult;
use crate::pipeline::encode::encode_page;
use crate::pipeline::gateway::ModelGateway;
use crate::pipeline::render::MenuPage;
use crate::pipeline::transcribe::transcribe_page;
use crate::schema::{MenuRow, MenuTable};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

/// Transcribed rows plus the per-page outcome.
#[derive(Debug, Clone, Default)]
pub struct Accumulated {
    pub table: MenuTable,
    /// One entry per input page, sorted by page number.
    pub pages: Vec<PageResult>,
}

/// Transcribe `pages` and concatenate their rows.
///
/// Never fails as a whole: a page whose encoding or model call fails
/// contributes no rows and carries its [`PageError`].
pub async fn accumulate(
    gateway: &dyn ModelGateway,
    pages: Vec<MenuPage>,
    language: &MenuLanguage,
    config: &ConversionConfig,
) -> Accumulated {
    let total_pages = pages.len();

    let mut outcomes: Vec<(PageResult, Vec<MenuRow>)> = stream::iter(pages.into_iter().map(|page| async move {
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(page.page_num, total_pages);
        }
        let outcome = process_page(gateway, page, language, config).await;
        if let Some(ref cb) = config.progress_callback {
            match &outcome.0.error {
                None => cb.on_page_complete(outcome.0.page_num, total_pages, outcome.0.rows),
                Some(e) => cb.on_page_error(outcome.0.page_num, total_pages, &e.to_string()),
            }
        }
        outcome
    }))
    .buffer_unordered(config.concurrency.max(1))
    .collect()
    .await;

    outcomes.sort_by_key(|(result, _)| result.page_num);

    let mut acc = Accumulated::default();
    for (result, rows) in outcomes {
        acc.table.extend(rows);
        acc.pages.push(result);
    }

    info!(
        "Transcribed {}/{} pages, {} rows",
        acc.pages.iter().filter(|p| p.is_ok()).count(),
        total_pages,
        acc.table.len()
    );
    acc
}

async fn process_page(
    gateway: &dyn ModelGateway,
    page: MenuPage,
    language: &MenuLanguage,
    config: &ConversionConfig,
) -> (PageResult, Vec<MenuRow>) {
    let MenuPage {
        page_num,
        source,
        image,
    } = page;

    let image = match encode_page(&image, config.image_encoding) {
        Ok(data) => data,
        Err(e) => {
            warn!("Page {}: encoding failed: {}", page_num, e);
            let error = PageError::EncodeFailed {
                page: page_num,
                detail: e.to_string(),
            };
            return (PageResult::failed(page_num, source, error), Vec::new());
        }
    };

    match transcribe_page(gateway, page_num, image, language, config).await {
        Ok(transcript) => {
            let result = PageResult {
                page_num,
                source,
                rows: transcript.rows.len(),
                header_echoes: transcript.header_echoes,
                malformed_rows: transcript.malformed,
                input_tokens: transcript.input_tokens,
                output_tokens: transcript.output_tokens,
                duration_ms: transcript.duration_ms,
                error: None,
            };
            (result, transcript.rows)
        }
        Err(e) => {
            warn!("Page {}: transcription failed: {}", page_num, e);
            let error = PageError::ModelCallFailed {
                page: page_num,
                source: e,
            };
            (PageResult::failed(page_num, source, error), Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelCallError;
    use crate::pipeline::gateway::{Completion, CompletionRequest};
    use async_trait::async_trait;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Page `n` answers with one row named `Item n`, later calls answer
    /// faster; call number `fail_on` fails.
    struct PagedGateway {
        calls: AtomicUsize,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl ModelGateway for PagedGateway {
        async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, ModelCallError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(30u64.saturating_sub(n as u64 * 10))).await;
            if Some(n) == self.fail_on {
                return Err(ModelCallError::Failed {
                    attempts: 4,
                    detail: "HTTP 503".into(),
                });
            }
            Ok(Completion::text(format!("| Menu | | Item {n} | | {n} |")))
        }
    }

    fn pages(n: usize) -> Vec<MenuPage> {
        (1..=n)
            .map(|page_num| MenuPage {
                page_num,
                source: "menu.pdf".into(),
                image: DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]))),
            })
            .collect()
    }

    fn language() -> MenuLanguage {
        MenuLanguage::from_label("English").unwrap()
    }

    #[tokio::test]
    async fn rows_follow_page_order() {
        let gw = PagedGateway {
            calls: AtomicUsize::new(0),
            fail_on: None,
        };
        let config = ConversionConfig::builder().concurrency(3).build().unwrap();

        let acc = accumulate(&gw, pages(3), &language(), &config).await;

        assert_eq!(acc.pages.iter().map(|p| p.page_num).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(acc.table.len(), 3);
        assert!(acc.pages.iter().all(|p| p.rows == 1));
    }

    #[tokio::test]
    async fn failed_page_is_reported_and_others_survive() {
        let gw = PagedGateway {
            calls: AtomicUsize::new(0),
            fail_on: Some(2),
        };
        let config = ConversionConfig::builder().concurrency(1).build().unwrap();

        let acc = accumulate(&gw, pages(3), &language(), &config).await;

        assert_eq!(acc.table.len(), 2);
        let names: Vec<_> = acc.table.rows().iter().map(|r| r.default.item_name.as_str()).collect();
        assert_eq!(names, vec!["Item 1", "Item 3"]);
        assert!(matches!(
            acc.pages[1].error,
            Some(PageError::ModelCallFailed { page: 2, .. })
        ));
        assert!(acc.pages[0].is_ok() && acc.pages[2].is_ok());
    }

    #[tokio::test]
    async fn no_pages_no_rows() {
        let gw = PagedGateway {
            calls: AtomicUsize::new(0),
            fail_on: None,
        };
        let acc = accumulate(&gw, Vec::new(), &language(), &ConversionConfig::default()).await;
        assert!(acc.table.is_empty());
        assert!(acc.pages.is_empty());
    }
}
