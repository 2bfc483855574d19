//! Transcriber: one page image → default-language menu rows.
//!
//! The call is a single vision request (system prompt + page image); the
//! response goes through [`crate::pipeline::parse`]. A gateway failure is
//! returned as-is: a page that could not be read must never look like a
//! page that legitimately had no items.

use crate::config::ConversionConfig;
use crate::error::ModelCallError;
use crate::language::MenuLanguage;
use crate::pipeline::gateway::{CompletionRequest, ModelGateway, UserContent};
use crate::pipeline::parse::{parse_table, ParseOptions};
use crate::prompts::{transcription_prompt, TRANSCRIPTION_USER_TEXT};
use crate::schema::MenuRow;
use edgequake_llm::ImageData;
use std::time::Instant;
use tracing::debug;

/// Rows from one page plus parse and usage accounting.
#[derive(Debug, Clone, Default)]
pub struct PageTranscript {
    pub rows: Vec<MenuRow>,
    pub header_echoes: usize,
    pub malformed: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
}

/// Transcribe one encoded page.
///
/// # Errors
/// Propagates the gateway's [`ModelCallError`] untouched; no retry here.
pub async fn transcribe_page(
    gateway: &dyn ModelGateway,
    page_num: usize,
    image: ImageData,
    language: &MenuLanguage,
    config: &ConversionConfig,
) -> Result<PageTranscript, ModelCallError> {
    let start = Instant::now();
    let request = CompletionRequest {
        system_prompt: transcription_prompt(config.transcription_prompt.as_deref(), language.label()),
        content: UserContent::TextWithImage {
            text: TRANSCRIPTION_USER_TEXT.to_string(),
            image,
        },
        deterministic: config.deterministic_transcription,
    };

    let completion = gateway.complete(&request).await?;

    let parsed = parse_table(
        &completion.text,
        ParseOptions {
            normalize_prices: config.normalize_prices,
        },
    );
    debug!(
        "Page {}: {} rows, {} header echoes, {} malformed lines",
        page_num,
        parsed.rows.len(),
        parsed.header_echoes,
        parsed.malformed
    );

    Ok(PageTranscript {
        rows: parsed.rows,
        header_echoes: parsed.header_echoes,
        malformed: parsed.malformed,
        input_tokens: completion.input_tokens,
        output_tokens: completion.output_tokens,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::gateway::Completion;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Canned {
        reply: Result<String, ModelCallError>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl ModelGateway for Canned {
        async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ModelCallError> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply.clone().map(Completion::text)
        }
    }

    fn image() -> ImageData {
        ImageData::new("aGVsbG8=", "image/png")
    }

    #[tokio::test]
    async fn prompt_quotes_menu_language_and_sends_image() {
        let gw = Canned {
            reply: Ok("| Entradas | | Sopa | Sopa de tomate | 5.50 |".into()),
            seen: Mutex::new(Vec::new()),
        };
        let lang = MenuLanguage::from_label("Português Europeu").unwrap();
        let out = transcribe_page(&gw, 1, image(), &lang, &ConversionConfig::default())
            .await
            .unwrap();

        assert_eq!(out.rows.len(), 1);
        let seen = gw.seen.lock().unwrap();
        assert!(seen[0].system_prompt.contains("The menu language is Português Europeu."));
        assert!(seen[0].deterministic);
        assert!(matches!(seen[0].content, UserContent::TextWithImage { .. }));
    }

    #[tokio::test]
    async fn gateway_failure_is_not_an_empty_page() {
        let gw = Canned {
            reply: Err(ModelCallError::Timeout { secs: 1 }),
            seen: Mutex::new(Vec::new()),
        };
        let lang = MenuLanguage::from_label("English").unwrap();
        let err = transcribe_page(&gw, 1, image(), &lang, &ConversionConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err, ModelCallError::Timeout { secs: 1 });
    }

    #[tokio::test]
    async fn empty_menu_page_is_ok_with_zero_rows() {
        let gw = Canned {
            reply: Ok("This page has no menu items.".into()),
            seen: Mutex::new(Vec::new()),
        };
        let lang = MenuLanguage::from_label("English").unwrap();
        let out = transcribe_page(&gw, 1, image(), &lang, &ConversionConfig::default())
            .await
            .unwrap();
        assert!(out.rows.is_empty());
    }
}
