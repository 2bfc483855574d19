//! Post-processing: deterministic cleanup of raw model text.
//!
//! Even well-prompted models wrap tables in ```` ```markdown ```` fences,
//! emit CRLF line endings, sprinkle zero-width characters, or keep the
//! currency symbol the prompt told them to drop. These passes fix that
//! before the row parser and the translator ever see the text.
//!
//! Rules for table output (in order):
//! 1. Strip outer markdown fences
//! 2. Normalise line endings (CRLF → LF)
//! 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
//!
//! Translations additionally get trimmed and have a single pair of
//! wrapping quotes removed when the source text had none.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean a transcription response before it is split into lines.
pub fn clean_table_output(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    remove_invisible_chars(&s)
}

/// Clean a translation response.
///
/// Returns an empty string when nothing usable is left; callers treat that
/// as an unresolved translation.
pub fn clean_translation(output: &str, source: &str) -> String {
    let s = strip_markdown_fences(output);
    let s = remove_invisible_chars(&s);
    let s = s.trim();
    strip_wrapping_quotes(s, source).trim().to_string()
}

// ── Rule 1: Strip outer markdown fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\r?\n(.*?)\r?\n?```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Translation-only: wrapping quotes ────────────────────────────────────────

fn strip_wrapping_quotes<'a>(s: &'a str, source: &str) -> &'a str {
    for (open, close) in [('"', '"'), ('“', '”'), ('«', '»'), ('\'', '\'')] {
        let source_quoted = source.trim().starts_with(open);
        if !source_quoted && s.chars().count() >= 2 && s.starts_with(open) && s.ends_with(close) {
            return &s[open.len_utf8()..s.len() - close.len_utf8()];
        }
    }
    s
}

// ── Prices ───────────────────────────────────────────────────────────────────

static RE_PRICE_AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d.,]*").unwrap());

/// Strip currency symbols and words around a single transcribed amount.
///
/// `"€ 5,50"` → `"5,50"`, `"$12"` → `"12"`. A value without any digit
/// ("Market price", "—") or with more than one amount (`"12-15"`,
/// `"€5 / €9"`, `"2 for 10"`) is returned trimmed but otherwise untouched
/// so the information is not lost.
pub fn normalize_price(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut amounts = RE_PRICE_AMOUNT.find_iter(trimmed);
    match (amounts.next(), amounts.next()) {
        (Some(amount), None) => amount
            .as_str()
            .trim_end_matches(|c| c == '.' || c == ',')
            .to_string(),
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fences_around_table() {
        let raw = "```markdown\n| a | b |\n| c | d |\n```";
        assert_eq!(clean_table_output(raw), "| a | b |\n| c | d |");
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(clean_table_output("| a |"), "| a |");
    }

    #[test]
    fn normalises_crlf_and_invisible_chars() {
        assert_eq!(clean_table_output("| a\u{200B} |\r\n| b |"), "| a |\n| b |");
    }

    #[test]
    fn translation_is_trimmed_and_unquoted() {
        assert_eq!(clean_translation("  \"Soupe à la tomate\"\n", "Tomato soup"), "Soupe à la tomate");
        assert_eq!(clean_translation("“Suppe”", "Soup"), "Suppe");
    }

    #[test]
    fn translation_keeps_quotes_present_in_source() {
        assert_eq!(clean_translation("\"Chef's pick\"", "\"Chef's pick\""), "\"Chef's pick\"");
    }

    #[test]
    fn blank_translation_stays_blank() {
        assert_eq!(clean_translation("   \n ", "Soup"), "");
    }

    #[test]
    fn price_symbols_removed() {
        assert_eq!(normalize_price("€ 5,50"), "5,50");
        assert_eq!(normalize_price("$12"), "12");
        assert_eq!(normalize_price("9.99€"), "9.99");
        assert_eq!(normalize_price("5.50"), "5.50");
        assert_eq!(normalize_price("EUR 7."), "7");
        assert_eq!(normalize_price("1,234.50 kr"), "1,234.50");
    }

    #[test]
    fn price_ranges_and_multiple_amounts_kept_verbatim() {
        assert_eq!(normalize_price(" 12-15 "), "12-15");
        assert_eq!(normalize_price("€5.50 / €9.00"), "€5.50 / €9.00");
        assert_eq!(normalize_price("glass 6 / bottle 24"), "glass 6 / bottle 24");
        assert_eq!(normalize_price("2 for 10"), "2 for 10");
        assert_eq!(normalize_price("1/2 dozen 6"), "1/2 dozen 6");
    }

    #[test]
    fn price_without_digits_is_kept() {
        assert_eq!(normalize_price(" Market price "), "Market price");
        assert_eq!(normalize_price(""), "");
    }
}
