//! Prompts for the transcription (vision) and translation (text) calls.
//!
//! Every prompt lives here so tests can inspect them without a model and
//! so the parser and the prompt agree on the header row they share.

use crate::language::SupportedLanguage;
use crate::schema::DEFAULT_COLUMNS;

/// Placeholder replaced with the operator's menu-language label.
pub const MENU_LANGUAGE_PLACEHOLDER: &str = "{menu_language}";

/// Default system prompt for transcribing one menu page.
///
/// Used when `ConversionConfig::transcription_prompt` is `None`.
pub const DEFAULT_TRANSCRIPTION_PROMPT: &str = r#"Your goal is to convert the menu image to a structured table with columns:
- CategoryTitleDefault (Column A) - Category Title: The default category title displayed on the menu (text, max 40 characters).
- SubcategoryTitleDefault (Column B) - Subcategory Title (Optional): Subcategory titles displayed on the menu (text, max 40 characters).
- ItemNameDefault (Column C) - Item Name: The default item name displayed on the menu (text, max 40 characters).
- ItemDescriptionDefault (Column D) - Item Description (Optional): The default item description displayed on the menu (text, max 120 characters).
- ItemPrice (Column E) - Item Price: Price of each item (text). Remove currency symbols and only include numbers (example formats: 9.99 or 9.9 or 9 or 9,99 or 9,9).

Leave optional cells empty when the menu has no such value. Repeat the category and subcategory on every item row.

The menu language is {menu_language}.

Output ONLY a Markdown table with this header:
| CategoryTitleDefault | SubcategoryTitleDefault | ItemNameDefault | ItemDescriptionDefault | ItemPrice |"#;

/// User-turn text sent next to the page image.
pub const TRANSCRIPTION_USER_TEXT: &str = "Convert this menu image to the structured table format.";

/// Prefix of the translation user turn; the source text follows on the next line.
pub const TRANSLATION_USER_PREFIX: &str = "Translate this text:\n";

/// Build the transcription system prompt for a menu language label.
///
/// The label is inserted verbatim: the model copes with labels such as
/// "Alemão (Alemanha)" better than we would by normalising them.
pub fn transcription_prompt(template: Option<&str>, menu_language: &str) -> String {
    template
        .unwrap_or(DEFAULT_TRANSCRIPTION_PROMPT)
        .replace(MENU_LANGUAGE_PLACEHOLDER, menu_language)
}

/// The literal header row the transcription prompt asks for.
pub fn header_row() -> String {
    format!("| {} |", DEFAULT_COLUMNS.join(" | "))
}

/// System prompt for translating one field between two languages.
pub fn translation_system_prompt(source: SupportedLanguage, target: SupportedLanguage) -> String {
    format!(
        "You are a translator for a restaurant. Assume the intended meaning is restaurant vocabulary. \
Translate from {} to {}. Return only the translated text. \
Presume the intent of the user and understand if it requires translation or should be kept in its original language \
(dish names, brands and proper nouns are often kept).",
        source.name(),
        target.name()
    )
}

/// User prompt carrying the text to translate.
pub fn translation_user_prompt(text: &str) -> String {
    format!("{TRANSLATION_USER_PREFIX}{text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prompt_contains_header_row() {
        assert!(DEFAULT_TRANSCRIPTION_PROMPT.contains(&header_row()));
    }

    #[test]
    fn menu_language_inserted_verbatim() {
        let p = transcription_prompt(None, "Alemão (Alemanha)");
        assert!(p.contains("The menu language is Alemão (Alemanha)."));
        assert!(!p.contains(MENU_LANGUAGE_PLACEHOLDER));
    }

    #[test]
    fn custom_template_is_honoured() {
        let p = transcription_prompt(Some("Menu in {menu_language}"), "Español");
        assert_eq!(p, "Menu in Español");
    }

    #[test]
    fn translation_prompt_names_both_languages() {
        let p = translation_system_prompt(SupportedLanguage::Pt, SupportedLanguage::De);
        assert!(p.contains("from Portuguese to German"));
        assert_eq!(translation_user_prompt("Sopa"), "Translate this text:\nSopa");
    }
}
