//! Supported menu languages and the selector-label mapping.
//!
//! The set of languages is closed: five codes, each with an English display
//! name used in translation prompts and a handful of human-facing selector
//! labels (the strings an operator picks from a drop-down). Labels map
//! many-to-one onto codes; the table lives here and nowhere else.

use crate::error::MenuError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the five languages a menu can be written in or translated to.
///
/// Declaration order is the column order of the exported spreadsheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SupportedLanguage {
    En,
    Pt,
    Fr,
    De,
    Es,
}

impl SupportedLanguage {
    /// All languages in column order.
    pub const ALL: [SupportedLanguage; 5] = [
        SupportedLanguage::En,
        SupportedLanguage::Pt,
        SupportedLanguage::Fr,
        SupportedLanguage::De,
        SupportedLanguage::Es,
    ];

    /// Two-letter column suffix, e.g. `"Pt"` in `ItemNamePt`.
    pub fn code(self) -> &'static str {
        match self {
            SupportedLanguage::En => "En",
            SupportedLanguage::Pt => "Pt",
            SupportedLanguage::Fr => "Fr",
            SupportedLanguage::De => "De",
            SupportedLanguage::Es => "Es",
        }
    }

    /// English name, as used in translation prompts.
    pub fn name(self) -> &'static str {
        match self {
            SupportedLanguage::En => "English",
            SupportedLanguage::Pt => "Portuguese",
            SupportedLanguage::Fr => "French",
            SupportedLanguage::De => "German",
            SupportedLanguage::Es => "Spanish",
        }
    }

    /// Selector labels accepted for this language (besides code and name).
    pub fn selector_labels(self) -> &'static [&'static str] {
        match self {
            SupportedLanguage::En => &["Inglês Britânico", "British English", "Inglês"],
            SupportedLanguage::Pt => &["Português Europeu", "European Portuguese", "Português"],
            SupportedLanguage::Fr => &["Francês Europeu", "European French", "Francês", "Français"],
            SupportedLanguage::De => &["Alemão (Alemanha)", "German (Germany)", "Alemão", "Deutsch"],
            SupportedLanguage::Es => &["Espanhol Europeu", "European Spanish", "Espanhol", "Español"],
        }
    }

    /// Resolve a selector label, English name, or code (case-insensitive).
    pub fn from_label(label: &str) -> Option<Self> {
        let wanted = label.trim();
        if wanted.is_empty() {
            return None;
        }
        Self::ALL.into_iter().find(|lang| {
            lang.code().eq_ignore_ascii_case(wanted)
                || lang.name().eq_ignore_ascii_case(wanted)
                || lang
                    .selector_labels()
                    .iter()
                    .any(|l| l.to_lowercase() == wanted.to_lowercase())
        })
    }

    /// The four languages other than `self`, in column order.
    pub fn targets(self) -> impl Iterator<Item = SupportedLanguage> {
        Self::ALL.into_iter().filter(move |l| *l != self)
    }

    /// Comma-separated list of English names, for error messages and help.
    pub fn supported_names() -> String {
        Self::ALL
            .iter()
            .map(|l| l.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for SupportedLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SupportedLanguage {
    type Err = MenuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| MenuError::UnsupportedLanguage {
            label: s.to_string(),
            supported: Self::supported_names(),
        })
    }
}

/// The operator's menu-language choice for one run.
///
/// Keeps the label exactly as selected (the transcription prompt quotes it
/// verbatim) next to the resolved code. Construction fails for unmapped
/// labels, so a run can never start without a source language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuLanguage {
    label: String,
    language: SupportedLanguage,
}

impl MenuLanguage {
    /// Resolve a selector label into a menu language.
    ///
    /// # Errors
    /// [`MenuError::UnsupportedLanguage`] when the label maps to no code.
    pub fn from_label(label: impl Into<String>) -> Result<Self, MenuError> {
        let label = label.into();
        let language = label.parse::<SupportedLanguage>()?;
        Ok(Self { label, language })
    }

    /// The label as the operator selected it.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The resolved source language.
    pub fn language(&self) -> SupportedLanguage {
        self.language
    }
}

impl From<SupportedLanguage> for MenuLanguage {
    fn from(language: SupportedLanguage) -> Self {
        Self {
            label: language.name().to_string(),
            language,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portuguese_ui_labels_resolve() {
        assert_eq!(SupportedLanguage::from_label("Inglês Britânico"), Some(SupportedLanguage::En));
        assert_eq!(SupportedLanguage::from_label("Português Europeu"), Some(SupportedLanguage::Pt));
        assert_eq!(SupportedLanguage::from_label("Francês Europeu"), Some(SupportedLanguage::Fr));
        assert_eq!(SupportedLanguage::from_label("Alemão (Alemanha)"), Some(SupportedLanguage::De));
        assert_eq!(SupportedLanguage::from_label("Espanhol Europeu"), Some(SupportedLanguage::Es));
    }

    #[test]
    fn english_labels_names_and_codes_resolve() {
        assert_eq!(SupportedLanguage::from_label("European Portuguese"), Some(SupportedLanguage::Pt));
        assert_eq!(SupportedLanguage::from_label("german"), Some(SupportedLanguage::De));
        assert_eq!(SupportedLanguage::from_label(" es "), Some(SupportedLanguage::Es));
        assert_eq!(SupportedLanguage::from_label("PORTUGUÊS EUROPEU"), Some(SupportedLanguage::Pt));
    }

    #[test]
    fn unknown_label_is_a_configuration_error() {
        assert_eq!(SupportedLanguage::from_label("Klingon"), None);
        assert_eq!(SupportedLanguage::from_label(""), None);
        let err = MenuLanguage::from_label("Klingon").unwrap_err();
        assert!(matches!(err, MenuError::UnsupportedLanguage { .. }));
    }

    #[test]
    fn targets_exclude_source() {
        let targets: Vec<_> = SupportedLanguage::Pt.targets().collect();
        assert_eq!(
            targets,
            vec![
                SupportedLanguage::En,
                SupportedLanguage::Fr,
                SupportedLanguage::De,
                SupportedLanguage::Es
            ]
        );
    }

    #[test]
    fn menu_language_keeps_label_verbatim() {
        let lang = MenuLanguage::from_label("Português Europeu").unwrap();
        assert_eq!(lang.label(), "Português Europeu");
        assert_eq!(lang.language(), SupportedLanguage::Pt);
    }

    #[test]
    fn every_label_round_trips_to_its_language() {
        for lang in SupportedLanguage::ALL {
            for label in lang.selector_labels() {
                assert_eq!(SupportedLanguage::from_label(label), Some(lang), "label {label}");
            }
        }
    }
}
