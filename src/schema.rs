//! The fixed menu schema: rows, field kinds, and the 25-column layout.
//!
//! ```text
//! CategoryTitleDefault │ SubcategoryTitleDefault │ ItemNameDefault │ ItemDescriptionDefault │ ItemPrice
//! CategoryTitleEn │ SubcategoryTitleEn │ ItemNameEn │ ItemDescriptionEn
//! … Pt, Fr, De, Es
//! ```
//!
//! A [`MenuRow`] starts life with only its default columns (filled by the
//! transcriber). [`MenuTable::normalize_schema`] then gives every row the
//! full language surface, and the translator fills target cells in place.

use crate::language::SupportedLanguage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of cells in one transcribed table row.
pub const DEFAULT_COLUMN_COUNT: usize = 5;

/// Header labels of the transcribed (default-language) table, in order.
pub const DEFAULT_COLUMNS: [&str; DEFAULT_COLUMN_COUNT] = [
    "CategoryTitleDefault",
    "SubcategoryTitleDefault",
    "ItemNameDefault",
    "ItemDescriptionDefault",
    "ItemPrice",
];

/// Total number of logical columns in the exported spreadsheet.
pub const COLUMN_COUNT: usize = DEFAULT_COLUMN_COUNT + FieldKind::ALL.len() * SupportedLanguage::ALL.len();

/// A translatable text field. The price is deliberately not a field kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldKind {
    CategoryTitle,
    SubcategoryTitle,
    ItemName,
    ItemDescription,
}

impl FieldKind {
    pub const ALL: [FieldKind; 4] = [
        FieldKind::CategoryTitle,
        FieldKind::SubcategoryTitle,
        FieldKind::ItemName,
        FieldKind::ItemDescription,
    ];

    /// Column-name stem, e.g. `ItemName` in `ItemNameFr`.
    pub fn stem(self) -> &'static str {
        match self {
            FieldKind::CategoryTitle => "CategoryTitle",
            FieldKind::SubcategoryTitle => "SubcategoryTitle",
            FieldKind::ItemName => "ItemName",
            FieldKind::ItemDescription => "ItemDescription",
        }
    }

    /// Column name for this field in a given language.
    pub fn column(self, language: SupportedLanguage) -> String {
        format!("{}{}", self.stem(), language.code())
    }
}

/// The four translatable fields for one language variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedFields {
    pub category_title: String,
    pub subcategory_title: String,
    pub item_name: String,
    pub item_description: String,
}

impl LocalizedFields {
    pub fn get(&self, field: FieldKind) -> &str {
        match field {
            FieldKind::CategoryTitle => &self.category_title,
            FieldKind::SubcategoryTitle => &self.subcategory_title,
            FieldKind::ItemName => &self.item_name,
            FieldKind::ItemDescription => &self.item_description,
        }
    }

    pub fn get_mut(&mut self, field: FieldKind) -> &mut String {
        match field {
            FieldKind::CategoryTitle => &mut self.category_title,
            FieldKind::SubcategoryTitle => &mut self.subcategory_title,
            FieldKind::ItemName => &mut self.item_name,
            FieldKind::ItemDescription => &mut self.item_description,
        }
    }
}

/// One structured menu entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuRow {
    /// As-transcribed text in the menu's own language.
    pub default: LocalizedFields,
    /// Numeric-as-text price; never translated.
    pub item_price: String,
    /// Per-language variants. Complete after [`MenuTable::normalize_schema`].
    #[serde(default)]
    pub translations: BTreeMap<SupportedLanguage, LocalizedFields>,
}

impl MenuRow {
    /// Build a row from the five transcribed cells, in schema order.
    pub fn from_default_cells(cells: [String; DEFAULT_COLUMN_COUNT]) -> Self {
        let [category_title, subcategory_title, item_name, item_description, item_price] = cells;
        Self {
            default: LocalizedFields {
                category_title,
                subcategory_title,
                item_name,
                item_description,
            },
            item_price,
            translations: BTreeMap::new(),
        }
    }

    /// Value of a target-language cell; empty when the variant is absent.
    pub fn translation(&self, language: SupportedLanguage, field: FieldKind) -> &str {
        self.translations
            .get(&language)
            .map(|fields| fields.get(field))
            .unwrap_or("")
    }

    /// Write a target-language cell unless it already holds text.
    ///
    /// Returns `true` when the value was written.
    pub fn fill_translation(
        &mut self,
        language: SupportedLanguage,
        field: FieldKind,
        value: impl Into<String>,
    ) -> bool {
        let cell = self.translations.entry(language).or_default().get_mut(field);
        if !cell.trim().is_empty() {
            return false;
        }
        *cell = value.into();
        true
    }

    /// `true` when the default text for `field` is absent or whitespace-only.
    pub fn is_blank(&self, field: FieldKind) -> bool {
        self.default.get(field).trim().is_empty()
    }

    /// All 25 cells in export order.
    pub fn cells(&self) -> Vec<&str> {
        let mut cells = Vec::with_capacity(COLUMN_COUNT);
        cells.extend(FieldKind::ALL.iter().map(|f| self.default.get(*f)));
        cells.push(self.item_price.as_str());
        for language in SupportedLanguage::ALL {
            cells.extend(FieldKind::ALL.iter().map(|f| self.translation(language, *f)));
        }
        cells
    }
}

/// Header labels of the exported spreadsheet, in order.
pub fn column_names() -> Vec<String> {
    let mut names: Vec<String> = DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect();
    for language in SupportedLanguage::ALL {
        names.extend(FieldKind::ALL.iter().map(|f| f.column(language)));
    }
    names
}

/// Ordered rows of one conversion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuTable {
    rows: Vec<MenuRow>,
}

impl MenuTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: MenuRow) {
        self.rows.push(row);
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = MenuRow>) {
        self.rows.extend(rows);
    }

    pub fn rows(&self) -> &[MenuRow] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [MenuRow] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Give every row the full language surface, empty where absent.
    ///
    /// Existing cells are left untouched, so calling this on a partially
    /// translated table is harmless.
    pub fn normalize_schema(&mut self) {
        for row in &mut self.rows {
            for language in SupportedLanguage::ALL {
                row.translations.entry(language).or_default();
            }
        }
    }

    /// Count of (row, field, target) cells that should hold a translation
    /// but are still empty.
    pub fn missing_translations(&self, source: SupportedLanguage) -> usize {
        self.rows
            .iter()
            .map(|row| {
                FieldKind::ALL
                    .iter()
                    .filter(|f| !row.is_blank(**f))
                    .map(|f| {
                        source
                            .targets()
                            .filter(|l| row.translation(*l, *f).trim().is_empty())
                            .count()
                    })
                    .sum::<usize>()
            })
            .sum()
    }
}

impl From<Vec<MenuRow>> for MenuTable {
    fn from(rows: Vec<MenuRow>) -> Self {
        Self { rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soup() -> MenuRow {
        MenuRow::from_default_cells([
            "Starters".into(),
            String::new(),
            "Soup".into(),
            "Tomato soup".into(),
            "5.50".into(),
        ])
    }

    #[test]
    fn column_layout_is_fixed() {
        let names = column_names();
        assert_eq!(names.len(), COLUMN_COUNT);
        assert_eq!(COLUMN_COUNT, 25);
        assert_eq!(&names[..5], &DEFAULT_COLUMNS);
        assert_eq!(names[5], "CategoryTitleEn");
        assert_eq!(names[8], "ItemDescriptionEn");
        assert_eq!(names[9], "CategoryTitlePt");
        assert_eq!(names[24], "ItemDescriptionEs");
    }

    #[test]
    fn normalize_adds_every_language_empty() {
        let mut table = MenuTable::from(vec![soup()]);
        table.normalize_schema();
        let row = &table.rows()[0];
        assert_eq!(row.translations.len(), SupportedLanguage::ALL.len());
        assert!(row.translations.values().all(|f| *f == LocalizedFields::default()));
        assert_eq!(row.cells().len(), COLUMN_COUNT);
    }

    #[test]
    fn normalize_keeps_existing_cells() {
        let mut row = soup();
        row.fill_translation(SupportedLanguage::En, FieldKind::ItemName, "Soup");
        let mut table = MenuTable::from(vec![row]);
        table.normalize_schema();
        assert_eq!(table.rows()[0].translation(SupportedLanguage::En, FieldKind::ItemName), "Soup");
    }

    #[test]
    fn fill_translation_never_overwrites() {
        let mut row = soup();
        assert!(row.fill_translation(SupportedLanguage::Fr, FieldKind::ItemName, "Soupe"));
        assert!(!row.fill_translation(SupportedLanguage::Fr, FieldKind::ItemName, "Potage"));
        assert_eq!(row.translation(SupportedLanguage::Fr, FieldKind::ItemName), "Soupe");
    }

    #[test]
    fn whitespace_cell_counts_as_empty() {
        let mut row = soup();
        row.fill_translation(SupportedLanguage::De, FieldKind::ItemName, "   ");
        assert!(row.fill_translation(SupportedLanguage::De, FieldKind::ItemName, "Suppe"));
    }

    #[test]
    fn missing_translations_ignores_blank_defaults() {
        let mut table = MenuTable::from(vec![soup()]);
        table.normalize_schema();
        // three non-blank fields × four targets
        assert_eq!(table.missing_translations(SupportedLanguage::En), 12);
    }
}
