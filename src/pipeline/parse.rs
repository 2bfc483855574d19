//! Row parser: model markdown table → [`MenuRow`]s.
//!
//! Every line of the transcription response is classified exactly once:
//!
//! ```text
//! line ──▶ not starting with '|'  ─────────────▶ NotARow
//!      ──▶ separator (|---|:--:|)  ─────────────▶ NotARow
//!      ──▶ looks like the label row ────────────▶ HeaderEcho   (absorbed)
//!      ──▶ exactly 5 cells, not all blank ──────▶ Row
//!      ──▶ any other cell count, or all blank ──▶ Malformed    (dropped)
//! ```
//!
//! Malformed rows are never padded or truncated: a row the model garbled is
//! better missing (and counted) than silently shifted into wrong columns.

use crate::pipeline::postprocess::{clean_table_output, normalize_price};
use crate::schema::{MenuRow, DEFAULT_COLUMNS, DEFAULT_COLUMN_COUNT};

/// Classification of one line of model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// A complete data row.
    Row(MenuRow),
    /// A repetition of the column-label row.
    HeaderEcho,
    /// A table line with the wrong number of cells.
    Malformed { cells: usize },
    /// Prose, blank lines, and separator lines.
    NotARow,
}

/// Rows accepted from one response plus what was thrown away.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTable {
    pub rows: Vec<MenuRow>,
    pub header_echoes: usize,
    pub malformed: usize,
}

/// Parser options.
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Run [`normalize_price`] on the price cell.
    pub normalize_prices: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            normalize_prices: true,
        }
    }
}

/// `true` for markdown alignment rows such as `|---|:---:|`.
fn is_separator_row(line: &str) -> bool {
    if line.starts_with("|-") {
        return true;
    }
    line.contains('-') && line.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

fn is_header_cell(cell: &str) -> bool {
    DEFAULT_COLUMNS.iter().any(|h| h.eq_ignore_ascii_case(cell))
}

/// A repeated label row starts with the first column label, or carries at
/// least two labels. A lone label elsewhere is a dish that happens to share
/// the name.
fn is_header_echo(cells: &[&str]) -> bool {
    let leads_with_label = cells
        .first()
        .is_some_and(|c| c.eq_ignore_ascii_case(DEFAULT_COLUMNS[0]));
    leads_with_label || cells.iter().filter(|c| is_header_cell(c)).count() >= 2
}

/// Split a table line into trimmed cells.
///
/// The leading delimiter is always present (checked by the caller); the
/// trailing one is optional, so `| a | b` yields two cells, not one.
fn split_cells(line: &str) -> Vec<&str> {
    let inner = line.strip_prefix('|').unwrap_or(line);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(str::trim).collect()
}

/// Classify a single line.
pub fn parse_line(line: &str, options: ParseOptions) -> ParsedLine {
    let line = line.trim();
    if !line.starts_with('|') || is_separator_row(line) {
        return ParsedLine::NotARow;
    }

    let cells = split_cells(line);
    if is_header_echo(&cells) {
        return ParsedLine::HeaderEcho;
    }

    let Ok(cells) = <[&str; DEFAULT_COLUMN_COUNT]>::try_from(cells.as_slice()) else {
        return ParsedLine::Malformed { cells: cells.len() };
    };
    if cells.iter().all(|c| c.is_empty()) {
        return ParsedLine::Malformed {
            cells: DEFAULT_COLUMN_COUNT,
        };
    }

    let mut cells = cells.map(str::to_string);
    if options.normalize_prices {
        cells[DEFAULT_COLUMN_COUNT - 1] = normalize_price(&cells[DEFAULT_COLUMN_COUNT - 1]);
    }
    ParsedLine::Row(MenuRow::from_default_cells(cells))
}

/// Parse a whole transcription response.
pub fn parse_table(output: &str, options: ParseOptions) -> ParsedTable {
    let cleaned = clean_table_output(output);
    let mut table = ParsedTable::default();

    for line in cleaned.lines() {
        match parse_line(line, options) {
            ParsedLine::Row(row) => table.rows.push(row),
            ParsedLine::HeaderEcho => table.header_echoes += 1,
            ParsedLine::Malformed { .. } => table.malformed += 1,
            ParsedLine::NotARow => {}
        }
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::header_row;

    fn opts() -> ParseOptions {
        ParseOptions::default()
    }

    #[test]
    fn five_cells_make_a_row() {
        let ParsedLine::Row(row) = parse_line("| Starters | | Soup | Tomato soup | 5.50 |", opts()) else {
            panic!("expected a row");
        };
        assert_eq!(row.default.category_title, "Starters");
        assert_eq!(row.default.subcategory_title, "");
        assert_eq!(row.default.item_name, "Soup");
        assert_eq!(row.default.item_description, "Tomato soup");
        assert_eq!(row.item_price, "5.50");
        assert!(row.translations.is_empty());
    }

    #[test]
    fn separator_lines_are_not_rows() {
        assert_eq!(parse_line("|---|---|---|---|---|", opts()), ParsedLine::NotARow);
        assert_eq!(parse_line("| --- | :---: | --- | --- | ---: |", opts()), ParsedLine::NotARow);
    }

    #[test]
    fn header_is_an_echo() {
        assert_eq!(parse_line(&header_row(), opts()), ParsedLine::HeaderEcho);
        assert_eq!(
            parse_line("| categorytitledefault | x | y | z | w |", opts()),
            ParsedLine::HeaderEcho
        );
        assert_eq!(
            parse_line("| CategoryTitleDefault | ItemNameDefault |", opts()),
            ParsedLine::HeaderEcho
        );
        assert_eq!(
            parse_line("| x | SubcategoryTitleDefault | ItemNameDefault | y | z |", opts()),
            ParsedLine::HeaderEcho
        );
    }

    #[test]
    fn single_label_inside_a_row_is_data() {
        let ParsedLine::Row(row) = parse_line("| Drinks | | ItemPrice | House special | 4 |", opts()) else {
            panic!("expected a row");
        };
        assert_eq!(row.default.item_name, "ItemPrice");
        assert_eq!(row.item_price, "4");
    }

    #[test]
    fn wrong_cell_counts_are_dropped() {
        assert_eq!(
            parse_line("| Starters | Soup | 5.50 |", opts()),
            ParsedLine::Malformed { cells: 3 }
        );
        assert_eq!(
            parse_line("| a | b | c | d | e | f |", opts()),
            ParsedLine::Malformed { cells: 6 }
        );
    }

    #[test]
    fn blank_row_is_malformed() {
        assert_eq!(
            parse_line("| | | | | |", opts()),
            ParsedLine::Malformed { cells: 5 }
        );
    }

    #[test]
    fn prose_is_ignored() {
        assert_eq!(parse_line("Here is the table:", opts()), ParsedLine::NotARow);
        assert_eq!(parse_line("", opts()), ParsedLine::NotARow);
    }

    #[test]
    fn missing_trailing_pipe_keeps_last_cell() {
        let ParsedLine::Row(row) = parse_line("| Mains | | Steak | Grilled | 18", opts()) else {
            panic!("expected a row");
        };
        assert_eq!(row.item_price, "18");
    }

    #[test]
    fn price_is_normalised_when_enabled() {
        let line = "| Drinks | | Water | | € 2,00 |";
        let ParsedLine::Row(row) = parse_line(line, opts()) else { panic!() };
        assert_eq!(row.item_price, "2,00");

        let raw = ParseOptions { normalize_prices: false };
        let ParsedLine::Row(row) = parse_line(line, raw) else { panic!() };
        assert_eq!(row.item_price, "€ 2,00");
    }

    #[test]
    fn duplicate_headers_never_become_rows() {
        let header = header_row();
        let output = format!(
            "{header}\n|---|---|---|---|---|\n| Starters | | Soup | Tomato soup | 5.50 |\n{header}\n| Mains | | Fish | | 12 |"
        );
        let parsed = parse_table(&output, opts());
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.header_echoes, 2);
        assert!(parsed
            .rows
            .iter()
            .all(|r| r.default.category_title != "CategoryTitleDefault"));
    }

    #[test]
    fn fenced_output_with_noise_is_parsed() {
        let output = "```markdown\nSure! Here you go:\n| A | B | C | D | 1 |\n| broken | row |\n```";
        let parsed = parse_table(output, opts());
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.malformed, 1);
    }

    #[test]
    fn empty_output_yields_nothing() {
        assert_eq!(parse_table("", opts()), ParsedTable::default());
    }
}
