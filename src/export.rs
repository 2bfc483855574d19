//! Spreadsheet export: the 25-column table as an Excel workbook, CSV or JSON.
//!
//! Column order is fixed by [`crate::schema::column_names`]; every row is
//! written with all 25 cells, empty where a value is absent. Workbooks hold a
//! single `Menu` sheet with a bold, frozen header row and text-only cells, so
//! prices such as `9,90` are kept exactly as transcribed.

use crate::error::MenuError;
use crate::output::ConversionOutput;
use crate::schema::{column_names, MenuTable, COLUMN_COUNT};
use rust_xlsxwriter::{Format, Workbook};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File format of the exported table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Header row + one line per item. (default)
    #[default]
    Csv,
    /// Excel workbook (`.xlsx`) with the same header and rows as CSV.
    Xlsx,
    /// The whole [`ConversionOutput`] with page and translation reports.
    Json,
}

/// Name of the single worksheet in exported workbooks.
pub const XLSX_SHEET_NAME: &str = "Menu";

impl OutputFormat {
    /// Pick a format from a file extension; unknown extensions mean CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => OutputFormat::Json,
            Some(ext) if ext.eq_ignore_ascii_case("xlsx") => OutputFormat::Xlsx,
            _ => OutputFormat::Csv,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Xlsx => "xlsx",
            OutputFormat::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = MenuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "xlsx" | "excel" => Ok(OutputFormat::Xlsx),
            "json" => Ok(OutputFormat::Json),
            other => Err(MenuError::InvalidConfig(format!(
                "Unknown output format '{other}' (expected csv, xlsx or json)"
            ))),
        }
    }
}

/// Write `table` as CSV with the header row first.
pub fn write_csv<W: Write>(table: &MenuTable, writer: W) -> Result<(), MenuError> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(column_names())?;
    for row in table.rows() {
        let cells = row.cells();
        debug_assert_eq!(cells.len(), COLUMN_COUNT);
        wtr.write_record(cells)?;
    }
    wtr.flush()
        .map_err(|e| MenuError::Internal(format!("Failed to flush CSV writer: {e}")))?;
    Ok(())
}

/// Render `table` as a CSV string.
pub fn to_csv_string(table: &MenuTable) -> Result<String, MenuError> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf)?;
    String::from_utf8(buf).map_err(|e| MenuError::Internal(format!("CSV is not UTF-8: {e}")))
}

/// Render `table` as an in-memory `.xlsx` workbook.
pub fn to_xlsx_bytes(table: &MenuTable) -> Result<Vec<u8>, MenuError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(XLSX_SHEET_NAME)?;

    for (col, name) in (0u16..).zip(column_names()) {
        sheet.write_string_with_format(0, col, name, &header_format)?;
    }
    for (row_idx, row) in (1u32..).zip(table.rows()) {
        let cells = row.cells();
        debug_assert_eq!(cells.len(), COLUMN_COUNT);
        for (col, value) in (0u16..).zip(cells.iter()) {
            if !value.is_empty() {
                sheet.write_string(row_idx, col, *value)?;
            }
        }
    }
    sheet.set_freeze_panes(1, 0)?;

    Ok(workbook.save_to_buffer()?)
}

/// Render the whole run as pretty JSON.
pub fn to_json_string(output: &ConversionOutput) -> Result<String, MenuError> {
    serde_json::to_string_pretty(output)
        .map_err(|e| MenuError::Internal(format!("Failed to encode JSON: {e}")))
}

/// Serialise `output` in `format`.
pub fn render(output: &ConversionOutput, format: OutputFormat) -> Result<Vec<u8>, MenuError> {
    match format {
        OutputFormat::Csv => to_csv_string(&output.table).map(String::into_bytes),
        OutputFormat::Xlsx => to_xlsx_bytes(&output.table),
        OutputFormat::Json => to_json_string(output).map(String::into_bytes),
    }
}

/// Serialise `output` in `format` and write it to `path` atomically.
pub async fn write_output(
    output: &ConversionOutput,
    path: &Path,
    format: OutputFormat,
) -> Result<(), MenuError> {
    let contents = render(output, format)?;
    write_atomic(path, &contents, format).await
}

/// Write `contents` to `path` atomically (temp file + rename).
pub async fn write_atomic(path: &Path, contents: &[u8], format: OutputFormat) -> Result<(), MenuError> {
    let write_err = |source| MenuError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path: PathBuf = path.with_extension(format!("{}.tmp", format.extension()));
    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}
