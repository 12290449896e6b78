//! Tabular upload reader
//!
//! Reads the first worksheet of an `.xlsx`/`.xls` workbook (calamine) or a
//! `.csv` file (csv) into a header row plus ordered data rows.

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("Unsupported file type '{0}' (expected .xlsx, .xls or .csv)")]
    UnsupportedExtension(String),

    #[error("Unreadable spreadsheet: {0}")]
    Unreadable(String),

    #[error("Spreadsheet has no worksheet or header row")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Xlsx,
    Xls,
    Csv,
}

impl SheetFormat {
    /// Detect the format from a file name, case-insensitively
    pub fn from_file_name(file_name: &str) -> Result<Self, SheetError> {
        let ext = Path::new(file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "xlsx" => Ok(SheetFormat::Xlsx),
            "xls" => Ok(SheetFormat::Xls),
            "csv" => Ok(SheetFormat::Csv),
            _ => Err(SheetError::UnsupportedExtension(ext)),
        }
    }
}

/// One data row, cells aligned with the header row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetRow {
    cells: Vec<Option<String>>,
}

impl SheetRow {
    pub fn new(cells: Vec<Option<String>>) -> Self {
        Self { cells }
    }

    /// Trimmed cell text, `None` when absent or blank
    pub fn cell(&self, index: usize) -> Option<&str> {
        self.cells
            .get(index)
            .and_then(|c| c.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn is_blank(&self) -> bool {
        (0..self.cells.len()).all(|i| self.cell(i).is_none())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SheetTable {
    pub headers: Vec<String>,
    pub rows: Vec<SheetRow>,
}

/// Parse an uploaded file. Blank rows are dropped.
/// A file without a non-blank header row is `SheetError::Empty`.
pub fn read_sheet(file_name: &str, bytes: &[u8]) -> Result<SheetTable, SheetError> {
    let table = match SheetFormat::from_file_name(file_name)? {
        SheetFormat::Csv => read_csv(bytes)?,
        SheetFormat::Xlsx | SheetFormat::Xls => read_workbook(bytes)?,
    };
    if table.headers.iter().all(|h| h.is_empty()) {
        return Err(SheetError::Empty);
    }
    Ok(table)
}

fn read_csv(bytes: &[u8]) -> Result<SheetTable, SheetError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| SheetError::Unreadable(e.to_string()))?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
            h.trim().to_string()
        })
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| SheetError::Unreadable(e.to_string()))?;
        let row = SheetRow::new(record.iter().map(|c| Some(c.to_string())).collect());
        if !row.is_blank() {
            rows.push(row);
        }
    }

    Ok(SheetTable { headers, rows })
}

fn read_workbook(bytes: &[u8]) -> Result<SheetTable, SheetError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| SheetError::Unreadable(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SheetError::Empty)?
        .map_err(|e| SheetError::Unreadable(e.to_string()))?;

    let mut iter = range.rows();
    let headers = iter
        .next()
        .ok_or(SheetError::Empty)?
        .iter()
        .map(|c| cell_text(c).unwrap_or_default().trim().to_string())
        .collect();

    let rows = iter
        .map(|cells| SheetRow::new(cells.iter().map(cell_text).collect()))
        .filter(|row| !row.is_blank())
        .collect();

    Ok(SheetTable { headers, rows })
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", *f as i64)),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::Error(_) => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_detection_is_case_insensitive() {
        assert_eq!(SheetFormat::from_file_name("Export.XLSX").unwrap(), SheetFormat::Xlsx);
        assert_eq!(SheetFormat::from_file_name("legacy.xls").unwrap(), SheetFormat::Xls);
        assert_eq!(SheetFormat::from_file_name("a.b.csv").unwrap(), SheetFormat::Csv);
        assert!(matches!(
            SheetFormat::from_file_name("notes.txt"),
            Err(SheetError::UnsupportedExtension(ext)) if ext == "txt"
        ));
        assert!(SheetFormat::from_file_name("no_extension").is_err());
    }

    #[test]
    fn csv_rows_align_with_headers_and_skip_blank_lines() {
        let csv = "\u{feff}Handle, Title ,Variant Price\ntee,Tee,10\n,,\nmug,,5.5\n";
        let table = read_sheet("products.csv", csv.as_bytes()).unwrap();

        assert_eq!(table.headers, vec!["Handle", "Title", "Variant Price"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].cell(1), Some("Tee"));
        assert_eq!(table.rows[1].cell(1), None);
        assert_eq!(table.rows[1].cell(2), Some("5.5"));
        assert_eq!(table.rows[1].cell(9), None);
    }

    #[test]
    fn whole_number_floats_render_without_fraction() {
        assert_eq!(cell_text(&Data::Float(12.0)).as_deref(), Some("12"));
        assert_eq!(cell_text(&Data::Float(19.99)).as_deref(), Some("19.99"));
        assert_eq!(cell_text(&Data::Empty), None);
        assert_eq!(cell_text(&Data::Bool(true)).as_deref(), Some("true"));
    }

    #[test]
    fn xlsx_first_sheet_is_read() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Handle").unwrap();
        sheet.write_string(0, 1, "Variant Price").unwrap();
        sheet.write_string(1, 0, "tee").unwrap();
        sheet.write_number(1, 1, 25.0).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let table = read_sheet("upload.xlsx", &bytes).unwrap();
        assert_eq!(table.headers, vec!["Handle", "Variant Price"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].cell(0), Some("tee"));
        assert_eq!(table.rows[0].cell(1), Some("25"));
    }

    #[test]
    fn garbage_workbook_is_unreadable() {
        let err = read_sheet("broken.xlsx", b"definitely not a zip").unwrap_err();
        assert!(matches!(err, SheetError::Unreadable(_)));
    }

    #[test]
    fn missing_header_row_is_empty() {
        assert!(matches!(read_sheet("empty.csv", b""), Err(SheetError::Empty)));
        assert!(matches!(read_sheet("blank.csv", b" , ,\n"), Err(SheetError::Empty)));

        let mut workbook = rust_xlsxwriter::Workbook::new();
        workbook.add_worksheet();
        let bytes = workbook.save_to_buffer().unwrap();
        assert!(matches!(read_sheet("empty.xlsx", &bytes), Err(SheetError::Empty)));
    }
}
