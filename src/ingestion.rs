use crate::error::{AnalyticsError, Result};
use crate::utils::format_number;
use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Reader};
use log::debug;
use std::io::Cursor;
use std::path::Path;

/// A single spreadsheet cell, independent of the file format it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Native spreadsheet date, kept as its serial day count.
    DateSerial(f64),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            CellValue::Number(n) | CellValue::DateSerial(n) => Some(format_number(*n)),
            CellValue::Bool(b) => Some(b.to_string()),
        }
    }
}

impl From<&Data> for CellValue {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => CellValue::DateSerial(dt.as_f64()),
            Data::DateTimeIso(s) => CellValue::Text(s.clone()),
            Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(_) => CellValue::Empty,
        }
    }
}

/// Hashable form of a [`CellValue`] that keeps the stored value verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellKey {
    Empty,
    Text(String),
    Number(u64),
    Bool(bool),
    DateSerial(u64),
}

impl From<&CellValue> for CellKey {
    fn from(cell: &CellValue) -> Self {
        match cell {
            CellValue::Empty => CellKey::Empty,
            CellValue::Text(s) => CellKey::Text(s.clone()),
            CellValue::Number(n) => CellKey::Number(n.to_bits()),
            CellValue::Bool(b) => CellKey::Bool(*b),
            CellValue::DateSerial(n) => CellKey::DateSerial(n.to_bits()),
        }
    }
}

/// Header row plus data rows, exactly as read from the source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every cell of `row` across all headers, mapped or not.
    pub fn row_key(&self, row: usize) -> Vec<CellKey> {
        let width = self
            .rows
            .get(row)
            .map_or(0, |r| r.len())
            .max(self.headers.len());
        (0..width).map(|col| CellKey::from(self.cell(row, col))).collect()
    }

    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&CellValue::Empty)
    }

    /// Reads the first sheet of an `.xlsx`, `.xls` or `.ods` file.
    pub fn from_spreadsheet_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AnalyticsError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path.display()),
            )));
        }

        let mut workbook = open_workbook_auto(path)?;
        let sheet = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| AnalyticsError::EmptyWorkbook(path.display().to_string()))?;
        let range = workbook.worksheet_range(&sheet)?;

        debug!("Reading sheet '{}' from {}", sheet, path.display());
        Ok(Self::from_rows(range.rows()))
    }

    /// Reads the first sheet of an uploaded workbook held in memory.
    pub fn from_spreadsheet_bytes(bytes: &[u8]) -> Result<Self> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
        let sheet = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| AnalyticsError::EmptyWorkbook("uploaded workbook".to_string()))?;
        let range = workbook.worksheet_range(&sheet)?;

        debug!("Reading sheet '{}' from uploaded workbook", sheet);
        Ok(Self::from_rows(range.rows()))
    }

    /// Reads CSV text with a header row. Every cell is kept as text.
    pub fn from_csv_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(
                record
                    .iter()
                    .map(|field| {
                        if field.is_empty() {
                            CellValue::Empty
                        } else {
                            CellValue::Text(field.to_string())
                        }
                    })
                    .collect(),
            );
        }

        Ok(Self { headers, rows })
    }

    fn from_rows<'a, I>(mut rows: I) -> Self
    where
        I: Iterator<Item = &'a [Data]>,
    {
        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row
                .iter()
                .map(|cell| CellValue::from(cell).as_text().unwrap_or_default())
                .collect(),
            None => return Self::default(),
        };

        let rows = rows
            .filter(|row| row.iter().any(|cell| !matches!(cell, Data::Empty)))
            .map(|row| row.iter().map(CellValue::from).collect())
            .collect();

        Self { headers, rows }
    }
}
