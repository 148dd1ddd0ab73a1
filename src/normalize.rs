use crate::ingestion::{CellValue, RawTable};
use crate::mapping::MappedTable;
use crate::schema::{Field, PipelineConfig};
use crate::utils::{excel_serial_to_datetime, parse_date_text, weekday_label};
use crate::OrderLine;
use chrono::NaiveDateTime;
use log::{debug, warn};
use std::collections::HashSet;

/// Counts produced while coercing a mapped table into order lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizationStats {
    pub invalid_dates: usize,
    pub duplicate_rows_removed: usize,
    pub serial_dates: bool,
}

pub struct TypeNormalizer<'c> {
    config: &'c PipelineConfig,
}

impl<'c> TypeNormalizer<'c> {
    pub fn new(config: &'c PipelineConfig) -> Self {
        Self { config }
    }

    /// Drops rows identical to an earlier one in every source column, then
    /// coerces the rest into [`OrderLine`]s with no missing values except the
    /// date.
    ///
    /// The returned lines carry a zero total; see [`crate::derived`].
    pub fn normalize(&self, table: &MappedTable<'_>) -> (Vec<OrderLine>, NormalizationStats) {
        let serial_dates = is_serial_column(table.column(Field::Date));
        let mut stats = NormalizationStats {
            serial_dates,
            ..Default::default()
        };
        debug!(
            "Date column stored as {}",
            if serial_dates { "Excel serials" } else { "text" }
        );

        let keep = first_occurrences(table.raw());
        stats.duplicate_rows_removed = keep.iter().filter(|k| !**k).count();
        if stats.duplicate_rows_removed > 0 {
            warn!("Removed {} exact duplicate rows", stats.duplicate_rows_removed);
        }

        let mut lines = Vec::with_capacity(table.len());
        for row in (0..table.len()).filter(|&row| keep[row]) {
            let date = self.parse_date(table.cell(row, Field::Date), serial_dates);
            if date.is_none() {
                stats.invalid_dates += 1;
            }

            lines.push(OrderLine {
                client_barcode: self.text(table, row, Field::ClientBarcode),
                client: self.text(table, row, Field::ClientName),
                client_group: self.text(table, row, Field::ClientGroup),
                cost_center: self.text(table, row, Field::CostCenter),
                date,
                receipt: self.text(table, row, Field::Receipt),
                product: self.text(table, row, Field::Product),
                quantity: number(table.cell(row, Field::Quantity)),
                collaborator_price: number(table.cell(row, Field::CollaboratorPrice)),
                commission: number(table.cell(row, Field::Commission)),
                receivable_aseavna: number(table.cell(row, Field::ReceivableAseavna)),
                receivable_avna: number(table.cell(row, Field::ReceivableAvna)),
                total: 0.0,
                weekday: date.map(|dt| weekday_label(dt.date(), &self.config.weekday_labels)),
            });
        }

        if stats.invalid_dates > 0 {
            warn!(
                "{} rows have an unparsable date and are excluded from date-based analyses",
                stats.invalid_dates
            );
        }

        (lines, stats)
    }

    fn text(&self, table: &MappedTable<'_>, row: usize, field: Field) -> String {
        table
            .cell(row, field)
            .as_text()
            .unwrap_or_else(|| self.config.unknown_label.clone())
    }

    fn parse_date(&self, cell: &CellValue, serial_column: bool) -> Option<NaiveDateTime> {
        let correction = self.config.excel_correction_days;
        match cell {
            CellValue::Empty | CellValue::Bool(_) => None,
            CellValue::DateSerial(serial) => excel_serial_to_datetime(*serial, 0),
            CellValue::Number(serial) => excel_serial_to_datetime(*serial, correction),
            CellValue::Text(text) => {
                if serial_column {
                    cell.as_number()
                        .and_then(|serial| excel_serial_to_datetime(serial, correction))
                } else {
                    parse_date_text(text, &self.config.date_format)
                }
            }
        }
    }
}

/// A date column is a serial column when every non-empty value is numeric.
fn is_serial_column<'a, I>(cells: I) -> bool
where
    I: Iterator<Item = &'a CellValue>,
{
    let mut seen_value = false;
    for cell in cells {
        if cell.is_empty() {
            continue;
        }
        match cell {
            CellValue::Number(_) => {}
            CellValue::Text(_) if cell.as_number().is_some() => {}
            _ => return false,
        }
        seen_value = true;
    }
    seen_value
}

fn number(cell: &CellValue) -> f64 {
    cell.as_number().unwrap_or(0.0)
}

/// `true` for rows whose raw cells, unmapped columns included, have not
/// appeared in an earlier row.
fn first_occurrences(raw: &RawTable) -> Vec<bool> {
    let mut seen = HashSet::with_capacity(raw.len());
    (0..raw.len()).map(|row| seen.insert(raw.row_key(row))).collect()
}
