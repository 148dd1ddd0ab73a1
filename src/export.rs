use crate::clients::{ClientAggregation, ClientSummary};
use crate::duplicates::DuplicateReport;
use crate::error::{AnalyticsError, Result};
use crate::forecast::GrowthOutcome;
use crate::metrics::SalesMetrics;
use crate::schema::{Field, ReportLabels};
use crate::utils::format_number;
use chrono::NaiveDateTime;
use log::{debug, info};
use rust_xlsxwriter::{Color, Format, Workbook};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Excel refuses longer sheet names.
pub const MAX_SHEET_NAME_LEN: usize = 31;

pub const DUPLICATES_TITLE: &str = "Reporte de Almuerzos Duplicados";
pub const CLIENTS_TITLE: &str = "Reporte de Ventas por Cliente - ASEAVNA";
pub const UNUSUAL_TITLE: &str = "Clientes con Compras Inusuales";
pub const GROWTH_TITLE: &str = "Crecimiento Mensual por Producto";
pub const SUMMARY_TITLE: &str = "Resumen de Ventas - ASEAVNA";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReportCell {
    Text(String),
    Number(f64),
    Integer(i64),
}

impl ReportCell {
    pub fn text(value: &str) -> Self {
        ReportCell::Text(value.to_string())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ReportCell::Number(n) => Some(*n),
            ReportCell::Integer(i) => Some(*i as f64),
            ReportCell::Text(_) => None,
        }
    }

    pub fn kind(&self) -> CellKind {
        match self {
            ReportCell::Text(_) => CellKind::Text,
            ReportCell::Number(_) => CellKind::Number,
            ReportCell::Integer(_) => CellKind::Integer,
        }
    }

    /// Reads a rendered cell back as `kind`. Text is kept verbatim.
    pub fn parse(raw: &str, kind: CellKind) -> Result<Self> {
        let invalid = || AnalyticsError::ReportParse(format!("'{}' is not a valid {:?}", raw, kind));
        match kind {
            CellKind::Text => Ok(ReportCell::Text(raw.to_string())),
            CellKind::Integer => raw
                .trim()
                .parse::<i64>()
                .map(ReportCell::Integer)
                .map_err(|_| invalid()),
            CellKind::Number => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(ReportCell::Number)
                .ok_or_else(invalid),
        }
    }
}

/// Declared type of a report column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    Text,
    Number,
    Integer,
}

impl fmt::Display for ReportCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportCell::Text(s) => write!(f, "{}", s),
            ReportCell::Number(n) => write!(f, "{}", format_number(*n)),
            ReportCell::Integer(i) => write!(f, "{}", i),
        }
    }
}

/// A titled grid of cells, the common shape behind every export format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTable {
    pub title: String,
    pub columns: Vec<String>,
    /// One per column; CSV parsing follows these instead of guessing.
    pub kinds: Vec<CellKind>,
    pub rows: Vec<Vec<ReportCell>>,
}

impl ReportTable {
    pub fn new(title: &str, columns: Vec<(String, CellKind)>) -> Self {
        let (columns, kinds) = columns.into_iter().unzip();
        Self {
            title: title.to_string(),
            columns,
            kinds,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<ReportCell>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == header)
    }

    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|cell| cell.to_string()))?;
        }
        writer
            .into_inner()
            .map_err(|e| AnalyticsError::IoError(e.into_error()))
    }

    /// Parses CSV written by [`Self::to_csv`], typing each column by `kinds`.
    pub fn from_csv<R: std::io::Read>(title: &str, kinds: &[CellKind], reader: R) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        if headers.len() != kinds.len() {
            return Err(AnalyticsError::ReportParse(format!(
                "expected {} columns, found {}",
                kinds.len(),
                headers.len()
            )));
        }

        let mut table = ReportTable::new(title, headers.into_iter().zip(kinds.iter().copied()).collect());
        for record in reader.records() {
            let record = record?;
            let row = record
                .iter()
                .zip(kinds)
                .map(|(raw, kind)| ReportCell::parse(raw, *kind))
                .collect::<Result<Vec<_>>>()?;
            table.push_row(row);
        }
        Ok(table)
    }

    /// Single-sheet workbook named after `sheet_name`.
    pub fn to_xlsx(&self, sheet_name: &str) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let header_format = Format::new()
            .set_bold()
            .set_background_color(Color::RGB(0xD3D3D3));

        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet_name_for(sheet_name))?;

        for (col, header) in self.columns.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, header, &header_format)?;
        }
        for (idx, row) in self.rows.iter().enumerate() {
            let r = (idx + 1) as u32;
            for (col, cell) in row.iter().enumerate() {
                let c = col as u16;
                match cell {
                    ReportCell::Text(s) => worksheet.write_string(r, c, s)?,
                    ReportCell::Number(n) => worksheet.write_number(r, c, *n)?,
                    ReportCell::Integer(i) => worksheet.write_number(r, c, *i as f64)?,
                };
            }
        }
        worksheet.autofit();

        Ok(workbook.save_to_buffer()?)
    }

    #[cfg(feature = "pdf")]
    pub fn to_pdf(&self, logo: Option<&Path>) -> Result<Vec<u8>> {
        crate::pdf::render_table(self, logo)
    }
}

fn sheet_name_for(name: &str) -> String {
    let trimmed = name.trim();
    let base = if trimmed.is_empty() { "Sheet1" } else { trimmed };
    // Characters Excel forbids in sheet names.
    let cleaned: String = base
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            other => other,
        })
        .collect();
    cleaned.chars().take(MAX_SHEET_NAME_LEN).collect()
}

fn money(value: f64) -> ReportCell {
    ReportCell::Number((value * 100.0).round() / 100.0)
}

fn summary_row(s: &ClientSummary) -> Vec<ReportCell> {
    vec![
        ReportCell::text(&s.client),
        money(s.total_sales),
        ReportCell::Integer(s.orders as i64),
        money(s.commission),
        money(s.receivable_aseavna),
        money(s.receivable_avna),
        ReportCell::text(&s.top_product),
    ]
}

pub fn client_summary_table(clients: &ClientAggregation, labels: &ReportLabels) -> ReportTable {
    let mut table = ReportTable::new(
        CLIENTS_TITLE,
        vec![
            (labels.client.clone(), CellKind::Text),
            (labels.total_sales.clone(), CellKind::Number),
            (labels.orders.clone(), CellKind::Integer),
            (labels.commission.clone(), CellKind::Number),
            (labels.receivable_aseavna.clone(), CellKind::Number),
            (labels.receivable_avna.clone(), CellKind::Number),
            (labels.top_product.clone(), CellKind::Text),
        ],
    );
    for summary in &clients.summaries {
        table.push_row(summary_row(summary));
    }
    table
}

pub fn unusual_clients_table(clients: &ClientAggregation, labels: &ReportLabels) -> ReportTable {
    let mut table = ReportTable::new(
        UNUSUAL_TITLE,
        vec![
            (labels.client.clone(), CellKind::Text),
            (labels.total_sales.clone(), CellKind::Number),
        ],
    );
    for summary in &clients.unusual {
        table.push_row(vec![
            ReportCell::text(&summary.client),
            money(summary.total_sales),
        ]);
    }
    table
}

pub fn duplicate_groups_table(report: &DuplicateReport, labels: &ReportLabels) -> ReportTable {
    let mut table = ReportTable::new(
        DUPLICATES_TITLE,
        vec![
            (labels.client.clone(), CellKind::Text),
            (labels.day.clone(), CellKind::Text),
            (labels.count.clone(), CellKind::Integer),
        ],
    );
    for group in &report.groups {
        table.push_row(vec![
            ReportCell::text(&group.client),
            ReportCell::Text(group.day.format("%Y-%m-%d").to_string()),
            ReportCell::Integer(group.count as i64),
        ]);
    }
    table
}

/// The flagged lines themselves, for the detail export.
pub fn duplicate_rows_table(
    report: &DuplicateReport,
    total_label: &str,
    date_format: &str,
) -> ReportTable {
    let mut table = ReportTable::new(
        DUPLICATES_TITLE,
        vec![
            (Field::ClientName.logical_name().to_string(), CellKind::Text),
            (Field::Date.logical_name().to_string(), CellKind::Text),
            (Field::Receipt.logical_name().to_string(), CellKind::Text),
            (Field::Product.logical_name().to_string(), CellKind::Text),
            (total_label.to_string(), CellKind::Number),
        ],
    );
    for line in &report.rows {
        let date = line
            .date
            .map(|d| d.format(date_format).to_string())
            .unwrap_or_default();
        table.push_row(vec![
            ReportCell::text(&line.client),
            ReportCell::Text(date),
            ReportCell::text(&line.receipt),
            ReportCell::text(&line.product),
            money(line.total),
        ]);
    }
    table
}

pub fn growth_table(growth: &GrowthOutcome, top_n: usize, labels: &ReportLabels) -> ReportTable {
    let mut table = ReportTable::new(
        GROWTH_TITLE,
        vec![
            (labels.product.clone(), CellKind::Text),
            (labels.growth.clone(), CellKind::Number),
        ],
    );
    for item in growth.top_growth(top_n) {
        table.push_row(vec![
            ReportCell::Text(item.product),
            ReportCell::Number((item.growth_pct * 100.0).round() / 100.0),
        ]);
    }
    table
}

/// Headline figures as a single summary row.
pub fn metrics_table(metrics: &SalesMetrics, labels: &ReportLabels) -> ReportTable {
    let product = |p: &Option<String>| {
        ReportCell::Text(p.clone().unwrap_or_else(|| labels.not_available.clone()))
    };
    let cells = vec![
        (&labels.total_sales, money(metrics.total_sales)),
        (&labels.orders, ReportCell::Integer(metrics.orders as i64)),
        (&labels.average_order_value, money(metrics.average_order_value)),
        (&labels.commission, money(metrics.commission)),
        (&labels.receivable_aseavna, money(metrics.receivable_aseavna)),
        (&labels.receivable_avna, money(metrics.receivable_avna)),
        (
            &labels.unique_clients,
            ReportCell::Integer(metrics.unique_clients as i64),
        ),
        (&labels.most_sold, product(&metrics.most_sold)),
        (&labels.least_sold, product(&metrics.least_sold)),
    ];

    let mut table = ReportTable::new(
        SUMMARY_TITLE,
        cells
            .iter()
            .map(|(label, cell)| ((*label).clone(), cell.kind()))
            .collect(),
    );
    table.push_row(cells.into_iter().map(|(_, cell)| cell).collect());
    table
}

/// Writes `<stem>_<YYYYmmdd_HHMMSS>` as CSV and XLSX (and PDF with the `pdf`
/// feature) into `dir`, creating it when needed.
pub fn write_bundle(
    dir: &Path,
    stem: &str,
    table: &ReportTable,
    now: NaiveDateTime,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let base = format!("{}_{}", stem, now.format("%Y%m%d_%H%M%S"));
    let mut written = Vec::new();

    let csv_path = dir.join(format!("{}.csv", base));
    std::fs::write(&csv_path, table.to_csv()?)?;
    written.push(csv_path);

    let xlsx_path = dir.join(format!("{}.xlsx", base));
    std::fs::write(&xlsx_path, table.to_xlsx(&table.title)?)?;
    written.push(xlsx_path);

    #[cfg(feature = "pdf")]
    {
        let pdf_path = dir.join(format!("{}.pdf", base));
        std::fs::write(&pdf_path, table.to_pdf(None)?)?;
        written.push(pdf_path);
    }

    for path in &written {
        debug!("Wrote {}", path.display());
    }
    info!("Exported '{}' to {} files in {}", table.title, written.len(), dir.display());

    Ok(written)
}
