//! # POS Sales Analytics
//!
//! A library for turning point-of-sale order exports (spreadsheets or CSV)
//! into clean order lines and the figures a sales dashboard shows.
//!
//! ## Core Concepts
//!
//! - **Column mapping**: logical columns are matched to spreadsheet headers
//!   case-insensitively; missing columns get defaults, missing *required*
//!   columns abort the load
//! - **Normalization**: Excel serial and textual dates, numeric coercion,
//!   exact duplicate removal, localized weekday labels
//! - **Derived total**: a single "Total" per line, either one revenue column or
//!   a sum of receivables, chosen by configuration
//! - **Analysis**: filtered views, same-day duplicate lunches, per-client
//!   summaries, a linear 7-day forecast and month-over-month product growth
//! - **Reports**: CSV, XLSX and (feature `pdf`) PDF byte buffers
//!
//! ## Example
//!
//! ```rust,ignore
//! use pos_sales_analytics::*;
//! use std::path::Path;
//!
//! let pipeline = SalesPipeline::new(PipelineConfig::default())?;
//! let dataset = pipeline.load_path(Path::new("app/data/Orders_pos.xlsx"))?;
//!
//! let filters = FilterSet::new().with_product_contains("almuerzo");
//! let analysis = pipeline.analyze(&dataset, &filters);
//!
//! if !analysis.duplicates.is_empty() {
//!     println!("{} duplicate lunches", analysis.duplicates.rows.len());
//! }
//! let csv = client_summary_table(&analysis.clients, &pipeline.config().labels).to_csv()?;
//! ```

pub mod alerts;
pub mod cache;
pub mod clients;
pub mod derived;
pub mod duplicates;
pub mod error;
pub mod export;
pub mod filters;
pub mod forecast;
pub mod ingestion;
pub mod mapping;
pub mod metrics;
pub mod normalize;
pub mod schema;
pub mod utils;

#[cfg(feature = "pdf")]
pub mod pdf;

pub use alerts::{dispatch, Alert, AlertConfig, AlertOutcome, Mailer};
pub use cache::{fingerprint, AnalysisCache};
pub use clients::{aggregate_clients, ClientAggregation, ClientSummary};
pub use duplicates::{detect_duplicates, DuplicateGroup, DuplicateReport};
pub use error::{AnalyticsError, Result};
pub use export::*;
pub use filters::{DatePreset, Filter, FilterOptions, FilterSet};
pub use forecast::{
    forecast, monthly_growth, DailyTotal, Forecast, ForecastOutcome, ForecastPoint,
    GrowthOutcome, ProductGrowth, YearMonth,
};
pub use ingestion::{CellValue, RawTable};
pub use mapping::{ColumnMapper, MappedTable};
pub use metrics::{chart_series, compute_metrics, ChartSeries, SalesMetrics};
pub use normalize::{NormalizationStats, TypeNormalizer};
pub use schema::*;

use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One product line of a receipt, after normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub client_barcode: String,
    /// Client identifier used for grouping.
    pub client: String,
    pub client_group: String,
    pub cost_center: String,
    /// `None` when the source value could not be parsed.
    pub date: Option<NaiveDateTime>,
    pub receipt: String,
    pub product: String,
    pub quantity: f64,
    pub collaborator_price: f64,
    pub commission: f64,
    pub receivable_aseavna: f64,
    pub receivable_avna: f64,
    /// Derived from the configured total formula.
    pub total: f64,
    /// Localized weekday of `date`.
    pub weekday: Option<String>,
}

impl OrderLine {
    /// Calendar day of the order, without the time.
    pub fn day(&self) -> Option<NaiveDate> {
        self.date.map(|dt| dt.date())
    }

    pub fn numeric(&self, field: Field) -> f64 {
        match field {
            Field::Quantity => self.quantity,
            Field::CollaboratorPrice => self.collaborator_price,
            Field::Commission => self.commission,
            Field::ReceivableAseavna => self.receivable_aseavna,
            Field::ReceivableAvna => self.receivable_avna,
            _ => 0.0,
        }
    }
}

/// Data-quality counts gathered while loading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    pub rows_read: usize,
    pub headers: Vec<String>,
    /// Logical names of columns that were defaulted.
    pub missing_columns: Vec<String>,
    pub invalid_dates: usize,
    pub duplicate_rows_removed: usize,
    /// Whether the date column held Excel serial numbers.
    pub serial_dates: bool,
    /// Set when a lenient load swallowed an error.
    pub error: Option<String>,
}

/// The normalized, immutable table every analysis reads from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesDataset {
    pub lines: Vec<OrderLine>,
    pub report: LoadReport,
}

impl SalesDataset {
    pub fn empty_with_error(message: String) -> Self {
        Self {
            lines: Vec::new(),
            report: LoadReport {
                error: Some(message),
                ..Default::default()
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions::from_lines(&self.lines)
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.lines)
    }
}

/// Everything the dashboard shows for one filter state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub view: Vec<OrderLine>,
    pub metrics: SalesMetrics,
    pub duplicates: DuplicateReport,
    pub clients: ClientAggregation,
    pub forecast: ForecastOutcome,
    pub growth: GrowthOutcome,
    pub charts: ChartSeries,
}

pub struct SalesPipeline {
    config: PipelineConfig,
}

impl SalesPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn load_path(&self, path: &Path) -> Result<SalesDataset> {
        info!("Loading orders from {}", path.display());
        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);

        let raw = if is_csv {
            RawTable::from_csv_reader(std::fs::File::open(path)?)?
        } else {
            RawTable::from_spreadsheet_path(path)?
        };
        self.process(&raw)
    }

    pub fn load_bytes(&self, bytes: &[u8]) -> Result<SalesDataset> {
        let raw = RawTable::from_spreadsheet_bytes(bytes)?;
        self.process(&raw)
    }

    pub fn load_csv<R: std::io::Read>(&self, reader: R) -> Result<SalesDataset> {
        let raw = RawTable::from_csv_reader(reader)?;
        self.process(&raw)
    }

    /// Like [`Self::load_path`], but a failure yields an empty dataset that
    /// carries the error message instead of an `Err`.
    pub fn load_path_or_empty(&self, path: &Path) -> SalesDataset {
        match self.load_path(path) {
            Ok(dataset) => dataset,
            Err(e) => {
                error!("Error loading data from {}: {}", path.display(), e);
                SalesDataset::empty_with_error(e.to_string())
            }
        }
    }

    /// Map, normalize and derive totals for a raw table.
    pub fn process(&self, raw: &RawTable) -> Result<SalesDataset> {
        let mapped = ColumnMapper::new(&self.config).map(raw)?;
        let (lines, stats) = TypeNormalizer::new(&self.config).normalize(&mapped);
        let lines = derived::apply_totals(lines, &self.config.total);

        debug!(
            "{} computed as {}",
            self.config.total_label,
            derived::describe(&self.config.total)
        );

        let report = LoadReport {
            rows_read: raw.len(),
            headers: raw.headers.clone(),
            missing_columns: mapped
                .missing()
                .iter()
                .map(|f| f.logical_name().to_string())
                .collect(),
            invalid_dates: stats.invalid_dates,
            duplicate_rows_removed: stats.duplicate_rows_removed,
            serial_dates: stats.serial_dates,
            error: None,
        };

        info!(
            "Loaded {} order lines ({} rows read, {} invalid dates, {} duplicates removed)",
            lines.len(),
            report.rows_read,
            report.invalid_dates,
            report.duplicate_rows_removed
        );

        Ok(SalesDataset { lines, report })
    }

    /// Runs every analysis over the filtered view of `dataset`.
    pub fn analyze(&self, dataset: &SalesDataset, filters: &FilterSet) -> Analysis {
        let view = filters.apply(&dataset.lines);
        debug!(
            "Filtered view: {} of {} lines",
            view.len(),
            dataset.lines.len()
        );

        Analysis {
            metrics: compute_metrics(&view),
            duplicates: detect_duplicates(&view, &self.config.duplicate_product),
            clients: aggregate_clients(
                &view,
                &self.config.unusual_policy,
                &self.config.labels.not_available,
            ),
            forecast: forecast(&view, &self.config.forecast),
            growth: monthly_growth(&view),
            charts: chart_series(&view, 10),
            view,
        }
    }

    /// [`Self::analyze`] through a memoizing cache.
    pub fn analyze_cached<'c>(
        &self,
        cache: &'c mut AnalysisCache,
        dataset: &SalesDataset,
        filters: &FilterSet,
    ) -> &'c Analysis {
        cache.get_or_compute(dataset, filters, |d, f| self.analyze(d, f))
    }
}

pub fn process_workbook(path: &Path, config: PipelineConfig) -> Result<SalesDataset> {
    SalesPipeline::new(config)?.load_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn raw_orders() -> RawTable {
        let headers = [
            "Fecha",
            "Cliente/Nombre",
            "Cliente/Nombre principal",
            "Número de recibo",
            "Líneas de la orden",
            "Precio total colaborador",
            "Comision Aseavna",
            "Cuentas por a cobrar aseavna",
            "Cuentas por a Cobrar Avna",
        ];
        let row = |date: &str, client: &str, receipt: &str, product: &str, price: f64| {
            vec![
                text(date),
                text(client),
                text("Planta"),
                text(receipt),
                text(product),
                CellValue::Number(price),
                CellValue::Number(price * 0.1),
                CellValue::Number(price * 0.6),
                CellValue::Number(price * 0.4),
            ]
        };
        RawTable::new(
            headers.iter().map(|h| h.to_string()).collect(),
            vec![
                row("2025-03-10 11:30:00", "Ana", "R-1", "Almuerzo Ejecutivo Aseavna", 2500.0),
                row("2025-03-10 13:05:00", "Ana", "R-2", "Almuerzo Ejecutivo Aseavna", 2500.0),
                row("2025-03-11 12:00:00", "Luis", "R-3", "Café", 800.0),
                row("2025-03-11 12:00:00", "Luis", "R-3", "Café", 800.0),
            ],
        )
    }

    #[test]
    fn test_end_to_end_processing() {
        let pipeline = SalesPipeline::new(PipelineConfig::default()).unwrap();
        let dataset = pipeline.process(&raw_orders()).unwrap();

        assert_eq!(dataset.report.rows_read, 4);
        assert_eq!(dataset.report.duplicate_rows_removed, 1);
        assert_eq!(dataset.len(), 3);
        assert!(dataset
            .report
            .missing_columns
            .contains(&"Centro de Costos Aseavna".to_string()));
        assert_eq!(dataset.lines[0].total, 2500.0);

        let analysis = pipeline.analyze(&dataset, &FilterSet::new());
        assert_eq!(analysis.duplicates.groups.len(), 1);
        assert_eq!(analysis.clients.summaries.len(), 2);
        assert!(analysis.forecast.forecast().is_some());
        assert_eq!(analysis.growth, GrowthOutcome::InsufficientData);
    }

    #[test]
    fn test_receivables_total_variant() {
        let pipeline = SalesPipeline::new(PipelineConfig::receivables_total()).unwrap();
        let dataset = pipeline.process(&raw_orders()).unwrap();
        assert!((dataset.lines[0].total - 2500.0).abs() < 1e-9);
        assert!((dataset.lines[2].total - 800.0).abs() < 1e-9);
    }

    #[test]
    fn test_lenient_load_returns_empty_dataset() {
        let pipeline = SalesPipeline::new(PipelineConfig::default()).unwrap();
        let dataset = pipeline.load_path_or_empty(Path::new("/nonexistent/Orders_pos.xlsx"));

        assert!(dataset.is_empty());
        assert!(dataset.report.error.is_some());

        let analysis = pipeline.analyze(&dataset, &FilterSet::new());
        assert_eq!(analysis.metrics.orders, 0);
        assert!(analysis.duplicates.is_empty());
        assert_eq!(analysis.forecast, ForecastOutcome::InsufficientData);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PipelineConfig {
            required: vec![Field::Date],
            columns: vec![],
            ..PipelineConfig::default()
        };
        assert!(SalesPipeline::new(config).is_err());
    }

    #[test]
    fn test_unmapped_column_keeps_otherwise_equal_rows() {
        let row = |id: &str| {
            vec![
                text(id),
                text("2025-03-11 12:00:00"),
                text("Luis"),
                text("Café"),
                CellValue::Number(800.0),
            ]
        };
        let raw = RawTable::new(
            ["ID línea", "Fecha", "Cliente/Nombre", "Líneas de la orden", "Precio total colaborador"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            vec![row("L-1"), row("L-2"), row("L-2")],
        );
        let pipeline = SalesPipeline::new(PipelineConfig::default()).unwrap();
        let dataset = pipeline.process(&raw).unwrap();

        assert_eq!(dataset.report.rows_read, 3);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.report.duplicate_rows_removed, 1);
        let total: f64 = dataset.lines.iter().map(|l| l.total).sum();
        assert_eq!(total, 1600.0);
    }
}
