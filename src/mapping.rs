use crate::error::{AnalyticsError, Result};
use crate::ingestion::{CellValue, RawTable};
use crate::schema::{Field, PipelineConfig};
use log::warn;
use std::collections::BTreeMap;

/// Where a logical column's values come from after mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSource {
    /// Index of the matching header in the raw table.
    Header(usize),
    /// Header not found; every row gets this value.
    Default(CellValue),
}

/// A raw table viewed through logical column names.
#[derive(Debug, Clone)]
pub struct MappedTable<'a> {
    raw: &'a RawTable,
    sources: BTreeMap<Field, ColumnSource>,
    missing: Vec<Field>,
}

impl<'a> MappedTable<'a> {
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn raw(&self) -> &'a RawTable {
        self.raw
    }

    pub fn missing(&self) -> &[Field] {
        &self.missing
    }

    pub fn source(&self, field: Field) -> Option<&ColumnSource> {
        self.sources.get(&field)
    }

    /// Cell of `field` at `row`. Unconfigured fields read as empty.
    pub fn cell(&self, row: usize, field: Field) -> &CellValue {
        match self.sources.get(&field) {
            Some(ColumnSource::Header(col)) => self.raw.cell(row, *col),
            Some(ColumnSource::Default(value)) => value,
            None => &CellValue::Empty,
        }
    }

    /// All cells of `field`, in row order.
    pub fn column(&self, field: Field) -> impl Iterator<Item = &CellValue> + '_ {
        (0..self.len()).map(move |row| self.cell(row, field))
    }
}

pub struct ColumnMapper<'c> {
    config: &'c PipelineConfig,
}

impl<'c> ColumnMapper<'c> {
    pub fn new(config: &'c PipelineConfig) -> Self {
        Self { config }
    }

    /// Resolves every configured column against the raw headers.
    ///
    /// Matching is exact after trimming and lowercasing both sides. When two
    /// headers collide after folding, the rightmost one wins. Missing
    /// columns are defaulted and reported; missing required columns fail the
    /// whole load.
    pub fn map<'a>(&self, raw: &'a RawTable) -> Result<MappedTable<'a>> {
        let normalized_headers: Vec<String> =
            raw.headers.iter().map(|h| normalize_header(h)).collect();

        let mut sources = BTreeMap::new();
        let mut missing = Vec::new();

        for spec in &self.config.columns {
            let wanted = normalize_header(&spec.header);
            let found = normalized_headers.iter().rposition(|h| *h == wanted);
            if normalized_headers.iter().filter(|h| **h == wanted).count() > 1 {
                warn!("Header '{}' appears more than once, using the last one", spec.header);
            }

            let source = match found {
                Some(idx) => ColumnSource::Header(idx),
                None => {
                    missing.push(spec.field);
                    ColumnSource::Default(self.default_for(spec.field))
                }
            };
            sources.insert(spec.field, source);
        }

        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|f| f.logical_name()).collect();
            warn!("Columns not found, using defaults: {}", names.join(", "));
        }

        let missing_required: Vec<String> = missing
            .iter()
            .filter(|f| self.config.required.contains(*f))
            .map(|f| {
                self.config
                    .header_for(*f)
                    .unwrap_or(f.logical_name())
                    .to_string()
            })
            .collect();

        if !missing_required.is_empty() {
            return Err(AnalyticsError::DataValidation {
                missing: missing_required,
            });
        }

        Ok(MappedTable {
            raw,
            sources,
            missing,
        })
    }

    fn default_for(&self, field: Field) -> CellValue {
        if field.defaults_to_text() {
            CellValue::Text(self.config.unknown_label.clone())
        } else {
            CellValue::Number(0.0)
        }
    }
}

fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase()
}
