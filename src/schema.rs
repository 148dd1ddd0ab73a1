use crate::error::{AnalyticsError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Logical columns of a point-of-sale order export.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    #[schemars(description = "Client barcode (Cliente/Código de barras)")]
    ClientBarcode,

    #[schemars(description = "Client identifier used for grouping (Cliente/Nombre)")]
    ClientName,

    #[schemars(description = "Client primary group (Cliente/Nombre principal)")]
    ClientGroup,

    #[schemars(description = "Cost center (Centro de Costos Aseavna)")]
    CostCenter,

    #[schemars(description = "Order date and time (Fecha)")]
    Date,

    #[schemars(description = "Receipt number (Número de recibo)")]
    Receipt,

    #[schemars(description = "Product or order line description (Líneas de la orden)")]
    Product,

    #[schemars(description = "Ordered quantity (Líneas de la orden/Cantidad)")]
    Quantity,

    #[schemars(description = "Collaborator price (Precio total colaborador)")]
    CollaboratorPrice,

    #[schemars(description = "Commission amount (Comision Aseavna)")]
    Commission,

    #[schemars(description = "Receivable owed to Aseavna (Cuentas por a cobrar aseavna)")]
    ReceivableAseavna,

    #[schemars(description = "Receivable owed to Avna (Cuentas por a Cobrar Avna)")]
    ReceivableAvna,
}

impl Field {
    /// Name the rest of the pipeline and the reports use for this column.
    pub fn logical_name(&self) -> &'static str {
        match self {
            Field::ClientBarcode => "Cliente/Código de barras",
            Field::ClientName => "Cliente/Nombre",
            Field::ClientGroup => "Cliente/Nombre principal",
            Field::CostCenter => "Centro de Costos Aseavna",
            Field::Date => "Fecha",
            Field::Receipt => "Número de recibo",
            Field::Product => "Líneas de la orden",
            Field::Quantity => "Líneas de la orden/Cantidad",
            Field::CollaboratorPrice => "Precio total colaborador",
            Field::Commission => "Comision",
            Field::ReceivableAseavna => "Cuentas por a cobrar aseavna",
            Field::ReceivableAvna => "Cuentas por a Cobrar Avna",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Field::Date => FieldKind::Date,
            Field::ClientBarcode
            | Field::ClientName
            | Field::ClientGroup
            | Field::CostCenter
            | Field::Receipt
            | Field::Product => FieldKind::Text,
            Field::Quantity
            | Field::CollaboratorPrice
            | Field::Commission
            | Field::ReceivableAseavna
            | Field::ReceivableAvna => FieldKind::Numeric,
        }
    }

    /// Columns whose logical name mentions the client or the order lines are
    /// materialized as text when absent; everything else as zero.
    pub fn defaults_to_text(&self) -> bool {
        let name = self.logical_name();
        name.contains("Cliente") || name.contains("Líneas")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Numeric,
    Date,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ColumnSpec {
    pub field: Field,

    #[schemars(
        description = "Header expected in the spreadsheet. Matched case-insensitively after trimming surrounding whitespace."
    )]
    pub header: String,
}

impl ColumnSpec {
    pub fn new(field: Field, header: &str) -> Self {
        Self {
            field,
            header: header.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TotalFormula {
    #[schemars(description = "Copy a single numeric column into the Total")]
    Column { field: Field },

    #[schemars(description = "Sum two or more numeric columns into the Total")]
    Sum { fields: Vec<Field> },
}

impl TotalFormula {
    pub fn fields(&self) -> Vec<Field> {
        match self {
            TotalFormula::Column { field } => vec![*field],
            TotalFormula::Sum { fields } => fields.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum UnusualPolicy {
    #[schemars(
        description = "A client is unusual when its total strictly exceeds the mean client total times this factor"
    )]
    MeanMultiple { factor: f64 },

    #[schemars(
        description = "A client is unusual when its total strictly exceeds this percentile (0-100, linear interpolation) of client totals"
    )]
    Percentile { percentile: f64 },
}

impl Default for UnusualPolicy {
    fn default() -> Self {
        UnusualPolicy::MeanMultiple { factor: 2.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ForecastConfig {
    #[schemars(description = "Number of consecutive days projected after the last observed day")]
    pub horizon_days: u32,

    #[schemars(description = "Two-sided confidence level of the prediction interval, e.g. 0.95")]
    pub confidence: f64,

    #[schemars(description = "How many products the growth ranking keeps")]
    pub growth_top_n: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon_days: 7,
            confidence: 0.95,
            growth_top_n: 5,
        }
    }
}

/// Column headers and titles used by the report builders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ReportLabels {
    pub client: String,
    pub total_sales: String,
    pub orders: String,
    pub commission: String,
    pub receivable_aseavna: String,
    pub receivable_avna: String,
    pub top_product: String,
    pub average_order_value: String,
    pub unique_clients: String,
    pub most_sold: String,
    pub least_sold: String,
    pub day: String,
    pub count: String,
    pub product: String,
    pub growth: String,
    pub not_available: String,
}

impl Default for ReportLabels {
    fn default() -> Self {
        Self {
            client: "Cliente".to_string(),
            total_sales: "Ventas Totales (₡)".to_string(),
            orders: "Número de Órdenes".to_string(),
            commission: "Comisión Total (₡)".to_string(),
            receivable_aseavna: "Ctas. por Cobrar Aseavna (₡)".to_string(),
            receivable_avna: "Ctas. por Cobrar Avna (₡)".to_string(),
            top_product: "Producto Más Comprado".to_string(),
            average_order_value: "Valor Promedio por Orden (₡)".to_string(),
            unique_clients: "Clientes Únicos".to_string(),
            most_sold: "Producto Más Vendido".to_string(),
            least_sold: "Producto Menos Vendido".to_string(),
            day: "Fecha_Dia".to_string(),
            count: "Cantidad".to_string(),
            product: "Producto".to_string(),
            growth: "Crecimiento (%)".to_string(),
            not_available: "N/A".to_string(),
        }
    }
}

fn spanish_weekdays() -> BTreeMap<String, String> {
    [
        ("Monday", "Lunes"),
        ("Tuesday", "Martes"),
        ("Wednesday", "Miércoles"),
        ("Thursday", "Jueves"),
        ("Friday", "Viernes"),
        ("Saturday", "Sábado"),
        ("Sunday", "Domingo"),
    ]
    .into_iter()
    .map(|(en, es)| (en.to_string(), es.to_string()))
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct PipelineConfig {
    #[schemars(description = "Logical field to expected spreadsheet header")]
    pub columns: Vec<ColumnSpec>,

    #[schemars(description = "Fields whose absence aborts the load instead of being defaulted")]
    #[serde(default)]
    pub required: Vec<Field>,

    pub total: TotalFormula,

    #[schemars(description = "Display name of the derived total, e.g. 'Total' or 'Total Final'")]
    pub total_label: String,

    #[schemars(description = "Product description whose same-day repeats are reported as duplicates")]
    pub duplicate_product: String,

    #[serde(default)]
    pub unusual_policy: UnusualPolicy,

    #[schemars(
        description = "Days subtracted after converting an Excel serial date from the 1899-12-30 epoch. 0 keeps serial 1 = 1899-12-31."
    )]
    #[serde(default)]
    pub excel_correction_days: i64,

    #[schemars(description = "chrono format tried first for textual dates")]
    pub date_format: String,

    #[schemars(description = "English weekday name to localized label")]
    pub weekday_labels: BTreeMap<String, String>,

    #[serde(default)]
    pub forecast: ForecastConfig,

    #[schemars(description = "Placeholder for missing identifiers and descriptions")]
    pub unknown_label: String,

    #[serde(default)]
    pub labels: ReportLabels,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            columns: vec![
                ColumnSpec::new(Field::ClientBarcode, "Cliente/Código de barras"),
                ColumnSpec::new(Field::ClientName, "Cliente/Nombre"),
                ColumnSpec::new(Field::CostCenter, "Centro de Costos Aseavna"),
                ColumnSpec::new(Field::Date, "Fecha"),
                ColumnSpec::new(Field::Receipt, "Número de recibo"),
                ColumnSpec::new(Field::ClientGroup, "Cliente/Nombre principal"),
                ColumnSpec::new(Field::CollaboratorPrice, "Precio total colaborador"),
                ColumnSpec::new(Field::Commission, "Comision Aseavna"),
                ColumnSpec::new(Field::ReceivableAseavna, "Cuentas por a cobrar aseavna"),
                ColumnSpec::new(Field::ReceivableAvna, "Cuentas por a Cobrar Avna"),
                ColumnSpec::new(Field::Product, "Líneas de la orden"),
                ColumnSpec::new(Field::Quantity, "Líneas de la orden/Cantidad"),
            ],
            required: vec![Field::Date],
            total: TotalFormula::Column {
                field: Field::CollaboratorPrice,
            },
            total_label: "Total".to_string(),
            duplicate_product: "Almuerzo Ejecutivo Aseavna".to_string(),
            unusual_policy: UnusualPolicy::default(),
            excel_correction_days: 0,
            date_format: "%Y-%m-%d %H:%M:%S".to_string(),
            weekday_labels: spanish_weekdays(),
            forecast: ForecastConfig::default(),
            unknown_label: "Desconocido".to_string(),
            labels: ReportLabels::default(),
        }
    }
}

impl PipelineConfig {
    /// Variant whose "Total Final" is the sum of both receivables.
    pub fn receivables_total() -> Self {
        Self {
            total: TotalFormula::Sum {
                fields: vec![Field::ReceivableAseavna, Field::ReceivableAvna],
            },
            total_label: "Total Final".to_string(),
            ..Self::default()
        }
    }

    pub fn header_for(&self, field: Field) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.field == field)
            .map(|c| c.header.as_str())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(PipelineConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    pub fn validate(&self) -> Result<()> {
        for field in &self.required {
            if self.header_for(*field).is_none() {
                return Err(invalid(
                    "required",
                    format!("{:?} is required but has no column spec", field),
                ));
            }
        }

        for (idx, spec) in self.columns.iter().enumerate() {
            if spec.header.trim().is_empty() {
                return Err(invalid(
                    "columns",
                    format!("Column #{} ({:?}) has an empty header", idx, spec.field),
                ));
            }
            if self.columns[..idx].iter().any(|c| c.field == spec.field) {
                return Err(invalid(
                    "columns",
                    format!("{:?} is mapped more than once", spec.field),
                ));
            }
        }

        let total_fields = self.total.fields();
        if total_fields.is_empty() {
            return Err(invalid("total", "formula names no columns".to_string()));
        }
        if let TotalFormula::Sum { fields } = &self.total {
            if fields.len() < 2 {
                return Err(invalid(
                    "total",
                    "a sum needs at least two columns".to_string(),
                ));
            }
        }
        for field in total_fields {
            if field.kind() != FieldKind::Numeric {
                return Err(invalid(
                    "total",
                    format!("{:?} is not a numeric column", field),
                ));
            }
        }

        match self.unusual_policy {
            UnusualPolicy::MeanMultiple { factor } if !(factor > 0.0) => {
                return Err(invalid(
                    "unusual_policy",
                    format!("factor must be positive, got {}", factor),
                ));
            }
            UnusualPolicy::Percentile { percentile } if !(0.0..=100.0).contains(&percentile) => {
                return Err(invalid(
                    "unusual_policy",
                    format!("percentile must be within 0..=100, got {}", percentile),
                ));
            }
            _ => {}
        }

        if self.forecast.horizon_days == 0 {
            return Err(invalid(
                "forecast.horizon_days",
                "must be at least 1".to_string(),
            ));
        }
        if !(self.forecast.confidence > 0.0 && self.forecast.confidence < 1.0) {
            return Err(invalid(
                "forecast.confidence",
                format!("must be within (0, 1), got {}", self.forecast.confidence),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, details: String) -> AnalyticsError {
    AnalyticsError::InvalidConfig {
        field: field.to_string(),
        details,
    }
}
