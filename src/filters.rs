use crate::OrderLine;
use chrono::{Days, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One independent row predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "filter")]
pub enum Filter {
    /// Inclusive on both calendar days. Lines without a date never match.
    DateRange { start: NaiveDate, end: NaiveDate },
    Product { value: String },
    ClientGroup { value: String },
    Weekday { value: String },
    Client { value: String },
    CostCenter { value: String },
    /// Inclusive bounds on the derived total.
    AmountRange { min: f64, max: f64 },
    /// Case-insensitive substring of the product description.
    ProductContains { text: String },
}

impl Filter {
    pub fn matches(&self, line: &OrderLine) -> bool {
        match self {
            Filter::DateRange { start, end } => line
                .day()
                .map(|day| day >= *start && day <= *end)
                .unwrap_or(false),
            Filter::Product { value } => line.product == *value,
            Filter::ClientGroup { value } => line.client_group == *value,
            Filter::Weekday { value } => line.weekday.as_deref() == Some(value.as_str()),
            Filter::Client { value } => line.client == *value,
            Filter::CostCenter { value } => line.cost_center == *value,
            Filter::AmountRange { min, max } => line.total >= *min && line.total <= *max,
            Filter::ProductContains { text } => line
                .product
                .to_lowercase()
                .contains(&text.to_lowercase()),
        }
    }
}

/// Selector state of the analysis view. `None` means "Todos".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FilterSet {
    #[serde(default)]
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub client_group: Option<String>,
    #[serde(default)]
    pub weekday: Option<String>,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub cost_center: Option<String>,
    #[serde(default)]
    pub amount_range: Option<(f64, f64)>,
    #[serde(default)]
    pub product_contains: Option<String>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.date_range = Some((start, end));
        self
    }

    pub fn with_product(mut self, product: &str) -> Self {
        self.product = Some(product.to_string());
        self
    }

    pub fn with_client_group(mut self, group: &str) -> Self {
        self.client_group = Some(group.to_string());
        self
    }

    pub fn with_weekday(mut self, weekday: &str) -> Self {
        self.weekday = Some(weekday.to_string());
        self
    }

    pub fn with_client(mut self, client: &str) -> Self {
        self.client = Some(client.to_string());
        self
    }

    pub fn with_cost_center(mut self, cost_center: &str) -> Self {
        self.cost_center = Some(cost_center.to_string());
        self
    }

    pub fn with_amount_range(mut self, min: f64, max: f64) -> Self {
        self.amount_range = Some((min, max));
        self
    }

    pub fn with_product_contains(mut self, text: &str) -> Self {
        self.product_contains = Some(text.to_string());
        self
    }

    /// The active predicates. Blank free-text searches are ignored.
    pub fn predicates(&self) -> Vec<Filter> {
        let mut filters = Vec::new();
        if let Some((start, end)) = self.date_range {
            filters.push(Filter::DateRange { start, end });
        }
        if let Some(value) = &self.product {
            filters.push(Filter::Product {
                value: value.clone(),
            });
        }
        if let Some(value) = &self.client_group {
            filters.push(Filter::ClientGroup {
                value: value.clone(),
            });
        }
        if let Some(value) = &self.weekday {
            filters.push(Filter::Weekday {
                value: value.clone(),
            });
        }
        if let Some(value) = &self.client {
            filters.push(Filter::Client {
                value: value.clone(),
            });
        }
        if let Some(value) = &self.cost_center {
            filters.push(Filter::CostCenter {
                value: value.clone(),
            });
        }
        if let Some((min, max)) = self.amount_range {
            filters.push(Filter::AmountRange { min, max });
        }
        if let Some(text) = self.product_contains.as_ref().filter(|t| !t.trim().is_empty()) {
            filters.push(Filter::ProductContains { text: text.clone() });
        }
        filters
    }

    pub fn is_empty(&self) -> bool {
        self.predicates().is_empty()
    }

    pub fn matches(&self, line: &OrderLine) -> bool {
        self.predicates().iter().all(|f| f.matches(line))
    }

    /// Lines passing every predicate, in input order.
    pub fn apply(&self, lines: &[OrderLine]) -> Vec<OrderLine> {
        let predicates = self.predicates();
        lines
            .iter()
            .filter(|line| predicates.iter().all(|f| f.matches(line)))
            .cloned()
            .collect()
    }

    /// Cache key for this selector state.
    pub fn cache_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

/// Applies `filters` one after another, each over the previous result.
pub fn apply_in_sequence(lines: &[OrderLine], filters: &[Filter]) -> Vec<OrderLine> {
    let mut current: Vec<OrderLine> = lines.to_vec();
    for filter in filters {
        current.retain(|line| filter.matches(line));
    }
    current
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DatePreset {
    Custom,
    LastWeek,
    LastMonth,
    AllPeriod,
}

impl DatePreset {
    /// Range for the preset given the dataset's first and last day.
    /// `Custom` starts from the full period for the caller to narrow.
    pub fn resolve(&self, first: NaiveDate, last: NaiveDate) -> (NaiveDate, NaiveDate) {
        let back = |days: u64| last.checked_sub_days(Days::new(days)).unwrap_or(first);
        match self {
            DatePreset::LastWeek => (back(7), last),
            DatePreset::LastMonth => (back(30), last),
            DatePreset::AllPeriod | DatePreset::Custom => (first, last),
        }
    }
}

/// Sorted distinct values offered by each selector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub products: Vec<String>,
    pub client_groups: Vec<String>,
    pub weekdays: Vec<String>,
    pub clients: Vec<String>,
    pub cost_centers: Vec<String>,
    pub first_day: Option<NaiveDate>,
    pub last_day: Option<NaiveDate>,
    pub max_total: f64,
}

impl FilterOptions {
    pub fn from_lines(lines: &[OrderLine]) -> Self {
        let mut products = BTreeSet::new();
        let mut client_groups = BTreeSet::new();
        let mut weekdays = BTreeSet::new();
        let mut clients = BTreeSet::new();
        let mut cost_centers = BTreeSet::new();
        let mut first_day: Option<NaiveDate> = None;
        let mut last_day: Option<NaiveDate> = None;
        let mut max_total = 0.0_f64;

        for line in lines {
            products.insert(line.product.clone());
            client_groups.insert(line.client_group.clone());
            clients.insert(line.client.clone());
            cost_centers.insert(line.cost_center.clone());
            if let Some(weekday) = &line.weekday {
                weekdays.insert(weekday.clone());
            }
            if let Some(day) = line.day() {
                first_day = Some(first_day.map_or(day, |d| d.min(day)));
                last_day = Some(last_day.map_or(day, |d| d.max(day)));
            }
            max_total = max_total.max(line.total);
        }

        Self {
            products: products.into_iter().collect(),
            client_groups: client_groups.into_iter().collect(),
            weekdays: weekdays.into_iter().collect(),
            clients: clients.into_iter().collect(),
            cost_centers: cost_centers.into_iter().collect(),
            first_day,
            last_day,
            max_total,
        }
    }

    pub fn date_range(&self, preset: DatePreset) -> Option<(NaiveDate, NaiveDate)> {
        match (self.first_day, self.last_day) {
            (Some(first), Some(last)) => Some(preset.resolve(first, last)),
            _ => None,
        }
    }
}
