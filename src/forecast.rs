use crate::schema::ForecastConfig;
use crate::utils::{day_index, student_t_quantile};
use crate::OrderLine;
use chrono::{Datelike, Days, NaiveDate};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub day_index: i64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub intercept: f64,
    pub slope: f64,
    pub confidence: f64,
    pub history: Vec<DailyTotal>,
    pub points: Vec<ForecastPoint>,
}

impl Forecast {
    pub fn predict(&self, day_index: f64) -> f64 {
        self.intercept + self.slope * day_index
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ForecastOutcome {
    Forecast(Forecast),
    /// Fewer than two distinct historical days.
    InsufficientData,
}

impl ForecastOutcome {
    pub fn forecast(&self) -> Option<&Forecast> {
        match self {
            ForecastOutcome::Forecast(f) => Some(f),
            ForecastOutcome::InsufficientData => None,
        }
    }
}

/// Sum of totals per calendar day, ordered by date. Undated lines are skipped.
pub fn daily_totals(lines: &[OrderLine]) -> Vec<DailyTotal> {
    let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for line in lines {
        if let Some(day) = line.day() {
            *by_day.entry(day).or_insert(0.0) += line.total;
        }
    }

    let origin = match by_day.keys().next() {
        Some(first) => *first,
        None => return Vec::new(),
    };

    by_day
        .into_iter()
        .map(|(date, total)| DailyTotal {
            date,
            day_index: day_index(origin, date),
            total,
        })
        .collect()
}

/// Fits `total = a + b * day_index` by ordinary least squares and projects
/// the configured horizon with a prediction interval.
pub fn forecast(lines: &[OrderLine], config: &ForecastConfig) -> ForecastOutcome {
    forecast_series(daily_totals(lines), config)
}

pub fn forecast_series(history: Vec<DailyTotal>, config: &ForecastConfig) -> ForecastOutcome {
    let n = history.len();
    if n < 2 {
        debug!("Forecast skipped: {} historical days", n);
        return ForecastOutcome::InsufficientData;
    }

    let nf = n as f64;
    let x_mean = history.iter().map(|d| d.day_index as f64).sum::<f64>() / nf;
    let y_mean = history.iter().map(|d| d.total).sum::<f64>() / nf;

    let sxx: f64 = history
        .iter()
        .map(|d| (d.day_index as f64 - x_mean).powi(2))
        .sum();
    if sxx <= 0.0 {
        return ForecastOutcome::InsufficientData;
    }
    let sxy: f64 = history
        .iter()
        .map(|d| (d.day_index as f64 - x_mean) * (d.total - y_mean))
        .sum();

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;

    // Residual standard error; zero degrees of freedom leaves no spread to report.
    let dof = n - 2;
    let spread = if dof > 0 {
        let sse: f64 = history
            .iter()
            .map(|d| (d.total - (intercept + slope * d.day_index as f64)).powi(2))
            .sum();
        let s = (sse / dof as f64).sqrt();
        let t = student_t_quantile(1.0 - (1.0 - config.confidence) / 2.0, dof as f64);
        Some((s, t))
    } else {
        None
    };

    let (last_date, last_index) = match history.last() {
        Some(last) => (last.date, last.day_index),
        None => return ForecastOutcome::InsufficientData,
    };

    let points = (1..=config.horizon_days)
        .filter_map(|step| {
            let date = last_date.checked_add_days(Days::new(step as u64))?;
            let x0 = (last_index + step as i64) as f64;
            let predicted = intercept + slope * x0;
            let margin = match spread {
                Some((s, t)) => t * s * (1.0 + 1.0 / nf + (x0 - x_mean).powi(2) / sxx).sqrt(),
                None => 0.0,
            };
            Some(ForecastPoint {
                date,
                predicted,
                lower: (predicted - margin).max(0.0),
                upper: predicted + margin,
            })
        })
        .collect();

    debug!(
        "Forecast over {} days: intercept {:.2}, slope {:.2}",
        n, intercept, slope
    );

    ForecastOutcome::Forecast(Forecast {
        intercept,
        slope,
        confidence: config.confidence,
        history,
        points,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductGrowth {
    pub product: String,
    pub previous: f64,
    pub latest: f64,
    pub growth_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GrowthOutcome {
    Growth {
        previous_month: YearMonth,
        latest_month: YearMonth,
        /// Highest growth first.
        products: Vec<ProductGrowth>,
    },
    /// Fewer than two distinct months in the view.
    InsufficientData,
}

impl GrowthOutcome {
    pub fn top_growth(&self, n: usize) -> Vec<ProductGrowth> {
        match self {
            GrowthOutcome::Growth { products, .. } => products.iter().take(n).cloned().collect(),
            GrowthOutcome::InsufficientData => Vec::new(),
        }
    }
}

/// Percentage change per product between the two most recent months present.
/// A product with no sales in the earlier month reports 0.
pub fn monthly_growth(lines: &[OrderLine]) -> GrowthOutcome {
    let mut months: BTreeSet<YearMonth> = BTreeSet::new();
    let mut pivot: BTreeMap<&str, BTreeMap<YearMonth, f64>> = BTreeMap::new();

    for line in lines {
        if let Some(day) = line.day() {
            let month = YearMonth::of(day);
            months.insert(month);
            *pivot
                .entry(line.product.as_str())
                .or_default()
                .entry(month)
                .or_insert(0.0) += line.total;
        }
    }

    let mut recent = months.iter().rev();
    let (latest_month, previous_month) = match (recent.next(), recent.next()) {
        (Some(latest), Some(previous)) => (*latest, *previous),
        _ => return GrowthOutcome::InsufficientData,
    };

    let mut products: Vec<ProductGrowth> = pivot
        .into_iter()
        .map(|(product, by_month)| {
            let previous = by_month.get(&previous_month).copied().unwrap_or(0.0);
            let latest = by_month.get(&latest_month).copied().unwrap_or(0.0);
            ProductGrowth {
                product: product.to_string(),
                previous,
                latest,
                growth_pct: growth_pct(previous, latest),
            }
        })
        .collect();

    products.sort_by(|a, b| {
        b.growth_pct
            .total_cmp(&a.growth_pct)
            .then_with(|| a.product.cmp(&b.product))
    });

    GrowthOutcome::Growth {
        previous_month,
        latest_month,
        products,
    }
}

pub fn growth_pct(previous: f64, latest: f64) -> f64 {
    if previous == 0.0 {
        0.0
    } else {
        (latest - previous) / previous * 100.0
    }
}
