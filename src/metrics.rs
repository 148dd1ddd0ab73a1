use crate::forecast::{daily_totals, DailyTotal};
use crate::OrderLine;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesMetrics {
    pub total_sales: f64,
    /// Distinct receipt numbers.
    pub orders: usize,
    /// 0 when there are no orders.
    pub average_order_value: f64,
    pub commission: f64,
    pub receivable_aseavna: f64,
    pub receivable_avna: f64,
    pub unique_clients: usize,
    pub most_sold: Option<String>,
    pub least_sold: Option<String>,
}

pub fn compute_metrics(lines: &[OrderLine]) -> SalesMetrics {
    let mut receipts = BTreeSet::new();
    let mut clients = BTreeSet::new();
    let mut metrics = SalesMetrics::default();

    for line in lines {
        metrics.total_sales += line.total;
        metrics.commission += line.commission;
        metrics.receivable_aseavna += line.receivable_aseavna;
        metrics.receivable_avna += line.receivable_avna;
        receipts.insert(line.receipt.as_str());
        clients.insert(line.client.as_str());
    }

    metrics.orders = receipts.len();
    metrics.unique_clients = clients.len();
    metrics.average_order_value = if metrics.orders > 0 {
        metrics.total_sales / metrics.orders as f64
    } else {
        0.0
    };

    let by_product = totals_by_product(lines);
    // Ties keep the alphabetically first product.
    metrics.most_sold = by_product
        .iter()
        .fold(None::<(&String, f64)>, |best, (name, total)| match best {
            Some((_, best_total)) if best_total >= *total => best,
            _ => Some((name, *total)),
        })
        .map(|(name, _)| name.clone());
    metrics.least_sold = by_product
        .iter()
        .fold(None::<(&String, f64)>, |best, (name, total)| match best {
            Some((_, best_total)) if best_total <= *total => best,
            _ => Some((name, *total)),
        })
        .map(|(name, _)| name.clone());

    metrics
}

pub fn totals_by_product(lines: &[OrderLine]) -> BTreeMap<String, f64> {
    sum_by(lines, |line| line.product.as_str())
}

pub fn totals_by_client_group(lines: &[OrderLine]) -> BTreeMap<String, f64> {
    sum_by(lines, |line| line.client_group.as_str())
}

fn sum_by<'a, F>(lines: &'a [OrderLine], key: F) -> BTreeMap<String, f64>
where
    F: Fn(&'a OrderLine) -> &'a str,
{
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for line in lines {
        *totals.entry(key(line).to_string()).or_insert(0.0) += line.total;
    }
    totals
}

/// Data behind the dashboard charts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    /// Highest totals first.
    pub top_products: Vec<(String, f64)>,
    pub daily_trend: Vec<DailyTotal>,
    pub client_groups: Vec<(String, f64)>,
}

pub fn chart_series(lines: &[OrderLine], top_n: usize) -> ChartSeries {
    let mut top_products: Vec<(String, f64)> = totals_by_product(lines).into_iter().collect();
    top_products.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_products.truncate(top_n);

    ChartSeries {
        top_products,
        daily_trend: daily_totals(lines),
        client_groups: totals_by_client_group(lines).into_iter().collect(),
    }
}
