use crate::schema::UnusualPolicy;
use crate::utils::{mean, mode, percentile};
use crate::OrderLine;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSummary {
    pub client: String,
    pub total_sales: f64,
    /// Distinct receipt numbers.
    pub orders: usize,
    pub commission: f64,
    pub receivable_aseavna: f64,
    pub receivable_avna: f64,
    pub top_product: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientAggregation {
    /// One row per client, sorted by client.
    pub summaries: Vec<ClientSummary>,
    /// Totals strictly above this are unusual. `None` when there are no clients.
    pub unusual_threshold: Option<f64>,
    pub unusual: Vec<ClientSummary>,
}

impl ClientAggregation {
    pub fn total_sales(&self) -> f64 {
        self.summaries.iter().map(|s| s.total_sales).sum()
    }

    pub fn get(&self, client: &str) -> Option<&ClientSummary> {
        self.summaries.iter().find(|s| s.client == client)
    }
}

#[derive(Default)]
struct Accumulator<'a> {
    total_sales: f64,
    receipts: BTreeSet<&'a str>,
    commission: f64,
    receivable_aseavna: f64,
    receivable_avna: f64,
    products: Vec<&'a str>,
}

pub fn aggregate_clients(
    lines: &[OrderLine],
    policy: &UnusualPolicy,
    not_available: &str,
) -> ClientAggregation {
    let mut by_client: BTreeMap<&str, Accumulator> = BTreeMap::new();

    for line in lines {
        let acc = by_client.entry(line.client.as_str()).or_default();
        acc.total_sales += line.total;
        acc.receipts.insert(line.receipt.as_str());
        acc.commission += line.commission;
        acc.receivable_aseavna += line.receivable_aseavna;
        acc.receivable_avna += line.receivable_avna;
        acc.products.push(line.product.as_str());
    }

    let summaries: Vec<ClientSummary> = by_client
        .into_iter()
        .map(|(client, acc)| ClientSummary {
            client: client.to_string(),
            total_sales: acc.total_sales,
            orders: acc.receipts.len(),
            commission: acc.commission,
            receivable_aseavna: acc.receivable_aseavna,
            receivable_avna: acc.receivable_avna,
            top_product: mode(acc.products).unwrap_or_else(|| not_available.to_string()),
        })
        .collect();

    let totals: Vec<f64> = summaries.iter().map(|s| s.total_sales).collect();
    let unusual_threshold = unusual_threshold(&totals, policy);
    let unusual = match unusual_threshold {
        Some(threshold) => summaries
            .iter()
            .filter(|s| s.total_sales > threshold)
            .cloned()
            .collect(),
        None => Vec::new(),
    };

    debug!(
        "Aggregated {} clients, {} unusual (threshold {:?})",
        summaries.len(),
        unusual.len(),
        unusual_threshold
    );

    ClientAggregation {
        summaries,
        unusual_threshold,
        unusual,
    }
}

pub fn unusual_threshold(totals: &[f64], policy: &UnusualPolicy) -> Option<f64> {
    match policy {
        UnusualPolicy::MeanMultiple { factor } => mean(totals).map(|m| m * factor),
        UnusualPolicy::Percentile { percentile: pct } => percentile(totals, *pct),
    }
}
