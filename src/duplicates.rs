use crate::OrderLine;
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub client: String,
    pub day: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuplicateReport {
    pub product: String,
    /// Every line belonging to a group, in input order.
    pub rows: Vec<OrderLine>,
    /// Sorted by client, then day.
    pub groups: Vec<DuplicateGroup>,
}

impl DuplicateReport {
    /// "No duplicates" is a normal outcome, not an error.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Flags repeated purchases of `product` by the same client on the same
/// calendar day. Time of day is ignored; undated lines never match.
pub fn detect_duplicates(lines: &[OrderLine], product: &str) -> DuplicateReport {
    let mut groups: BTreeMap<(&str, NaiveDate), Vec<usize>> = BTreeMap::new();

    for (idx, line) in lines.iter().enumerate() {
        if line.product != product {
            continue;
        }
        if let Some(day) = line.day() {
            groups
                .entry((line.client.as_str(), day))
                .or_default()
                .push(idx);
        }
    }

    groups.retain(|_, members| members.len() > 1);

    let mut row_indices: Vec<usize> = groups.values().flatten().copied().collect();
    row_indices.sort_unstable();

    let report = DuplicateReport {
        product: product.to_string(),
        rows: row_indices.iter().map(|&i| lines[i].clone()).collect(),
        groups: groups
            .iter()
            .map(|((client, day), members)| DuplicateGroup {
                client: client.to_string(),
                day: *day,
                count: members.len(),
            })
            .collect(),
    };

    debug!(
        "Duplicate check for '{}': {} groups, {} rows",
        product,
        report.groups.len(),
        report.rows.len()
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    const LUNCH: &str = "Almuerzo Ejecutivo Aseavna";

    fn line(client: &str, product: &str, day: u32, hour: u32, receipt: &str) -> OrderLine {
        OrderLine {
            client: client.to_string(),
            product: product.to_string(),
            receipt: receipt.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, day)
                .unwrap()
                .and_hms_opt(hour, 0, 0),
            ..OrderLine::default()
        }
    }

    #[test]
    fn test_same_client_same_day_is_duplicate() {
        let lines = vec![
            line("Ana", LUNCH, 10, 11, "R-1"),
            line("Ana", LUNCH, 10, 14, "R-2"),
            line("Luis", LUNCH, 11, 12, "R-3"),
        ];
        let report = detect_duplicates(&lines, LUNCH);

        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].receipt, "R-1");
        assert_eq!(report.rows[1].receipt, "R-2");
        assert_eq!(
            report.groups,
            vec![DuplicateGroup {
                client: "Ana".to_string(),
                day: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
                count: 2,
            }]
        );
    }

    #[test]
    fn test_distinct_pairs_report_nothing() {
        let lines = vec![
            line("Ana", LUNCH, 10, 11, "R-1"),
            line("Ana", LUNCH, 11, 11, "R-2"),
            line("Luis", LUNCH, 10, 12, "R-3"),
            line("Ana", "Café", 10, 12, "R-4"),
        ];
        let report = detect_duplicates(&lines, LUNCH);
        assert!(report.is_empty());
        assert!(report.rows.is_empty());
    }

    #[test]
    fn test_other_products_and_undated_lines_are_ignored() {
        let mut undated = line("Ana", LUNCH, 10, 11, "R-9");
        undated.date = None;
        let lines = vec![
            line("Ana", "Café", 10, 8, "R-1"),
            line("Ana", "Café", 10, 9, "R-2"),
            line("Ana", LUNCH, 10, 11, "R-3"),
            undated,
        ];
        assert!(detect_duplicates(&lines, LUNCH).is_empty());
        assert!(detect_duplicates(&[], LUNCH).is_empty());
    }
}
