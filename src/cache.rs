use crate::filters::FilterSet;
use crate::{Analysis, OrderLine, SalesDataset};
use log::debug;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// SHA-256 over the normalized lines, hex encoded.
pub fn fingerprint(lines: &[OrderLine]) -> String {
    let mut hasher = Sha256::new();
    for line in lines {
        match serde_json::to_vec(line) {
            Ok(bytes) => hasher.update(&bytes),
            Err(_) => hasher.update(format!("{:?}", line).as_bytes()),
        }
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// Memoized analyses for one dataset at a time.
#[derive(Debug, Default)]
pub struct AnalysisCache {
    fingerprint: Option<String>,
    entries: HashMap<String, Analysis>,
    hits: usize,
    misses: usize,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.fingerprint = None;
    }

    /// Returns the cached analysis for `(dataset, filters)`, computing it on
    /// a miss. A dataset with a new fingerprint drops every entry first.
    pub fn get_or_compute<F>(
        &mut self,
        dataset: &SalesDataset,
        filters: &FilterSet,
        compute: F,
    ) -> &Analysis
    where
        F: FnOnce(&SalesDataset, &FilterSet) -> Analysis,
    {
        let current = dataset.fingerprint();
        if self.fingerprint.as_deref() != Some(current.as_str()) {
            if !self.entries.is_empty() {
                debug!("Dataset changed, dropping {} cached analyses", self.entries.len());
            }
            self.entries.clear();
            self.fingerprint = Some(current);
        }

        let key = filters.cache_key();
        if self.entries.contains_key(&key) {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        self.entries
            .entry(key)
            .or_insert_with(|| compute(dataset, filters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PipelineConfig, SalesPipeline};
    use chrono::NaiveDate;

    fn dataset(totals: &[f64]) -> SalesDataset {
        let lines = totals
            .iter()
            .enumerate()
            .map(|(i, total)| OrderLine {
                client: format!("C{}", i),
                receipt: format!("R-{}", i),
                product: "Café".to_string(),
                date: NaiveDate::from_ymd_opt(2025, 3, 1 + i as u32)
                    .unwrap()
                    .and_hms_opt(9, 0, 0),
                total: *total,
                ..OrderLine::default()
            })
            .collect();
        SalesDataset {
            lines,
            ..SalesDataset::default()
        }
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        assert_eq!(
            dataset(&[1.0, 2.0]).fingerprint(),
            dataset(&[1.0, 2.0]).fingerprint()
        );
        assert_ne!(
            dataset(&[1.0, 2.0]).fingerprint(),
            dataset(&[1.0, 3.0]).fingerprint()
        );
        assert_eq!(fingerprint(&[]).len(), 64);
    }

    #[test]
    fn test_repeated_lookup_hits_cache() {
        let pipeline = SalesPipeline::new(PipelineConfig::default()).unwrap();
        let data = dataset(&[100.0, 200.0, 300.0]);
        let filters = FilterSet::new();
        let mut cache = AnalysisCache::new();

        let first = cache
            .get_or_compute(&data, &filters, |d, f| pipeline.analyze(d, f))
            .clone();
        let second = cache
            .get_or_compute(&data, &filters, |_, _| panic!("should be cached"))
            .clone();

        assert_eq!(first, second);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);

        cache.get_or_compute(&data, &filters.clone().with_client("C0"), |d, f| {
            pipeline.analyze(d, f)
        });
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_new_fingerprint_invalidates_entries() {
        let pipeline = SalesPipeline::new(PipelineConfig::default()).unwrap();
        let mut cache = AnalysisCache::new();
        let filters = FilterSet::new();

        cache.get_or_compute(&dataset(&[1.0, 2.0]), &filters, |d, f| pipeline.analyze(d, f));
        cache.get_or_compute(
            &dataset(&[1.0, 2.0]),
            &filters.clone().with_client("C1"),
            |d, f| pipeline.analyze(d, f),
        );
        assert_eq!(cache.len(), 2);

        let reloaded = dataset(&[5.0, 6.0, 7.0]);
        let analysis = cache.get_or_compute(&reloaded, &filters, |d, f| pipeline.analyze(d, f));
        assert_eq!(analysis.metrics.total_sales, 18.0);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.misses(), 3);
    }
}
