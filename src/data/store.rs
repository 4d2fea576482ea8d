use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::state::metric_series::{
    color_for_index, compare_by_step_and_timestamp, compare_by_timestamp, MetricPoint,
    MetricSeries,
};
use crate::state::plot_options::XAxis;

/// In-memory snapshot of the runs shown on the metric page: latest metric
/// values per run (cheap, known up front) and full metric histories
/// (filled in lazily as fetches complete).
#[derive(Debug, Clone, Default)]
pub struct MetricStore {
    run_uuids: Vec<String>,
    display_names: HashMap<String, String>,
    latest: HashMap<String, BTreeMap<String, f64>>,
    series: Vec<MetricSeries>,
}

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_run(
        &mut self,
        run_uuid: String,
        display_name: String,
        latest_metrics: BTreeMap<String, f64>,
    ) {
        if !self.run_uuids.contains(&run_uuid) {
            self.run_uuids.push(run_uuid.clone());
        }
        self.display_names.insert(run_uuid.clone(), display_name);
        self.latest.insert(run_uuid, latest_metrics);
    }

    pub fn run_uuids(&self) -> &[String] {
        &self.run_uuids
    }

    pub fn run_display_names(&self) -> Vec<String> {
        self.run_uuids.iter().map(|r| self.display_name(r)).collect()
    }

    pub fn display_name(&self, run_uuid: &str) -> String {
        match self.display_names.get(run_uuid) {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("Run {}", &run_uuid[..run_uuid.len().min(8)]),
        }
    }

    /// Latest recorded value of a metric on a run, if any was ever logged.
    pub fn latest_value(&self, run_uuid: &str, metric_key: &str) -> Option<f64> {
        self.latest.get(run_uuid)?.get(metric_key).copied()
    }

    /// Sorted, deduplicated union of metric keys across all runs' latest
    /// snapshots.
    pub fn distinct_metric_keys(&self) -> Vec<String> {
        let keys: BTreeSet<&String> = self.latest.values().flat_map(|m| m.keys()).collect();
        keys.into_iter().cloned().collect()
    }

    /// Record a fetched history for a (run, metric) pair.
    ///
    /// Empty histories are dropped so the series list only ever contains
    /// pairs with at least one recorded point; refetches replace the
    /// existing history in place, keeping at most one series per pair.
    pub fn insert_history(&mut self, run_uuid: &str, metric_key: &str, history: Vec<MetricPoint>) {
        if history.is_empty() {
            return;
        }
        if let Some(existing) = self
            .series
            .iter_mut()
            .find(|s| s.run_uuid == run_uuid && s.metric_key == metric_key)
        {
            existing.history = history;
            return;
        }
        let color = color_for_index(self.series.len());
        let run_display_name = self.display_name(run_uuid);
        self.series.push(MetricSeries {
            metric_key: metric_key.to_string(),
            history,
            run_uuid: run_uuid.to_string(),
            run_display_name,
            color,
        });
    }

    pub fn series(&self) -> &[MetricSeries] {
        &self.series
    }

    /// Filter the series list down to the selected metric keys and sort
    /// each retained history for the active x-axis mode.
    ///
    /// The sort is destructive: histories can be large, so they are
    /// reordered in place instead of copied. The returned snapshot is
    /// valid until the next call reorders them again.
    pub fn select_and_sort(&mut self, selected_keys: &[String], x_axis: XAxis) -> Vec<&MetricSeries> {
        let selected: HashSet<&str> = selected_keys.iter().map(|k| k.as_str()).collect();
        for series in &mut self.series {
            if !selected.contains(series.metric_key.as_str()) {
                continue;
            }
            // Steps are always numeric after normalization, so step order
            // applies whenever the mode asks for it and there is history.
            if x_axis == XAxis::Step && !series.history.is_empty() {
                series.history.sort_by(compare_by_step_and_timestamp);
            } else {
                series.history.sort_by(compare_by_timestamp);
            }
        }
        self.series
            .iter()
            .filter(|s| selected.contains(s.metric_key.as_str()))
            .collect()
    }
}
