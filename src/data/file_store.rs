use std::collections::BTreeMap;
use std::path::Path;

use crate::state::metric_series::{MetricPoint, NumberOrString, RawMetricEntry};

/// One run discovered in the tracking directory, with its latest metric
/// values. Full histories are fetched separately, on demand.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_uuid: String,
    pub display_name: String,
    pub latest_metrics: BTreeMap<String, f64>,
}

/// Scan an experiment directory (`<root>/<experiment-id>/`) for runs.
///
/// Each run directory contributes a latest-metric snapshot built from the
/// last line of every file under `metrics/`. Reading only the tail keeps
/// startup cheap; full histories come later via `read_metric_history`.
pub fn scan_experiment(root: &Path, experiment_id: &str) -> Result<Vec<RunRecord>, String> {
    let experiment_dir = root.join(experiment_id);
    let entries = std::fs::read_dir(&experiment_dir)
        .map_err(|e| format!("Cannot read experiment directory {experiment_dir:?}: {e}"))?;

    let mut runs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let run_uuid = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        let display_name = read_run_name(&path).unwrap_or_default();
        let latest_metrics = read_latest_metrics(&path);
        runs.push(RunRecord { run_uuid, display_name, latest_metrics });
    }
    runs.sort_by(|a, b| a.run_uuid.cmp(&b.run_uuid));
    tracing::info!(
        "Found {} run(s) in experiment {} under {:?}",
        runs.len(),
        experiment_id,
        root
    );
    Ok(runs)
}

/// Read the full recorded history of one metric on one run.
pub fn read_metric_history(
    root: &Path,
    experiment_id: &str,
    run_uuid: &str,
    metric_key: &str,
) -> Result<Vec<MetricPoint>, String> {
    let path = root.join(experiment_id).join(run_uuid).join("metrics").join(metric_key);
    let text = std::fs::read_to_string(&path)
        .map_err(|e| format!("Cannot read metric file {path:?}: {e}"))?;

    let mut history = Vec::new();
    for line in text.lines() {
        match parse_metric_line(metric_key, line) {
            Some(point) => history.push(point),
            None => {
                if !line.trim().is_empty() {
                    tracing::warn!("Skipping malformed metric line in {path:?}: {line:?}");
                }
            }
        }
    }
    Ok(history)
}

fn read_run_name(run_dir: &Path) -> Option<String> {
    let name = std::fs::read_to_string(run_dir.join("tags").join("mlflow.runName")).ok()?;
    let name = name.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn read_latest_metrics(run_dir: &Path) -> BTreeMap<String, f64> {
    let mut latest = BTreeMap::new();
    let metrics_dir = run_dir.join("metrics");
    let Ok(entries) = std::fs::read_dir(&metrics_dir) else {
        return latest;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(key) = path.file_name().and_then(|n| n.to_str()).map(String::from) else {
            continue;
        };
        let Ok(text) = std::fs::read_to_string(&path) else {
            tracing::warn!("Cannot read metric file {path:?}");
            continue;
        };
        let last = text.lines().rev().find(|l| !l.trim().is_empty());
        if let Some(point) = last.and_then(|line| parse_metric_line(&key, line)) {
            latest.insert(key, point.value);
        }
    }
    latest
}

/// Parse one metric-file line: `<timestamp> <value> [<step>]`, whitespace
/// separated. The two-field form is the legacy format without steps.
/// Returns `None` when the value field does not parse.
pub fn parse_metric_line(metric_key: &str, line: &str) -> Option<MetricPoint> {
    let mut fields = line.split_whitespace();
    let timestamp = fields.next()?;
    let value: f64 = fields.next()?.trim().parse().ok()?;
    let step = fields.next();

    let raw = RawMetricEntry {
        key: metric_key.to_string(),
        value,
        step: step.map(|s| NumberOrString::Text(s.to_string())),
        timestamp: Some(NumberOrString::Text(timestamp.to_string())),
    };
    Some(raw.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_field_lines() {
        let point = parse_metric_line("loss", "1700000000123 0.35 12").unwrap();
        assert_eq!(point.timestamp, 1700000000123.0);
        assert_eq!(point.value, 0.35);
        assert_eq!(point.step, 12);
    }

    #[test]
    fn parses_legacy_two_field_lines_with_step_zero() {
        let point = parse_metric_line("loss", "1700000000123 0.35").unwrap();
        assert_eq!(point.step, 0);
        assert_eq!(point.value, 0.35);
    }

    #[test]
    fn unparsable_step_defaults_to_zero() {
        let point = parse_metric_line("loss", "1700000000123 0.35 banana").unwrap();
        assert_eq!(point.step, 0);
    }

    #[test]
    fn unparsable_value_rejects_the_line() {
        assert!(parse_metric_line("loss", "1700000000123 banana 3").is_none());
        assert!(parse_metric_line("loss", "").is_none());
        assert!(parse_metric_line("loss", "1700000000123").is_none());
    }

    #[test]
    fn unparsable_timestamp_becomes_nan() {
        let point = parse_metric_line("loss", "sometime 0.35 3").unwrap();
        assert!(point.timestamp.is_nan());
        assert_eq!(point.value, 0.35);
    }
}
