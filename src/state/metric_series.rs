use std::cmp::Ordering;

use serde::Deserialize;

/// Color palette for metric series, cycled by series index.
pub const COLOR_PALETTE: [[u8; 4]; 12] = [
    [31, 119, 180, 255],  // Blue
    [255, 127, 14, 255],  // Orange
    [44, 160, 44, 255],   // Green
    [214, 39, 40, 255],   // Red
    [148, 103, 189, 255], // Purple
    [140, 86, 75, 255],   // Brown
    [227, 119, 194, 255], // Pink
    [127, 127, 127, 255], // Gray
    [188, 189, 34, 255],  // Olive
    [23, 190, 207, 255],  // Cyan
    [255, 187, 120, 255], // Light Orange
    [152, 223, 138, 255], // Light Green
];

pub fn color_for_index(index: usize) -> [u8; 4] {
    COLOR_PALETTE[index % COLOR_PALETTE.len()]
}

/// One recorded value of a metric, normalized from a raw history entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricPoint {
    pub value: f64,
    pub step: i64,
    pub timestamp: f64,
}

/// A field that arrives as either a JSON number or a string, depending on
/// the producer. Both the REST payloads and the file store are inconsistent
/// about this, so coercion happens in exactly one place.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumberOrString {
    Number(f64),
    Text(String),
}

impl NumberOrString {
    fn as_f64(&self) -> Option<f64> {
        match self {
            NumberOrString::Number(n) => Some(*n),
            NumberOrString::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            NumberOrString::Number(n) => Some(*n as i64),
            NumberOrString::Text(s) => s.trim().parse::<i64>().ok(),
        }
    }
}

/// A metric history entry as produced upstream, before normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMetricEntry {
    pub key: String,
    pub value: f64,
    #[serde(default)]
    pub step: Option<NumberOrString>,
    #[serde(default)]
    pub timestamp: Option<NumberOrString>,
}

impl RawMetricEntry {
    /// Coerce the loosely-typed fields into a `MetricPoint`.
    ///
    /// An unparsable step defaults to 0; an unparsable timestamp becomes
    /// `NaN` (sorted last by the total-order comparators below).
    pub fn normalize(&self) -> MetricPoint {
        MetricPoint {
            value: self.value,
            step: self.step.as_ref().and_then(|s| s.as_i64()).unwrap_or(0),
            timestamp: self
                .timestamp
                .as_ref()
                .and_then(|t| t.as_f64())
                .unwrap_or(f64::NAN),
        }
    }
}

/// Full recorded history of one metric on one run.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    pub metric_key: String,
    pub history: Vec<MetricPoint>,
    pub run_uuid: String,
    pub run_display_name: String,
    pub color: [u8; 4],
}

impl MetricSeries {
    pub fn color32(&self) -> egui::Color32 {
        egui::Color32::from_rgba_unmultiplied(
            self.color[0],
            self.color[1],
            self.color[2],
            self.color[3],
        )
    }
}

/// Ascending by timestamp. `NaN` timestamps sort last.
pub fn compare_by_timestamp(a: &MetricPoint, b: &MetricPoint) -> Ordering {
    a.timestamp.total_cmp(&b.timestamp)
}

/// Ascending by `(step, timestamp)`, tie-broken by timestamp.
pub fn compare_by_step_and_timestamp(a: &MetricPoint, b: &MetricPoint) -> Ordering {
    a.step
        .cmp(&b.step)
        .then_with(|| a.timestamp.total_cmp(&b.timestamp))
}
