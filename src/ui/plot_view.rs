use chrono::DateTime;
use egui_plot::{Bar, BarChart, Corner, Legend, Line, Plot, PlotPoint, PlotPoints, Points};

use crate::state::metric_series::MetricSeries;
use crate::state::plot_options::{ChartType, XAxis};

/// Screen-space radius within which a chart point counts as clicked.
const CLICK_HIT_RADIUS: f32 = 8.0;

/// One chart point hit by a click, per overlapping series.
#[derive(Debug, Clone, PartialEq)]
pub struct ClickedPoint {
    pub run_uuid: String,
    /// Index into the series' (sorted) history.
    pub point_index: usize,
    pub color: [u8; 4],
}

/// A click on the chart: every overlapping point plus the raw pointer
/// position in screen coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartClick {
    pub points: Vec<ClickedPoint>,
    pub screen_pos: egui::Pos2,
}

/// Pointer gestures the chart reports back to the panel.
#[derive(Debug, Clone, PartialEq)]
pub enum PlotGesture {
    Click(ChartClick),
    /// Double click is the chart's own zoom-reset gesture; the panel uses
    /// it to cancel a pending popover update.
    DoubleClick,
}

pub struct PlotViewProps<'a> {
    pub metrics: &'a [&'a MetricSeries],
    pub x_axis: XAxis,
    pub chart_type: ChartType,
    pub show_point: bool,
    pub y_axis_log_scale: bool,
    /// 0..=100; 0 disables smoothing.
    pub line_smoothness: f64,
    pub is_comparing: bool,
}

/// Map one series to plot coordinates for the active display options.
///
/// Log scale drops non-positive values instead of producing infinities, so
/// the returned pairs carry the original history index alongside each point.
pub fn series_points(
    series: &MetricSeries,
    x_axis: XAxis,
    log_scale: bool,
    smoothness: f64,
) -> Vec<(usize, [f64; 2])> {
    let Some(first) = series.history.first() else {
        return Vec::new();
    };
    let values: Vec<f64> = series.history.iter().map(|p| p.value).collect();
    let values = ema_smooth(&values, smoothness / 100.0);

    series
        .history
        .iter()
        .zip(values)
        .enumerate()
        .filter_map(|(index, (point, value))| {
            let x = match x_axis {
                XAxis::Relative => (point.timestamp - first.timestamp) / 1000.0,
                XAxis::Step => point.step as f64,
                XAxis::WallClock => point.timestamp,
            };
            let y = if log_scale {
                if value > 0.0 {
                    value.log10()
                } else {
                    return None;
                }
            } else {
                value
            };
            if x.is_finite() && y.is_finite() {
                Some((index, [x, y]))
            } else {
                None
            }
        })
        .collect()
}

/// Exponential moving average with TensorBoard-style weighting.
/// `weight` 0 returns the input unchanged.
pub fn ema_smooth(values: &[f64], weight: f64) -> Vec<f64> {
    if weight <= 0.0 {
        return values.to_vec();
    }
    let weight = weight.min(0.99);
    let mut smoothed = Vec::with_capacity(values.len());
    let mut last: Option<f64> = None;
    for &value in values {
        let next = match last {
            Some(prev) => prev * weight + value * (1.0 - weight),
            None => value,
        };
        smoothed.push(next);
        last = Some(next);
    }
    smoothed
}

/// Legend label: the metric key alone, or suffixed with the run name when
/// several runs are on the chart.
pub fn legend_label(series: &MetricSeries, is_comparing: bool) -> String {
    if is_comparing {
        format!("{}, {}", series.metric_key, series.run_display_name)
    } else {
        series.metric_key.clone()
    }
}

fn format_wall_clock(timestamp_ms: f64) -> String {
    let secs = (timestamp_ms / 1000.0).floor() as i64;
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Render the chart and report any click/double-click gesture.
pub fn show_plot_view(
    ui: &mut egui::Ui,
    props: &PlotViewProps<'_>,
    height: f32,
) -> Option<PlotGesture> {
    // Per-series plot points, computed once for drawing and hit testing.
    let per_series: Vec<Vec<(usize, [f64; 2])>> = match props.chart_type {
        ChartType::Line => props
            .metrics
            .iter()
            .map(|m| series_points(m, props.x_axis, props.y_axis_log_scale, props.line_smoothness))
            .collect(),
        ChartType::Bar => props
            .metrics
            .iter()
            .enumerate()
            .map(|(i, m)| {
                m.history.first().map(|p| (0, [i as f64, p.value])).into_iter().collect()
            })
            .collect(),
    };

    let mut plot = Plot::new("metrics_plot")
        .legend(Legend::default().position(Corner::RightTop))
        .height(height);

    match props.chart_type {
        ChartType::Line if props.x_axis == XAxis::WallClock => {
            plot = plot.x_axis_formatter(|mark, _range| format_wall_clock(mark.value));
        }
        ChartType::Bar => {
            let labels: Vec<String> =
                props.metrics.iter().map(|m| legend_label(m, props.is_comparing)).collect();
            plot = plot.x_axis_formatter(move |mark, _range| {
                let idx = mark.value.round();
                if (mark.value - idx).abs() < 1e-6 && idx >= 0.0 && (idx as usize) < labels.len() {
                    labels[idx as usize].clone()
                } else {
                    String::new()
                }
            });
        }
        _ => {}
    }
    if props.y_axis_log_scale {
        plot = plot.y_axis_label("log10");
    }

    let response = plot.show(ui, |plot_ui| {
        match props.chart_type {
            ChartType::Line => {
                for (series, points) in props.metrics.iter().zip(&per_series) {
                    let coords: Vec<[f64; 2]> = points.iter().map(|(_, p)| *p).collect();
                    plot_ui.line(
                        Line::new(PlotPoints::from(coords.clone()))
                            .color(series.color32())
                            .name(legend_label(series, props.is_comparing))
                            .width(2.0),
                    );
                    if props.show_point {
                        plot_ui.points(
                            Points::new(PlotPoints::from(coords))
                                .color(series.color32())
                                .radius(2.5),
                        );
                    }
                }
            }
            ChartType::Bar => {
                for (i, series) in props.metrics.iter().enumerate() {
                    let Some(point) = series.history.first() else { continue };
                    let bar = Bar::new(i as f64, point.value).width(0.6);
                    plot_ui.bar_chart(
                        BarChart::new(vec![bar])
                            .color(series.color32())
                            .name(legend_label(series, props.is_comparing)),
                    );
                }
            }
        }

        if plot_ui.response().double_clicked() {
            return Some(PlotGesture::DoubleClick);
        }
        if plot_ui.response().clicked() {
            if let Some(pointer) = plot_ui.response().interact_pointer_pos() {
                let transform = plot_ui.transform();
                let mut hits = Vec::new();
                for (series, points) in props.metrics.iter().zip(&per_series) {
                    let mut best: Option<(usize, f32)> = None;
                    for (index, [x, y]) in points {
                        let screen = transform.position_from_point(&PlotPoint::new(*x, *y));
                        let dist = screen.distance(pointer);
                        if dist <= CLICK_HIT_RADIUS
                            && best.map_or(true, |(_, d)| dist < d)
                        {
                            best = Some((*index, dist));
                        }
                    }
                    if let Some((point_index, _)) = best {
                        hits.push(ClickedPoint {
                            run_uuid: series.run_uuid.clone(),
                            point_index,
                            color: series.color,
                        });
                    }
                }
                return Some(PlotGesture::Click(ChartClick { points: hits, screen_pos: pointer }));
            }
        }
        None
    });
    response.inner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::metric_series::MetricPoint;

    fn series(history: Vec<MetricPoint>) -> MetricSeries {
        MetricSeries {
            metric_key: "loss".to_string(),
            history,
            run_uuid: "run-a".to_string(),
            run_display_name: "alpha".to_string(),
            color: [31, 119, 180, 255],
        }
    }

    fn point(value: f64, step: i64, timestamp: f64) -> MetricPoint {
        MetricPoint { value, step, timestamp }
    }

    #[test]
    fn relative_axis_is_seconds_since_first_point() {
        let s = series(vec![point(1.0, 0, 1000.0), point(2.0, 1, 4000.0)]);
        let pts = series_points(&s, XAxis::Relative, false, 0.0);
        assert_eq!(pts, vec![(0, [0.0, 1.0]), (1, [3.0, 2.0])]);
    }

    #[test]
    fn step_axis_uses_step_index() {
        let s = series(vec![point(1.0, 5, 1000.0), point(2.0, 9, 4000.0)]);
        let pts = series_points(&s, XAxis::Step, false, 0.0);
        assert_eq!(pts[0].1[0], 5.0);
        assert_eq!(pts[1].1[0], 9.0);
    }

    #[test]
    fn log_scale_drops_non_positive_values() {
        let s = series(vec![point(100.0, 0, 0.0), point(-1.0, 1, 1.0), point(0.0, 2, 2.0)]);
        let pts = series_points(&s, XAxis::Step, true, 0.0);
        assert_eq!(pts.len(), 1);
        assert_eq!(pts[0], (0, [0.0, 2.0]));
    }

    #[test]
    fn nan_timestamps_are_filtered_in_time_modes() {
        let s = series(vec![point(1.0, 0, 1000.0), point(2.0, 1, f64::NAN)]);
        assert_eq!(series_points(&s, XAxis::WallClock, false, 0.0).len(), 1);
    }

    #[test]
    fn zero_smoothing_is_identity() {
        let values = vec![1.0, 5.0, 2.0];
        assert_eq!(ema_smooth(&values, 0.0), values);
    }

    #[test]
    fn smoothing_pulls_values_toward_the_running_average() {
        let smoothed = ema_smooth(&[0.0, 10.0], 0.5);
        assert_eq!(smoothed[0], 0.0);
        assert_eq!(smoothed[1], 5.0);
    }

    #[test]
    fn legend_includes_run_name_only_when_comparing() {
        let s = series(vec![point(1.0, 0, 0.0)]);
        assert_eq!(legend_label(&s, false), "loss");
        assert_eq!(legend_label(&s, true), "loss, alpha");
    }
}
