use std::time::{Duration, Instant};

use crate::data::history::{pairs_to_fetch, FetchRequest, RequestId};
use crate::data::query::{self, Navigator};
use crate::data::store::MetricStore;
use crate::state::metric_series::MetricSeries;
use crate::state::plot_options::{ChartType, XAxis};
use crate::ui::plot_controls::{show_plot_controls, ControlsAction, ControlsProps};
use crate::ui::plot_view::{show_plot_view, PlotGesture, PlotViewProps};
use crate::ui::run_links_popover::{
    show_run_links_popover, ClickDebounce, PopoverAction, PopoverHandle,
};

/// The metrics plot panel: selection state, derivation logic, and the
/// coordination between the controls bar, the chart, and the run-links
/// popover.
pub struct MetricsPlotPanel {
    run_uuids: Vec<String>,
    /// Primary metric key the page was opened with.
    metric_key: String,
    selected_metric_keys: Vec<String>,
    selected_x_axis: XAxis,
    show_point: bool,
    y_axis_log_scale: bool,
    line_smoothness: f64,
    /// Ids of all history fetches issued so far. Accumulates across
    /// selection changes; completion is observed by the app, not here.
    history_request_ids: Vec<RequestId>,
    popover: PopoverHandle,
    click_debounce: ClickDebounce,
}

impl MetricsPlotPanel {
    /// Create the panel, restoring a previous metric selection from the
    /// current query string (falling back to the primary key), and return
    /// the initial history fetches to issue.
    pub fn new(
        run_uuids: Vec<String>,
        metric_key: String,
        store: &MetricStore,
        navigator: &Navigator,
    ) -> (Self, Vec<FetchRequest>) {
        let from_url = query::plot_metric_keys_from_query(navigator.search());
        let selected_metric_keys =
            if from_url.is_empty() { vec![metric_key.clone()] } else { from_url };

        let mut panel = Self {
            run_uuids,
            metric_key,
            selected_metric_keys,
            selected_x_axis: XAxis::default(),
            show_point: false,
            y_axis_log_scale: false,
            line_smoothness: 0.0,
            history_request_ids: Vec::new(),
            popover: PopoverHandle::new(),
            click_debounce: ClickDebounce::default(),
        };
        let runs = panel.run_uuids.clone();
        let keys = panel.selected_metric_keys.clone();
        let requests = panel.load_metric_history(store, &runs, &keys);
        (panel, requests)
    }

    pub fn selected_metric_keys(&self) -> &[String] {
        &self.selected_metric_keys
    }

    pub fn history_request_ids(&self) -> &[RequestId] {
        &self.history_request_ids
    }

    /// Build one fetch per (run, metric) pair with a known latest value,
    /// recording the generated request ids. Fire-and-forget: the returned
    /// requests are executed by the caller.
    pub fn load_metric_history(
        &mut self,
        store: &MetricStore,
        run_uuids: &[String],
        metric_keys: &[String],
    ) -> Vec<FetchRequest> {
        let mut requests = Vec::new();
        for (run_uuid, metric_key) in pairs_to_fetch(store, run_uuids, metric_keys) {
            let request_id = RequestId::next();
            self.history_request_ids.push(request_id);
            requests.push(FetchRequest { request_id, run_uuid, metric_key });
        }
        requests
    }

    /// The selected series, histories sorted for the active x-axis mode.
    /// See `MetricStore::select_and_sort` for the in-place sort contract.
    pub fn get_metrics<'a>(&self, store: &'a mut MetricStore) -> Vec<&'a MetricSeries> {
        store.select_and_sort(&self.selected_metric_keys, self.selected_x_axis)
    }

    /// Bar chart when every series is a single recorded value (a
    /// single-point run comparison); line chart otherwise.
    pub fn predict_chart_type(metrics: &[&MetricSeries]) -> ChartType {
        if !metrics.is_empty() && metrics.iter().all(|m| m.history.len() == 1) {
            ChartType::Bar
        } else {
            ChartType::Line
        }
    }

    fn update_url_with_selected_metrics(&self, navigator: &mut Navigator) {
        let experiment_id = query::experiment_id_from_query(navigator.search());
        navigator.push(query::metric_page_route(
            &self.run_uuids,
            &self.metric_key,
            experiment_id.as_deref(),
            &self.selected_metric_keys,
        ));
    }

    /// Apply a metric selection change: fetch history for a newly added
    /// key only (never a full refetch), then replace the selection and
    /// push the updated route. Fetches are issued before the route push.
    pub fn handle_metrics_select_change(
        &mut self,
        store: &MetricStore,
        navigator: &mut Navigator,
        selected: Vec<String>,
        added: Option<String>,
    ) -> Vec<FetchRequest> {
        let requests = match added {
            Some(key) => {
                let runs = self.run_uuids.clone();
                self.load_metric_history(store, &runs, &[key])
            }
            None => Vec::new(),
        };
        self.selected_metric_keys = selected;
        self.update_url_with_selected_metrics(navigator);
        requests
    }

    /// Each display option sets exactly one field; none trigger fetches.
    pub fn handle_controls_action(
        &mut self,
        store: &MetricStore,
        navigator: &mut Navigator,
        action: ControlsAction,
    ) -> Vec<FetchRequest> {
        match action {
            ControlsAction::MetricsChanged { selected, added } => {
                self.handle_metrics_select_change(store, navigator, selected, added)
            }
            ControlsAction::XAxisChanged(x_axis) => {
                self.selected_x_axis = x_axis;
                Vec::new()
            }
            ControlsAction::ShowPointChanged(show_point) => {
                self.show_point = show_point;
                Vec::new()
            }
            ControlsAction::LogScaleChanged(log_scale) => {
                self.y_axis_log_scale = log_scale;
                Vec::new()
            }
            ControlsAction::SmoothnessChanged(smoothness) => {
                self.line_smoothness = smoothness;
                Vec::new()
            }
        }
    }

    /// Route a chart gesture into the popover debounce. Clicks on empty
    /// chart area carry no points and are ignored.
    pub fn handle_plot_gesture(&mut self, gesture: PlotGesture, now: Instant) {
        match gesture {
            PlotGesture::Click(click) => {
                if click.points.is_empty() {
                    return;
                }
                self.click_debounce.click(click, now);
            }
            PlotGesture::DoubleClick => self.click_debounce.cancel(),
        }
    }

    /// Apply a debounced click to the popover, if one is due.
    pub fn poll_popover_update(&mut self, now: Instant) {
        if let Some(click) = self.click_debounce.poll(now) {
            self.popover.update_content(&click);
        }
    }

    pub fn show_popover(&self) {
        self.popover.show();
    }

    pub fn hide_popover(&self) {
        self.popover.hide();
    }

    /// Render controls, chart, and popover. Returns the history fetches
    /// the frame's interactions require.
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        store: &mut MetricStore,
        navigator: &mut Navigator,
    ) -> Vec<FetchRequest> {
        self.poll_popover_update(Instant::now());
        if self.click_debounce.is_pending() {
            // Make sure the deferred update fires even without input.
            ui.ctx().request_repaint_after(Duration::from_millis(30));
        }

        let distinct_metric_keys = store.distinct_metric_keys();
        let is_comparing = query::is_comparing(navigator.search());
        let plot_height = ui.available_height() - 40.0;

        let controls_action;
        let gesture;
        {
            let metrics = self.get_metrics(store);
            let chart_type = Self::predict_chart_type(&metrics);

            controls_action = show_plot_controls(
                ui,
                &ControlsProps {
                    distinct_metric_keys: &distinct_metric_keys,
                    selected_metric_keys: &self.selected_metric_keys,
                    selected_x_axis: self.selected_x_axis,
                    show_point: self.show_point,
                    y_axis_log_scale: self.y_axis_log_scale,
                    line_smoothness: self.line_smoothness,
                    chart_type,
                },
            );

            gesture = show_plot_view(
                ui,
                &PlotViewProps {
                    metrics: &metrics,
                    x_axis: self.selected_x_axis,
                    chart_type,
                    show_point: self.show_point,
                    y_axis_log_scale: self.y_axis_log_scale,
                    line_smoothness: self.line_smoothness,
                    is_comparing,
                },
                plot_height.max(200.0),
            );
        }

        if let Some(gesture) = gesture {
            self.handle_plot_gesture(gesture, Instant::now());
        }

        let mut requests = Vec::new();
        if let Some(action) = controls_action {
            requests = self.handle_controls_action(store, navigator, action);
        }

        match show_run_links_popover(ui.ctx(), &self.popover) {
            Some(PopoverAction::Close) => self.hide_popover(),
            Some(PopoverAction::JumpToRun(run_uuid)) => {
                let experiment_id = query::experiment_id_from_query(navigator.search());
                navigator.push(query::run_page_route(experiment_id.as_deref(), &run_uuid));
                self.hide_popover();
            }
            None => {}
        }

        requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::metric_series::MetricPoint;
    use crate::ui::plot_view::{ChartClick, ClickedPoint};
    use std::collections::BTreeMap;

    fn point(value: f64, step: i64, timestamp: f64) -> MetricPoint {
        MetricPoint { value, step, timestamp }
    }

    fn test_store() -> MetricStore {
        let mut store = MetricStore::new();
        store.register_run(
            "run-a".to_string(),
            "alpha".to_string(),
            BTreeMap::from([("loss".to_string(), 0.2), ("acc".to_string(), 0.9)]),
        );
        store.register_run(
            "run-b".to_string(),
            "beta".to_string(),
            BTreeMap::from([("loss".to_string(), 0.4)]),
        );
        store
    }

    fn test_navigator(store: &MetricStore) -> Navigator {
        let runs: Vec<String> = store.run_uuids().to_vec();
        Navigator::new(query::metric_page_route(&runs, "loss", Some("0"), &[]))
    }

    fn series(key: &str, history: Vec<MetricPoint>) -> MetricSeries {
        MetricSeries {
            metric_key: key.to_string(),
            history,
            run_uuid: "run-a".to_string(),
            run_display_name: "alpha".to_string(),
            color: [0, 0, 0, 255],
        }
    }

    #[test]
    fn chart_type_is_bar_only_for_all_single_point_series() {
        let single_a = series("loss", vec![point(0.1, 0, 1.0)]);
        let single_b = series("acc", vec![point(0.9, 0, 1.0)]);
        let multi = series("loss", vec![point(0.1, 0, 1.0), point(0.2, 1, 2.0)]);

        assert_eq!(MetricsPlotPanel::predict_chart_type(&[]), ChartType::Line);
        assert_eq!(
            MetricsPlotPanel::predict_chart_type(&[&single_a, &single_b]),
            ChartType::Bar
        );
        assert_eq!(
            MetricsPlotPanel::predict_chart_type(&[&single_a, &multi]),
            ChartType::Line
        );
    }

    #[test]
    fn init_defaults_to_the_primary_metric_and_fetches_it() {
        let store = test_store();
        let navigator = test_navigator(&store);
        let (panel, requests) = MetricsPlotPanel::new(
            store.run_uuids().to_vec(),
            "loss".to_string(),
            &store,
            &navigator,
        );

        assert_eq!(panel.selected_metric_keys(), ["loss"]);
        // Both runs have a latest value for "loss".
        assert_eq!(requests.len(), 2);
        assert_eq!(panel.history_request_ids().len(), 2);
    }

    #[test]
    fn init_restores_the_selection_from_the_url() {
        let store = test_store();
        let navigator = Navigator::new(
            r#"/metric/loss?runs=["run-a","run-b"]&experiment=0&plot_metric_keys=["acc","loss"]"#
                .to_string(),
        );
        let (panel, requests) = MetricsPlotPanel::new(
            store.run_uuids().to_vec(),
            "loss".to_string(),
            &store,
            &navigator,
        );

        assert_eq!(panel.selected_metric_keys(), ["acc", "loss"]);
        // acc exists only on run-a; loss on both.
        assert_eq!(requests.len(), 3);
    }

    #[test]
    fn adding_a_metric_fetches_only_runs_that_recorded_it() {
        let store = test_store();
        let mut navigator = test_navigator(&store);
        let (mut panel, _) = MetricsPlotPanel::new(
            store.run_uuids().to_vec(),
            "loss".to_string(),
            &store,
            &navigator,
        );
        let ids_before = panel.history_request_ids().len();

        let requests = panel.handle_metrics_select_change(
            &store,
            &mut navigator,
            vec!["loss".to_string(), "acc".to_string()],
            Some("acc".to_string()),
        );

        // Only run-a ever logged "acc".
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].run_uuid, "run-a");
        assert_eq!(requests[0].metric_key, "acc");
        // Request ids accumulate rather than being replaced.
        assert_eq!(panel.history_request_ids().len(), ids_before + 1);
    }

    #[test]
    fn selection_change_round_trips_through_the_url() {
        let store = test_store();
        let mut navigator = test_navigator(&store);
        let (mut panel, _) = MetricsPlotPanel::new(
            store.run_uuids().to_vec(),
            "loss".to_string(),
            &store,
            &navigator,
        );

        let selection = vec!["loss".to_string(), "acc".to_string()];
        panel.handle_metrics_select_change(
            &store,
            &mut navigator,
            selection.clone(),
            Some("acc".to_string()),
        );

        assert_eq!(query::plot_metric_keys_from_query(navigator.search()), selection);
        assert_eq!(query::experiment_id_from_query(navigator.search()).as_deref(), Some("0"));
        assert!(query::is_comparing(navigator.search()));
    }

    #[test]
    fn removing_a_metric_updates_the_url_without_fetching() {
        let store = test_store();
        let mut navigator = test_navigator(&store);
        let (mut panel, _) = MetricsPlotPanel::new(
            store.run_uuids().to_vec(),
            "loss".to_string(),
            &store,
            &navigator,
        );

        let requests = panel.handle_metrics_select_change(
            &store,
            &mut navigator,
            Vec::new(),
            None,
        );
        assert!(requests.is_empty());
        assert!(query::plot_metric_keys_from_query(navigator.search()).is_empty());
    }

    #[test]
    fn display_options_do_not_fetch() {
        let store = test_store();
        let mut navigator = test_navigator(&store);
        let (mut panel, _) = MetricsPlotPanel::new(
            store.run_uuids().to_vec(),
            "loss".to_string(),
            &store,
            &navigator,
        );
        let ids_before = panel.history_request_ids().len();
        let routes_before = navigator.current().to_string();

        for action in [
            ControlsAction::XAxisChanged(XAxis::Step),
            ControlsAction::ShowPointChanged(true),
            ControlsAction::LogScaleChanged(true),
            ControlsAction::SmoothnessChanged(40.0),
        ] {
            let requests = panel.handle_controls_action(&store, &mut navigator, action);
            assert!(requests.is_empty());
        }
        assert_eq!(panel.history_request_ids().len(), ids_before);
        assert_eq!(panel.selected_x_axis, XAxis::Step);
        assert!(panel.show_point);
        assert!(panel.y_axis_log_scale);
        assert_eq!(panel.line_smoothness, 40.0);
        assert_eq!(navigator.current(), routes_before);
    }

    #[test]
    fn debounced_click_reaches_the_popover_once() {
        let store = test_store();
        let navigator = test_navigator(&store);
        let (mut panel, _) = MetricsPlotPanel::new(
            store.run_uuids().to_vec(),
            "loss".to_string(),
            &store,
            &navigator,
        );

        let t0 = Instant::now();
        let click = ChartClick {
            points: vec![ClickedPoint {
                run_uuid: "run-a".to_string(),
                point_index: 4,
                color: [0, 0, 0, 255],
            }],
            screen_pos: egui::pos2(120.0, 80.0),
        };
        panel.handle_plot_gesture(PlotGesture::Click(click), t0);

        panel.poll_popover_update(t0 + Duration::from_millis(100));
        assert!(!panel.popover.snapshot().visible);

        panel.poll_popover_update(t0 + Duration::from_millis(300));
        let state = panel.popover.snapshot();
        assert!(state.visible);
        assert_eq!(state.clicked_run_uuid, "run-a");
        assert_eq!(state.clicked_point_index, Some(4));
    }

    #[test]
    fn double_click_suppresses_the_pending_popover_update() {
        let store = test_store();
        let navigator = test_navigator(&store);
        let (mut panel, _) = MetricsPlotPanel::new(
            store.run_uuids().to_vec(),
            "loss".to_string(),
            &store,
            &navigator,
        );

        let t0 = Instant::now();
        let click = ChartClick {
            points: vec![ClickedPoint {
                run_uuid: "run-a".to_string(),
                point_index: 0,
                color: [0, 0, 0, 255],
            }],
            screen_pos: egui::pos2(0.0, 0.0),
        };
        panel.handle_plot_gesture(PlotGesture::Click(click), t0);
        panel.handle_plot_gesture(PlotGesture::DoubleClick, t0 + Duration::from_millis(50));

        panel.poll_popover_update(t0 + Duration::from_secs(1));
        assert!(!panel.popover.snapshot().visible);
    }

    #[test]
    fn empty_chart_clicks_are_ignored() {
        let store = test_store();
        let navigator = test_navigator(&store);
        let (mut panel, _) = MetricsPlotPanel::new(
            store.run_uuids().to_vec(),
            "loss".to_string(),
            &store,
            &navigator,
        );

        let t0 = Instant::now();
        let click = ChartClick { points: Vec::new(), screen_pos: egui::pos2(0.0, 0.0) };
        panel.handle_plot_gesture(PlotGesture::Click(click), t0);
        assert!(!panel.click_debounce.is_pending());
    }
}
