use std::path::PathBuf;

use eframe::egui;

use crate::data::file_store;
use crate::data::history::{spawn_history_fetch, FetchRequest, PendingHistoryFetch};
use crate::data::query::{self, Navigator};
use crate::data::store::MetricStore;
use crate::ui::metrics_panel::MetricsPlotPanel;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Startup options, parsed from the command line.
pub struct AppOptions {
    /// Root of the mlruns-style tracking directory.
    pub tracking_root: PathBuf,
    pub experiment_id: String,
    /// Runs to show. Empty means every run of the experiment.
    pub run_uuids: Vec<String>,
    /// Primary metric key; defaults to the first recorded key.
    pub metric_key: Option<String>,
}

/// The main RunPlot application.
pub struct RunPlotApp {
    store: MetricStore,
    panel: MetricsPlotPanel,
    navigator: Navigator,
    tracking_root: PathBuf,
    experiment_id: String,
    /// History fetches in flight, polled each frame.
    pending_fetches: Vec<PendingHistoryFetch>,
    /// An error message to display briefly in the footer.
    error_message: Option<String>,
}

impl RunPlotApp {
    pub fn new(cc: &eframe::CreationContext<'_>, options: AppOptions) -> Self {
        // --- Global UI style improvements ---
        let ctx = &cc.egui_ctx;
        let mut style = (*ctx.style()).clone();
        style.text_styles.insert(egui::TextStyle::Body, egui::FontId::proportional(15.0));
        style.text_styles.insert(egui::TextStyle::Button, egui::FontId::proportional(14.5));
        style.text_styles.insert(egui::TextStyle::Heading, egui::FontId::proportional(22.0));
        style.spacing.button_padding = egui::vec2(10.0, 5.0);
        style.spacing.item_spacing = egui::vec2(8.0, 6.0);
        style.visuals.window_corner_radius = egui::CornerRadius::same(8);
        style.visuals.widgets.inactive.corner_radius = egui::CornerRadius::same(6);
        style.visuals.widgets.hovered.corner_radius = egui::CornerRadius::same(6);
        style.visuals.widgets.active.corner_radius = egui::CornerRadius::same(6);
        ctx.set_style(style);

        let mut error_message = None;
        let mut store = MetricStore::new();
        match file_store::scan_experiment(&options.tracking_root, &options.experiment_id) {
            Ok(records) => {
                for record in records {
                    if !options.run_uuids.is_empty()
                        && !options.run_uuids.contains(&record.run_uuid)
                    {
                        continue;
                    }
                    store.register_run(
                        record.run_uuid,
                        record.display_name,
                        record.latest_metrics,
                    );
                }
            }
            Err(e) => {
                tracing::error!("Failed to scan tracking directory: {e}");
                error_message = Some(e);
            }
        }

        let run_uuids = store.run_uuids().to_vec();
        let metric_key = options
            .metric_key
            .or_else(|| store.distinct_metric_keys().first().cloned())
            .unwrap_or_default();

        let navigator = Navigator::new(query::metric_page_route(
            &run_uuids,
            &metric_key,
            Some(&options.experiment_id),
            &[],
        ));
        let (panel, requests) = MetricsPlotPanel::new(run_uuids, metric_key, &store, &navigator);

        let mut app = Self {
            store,
            panel,
            navigator,
            tracking_root: options.tracking_root,
            experiment_id: options.experiment_id,
            pending_fetches: Vec::new(),
            error_message,
        };
        app.execute_fetches(requests);
        app
    }

    fn execute_fetches(&mut self, requests: Vec<FetchRequest>) {
        for request in requests {
            self.pending_fetches.push(spawn_history_fetch(
                self.tracking_root.clone(),
                self.experiment_id.clone(),
                request,
            ));
        }
    }

    /// Collect finished history fetches and merge them into the store.
    fn poll_fetches(&mut self) {
        let mut completed = Vec::new();
        self.pending_fetches.retain(|pending| {
            let mut slot = pending.result.lock().unwrap();
            match slot.take() {
                Some(result) => {
                    completed.push((
                        pending.request_id,
                        pending.run_uuid.clone(),
                        pending.metric_key.clone(),
                        result,
                    ));
                    false
                }
                None => true,
            }
        });

        for (request_id, run_uuid, metric_key, result) in completed {
            match result {
                Ok(history) => {
                    tracing::debug!(
                        "[{request_id}] Loaded {} point(s) for {run_uuid}/{metric_key}",
                        history.len()
                    );
                    self.store.insert_history(&run_uuid, &metric_key, history);
                }
                Err(e) => {
                    tracing::error!("[{request_id}] {e}");
                    self.error_message = Some(e);
                }
            }
        }
    }
}

impl eframe::App for RunPlotApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_fetches();

        // --- Header panel ---
        egui::TopBottomPanel::top("header")
            .frame(
                egui::Frame::side_top_panel(&ctx.style())
                    .inner_margin(egui::Margin::symmetric(16, 8)),
            )
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.visuals_mut().override_text_color =
                        Some(ui.visuals().strong_text_color());
                    ui.heading("RunPlot");
                    ui.visuals_mut().override_text_color = None;
                    ui.separator();
                    ui.label(format!("Experiment {}", self.experiment_id));
                    if query::is_comparing(self.navigator.search()) {
                        ui.separator();
                        ui.label(format!("Comparing {} runs", self.store.run_uuids().len()));
                    }
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.small(format!("v{VERSION}"));
                    });
                });
            });

        // --- Footer panel ---
        egui::TopBottomPanel::bottom("footer")
            .frame(
                egui::Frame::side_top_panel(&ctx.style())
                    .inner_margin(egui::Margin::symmetric(16, 6)),
            )
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    let count = self.store.run_uuids().len();
                    let label = if count == 1 { "1 run".to_string() } else { format!("{count} runs") };
                    ui.label(egui::RichText::new(label).weak());

                    if !self.pending_fetches.is_empty() {
                        ui.separator();
                        ui.spinner();
                        ui.label(format!(
                            "Loading metric history ({} pending)",
                            self.pending_fetches.len()
                        ));
                    }

                    if let Some(msg) = &self.error_message {
                        ui.separator();
                        ui.colored_label(egui::Color32::from_rgb(255, 80, 80), msg);
                        if ui.small_button("dismiss").clicked() {
                            self.error_message = None;
                        }
                    }
                });
            });

        // --- Central panel: the metrics plot ---
        let mut requests = Vec::new();
        egui::CentralPanel::default().show(ctx, |ui| {
            if self.store.run_uuids().is_empty() {
                ui.add_space(80.0);
                ui.vertical_centered(|ui| {
                    ui.heading("No runs found");
                    ui.add_space(12.0);
                    ui.label(
                        egui::RichText::new(
                            "Point RunPlot at an mlruns directory: runplot <dir> [--experiment <id>]",
                        )
                        .weak(),
                    );
                });
                return;
            }
            requests = self.panel.show(ui, &mut self.store, &mut self.navigator);
        });
        self.execute_fetches(requests);

        if !self.pending_fetches.is_empty() {
            ctx.request_repaint();
        }
    }
}
