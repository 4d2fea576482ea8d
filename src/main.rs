mod app;
mod data;
mod state;
mod ui;

use std::path::PathBuf;

use app::{AppOptions, RunPlotApp};
use eframe::egui;

fn parse_args() -> AppOptions {
    let mut options = AppOptions {
        tracking_root: PathBuf::from("mlruns"),
        experiment_id: "0".to_string(),
        run_uuids: Vec::new(),
        metric_key: None,
    };

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--experiment" => {
                if let Some(id) = args.next() {
                    options.experiment_id = id;
                }
            }
            "--metric" => {
                options.metric_key = args.next();
            }
            "--run" => {
                if let Some(run_uuid) = args.next() {
                    options.run_uuids.push(run_uuid);
                }
            }
            path => options.tracking_root = PathBuf::from(path),
        }
    }
    options
}

fn main() -> eframe::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let options = parse_args();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("RunPlot")
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([800.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "RunPlot",
        native_options,
        Box::new(move |cc| Ok(Box::new(RunPlotApp::new(cc, options)))),
    )
}
