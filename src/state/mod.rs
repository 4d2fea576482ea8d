pub mod metric_series;
pub mod plot_options;
