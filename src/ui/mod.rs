pub mod metrics_panel;
pub mod plot_controls;
pub mod plot_view;
pub mod run_links_popover;
