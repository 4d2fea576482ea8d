use crate::state::plot_options::{ChartType, XAxis};

/// A change the user made in the controls bar this frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlsAction {
    /// The metric selection changed. `added` names the key that was just
    /// selected, if the change was an addition.
    MetricsChanged { selected: Vec<String>, added: Option<String> },
    XAxisChanged(XAxis),
    ShowPointChanged(bool),
    LogScaleChanged(bool),
    SmoothnessChanged(f64),
}

pub struct ControlsProps<'a> {
    pub distinct_metric_keys: &'a [String],
    pub selected_metric_keys: &'a [String],
    pub selected_x_axis: XAxis,
    pub show_point: bool,
    pub y_axis_log_scale: bool,
    pub line_smoothness: f64,
    pub chart_type: ChartType,
}

/// Toggle a key in the selection, preserving user order for additions.
pub fn toggle_metric_key(selected: &[String], key: &str) -> (Vec<String>, Option<String>) {
    let mut next: Vec<String> = selected.to_vec();
    if let Some(pos) = next.iter().position(|k| k == key) {
        next.remove(pos);
        (next, None)
    } else {
        next.push(key.to_string());
        (next, Some(key.to_string()))
    }
}

/// Render the controls bar above the chart.
pub fn show_plot_controls(ui: &mut egui::Ui, props: &ControlsProps<'_>) -> Option<ControlsAction> {
    let mut action = None;

    ui.horizontal_wrapped(|ui| {
        ui.spacing_mut().item_spacing.x = 6.0;

        // -- Metric multi-select popup --
        let popup_id = ui.make_persistent_id("metric_select_popup");
        let label = format!("Metrics ({})", props.selected_metric_keys.len());
        let select_resp = ui
            .add(egui::Button::new(label).min_size(egui::vec2(0.0, 26.0)))
            .on_hover_text("Choose which metrics to plot");
        if select_resp.clicked() {
            ui.memory_mut(|m| m.toggle_popup(popup_id));
        }
        egui::popup_below_widget(
            ui,
            popup_id,
            &select_resp,
            egui::PopupCloseBehavior::CloseOnClickOutside,
            |ui| {
                ui.set_min_width(220.0);
                if props.distinct_metric_keys.is_empty() {
                    ui.label(egui::RichText::new("No recorded metrics.").weak());
                    return;
                }
                egui::ScrollArea::vertical().max_height(240.0).show(ui, |ui| {
                    for key in props.distinct_metric_keys {
                        let mut checked = props.selected_metric_keys.contains(key);
                        if ui.checkbox(&mut checked, key.as_str()).changed() {
                            let (selected, added) =
                                toggle_metric_key(props.selected_metric_keys, key);
                            action = Some(ControlsAction::MetricsChanged { selected, added });
                        }
                    }
                });
            },
        );

        ui.separator();
        ui.label(
            egui::RichText::new(format!("{} chart", props.chart_type.label())).weak(),
        );

        // X-axis and line display options only apply to line charts; a bar
        // chart is a single-value-per-run comparison with no useful x mode.
        if props.chart_type == ChartType::Line {
            ui.separator();
            ui.label("X-axis:");
            for x_axis in XAxis::ALL {
                let active = props.selected_x_axis == x_axis;
                if ui.selectable_label(active, x_axis.label()).clicked() && !active {
                    action = Some(ControlsAction::XAxisChanged(x_axis));
                }
            }

            ui.separator();
            let mut show_point = props.show_point;
            if ui.checkbox(&mut show_point, "Points").changed() {
                action = Some(ControlsAction::ShowPointChanged(show_point));
            }
            let mut log_scale = props.y_axis_log_scale;
            if ui.checkbox(&mut log_scale, "Log scale").changed() {
                action = Some(ControlsAction::LogScaleChanged(log_scale));
            }

            ui.separator();
            ui.label("Smoothing:");
            let mut smoothness = props.line_smoothness;
            if ui
                .add(egui::Slider::new(&mut smoothness, 0.0..=100.0).show_value(false))
                .changed()
            {
                action = Some(ControlsAction::SmoothnessChanged(smoothness));
            }
        }
    });

    action
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_an_unselected_key_appends_it() {
        let selected = vec!["loss".to_string()];
        let (next, added) = toggle_metric_key(&selected, "acc");
        assert_eq!(next, vec!["loss", "acc"]);
        assert_eq!(added.as_deref(), Some("acc"));
    }

    #[test]
    fn toggling_a_selected_key_removes_it_without_marking_an_addition() {
        let selected = vec!["loss".to_string(), "acc".to_string()];
        let (next, added) = toggle_metric_key(&selected, "loss");
        assert_eq!(next, vec!["acc"]);
        assert_eq!(added, None);
    }
}
