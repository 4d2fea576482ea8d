use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::ui::plot_view::ChartClick;

/// Delay before a chart click is applied to the popover. Matches the chart
/// legend's own double-click suppression window.
pub const POPOVER_TOGGLE_DELAY: Duration = Duration::from_millis(300);

/// Horizontal offset so the popover arrow lines up with the clicked point.
pub const POPOVER_ARROW_OFFSET: f32 = 20.0;

/// One run entry shown in the popover, colored like its series.
#[derive(Debug, Clone, PartialEq)]
pub struct RunLink {
    pub run_uuid: String,
    pub color: [u8; 4],
}

#[derive(Debug, Clone, Default)]
pub struct PopoverState {
    pub visible: bool,
    pub x: f32,
    pub y: f32,
    pub clicked_run_uuid: String,
    pub clicked_point_index: Option<usize>,
    pub runs_data: Vec<RunLink>,
}

/// Imperative control surface for the popover.
///
/// The panel commands the popover through this handle instead of routing
/// its state through the whole UI tree. Single external writer (the panel)
/// by convention.
#[derive(Clone, Default)]
pub struct PopoverHandle {
    inner: Arc<Mutex<PopoverState>>,
}

impl PopoverHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&self) {
        self.inner.lock().unwrap().visible = true;
    }

    pub fn hide(&self) {
        self.inner.lock().unwrap().visible = false;
    }

    pub fn snapshot(&self) -> PopoverState {
        self.inner.lock().unwrap().clone()
    }

    /// Apply a (debounced) chart click.
    ///
    /// A click on a new point, or while hidden, shows the popover; clicking
    /// the same point while visible toggles it closed. The displayed run
    /// list is replaced with one entry per overlapping point.
    pub fn update_content(&self, click: &ChartClick) {
        let Some(first) = click.points.first() else {
            return;
        };
        let mut state = self.inner.lock().unwrap();
        let clicked_different_point = first.run_uuid != state.clicked_run_uuid
            || Some(first.point_index) != state.clicked_point_index;

        state.visible = !state.visible || clicked_different_point;
        state.x = click.screen_pos.x - POPOVER_ARROW_OFFSET;
        state.y = click.screen_pos.y;
        state.clicked_run_uuid = first.run_uuid.clone();
        state.clicked_point_index = Some(first.point_index);
        state.runs_data = click
            .points
            .iter()
            .map(|p| RunLink { run_uuid: p.run_uuid.clone(), color: p.color })
            .collect();
    }
}

/// Debounce for chart clicks, so a double click (the chart's zoom-reset
/// gesture) does not flicker the popover.
///
/// Last click wins: a new click replaces the pending one and restarts the
/// window; `cancel` (on double click) discards it; `poll` fires the
/// surviving click exactly once after the delay elapses.
#[derive(Default)]
pub struct ClickDebounce {
    pending: Option<(ChartClick, Instant)>,
}

impl ClickDebounce {
    pub fn click(&mut self, click: ChartClick, now: Instant) {
        self.pending = Some((click, now + POPOVER_TOGGLE_DELAY));
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn poll(&mut self, now: Instant) -> Option<ChartClick> {
        match &self.pending {
            Some((_, due)) if now >= *due => self.pending.take().map(|(click, _)| click),
            _ => None,
        }
    }
}

/// What the user did inside the popover this frame.
#[derive(Debug, Clone, PartialEq)]
pub enum PopoverAction {
    Close,
    JumpToRun(String),
}

/// Render the popover at its stored screen position.
pub fn show_run_links_popover(ctx: &egui::Context, handle: &PopoverHandle) -> Option<PopoverAction> {
    let state = handle.snapshot();
    if !state.visible {
        return None;
    }

    let mut action = None;
    egui::Area::new(egui::Id::new("run_links_popover"))
        .fixed_pos(egui::pos2(state.x, state.y))
        .order(egui::Order::Foreground)
        .show(ctx, |ui| {
            egui::Frame::popup(&ctx.style()).show(ui, |ui| {
                ui.set_min_width(200.0);
                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new("Jump to the run").strong());
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.small_button("x").on_hover_text("Close").clicked() {
                            action = Some(PopoverAction::Close);
                        }
                    });
                });
                ui.separator();
                for link in &state.runs_data {
                    let color = egui::Color32::from_rgba_unmultiplied(
                        link.color[0],
                        link.color[1],
                        link.color[2],
                        link.color[3],
                    );
                    if ui
                        .link(egui::RichText::new(&link.run_uuid).color(color))
                        .clicked()
                    {
                        action = Some(PopoverAction::JumpToRun(link.run_uuid.clone()));
                    }
                }
            });
        });
    action
}
