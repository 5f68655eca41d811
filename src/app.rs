use eframe::egui;

use crate::state::AppState;
use crate::ui::{panels, table};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct BudgetDashboardApp {
    pub state: AppState,
}

impl BudgetDashboardApp {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl eframe::App for BudgetDashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: filters (hidden when loading failed) ----
        if self.state.dataset.is_some() {
            egui::SidePanel::left("filter_panel")
                .default_width(260.0)
                .resizable(true)
                .show(ctx, |ui| {
                    panels::side_panel(ui, &mut self.state);
                });
        }

        // ---- Central panel: banner + table ----
        egui::CentralPanel::default().show(ctx, |ui| {
            table::records_view(ui, &self.state);
        });
    }
}
