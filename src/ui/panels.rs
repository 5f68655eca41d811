use std::path::PathBuf;

use anyhow::{Context, Result};
use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::data::export::EXPORT_FILE_NAME;
use crate::data::filter::{Dimension, ALL};
use crate::state::{AppState, StatusMessage};

// ---------------------------------------------------------------------------
// Left side panel – filter widgets
// ---------------------------------------------------------------------------

fn dimension_label(dim: Dimension) -> &'static str {
    match dim {
        Dimension::BudgetType => "💰 รูปแบบงบประมาณ",
        Dimension::FiscalYear => "📅 ปีงบประมาณ",
        Dimension::Project => "📌 โครงการ",
        Dimension::Department => "🏢 หน่วยงาน",
    }
}

/// Render the filter panel in cascade order.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("🔍 เลือกตัวกรองข้อมูล");
    ui.separator();

    // Clone so the state can be mutated while drawing.
    let Some(view) = state.view.clone() else {
        ui.label("No dataset loaded.");
        return;
    };

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for dim in [Dimension::BudgetType, Dimension::FiscalYear, Dimension::Project] {
                let current = match dim {
                    Dimension::BudgetType => &view.selection.budget_type,
                    Dimension::FiscalYear => &view.selection.fiscal_year,
                    _ => &view.selection.project,
                };

                ui.strong(dimension_label(dim));
                let mut picked = None;
                egui::ComboBox::from_id_salt(dimension_label(dim))
                    .selected_text(current.as_str())
                    .width(ui.available_width())
                    .show_ui(ui, |ui: &mut Ui| {
                        for option in view.options(dim) {
                            if ui.selectable_label(current == option, option).clicked() {
                                picked = Some(option.clone());
                            }
                        }
                    });
                if let Some(value) = picked {
                    state.set_choice(dim, &value);
                }
                ui.add_space(6.0);
            }

            // ---- Department multi-select ----
            let selected = &view.selection.departments;
            let header_text = if selected.iter().any(|d| d == ALL) {
                format!("{}  ({ALL})", dimension_label(Dimension::Department))
            } else {
                format!(
                    "{}  ({}/{})",
                    dimension_label(Dimension::Department),
                    selected.len(),
                    view.departments.len().saturating_sub(1)
                )
            };

            egui::CollapsingHeader::new(RichText::new(header_text).strong())
                .id_salt("departments")
                .default_open(true)
                .show(ui, |ui: &mut Ui| {
                    for option in &view.departments {
                        let mut checked = selected.contains(option);
                        if ui.checkbox(&mut checked, option.as_str()).changed() {
                            state.toggle_department(option);
                        }
                    }
                });
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Reload").clicked() {
                state.reload(false);
                ui.close_menu();
            }
            if state.can_upload() && ui.button("Upload rows…").clicked() {
                upload_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(ds) = &state.dataset {
            ui.label(format!(
                "{} records loaded, {} visible",
                ds.len(),
                state.visible_indices.len()
            ));
            ui.separator();
        }

        if !state.visible_indices.is_empty()
            && ui.button(format!("📥 {EXPORT_FILE_NAME}")).clicked()
        {
            match save_export_dialog(state) {
                Ok(Some(path)) => {
                    state.status_message =
                        Some(StatusMessage::Info(format!("Saved {}", path.display())));
                }
                Ok(None) => {}
                Err(e) => {
                    log::error!("Export failed: {e:#}");
                    state.status_message = Some(StatusMessage::Error(format!("{e:#}")));
                }
            }
        }

        match &state.status_message {
            Some(StatusMessage::Info(msg)) => {
                ui.label(msg);
            }
            Some(StatusMessage::Error(msg)) => {
                ui.label(RichText::new(msg).color(Color32::RED));
            }
            None => {}
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

/// Ask where to save the filtered rows and write them. `None` if cancelled.
fn save_export_dialog(state: &AppState) -> Result<Option<PathBuf>> {
    let Some(path) = rfd::FileDialog::new()
        .set_title("Save filtered data")
        .set_file_name(EXPORT_FILE_NAME)
        .add_filter("Excel workbook", &["xlsx"])
        .save_file()
    else {
        return Ok(None);
    };

    let bytes = state.export_bytes().context("encoding xlsx")?;
    std::fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
    log::info!("Saved export to {}", path.display());
    Ok(Some(path))
}

fn upload_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Upload rows to append")
        .add_filter("Excel workbook", &["xlsx"])
        .pick_file();

    let Some(path) = file else {
        return;
    };
    match std::fs::read(&path) {
        Ok(bytes) => {
            // the failure itself is already in the status message
            if let Err(e) = state.upload(&bytes) {
                log::warn!("Upload of {} rejected: {e}", path.display());
            }
        }
        Err(e) => {
            log::error!("Failed to read {}: {e}", path.display());
            state.status_message = Some(StatusMessage::Error(format!(
                "Error reading {}: {e}",
                path.display()
            )));
        }
    }
}
