use eframe::egui::{self, Align, Color32, Layout, RichText, ScrollArea, Stroke, Ui};
use egui_extras::{Column, TableBuilder};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Central panel: result banner + records table
// ---------------------------------------------------------------------------

const ROW_HEIGHT: f32 = 20.0;

/// Render the filtered records, or the load error if loading failed.
pub fn records_view(ui: &mut Ui, state: &AppState) {
    if let Some(err) = &state.load_error {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading(RichText::new(format!("❌ โหลดข้อมูลไม่สำเร็จ: {err}")).color(Color32::RED));
        });
        return;
    }

    let dataset = match &state.dataset {
        Some(ds) => ds,
        None => {
            ui.centered_and_justified(|ui: &mut Ui| {
                ui.heading("Loading…");
            });
            return;
        }
    };

    result_banner(ui, state.visible_indices.len());

    ui.heading("📄 ตารางข้อมูล");
    ui.separator();

    let columns = &dataset.columns;
    ScrollArea::horizontal().show(ui, |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .resizable(true)
            .cell_layout(Layout::left_to_right(Align::Center))
            .columns(Column::auto().at_least(60.0).clip(true), columns.len())
            .header(ROW_HEIGHT + 4.0, |mut header| {
                for name in columns {
                    header.col(|ui: &mut Ui| {
                        ui.strong(name.as_str());
                    });
                }
            })
            .body(|body| {
                body.rows(ROW_HEIGHT, state.visible_indices.len(), |mut row| {
                    let record = &dataset.records[state.visible_indices[row.index()]];
                    for name in columns {
                        row.col(|ui: &mut Ui| {
                            ui.label(record.text(name));
                        });
                    }
                });
            });
    });
}

/// Row count in blue, or the amber "nothing matches" notice.
fn result_banner(ui: &mut Ui, visible: usize) {
    let (text, fg, bg) = if visible > 0 {
        (
            format!("📈 พบข้อมูลทั้งหมด {visible} รายการ"),
            Color32::from_rgb(0x08, 0x42, 0x98),
            Color32::from_rgb(0xcf, 0xe2, 0xff),
        )
    } else {
        (
            "⚠️ ไม่พบข้อมูลที่ตรงกับเงื่อนไขที่เลือก".to_string(),
            Color32::from_rgb(0x8a, 0x6d, 0x3b),
            Color32::from_rgb(0xfc, 0xf8, 0xe3),
        )
    };

    egui::Frame::new()
        .fill(bg)
        .stroke(Stroke::new(1.0, fg))
        .corner_radius(8.0)
        .inner_margin(12.0)
        .show(ui, |ui: &mut Ui| {
            ui.set_width(ui.available_width());
            ui.label(RichText::new(text).size(24.0).color(fg));
        });
    ui.add_space(16.0);
}
