use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use budget_dashboard::app::BudgetDashboardApp;
use budget_dashboard::data::loader::{open_source, DatasetSource};
use budget_dashboard::settings::Settings;
use budget_dashboard::state::AppState;
use eframe::egui;

fn main() -> Result<()> {
    env_logger::init();

    let settings = Settings::load().context("loading settings")?;
    let source = open_source(&settings.source).context("opening data source")?;
    log::info!("Data source: {}", source.describe());

    let mut state = AppState::new(source);
    state.reload(false);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([640.0, 400.0]),
        ..Default::default()
    };

    let font_path = settings.ui.font_path.clone();
    eframe::run_native(
        &settings.ui.window_title,
        options,
        Box::new(move |cc| {
            if let Some(path) = &font_path {
                if let Err(e) = install_font(&cc.egui_ctx, path) {
                    log::warn!("Falling back to default fonts: {e:#}");
                }
            }
            Ok(Box::new(BudgetDashboardApp::new(state)))
        }),
    )
    .map_err(|e| anyhow!("running UI: {e}"))
}

/// Put a font with Thai glyphs ahead of egui's built-in families.
fn install_font(ctx: &egui::Context, path: &Path) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("reading font {}", path.display()))?;

    let mut fonts = egui::FontDefinitions::default();
    fonts
        .font_data
        .insert("thai".to_owned(), Arc::new(egui::FontData::from_owned(bytes)));
    fonts
        .families
        .entry(egui::FontFamily::Proportional)
        .or_default()
        .insert(0, "thai".to_owned());
    fonts
        .families
        .entry(egui::FontFamily::Monospace)
        .or_default()
        .push("thai".to_owned());
    ctx.set_fonts(fonts);
    Ok(())
}
