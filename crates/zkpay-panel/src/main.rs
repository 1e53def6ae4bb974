//! ZKPay Panel: control panel for pay-per-query client contracts

#[cfg(not(target_arch = "wasm32"))]
use eframe::egui;
use zkpay_panel_adapters::PanelConfig;

mod app;
mod bridge;
mod state;
mod ui;

#[cfg(not(target_arch = "wasm32"))]
fn main() -> eyre::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting ZKPay Panel");

    let bridge = bridge::PanelBridge::new(PanelConfig::from_env())?;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("ZKPay Panel")
            .with_inner_size([820.0, 760.0])
            .with_min_inner_size([560.0, 420.0]),
        ..Default::default()
    };

    eframe::run_native(
        "ZKPay Panel",
        native_options,
        Box::new(move |cc| Ok(Box::new(app::App::new(cc, bridge)))),
    )
    .map_err(|e| eyre::eyre!("eframe exited with error: {e}"))
}

#[cfg(target_arch = "wasm32")]
fn main() {
    tracing_wasm::set_as_global_default();
    tracing::info!("Starting ZKPay Panel");

    wasm_bindgen_futures::spawn_local(async {
        if let Err(e) = start_web().await {
            tracing::error!(error = %e, "failed to start ZKPay Panel");
        }
    });

    async fn start_web() -> eyre::Result<()> {
        use wasm_bindgen::JsCast as _;

        let bridge = bridge::PanelBridge::new(PanelConfig::from_env())?;
        let canvas = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id("the_canvas_id"))
            .ok_or_else(|| eyre::eyre!("canvas element 'the_canvas_id' not found"))?
            .dyn_into::<web_sys::HtmlCanvasElement>()
            .map_err(|_| eyre::eyre!("'the_canvas_id' is not a canvas"))?;

        eframe::WebRunner::new()
            .start(
                canvas,
                eframe::WebOptions::default(),
                Box::new(move |cc| Ok(Box::new(app::App::new(cc, bridge)))),
            )
            .await
            .map_err(|e| eyre::eyre!("web runner failed: {e:?}"))
    }
}
