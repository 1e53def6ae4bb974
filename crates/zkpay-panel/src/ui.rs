//! UI helper components

use eframe::egui;

pub const ACCENT: egui::Color32 = egui::Color32::from_rgb(0, 212, 170);
const ERROR: egui::Color32 = egui::Color32::from_rgb(220, 80, 80);
const SUCCESS: egui::Color32 = egui::Color32::from_rgb(80, 200, 120);

pub const WIDE: f32 = 400.0;
pub const NARROW: f32 = 150.0;

/// Block explorer URL for an address on a given chain
pub fn explorer_address_url(chain_id: u64, address: &str) -> String {
    format!("{}/address/{address}", explorer_base(chain_id))
}

pub fn explorer_tx_url(chain_id: u64, tx_hash: &str) -> String {
    format!("{}/tx/{tx_hash}", explorer_base(chain_id))
}

fn explorer_base(chain_id: u64) -> &'static str {
    match chain_id {
        17_000 => "https://holesky.etherscan.io",
        11_155_111 => "https://sepolia.etherscan.io",
        _ => "https://etherscan.io",
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn open_external(url: &str) {
    if let Err(e) = open::that(url) {
        tracing::warn!(error = %e, url, "could not open explorer link");
    }
}

#[cfg(target_arch = "wasm32")]
fn open_external(url: &str) {
    let opened = web_sys::window().and_then(|w| w.open_with_url_and_target(url, "_blank").ok());
    if opened.is_none() {
        tracing::warn!(url, "could not open explorer link");
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn copy_text(text: &str) {
    match arboard::Clipboard::new() {
        Ok(mut clipboard) => {
            if let Err(e) = clipboard.set_text(text) {
                tracing::warn!(error = %e, "clipboard write failed");
            }
        }
        Err(e) => tracing::warn!(error = %e, "clipboard unavailable"),
    }
}

#[cfg(target_arch = "wasm32")]
fn copy_text(text: &str) {
    if let Some(window) = web_sys::window() {
        // The returned promise only reports permission failures.
        let _ = window.navigator().clipboard().write_text(text);
    }
}

pub fn styled_heading(ui: &mut egui::Ui, text: &str) {
    ui.heading(egui::RichText::new(text).color(ACCENT));
}

pub fn section_header(ui: &mut egui::Ui, text: &str) {
    ui.add_space(10.0);
    ui.label(egui::RichText::new(text).strong().size(14.0));
    ui.separator();
}

/// Single-line monospace field
pub fn text_input(ui: &mut egui::Ui, value: &mut String, hint: &str, width: f32) -> egui::Response {
    let edit = egui::TextEdit::singleline(value)
        .hint_text(hint)
        .desired_width(width)
        .font(egui::TextStyle::Monospace);
    ui.add(edit)
}

pub fn query_input(ui: &mut egui::Ui, value: &mut String, hint: &str) -> egui::Response {
    let edit = egui::TextEdit::multiline(value)
        .hint_text(hint)
        .desired_rows(3)
        .desired_width(f32::INFINITY)
        .font(egui::TextStyle::Monospace);
    ui.add(edit)
}

fn status_line(ui: &mut egui::Ui, icon: &str, message: &str, color: egui::Color32) {
    ui.horizontal_wrapped(|ui| {
        ui.label(egui::RichText::new(icon).size(16.0));
        ui.label(egui::RichText::new(message).color(color));
    });
}

pub fn error_message(ui: &mut egui::Ui, message: &str) {
    status_line(ui, "❌", message, ERROR);
}

pub fn success_message(ui: &mut egui::Ui, message: &str) {
    status_line(ui, "✅", message, SUCCESS);
}

pub fn hint_message(ui: &mut egui::Ui, message: &str) {
    ui.label(egui::RichText::new(message).weak().italics());
}

/// Address or hash with a copy button and an optional explorer link
pub fn copyable_value(ui: &mut egui::Ui, value: &str, explorer_url: Option<String>) {
    if value.is_empty() {
        ui.label(egui::RichText::new("n/a").weak());
        return;
    }
    ui.horizontal(|ui| {
        ui.label(egui::RichText::new(value).monospace());
        if ui.small_button("📋").on_hover_text("Copy").clicked() {
            copy_text(value);
        }
        if let Some(url) = explorer_url {
            if ui.small_button("🔗").on_hover_text("View on explorer").clicked() {
                open_external(&url);
            }
        }
    });
}

/// Accent-filled button for the main action of a section
pub fn primary_button(ui: &mut egui::Ui, text: &str, enabled: bool) -> egui::Response {
    let label = egui::RichText::new(text).size(14.0).color(egui::Color32::WHITE);
    let button = egui::Button::new(label)
        .min_size(egui::vec2(130.0, 30.0))
        .fill(egui::Color32::from_rgb(0, 180, 150));
    ui.add_enabled(enabled, button)
}

pub fn secondary_button(ui: &mut egui::Ui, text: &str, enabled: bool) -> egui::Response {
    let button = egui::Button::new(egui::RichText::new(text).size(13.0)).min_size(egui::vec2(110.0, 28.0));
    ui.add_enabled(enabled, button)
}
