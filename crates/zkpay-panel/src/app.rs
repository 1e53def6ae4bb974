//! Main application state and update loop

use eframe::egui;
use zkpay_panel_adapters::SystemClockAdapter;
use zkpay_panel_core::{
    AbiSurface, ClockPort, ConnectionStatus, Intent, ParamType, QueryType, SessionView,
    VerificationMode,
};

use crate::bridge::{Job, PanelBridge};
use crate::state::{AdminForm, ParamRow, QueryForm, PARAM_TYPES};
use crate::ui;

pub struct App {
    bridge: PanelBridge,
    query_form: QueryForm,
    admin_form: AdminForm,
}

impl App {
    pub fn new(cc: &eframe::CreationContext<'_>, bridge: PanelBridge) -> Self {
        // Load chain state read-only before the user connects.
        bridge.dispatch(Job::Mount, &cc.egui_ctx);
        Self {
            bridge,
            query_form: QueryForm::default(),
            admin_form: AdminForm::default(),
        }
    }

    fn send(&mut self, ctx: &egui::Context, intent: Intent) {
        self.bridge.dispatch(Job::Intent(intent), ctx);
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_visuals(egui::Visuals::dark());
        let view = self.bridge.view();
        let running = self.bridge.is_running();

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(8.0);
            ui.horizontal(|ui| {
                ui.heading(egui::RichText::new("ZKPay Panel").size(22.0).color(ui::ACCENT));
                ui.add_space(20.0);
                ui.separator();
                let deployment = self.bridge.deployment();
                ui.label(egui::RichText::new(&deployment.label).strong());
                ui.label(format!("chain {}", deployment.expected_chain_id));
                if running {
                    ui.spinner();
                }
            });
            ui.add_space(4.0);
        });

        egui::TopBottomPanel::bottom("footer").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(
                    egui::RichText::new(format!(
                        "build {} ({})",
                        env!("GIT_HASH"),
                        env!("BUILD_TIME")
                    ))
                    .weak()
                    .small(),
                );
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.add_space(10.0);
                self.render_wallet(ui, ctx, &view, running);
                self.render_contract_state(ui, &view);
                self.render_query(ui, ctx, &view, running);
                self.render_admin(ui, ctx, running);
                self.render_status(ui, &view);
                ui.add_space(20.0);
            });
        });
    }
}

impl App {
    fn render_wallet(&mut self, ui: &mut egui::Ui, ctx: &egui::Context, view: &SessionView, running: bool) {
        ui::styled_heading(ui, "Wallet");
        ui.add_space(6.0);
        let chain_id = self.bridge.deployment().expected_chain_id;

        egui::Grid::new("wallet_grid")
            .num_columns(2)
            .spacing([10.0, 6.0])
            .show(ui, |ui| {
                ui.label("Status:");
                ui.label(match view.connection {
                    ConnectionStatus::Disconnected => "Disconnected",
                    ConnectionStatus::Connecting => "Connecting...",
                    ConnectionStatus::Connected => "Connected",
                });
                ui.end_row();

                ui.label("Account:");
                ui::copyable_value(
                    ui,
                    &view.account,
                    (!view.account.is_empty())
                        .then(|| ui::explorer_address_url(chain_id, &view.account)),
                );
                ui.end_row();
            });

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            let connected = view.connection == ConnectionStatus::Connected;
            if !connected && ui::primary_button(ui, "Connect Wallet", !running).clicked() {
                self.send(ctx, Intent::Connect);
            }
            if connected && ui::secondary_button(ui, "Disconnect", !running).clicked() {
                self.send(ctx, Intent::Disconnect);
            }
            if ui::secondary_button(ui, "⟳ Refresh", !running).clicked() {
                self.send(ctx, Intent::Refresh);
            }
        });
    }

    fn render_contract_state(&mut self, ui: &mut egui::Ui, view: &SessionView) {
        let deployment = self.bridge.deployment();
        let surface = deployment.surface;
        let chain_id = deployment.expected_chain_id;
        let address = deployment.address.to_string();
        ui::section_header(ui, "Contract");

        egui::Grid::new("contract_grid")
            .num_columns(2)
            .spacing([10.0, 6.0])
            .show(ui, |ui| {
                ui.label("Address:");
                ui::copyable_value(ui, &address, Some(ui::explorer_address_url(chain_id, &address)));
                ui.end_row();

                if surface.has_owner_admin {
                    ui.label("Owner:");
                    ui::copyable_value(ui, &view.owner, None);
                    ui.end_row();

                    ui.label("ZKPay contract:");
                    ui::copyable_value(ui, &view.peer_contract, None);
                    ui.end_row();
                }

                ui.label("Query hash:");
                ui::copyable_value(ui, &view.query_hash, None);
                ui.end_row();

                ui.label("Query phase:");
                ui.label(&view.query_phase);
                ui.end_row();

                if surface.has_airdrop_status {
                    ui.label("Airdrop executed:");
                    ui.label(flag_text(view.airdrop_executed));
                    ui.end_row();
                }

                if surface.has_relayer_trust {
                    ui.label("Account is trusted relayer:");
                    ui.label(flag_text(view.account_is_trusted_relayer));
                    ui.end_row();
                }
            });
    }

    fn render_query(&mut self, ui: &mut egui::Ui, ctx: &egui::Context, view: &SessionView, running: bool) {
        let surface = self.bridge.deployment().surface;
        let default_value = self.bridge.config().query_value_eth.clone();
        ui::section_header(ui, "Query");

        ui.horizontal(|ui| {
            ui.label("Payment (ETH):");
            ui::text_input(ui, &mut self.query_form.amount, &default_value, ui::NARROW);
        });

        if surface.has_structured_query {
            ui.add_space(6.0);
            self.render_payload_form(ui);
        }

        ui.add_space(10.0);
        let has_query = !view.query_hash.is_empty();
        let idle = !running && !view.busy;
        ui.horizontal(|ui| {
            if ui::primary_button(ui, "Send Query", idle && !has_query).clicked() {
                self.submit_query(ctx, surface);
            }
            if ui::secondary_button(ui, "Cancel Query", idle && has_query).clicked() {
                self.send(ctx, Intent::CancelQuery);
            }
        });
        if has_query {
            ui::hint_message(ui, "A query is pending; wait for it to resolve or cancel it.");
        }
    }

    fn render_payload_form(&mut self, ui: &mut egui::Ui) {
        let form = &mut self.query_form;
        ui.label("Query:");
        ui::query_input(ui, &mut form.query, "SELECT ...");

        egui::Grid::new("payload_grid")
            .num_columns(2)
            .spacing([10.0, 6.0])
            .show(ui, |ui| {
                ui.label("Query type:");
                ui.horizontal(|ui| {
                    ui.selectable_value(&mut form.query_type, QueryType::Sql, "SQL");
                    ui.selectable_value(&mut form.query_type, QueryType::ProofPlan, "Proof plan");
                });
                ui.end_row();

                ui.label("Verification:");
                ui.horizontal(|ui| {
                    ui.selectable_value(&mut form.verification, VerificationMode::ZkProof, "ZK proof");
                    ui.selectable_value(&mut form.verification, VerificationMode::Unverified, "Unverified");
                });
                ui.end_row();

                ui.label("Timeout (s):");
                ui::text_input(ui, &mut form.timeout_secs, "3600", ui::NARROW);
                ui.end_row();

                ui.label("Callback address:");
                ui::text_input(ui, &mut form.callback_address, "0x... (optional)", ui::WIDE);
                ui.end_row();

                ui.label("Callback gas limit:");
                ui::text_input(ui, &mut form.callback_gas_limit, "0", ui::NARROW);
                ui.end_row();

                ui.label("Callback data:");
                ui::text_input(ui, &mut form.callback_data, "0x", ui::WIDE);
                ui.end_row();
            });

        ui.add_space(4.0);
        ui.label("Parameters:");
        let mut remove = None;
        for (i, row) in form.params.iter_mut().enumerate() {
            ui.horizontal(|ui| {
                egui::ComboBox::from_id_salt(("param_type", i))
                    .selected_text(row.param_type.sol_type())
                    .width(90.0)
                    .show_ui(ui, |ui| {
                        for ty in PARAM_TYPES {
                            ui.selectable_value(&mut row.param_type, *ty, ty.sol_type());
                        }
                    });
                ui::text_input(ui, &mut row.value, param_hint(row.param_type), ui::WIDE);
                if ui.small_button("✖").clicked() {
                    remove = Some(i);
                }
            });
        }
        if let Some(i) = remove {
            form.params.remove(i);
        }
        if ui.small_button("➕ Add parameter").clicked() {
            form.params.push(ParamRow::default());
        }
    }

    fn submit_query(&mut self, ctx: &egui::Context, surface: AbiSurface) {
        let payload = surface.has_structured_query.then(|| {
            SystemClockAdapter
                .now_ms()
                .and_then(|now| self.query_form.build_payload(now))
        });
        self.send(
            ctx,
            Intent::SubmitQuery {
                amount: self.query_form.amount.clone(),
                payload,
            },
        );
    }

    fn render_admin(&mut self, ui: &mut egui::Ui, ctx: &egui::Context, running: bool) {
        let surface = self.bridge.deployment().surface;
        ui::section_header(ui, "Owner Actions");
        let enabled = !running;

        if surface.has_owner_admin {
            ui.horizontal(|ui| {
                ui.label("ZKPay contract:");
                ui::text_input(ui, &mut self.admin_form.peer, "0x...", ui::WIDE);
                if ui::secondary_button(ui, "Initialize", enabled).clicked() {
                    let peer = self.admin_form.peer.clone();
                    self.send(ctx, Intent::Initialize { peer });
                }
            });
        }

        if surface.has_relayer_trust {
            ui.horizontal(|ui| {
                ui.label("Relayer:");
                ui::text_input(ui, &mut self.admin_form.relayer, "0x... (empty: connected account)", ui::WIDE);
                if ui::secondary_button(ui, "Add Relayer", enabled).clicked() {
                    let raw = self.admin_form.relayer.trim();
                    let relayer = (!raw.is_empty()).then(|| raw.to_owned());
                    self.send(ctx, Intent::AddRelayer { relayer });
                }
            });
        }

        if surface.has_asset_acceptance {
            ui.horizontal(|ui| {
                ui.label("Asset:");
                ui::text_input(ui, &mut self.admin_form.asset, "0x... (empty: native)", ui::WIDE);
            });
            ui.horizontal(|ui| {
                ui.checkbox(&mut self.admin_form.accepted_for_payment, "Accepted for payment");
                ui.checkbox(&mut self.admin_form.secondary_flag, "Secondary flag");
                if ui::secondary_button(ui, "Set Asset", enabled).clicked() {
                    let intent = Intent::SetAcceptedAsset {
                        asset: self.admin_form.asset.clone(),
                        accepted_for_payment: self.admin_form.accepted_for_payment,
                        secondary_flag: self.admin_form.secondary_flag,
                    };
                    self.send(ctx, intent);
                }
            });
        }

        ui.add_space(6.0);
        if ui::secondary_button(ui, "Withdraw", enabled).clicked() {
            self.send(ctx, Intent::Withdraw);
        }
    }

    fn render_status(&mut self, ui: &mut egui::Ui, view: &SessionView) {
        let chain_id = self.bridge.deployment().expected_chain_id;
        ui::section_header(ui, "Status");

        if let Some(tx_hash) = &view.last_tx_hash {
            ui.horizontal(|ui| {
                ui.label("Last transaction:");
                ui::copyable_value(ui, tx_hash, Some(ui::explorer_tx_url(chain_id, tx_hash)));
            });
        }
        if let Some(message) = &view.status_message {
            ui::success_message(ui, message);
        }
        if let Some(error) = &view.error_message {
            ui::error_message(ui, error);
        }
        if let Some(info) = &view.error {
            ui::hint_message(ui, &format!("{:?} / retry: {:?}", info.kind, info.retry));
        }
    }
}

fn flag_text(flag: Option<bool>) -> &'static str {
    match flag {
        Some(true) => "Yes",
        Some(false) => "No",
        None => "Unknown",
    }
}

fn param_hint(param_type: ParamType) -> &'static str {
    match param_type {
        ParamType::Bool => "true / false",
        ParamType::Int256 | ParamType::Uint256 => "decimal or 0x value",
        ParamType::Address => "0x...",
        ParamType::Bytes32 | ParamType::Bytes => "0x hex",
        ParamType::String => "text",
    }
}
