//! Bridge between the egui shell and the panel workspace crates.
//! The shell never touches the controller directly; it submits jobs here and
//! renders the published [`SessionView`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use eframe::egui;
use zkpay_panel_adapters::{build_controller, PanelConfig, PanelController};
use zkpay_panel_core::{Deployment, Intent, PanelError, SessionView};

/// Work the bridge can run against the controller.
#[derive(Debug, Clone)]
pub enum Job {
    Mount,
    Intent(Intent),
}

impl Job {
    fn label(&self) -> &'static str {
        match self {
            Job::Mount => "mount",
            Job::Intent(intent) => intent.kind(),
        }
    }
}

#[derive(Clone)]
pub struct PanelBridge {
    controller: Arc<tokio::sync::Mutex<PanelController>>,
    view: Arc<Mutex<SessionView>>,
    busy: Arc<AtomicBool>,
    deployment: Deployment,
    config: PanelConfig,
}

impl PanelBridge {
    pub fn new(config: PanelConfig) -> eyre::Result<Self> {
        let controller = build_controller(&config)
            .map_err(|e| eyre::eyre!("failed to configure panel controller: {e}"))?;
        let deployment = controller.deployment().clone();
        let view = controller.view();
        Ok(Self {
            controller: Arc::new(tokio::sync::Mutex::new(controller)),
            view: Arc::new(Mutex::new(view)),
            busy: Arc::new(AtomicBool::new(false)),
            deployment,
            config,
        })
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    /// Latest published session snapshot.
    pub fn view(&self) -> SessionView {
        self.view
            .lock()
            .map(|view| view.clone())
            .unwrap_or_default()
    }

    /// True while a job is running. The controller rejects concurrent writes on
    /// its own; this only keeps the buttons disabled.
    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Runs `job` in the background. Returns false when another job is still
    /// running.
    pub fn dispatch(&self, job: Job, ctx: &egui::Context) -> bool {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(job = job.label(), "job ignored, another one is running");
            return false;
        }
        let controller = Arc::clone(&self.controller);
        let view = Arc::clone(&self.view);
        let busy = Arc::clone(&self.busy);
        let ctx = ctx.clone();

        #[cfg(target_arch = "wasm32")]
        {
            wasm_bindgen_futures::spawn_local(run_job(controller, view, busy, ctx, job));
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            // Provider futures are not `Send`, so each job gets its own
            // single-threaded runtime.
            std::thread::spawn(move || {
                match tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                {
                    Ok(rt) => rt.block_on(run_job(controller, view, busy, ctx, job)),
                    Err(e) => {
                        tracing::error!(error = %e, "failed to start job runtime");
                        busy.store(false, Ordering::Release);
                        ctx.request_repaint();
                    }
                }
            });
        }
        true
    }
}

async fn run_job(
    controller: Arc<tokio::sync::Mutex<PanelController>>,
    view: Arc<Mutex<SessionView>>,
    busy: Arc<AtomicBool>,
    ctx: egui::Context,
    job: Job,
) {
    let mut ctl = controller.lock().await;
    publish(&view, ctl.view());
    ctx.request_repaint();
    if let Err(err) = execute(&mut ctl, job).await {
        tracing::debug!(kind = ?err.kind(), "job finished with error");
    }
    publish(&view, ctl.view());
    busy.store(false, Ordering::Release);
    ctx.request_repaint();
}

async fn execute(ctl: &mut PanelController, job: Job) -> Result<(), PanelError> {
    tracing::info!(job = job.label(), "running panel job");
    match job {
        Job::Mount => ctl.mount().await.map(|_| ()),
        Job::Intent(intent) => ctl.handle(intent).await.map(|_| ()),
    }
}

fn publish(slot: &Mutex<SessionView>, view: SessionView) {
    match slot.lock() {
        Ok(mut guard) => *guard = view,
        Err(e) => tracing::warn!(error = %e, "session view lock poisoned"),
    }
}
