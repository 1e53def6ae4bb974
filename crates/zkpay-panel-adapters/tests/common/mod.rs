#![allow(dead_code)]

use std::io::Read;
use std::thread;

use alloy::primitives::Address;
use serde_json::{json, Value};
use tiny_http::{Response, Server, StatusCode};

use zkpay_panel_adapters::{
    build_controller_with, DeterministicChain, Eip1193Adapter, PanelConfig, PanelController,
};
use zkpay_panel_core::SurfaceVariant;

pub fn client_address() -> Address {
    "0x00000000000000000000000000000000C0FFEE00"
        .parse()
        .expect("valid client address")
}

pub fn stranger_address() -> Address {
    "0x2000000000000000000000000000000000000002"
        .parse()
        .expect("valid stranger address")
}

pub fn peer_address() -> Address {
    "0x000000000000000000000000000000000000BEEF"
        .parse()
        .expect("valid peer address")
}

pub fn test_config(variant: SurfaceVariant) -> PanelConfig {
    let contract_address = match variant {
        SurfaceVariant::NativeQueryClient | SurfaceVariant::RelayedQueryClient => {
            Some(client_address())
        }
        _ => None,
    };
    PanelConfig {
        variant,
        contract_address,
        confirmation_poll_ms: 5,
        confirmation_timeout_ms: 60,
        ..PanelConfig::default()
    }
}

/// Controller running against the in-process simulated chain.
pub fn deterministic_controller(variant: SurfaceVariant) -> (PanelController, DeterministicChain) {
    let cfg = test_config(variant);
    let provider = Eip1193Adapter::with_config(&cfg);
    let chain = provider
        .deterministic_chain()
        .cloned()
        .expect("development profile falls back to the simulated chain");
    let controller = build_controller_with(&cfg, provider).expect("build controller");
    (controller, chain)
}

/// JSON-RPC wallet proxy answering from a fixed table. Requests for methods
/// missing from `answers` get a `-32601` error.
pub fn spawn_rpc_proxy(
    answers: Vec<(&'static str, Value)>,
    max_requests: usize,
) -> (String, thread::JoinHandle<Vec<String>>) {
    let server = Server::http("127.0.0.1:0").expect("start server");
    let addr = format!("http://{}", server.server_addr());

    let join = thread::spawn(move || {
        let mut seen = Vec::new();
        for _ in 0..max_requests {
            let mut req = match server.recv() {
                Ok(r) => r,
                Err(_) => break,
            };
            let mut body = String::new();
            if req.as_reader().read_to_string(&mut body).is_err() {
                break;
            }
            let request: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            let method = request
                .get("method")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            seen.push(method.clone());

            let payload = match answers.iter().find(|(m, _)| *m == method) {
                Some((_, answer)) if answer.get("code").is_some() => {
                    json!({"jsonrpc": "2.0", "id": 1, "error": answer})
                }
                Some((_, answer)) => json!({"jsonrpc": "2.0", "id": 1, "result": answer}),
                None => json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "error": {"code": -32601, "message": "method not found"}
                }),
            };
            let response =
                Response::from_string(payload.to_string()).with_status_code(StatusCode(200));
            let _ = req.respond(response);
        }
        seen
    });

    (addr, join)
}
