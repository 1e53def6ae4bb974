mod common;

use alloy::primitives::{Address, Bytes, B256};
use common::{
    client_address, deterministic_controller, peer_address, stranger_address, test_config,
};
use zkpay_panel_adapters::abi::encode_query_parameter;
use zkpay_panel_adapters::{
    build_controller, RuntimeProfile, SwitchPolicy, SystemClockAdapter, DEFAULT_ACCOUNT,
};
use zkpay_panel_core::{
    check_expected_network, ClockPort, ConnectionStatus, ErrorKind, Intent, IntentOutcome, PanelError, ParamType, QueryPayload,
    QueryPhase, QueryType, SurfaceVariant, VerificationMode,
};

#[tokio::test]
async fn query_submit_and_cancel_round_trip() {
    let (mut ctl, chain) = deterministic_controller(SurfaceVariant::ZkPayClient);
    ctl.mount().await.expect("mount");
    assert_eq!(ctl.session().owner(), Some(DEFAULT_ACCOUNT));

    let outcome = ctl
        .handle(Intent::SubmitQuery {
            amount: "0.01".to_owned(),
            payload: None,
        })
        .await
        .expect("submit");
    let on_chain = chain.query_hash().expect("chain hash");
    assert_ne!(on_chain, B256::ZERO);
    assert_eq!(outcome, IntentOutcome::QuerySubmitted(Some(on_chain)));
    assert_eq!(ctl.session().current_query_hash(), Some(on_chain));
    assert!(!chain.balance().expect("balance").is_zero());

    ctl.handle(Intent::CancelQuery).await.expect("cancel");
    assert_eq!(chain.query_hash().expect("chain hash"), B256::ZERO);
    assert_eq!(ctl.session().query_phase(), QueryPhase::Idle);
    assert_eq!(
        ctl.session().last_message(),
        Some("Query cancelled successfully")
    );
}

#[tokio::test]
async fn revert_reason_is_recovered_from_replay() {
    let (mut ctl, chain) = deterministic_controller(SurfaceVariant::ZkPayClient);
    chain
        .debug_revert_next("insufficient payment")
        .expect("arm revert");

    let err = ctl
        .handle(Intent::SubmitQuery {
            amount: "0.01".to_owned(),
            payload: None,
        })
        .await
        .expect_err("reverts");
    assert_eq!(
        err,
        PanelError::TransactionReverted {
            reason: Some("insufficient payment".to_owned())
        }
    );
    assert_eq!(ctl.session().query_phase(), QueryPhase::Idle);
    assert_eq!(chain.query_hash().expect("chain hash"), B256::ZERO);
}

#[tokio::test]
async fn non_owner_is_gated_client_side() {
    let (mut ctl, chain) = deterministic_controller(SurfaceVariant::ZkPayClient);
    chain
        .debug_set_accounts(vec![stranger_address()])
        .expect("set accounts");

    let err = ctl.handle(Intent::Withdraw).await.expect_err("not owner");
    assert_eq!(
        err,
        PanelError::NotOwner {
            owner: DEFAULT_ACCOUNT,
            caller: stranger_address()
        }
    );
}

#[tokio::test]
async fn initialize_updates_peer_contract() {
    let (mut ctl, chain) = deterministic_controller(SurfaceVariant::ZkPayClient);
    ctl.handle(Intent::Initialize {
        peer: peer_address().to_string(),
    })
    .await
    .expect("initialize");
    assert_eq!(chain.peer().expect("peer"), peer_address());
    assert_eq!(ctl.session().peer_contract(), Some(peer_address()));
}

#[tokio::test]
async fn network_switch_is_requested_on_connect() {
    let (mut ctl, chain) = deterministic_controller(SurfaceVariant::ZkPayClient);
    chain.debug_set_chain_id(1).expect("set chain");

    ctl.connect().await.expect("switch accepted");
    assert_eq!(ctl.session().connection(), ConnectionStatus::Connected);

    chain.debug_set_chain_id(1).expect("set chain");
    chain
        .debug_set_switch_policy(SwitchPolicy::Reject)
        .expect("set policy");
    let err = ctl.connect().await.expect_err("switch refused");
    assert_eq!(
        err,
        PanelError::WrongNetwork {
            expected: 17_000,
            actual: 1
        }
    );
}

#[tokio::test]
async fn mount_reports_wrong_network_without_prompting() {
    let (mut ctl, chain) = deterministic_controller(SurfaceVariant::ZkPayClient);
    chain.debug_set_chain_id(5).expect("set chain");
    let err = ctl.mount().await.expect_err("wrong network");
    assert_eq!(err.kind(), ErrorKind::WrongNetwork);
    assert_eq!(ctl.session().connection(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn refresh_after_chain_change_reads_nothing() {
    let (mut ctl, chain) = deterministic_controller(SurfaceVariant::ZkPayClient);
    ctl.mount().await.expect("mount");
    assert_eq!(ctl.session().owner(), Some(DEFAULT_ACCOUNT));

    chain.debug_set_chain_id(1).expect("set chain");
    chain.debug_set_owner(stranger_address()).expect("set owner");
    let err = ctl.refresh().await.expect_err("wallet left the network");
    assert_eq!(
        err,
        PanelError::WrongNetwork {
            expected: 17_000,
            actual: 1
        }
    );
    assert_eq!(ctl.session().owner(), Some(DEFAULT_ACCOUNT));
    assert_eq!(ctl.session().query_phase(), QueryPhase::Idle);
    let last_error = ctl.session().last_error().expect("recorded");
    assert_eq!(last_error.kind, ErrorKind::WrongNetwork);
    assert!(check_expected_network(&ctl.wallet, 17_000).await.is_err());
}

#[tokio::test]
async fn connected_refresh_switches_back_before_reading() {
    let (mut ctl, chain) = deterministic_controller(SurfaceVariant::ZkPayClient);
    ctl.connect().await.expect("connect");

    chain.debug_set_chain_id(1).expect("set chain");
    ctl.refresh().await.expect("switch accepted");
    check_expected_network(&ctl.wallet, 17_000)
        .await
        .expect("back on expected network");

    chain.debug_set_chain_id(1).expect("set chain");
    chain
        .debug_set_switch_policy(SwitchPolicy::Reject)
        .expect("set policy");
    let err = ctl.refresh().await.expect_err("switch refused");
    assert_eq!(err.kind(), ErrorKind::WrongNetwork);
}

#[tokio::test]
async fn stalled_transaction_times_out_then_resyncs() {
    let (mut ctl, chain) = deterministic_controller(SurfaceVariant::ZkPayClient);
    chain.debug_set_auto_mine(false).expect("stall");

    let err = ctl
        .handle(Intent::SubmitQuery {
            amount: String::new(),
            payload: None,
        })
        .await
        .expect_err("confirmation budget exhausted");
    assert_eq!(err.kind(), ErrorKind::TransactionUnconfirmed);
    assert!(ctl.view().busy);

    assert_eq!(chain.debug_mine_pending().expect("mine"), 1);
    ctl.handle(Intent::Refresh).await.expect("refresh");
    let on_chain = chain.query_hash().expect("chain hash");
    assert_eq!(
        ctl.session().query_phase(),
        QueryPhase::Confirmed {
            query_hash: on_chain
        }
    );
    assert!(!ctl.view().busy);
}

#[tokio::test]
async fn airdrop_status_follows_fulfillment() {
    let (mut ctl, chain) = deterministic_controller(SurfaceVariant::AirdropClient);
    ctl.handle(Intent::SubmitQuery {
        amount: "0.01".to_owned(),
        payload: None,
    })
    .await
    .expect("submit");
    assert_eq!(ctl.session().airdrop_executed(), Some(false));

    chain.debug_fulfill_query().expect("fulfill");
    ctl.refresh().await.expect("refresh");
    assert_eq!(ctl.session().airdrop_executed(), Some(true));
    assert_eq!(ctl.session().query_phase(), QueryPhase::Idle);
}

#[tokio::test]
async fn structured_query_with_parameters() {
    let (mut ctl, chain) = deterministic_controller(SurfaceVariant::NativeQueryClient);
    let now = SystemClockAdapter.now_ms().expect("clock");
    let payload = QueryPayload {
        query: Bytes::from_static(b"SELECT * FROM BLOCKS WHERE BLOCK_NUMBER = $1"),
        query_type: QueryType::Sql,
        parameters: vec![encode_query_parameter(ParamType::Uint256, "42").expect("param")],
        timeout: now.as_secs() + 600,
        callback_address: Address::ZERO,
        callback_gas_limit: 0,
        callback_data: Bytes::new(),
        verification: VerificationMode::ZkProof,
    };

    ctl.handle(Intent::SubmitQuery {
        amount: "0.02".to_owned(),
        payload: Some(Ok(payload.clone())),
    })
    .await
    .expect("structured submit");
    assert_ne!(chain.query_hash().expect("chain hash"), B256::ZERO);

    ctl.handle(Intent::CancelQuery).await.expect("cancel");
    chain
        .debug_set_accepted_asset(Address::ZERO, false, false)
        .expect("reject native");
    let err = ctl
        .handle(Intent::SubmitQuery {
            amount: "0.02".to_owned(),
            payload: Some(Ok(payload)),
        })
        .await
        .expect_err("asset not accepted");
    assert_eq!(err, PanelError::AssetNotAccepted(Address::ZERO));
}

#[tokio::test]
async fn relayer_and_asset_admin_calls() {
    let (mut ctl, chain) = deterministic_controller(SurfaceVariant::RelayedQueryClient);
    ctl.connect().await.expect("connect");
    assert_eq!(ctl.session().account_is_trusted_relayer(), Some(false));
    ctl.handle(Intent::AddRelayer { relayer: None })
        .await
        .expect("trust self");
    assert!(chain
        .is_trusted_relayer(DEFAULT_ACCOUNT)
        .expect("relayer lookup"));
    assert_eq!(ctl.session().account_is_trusted_relayer(), Some(true));

    ctl.handle(Intent::SetAcceptedAsset {
        asset: String::new(),
        accepted_for_payment: false,
        secondary_flag: true,
    })
    .await
    .expect("set asset");
    let err = ctl
        .handle(Intent::SubmitQuery {
            amount: "0.01".to_owned(),
            payload: None,
        })
        .await
        .expect_err("payload required");
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn unsupported_call_is_rejected_before_wallet() {
    let (mut ctl, _chain) = deterministic_controller(SurfaceVariant::AirdropClient);
    let err = ctl
        .handle(Intent::Initialize {
            peer: peer_address().to_string(),
        })
        .await
        .expect_err("airdrop client has no initialize");
    assert_eq!(err, PanelError::UnsupportedCall("initialize(address)"));
    assert_eq!(ctl.session().connection(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn production_profile_without_wallet_is_unavailable() {
    let cfg = zkpay_panel_adapters::PanelConfig {
        runtime_profile: RuntimeProfile::Production,
        eip1193_proxy_url: None,
        ..test_config(SurfaceVariant::ZkPayClient)
    };
    let mut ctl = build_controller(&cfg).expect("build");
    let err = ctl.connect().await.expect_err("no wallet runtime");
    assert_eq!(err.kind(), ErrorKind::WalletUnavailable);
    assert_eq!(ctl.session().connection(), ConnectionStatus::Disconnected);
}

#[test]
fn structured_variants_need_an_address() {
    let cfg = zkpay_panel_adapters::PanelConfig {
        contract_address: None,
        ..test_config(SurfaceVariant::NativeQueryClient)
    };
    let err = cfg.deployment().expect_err("no preset");
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let deployment = test_config(SurfaceVariant::RelayedQueryClient)
        .deployment()
        .expect("explicit address");
    assert_eq!(deployment.address, client_address());
    assert!(deployment.surface.has_relayer_trust);
}
