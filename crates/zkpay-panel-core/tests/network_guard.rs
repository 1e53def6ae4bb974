mod common;

use std::sync::atomic::Ordering;

use common::{new_controller, owner_address, MockWallet, SwitchBehaviour, CHAIN_ID};
use zkpay_panel_core::{
    check_expected_network, ensure_expected_network, ConnectionStatus, ErrorKind, PanelError,
    SurfaceVariant,
};

#[tokio::test]
async fn matching_chain_never_prompts() {
    let wallet = MockWallet::new(owner_address(), CHAIN_ID);
    ensure_expected_network(&wallet, CHAIN_ID)
        .await
        .expect("already on expected chain");
    assert_eq!(wallet.switch_prompts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn accepted_switch_converges() {
    let wallet = MockWallet::new(owner_address(), 1);
    ensure_expected_network(&wallet, CHAIN_ID)
        .await
        .expect("switch accepted");
    assert_eq!(wallet.switch_prompts.load(Ordering::SeqCst), 1);
    assert_eq!(*wallet.chain_id.lock().expect("chain lock"), CHAIN_ID);
}

#[tokio::test]
async fn guard_is_idempotent_after_switch() {
    let wallet = MockWallet::new(owner_address(), 1);
    ensure_expected_network(&wallet, CHAIN_ID)
        .await
        .expect("first call switches");
    ensure_expected_network(&wallet, CHAIN_ID)
        .await
        .expect("second call is a no-op");
    assert_eq!(wallet.switch_prompts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn switch_landing_on_other_chain_is_rejected() {
    let wallet = MockWallet::new(owner_address(), 1);
    wallet.set_switch(SwitchBehaviour::SwitchTo(5));
    let err = ensure_expected_network(&wallet, CHAIN_ID)
        .await
        .expect_err("landed on 5");
    assert_eq!(
        err,
        PanelError::WrongNetwork {
            expected: CHAIN_ID,
            actual: 5
        }
    );
    assert_eq!(wallet.switch_prompts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refused_switch_fails_closed() {
    let wallet = MockWallet::new(owner_address(), 1);
    wallet.set_switch(SwitchBehaviour::Reject);
    let err = ensure_expected_network(&wallet, CHAIN_ID)
        .await
        .expect_err("refusal must fail");
    assert_eq!(
        err,
        PanelError::WrongNetwork {
            expected: CHAIN_ID,
            actual: 1
        }
    );
}

#[tokio::test]
async fn silent_non_switch_is_detected() {
    let wallet = MockWallet::new(owner_address(), 5);
    wallet.set_switch(SwitchBehaviour::Ignore);
    let err = ensure_expected_network(&wallet, CHAIN_ID)
        .await
        .expect_err("chain did not change");
    assert_eq!(
        err,
        PanelError::WrongNetwork {
            expected: CHAIN_ID,
            actual: 5
        }
    );
}

#[tokio::test]
async fn missing_provider_is_not_reported_as_wrong_network() {
    let wallet = MockWallet::new(owner_address(), 1);
    wallet.set_switch(SwitchBehaviour::Unavailable);
    let err = ensure_expected_network(&wallet, CHAIN_ID)
        .await
        .expect_err("provider vanished");
    assert!(matches!(err, PanelError::WalletUnavailable(_)));
}

#[tokio::test]
async fn passive_check_reports_mismatch_without_prompt() {
    let wallet = MockWallet::new(owner_address(), 1);
    let err = check_expected_network(&wallet, CHAIN_ID)
        .await
        .expect_err("mismatch");
    assert!(matches!(err, PanelError::WrongNetwork { .. }));
    assert_eq!(wallet.switch_prompts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn wrong_network_fails_before_account_prompt() {
    let mut ctl = new_controller(SurfaceVariant::ZkPayClient, owner_address());
    ctl.wallet.set_chain(1);
    ctl.wallet.set_switch(SwitchBehaviour::Reject);

    let err = ctl.connect().await.expect_err("switch refused");
    assert_eq!(err.kind(), ErrorKind::WrongNetwork);
    assert_eq!(ctl.wallet.account_prompts.load(Ordering::SeqCst), 0);
    assert_eq!(ctl.session().connection(), ConnectionStatus::Disconnected);
}
