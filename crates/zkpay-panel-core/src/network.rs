use tracing::{debug, info, warn};

use crate::error::PanelError;
use crate::ports::WalletPort;

/// Makes sure the wallet is on `expected_chain_id`, asking it to switch when it
/// is not. Fails closed: a refused or non-converging switch is `WrongNetwork`.
pub async fn ensure_expected_network<W>(wallet: &W, expected_chain_id: u64) -> Result<(), PanelError>
where
    W: WalletPort + ?Sized,
{
    let current = wallet.chain_id().await?;
    if current == expected_chain_id {
        debug!(chain_id = current, "wallet already on expected network");
        return Ok(());
    }

    info!(
        from = current,
        to = expected_chain_id,
        "requesting wallet network switch"
    );
    match wallet.switch_chain(expected_chain_id).await {
        Ok(()) => {}
        Err(err @ PanelError::WalletUnavailable(_)) => return Err(err),
        Err(err) => {
            warn!(error = %err, "wallet refused network switch");
            return Err(PanelError::WrongNetwork {
                expected: expected_chain_id,
                actual: current,
            });
        }
    }

    let switched = wallet.chain_id().await?;
    if switched != expected_chain_id {
        warn!(
            expected = expected_chain_id,
            actual = switched,
            "network switch did not converge"
        );
        return Err(PanelError::WrongNetwork {
            expected: expected_chain_id,
            actual: switched,
        });
    }
    Ok(())
}

/// Read-only variant used on mount: reports a mismatch without prompting.
pub async fn check_expected_network<W>(wallet: &W, expected_chain_id: u64) -> Result<(), PanelError>
where
    W: WalletPort + ?Sized,
{
    let current = wallet.chain_id().await?;
    if current == expected_chain_id {
        Ok(())
    } else {
        Err(PanelError::WrongNetwork {
            expected: expected_chain_id,
            actual: current,
        })
    }
}
