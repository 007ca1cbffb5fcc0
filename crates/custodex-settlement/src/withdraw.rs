//! The withdrawal protocol.
//!
//! Token-like assets leave custody in a single phase: the host moves the
//! tokens and the escrow balance is debited in the same invocation.
//! Coin-like assets settle externally, so they use a two-phase handshake
//! per principal: `prepare` records a marker carrying the current ledger
//! sequence number, `verify` gates the flagged external transfer against
//! escrow balances and the committed history since the marker, and
//! `complete` debits the escrow and clears the marker. The history
//! replay in `verify` is the double-withdrawal guard: an already-settled
//! flagged transfer without a matching `complete` leaves the marker in
//! place, and any further transfer in that window is rejected.

use std::collections::BTreeMap;

use custodex_store::{keys, ledger, KvStore};
use custodex_types::{
    Address, Amount, AssetId, CustodexError, Event, ExternalTransfer, HostLedger, Result,
};

/// Single-phase withdrawal of a token-like asset.
///
/// # Errors
///
/// Fails when the caller is not authorized as `principal`, the asset is
/// coin-like (`RequiresTwoPhase`) or malformed, the amount is zero, the
/// escrow balance cannot cover it, or the host transfer primitive
/// reports failure. No mutation happens on any failure.
pub fn withdraw_assets(
    kv: &mut KvStore,
    host: &impl HostLedger,
    principal: Address,
    asset: AssetId,
    amount: Amount,
) -> Result<Vec<Event>> {
    if !host.is_authorized(&principal) {
        tracing::warn!(%principal, "withdrawal rejected: not authorized");
        return Err(CustodexError::NotAuthorized(principal));
    }
    if asset.is_coin() {
        return Err(CustodexError::RequiresTwoPhase(asset));
    }
    if !asset.is_token() {
        return Err(CustodexError::UnsupportedAsset(asset.as_bytes().len()));
    }
    if amount < 1 {
        return Err(CustodexError::InvalidAmount(amount));
    }
    let held = ledger::balance(kv, &principal, &asset);
    if held < amount {
        return Err(CustodexError::InsufficientBalance {
            principal,
            asset,
            needed: amount,
            available: held,
        });
    }
    if !host.transfer_token(&principal, &asset, amount) {
        tracing::warn!(%principal, %asset, amount, "host token transfer failed");
        return Err(CustodexError::TokenTransferFailed(asset));
    }

    ledger::debit(kv, &principal, &asset, amount)?;
    Ok(vec![Event::Withdrawn {
        principal,
        asset,
        amount,
    }])
}

/// Record a withdrawal marker for `principal`, carrying the current
/// ledger sequence number. Idle → Pending.
///
/// # Errors
///
/// Fails when the caller is not authorized as `principal` or a marker
/// already exists.
pub fn prepare_asset_withdrawal(
    kv: &mut KvStore,
    host: &impl HostLedger,
    principal: Address,
) -> Result<()> {
    if !host.is_authorized(&principal) {
        tracing::warn!(%principal, "prepare rejected: not authorized");
        return Err(CustodexError::NotAuthorized(principal));
    }
    let key = keys::withdrawal_key(&principal);
    if kv.contains(&key) {
        return Err(CustodexError::WithdrawalPending(principal));
    }
    kv.put_amount(key, host.sequence());
    tracing::debug!(%principal, sequence = host.sequence(), "withdrawal prepared");
    Ok(())
}

/// The sequence number recorded by a pending withdrawal, if any.
#[must_use]
pub fn withdrawal_marker(kv: &KvStore, principal: &Address) -> Option<u64> {
    let key = keys::withdrawal_key(principal);
    kv.contains(&key).then(|| kv.get_amount(&key))
}

/// Verification gate, run by the host before a flagged external transfer
/// settles. Read-only; returns the verified transfer for the caller.
///
/// # Errors
///
/// `NotAWithdrawal` when the transaction carries no flagged transfer,
/// `NoWithdrawalPrepared` without a marker, `InsufficientBalance` when
/// an output exceeds its recipient's escrow, `UnbalancedTransfer` when
/// the transfer creates or destroys value, and `DoubleWithdrawal` when
/// the committed history since the marker already holds a flagged
/// withdrawal for the same principal — the host must then invalidate the
/// whole transaction, not merely skip it.
pub fn verify_asset_withdrawal(kv: &KvStore, host: &impl HostLedger) -> Result<ExternalTransfer> {
    let Some(transfer) = host.withdrawal_transfer() else {
        return Err(CustodexError::NotAWithdrawal);
    };
    let principal = transfer.withdrawal_of;
    let Some(since) = withdrawal_marker(kv, &principal) else {
        return Err(CustodexError::NoWithdrawalPrepared(principal));
    };

    for ((recipient, asset), amount) in aggregate_outputs(&transfer) {
        let held = ledger::balance(kv, &recipient, &asset);
        if held < amount {
            return Err(CustodexError::InsufficientBalance {
                principal: recipient,
                asset,
                needed: amount,
                available: held,
            });
        }
    }

    let total_out = transfer.total_output();
    if transfer.total_input != total_out {
        return Err(CustodexError::UnbalancedTransfer {
            total_in: transfer.total_input,
            total_out,
        });
    }

    if host.flagged_withdrawals_since(since).contains(&principal) {
        tracing::warn!(%principal, since, "double withdrawal attempt");
        return Err(CustodexError::DoubleWithdrawal { principal, since });
    }

    Ok(transfer)
}

/// Settle the flagged withdrawal in the current transaction: debit every
/// output from the escrow ledger and clear the marker. Pending → Idle.
///
/// # Errors
///
/// `NotAWithdrawal` without a flagged transfer, `NoWithdrawalPrepared`
/// without a marker, `InsufficientBalance` if any debit would overdraw —
/// checked for all outputs before the first debit.
pub fn complete_asset_withdrawal(kv: &mut KvStore, host: &impl HostLedger) -> Result<Vec<Event>> {
    let Some(transfer) = host.withdrawal_transfer() else {
        return Err(CustodexError::NotAWithdrawal);
    };
    let principal = transfer.withdrawal_of;
    if withdrawal_marker(kv, &principal).is_none() {
        return Err(CustodexError::NoWithdrawalPrepared(principal));
    }

    let aggregated = aggregate_outputs(&transfer);
    for ((recipient, asset), amount) in &aggregated {
        let held = ledger::balance(kv, recipient, asset);
        if held < *amount {
            return Err(CustodexError::InsufficientBalance {
                principal: *recipient,
                asset: asset.clone(),
                needed: *amount,
                available: held,
            });
        }
    }

    let mut events = Vec::with_capacity(aggregated.len());
    for ((recipient, asset), amount) in aggregated {
        ledger::debit(kv, &recipient, &asset, amount)?;
        events.push(Event::Withdrawn {
            principal: recipient,
            asset,
            amount,
        });
    }
    kv.delete(&keys::withdrawal_key(&principal));

    tracing::debug!(%principal, outputs = events.len(), "withdrawal completed");
    Ok(events)
}

/// Sum outputs per (recipient, asset) so balance checks see the whole
/// demand, not one output at a time.
fn aggregate_outputs(transfer: &ExternalTransfer) -> BTreeMap<(Address, AssetId), Amount> {
    let mut totals = BTreeMap::new();
    for output in &transfer.outputs {
        *totals
            .entry((output.recipient, output.asset.clone()))
            .or_insert(0) += output.amount;
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use custodex_types::{MockHost, TransferOutput};

    fn alice() -> Address {
        Address([1u8; 20])
    }

    fn coin() -> AssetId {
        AssetId::from_bytes(vec![0xAA; 32])
    }

    fn token() -> AssetId {
        AssetId::from_bytes(vec![0xBB; 20])
    }

    fn funded_kv() -> KvStore {
        let mut kv = KvStore::new();
        ledger::credit(&mut kv, &alice(), &coin(), 1_000);
        ledger::credit(&mut kv, &alice(), &token(), 1_000);
        kv
    }

    fn flagged(outputs: Vec<TransferOutput>, total_input: Amount) -> ExternalTransfer {
        ExternalTransfer {
            withdrawal_of: alice(),
            outputs,
            total_input,
        }
    }

    fn output(amount: Amount) -> TransferOutput {
        TransferOutput {
            recipient: alice(),
            asset: coin(),
            amount,
        }
    }

    #[test]
    fn token_withdrawal_is_single_phase() {
        let mut kv = funded_kv();
        let mut host = MockHost::new();
        host.authorize(alice());

        let events = withdraw_assets(&mut kv, &host, alice(), token(), 400).unwrap();
        assert_eq!(
            events,
            vec![Event::Withdrawn {
                principal: alice(),
                asset: token(),
                amount: 400,
            }]
        );
        assert_eq!(ledger::balance(&kv, &alice(), &token()), 600);
    }

    #[test]
    fn token_withdrawal_requires_authorization() {
        let mut kv = funded_kv();
        let host = MockHost::new();
        assert!(matches!(
            withdraw_assets(&mut kv, &host, alice(), token(), 400),
            Err(CustodexError::NotAuthorized(_))
        ));
    }

    #[test]
    fn coin_assets_must_use_two_phase() {
        let mut kv = funded_kv();
        let mut host = MockHost::new();
        host.authorize(alice());
        assert!(matches!(
            withdraw_assets(&mut kv, &host, alice(), coin(), 400),
            Err(CustodexError::RequiresTwoPhase(_))
        ));
    }

    #[test]
    fn failed_host_transfer_leaves_balance_intact() {
        let mut kv = funded_kv();
        let mut host = MockHost::new();
        host.authorize(alice());
        host.token_transfers_succeed = false;

        assert!(matches!(
            withdraw_assets(&mut kv, &host, alice(), token(), 400),
            Err(CustodexError::TokenTransferFailed(_))
        ));
        assert_eq!(ledger::balance(&kv, &alice(), &token()), 1_000);
    }

    #[test]
    fn prepare_records_the_sequence_number() {
        let mut kv = funded_kv();
        let mut host = MockHost::new();
        host.authorize(alice());
        host.seq = 42;

        prepare_asset_withdrawal(&mut kv, &host, alice()).unwrap();
        assert_eq!(withdrawal_marker(&kv, &alice()), Some(42));

        // One marker per principal at a time.
        assert!(matches!(
            prepare_asset_withdrawal(&mut kv, &host, alice()),
            Err(CustodexError::WithdrawalPending(_))
        ));
    }

    #[test]
    fn verify_happy_path() {
        let mut kv = funded_kv();
        let mut host = MockHost::new();
        host.authorize(alice());
        prepare_asset_withdrawal(&mut kv, &host, alice()).unwrap();

        host.current_withdrawal = Some(flagged(vec![output(600)], 600));
        let transfer = verify_asset_withdrawal(&kv, &host).unwrap();
        assert_eq!(transfer.total_output(), 600);
    }

    #[test]
    fn verify_requires_a_marker() {
        let kv = funded_kv();
        let mut host = MockHost::new();
        host.current_withdrawal = Some(flagged(vec![output(600)], 600));
        assert!(matches!(
            verify_asset_withdrawal(&kv, &host),
            Err(CustodexError::NoWithdrawalPrepared(_))
        ));
    }

    #[test]
    fn verify_checks_aggregated_outputs_against_escrow() {
        let mut kv = funded_kv();
        let mut host = MockHost::new();
        host.authorize(alice());
        prepare_asset_withdrawal(&mut kv, &host, alice()).unwrap();

        // Two outputs of 600 each: individually covered, jointly not.
        host.current_withdrawal = Some(flagged(vec![output(600), output(600)], 1_200));
        assert!(matches!(
            verify_asset_withdrawal(&kv, &host),
            Err(CustodexError::InsufficientBalance { .. })
        ));
    }

    #[test]
    fn verify_rejects_unbalanced_transfers() {
        let mut kv = funded_kv();
        let mut host = MockHost::new();
        host.authorize(alice());
        prepare_asset_withdrawal(&mut kv, &host, alice()).unwrap();

        host.current_withdrawal = Some(flagged(vec![output(600)], 700));
        assert!(matches!(
            verify_asset_withdrawal(&kv, &host),
            Err(CustodexError::UnbalancedTransfer {
                total_in: 700,
                total_out: 600,
            })
        ));
    }

    #[test]
    fn verify_rejects_replayed_withdrawals() {
        let mut kv = funded_kv();
        let mut host = MockHost::new();
        host.authorize(alice());
        host.seq = 10;
        prepare_asset_withdrawal(&mut kv, &host, alice()).unwrap();

        // A flagged withdrawal for alice was committed at sequence 12.
        host.flagged_history = vec![(12, alice())];
        host.current_withdrawal = Some(flagged(vec![output(600)], 600));
        assert!(matches!(
            verify_asset_withdrawal(&kv, &host),
            Err(CustodexError::DoubleWithdrawal { since: 10, .. })
        ));

        // History before the marker does not count.
        host.flagged_history = vec![(9, alice())];
        verify_asset_withdrawal(&kv, &host).unwrap();
    }

    #[test]
    fn complete_debits_and_clears_the_marker() {
        let mut kv = funded_kv();
        let mut host = MockHost::new();
        host.authorize(alice());
        prepare_asset_withdrawal(&mut kv, &host, alice()).unwrap();
        host.current_withdrawal = Some(flagged(vec![output(600)], 600));

        let events = complete_asset_withdrawal(&mut kv, &host).unwrap();
        assert_eq!(
            events,
            vec![Event::Withdrawn {
                principal: alice(),
                asset: coin(),
                amount: 600,
            }]
        );
        assert_eq!(ledger::balance(&kv, &alice(), &coin()), 400);
        assert_eq!(withdrawal_marker(&kv, &alice()), None);

        // The next prepare starts a fresh cycle.
        prepare_asset_withdrawal(&mut kv, &host, alice()).unwrap();
    }

    #[test]
    fn complete_fails_whole_operation_on_any_overdraw() {
        let mut kv = funded_kv();
        let mut host = MockHost::new();
        host.authorize(alice());
        prepare_asset_withdrawal(&mut kv, &host, alice()).unwrap();

        let bob = Address([2u8; 20]);
        host.current_withdrawal = Some(flagged(
            vec![
                output(500),
                TransferOutput {
                    recipient: bob,
                    asset: coin(),
                    amount: 100,
                },
            ],
            600,
        ));
        assert!(matches!(
            complete_asset_withdrawal(&mut kv, &host),
            Err(CustodexError::InsufficientBalance { .. })
        ));
        // Nothing was debited and the marker survives.
        assert_eq!(ledger::balance(&kv, &alice(), &coin()), 1_000);
        assert!(withdrawal_marker(&kv, &alice()).is_some());
    }

    #[test]
    fn complete_without_flag_or_marker_fails() {
        let mut kv = funded_kv();
        let mut host = MockHost::new();
        assert!(matches!(
            complete_asset_withdrawal(&mut kv, &host),
            Err(CustodexError::NotAWithdrawal)
        ));

        host.current_withdrawal = Some(flagged(vec![output(10)], 10));
        assert!(matches!(
            complete_asset_withdrawal(&mut kv, &host),
            Err(CustodexError::NoWithdrawalPrepared(_))
        ));
    }
}
