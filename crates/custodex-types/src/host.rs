//! The host-ledger collaborator boundary.
//!
//! The engine is a deterministic state machine driven by committed host
//! transactions. Everything it cannot decide for itself — witness checks,
//! ledger time, the total order of transactions, external asset movement,
//! and the append-only transaction history — comes in through
//! [`HostLedger`]. The engine never caches host answers across
//! invocations.

use serde::{Deserialize, Serialize};

use crate::ids::{Address, AssetId};
use crate::offer::Amount;

/// One output of an external (system-asset) transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutput {
    /// Destination of the funds.
    pub recipient: Address,
    /// Asset being moved.
    pub asset: AssetId,
    /// Amount moved to `recipient`.
    pub amount: Amount,
}

/// An external transfer flagged as a custody withdrawal.
///
/// The flag names the withdrawing principal; the outputs are the external
/// asset movements the transfer performs. `total_input` is the sum the
/// transfer consumes, used to enforce that no value is created or
/// destroyed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalTransfer {
    /// The principal this withdrawal is attributed to.
    pub withdrawal_of: Address,
    /// External outputs of the transfer.
    pub outputs: Vec<TransferOutput>,
    /// Total external input consumed by the transfer.
    pub total_input: Amount,
}

impl ExternalTransfer {
    /// Sum of all output amounts.
    #[must_use]
    pub fn total_output(&self) -> Amount {
        self.outputs.iter().map(|o| o.amount).sum()
    }
}

/// Primitives supplied by the host ledger, specified only at this
/// boundary.
pub trait HostLedger {
    /// Whether the calling transaction is attributable to `principal`
    /// (witness / signature check).
    fn is_authorized(&self, principal: &Address) -> bool;

    /// Current ledger time in seconds.
    fn now(&self) -> u64;

    /// Position of the current transaction in the host's total order.
    fn sequence(&self) -> u64;

    /// Confirm that the external transfer backing a deposit of `amount`
    /// of `asset` from `from` has settled into the contract's custody.
    fn collect_deposit(&self, from: &Address, asset: &AssetId, amount: Amount) -> bool;

    /// Move `amount` of a token-like `asset` out of custody to `to`.
    fn transfer_token(&self, to: &Address, asset: &AssetId, amount: Amount) -> bool;

    /// The flagged withdrawal transfer carried by the current
    /// transaction, if any.
    fn withdrawal_transfer(&self) -> Option<ExternalTransfer>;

    /// Principals with a flagged withdrawal in the committed history at
    /// or after `sequence` (exclusive of the current transaction).
    fn flagged_withdrawals_since(&self, sequence: u64) -> Vec<Address>;
}

// ---------------------------------------------------------------------------
// Mock host for tests
// ---------------------------------------------------------------------------

/// A scriptable host double for unit and integration tests.
/// **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
#[derive(Debug, Default, Clone)]
pub struct MockHost {
    /// Principals the current transaction is signed by.
    pub authorized: Vec<Address>,
    /// Ledger time in seconds.
    pub time: u64,
    /// Current transaction sequence number.
    pub seq: u64,
    /// Whether `collect_deposit` confirms.
    pub deposits_settle: bool,
    /// Whether `transfer_token` succeeds.
    pub token_transfers_succeed: bool,
    /// The flagged transfer in the current transaction.
    pub current_withdrawal: Option<ExternalTransfer>,
    /// Committed flagged withdrawals as (sequence, principal).
    pub flagged_history: Vec<(u64, Address)>,
}

#[cfg(any(test, feature = "test-helpers"))]
impl MockHost {
    #[must_use]
    pub fn new() -> Self {
        Self {
            deposits_settle: true,
            token_transfers_succeed: true,
            ..Self::default()
        }
    }

    /// Authorize a principal for the current transaction.
    pub fn authorize(&mut self, principal: Address) -> &mut Self {
        self.authorized.push(principal);
        self
    }

    /// Drop all authorizations.
    pub fn deauthorize_all(&mut self) -> &mut Self {
        self.authorized.clear();
        self
    }

    /// Advance ledger time (also bumps the sequence number).
    pub fn advance(&mut self, secs: u64) -> &mut Self {
        self.time += secs;
        self.seq += 1;
        self
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl HostLedger for MockHost {
    fn is_authorized(&self, principal: &Address) -> bool {
        self.authorized.contains(principal)
    }

    fn now(&self) -> u64 {
        self.time
    }

    fn sequence(&self) -> u64 {
        self.seq
    }

    fn collect_deposit(&self, _from: &Address, _asset: &AssetId, _amount: Amount) -> bool {
        self.deposits_settle
    }

    fn transfer_token(&self, _to: &Address, _asset: &AssetId, _amount: Amount) -> bool {
        self.token_transfers_succeed
    }

    fn withdrawal_transfer(&self) -> Option<ExternalTransfer> {
        self.current_withdrawal.clone()
    }

    fn flagged_withdrawals_since(&self, sequence: u64) -> Vec<Address> {
        self.flagged_history
            .iter()
            .filter(|(seq, _)| *seq >= sequence)
            .map(|(_, principal)| *principal)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_output_sums() {
        let asset = AssetId::from_bytes(vec![1u8; 32]);
        let transfer = ExternalTransfer {
            withdrawal_of: Address([1u8; 20]),
            outputs: vec![
                TransferOutput {
                    recipient: Address([1u8; 20]),
                    asset: asset.clone(),
                    amount: 30,
                },
                TransferOutput {
                    recipient: Address([2u8; 20]),
                    asset,
                    amount: 12,
                },
            ],
            total_input: 42,
        };
        assert_eq!(transfer.total_output(), 42);
    }

    #[test]
    fn mock_host_authorization() {
        let mut host = MockHost::new();
        let alice = Address([1u8; 20]);
        assert!(!host.is_authorized(&alice));
        host.authorize(alice);
        assert!(host.is_authorized(&alice));
        host.deauthorize_all();
        assert!(!host.is_authorized(&alice));
    }

    #[test]
    fn mock_host_history_filter() {
        let mut host = MockHost::new();
        let alice = Address([1u8; 20]);
        let bob = Address([2u8; 20]);
        host.flagged_history = vec![(5, alice), (10, bob)];
        assert_eq!(host.flagged_withdrawals_since(6), vec![bob]);
        assert_eq!(host.flagged_withdrawals_since(5), vec![alice, bob]);
        assert!(host.flagged_withdrawals_since(11).is_empty());
    }
}
