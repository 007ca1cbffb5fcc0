//! The `Broker` engine: configuration, lifecycle state, deposits and the
//! read surface.
//!
//! A `Broker` owns the flat key-value space and holds the construction
//! configuration. Every mutating operation takes the host ledger as an
//! explicit collaborator argument; nothing from the host is cached across
//! invocations. The matching, staking and administration operations live
//! in their own modules as further `impl Broker` blocks; withdrawal
//! operations dispatch into `custodex-settlement`.

use custodex_settlement::withdraw;
use custodex_store::{book, keys, ledger, KvStore};
use custodex_types::{
    Address, Amount, AssetId, Bucket, ContractState, CustodexError, EngineConfig, Event,
    ExternalTransfer, HostLedger, Offer, OfferHash, Result, TradingPair,
};

/// The exchange/escrow ledger engine.
#[derive(Debug, Clone)]
pub struct Broker {
    pub(crate) config: EngineConfig,
    pub(crate) kv: KvStore,
}

impl Broker {
    /// A fresh engine in the `Pending` state with an empty store.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            kv: KvStore::new(),
        }
    }

    /// The construction configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read access to the underlying key-value space, used by the
    /// conservation checker and by tests.
    #[must_use]
    pub fn store(&self) -> &KvStore {
        &self.kv
    }

    // =================================================================
    // Read surface
    // =================================================================

    /// Current contract lifecycle state.
    #[must_use]
    pub fn get_state(&self) -> ContractState {
        self.kv
            .get(&keys::state_key())
            .map_or(ContractState::Pending, ContractState::decode)
    }

    /// The maker fee rate, in units of `config.fee_scale`.
    #[must_use]
    pub fn get_maker_fee(&self) -> Amount {
        self.kv.get_amount(&keys::maker_fee_key())
    }

    /// The taker fee rate, in units of `config.fee_scale`.
    #[must_use]
    pub fn get_taker_fee(&self) -> Amount {
        self.kv.get_amount(&keys::taker_fee_key())
    }

    /// The configured fee-collection address, if one has been set.
    #[must_use]
    pub fn get_fee_address(&self) -> Option<Address> {
        self.kv
            .get(&keys::fee_address_key())
            .and_then(|bytes| bytes.try_into().ok())
            .map(Address)
    }

    /// Escrow balance of a principal in an asset.
    #[must_use]
    pub fn get_balance(&self, principal: &Address, asset: &AssetId) -> Amount {
        ledger::balance(&self.kv, principal, asset)
    }

    /// Accumulated fee-pool balance for one asset in one bucket.
    #[must_use]
    pub fn get_fee_balance(&self, asset: &AssetId, bucket: Bucket) -> Amount {
        ledger::balance(&self.kv, &keys::fee_address_for(bucket), asset)
    }

    /// Page through a pair's open offers, newest first. See
    /// [`book::list_offers`] for the pagination contract.
    ///
    /// # Errors
    ///
    /// `ListCorrupt` if a link points at a missing record.
    pub fn get_offers(
        &self,
        pair: &TradingPair,
        start: Option<OfferHash>,
        count: usize,
    ) -> Result<Vec<(OfferHash, Offer)>> {
        book::list_offers(&self.kv, pair, start, count)
    }

    /// A single offer record, if it exists.
    ///
    /// # Errors
    ///
    /// `Codec` if the stored record fails to decode.
    pub fn get_offer(&self, hash: &OfferHash) -> Result<Option<Offer>> {
        book::get_offer(&self.kv, hash)
    }

    // =================================================================
    // Deposits
    // =================================================================

    /// Credit a principal's escrow balance from an inbound external
    /// transfer confirmed by the host.
    ///
    /// # Errors
    ///
    /// Fails when the contract is not `Active`, inside a flagged
    /// withdrawal transaction, for a zero amount or an invalid asset id,
    /// or when the host does not confirm the inbound transfer settled.
    pub fn deposit(
        &mut self,
        host: &impl HostLedger,
        principal: Address,
        asset: AssetId,
        amount: Amount,
    ) -> Result<Vec<Event>> {
        self.require_active()?;
        if host.withdrawal_transfer().is_some() {
            return Err(CustodexError::DepositDuringWithdrawal);
        }
        if amount < 1 {
            return Err(CustodexError::InvalidAmount(amount));
        }
        if asset.category().is_none() {
            return Err(CustodexError::UnsupportedAsset(asset.as_bytes().len()));
        }
        if !host.collect_deposit(&principal, &asset, amount) {
            tracing::warn!(%principal, %asset, amount, "deposit not confirmed by host");
            return Err(CustodexError::TokenTransferFailed(asset));
        }

        ledger::credit(&mut self.kv, &principal, &asset, amount);
        Ok(vec![Event::Transferred {
            principal,
            asset,
            amount,
        }])
    }

    // =================================================================
    // Withdrawals (dispatch into custodex-settlement)
    // =================================================================

    /// Single-phase withdrawal of a token-like asset.
    ///
    /// # Errors
    ///
    /// See [`withdraw::withdraw_assets`]; additionally fails while the
    /// contract is still `Pending`.
    pub fn withdraw_assets(
        &mut self,
        host: &impl HostLedger,
        principal: Address,
        asset: AssetId,
        amount: Amount,
    ) -> Result<Vec<Event>> {
        self.require_initialized()?;
        withdraw::withdraw_assets(&mut self.kv, host, principal, asset, amount)
    }

    /// Record a withdrawal marker, entering the two-phase protocol.
    ///
    /// # Errors
    ///
    /// See [`withdraw::prepare_asset_withdrawal`]; additionally fails
    /// while the contract is still `Pending`.
    pub fn prepare_asset_withdrawal(
        &mut self,
        host: &impl HostLedger,
        principal: Address,
    ) -> Result<()> {
        self.require_initialized()?;
        withdraw::prepare_asset_withdrawal(&mut self.kv, host, principal)
    }

    /// Host-side verification gate for a flagged external transfer.
    ///
    /// # Errors
    ///
    /// See [`withdraw::verify_asset_withdrawal`]; additionally fails
    /// while the contract is still `Pending`. A `DoubleWithdrawal` error
    /// obliges the host to invalidate the whole transaction.
    pub fn verify_asset_withdrawal(&self, host: &impl HostLedger) -> Result<ExternalTransfer> {
        self.require_initialized()?;
        withdraw::verify_asset_withdrawal(&self.kv, host)
    }

    /// Settle a verified withdrawal: debit every output and clear the
    /// marker.
    ///
    /// # Errors
    ///
    /// See [`withdraw::complete_asset_withdrawal`]; additionally fails
    /// while the contract is still `Pending`.
    pub fn complete_asset_withdrawal(&mut self, host: &impl HostLedger) -> Result<Vec<Event>> {
        self.require_initialized()?;
        withdraw::complete_asset_withdrawal(&mut self.kv, host)
    }

    // =================================================================
    // Shared guards and helpers
    // =================================================================

    pub(crate) fn require_active(&self) -> Result<()> {
        let state = self.get_state();
        if state == ContractState::Active {
            Ok(())
        } else {
            Err(CustodexError::WrongState {
                expected: ContractState::Active.to_string(),
                actual: state.to_string(),
            })
        }
    }

    pub(crate) fn require_initialized(&self) -> Result<()> {
        let state = self.get_state();
        if state == ContractState::Pending {
            Err(CustodexError::WrongState {
                expected: "ACTIVE or FROZEN".to_string(),
                actual: state.to_string(),
            })
        } else {
            Ok(())
        }
    }

    pub(crate) fn require_owner(&self, host: &impl HostLedger) -> Result<()> {
        if host.is_authorized(&self.config.owner) {
            Ok(())
        } else {
            tracing::warn!(owner = %self.config.owner, "owner authorization failed");
            Err(CustodexError::NotOwner)
        }
    }

    /// The bucket containing the host's current time.
    pub(crate) fn current_bucket(&self, host: &impl HostLedger) -> Bucket {
        Bucket(host.now() / self.config.bucket_duration_secs)
    }
}

/// `floor(a * b / divisor)` through a `u128` intermediate. A zero divisor
/// yields zero, matching the "no exchange rate, no fee" rule.
pub(crate) fn mul_div_floor(a: Amount, b: Amount, divisor: Amount) -> Amount {
    if divisor == 0 {
        return 0;
    }
    let wide = u128::from(a) * u128::from(b) / u128::from(divisor);
    Amount::try_from(wide).unwrap_or(Amount::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use custodex_types::MockHost;

    fn owner() -> Address {
        Address([0xEE; 20])
    }

    fn native() -> AssetId {
        AssetId::from_bytes(vec![0xAA; 32])
    }

    fn broker() -> Broker {
        Broker::new(EngineConfig::new(owner(), native()))
    }

    fn active_broker(host: &mut MockHost) -> Broker {
        let mut broker = broker();
        host.authorize(owner());
        broker
            .initialize(host, 2_000, 1_000, Address([0xFE; 20]))
            .unwrap();
        host.deauthorize_all();
        broker
    }

    #[test]
    fn fresh_broker_is_pending() {
        let broker = broker();
        assert_eq!(broker.get_state(), ContractState::Pending);
        assert_eq!(broker.get_maker_fee(), 0);
        assert_eq!(broker.get_fee_address(), None);
    }

    #[test]
    fn deposit_requires_active() {
        let mut broker = broker();
        let host = MockHost::new();
        let err = broker
            .deposit(&host, Address([1u8; 20]), native(), 100)
            .unwrap_err();
        assert!(matches!(err, CustodexError::WrongState { .. }));
    }

    #[test]
    fn deposit_credits_and_reports() {
        let mut host = MockHost::new();
        let mut broker = active_broker(&mut host);
        let alice = Address([1u8; 20]);

        let events = broker.deposit(&host, alice, native(), 500).unwrap();
        assert_eq!(broker.get_balance(&alice, &native()), 500);
        assert_eq!(
            events,
            vec![Event::Transferred {
                principal: alice,
                asset: native(),
                amount: 500,
            }]
        );
    }

    #[test]
    fn deposit_rejects_unconfirmed_transfer() {
        let mut host = MockHost::new();
        let mut broker = active_broker(&mut host);
        host.deposits_settle = false;

        let err = broker
            .deposit(&host, Address([1u8; 20]), native(), 500)
            .unwrap_err();
        assert!(matches!(err, CustodexError::TokenTransferFailed(_)));
        assert_eq!(broker.get_balance(&Address([1u8; 20]), &native()), 0);
    }

    #[test]
    fn deposit_rejects_withdrawal_transactions() {
        let mut host = MockHost::new();
        let mut broker = active_broker(&mut host);
        host.current_withdrawal = Some(ExternalTransfer {
            withdrawal_of: Address([1u8; 20]),
            outputs: Vec::new(),
            total_input: 0,
        });

        let err = broker
            .deposit(&host, Address([1u8; 20]), native(), 500)
            .unwrap_err();
        assert!(matches!(err, CustodexError::DepositDuringWithdrawal));
    }

    #[test]
    fn deposit_rejects_bad_asset_length() {
        let mut host = MockHost::new();
        let mut broker = active_broker(&mut host);
        let err = broker
            .deposit(&host, Address([1u8; 20]), AssetId::from_bytes(vec![1u8; 7]), 5)
            .unwrap_err();
        assert!(matches!(err, CustodexError::UnsupportedAsset(7)));
    }

    #[test]
    fn mul_div_floor_floors() {
        assert_eq!(mul_div_floor(100, 50, 200), 25);
        assert_eq!(mul_div_floor(75, 200, 100), 150);
        assert_eq!(mul_div_floor(1, 1, 3), 0);
        assert_eq!(mul_div_floor(5, 7, 0), 0);
    }

    #[test]
    fn mul_div_floor_uses_wide_intermediate() {
        let big = u64::MAX / 2;
        assert_eq!(mul_div_floor(big, 2, 2), big);
    }
}
