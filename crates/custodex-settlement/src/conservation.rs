//! The supply-conservation check.
//!
//! For every asset, the escrowed supply inside the ledger (all balances,
//! fee pools included) must never exceed what flowed in from outside
//! minus what flowed back out. Fills move value between principals and
//! fees may be burned, so the supply can be below the net inflow, never
//! above it. The audit is driven from outside the engine: callers record
//! the external movements they performed and then check the store.

use std::collections::BTreeMap;

use custodex_store::{ledger, KvStore};
use custodex_types::{Amount, AssetId, CustodexError, Result};

/// Tracks external inflow and outflow per asset, for comparison against
/// the ledger's internal supply.
#[derive(Debug, Default, Clone)]
pub struct SupplyAudit {
    deposited: BTreeMap<AssetId, u128>,
    withdrawn: BTreeMap<AssetId, u128>,
}

impl SupplyAudit {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an external deposit that settled into custody.
    pub fn record_deposit(&mut self, asset: &AssetId, amount: Amount) {
        *self.deposited.entry(asset.clone()).or_insert(0) += u128::from(amount);
    }

    /// Record an external withdrawal that left custody.
    pub fn record_withdrawal(&mut self, asset: &AssetId, amount: Amount) {
        *self.withdrawn.entry(asset.clone()).or_insert(0) += u128::from(amount);
    }

    /// Net external inflow of one asset.
    #[must_use]
    pub fn net_inflow(&self, asset: &AssetId) -> u128 {
        let deposited = self.deposited.get(asset).copied().unwrap_or(0);
        let withdrawn = self.withdrawn.get(asset).copied().unwrap_or(0);
        deposited.saturating_sub(withdrawn)
    }

    /// Check the conservation inequality for one asset.
    ///
    /// # Errors
    ///
    /// `ConservationViolation` when the ledger holds more of the asset
    /// than its net external inflow.
    pub fn check(&self, kv: &KvStore, asset: &AssetId) -> Result<()> {
        let supply = ledger::asset_supply(kv, asset);
        let inflow = self.net_inflow(asset);
        if supply > inflow {
            return Err(CustodexError::ConservationViolation {
                reason: format!("{asset}: ledger supply {supply} exceeds net inflow {inflow}"),
            });
        }
        Ok(())
    }

    /// Check every asset that ever moved across the boundary.
    ///
    /// # Errors
    ///
    /// `ConservationViolation` on the first asset that fails.
    pub fn check_all(&self, kv: &KvStore) -> Result<()> {
        for asset in self.deposited.keys().chain(self.withdrawn.keys()) {
            self.check(kv, asset)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custodex_types::Address;

    fn token(byte: u8) -> AssetId {
        AssetId::from_bytes(vec![byte; 20])
    }

    #[test]
    fn balanced_ledger_passes() {
        let mut kv = KvStore::new();
        let mut audit = SupplyAudit::new();

        ledger::credit(&mut kv, &Address([1u8; 20]), &token(1), 700);
        ledger::credit(&mut kv, &Address([2u8; 20]), &token(1), 300);
        audit.record_deposit(&token(1), 1_000);

        audit.check_all(&kv).unwrap();
    }

    #[test]
    fn burned_value_passes() {
        let mut kv = KvStore::new();
        let mut audit = SupplyAudit::new();

        ledger::credit(&mut kv, &Address([1u8; 20]), &token(1), 900);
        audit.record_deposit(&token(1), 1_000);

        audit.check(&kv, &token(1)).unwrap();
    }

    #[test]
    fn minted_value_is_detected() {
        let mut kv = KvStore::new();
        let mut audit = SupplyAudit::new();

        ledger::credit(&mut kv, &Address([1u8; 20]), &token(1), 1_100);
        audit.record_deposit(&token(1), 1_000);

        assert!(matches!(
            audit.check(&kv, &token(1)),
            Err(CustodexError::ConservationViolation { .. })
        ));
    }

    #[test]
    fn withdrawals_reduce_the_allowance() {
        let mut kv = KvStore::new();
        let mut audit = SupplyAudit::new();

        ledger::credit(&mut kv, &Address([1u8; 20]), &token(1), 600);
        audit.record_deposit(&token(1), 1_000);
        audit.record_withdrawal(&token(1), 400);
        audit.check(&kv, &token(1)).unwrap();

        audit.record_withdrawal(&token(1), 100);
        assert!(matches!(
            audit.check(&kv, &token(1)),
            Err(CustodexError::ConservationViolation { .. })
        ));
    }
}
