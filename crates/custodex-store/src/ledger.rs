//! Escrow balance primitives.
//!
//! Balances are the only value-bearing state: fee pools, maker escrow and
//! user deposits are all plain `(principal, asset)` entries. `credit` and
//! `debit` are the sole mutation paths, so the conservation checker can
//! audit value by scanning one key family.

use custodex_types::{Address, Amount, AssetId, CustodexError, Result};

use crate::keys;
use crate::kv::KvStore;

/// Current escrow balance of a principal in an asset. Absent reads as
/// zero.
#[must_use]
pub fn balance(kv: &KvStore, principal: &Address, asset: &AssetId) -> Amount {
    kv.get_amount(&keys::balance_key(principal, asset))
}

/// Increase a principal's escrow balance.
///
/// Amounts below one are a silent no-op: rounding in fee math can
/// legitimately produce zero, and a zero credit must not create a key.
pub fn credit(kv: &mut KvStore, principal: &Address, asset: &AssetId, amount: Amount) {
    if amount < 1 {
        tracing::debug!(%principal, %asset, "skipping zero credit");
        return;
    }
    let key = keys::balance_key(principal, asset);
    let current = kv.get_amount(&key);
    kv.put_amount(key, current + amount);
    tracing::trace!(%principal, %asset, amount, "credited escrow");
}

/// Decrease a principal's escrow balance.
///
/// # Errors
///
/// `InvalidAmount` for a zero debit; `InsufficientBalance` if the balance
/// cannot cover `amount`. A balance reduced to exactly zero has its key
/// deleted.
pub fn debit(kv: &mut KvStore, principal: &Address, asset: &AssetId, amount: Amount) -> Result<()> {
    if amount < 1 {
        return Err(CustodexError::InvalidAmount(amount));
    }
    let key = keys::balance_key(principal, asset);
    let current = kv.get_amount(&key);
    if current < amount {
        return Err(CustodexError::InsufficientBalance {
            principal: *principal,
            asset: asset.clone(),
            needed: amount,
            available: current,
        });
    }
    let remaining = current - amount;
    if remaining == 0 {
        kv.delete(&key);
    } else {
        kv.put_amount(key, remaining);
    }
    tracing::trace!(%principal, %asset, amount, remaining, "debited escrow");
    Ok(())
}

/// Total escrowed supply of one asset across all principals, including
/// synthetic fee-pool addresses. `u128` so the sum cannot overflow.
#[must_use]
pub fn asset_supply(kv: &KvStore, asset: &AssetId) -> u128 {
    let prefix = keys::balance_prefix();
    kv.scan_prefix(&prefix)
        .filter(|(key, _)| keys::balance_key_asset(key) == Some(asset.as_bytes()))
        .map(|(_, value)| {
            value
                .try_into()
                .map_or(0u128, |b| u128::from(Amount::from_le_bytes(b)))
        })
        .sum()
}
