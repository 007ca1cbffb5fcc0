//! Key derivation for the shared key-value space.
//!
//! Each key family carries a leading tag byte so families can never
//! collide and balances can be prefix-scanned by the conservation
//! checker. The tag values follow the reference storage flags; native
//! and foreign trade volume deliberately use distinct tags.

use custodex_types::constants::ADDRESS_LEN;
use custodex_types::{Address, AssetId, Bucket, OfferHash, TradingPair};

/// Escrow balance: `0x01 || principal || asset`.
pub const TAG_BALANCE: u8 = 0x01;
/// Offer record: `0x02 || offer hash`.
pub const TAG_OFFER: u8 = 0x02;
/// Trading-pair list head: `0x03 || offer asset || want asset`.
pub const TAG_PAIR_HEAD: u8 = 0x03;
/// Withdrawal marker: `0x50 || principal`.
pub const TAG_WITHDRAWAL: u8 = 0x50;
/// First byte of a synthetic per-bucket fee address.
pub const TAG_FEE_ADDRESS: u8 = 0x60;
/// Stake amount: `0x61 || staker`.
pub const TAG_STAKED_AMOUNT: u8 = 0x61;
/// Claimed-through bucket of a stake: `0x62 || staker`.
pub const TAG_STAKED_BUCKET: u8 = 0x62;
/// Total staked in a bucket: `0x63 || bucket`.
pub const TAG_STAKED_TOTAL: u8 = 0x63;
/// Native-asset trade volume: `0x70 || asset || bucket`.
pub const TAG_NATIVE_VOLUME: u8 = 0x70;
/// Foreign-asset trade volume: `0x71 || asset || bucket`.
pub const TAG_FOREIGN_VOLUME: u8 = 0x71;

fn tagged(tag: u8, parts: &[&[u8]]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + parts.iter().map(|p| p.len()).sum::<usize>());
    key.push(tag);
    for part in parts {
        key.extend_from_slice(part);
    }
    key
}

/// Balance entry for a (principal, asset) pair.
#[must_use]
pub fn balance_key(principal: &Address, asset: &AssetId) -> Vec<u8> {
    tagged(TAG_BALANCE, &[principal.as_bytes(), asset.as_bytes()])
}

/// Prefix of every balance key.
#[must_use]
pub fn balance_prefix() -> Vec<u8> {
    vec![TAG_BALANCE]
}

/// Split a balance key back into its asset-id suffix.
/// Returns `None` for keys outside the balance family.
#[must_use]
pub fn balance_key_asset(key: &[u8]) -> Option<&[u8]> {
    if key.first() == Some(&TAG_BALANCE) && key.len() > 1 + ADDRESS_LEN {
        Some(&key[1 + ADDRESS_LEN..])
    } else {
        None
    }
}

/// Offer record keyed by content hash.
#[must_use]
pub fn offer_key(hash: &OfferHash) -> Vec<u8> {
    tagged(TAG_OFFER, &[hash.as_bytes()])
}

/// Head pointer of a trading-pair list.
#[must_use]
pub fn pair_head_key(pair: &TradingPair) -> Vec<u8> {
    tagged(
        TAG_PAIR_HEAD,
        &[pair.offer_asset.as_bytes(), pair.want_asset.as_bytes()],
    )
}

/// Pending-withdrawal marker for a principal.
#[must_use]
pub fn withdrawal_key(principal: &Address) -> Vec<u8> {
    tagged(TAG_WITHDRAWAL, &[principal.as_bytes()])
}

/// Stake amount for a staker.
#[must_use]
pub fn staked_amount_key(staker: &Address) -> Vec<u8> {
    tagged(TAG_STAKED_AMOUNT, &[staker.as_bytes()])
}

/// Claimed-through bucket for a staker.
#[must_use]
pub fn staked_bucket_key(staker: &Address) -> Vec<u8> {
    tagged(TAG_STAKED_BUCKET, &[staker.as_bytes()])
}

/// Total staked effective in a bucket.
#[must_use]
pub fn staked_total_key(bucket: Bucket) -> Vec<u8> {
    tagged(TAG_STAKED_TOTAL, &[&bucket.0.to_le_bytes()])
}

/// Native-asset volume traded against `asset` during `bucket`.
#[must_use]
pub fn native_volume_key(asset: &AssetId, bucket: Bucket) -> Vec<u8> {
    tagged(TAG_NATIVE_VOLUME, &[asset.as_bytes(), &bucket.0.to_le_bytes()])
}

/// `asset` volume traded against the native asset during `bucket`.
#[must_use]
pub fn foreign_volume_key(asset: &AssetId, bucket: Bucket) -> Vec<u8> {
    tagged(
        TAG_FOREIGN_VOLUME,
        &[asset.as_bytes(), &bucket.0.to_le_bytes()],
    )
}

/// The synthetic principal owning a bucket's fee pool. Fee pools are
/// ordinary escrow balances held by this address.
#[must_use]
pub fn fee_address_for(bucket: Bucket) -> Address {
    let mut bytes = [0u8; ADDRESS_LEN];
    bytes[0] = TAG_FEE_ADDRESS;
    bytes[1..9].copy_from_slice(&bucket.0.to_le_bytes());
    Address(bytes)
}

/// Contract lifecycle state.
#[must_use]
pub fn state_key() -> Vec<u8> {
    b"state".to_vec()
}

/// Maker fee rate.
#[must_use]
pub fn maker_fee_key() -> Vec<u8> {
    b"makerFee".to_vec()
}

/// Taker fee rate.
#[must_use]
pub fn taker_fee_key() -> Vec<u8> {
    b"takerFee".to_vec()
}

/// Fee-collection address.
#[must_use]
pub fn fee_address_key() -> Vec<u8> {
    b"feeAddress".to_vec()
}
