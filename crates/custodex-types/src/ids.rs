//! Identifiers used throughout Custodex.
//!
//! Principals and assets are raw byte strings as supplied by the host
//! ledger; offers are addressed by a content-derived SHA-256 hash which
//! doubles as the node index of the order-book linked list.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::{ADDRESS_LEN, COIN_ASSET_LEN, OFFER_HASH_LEN, TOKEN_ASSET_LEN};

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A principal: an account capable of being authorized for an action.
/// Always exactly 20 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    #[must_use]
    pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "addr:{}", hex::encode(&self.0[..8]))
    }
}

// ---------------------------------------------------------------------------
// AssetId
// ---------------------------------------------------------------------------

/// Category of an asset, inferred from the length of its identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetCategory {
    /// 20-byte id: an asset managed by an external token contract.
    Token,
    /// 32-byte id: a system (native-coin-like) asset.
    Coin,
}

/// An asset identifier as supplied by the host ledger.
///
/// Valid ids are 20 bytes (token-like) or 32 bytes (coin-like); any other
/// length fails [`AssetId::category`] and is rejected at the operation
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AssetId(pub Vec<u8>);

impl AssetId {
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The asset category, or `None` if the id length matches neither
    /// supported category.
    #[must_use]
    pub fn category(&self) -> Option<AssetCategory> {
        match self.0.len() {
            TOKEN_ASSET_LEN => Some(AssetCategory::Token),
            COIN_ASSET_LEN => Some(AssetCategory::Coin),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_coin(&self) -> bool {
        self.category() == Some(AssetCategory::Coin)
    }

    #[must_use]
    pub fn is_token(&self) -> bool {
        self.category() == Some(AssetCategory::Token)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = &self.0[..self.0.len().min(8)];
        write!(f, "asset:{}", hex::encode(head))
    }
}

// ---------------------------------------------------------------------------
// OfferHash
// ---------------------------------------------------------------------------

/// Content-derived identifier of an offer, also used as the node index of
/// the trading-pair linked list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct OfferHash(pub [u8; OFFER_HASH_LEN]);

impl OfferHash {
    #[must_use]
    pub fn from_bytes(bytes: [u8; OFFER_HASH_LEN]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; OFFER_HASH_LEN] {
        &self.0
    }

    /// Derive the hash of an offer from its identity fields.
    ///
    /// Two offers with the same maker, pair, amounts and nonce collide by
    /// construction; makers pick a fresh nonce per offer.
    #[must_use]
    pub fn derive(
        maker: &Address,
        offer_asset: &AssetId,
        offer_amount: u64,
        want_asset: &AssetId,
        want_amount: u64,
        nonce: u64,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"custodex:offer:v1:");
        hasher.update(maker.as_bytes());
        hasher.update(offer_asset.as_bytes());
        hasher.update(want_asset.as_bytes());
        hasher.update(offer_amount.to_le_bytes());
        hasher.update(want_amount.to_le_bytes());
        hasher.update(nonce.to_le_bytes());
        let digest = hasher.finalize();
        Self(digest.into())
    }
}

impl fmt::Display for OfferHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offer:{}", hex::encode(&self.0[..8]))
    }
}

// ---------------------------------------------------------------------------
// Bucket
// ---------------------------------------------------------------------------

/// A fixed-duration epoch index used to batch staking and fee
/// distribution. `Bucket::at(time) = time / BUCKET_DURATION_SECS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Bucket(pub u64);

impl Bucket {
    /// The bucket containing the given ledger time (seconds).
    #[must_use]
    pub fn at(time_secs: u64) -> Self {
        Self(time_secs / crate::constants::BUCKET_DURATION_SECS)
    }

    /// The previous bucket, saturating at bucket zero.
    #[must_use]
    pub fn previous(self) -> Self {
        Self(self.0.saturating_sub(1))
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bucket:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// TradingPair
// ---------------------------------------------------------------------------

/// A directed trading pair: offers selling `offer_asset` for `want_asset`.
/// The reverse direction is a distinct pair with its own list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradingPair {
    pub offer_asset: AssetId,
    pub want_asset: AssetId,
}

impl TradingPair {
    #[must_use]
    pub fn new(offer_asset: AssetId, want_asset: AssetId) -> Self {
        Self {
            offer_asset,
            want_asset,
        }
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.offer_asset, self.want_asset)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_category_from_length() {
        assert_eq!(
            AssetId::from_bytes(vec![1u8; 20]).category(),
            Some(AssetCategory::Token)
        );
        assert_eq!(
            AssetId::from_bytes(vec![1u8; 32]).category(),
            Some(AssetCategory::Coin)
        );
        assert_eq!(AssetId::from_bytes(vec![1u8; 21]).category(), None);
        assert_eq!(AssetId::from_bytes(Vec::new()).category(), None);
    }

    #[test]
    fn offer_hash_deterministic() {
        let maker = Address([7u8; 20]);
        let a = AssetId::from_bytes(vec![1u8; 20]);
        let b = AssetId::from_bytes(vec![2u8; 32]);
        let h1 = OfferHash::derive(&maker, &a, 100, &b, 200, 1);
        let h2 = OfferHash::derive(&maker, &a, 100, &b, 200, 1);
        assert_eq!(h1, h2);
    }

    #[test]
    fn offer_hash_differs_by_nonce() {
        let maker = Address([7u8; 20]);
        let a = AssetId::from_bytes(vec![1u8; 20]);
        let b = AssetId::from_bytes(vec![2u8; 32]);
        let h1 = OfferHash::derive(&maker, &a, 100, &b, 200, 1);
        let h2 = OfferHash::derive(&maker, &a, 100, &b, 200, 2);
        assert_ne!(h1, h2);
    }

    #[test]
    fn bucket_at_time() {
        assert_eq!(Bucket::at(0), Bucket(0));
        assert_eq!(Bucket::at(82_799), Bucket(0));
        assert_eq!(Bucket::at(82_800), Bucket(1));
        assert_eq!(Bucket(0).previous(), Bucket(0));
        assert_eq!(Bucket(5).previous(), Bucket(4));
        assert_eq!(Bucket(5).next(), Bucket(6));
    }

    #[test]
    fn serde_roundtrips() {
        let addr = Address([3u8; 20]);
        let json = serde_json::to_string(&addr).unwrap();
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, back);

        let hash = OfferHash([9u8; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        let back: OfferHash = serde_json::from_str(&json).unwrap();
        assert_eq!(hash, back);
    }
}
