//! The maker offer model and its storage codec.
//!
//! Offers live in the same flat key-value space as escrow balances, keyed
//! by their content hash. The `previous`/`next` fields are hash links into
//! the per-trading-pair list; the storage encoding writes absent links as
//! 32 zero bytes so every record has a fixed layout for its asset widths.

use serde::{Deserialize, Serialize};

use crate::constants::{ADDRESS_LEN, AMOUNT_ENC_LEN, OFFER_HASH_LEN};
use crate::error::{CustodexError, Result};
use crate::ids::{Address, AssetCategory, AssetId, OfferHash, TradingPair};

/// Ledger amount. Exact integer; every multiply-then-divide goes through
/// a `u128` intermediate with floor division.
pub type Amount = u64;

/// Category tag bytes used in the storage encoding.
const TOKEN_TAG: u8 = 0x98;
const COIN_TAG: u8 = 0x99;

/// A standing instruction to exchange a fixed amount of one asset for
/// another, partially fillable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    /// The principal who posted the offer and escrowed `offer_amount`.
    pub maker: Address,
    /// Asset being sold.
    pub offer_asset: AssetId,
    /// Total amount originally offered.
    pub offer_amount: Amount,
    /// Asset wanted in exchange.
    pub want_asset: AssetId,
    /// Total amount wanted for the full `offer_amount`.
    pub want_amount: Amount,
    /// Unfilled remainder of `offer_amount`. Strictly decreasing; an offer
    /// at zero is removed from storage, never retained.
    pub available_amount: Amount,
    /// Hash link to the older neighbour in the same trading-pair list.
    pub previous: Option<OfferHash>,
    /// Hash link to the newer neighbour in the same trading-pair list.
    pub next: Option<OfferHash>,
}

impl Offer {
    /// A fresh, unlinked offer with the full amount available.
    #[must_use]
    pub fn new(
        maker: Address,
        offer_asset: AssetId,
        offer_amount: Amount,
        want_asset: AssetId,
        want_amount: Amount,
    ) -> Self {
        Self {
            maker,
            offer_asset,
            offer_amount,
            want_asset,
            want_amount,
            available_amount: offer_amount,
            previous: None,
            next: None,
        }
    }

    /// The directed trading pair this offer belongs to.
    #[must_use]
    pub fn trading_pair(&self) -> TradingPair {
        TradingPair::new(self.offer_asset.clone(), self.want_asset.clone())
    }

    /// Content hash of this offer under the given nonce.
    #[must_use]
    pub fn hash(&self, nonce: u64) -> OfferHash {
        OfferHash::derive(
            &self.maker,
            &self.offer_asset,
            self.offer_amount,
            &self.want_asset,
            self.want_amount,
            nonce,
        )
    }

    // =================================================================
    // Storage codec
    // =================================================================

    /// Encode into the fixed-layout storage form:
    ///
    /// ```text
    /// maker(20) || offer_cat(1) || want_cat(1)
    ///           || offer_asset(20|32) || want_asset(20|32)
    ///           || offer_amount(8) || want_amount(8) || available(8)
    ///           || previous(32) || next(32)
    /// ```
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(154);
        out.extend_from_slice(self.maker.as_bytes());
        out.push(category_tag(&self.offer_asset));
        out.push(category_tag(&self.want_asset));
        out.extend_from_slice(self.offer_asset.as_bytes());
        out.extend_from_slice(self.want_asset.as_bytes());
        out.extend_from_slice(&self.offer_amount.to_le_bytes());
        out.extend_from_slice(&self.want_amount.to_le_bytes());
        out.extend_from_slice(&self.available_amount.to_le_bytes());
        out.extend_from_slice(&encode_link(self.previous));
        out.extend_from_slice(&encode_link(self.next));
        out
    }

    /// Decode a storage record written by [`Offer::encode`].
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);

        let maker = Address(cursor.take_array::<ADDRESS_LEN>()?);
        let offer_len = asset_len(cursor.take_byte()?)?;
        let want_len = asset_len(cursor.take_byte()?)?;
        let offer_asset = AssetId::from_bytes(cursor.take(offer_len)?);
        let want_asset = AssetId::from_bytes(cursor.take(want_len)?);
        let offer_amount = Amount::from_le_bytes(cursor.take_array::<AMOUNT_ENC_LEN>()?);
        let want_amount = Amount::from_le_bytes(cursor.take_array::<AMOUNT_ENC_LEN>()?);
        let available_amount = Amount::from_le_bytes(cursor.take_array::<AMOUNT_ENC_LEN>()?);
        let previous = decode_link(&cursor.take_array::<OFFER_HASH_LEN>()?);
        let next = decode_link(&cursor.take_array::<OFFER_HASH_LEN>()?);
        cursor.expect_end()?;

        Ok(Self {
            maker,
            offer_asset,
            offer_amount,
            want_asset,
            want_amount,
            available_amount,
            previous,
            next,
        })
    }
}

fn category_tag(asset: &AssetId) -> u8 {
    match asset.category() {
        Some(AssetCategory::Coin) => COIN_TAG,
        // Encoding only happens after boundary validation, so the id is
        // one of the two supported widths.
        _ => TOKEN_TAG,
    }
}

fn asset_len(tag: u8) -> Result<usize> {
    match tag {
        TOKEN_TAG => Ok(crate::constants::TOKEN_ASSET_LEN),
        COIN_TAG => Ok(crate::constants::COIN_ASSET_LEN),
        other => Err(CustodexError::Codec(format!(
            "unknown asset category tag 0x{other:02x}"
        ))),
    }
}

fn encode_link(link: Option<OfferHash>) -> [u8; OFFER_HASH_LEN] {
    link.map_or([0u8; OFFER_HASH_LEN], |h| h.0)
}

fn decode_link(bytes: &[u8; OFFER_HASH_LEN]) -> Option<OfferHash> {
    if bytes.iter().all(|b| *b == 0) {
        None
    } else {
        Some(OfferHash(*bytes))
    }
}

/// Minimal forward-only reader over a storage record.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<Vec<u8>> {
        let end = self.pos + n;
        if end > self.data.len() {
            return Err(CustodexError::Codec(format!(
                "truncated offer record: wanted {n} bytes at offset {}",
                self.pos
            )));
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice.to_vec())
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.take(N)?;
        Ok(bytes.try_into().expect("take returned exactly N bytes"))
    }

    fn take_byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn expect_end(&self) -> Result<()> {
        if self.pos == self.data.len() {
            Ok(())
        } else {
            Err(CustodexError::Codec(format!(
                "trailing bytes in offer record: {} past end of layout",
                self.data.len() - self.pos
            )))
        }
    }
}
