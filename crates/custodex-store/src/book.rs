//! The per-trading-pair order book.
//!
//! Each directed pair keeps an intrusive doubly-linked list of offers in
//! the flat key-value space: a head pointer per pair, and `previous`/`next`
//! hash links inside each offer record. New offers are pushed at the head,
//! so walking `previous` links from the head yields newest-first order.
//! The head never carries a `next` link.

use std::collections::BTreeSet;

use custodex_types::constants::MAX_OFFERS_PER_PAGE;
use custodex_types::{CustodexError, Offer, OfferHash, Result, TradingPair};

use crate::keys;
use crate::kv::KvStore;

/// Head of a pair's list, if the list is non-empty.
pub fn head(kv: &KvStore, pair: &TradingPair) -> Result<Option<OfferHash>> {
    match kv.get(&keys::pair_head_key(pair)) {
        None => Ok(None),
        Some(bytes) => {
            let hash: [u8; 32] = bytes.try_into().map_err(|_| {
                CustodexError::ListCorrupt(format!("malformed head pointer for {pair}"))
            })?;
            Ok(Some(OfferHash(hash)))
        }
    }
}

/// Read and decode a stored offer. `None` if no record exists.
pub fn get_offer(kv: &KvStore, hash: &OfferHash) -> Result<Option<Offer>> {
    match kv.get(&keys::offer_key(hash)) {
        None => Ok(None),
        Some(bytes) => Ok(Some(Offer::decode(bytes)?)),
    }
}

/// Link a fresh offer in at the head of its pair's list and persist it.
///
/// # Errors
///
/// `DuplicateOffer` if a record already exists under `hash`;
/// `ListCorrupt` if the current head record is missing.
pub fn add_offer(kv: &mut KvStore, hash: &OfferHash, offer: Offer) -> Result<()> {
    if kv.contains(&keys::offer_key(hash)) {
        return Err(CustodexError::DuplicateOffer(*hash));
    }

    let pair = offer.trading_pair();
    let mut offer = offer;
    offer.next = None;

    if let Some(old_head) = head(kv, &pair)? {
        let mut old = get_offer(kv, &old_head)?.ok_or_else(|| {
            CustodexError::ListCorrupt(format!("head {old_head} of {pair} has no record"))
        })?;
        old.next = Some(*hash);
        kv.put(keys::offer_key(&old_head), old.encode());
        offer.previous = Some(old_head);
    } else {
        offer.previous = None;
    }

    kv.put(keys::pair_head_key(&pair), hash.as_bytes().to_vec());
    kv.put(keys::offer_key(hash), offer.encode());
    tracing::debug!(offer = %hash, %pair, "offer linked at head");
    Ok(())
}

/// Persist an updated offer, or unlink it if fully filled.
///
/// An offer with zero `available_amount` is never written back; it is
/// removed from the list instead.
pub fn store_offer(kv: &mut KvStore, hash: &OfferHash, offer: &Offer) -> Result<()> {
    if offer.available_amount == 0 {
        remove_offer(kv, hash, offer)
    } else {
        kv.put(keys::offer_key(hash), offer.encode());
        Ok(())
    }
}

/// Unlink an offer from its pair's list and delete its record.
///
/// `offer` must be the currently stored record for `hash`; the caller has
/// just read it.
pub fn remove_offer(kv: &mut KvStore, hash: &OfferHash, offer: &Offer) -> Result<()> {
    let pair = offer.trading_pair();

    if head(kv, &pair)? == Some(*hash) {
        // Head removal: promote the previous offer, or drop the list.
        if let Some(prev_hash) = offer.previous {
            let mut prev = get_offer(kv, &prev_hash)?.ok_or_else(|| {
                CustodexError::ListCorrupt(format!("previous {prev_hash} of head has no record"))
            })?;
            prev.next = None;
            kv.put(keys::offer_key(&prev_hash), prev.encode());
            kv.put(keys::pair_head_key(&pair), prev_hash.as_bytes().to_vec());
        } else {
            kv.delete(&keys::pair_head_key(&pair));
        }
    } else {
        // Interior removal: bridge the neighbours.
        if let Some(prev_hash) = offer.previous {
            let mut prev = get_offer(kv, &prev_hash)?.ok_or_else(|| {
                CustodexError::ListCorrupt(format!("previous {prev_hash} has no record"))
            })?;
            prev.next = offer.next;
            kv.put(keys::offer_key(&prev_hash), prev.encode());
        }
        if let Some(next_hash) = offer.next {
            let mut next = get_offer(kv, &next_hash)?.ok_or_else(|| {
                CustodexError::ListCorrupt(format!("next {next_hash} has no record"))
            })?;
            next.previous = offer.previous;
            kv.put(keys::offer_key(&next_hash), next.encode());
        }
    }

    kv.delete(&keys::offer_key(hash));
    tracing::debug!(offer = %hash, %pair, "offer unlinked");
    Ok(())
}

/// Page through a pair's offers, newest first.
///
/// `start = None` begins at the head. `start = Some(h)` resumes after `h`:
/// the page begins at `h`'s `previous` link, so consecutive pages never
/// overlap. Page size is capped at [`MAX_OFFERS_PER_PAGE`].
pub fn list_offers(
    kv: &KvStore,
    pair: &TradingPair,
    start: Option<OfferHash>,
    count: usize,
) -> Result<Vec<(OfferHash, Offer)>> {
    let limit = count.min(MAX_OFFERS_PER_PAGE);
    let mut page = Vec::new();

    let mut cursor = match start {
        None => head(kv, pair)?,
        Some(after) => match get_offer(kv, &after)? {
            Some(offer) => offer.previous,
            None => None,
        },
    };

    while let Some(hash) = cursor {
        if page.len() >= limit {
            break;
        }
        let offer = get_offer(kv, &hash)?.ok_or_else(|| {
            CustodexError::ListCorrupt(format!("dangling link {hash} in {pair}"))
        })?;
        cursor = offer.previous;
        page.push((hash, offer));
    }

    Ok(page)
}

/// Every offer hash in a pair's list, newest first.
///
/// # Errors
///
/// `ListCorrupt` on a dangling link or a cycle.
pub fn linearize(kv: &KvStore, pair: &TradingPair) -> Result<Vec<OfferHash>> {
    let mut order = Vec::new();
    let mut seen = BTreeSet::new();
    let mut cursor = head(kv, pair)?;

    while let Some(hash) = cursor {
        if !seen.insert(hash) {
            return Err(CustodexError::ListCorrupt(format!(
                "cycle through {hash} in {pair}"
            )));
        }
        let offer = get_offer(kv, &hash)?.ok_or_else(|| {
            CustodexError::ListCorrupt(format!("dangling link {hash} in {pair}"))
        })?;
        cursor = offer.previous;
        order.push(hash);
    }

    Ok(order)
}

/// Verify the list invariants for one pair: the head has no `next` link,
/// neighbouring links are mutual, and the walk terminates.
pub fn check_integrity(kv: &KvStore, pair: &TradingPair) -> Result<()> {
    let Some(head_hash) = head(kv, pair)? else {
        return Ok(());
    };

    let head_offer = get_offer(kv, &head_hash)?.ok_or_else(|| {
        CustodexError::ListCorrupt(format!("head {head_hash} of {pair} has no record"))
    })?;
    if head_offer.next.is_some() {
        return Err(CustodexError::ListCorrupt(format!(
            "head {head_hash} of {pair} carries a next link"
        )));
    }

    for hash in linearize(kv, pair)? {
        let offer = get_offer(kv, &hash)?
            .ok_or_else(|| CustodexError::ListCorrupt(format!("dangling link {hash}")))?;
        if let Some(prev_hash) = offer.previous {
            let prev = get_offer(kv, &prev_hash)?.ok_or_else(|| {
                CustodexError::ListCorrupt(format!("dangling previous {prev_hash}"))
            })?;
            if prev.next != Some(hash) {
                return Err(CustodexError::ListCorrupt(format!(
                    "asymmetric links between {hash} and {prev_hash}"
                )));
            }
        }
        if offer.trading_pair() != *pair {
            return Err(CustodexError::ListCorrupt(format!(
                "offer {hash} linked into the wrong pair list"
            )));
        }
    }

    Ok(())
}
