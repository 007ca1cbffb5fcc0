//! Domain events emitted by the engine.
//!
//! Events are returned alongside the operation result rather than fired
//! through a callback, so tests and callers can assert on them
//! deterministically. They are the secondary information channel: a soft
//! failure (vanished offer, dust fill) still reports overall success but
//! carries a [`Event::Failed`].

use serde::{Deserialize, Serialize};

use crate::ids::{Address, AssetId, OfferHash};
use crate::offer::Amount;

/// A domain event observed by clients of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// A new offer entered the order book.
    Created {
        offer_hash: OfferHash,
        offer_asset: AssetId,
        offer_amount: Amount,
        want_asset: AssetId,
        want_amount: Amount,
    },
    /// An offer was (partially) filled.
    Filled {
        filler: Address,
        offer_hash: OfferHash,
        fill_amount: Amount,
        offer_asset: AssetId,
        offer_amount: Amount,
        want_asset: AssetId,
        want_amount: Amount,
    },
    /// A fill could not take effect (offer gone, or dust after rounding).
    Failed {
        principal: Address,
        offer_hash: OfferHash,
    },
    /// An offer was cancelled by its maker.
    Cancelled { offer_hash: OfferHash },
    /// Escrow balance was credited to a principal.
    Transferred {
        principal: Address,
        asset: AssetId,
        amount: Amount,
    },
    /// Custodied balance left the ledger as an external transfer.
    Withdrawn {
        principal: Address,
        asset: AssetId,
        amount: Amount,
    },
}
