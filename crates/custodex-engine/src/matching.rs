//! Offer creation, filling and cancellation.
//!
//! All fill arithmetic is exact-integer with floor division; the smaller
//! side of a fill is always the binding constraint and the other side is
//! re-derived from it, so an offer can never be over-filled. Every
//! precondition, including the native-asset fee balance on the discount
//! path, is checked before the first storage mutation.

use custodex_store::{book, keys, ledger};
use custodex_types::{
    Address, Amount, AssetId, CustodexError, Event, HostLedger, Offer, OfferHash, Result,
};

use crate::engine::{mul_div_floor, Broker};

impl Broker {
    /// Post a new offer, escrowing the full offered amount.
    ///
    /// # Errors
    ///
    /// Fails when the contract is not `Active`, the caller is not
    /// authorized as `maker`, an amount is zero, the two assets are
    /// equal, an asset id has an unsupported length, the derived hash is
    /// already in use, or the maker's escrow cannot cover the offer.
    #[allow(clippy::too_many_arguments)]
    pub fn make_offer(
        &mut self,
        host: &impl HostLedger,
        maker: Address,
        offer_asset: AssetId,
        offer_amount: Amount,
        want_asset: AssetId,
        want_amount: Amount,
        nonce: u64,
    ) -> Result<Vec<Event>> {
        self.require_active()?;
        if !host.is_authorized(&maker) {
            tracing::warn!(%maker, "make offer rejected: not authorized");
            return Err(CustodexError::NotAuthorized(maker));
        }
        if offer_amount < 1 {
            return Err(CustodexError::InvalidAmount(offer_amount));
        }
        if want_amount < 1 {
            return Err(CustodexError::InvalidAmount(want_amount));
        }
        if offer_asset == want_asset {
            return Err(CustodexError::SameAsset);
        }
        if offer_asset.category().is_none() {
            return Err(CustodexError::UnsupportedAsset(offer_asset.as_bytes().len()));
        }
        if want_asset.category().is_none() {
            return Err(CustodexError::UnsupportedAsset(want_asset.as_bytes().len()));
        }

        let offer = Offer::new(maker, offer_asset, offer_amount, want_asset, want_amount);
        let hash = offer.hash(nonce);
        if book::get_offer(&self.kv, &hash)?.is_some() {
            return Err(CustodexError::DuplicateOffer(hash));
        }

        ledger::debit(&mut self.kv, &maker, &offer.offer_asset, offer_amount)?;
        let event = Event::Created {
            offer_hash: hash,
            offer_asset: offer.offer_asset.clone(),
            offer_amount: offer.offer_amount,
            want_asset: offer.want_asset.clone(),
            want_amount: offer.want_amount,
        };
        book::add_offer(&mut self.kv, &hash, offer)?;

        Ok(vec![event])
    }

    /// Fill an open offer, fully or partially.
    ///
    /// A vanished offer and a fill that rounds below one unit on either
    /// side are soft failures: the call succeeds with a `Failed` event
    /// and no state change. With `use_native_discount` the in-kind taker
    /// fee is waived and a discounted native-asset fee, derived from the
    /// previous bucket's recorded volumes, is burned from the filler's
    /// escrow instead.
    ///
    /// # Errors
    ///
    /// Fails hard (no mutation) when the contract is not `Active`, the
    /// caller is not authorized as `filler`, the filler is the maker, or
    /// an escrow balance cannot cover the fill plus fees.
    pub fn fill_offer(
        &mut self,
        host: &impl HostLedger,
        filler: Address,
        offer_hash: OfferHash,
        amount_to_fill: Amount,
        use_native_discount: bool,
    ) -> Result<Vec<Event>> {
        self.require_active()?;
        if !host.is_authorized(&filler) {
            tracing::warn!(%filler, "fill rejected: not authorized");
            return Err(CustodexError::NotAuthorized(filler));
        }

        let Some(mut offer) = book::get_offer(&self.kv, &offer_hash)? else {
            tracing::debug!(offer = %offer_hash, "fill target vanished");
            return Ok(vec![Event::Failed {
                principal: filler,
                offer_hash,
            }]);
        };
        if offer.maker == filler {
            return Err(CustodexError::SelfFill(offer_hash));
        }

        // The requested want-side amount determines the offered side;
        // if that overshoots what is left, the available amount becomes
        // the binding constraint and the want side is re-derived.
        let mut amount_to_fill = amount_to_fill;
        let mut amount_to_offer =
            mul_div_floor(offer.offer_amount, amount_to_fill, offer.want_amount);
        if amount_to_offer > offer.available_amount {
            amount_to_offer = offer.available_amount;
            amount_to_fill = mul_div_floor(amount_to_offer, offer.want_amount, offer.offer_amount);
        }
        if amount_to_offer < 1 || amount_to_fill < 1 {
            tracing::debug!(offer = %offer_hash, "fill rounds to dust");
            return Ok(vec![Event::Failed {
                principal: filler,
                offer_hash,
            }]);
        }

        let maker_fee = mul_div_floor(amount_to_fill, self.get_maker_fee(), self.config.fee_scale);
        let taker_fee = mul_div_floor(amount_to_offer, self.get_taker_fee(), self.config.fee_scale);
        let native_fee = if use_native_discount {
            self.native_fee_for(host, &offer.offer_asset, taker_fee)
        } else {
            0
        };

        // Balance checks, before any mutation. The native fee stacks on
        // top of the fill amount when the wanted asset is the native
        // asset itself.
        let native = self.config.native_asset.clone();
        let mut want_needed = amount_to_fill;
        if use_native_discount && native == offer.want_asset {
            want_needed += native_fee;
        }
        let want_held = ledger::balance(&self.kv, &filler, &offer.want_asset);
        if want_held < want_needed {
            return Err(CustodexError::InsufficientBalance {
                principal: filler,
                asset: offer.want_asset.clone(),
                needed: want_needed,
                available: want_held,
            });
        }
        if use_native_discount && native != offer.want_asset && native_fee >= 1 {
            let native_held = ledger::balance(&self.kv, &filler, &native);
            if native_held < native_fee {
                return Err(CustodexError::InsufficientBalance {
                    principal: filler,
                    asset: native.clone(),
                    needed: native_fee,
                    available: native_held,
                });
            }
        }

        // Settle the want side: filler pays, fee pool and maker receive.
        let fee_pool = keys::fee_address_for(self.current_bucket(host));
        ledger::debit(&mut self.kv, &filler, &offer.want_asset, amount_to_fill)?;
        ledger::credit(&mut self.kv, &fee_pool, &offer.want_asset, maker_fee);
        ledger::credit(
            &mut self.kv,
            &offer.maker,
            &offer.want_asset,
            amount_to_fill - maker_fee,
        );

        // Settle the offered side. On the discount path the in-kind fee
        // is waived and the native fee is burned, not pooled.
        if use_native_discount {
            if native_fee >= 1 {
                ledger::debit(&mut self.kv, &filler, &native, native_fee)?;
            }
            ledger::credit(&mut self.kv, &filler, &offer.offer_asset, amount_to_offer);
        } else {
            ledger::credit(&mut self.kv, &fee_pool, &offer.offer_asset, taker_fee);
            ledger::credit(
                &mut self.kv,
                &filler,
                &offer.offer_asset,
                amount_to_offer - taker_fee,
            );
        }

        self.record_volumes(host, &offer, amount_to_offer, amount_to_fill);

        offer.available_amount -= amount_to_offer;
        let event = Event::Filled {
            filler,
            offer_hash,
            fill_amount: amount_to_fill,
            offer_asset: offer.offer_asset.clone(),
            offer_amount: offer.offer_amount,
            want_asset: offer.want_asset.clone(),
            want_amount: offer.want_amount,
        };
        book::store_offer(&mut self.kv, &offer_hash, &offer)?;

        tracing::debug!(
            offer = %offer_hash,
            %filler,
            amount_to_offer,
            amount_to_fill,
            maker_fee,
            taker_fee,
            native_fee,
            "offer filled"
        );
        Ok(vec![event])
    }

    /// Cancel an open offer, returning the remaining escrow to the
    /// maker.
    ///
    /// # Errors
    ///
    /// Fails when the contract is still `Pending`, the offer does not
    /// exist, or the caller is not authorized as its maker.
    pub fn cancel_offer(
        &mut self,
        host: &impl HostLedger,
        offer_hash: OfferHash,
    ) -> Result<Vec<Event>> {
        self.require_initialized()?;
        let Some(offer) = book::get_offer(&self.kv, &offer_hash)? else {
            return Err(CustodexError::OfferNotFound(offer_hash));
        };
        if !host.is_authorized(&offer.maker) {
            tracing::warn!(offer = %offer_hash, "cancel rejected: not the maker");
            return Err(CustodexError::NotMaker(offer_hash));
        }

        ledger::credit(
            &mut self.kv,
            &offer.maker,
            &offer.offer_asset,
            offer.available_amount,
        );
        book::remove_offer(&mut self.kv, &offer_hash, &offer)?;

        Ok(vec![Event::Cancelled { offer_hash }])
    }

    /// The discounted native fee equivalent to `taker_fee` units of
    /// `fee_asset`, at the previous bucket's observed exchange rate.
    /// Zero when no foreign volume was recorded (no rate available).
    fn native_fee_for(
        &self,
        host: &impl HostLedger,
        fee_asset: &AssetId,
        taker_fee: Amount,
    ) -> Amount {
        let previous = self.current_bucket(host).previous();
        let native_volume = self
            .kv
            .get_amount(&keys::native_volume_key(fee_asset, previous));
        let foreign_volume = self
            .kv
            .get_amount(&keys::foreign_volume_key(fee_asset, previous));
        mul_div_floor(
            taker_fee,
            native_volume,
            foreign_volume.saturating_mul(self.config.native_fee_discount),
        )
    }

    /// Record per-bucket trade volumes whenever one side of the trade is
    /// the native asset. These feed the next bucket's exchange-rate
    /// proxy for the discount path.
    fn record_volumes(
        &mut self,
        host: &impl HostLedger,
        offer: &Offer,
        amount_to_offer: Amount,
        amount_to_fill: Amount,
    ) {
        let bucket = self.current_bucket(host);
        let native = &self.config.native_asset;

        if offer.offer_asset == *native {
            let native_key = keys::native_volume_key(&offer.want_asset, bucket);
            let volume = self.kv.get_amount(&native_key);
            self.kv.put_amount(native_key, volume + amount_to_offer);

            let foreign_key = keys::foreign_volume_key(&offer.want_asset, bucket);
            let volume = self.kv.get_amount(&foreign_key);
            self.kv.put_amount(foreign_key, volume + amount_to_fill);
        }
        if offer.want_asset == *native {
            let native_key = keys::native_volume_key(&offer.offer_asset, bucket);
            let volume = self.kv.get_amount(&native_key);
            self.kv.put_amount(native_key, volume + amount_to_fill);

            let foreign_key = keys::foreign_volume_key(&offer.offer_asset, bucket);
            let volume = self.kv.get_amount(&foreign_key);
            self.kv.put_amount(foreign_key, volume + amount_to_offer);
        }
    }
}
