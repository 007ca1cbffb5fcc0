//! Native-asset staking and time-bucketed fee distribution.
//!
//! Fees extracted by the matching engine accumulate in a per-bucket pool
//! (an ordinary escrow balance under a synthetic fee address). A staker
//! is entitled to a pro-rata share of every elapsed bucket from the one
//! they staked in up to, but excluding, the current one. Bucket totals
//! are stored sparsely: a bucket with no recorded value inherits the
//! nearest earlier total, materialized on first read so later writes key
//! off the inherited value.

use custodex_store::{keys, ledger};
use custodex_types::{
    Address, Amount, AssetId, Bucket, CustodexError, Event, HostLedger, Result,
};

use crate::engine::{mul_div_floor, Broker};

impl Broker {
    /// Total native asset staked effective in `bucket`, inheriting from
    /// the nearest earlier recorded bucket.
    ///
    /// Materializes the inherited value into every visited bucket, so
    /// the first read of a sparse range fills it in.
    pub fn get_total_staked(&mut self, bucket: Bucket) -> Amount {
        if self.kv.contains(&keys::staked_total_key(bucket)) {
            return self.kv.get_amount(&keys::staked_total_key(bucket));
        }

        let mut cursor = bucket;
        let inherited = loop {
            if cursor.0 == 0 {
                break 0;
            }
            cursor = cursor.previous();
            if self.kv.contains(&keys::staked_total_key(cursor)) {
                break self.kv.get_amount(&keys::staked_total_key(cursor));
            }
        };
        while cursor < bucket {
            cursor = cursor.next();
            self.kv.put_amount(keys::staked_total_key(cursor), inherited);
        }
        inherited
    }

    /// The staker's open position as (staked amount, claimed-through
    /// bucket), or `None` if no position is open.
    #[must_use]
    pub fn get_stake_details(&self, staker: &Address) -> Option<(Amount, Bucket)> {
        if self.kv.contains(&keys::staked_amount_key(staker)) {
            let amount = self.kv.get_amount(&keys::staked_amount_key(staker));
            let claimed_through = Bucket(self.kv.get_amount(&keys::staked_bucket_key(staker)));
            Some((amount, claimed_through))
        } else {
            None
        }
    }

    /// Open a stake position in the current bucket.
    ///
    /// # Errors
    ///
    /// Fails when the contract is not `Active`, the caller is not
    /// authorized as `staker`, the amount is zero, a position is already
    /// open, or the staker's native escrow cannot cover the amount.
    pub fn stake_tokens(
        &mut self,
        host: &impl HostLedger,
        staker: Address,
        amount: Amount,
    ) -> Result<Vec<Event>> {
        self.require_active()?;
        if !host.is_authorized(&staker) {
            tracing::warn!(%staker, "stake rejected: not authorized");
            return Err(CustodexError::NotAuthorized(staker));
        }
        if amount < 1 {
            return Err(CustodexError::InvalidAmount(amount));
        }
        if self.get_stake_details(&staker).is_some() {
            return Err(CustodexError::StakeExists(staker));
        }

        let bucket = self.current_bucket(host);
        let total = self.get_total_staked(bucket);
        let native = self.config.native_asset.clone();
        ledger::debit(&mut self.kv, &staker, &native, amount)?;

        self.kv.put_amount(keys::staked_amount_key(&staker), amount);
        self.kv.put_amount(keys::staked_bucket_key(&staker), bucket.0);
        self.kv
            .put_amount(keys::staked_total_key(bucket), total + amount);

        tracing::debug!(%staker, amount, %bucket, "stake opened");
        Ok(Vec::new())
    }

    /// Claim the pro-rata fee share of one elapsed bucket, for each of
    /// the given assets, and advance the claimed-through bucket past it.
    ///
    /// # Errors
    ///
    /// Fails when the contract is not `Active`, the claimer has no open
    /// stake, or `bucket` is outside the claimable window
    /// `claimed_through ≤ bucket < current`.
    pub fn claim_fees(
        &mut self,
        host: &impl HostLedger,
        claimer: Address,
        assets: &[AssetId],
        bucket: Bucket,
    ) -> Result<Vec<Event>> {
        self.require_active()?;
        let Some((staked_amount, claimed_through)) = self.get_stake_details(&claimer) else {
            return Err(CustodexError::NoStake(claimer));
        };
        let current = self.current_bucket(host);
        if bucket < claimed_through || bucket >= current {
            return Err(CustodexError::BucketNotClaimable {
                bucket: bucket.0,
                claimed_through: claimed_through.0,
                current: current.0,
            });
        }

        let total = self.get_total_staked(bucket);
        let fee_pool = keys::fee_address_for(bucket);
        let mut events = Vec::new();
        for asset in assets {
            let pool_balance = ledger::balance(&self.kv, &fee_pool, asset);
            let claimable = mul_div_floor(pool_balance, staked_amount, total);
            if claimable >= 1 {
                ledger::debit(&mut self.kv, &fee_pool, asset, claimable)?;
                ledger::credit(&mut self.kv, &claimer, asset, claimable);
                events.push(Event::Transferred {
                    principal: claimer,
                    asset: asset.clone(),
                    amount: claimable,
                });
            }
        }

        self.kv
            .put_amount(keys::staked_bucket_key(&claimer), bucket.next().0);
        tracing::debug!(%claimer, %bucket, claims = events.len(), "fees claimed");
        Ok(events)
    }

    /// Close a stake position and return the principal to the staker's
    /// escrow. Unclaimed fee entitlement for elapsed buckets is
    /// abandoned.
    ///
    /// # Errors
    ///
    /// Fails when the contract is not `Active` or no position is open.
    pub fn cancel_stake(
        &mut self,
        host: &impl HostLedger,
        staker: Address,
    ) -> Result<Vec<Event>> {
        self.require_active()?;
        let Some((staked_amount, _)) = self.get_stake_details(&staker) else {
            return Err(CustodexError::NoStake(staker));
        };

        let bucket = self.current_bucket(host);
        let total = self.get_total_staked(bucket);
        self.kv.delete(&keys::staked_amount_key(&staker));
        self.kv.delete(&keys::staked_bucket_key(&staker));
        self.kv
            .put_amount(keys::staked_total_key(bucket), total.saturating_sub(staked_amount));

        let native = self.config.native_asset.clone();
        ledger::credit(&mut self.kv, &staker, &native, staked_amount);

        tracing::debug!(%staker, staked_amount, %bucket, "stake cancelled");
        Ok(vec![Event::Transferred {
            principal: staker,
            asset: native,
            amount: staked_amount,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custodex_types::constants::BUCKET_DURATION_SECS;
    use custodex_types::{EngineConfig, MockHost};

    fn owner() -> Address {
        Address([0xEE; 20])
    }

    fn native() -> AssetId {
        AssetId::from_bytes(vec![0xAA; 32])
    }

    fn token(byte: u8) -> AssetId {
        AssetId::from_bytes(vec![byte; 20])
    }

    fn staker_a() -> Address {
        Address([1u8; 20])
    }

    fn staker_b() -> Address {
        Address([2u8; 20])
    }

    fn setup() -> (Broker, MockHost) {
        let mut broker = Broker::new(EngineConfig::new(owner(), native()));
        let mut host = MockHost::new();
        host.authorize(owner());
        broker
            .initialize(&host, 2_000, 1_000, Address([0xFE; 20]))
            .unwrap();
        host.deauthorize_all();
        for staker in [staker_a(), staker_b()] {
            broker.deposit(&host, staker, native(), 10_000).unwrap();
        }
        (broker, host)
    }

    fn stake(broker: &mut Broker, host: &mut MockHost, staker: Address, amount: Amount) {
        host.authorize(staker);
        broker.stake_tokens(host, staker, amount).unwrap();
        host.deauthorize_all();
    }

    /// Accrue fees directly into a bucket's pool.
    fn fund_pool(broker: &mut Broker, bucket: Bucket, asset: &AssetId, amount: Amount) {
        let pool = keys::fee_address_for(bucket);
        ledger::credit(&mut broker.kv, &pool, asset, amount);
    }

    #[test]
    fn stake_debits_and_records() {
        let (mut broker, mut host) = setup();
        stake(&mut broker, &mut host, staker_a(), 1_000);

        assert_eq!(broker.get_balance(&staker_a(), &native()), 9_000);
        assert_eq!(broker.get_stake_details(&staker_a()), Some((1_000, Bucket(0))));
        assert_eq!(broker.get_total_staked(Bucket(0)), 1_000);
    }

    #[test]
    fn restaking_is_rejected() {
        let (mut broker, mut host) = setup();
        stake(&mut broker, &mut host, staker_a(), 1_000);

        host.authorize(staker_a());
        assert!(matches!(
            broker.stake_tokens(&host, staker_a(), 500),
            Err(CustodexError::StakeExists(_))
        ));
    }

    #[test]
    fn totals_inherit_and_materialize() {
        let (mut broker, mut host) = setup();
        stake(&mut broker, &mut host, staker_a(), 1_000);

        // Buckets 1..=4 were never written; they inherit bucket 0.
        assert_eq!(broker.get_total_staked(Bucket(4)), 1_000);
        for b in 1..=4 {
            assert!(broker.store().contains(&keys::staked_total_key(Bucket(b))));
        }

        // A later stake keys off the materialized value.
        host.advance(4 * BUCKET_DURATION_SECS);
        stake(&mut broker, &mut host, staker_b(), 3_000);
        assert_eq!(broker.get_total_staked(Bucket(4)), 4_000);
        assert_eq!(broker.get_total_staked(Bucket(3)), 1_000);
    }

    #[test]
    fn pro_rata_claim() {
        let (mut broker, mut host) = setup();
        // Scenario D: A stakes 100, B stakes 300 in the same bucket;
        // the pool accrues 40 of asset X.
        stake(&mut broker, &mut host, staker_a(), 100);
        stake(&mut broker, &mut host, staker_b(), 300);
        fund_pool(&mut broker, Bucket(0), &token(9), 40);

        host.advance(BUCKET_DURATION_SECS);
        let events = broker
            .claim_fees(&host, staker_a(), &[token(9)], Bucket(0))
            .unwrap();

        // floor(40 * 100 / 400) = 10
        assert_eq!(
            events,
            vec![Event::Transferred {
                principal: staker_a(),
                asset: token(9),
                amount: 10,
            }]
        );
        assert_eq!(broker.get_balance(&staker_a(), &token(9)), 10);
        assert_eq!(broker.get_fee_balance(&token(9), Bucket(0)), 30);
    }

    #[test]
    fn claiming_the_same_bucket_twice_fails() {
        let (mut broker, mut host) = setup();
        stake(&mut broker, &mut host, staker_a(), 100);
        fund_pool(&mut broker, Bucket(0), &token(9), 40);

        host.advance(BUCKET_DURATION_SECS);
        broker
            .claim_fees(&host, staker_a(), &[token(9)], Bucket(0))
            .unwrap();
        let err = broker
            .claim_fees(&host, staker_a(), &[token(9)], Bucket(0))
            .unwrap_err();
        assert!(matches!(err, CustodexError::BucketNotClaimable { .. }));
        assert_eq!(broker.get_balance(&staker_a(), &token(9)), 40);
    }

    #[test]
    fn current_bucket_is_not_claimable() {
        let (mut broker, mut host) = setup();
        stake(&mut broker, &mut host, staker_a(), 100);
        assert!(matches!(
            broker.claim_fees(&host, staker_a(), &[token(9)], Bucket(0)),
            Err(CustodexError::BucketNotClaimable { .. })
        ));
    }

    #[test]
    fn buckets_before_the_stake_are_not_claimable() {
        let (mut broker, mut host) = setup();
        host.advance(2 * BUCKET_DURATION_SECS);
        stake(&mut broker, &mut host, staker_a(), 100);

        host.advance(BUCKET_DURATION_SECS);
        assert!(matches!(
            broker.claim_fees(&host, staker_a(), &[token(9)], Bucket(1)),
            Err(CustodexError::BucketNotClaimable { .. })
        ));
        // The stake's own bucket is fine once it has elapsed.
        broker
            .claim_fees(&host, staker_a(), &[token(9)], Bucket(2))
            .unwrap();
    }

    #[test]
    fn claim_without_stake_fails() {
        let (mut broker, host) = setup();
        assert!(matches!(
            broker.claim_fees(&host, staker_a(), &[token(9)], Bucket(0)),
            Err(CustodexError::NoStake(_))
        ));
    }

    #[test]
    fn cancel_returns_principal_and_reduces_total() {
        let (mut broker, mut host) = setup();
        stake(&mut broker, &mut host, staker_a(), 1_000);
        stake(&mut broker, &mut host, staker_b(), 3_000);

        host.advance(2 * BUCKET_DURATION_SECS);
        let events = broker.cancel_stake(&host, staker_a()).unwrap();

        assert_eq!(
            events,
            vec![Event::Transferred {
                principal: staker_a(),
                asset: native(),
                amount: 1_000,
            }]
        );
        assert_eq!(broker.get_balance(&staker_a(), &native()), 10_000);
        assert_eq!(broker.get_stake_details(&staker_a()), None);
        // The current bucket drops the cancelled stake; earlier buckets
        // keep it.
        assert_eq!(broker.get_total_staked(Bucket(2)), 3_000);
        assert_eq!(broker.get_total_staked(Bucket(1)), 4_000);
    }

    #[test]
    fn cancel_without_stake_fails() {
        let (mut broker, host) = setup();
        assert!(matches!(
            broker.cancel_stake(&host, staker_a()),
            Err(CustodexError::NoStake(_))
        ));
    }
}
