//! System-wide constants for the Custodex ledger engine.

/// Fee rates are expressed against this scale: a rate of 1 is 0.0001%.
pub const FEE_SCALE: u64 = 1_000_000;

/// Upper bound on maker/taker fee rates: 5000 / 1_000_000 = 0.5%.
pub const MAX_FEE: u64 = 5_000;

/// Duration of one staking/fee bucket in seconds (23 hours).
pub const BUCKET_DURATION_SECS: u64 = 82_800;

/// Divisor applied to the in-kind taker fee when paying in the native
/// asset instead: 1/2 = 50% discount.
pub const NATIVE_FEE_DISCOUNT: u64 = 2;

/// Hard cap on entries returned by one order-book page walk.
pub const MAX_OFFERS_PER_PAGE: usize = 50;

/// Length in bytes of a principal address.
pub const ADDRESS_LEN: usize = 20;

/// Length in bytes of a token-like (external contract) asset id.
pub const TOKEN_ASSET_LEN: usize = 20;

/// Length in bytes of a coin-like (system) asset id.
pub const COIN_ASSET_LEN: usize = 32;

/// Length in bytes of a content-derived offer hash.
pub const OFFER_HASH_LEN: usize = 32;

/// Fixed width of an amount in the offer storage encoding.
pub const AMOUNT_ENC_LEN: usize = 8;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "Custodex";
