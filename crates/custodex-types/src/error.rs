//! Error types for the Custodex ledger engine.
//!
//! All errors use the `CX_ERR_` prefix convention for easy grepping in
//! logs. Error codes are grouped by subsystem:
//! - 1xx: Validation errors
//! - 2xx: Balance errors
//! - 3xx: Order book errors
//! - 4xx: Staking errors
//! - 5xx: Withdrawal errors
//! - 6xx: Admin / state errors
//! - 8xx: Security / protocol-safety errors
//! - 9xx: General / internal errors
//!
//! Per the engine's error taxonomy, everything here maps to a `false`
//! result at the boolean operation surface; 8xx protocol-safety errors
//! additionally require the host to invalidate the enclosing transaction.

use thiserror::Error;

use crate::ids::{Address, AssetId, OfferHash};
use crate::offer::Amount;

/// Central error enum for all Custodex operations.
#[derive(Debug, Error)]
pub enum CustodexError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// An amount was zero where at least 1 is required.
    #[error("CX_ERR_100: Invalid amount: {0}")]
    InvalidAmount(Amount),

    /// An offer with this content hash already exists (nonce reuse).
    #[error("CX_ERR_101: Offer already exists: {0}")]
    DuplicateOffer(OfferHash),

    /// The offered and wanted assets are the same.
    #[error("CX_ERR_102: Offer and want assets must differ")]
    SameAsset,

    /// The asset id length matches neither supported category.
    #[error("CX_ERR_103: Unsupported asset id length: {0} bytes")]
    UnsupportedAsset(usize),

    /// A fee rate exceeded the maximum or the fee address is malformed.
    #[error("CX_ERR_104: Invalid fee configuration: {reason}")]
    InvalidFeeConfig { reason: String },

    // =================================================================
    // Balance Errors (2xx)
    // =================================================================
    /// A debit would drive the balance negative.
    #[error("CX_ERR_200: Insufficient balance of {asset} for {principal}: need {needed}, have {available}")]
    InsufficientBalance {
        principal: Address,
        asset: AssetId,
        needed: Amount,
        available: Amount,
    },

    // =================================================================
    // Order Book Errors (3xx)
    // =================================================================
    /// The requested offer is not in storage.
    #[error("CX_ERR_300: Offer not found: {0}")]
    OfferNotFound(OfferHash),

    /// The caller is not the maker of the offer.
    #[error("CX_ERR_301: Caller is not the maker of {0}")]
    NotMaker(OfferHash),

    /// A maker attempted to fill their own offer.
    #[error("CX_ERR_302: Self-fill rejected: filler is the maker of {0}")]
    SelfFill(OfferHash),

    /// The linked list failed an integrity check.
    #[error("CX_ERR_303: Order book list corrupt: {0}")]
    ListCorrupt(String),

    // =================================================================
    // Staking Errors (4xx)
    // =================================================================
    /// The staker already holds an open position.
    #[error("CX_ERR_400: Stake already open for {0}")]
    StakeExists(Address),

    /// No open stake position for the principal.
    #[error("CX_ERR_401: No open stake for {0}")]
    NoStake(Address),

    /// The bucket is outside the claimable window.
    #[error("CX_ERR_402: Bucket {bucket} not claimable: claimed through {claimed_through}, current {current}")]
    BucketNotClaimable {
        bucket: u64,
        claimed_through: u64,
        current: u64,
    },

    // =================================================================
    // Withdrawal Errors (5xx)
    // =================================================================
    /// A withdrawal is already in flight for this principal.
    #[error("CX_ERR_500: Withdrawal already pending for {0}")]
    WithdrawalPending(Address),

    /// No withdrawal marker exists for this principal.
    #[error("CX_ERR_501: No withdrawal prepared for {0}")]
    NoWithdrawalPrepared(Address),

    /// The external transfer creates or destroys value.
    #[error("CX_ERR_502: Unbalanced external transfer: in {total_in}, out {total_out}")]
    UnbalancedTransfer { total_in: Amount, total_out: Amount },

    /// The host token-transfer primitive reported failure.
    #[error("CX_ERR_503: External token transfer failed for {0}")]
    TokenTransferFailed(AssetId),

    /// The current transaction carries no flagged withdrawal transfer.
    #[error("CX_ERR_504: Transaction is not flagged as an asset withdrawal")]
    NotAWithdrawal,

    /// Deposits are rejected inside a flagged withdrawal transaction.
    #[error("CX_ERR_505: Deposits are not accepted in a withdrawal transaction")]
    DepositDuringWithdrawal,

    /// Coin-like assets must go through prepare/complete, not the
    /// single-phase token path.
    #[error("CX_ERR_506: Asset {0} requires the two-phase withdrawal protocol")]
    RequiresTwoPhase(AssetId),

    // =================================================================
    // Admin / State Errors (6xx)
    // =================================================================
    /// The caller is not authorized as the given principal.
    #[error("CX_ERR_600: Not authorized as {0}")]
    NotAuthorized(Address),

    /// The caller is not the contract owner.
    #[error("CX_ERR_601: Owner authorization failed")]
    NotOwner,

    /// The operation is not valid in the current contract state.
    #[error("CX_ERR_602: Wrong contract state: {actual} (wanted {expected})")]
    WrongState { expected: String, actual: String },

    /// `initialize` was called on an already-initialized contract.
    #[error("CX_ERR_603: Contract already initialized")]
    AlreadyInitialized,

    // =================================================================
    // Security / Protocol-Safety Errors (8xx)
    // =================================================================
    /// A second flagged withdrawal was found after the recorded marker.
    /// The host must invalidate the enclosing transaction.
    #[error("CX_ERR_800: Double withdrawal detected for {principal} since sequence {since}")]
    DoubleWithdrawal { principal: Address, since: u64 },

    /// Supply conservation invariant violated — critical safety alert.
    #[error("CX_ERR_801: Conservation violation: {reason}")]
    ConservationViolation { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("CX_ERR_900: Internal error: {0}")]
    Internal(String),

    /// A storage record failed to decode.
    #[error("CX_ERR_901: Codec error: {0}")]
    Codec(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, CustodexError>;
