//! Engine configuration and contract lifecycle state.
//!
//! The reference deployment baked the owner and native-asset identifiers
//! in as compile-time constants; here they are an explicit configuration
//! object held by the engine at construction. Fee rates, the fee address
//! and the lifecycle state are *storage* values mutated by administration
//! operations, not part of this struct.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{BUCKET_DURATION_SECS, FEE_SCALE, MAX_FEE, NATIVE_FEE_DISCOUNT};
use crate::ids::{Address, AssetId};

/// Construction-time configuration for a [`Broker`] engine instance.
///
/// [`Broker`]: https://docs.rs/custodex-engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// The only principal allowed to run administration operations.
    pub owner: Address,
    /// The native asset staked for fee rebates and used for discounts.
    pub native_asset: AssetId,
    /// Duration of one staking/fee bucket, in seconds.
    pub bucket_duration_secs: u64,
    /// Denominator of fee rates.
    pub fee_scale: u64,
    /// Upper bound for maker/taker fee rates.
    pub max_fee: u64,
    /// Divisor applied to the in-kind taker fee on the native-fee path.
    pub native_fee_discount: u64,
}

impl EngineConfig {
    /// Config with the reference fee/bucket parameters.
    #[must_use]
    pub fn new(owner: Address, native_asset: AssetId) -> Self {
        Self {
            owner,
            native_asset,
            bucket_duration_secs: BUCKET_DURATION_SECS,
            fee_scale: FEE_SCALE,
            max_fee: MAX_FEE,
            native_fee_discount: NATIVE_FEE_DISCOUNT,
        }
    }
}

/// Contract lifecycle state, stored in the key-value space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractState {
    /// Deployed but not initialized — only `initialize` is accepted.
    Pending,
    /// All operations active.
    Active,
    /// Trading halted — only cancels, withdrawals and owner actions run.
    Frozen,
}

impl ContractState {
    /// Storage encoding. `Pending` is the empty value so an untouched
    /// store reads as pending.
    #[must_use]
    pub fn encode(self) -> Vec<u8> {
        match self {
            Self::Pending => Vec::new(),
            Self::Active => vec![0x01],
            Self::Frozen => vec![0x02],
        }
    }

    /// Decode the storage value; anything unrecognized reads as pending.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Self {
        match bytes {
            [0x01] => Self::Active,
            [0x02] => Self::Frozen,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for ContractState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
            Self::Frozen => "FROZEN",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parameters_match_reference() {
        let cfg = EngineConfig::new(Address([1u8; 20]), AssetId::from_bytes(vec![2u8; 20]));
        assert_eq!(cfg.fee_scale, 1_000_000);
        assert_eq!(cfg.max_fee, 5_000);
        assert_eq!(cfg.bucket_duration_secs, 82_800);
        assert_eq!(cfg.native_fee_discount, 2);
    }

    #[test]
    fn state_codec_roundtrip() {
        for state in [
            ContractState::Pending,
            ContractState::Active,
            ContractState::Frozen,
        ] {
            assert_eq!(ContractState::decode(&state.encode()), state);
        }
    }

    #[test]
    fn unknown_state_reads_pending() {
        assert_eq!(ContractState::decode(&[0x7F]), ContractState::Pending);
        assert_eq!(ContractState::decode(&[]), ContractState::Pending);
    }
}
