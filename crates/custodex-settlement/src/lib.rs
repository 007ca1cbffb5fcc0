//! # custodex-settlement
//!
//! Asset movement across the custody boundary: the single-phase token
//! withdrawal path, the two-phase prepare/verify/complete protocol for
//! coin-like assets with its double-withdrawal guard, and the
//! supply-conservation audit used to prove that no value is minted
//! inside the ledger.
//!
//! The functions here operate directly on the shared key-value space;
//! the `Broker` in `custodex-engine` dispatches its withdrawal surface
//! into this crate after its own state gating.

pub mod conservation;
pub mod withdraw;

pub use conservation::SupplyAudit;
