//! # custodex-engine
//!
//! The operation surface of the Custodex exchange/escrow ledger: the
//! [`Broker`] type, which owns the key-value space and exposes every
//! external operation. Matching, staking/fee distribution and
//! administration live here; the two-phase withdrawal protocol is
//! implemented in `custodex-settlement` and dispatched through the same
//! surface.
//!
//! The engine is a deterministic state machine. Each operation takes the
//! host ledger as an explicit argument, validates every precondition
//! before its first mutation, and reports domain events as return
//! values.

mod admin;
mod engine;
mod matching;
mod staking;

pub use engine::Broker;
