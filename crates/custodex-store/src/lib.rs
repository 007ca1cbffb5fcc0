//! # custodex-store
//!
//! The persistence layer of the Custodex engine: a single flat key-value
//! space ([`KvStore`]) shared by every component, the key-derivation
//! scheme that partitions it ([`keys`]), the escrow balance ledger
//! ([`ledger`]) and the per-trading-pair hash-linked order book
//! ([`book`]).
//!
//! Nothing in this crate checks authorization or contract state; callers
//! in `custodex-engine` validate first and mutate through these
//! primitives afterwards.

pub mod book;
pub mod keys;
pub mod kv;
pub mod ledger;

pub use kv::KvStore;
