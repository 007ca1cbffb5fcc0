//! # custodex-types
//!
//! Shared types, errors, and configuration for the **Custodex**
//! exchange/escrow ledger engine.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`Address`], [`AssetId`], [`OfferHash`], [`Bucket`], [`TradingPair`]
//! - **Offer model**: [`Offer`] and its fixed-layout storage codec
//! - **Events**: [`Event`], returned from operations as the secondary channel
//! - **Host boundary**: [`HostLedger`], [`ExternalTransfer`]
//! - **Configuration**: [`EngineConfig`], [`ContractState`]
//! - **Errors**: [`CustodexError`] with `CX_ERR_` prefix codes
//! - **Constants**: fee scale, bucket duration, page caps

pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod host;
pub mod ids;
pub mod offer;

// Re-export all primary types at crate root for ergonomic imports:
//   use custodex_types::{Address, Offer, Event, ...};

pub use config::*;
pub use error::*;
pub use event::*;
pub use host::*;
pub use ids::*;
pub use offer::*;

// Constants are accessed via `custodex_types::constants::FOO`
// (not re-exported to avoid name collisions).
