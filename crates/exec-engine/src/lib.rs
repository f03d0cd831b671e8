//! Threshold-driven order execution state machines.
//!
//! This crate drives a single trade to completion by progressively
//! placing, monitoring, cancelling and replacing concrete child orders
//! on an exchange, degrading execution aggressiveness (passive ->
//! aggressive pricing) when fills stall or the market moves past a
//! configured threshold.
//!
//! ## Architecture
//!
//! The engine is synchronous and tick-driven: it performs no I/O and
//! advances exactly one step per [`TickDriven::tick`] invocation,
//! returning a [`Command`] for the external scheduler to act on. All
//! exchange interaction (placing/cancelling orders, fetching tickers)
//! and all scheduling live outside this crate; ticks for one order
//! instance must be serialized, while independent instances may be
//! driven concurrently.
//!
//! ## Modules
//!
//! - `command`: the closed tick-output variant the scheduler consumes
//! - `child`: the child order model and inbound exchange updates
//! - `ledger`: accumulate-and-retire fill bookkeeping, written once
//! - `maker_taker`: maker -> taker stop-loss order
//! - `recovery`: best-price -> market-price recovery order
//! - `order`: the shared tick-interface trait and reporting snapshot

pub mod child;
pub mod command;
pub mod ledger;
pub mod maker_taker;
pub mod order;
pub mod recovery;

pub use child::{ChildOrder, ChildStatus, ExchangeUpdate, ExecStyle};
pub use command::Command;
pub use ledger::FillLedger;
pub use maker_taker::{MakerTakerConfig, MakerTakerOrder, MakerTakerPhase};
pub use order::{EngineError, OrderSnapshot, OrderStatus, TickDriven, COMPLETION_FACTOR};
pub use recovery::{RecoveryConfig, RecoveryPhase, ThresholdRecoveryOrder};
