//! Decision core for robotic mobile-fulfillment warehouses.
//!
//! Given a backlog of customer orders, a fleet of robots, movable storage
//! pods and pick/pack stations with finite capacity, this crate decides at
//! each decision point which orders to commit to which stations and which
//! pods — carried by which robots — to route there.
//!
//! # Modules
//!
//! - **`models`**: Domain types — `Order`, `Pod`, `Robot`, `OutputStation`,
//!   `Warehouse`
//! - **`ledger`**: Exclusive pod↔robot claims, extract requests, servings
//! - **`distance`**: Precomputed station-distance oracle with Manhattan
//!   fallback
//! - **`selector`**: Lexicographic best-candidate scoring
//! - **`podset`**: Minimal covering pod-set enumeration
//! - **`scheduler`**: Backlog management, decision throttling, the
//!   allocation commit point
//! - **`strategy`**: The greedy two-phase heuristic and the MILP strategy
//! - **`solver`**: Name-based model building over the MILP backend
//!
//! # Architecture
//!
//! The scheduler skeleton owns the backlog and invokes exactly one
//! pluggable strategy per decision cycle; strategies mutate resource state
//! only through the ledger's claim/release operations and commit orders
//! only through [`scheduler::Cycle::allocate_order`]. Everything runs on a
//! single logical thread driven by the simulation clock.

pub mod config;
pub mod distance;
pub mod ledger;
pub mod models;
pub mod podset;
pub mod scheduler;
pub mod selector;
pub mod solver;
pub mod strategy;

pub use config::ConfigError;
pub use ledger::LedgerError;

use models::{ItemId, OrderId, StationId};
use thiserror::Error;

/// Failure of a decision cycle. Any of these indicates a broken invariant
/// or invalid setup, not an expected search outcome.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// Invalid configuration detected at construction.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A claim or release violated the exclusive-claim contract.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// An allocation targeted a station the warehouse does not know.
    #[error("unknown station {0}")]
    UnknownStation(StationId),
    /// An allocation targeted an order that is not in the backlog.
    #[error("unknown order {0}")]
    UnknownOrder(OrderId),
    /// An allocation would overfill the station.
    #[error("station {0} has no free slot")]
    CapacityExceeded(StationId),
    /// A committed order could not be fully served from the pods chosen
    /// for it.
    #[error("order {order} item {item} cannot be covered by the selected pods")]
    CoverageShortfall { order: OrderId, item: ItemId },
}
