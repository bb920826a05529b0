//! Warehouse domain models.
//!
//! Core data types of the assignment engine: orders, pods, robots, output
//! stations and the warehouse container that owns them. Decision state
//! (claims, extract requests, servings) lives in [`crate::ledger`].

mod ids;
mod order;
mod pod;
mod robot;
mod station;
mod warehouse;

pub use ids::{ItemId, OrderId, PodId, RobotId, StationId, WaypointId};
pub use order::Order;
pub use pod::Pod;
pub use robot::{Robot, RobotTask};
pub use station::OutputStation;
pub use warehouse::Warehouse;
