//! Pluggable assignment strategies.
//!
//! A strategy is selected once from the tagged [`StrategyConfig`] variant
//! and invoked by the scheduler skeleton on every eligible decision cycle.
//! Shared between the strategies: per-cycle order prioritization and the
//! urgent-order (fast lane) subset.

pub mod heuristic;
pub mod milp;

pub use heuristic::HeuristicStrategy;
pub use milp::MilpStrategy;

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{ConfigError, StrategyConfig};
use crate::ledger::ResourceLedger;
use crate::models::{ItemId, Order, OrderId, Pod, Warehouse};
use crate::scheduler::Cycle;
use crate::EngineError;

/// A decision routine deciding about pending orders.
pub trait AssignmentStrategy {
    /// Decides about the cycle's pending orders, committing claims and
    /// allocations through the cycle's ledger and commit point.
    fn decide(&mut self, cycle: &mut Cycle<'_>) -> Result<(), EngineError>;

    /// Whether the scheduler should re-invoke this strategy whenever spare
    /// capacity exists, even if the situation was already investigated.
    fn eager(&self) -> bool {
        false
    }
}

/// Builds the concrete strategy for a validated configuration.
pub fn build_strategy(
    config: &StrategyConfig,
) -> Result<Box<dyn AssignmentStrategy>, ConfigError> {
    config.validate()?;
    Ok(match config {
        StrategyConfig::Heuristic(c) => Box::new(HeuristicStrategy::new(c.clone())),
        StrategyConfig::Milp(c) => Box::new(MilpStrategy::new(c.clone())),
    })
}

/// Refreshes slack and assigns the per-cycle priority sequence: rank 0 goes
/// to the smallest slack, ties broken by due time, then id.
pub(crate) fn refresh_priorities(backlog: &mut BTreeMap<OrderId, Order>, now_ms: i64) {
    for order in backlog.values_mut() {
        order.refresh_slack(now_ms);
    }
    let mut ranked: Vec<(i64, i64, OrderId)> = backlog
        .values()
        .map(|o| (o.slack_ms, o.due_time_ms, o.id))
        .collect();
    ranked.sort();
    for (rank, (_, _, id)) in ranked.into_iter().enumerate() {
        if let Some(order) = backlog.get_mut(&id) {
            order.sequence = rank;
        }
    }
}

/// Summed available units per item over a set of pods.
pub(crate) fn availability<'a>(pods: impl Iterator<Item = &'a Pod>) -> BTreeMap<ItemId, u32> {
    let mut supply: BTreeMap<ItemId, u32> = BTreeMap::new();
    for pod in pods {
        for item in pod.available_items() {
            *supply.entry(item).or_insert(0) += pod.count_available(item);
        }
    }
    supply
}

/// Whether every position of the order is covered by the supply map.
pub(crate) fn demand_covered(order: &Order, supply: &BTreeMap<ItemId, u32>) -> bool {
    order
        .positions
        .iter()
        .all(|(item, &quantity)| supply.get(item).copied().unwrap_or(0) >= quantity)
}

/// Urgent orders: slack below the threshold and full demand coverable by
/// currently unused pods.
pub(crate) fn urgent_orders(
    backlog: &BTreeMap<OrderId, Order>,
    ledger: &ResourceLedger,
    world: &Warehouse,
    threshold_ms: i64,
) -> BTreeSet<OrderId> {
    let supply = availability(
        ledger
            .unused_pods(world)
            .into_iter()
            .filter_map(|p| world.pod(p)),
    );
    backlog
        .values()
        .filter(|o| o.slack_ms < threshold_ms && demand_covered(o, &supply))
        .map(|o| o.id)
        .collect()
}
