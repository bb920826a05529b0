//! Customer order model.
//!
//! An order is a multiset of item demands ("positions") with a placement
//! time and a due time. Orders live in the scheduler backlog until they are
//! allocated to an output station in one piece; partial allocation does not
//! exist in this system.
//!
//! # Time Representation
//! All times are in milliseconds relative to the simulation epoch (t=0).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ItemId;
use super::OrderId;

/// A customer order awaiting assignment to an output station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier, assigned on arrival in backlog order.
    pub id: OrderId,
    /// Item demand: item → required quantity. Never empty for a valid order.
    pub positions: BTreeMap<ItemId, u32>,
    /// Time the order entered the backlog (ms).
    pub time_placed_ms: i64,
    /// Latest completion time (ms).
    pub due_time_ms: i64,
    /// Remaining leeway, `due_time - (now - time_placed)`. Refreshed at the
    /// start of every decision cycle.
    pub slack_ms: i64,
    /// Priority rank for this cycle: 0 = most urgent. Refreshed together
    /// with `slack_ms` by sorting ascending slack, then due time.
    pub sequence: usize,
}

impl Order {
    /// Creates an order with the given id, demand and timing.
    pub fn new(
        id: OrderId,
        positions: BTreeMap<ItemId, u32>,
        time_placed_ms: i64,
        due_time_ms: i64,
    ) -> Self {
        Self {
            id,
            positions,
            time_placed_ms,
            due_time_ms,
            slack_ms: due_time_ms,
            sequence: 0,
        }
    }

    /// Required quantity of one item (0 if the order does not contain it).
    pub fn quantity_of(&self, item: ItemId) -> u32 {
        self.positions.get(&item).copied().unwrap_or(0)
    }

    /// Total number of demanded units across all positions.
    pub fn total_units(&self) -> u32 {
        self.positions.values().sum()
    }

    /// Recomputes `slack_ms` for the given clock.
    pub fn refresh_slack(&mut self, now_ms: i64) {
        self.slack_ms = self.due_time_ms - (now_ms - self.time_placed_ms);
    }

    /// Whether the order is past its due time.
    pub fn is_overdue(&self, now_ms: i64) -> bool {
        self.due_time_ms <= now_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(items: &[(u32, u32)]) -> BTreeMap<ItemId, u32> {
        items.iter().map(|&(i, q)| (ItemId(i), q)).collect()
    }

    #[test]
    fn test_quantities() {
        let order = Order::new(OrderId(1), positions(&[(1, 2), (2, 3)]), 0, 10_000);
        assert_eq!(order.quantity_of(ItemId(1)), 2);
        assert_eq!(order.quantity_of(ItemId(9)), 0);
        assert_eq!(order.total_units(), 5);
    }

    #[test]
    fn test_slack_refresh() {
        let mut order = Order::new(OrderId(1), positions(&[(1, 1)]), 5_000, 60_000);
        order.refresh_slack(20_000);
        // due 60_000 - (20_000 - 5_000) elapsed
        assert_eq!(order.slack_ms, 45_000);
    }

    #[test]
    fn test_overdue() {
        let order = Order::new(OrderId(1), positions(&[(1, 1)]), 0, 10_000);
        assert!(!order.is_overdue(9_999));
        assert!(order.is_overdue(10_000));
    }
}
