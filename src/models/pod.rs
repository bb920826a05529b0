//! Storage pod model.
//!
//! A pod is a movable shelf holding several item types. Units are
//! *contained* until a decision earmarks them for a specific order, at
//! which point they become *reserved*; only unreserved units are available
//! to further decisions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ItemId, PodId, RobotId, WaypointId};

/// A movable storage pod.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pod {
    /// Unique pod identifier.
    pub id: PodId,
    /// Storage waypoint while the pod is on the floor. `None` while a robot
    /// carries it.
    pub waypoint: Option<WaypointId>,
    /// Robot currently carrying this pod, if any.
    pub carried_by: Option<RobotId>,
    /// Physically stored units per item.
    contained: BTreeMap<ItemId, u32>,
    /// Units already earmarked for specific orders.
    reserved: BTreeMap<ItemId, u32>,
}

impl Pod {
    /// Creates an empty pod at a waypoint.
    pub fn new(id: PodId, waypoint: WaypointId) -> Self {
        Self {
            id,
            waypoint: Some(waypoint),
            carried_by: None,
            contained: BTreeMap::new(),
            reserved: BTreeMap::new(),
        }
    }

    /// Adds initial stock of an item.
    pub fn with_stock(mut self, item: ItemId, quantity: u32) -> Self {
        self.store(item, quantity);
        self
    }

    /// Stores an inventory bundle on the pod.
    pub fn store(&mut self, item: ItemId, quantity: u32) {
        *self.contained.entry(item).or_insert(0) += quantity;
    }

    /// Physically stored units of an item.
    pub fn count_contained(&self, item: ItemId) -> u32 {
        self.contained.get(&item).copied().unwrap_or(0)
    }

    /// Units of an item not yet earmarked for an order.
    pub fn count_available(&self, item: ItemId) -> u32 {
        self.count_contained(item) - self.reserved.get(&item).copied().unwrap_or(0)
    }

    /// Whether at least one unit of the item is available.
    pub fn is_available(&self, item: ItemId) -> bool {
        self.count_available(item) > 0
    }

    /// Items with at least one available unit.
    pub fn available_items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.contained
            .keys()
            .copied()
            .filter(|&item| self.is_available(item))
    }

    /// Earmarks `quantity` units of an item for an order.
    ///
    /// Returns `false` and leaves the pod untouched when fewer units are
    /// available.
    #[must_use]
    pub fn reserve(&mut self, item: ItemId, quantity: u32) -> bool {
        if self.count_available(item) < quantity {
            return false;
        }
        *self.reserved.entry(item).or_insert(0) += quantity;
        true
    }

    /// Removes `quantity` reserved units, e.g. after a pick completed.
    #[must_use]
    pub fn consume(&mut self, item: ItemId, quantity: u32) -> bool {
        match (self.reserved.get_mut(&item), self.contained.get_mut(&item)) {
            (Some(reserved), Some(contained))
                if *reserved >= quantity && *contained >= quantity =>
            {
                *reserved -= quantity;
                *contained -= quantity;
                true
            }
            _ => false,
        }
    }
}
