//! Output station model.
//!
//! A pick/pack station with a finite number of concurrent order slots.
//! An order occupies a slot from the moment it is allocated until it is
//! completed; the slot moves from *reserved* to *in use* when picking
//! starts. Invariant at all times:
//! `capacity_reserved + capacity_in_use <= capacity`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{PodId, StationId, WaypointId};

/// A pick/pack output station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputStation {
    /// Unique station identifier.
    pub id: StationId,
    /// Grid position of the station's hand-off point.
    pub waypoint: WaypointId,
    /// Maximum number of concurrently assigned orders.
    pub capacity: u32,
    /// Slots held by allocated orders not yet in picking.
    capacity_reserved: u32,
    /// Slots held by orders currently being picked.
    capacity_in_use: u32,
    /// Whether the station accepts new assignments.
    pub active: bool,
    /// Pods committed to arrive at this station.
    inbound_pods: BTreeSet<PodId>,
}

impl OutputStation {
    /// Creates an active station with the given capacity.
    pub fn new(id: StationId, waypoint: WaypointId, capacity: u32) -> Self {
        Self {
            id,
            waypoint,
            capacity,
            capacity_reserved: 0,
            capacity_in_use: 0,
            active: true,
            inbound_pods: BTreeSet::new(),
        }
    }

    /// Marks the station inactive.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Slots held by allocated orders not yet in picking.
    pub fn capacity_reserved(&self) -> u32 {
        self.capacity_reserved
    }

    /// Slots held by orders currently being picked.
    pub fn capacity_in_use(&self) -> u32 {
        self.capacity_in_use
    }

    /// Number of open slots.
    pub fn slots_free(&self) -> u32 {
        self.capacity - self.capacity_reserved - self.capacity_in_use
    }

    /// Whether another order can be assigned here.
    pub fn is_assignable(&self) -> bool {
        self.active && self.slots_free() > 0
    }

    /// Reserves a slot for a newly allocated order.
    ///
    /// Returns `false` without mutating when no slot is free.
    #[must_use]
    pub fn register_order(&mut self) -> bool {
        if self.slots_free() == 0 {
            return false;
        }
        self.capacity_reserved += 1;
        true
    }

    /// Moves one reserved slot into picking.
    #[must_use]
    pub fn begin_processing(&mut self) -> bool {
        if self.capacity_reserved == 0 {
            return false;
        }
        self.capacity_reserved -= 1;
        self.capacity_in_use += 1;
        true
    }

    /// Frees the slot of a completed order.
    ///
    /// Accepts completion from either lifecycle stage so callers that skip
    /// `begin_processing` stay balanced.
    #[must_use]
    pub fn complete_order(&mut self) -> bool {
        if self.capacity_in_use > 0 {
            self.capacity_in_use -= 1;
            true
        } else if self.capacity_reserved > 0 {
            self.capacity_reserved -= 1;
            true
        } else {
            false
        }
    }

    /// Registers a pod as inbound to this station.
    pub fn register_inbound_pod(&mut self, pod: PodId) {
        self.inbound_pods.insert(pod);
    }

    /// Removes a pod from the inbound set.
    pub fn unregister_inbound_pod(&mut self, pod: PodId) {
        self.inbound_pods.remove(&pod);
    }

    /// Pods committed to arrive at this station, in id order.
    pub fn inbound_pods(&self) -> &BTreeSet<PodId> {
        &self.inbound_pods
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_invariant_on_register() {
        let mut station = OutputStation::new(StationId(1), WaypointId(0), 2);
        assert!(station.register_order());
        assert!(station.register_order());
        assert!(!station.register_order());
        assert_eq!(station.slots_free(), 0);
        assert!(station.capacity_reserved() + station.capacity_in_use() <= station.capacity);
    }

    #[test]
    fn test_order_lifecycle_frees_slot() {
        let mut station = OutputStation::new(StationId(1), WaypointId(0), 1);
        assert!(station.register_order());
        assert!(station.begin_processing());
        assert_eq!(station.capacity_in_use(), 1);
        assert!(station.complete_order());
        assert_eq!(station.slots_free(), 1);
    }

    #[test]
    fn test_complete_from_reserved_stage() {
        let mut station = OutputStation::new(StationId(1), WaypointId(0), 1);
        assert!(station.register_order());
        assert!(station.complete_order());
        assert_eq!(station.slots_free(), 1);
        assert!(!station.complete_order());
    }

    #[test]
    fn test_inactive_station_not_assignable() {
        let station = OutputStation::new(StationId(1), WaypointId(0), 3).inactive();
        assert!(!station.is_assignable());
        assert_eq!(station.slots_free(), 3);
    }

    #[test]
    fn test_inbound_pod_set() {
        let mut station = OutputStation::new(StationId(1), WaypointId(0), 1);
        station.register_inbound_pod(PodId(5));
        station.register_inbound_pod(PodId(2));
        let pods: Vec<_> = station.inbound_pods().iter().copied().collect();
        assert_eq!(pods, vec![PodId(2), PodId(5)]);
        station.unregister_inbound_pod(PodId(5));
        assert_eq!(station.inbound_pods().len(), 1);
    }
}
