//! Warehouse state container.
//!
//! Owns all pods, robots and stations. Claims and other relations reference
//! entities by id; nothing outside this container owns an entity.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{OutputStation, Pod, PodId, Robot, RobotId, StationId, WaypointId};

/// Id-indexed ownership of the physical warehouse entities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Warehouse {
    pods: BTreeMap<PodId, Pod>,
    robots: BTreeMap<RobotId, Robot>,
    stations: BTreeMap<StationId, OutputStation>,
}

impl Warehouse {
    /// Creates an empty warehouse.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pod (builder form for tests and setup code).
    pub fn with_pod(mut self, pod: Pod) -> Self {
        self.add_pod(pod);
        self
    }

    /// Adds a robot.
    pub fn with_robot(mut self, robot: Robot) -> Self {
        self.add_robot(robot);
        self
    }

    /// Adds a station.
    pub fn with_station(mut self, station: OutputStation) -> Self {
        self.add_station(station);
        self
    }

    /// Inserts a pod, replacing any pod with the same id.
    pub fn add_pod(&mut self, pod: Pod) {
        self.pods.insert(pod.id, pod);
    }

    /// Inserts a robot, replacing any robot with the same id.
    pub fn add_robot(&mut self, robot: Robot) {
        self.robots.insert(robot.id, robot);
    }

    /// Inserts a station, replacing any station with the same id.
    pub fn add_station(&mut self, station: OutputStation) {
        self.stations.insert(station.id, station);
    }

    /// Looks up a pod.
    pub fn pod(&self, id: PodId) -> Option<&Pod> {
        self.pods.get(&id)
    }

    /// Looks up a pod mutably.
    pub fn pod_mut(&mut self, id: PodId) -> Option<&mut Pod> {
        self.pods.get_mut(&id)
    }

    /// Looks up a robot.
    pub fn robot(&self, id: RobotId) -> Option<&Robot> {
        self.robots.get(&id)
    }

    /// Looks up a robot mutably.
    pub fn robot_mut(&mut self, id: RobotId) -> Option<&mut Robot> {
        self.robots.get_mut(&id)
    }

    /// Looks up a station.
    pub fn station(&self, id: StationId) -> Option<&OutputStation> {
        self.stations.get(&id)
    }

    /// Looks up a station mutably.
    pub fn station_mut(&mut self, id: StationId) -> Option<&mut OutputStation> {
        self.stations.get_mut(&id)
    }

    /// All pods in id order.
    pub fn pods(&self) -> impl Iterator<Item = &Pod> {
        self.pods.values()
    }

    /// All robots in id order.
    pub fn robots(&self) -> impl Iterator<Item = &Robot> {
        self.robots.values()
    }

    /// All stations in id order.
    pub fn stations(&self) -> impl Iterator<Item = &OutputStation> {
        self.stations.values()
    }

    /// Current position of a pod: its storage waypoint, or the waypoint of
    /// the robot carrying it.
    pub fn pod_waypoint(&self, id: PodId) -> Option<WaypointId> {
        let pod = self.pod(id)?;
        match (pod.waypoint, pod.carried_by) {
            (Some(wp), _) => Some(wp),
            (None, Some(robot)) => self.robot(robot).map(|r| r.waypoint),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemId;

    #[test]
    fn test_lookup_and_iteration_order() {
        let world = Warehouse::new()
            .with_pod(Pod::new(PodId(3), WaypointId(1)))
            .with_pod(Pod::new(PodId(1), WaypointId(2)))
            .with_robot(Robot::new(RobotId(1), WaypointId(0)))
            .with_station(OutputStation::new(StationId(1), WaypointId(9), 2));

        let ids: Vec<_> = world.pods().map(|p| p.id).collect();
        assert_eq!(ids, vec![PodId(1), PodId(3)]);
        assert!(world.pod(PodId(3)).is_some());
        assert!(world.station(StationId(2)).is_none());
    }

    #[test]
    fn test_pod_waypoint_follows_carrier() {
        let mut world = Warehouse::new()
            .with_pod(Pod::new(PodId(1), WaypointId(4)).with_stock(ItemId(1), 1))
            .with_robot(Robot::new(RobotId(2), WaypointId(8)));

        assert_eq!(world.pod_waypoint(PodId(1)), Some(WaypointId(4)));

        let pod = world.pod_mut(PodId(1)).unwrap();
        pod.waypoint = None;
        pod.carried_by = Some(RobotId(2));
        world.robot_mut(RobotId(2)).unwrap().pod = Some(PodId(1));

        assert_eq!(world.pod_waypoint(PodId(1)), Some(WaypointId(8)));
    }
}
