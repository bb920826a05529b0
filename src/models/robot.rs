//! Mobile robot model.

use serde::{Deserialize, Serialize};

use super::{PodId, RobotId, WaypointId};

/// Task a robot is currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RobotTask {
    /// No task assigned.
    #[default]
    Idle,
    /// Parked at a rest location.
    Rest,
    /// Delivering a pod to an output station for picking.
    Extract,
}

/// A mobile robot able to carry one pod at a time.
///
/// A robot is *free* for new work iff it carries no pod and holds no
/// pending pod claim; the claim half lives in the resource ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Robot {
    /// Unique robot identifier.
    pub id: RobotId,
    /// Current position on the warehouse grid.
    pub waypoint: WaypointId,
    /// Current task.
    pub task: RobotTask,
    /// Pod currently carried, if any.
    pub pod: Option<PodId>,
}

impl Robot {
    /// Creates an idle robot at a waypoint.
    pub fn new(id: RobotId, waypoint: WaypointId) -> Self {
        Self {
            id,
            waypoint,
            task: RobotTask::Idle,
            pod: None,
        }
    }

    /// Sets the current task.
    pub fn with_task(mut self, task: RobotTask) -> Self {
        self.task = task;
        self
    }

    /// Whether the robot carries a pod.
    pub fn is_carrying(&self) -> bool {
        self.pod.is_some()
    }
}
