//! Resource ledger: claims, extract requests and servings.
//!
//! Tracks the exclusive pod↔robot claim relation, the per-order unit
//! demand (extract requests) and the concrete servings both strategies
//! record when they earmark pod stock for an order.
//!
//! Claim conflicts are rejected, never overwritten: claiming an already
//! claimed pod or robot returns an error and leaves the ledger untouched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::models::{ItemId, Order, OrderId, PodId, RobotId, RobotTask, StationId, Warehouse};

/// One unit of order-item demand to be fulfilled from a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractRequest {
    /// Order the unit belongs to.
    pub order: OrderId,
    /// Demanded item.
    pub item: ItemId,
}

/// A recorded decision that `quantity` units of `item` for `order` will be
/// picked from `pod` at `station`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Serving {
    pub station: StationId,
    pub order: OrderId,
    pub pod: PodId,
    pub item: ItemId,
    pub quantity: u32,
}

/// An exclusive pod claim held by a robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Claim {
    robot: RobotId,
    purpose: RobotTask,
}

/// Violations of the exclusive-claim contract.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// The pod is already claimed by a robot.
    #[error("pod {pod} is already claimed by robot {holder}")]
    PodAlreadyClaimed { pod: PodId, holder: RobotId },
    /// The robot already holds a claim on a pod.
    #[error("robot {robot} already claims pod {held}")]
    RobotAlreadyClaiming { robot: RobotId, held: PodId },
    /// Release was requested for a pod that is not claimed.
    #[error("pod {pod} is not claimed")]
    PodNotClaimed { pod: PodId },
}

/// Single-threaded ledger of claims, demand and servings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceLedger {
    pod_claims: BTreeMap<PodId, Claim>,
    robot_claims: BTreeMap<RobotId, PodId>,
    extract_requests: BTreeMap<OrderId, Vec<ExtractRequest>>,
    servings: BTreeMap<StationId, Vec<Serving>>,
}

impl ResourceLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims a pod for a robot.
    ///
    /// Fails without mutating when either side already holds a claim.
    pub fn claim_pod(
        &mut self,
        pod: PodId,
        robot: RobotId,
        purpose: RobotTask,
    ) -> Result<(), LedgerError> {
        if let Some(existing) = self.pod_claims.get(&pod) {
            return Err(LedgerError::PodAlreadyClaimed {
                pod,
                holder: existing.robot,
            });
        }
        if let Some(&held) = self.robot_claims.get(&robot) {
            return Err(LedgerError::RobotAlreadyClaiming { robot, held });
        }
        self.pod_claims.insert(pod, Claim { robot, purpose });
        self.robot_claims.insert(robot, pod);
        Ok(())
    }

    /// Releases a pod claim, returning the robot that held it.
    pub fn release_pod(&mut self, pod: PodId) -> Result<RobotId, LedgerError> {
        match self.pod_claims.remove(&pod) {
            Some(claim) => {
                self.robot_claims.remove(&claim.robot);
                Ok(claim.robot)
            }
            None => Err(LedgerError::PodNotClaimed { pod }),
        }
    }

    /// Robot holding a claim on the pod, if any.
    pub fn robot_of(&self, pod: PodId) -> Option<RobotId> {
        self.pod_claims.get(&pod).map(|c| c.robot)
    }

    /// Task the pod was claimed for, if it is claimed.
    pub fn claim_purpose(&self, pod: PodId) -> Option<RobotTask> {
        self.pod_claims.get(&pod).map(|c| c.purpose)
    }

    /// Pod claimed by the robot, if any.
    pub fn pod_of(&self, robot: RobotId) -> Option<PodId> {
        self.robot_claims.get(&robot).copied()
    }

    /// Robot responsible for moving a pod: its carrier, else its claimant.
    pub fn transporter_of(&self, pod: PodId, world: &Warehouse) -> Option<RobotId> {
        world
            .pod(pod)
            .and_then(|p| p.carried_by)
            .or_else(|| self.robot_of(pod))
    }

    /// Whether the robot is free for new work: carries nothing and holds no
    /// pending claim.
    pub fn is_robot_free(&self, robot: RobotId, world: &Warehouse) -> bool {
        self.pod_of(robot).is_none()
            && world.robot(robot).is_some_and(|r| !r.is_carrying())
    }

    /// Free robots in id order.
    pub fn free_robots(&self, world: &Warehouse) -> Vec<RobotId> {
        world
            .robots()
            .filter(|r| r.pod.is_none() && self.pod_of(r.id).is_none())
            .map(|r| r.id)
            .collect()
    }

    /// Pods that are neither claimed, carried, nor inbound to any station,
    /// in id order.
    pub fn unused_pods(&self, world: &Warehouse) -> Vec<PodId> {
        let inbound: BTreeSet<PodId> = world
            .stations()
            .flat_map(|s| s.inbound_pods().iter().copied())
            .collect();
        world
            .pods()
            .filter(|p| {
                p.carried_by.is_none()
                    && !self.pod_claims.contains_key(&p.id)
                    && !inbound.contains(&p.id)
            })
            .map(|p| p.id)
            .collect()
    }

    /// Generates one extract request per demanded unit of the order.
    pub fn admit_order(&mut self, order: &Order) {
        let requests = self.extract_requests.entry(order.id).or_default();
        requests.clear();
        for (&item, &quantity) in &order.positions {
            for _ in 0..quantity {
                requests.push(ExtractRequest {
                    order: order.id,
                    item,
                });
            }
        }
    }

    /// Outstanding extract requests of an order.
    pub fn extract_requests_of_order(&self, order: OrderId) -> &[ExtractRequest] {
        self.extract_requests
            .get(&order)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Drops all demand bookkeeping of a completed order.
    pub fn complete_order(&mut self, order: OrderId) {
        self.extract_requests.remove(&order);
    }

    /// Records a concrete serving decision.
    pub fn record_serving(&mut self, serving: Serving) {
        self.servings.entry(serving.station).or_default().push(serving);
    }

    /// Servings recorded for a station, in recording order.
    pub fn servings_of_station(&self, station: StationId) -> &[Serving] {
        self.servings
            .get(&station)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
