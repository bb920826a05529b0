//! Global MILP assignment strategy.
//!
//! One mixed binary/integer program per decision cycle over all pending
//! orders, stations with spare capacity, eligible pods and robots:
//!
//! - `xps` — pod p assigned to station s
//! - `yos` / `yaos` — order o is a candidate / counts toward station s
//! - `yrp` — robot r transports pod p
//! - `us` — unused slots at station s (integer, penalized)
//! - `dops` — pod p serves order o at station s (newly moved pods only)
//!
//! The objective trades travel distance of newly moved pods against
//! throughput and a large penalty on idle capacity. Pods already inbound
//! and their transporters are pinned by equality, so prior commitments are
//! carried forward, never re-decided.
//!
//! The relaxed `dops` indicator only proves feasibility; a deterministic
//! greedy pass afterwards pins down which pod serves which unit. Newly
//! assigned pods that end up serving nothing are rolled back, keeping the
//! "a moved pod serves at least one unit" invariant exact.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use super::{availability, demand_covered, refresh_priorities, urgent_orders, AssignmentStrategy};
use crate::config::MilpConfig;
use crate::ledger::Serving;
use crate::models::{ItemId, Order, OrderId, PodId, RobotId, RobotTask, StationId};
use crate::scheduler::Cycle;
use crate::solver::{constraint, Expression, LinearModel, SolvedModel, Variable};
use crate::EngineError;

/// Global per-cycle MILP strategy.
pub struct MilpStrategy {
    config: MilpConfig,
}

/// Model-building context gathered from one cycle.
struct ProgramInputs {
    stations: Vec<StationId>,
    spare: BTreeMap<StationId, u32>,
    /// Pods already inbound, with their transporter, per station.
    inbound: BTreeMap<StationId, Vec<(PodId, RobotId)>>,
    /// Unused pods eligible for a move.
    new_pods: Vec<PodId>,
    /// Free robots able to take a new pod.
    free_robots: Vec<RobotId>,
    /// All robots in the program (transporters plus free).
    robots: Vec<RobotId>,
    /// All pods in the program (inbound plus new).
    pods: Vec<PodId>,
    /// Orders the program decides about.
    pending: Vec<OrderId>,
    /// item → pods with available stock.
    pods_by_item: BTreeMap<ItemId, Vec<PodId>>,
    /// item → pending orders demanding it.
    orders_by_item: BTreeMap<ItemId, Vec<OrderId>>,
    /// New pods holding at least one demanded item (dops candidates).
    serving_pods: BTreeSet<PodId>,
}

impl MilpStrategy {
    /// Creates the strategy for a validated configuration.
    pub fn new(config: MilpConfig) -> Self {
        Self { config }
    }

    fn gather(&self, cycle: &Cycle<'_>) -> Option<ProgramInputs> {
        let world = &*cycle.world;
        let stations: Vec<StationId> = world
            .stations()
            .filter(|s| s.is_assignable())
            .map(|s| s.id)
            .collect();
        if stations.is_empty() {
            return None;
        }
        let spare: BTreeMap<StationId, u32> = stations
            .iter()
            .map(|&s| (s, cycle.spare.get(&s).copied().unwrap_or(0)))
            .collect();

        let mut inbound: BTreeMap<StationId, Vec<(PodId, RobotId)>> = BTreeMap::new();
        let mut robots: BTreeSet<RobotId> = BTreeSet::new();
        for &station in &stations {
            let mut pods = Vec::new();
            for &pod in world.station(station)?.inbound_pods() {
                match cycle.ledger.transporter_of(pod, world) {
                    Some(robot) => {
                        robots.insert(robot);
                        pods.push((pod, robot));
                    }
                    None => {
                        warn!(%pod, %station, "inbound pod without transporter, left out of the program");
                    }
                }
            }
            inbound.insert(station, pods);
        }

        let free_robots = cycle.ledger.free_robots(world);
        robots.extend(free_robots.iter().copied());
        if robots.is_empty() {
            return None;
        }

        // Orders fulfillable from the pods the program may use.
        let inbound_pods: Vec<PodId> = inbound
            .values()
            .flat_map(|pods| pods.iter().map(|&(p, _)| p))
            .collect();
        let demanded: BTreeSet<ItemId> = cycle
            .backlog
            .values()
            .flat_map(|o| o.positions.keys().copied())
            .collect();
        let new_pods: Vec<PodId> = cycle
            .ledger
            .unused_pods(world)
            .into_iter()
            .filter(|&p| {
                world
                    .pod(p)
                    .is_some_and(|pod| demanded.iter().any(|&item| pod.is_available(item)))
            })
            .collect();
        let pods: Vec<PodId> = inbound_pods.iter().chain(&new_pods).copied().collect();

        let supply = availability(pods.iter().filter_map(|&p| world.pod(p)));
        let mut pending: Vec<OrderId> = cycle
            .backlog
            .values()
            .filter(|o| demand_covered(o, &supply))
            .map(|o| o.id)
            .collect();

        // When urgent orders outnumber the spare capacity, decide about the
        // urgent subset only.
        let urgent = urgent_orders(
            cycle.backlog,
            cycle.ledger,
            world,
            self.config.urgency_threshold_ms,
        );
        let total_spare: u32 = spare.values().sum();
        if !urgent.is_empty() && urgent.len() as u32 > total_spare {
            pending.retain(|id| urgent.contains(id));
        }
        if pending.is_empty() {
            return None;
        }

        let mut pods_by_item: BTreeMap<ItemId, Vec<PodId>> = BTreeMap::new();
        for &pod in &pods {
            if let Some(p) = world.pod(pod) {
                for item in p.available_items() {
                    pods_by_item.entry(item).or_default().push(pod);
                }
            }
        }
        let mut orders_by_item: BTreeMap<ItemId, Vec<OrderId>> = BTreeMap::new();
        for &order in &pending {
            for &item in cycle.backlog[&order].positions.keys() {
                orders_by_item.entry(item).or_default().push(order);
            }
        }
        let new_pod_set: BTreeSet<PodId> = new_pods.iter().copied().collect();
        let serving_pods: BTreeSet<PodId> = orders_by_item
            .keys()
            .filter_map(|item| pods_by_item.get(item))
            .flatten()
            .copied()
            .filter(|p| new_pod_set.contains(p))
            .collect();

        Some(ProgramInputs {
            stations,
            spare,
            inbound,
            new_pods,
            free_robots,
            robots: robots.into_iter().collect(),
            pods,
            pending,
            pods_by_item,
            orders_by_item,
            serving_pods,
        })
    }

    /// Builds the program and returns it with the objective expression.
    fn build(&self, cycle: &Cycle<'_>, inputs: &ProgramInputs) -> (LinearModel, Expression) {
        let world = &*cycle.world;
        let mut model = LinearModel::new();

        let mut v_xps: BTreeMap<(PodId, StationId), Variable> = BTreeMap::new();
        for &p in &inputs.pods {
            for &s in &inputs.stations {
                v_xps.insert((p, s), model.binary(xps(p, s)));
            }
        }
        let mut v_yos: BTreeMap<(OrderId, StationId), Variable> = BTreeMap::new();
        let mut v_yaos: BTreeMap<(OrderId, StationId), Variable> = BTreeMap::new();
        for &o in &inputs.pending {
            for &s in &inputs.stations {
                v_yos.insert((o, s), model.binary(yos(o, s)));
                v_yaos.insert((o, s), model.binary(yaos(o, s)));
            }
        }
        let mut v_yrp: BTreeMap<(RobotId, PodId), Variable> = BTreeMap::new();
        for &r in &inputs.robots {
            for &p in &inputs.pods {
                v_yrp.insert((r, p), model.binary(yrp(r, p)));
            }
        }
        let mut v_us: BTreeMap<StationId, Variable> = BTreeMap::new();
        for &s in &inputs.stations {
            v_us.insert(s, model.integer(us(s), 0, inputs.spare[&s] as i32));
        }
        let mut v_dops: BTreeMap<(OrderId, PodId, StationId), Variable> = BTreeMap::new();
        for (item, orders) in &inputs.orders_by_item {
            let Some(pods) = inputs.pods_by_item.get(item) else {
                continue;
            };
            for &p in pods.iter().filter(|p| inputs.serving_pods.contains(p)) {
                for &o in orders {
                    for &s in &inputs.stations {
                        v_dops
                            .entry((o, p, s))
                            .or_insert_with(|| model.binary(dops(o, p, s)));
                    }
                }
            }
        }

        // Objective: travel of newly moved pods, reward per candidate
        // order, penalty per idle slot.
        let w1 = self.config.weight_travel;
        let w2 = self.config.weight_throughput;
        let w3 = self.config.weight_idle_slack;
        let mut objective = Expression::from(0.0);
        for &p in &inputs.new_pods {
            let Some(pod_wp) = world.pod_waypoint(p) else {
                continue;
            };
            for &s in &inputs.stations {
                if let Some(station) = world.station(s) {
                    let d = cycle.distances.distance(station.waypoint, pod_wp);
                    objective = objective + w1 * d * v_xps[&(p, s)];
                }
            }
        }
        for &r in &inputs.free_robots {
            let Some(robot_wp) = world.robot(r).map(|r| r.waypoint) else {
                continue;
            };
            for &p in &inputs.new_pods {
                if let Some(pod_wp) = world.pod_waypoint(p) {
                    let d = cycle.distances.manhattan(robot_wp, pod_wp);
                    objective = objective + w1 * d * v_yrp[&(r, p)];
                }
            }
        }
        for (_, &v) in &v_yos {
            objective = objective - w2 * v;
        }
        for (_, &v) in &v_us {
            objective = objective + w3 * v;
        }

        // Each order is assigned to at most one station.
        for &o in &inputs.pending {
            let mut lhs = Expression::from(0.0);
            for &s in &inputs.stations {
                lhs = lhs + v_yos[&(o, s)];
            }
            model.add_constr(constraint!(lhs <= 1.0));
        }
        // Counted assignments presuppose candidate assignments.
        for (&(o, s), &counted) in &v_yaos {
            model.add_constr(constraint!(counted <= v_yos[&(o, s)]));
        }
        // Counted assignments fill the spare capacity, minus declared slack.
        for &s in &inputs.stations {
            let mut lhs = Expression::from(0.0);
            for &o in &inputs.pending {
                lhs = lhs + v_yaos[&(o, s)];
            }
            lhs = lhs + v_us[&s];
            model.add_constr(constraint!(lhs == inputs.spare[&s] as f64));
        }
        // Item demand per station cannot exceed the supply of its pods.
        for (item, orders) in &inputs.orders_by_item {
            let Some(pods) = inputs.pods_by_item.get(item) else {
                continue;
            };
            for &s in &inputs.stations {
                let mut demand = Expression::from(0.0);
                for &o in orders {
                    let quantity = cycle.backlog[&o].quantity_of(*item) as f64;
                    demand = demand + quantity * v_yos[&(o, s)];
                }
                let mut stock = Expression::from(0.0);
                for &p in pods {
                    let available = world.pod(p).map_or(0, |pod| pod.count_available(*item));
                    stock = stock + available as f64 * v_xps[&(p, s)];
                }
                model.add_constr(constraint!(demand <= stock));
            }
        }
        // A pod goes to at most one station, is carried by at most one
        // robot, and needs a robot when assigned anywhere.
        for &p in &inputs.pods {
            let mut to_stations = Expression::from(0.0);
            for &s in &inputs.stations {
                to_stations = to_stations + v_xps[&(p, s)];
            }
            let mut carriers = Expression::from(0.0);
            for &r in &inputs.robots {
                carriers = carriers + v_yrp[&(r, p)];
            }
            model.add_constr(constraint!(to_stations.clone() <= 1.0));
            model.add_constr(constraint!(carriers.clone() <= 1.0));
            model.add_constr(constraint!(to_stations <= carriers));
        }
        // Each robot carries at most one pod.
        for &r in &inputs.robots {
            let mut lhs = Expression::from(0.0);
            for &p in &inputs.pods {
                lhs = lhs + v_yrp[&(r, p)];
            }
            model.add_constr(constraint!(lhs <= 1.0));
        }
        // Prior commitments are pinned, not re-decided.
        for (&s, pods) in &inputs.inbound {
            for &(p, r) in pods {
                let assigned = v_xps[&(p, s)];
                let carried = v_yrp[&(r, p)];
                model.add_constr(constraint!(assigned == 1.0));
                model.add_constr(constraint!(carried == 1.0));
            }
        }
        // Serving presupposes both the counted order and the pod.
        for (&(o, p, s), &serving) in &v_dops {
            model.add_constr(constraint!(2.0 * serving <= v_yaos[&(o, s)] + v_xps[&(p, s)]));
        }
        // A newly moved pod must serve at least one order.
        for &p in &inputs.serving_pods {
            for &s in &inputs.stations {
                let mut served = Expression::from(0.0);
                for (&(_, p2, s2), &d) in &v_dops {
                    if p2 == p && s2 == s {
                        served = served + d;
                    }
                }
                model.add_constr(constraint!(v_xps[&(p, s)] <= served));
            }
        }
        // New pods that hold no demanded item cannot be moved at all.
        for &p in &inputs.new_pods {
            if inputs.serving_pods.contains(&p) {
                continue;
            }
            for &s in &inputs.stations {
                model.add_constr(constraint!(v_xps[&(p, s)] <= 0.0));
            }
        }

        (model, objective)
    }

    /// Commits a solution: disambiguate servings, roll back pods serving
    /// nothing, then claim, register and allocate.
    fn commit(
        &self,
        cycle: &mut Cycle<'_>,
        inputs: &ProgramInputs,
        solution: &SolvedModel,
    ) -> Result<(), EngineError> {
        let new_pod_set: BTreeSet<PodId> = inputs.new_pods.iter().copied().collect();

        // Pods assigned per station, and the station of each new pod.
        let mut pods_at_station: BTreeMap<StationId, Vec<PodId>> = BTreeMap::new();
        let mut new_assignments: Vec<(PodId, StationId)> = Vec::new();
        for &s in &inputs.stations {
            let mut pods = Vec::new();
            for &p in &inputs.pods {
                if solution.is_one(&xps(p, s)) {
                    pods.push(p);
                    if new_pod_set.contains(&p) {
                        new_assignments.push((p, s));
                    }
                }
            }
            pods_at_station.insert(s, pods);
        }

        // Confirmed orders per station, most urgent first.
        let mut confirmed: BTreeMap<StationId, Vec<OrderId>> = BTreeMap::new();
        for &s in &inputs.stations {
            let mut orders: Vec<OrderId> = inputs
                .pending
                .iter()
                .copied()
                .filter(|&o| solution.is_one(&yaos(o, s)))
                .collect();
            orders.sort_by_key(|o| (cycle.backlog[o].sequence, *o));
            if !orders.is_empty() {
                confirmed.insert(s, orders);
            }
        }

        // New robot claims chosen by the program.
        let mut new_claims: Vec<(RobotId, PodId)> = Vec::new();
        for &r in &inputs.free_robots {
            for &p in &inputs.new_pods {
                if solution.is_one(&yrp(r, p)) {
                    new_claims.push((r, p));
                }
            }
        }

        let mut dops_flags: BTreeSet<(OrderId, PodId, StationId)> = BTreeSet::new();
        for &s in &inputs.stations {
            for &p in &inputs.serving_pods {
                for &o in &inputs.pending {
                    if solution.is_one(&dops(o, p, s)) {
                        dops_flags.insert((o, p, s));
                    }
                }
            }
        }

        let servings = disambiguate(&confirmed, cycle.backlog, &pods_at_station, &dops_flags, |p, i| {
            cycle.world.pod(p).map_or(0, |pod| pod.count_available(i))
        })?;

        // Newly assigned pods that serve nothing are rolled back: their
        // claim and inbound registration are never written.
        let serving_now: BTreeSet<PodId> = servings.iter().map(|s| s.pod).collect();
        let rolled_back: BTreeSet<PodId> = new_assignments
            .iter()
            .map(|&(p, _)| p)
            .filter(|p| !serving_now.contains(p))
            .collect();
        for &p in &rolled_back {
            debug!(pod = %p, "assigned pod serves no order line, rolled back");
        }

        let committed_pods: BTreeSet<PodId> = new_assignments
            .iter()
            .map(|&(p, _)| p)
            .filter(|p| !rolled_back.contains(p))
            .collect();
        for &(p, s) in &new_assignments {
            if !committed_pods.contains(&p) {
                continue;
            }
            cycle
                .world
                .station_mut(s)
                .ok_or(EngineError::UnknownStation(s))?
                .register_inbound_pod(p);
        }
        for &(r, p) in &new_claims {
            // A carrier variable without a committed pod assignment is a
            // solver artifact; only claims backing a real move are written.
            if !committed_pods.contains(&p) {
                continue;
            }
            cycle.ledger.claim_pod(p, r, RobotTask::Extract)?;
        }
        for serving in &servings {
            let reserved = cycle
                .world
                .pod_mut(serving.pod)
                .is_some_and(|p| p.reserve(serving.item, serving.quantity));
            if !reserved {
                return Err(EngineError::CoverageShortfall {
                    order: serving.order,
                    item: serving.item,
                });
            }
            cycle.ledger.record_serving(*serving);
        }
        let allocations: Vec<(OrderId, StationId)> = confirmed
            .iter()
            .flat_map(|(&s, orders)| orders.iter().map(move |&o| (o, s)))
            .collect();
        for (order, station) in allocations {
            cycle.allocate_order(order, station)?;
        }
        Ok(())
    }
}

impl AssignmentStrategy for MilpStrategy {
    fn decide(&mut self, cycle: &mut Cycle<'_>) -> Result<(), EngineError> {
        refresh_priorities(cycle.backlog, cycle.now_ms);
        let Some(inputs) = self.gather(cycle) else {
            return Ok(());
        };
        let (model, objective) = self.build(cycle, &inputs);
        debug!(
            orders = inputs.pending.len(),
            pods = inputs.pods.len(),
            robots = inputs.robots.len(),
            stations = inputs.stations.len(),
            variables = model.num_vars(),
            "solving assignment program"
        );
        // An infeasible program commits nothing; the backlog is retried on
        // the next eligible cycle.
        let Some(solution) = model.minimize(objective) else {
            return Ok(());
        };
        self.commit(cycle, &inputs, &solution)
    }
}

fn xps(p: PodId, s: StationId) -> String {
    format!("xps_{}_{}", p.0, s.0)
}

fn yos(o: OrderId, s: StationId) -> String {
    format!("yos_{}_{}", o.0, s.0)
}

fn yaos(o: OrderId, s: StationId) -> String {
    format!("yaos_{}_{}", o.0, s.0)
}

fn yrp(r: RobotId, p: PodId) -> String {
    format!("yrp_{}_{}", r.0, p.0)
}

fn us(s: StationId) -> String {
    format!("us_{}", s.0)
}

fn dops(o: OrderId, p: PodId, s: StationId) -> String {
    format!("dops_{}_{}_{}", o.0, p.0, s.0)
}

/// Deterministic post-solve pass pinning concrete (item, order, pod,
/// quantity) servings.
///
/// Per station, confirmed orders are walked most urgent first; each item
/// demand draws from the pods flagged as serving that order before any
/// other assigned pod with remaining stock, pods in id order, decrementing
/// a working copy of the stock.
fn disambiguate(
    confirmed: &BTreeMap<StationId, Vec<OrderId>>,
    backlog: &BTreeMap<OrderId, Order>,
    pods_at_station: &BTreeMap<StationId, Vec<PodId>>,
    dops_flags: &BTreeSet<(OrderId, PodId, StationId)>,
    available: impl Fn(PodId, ItemId) -> u32,
) -> Result<Vec<Serving>, EngineError> {
    let mut servings = Vec::new();
    for (&station, orders) in confirmed {
        let pods = pods_at_station
            .get(&station)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let mut stock: BTreeMap<(PodId, ItemId), u32> = BTreeMap::new();
        for order in orders {
            let order = backlog
                .get(order)
                .ok_or(EngineError::UnknownOrder(*order))?;
            for (&item, &quantity) in &order.positions {
                let mut remaining = quantity;
                for flagged_pass in [true, false] {
                    for &pod in pods {
                        if remaining == 0 {
                            break;
                        }
                        if dops_flags.contains(&(order.id, pod, station)) != flagged_pass {
                            continue;
                        }
                        let left = stock
                            .entry((pod, item))
                            .or_insert_with(|| available(pod, item));
                        let take = (*left).min(remaining);
                        if take > 0 {
                            *left -= take;
                            remaining -= take;
                            servings.push(Serving {
                                station,
                                order: order.id,
                                pod,
                                item,
                                quantity: take,
                            });
                        }
                    }
                }
                if remaining > 0 {
                    return Err(EngineError::CoverageShortfall {
                        order: order.id,
                        item,
                    });
                }
            }
        }
    }
    Ok(servings)
}
