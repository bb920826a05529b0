//! Greedy two-phase assignment heuristic.
//!
//! Stations are served one at a time until a full pass makes no progress.
//! Per station, two phases alternate:
//!
//! - **POA** (pick-order-assignment): allocate backlog orders whose demand
//!   is fully coverable by pods already inbound to the station, best order
//!   first (optional overdue preference, then smallest summed distance of
//!   the inbound pods needed, then the configured tie-breaker).
//! - **PPS** (pod/robot pairing selection): when POA stalls, bring in a new
//!   pod. A single pod paired with its nearest free robot is committed when
//!   it makes at least one order completable; otherwise a bounded local
//!   search samples candidate pod sets from the combination generator,
//!   solves a small min-cost robot assignment per set and commits the best
//!   pairing found.
//!
//! Urgent orders get a dedicated first pass over the whole station loop so
//! that due-soon orders are never starved by greedy matching (fast lane).

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::{availability, demand_covered, refresh_priorities, urgent_orders, AssignmentStrategy};
use crate::config::{HeuristicConfig, OrderTieBreaker, PodScorerKind};
use crate::distance::DistanceOracle;
use crate::ledger::Serving;
use crate::models::{
    ItemId, Order, OrderId, PodId, RobotId, RobotTask, StationId, Warehouse, WaypointId,
};
use crate::podset::pod_sets_for_order;
use crate::scheduler::Cycle;
use crate::selector::BestCandidateSelector;
use crate::solver::{constraint, Expression, LinearModel, Variable};
use crate::EngineError;

/// Bound on cross-product enumeration before random sampling.
const MAX_ENUMERATED_SETS: usize = 256;

/// Reward per completable order in the pairing score.
const COMPLETABLE_REWARD: f64 = 40.0;

/// Greedy two-phase heuristic strategy.
pub struct HeuristicStrategy {
    config: HeuristicConfig,
    rng: SmallRng,
    normal_selector: BestCandidateSelector,
    fast_selector: BestCandidateSelector,
    pod_selector: BestCandidateSelector,
    /// Per-station inbound working sets, rebuilt from the warehouse at the
    /// start of every cycle.
    inbound: BTreeMap<StationId, BTreeSet<PodId>>,
}

impl HeuristicStrategy {
    /// Creates the strategy for a validated configuration.
    pub fn new(config: HeuristicConfig) -> Self {
        let order_scorers = if config.late_before_match { 3 } else { 2 };
        let pod_scorers = config.pod_scorers.len();
        Self {
            rng: SmallRng::seed_from_u64(config.seed),
            normal_selector: BestCandidateSelector::new(true, order_scorers),
            fast_selector: BestCandidateSelector::new(true, order_scorers),
            pod_selector: BestCandidateSelector::new(true, pod_scorers),
            inbound: BTreeMap::new(),
            config,
        }
    }

    /// Per-scorer averages of committed order assignments (normal lane).
    pub fn order_score_footprint(&self) -> Option<Vec<f64>> {
        self.normal_selector.stat_averages()
    }

    fn rebuild_inbound(&mut self, cycle: &Cycle<'_>) {
        self.inbound.clear();
        for station in cycle.world.stations() {
            self.inbound.insert(station.id, station.inbound_pods().clone());
        }
    }

    /// Runs station passes until one full pass makes no progress.
    fn run_passes(
        &mut self,
        cycle: &mut Cycle<'_>,
        scope: Option<&BTreeSet<OrderId>>,
    ) -> Result<(), EngineError> {
        loop {
            let mut progress = false;
            let stations: Vec<StationId> = cycle
                .world
                .stations()
                .filter(|s| s.is_assignable())
                .map(|s| s.id)
                .collect();
            for station in stations {
                if self.serve_station(cycle, station, scope)? {
                    progress = true;
                }
            }
            if !progress {
                return Ok(());
            }
        }
    }

    /// POA/PPS alternation for one station. Returns whether any order was
    /// allocated or any pod committed.
    fn serve_station(
        &mut self,
        cycle: &mut Cycle<'_>,
        station: StationId,
        scope: Option<&BTreeSet<OrderId>>,
    ) -> Result<bool, EngineError> {
        let mut selected: BTreeSet<PodId> = BTreeSet::new();
        let mut progress = false;
        loop {
            while station_assignable(cycle, station) {
                let Some(order) = self.pick_order(cycle, station, scope) else {
                    break;
                };
                self.commit_order(cycle, station, order, scope.is_some())?;
                progress = true;
            }
            if !station_assignable(cycle, station) || !any_pending(cycle, scope) {
                break;
            }
            let free = cycle.ledger.free_robots(cycle.world);
            if free.is_empty() {
                break;
            }
            if let Some((pod, robot)) = self.pick_pod(cycle, station, scope, &selected, &free) {
                self.commit_pairing(cycle, station, &[(pod, robot)], &mut selected)?;
                progress = true;
                continue;
            }
            if free.len() > 1 && self.local_search(cycle, station, scope, &free, &mut selected)? {
                progress = true;
                continue;
            }
            debug!(%station, "no pairing found, station skipped this pass");
            break;
        }
        Ok(progress)
    }

    /// Best backlog order fully coverable by the station's inbound pods.
    fn pick_order(
        &mut self,
        cycle: &Cycle<'_>,
        station: StationId,
        scope: Option<&BTreeSet<OrderId>>,
    ) -> Option<OrderId> {
        let fast = scope.is_some();
        let inbound = self.inbound.get(&station)?;
        let tie = if fast {
            self.config.fast_lane_tie_breaker
        } else {
            self.config.tie_breaker
        };
        let late_first = self.config.late_before_match;
        let selector = if fast {
            &mut self.fast_selector
        } else {
            &mut self.normal_selector
        };
        let rng = &mut self.rng;

        selector.recycle_keep_stats();
        let mut best = None;
        for (&id, order) in cycle.backlog.iter() {
            if scope.is_some_and(|scope| !scope.contains(&id)) {
                continue;
            }
            let Some((distance_sum, _)) =
                greedy_inbound_plan(order, station, inbound, cycle.world, cycle.distances)
            else {
                continue;
            };
            let mut scores = [0.0f64; 3];
            let mut n = 0;
            if late_first {
                scores[n] = if order.is_overdue(cycle.now_ms) { 0.0 } else { 1.0 };
                n += 1;
            }
            scores[n] = distance_sum;
            scores[n + 1] = tie_break_score(order, tie, rng);
            if selector.reassess(|i| scores[i]) {
                best = Some(id);
            }
        }
        best
    }

    /// Allocates the chosen order and marks the consumed units on the
    /// station's inbound pods, nearest pod first.
    fn commit_order(
        &mut self,
        cycle: &mut Cycle<'_>,
        station: StationId,
        id: OrderId,
        fast: bool,
    ) -> Result<(), EngineError> {
        let inbound = self.inbound.get(&station).cloned().unwrap_or_default();
        let order = cycle
            .backlog
            .get(&id)
            .cloned()
            .ok_or(EngineError::UnknownOrder(id))?;
        let plan = greedy_inbound_plan(&order, station, &inbound, cycle.world, cycle.distances)
            .ok_or_else(|| EngineError::CoverageShortfall {
                order: id,
                item: uncovered_item(&order, &inbound, cycle.world),
            })?;

        let selector = if fast {
            &mut self.fast_selector
        } else {
            &mut self.normal_selector
        };
        selector.accumulate_best();

        cycle.allocate_order(id, station)?;
        for (pod, item, quantity) in plan.1 {
            let reserved = cycle
                .world
                .pod_mut(pod)
                .is_some_and(|p| p.reserve(item, quantity));
            if !reserved {
                return Err(EngineError::CoverageShortfall { order: id, item });
            }
            cycle.ledger.record_serving(Serving {
                station,
                order: id,
                pod,
                item,
                quantity,
            });
        }
        Ok(())
    }

    /// Evaluates every eligible unused pod paired with its nearest free
    /// robot; a winner is only returned when it completes at least one
    /// pending order.
    fn pick_pod(
        &mut self,
        cycle: &Cycle<'_>,
        station: StationId,
        scope: Option<&BTreeSet<OrderId>>,
        selected: &BTreeSet<PodId>,
        free: &[RobotId],
    ) -> Option<(PodId, RobotId)> {
        let inbound = self.inbound.get(&station)?;
        self.pod_selector.recycle_keep_stats();
        let mut best: Option<(PodId, RobotId, usize)> = None;
        for pod in cycle.ledger.unused_pods(cycle.world) {
            if selected.contains(&pod) || !pod_relevant(cycle, scope, pod) {
                continue;
            }
            let Some(pod_wp) = cycle.world.pod_waypoint(pod) else {
                continue;
            };
            let robot = nearest_robot(free, pod_wp, cycle.world, cycle.distances)?;
            let eval = pairing_eval(cycle, station, inbound, &[(pod, robot)], scope);
            let scores = scorer_values(&eval, &self.config.pod_scorers);
            if self.pod_selector.reassess(|i| scores[i]) {
                best = Some((pod, robot, eval.completable));
            }
        }
        match best {
            Some((pod, robot, completable)) if completable >= 1 => {
                self.pod_selector.accumulate_best();
                Some((pod, robot))
            }
            _ => None,
        }
    }

    /// Claims the pods of a pairing and registers them inbound.
    fn commit_pairing(
        &mut self,
        cycle: &mut Cycle<'_>,
        station: StationId,
        pairing: &[(PodId, RobotId)],
        selected: &mut BTreeSet<PodId>,
    ) -> Result<(), EngineError> {
        for &(pod, robot) in pairing {
            cycle.ledger.claim_pod(pod, robot, RobotTask::Extract)?;
            cycle
                .world
                .station_mut(station)
                .ok_or(EngineError::UnknownStation(station))?
                .register_inbound_pod(pod);
            self.inbound.entry(station).or_default().insert(pod);
            selected.insert(pod);
        }
        Ok(())
    }

    /// Bounded local search: sample candidate pod sets for the most urgent
    /// coverable orders, solve the robot assignment per set and commit the
    /// best-scoring pairing.
    fn local_search(
        &mut self,
        cycle: &mut Cycle<'_>,
        station: StationId,
        scope: Option<&BTreeSet<OrderId>>,
        free: &[RobotId],
        selected: &mut BTreeSet<PodId>,
    ) -> Result<bool, EngineError> {
        let inbound = self.inbound.get(&station).cloned().unwrap_or_default();
        let unused = cycle.ledger.unused_pods(cycle.world);
        let pool: Vec<PodId> = inbound.iter().copied().chain(unused).collect();
        let supply = availability(pool.iter().filter_map(|&p| cycle.world.pod(p)));

        let mut coverable: Vec<(usize, OrderId)> = cycle
            .backlog
            .values()
            .filter(|o| !scope.is_some_and(|scope| !scope.contains(&o.id)))
            .filter(|o| demand_covered(o, &supply))
            .map(|o| (o.sequence, o.id))
            .collect();
        coverable.sort();
        if coverable.is_empty() {
            return Ok(false);
        }

        let rounds = self.config.local_search_breadth.min(coverable.len());
        self.pod_selector.recycle_keep_stats();
        let mut best: Option<(Vec<(PodId, RobotId)>, usize)> = None;
        for &(_, id) in &coverable[..rounds] {
            let Some(order) = cycle.backlog.get(&id) else {
                continue;
            };
            let mut candidates: BTreeMap<ItemId, Vec<PodId>> = BTreeMap::new();
            for &item in order.positions.keys() {
                candidates.insert(
                    item,
                    pool.iter()
                        .copied()
                        .filter(|&p| cycle.world.pod(p).is_some_and(|pod| pod.is_available(item)))
                        .collect(),
                );
            }
            let mut sets = pod_sets_for_order(
                order,
                &candidates,
                &inbound,
                free.len(),
                MAX_ENUMERATED_SETS,
                cycle.world,
            );
            let mut sampled = 0;
            while !sets.is_empty() && sampled < self.config.max_sampled_pod_sets {
                sampled += 1;
                let index = self.rng.random_range(0..sets.len());
                let set = sets.swap_remove(index);
                if set.is_empty() {
                    continue;
                }
                let Some(pairing) = solve_assignment(&set, free, cycle.world, cycle.distances)
                else {
                    continue;
                };
                let eval = pairing_eval(cycle, station, &inbound, &pairing, scope);
                let scores = scorer_values(&eval, &self.config.pod_scorers);
                if self.pod_selector.reassess(|i| scores[i]) {
                    best = Some((pairing, eval.completable));
                }
            }
        }

        match best {
            Some((pairing, completable)) if completable >= 1 => {
                self.pod_selector.accumulate_best();
                self.commit_pairing(cycle, station, &pairing, selected)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl AssignmentStrategy for HeuristicStrategy {
    fn decide(&mut self, cycle: &mut Cycle<'_>) -> Result<(), EngineError> {
        refresh_priorities(cycle.backlog, cycle.now_ms);
        self.rebuild_inbound(cycle);
        if cycle.backlog.is_empty() {
            return Ok(());
        }
        if self.config.fast_lane {
            let urgent = urgent_orders(
                cycle.backlog,
                cycle.ledger,
                cycle.world,
                self.config.urgency_threshold_ms,
            );
            let total_spare: u32 = cycle
                .world
                .stations()
                .filter(|s| s.active)
                .map(|s| s.slots_free())
                .sum();
            if !urgent.is_empty() && urgent.len() as u32 <= total_spare {
                self.run_passes(cycle, Some(&urgent))?;
            }
        }
        self.run_passes(cycle, None)
    }

    fn eager(&self) -> bool {
        true
    }
}

/// Pairing assessment shared by single-pod selection and local search.
struct PairingEval {
    /// Negated backlog demand covered by the pairing's pods.
    demand: f64,
    /// `MAX` when nothing completes, else reward/travel trade-off.
    completable_score: f64,
    /// Sum of sequence ranks of the completable orders.
    work: f64,
    /// Number of orders completable with the pairing inbound.
    completable: usize,
}

fn station_assignable(cycle: &Cycle<'_>, station: StationId) -> bool {
    cycle
        .world
        .station(station)
        .is_some_and(|s| s.is_assignable())
}

fn any_pending(cycle: &Cycle<'_>, scope: Option<&BTreeSet<OrderId>>) -> bool {
    match scope {
        Some(scope) => scope.iter().any(|id| cycle.backlog.contains_key(id)),
        None => !cycle.backlog.is_empty(),
    }
}

fn tie_break_score(order: &Order, tie: OrderTieBreaker, rng: &mut SmallRng) -> f64 {
    match tie {
        OrderTieBreaker::Random => rng.random::<f64>(),
        OrderTieBreaker::EarliestDueTime => order.due_time_ms as f64,
        OrderTieBreaker::Fcfs => order.time_placed_ms as f64,
    }
}

/// Whether the pod can contribute at least one unit of outstanding
/// extract-request demand.
fn pod_relevant(cycle: &Cycle<'_>, scope: Option<&BTreeSet<OrderId>>, pod: PodId) -> bool {
    let Some(pod) = cycle.world.pod(pod) else {
        return false;
    };
    cycle
        .backlog
        .values()
        .filter(|o| !scope.is_some_and(|scope| !scope.contains(&o.id)))
        .any(|o| {
            cycle
                .ledger
                .extract_requests_of_order(o.id)
                .iter()
                .any(|request| pod.is_available(request.item))
        })
}

/// Free robot nearest to the waypoint (Manhattan), ties by id.
fn nearest_robot(
    free: &[RobotId],
    target: WaypointId,
    world: &Warehouse,
    distances: &DistanceOracle,
) -> Option<RobotId> {
    free.iter()
        .copied()
        .min_by(|&a, &b| {
            let da = world
                .robot(a)
                .map(|r| distances.manhattan(r.waypoint, target))
                .unwrap_or(f64::MAX);
            let db = world
                .robot(b)
                .map(|r| distances.manhattan(r.waypoint, target))
                .unwrap_or(f64::MAX);
            da.partial_cmp(&db).unwrap_or(Ordering::Equal).then(a.cmp(&b))
        })
}

/// Greedy first-fit match of the order's demand against the station's
/// inbound pods in distance-ascending order.
///
/// Returns the summed distance of the pods actually used and the concrete
/// `(pod, item, quantity)` draws, or `None` when the demand is not fully
/// coverable.
fn greedy_inbound_plan(
    order: &Order,
    station: StationId,
    inbound: &BTreeSet<PodId>,
    world: &Warehouse,
    distances: &DistanceOracle,
) -> Option<(f64, Vec<(PodId, ItemId, u32)>)> {
    let station_wp = world.station(station)?.waypoint;
    let mut pods: Vec<(f64, PodId)> = inbound
        .iter()
        .filter_map(|&p| {
            let wp = world.pod_waypoint(p)?;
            Some((distances.distance(station_wp, wp), p))
        })
        .collect();
    pods.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });

    let mut remaining: BTreeMap<ItemId, u32> = order.positions.clone();
    let mut plan = Vec::new();
    let mut total_distance = 0.0;
    for (distance, pod_id) in pods {
        let pod = world.pod(pod_id)?;
        let mut used = false;
        for (&item, rem) in remaining.iter_mut() {
            if *rem == 0 {
                continue;
            }
            let take = pod.count_available(item).min(*rem);
            if take > 0 {
                plan.push((pod_id, item, take));
                *rem -= take;
                used = true;
            }
        }
        if used {
            total_distance += distance;
        }
        if remaining.values().all(|&r| r == 0) {
            break;
        }
    }
    remaining
        .values()
        .all(|&r| r == 0)
        .then_some((total_distance, plan))
}

/// First item of the order the inbound pods cannot cover (for error
/// reporting).
fn uncovered_item(order: &Order, inbound: &BTreeSet<PodId>, world: &Warehouse) -> ItemId {
    let supply = availability(inbound.iter().filter_map(|&p| world.pod(p)));
    order
        .positions
        .iter()
        .find(|(item, &quantity)| supply.get(item).copied().unwrap_or(0) < quantity)
        .map(|(&item, _)| item)
        .or_else(|| order.positions.keys().next().copied())
        .unwrap_or(ItemId(0))
}

/// Scores a tentative pairing of new pods and robots for a station.
fn pairing_eval(
    cycle: &Cycle<'_>,
    station: StationId,
    inbound: &BTreeSet<PodId>,
    pairing: &[(PodId, RobotId)],
    scope: Option<&BTreeSet<OrderId>>,
) -> PairingEval {
    let world = &*cycle.world;
    let scoped: Vec<&Order> = {
        let mut orders: Vec<&Order> = cycle
            .backlog
            .values()
            .filter(|o| !scope.is_some_and(|scope| !scope.contains(&o.id)))
            .collect();
        orders.sort_by_key(|o| (o.sequence, o.id));
        orders
    };

    // Outstanding backlog demand per item, for the demand scorer.
    let mut backlog_demand: BTreeMap<ItemId, u32> = BTreeMap::new();
    for order in &scoped {
        for (&item, &quantity) in &order.positions {
            *backlog_demand.entry(item).or_insert(0) += quantity;
        }
    }
    let mut covered_units = 0u32;
    for &(pod_id, _) in pairing {
        if let Some(pod) = world.pod(pod_id) {
            for item in pod.available_items() {
                let demanded = backlog_demand.get(&item).copied().unwrap_or(0);
                covered_units += pod.count_available(item).min(demanded);
            }
        }
    }

    // Completable orders with the pairing virtually inbound.
    let mut supply = availability(
        inbound
            .iter()
            .copied()
            .chain(pairing.iter().map(|&(p, _)| p))
            .filter_map(|p| world.pod(p)),
    );
    let mut completable = 0usize;
    let mut work = 0.0;
    for order in &scoped {
        if demand_covered(order, &supply) {
            for (item, &quantity) in &order.positions {
                if let Some(stock) = supply.get_mut(item) {
                    *stock -= quantity;
                }
            }
            completable += 1;
            work += order.sequence as f64;
        }
    }

    let station_wp = world.station(station).map(|s| s.waypoint);
    let travel: f64 = pairing
        .iter()
        .filter_map(|&(pod, robot)| {
            let pod_wp = world.pod_waypoint(pod)?;
            let robot_wp = world.robot(robot)?.waypoint;
            let to_station = station_wp
                .map(|wp| cycle.distances.distance(wp, pod_wp))
                .unwrap_or(0.0);
            Some(cycle.distances.manhattan(robot_wp, pod_wp) + to_station)
        })
        .sum();

    PairingEval {
        demand: -(covered_units as f64),
        completable_score: if completable == 0 {
            f64::MAX
        } else {
            -(COMPLETABLE_REWARD * completable as f64) + travel
        },
        work,
        completable,
    }
}

/// Maps the configured scorer chain onto a pairing evaluation.
fn scorer_values(eval: &PairingEval, kinds: &[PodScorerKind]) -> [f64; 3] {
    let mut scores = [0.0f64; 3];
    for (i, kind) in kinds.iter().enumerate() {
        scores[i] = match kind {
            PodScorerKind::Demand => eval.demand,
            PodScorerKind::Completable => eval.completable_score,
            PodScorerKind::WorkAmount => eval.work,
        };
    }
    scores
}

/// Min-cost assignment of each pod in the set to exactly one free robot,
/// minimizing total Manhattan travel. Returns pod/robot pairs in pod id
/// order, or `None` when the model has no solution.
fn solve_assignment(
    set: &BTreeSet<PodId>,
    free: &[RobotId],
    world: &Warehouse,
    distances: &DistanceOracle,
) -> Option<Vec<(PodId, RobotId)>> {
    let mut model = LinearModel::new();
    let mut vars: BTreeMap<(RobotId, PodId), Variable> = BTreeMap::new();
    let mut objective = Expression::from(0.0);
    for &robot in free {
        let robot_wp = world.robot(robot)?.waypoint;
        for &pod in set {
            let pod_wp = world.pod_waypoint(pod)?;
            let var = model.binary(format!("yrp_{}_{}", robot.0, pod.0));
            objective = objective + distances.manhattan(robot_wp, pod_wp) * var;
            vars.insert((robot, pod), var);
        }
    }
    for &pod in set {
        let mut lhs = Expression::from(0.0);
        for &robot in free {
            lhs = lhs + vars[&(robot, pod)];
        }
        model.add_constr(constraint!(lhs == 1.0));
    }
    for &robot in free {
        let mut lhs = Expression::from(0.0);
        for &pod in set {
            lhs = lhs + vars[&(robot, pod)];
        }
        model.add_constr(constraint!(lhs <= 1.0));
    }

    let solution = model.minimize(objective)?;
    let mut pairing = Vec::with_capacity(set.len());
    for &pod in set {
        let robot = free
            .iter()
            .copied()
            .find(|&r| solution.is_one(&format!("yrp_{}_{}", r.0, pod.0)))?;
        pairing.push((pod, robot));
    }
    Some(pairing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceOracle;
    use crate::ledger::ResourceLedger;
    use crate::models::{OutputStation, Pod, Robot, WaypointId};

    fn order(id: u32, placed: i64, due: i64, items: &[(u32, u32)]) -> Order {
        Order::new(
            OrderId(id),
            items.iter().map(|&(i, q)| (ItemId(i), q)).collect(),
            placed,
            due,
        )
    }

    fn snapshot(world: &Warehouse) -> BTreeMap<StationId, u32> {
        world.stations().map(|s| (s.id, s.slots_free())).collect()
    }

    fn line_oracle() -> DistanceOracle {
        // Waypoints 0..=9 on one row; manhattan distance = |a - b|.
        let mut oracle = DistanceOracle::new(1_000.0);
        for wp in 0..10u32 {
            oracle = oracle.with_coord(WaypointId(wp), wp as f64, 0.0, 0);
            for other in 0..10u32 {
                oracle.insert(
                    WaypointId(wp),
                    WaypointId(other),
                    (wp as f64 - other as f64).abs(),
                );
            }
        }
        oracle
    }

    fn decide(
        strategy: &mut HeuristicStrategy,
        now_ms: i64,
        world: &mut Warehouse,
        ledger: &mut ResourceLedger,
        backlog: &mut BTreeMap<OrderId, Order>,
        sink: &mut Vec<(Order, StationId)>,
    ) {
        let oracle = line_oracle();
        let mut spare = snapshot(world);
        let mut cycle = Cycle::new(now_ms, world, ledger, &oracle, backlog, &mut spare, sink);
        strategy.decide(&mut cycle).unwrap();
    }

    /// Scenario: one slot, two orders for the same single unit. Exactly one
    /// order wins by the configured tie-break and the pod is exhausted.
    #[test]
    fn test_single_slot_tie_break_decides() {
        let mut world = Warehouse::new()
            .with_station(OutputStation::new(StationId(1), WaypointId(0), 1))
            .with_pod(Pod::new(PodId(1), WaypointId(2)).with_stock(ItemId(1), 1))
            .with_robot(Robot::new(RobotId(1), WaypointId(2)).with_task(RobotTask::Extract));
        let mut ledger = ResourceLedger::new();
        ledger
            .claim_pod(PodId(1), RobotId(1), RobotTask::Extract)
            .unwrap();
        world
            .station_mut(StationId(1))
            .unwrap()
            .register_inbound_pod(PodId(1));

        let mut backlog = BTreeMap::new();
        backlog.insert(OrderId(0), order(0, 0, 900_000, &[(1, 1)]));
        backlog.insert(OrderId(1), order(1, 0, 600_000, &[(1, 1)]));
        for o in backlog.values() {
            ledger.admit_order(o);
        }

        let mut strategy = HeuristicStrategy::new(HeuristicConfig {
            fast_lane: false,
            tie_breaker: OrderTieBreaker::EarliestDueTime,
            ..HeuristicConfig::default()
        });
        let mut sink = Vec::new();
        decide(&mut strategy, 0, &mut world, &mut ledger, &mut backlog, &mut sink);

        assert_eq!(sink.len(), 1);
        // Earliest due time wins.
        assert_eq!(sink[0].0.id, OrderId(1));
        assert_eq!(backlog.keys().copied().collect::<Vec<_>>(), vec![OrderId(0)]);
        assert_eq!(
            world.pod(PodId(1)).unwrap().count_available(ItemId(1)),
            0
        );
        let servings = ledger.servings_of_station(StationId(1));
        assert_eq!(servings.len(), 1);
        assert_eq!(servings[0].quantity, 1);
    }

    /// Scenario: no single pod covers the two-unit demand; the combination
    /// generator proposes the two-pod set and both pods are claimed by
    /// their nearest free robots.
    #[test]
    fn test_two_pod_set_claims_nearest_robots() {
        let mut world = Warehouse::new()
            .with_station(OutputStation::new(StationId(1), WaypointId(0), 1))
            .with_pod(Pod::new(PodId(1), WaypointId(2)).with_stock(ItemId(1), 1))
            .with_pod(Pod::new(PodId(2), WaypointId(7)).with_stock(ItemId(1), 1))
            .with_robot(Robot::new(RobotId(1), WaypointId(3)))
            .with_robot(Robot::new(RobotId(2), WaypointId(6)));
        let mut ledger = ResourceLedger::new();
        let mut backlog = BTreeMap::new();
        backlog.insert(OrderId(0), order(0, 0, 900_000, &[(1, 2)]));
        ledger.admit_order(&backlog[&OrderId(0)]);

        let mut strategy = HeuristicStrategy::new(HeuristicConfig {
            fast_lane: false,
            ..HeuristicConfig::default()
        });
        let mut sink = Vec::new();
        decide(&mut strategy, 0, &mut world, &mut ledger, &mut backlog, &mut sink);

        assert_eq!(sink.len(), 1);
        assert!(backlog.is_empty());
        // Minimum-travel pairing: robot 1 (wp 3) → pod 1 (wp 2), robot 2
        // (wp 6) → pod 2 (wp 7).
        assert_eq!(ledger.robot_of(PodId(1)), Some(RobotId(1)));
        assert_eq!(ledger.robot_of(PodId(2)), Some(RobotId(2)));
        let station = world.station(StationId(1)).unwrap();
        assert!(station.inbound_pods().contains(&PodId(1)));
        assert!(station.inbound_pods().contains(&PodId(2)));
        // Both units are earmarked.
        assert_eq!(world.pod(PodId(1)).unwrap().count_available(ItemId(1)), 0);
        assert_eq!(world.pod(PodId(2)).unwrap().count_available(ItemId(1)), 0);
    }

    /// Scenario: an urgent order competes with a distance-preferred normal
    /// order for the last free slot and must win.
    #[test]
    fn test_urgent_order_wins_last_slot() {
        let mut world = Warehouse::new()
            .with_station(OutputStation::new(StationId(1), WaypointId(0), 1))
            // Inbound pod serving the non-urgent order, right next door.
            .with_pod(Pod::new(PodId(1), WaypointId(1)).with_stock(ItemId(1), 1))
            // Unused pod covering the urgent order.
            .with_pod(Pod::new(PodId(2), WaypointId(5)).with_stock(ItemId(2), 1))
            .with_robot(Robot::new(RobotId(1), WaypointId(4)))
            .with_robot(Robot::new(RobotId(2), WaypointId(9)).with_task(RobotTask::Extract));
        let mut ledger = ResourceLedger::new();
        ledger
            .claim_pod(PodId(1), RobotId(2), RobotTask::Extract)
            .unwrap();
        world
            .station_mut(StationId(1))
            .unwrap()
            .register_inbound_pod(PodId(1));

        let mut backlog = BTreeMap::new();
        // Non-urgent, instantly coverable from the inbound pod.
        backlog.insert(OrderId(0), order(0, 0, 7_200_000, &[(1, 1)]));
        // Urgent: slack below the 30-minute default threshold.
        backlog.insert(OrderId(1), order(1, 0, 300_000, &[(2, 1)]));
        for o in backlog.values() {
            ledger.admit_order(o);
        }

        let mut strategy = HeuristicStrategy::new(HeuristicConfig::default());
        let mut sink = Vec::new();
        decide(&mut strategy, 0, &mut world, &mut ledger, &mut backlog, &mut sink);

        // The single slot went to the urgent order despite the waiting
        // inbound match for the other one.
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].0.id, OrderId(1));
        assert!(backlog.contains_key(&OrderId(0)));
        assert_eq!(ledger.robot_of(PodId(2)), Some(RobotId(1)));
    }

    /// POA pulls units from the nearest inbound pod first.
    #[test]
    fn test_poa_first_fit_prefers_near_pods() {
        let mut world = Warehouse::new()
            .with_station(OutputStation::new(StationId(1), WaypointId(0), 1))
            .with_pod(Pod::new(PodId(1), WaypointId(8)).with_stock(ItemId(1), 1))
            .with_pod(Pod::new(PodId(2), WaypointId(2)).with_stock(ItemId(1), 1))
            .with_robot(Robot::new(RobotId(1), WaypointId(8)).with_task(RobotTask::Extract))
            .with_robot(Robot::new(RobotId(2), WaypointId(2)).with_task(RobotTask::Extract));
        let mut ledger = ResourceLedger::new();
        ledger
            .claim_pod(PodId(1), RobotId(1), RobotTask::Extract)
            .unwrap();
        ledger
            .claim_pod(PodId(2), RobotId(2), RobotTask::Extract)
            .unwrap();
        {
            let station = world.station_mut(StationId(1)).unwrap();
            station.register_inbound_pod(PodId(1));
            station.register_inbound_pod(PodId(2));
        }

        let mut backlog = BTreeMap::new();
        backlog.insert(OrderId(0), order(0, 0, 900_000, &[(1, 1)]));
        ledger.admit_order(&backlog[&OrderId(0)]);

        let mut strategy = HeuristicStrategy::new(HeuristicConfig {
            fast_lane: false,
            ..HeuristicConfig::default()
        });
        let mut sink = Vec::new();
        decide(&mut strategy, 0, &mut world, &mut ledger, &mut backlog, &mut sink);

        let servings = ledger.servings_of_station(StationId(1));
        assert_eq!(servings.len(), 1);
        // Pod 2 (distance 2) over pod 1 (distance 8).
        assert_eq!(servings[0].pod, PodId(2));
        assert_eq!(world.pod(PodId(1)).unwrap().count_available(ItemId(1)), 1);
    }

    /// Deciding twice without any intervening change must not produce new
    /// claims or allocations.
    #[test]
    fn test_idempotent_without_changes() {
        let mut world = Warehouse::new()
            .with_station(OutputStation::new(StationId(1), WaypointId(0), 2))
            .with_pod(Pod::new(PodId(1), WaypointId(2)).with_stock(ItemId(1), 1))
            .with_robot(Robot::new(RobotId(1), WaypointId(3)));
        let mut ledger = ResourceLedger::new();
        let mut backlog = BTreeMap::new();
        backlog.insert(OrderId(0), order(0, 0, 900_000, &[(1, 1)]));
        ledger.admit_order(&backlog[&OrderId(0)]);

        let mut strategy = HeuristicStrategy::new(HeuristicConfig {
            fast_lane: false,
            ..HeuristicConfig::default()
        });
        let mut sink = Vec::new();
        decide(&mut strategy, 0, &mut world, &mut ledger, &mut backlog, &mut sink);
        assert_eq!(sink.len(), 1);
        assert_eq!(ledger.robot_of(PodId(1)), Some(RobotId(1)));

        decide(&mut strategy, 1_000, &mut world, &mut ledger, &mut backlog, &mut sink);
        assert_eq!(sink.len(), 1);
        assert_eq!(ledger.servings_of_station(StationId(1)).len(), 1);
    }

    /// A station with no pairing available is skipped without failing the
    /// cycle.
    #[test]
    fn test_station_skipped_when_nothing_fits() {
        let mut world = Warehouse::new()
            .with_station(OutputStation::new(StationId(1), WaypointId(0), 1))
            .with_pod(Pod::new(PodId(1), WaypointId(2)).with_stock(ItemId(9), 1))
            .with_robot(Robot::new(RobotId(1), WaypointId(3)));
        let mut ledger = ResourceLedger::new();
        let mut backlog = BTreeMap::new();
        // Demands an item no pod holds.
        backlog.insert(OrderId(0), order(0, 0, 900_000, &[(1, 1)]));
        ledger.admit_order(&backlog[&OrderId(0)]);

        let mut strategy = HeuristicStrategy::new(HeuristicConfig::default());
        let mut sink = Vec::new();
        decide(&mut strategy, 0, &mut world, &mut ledger, &mut backlog, &mut sink);

        assert!(sink.is_empty());
        assert_eq!(backlog.len(), 1);
        assert_eq!(ledger.robot_of(PodId(1)), None);
    }

    /// Exact coverage bookkeeping: a two-item order is served unit-for-unit
    /// across the pods chosen for it.
    #[test]
    fn test_coverage_soundness_across_items() {
        let mut world = Warehouse::new()
            .with_station(OutputStation::new(StationId(1), WaypointId(0), 1))
            .with_pod(
                Pod::new(PodId(1), WaypointId(2))
                    .with_stock(ItemId(1), 2)
                    .with_stock(ItemId(2), 1),
            )
            .with_robot(Robot::new(RobotId(1), WaypointId(3)));
        let mut ledger = ResourceLedger::new();
        let mut backlog = BTreeMap::new();
        backlog.insert(OrderId(0), order(0, 0, 900_000, &[(1, 2), (2, 1)]));
        ledger.admit_order(&backlog[&OrderId(0)]);

        let mut strategy = HeuristicStrategy::new(HeuristicConfig {
            fast_lane: false,
            ..HeuristicConfig::default()
        });
        let mut sink = Vec::new();
        decide(&mut strategy, 0, &mut world, &mut ledger, &mut backlog, &mut sink);

        assert_eq!(sink.len(), 1);
        let servings = ledger.servings_of_station(StationId(1));
        let total_item1: u32 = servings
            .iter()
            .filter(|s| s.item == ItemId(1))
            .map(|s| s.quantity)
            .sum();
        let total_item2: u32 = servings
            .iter()
            .filter(|s| s.item == ItemId(2))
            .map(|s| s.quantity)
            .sum();
        assert_eq!(total_item1, 2);
        assert_eq!(total_item2, 1);
        let pod = world.pod(PodId(1)).unwrap();
        assert_eq!(pod.count_available(ItemId(1)), 0);
        assert_eq!(pod.count_available(ItemId(2)), 0);
    }
}
