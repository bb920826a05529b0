//! Order batching scheduler skeleton.
//!
//! Event-driven backlog management around a pluggable assignment strategy.
//! Decision routines are expensive, so they only run when the situation
//! changed (new order, completion, bundle stored, station activated) — or,
//! for an eager strategy, whenever spare station capacity is at or above
//! the eagerness threshold — and never without spare capacity.
//!
//! [`Cycle::allocate_order`] is the single side-effecting commit point
//! shared by both strategies: it removes the order from the backlog,
//! reserves the station slot and hands the pair to the allocation sink.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::StrategyConfig;
use crate::distance::DistanceOracle;
use crate::ledger::ResourceLedger;
use crate::models::{ItemId, Order, OrderId, StationId, Warehouse};
use crate::strategy::{build_strategy, AssignmentStrategy};
use crate::{ConfigError, EngineError};

/// Consumer of committed (order, station) allocations.
pub trait AllocationSink {
    /// Commits an order to a station's pick queue.
    fn allocate(&mut self, order: Order, station: StationId);
}

impl AllocationSink for Vec<(Order, StationId)> {
    fn allocate(&mut self, order: Order, station: StationId) {
        self.push((order, station));
    }
}

/// An order retrieved from the item subsystem, not yet admitted.
#[derive(Debug, Clone)]
pub struct IncomingOrder {
    /// Item demand: item → required quantity.
    pub positions: BTreeMap<ItemId, u32>,
    /// Latest completion time (ms).
    pub due_time_ms: i64,
}

/// Mutable view of one decision cycle handed to the active strategy.
pub struct Cycle<'a> {
    /// Current simulation time (ms).
    pub now_ms: i64,
    /// Physical warehouse state.
    pub world: &'a mut Warehouse,
    /// Claims, extract requests and servings.
    pub ledger: &'a mut ResourceLedger,
    /// Shared distance oracle.
    pub distances: &'a DistanceOracle,
    /// Pending orders, keyed by id.
    pub backlog: &'a mut BTreeMap<OrderId, Order>,
    /// Spare-slot snapshot taken at the start of the cycle; strategies may
    /// decrement it to track their own provisional allocations.
    pub spare: &'a mut BTreeMap<StationId, u32>,
    sink: &'a mut dyn AllocationSink,
    allocated: u32,
}

impl<'a> Cycle<'a> {
    /// Builds a decision cycle view.
    pub fn new(
        now_ms: i64,
        world: &'a mut Warehouse,
        ledger: &'a mut ResourceLedger,
        distances: &'a DistanceOracle,
        backlog: &'a mut BTreeMap<OrderId, Order>,
        spare: &'a mut BTreeMap<StationId, u32>,
        sink: &'a mut dyn AllocationSink,
    ) -> Self {
        Self {
            now_ms,
            world,
            ledger,
            distances,
            backlog,
            spare,
            sink,
            allocated: 0,
        }
    }

    /// Immediately commits the order to the station.
    ///
    /// Removes the order from the backlog (exactly once), reserves the
    /// station slot and submits the decision to the allocation sink.
    pub fn allocate_order(
        &mut self,
        order: OrderId,
        station: StationId,
    ) -> Result<(), EngineError> {
        let target = self
            .world
            .station_mut(station)
            .ok_or(EngineError::UnknownStation(station))?;
        if !target.register_order() {
            return Err(EngineError::CapacityExceeded(station));
        }
        let order = match self.backlog.remove(&order) {
            Some(order) => order,
            None => return Err(EngineError::UnknownOrder(order)),
        };
        if let Some(spare) = self.spare.get_mut(&station) {
            *spare = spare.saturating_sub(1);
        }
        self.allocated += 1;
        self.sink.allocate(order, station);
        Ok(())
    }

    /// Orders allocated so far in this cycle.
    pub fn allocated(&self) -> u32 {
        self.allocated
    }
}

/// Wall-clock instrumentation of the decision routine.
#[derive(Debug, Clone, Default)]
pub struct DecisionStats {
    /// Simulation steps processed.
    pub steps: u64,
    /// Decision routine invocations.
    pub decisions: u64,
    /// Total wall time spent deciding.
    pub total_decision_time: Duration,
    /// Wall time of the most recent decision.
    pub last_decision_time: Option<Duration>,
}

impl DecisionStats {
    fn record(&mut self, elapsed: Duration) {
        self.decisions += 1;
        self.total_decision_time += elapsed;
        self.last_decision_time = Some(elapsed);
    }
}

/// Outcome of one simulation step.
#[derive(Debug, Clone, Default)]
pub struct StepReport {
    /// Orders admitted to the backlog this step.
    pub admitted: usize,
    /// Whether the decision routine ran.
    pub decided: bool,
    /// Orders allocated to stations this step.
    pub allocated: u32,
}

/// Event-driven backlog manager with decision throttling.
pub struct OrderBatchingScheduler {
    backlog: BTreeMap<OrderId, Order>,
    next_order_id: u32,
    situation_investigated: bool,
    spare: BTreeMap<StationId, u32>,
    eagerness_threshold: u32,
    strategy: Box<dyn AssignmentStrategy>,
    stats: DecisionStats,
}

impl OrderBatchingScheduler {
    /// Creates a scheduler for the given strategy configuration.
    ///
    /// Fails fast on invalid configuration.
    pub fn new(config: &StrategyConfig) -> Result<Self, ConfigError> {
        Ok(Self::with_strategy(build_strategy(config)?))
    }

    /// Creates a scheduler around an already constructed strategy.
    pub fn with_strategy(strategy: Box<dyn AssignmentStrategy>) -> Self {
        Self {
            backlog: BTreeMap::new(),
            next_order_id: 0,
            situation_investigated: false,
            spare: BTreeMap::new(),
            eagerness_threshold: 1,
            strategy,
            stats: DecisionStats::default(),
        }
    }

    /// Sets the spare-capacity threshold at which decisions are worthwhile.
    pub fn with_eagerness_threshold(mut self, threshold: u32) -> Self {
        self.eagerness_threshold = threshold;
        self
    }

    /// Pending orders, keyed by id.
    pub fn backlog(&self) -> &BTreeMap<OrderId, Order> {
        &self.backlog
    }

    /// Decision instrumentation.
    pub fn stats(&self) -> &DecisionStats {
        &self.stats
    }

    /// Signals that an order finished at a station.
    pub fn notify_order_completed(&mut self) {
        self.situation_investigated = false;
    }

    /// Signals that an inventory bundle was stored on a pod.
    pub fn notify_bundle_stored(&mut self) {
        self.situation_investigated = false;
    }

    /// Signals that a previously inactive station accepts orders again.
    pub fn notify_station_activated(&mut self) {
        self.situation_investigated = false;
    }

    /// Advances the scheduler by one simulation step.
    ///
    /// Drains newly retrieved orders into the backlog, snapshots station
    /// capacity and, when the throttling conditions allow, invokes the
    /// strategy's decision routine.
    pub fn step(
        &mut self,
        now_ms: i64,
        arrivals: Vec<IncomingOrder>,
        world: &mut Warehouse,
        ledger: &mut ResourceLedger,
        distances: &DistanceOracle,
        sink: &mut dyn AllocationSink,
    ) -> Result<StepReport, EngineError> {
        let mut report = StepReport {
            admitted: arrivals.len(),
            ..StepReport::default()
        };

        for incoming in arrivals {
            let id = OrderId(self.next_order_id);
            self.next_order_id += 1;
            let order = Order::new(id, incoming.positions, now_ms, incoming.due_time_ms);
            ledger.admit_order(&order);
            self.backlog.insert(id, order);
            self.situation_investigated = false;
        }

        self.snapshot_capacity(world);
        let spare_available = self
            .spare
            .values()
            .any(|&slots| slots >= self.eagerness_threshold);

        if spare_available && (!self.situation_investigated || self.strategy.eager()) {
            let started = Instant::now();
            let mut cycle = Cycle::new(
                now_ms,
                world,
                ledger,
                distances,
                &mut self.backlog,
                &mut self.spare,
                sink,
            );
            self.strategy.decide(&mut cycle)?;
            report.decided = true;
            report.allocated = cycle.allocated();
            let elapsed = started.elapsed();
            self.stats.record(elapsed);
            debug!(
                ?elapsed,
                allocated = report.allocated,
                backlog = self.backlog.len(),
                "decision cycle finished"
            );
        }
        self.situation_investigated = true;
        self.stats.steps += 1;
        Ok(report)
    }

    /// Rebuilds the per-station spare-slot snapshot.
    fn snapshot_capacity(&mut self, world: &Warehouse) {
        self.spare.clear();
        for station in world.stations() {
            self.spare.insert(station.id, station.slots_free());
        }
    }
}
