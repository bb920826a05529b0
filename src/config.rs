//! Engine configuration.
//!
//! The strategy is selected once, at construction, from a tagged
//! [`StrategyConfig`] variant. Unrecognized values fail deserialization and
//! [`validate`](StrategyConfig::validate) rejects semantically invalid
//! settings; the engine refuses to run rather than silently defaulting.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Milliseconds of slack below which an order counts as urgent.
pub const DEFAULT_URGENCY_THRESHOLD_MS: i64 = 30 * 60 * 1000;

/// Invalid configuration; fatal at engine construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("local search breadth must be at least 1")]
    ZeroLocalSearchBreadth,
    #[error("pod-set sample size must be at least 1")]
    ZeroSampledPodSets,
    #[error("pod scorer chain must not be empty")]
    EmptyPodScorerChain,
    #[error("pod scorer chain lists {0:?} twice")]
    DuplicatePodScorer(PodScorerKind),
    #[error("urgency threshold must not be negative")]
    NegativeUrgencyThreshold,
    #[error("objective weight {0} must be positive and finite")]
    InvalidWeight(&'static str),
}

/// Tie-break policy for order selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderTieBreaker {
    /// Random draw from the strategy's seeded generator.
    Random,
    /// Earliest due time first.
    #[default]
    EarliestDueTime,
    /// First come, first served (earliest placement).
    Fcfs,
}

/// Scoring function kinds for pod/robot pairing selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PodScorerKind {
    /// Backlog demand covered by the pod's stock (more is better).
    Demand,
    /// Orders completable once the pod is inbound, traded off against
    /// travel distance.
    Completable,
    /// Due-time-weighted priority of the completable orders.
    WorkAmount,
}

/// Configuration of the greedy two-phase heuristic strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    /// Whether urgent orders get a dedicated assignment pass.
    pub fast_lane: bool,
    /// Tie-break for normal order selection.
    pub tie_breaker: OrderTieBreaker,
    /// Tie-break for fast-lane order selection.
    pub fast_lane_tie_breaker: OrderTieBreaker,
    /// Prefer overdue orders ahead of the pod-match scorer.
    pub late_before_match: bool,
    /// Orders explored per local search before giving up on a station.
    pub local_search_breadth: usize,
    /// Candidate pod sets sampled per local-search order.
    pub max_sampled_pod_sets: usize,
    /// Slack below which an order is urgent (ms).
    pub urgency_threshold_ms: i64,
    /// Pod/robot pairing scorer chain, evaluated lexicographically.
    pub pod_scorers: Vec<PodScorerKind>,
    /// Seed for the random tie-breaker and pod-set sampling.
    pub seed: u64,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            fast_lane: true,
            tie_breaker: OrderTieBreaker::default(),
            fast_lane_tie_breaker: OrderTieBreaker::default(),
            late_before_match: false,
            local_search_breadth: 3,
            max_sampled_pod_sets: 10,
            urgency_threshold_ms: DEFAULT_URGENCY_THRESHOLD_MS,
            pod_scorers: vec![
                PodScorerKind::Demand,
                PodScorerKind::Completable,
                PodScorerKind::WorkAmount,
            ],
            seed: 0,
        }
    }
}

impl HeuristicConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.local_search_breadth == 0 {
            return Err(ConfigError::ZeroLocalSearchBreadth);
        }
        if self.max_sampled_pod_sets == 0 {
            return Err(ConfigError::ZeroSampledPodSets);
        }
        if self.pod_scorers.is_empty() {
            return Err(ConfigError::EmptyPodScorerChain);
        }
        for (i, kind) in self.pod_scorers.iter().enumerate() {
            if self.pod_scorers[..i].contains(kind) {
                return Err(ConfigError::DuplicatePodScorer(*kind));
            }
        }
        if self.urgency_threshold_ms < 0 {
            return Err(ConfigError::NegativeUrgencyThreshold);
        }
        Ok(())
    }
}

/// Configuration of the MILP strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MilpConfig {
    /// Slack below which an order is urgent (ms).
    pub urgency_threshold_ms: i64,
    /// Weight of pod and robot travel distance in the objective.
    pub weight_travel: f64,
    /// Weight of each assigned order (rewarded, i.e. subtracted).
    pub weight_throughput: f64,
    /// Penalty per unused station slot.
    pub weight_idle_slack: f64,
}

impl Default for MilpConfig {
    fn default() -> Self {
        Self {
            urgency_threshold_ms: DEFAULT_URGENCY_THRESHOLD_MS,
            weight_travel: 1.0,
            weight_throughput: 1.0,
            weight_idle_slack: 10_000.0,
        }
    }
}

impl MilpConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.urgency_threshold_ms < 0 {
            return Err(ConfigError::NegativeUrgencyThreshold);
        }
        for (name, w) in [
            ("weight_travel", self.weight_travel),
            ("weight_throughput", self.weight_throughput),
            ("weight_idle_slack", self.weight_idle_slack),
        ] {
            if !w.is_finite() || w <= 0.0 {
                return Err(ConfigError::InvalidWeight(name));
            }
        }
        Ok(())
    }
}

/// Strategy selection plus strategy-specific settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum StrategyConfig {
    /// Greedy two-phase heuristic (POA/PPS).
    Heuristic(HeuristicConfig),
    /// Global mixed-integer program per decision cycle.
    Milp(MilpConfig),
}

impl StrategyConfig {
    /// Checks all settings; any violation is fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            StrategyConfig::Heuristic(c) => c.validate(),
            StrategyConfig::Milp(c) => c.validate(),
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::Heuristic(HeuristicConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(StrategyConfig::default().validate().is_ok());
        assert!(StrategyConfig::Milp(MilpConfig::default()).validate().is_ok());
    }

    #[test]
    fn test_zero_breadth_rejected() {
        let config = HeuristicConfig {
            local_search_breadth: 0,
            ..HeuristicConfig::default()
        };
        assert_eq!(
            StrategyConfig::Heuristic(config).validate(),
            Err(ConfigError::ZeroLocalSearchBreadth)
        );
    }

    #[test]
    fn test_duplicate_scorer_rejected() {
        let config = HeuristicConfig {
            pod_scorers: vec![PodScorerKind::Demand, PodScorerKind::Demand],
            ..HeuristicConfig::default()
        };
        assert_eq!(
            StrategyConfig::Heuristic(config).validate(),
            Err(ConfigError::DuplicatePodScorer(PodScorerKind::Demand))
        );
    }

    #[test]
    fn test_nonpositive_weight_rejected() {
        let config = MilpConfig {
            weight_idle_slack: 0.0,
            ..MilpConfig::default()
        };
        assert_eq!(
            StrategyConfig::Milp(config).validate(),
            Err(ConfigError::InvalidWeight("weight_idle_slack"))
        );
    }

    #[test]
    fn test_unknown_tie_breaker_fails_deserialization() {
        let err = serde_json::from_str::<OrderTieBreaker>("\"newest-first\"");
        assert!(err.is_err());
    }

    #[test]
    fn test_tagged_round_trip() {
        let config = StrategyConfig::Heuristic(HeuristicConfig {
            tie_breaker: OrderTieBreaker::Fcfs,
            ..HeuristicConfig::default()
        });
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"strategy\":\"heuristic\""));
        let back: StrategyConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
