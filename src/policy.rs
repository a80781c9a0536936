use crate::arrival::ArrivalTracker;
use crate::fuzzy::FuzzyEngine;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Name of the engine input fed with the lane group's vehicle count.
pub const VEHICLES_VAR: &str = "vehicles";

/// Name of the engine input fed with the lane group's mean arrival rate.
pub const ARRIVAL_VAR: &str = "arrival";

/// Name of the engine output holding the green duration.
pub const GREEN_VAR: &str = "green";

/// Timing bounds and thresholds for the green-duration decision.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Timing {
    /// The shortest green duration in ticks, also used for near-empty
    /// lane groups.
    pub min_green: u32,
    /// The longest green duration in ticks.
    pub max_green: u32,
    /// The fixed yellow duration in ticks.
    pub yellow: u32,
    /// Lane groups with at most this many vehicles receive `min_green`
    /// without consulting the engine.
    pub trivial_threshold: usize,
    /// The green duration used when no fuzzy rule fires.
    pub fallback: u32,
}

/// The outcome of a green-duration decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GreenDecision {
    /// The assigned green duration in ticks.
    pub green: u32,
    /// The number of vehicles counted across the lane group.
    pub vehicles: usize,
    /// Whether the fallback duration was used because no rule fired.
    pub fallback: bool,
}

/// Decides green-phase durations for lane groups by fuzzy inference
/// over queue size and arrival rate.
#[derive(Clone, Debug)]
pub struct GreenPolicy {
    /// The inference engine.
    engine: FuzzyEngine,
    /// The timing bounds.
    timing: Timing,
}

impl GreenPolicy {
    /// Creates a policy from an engine and timing bounds.
    pub fn new(engine: FuzzyEngine, timing: Timing) -> Self {
        Self { engine, timing }
    }

    /// Gets the timing bounds.
    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Computes the green duration for a lane group.
    ///
    /// Lane IDs appearing more than once in the group are counted once.
    /// Groups at or below the trivial vehicle threshold receive the
    /// minimum green without invoking the engine. Otherwise the engine's
    /// defuzzified output is truncated and clamped to the configured
    /// green bounds; if no rule fires, the fallback duration is used and
    /// a warning is logged.
    pub fn compute_green(&self, lanes: &[String], tracker: &ArrivalTracker) -> GreenDecision {
        let lanes: Vec<&str> = lanes.iter().map(String::as_str).unique().collect();
        let vehicles: usize = lanes.iter().map(|lane| tracker.occupancy(lane)).sum();

        if vehicles <= self.timing.trivial_threshold {
            return GreenDecision {
                green: self.timing.min_green,
                vehicles,
                fallback: false,
            };
        }

        let rate = tracker.mean_rate(lanes.iter().copied());
        match self.engine.evaluate(&[
            (VEHICLES_VAR, vehicles as f64),
            (ARRIVAL_VAR, rate),
        ]) {
            Ok(value) => GreenDecision {
                green: (value as u32).clamp(self.timing.min_green, self.timing.max_green),
                vehicles,
                fallback: false,
            },
            Err(undefined) => {
                log::warn!(
                    "{undefined} ({vehicles} vehicles, rate {rate:.3}); \
                     assigning fallback green of {} ticks",
                    self.timing.fallback
                );
                GreenDecision {
                    green: self.timing.fallback,
                    vehicles,
                    fallback: true,
                }
            }
        }
    }
}
