use crate::arrival::ArrivalTracker;
use crate::config::{ConfigError, IntersectionConfig};
use crate::policy::GreenPolicy;
use crate::simulation::{Simulation, SimulationError};
use crate::telemetry::PhaseRecord;
use smallvec::SmallVec;
use std::collections::HashMap;

/// The display mode of an intersection's signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Green,
    Yellow,
}

/// The phase state machine of a single intersection.
///
/// The cycle is fixed: every green phase is followed by its companion
/// yellow at the next phase index, and yellow expiry advances to the next
/// phase in the table. Only the green duration is adaptive; there is no
/// phase skipping or demand-actuated phase selection.
#[derive(Clone, Debug)]
pub struct Controller {
    /// The intersection this controller drives.
    id: String,
    /// The number of phases in the intersection's signal program.
    phase_count: usize,
    /// The lane group served by each green phase.
    lane_groups: HashMap<usize, SmallVec<[String; 4]>>,
    /// The current display mode.
    mode: Mode,
    /// The current phase index.
    phase: usize,
    /// The remaining ticks before the next transition.
    ticks_remaining: u32,
    /// The green duration assigned at the last green transition.
    assigned_green: u32,
}

impl Controller {
    /// Creates a controller in its initial state: green at the start
    /// phase with an expired timer, so the first tick transitions
    /// immediately.
    pub fn new(config: &IntersectionConfig) -> Result<Self, ConfigError> {
        // An even phase count with even green phases keeps the
        // alternating cycle in range: every green phase has its
        // companion yellow at `phase + 1`.
        if config.phase_count < 2 || config.phase_count % 2 != 0 {
            return Err(ConfigError::BadPhaseCount {
                intersection: config.id.clone(),
                count: config.phase_count,
            });
        }
        if config.start_phase >= config.phase_count || config.start_phase % 2 != 0 {
            return Err(ConfigError::BadStartPhase {
                intersection: config.id.clone(),
                phase: config.start_phase,
            });
        }
        let mut lane_groups = HashMap::new();
        for green in &config.green_phases {
            if green.phase >= config.phase_count || green.phase % 2 != 0 {
                return Err(ConfigError::BadGreenPhase {
                    intersection: config.id.clone(),
                    phase: green.phase,
                });
            }
            lane_groups.insert(green.phase, green.lanes.iter().cloned().collect());
        }
        Ok(Self {
            id: config.id.clone(),
            phase_count: config.phase_count,
            lane_groups,
            mode: Mode::Green,
            phase: config.start_phase,
            ticks_remaining: 0,
            assigned_green: 0,
        })
    }

    /// Gets the intersection ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Gets the current display mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Gets the current phase index.
    pub fn phase(&self) -> usize {
        self.phase
    }

    /// Gets the remaining ticks before the next transition.
    pub fn ticks_remaining(&self) -> u32 {
        self.ticks_remaining
    }

    /// Gets the green duration assigned at the last green transition.
    pub fn assigned_green(&self) -> u32 {
        self.assigned_green
    }

    /// Gets the lane group served by a phase. Phases without a
    /// configured group serve no lanes.
    pub fn lane_group(&self, phase: usize) -> &[String] {
        self.lane_groups
            .get(&phase)
            .map(|group| group.as_slice())
            .unwrap_or(&[])
    }

    /// The lanes whose arrival state the next tick's green decision will
    /// read, if that tick transitions to a green phase.
    pub fn pending_green_lanes(&self) -> Option<&[String]> {
        match (self.mode, self.ticks_remaining) {
            (Mode::Yellow, 0) => Some(self.lane_group(self.next_phase())),
            _ => None,
        }
    }

    /// Advances the controller by one tick.
    ///
    /// Returns the telemetry record when the tick assigned a new green
    /// phase. The tracker must already hold this tick's snapshot for the
    /// pending lanes; the scheduler arranges that each lane is sampled
    /// at most once per tick even when intersections share lanes.
    pub(crate) fn tick<S: Simulation>(
        &mut self,
        sim: &mut S,
        tracker: &ArrivalTracker,
        policy: &GreenPolicy,
    ) -> Result<Option<PhaseRecord>, SimulationError> {
        if self.ticks_remaining > 0 {
            self.ticks_remaining -= 1;
            return Ok(None);
        }

        match self.mode {
            Mode::Green => {
                // The companion yellow phase directly follows each green
                let next = self.phase + 1;
                sim.set_phase(&self.id, next)?;
                self.mode = Mode::Yellow;
                self.phase = next;
                self.ticks_remaining = policy.timing().yellow;
                Ok(None)
            }
            Mode::Yellow => {
                let next = self.next_phase();
                let decision = policy.compute_green(self.lane_group(next), tracker);
                sim.set_phase(&self.id, next)?;
                self.mode = Mode::Green;
                self.phase = next;
                self.ticks_remaining = decision.green;
                self.assigned_green = decision.green;
                Ok(Some(PhaseRecord {
                    time: sim.current_time(),
                    intersection: self.id.clone(),
                    phase: next,
                    vehicles: decision.vehicles,
                    green: decision.green,
                }))
            }
        }
    }

    /// The phase following the current one in the cycle.
    fn next_phase(&self) -> usize {
        (self.phase + 1) % self.phase_count
    }
}
