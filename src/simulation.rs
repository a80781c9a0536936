use std::collections::HashSet;

/// The query/command surface of the external traffic simulation.
///
/// The controllers never guess at simulation state: phase changes are
/// commands that either take effect or fail the run, and lane occupancy
/// is read as per-step snapshots of vehicle IDs.
pub trait Simulation {
    /// Gets the current simulation time.
    fn current_time(&self) -> f64;

    /// Gets the phase index an intersection's signal is currently showing,
    /// or `None` if the intersection is unknown.
    fn current_phase(&self, intersection: &str) -> Option<usize>;

    /// Commands an intersection's signal to the given phase index.
    fn set_phase(&mut self, intersection: &str, phase: usize) -> Result<(), SimulationError>;

    /// Gets the IDs of the vehicles currently on a lane, or `None` if the
    /// lane is unknown to the simulation.
    fn vehicles_on_lane(&self, lane: &str) -> Option<HashSet<String>>;

    /// Gets a vehicle's current speed.
    fn vehicle_speed(&self, vehicle: &str) -> Option<f64>;

    /// Returns true while the simulation expects further activity.
    fn more_activity_expected(&self) -> bool;

    /// Advances the simulation by one step.
    fn advance_step(&mut self);
}

/// A phase command rejected by the simulation.
///
/// This is fatal: retrying or guessing would let the controller's phase
/// index desynchronize from the actually displayed phase.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("simulation rejected phase {phase} for intersection {intersection}: {reason}")]
pub struct SimulationError {
    /// The intersection the command addressed.
    pub intersection: String,
    /// The rejected phase index.
    pub phase: usize,
    /// The simulation's reason for the rejection.
    pub reason: String,
}
