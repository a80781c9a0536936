use crate::arrival::ArrivalTracker;
use crate::config::{Config, ConfigError};
use crate::controller::Controller;
use crate::policy::GreenPolicy;
use crate::simulation::{Simulation, SimulationError};
use crate::telemetry::{QueueRecord, Telemetry};
use crate::{ControllerId, ControllerSet};
use itertools::Itertools;
use std::collections::HashSet;

/// An error that aborts a control run.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error("telemetry write failed: {0}")]
    Telemetry(#[from] std::io::Error),
}

/// Drives the phase controllers of all configured intersections in
/// lockstep with the external simulation.
///
/// Controllers are independent state machines; the scheduler's only
/// cross-intersection concern is lane sampling: a lane referenced by
/// several controllers' pending decisions is still sampled exactly once
/// per tick, so its arrival estimate is neither double-counted nor stale.
pub struct Scheduler {
    /// The intersection controllers.
    controllers: ControllerSet,
    /// The shared per-lane arrival state.
    tracker: ArrivalTracker,
    /// The green-duration policy.
    policy: GreenPolicy,
}

impl Scheduler {
    /// Creates a scheduler from a validated configuration.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate_timing()?;
        let engine = config.build_engine()?;
        let policy = GreenPolicy::new(engine, config.timing);
        let mut controllers = ControllerSet::default();
        for intersection in &config.intersections {
            controllers.insert(Controller::new(intersection)?);
        }
        Ok(Self {
            controllers,
            tracker: ArrivalTracker::new(),
            policy,
        })
    }

    /// Returns an iterator over all the controllers.
    pub fn iter_controllers(&self) -> impl Iterator<Item = (ControllerId, &Controller)> {
        self.controllers.iter()
    }

    /// Gets a reference to the controller with the given ID.
    pub fn get_controller(&self, id: ControllerId) -> &Controller {
        &self.controllers[id]
    }

    /// Gets the shared arrival tracker.
    pub fn tracker(&self) -> &ArrivalTracker {
        &self.tracker
    }

    /// Processes one simulation tick: samples the lanes feeding this
    /// tick's green decisions, then advances every controller.
    pub fn tick<S: Simulation>(
        &mut self,
        sim: &mut S,
        telemetry: &mut dyn Telemetry,
    ) -> Result<(), ControlError> {
        let now = sim.current_time();

        // Sample each pending lane once, even when several controllers
        // are about to read it
        let pending: Vec<String> = self
            .controllers
            .values()
            .filter_map(Controller::pending_green_lanes)
            .flat_map(|lanes| lanes.iter())
            .unique()
            .cloned()
            .collect();
        for lane in &pending {
            let vehicles = match sim.vehicles_on_lane(lane) {
                Some(vehicles) => vehicles,
                None => {
                    log::warn!("lane {lane} is unknown to the simulation; assuming empty");
                    HashSet::new()
                }
            };
            self.tracker
                .update(lane, vehicles, |vehicle| sim.vehicle_speed(vehicle), now);
            telemetry.queue_sample(&QueueRecord {
                time: now,
                lane: lane.clone(),
                vehicles: self.tracker.occupancy(lane),
            })?;
        }

        for controller in self.controllers.values_mut() {
            if let Some(record) = controller.tick(sim, &self.tracker, &self.policy)? {
                telemetry.phase_change(&record)?;
            }
        }
        Ok(())
    }

    /// Runs the control loop until the simulation reports no further
    /// expected activity, then flushes the telemetry sink.
    pub fn run<S: Simulation>(
        &mut self,
        sim: &mut S,
        telemetry: &mut dyn Telemetry,
    ) -> Result<(), ControlError> {
        while sim.more_activity_expected() {
            self.tick(sim, telemetry)?;
            sim.advance_step();
        }
        telemetry.flush()?;
        Ok(())
    }
}
