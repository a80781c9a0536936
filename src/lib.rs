pub use arrival::{ArrivalTracker, LaneExtremes, LaneState};
pub use config::{
    Config, ConfigError, FuzzyConfig, GreenPhase, IntersectionConfig, RuleConfig, SetConfig,
    VariableConfig,
};
pub use controller::{Controller, Mode};
pub use fuzzy::{FuzzyEngine, FuzzyRule, FuzzyVariable, InferenceUndefined, MembershipFunction};
pub use policy::{GreenDecision, GreenPolicy, Timing};
pub use scheduler::{ControlError, Scheduler};
pub use simulation::{Simulation, SimulationError};
pub use telemetry::{
    CsvTelemetry, MemoryTelemetry, NullTelemetry, PhaseRecord, QueueRecord, Telemetry,
};
pub use util::Interval;
use slotmap::{new_key_type, SlotMap};

mod arrival;
mod config;
mod controller;
mod fuzzy;
mod policy;
mod scheduler;
mod simulation;
mod telemetry;
mod util;

new_key_type! {
    /// Unique ID of a [Controller] within a [Scheduler].
    pub struct ControllerId;
}

type ControllerSet = SlotMap<ControllerId, Controller>;
