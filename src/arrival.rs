use crate::util::Interval;
use itertools::Itertools;
use std::collections::{HashMap, HashSet};

/// Vehicles at or below this speed are classified as stopped, in m/s.
const STOPPED_SPEED: f64 = 0.1;

/// Estimates per-lane vehicle arrival rates from successive
/// presence snapshots.
///
/// The estimator is instantaneous, not windowed: each [update](Self::update)
/// replaces the previous snapshot wholesale and derives the rate from the
/// vehicles that were not present in it. Callers must therefore update a
/// lane exactly once per decision point.
#[derive(Clone, Debug, Default)]
pub struct ArrivalTracker {
    /// The tracked lanes, keyed by lane ID.
    lanes: HashMap<String, LaneState>,
}

/// The rolling observation state of a single lane.
#[derive(Clone, Debug)]
pub struct LaneState {
    /// The vehicles present in the most recent snapshot.
    known_vehicles: HashSet<String>,
    /// The number of vehicles moving faster than the stopped threshold.
    moving: usize,
    /// The number of stopped vehicles.
    stopped: usize,
    /// The mean speed of the moving vehicles, or 0 if none are moving.
    mean_speed: f64,
    /// The number of vehicles that first appeared in the latest snapshot.
    new_arrivals: usize,
    /// The time of the latest snapshot, or `None` before the first one.
    last_update: Option<f64>,
    /// The most recently computed arrival rate in vehicles per time unit.
    rate: f64,
    /// The per-lane extremes observed so far.
    extremes: LaneExtremes,
}

/// Running min/max bounds of a lane's observed metrics.
#[derive(Clone, Debug, PartialEq)]
pub struct LaneExtremes {
    pub vehicles: Interval<f64>,
    pub moving: Interval<f64>,
    pub stopped: Interval<f64>,
    pub mean_speed: Interval<f64>,
    pub rate: Interval<f64>,
}

impl Default for LaneState {
    fn default() -> Self {
        Self {
            known_vehicles: HashSet::new(),
            moving: 0,
            stopped: 0,
            mean_speed: 0.0,
            new_arrivals: 0,
            last_update: None,
            rate: 0.0,
            extremes: LaneExtremes::default(),
        }
    }
}

impl Default for LaneExtremes {
    fn default() -> Self {
        Self {
            vehicles: Interval::empty(),
            moving: Interval::empty(),
            stopped: Interval::empty(),
            mean_speed: Interval::empty(),
            rate: Interval::empty(),
        }
    }
}

impl ArrivalTracker {
    /// Creates a tracker with no lane state.
    pub fn new() -> Self {
        Default::default()
    }

    /// Ingests a fresh presence snapshot for a lane.
    ///
    /// `speed_of` resolves a vehicle's current speed, used to classify
    /// vehicles as moving or stopped; a vehicle with no known speed
    /// counts as stopped. The arrival rate is the number of vehicles not
    /// present in the previous snapshot divided by the elapsed time, or 0
    /// when there is no prior snapshot to compare against.
    pub fn update(
        &mut self,
        lane: &str,
        vehicles: HashSet<String>,
        speed_of: impl Fn(&str) -> Option<f64>,
        now: f64,
    ) {
        let state = self.lanes.entry(lane.to_owned()).or_default();

        let speeds: Vec<f64> = vehicles
            .iter()
            .filter_map(|vehicle| speed_of(vehicle))
            .filter(|speed| *speed > STOPPED_SPEED)
            .collect();
        state.moving = speeds.len();
        state.stopped = vehicles.len() - state.moving;
        state.mean_speed = if speeds.is_empty() {
            0.0
        } else {
            speeds.iter().sum::<f64>() / (speeds.len() as f64)
        };

        state.new_arrivals = vehicles.difference(&state.known_vehicles).count();
        state.rate = match state.last_update {
            Some(last) if now - last > 0.0 => (state.new_arrivals as f64) / (now - last),
            _ => 0.0,
        };
        state.known_vehicles = vehicles;
        state.last_update = Some(now);

        state.extremes.vehicles.expand(state.known_vehicles.len() as f64);
        state.extremes.moving.expand(state.moving as f64);
        state.extremes.stopped.expand(state.stopped as f64);
        state.extremes.mean_speed.expand(state.mean_speed);
        state.extremes.rate.expand(state.rate);
    }

    /// Gets the last computed arrival rate for a lane, or 0 if the lane
    /// has never been sampled.
    pub fn rate(&self, lane: &str) -> f64 {
        self.lanes.get(lane).map(|state| state.rate).unwrap_or(0.0)
    }

    /// Gets the number of vehicles in a lane's latest snapshot, or 0 if
    /// the lane has never been sampled.
    pub fn occupancy(&self, lane: &str) -> usize {
        self.lanes
            .get(lane)
            .map(|state| state.known_vehicles.len())
            .unwrap_or(0)
    }

    /// Gets the full observation state of a lane.
    pub fn state(&self, lane: &str) -> Option<&LaneState> {
        self.lanes.get(lane)
    }

    /// Returns an iterator over all tracked lanes and their state.
    pub fn iter_lanes(&self) -> impl Iterator<Item = (&str, &LaneState)> {
        self.lanes.iter().map(|(lane, state)| (lane.as_str(), state))
    }

    /// Computes the mean arrival rate over a lane group.
    ///
    /// Duplicate lane IDs are counted once; a lane with rate 0 (including
    /// one that has never been sampled) is a valid zero sample, not an
    /// exclusion.
    pub fn mean_rate<'a>(&self, lanes: impl IntoIterator<Item = &'a str>) -> f64 {
        let rates: Vec<f64> = lanes
            .into_iter()
            .unique()
            .map(|lane| self.rate(lane))
            .collect();
        if rates.is_empty() {
            0.0
        } else {
            rates.iter().sum::<f64>() / (rates.len() as f64)
        }
    }
}

impl LaneState {
    /// The number of vehicles moving faster than the stopped threshold.
    pub fn moving(&self) -> usize {
        self.moving
    }

    /// The number of stopped vehicles.
    pub fn stopped(&self) -> usize {
        self.stopped
    }

    /// The mean speed of the moving vehicles.
    pub fn mean_speed(&self) -> f64 {
        self.mean_speed
    }

    /// The number of vehicles that first appeared in the latest snapshot.
    pub fn new_arrivals(&self) -> usize {
        self.new_arrivals
    }

    /// The most recently computed arrival rate.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// The extremes observed on this lane so far.
    pub fn extremes(&self) -> &LaneExtremes {
        &self.extremes
    }
}
