use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Poisson;
use signal_fuzz::{Config, CsvTelemetry, Scheduler, Simulation, SimulationError};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;

/// The bundled demo network and fuzzy tables.
static DEFAULT_CONFIG: Lazy<Config> = Lazy::new(|| {
    Config::from_json(include_str!("../demos/network.json")).expect("demo configuration is valid")
});

/// How many vehicles a green lane discharges per step.
const DISCHARGE_PER_STEP: usize = 2;

/// A toy traffic simulation: per-lane Poisson arrivals, and lanes served
/// by a currently green phase discharge a fixed number of vehicles per
/// step. Stands in for a real microscopic simulator so the demo runs
/// standalone.
struct ToySim {
    time: f64,
    horizon: f64,
    rng: StdRng,
    /// Queued vehicle IDs per lane, oldest first.
    lanes: HashMap<String, Vec<String>>,
    /// Poisson arrival intensity per lane.
    demand: HashMap<String, f64>,
    /// The currently displayed phase per intersection.
    phases: HashMap<String, usize>,
    /// Phase count per intersection.
    phase_counts: HashMap<String, usize>,
    /// Green phase -> lane group, per intersection.
    green_lanes: HashMap<String, Vec<(usize, Vec<String>)>>,
    spawned: usize,
}

impl ToySim {
    fn new(config: &Config, horizon: f64, seed: u64) -> Self {
        let mut lanes = HashMap::new();
        let mut demand = HashMap::new();
        let mut phases = HashMap::new();
        let mut phase_counts = HashMap::new();
        let mut green_lanes = HashMap::new();
        for intersection in &config.intersections {
            phases.insert(intersection.id.clone(), intersection.start_phase);
            phase_counts.insert(intersection.id.clone(), intersection.phase_count);
            let groups: Vec<(usize, Vec<String>)> = intersection
                .green_phases
                .iter()
                .map(|green| (green.phase, green.lanes.clone()))
                .collect();
            for (index, lane) in groups.iter().flat_map(|(_, lanes)| lanes).enumerate() {
                lanes.entry(lane.clone()).or_insert_with(Vec::new);
                let intensity = [0.08, 0.15, 0.25, 0.05][index % 4];
                demand.entry(lane.clone()).or_insert(intensity);
            }
            green_lanes.insert(intersection.id.clone(), groups);
        }
        Self {
            time: 0.0,
            horizon,
            rng: StdRng::seed_from_u64(seed),
            lanes,
            demand,
            phases,
            phase_counts,
            green_lanes,
            spawned: 0,
        }
    }

    /// Whether some intersection is currently showing green for the lane.
    fn is_served(&self, lane: &str) -> bool {
        self.green_lanes.iter().any(|(intersection, groups)| {
            let current = self.phases[intersection];
            groups
                .iter()
                .any(|(phase, lanes)| *phase == current && lanes.iter().any(|l| l == lane))
        })
    }
}

impl Simulation for ToySim {
    fn current_time(&self) -> f64 {
        self.time
    }

    fn current_phase(&self, intersection: &str) -> Option<usize> {
        self.phases.get(intersection).copied()
    }

    fn set_phase(&mut self, intersection: &str, phase: usize) -> Result<(), SimulationError> {
        match self.phase_counts.get(intersection) {
            Some(count) if phase < *count => {
                self.phases.insert(intersection.to_owned(), phase);
                Ok(())
            }
            _ => Err(SimulationError {
                intersection: intersection.to_owned(),
                phase,
                reason: "phase outside the signal program".to_owned(),
            }),
        }
    }

    fn vehicles_on_lane(&self, lane: &str) -> Option<std::collections::HashSet<String>> {
        self.lanes
            .get(lane)
            .map(|queue| queue.iter().cloned().collect())
    }

    fn vehicle_speed(&self, vehicle: &str) -> Option<f64> {
        let lane = vehicle.rsplit_once('#').map(|(lane, _)| lane)?;
        Some(if self.is_served(lane) { 6.5 } else { 0.0 })
    }

    fn more_activity_expected(&self) -> bool {
        self.time < self.horizon
    }

    fn advance_step(&mut self) {
        // Discharge served lanes, then spawn fresh arrivals
        let served: Vec<String> = self
            .lanes
            .keys()
            .filter(|lane| self.is_served(lane))
            .cloned()
            .collect();
        for lane in served {
            let queue = self.lanes.get_mut(&lane).unwrap();
            let keep = queue.len().saturating_sub(DISCHARGE_PER_STEP);
            queue.drain(..queue.len() - keep);
        }
        for (lane, queue) in &mut self.lanes {
            let poisson = Poisson::new(self.demand[lane]).unwrap();
            let arrivals = self.rng.sample(poisson) as usize;
            for _ in 0..arrivals {
                self.spawned += 1;
                queue.push(format!("{lane}#{}", self.spawned));
            }
        }
        self.time += 1.0;
    }
}

fn main() {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path).expect("failed to read configuration");
            Config::from_json(&json).expect("invalid configuration")
        }
        None => DEFAULT_CONFIG.clone(),
    };

    let mut sim = ToySim::new(&config, 3600.0, 7);
    let mut scheduler = Scheduler::new(&config).expect("invalid configuration");
    let queues = BufWriter::new(File::create("queue_samples.csv").unwrap());
    let phases = BufWriter::new(File::create("green_phases.csv").unwrap());
    let mut telemetry = CsvTelemetry::new(queues, phases).unwrap();

    println!("Controlling {} intersections...", config.intersections.len());
    scheduler.run(&mut sim, &mut telemetry).unwrap();

    println!(
        "Done: {} vehicles spawned over {:.0} steps",
        sim.spawned, sim.time
    );
    for (_, controller) in scheduler.iter_controllers() {
        println!(
            "  {} -> phase {} ({:?}), last assigned green {} ticks",
            controller.id(),
            sim.current_phase(controller.id()).unwrap(),
            controller.mode(),
            controller.assigned_green(),
        );
    }
    for (lane, state) in scheduler.tracker().iter_lanes() {
        let extremes = state.extremes();
        println!(
            "  {lane}: queue {:.0}..{:.0}, rate {:.3}..{:.3} veh/s",
            extremes.vehicles.min, extremes.vehicles.max, extremes.rate.min, extremes.rate.max,
        );
    }
}
