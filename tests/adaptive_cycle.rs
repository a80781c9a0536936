//! Tests that drive the full control loop against a scripted simulation.

use signal_fuzz::{
    Config, FuzzyConfig, GreenPhase, IntersectionConfig, Interval, MemoryTelemetry, Mode,
    RuleConfig, Scheduler, SetConfig, Simulation, SimulationError, Timing, VariableConfig,
};
use std::collections::{HashMap, HashSet};

/// A scripted simulation whose lane contents the test mutates directly.
struct MockSim {
    time: f64,
    step: f64,
    lanes: HashMap<String, HashSet<String>>,
    phases: HashMap<String, usize>,
}

impl MockSim {
    fn new(step: f64) -> Self {
        Self {
            time: 0.0,
            step,
            lanes: HashMap::new(),
            phases: HashMap::new(),
        }
    }

    fn put_vehicles(&mut self, lane: &str, vehicles: &[&str]) {
        self.lanes.insert(
            lane.to_owned(),
            vehicles.iter().map(|v| v.to_string()).collect(),
        );
    }
}

impl Simulation for MockSim {
    fn current_time(&self) -> f64 {
        self.time
    }

    fn current_phase(&self, intersection: &str) -> Option<usize> {
        self.phases.get(intersection).copied()
    }

    fn set_phase(&mut self, intersection: &str, phase: usize) -> Result<(), SimulationError> {
        self.phases.insert(intersection.to_owned(), phase);
        Ok(())
    }

    fn vehicles_on_lane(&self, lane: &str) -> Option<HashSet<String>> {
        self.lanes.get(lane).cloned()
    }

    fn vehicle_speed(&self, _vehicle: &str) -> Option<f64> {
        Some(3.0)
    }

    fn more_activity_expected(&self) -> bool {
        true
    }

    fn advance_step(&mut self) {
        self.time += self.step;
    }
}

fn variable(range: Interval<f64>, step: f64, sets: &[(&str, &[f64])]) -> VariableConfig {
    VariableConfig {
        range,
        step,
        sets: sets
            .iter()
            .map(|(label, points)| SetConfig {
                label: label.to_string(),
                points: points.to_vec(),
            })
            .collect(),
    }
}

/// The five-by-six reference tables over a 15..21 tick green window.
fn reference_fuzzy() -> FuzzyConfig {
    let vehicles = variable(
        Interval::new(0.0, 8.0),
        0.1,
        &[
            ("very few", &[0.0, 0.0, 1.0, 2.0]),
            ("few", &[1.0, 2.5, 4.0]),
            ("normal", &[3.0, 4.5, 6.0]),
            ("moderate", &[4.5, 6.5, 7.5]),
            ("many", &[6.5, 7.5, 8.0, 8.0]),
        ],
    );
    let arrival = variable(
        Interval::new(0.0, 0.6),
        0.01,
        &[
            ("very slow", &[0.0, 0.0, 0.03, 0.05]),
            ("slow", &[0.03, 0.06, 0.09]),
            ("medium", &[0.08, 0.12, 0.16]),
            ("moderate", &[0.15, 0.2, 0.25]),
            ("high", &[0.23, 0.3, 0.37]),
            ("very high", &[0.35, 0.45, 0.6, 0.6]),
        ],
    );
    let green = variable(
        Interval::new(15.0, 21.0),
        0.1,
        &[
            ("very short", &[15.0, 15.0, 15.5, 16.0]),
            ("short", &[15.5, 16.5, 17.0]),
            ("normal", &[16.5, 17.5, 18.5]),
            ("long", &[18.0, 19.0, 20.0]),
            ("very long", &[19.5, 20.5, 21.0, 21.0]),
        ],
    );
    let table = [
        ("very few", ["very short", "very short", "short", "short", "normal", "normal"]),
        ("few", ["very short", "short", "short", "normal", "normal", "long"]),
        ("normal", ["short", "short", "normal", "normal", "long", "long"]),
        ("moderate", ["normal", "normal", "long", "long", "very long", "very long"]),
        ("many", ["long", "long", "very long", "very long", "very long", "very long"]),
    ];
    let arrivals = ["very slow", "slow", "medium", "moderate", "high", "very high"];
    let mut rules = vec![];
    for (vehicles, outcomes) in table {
        for (arrival, green) in arrivals.into_iter().zip(outcomes) {
            rules.push(RuleConfig {
                vehicles: vehicles.to_string(),
                arrival: arrival.to_string(),
                green: green.to_string(),
            });
        }
    }
    FuzzyConfig {
        vehicles,
        arrival,
        green,
        rules,
    }
}

fn single_intersection_config() -> Config {
    Config {
        intersections: vec![IntersectionConfig {
            id: "junction_a".to_owned(),
            phase_count: 2,
            start_phase: 0,
            green_phases: vec![GreenPhase {
                phase: 0,
                lanes: vec!["main_0".to_owned()],
            }],
        }],
        fuzzy: reference_fuzzy(),
        timing: Timing {
            min_green: 15,
            max_green: 21,
            yellow: 3,
            trivial_threshold: 3,
            fallback: 30,
        },
    }
}

/// The configuration survives a serialize/parse round trip and still
/// builds a scheduler.
#[test]
fn config_round_trips_through_json() {
    let config = single_intersection_config();
    let json = serde_json::to_string(&config).unwrap();
    let parsed = Config::from_json(&json).unwrap();
    assert!(Scheduler::new(&parsed).is_ok());
}

/// Drives a full green/yellow/green cycle and checks every transition,
/// the queue sampling discipline, and the adaptive decision itself
/// against hand-computed values.
#[test]
fn adaptive_cycle_assigns_the_expected_greens() {
    let config = single_intersection_config();
    let mut scheduler = Scheduler::new(&config).unwrap();
    let mut telemetry = MemoryTelemetry::new();
    // 1.25 time units per step, so the 20 steps between the two green
    // decisions span 25 time units
    let mut sim = MockSim::new(1.25);
    sim.put_vehicles("main_0", &["a", "b"]);

    // Tick 0: the initial green has an expired timer, so the controller
    // immediately flips to the companion yellow
    scheduler.tick(&mut sim, &mut telemetry).unwrap();
    sim.advance_step();
    {
        let (_, controller) = scheduler.iter_controllers().next().unwrap();
        assert_eq!(controller.mode(), Mode::Yellow);
        assert_eq!(controller.phase(), 1);
        assert_eq!(controller.ticks_remaining(), 3);
        assert_eq!(sim.current_phase("junction_a"), Some(1));
    }

    // Ticks 1..=3: the yellow counts down
    for expected in [2, 1, 0] {
        scheduler.tick(&mut sim, &mut telemetry).unwrap();
        sim.advance_step();
        let (_, controller) = scheduler.iter_controllers().next().unwrap();
        assert_eq!(controller.mode(), Mode::Yellow);
        assert_eq!(controller.ticks_remaining(), expected);
    }
    assert!(telemetry.phases.is_empty());

    // Tick 4 (time 5.0): first decision. Two queued vehicles are at the
    // trivial threshold, so the minimum green is assigned without
    // consulting the engine.
    scheduler.tick(&mut sim, &mut telemetry).unwrap();
    sim.advance_step();
    {
        let (_, controller) = scheduler.iter_controllers().next().unwrap();
        assert_eq!(controller.mode(), Mode::Green);
        assert_eq!(controller.phase(), 0);
        assert_eq!(controller.ticks_remaining(), 15);
        assert_eq!(controller.assigned_green(), 15);
        assert_eq!(sim.current_phase("junction_a"), Some(0));
    }
    assert_eq!(telemetry.phases.len(), 1);
    assert_eq!(telemetry.phases[0].time, 5.0);
    assert_eq!(telemetry.phases[0].phase, 0);
    assert_eq!(telemetry.phases[0].vehicles, 2);
    assert_eq!(telemetry.phases[0].green, 15);
    // The lane was sampled exactly once for the decision
    assert_eq!(telemetry.queues.len(), 1);
    assert_eq!(telemetry.queues[0].vehicles, 2);

    // Ticks 5..=19 count the green down, tick 20 flips to yellow,
    // ticks 21..=23 count the yellow down
    for _ in 5..=23 {
        scheduler.tick(&mut sim, &mut telemetry).unwrap();
        sim.advance_step();
    }
    {
        let (_, controller) = scheduler.iter_controllers().next().unwrap();
        assert_eq!(controller.mode(), Mode::Yellow);
        assert_eq!(controller.ticks_remaining(), 0);
    }

    // Three vehicles arrived during the cycle. At tick 24 (time 30.0)
    // the sampled snapshot holds 5 vehicles of which 3 are new over the
    // 25 time units since the last sample: rate 0.12. The reference
    // tables defuzzify that cell to 17.98, truncated to 17.
    sim.put_vehicles("main_0", &["a", "b", "c", "d", "e"]);
    scheduler.tick(&mut sim, &mut telemetry).unwrap();
    sim.advance_step();
    {
        let (_, controller) = scheduler.iter_controllers().next().unwrap();
        assert_eq!(controller.mode(), Mode::Green);
        assert_eq!(controller.phase(), 0);
        assert_eq!(controller.ticks_remaining(), 17);
        assert_eq!(controller.assigned_green(), 17);
    }
    assert_eq!(telemetry.phases.len(), 2);
    assert_eq!(telemetry.phases[1].time, 30.0);
    assert_eq!(telemetry.phases[1].vehicles, 5);
    assert_eq!(telemetry.phases[1].green, 17);
    assert_eq!(telemetry.queues.len(), 2);
}

/// Two intersections sharing no lanes run their cycles independently:
/// each keeps its own countdown and receives its own decision.
#[test]
fn intersections_cycle_independently() {
    let mut config = single_intersection_config();
    config.intersections.push(IntersectionConfig {
        id: "junction_b".to_owned(),
        phase_count: 4,
        start_phase: 2,
        green_phases: vec![GreenPhase {
            phase: 2,
            lanes: vec!["side_0".to_owned()],
        }],
    });
    let mut scheduler = Scheduler::new(&config).unwrap();
    let mut telemetry = MemoryTelemetry::new();
    let mut sim = MockSim::new(1.0);
    sim.put_vehicles("main_0", &["a", "b", "c", "d", "e", "f"]);
    sim.put_vehicles("side_0", &[]);

    for _ in 0..200 {
        scheduler.tick(&mut sim, &mut telemetry).unwrap();
        sim.advance_step();
    }

    // junction_b cycles 2 -> 3 -> 0 -> 1 -> 2; its greens alternate
    // between phases 0 (unconfigured, trivial minimum) and 2
    let b_phases: Vec<usize> = telemetry
        .phases
        .iter()
        .filter(|record| record.intersection == "junction_b")
        .map(|record| record.phase)
        .collect();
    assert!(b_phases.len() >= 4);
    for pair in b_phases.windows(2) {
        assert_ne!(pair[0], pair[1]);
        assert!(pair.iter().all(|phase| phase % 2 == 0));
    }

    // junction_a saw its queue, junction_b never did
    let a_max = telemetry
        .phases
        .iter()
        .filter(|record| record.intersection == "junction_a")
        .map(|record| record.vehicles)
        .max()
        .unwrap();
    assert_eq!(a_max, 6);
    assert!(telemetry
        .phases
        .iter()
        .filter(|record| record.intersection == "junction_b")
        .all(|record| record.vehicles == 0));
}
