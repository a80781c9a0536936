use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// A per-lane queue sample taken when the lane was polled for a
/// green-duration decision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueRecord {
    /// The simulation time of the sample.
    pub time: f64,
    /// The sampled lane.
    pub lane: String,
    /// The number of vehicles queued on the lane.
    pub vehicles: usize,
}

/// The record emitted for every assigned green phase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    /// The simulation time the green phase began.
    pub time: f64,
    /// The intersection whose signal changed.
    pub intersection: String,
    /// The phase index that turned green.
    pub phase: usize,
    /// The number of vehicles counted across the phase's lane group.
    pub vehicles: usize,
    /// The assigned green duration in ticks.
    pub green: u32,
}

/// A sink for controller telemetry.
pub trait Telemetry {
    /// Records a per-lane queue sample.
    fn queue_sample(&mut self, record: &QueueRecord) -> io::Result<()>;

    /// Records an assigned green phase.
    fn phase_change(&mut self, record: &PhaseRecord) -> io::Result<()>;

    /// Flushes any buffered records.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A telemetry sink that discards all records.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullTelemetry;

impl Telemetry for NullTelemetry {
    fn queue_sample(&mut self, _record: &QueueRecord) -> io::Result<()> {
        Ok(())
    }

    fn phase_change(&mut self, _record: &PhaseRecord) -> io::Result<()> {
        Ok(())
    }
}

/// A telemetry sink that keeps all records in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryTelemetry {
    /// The recorded queue samples, in emission order.
    pub queues: Vec<QueueRecord>,
    /// The recorded green assignments, in emission order.
    pub phases: Vec<PhaseRecord>,
}

impl MemoryTelemetry {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Default::default()
    }
}

impl Telemetry for MemoryTelemetry {
    fn queue_sample(&mut self, record: &QueueRecord) -> io::Result<()> {
        self.queues.push(record.clone());
        Ok(())
    }

    fn phase_change(&mut self, record: &PhaseRecord) -> io::Result<()> {
        self.phases.push(record.clone());
        Ok(())
    }
}

/// A telemetry sink writing two CSV streams: queue samples and green
/// assignments.
pub struct CsvTelemetry<Q: Write, P: Write> {
    queues: Q,
    phases: P,
}

impl<Q: Write, P: Write> CsvTelemetry<Q, P> {
    /// Creates the sink and writes the header row to both streams.
    pub fn new(mut queues: Q, mut phases: P) -> io::Result<Self> {
        writeln!(queues, "time,lane_id,queued_vehicles")?;
        writeln!(phases, "time,intersection_id,vehicle_count,phase,green_duration")?;
        Ok(Self { queues, phases })
    }
}

impl<Q: Write, P: Write> Telemetry for CsvTelemetry<Q, P> {
    fn queue_sample(&mut self, record: &QueueRecord) -> io::Result<()> {
        writeln!(
            self.queues,
            "{},{},{}",
            record.time, record.lane, record.vehicles
        )
    }

    fn phase_change(&mut self, record: &PhaseRecord) -> io::Result<()> {
        writeln!(
            self.phases,
            "{},{},{},{},{}",
            record.time, record.intersection, record.vehicles, record.phase, record.green
        )
    }

    fn flush(&mut self) -> io::Result<()> {
        self.queues.flush()?;
        self.phases.flush()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn csv_rows_match_the_record_fields() {
        let mut sink = CsvTelemetry::new(Vec::new(), Vec::new()).unwrap();
        sink.queue_sample(&QueueRecord {
            time: 42.0,
            lane: "north_0".to_owned(),
            vehicles: 4,
        })
        .unwrap();
        sink.phase_change(&PhaseRecord {
            time: 42.0,
            intersection: "junction_a".to_owned(),
            phase: 2,
            vehicles: 7,
            green: 18,
        })
        .unwrap();

        let queues = String::from_utf8(sink.queues).unwrap();
        assert_eq!(queues, "time,lane_id,queued_vehicles\n42,north_0,4\n");
        let phases = String::from_utf8(sink.phases).unwrap();
        assert_eq!(
            phases,
            "time,intersection_id,vehicle_count,phase,green_duration\n42,junction_a,7,2,18\n"
        );
    }
}
