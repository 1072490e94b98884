//! CSV execution trace
//!
//! One row per cycle: `cycle,pc,raw,event`.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::SimulatorResult;
use crate::single_cycle::StepOutcome;

pub struct TraceLog {
    writer: csv::Writer<Box<dyn Write + Send>>,
}

impl TraceLog {
    /// Creates the trace file and writes the header row
    pub fn create(path: &Path) -> SimulatorResult<Self> {
        Self::from_writer(Box::new(File::create(path)?))
    }

    pub fn from_writer(inner: Box<dyn Write + Send>) -> SimulatorResult<Self> {
        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(["cycle", "pc", "raw", "event"])?;
        Ok(Self { writer })
    }

    pub fn record(&mut self, cycle: u64, outcome: &StepOutcome) -> SimulatorResult<()> {
        let (pc, raw, event) = match outcome {
            StepOutcome::Retired { pc, raw, inst } => {
                (*pc, format!("{raw:#010x}"), inst.to_string())
            }
            StepOutcome::Trapped { cause, from, .. } => {
                (*from, String::new(), format!("trap cause={}", cause.code()))
            }
        };
        self.writer.write_record([
            cycle.to_string(),
            format!("{pc:#010x}"),
            raw,
            event,
        ])?;
        Ok(())
    }

    pub fn flush(&mut self) -> SimulatorResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}
