//! Run configuration.

use crate::error::{SimError, SimResult};
use crate::time::SimTime;

/// Knobs for [`Simulation::run`](crate::Simulation::run).
///
/// The default runs until the queue drains or every entity finishes, with
/// no step cap and no in-memory trace.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationConfig {
    /// Stop before dequeuing any event scheduled after this time.
    pub termination_time: Option<SimTime>,
    /// Stop once this many events have been dequeued.
    pub max_steps: Option<u64>,
    /// Keep a [`TraceEntry`](crate::entity::TraceEntry) per dequeued event.
    pub trace: bool,
}

impl SimulationConfig {
    pub fn with_termination_time(mut self, time: SimTime) -> Self {
        self.termination_time = Some(time);
        self
    }

    pub fn with_max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.max_steps == Some(0) {
            return Err(SimError::InvalidConfig(
                "max_steps must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
