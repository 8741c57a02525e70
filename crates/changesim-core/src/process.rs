//! Common interface of the change-process simulators.
//!
//! Both the phase-sequential and the sprint-iterative simulator consume the
//! same change demand and expose the same two results: total effort spent and
//! mean turnaround of incoming changes.

use serde::{Deserialize, Serialize};

/// Which change-management process a simulator models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessKind {
    /// Phase-sequential ("waterfall").
    Sequential,
    /// Sprint-iterative ("agile").
    Iterative,
}

impl ProcessKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Iterative => "iterative",
        }
    }
}

impl std::fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Result of one simulator run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub kind: ProcessKind,
    pub final_effort: f64,
    pub average_duration: f64,
}

/// Trait implemented by every process simulator.
///
/// Simulators own deep copies of their input changes and a local clock, so
/// two instances never observe each other's state.
pub trait ChangeProcess {
    fn kind(&self) -> ProcessKind;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Drive the simulation to its terminal state. Calling it again is a no-op.
    fn run(&mut self);

    /// Total effort charged.
    fn final_effort(&self) -> f64;

    /// Mean time from arrival to completion of incoming changes, 0 when none
    /// were completed.
    fn average_implementation_duration(&self) -> f64;

    /// Convenience: run if needed and collect both results.
    fn outcome(&mut self) -> ProcessOutcome {
        self.run();
        ProcessOutcome {
            kind: self.kind(),
            final_effort: self.final_effort(),
            average_duration: self.average_implementation_duration(),
        }
    }
}

/// Arithmetic mean, 0 for an empty input.
///
/// Plain in-order summation rather than `statrs::Statistics::mean`, whose
/// incremental update leaves residue on balanced inputs that should average
/// to an exact value.
pub(crate) fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}
