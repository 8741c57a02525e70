//! Per-run effort and duration report.

use serde::{Deserialize, Serialize};

use crate::process::{ProcessKind, ProcessOutcome};

/// Scalar results of one run, one row of `results.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run: usize,
    pub modules: usize,
    pub coupling_degree: f64,
    pub general_changes: usize,
    pub general_effort: f64,
    pub incoming_changes: usize,
    pub incoming_effort: f64,
    pub sp_end_effort: f64,
    pub sp_avg_duration: f64,
    pub ip_end_effort: f64,
    pub ip_avg_duration: f64,
}

impl RunReport {
    /// Fill in the simulator columns from the two outcomes.
    pub fn with_outcomes(mut self, sequential: ProcessOutcome, iterative: ProcessOutcome) -> Self {
        self.sp_end_effort = sequential.final_effort;
        self.sp_avg_duration = sequential.average_duration;
        self.ip_end_effort = iterative.final_effort;
        self.ip_avg_duration = iterative.average_duration;
        self
    }

    pub fn outcome(&self, kind: ProcessKind) -> ProcessOutcome {
        match kind {
            ProcessKind::Sequential => ProcessOutcome {
                kind,
                final_effort: self.sp_end_effort,
                average_duration: self.sp_avg_duration,
            },
            ProcessKind::Iterative => ProcessOutcome {
                kind,
                final_effort: self.ip_end_effort,
                average_duration: self.ip_avg_duration,
            },
        }
    }

    /// Process with the lower end effort, `None` on a tie.
    pub fn winner_by_effort(&self) -> Option<ProcessKind> {
        lower(self.sp_end_effort, self.ip_end_effort)
    }

    /// Process with the shorter average turnaround, `None` on a tie.
    pub fn winner_by_duration(&self) -> Option<ProcessKind> {
        lower(self.sp_avg_duration, self.ip_avg_duration)
    }
}

fn lower(sequential: f64, iterative: f64) -> Option<ProcessKind> {
    match sequential.total_cmp(&iterative) {
        std::cmp::Ordering::Less => Some(ProcessKind::Sequential),
        std::cmp::Ordering::Greater => Some(ProcessKind::Iterative),
        std::cmp::Ordering::Equal => None,
    }
}
