//! Phase-sequential ("waterfall") process simulator.
//!
//! Five phases run in a fixed order, each budgeted as a share of the total
//! planned effort:
//!
//! ```text
//! Requirements 0.2 → Design 0.2 → Implementation 0.3 → Test 0.2 → Release 0.1
//! ```
//!
//! Incoming changes are absorbed at phase boundaries once their arrival time
//! has passed. Absorption inflates a change by a rework factor that grows the
//! later in the schedule it arrives, charges 70% of it immediately and defers
//! 20% into Test and 10% into Release. A change that cannot be finished before
//! testing was due pushes the Test start out; when that happens after Test has
//! already run, Test is re-opened and run again together with Release.

use log::{debug, info};
use serde::Serialize;

use crate::change::Change;
use crate::error::{Result, SimError};
use crate::process::{ChangeProcess, ProcessKind, mean};

/// Share of absorbed (inflated) change effort charged immediately.
const IMPLEMENTATION_SHARE: f64 = 0.7;
/// Share deferred into the Test budget.
const TEST_SHARE: f64 = 0.2;
/// Share deferred into the Release budget.
const RELEASE_SHARE: f64 = 0.1;

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Requirements,
    Design,
    Implementation,
    Test,
    Release,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Self::Requirements,
        Self::Design,
        Self::Implementation,
        Self::Test,
        Self::Release,
    ];

    /// Fraction of the planned effort budgeted for this phase.
    pub fn share(self) -> f64 {
        match self {
            Self::Requirements => 0.2,
            Self::Design => 0.2,
            Self::Implementation => 0.3,
            Self::Test => 0.2,
            Self::Release => 0.1,
        }
    }

    /// Rework added on top of a change arriving during this phase.
    pub fn rework_factor(self) -> f64 {
        match self {
            Self::Requirements => 0.1,
            Self::Design => 0.2,
            Self::Implementation => 0.4,
            Self::Test | Self::Release => 0.7,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requirements => write!(f, "requirements"),
            Self::Design => write!(f, "design"),
            Self::Implementation => write!(f, "implementation"),
            Self::Test => write!(f, "test"),
            Self::Release => write!(f, "release"),
        }
    }
}

/// One executed phase (or re-run) in the trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseRecord {
    pub phase: Phase,
    /// Clock when the phase was entered, before any wait for a delayed Test start.
    pub start: f64,
    pub end: f64,
    /// Effort charged for the phase budget itself (absorbed changes excluded).
    pub effort: f64,
    /// Changes absorbed while in this phase.
    pub absorbed: Vec<u32>,
    /// True when this entry re-runs Test and Release after a late push.
    pub rerun: bool,
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Waterfall simulator over a fixed phase schedule.
#[derive(Debug, Clone)]
pub struct SequentialProcess {
    /// Current budget per phase; Test and Release grow as changes are absorbed.
    budgets: [f64; 5],
    /// Cumulative ends of Requirements, Design and Implementation.
    windows: [f64; 3],
    test_start: f64,
    clock: f64,
    final_effort: f64,
    incoming: Vec<Change>,
    pending: Vec<Change>,
    trace: Vec<PhaseRecord>,
    finished: bool,
}

impl SequentialProcess {
    /// Build a simulator for `general_effort` of planned work. `incoming` is
    /// copied; the caller's list is never touched.
    pub fn new(general_effort: f64, incoming: &[Change]) -> Result<Self> {
        if !general_effort.is_finite() || general_effort < 0.0 {
            return Err(SimError::invalid(format!(
                "general effort must be a non-negative number, got {general_effort}"
            )));
        }
        let budgets = Phase::ALL.map(|p| general_effort * p.share());
        let design_end = budgets[0] + budgets[1];
        let test_start = design_end + budgets[2];
        Ok(Self {
            budgets,
            windows: [budgets[0], design_end, test_start],
            test_start,
            clock: 0.0,
            final_effort: 0.0,
            incoming: incoming.to_vec(),
            pending: incoming.to_vec(),
            trace: Vec::with_capacity(Phase::ALL.len()),
            finished: false,
        })
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Current (possibly pushed) Test start.
    pub fn test_start(&self) -> f64 {
        self.test_start
    }

    pub fn budget(&self, phase: Phase) -> f64 {
        self.budgets[phase.index()]
    }

    pub fn trace(&self) -> &[PhaseRecord] {
        &self.trace
    }

    /// Changes not absorbed yet.
    pub fn pending(&self) -> &[Change] {
        &self.pending
    }

    /// Phase window an arrival time falls into. Window ends are exclusive, so
    /// a boundary arrival belongs to the later phase.
    pub fn window_of(&self, arrival: f64) -> Phase {
        if arrival < self.windows[0] {
            Phase::Requirements
        } else if arrival < self.windows[1] {
            Phase::Design
        } else if arrival < self.windows[2] {
            Phase::Implementation
        } else {
            Phase::Test
        }
    }

    fn run_schedule(&mut self) {
        for phase in [Phase::Requirements, Phase::Design, Phase::Implementation] {
            let start = self.clock;
            let effort = self.charge(phase);
            let absorbed = self.absorb_eligible();
            self.record(phase, start, effort, absorbed, false);
        }

        // Test waits for every change that was due before it.
        let start = self.clock;
        let mut absorbed = self.wait_for_test_start();
        let effort = self.charge(Phase::Test);
        absorbed.extend(self.absorb_eligible());
        self.record(Phase::Test, start, effort, absorbed, false);

        let start = self.clock;
        if self.test_start > self.clock {
            let absorbed = self.wait_for_test_start();
            self.retest(start, absorbed);
        } else {
            let effort = self.charge(Phase::Release);
            self.record(Phase::Release, start, effort, Vec::new(), false);
        }

        // Anything still pending arrived after Test; it has to be tested and
        // released again.
        while !self.pending.is_empty() {
            let start = self.clock;
            if !self.pending.iter().any(|c| c.arrival <= self.clock) {
                let next = self
                    .pending
                    .iter()
                    .map(|c| c.arrival)
                    .fold(f64::INFINITY, f64::min);
                self.clock = next;
            }
            let mut absorbed = self.absorb_eligible();
            absorbed.extend(self.wait_for_test_start());
            self.retest(start, absorbed);
        }
    }

    fn charge(&mut self, phase: Phase) -> f64 {
        let effort = self.budgets[phase.index()];
        self.final_effort += effort;
        self.clock += effort;
        effort
    }

    /// Re-run Test and Release with their grown budgets.
    fn retest(&mut self, start: f64, absorbed: Vec<u32>) {
        let effort = self.charge(Phase::Test) + self.charge(Phase::Release);
        debug!(
            "test re-opened at {:.1}, re-run effort {:.1}",
            self.clock - effort,
            effort
        );
        self.record(Phase::Release, start, effort, absorbed, true);
    }

    /// Snap the clock forward while absorption keeps pushing Test out.
    fn wait_for_test_start(&mut self) -> Vec<u32> {
        let mut absorbed = Vec::new();
        while self.test_start > self.clock {
            self.clock = self.test_start;
            absorbed.extend(self.absorb_eligible());
        }
        absorbed
    }

    /// Absorb every pending change whose arrival is at or before the clock.
    fn absorb_eligible(&mut self) -> Vec<u32> {
        let clock = self.clock;
        let (eligible, pending): (Vec<Change>, Vec<Change>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|c| c.arrival <= clock);
        self.pending = pending;

        let mut ids = Vec::with_capacity(eligible.len());
        for change in eligible {
            let window = self.window_of(change.arrival);
            let inflated = change.effort * (1.0 + window.rework_factor());
            let implementation = inflated * IMPLEMENTATION_SHARE;

            let ready_at = change.arrival + implementation;
            if ready_at > self.test_start {
                self.test_start = ready_at;
            }

            self.final_effort += implementation;
            self.budgets[Phase::Test.index()] += inflated * TEST_SHARE;
            self.budgets[Phase::Release.index()] += inflated * RELEASE_SHARE;
            debug!(
                "absorbed change {} ({window} window): effort {:.1} -> {:.1}, test start {:.1}",
                change.id, change.effort, inflated, self.test_start
            );
            ids.push(change.id);
        }
        ids
    }

    fn record(&mut self, phase: Phase, start: f64, effort: f64, absorbed: Vec<u32>, rerun: bool) {
        self.trace.push(PhaseRecord {
            phase,
            start,
            end: self.clock,
            effort,
            absorbed,
            rerun,
        });
    }
}

impl ChangeProcess for SequentialProcess {
    fn kind(&self) -> ProcessKind {
        ProcessKind::Sequential
    }

    fn run(&mut self) {
        if self.finished {
            return;
        }
        self.run_schedule();
        self.finished = true;
        info!(
            "sequential run finished at {:.1}: effort {:.1}, {} phase entries",
            self.clock,
            self.final_effort,
            self.trace.len()
        );
    }

    fn final_effort(&self) -> f64 {
        self.final_effort
    }

    /// Every incoming change is done when the schedule ends.
    fn average_implementation_duration(&self) -> f64 {
        mean(self.incoming.iter().map(|c| self.clock - c.arrival))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
