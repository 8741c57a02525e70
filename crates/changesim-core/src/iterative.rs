//! Sprint-iterative ("agile") process simulator.
//!
//! Architecture:
//! 1. The product backlog starts with every planned change
//! 2. Each sprint pulls from the product backlog until its capacity is met,
//!    preferring incoming changes (FIFO), otherwise the oldest entry
//! 3. A change that does not fit is split; its unfinished effort is carried
//!    into the next sprint with deferred priority and pulled first there
//! 4. At every sprint boundary, incoming changes whose arrival time has
//!    passed are admitted to the product backlog
//! 5. The last sprint shrinks to the effort left when the backlog runs dry
//!
//! Time advances one unit per unit of effort, so the clock after a sprint is
//! the sum of all capacities consumed so far.

use std::collections::{HashMap, VecDeque};

use log::{debug, info};
use serde::Serialize;

use crate::change::{Change, Priority};
use crate::error::{Result, SimError};
use crate::process::{ChangeProcess, ProcessKind, mean};

/// Overflow below this is treated as a sprint that fits exactly.
const EFFORT_EPSILON: f64 = 1e-9;

/// One executed sprint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SprintRecord {
    /// 1-based sprint number.
    pub index: usize,
    pub start: f64,
    /// Effective capacity consumed (shrunk for the final partial sprint).
    pub capacity: f64,
    /// Changes finished this sprint, in pull order.
    pub completed: Vec<u32>,
    /// Residual of the split change carried into the next sprint.
    pub carried: Option<Change>,
    /// Incoming changes admitted to the product backlog at the end of the sprint.
    pub admitted: Vec<u32>,
}

/// Scrum-style simulator with fixed-capacity sprints.
#[derive(Debug, Clone)]
pub struct IterativeProcess {
    sprint_capacity: f64,
    clock: f64,
    final_effort: f64,
    product_backlog: VecDeque<Change>,
    /// Not yet arrived, ascending by arrival time.
    arrivals: VecDeque<Change>,
    arrival_times: HashMap<u32, f64>,
    carry_over: Option<Change>,
    completions: Vec<(u32, f64)>,
    sprints: Vec<SprintRecord>,
    finished: bool,
}

impl IterativeProcess {
    /// Build a simulator. Both change lists are copied.
    pub fn new(sprint_capacity: f64, planned: &[Change], incoming: &[Change]) -> Result<Self> {
        if !sprint_capacity.is_finite() || sprint_capacity <= 0.0 {
            return Err(SimError::invalid(format!(
                "sprint capacity must be positive, got {sprint_capacity}"
            )));
        }
        let mut arrivals: Vec<Change> = incoming.to_vec();
        arrivals.sort_by(|a, b| a.arrival.total_cmp(&b.arrival));
        let arrival_times = arrivals.iter().map(|c| (c.id, c.arrival)).collect();

        Ok(Self {
            sprint_capacity,
            clock: 0.0,
            final_effort: 0.0,
            product_backlog: planned.iter().cloned().collect(),
            arrivals: arrivals.into(),
            arrival_times,
            carry_over: None,
            completions: Vec::new(),
            sprints: Vec::new(),
            finished: false,
        })
    }

    pub fn sprint_capacity(&self) -> f64 {
        self.sprint_capacity
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn sprints(&self) -> &[SprintRecord] {
        &self.sprints
    }

    pub fn product_backlog(&self) -> &VecDeque<Change> {
        &self.product_backlog
    }

    /// `(change id, completion time)` for every incoming change finished with
    /// incoming priority.
    pub fn completions(&self) -> &[(u32, f64)] {
        &self.completions
    }

    fn has_work(&self) -> bool {
        !self.product_backlog.is_empty() || self.carry_over.is_some()
    }

    /// Next change for the sprint backlog: first incoming-priority entry, or
    /// the oldest entry when there is none.
    fn pull_next(&mut self) -> Option<Change> {
        let idx = self
            .product_backlog
            .iter()
            .position(|c| c.priority == Priority::Incoming)
            .unwrap_or(0);
        self.product_backlog.remove(idx)
    }

    /// Move every arrived change into the product backlog.
    fn admit_arrivals(&mut self) -> Vec<u32> {
        let mut admitted = Vec::new();
        while self.arrivals.front().is_some_and(|c| c.arrival <= self.clock) {
            if let Some(change) = self.arrivals.pop_front() {
                admitted.push(change.id);
                self.product_backlog.push_back(change);
            }
        }
        admitted
    }

    fn run_sprint(&mut self) {
        let start = self.clock;
        let mut sprint_backlog: Vec<Change> = self.carry_over.take().into_iter().collect();
        let mut pulled: f64 = sprint_backlog.iter().map(|c| c.effort).sum();

        while pulled < self.sprint_capacity {
            match self.pull_next() {
                Some(change) => {
                    pulled += change.effort;
                    sprint_backlog.push(change);
                }
                None => break,
            }
        }
        let capacity = pulled.min(self.sprint_capacity);

        if pulled - capacity > EFFORT_EPSILON {
            if let Some(mut last) = sprint_backlog.pop() {
                last.effort = pulled - capacity;
                last.priority = Priority::Deferred;
                debug!(
                    "change {} split at {:.1}, {:.1} carried over",
                    last.id,
                    start + capacity,
                    last.effort
                );
                self.carry_over = Some(last);
            }
        }

        self.clock += capacity;
        self.final_effort += capacity;
        for change in &sprint_backlog {
            if change.priority == Priority::Incoming {
                self.completions.push((change.id, self.clock));
            }
        }
        let admitted = self.admit_arrivals();

        self.sprints.push(SprintRecord {
            index: self.sprints.len() + 1,
            start,
            capacity,
            completed: sprint_backlog.iter().map(|c| c.id).collect(),
            carried: self.carry_over.clone(),
            admitted,
        });
    }
}

impl ChangeProcess for IterativeProcess {
    fn kind(&self) -> ProcessKind {
        ProcessKind::Iterative
    }

    fn run(&mut self) {
        if self.finished {
            return;
        }
        self.admit_arrivals();
        loop {
            if self.has_work() {
                self.run_sprint();
                continue;
            }
            // idle until the next arrival, no effort charged
            match self.arrivals.front().map(|c| c.arrival) {
                Some(next) => {
                    debug!("backlog empty at {:.1}, idling to {next:.1}", self.clock);
                    self.clock = self.clock.max(next);
                    self.admit_arrivals();
                }
                None => break,
            }
        }
        self.finished = true;
        info!(
            "iterative run finished at {:.1}: effort {:.1} over {} sprints",
            self.clock,
            self.final_effort,
            self.sprints.len()
        );
    }

    fn final_effort(&self) -> f64 {
        self.final_effort
    }

    /// Mean of completion − arrival, matched by change id, over incoming
    /// changes completed with incoming priority. Split changes are excluded.
    fn average_implementation_duration(&self) -> f64 {
        mean(
            self.completions
                .iter()
                .filter_map(|(id, done)| self.arrival_times.get(id).map(|arrival| done - arrival)),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::ChangeType;

    const EPS: f64 = 1e-9;

    fn planned(id: u32, effort: f64) -> Change {
        Change::planned(id, ChangeType::Change, effort)
    }

    fn incoming(id: u32, effort: f64, arrival: f64) -> Change {
        Change::incoming(id, ChangeType::Add, effort, arrival)
    }

    fn run(capacity: f64, planned: &[Change], incoming: &[Change]) -> IterativeProcess {
        let mut ip = IterativeProcess::new(capacity, planned, incoming).unwrap();
        ip.run();
        ip
    }

    fn capacity_sum(ip: &IterativeProcess) -> f64 {
        ip.sprints().iter().map(|s| s.capacity).sum()
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn test_rejects_non_positive_capacity() {
        assert!(IterativeProcess::new(0.0, &[], &[]).is_err());
        assert!(IterativeProcess::new(-5.0, &[], &[]).is_err());
        assert!(IterativeProcess::new(f64::NAN, &[], &[]).is_err());
    }

    #[test]
    fn test_empty_backlog_runs_no_sprints() {
        let ip = run(120.0, &[], &[]);
        assert!(ip.sprints().is_empty());
        assert_eq!(ip.final_effort(), 0.0);
        assert_eq!(ip.average_implementation_duration(), 0.0);
    }

    // -----------------------------------------------------------------------
    // Sprint accounting
    // -----------------------------------------------------------------------

    #[test]
    fn test_divisible_backlog_has_no_split() {
        let backlog = [planned(1, 60.0), planned(2, 60.0), planned(3, 120.0)];
        let ip = run(120.0, &backlog, &[]);
        assert_eq!(ip.final_effort(), 240.0);
        assert_eq!(ip.sprints().len(), 2);
        assert!(ip.sprints().iter().all(|s| s.carried.is_none()));
        assert_eq!(capacity_sum(&ip), ip.final_effort());
    }

    #[test]
    fn test_overflow_is_carried_and_pulled_first() {
        let backlog = [planned(1, 60.0), planned(2, 70.0), planned(3, 30.0)];
        let ip = run(100.0, &backlog, &[]);
        let sprints = ip.sprints();
        assert_eq!(sprints.len(), 2);

        assert_eq!(sprints[0].completed, vec![1]);
        let carried = sprints[0].carried.as_ref().unwrap();
        assert_eq!(carried.id, 2);
        assert!((carried.effort - 30.0).abs() < EPS);
        assert_eq!(carried.priority, Priority::Deferred);

        assert_eq!(sprints[1].completed, vec![2, 3]);
        assert!((sprints[1].capacity - 60.0).abs() < EPS);
        assert!((ip.final_effort() - 160.0).abs() < EPS);
    }

    #[test]
    fn test_large_change_spans_several_sprints() {
        let ip = run(100.0, &[planned(1, 250.0)], &[]);
        let caps: Vec<f64> = ip.sprints().iter().map(|s| s.capacity).collect();
        assert_eq!(caps, vec![100.0, 100.0, 50.0]);
        assert_eq!(ip.sprints()[2].completed, vec![1]);
    }

    #[test]
    fn test_final_partial_sprint_does_not_shrink_later_sprints() {
        // backlog runs dry in sprint 1 before the late arrival is admitted
        let ip = run(100.0, &[planned(1, 40.0)], &[incoming(2, 150.0, 40.0)]);
        let caps: Vec<f64> = ip.sprints().iter().map(|s| s.capacity).collect();
        assert_eq!(caps, vec![40.0, 100.0, 50.0]);
        // split incoming change is not counted as completed with incoming priority
        assert!(ip.completions().is_empty());
        assert_eq!(ip.average_implementation_duration(), 0.0);
    }

    // -----------------------------------------------------------------------
    // Priorities and admission
    // -----------------------------------------------------------------------

    #[test]
    fn test_incoming_changes_are_preferred() {
        let ip = run(
            100.0,
            &[planned(1, 50.0), planned(2, 50.0)],
            &[incoming(3, 50.0, 0.0)],
        );
        assert_eq!(ip.sprints()[0].completed, vec![3, 1]);
        assert_eq!(ip.completions(), &[(3, 100.0)]);
        assert!((ip.average_implementation_duration() - 100.0).abs() < EPS);
        assert!((ip.final_effort() - 150.0).abs() < EPS);
    }

    #[test]
    fn test_arrival_visible_only_from_next_boundary() {
        let ip = run(
            100.0,
            &[planned(1, 100.0), planned(2, 100.0)],
            &[incoming(3, 20.0, 50.0)],
        );
        // arrives mid-sprint 1, admitted at t=100 and pulled ahead of planned 2
        assert_eq!(ip.sprints()[0].admitted, vec![3]);
        assert_eq!(ip.sprints()[1].completed[0], 3);
        assert!((ip.average_implementation_duration() - 150.0).abs() < EPS);
    }

    #[test]
    fn test_idle_until_first_arrival() {
        let ip = run(120.0, &[], &[incoming(1, 50.0, 30.0)]);
        assert_eq!(ip.sprints().len(), 1);
        assert!((ip.sprints()[0].start - 30.0).abs() < EPS);
        assert!((ip.final_effort() - 50.0).abs() < EPS);
        assert!((ip.average_implementation_duration() - 50.0).abs() < EPS);
    }

    #[test]
    fn test_capacity_sum_equals_final_effort() {
        let backlog: Vec<Change> = (1..=15).map(|i| planned(i, 17.0 * i as f64)).collect();
        let arrivals: Vec<Change> = (16..=25)
            .map(|i| incoming(i, 23.0 + i as f64, (i - 16) as f64 * 80.0))
            .collect();
        let ip = run(120.0, &backlog, &arrivals);
        assert!((capacity_sum(&ip) - ip.final_effort()).abs() < EPS);
        let total: f64 = backlog.iter().chain(&arrivals).map(|c| c.effort).sum();
        assert!((ip.final_effort() - total).abs() < 1e-6);
        assert!(ip.product_backlog().is_empty());
    }

    #[test]
    fn test_input_lists_are_not_mutated() {
        let backlog = vec![planned(1, 60.0), planned(2, 70.0)];
        let arrivals = vec![incoming(3, 90.0, 10.0)];
        let (b, a) = (backlog.clone(), arrivals.clone());
        let _ = run(100.0, &backlog, &arrivals);
        assert_eq!(backlog, b);
        assert_eq!(arrivals, a);
    }
}
