//! Change records and the coupling-weighted change generator.
//!
//! Every change edits the architecture it is planned against. Its effort is
//! a base cost per change type, scaled up by the coupling weight of the
//! module it touches:
//!
//! ```text
//! base   = 10 * (type_code + 1)
//! effort = base * (1 + 10 * weight)      (base when weight == 0)
//! ```
//!
//! The architecture is threaded through the generator by value, so edits
//! compound: a later change sees the modules added or removed by earlier ones.

use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::architecture::{ArchitectureMatrix, ChangeType};
use crate::error::{Result, SimError};

/// Base effort unit multiplied by `type_code + 1`.
pub const BASE_EFFORT: f64 = 10.0;
/// Coupling scale factor applied on top of the base effort.
pub const COUPLING_EFFORT_FACTOR: f64 = 10.0;

// ---------------------------------------------------------------------------
// Change record
// ---------------------------------------------------------------------------

/// Scheduling priority of a change. Higher values are planned earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Residual effort of a change split at a sprint boundary.
    Deferred = 0,
    /// Arrived during execution.
    Incoming = 1,
    /// Known at project start.
    Planned = 2,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deferred => write!(f, "deferred"),
            Self::Incoming => write!(f, "incoming"),
            Self::Planned => write!(f, "planned"),
        }
    }
}

/// A unit of modification work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub id: u32,
    pub change_type: ChangeType,
    /// Remaining effort. Reduced to the overflow when a change is split.
    pub effort: f64,
    pub priority: Priority,
    /// Simulated time at which the change becomes visible (0 for planned changes).
    pub arrival: f64,
}

impl Change {
    pub fn planned(id: u32, change_type: ChangeType, effort: f64) -> Self {
        Self {
            id,
            change_type,
            effort,
            priority: Priority::Planned,
            arrival: 0.0,
        }
    }

    pub fn incoming(id: u32, change_type: ChangeType, effort: f64, arrival: f64) -> Self {
        Self {
            id,
            change_type,
            effort,
            priority: Priority::Incoming,
            arrival,
        }
    }
}

/// A planned set of changes and its total effort.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangePlan {
    pub total_effort: f64,
    pub changes: Vec<Change>,
}

impl ChangePlan {
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Effort of a change of `change_type` touching a module with the given
/// coupling contribution.
pub fn change_effort(change_type: ChangeType, coupling: f64) -> f64 {
    let base = BASE_EFFORT * (change_type.code() + 1) as f64;
    if coupling == 0.0 {
        base
    } else {
        base * (1.0 + COUPLING_EFFORT_FACTOR * coupling)
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Produces general and incoming change plans from a single RNG.
///
/// Identifiers are sequential across both plans of one generator.
pub struct ChangeGenerator<R> {
    rng: R,
    next_id: u32,
}

impl<R: Rng> ChangeGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng, next_id: 1 }
    }

    /// Plan `count` changes known at project start (priority planned, arrival 0).
    pub fn plan_general_changes(
        &mut self,
        count: usize,
        matrix: ArchitectureMatrix,
    ) -> Result<(ChangePlan, ArchitectureMatrix)> {
        if count == 0 {
            return Err(SimError::invalid("general change count must be positive"));
        }
        let mut matrix = matrix;
        let mut plan = ChangePlan::default();
        for _ in 0..count {
            let (change_type, effort, next) = self.next_edit(matrix);
            matrix = next;
            let change = Change::planned(self.take_id(), change_type, effort);
            plan.total_effort += change.effort;
            plan.changes.push(change);
        }
        debug!(
            "planned {} general changes, effort {:.1}",
            plan.len(),
            plan.total_effort
        );
        Ok((plan, matrix))
    }

    /// Plan `count` changes arriving during execution, sorted by arrival time.
    ///
    /// Arrivals are normal around `general_effort / 2` with standard deviation
    /// `general_effort / 3`; negative draws are reflected and draws past the
    /// horizon are resampled uniformly over `[0, general_effort]`. A zero
    /// horizon puts every arrival at 0.
    pub fn plan_incoming_changes(
        &mut self,
        count: usize,
        matrix: ArchitectureMatrix,
        general_effort: f64,
    ) -> Result<(ChangePlan, ArchitectureMatrix)> {
        if count == 0 {
            return Err(SimError::invalid("incoming change count must be positive"));
        }
        if !general_effort.is_finite() || general_effort < 0.0 {
            return Err(SimError::invalid(format!(
                "general effort must be a non-negative number, got {general_effort}"
            )));
        }

        let arrivals = self.sample_arrivals(count, general_effort);
        let mut matrix = matrix;
        let mut plan = ChangePlan::default();
        for arrival in arrivals {
            let (change_type, effort, next) = self.next_edit(matrix);
            matrix = next;
            let change = Change::incoming(self.take_id(), change_type, effort, arrival);
            plan.total_effort += change.effort;
            plan.changes.push(change);
        }
        plan.changes.sort_by(|a, b| a.arrival.total_cmp(&b.arrival));
        debug!(
            "planned {} incoming changes, effort {:.1}",
            plan.len(),
            plan.total_effort
        );
        Ok((plan, matrix))
    }

    fn next_edit(&mut self, matrix: ArchitectureMatrix) -> (ChangeType, f64, ArchitectureMatrix) {
        let change_type = ChangeType::random(&mut self.rng);
        let (coupling, matrix) = matrix.apply_change(change_type, &mut self.rng);
        (change_type, change_effort(change_type, coupling), matrix)
    }

    fn take_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn sample_arrivals(&mut self, count: usize, horizon: f64) -> Vec<f64> {
        let normal = match Normal::new(horizon / 2.0, horizon / 3.0) {
            Ok(normal) if horizon > 0.0 => normal,
            _ => {
                warn!("no general effort to spread arrivals over, all {count} incoming changes arrive at 0");
                return vec![0.0; count];
            }
        };
        (0..count)
            .map(|_| {
                // open interval keeps the inverse CDF finite
                let u = self.rng.random_range(f64::EPSILON..1.0);
                let mut t = normal.inverse_cdf(u).abs();
                if t > horizon {
                    t = self.rng.random_range(0.0..=horizon);
                }
                t
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn generator(seed: u64) -> ChangeGenerator<StdRng> {
        ChangeGenerator::new(StdRng::seed_from_u64(seed))
    }

    fn architecture(seed: u64) -> ArchitectureMatrix {
        ArchitectureMatrix::generate(60, &mut StdRng::seed_from_u64(seed)).unwrap()
    }

    // -----------------------------------------------------------------------
    // Effort model
    // -----------------------------------------------------------------------

    #[test]
    fn test_base_effort_per_type() {
        assert_eq!(change_effort(ChangeType::Remove, 0.0), 20.0);
        assert_eq!(change_effort(ChangeType::Change, 0.0), 30.0);
        assert_eq!(change_effort(ChangeType::Add, 0.0), 40.0);
    }

    #[test]
    fn test_coupling_scales_effort() {
        assert!((change_effort(ChangeType::Change, 0.5) - 180.0).abs() < 1e-9);
        assert!(change_effort(ChangeType::Remove, 0.01) > 20.0);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Planned > Priority::Incoming);
        assert!(Priority::Incoming > Priority::Deferred);
        assert_eq!(Priority::Deferred as u8, 0);
        assert_eq!(Priority::Planned as u8, 2);
    }

    // -----------------------------------------------------------------------
    // General changes
    // -----------------------------------------------------------------------

    #[test]
    fn test_general_rejects_zero_count() {
        let mut g = generator(1);
        assert!(matches!(
            g.plan_general_changes(0, architecture(1)),
            Err(SimError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_general_changes_are_planned_at_zero() {
        let mut g = generator(2);
        let (plan, _) = g.plan_general_changes(20, architecture(2)).unwrap();
        assert_eq!(plan.len(), 20);
        let ids: Vec<u32> = plan.changes.iter().map(|c| c.id).collect();
        assert_eq!(ids, (1..=20).collect::<Vec<_>>());
        for c in &plan.changes {
            assert_eq!(c.priority, Priority::Planned);
            assert_eq!(c.arrival, 0.0);
            assert!(c.effort >= BASE_EFFORT * (c.change_type.code() + 1) as f64);
        }
        let sum: f64 = plan.changes.iter().map(|c| c.effort).sum();
        assert!((plan.total_effort - sum).abs() < 1e-9);
    }

    #[test]
    fn test_structural_edits_compound() {
        let mut g = generator(3);
        let before = architecture(3);
        let n = before.module_count() as i64;
        let (plan, after) = g.plan_general_changes(25, before).unwrap();
        let adds = plan.changes.iter().filter(|c| c.change_type == ChangeType::Add).count() as i64;
        let removes = plan
            .changes
            .iter()
            .filter(|c| c.change_type == ChangeType::Remove)
            .count() as i64;
        assert_eq!(after.module_count() as i64, n + adds - removes);
    }

    // -----------------------------------------------------------------------
    // Incoming changes
    // -----------------------------------------------------------------------

    #[test]
    fn test_incoming_sorted_and_within_horizon() {
        for seed in 0..20 {
            let mut g = generator(seed);
            let (general, m) = g.plan_general_changes(20, architecture(seed)).unwrap();
            let (incoming, _) = g.plan_incoming_changes(25, m, general.total_effort).unwrap();
            assert_eq!(incoming.len(), 25);
            for pair in incoming.changes.windows(2) {
                assert!(pair[0].arrival <= pair[1].arrival);
            }
            for c in &incoming.changes {
                assert_eq!(c.priority, Priority::Incoming);
                assert!(c.arrival >= 0.0 && c.arrival <= general.total_effort);
            }
        }
    }

    #[test]
    fn test_incoming_ids_continue_after_general() {
        let mut g = generator(4);
        let (general, m) = g.plan_general_changes(5, architecture(4)).unwrap();
        let (incoming, _) = g.plan_incoming_changes(5, m, general.total_effort).unwrap();
        let mut ids: Vec<u32> = incoming.changes.iter().map(|c| c.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_zero_horizon_arrives_at_zero() {
        let mut g = generator(5);
        let (incoming, _) = g.plan_incoming_changes(8, architecture(5), 0.0).unwrap();
        assert!(incoming.changes.iter().all(|c| c.arrival == 0.0));
    }

    #[test]
    fn test_incoming_rejects_zero_count_and_bad_horizon() {
        let mut g = generator(6);
        assert!(g.plan_incoming_changes(0, architecture(6), 100.0).is_err());
        assert!(g.plan_incoming_changes(3, architecture(6), -1.0).is_err());
        assert!(g.plan_incoming_changes(3, architecture(6), f64::NAN).is_err());
    }
}
