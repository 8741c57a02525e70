//! Experiment harness: configuration, seeded repetition and per-run reports.
//!
//! A run draws its module and change counts, generates an architecture,
//! plans general and incoming changes against it and feeds independent copies
//! of the same demand to both simulators. Each run gets its own RNG derived
//! from the experiment seed and the run index, so any single run can be
//! reproduced without replaying the ones before it.

use std::path::Path;

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::architecture::ArchitectureMatrix;
use crate::change::{ChangeGenerator, ChangePlan};
use crate::error::{Result, SimError};
use crate::iterative::IterativeProcess;
use crate::process::ChangeProcess;
use crate::report::RunReport;
use crate::sequential::SequentialProcess;

/// Three-week sprints.
pub const DEFAULT_SPRINT_CAPACITY: f64 = 120.0;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Inclusive range a per-run count is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRange {
    pub min: usize,
    pub max: usize,
}

impl CountRange {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub const fn fixed(n: usize) -> Self {
        Self { min: n, max: n }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.random_range(self.min..=self.max)
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.min == 0 {
            return Err(SimError::invalid(format!("{name}: lower bound must be positive")));
        }
        if self.min > self.max {
            return Err(SimError::invalid(format!(
                "{name}: empty range {}-{}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for CountRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}-{}", self.min, self.max)
        }
    }
}

impl std::str::FromStr for CountRange {
    type Err = SimError;

    /// Parse `"50-100"` or a single count `"75"`.
    fn from_str(s: &str) -> Result<Self> {
        let parse = |part: &str| {
            part.trim()
                .parse::<usize>()
                .map_err(|e| SimError::invalid(format!("bad count '{part}': {e}")))
        };
        match s.split_once('-') {
            Some((lo, hi)) => Ok(Self::new(parse(lo)?, parse(hi)?)),
            None => Ok(Self::fixed(parse(s)?)),
        }
    }
}

/// Experiment parameters. Missing JSON fields fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub runs: usize,
    pub modules: CountRange,
    pub general_changes: CountRange,
    pub incoming_changes: CountRange,
    pub sprint_capacity: f64,
    /// Master seed; drawn from OS entropy when absent.
    pub seed: Option<u64>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            runs: 1000,
            modules: CountRange::new(50, 100),
            general_changes: CountRange::new(15, 30),
            incoming_changes: CountRange::new(15, 30),
            sprint_capacity: DEFAULT_SPRINT_CAPACITY,
            seed: None,
        }
    }
}

impl ExperimentConfig {
    /// Load a JSON config file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.runs == 0 {
            return Err(SimError::invalid("runs must be positive"));
        }
        self.modules.validate("modules")?;
        self.general_changes.validate("general_changes")?;
        self.incoming_changes.validate("incoming_changes")?;
        if !self.sprint_capacity.is_finite() || self.sprint_capacity <= 0.0 {
            return Err(SimError::invalid(format!(
                "sprint_capacity must be positive, got {}",
                self.sprint_capacity
            )));
        }
        Ok(())
    }

    pub fn draw_counts<R: Rng + ?Sized>(&self, rng: &mut R) -> RunCounts {
        RunCounts {
            modules: self.modules.sample(rng),
            general_changes: self.general_changes.sample(rng),
            incoming_changes: self.incoming_changes.sample(rng),
        }
    }
}

/// Counts used by a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub modules: usize,
    pub general_changes: usize,
    pub incoming_changes: usize,
}

// ---------------------------------------------------------------------------
// Single run
// ---------------------------------------------------------------------------

/// Everything produced by one run, for inspection.
#[derive(Debug, Clone)]
pub struct RunDetail {
    pub report: RunReport,
    /// Architecture before any change was planned against it.
    pub architecture: ArchitectureMatrix,
    pub general: ChangePlan,
    pub incoming: ChangePlan,
    pub sequential: SequentialProcess,
    pub iterative: IterativeProcess,
}

/// Run one complete simulation and keep every intermediate artefact.
pub fn simulate_run_detailed<R: Rng>(
    run: usize,
    counts: RunCounts,
    sprint_capacity: f64,
    rng: &mut R,
) -> Result<RunDetail> {
    let architecture = ArchitectureMatrix::generate(counts.modules, rng)?;
    let coupling_degree = architecture.coupling_degree();

    let mut generator = ChangeGenerator::new(&mut *rng);
    let (general, matrix) =
        generator.plan_general_changes(counts.general_changes, architecture.clone())?;
    let (incoming, _) =
        generator.plan_incoming_changes(counts.incoming_changes, matrix, general.total_effort)?;

    let mut sequential = SequentialProcess::new(general.total_effort, &incoming.changes)?;
    let mut iterative = IterativeProcess::new(sprint_capacity, &general.changes, &incoming.changes)?;

    let report = RunReport {
        run,
        modules: counts.modules,
        coupling_degree,
        general_changes: general.len(),
        general_effort: general.total_effort,
        incoming_changes: incoming.len(),
        incoming_effort: incoming.total_effort,
        sp_end_effort: 0.0,
        sp_avg_duration: 0.0,
        ip_end_effort: 0.0,
        ip_avg_duration: 0.0,
    }
    .with_outcomes(sequential.outcome(), iterative.outcome());

    Ok(RunDetail {
        report,
        architecture,
        general,
        incoming,
        sequential,
        iterative,
    })
}

/// Run one complete simulation and return its report row.
pub fn simulate_run<R: Rng>(
    run: usize,
    counts: RunCounts,
    sprint_capacity: f64,
    rng: &mut R,
) -> Result<RunReport> {
    simulate_run_detailed(run, counts, sprint_capacity, rng).map(|detail| detail.report)
}

// ---------------------------------------------------------------------------
// Experiment
// ---------------------------------------------------------------------------

/// Reports of a whole experiment together with the seed that produced them.
#[derive(Debug, Clone)]
pub struct Experiment {
    pub seed: u64,
    pub config: ExperimentConfig,
    pub reports: Vec<RunReport>,
}

/// Seed of run `run` (1-based) within an experiment seeded with `master`.
pub fn run_seed(master: u64, run: usize) -> u64 {
    master ^ (run as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// The configured seed, or a fresh one from OS entropy.
pub fn resolve_seed(config: &ExperimentConfig) -> u64 {
    config.seed.unwrap_or_else(|| rand::rng().random())
}

/// RNG and counts of run `run`, exactly as [`run_experiment`] draws them.
pub fn run_setup(config: &ExperimentConfig, seed: u64, run: usize) -> (StdRng, RunCounts) {
    let mut rng = StdRng::seed_from_u64(run_seed(seed, run));
    let counts = config.draw_counts(&mut rng);
    (rng, counts)
}

pub fn run_experiment(config: &ExperimentConfig) -> Result<Experiment> {
    run_experiment_with(config, |_| Ok(()))
}

/// Run the experiment, handing each report to `on_report` as soon as it exists.
pub fn run_experiment_with<F>(config: &ExperimentConfig, mut on_report: F) -> Result<Experiment>
where
    F: FnMut(&RunReport) -> Result<()>,
{
    config.validate()?;
    let seed = resolve_seed(config);
    info!("experiment: {} runs, seed {seed}", config.runs);

    let mut reports = Vec::with_capacity(config.runs);
    for run in 1..=config.runs {
        let (mut rng, counts) = run_setup(config, seed, run);
        let report = simulate_run(run, counts, config.sprint_capacity, &mut rng)?;
        on_report(&report)?;
        reports.push(report);
    }

    let mut config = config.clone();
    config.seed = Some(seed);
    Ok(Experiment {
        seed,
        config,
        reports,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(seed: u64) -> ExperimentConfig {
        ExperimentConfig {
            runs: 5,
            modules: CountRange::new(10, 20),
            general_changes: CountRange::new(3, 6),
            incoming_changes: CountRange::new(3, 6),
            seed: Some(seed),
            ..Default::default()
        }
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    #[test]
    fn test_default_config_is_valid() {
        let config = ExperimentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sprint_capacity, 120.0);
        assert_eq!(config.modules, CountRange::new(50, 100));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            ExperimentConfig { runs: 0, ..Default::default() },
            ExperimentConfig { modules: CountRange::new(0, 5), ..Default::default() },
            ExperimentConfig { general_changes: CountRange::new(9, 3), ..Default::default() },
            ExperimentConfig { sprint_capacity: 0.0, ..Default::default() },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(SimError::InvalidInput(_))));
        }
    }

    #[test]
    fn test_count_range_parse_and_display() {
        let r: CountRange = "50-100".parse().unwrap();
        assert_eq!(r, CountRange::new(50, 100));
        assert_eq!(r.to_string(), "50-100");
        let r: CountRange = " 7 ".parse().unwrap();
        assert_eq!(r, CountRange::fixed(7));
        assert_eq!(r.to_string(), "7");
        assert!("a-b".parse::<CountRange>().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ExperimentConfig = serde_json::from_str(r#"{"runs": 3, "seed": 9}"#).unwrap();
        assert_eq!(config.runs, 3);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.incoming_changes, CountRange::new(15, 30));
    }

    #[test]
    fn test_config_from_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        let config = small_config(3);
        std::fs::write(&path, config.to_json().unwrap()).unwrap();
        assert_eq!(ExperimentConfig::from_path(&path).unwrap(), config);
    }

    // -----------------------------------------------------------------------
    // Runs
    // -----------------------------------------------------------------------

    #[test]
    fn test_simulate_run_fills_every_column() {
        let counts = RunCounts {
            modules: 30,
            general_changes: 10,
            incoming_changes: 8,
        };
        let mut rng = StdRng::seed_from_u64(42);
        let detail = simulate_run_detailed(1, counts, 120.0, &mut rng).unwrap();
        let r = &detail.report;
        assert_eq!(r.modules, 30);
        assert_eq!(r.general_changes, 10);
        assert_eq!(r.incoming_changes, 8);
        assert!(r.sp_end_effort >= r.general_effort);
        assert!(r.ip_end_effort >= r.general_effort + r.incoming_effort - 1e-6);
        assert_eq!(detail.architecture.module_count(), 30);
        assert!(detail.sequential.pending().is_empty());
    }

    #[test]
    fn test_same_seed_same_reports() {
        let a = run_experiment(&small_config(17)).unwrap();
        let b = run_experiment(&small_config(17)).unwrap();
        assert_eq!(a.reports, b.reports);
        assert_eq!(a.seed, 17);
        assert_eq!(a.config.seed, Some(17));
    }

    #[test]
    fn test_single_run_reproducible_in_isolation() {
        let config = small_config(23);
        let experiment = run_experiment(&config).unwrap();
        let (mut rng, counts) = run_setup(&config, 23, 4);
        let report = simulate_run(4, counts, config.sprint_capacity, &mut rng).unwrap();
        assert_eq!(report, experiment.reports[3]);
    }

    #[test]
    fn test_callback_sees_every_report() {
        let mut seen = Vec::new();
        let experiment = run_experiment_with(&small_config(5), |r| {
            seen.push(r.run);
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(experiment.reports.len(), 5);
    }
}
