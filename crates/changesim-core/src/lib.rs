//! # changesim-core
//!
//! **Does an iterative process absorb change more cheaply than a sequential one?**
//!
//! `changesim-core` is a Monte-Carlo model of change management in software
//! projects. A random module-dependency architecture receives a set of planned
//! changes and a stream of changes arriving mid-project; the same demand is then
//! fed to a phase-sequential ("waterfall") and a sprint-iterative ("agile")
//! simulator, and the total effort and turnaround of both are compared.
//!
//! ## Quick Start
//!
//! ```no_run
//! use changesim_core::{ExperimentConfig, run_experiment};
//!
//! let config = ExperimentConfig {
//!     runs: 100,
//!     seed: Some(42),
//!     ..Default::default()
//! };
//! let experiment = run_experiment(&config).unwrap();
//! for r in &experiment.reports {
//!     println!("run {}: sequential {:.0}, iterative {:.0}", r.run, r.sp_end_effort, r.ip_end_effort);
//! }
//! ```
//!
//! ## Architecture
//!
//! Architecture → Change generator → (Sequential | Iterative) → RunReport → results.csv
//!
//! - [`ArchitectureMatrix`]: weighted dependency matrix; every change edits it
//!   and pays for the coupling of the module it touches.
//! - [`ChangeGenerator`]: plans general changes (known up front) and incoming
//!   changes (arriving at normally distributed times).
//! - [`SequentialProcess`]: five phases with growing rework factors; incoming
//!   changes wait for the test phase or the post-release sweep.
//! - [`IterativeProcess`]: fixed-capacity sprints pulling incoming work first,
//!   splitting whatever does not fit.
//!
//! Both simulators implement [`ChangeProcess`] and own deep copies of their
//! inputs, so one never sees the other's state.

pub mod architecture;
pub mod change;
pub mod error;
pub mod experiment;
pub mod iterative;
pub mod process;
pub mod report;
pub mod results;
pub mod sequential;

pub use architecture::{ArchitectureMatrix, ChangeType};
pub use change::{Change, ChangeGenerator, ChangePlan, Priority, change_effort};
pub use error::{Result, SimError};
pub use experiment::{
    CountRange, DEFAULT_SPRINT_CAPACITY, Experiment, ExperimentConfig, RunCounts, RunDetail,
    resolve_seed, run_experiment, run_experiment_with, run_seed, run_setup, simulate_run,
    simulate_run_detailed,
};
pub use iterative::{IterativeProcess, SprintRecord};
pub use process::{ChangeProcess, ProcessKind, ProcessOutcome};
pub use report::RunReport;
pub use results::{CSV_HEADER, ExperimentMeta, ExperimentWriter, read_results};
pub use sequential::{Phase, PhaseRecord, SequentialProcess};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
