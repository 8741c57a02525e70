pub mod compare;
pub mod inspect;
pub mod run;

use std::path::PathBuf;

use changesim_core::{CountRange, ExperimentConfig, RunReport, SimError};
use changesim_stats::{ComparisonResult, Summary, compare_all};
use clap::Args;

/// Experiment parameters shared by `run` and `inspect`.
#[derive(Args, Debug, Clone, Default)]
pub struct ExperimentArgs {
    /// JSON experiment config; the flags below override its fields
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of runs
    #[arg(long)]
    pub runs: Option<usize>,

    /// Master seed (random when omitted; the one used is printed)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Effort units per sprint of the iterative process
    #[arg(long)]
    pub sprint_capacity: Option<f64>,

    /// Modules per architecture, "LO-HI" or a single count
    #[arg(long, value_parser = parse_count_range)]
    pub modules: Option<CountRange>,

    /// General (planned) changes per run, "LO-HI" or a single count
    #[arg(long, value_parser = parse_count_range)]
    pub general: Option<CountRange>,

    /// Incoming changes per run, "LO-HI" or a single count
    #[arg(long, value_parser = parse_count_range)]
    pub incoming: Option<CountRange>,
}

impl ExperimentArgs {
    /// Config file (or defaults) with every given flag applied on top.
    pub fn resolve(&self) -> Result<ExperimentConfig, SimError> {
        let mut config = match &self.config {
            Some(path) => ExperimentConfig::from_path(path)?,
            None => ExperimentConfig::default(),
        };
        if let Some(runs) = self.runs {
            config.runs = runs;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(capacity) = self.sprint_capacity {
            config.sprint_capacity = capacity;
        }
        if let Some(modules) = self.modules {
            config.modules = modules;
        }
        if let Some(general) = self.general {
            config.general_changes = general;
        }
        if let Some(incoming) = self.incoming {
            config.incoming_changes = incoming;
        }
        config.validate()?;
        Ok(config)
    }
}

/// clap value parser for `"LO-HI"` / `"N"` ranges.
pub fn parse_count_range(s: &str) -> Result<CountRange, String> {
    s.parse::<CountRange>().map_err(|e| e.to_string())
}

/// Print `message` to stderr and exit with status 1.
pub fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {message}");
    std::process::exit(1);
}

// ---------------------------------------------------------------------------
// Shared output
// ---------------------------------------------------------------------------

/// Descriptive table of the report columns.
pub fn print_summary(reports: &[RunReport]) {
    let columns: [(&str, fn(&RunReport) -> f64); 8] = [
        ("modules", |r| r.modules as f64),
        ("coupling degree", |r| r.coupling_degree),
        ("general effort", |r| r.general_effort),
        ("incoming effort", |r| r.incoming_effort),
        ("SP end effort", |r| r.sp_end_effort),
        ("IP end effort", |r| r.ip_end_effort),
        ("SP avg duration", |r| r.sp_avg_duration),
        ("IP avg duration", |r| r.ip_avg_duration),
    ];

    println!(
        "{:<18} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "Column", "Mean", "SD", "Min", "Median", "Max"
    );
    println!("{}", "-".repeat(73));
    for (name, get) in columns {
        let values: Vec<f64> = reports.iter().map(get).collect();
        let s = Summary::of(&values);
        println!(
            "{:<18} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2}",
            name, s.mean, s.std_dev, s.min, s.median, s.max
        );
    }
}

/// Comparison batteries on end effort and average duration.
pub fn comparisons(reports: &[RunReport]) -> [(&'static str, Vec<ComparisonResult>); 2] {
    let column = |get: fn(&RunReport) -> f64| reports.iter().map(get).collect::<Vec<f64>>();
    [
        (
            "end effort",
            compare_all(&column(|r| r.sp_end_effort), &column(|r| r.ip_end_effort)),
        ),
        (
            "average duration",
            compare_all(
                &column(|r| r.sp_avg_duration),
                &column(|r| r.ip_avg_duration),
            ),
        ),
    ]
}

pub fn print_comparisons(reports: &[RunReport]) {
    for (metric, results) in comparisons(reports) {
        println!("\nSequential vs. iterative: {metric}");
        println!(
            "  {:<16} {:>12} {:>10} {:>12}  {}",
            "Test", "Statistic", "p-value", "Favours", "Details"
        );
        println!("  {}", "-".repeat(70));
        for r in &results {
            let p = r
                .p_value
                .map_or_else(|| "-".to_string(), |p| format!("{p:.4}"));
            println!(
                "  {:<16} {:>12.4} {:>10} {:>12}  {}",
                r.name, r.statistic, p, r.favours, r.details
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // parse_count_range tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_count_range("50-100"), Ok(CountRange::new(50, 100)));
    }

    #[test]
    fn test_parse_single_count() {
        assert_eq!(parse_count_range("20"), Ok(CountRange::fixed(20)));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_count_range("ten").is_err());
        assert!(parse_count_range("1-").is_err());
    }

    // -----------------------------------------------------------------------
    // ExperimentArgs tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_resolve_defaults() {
        let config = ExperimentArgs::default().resolve().unwrap();
        assert_eq!(config, ExperimentConfig::default());
    }

    #[test]
    fn test_flags_override_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"runs": 10, "seed": 1, "sprint_capacity": 80.0}"#).unwrap();

        let args = ExperimentArgs {
            config: Some(path),
            seed: Some(2),
            incoming: Some(CountRange::new(5, 6)),
            ..Default::default()
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.runs, 10);
        assert_eq!(config.seed, Some(2));
        assert_eq!(config.sprint_capacity, 80.0);
        assert_eq!(config.incoming_changes, CountRange::new(5, 6));
        assert_eq!(config.modules, CountRange::new(50, 100));
    }

    #[test]
    fn test_resolve_rejects_invalid_override() {
        let args = ExperimentArgs {
            sprint_capacity: Some(-1.0),
            ..Default::default()
        };
        assert!(args.resolve().is_err());
    }

    #[test]
    fn test_comparisons_cover_both_metrics() {
        let report = |run: usize, sp: f64, ip: f64| RunReport {
            run,
            modules: 60,
            coupling_degree: 0.2,
            general_changes: 20,
            general_effort: 1000.0,
            incoming_changes: 20,
            incoming_effort: 800.0,
            sp_end_effort: sp,
            sp_avg_duration: sp / 2.0,
            ip_end_effort: ip,
            ip_avg_duration: ip / 2.0,
        };
        let reports: Vec<RunReport> = (1..=20)
            .map(|i| report(i, 2000.0 + i as f64, 1800.0 + (i % 4) as f64))
            .collect();
        let [(effort, effort_results), (duration, _)] = comparisons(&reports);
        assert_eq!(effort, "end effort");
        assert_eq!(duration, "average duration");
        assert_eq!(effort_results.len(), 4);
        assert!(
            effort_results
                .iter()
                .all(|r| r.favours == changesim_stats::Favours::Iterative)
        );
    }
}
