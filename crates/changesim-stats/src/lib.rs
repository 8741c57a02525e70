//! Paired comparison battery for sequential vs. iterative simulation results.
//!
//! Every test takes two equally long slices, one value per run and process
//! (end effort or average duration), and returns a [`ComparisonResult`] with a
//! statistic, a p-value where one exists, and the process the data favours.
//! Differences are always taken as `sequential - iterative`, so a positive
//! mean difference means the iterative process came out lower.

use serde::Serialize;
use statrs::distribution::{Binomial, ContinuousCDF, DiscreteCDF, StudentsT};
use statrs::statistics::Statistics;

/// Significance level below which a test favours one process.
pub const ALPHA: f64 = 0.05;

/// |d| at or above which an effect size counts as a (small) effect.
pub const SMALL_EFFECT: f64 = 0.2;

/// |mean difference| at or below which the two processes count as tied.
/// The incremental mean leaves rounding residue on exactly balanced samples.
const TIE_TOLERANCE: f64 = 1e-12;

// ═══════════════════════════════════════════════════════════════════════════════
// Core types
// ═══════════════════════════════════════════════════════════════════════════════

/// Process a comparison points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Favours {
    Sequential,
    Iterative,
    Neither,
}

impl Favours {
    /// Direction of `mean_difference` when `significant`, otherwise `Neither`.
    fn from_difference(mean_difference: f64, significant: bool) -> Self {
        if !significant || mean_difference.abs() <= TIE_TOLERANCE {
            Self::Neither
        } else if mean_difference > 0.0 {
            Self::Iterative
        } else {
            Self::Sequential
        }
    }

    fn from_p(mean_difference: f64, p: f64) -> Self {
        Self::from_difference(mean_difference, p < ALPHA)
    }
}

impl std::fmt::Display for Favours {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Self::Sequential => "sequential",
            Self::Iterative => "iterative",
            Self::Neither => "neither",
        })
    }
}

/// Result of a single paired comparison.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonResult {
    pub name: String,
    pub statistic: f64,
    pub p_value: Option<f64>,
    /// Mean of `sequential - iterative`.
    pub mean_difference: f64,
    pub details: String,
    pub favours: Favours,
}

/// Descriptive statistics of one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

impl Summary {
    /// Summarise `values`; all fields are 0 for an empty slice and the
    /// standard deviation is 0 below two values.
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                count: 0,
                mean: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
                median: 0.0,
            };
        }
        let std_dev = if values.len() < 2 { 0.0 } else { values.std_dev() };
        Self {
            count: values.len(),
            mean: values.mean(),
            std_dev,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            median: median(values),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════════

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Paired differences, or the reason they cannot be formed.
fn differences(sequential: &[f64], iterative: &[f64]) -> Result<Vec<f64>, String> {
    if sequential.len() != iterative.len() {
        return Err(format!(
            "Mismatched lengths: {} sequential, {} iterative",
            sequential.len(),
            iterative.len()
        ));
    }
    if sequential.len() < 2 {
        return Err(format!("Insufficient data: need 2 pairs, got {}", sequential.len()));
    }
    Ok(sequential.iter().zip(iterative).map(|(s, i)| s - i).collect())
}

fn insufficient(name: &str, reason: String) -> ComparisonResult {
    ComparisonResult {
        name: name.to_string(),
        statistic: 0.0,
        p_value: None,
        mean_difference: 0.0,
        details: reason,
        favours: Favours::Neither,
    }
}

/// Ratio that keeps its sign when the denominator vanishes.
fn signed_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else if numerator == 0.0 {
        0.0
    } else {
        f64::INFINITY.copysign(numerator)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

/// Paired Student's t-test on the per-run differences, two-sided.
pub fn paired_t_test(sequential: &[f64], iterative: &[f64]) -> ComparisonResult {
    let name = "Paired t-test";
    let diffs = match differences(sequential, iterative) {
        Ok(d) => d,
        Err(reason) => return insufficient(name, reason),
    };
    let n = diffs.len() as f64;
    let mean = diffs.iter().mean();
    let sd = diffs.iter().std_dev();
    let t = signed_ratio(mean, sd / n.sqrt());

    let p = if t.is_infinite() {
        0.0
    } else {
        match StudentsT::new(0.0, 1.0, n - 1.0) {
            Ok(dist) => (2.0 * dist.sf(t.abs())).min(1.0),
            Err(_) => 1.0,
        }
    };
    ComparisonResult {
        name: name.to_string(),
        statistic: t,
        p_value: Some(p),
        mean_difference: mean,
        details: format!("n={}, mean diff={mean:.3}, sd={sd:.3}, dof={}", diffs.len(), n - 1.0),
        favours: Favours::from_p(mean, p),
    }
}

/// Exact two-sided sign test; ties are dropped.
pub fn sign_test(sequential: &[f64], iterative: &[f64]) -> ComparisonResult {
    let name = "Sign test";
    let diffs = match differences(sequential, iterative) {
        Ok(d) => d,
        Err(reason) => return insufficient(name, reason),
    };
    let mean = diffs.iter().mean();
    let iterative_wins = diffs.iter().filter(|&&d| d > 0.0).count() as u64;
    let sequential_wins = diffs.iter().filter(|&&d| d < 0.0).count() as u64;
    let trials = iterative_wins + sequential_wins;
    let ties = diffs.len() as u64 - trials;

    let p = if trials == 0 {
        1.0
    } else {
        let k = iterative_wins.min(sequential_wins);
        match Binomial::new(0.5, trials) {
            Ok(dist) => (2.0 * dist.cdf(k)).min(1.0),
            Err(_) => 1.0,
        }
    };
    let direction = iterative_wins as f64 - sequential_wins as f64;
    ComparisonResult {
        name: name.to_string(),
        statistic: iterative_wins as f64,
        p_value: Some(p),
        mean_difference: mean,
        details: format!(
            "iterative lower in {iterative_wins}, sequential lower in {sequential_wins}, ties {ties}"
        ),
        favours: Favours::from_p(direction, p),
    }
}

/// Paired effect size d = mean(diff) / sd(diff). Favours a side from a small
/// effect upwards.
pub fn cohens_d(sequential: &[f64], iterative: &[f64]) -> ComparisonResult {
    let name = "Cohen's d";
    let diffs = match differences(sequential, iterative) {
        Ok(d) => d,
        Err(reason) => return insufficient(name, reason),
    };
    let mean = diffs.iter().mean();
    let d = signed_ratio(mean, diffs.iter().std_dev());
    let magnitude = match d.abs() {
        x if x >= 0.8 => "large",
        x if x >= 0.5 => "medium",
        x if x >= SMALL_EFFECT => "small",
        _ => "negligible",
    };
    ComparisonResult {
        name: name.to_string(),
        statistic: d,
        p_value: None,
        mean_difference: mean,
        details: format!("{magnitude} effect"),
        favours: Favours::from_difference(mean, d.abs() >= SMALL_EFFECT),
    }
}

/// Share of runs in which the iterative process came out strictly lower.
pub fn win_rate(sequential: &[f64], iterative: &[f64]) -> ComparisonResult {
    let name = "Win rate";
    let diffs = match differences(sequential, iterative) {
        Ok(d) => d,
        Err(reason) => return insufficient(name, reason),
    };
    let wins = diffs.iter().filter(|&&d| d > 0.0).count();
    let losses = diffs.iter().filter(|&&d| d < 0.0).count();
    let rate = wins as f64 / diffs.len() as f64;
    ComparisonResult {
        name: name.to_string(),
        statistic: rate,
        p_value: None,
        mean_difference: diffs.iter().mean(),
        details: format!("{wins}/{} runs", diffs.len()),
        favours: Favours::from_difference(wins as f64 - losses as f64, wins != losses),
    }
}

/// Run the whole battery.
pub fn compare_all(sequential: &[f64], iterative: &[f64]) -> Vec<ComparisonResult> {
    let tests: Vec<fn(&[f64], &[f64]) -> ComparisonResult> =
        vec![paired_t_test, sign_test, cohens_d, win_rate];
    tests.iter().map(|test| test(sequential, iterative)).collect()
}
