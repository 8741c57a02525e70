//! Persisting experiment results.
//!
//! Each experiment is a directory containing:
//! - `results.csv`: one row per run, written as runs complete
//! - `experiment.json`: metadata (id, timing, seed, config), written on finish

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SimError};
use crate::experiment::ExperimentConfig;
use crate::report::RunReport;

pub const RESULTS_FILE: &str = "results.csv";
pub const META_FILE: &str = "experiment.json";

pub const CSV_HEADER: &str = "run,modules,coupling_degree,general_changes,general_effort,\
incoming_changes,incoming_effort,sp_end_effort,sp_avg_duration,ip_end_effort,ip_avg_duration";

const CSV_COLUMNS: usize = 11;

// ---------------------------------------------------------------------------
// Experiment metadata (experiment.json)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentMeta {
    pub version: u32,
    pub id: String,
    pub started_at: String,
    pub ended_at: String,
    pub duration_ms: u64,
    pub seed: Option<u64>,
    pub config: ExperimentConfig,
    pub runs: usize,
    pub changesim_version: String,
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Incremental writer for one experiment directory.
pub struct ExperimentWriter {
    dir: PathBuf,
    csv_writer: BufWriter<File>,
    runs: usize,
    started_at: SystemTime,
    started_instant: Instant,
    id: String,
    config: ExperimentConfig,
}

impl ExperimentWriter {
    /// Create `<output_dir>/<timestamp>-<short-id>/` and its `results.csv`.
    pub fn new(output_dir: &Path, config: &ExperimentConfig) -> Result<Self> {
        let id = Uuid::new_v4().to_string();
        let started_at = SystemTime::now();
        let ts = started_at.duration_since(UNIX_EPOCH).unwrap_or_default();
        let short_id = id.split('-').next().unwrap_or(&id);
        let dir = output_dir.join(format!("{}-{}", format_compact(ts), short_id));
        fs::create_dir_all(&dir)?;

        let mut csv_writer = BufWriter::new(File::create(dir.join(RESULTS_FILE))?);
        writeln!(csv_writer, "{CSV_HEADER}")?;
        csv_writer.flush()?;
        debug!("writing results to {}", dir.display());

        Ok(Self {
            dir,
            csv_writer,
            runs: 0,
            started_at,
            started_instant: Instant::now(),
            id,
            config: config.clone(),
        })
    }

    pub fn write_report(&mut self, r: &RunReport) -> Result<()> {
        writeln!(
            self.csv_writer,
            "{},{},{},{},{},{},{},{},{},{},{}",
            r.run,
            r.modules,
            r.coupling_degree,
            r.general_changes,
            r.general_effort,
            r.incoming_changes,
            r.incoming_effort,
            r.sp_end_effort,
            r.sp_avg_duration,
            r.ip_end_effort,
            r.ip_avg_duration
        )?;
        self.runs += 1;
        Ok(())
    }

    /// Flush the CSV, write `experiment.json` and return the directory.
    pub fn finish(mut self) -> Result<PathBuf> {
        self.csv_writer.flush()?;

        let ended_at = SystemTime::now();
        let meta = ExperimentMeta {
            version: 1,
            id: self.id,
            started_at: format_iso8601(
                self.started_at.duration_since(UNIX_EPOCH).unwrap_or_default(),
            ),
            ended_at: format_iso8601(ended_at.duration_since(UNIX_EPOCH).unwrap_or_default()),
            duration_ms: self.started_instant.elapsed().as_millis() as u64,
            seed: self.config.seed,
            config: self.config,
            runs: self.runs,
            changesim_version: crate::VERSION.to_string(),
        };
        fs::write(self.dir.join(META_FILE), serde_json::to_string_pretty(&meta)?)?;
        Ok(self.dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn runs_written(&self) -> usize {
        self.runs
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Parse a `results.csv` written by [`ExperimentWriter`].
pub fn read_results(path: &Path) -> Result<Vec<RunReport>> {
    let text = fs::read_to_string(path)?;
    let mut lines = text.lines().enumerate();

    match lines.next() {
        Some((_, header)) if header.trim() == CSV_HEADER => {}
        Some((_, header)) => {
            return Err(SimError::Parse {
                line: 1,
                message: format!("unexpected header '{header}'"),
            });
        }
        None => {
            return Err(SimError::Parse {
                line: 1,
                message: "empty file".to_string(),
            });
        }
    }

    let mut reports = Vec::new();
    for (i, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        reports.push(parse_row(i + 1, line)?);
    }
    Ok(reports)
}

fn parse_row(line: usize, row: &str) -> Result<RunReport> {
    let fields: Vec<&str> = row.split(',').map(str::trim).collect();
    if fields.len() != CSV_COLUMNS {
        return Err(SimError::Parse {
            line,
            message: format!("expected {CSV_COLUMNS} columns, found {}", fields.len()),
        });
    }
    let int = |idx: usize| {
        fields[idx].parse::<usize>().map_err(|e| SimError::Parse {
            line,
            message: format!("column {}: {e}", idx + 1),
        })
    };
    let float = |idx: usize| {
        fields[idx].parse::<f64>().map_err(|e| SimError::Parse {
            line,
            message: format!("column {}: {e}", idx + 1),
        })
    };
    Ok(RunReport {
        run: int(0)?,
        modules: int(1)?,
        coupling_degree: float(2)?,
        general_changes: int(3)?,
        general_effort: float(4)?,
        incoming_changes: int(5)?,
        incoming_effort: float(6)?,
        sp_end_effort: float(7)?,
        sp_avg_duration: float(8)?,
        ip_end_effort: float(9)?,
        ip_avg_duration: float(10)?,
    })
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// `2026-10-19T080503Z`, safe for directory names.
fn format_compact(since_epoch: Duration) -> String {
    let (y, mo, d, h, mi, s) = utc_fields(since_epoch.as_secs());
    format!("{y:04}-{mo:02}-{d:02}T{h:02}{mi:02}{s:02}Z")
}

/// `2026-10-19T08:05:03Z`
fn format_iso8601(since_epoch: Duration) -> String {
    let (y, mo, d, h, mi, s) = utc_fields(since_epoch.as_secs());
    format!("{y:04}-{mo:02}-{d:02}T{h:02}:{mi:02}:{s:02}Z")
}

fn utc_fields(secs: u64) -> (i64, u32, u32, u64, u64, u64) {
    let (y, mo, d) = civil_from_days((secs / 86_400) as i64);
    (y, mo, d, (secs / 3600) % 24, (secs / 60) % 60, secs % 60)
}

/// Proleptic Gregorian date of a day count since 1970-01-01.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
