//! `changesim run`: run an experiment, persist it and compare both processes.

use std::io::Write;
use std::path::Path;
use std::time::Instant;

use changesim_core::{ExperimentWriter, resolve_seed, run_experiment_with};
use log::info;

use super::{ExperimentArgs, fail, print_comparisons, print_summary};

/// Run the run command.
pub fn run(args: &ExperimentArgs, output: Option<&Path>) {
    let mut config = args.resolve().unwrap_or_else(|e| fail(e));
    // Fix the seed up front so experiment.json records the one actually used.
    config.seed = Some(resolve_seed(&config));

    let mut writer = output.map(|dir| {
        ExperimentWriter::new(dir, &config)
            .unwrap_or_else(|e| fail(format!("creating experiment directory: {e}")))
    });

    println!("Running experiment");
    println!("  Runs:            {}", config.runs);
    println!("  Seed:            {}", config.seed.unwrap_or_default());
    println!("  Modules:         {}", config.modules);
    println!("  General changes: {}", config.general_changes);
    println!("  Incoming:        {}", config.incoming_changes);
    println!("  Sprint capacity: {}", config.sprint_capacity);
    match &writer {
        Some(w) => println!("  Output:          {}", w.dir().display()),
        None => println!("  Output:          (not written)"),
    }
    println!();

    let start = Instant::now();
    let step = (config.runs / 100).max(1);
    let total = config.runs;
    let result = run_experiment_with(&config, |report| {
        if let Some(w) = writer.as_mut() {
            w.write_report(report)?;
        }
        if report.run % step == 0 || report.run == total {
            print!("\r  Runs: {:>7}/{total}", report.run);
            let _ = std::io::stdout().flush();
        }
        Ok(())
    });
    println!();

    let experiment = result.unwrap_or_else(|e| fail(e));
    info!(
        "{} runs in {:.2}s",
        experiment.reports.len(),
        start.elapsed().as_secs_f64()
    );

    println!();
    print_summary(&experiment.reports);
    print_comparisons(&experiment.reports);

    if let Some(w) = writer {
        match w.finish() {
            Ok(dir) => {
                println!("\nExperiment saved to {}", dir.display());
                println!("  results.csv      — one row per run");
                println!("  experiment.json  — metadata and config");
            }
            Err(e) => fail(format!("finalizing experiment: {e}")),
        }
    }
}
