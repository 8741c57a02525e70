//! `changesim inspect`: replay one run with its change plans and traces.

use changesim_core::{Change, RunDetail, resolve_seed, run_setup, simulate_run_detailed};

use super::{ExperimentArgs, fail};

pub fn run(args: &ExperimentArgs, run: usize, json: bool) {
    let mut config = args.resolve().unwrap_or_else(|e| fail(e));
    if run == 0 {
        fail("--run is 1-based");
    }
    let seed = resolve_seed(&config);
    config.seed = Some(seed);

    let (mut rng, counts) = run_setup(&config, seed, run);
    let detail = simulate_run_detailed(run, counts, config.sprint_capacity, &mut rng)
        .unwrap_or_else(|e| fail(e));

    if json {
        print_json(seed, &detail);
    } else {
        print_detail(seed, &detail);
    }
}

fn print_json(seed: u64, detail: &RunDetail) {
    let value = serde_json::json!({
        "seed": seed,
        "report": detail.report,
        "general": detail.general.changes,
        "incoming": detail.incoming.changes,
        "phases": detail.sequential.trace(),
        "sprints": detail.iterative.sprints(),
    });
    match serde_json::to_string_pretty(&value) {
        Ok(s) => println!("{s}"),
        Err(e) => fail(e),
    }
}

fn print_detail(seed: u64, detail: &RunDetail) {
    let r = &detail.report;
    println!("Run {} (seed {seed})", r.run);
    println!(
        "  Architecture: {} modules, {} dependencies, coupling degree {:.3}",
        detail.architecture.module_count(),
        detail.architecture.dependency_count(),
        r.coupling_degree
    );

    println!(
        "\nGeneral changes: {} (effort {:.1})",
        r.general_changes, r.general_effort
    );
    print_changes(&detail.general.changes, false);
    println!(
        "\nIncoming changes: {} (effort {:.1})",
        r.incoming_changes, r.incoming_effort
    );
    print_changes(&detail.incoming.changes, true);

    println!("\nSequential phases");
    println!(
        "  {:<16} {:>10} {:>10} {:>10}  {}",
        "Phase", "Start", "End", "Effort", "Absorbed"
    );
    println!("  {}", "-".repeat(64));
    for p in detail.sequential.trace() {
        let phase = if p.rerun {
            format!("{} (re-run)", p.phase)
        } else {
            p.phase.to_string()
        };
        println!(
            "  {:<16} {:>10.1} {:>10.1} {:>10.1}  {}",
            phase,
            p.start,
            p.end,
            p.effort,
            join_ids(&p.absorbed)
        );
    }

    println!("\nIterative sprints");
    println!(
        "  {:>6} {:>10} {:>10}  {:<24} {}",
        "Sprint", "Start", "Capacity", "Completed", "Carried"
    );
    println!("  {}", "-".repeat(64));
    for s in detail.iterative.sprints() {
        let carried = s
            .carried
            .as_ref()
            .map_or_else(String::new, |c| format!("#{} ({:.1})", c.id, c.effort));
        println!(
            "  {:>6} {:>10.1} {:>10.1}  {:<24} {}",
            s.index,
            s.start,
            s.capacity,
            join_ids(&s.completed),
            carried
        );
    }

    println!("\nOutcome");
    println!("  {:<12} {:>12} {:>14}", "Process", "End effort", "Avg duration");
    println!(
        "  {:<12} {:>12.1} {:>14.1}",
        "sequential", r.sp_end_effort, r.sp_avg_duration
    );
    println!(
        "  {:<12} {:>12.1} {:>14.1}",
        "iterative", r.ip_end_effort, r.ip_avg_duration
    );
    if let Some(kind) = r.winner_by_effort() {
        println!("  Lower effort: {kind}");
    }
}

fn print_changes(changes: &[Change], with_arrival: bool) {
    for c in changes {
        if with_arrival {
            println!(
                "  #{:<4} {:<7} effort {:>7.1}  arrives {:>8.1}",
                c.id,
                c.change_type.to_string(),
                c.effort,
                c.arrival
            );
        } else {
            println!(
                "  #{:<4} {:<7} effort {:>7.1}",
                c.id,
                c.change_type.to_string(),
                c.effort
            );
        }
    }
}

fn join_ids(ids: &[u32]) -> String {
    ids.iter()
        .map(|id| format!("#{id}"))
        .collect::<Vec<_>>()
        .join(" ")
}
