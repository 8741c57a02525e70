//! `changesim compare`: comparison battery over a saved results.csv.

use std::path::Path;

use changesim_core::read_results;
use changesim_core::results::RESULTS_FILE;

use super::{comparisons, fail, print_comparisons, print_summary};

pub fn run(path: &Path, json: bool) {
    let file = if path.is_dir() {
        path.join(RESULTS_FILE)
    } else {
        path.to_path_buf()
    };
    let reports = read_results(&file)
        .unwrap_or_else(|e| fail(format!("reading {}: {e}", file.display())));
    if reports.is_empty() {
        fail(format!("{} contains no runs", file.display()));
    }

    if json {
        let value: serde_json::Map<String, serde_json::Value> = comparisons(&reports)
            .into_iter()
            .map(|(metric, results)| (metric.replace(' ', "_"), serde_json::json!(results)))
            .collect();
        match serde_json::to_string_pretty(&value) {
            Ok(s) => println!("{s}"),
            Err(e) => fail(e),
        }
        return;
    }

    println!("{} runs from {}\n", reports.len(), file.display());
    print_summary(&reports);
    print_comparisons(&reports);
}
