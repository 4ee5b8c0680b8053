//! Tests for the history aggregator
//!
//! These tests verify:
//! - Rows from every run are concatenated, oldest run first
//! - Runs without a results store contribute nothing
//! - Malformed stores are skipped instead of failing aggregation
//! - Repeated aggregation gives identical output

use std::fs;

use tempfile::TempDir;

use super::{energy_runner, energy_series};
use crate::history::load_history;
use crate::store::RunsDirectory;

fn run_to_completion(runs: &RunsDirectory, masses: &[f64]) {
    let series = masses
        .iter()
        .map(|m| energy_series(*m, 9.8, 1.0, 2.0, 25.0, 1.0))
        .collect();
    energy_runner(runs.clone())
        .start(series)
        .unwrap()
        .unwrap()
        .join();
}

#[test]
fn test_rows_from_all_runs() {
    let temp = TempDir::new().unwrap();
    let runs = RunsDirectory::new(temp.path());

    run_to_completion(&runs, &[1.0, 2.0]);
    run_to_completion(&runs, &[3.0]);

    let view = load_history(&runs);
    assert_eq!(view.len(), 3);
    assert_eq!(view.runs().len(), 2);
    assert_eq!(
        view.column("m").unwrap(),
        vec![Some(1.0), Some(2.0), Some(3.0)]
    );
    // Series indices restart per run
    assert_eq!(
        view.column("series").unwrap(),
        vec![Some(1.0), Some(2.0), Some(1.0)]
    );
}

#[test]
fn test_degrades_on_missing_and_malformed_stores() {
    let temp = TempDir::new().unwrap();
    let runs = RunsDirectory::new(temp.path());

    run_to_completion(&runs, &[1.0]);

    // A run that never completed a series
    let empty = runs.create_run().unwrap();
    empty.append_log("Total series: 1").unwrap();

    // A store that isn't numeric
    let broken = runs.create_run().unwrap();
    fs::write(broken.results_path(), "series,m\n1,heavy\n").unwrap();

    let view = load_history(&runs);
    assert_eq!(view.len(), 1);
    assert_eq!(view.column("m").unwrap(), vec![Some(1.0)]);
}

#[test]
fn test_aggregation_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let runs = RunsDirectory::new(temp.path());

    run_to_completion(&runs, &[1.0, 2.0]);
    run_to_completion(&runs, &[3.0, 4.0]);

    let first = load_history(&runs);
    let second = load_history(&runs);
    assert_eq!(first, second);

    let mut a = Vec::new();
    let mut b = Vec::new();
    first.write_csv(&mut a).unwrap();
    second.write_csv(&mut b).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_history_reflects_new_runs() {
    let temp = TempDir::new().unwrap();
    let runs = RunsDirectory::new(temp.path());

    run_to_completion(&runs, &[1.0]);
    assert_eq!(load_history(&runs).len(), 1);

    run_to_completion(&runs, &[2.0]);
    assert_eq!(load_history(&runs).len(), 2);
}

#[test]
fn test_plot_series_from_history() {
    let temp = TempDir::new().unwrap();
    let runs = RunsDirectory::new(temp.path());
    run_to_completion(&runs, &[3.0, 1.0, 2.0]);

    let view = load_history(&runs);
    // E_kin = 0.5 * m * 2^2 = 2m
    assert_eq!(
        view.xy("m", "E_kin").unwrap(),
        vec![(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)]
    );
    assert_eq!(view.xyz("m", "h", "E_pot").unwrap().len(), 3);
}
