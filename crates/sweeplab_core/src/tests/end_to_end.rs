//! End-to-end: parameter document, expansion, run, results store and history.

use tempfile::TempDir;

use super::{assert_close, energy_runner};
use crate::history::load_history;
use crate::session::SweepSession;
use crate::spec::ParameterFile;
use crate::store::RunsDirectory;
use crate::sweep::expand;

const FLAT_SWEEP: &str = "m: [1, 2]\ng: 9.8\nh: [1, 2]\nV: 3\nT: 25\nSPECIFIC_HEAT: 1\n";

#[test]
fn test_flat_sweep_end_to_end() {
    let temp = TempDir::new().unwrap();
    let runs = RunsDirectory::new(temp.path());

    let spec = ParameterFile::from_yaml(FLAT_SWEEP)
        .unwrap()
        .to_spec()
        .unwrap();
    let sweep = expand(&spec).unwrap();
    assert_eq!(sweep.len(), 4);

    let handle = energy_runner(runs.clone())
        .start(sweep.into_series())
        .unwrap()
        .unwrap();
    let id = handle.id().clone();
    let summary = handle.join();
    assert_eq!(summary.succeeded, 4);

    let table = runs.run(&id).unwrap().read_results().unwrap().unwrap();
    assert_eq!(table.len(), 4);

    // (m, h) in enumeration order
    let expected_inputs = [(1.0, 1.0), (1.0, 2.0), (2.0, 1.0), (2.0, 2.0)];
    for (row, (m, h)) in expected_inputs.iter().enumerate() {
        assert_eq!(table.value(row, "series"), Some((row + 1) as f64));
        assert_eq!(table.value(row, "m"), Some(*m));
        assert_eq!(table.value(row, "h"), Some(*h));

        let e_pot = m * 9.8 * h;
        let e_kin = 0.5 * m * 9.0;
        assert_close(table.value(row, "E_pot").unwrap(), e_pot);
        assert_close(table.value(row, "E_kin").unwrap(), e_kin);
        assert_close(table.value(row, "E_total").unwrap(), e_pot + e_kin);
        assert_close(table.value(row, "Q").unwrap(), m * 5.0);
    }

    let progress = runs.progress(&id).unwrap().unwrap();
    assert!(!progress.running);
    assert_eq!(progress.log.matches(" complete.").count(), 4);

    assert_eq!(load_history(&runs).len(), 4);
}

#[test]
fn test_structured_file_through_session() {
    let temp = TempDir::new().unwrap();
    let runs = RunsDirectory::new(temp.path());
    let mut session = SweepSession::new(energy_runner(runs.clone()));

    let document = r#"
parameters:
  m:
    name: Mass
    unit: kg
    min: 1
    max: 3
    step: 1
    sweep: true
  V:
    min: 0
    max: 10
    default: 4
constants:
  g:
    name: Gravity
    value: 9.8
  h:
    value: 3
  T:
    value: 30
  SPECIFIC_HEAT:
    value: 1
"#;
    let summary = session
        .load_parameters(ParameterFile::from_yaml(document).unwrap())
        .unwrap();
    assert_eq!(summary.parameters, 2);
    assert_eq!(summary.constants, 4);
    assert_eq!(session.pending_series().len(), 3);

    let started = session.run_now().unwrap().unwrap();
    assert_eq!(started.series_count, 3);
    session.take_handle(&started.run_id).unwrap().join();

    let view = load_history(&runs);
    assert_eq!(view.len(), 3);
    assert_eq!(
        view.column("m").unwrap(),
        vec![Some(1.0), Some(2.0), Some(3.0)]
    );
    assert_eq!(view.column("V").unwrap(), vec![Some(4.0); 3]);
    // m=2 row: E_pot = 2 * 9.8 * 3
    assert_close(view.rows()[1].values[view_index(&view, "E_pot")].unwrap(), 58.8);
}

#[test]
fn test_empty_sweep_through_session() {
    let temp = TempDir::new().unwrap();
    let runs = RunsDirectory::new(temp.path());
    let mut session = SweepSession::new(energy_runner(runs.clone()));

    session
        .load_parameters(ParameterFile::from_yaml("m: []\ng: 9.8\n").unwrap())
        .unwrap();
    assert!(session.pending_series().is_empty());
    assert!(session.run_now().unwrap().is_none());
    assert!(runs.list_runs().unwrap().is_empty());
}

fn view_index(view: &crate::history::HistoryView, column: &str) -> usize {
    view.columns().iter().position(|c| c == column).unwrap()
}
