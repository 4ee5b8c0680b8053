//! Subcommand implementations.
//!
//! Output goes to a caller-supplied writer so commands can be exercised
//! against a buffer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use color_eyre::eyre::{WrapErr, eyre};
use sweeplab_core::formula::FormulaKind;
use sweeplab_core::history::load_history;
use sweeplab_core::runner::{RunState, SeriesRunner};
use sweeplab_core::session::SweepSession;
use sweeplab_core::spec::ParameterFile;
use sweeplab_core::store::{RunId, RunsDirectory};
use sweeplab_core::sweep::expand;

use crate::config::{AppConfig, DataDirectory};

/// How often `run` re-reads the log while waiting
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Options of the `run` subcommand
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Overrides the configured formula set
    pub formula: Option<FormulaKind>,
    /// Print the log as it grows; otherwise only the final summary
    pub follow: bool,
    pub poll_interval: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            formula: None,
            follow: true,
            poll_interval: POLL_INTERVAL,
        }
    }
}

/// Expand a parameter file and run it.
pub fn run(
    data_dir: &DataDirectory,
    config: &AppConfig,
    params: &Path,
    options: &RunOptions,
    out: &mut impl Write,
) -> color_eyre::Result<()> {
    let file = ParameterFile::load(params)
        .wrap_err_with(|| format!("Cannot load parameters from {}", params.display()))?;

    let formula = options.formula.unwrap_or(config.formula);
    let runs = data_dir.runs();
    let runner = SeriesRunner::new(runs.clone(), formula.build(), config.runner_config());

    let mut session = SweepSession::new(runner);
    let summary = session.load_parameters(file)?;
    writeln!(out, "Loaded {summary}")?;

    let Some(started) = session.run_now()? else {
        writeln!(out, "Empty sweep: nothing to run.")?;
        return Ok(());
    };
    writeln!(
        out,
        "Started run {} ({} series, formulas: {formula})",
        started.run_id, started.series_count
    )?;

    let handle = session
        .take_handle(&started.run_id)
        .ok_or_else(|| eyre!("run {} is not tracked", started.run_id))?;

    if options.follow {
        follow_log(
            &runs,
            &started.run_id,
            options.poll_interval,
            || handle.is_finished(),
            out,
        )?;
    }

    // The process must outlive the run thread, so always wait for it
    let (state, summary) = handle.wait();
    writeln!(
        out,
        "{} of {} series succeeded, {} skipped",
        summary.succeeded, summary.total, summary.failed
    )?;

    if state == RunState::Failed {
        return Err(eyre!("run {} failed", started.run_id));
    }
    Ok(())
}

/// Print log text as it is appended until the run's terminal marker shows up
/// or `finished` reports that the run is over.
pub fn follow_log(
    runs: &RunsDirectory,
    id: &RunId,
    interval: Duration,
    finished: impl Fn() -> bool,
    out: &mut impl Write,
) -> color_eyre::Result<()> {
    let mut printed = 0;
    loop {
        // Sampled before reading so the final read sees every line written
        let over = finished();
        let progress = runs
            .progress(id)?
            .ok_or_else(|| eyre!("run {id} not found"))?;

        if let Some(new) = progress.log.get(printed..) {
            out.write_all(new.as_bytes())?;
            out.flush()?;
        }
        printed = progress.log.len();

        if !progress.running || over {
            return Ok(());
        }
        thread::sleep(interval);
    }
}

/// Print the series a parameter file expands to, without running anything.
pub fn expand_file(params: &Path, out: &mut impl Write) -> color_eyre::Result<()> {
    let spec = ParameterFile::load(params)
        .wrap_err_with(|| format!("Cannot load parameters from {}", params.display()))?
        .to_spec()?;

    let sweep = expand(&spec)?;
    for (i, series) in sweep.iter().enumerate() {
        writeln!(out, "{:>4}: {series}", i + 1)?;
    }
    writeln!(out, "{} series", sweep.len())?;
    Ok(())
}

/// Print a run's log and whether it is still going.
pub fn show_log(runs: &RunsDirectory, id: &RunId, out: &mut impl Write) -> color_eyre::Result<()> {
    let progress = runs
        .progress(id)?
        .ok_or_else(|| eyre!("run {id} not found"))?;

    out.write_all(progress.log.as_bytes())?;
    if progress.running {
        writeln!(out, "(still running)")?;
    }
    Ok(())
}

/// List runs, oldest first, with their status and row count.
pub fn list_runs(runs: &RunsDirectory, out: &mut impl Write) -> color_eyre::Result<()> {
    let ids = runs.list_runs()?;
    if ids.is_empty() {
        writeln!(out, "No runs in {}", runs.root().display())?;
        return Ok(());
    }

    for id in ids {
        let files = runs.run(&id)?;
        let status = match runs.progress(&id)? {
            Some(p) if p.running => "running",
            _ => "finished",
        };
        let rows = match files.read_results() {
            Ok(table) => table.map_or(0, |t| t.len()).to_string(),
            Err(e) => {
                tracing::warn!(run_id = %id, error = %e, "Unreadable results store");
                "?".to_string()
            }
        };
        writeln!(out, "{id}  {status:<8}  {rows} rows")?;
    }
    Ok(())
}

/// Print the merged history as CSV, or write it to `export`.
pub fn history(
    runs: &RunsDirectory,
    export: Option<&Path>,
    out: &mut impl Write,
) -> color_eyre::Result<()> {
    let view = load_history(runs);

    match export {
        Some(path) => {
            let file = File::create(path)
                .wrap_err_with(|| format!("Cannot create {}", path.display()))?;
            view.write_csv(BufWriter::new(file))?;
            writeln!(
                out,
                "Exported {} rows from {} runs to {}",
                view.len(),
                view.runs().len(),
                path.display()
            )?;
        }
        None if view.is_empty() => writeln!(out, "No results yet.")?,
        None => view.write_csv(out)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const PARAMS: &str = "m: [1, 2]\ng: 9.8\nh: 1\nV: 2\nT: 25\nSPECIFIC_HEAT: 1\n";

    fn instant_config() -> AppConfig {
        AppConfig {
            step_delay_ms: 0,
            series_delay_ms: 0,
            ..Default::default()
        }
    }

    fn fast_options() -> RunOptions {
        RunOptions {
            poll_interval: Duration::from_millis(5),
            ..Default::default()
        }
    }

    fn setup(params: &str) -> (TempDir, DataDirectory, std::path::PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = DataDirectory::new(temp_dir.path().join("data"));
        let params_path = temp_dir.path().join("params.yaml");
        fs::write(&params_path, params).unwrap();
        (temp_dir, data_dir, params_path)
    }

    #[test]
    fn test_run_and_wait() {
        let (_temp, data_dir, params) = setup(PARAMS);
        let mut out = Vec::new();

        run(&data_dir, &instant_config(), &params, &fast_options(), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Started run"));
        assert!(text.contains("=== Series 2 ==="));
        assert!(text.contains("ALL SERIES COMPLETE"));
        assert!(text.contains("2 of 2 series succeeded, 0 skipped"));
        // Log text is printed exactly once
        assert_eq!(text.matches("=== Series 1 ===").count(), 1);
    }

    #[test]
    fn test_run_without_follow() {
        let (_temp, data_dir, params) = setup(PARAMS);
        let options = RunOptions {
            follow: false,
            ..fast_options()
        };
        let mut out = Vec::new();

        run(&data_dir, &instant_config(), &params, &options, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("=== Series"));
        assert!(text.ends_with("2 of 2 series succeeded, 0 skipped\n"));
    }

    #[test]
    fn test_run_empty_sweep() {
        let (_temp, data_dir, params) = setup("m: []\ng: 9.8\n");
        let mut out = Vec::new();

        run(&data_dir, &instant_config(), &params, &fast_options(), &mut out).unwrap();

        assert!(String::from_utf8(out).unwrap().contains("Empty sweep"));
        assert!(data_dir.runs().list_runs().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_parameters() {
        let (_temp, data_dir, params) = setup("m: [1, 2\n");
        let mut out = Vec::new();

        assert!(run(&data_dir, &instant_config(), &params, &fast_options(), &mut out).is_err());
        assert!(data_dir.runs().list_runs().unwrap().is_empty());
    }

    #[test]
    fn test_expand_prints_every_series() {
        let (_temp, _data_dir, params) = setup("a: [1, 2]\nb: [3, 4]\n");
        let mut out = Vec::new();

        expand_file(&params, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "   1: a=1, b=3\n   2: a=1, b=4\n   3: a=2, b=3\n   4: a=2, b=4\n4 series\n"
        );
    }

    #[test]
    fn test_runs_log_and_history() {
        let (temp, data_dir, params) = setup(PARAMS);
        run(&data_dir, &instant_config(), &params, &fast_options(), &mut Vec::new()).unwrap();
        let runs = data_dir.runs();
        let id = runs.list_runs().unwrap().remove(0);

        let mut out = Vec::new();
        list_runs(&runs, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("{id}  finished  2 rows\n")
        );

        let mut out = Vec::new();
        show_log(&runs, &id, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Total series: 2\n"));
        assert!(!text.contains("still running"));

        let mut out = Vec::new();
        history(&runs, None, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("series,m,g,h,V,T,SPECIFIC_HEAT,E_pot,E_kin,E_total,Q,run\n"));
        assert_eq!(text.lines().count(), 3);

        let export = temp.path().join("history.csv");
        history(&runs, Some(&export), &mut Vec::new()).unwrap();
        assert_eq!(fs::read_to_string(&export).unwrap(), text);
    }

    #[test]
    fn test_follow_stops_when_run_is_over_without_marker() {
        let temp = TempDir::new().unwrap();
        let runs = RunsDirectory::new(temp.path());
        let files = runs.create_run().unwrap();
        files.append_log("Total series: 1").unwrap();
        files.append_log("=== Series 1 ===").unwrap();

        let mut out = Vec::new();
        follow_log(
            &runs,
            files.id(),
            Duration::from_millis(1),
            || true,
            &mut out,
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Total series: 1\n=== Series 1 ===\n"
        );
    }

    #[test]
    fn test_oversized_sweep_is_refused() {
        let (_temp, data_dir, params) = setup(
            "parameters:\n  a: {min: 1, max: 100000, sweep: true}\n  b: {min: 1, max: 100000, sweep: true}\n",
        );
        assert!(run(&data_dir, &instant_config(), &params, &fast_options(), &mut Vec::new()).is_err());
        assert!(expand_file(&params, &mut Vec::new()).is_err());
        assert!(data_dir.runs().list_runs().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_run() {
        let (_temp, data_dir, _params) = setup(PARAMS);
        let id = RunId::parse("2000-01-01_00-00-00").unwrap();
        assert!(show_log(&data_dir.runs(), &id, &mut Vec::new()).is_err());
    }
}
