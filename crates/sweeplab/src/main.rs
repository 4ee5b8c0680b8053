use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sweeplab::commands::{self, RunOptions};
use sweeplab::{DataDirectory, init_logging};
use sweeplab_core::formula::FormulaKind;
use sweeplab_core::store::RunId;

#[derive(Parser, Debug)]
#[command(name = "sweeplab")]
#[command(about = "Run parameter sweeps and browse their results")]
struct Args {
    /// Path to the data directory (default: ~/.sweeplab/)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Expand a parameter file and run every series
    Run {
        /// YAML or JSON parameter file
        params: PathBuf,

        /// Formula set (energy, random); overrides config.yaml
        #[arg(short, long)]
        formula: Option<FormulaKind>,

        /// Don't print the log while waiting, only the final summary
        #[arg(long)]
        no_follow: bool,
    },
    /// Print the series a parameter file expands to
    Expand { params: PathBuf },
    /// Show the log of a run
    Log {
        #[arg(value_parser = RunId::parse)]
        run_id: RunId,
    },
    /// List runs, oldest first
    Runs,
    /// Print the merged results of every run as CSV
    History {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        export: Option<PathBuf>,
    },
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let data_dir = DataDirectory::new(args.data_dir.unwrap_or_else(DataDirectory::default_path));

    init_logging(data_dir.root(), &args.log_level)?;
    let config = data_dir.load_config()?;
    tracing::debug!(?config, "Loaded configuration");

    let mut out = std::io::stdout().lock();
    let runs = data_dir.runs();

    match args.command {
        Command::Run {
            params,
            formula,
            no_follow,
        } => {
            let options = RunOptions {
                formula,
                follow: !no_follow,
                ..Default::default()
            };
            commands::run(&data_dir, &config, &params, &options, &mut out)?;
        }
        Command::Expand { params } => commands::expand_file(&params, &mut out)?,
        Command::Log { run_id } => commands::show_log(&runs, &run_id, &mut out)?,
        Command::Runs => commands::list_runs(&runs, &mut out)?,
        Command::History { export } => commands::history(&runs, export.as_deref(), &mut out)?,
    }

    tracing::info!("Done");
    Ok(())
}
