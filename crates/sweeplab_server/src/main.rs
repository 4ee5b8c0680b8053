use std::path::PathBuf;

use clap::Parser;
use sweeplab_core::formula::FormulaKind;
use sweeplab_core::runner::RunnerConfig;
use sweeplab_core::store::RunsDirectory;
use sweeplab_server::app;
use sweeplab_server::state::AppState;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "sweeplab-server")]
#[command(about = "REST API for parameter sweeps")]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:3001")]
    bind: String,

    /// Directory holding the runs
    #[arg(short, long, default_value = "runs")]
    data_dir: PathBuf,

    /// Formula set (energy, random)
    #[arg(short, long, default_value = "energy")]
    formula: FormulaKind,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sweeplab_server=info,sweeplab_core=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let state = AppState::new(
        RunsDirectory::new(&args.data_dir),
        args.formula.build(),
        RunnerConfig::default(),
    );

    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        data_dir = %args.data_dir.display(),
        formula = %args.formula,
        "Listening"
    );
    axum::serve(listener, app(state)).await?;

    Ok(())
}
