use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::Instrument;

use curator::{
    error::{exit_code_for, until_interrupted},
    services::{providers::PlexLibrary, OffPeakRefresher},
    telemetry::{self, RunId},
    Config,
};

/// Rebuild the recommendation collection from stored scores in shuffled order
#[derive(Debug, Parser)]
#[command(name = "curator-refresher", version)]
struct Args {
    /// Resolve and log, but make no changes to the library
    #[arg(long)]
    dry_run: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let library = PlexLibrary::new(
        config.plex_url.clone(),
        config.plex_token.clone(),
        config.movie_library_name.clone(),
    )
    .context("Failed to build library client")?;

    let run_id = RunId::new();
    let span = telemetry::run_span("refresher", &run_id);
    if args.dry_run {
        tracing::warn!("Dry run, no changes will be made to the library");
    }

    let refresher = OffPeakRefresher::new(&library, config.points_file.clone(), config.collection_name.clone())
        .with_snapshot(config.collection_state_file.clone())
        .dry_run(args.dry_run);

    let summary = until_interrupted(
        async { Ok::<_, anyhow::Error>(refresher.run().instrument(span).await?) },
        tokio::signal::ctrl_c(),
    )
    .await?;

    tracing::debug!(?summary, "Refresher finished");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    telemetry::init_tracing(args.verbose);

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            if code == 130 {
                tracing::warn!("Interrupted by user");
            } else {
                tracing::error!(error = %format!("{:#}", e), "Refresher failed");
            }
            ExitCode::from(code)
        }
    }
}
