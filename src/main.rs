use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::Instrument;

use curator::{
    error::{exit_code_for, until_interrupted},
    services::pipeline::{self, RunContext},
    telemetry, Config,
};

/// Curate the recommendation collection from a just-watched title
#[derive(Debug, Parser)]
#[command(name = "curator", version)]
struct Args {
    /// Title that was just watched
    title: String,

    /// Media type reported by the player; only `movie` is curated
    media_type: String,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let ctx = RunContext::from_config(config).context("Failed to build service clients")?;
    let span = telemetry::run_span("curator", &ctx.run_id);

    let summary = until_interrupted(
        async {
            let summary = pipeline::run_pipeline(&ctx, &args.title, &args.media_type)
                .instrument(span)
                .await?;
            Ok::<_, anyhow::Error>(summary)
        },
        tokio::signal::ctrl_c(),
    )
    .await?;

    tracing::debug!(?summary, "Pipeline finished");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    telemetry::init_tracing(args.verbose);

    if !pipeline::is_curatable(&args.media_type) {
        tracing::info!(title = %args.title, media_type = %args.media_type, "Skipping non-movie media");
        return ExitCode::SUCCESS;
    }

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            if code == 130 {
                tracing::warn!("Interrupted by user");
            } else {
                tracing::error!(error = %format!("{:#}", e), "Curation run failed");
            }
            ExitCode::from(code)
        }
    }
}
