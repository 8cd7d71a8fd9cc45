use std::future::Future;
use std::time::Instant;

use tracing::Instrument;
use uuid::Uuid;

/// Identifier attached to every log line of one invocation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Creates a new random run ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First 8 hex digits, enough to tell runs apart in a log file
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over `verbose`.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let default_level = if verbose { "curator=debug" } else { "curator=info" };

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}

/// Root span for one invocation of a binary
pub fn run_span(component: &'static str, run_id: &RunId) -> tracing::Span {
    tracing::info_span!("run", component, run_id = %run_id.short())
}

/// Runs `fut` inside a `step` span, logging start and elapsed time
pub async fn step<F, T>(name: &'static str, fut: F) -> T
where
    F: Future<Output = T>,
{
    let span = tracing::info_span!("step", step = name);
    async move {
        let started = Instant::now();
        tracing::info!("Step started");
        let out = fut.await;
        tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "Step finished");
        out
    }
    .instrument(span)
    .await
}
