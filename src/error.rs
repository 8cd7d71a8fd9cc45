use std::future::Future;
use std::process::ExitCode;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Interrupted by user")]
    Interrupted,
}

impl AppError {
    /// Process exit status for an error that reached the entry point
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Interrupted => 130,
            _ => 1,
        }
    }
}

impl From<AppError> for ExitCode {
    fn from(err: AppError) -> Self {
        ExitCode::from(err.exit_code())
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Exit status for an error returned by a binary's `run`, looking through any context
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<AppError>().map_or(1, AppError::exit_code)
}

/// Races `work` against `interrupt`; the interrupt resolves to [`AppError::Interrupted`]
pub async fn until_interrupted<T, W, I>(work: W, interrupt: I) -> anyhow::Result<T>
where
    W: Future<Output = anyhow::Result<T>>,
    I: Future,
{
    tokio::select! {
        result = work => result,
        _ = interrupt => Err(AppError::Interrupted.into()),
    }
}
