//! CLI-specific error types and exit code mapping

use faascheck_core::error::FaascheckError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unknown suite, fault class or section name on the command line.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The run finished and recorded at least one FAIL outcome.
    #[error("{failed} of {total} checks failed")]
    ChecksFailed { failed: usize, total: usize },

    /// The gateway or the orchestration backend could not be reached.
    #[error("environment unavailable: {0}")]
    EnvironmentUnavailable(String),

    /// The run was stopped by SIGINT/SIGTERM.
    #[error("run interrupted")]
    Interrupted,

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (report write, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                              |
    /// |------|--------------------------------------|
    /// | 0    | Success (SKIP never fails a run)     |
    /// | 1    | At least one FAIL / command error    |
    /// | 2    | Configuration or argument error      |
    /// | 3    | Gateway or cluster unreachable       |
    /// | 10   | IO error                             |
    /// | 130  | Interrupted by signal                |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::InvalidArgument(_) => 2,
            Self::EnvironmentUnavailable(_) => 3,
            Self::Io(_) => 10,
            Self::Interrupted => 130,
            Self::ChecksFailed { .. } | Self::JsonSerialize(_) | Self::Command(_) => 1,
        }
    }
}

impl From<FaascheckError> for CliError {
    fn from(e: FaascheckError) -> Self {
        match e {
            FaascheckError::Config(e) => Self::Config(e.to_string()),
            FaascheckError::EnvironmentUnavailable { component, reason } => {
                Self::EnvironmentUnavailable(format!("{component}: {reason}"))
            }
            FaascheckError::Cancelled => Self::Interrupted,
            FaascheckError::Io(e) => Self::Io(e),
            other => Self::Command(other.to_string()),
        }
    }
}

impl From<faascheck_engine::EngineError> for CliError {
    fn from(e: faascheck_engine::EngineError) -> Self {
        FaascheckError::from(e).into()
    }
}
