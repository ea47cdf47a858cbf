use thiserror::Error;

use crate::upload::SlotKey;
use crate::utils::file_size::FileSizeUtils;

/// Rejection reasons for a candidate upload file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No file selected.")]
    NoFileSelected,

    #[error("Please upload a file with one of the allowed types: {accept}.")]
    UnsupportedType { accept: String },

    #[error(
        "File size should be less than {} ({} given).",
        FileSizeUtils::format_size(*limit),
        FileSizeUtils::format_size(*size)
    )]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Only one file is allowed in slot {slot} ({given} given).")]
    TooManyFiles { slot: SlotKey, given: usize },
}

/// Failures talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend answered with status {status}: {message}")]
    Status { status: u16, message: String },

    /// The backend answered 2xx but reported an `error` field.
    #[error("backend error: {0}")]
    Backend(String),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("could not read upload file: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected response body: {0}")]
    UnexpectedBody(String),
}

/// Rejected wizard transitions. Each one is surfaced to the user as a warning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WizardError {
    #[error("the upload wizard is not open")]
    NotOpen,

    #[error("Please upload a file to continue ({0})")]
    SlotEmpty(SlotKey),

    #[error("Please upload a file to continue (step {})", .0 + 1)]
    StepEmpty(usize),

    #[error("already at the first step")]
    AtFirstStep,

    #[error("already at the last step")]
    AtLastStep,

    #[error("step {0} cannot be selected")]
    StepUnavailable(usize),

    #[error("submit is only available on the last step")]
    NotLastStep,

    #[error("Cannot close while uploading.")]
    CloseWhileSubmitting,

    #[error("an upload is in progress")]
    SubmissionInProgress,

    #[error("no submission is in progress")]
    NotSubmitting,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    #[error("an upload is already in flight")]
    AlreadyInFlight,

    #[error("nothing selected for upload")]
    NothingToSubmit,
}

/// Why a test list poll produced no rows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Failed to fetch tests: {0}")]
    Backend(String),

    #[error("Error loading tests: {0}")]
    Fetch(String),

    #[error("Failed to fetch tests: response carried no test list")]
    MissingTests,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}
