//! Typed error hierarchy for the release gate.
//!
//! Four enums cover the four layers:
//! - `StepError`: why a single pipeline step failed
//! - `ToolError`: invocation failures of external collaborators (git, npm, HTTP)
//! - `PackageError`: package descriptor discovery and parsing
//! - `ConfigError`: configuration that is rejected before the pipeline starts

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a step body. Caught exactly once, by the engine.
#[derive(Debug, Error)]
pub enum StepError {
    /// A precondition does not hold. The message is surfaced verbatim.
    #[error("{0}")]
    Assertion(String),

    /// An external collaborator failed; `context` names the operation and target.
    #[error("{context}: {source}")]
    Tool {
        context: String,
        #[source]
        source: ToolError,
    },

    /// The package descriptor exists but could not be read.
    #[error(transparent)]
    Package(#[from] PackageError),

    /// A step read a context slot that no earlier step populated.
    #[error("Context slot `{0}` was not set by an earlier step")]
    MissingContext(&'static str),
}

impl StepError {
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion(message.into())
    }

    pub fn tool(context: impl Into<String>, source: ToolError) -> Self {
        Self::Tool {
            context: context.into(),
            source,
        }
    }
}

/// Fail with an assertion message unless `condition` holds.
///
/// The message closure is only evaluated on failure.
pub fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), StepError> {
    if condition {
        Ok(())
    } else {
        Err(StepError::Assertion(message()))
    }
}

/// Errors from invoking git, npm or probing the network.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with code {code}: {stderr}")]
    NonZeroExit {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("Unexpected output from `{command}`: {detail}")]
    UnexpectedOutput { command: String, detail: String },

    #[error("Invalid JSON from `{command}`: {source}")]
    Json {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("HTTP client error: {0}")]
    Http(#[source] reqwest::Error),
}

impl ToolError {
    /// Stderr of a command that exited non-zero, if that is what happened.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            ToolError::NonZeroExit { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

/// Errors from locating or reading `package.json`.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid version range for {option}: '{range}'")]
    InvalidRange { option: &'static str, range: String },

    #[error("Invalid value '{value}' for {option}. Valid values: {expected}")]
    InvalidValue {
        option: &'static str,
        value: String,
        expected: &'static str,
    },
}
