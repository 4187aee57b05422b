//! Typed error hierarchy for the paper-to-code pipeline.
//!
//! Four enums follow the failure taxonomy of a run:
//! - `ConfigError`: malformed inputs or upstream artifacts, raised before any paid call
//! - `GatewayError`: transport/auth/rate-limit failures from the completion service
//! - `ResponseShapeError`: a completion response that cannot be normalized
//! - `StageError`: everything a stage runner can surface, wrapping the above

use std::path::PathBuf;
use thiserror::Error;

/// Maximum number of characters of offending content quoted in a diagnostic.
pub const PREVIEW_CHARS: usize = 500;

/// Truncate `text` to at most [`PREVIEW_CHARS`] characters for diagnostics.
pub fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

/// Fatal configuration errors. The binary reports these and exits with code 0.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid paper format '{0}'. Please select either 'JSON' or 'LaTeX'.")]
    InvalidPaperFormat(String),

    #[error("Missing input {what}: {path}")]
    MissingInput { what: &'static str, path: PathBuf },

    #[error("Task list could not be parsed: {0}. Please re-generate the planning.")]
    UnparseableTaskList(String),

    #[error("'{key}' does not exist. Please re-generate the planning.")]
    MissingTaskListKey { key: &'static str },

    #[error("Planning trajectory has {found} assistant turns, expected at least {expected}")]
    IncompletePlanning { found: usize, expected: usize },

    #[error("No fenced yaml block found in the configuration planning turn")]
    MissingConfigBlock,

    #[error("No generated artifact for '{file}' at {path}")]
    MissingArtifact { file: String, path: PathBuf },

    #[error("Missing API key: environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("Invalid settings in {path}: {message}")]
    InvalidSettings { path: PathBuf, message: String },
}

/// Errors from the completion service round trip.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("unreadable response body: {0}")]
    InvalidBody(String),
}

/// A completion response whose shape could not be normalized into a record.
#[derive(Debug, Error)]
pub enum ResponseShapeError {
    #[error("Completion text is not valid JSON ({source}); content: {preview}")]
    InvalidJson {
        preview: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot convert completion of type {type_name} to a record; content: {preview}")]
    Unrecognized { type_name: String, preview: String },

    #[error("Completion response has no choices")]
    NoChoices,
}

/// Errors surfaced by a stage runner. Any of these aborts the stage.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("completion call failed for {file}: {source}")]
    Gateway {
        file: String,
        #[source]
        source: GatewayError,
    },

    #[error("unrecognized completion response: {0}")]
    ResponseShape(#[from] ResponseShapeError),

    #[error(
        "Context for {file} is {chars} characters, over the {limit} character budget; \
         shorten the task list or raise [context].limit"
    )]
    ContextBudgetExceeded {
        file: String,
        chars: usize,
        limit: usize,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Find a configuration error anywhere in an error chain.
///
/// Used by the binary to decide between the diagnostic-and-exit-0 path and a
/// regular failure exit.
pub fn find_config_error(err: &anyhow::Error) -> Option<&ConfigError> {
    err.chain().find_map(|cause| {
        cause.downcast_ref::<ConfigError>().or_else(|| match cause.downcast_ref::<StageError>() {
            Some(StageError::Config(inner)) => Some(inner),
            Some(StageError::Other(inner)) => find_config_error(inner),
            _ => None,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_task_list_key_names_the_key() {
        let err = ConfigError::MissingTaskListKey { key: "Task list" };
        let msg = err.to_string();
        assert!(msg.contains("'Task list' does not exist"));
        assert!(msg.contains("re-generate the planning"));
    }

    #[test]
    fn test_invalid_paper_format_names_value() {
        let err = ConfigError::InvalidPaperFormat("PDF".into());
        assert!(err.to_string().contains("'PDF'"));
    }

    #[test]
    fn test_stage_error_converts_from_config_error() {
        let err: StageError = ConfigError::MissingConfigBlock.into();
        assert!(matches!(err, StageError::Config(ConfigError::MissingConfigBlock)));
    }

    #[test]
    fn test_budget_exceeded_carries_sizes() {
        let err = StageError::ContextBudgetExceeded {
            file: "train.py".into(),
            chars: 1200,
            limit: 1000,
        };
        let msg = err.to_string();
        assert!(msg.contains("train.py"));
        assert!(msg.contains("1200"));
        assert!(msg.contains("1000"));
    }

    #[test]
    fn test_find_config_error_through_stage_error() {
        let stage: StageError = ConfigError::UnparseableTaskList("eof".into()).into();
        let err = anyhow::Error::new(stage).context("analysis stage");
        let found = find_config_error(&err);
        assert!(matches!(found, Some(ConfigError::UnparseableTaskList(_))));
    }

    #[test]
    fn test_find_config_error_inside_wrapped_anyhow() {
        let inner = anyhow::Error::new(ConfigError::MissingConfigBlock).context("extracting");
        let err = anyhow::Error::new(StageError::Other(inner));
        assert!(matches!(
            find_config_error(&err),
            Some(ConfigError::MissingConfigBlock)
        ));
    }

    #[test]
    fn test_find_config_error_direct() {
        let err = anyhow::Error::new(ConfigError::MissingApiKey("OPENAI_API_KEY".into()));
        assert!(find_config_error(&err).is_some());
    }

    #[test]
    fn test_find_config_error_ignores_other_errors() {
        let err = anyhow::Error::new(StageError::ResponseShape(ResponseShapeError::NoChoices));
        assert!(find_config_error(&err).is_none());
    }

    #[test]
    fn test_preview_caps_length() {
        let long = "x".repeat(2 * PREVIEW_CHARS);
        assert_eq!(preview(&long).chars().count(), PREVIEW_CHARS);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn test_all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ConfigError::MissingConfigBlock);
        assert_std_error(&GatewayError::RateLimited { retry_after: None });
        assert_std_error(&ResponseShapeError::NoChoices);
        assert_std_error(&StageError::ContextBudgetExceeded {
            file: "a".into(),
            chars: 2,
            limit: 1,
        });
    }
}
