use thiserror::Error;

#[derive(Debug, Error)]
pub enum EstimatorError {
    #[error("not initialized: run 'estimator init'")]
    NotInitialized,

    #[error("unknown question: {0}")]
    UnknownField(String),

    #[error("invalid value '{value}' for {field}")]
    InvalidValue { field: String, value: String },

    #[error("{field} is a {actual} question, expected {expected}")]
    WrongStepKind {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("step incomplete: {message}")]
    StepIncomplete { field: String, message: String },

    #[error("submit is only available on the review step (current step: {0})")]
    NotAtReview(usize),

    #[error("invalid slug '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidSlug(String),

    #[error("content query failed: {0}")]
    Content(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("report template: {0}")]
    Template(#[from] tera::Error),
}

pub type Result<T> = std::result::Result<T, EstimatorError>;
