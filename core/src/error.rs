use crate::types::UserId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed row in {source_name}: {source}")]
    Csv {
        source_name: String,
        #[source]
        source: csv::Error,
    },

    #[error("Unparseable date '{value}' in {source_name} at row {line}")]
    DateParse {
        source_name: String,
        line: usize,
        value: String,
    },

    #[error("User {user_id} references unknown plan '{plan_name}'")]
    UnknownPlan { user_id: UserId, plan_name: String },

    #[error("Usage recorded for unknown user {user_id}")]
    UnknownUser { user_id: UserId },

    #[error("Plan '{plan_name}' is not in the rate table")]
    PlanNotFound { plan_name: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Plan '{plan_name}' appears more than once in the rate table")]
    DuplicatePlan { plan_name: String },

    #[error("User {user_id} appears more than once in the user table")]
    DuplicateUser { user_id: UserId },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// Integrity failures are the ones the exclude policy may absorb.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::UnknownPlan { .. } | Self::UnknownUser { .. }
        )
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
