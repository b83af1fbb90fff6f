use thiserror::Error;

pub type MixResult<T> = Result<T, MixError>;

#[derive(Error, Debug)]
pub enum MixError {
    #[error(
        "insufficient data for channel '{channel}': {positive_spend_days} positive-spend day(s), need at least 2"
    )]
    InsufficientData {
        channel: String,
        positive_spend_days: usize,
    },

    #[error("curve fit for channel '{channel}' did not converge within {iterations} iterations")]
    FitDivergence { channel: String, iterations: usize },

    #[error("invalid budget: {0}")]
    InvalidBudget(String),

    #[error(
        "allocation needs {required} increments but the ceiling is {ceiling}; use a coarser increment or raise the ceiling"
    )]
    IterationCeilingExceeded { required: usize, ceiling: usize },

    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
