use thiserror::Error;

use crate::entity::Category;

/// Errors raised while configuring or running a pool simulation.
///
/// Everything except `InvalidRate` is reported before any trial is drawn.
#[derive(Error, Debug)]
pub enum PoolError {
    /// Bad or missing static inputs: duplicate roster entries, missing
    /// popularity weights, unusable history files.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Bad run parameters: malformed lineup, unknown entity, non-positive sizes.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid {category} rate for {entity}: {rate}")]
    InvalidRate {
        entity: String,
        category: Category,
        rate: f64,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PoolError {
    pub fn config(msg: impl Into<String>) -> Self {
        PoolError::Configuration(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        PoolError::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, PoolError>;
