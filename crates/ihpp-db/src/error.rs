use sea_orm::DbErr;
use thiserror::Error;

/// Errors raised by the configuration store
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing database failed or is unavailable
    #[error("persistence error: {0}")]
    Persistence(#[from] DbErr),

    /// A single-row lookup missed
    #[error("{0} not found")]
    NotFound(String),
}
