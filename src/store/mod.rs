//! Storage-facing plumbing shared by the repositories.

use std::{future::Future, time::Duration};

use thiserror::Error;

#[cfg(test)]
pub mod memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate {0}")]
    Duplicate(String),
    #[error("store call timed out")]
    Timeout,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return Self::Duplicate(db.constraint().unwrap_or("record").to_string());
            }
        }
        Self::Backend(e.into())
    }
}

/// Runs a store call under a deadline so a stuck backend cannot hold a request forever.
pub async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(StoreError::Timeout),
    }
}
