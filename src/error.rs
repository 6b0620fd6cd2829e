//! Error types for the attainment engine and its store boundary.

use thiserror::Error;

/// Errors raised by the pure computation layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A mean was requested over an empty population.
    #[error("cannot average an empty input: {0}")]
    EmptyInput(&'static str),

    /// A threshold or other configuration value is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Errors surfaced by an [`AttainmentRecordStore`](crate::store::AttainmentRecordStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing database rejected or failed the operation.
    #[error("store backend failed: {0}")]
    Backend(String),

    /// A stored payload could not be encoded or decoded.
    #[error("attainment payload serialization failed: {0}")]
    Serialization(String),

    /// An in-process lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
