//! Error type definitions shared across the crate

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

use crate::job_scheduling::JobSchedulingError;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors (SeaORM)
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Repository layer errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Registry or dispatcher misconfiguration
    #[error("Scheduling error: {0}")]
    Scheduling(#[from] JobSchedulingError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Repository layer specific errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database errors from SeaORM
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Data serialization/deserialization failures
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Constraint violations (unique, foreign key, etc.)
    #[error("Constraint violation: {constraint} - {message}")]
    ConstraintViolation { constraint: String, message: String },

    /// Record not found
    #[error("Record not found: {table} with {field} = {value}")]
    RecordNotFound {
        table: String,
        field: String,
        value: String,
    },

    /// A stored column holds a value the domain type cannot represent
    #[error("Invalid stored value in {table}.{column}: {value}")]
    InvalidStoredValue {
        table: String,
        column: String,
        value: String,
    },
}

impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl RepositoryError {
    pub fn record_not_found<T: Into<String>, F: Into<String>, V: ToString>(
        table: T,
        field: F,
        value: V,
    ) -> Self {
        Self::RecordNotFound {
            table: table.into(),
            field: field.into(),
            value: value.to_string(),
        }
    }

    pub fn invalid_stored_value<T: Into<String>, C: Into<String>, V: Into<String>>(
        table: T,
        column: C,
        value: V,
    ) -> Self {
        Self::InvalidStoredValue {
            table: table.into(),
            column: column.into(),
            value: value.into(),
        }
    }

    /// Classify a database error, lifting unique violations into
    /// [`RepositoryError::ConstraintViolation`]
    pub fn from_db(err: DbErr, constraint: &str) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(message)) => Self::ConstraintViolation {
                constraint: constraint.to_string(),
                message,
            },
            _ => Self::Database(err),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation { .. })
    }
}
