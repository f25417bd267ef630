//! Centralized error handling for the crawler
//!
//! Job outcomes have their own taxonomy in [`crate::job_scheduling::JobError`];
//! the types here cover the plumbing around it.
//!
//! # Error Categories
//!
//! - **Database Errors**: SeaORM operations, migrations, connection issues
//! - **Repository Errors**: Data access layer failures
//! - **Configuration Errors**: malformed or out-of-range settings
//! - **Scheduling Errors**: registry and dispatch misconfiguration

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Repository Results
pub type RepositoryResult<T> = Result<T, RepositoryError>;
