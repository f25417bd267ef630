//! SeaORM-based database implementation
//!
//! Database-agnostic access with support for SQLite, PostgreSQL and MySQL.

use anyhow::{Context, Result};
use sea_orm::{ConnectOptions, Database as SeaOrmDatabase, DatabaseBackend, DatabaseConnection};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::DatabaseConfig;

pub mod migrations;
pub mod repositories;

/// Database connection manager with multi-database support
#[derive(Clone)]
pub struct Database {
    pub connection: Arc<DatabaseConnection>,
    pub backend: DatabaseBackend,
    pub database_type: DatabaseType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    SQLite,
    PostgreSQL,
    MySQL,
}

impl DatabaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseType::SQLite => "SQLite",
            DatabaseType::PostgreSQL => "PostgreSQL",
            DatabaseType::MySQL => "MySQL",
        }
    }
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let database_type = Self::detect_database_type(&config.url)?;
        let backend = match database_type {
            DatabaseType::SQLite => DatabaseBackend::Sqlite,
            DatabaseType::PostgreSQL => DatabaseBackend::Postgres,
            DatabaseType::MySQL => DatabaseBackend::MySql,
        };

        info!("Connecting to {} database", database_type.as_str());

        let connection_url = match database_type {
            DatabaseType::SQLite => Self::ensure_sqlite_auto_creation(&config.url)?,
            _ => config.url.clone(),
        };

        // Every pooled connection to `:memory:` opens its own empty database
        let max_connections = if Self::is_in_memory(&config.url) {
            1
        } else {
            config.max_connections.unwrap_or(10)
        };

        let mut connect_options = ConnectOptions::new(&connection_url);
        connect_options
            .max_connections(max_connections)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(5))
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .sqlx_logging_level(tracing::log::LevelFilter::Debug);

        let connection = SeaOrmDatabase::connect(connect_options)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Database connection failed: {} (causes: {:?})",
                    e,
                    Self::error_causes(&e)
                );
                e
            })
            .with_context(|| format!("Failed to connect to database at '{}'", config.url))?;

        debug!("Database connection established successfully");

        Ok(Self {
            connection: Arc::new(connection),
            backend,
            database_type,
        })
    }

    /// Messages of every error below `err` in its source chain
    fn error_causes(err: &dyn Error) -> Vec<String> {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        causes
    }

    fn detect_database_type(url: &str) -> Result<DatabaseType> {
        if url.starts_with("sqlite:") {
            Ok(DatabaseType::SQLite)
        } else if url.starts_with("postgres:") || url.starts_with("postgresql:") {
            Ok(DatabaseType::PostgreSQL)
        } else if url.starts_with("mysql:") {
            Ok(DatabaseType::MySQL)
        } else {
            anyhow::bail!("Unsupported database URL format: {}", url);
        }
    }

    fn is_in_memory(url: &str) -> bool {
        url.starts_with("sqlite:") && url.contains(":memory:")
    }

    /// Append `mode=rwc` to file-backed SQLite URLs whose file does not exist
    /// yet, creating missing parent directories on the way
    fn ensure_sqlite_auto_creation(url: &str) -> Result<String> {
        if url.contains("mode=") || Self::is_in_memory(url) {
            return Ok(url.to_string());
        }

        let file_path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .with_context(|| format!("Invalid SQLite URL format: {url}"))?;
        let file_path = file_path.split('?').next().unwrap_or(file_path);
        let path = std::path::Path::new(file_path);
        if path.exists() {
            return Ok(url.to_string());
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty() && !p.exists()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
            info!("Created database directory {}", parent.display());
        }

        let separator = if url.contains('?') { '&' } else { '?' };
        debug!("SQLite file {} missing, enabling auto-creation", file_path);
        Ok(format!("{url}{separator}mode=rwc"))
    }

    pub async fn migrate(&self) -> Result<()> {
        use migrations::Migrator;
        use sea_orm_migration::MigratorTrait;

        info!(
            "Running database migrations for {}",
            self.database_type.as_str()
        );

        Migrator::up(&*self.connection, None)
            .await
            .context("Failed to run migrations")?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    pub fn connection(&self) -> Arc<DatabaseConnection> {
        self.connection.clone()
    }

    pub fn backend(&self) -> DatabaseBackend {
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_database_type() {
        assert_eq!(
            Database::detect_database_type("sqlite::memory:").unwrap(),
            DatabaseType::SQLite
        );
        assert_eq!(
            Database::detect_database_type("postgresql://localhost/crawl").unwrap(),
            DatabaseType::PostgreSQL
        );
        assert!(Database::detect_database_type("redis://localhost").is_err());
    }

    #[derive(Debug, thiserror::Error)]
    #[error("connect failed")]
    struct ConnectFailed(#[source] HandshakeFailed);

    #[derive(Debug, thiserror::Error)]
    #[error("handshake failed")]
    struct HandshakeFailed(#[source] std::fmt::Error);

    #[test]
    fn test_error_causes_walk_the_source_chain() {
        let causes = Database::error_causes(&ConnectFailed(HandshakeFailed(std::fmt::Error)));
        assert_eq!(causes.len(), 2);
        assert_eq!(causes[0], "handshake failed");
        assert_eq!(causes[1], std::fmt::Error.to_string());
        assert!(Database::error_causes(&std::fmt::Error).is_empty());
    }

    #[test]
    fn test_in_memory_urls_are_left_alone() {
        assert!(Database::is_in_memory("sqlite::memory:"));
        assert_eq!(
            Database::ensure_sqlite_auto_creation("sqlite::memory:").unwrap(),
            "sqlite::memory:"
        );
    }

    #[tokio::test]
    async fn test_in_memory_database_migrates() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..Default::default()
        };
        let database = Database::new(&config).await.unwrap();
        database.migrate().await.unwrap();
        assert_eq!(database.backend(), DatabaseBackend::Sqlite);
    }
}
