//! SeaORM-based repository for per-type pause flags

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::entities::{job_type_settings, prelude::JobTypeSettings};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::job_scheduling::JobType;

#[derive(Clone)]
pub struct JobTypeSettingsSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl JobTypeSettingsSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Insert an unpaused row for every type that has none. Returns the types
    /// that were added.
    pub async fn ensure_all(&self) -> RepositoryResult<Vec<JobType>> {
        let existing = self.find_all().await?;
        let now = Utc::now();
        let mut created = Vec::new();

        for job_type in JobType::all().filter(|t| !existing.contains_key(t)) {
            let active_model = job_type_settings::ActiveModel {
                job_type: Set(job_type.to_string()),
                is_paused: Set(false),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            };
            match active_model.insert(&*self.connection).await {
                Ok(_) => created.push(job_type),
                Err(e) => {
                    let err = RepositoryError::from_db(e, "job_type_settings.job_type");
                    if !err.is_unique_violation() {
                        return Err(err);
                    }
                }
            }
        }

        if !created.is_empty() {
            info!("Created job type settings for {:?}", created);
        }
        Ok(created)
    }

    /// `type -> is_paused`; rows naming an unknown type are skipped
    pub async fn find_all(&self) -> RepositoryResult<BTreeMap<JobType, bool>> {
        let models = JobTypeSettings::find().all(&*self.connection).await?;
        let mut settings = BTreeMap::new();
        for model in models {
            match model.job_type.parse::<JobType>() {
                Ok(job_type) => {
                    settings.insert(job_type, model.is_paused);
                }
                Err(_) => warn!("Ignoring settings row for unknown job type '{}'", model.job_type),
            }
        }
        Ok(settings)
    }

    /// A type without a settings row counts as paused
    pub async fn is_paused(&self, job_type: JobType) -> RepositoryResult<bool> {
        let model = JobTypeSettings::find()
            .filter(job_type_settings::Column::JobType.eq(job_type.as_ref()))
            .one(&*self.connection)
            .await?;
        Ok(model.is_none_or(|m| m.is_paused))
    }

    pub async fn set_paused(&self, job_type: JobType, paused: bool) -> RepositoryResult<()> {
        let result = JobTypeSettings::update_many()
            .col_expr(job_type_settings::Column::IsPaused, Expr::value(paused))
            .col_expr(job_type_settings::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(job_type_settings::Column::JobType.eq(job_type.as_ref()))
            .exec(&*self.connection)
            .await?;

        if result.rows_affected == 0 {
            let now = Utc::now();
            job_type_settings::ActiveModel {
                job_type: Set(job_type.to_string()),
                is_paused: Set(paused),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&*self.connection)
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::database::Database;

    async fn create_test_repository() -> JobTypeSettingsSeaOrmRepository {
        let database = Database::new(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
        database.migrate().await.unwrap();
        JobTypeSettingsSeaOrmRepository::new(database.connection())
    }

    #[tokio::test]
    async fn test_missing_row_counts_as_paused() {
        let repo = create_test_repository().await;
        assert!(repo.is_paused(JobType::GetGroupInfo).await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_all_is_idempotent() {
        let repo = create_test_repository().await;
        assert_eq!(repo.ensure_all().await.unwrap().len(), 7);
        assert!(repo.ensure_all().await.unwrap().is_empty());

        let settings = repo.find_all().await.unwrap();
        assert_eq!(settings.len(), 7);
        assert!(settings.values().all(|paused| !paused));
    }

    #[tokio::test]
    async fn test_ensure_all_keeps_existing_flags() {
        let repo = create_test_repository().await;
        repo.set_paused(JobType::LeaveGroups, true).await.unwrap();
        let created = repo.ensure_all().await.unwrap();

        assert!(!created.contains(&JobType::LeaveGroups));
        assert!(repo.is_paused(JobType::LeaveGroups).await.unwrap());
        assert!(!repo.is_paused(JobType::CalculateGraph).await.unwrap());
    }

    #[tokio::test]
    async fn test_toggle_pause() {
        let repo = create_test_repository().await;
        repo.ensure_all().await.unwrap();

        repo.set_paused(JobType::GetMessageHistory, true).await.unwrap();
        assert!(repo.is_paused(JobType::GetMessageHistory).await.unwrap());

        repo.set_paused(JobType::GetMessageHistory, false).await.unwrap();
        assert!(!repo.is_paused(JobType::GetMessageHistory).await.unwrap());
    }
}
