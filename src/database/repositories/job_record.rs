//! SeaORM-based JobRecord repository
//!
//! The store is the single source of truth for the crawl queue. Every state
//! change is a conditional update in its own short transaction, never held
//! across network I/O.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::entities::{job_records, prelude::JobRecords};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::job_scheduling::{JobRecord, JobState, JobType, NewJob, SCHEDULER_PROVENANCE};

/// Counts per job type and state
pub type GroupedCounts = BTreeMap<JobType, BTreeMap<JobState, u64>>;

/// Result of the startup recovery pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Orphaned RUNNING records put back to NEW
    pub reset_to_new: u64,
    /// Unfinished recurring-run markers abandoned
    pub markers_cancelled: u64,
}

#[derive(Clone)]
pub struct JobRecordSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl JobRecordSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// `depth IS NULL OR depth < max_depth`
    fn depth_filter(max_depth: i32) -> Condition {
        Condition::any()
            .add(job_records::Column::Depth.is_null())
            .add(job_records::Column::Depth.lt(max_depth))
    }

    /// Insert a NEW record. A fingerprint collision surfaces as
    /// [`RepositoryError::ConstraintViolation`].
    pub async fn insert(&self, job: &NewJob) -> RepositoryResult<JobRecord> {
        let now = Utc::now();
        let active_model = job_records::ActiveModel {
            job_type: Set(job.job_type.to_string()),
            state: Set(JobState::New.to_string()),
            priority: Set(job.priority),
            param1: Set(job.param1.clone()),
            param2: Set(job.param2.clone()),
            param3: Set(job.param3.clone()),
            param4: Set(job.param4.clone()),
            depth: Set(job.depth),
            created_by: Set(job.created_by.clone()),
            fingerprint: Set(Some(job.fingerprint())),
            version: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active_model
            .insert(&*self.connection)
            .await
            .map_err(|e| RepositoryError::from_db(e, "job_records.fingerprint"))?;
        Self::model_to_domain(model)
    }

    /// Insert an audit marker for a recurring run, already RUNNING. Markers
    /// carry no fingerprint so repeated runs never collide.
    pub async fn insert_recurring_marker(&self, job_type: JobType) -> RepositoryResult<JobRecord> {
        let now = Utc::now();
        let active_model = job_records::ActiveModel {
            job_type: Set(job_type.to_string()),
            state: Set(JobState::Running.to_string()),
            priority: Set(crate::job_scheduling::DEFAULT_PRIORITY),
            param1: Set(None),
            param2: Set(None),
            param3: Set(None),
            param4: Set(None),
            depth: Set(None),
            created_by: Set(SCHEDULER_PROVENANCE.to_string()),
            fingerprint: Set(None),
            version: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active_model.insert(&*self.connection).await?;
        Self::model_to_domain(model)
    }

    pub async fn count_by_fingerprint(&self, fingerprint: &str) -> RepositoryResult<u64> {
        Ok(JobRecords::find()
            .filter(job_records::Column::Fingerprint.eq(fingerprint))
            .count(&*self.connection)
            .await?)
    }

    pub async fn find_by_id(&self, id: i32) -> RepositoryResult<Option<JobRecord>> {
        JobRecords::find_by_id(id)
            .one(&*self.connection)
            .await?
            .map(Self::model_to_domain)
            .transpose()
    }

    pub async fn find_by_type(&self, job_type: JobType) -> RepositoryResult<Vec<JobRecord>> {
        JobRecords::find()
            .filter(job_records::Column::JobType.eq(job_type.as_ref()))
            .order_by_asc(job_records::Column::Id)
            .all(&*self.connection)
            .await?
            .into_iter()
            .map(Self::model_to_domain)
            .collect()
    }

    pub async fn count_running(&self, job_type: JobType, max_depth: i32) -> RepositoryResult<u64> {
        Ok(JobRecords::find()
            .filter(job_records::Column::JobType.eq(job_type.as_ref()))
            .filter(job_records::Column::State.eq(JobState::Running.as_ref()))
            .filter(Self::depth_filter(max_depth))
            .count(&*self.connection)
            .await?)
    }

    /// Select up to `batch_size - running` eligible NEW records ordered by
    /// (priority, created_at, id) and mark them RUNNING, all in one
    /// transaction. Each row is flipped with a `state = 'NEW'` guard so a
    /// record can be claimed at most once.
    pub async fn claim_batch(
        &self,
        job_type: JobType,
        batch_size: usize,
        max_depth: i32,
    ) -> RepositoryResult<Vec<JobRecord>> {
        let txn = self.connection.begin().await?;

        let running = JobRecords::find()
            .filter(job_records::Column::JobType.eq(job_type.as_ref()))
            .filter(job_records::Column::State.eq(JobState::Running.as_ref()))
            .filter(Self::depth_filter(max_depth))
            .count(&txn)
            .await?;

        let batch_size = batch_size as u64;
        if running >= batch_size {
            txn.commit().await?;
            debug!(
                "{} has {} running records (batch size {}), skipping claim",
                job_type, running, batch_size
            );
            return Ok(Vec::new());
        }

        let candidates = JobRecords::find()
            .filter(job_records::Column::JobType.eq(job_type.as_ref()))
            .filter(job_records::Column::State.eq(JobState::New.as_ref()))
            .filter(Self::depth_filter(max_depth))
            .order_by_asc(job_records::Column::Priority)
            .order_by_asc(job_records::Column::CreatedAt)
            .order_by_asc(job_records::Column::Id)
            .limit(batch_size - running)
            .all(&txn)
            .await?;

        let now = Utc::now();
        let mut claimed = Vec::with_capacity(candidates.len());
        for mut model in candidates {
            let result = JobRecords::update_many()
                .col_expr(
                    job_records::Column::State,
                    Expr::value(JobState::Running.as_ref()),
                )
                .col_expr(
                    job_records::Column::Version,
                    Expr::col(job_records::Column::Version).add(1),
                )
                .col_expr(job_records::Column::UpdatedAt, Expr::value(now))
                .filter(job_records::Column::Id.eq(model.id))
                .filter(job_records::Column::State.eq(JobState::New.as_ref()))
                .exec(&txn)
                .await?;

            if result.rows_affected == 1 {
                model.state = JobState::Running.to_string();
                model.version += 1;
                model.updated_at = now;
                claimed.push(Self::model_to_domain(model)?);
            }
        }

        txn.commit().await?;
        Ok(claimed)
    }

    /// Move a record from `from` to `to`; false when it was no longer in `from`
    pub async fn transition(&self, id: i32, from: JobState, to: JobState) -> RepositoryResult<bool> {
        let result = JobRecords::update_many()
            .col_expr(job_records::Column::State, Expr::value(to.as_ref()))
            .col_expr(
                job_records::Column::Version,
                Expr::col(job_records::Column::Version).add(1),
            )
            .col_expr(job_records::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(job_records::Column::Id.eq(id))
            .filter(job_records::Column::State.eq(from.as_ref()))
            .exec(&*self.connection)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Startup recovery: orphaned RUNNING records go back to NEW, unfinished
    /// recurring markers are CANCELLED. Idempotent.
    pub async fn recover(&self) -> RepositoryResult<RecoveryStats> {
        let txn = self.connection.begin().await?;
        let now = Utc::now();

        let reset = JobRecords::update_many()
            .col_expr(job_records::Column::State, Expr::value(JobState::New.as_ref()))
            .col_expr(
                job_records::Column::Version,
                Expr::col(job_records::Column::Version).add(1),
            )
            .col_expr(job_records::Column::UpdatedAt, Expr::value(now))
            .filter(job_records::Column::State.eq(JobState::Running.as_ref()))
            .filter(job_records::Column::CreatedBy.ne(SCHEDULER_PROVENANCE))
            .exec(&txn)
            .await?;

        let cancelled = JobRecords::update_many()
            .col_expr(
                job_records::Column::State,
                Expr::value(JobState::Cancelled.as_ref()),
            )
            .col_expr(
                job_records::Column::Version,
                Expr::col(job_records::Column::Version).add(1),
            )
            .col_expr(job_records::Column::UpdatedAt, Expr::value(now))
            .filter(
                job_records::Column::State
                    .is_in([JobState::New.as_ref(), JobState::Running.as_ref()]),
            )
            .filter(job_records::Column::CreatedBy.eq(SCHEDULER_PROVENANCE))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        let stats = RecoveryStats {
            reset_to_new: reset.rows_affected,
            markers_cancelled: cancelled.rows_affected,
        };
        info!(
            "Recovered job records: {} reset to NEW, {} recurring markers cancelled",
            stats.reset_to_new, stats.markers_cancelled
        );
        Ok(stats)
    }

    /// `type -> state -> count` over records within the depth bound
    pub async fn grouped_counts(&self, max_depth: i32) -> RepositoryResult<GroupedCounts> {
        let rows: Vec<(String, String, i64)> = JobRecords::find()
            .select_only()
            .column(job_records::Column::JobType)
            .column(job_records::Column::State)
            .column_as(job_records::Column::Id.count(), "count")
            .filter(Self::depth_filter(max_depth))
            .group_by(job_records::Column::JobType)
            .group_by(job_records::Column::State)
            .into_tuple()
            .all(&*self.connection)
            .await?;

        let mut counts = GroupedCounts::new();
        for (job_type, state, count) in rows {
            let job_type = Self::parse_column::<JobType>("job_type", &job_type)?;
            let state = Self::parse_column::<JobState>("state", &state)?;
            counts
                .entry(job_type)
                .or_default()
                .insert(state, count.max(0) as u64);
        }
        Ok(counts)
    }

    pub async fn count_by_state(&self, state: JobState) -> RepositoryResult<u64> {
        Ok(JobRecords::find()
            .filter(job_records::Column::State.eq(state.as_ref()))
            .count(&*self.connection)
            .await?)
    }

    /// Integer `param1` values of records of `job_type` created by
    /// `created_by` that are in `state`
    pub async fn chat_ids_by_provenance(
        &self,
        job_type: JobType,
        created_by: &str,
        state: JobState,
    ) -> RepositoryResult<Vec<i64>> {
        let params: Vec<Option<String>> = JobRecords::find()
            .select_only()
            .column(job_records::Column::Param1)
            .filter(job_records::Column::JobType.eq(job_type.as_ref()))
            .filter(job_records::Column::CreatedBy.eq(created_by))
            .filter(job_records::Column::State.eq(state.as_ref()))
            .order_by_asc(job_records::Column::Id)
            .into_tuple()
            .all(&*self.connection)
            .await?;

        Ok(params
            .into_iter()
            .flatten()
            .filter_map(|p| p.trim().parse::<i64>().ok())
            .collect())
    }

    /// `param1` values of NEW or RUNNING records of `job_type`
    pub async fn active_params(&self, job_type: JobType) -> RepositoryResult<HashSet<String>> {
        let params: Vec<Option<String>> = JobRecords::find()
            .select_only()
            .column(job_records::Column::Param1)
            .filter(job_records::Column::JobType.eq(job_type.as_ref()))
            .filter(
                job_records::Column::State
                    .is_in([JobState::New.as_ref(), JobState::Running.as_ref()]),
            )
            .into_tuple()
            .all(&*self.connection)
            .await?;

        Ok(params.into_iter().flatten().collect())
    }

    fn parse_column<T: FromStr>(column: &str, value: &str) -> RepositoryResult<T> {
        value
            .parse::<T>()
            .map_err(|_| RepositoryError::invalid_stored_value("job_records", column, value))
    }

    fn model_to_domain(model: job_records::Model) -> RepositoryResult<JobRecord> {
        Ok(JobRecord {
            id: model.id,
            job_type: Self::parse_column("job_type", &model.job_type)?,
            state: Self::parse_column("state", &model.state)?,
            priority: model.priority,
            param1: model.param1,
            param2: model.param2,
            param3: model.param3,
            param4: model.param4,
            depth: model.depth,
            created_by: model.created_by,
            version: model.version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
