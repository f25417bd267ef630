//! Control surface for the scheduling system
//!
//! Plain async functions an admin boundary can call directly: pause flags,
//! manual recurring runs, queue counts, a health summary and seeding.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

use super::job_creator::JobCreator;
use super::job_dispatcher::JobDispatcher;
use super::types::{ExecutorKind, JobSchedulingError, JobState, JobType, NewJob};
use crate::database::repositories::{
    GroupedCounts, JobRecordSeaOrmRepository, JobTypeSettingsSeaOrmRepository,
};

#[derive(Clone)]
pub struct JobSchedulingAPI {
    dispatcher: Arc<JobDispatcher>,
    creator: Arc<JobCreator>,
    job_records: JobRecordSeaOrmRepository,
    settings: JobTypeSettingsSeaOrmRepository,
}

impl JobSchedulingAPI {
    pub fn new(
        dispatcher: Arc<JobDispatcher>,
        creator: Arc<JobCreator>,
        job_records: JobRecordSeaOrmRepository,
        settings: JobTypeSettingsSeaOrmRepository,
    ) -> Self {
        Self {
            dispatcher,
            creator,
            job_records,
            settings,
        }
    }

    /// Current `type -> is_paused` map
    pub async fn settings(&self) -> Result<BTreeMap<JobType, bool>, JobSchedulingError> {
        Ok(self.settings.find_all().await?)
    }

    /// Toggle the pause flag of a type and return the updated map. Resuming
    /// a recurring type starts one run in the background.
    pub async fn set_paused(
        &self,
        job_type: JobType,
        paused: bool,
    ) -> Result<BTreeMap<JobType, bool>, JobSchedulingError> {
        self.settings.set_paused(job_type, paused).await?;
        info!("API: {} {}", if paused { "Paused" } else { "Resumed" }, job_type);

        if !paused && job_type.is_recurring() {
            let dispatcher = self.dispatcher.clone();
            self.dispatcher.tracker().spawn(async move {
                if let Err(e) = dispatcher.run_recurring(job_type).await {
                    error!("Recurring run of {} after resume failed: {}", job_type, e);
                }
            });
        }

        self.settings().await
    }

    /// Run a recurring type once, waiting for its outcome
    pub async fn run_recurring(&self, job_type: JobType) -> Result<Option<JobState>, JobSchedulingError> {
        if !job_type.is_recurring() {
            return Err(JobSchedulingError::WrongExecutorKind {
                job_type,
                expected: ExecutorKind::Persisted,
                requested: ExecutorKind::Recurring,
            });
        }
        info!("API: Triggering recurring run of {}", job_type);
        self.dispatcher.run_recurring(job_type).await
    }

    /// `type -> state -> count` over records within the depth bound
    pub async fn grouped_counts(&self) -> Result<GroupedCounts, JobSchedulingError> {
        Ok(self
            .job_records
            .grouped_counts(self.dispatcher.config().max_depth)
            .await?)
    }

    /// Seed a record, e.g. a first `GetGroupInfo`. `false` when it is a
    /// duplicate.
    pub async fn create_job(&self, job: NewJob) -> Result<bool, JobSchedulingError> {
        Ok(self.creator.create(job).await?)
    }

    pub async fn health_check(&self) -> SchedulingHealthStatus {
        let running = self.job_records.count_by_state(JobState::Running).await;
        let pending = self.job_records.count_by_state(JobState::New).await;
        let is_healthy = running.is_ok() && pending.is_ok();
        if let Err(e) = running.as_ref().and(pending.as_ref()) {
            error!("Health check could not read job records: {}", e);
        }

        SchedulingHealthStatus {
            is_healthy,
            pending_jobs: pending.unwrap_or_default(),
            running_jobs: running.unwrap_or_default(),
            active_jobs: self.dispatcher.active_jobs(),
            dedup_cache_size: self.creator.cache_len().await,
        }
    }
}

/// Health status of the scheduling system
#[derive(Debug, Clone, serde::Serialize)]
pub struct SchedulingHealthStatus {
    pub is_healthy: bool,
    /// NEW records
    pub pending_jobs: u64,
    /// RUNNING records
    pub running_jobs: u64,
    /// Jobs holding a concurrency permit in this process
    pub active_jobs: usize,
    pub dedup_cache_size: usize,
}
