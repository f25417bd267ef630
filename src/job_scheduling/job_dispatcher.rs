//! Batch dispatch and outcome classification
//!
//! A batch claims eligible records (marking them RUNNING atomically) and
//! hands them to a background launcher that starts them with a per-type
//! stagger. Jobs run concurrently under a global permit pool and write each
//! outcome back in its own short update. A tick returns once the launcher is
//! started; the RUNNING count checked by the next claim provides the
//! back-pressure.
//!
//! After [`JobDispatcher::shutdown`] nothing new is claimed or launched:
//! records still waiting for their launch go back to NEW and rate-limit
//! cooldowns end early.

use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, warn};

use super::job_registry::{JobRegistry, PersistedJobExecutor};
use super::types::{JobError, JobRecord, JobSchedulingError, JobState, JobType};
use crate::config::{JobTypeSchedule, SchedulerConfig};
use crate::database::repositories::{JobRecordSeaOrmRepository, JobTypeSettingsSeaOrmRepository};
use crate::network::NetworkClient;

/// Final state of one record handled by a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOutcome {
    pub record_id: i32,
    pub state: JobState,
}

/// Per-type deadlines set by a TooManyRequests outcome
type Cooldowns = Arc<Mutex<HashMap<JobType, Instant>>>;

pub struct JobDispatcher {
    registry: Arc<JobRegistry>,
    job_records: JobRecordSeaOrmRepository,
    settings: JobTypeSettingsSeaOrmRepository,
    network: Arc<dyn NetworkClient>,
    config: SchedulerConfig,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    cooldowns: Cooldowns,
    shutdown: CancellationToken,
}

impl JobDispatcher {
    pub fn new(
        registry: Arc<JobRegistry>,
        job_records: JobRecordSeaOrmRepository,
        settings: JobTypeSettingsSeaOrmRepository,
        network: Arc<dyn NetworkClient>,
        config: SchedulerConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        Self {
            registry,
            job_records,
            settings,
            network,
            config,
            permits,
            tracker: TaskTracker::new(),
            cooldowns: Arc::new(Mutex::new(HashMap::new())),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Tracks every launcher, job and background run spawned by this dispatcher
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Jobs currently holding a concurrency permit
    pub fn active_jobs(&self) -> usize {
        self.config
            .max_concurrent_jobs
            .saturating_sub(self.permits.available_permits())
    }

    /// Stop claiming and launching. Running executors are left to finish.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// One trigger tick: a batch launch for persisted types, a run for
    /// recurring ones
    pub async fn tick(&self, job_type: JobType) -> Result<(), JobSchedulingError> {
        if job_type.is_recurring() {
            self.run_recurring(job_type).await.map(|_| ())
        } else {
            self.launch_batch(job_type).await.map(|_| ())
        }
    }

    /// Claim one batch of `job_type` and start it in the background.
    /// Returns how many records were claimed.
    pub async fn launch_batch(&self, job_type: JobType) -> Result<usize, JobSchedulingError> {
        self.start_batch(job_type, None).await
    }

    /// Claim and run one batch of `job_type`, waiting until every claimed
    /// record has reached its next state
    pub async fn execute_batch(&self, job_type: JobType) -> Result<Vec<JobOutcome>, JobSchedulingError> {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        self.start_batch(job_type, Some(sender)).await?;

        let mut outcomes = Vec::new();
        while let Some(outcome) = receiver.recv().await {
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn start_batch(
        &self,
        job_type: JobType,
        outcomes: Option<mpsc::UnboundedSender<JobOutcome>>,
    ) -> Result<usize, JobSchedulingError> {
        let executor = self.registry.persisted(job_type)?;

        if self.is_shut_down() {
            debug!("Dispatcher is shutting down, not claiming {}", job_type);
            return Ok(0);
        }
        if self.settings.is_paused(job_type).await? {
            debug!("{} is paused, skipping batch", job_type);
            return Ok(0);
        }
        if !self.network.is_authorized().await {
            debug!("Network client not authorized, skipping {} batch", job_type);
            return Ok(0);
        }
        if let Some(remaining) = self.cooldown_remaining(job_type).await {
            debug!("{} is rate limited for another {:?}, skipping batch", job_type, remaining);
            return Ok(0);
        }

        let schedule = self.config.schedule_for(job_type);
        let claimed = self
            .job_records
            .claim_batch(job_type, schedule.batch_size, self.config.max_depth)
            .await?;
        if claimed.is_empty() {
            return Ok(0);
        }
        let count = claimed.len();
        debug!("Claimed {} {} records", count, job_type);

        let launcher = BatchLauncher {
            executor,
            job_records: self.job_records.clone(),
            permits: self.permits.clone(),
            schedule,
            cooldowns: self.cooldowns.clone(),
            shutdown: self.shutdown.clone(),
            tracker: self.tracker.clone(),
            outcomes,
        };
        self.tracker.spawn(launcher.launch(claimed).in_current_span());
        Ok(count)
    }

    async fn cooldown_remaining(&self, job_type: JobType) -> Option<Duration> {
        let mut cooldowns = self.cooldowns.lock().await;
        let until = *cooldowns.get(&job_type)?;
        let now = Instant::now();
        if until > now {
            Some(until - now)
        } else {
            cooldowns.remove(&job_type);
            None
        }
    }

    /// Run a recurring executor once, tracked by an audit marker record.
    /// Returns the marker's final state, or `None` when the type is paused
    /// or the dispatcher is shutting down.
    pub async fn run_recurring(&self, job_type: JobType) -> Result<Option<JobState>, JobSchedulingError> {
        let executor = self.registry.recurring(job_type)?;

        if self.is_shut_down() {
            return Ok(None);
        }
        if self.settings.is_paused(job_type).await? {
            debug!("{} is paused, skipping run", job_type);
            return Ok(None);
        }

        let schedule = self.config.schedule_for(job_type);
        let marker = self.job_records.insert_recurring_marker(job_type).await?;
        let _permit = self.permits.clone().acquire_owned().await.ok();
        let started = Instant::now();

        let result = AssertUnwindSafe(executor.execute())
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(panicked(panic)));
        log_outcome(&marker, &result, started, &schedule);

        let state = match &result {
            Ok(()) => JobState::Finished,
            Err(JobError::TooManyRequests(_)) => {
                tokio::select! {
                    _ = self.shutdown.cancelled() => {}
                    _ = tokio::time::sleep(schedule.too_many_requests_cooldown) => {}
                }
                JobState::Cancelled
            }
            Err(JobError::Abort(_) | JobError::Reset(_) | JobError::Timeout(_)) => JobState::Cancelled,
            Err(JobError::InvalidJob(_) | JobError::Unexpected(_)) => JobState::Error,
        };

        if !self
            .job_records
            .transition(marker.id, JobState::Running, state)
            .await?
        {
            warn!("{} marker was no longer RUNNING, {} not recorded", marker, state);
        }
        Ok(Some(state))
    }
}

/// Starts the records of one claimed batch and runs each to its next state
#[derive(Clone)]
struct BatchLauncher {
    executor: Arc<dyn PersistedJobExecutor>,
    job_records: JobRecordSeaOrmRepository,
    permits: Arc<Semaphore>,
    schedule: JobTypeSchedule,
    cooldowns: Cooldowns,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    outcomes: Option<mpsc::UnboundedSender<JobOutcome>>,
}

impl BatchLauncher {
    async fn launch(self, claimed: Vec<JobRecord>) {
        for (index, record) in claimed.iter().enumerate() {
            if index > 0 && !self.schedule.launch_delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => {
                        self.release(&claimed[index..]).await;
                        return;
                    }
                    _ = tokio::time::sleep(self.schedule.launch_delay) => {}
                }
            }
            let task = self.clone().run(record.clone());
            self.tracker.spawn(task.in_current_span());
        }
    }

    async fn run(self, record: JobRecord) {
        let permit = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => None,
            permit = self.permits.clone().acquire_owned() => permit.ok(),
        };
        let Some(_permit) = permit else {
            self.release(std::slice::from_ref(&record)).await;
            return;
        };
        let started = Instant::now();

        let result = AssertUnwindSafe(self.executor.execute(&record))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(panicked(panic)));

        let state = match &result {
            Ok(()) => JobState::Finished,
            Err(e) => e.next_state(),
        };
        log_outcome(&record, &result, started, &self.schedule);

        // Set before the record is NEW again so no tick can claim it early
        let rate_limited = matches!(result, Err(JobError::TooManyRequests(_)));
        let cooldown = self.schedule.too_many_requests_cooldown;
        if rate_limited {
            self.cooldowns
                .lock()
                .await
                .insert(self.schedule.job_type, Instant::now() + cooldown);
        }

        match self
            .job_records
            .transition(record.id, JobState::Running, state)
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!("{} was no longer RUNNING, {} not recorded", record, state),
            Err(e) => error!("Failed to move {} to {}: {}", record, state, e),
        }
        self.report(&record, state);

        if rate_limited {
            tokio::select! {
                _ = self.shutdown.cancelled() => debug!("Cooldown of {} cut short by shutdown", record),
                _ = tokio::time::sleep(cooldown) => {}
            }
        }
    }

    /// Put claimed records that never started back to NEW
    async fn release(&self, records: &[JobRecord]) {
        for record in records {
            match self
                .job_records
                .transition(record.id, JobState::Running, JobState::New)
                .await
            {
                Ok(_) => self.report(record, JobState::New),
                Err(e) => error!("Failed to release {}: {}", record, e),
            }
        }
        info!(
            "Released {} unlaunched {} records on shutdown",
            records.len(),
            self.schedule.job_type
        );
    }

    fn report(&self, record: &JobRecord, state: JobState) {
        if let Some(outcomes) = &self.outcomes {
            // a closed channel only means nobody waits for this batch
            let _ = outcomes.send(JobOutcome {
                record_id: record.id,
                state,
            });
        }
    }
}

fn panicked(panic: Box<dyn Any + Send>) -> JobError {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    JobError::Unexpected(anyhow::anyhow!("executor panicked: {message}"))
}

fn log_outcome(
    record: &JobRecord,
    result: &Result<(), JobError>,
    started: Instant,
    schedule: &JobTypeSchedule,
) {
    let elapsed = started.elapsed();
    match result {
        Ok(()) => info!("{} finished in {:?}", record, elapsed),
        Err(JobError::Abort(message)) => warn!("{} aborted: {}", record, message),
        Err(JobError::Reset(message)) => warn!("{} reset: {}", record, message),
        Err(JobError::Timeout(after)) => warn!("{} timed out after {:?}", record, after),
        Err(JobError::TooManyRequests(message)) => warn!(
            "{} hit the rate limit ({}), holding the slot for {:?}",
            record, message, schedule.too_many_requests_cooldown
        ),
        Err(JobError::InvalidJob(message)) => error!("Invalid job {}: {}", record, message),
        Err(JobError::Unexpected(e)) => error!(
            "{} failed after {:?}: {} (caused by: {:#})",
            record,
            elapsed,
            e.root_cause(),
            e
        ),
    }
}
