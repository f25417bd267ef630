//! Per-type periodic triggers
//!
//! Every enabled job type gets its own timer loop. By default a tick that is
//! still running when the next one is due causes that next tick to be
//! skipped; types configured with `max_concurrent_ticks > 1` run their tick
//! bodies as tracked tasks, each holding one of the trigger's tick slots.
//!
//! Cancellation wins over a due tick and interrupts a tick in progress. Once
//! every trigger has stopped the dispatcher is shut down and in-flight jobs
//! get `shutdown_timeout` to finish.

use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::task::JoinSet;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::job_dispatcher::JobDispatcher;
use super::types::{JobSchedulingError, JobType};
use crate::config::JobTypeSchedule;

pub struct JobScheduler {
    dispatcher: Arc<JobDispatcher>,
}

impl JobScheduler {
    pub fn new(dispatcher: Arc<JobDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Run every trigger until cancelled, then wait (bounded) for in-flight
    /// jobs to finish
    pub async fn run(&self, cancellation_token: CancellationToken) -> Result<()> {
        let mut triggers = JoinSet::new();
        for job_type in JobType::all() {
            let schedule = self.dispatcher.config().schedule_for(job_type);
            if !schedule.enabled {
                info!("Trigger for {} is disabled", job_type);
                continue;
            }
            triggers.spawn(Self::run_trigger(
                self.dispatcher.clone(),
                schedule,
                cancellation_token.clone(),
            ));
        }
        info!("Starting job scheduler with {} triggers", triggers.len());

        while let Some(result) = triggers.join_next().await {
            match result {
                Ok(Ok(job_type)) => debug!("Trigger for {} stopped", job_type),
                Ok(Err(e)) => error!("Trigger halted: {}", e),
                Err(e) => error!("Trigger task failed: {}", e),
            }
        }

        self.dispatcher.shutdown();
        self.wait_for_running_jobs_to_complete().await;
        info!("Job scheduler stopped");
        Ok(())
    }

    async fn run_trigger(
        dispatcher: Arc<JobDispatcher>,
        schedule: JobTypeSchedule,
        cancellation_token: CancellationToken,
    ) -> Result<JobType, JobSchedulingError> {
        let job_type = schedule.job_type;
        dispatcher.registry().ensure_registered(job_type)?;

        tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => return Ok(job_type),
            _ = tokio::time::sleep(schedule.initial_delay) => {}
        }

        let mut ticker = interval(schedule.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let in_flight = Arc::new(AtomicUsize::new(0));

        debug!(
            "Trigger for {} started (every {:?}, up to {} concurrent ticks)",
            job_type, schedule.interval, schedule.max_concurrent_ticks
        );

        loop {
            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => {
                    info!("Trigger for {} received cancellation signal", job_type);
                    break;
                }
                _ = ticker.tick() => {}
            }

            if schedule.max_concurrent_ticks <= 1 {
                tokio::select! {
                    biased;
                    _ = cancellation_token.cancelled() => {
                        info!("Trigger for {} cancelled during a tick", job_type);
                        break;
                    }
                    result = Self::handle_tick(&dispatcher, job_type) => result?,
                }
                continue;
            }

            let Some(slot) = TickSlot::try_acquire(&in_flight, schedule.max_concurrent_ticks) else {
                debug!(
                    "{} already has {} ticks in flight, skipping",
                    job_type, schedule.max_concurrent_ticks
                );
                continue;
            };

            let dispatcher = dispatcher.clone();
            let token = cancellation_token.clone();
            let tracker = dispatcher.tracker().clone();
            tracker.spawn(async move {
                let _slot = slot;
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {}
                    result = Self::handle_tick(&dispatcher, job_type) => {
                        if let Err(e) = result {
                            error!("{} tick failed: {}", job_type, e);
                        }
                    }
                }
            });
        }

        Ok(job_type)
    }

    /// Store failures are logged and the trigger keeps going; registry
    /// errors halt it
    async fn handle_tick(dispatcher: &JobDispatcher, job_type: JobType) -> Result<(), JobSchedulingError> {
        match dispatcher.tick(job_type).await {
            Ok(()) => Ok(()),
            Err(JobSchedulingError::Repository(e)) => {
                error!("{} tick failed on the store: {}", job_type, e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn wait_for_running_jobs_to_complete(&self) {
        let tracker = self.dispatcher.tracker();
        tracker.close();
        if tracker.is_empty() {
            return;
        }

        let max_wait = self.dispatcher.config().shutdown_timeout;
        info!(
            "Waiting up to {:?} for {} running jobs to complete...",
            max_wait,
            tracker.len()
        );
        let started = Instant::now();

        match tokio::time::timeout(max_wait, tracker.wait()).await {
            Ok(()) => info!("All jobs completed in {:?}", started.elapsed()),
            Err(_) => warn!(
                "Timeout waiting for {} jobs to complete, proceeding with shutdown",
                tracker.len()
            ),
        }
    }
}

/// A claim on one of a trigger's concurrent tick slots, given back on drop
struct TickSlot {
    in_flight: Arc<AtomicUsize>,
}

impl TickSlot {
    fn try_acquire(in_flight: &Arc<AtomicUsize>, max: usize) -> Option<Self> {
        in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then_some(n + 1))
            .ok()?;
        Some(Self {
            in_flight: in_flight.clone(),
        })
    }
}

impl Drop for TickSlot {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
