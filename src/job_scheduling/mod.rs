//! Job scheduling subsystem for the crawler
//!
//! Crawl work is stored as job records and processed in priority order:
//! - Group info, member list and message history crawls
//! - Handle and invite-link resolution
//! - Recurring graph calculation and group clean-up
//!
//! The system is built around four main components:
//! - `JobCreator`: Fingerprint-deduplicated record creation
//! - `JobScheduler`: Per-type interval triggers
//! - `JobDispatcher`: Claiming, concurrency limits and outcome handling
//! - `JobRegistry`: Executor lookup by job type

pub mod api;
pub mod executors;
pub mod job_creator;
pub mod job_dispatcher;
pub mod job_registry;
pub mod job_scheduler;
pub mod types;

pub use api::{JobSchedulingAPI, SchedulingHealthStatus};
pub use job_creator::JobCreator;
pub use job_dispatcher::{JobDispatcher, JobOutcome};
pub use job_registry::{JobRegistry, PersistedJobExecutor, RecurringJobExecutor};
pub use job_scheduler::JobScheduler;
pub use types::*;
