use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use crate::errors::{AppError, AppResult};
use crate::job_scheduling::JobType;
use defaults::*;

/// Prefix for environment overrides, e.g. `CRAWLER_SCHEDULER__BATCH_SIZE=5`
pub const ENV_PREFIX: &str = "CRAWLER_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default)]
    pub max_connections: Option<u32>,
    /// How long a caller waits for a pooled connection
    #[serde(default = "default_acquire_timeout", with = "duration_serde::duration")]
    pub acquire_timeout: Duration,
}

/// Dispatcher configuration shared by every job type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Default number of concurrently running records per persisted type
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Default spacing between launches inside one batch
    #[serde(default = "default_launch_delay", with = "duration_serde::duration")]
    pub launch_delay: Duration,
    /// Records at or beyond this depth are never scheduled
    #[serde(default = "default_max_depth")]
    pub max_depth: i32,
    /// Global ceiling on concurrently executing job bodies
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    /// Default hold applied after a rate-limit signal
    #[serde(
        default = "default_too_many_requests_cooldown",
        with = "duration_serde::duration"
    )]
    pub too_many_requests_cooldown: Duration,
    /// Bound for the in-memory fingerprint cache; unbounded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedup_cache_capacity: Option<usize>,
    /// How long shutdown waits for in-flight jobs
    #[serde(default = "default_shutdown_timeout", with = "duration_serde::duration")]
    pub shutdown_timeout: Duration,
    #[serde(default)]
    pub job_types: HashMap<JobType, JobTypeOverrides>,
}

/// Per-type overrides layered over the built-in schedule table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobTypeOverrides {
    #[serde(
        default,
        with = "duration_serde::option_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub interval: Option<Duration>,
    #[serde(
        default,
        with = "duration_serde::option_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub initial_delay: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(
        default,
        with = "duration_serde::option_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub launch_delay: Option<Duration>,
    #[serde(
        default,
        with = "duration_serde::option_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub too_many_requests_cooldown: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_ticks: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Fully resolved trigger settings for one job type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTypeSchedule {
    pub job_type: JobType,
    pub interval: Duration,
    pub initial_delay: Duration,
    pub batch_size: usize,
    pub launch_delay: Duration,
    pub too_many_requests_cooldown: Duration,
    /// 1 means a tick still running causes the next one to be skipped
    pub max_concurrent_ticks: usize,
    pub enabled: bool,
}

/// Knobs used by the crawl executors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Joined-chat count above which invite links are no longer followed
    #[serde(default = "default_max_joined_chats")]
    pub max_joined_chats: i64,
    #[serde(default = "default_join_delay", with = "duration_serde::duration")]
    pub join_delay: Duration,
    #[serde(
        default = "default_history_fetch_timeout",
        with = "duration_serde::duration"
    )]
    pub history_fetch_timeout: Duration,
    #[serde(default = "default_history_page_size")]
    pub history_page_size: i32,
    #[serde(default = "default_member_page_size")]
    pub member_page_size: i32,
    #[serde(default = "default_member_page_delay", with = "duration_serde::duration")]
    pub member_page_delay: Duration,
    #[serde(default = "default_member_retry_delay", with = "duration_serde::duration")]
    pub member_retry_delay: Duration,
    #[serde(
        default = "default_account_fetch_delay",
        with = "duration_serde::duration"
    )]
    pub account_fetch_delay: Duration,
    /// Paging stops (Abort) once a message older than this shows up
    #[serde(default = "default_oldest_message_date")]
    pub oldest_message_date: DateTime<Utc>,
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,
    #[serde(default = "default_leave_batch_size")]
    pub leave_batch_size: u64,
    #[serde(default)]
    pub graph: GraphConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_graph_min_member_count")]
    pub min_member_count: i32,
    #[serde(default = "default_graph_min_connections")]
    pub min_connections: i64,
    #[serde(default = "default_graph_min_messages")]
    pub min_messages: i64,
    #[serde(default = "default_graph_chunk_size")]
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}
fn default_acquire_timeout() -> Duration {
    Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS)
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_launch_delay() -> Duration {
    Duration::from_millis(DEFAULT_LAUNCH_DELAY_MS)
}
fn default_max_depth() -> i32 {
    DEFAULT_MAX_DEPTH
}
fn default_max_concurrent_jobs() -> usize {
    DEFAULT_MAX_CONCURRENT_JOBS
}
fn default_too_many_requests_cooldown() -> Duration {
    Duration::from_secs(DEFAULT_TOO_MANY_REQUESTS_COOLDOWN_SECS)
}
fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS)
}
fn default_max_joined_chats() -> i64 {
    DEFAULT_MAX_JOINED_CHATS
}
fn default_join_delay() -> Duration {
    Duration::from_secs(DEFAULT_JOIN_DELAY_SECS)
}
fn default_history_fetch_timeout() -> Duration {
    Duration::from_secs(DEFAULT_HISTORY_FETCH_TIMEOUT_SECS)
}
fn default_history_page_size() -> i32 {
    DEFAULT_HISTORY_PAGE_SIZE
}
fn default_member_page_size() -> i32 {
    DEFAULT_MEMBER_PAGE_SIZE
}
fn default_member_page_delay() -> Duration {
    Duration::from_millis(DEFAULT_MEMBER_PAGE_DELAY_MS)
}
fn default_member_retry_delay() -> Duration {
    Duration::from_secs(DEFAULT_MEMBER_RETRY_DELAY_SECS)
}
fn default_account_fetch_delay() -> Duration {
    Duration::from_millis(DEFAULT_ACCOUNT_FETCH_DELAY_MS)
}
fn default_oldest_message_date() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(DEFAULT_OLDEST_MESSAGE_DATE)
        .map(|date| date.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
fn default_max_text_length() -> usize {
    DEFAULT_MAX_TEXT_LENGTH
}
fn default_leave_batch_size() -> u64 {
    DEFAULT_LEAVE_BATCH_SIZE
}
fn default_graph_min_member_count() -> i32 {
    DEFAULT_GRAPH_MIN_MEMBER_COUNT
}
fn default_graph_min_connections() -> i64 {
    DEFAULT_GRAPH_MIN_CONNECTIONS
}
fn default_graph_min_messages() -> i64 {
    DEFAULT_GRAPH_MIN_MESSAGES
}
fn default_graph_chunk_size() -> usize {
    DEFAULT_GRAPH_CHUNK_SIZE
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: Some(DEFAULT_MAX_CONNECTIONS),
            acquire_timeout: default_acquire_timeout(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            launch_delay: default_launch_delay(),
            max_depth: default_max_depth(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            too_many_requests_cooldown: default_too_many_requests_cooldown(),
            dedup_cache_capacity: None,
            shutdown_timeout: default_shutdown_timeout(),
            job_types: HashMap::new(),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_joined_chats: default_max_joined_chats(),
            join_delay: default_join_delay(),
            history_fetch_timeout: default_history_fetch_timeout(),
            history_page_size: default_history_page_size(),
            member_page_size: default_member_page_size(),
            member_page_delay: default_member_page_delay(),
            member_retry_delay: default_member_retry_delay(),
            account_fetch_delay: default_account_fetch_delay(),
            oldest_message_date: default_oldest_message_date(),
            max_text_length: default_max_text_length(),
            leave_batch_size: default_leave_batch_size(),
            graph: GraphConfig::default(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            min_member_count: default_graph_min_member_count(),
            min_connections: default_graph_min_connections(),
            min_messages: default_graph_min_messages(),
            chunk_size: default_graph_chunk_size(),
        }
    }
}

impl SchedulerConfig {
    /// Built-in trigger table; `None` fields fall back to the global defaults
    fn builtin(&self, job_type: JobType) -> JobTypeOverrides {
        let secs = Duration::from_secs;
        let (interval, initial_delay, batch_size, cooldown, ticks) = match job_type {
            JobType::GetGroupInfo => (secs(5), secs(5), None, None, 1),
            JobType::GetGroupInfoByHandle => (secs(90), secs(5), Some(1), Some(secs(60 * 60)), 1),
            JobType::GetMemberList => (secs(5), secs(5), Some(2), None, 1),
            JobType::GetMessageHistory => (secs(3), secs(20), Some(15), None, 5),
            JobType::FollowInviteLink => (secs(60), secs(20), Some(1), Some(secs(10 * 60)), 1),
            JobType::CalculateGraph => (secs(30 * 60), secs(60), None, None, 1),
            JobType::LeaveGroups => (secs(10), secs(20), None, None, 1),
        };

        JobTypeOverrides {
            interval: Some(interval),
            initial_delay: Some(initial_delay),
            batch_size,
            launch_delay: None,
            too_many_requests_cooldown: cooldown,
            max_concurrent_ticks: Some(ticks),
            enabled: Some(true),
        }
    }

    /// Resolve the trigger settings for a job type: configured override,
    /// then built-in table, then global default
    pub fn schedule_for(&self, job_type: JobType) -> JobTypeSchedule {
        let builtin = self.builtin(job_type);
        let configured = self.job_types.get(&job_type).cloned().unwrap_or_default();

        JobTypeSchedule {
            job_type,
            interval: configured
                .interval
                .or(builtin.interval)
                .unwrap_or(Duration::from_secs(5)),
            initial_delay: configured
                .initial_delay
                .or(builtin.initial_delay)
                .unwrap_or_default(),
            batch_size: configured
                .batch_size
                .or(builtin.batch_size)
                .unwrap_or(self.batch_size),
            launch_delay: configured
                .launch_delay
                .or(builtin.launch_delay)
                .unwrap_or(self.launch_delay),
            too_many_requests_cooldown: configured
                .too_many_requests_cooldown
                .or(builtin.too_many_requests_cooldown)
                .unwrap_or(self.too_many_requests_cooldown),
            max_concurrent_ticks: configured
                .max_concurrent_ticks
                .or(builtin.max_concurrent_ticks)
                .unwrap_or(1),
            enabled: configured.enabled.or(builtin.enabled).unwrap_or(true),
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.batch_size == 0 {
            return Err(AppError::configuration("scheduler.batch_size must be at least 1"));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(AppError::configuration(
                "scheduler.max_concurrent_jobs must be at least 1",
            ));
        }
        if self.max_depth < 0 {
            return Err(AppError::configuration(format!(
                "scheduler.max_depth must not be negative: {}",
                self.max_depth
            )));
        }
        if self.dedup_cache_capacity == Some(0) {
            return Err(AppError::configuration(
                "scheduler.dedup_cache_capacity must be at least 1 when set",
            ));
        }

        for job_type in JobType::all() {
            let schedule = self.schedule_for(job_type);
            if schedule.interval.is_zero() {
                return Err(AppError::configuration(format!(
                    "scheduler.job_types.{job_type}.interval must be greater than zero"
                )));
            }
            if schedule.batch_size == 0 {
                return Err(AppError::configuration(format!(
                    "scheduler.job_types.{job_type}.batch_size must be at least 1"
                )));
            }
            if schedule.max_concurrent_ticks == 0 {
                return Err(AppError::configuration(format!(
                    "scheduler.job_types.{job_type}.max_concurrent_ticks must be at least 1"
                )));
            }
        }

        Ok(())
    }
}

impl CrawlerConfig {
    pub fn validate(&self) -> AppResult<()> {
        if self.history_page_size <= 0 || self.member_page_size <= 0 {
            return Err(AppError::configuration(
                "crawler page sizes must be greater than zero",
            ));
        }
        if self.graph.chunk_size == 0 {
            return Err(AppError::configuration(
                "crawler.graph.chunk_size must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    /// Layer defaults, the TOML file and `CRAWLER_*` environment variables.
    /// A missing file is created with the defaults.
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if !std::path::Path::new(config_file).exists() {
            let contents = toml::to_string_pretty(&Self::default())?;
            std::fs::write(config_file, contents)
                .with_context(|| format!("Failed to write default config file {config_file}"))?;
            info!("Created default config file: {}", config_file);
        }

        let config: Config = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load configuration from {config_file}"))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        self.scheduler.validate()?;
        self.crawler.validate()
    }
}
