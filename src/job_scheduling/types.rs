//! Job scheduling type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::errors::RepositoryError;
use crate::network::NetworkError;

/// Priority of a record created without an explicit one
pub const DEFAULT_PRIORITY: i32 = 100;

/// Provenance of the audit markers written for recurring runs
pub const SCHEDULER_PROVENANCE: &str = "Scheduler";

/// Kinds of crawl work. Stored by variant name.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
    EnumIter,
)]
pub enum JobType {
    GetGroupInfo,
    GetGroupInfoByHandle,
    GetMemberList,
    GetMessageHistory,
    CalculateGraph,
    FollowInviteLink,
    LeaveGroups,
}

impl JobType {
    /// Recurring types run on a timer without an input record
    pub fn is_recurring(&self) -> bool {
        matches!(self, JobType::CalculateGraph | JobType::LeaveGroups)
    }

    pub fn all() -> impl Iterator<Item = JobType> {
        JobType::iter()
    }
}

/// Record lifecycle. FINISHED, CANCELLED and ERROR are terminal.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
    EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    New,
    Running,
    Finished,
    Cancelled,
    Error,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Finished | JobState::Cancelled | JobState::Error
        )
    }
}

/// A persisted job record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: i32,
    pub job_type: JobType,
    pub state: JobState,
    pub priority: i32,
    pub param1: Option<String>,
    pub param2: Option<String>,
    pub param3: Option<String>,
    pub param4: Option<String>,
    pub depth: Option<i32>,
    pub created_by: String,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn depth_or_zero(&self) -> i32 {
        self.depth.unwrap_or(0)
    }

    fn param(&self, index: usize) -> Option<&str> {
        match index {
            1 => self.param1.as_deref(),
            2 => self.param2.as_deref(),
            3 => self.param3.as_deref(),
            4 => self.param4.as_deref(),
            _ => None,
        }
    }

    /// A required, non-blank string parameter
    pub fn required_param(&self, index: usize, name: &str) -> Result<&str, JobError> {
        match self.param(index).map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(JobError::InvalidJob(format!(
                "{} record {}: 'param{}' ({}) is missing or blank",
                self.job_type, self.id, index, name
            ))),
        }
    }

    /// A required parameter parsed into `T`
    pub fn parse_param<T: FromStr>(&self, index: usize, name: &str) -> Result<T, JobError> {
        let raw = self.required_param(index, name)?;
        raw.parse::<T>().map_err(|_| {
            JobError::InvalidJob(format!(
                "{} record {}: 'param{}' ({}) is not a valid {}: '{}'",
                self.job_type,
                self.id,
                index,
                name,
                std::any::type_name::<T>(),
                raw
            ))
        })
    }

    /// An optional parameter parsed into `T`, falling back to `default` when
    /// absent or unparseable
    pub fn param_or<T: FromStr>(&self, index: usize, default: T) -> T {
        self.param(index)
            .and_then(|raw| raw.trim().parse::<T>().ok())
            .unwrap_or(default)
    }
}

impl fmt::Display for JobRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.job_type, self.id)?;
        if let Some(param1) = &self.param1 {
            write!(f, "({param1})")?;
        }
        Ok(())
    }
}

/// A request to create a persisted record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub job_type: JobType,
    pub priority: i32,
    pub param1: Option<String>,
    pub param2: Option<String>,
    pub param3: Option<String>,
    pub param4: Option<String>,
    pub depth: Option<i32>,
    pub created_by: String,
}

impl NewJob {
    pub fn new(job_type: JobType, created_by: impl Into<String>) -> Self {
        Self {
            job_type,
            priority: DEFAULT_PRIORITY,
            param1: None,
            param2: None,
            param3: None,
            param4: None,
            depth: None,
            created_by: created_by.into(),
        }
    }

    pub fn param1(mut self, value: impl ToString) -> Self {
        self.param1 = Some(value.to_string());
        self
    }

    pub fn param2(mut self, value: impl ToString) -> Self {
        self.param2 = Some(value.to_string());
        self
    }

    pub fn param3(mut self, value: impl ToString) -> Self {
        self.param3 = Some(value.to_string());
        self
    }

    pub fn param4(mut self, value: impl ToString) -> Self {
        self.param4 = Some(value.to_string());
        self
    }

    pub fn depth(mut self, depth: i32) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// The de-duplication key: type plus all four parameters, absent ones
    /// kept distinct from empty strings
    pub fn fingerprint(&self) -> String {
        serde_json::json!([
            self.job_type.as_ref(),
            self.param1,
            self.param2,
            self.param3,
            self.param4
        ])
        .to_string()
    }
}

/// Priority of a record discovered at `depth`; deeper records wait longer
pub fn priority_for_depth(depth: i32) -> i32 {
    DEFAULT_PRIORITY + depth * 10
}

/// Outcome signals raised by executors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Permanent failure, the record is CANCELLED
    #[error("Job aborted: {0}")]
    Abort(String),

    /// Transient failure, the record goes back to NEW untouched
    #[error("Job reset: {0}")]
    Reset(String),

    /// Quota exceeded, back to NEW after the type's cooldown
    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    #[error("Job timed out after {0:?}")]
    Timeout(Duration),

    /// Corrupt or missing parameter on a persisted record
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl JobError {
    pub fn abort(message: impl Into<String>) -> Self {
        Self::Abort(message.into())
    }

    pub fn reset(message: impl Into<String>) -> Self {
        Self::Reset(message.into())
    }

    /// The state a RUNNING persisted record moves to after this failure
    pub fn next_state(&self) -> JobState {
        match self {
            JobError::Abort(_) => JobState::Cancelled,
            JobError::Reset(_) | JobError::Timeout(_) | JobError::TooManyRequests(_) => {
                JobState::New
            }
            JobError::InvalidJob(_) | JobError::Unexpected(_) => JobState::Error,
        }
    }
}

impl From<NetworkError> for JobError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::Abort(message) => JobError::Abort(message),
            NetworkError::Reset(message) => JobError::Reset(message),
            NetworkError::TooManyRequests(message) => JobError::TooManyRequests(message),
            other => JobError::Unexpected(anyhow::Error::new(other)),
        }
    }
}

impl From<RepositoryError> for JobError {
    fn from(err: RepositoryError) -> Self {
        JobError::Unexpected(anyhow::Error::new(err))
    }
}

impl From<sea_orm::DbErr> for JobError {
    fn from(err: sea_orm::DbErr) -> Self {
        JobError::Unexpected(anyhow::Error::new(err))
    }
}

/// The two executor capability sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ExecutorKind {
    #[strum(serialize = "persisted")]
    Persisted,
    #[strum(serialize = "recurring")]
    Recurring,
}

/// Errors in the scheduling path itself (not job outcomes)
#[derive(Debug, thiserror::Error)]
pub enum JobSchedulingError {
    #[error("No executor registered for job type {0}")]
    ExecutorNotRegistered(JobType),

    #[error("An executor for job type {0} is already registered")]
    DuplicateExecutor(JobType),

    #[error("Job type {job_type} has a {expected} executor, not a {requested} one")]
    WrongExecutorKind {
        job_type: JobType,
        expected: ExecutorKind,
        requested: ExecutorKind,
    },

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}
