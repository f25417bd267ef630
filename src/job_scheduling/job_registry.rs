//! Executor registry keyed by job type
//!
//! Every type has exactly one executor. Persisted executors process one
//! claimed record at a time; recurring executors take no input and run on a
//! timer.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::types::{ExecutorKind, JobError, JobRecord, JobSchedulingError, JobType};

#[async_trait]
pub trait PersistedJobExecutor: Send + Sync {
    fn job_type(&self) -> JobType;

    async fn execute(&self, record: &JobRecord) -> Result<(), JobError>;
}

#[async_trait]
pub trait RecurringJobExecutor: Send + Sync {
    fn job_type(&self) -> JobType;

    async fn execute(&self) -> Result<(), JobError>;
}

#[derive(Clone)]
enum RegisteredExecutor {
    Persisted(Arc<dyn PersistedJobExecutor>),
    Recurring(Arc<dyn RecurringJobExecutor>),
}

impl RegisteredExecutor {
    fn kind(&self) -> ExecutorKind {
        match self {
            RegisteredExecutor::Persisted(_) => ExecutorKind::Persisted,
            RegisteredExecutor::Recurring(_) => ExecutorKind::Recurring,
        }
    }
}

fn expected_kind(job_type: JobType) -> ExecutorKind {
    if job_type.is_recurring() {
        ExecutorKind::Recurring
    } else {
        ExecutorKind::Persisted
    }
}

#[derive(Default, Clone)]
pub struct JobRegistry {
    executors: HashMap<JobType, RegisteredExecutor>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, job_type: JobType, executor: RegisteredExecutor) -> Result<(), JobSchedulingError> {
        let expected = expected_kind(job_type);
        if executor.kind() != expected {
            return Err(JobSchedulingError::WrongExecutorKind {
                job_type,
                expected,
                requested: executor.kind(),
            });
        }
        if self.executors.contains_key(&job_type) {
            return Err(JobSchedulingError::DuplicateExecutor(job_type));
        }
        debug!("Registered {} executor for {}", executor.kind(), job_type);
        self.executors.insert(job_type, executor);
        Ok(())
    }

    pub fn register_persisted(
        &mut self,
        executor: Arc<dyn PersistedJobExecutor>,
    ) -> Result<(), JobSchedulingError> {
        self.insert(executor.job_type(), RegisteredExecutor::Persisted(executor))
    }

    pub fn register_recurring(
        &mut self,
        executor: Arc<dyn RecurringJobExecutor>,
    ) -> Result<(), JobSchedulingError> {
        self.insert(executor.job_type(), RegisteredExecutor::Recurring(executor))
    }

    fn lookup(&self, job_type: JobType, requested: ExecutorKind) -> Result<&RegisteredExecutor, JobSchedulingError> {
        match self.executors.get(&job_type) {
            Some(executor) if executor.kind() == requested => Ok(executor),
            Some(executor) => Err(JobSchedulingError::WrongExecutorKind {
                job_type,
                expected: executor.kind(),
                requested,
            }),
            None if expected_kind(job_type) != requested => Err(JobSchedulingError::WrongExecutorKind {
                job_type,
                expected: expected_kind(job_type),
                requested,
            }),
            None => Err(JobSchedulingError::ExecutorNotRegistered(job_type)),
        }
    }

    pub fn persisted(&self, job_type: JobType) -> Result<Arc<dyn PersistedJobExecutor>, JobSchedulingError> {
        match self.lookup(job_type, ExecutorKind::Persisted)? {
            RegisteredExecutor::Persisted(executor) => Ok(executor.clone()),
            RegisteredExecutor::Recurring(_) => Err(JobSchedulingError::ExecutorNotRegistered(job_type)),
        }
    }

    pub fn recurring(&self, job_type: JobType) -> Result<Arc<dyn RecurringJobExecutor>, JobSchedulingError> {
        match self.lookup(job_type, ExecutorKind::Recurring)? {
            RegisteredExecutor::Recurring(executor) => Ok(executor.clone()),
            RegisteredExecutor::Persisted(_) => Err(JobSchedulingError::ExecutorNotRegistered(job_type)),
        }
    }

    /// Fails when `job_type` has no executor of the kind its type requires
    pub fn ensure_registered(&self, job_type: JobType) -> Result<(), JobSchedulingError> {
        self.lookup(job_type, expected_kind(job_type)).map(|_| ())
    }

    pub fn registered_types(&self) -> Vec<JobType> {
        let mut types: Vec<_> = self.executors.keys().copied().collect();
        types.sort();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopPersisted(JobType);

    #[async_trait]
    impl PersistedJobExecutor for NoopPersisted {
        fn job_type(&self) -> JobType {
            self.0
        }

        async fn execute(&self, _record: &JobRecord) -> Result<(), JobError> {
            Ok(())
        }
    }

    struct NoopRecurring(JobType);

    #[async_trait]
    impl RecurringJobExecutor for NoopRecurring {
        fn job_type(&self) -> JobType {
            self.0
        }

        async fn execute(&self) -> Result<(), JobError> {
            Ok(())
        }
    }

    #[test]
    fn test_lookup_by_kind() {
        let mut registry = JobRegistry::new();
        registry
            .register_persisted(Arc::new(NoopPersisted(JobType::GetGroupInfo)))
            .unwrap();
        registry
            .register_recurring(Arc::new(NoopRecurring(JobType::CalculateGraph)))
            .unwrap();

        assert!(registry.persisted(JobType::GetGroupInfo).is_ok());
        assert!(registry.recurring(JobType::CalculateGraph).is_ok());
        assert!(matches!(
            registry.recurring(JobType::GetGroupInfo),
            Err(JobSchedulingError::WrongExecutorKind {
                expected: ExecutorKind::Persisted,
                requested: ExecutorKind::Recurring,
                ..
            })
        ));
        assert!(matches!(
            registry.persisted(JobType::GetMemberList),
            Err(JobSchedulingError::ExecutorNotRegistered(JobType::GetMemberList))
        ));
        assert!(matches!(
            registry.recurring(JobType::GetMemberList),
            Err(JobSchedulingError::WrongExecutorKind { .. })
        ));
        assert_eq!(
            registry.registered_types(),
            vec![JobType::GetGroupInfo, JobType::CalculateGraph]
        );
    }

    #[test]
    fn test_registration_rules() {
        let mut registry = JobRegistry::new();
        registry
            .register_persisted(Arc::new(NoopPersisted(JobType::GetGroupInfo)))
            .unwrap();

        assert!(matches!(
            registry.register_persisted(Arc::new(NoopPersisted(JobType::GetGroupInfo))),
            Err(JobSchedulingError::DuplicateExecutor(JobType::GetGroupInfo))
        ));
        assert!(matches!(
            registry.register_persisted(Arc::new(NoopPersisted(JobType::LeaveGroups))),
            Err(JobSchedulingError::WrongExecutorKind { .. })
        ));
        assert!(matches!(
            registry.ensure_registered(JobType::LeaveGroups),
            Err(JobSchedulingError::ExecutorNotRegistered(JobType::LeaveGroups))
        ));
        assert!(registry.ensure_registered(JobType::GetGroupInfo).is_ok());
    }
}
