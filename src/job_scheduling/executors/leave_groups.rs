use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::CrawlContext;
use crate::job_scheduling::{JobError, JobState, JobType, RecurringJobExecutor};

/// Leaves groups that were joined through an invite link once their crawl
/// is done: group info FINISHED and no pending history page left, or the
/// group is gone.
pub struct LeaveGroupsExecutor {
    ctx: Arc<CrawlContext>,
}

impl LeaveGroupsExecutor {
    pub fn new(ctx: Arc<CrawlContext>) -> Self {
        Self { ctx }
    }

    async fn candidates(&self) -> Result<Vec<i64>, JobError> {
        let repositories = &self.ctx.repositories;
        let joined = repositories
            .job_records
            .chat_ids_by_provenance(
                JobType::GetGroupInfo,
                JobType::FollowInviteLink.as_ref(),
                JobState::Finished,
            )
            .await?;
        let left = repositories.left_chats.chat_ids().await?;
        let active_history = repositories
            .job_records
            .active_params(JobType::GetMessageHistory)
            .await?;

        let mut candidates = Vec::new();
        for chat_id in joined.into_iter().filter(|id| !left.contains(id)) {
            if candidates.len() as u64 >= self.ctx.config.leave_batch_size {
                break;
            }
            let Some(group) = repositories.group_chats.find_by_chat_id(chat_id).await? else {
                continue;
            };
            if group.deleted || !active_history.contains(&chat_id.to_string()) {
                candidates.push(chat_id);
            }
        }
        Ok(candidates)
    }
}

#[async_trait]
impl RecurringJobExecutor for LeaveGroupsExecutor {
    fn job_type(&self) -> JobType {
        JobType::LeaveGroups
    }

    async fn execute(&self) -> Result<(), JobError> {
        let candidates = self.candidates().await?;
        if candidates.is_empty() {
            debug!("No groups to leave");
            return Ok(());
        }

        let left_chats = &self.ctx.repositories.left_chats;
        for chat_id in candidates {
            match self.ctx.network.leave_chat(chat_id).await.map_err(JobError::from) {
                Ok(()) => {
                    left_chats.insert(chat_id).await?;
                    info!("Left chat {}", chat_id);
                }
                Err(JobError::Abort(message)) => {
                    left_chats.insert(chat_id).await?;
                    return Err(JobError::Abort(message));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
