use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::CrawlContext;
use crate::job_scheduling::{JobError, JobRecord, JobType, PersistedJobExecutor};
use crate::network::NetworkError;

/// Pages through the member list of a supergroup until an empty page
pub struct GetMemberListExecutor {
    ctx: Arc<CrawlContext>,
}

impl GetMemberListExecutor {
    pub fn new(ctx: Arc<CrawlContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl PersistedJobExecutor for GetMemberListExecutor {
    fn job_type(&self) -> JobType {
        JobType::GetMemberList
    }

    async fn execute(&self, record: &JobRecord) -> Result<(), JobError> {
        let supergroup_id: i64 = record.parse_param(1, "supergroup_id")?;
        let chat_id: i64 = record.parse_param(2, "chat_id")?;
        let config = &self.ctx.config;
        let page_size = config.member_page_size.max(1);

        let mut offset = 0;
        let mut total = 0;
        loop {
            let page = match self
                .ctx
                .network
                .get_supergroup_members(supergroup_id, offset, page_size)
                .await
            {
                Ok(page) => page,
                Err(NetworkError::TooManyRequests(message)) => {
                    warn!(
                        "Member page at offset {} of chat {} throttled ({}), retrying in {:?}",
                        offset, chat_id, message, config.member_retry_delay
                    );
                    tokio::time::sleep(config.member_retry_delay).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if page.is_empty() {
                break;
            }

            debug!("Member page of chat {} at offset {}: {} members", chat_id, offset, page.len());
            total += self.ctx.members.persist_batch(chat_id, &page).await?;
            offset = offset.saturating_add(i32::try_from(page.len()).unwrap_or(i32::MAX));
            tokio::time::sleep(config.member_page_delay).await;
        }

        info!("Persisted member list of chat {}: {} new members", chat_id, total);
        Ok(())
    }
}
