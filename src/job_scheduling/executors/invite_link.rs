//! Invite-link following

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::CrawlContext;
use crate::job_scheduling::{
    JobError, JobRecord, JobType, NewJob, PersistedJobExecutor, priority_for_depth,
};
use crate::network::NetworkError;

/// Checks an invite link and either enqueues the public group or joins the
/// private one. Joining is refused once the account sits in more than
/// `max_joined_chats` chats.
pub struct FollowInviteLinkExecutor {
    ctx: Arc<CrawlContext>,
}

impl FollowInviteLinkExecutor {
    pub fn new(ctx: Arc<CrawlContext>) -> Self {
        Self { ctx }
    }

    async fn enqueue_group(&self, chat_id: i64, depth: i32, priority: i32) -> Result<(), JobError> {
        self.ctx
            .enqueue(
                NewJob::new(JobType::GetGroupInfo, JobType::FollowInviteLink.as_ref())
                    .param1(chat_id)
                    .depth(depth)
                    .priority(priority),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PersistedJobExecutor for FollowInviteLinkExecutor {
    fn job_type(&self) -> JobType {
        JobType::FollowInviteLink
    }

    async fn execute(&self, record: &JobRecord) -> Result<(), JobError> {
        let link = record.required_param(1, "invite_link")?;
        let depth = record.depth_or_zero();
        let network = &self.ctx.network;
        let config = &self.ctx.config;

        let joined = network.joined_chat_count().await?;
        if joined > config.max_joined_chats {
            return Err(JobError::abort(format!(
                "Max number of joined chats exceeded: {} > {}",
                joined, config.max_joined_chats
            )));
        }
        info!("Currently joined {} chats, checking invite link {}", joined, link);

        let link_info = network.check_invite_link(link).await?;
        if self.ctx.repositories.group_chats.exists(link_info.chat_id).await? {
            return Err(JobError::abort(format!(
                "Group {} already exists, no need to join again",
                link_info.chat_id
            )));
        }

        if link_info.is_public {
            info!("Found public group by invite link, no need to join: {}", link_info.title);
            return self
                .enqueue_group(link_info.chat_id, depth, priority_for_depth(depth))
                .await;
        }

        if link_info.creates_join_request {
            return Err(JobError::abort(format!("Invite link creates a join request: {link}")));
        }

        info!("Found private group by invite link, trying to join: {}", link_info.title);
        match network.join_chat_by_invite_link(link).await {
            Ok(chat) => {
                // joined groups jump the queue before the account gets removed
                self.enqueue_group(chat.id, depth, depth * 10).await?;
                tokio::time::sleep(config.join_delay).await;
                Ok(())
            }
            Err(NetworkError::TooManyRequests(message)) => Err(JobError::TooManyRequests(message)),
            Err(e) => {
                warn!("Could not join group {}: {}", link_info.chat_id, e);
                tokio::time::sleep(config.join_delay).await;
                Err(JobError::abort(format!("Can't join group {}: {}", link_info.chat_id, e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_scheduling::executors::test_support::{create_context, record};
    use crate::network::{Chat, ChatKind, ChatPermissions, InviteLinkInfo, MockNetworkClient};

    const LINK: &str = "https://t.me/+AbCdEf";

    fn link_info(is_public: bool, creates_join_request: bool) -> InviteLinkInfo {
        InviteLinkInfo {
            chat_id: 55,
            title: "hidden".into(),
            is_public,
            creates_join_request,
        }
    }

    fn joined_chat() -> Chat {
        Chat {
            id: 55,
            title: "hidden".into(),
            kind: ChatKind::Supergroup {
                supergroup_id: 1055,
                is_channel: false,
            },
            permissions: ChatPermissions::default(),
        }
    }

    #[tokio::test]
    async fn test_cap_exceeded_aborts_without_joining() {
        let mut network = MockNetworkClient::new();
        network.expect_joined_chat_count().returning(|| Ok(201));
        network.expect_check_invite_link().times(0);
        network.expect_join_chat_by_invite_link().times(0);
        let ctx = create_context(Arc::new(network)).await;

        let result = FollowInviteLinkExecutor::new(ctx)
            .execute(&record(JobType::FollowInviteLink, [Some(LINK), None, None, None], 1))
            .await;
        assert!(matches!(result, Err(JobError::Abort(_))));
    }

    #[tokio::test]
    async fn test_public_link_is_enqueued_without_joining() {
        let mut network = MockNetworkClient::new();
        network.expect_joined_chat_count().returning(|| Ok(200));
        network
            .expect_check_invite_link()
            .returning(|_| Ok(link_info(true, false)));
        network.expect_join_chat_by_invite_link().times(0);
        let ctx = create_context(Arc::new(network)).await;

        FollowInviteLinkExecutor::new(ctx.clone())
            .execute(&record(JobType::FollowInviteLink, [Some(LINK), None, None, None], 2))
            .await
            .unwrap();

        let created = ctx.repositories.job_records.find_by_type(JobType::GetGroupInfo).await.unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].param1.as_deref(), Some("55"));
        assert_eq!(created[0].priority, 120);
    }

    #[tokio::test]
    async fn test_private_link_is_joined_with_raised_priority() {
        let mut network = MockNetworkClient::new();
        network.expect_joined_chat_count().returning(|| Ok(3));
        network
            .expect_check_invite_link()
            .returning(|_| Ok(link_info(false, false)));
        network
            .expect_join_chat_by_invite_link()
            .times(1)
            .returning(|_| Ok(joined_chat()));
        let ctx = create_context(Arc::new(network)).await;

        FollowInviteLinkExecutor::new(ctx.clone())
            .execute(&record(JobType::FollowInviteLink, [Some(LINK), None, None, None], 2))
            .await
            .unwrap();

        let created = ctx.repositories.job_records.find_by_type(JobType::GetGroupInfo).await.unwrap();
        assert_eq!(created[0].priority, 20);
        assert_eq!(created[0].created_by, "FollowInviteLink");
    }

    #[tokio::test]
    async fn test_join_failures() {
        let mut network = MockNetworkClient::new();
        network.expect_joined_chat_count().returning(|| Ok(3));
        network
            .expect_check_invite_link()
            .returning(|link| Ok(link_info(false, link.ends_with("request"))));
        let mut attempts = 0;
        network.expect_join_chat_by_invite_link().returning(move |_| {
            attempts += 1;
            if attempts == 1 {
                Err(NetworkError::TooManyRequests("FLOOD_WAIT_30".into()))
            } else {
                Err(NetworkError::Abort("INVITE_HASH_EXPIRED".into()))
            }
        });
        let ctx = create_context(Arc::new(network)).await;
        let executor = FollowInviteLinkExecutor::new(ctx.clone());

        let with_request = "https://t.me/joinchat/request";
        assert!(matches!(
            executor
                .execute(&record(JobType::FollowInviteLink, [Some(with_request), None, None, None], 0))
                .await,
            Err(JobError::Abort(_))
        ));
        assert!(matches!(
            executor
                .execute(&record(JobType::FollowInviteLink, [Some(LINK), None, None, None], 0))
                .await,
            Err(JobError::TooManyRequests(_))
        ));
        assert!(matches!(
            executor
                .execute(&record(JobType::FollowInviteLink, [Some(LINK), None, None, None], 0))
                .await,
            Err(JobError::Abort(_))
        ));
        assert!(ctx.repositories.job_records.find_by_type(JobType::GetGroupInfo).await.unwrap().is_empty());
    }
}
