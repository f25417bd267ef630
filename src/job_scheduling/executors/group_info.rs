//! Group discovery: resolving handles and persisting group details

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::CrawlContext;
use crate::job_scheduling::{
    JobError, JobRecord, JobType, NewJob, PersistedJobExecutor, priority_for_depth,
};
use crate::models::GroupChat;
use crate::network::{Chat, ChatKind, SupergroupInfo};

/// Fetches a chat by id and persists it when it is a group, then enqueues
/// its member list and message history crawls
pub struct GetGroupInfoExecutor {
    ctx: Arc<CrawlContext>,
}

impl GetGroupInfoExecutor {
    pub fn new(ctx: Arc<CrawlContext>) -> Self {
        Self { ctx }
    }

    fn base_group(chat: &Chat) -> GroupChat {
        GroupChat {
            chat_id: chat.id,
            title: chat.title.clone(),
            can_send_messages: chat.permissions.can_send_messages,
            can_send_media_messages: chat.permissions.can_send_media_messages,
            can_send_polls: chat.permissions.can_send_polls,
            can_send_other_messages: chat.permissions.can_send_other_messages,
            can_add_web_page_previews: chat.permissions.can_add_web_page_previews,
            ..Default::default()
        }
    }

    async fn supergroup_info(&self, chat: &Chat, supergroup_id: i64) -> SupergroupInfo {
        match self.ctx.network.get_supergroup_info(supergroup_id).await {
            Ok(info) => info,
            Err(e) => {
                warn!("Could not get supergroup full info for chat '{}': {}", chat.title, e);
                SupergroupInfo::default()
            }
        }
    }

    /// Basic groups list their members inline; they are persisted right away
    async fn fill_basic_group(&self, group: &mut GroupChat, basic_group_id: i64) -> Result<(), JobError> {
        group.supergroup_id = Some(basic_group_id);
        match self.ctx.network.get_basic_group_info(basic_group_id).await {
            Ok(info) => {
                group.description = info.description;
                group.member_count = i32::try_from(info.members.len()).unwrap_or(i32::MAX);
                self.ctx.members.persist_batch(group.chat_id, &info.members).await?;
            }
            Err(e) => warn!("Could not get basic group full info for chat '{}': {}", group.title, e),
        }
        Ok(())
    }
}

#[async_trait]
impl PersistedJobExecutor for GetGroupInfoExecutor {
    fn job_type(&self) -> JobType {
        JobType::GetGroupInfo
    }

    async fn execute(&self, record: &JobRecord) -> Result<(), JobError> {
        let chat_id: i64 = record.parse_param(1, "chat_id")?;
        let depth = record.depth_or_zero();
        let groups = &self.ctx.repositories.group_chats;

        if groups.exists(chat_id).await? {
            return Err(JobError::abort(format!("Group {chat_id} already exists")));
        }

        let chat = self.ctx.network.get_chat(chat_id).await?;
        let mut group = Self::base_group(&chat);
        let mut member_list = None;

        match chat.kind {
            ChatKind::Supergroup {
                supergroup_id,
                is_channel,
            } => {
                let info = self.supergroup_info(&chat, supergroup_id).await;
                group.supergroup_id = Some(supergroup_id);
                group.is_supergroup = true;
                group.is_channel = is_channel;
                group.description = info.description;
                group.member_count = info.member_count;
                group.is_member_list_public = info.can_get_members;
                group.is_all_history_available = info.is_all_history_available;
                group.is_statistics_enabled = info.can_get_statistics;
                if info.can_get_members {
                    member_list = Some(supergroup_id);
                }
            }
            ChatKind::BasicGroup { basic_group_id } => {
                self.fill_basic_group(&mut group, basic_group_id).await?;
            }
            ChatKind::Private { .. } | ChatKind::Secret => {
                return Err(JobError::abort(format!(
                    "Chat {chat_id} ('{}') is not a group",
                    chat.title
                )));
            }
        }

        match groups.insert(&group).await {
            Ok(()) => info!("Persisted group: {}", group.title),
            Err(e) if e.is_unique_violation() => {
                return Err(JobError::abort(format!("Group {chat_id} already exists")));
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(supergroup_id) = member_list {
            self.ctx
                .enqueue(
                    NewJob::new(JobType::GetMemberList, JobType::GetGroupInfo.as_ref())
                        .param1(supergroup_id)
                        .param2(chat_id)
                        .depth(depth)
                        .priority(record.priority),
                )
                .await?;
        }

        if group.is_all_history_available {
            self.ctx
                .enqueue(
                    NewJob::new(JobType::GetMessageHistory, JobType::GetGroupInfo.as_ref())
                        .param1(chat_id)
                        .depth(depth)
                        .priority(record.priority),
                )
                .await?;
        }

        Ok(())
    }
}

/// Resolves a public handle to a chat id and enqueues its group info crawl
pub struct GetGroupInfoByHandleExecutor {
    ctx: Arc<CrawlContext>,
}

impl GetGroupInfoByHandleExecutor {
    pub fn new(ctx: Arc<CrawlContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl PersistedJobExecutor for GetGroupInfoByHandleExecutor {
    fn job_type(&self) -> JobType {
        JobType::GetGroupInfoByHandle
    }

    async fn execute(&self, record: &JobRecord) -> Result<(), JobError> {
        let handle = record.required_param(1, "handle")?;
        let depth = record.depth_or_zero();

        let Some(chat) = self.ctx.network.get_chat_by_handle(handle).await? else {
            return Err(JobError::abort(format!("Group not found by handle '{handle}'")));
        };

        if self.ctx.repositories.group_chats.exists(chat.id).await? {
            return Err(JobError::abort(format!("Group {} already exists", chat.id)));
        }

        info!("Found group by handle '{}': '{}'", handle, chat.title);
        self.ctx
            .enqueue(
                NewJob::new(JobType::GetGroupInfo, JobType::GetGroupInfoByHandle.as_ref())
                    .param1(chat.id)
                    .depth(depth)
                    .priority(priority_for_depth(depth)),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_scheduling::JobState;
    use crate::job_scheduling::executors::test_support::{create_context, record};
    use crate::network::{BasicGroupInfo, ChatMember, ChatPermissions, MockNetworkClient, NetworkError, User};

    fn supergroup(id: i64) -> Chat {
        Chat {
            id,
            title: format!("group {id}"),
            kind: ChatKind::Supergroup {
                supergroup_id: id + 1000,
                is_channel: false,
            },
            permissions: ChatPermissions {
                can_send_messages: true,
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_supergroup_enqueues_member_list_and_history() {
        let mut network = MockNetworkClient::new();
        network.expect_get_chat().returning(|id| Ok(supergroup(id)));
        network
            .expect_get_supergroup_info()
            .returning(|_| Err(NetworkError::Reset("timeout".into())));
        let ctx = create_context(Arc::new(network)).await;
        let executor = GetGroupInfoExecutor::new(ctx.clone());

        executor
            .execute(&record(JobType::GetGroupInfo, [Some("42"), None, None, None], 1))
            .await
            .unwrap();

        let group = ctx.repositories.group_chats.find_by_chat_id(42).await.unwrap().unwrap();
        assert!(group.is_supergroup);
        assert!(group.is_member_list_public);
        assert!(group.is_all_history_available);
        assert!(group.can_send_messages);
        assert_eq!(group.member_count, 0);

        let members = ctx.repositories.job_records.find_by_type(JobType::GetMemberList).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].param1.as_deref(), Some("1042"));
        assert_eq!(members[0].param2.as_deref(), Some("42"));
        assert_eq!(members[0].depth, Some(1));
        assert_eq!(members[0].created_by, "GetGroupInfo");

        let history = ctx.repositories.job_records.find_by_type(JobType::GetMessageHistory).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].state, JobState::New);
        assert_eq!(history[0].priority, 100);

        assert!(matches!(
            executor
                .execute(&record(JobType::GetGroupInfo, [Some("42"), None, None, None], 1))
                .await,
            Err(JobError::Abort(_))
        ));
    }

    #[tokio::test]
    async fn test_basic_group_persists_members_without_history() {
        let mut network = MockNetworkClient::new();
        network.expect_get_chat().returning(|id| {
            Ok(Chat {
                id,
                title: "basic".into(),
                kind: ChatKind::BasicGroup { basic_group_id: 9 },
                permissions: ChatPermissions::default(),
            })
        });
        network.expect_get_basic_group_info().returning(|_| {
            Ok(BasicGroupInfo {
                description: Some("about".into()),
                members: vec![
                    ChatMember { user_id: 1, joined_at: 0 },
                    ChatMember { user_id: 2, joined_at: 0 },
                ],
            })
        });
        network.expect_get_user().times(2).returning(|id| {
            Ok(User {
                id,
                ..Default::default()
            })
        });
        let ctx = create_context(Arc::new(network)).await;

        GetGroupInfoExecutor::new(ctx.clone())
            .execute(&record(JobType::GetGroupInfo, [Some("7"), None, None, None], 0))
            .await
            .unwrap();

        let group = ctx.repositories.group_chats.find_by_chat_id(7).await.unwrap().unwrap();
        assert_eq!(group.member_count, 2);
        assert!(!group.is_supergroup);
        assert!(!group.is_all_history_available);
        assert_eq!(ctx.repositories.group_members.count_for_chat(7).await.unwrap(), 2);
        assert!(ctx.repositories.job_records.find_by_type(JobType::GetMessageHistory).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_private_chat_is_aborted() {
        let mut network = MockNetworkClient::new();
        network.expect_get_chat().returning(|id| {
            Ok(Chat {
                id,
                title: "someone".into(),
                kind: ChatKind::Private { user_id: id },
                permissions: ChatPermissions::default(),
            })
        });
        let ctx = create_context(Arc::new(network)).await;

        let result = GetGroupInfoExecutor::new(ctx.clone())
            .execute(&record(JobType::GetGroupInfo, [Some("5"), None, None, None], 0))
            .await;
        assert!(matches!(result, Err(JobError::Abort(_))));
        assert!(!ctx.repositories.group_chats.exists(5).await.unwrap());
    }

    #[tokio::test]
    async fn test_handle_resolution() {
        let mut network = MockNetworkClient::new();
        network.expect_get_chat_by_handle().returning(|handle| {
            Ok((handle == "known").then(|| supergroup(77)))
        });
        let ctx = create_context(Arc::new(network)).await;
        let executor = GetGroupInfoByHandleExecutor::new(ctx.clone());

        assert!(matches!(
            executor
                .execute(&record(JobType::GetGroupInfoByHandle, [Some("nobody"), None, None, None], 0))
                .await,
            Err(JobError::Abort(_))
        ));

        executor
            .execute(&record(JobType::GetGroupInfoByHandle, [Some("known"), None, None, None], 2))
            .await
            .unwrap();
        let created = ctx.repositories.job_records.find_by_type(JobType::GetGroupInfo).await.unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].param1.as_deref(), Some("77"));
        assert_eq!(created[0].priority, 120);
        assert_eq!(created[0].created_by, "GetGroupInfoByHandle");

        assert!(matches!(
            executor
                .execute(&record(JobType::GetGroupInfoByHandle, [Some(" "), None, None, None], 0))
                .await,
            Err(JobError::InvalidJob(_))
        ));
    }
}
