//! SeaORM-based GroupChat repository

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QuerySelect, Set,
};
use std::collections::HashSet;
use std::sync::Arc;

use crate::entities::{group_chats, prelude::GroupChats};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::GroupChat;

#[derive(Clone)]
pub struct GroupChatSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl GroupChatSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn exists(&self, chat_id: i64) -> RepositoryResult<bool> {
        let count = GroupChats::find()
            .filter(group_chats::Column::ChatId.eq(chat_id))
            .count(&*self.connection)
            .await?;
        Ok(count > 0)
    }

    /// The subset of `chat_ids` already stored
    pub async fn existing_chat_ids(&self, chat_ids: &[i64]) -> RepositoryResult<HashSet<i64>> {
        if chat_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let ids: Vec<i64> = GroupChats::find()
            .select_only()
            .column(group_chats::Column::ChatId)
            .filter(group_chats::Column::ChatId.is_in(chat_ids.iter().copied()))
            .into_tuple()
            .all(&*self.connection)
            .await?;
        Ok(ids.into_iter().collect())
    }

    pub async fn find_by_chat_id(&self, chat_id: i64) -> RepositoryResult<Option<GroupChat>> {
        Ok(GroupChats::find()
            .filter(group_chats::Column::ChatId.eq(chat_id))
            .one(&*self.connection)
            .await?
            .map(Self::model_to_domain))
    }

    pub async fn find_all(&self) -> RepositoryResult<Vec<GroupChat>> {
        Ok(GroupChats::find()
            .all(&*self.connection)
            .await?
            .into_iter()
            .map(Self::model_to_domain)
            .collect())
    }

    pub async fn insert(&self, group: &GroupChat) -> RepositoryResult<()> {
        let now = Utc::now();
        let active_model = group_chats::ActiveModel {
            chat_id: Set(group.chat_id),
            supergroup_id: Set(group.supergroup_id),
            title: Set(group.title.clone()),
            handle: Set(group.handle.clone()),
            description: Set(group.description.clone()),
            member_count: Set(group.member_count),
            is_channel: Set(group.is_channel),
            is_member_list_public: Set(group.is_member_list_public),
            is_all_history_available: Set(group.is_all_history_available),
            is_statistics_enabled: Set(group.is_statistics_enabled),
            can_send_messages: Set(group.can_send_messages),
            can_send_media_messages: Set(group.can_send_media_messages),
            can_send_polls: Set(group.can_send_polls),
            can_send_other_messages: Set(group.can_send_other_messages),
            can_add_web_page_previews: Set(group.can_add_web_page_previews),
            is_supergroup: Set(group.is_supergroup),
            deleted: Set(group.deleted),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        active_model
            .insert(&*self.connection)
            .await
            .map_err(|e| RepositoryError::from_db(e, "group_chats.chat_id"))?;
        Ok(())
    }

    pub async fn mark_deleted(&self, chat_id: i64) -> RepositoryResult<()> {
        let result = GroupChats::update_many()
            .col_expr(group_chats::Column::Deleted, Expr::value(true))
            .col_expr(group_chats::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(group_chats::Column::ChatId.eq(chat_id))
            .exec(&*self.connection)
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::record_not_found(
                "group_chats",
                "chat_id",
                chat_id,
            ));
        }
        Ok(())
    }

    fn model_to_domain(model: group_chats::Model) -> GroupChat {
        GroupChat {
            chat_id: model.chat_id,
            supergroup_id: model.supergroup_id,
            title: model.title,
            handle: model.handle,
            description: model.description,
            member_count: model.member_count,
            is_channel: model.is_channel,
            is_member_list_public: model.is_member_list_public,
            is_all_history_available: model.is_all_history_available,
            is_statistics_enabled: model.is_statistics_enabled,
            can_send_messages: model.can_send_messages,
            can_send_media_messages: model.can_send_media_messages,
            can_send_polls: model.can_send_polls,
            can_send_other_messages: model.can_send_other_messages,
            can_add_web_page_previews: model.can_add_web_page_previews,
            is_supergroup: model.is_supergroup,
            deleted: model.deleted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::database::Database;

    async fn create_test_repository() -> GroupChatSeaOrmRepository {
        let database = Database::new(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
        database.migrate().await.unwrap();
        GroupChatSeaOrmRepository::new(database.connection())
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let repo = create_test_repository().await;
        let group = GroupChat {
            chat_id: -1001,
            title: "Test".into(),
            member_count: 150,
            is_supergroup: true,
            ..Default::default()
        };
        repo.insert(&group).await.unwrap();

        assert!(repo.exists(-1001).await.unwrap());
        assert!(!repo.exists(-1002).await.unwrap());
        assert_eq!(repo.find_by_chat_id(-1001).await.unwrap(), Some(group.clone()));

        let known = repo.existing_chat_ids(&[-1001, -1002]).await.unwrap();
        assert_eq!(known, HashSet::from([-1001]));

        let err = repo.insert(&group).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_mark_deleted() {
        let repo = create_test_repository().await;
        repo.insert(&GroupChat {
            chat_id: 5,
            title: "gone".into(),
            ..Default::default()
        })
        .await
        .unwrap();

        repo.mark_deleted(5).await.unwrap();
        assert!(repo.find_by_chat_id(5).await.unwrap().unwrap().deleted);
        assert!(matches!(
            repo.mark_deleted(6).await,
            Err(RepositoryError::RecordNotFound { .. })
        ));
    }
}
