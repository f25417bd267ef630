//! SeaORM-based repository for crawled messages

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::entities::{messages, prelude::Messages};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{MessageTotals, StoredMessage};

#[derive(Clone)]
pub struct MessageSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl MessageSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// The subset of `message_ids` already stored for `chat_id`
    pub async fn existing_message_ids(
        &self,
        chat_id: i64,
        message_ids: &[i64],
    ) -> RepositoryResult<HashSet<i64>> {
        if message_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let ids: Vec<i64> = Messages::find()
            .select_only()
            .column(messages::Column::MessageId)
            .filter(messages::Column::ChatId.eq(chat_id))
            .filter(messages::Column::MessageId.is_in(message_ids.iter().copied()))
            .into_tuple()
            .all(&*self.connection)
            .await?;
        Ok(ids.into_iter().collect())
    }

    pub async fn insert(&self, message: &StoredMessage) -> RepositoryResult<()> {
        let (origin_chat, origin_message) = message.forward_origin.unzip();
        let active_model = messages::ActiveModel {
            message_id: Set(message.message_id),
            chat_id: Set(message.chat_id),
            author_id: Set(message.author_id),
            date: Set(message.date),
            is_forwarded: Set(message.forward_origin.is_some()),
            forward_origin_chat_id: Set(origin_chat),
            forward_origin_message_id: Set(origin_message),
            text_content: Set(message.text.clone()),
            message_type: Set(message.message_type.clone()),
            file_id: Set(message.media.file_id),
            remote_file_id: Set(message.media.remote_file_id.clone()),
            remote_unique_id: Set(message.media.remote_unique_id.clone()),
            file_name: Set(message.media.file_name.clone()),
            duration: Set(message.media.duration),
            width: Set(message.media.width),
            height: Set(message.media.height),
            text_entities: Set(serde_json::to_value(&message.entities)?),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        active_model
            .insert(&*self.connection)
            .await
            .map_err(|e| RepositoryError::from_db(e, "messages.message_id_chat_id"))?;
        Ok(())
    }

    /// Forwarded and original message counts per chat
    pub async fn totals_by_chat(&self) -> RepositoryResult<HashMap<i64, MessageTotals>> {
        let rows: Vec<(i64, bool, i64)> = Messages::find()
            .select_only()
            .column(messages::Column::ChatId)
            .column(messages::Column::IsForwarded)
            .column_as(messages::Column::Id.count(), "count")
            .group_by(messages::Column::ChatId)
            .group_by(messages::Column::IsForwarded)
            .into_tuple()
            .all(&*self.connection)
            .await?;

        let mut totals: HashMap<i64, MessageTotals> = HashMap::new();
        for (chat_id, is_forwarded, count) in rows {
            let entry = totals.entry(chat_id).or_default();
            if is_forwarded {
                entry.forwarded += count;
            } else {
                entry.original += count;
            }
        }
        Ok(totals)
    }

    /// `(forwarding chat, origin chat, count)` for forwards between distinct chats
    pub async fn forward_counts(&self) -> RepositoryResult<Vec<(i64, i64, i64)>> {
        let rows: Vec<(i64, Option<i64>, i64)> = Messages::find()
            .select_only()
            .column(messages::Column::ChatId)
            .column(messages::Column::ForwardOriginChatId)
            .column_as(messages::Column::Id.count(), "count")
            .filter(messages::Column::IsForwarded.eq(true))
            .filter(messages::Column::ForwardOriginChatId.is_not_null())
            .group_by(messages::Column::ChatId)
            .group_by(messages::Column::ForwardOriginChatId)
            .into_tuple()
            .all(&*self.connection)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(chat_id, origin, count)| {
                origin
                    .filter(|origin| *origin != chat_id)
                    .map(|origin| (chat_id, origin, count))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::content::MediaInfo;
    use crate::database::Database;

    async fn create_test_repository() -> MessageSeaOrmRepository {
        let database = Database::new(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
        database.migrate().await.unwrap();
        MessageSeaOrmRepository::new(database.connection())
    }

    fn message(chat_id: i64, message_id: i64, origin: Option<i64>) -> StoredMessage {
        StoredMessage {
            message_id,
            chat_id,
            author_id: 1,
            date: Utc::now(),
            forward_origin: origin.map(|o| (o, 1)),
            text: "hello".into(),
            message_type: "text".into(),
            entities: Vec::new(),
            media: MediaInfo::default(),
        }
    }

    #[tokio::test]
    async fn test_existing_ids_are_scoped_to_chat() {
        let repo = create_test_repository().await;
        repo.insert(&message(1, 10, None)).await.unwrap();
        repo.insert(&message(2, 11, None)).await.unwrap();

        let existing = repo.existing_message_ids(1, &[10, 11, 12]).await.unwrap();
        assert_eq!(existing, HashSet::from([10]));

        let err = repo.insert(&message(1, 10, None)).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_aggregations() {
        let repo = create_test_repository().await;
        repo.insert(&message(1, 1, None)).await.unwrap();
        repo.insert(&message(1, 2, Some(2))).await.unwrap();
        repo.insert(&message(1, 3, Some(2))).await.unwrap();
        repo.insert(&message(1, 4, Some(1))).await.unwrap();
        repo.insert(&message(2, 1, None)).await.unwrap();

        let totals = repo.totals_by_chat().await.unwrap();
        assert_eq!(
            totals[&1],
            MessageTotals {
                forwarded: 3,
                original: 1
            }
        );
        assert_eq!(totals[&2].total(), 1);

        let forwards = repo.forward_counts().await.unwrap();
        assert_eq!(forwards, vec![(1, 2, 2)]);
    }
}
