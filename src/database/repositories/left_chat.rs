//! SeaORM-based repository for chats the crawler has left

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QuerySelect, Set};
use std::collections::HashSet;
use std::sync::Arc;

use crate::entities::{left_chats, prelude::LeftChats};
use crate::errors::{RepositoryError, RepositoryResult};

#[derive(Clone)]
pub struct LeftChatSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl LeftChatSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Record a left chat; recording the same chat twice is a no-op
    pub async fn insert(&self, chat_id: i64) -> RepositoryResult<()> {
        let result = left_chats::ActiveModel {
            chat_id: Set(chat_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.connection)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => match RepositoryError::from_db(e, "left_chats.chat_id") {
                err if err.is_unique_violation() => Ok(()),
                err => Err(err),
            },
        }
    }

    pub async fn chat_ids(&self) -> RepositoryResult<HashSet<i64>> {
        let ids: Vec<i64> = LeftChats::find()
            .select_only()
            .column(left_chats::Column::ChatId)
            .into_tuple()
            .all(&*self.connection)
            .await?;
        Ok(ids.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::database::Database;

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let database = Database::new(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
        database.migrate().await.unwrap();
        let repo = LeftChatSeaOrmRepository::new(database.connection());

        repo.insert(3).await.unwrap();
        repo.insert(3).await.unwrap();
        repo.insert(4).await.unwrap();
        assert_eq!(repo.chat_ids().await.unwrap(), HashSet::from([3, 4]));
    }
}
