//! SeaORM-based repository for links found in messages

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use std::sync::Arc;

use crate::entities::{message_links, prelude::MessageLinks};
use crate::errors::{RepositoryError, RepositoryResult};

#[derive(Clone)]
pub struct MessageLinkSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl MessageLinkSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn exists(&self, chat_id: i64, message_id: i64, url: &str) -> RepositoryResult<bool> {
        let count = MessageLinks::find()
            .filter(message_links::Column::ChatId.eq(chat_id))
            .filter(message_links::Column::MessageId.eq(message_id))
            .filter(message_links::Column::Url.eq(url))
            .count(&*self.connection)
            .await?;
        Ok(count > 0)
    }

    /// Insert a link; `false` when the (chat, message, url) triple was
    /// already recorded
    pub async fn insert(
        &self,
        chat_id: i64,
        message_id: i64,
        url: &str,
        domain: &str,
    ) -> RepositoryResult<bool> {
        let result = message_links::ActiveModel {
            chat_id: Set(chat_id),
            message_id: Set(message_id),
            url: Set(url.to_string()),
            domain: Set(domain.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.connection)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => {
                let err = RepositoryError::from_db(e, "message_links.chat_id_message_id_url");
                if err.is_unique_violation() {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }

    pub async fn find_domains_for_chat(&self, chat_id: i64) -> RepositoryResult<Vec<String>> {
        Ok(MessageLinks::find()
            .filter(message_links::Column::ChatId.eq(chat_id))
            .all(&*self.connection)
            .await?
            .into_iter()
            .map(|m| m.domain)
            .collect())
    }
}
