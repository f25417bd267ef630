//! SeaORM-based repositories for accounts and group memberships

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QuerySelect, Set,
};
use std::collections::HashSet;
use std::sync::Arc;

use crate::entities::{
    accounts, group_members,
    prelude::{Accounts, GroupMembers},
};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::network::{ChatMember, User};

#[derive(Clone)]
pub struct AccountSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl AccountSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn existing_user_ids(&self, user_ids: &[i64]) -> RepositoryResult<HashSet<i64>> {
        if user_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let ids: Vec<i64> = Accounts::find()
            .select_only()
            .column(accounts::Column::UserId)
            .filter(accounts::Column::UserId.is_in(user_ids.iter().copied()))
            .into_tuple()
            .all(&*self.connection)
            .await?;
        Ok(ids.into_iter().collect())
    }

    pub async fn insert(&self, user: &User) -> RepositoryResult<()> {
        accounts::ActiveModel {
            user_id: Set(user.id),
            first_name: Set(user.first_name.clone()),
            last_name: Set(user.last_name.clone()),
            username: Set(user.username.clone()),
            phone_number: Set(user.phone_number.clone()),
            is_verified: Set(user.is_verified),
            is_scam: Set(user.is_scam),
            is_fake: Set(user.is_fake),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.connection)
        .await
        .map_err(|e| RepositoryError::from_db(e, "accounts.user_id"))?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct GroupMemberSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl GroupMemberSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Members of `chat_id` among `user_ids` that are already recorded
    pub async fn existing_member_ids(
        &self,
        chat_id: i64,
        user_ids: &[i64],
    ) -> RepositoryResult<HashSet<i64>> {
        if user_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let ids: Vec<i64> = GroupMembers::find()
            .select_only()
            .column(group_members::Column::UserId)
            .filter(group_members::Column::ChatId.eq(chat_id))
            .filter(group_members::Column::UserId.is_in(user_ids.iter().copied()))
            .into_tuple()
            .all(&*self.connection)
            .await?;
        Ok(ids.into_iter().collect())
    }

    pub async fn insert_many(&self, chat_id: i64, members: &[ChatMember]) -> RepositoryResult<()> {
        if members.is_empty() {
            return Ok(());
        }
        let now = Utc::now();
        let models = members.iter().map(|member| group_members::ActiveModel {
            chat_id: Set(chat_id),
            user_id: Set(member.user_id),
            joined_at: Set(member.joined_at()),
            created_at: Set(now),
            ..Default::default()
        });

        GroupMembers::insert_many(models)
            .exec(&*self.connection)
            .await
            .map_err(|e| RepositoryError::from_db(e, "group_members.chat_id_user_id"))?;
        Ok(())
    }

    pub async fn count_for_chat(&self, chat_id: i64) -> RepositoryResult<u64> {
        Ok(GroupMembers::find()
            .filter(group_members::Column::ChatId.eq(chat_id))
            .count(&*self.connection)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::database::Database;

    async fn connection() -> Arc<DatabaseConnection> {
        let database = Database::new(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
        database.migrate().await.unwrap();
        database.connection()
    }

    #[tokio::test]
    async fn test_accounts() {
        let repo = AccountSeaOrmRepository::new(connection().await);
        repo.insert(&User {
            id: 9,
            username: Some("nine".into()),
            ..Default::default()
        })
        .await
        .unwrap();

        assert_eq!(
            repo.existing_user_ids(&[9, 10]).await.unwrap(),
            HashSet::from([9])
        );
        assert!(repo.insert(&User { id: 9, ..Default::default() })
            .await
            .unwrap_err()
            .is_unique_violation());
    }

    #[tokio::test]
    async fn test_members() {
        let repo = GroupMemberSeaOrmRepository::new(connection().await);
        let members = vec![
            ChatMember {
                user_id: 1,
                joined_at: 1_600_000_000,
            },
            ChatMember {
                user_id: 2,
                joined_at: 1_600_000_100,
            },
        ];
        repo.insert_many(-100, &members).await.unwrap();
        repo.insert_many(-100, &[]).await.unwrap();

        assert_eq!(repo.count_for_chat(-100).await.unwrap(), 2);
        assert_eq!(
            repo.existing_member_ids(-100, &[1, 3]).await.unwrap(),
            HashSet::from([1])
        );
        assert!(repo.existing_member_ids(-200, &[1]).await.unwrap().is_empty());
    }
}
