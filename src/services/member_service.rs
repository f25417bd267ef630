//! Persists member pages and the accounts behind them

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::database::repositories::{AccountSeaOrmRepository, GroupMemberSeaOrmRepository};
use crate::job_scheduling::JobError;
use crate::network::{ChatMember, NetworkClient};

pub struct MemberService {
    members: GroupMemberSeaOrmRepository,
    accounts: AccountSeaOrmRepository,
    network: Arc<dyn NetworkClient>,
    account_fetch_delay: Duration,
}

impl MemberService {
    pub fn new(
        members: GroupMemberSeaOrmRepository,
        accounts: AccountSeaOrmRepository,
        network: Arc<dyn NetworkClient>,
        account_fetch_delay: Duration,
    ) -> Self {
        Self {
            members,
            accounts,
            network,
            account_fetch_delay,
        }
    }

    /// Insert missing memberships of `chat_id` and fetch every account not
    /// seen before. Returns the number of new memberships.
    pub async fn persist_batch(&self, chat_id: i64, batch: &[ChatMember]) -> Result<usize, JobError> {
        let mut unique = HashSet::new();
        let batch: Vec<ChatMember> = batch
            .iter()
            .filter(|m| unique.insert(m.user_id))
            .cloned()
            .collect();
        if batch.is_empty() {
            return Ok(0);
        }

        let user_ids: Vec<i64> = batch.iter().map(|m| m.user_id).collect();
        let known_members = self.members.existing_member_ids(chat_id, &user_ids).await?;
        let known_accounts = self.accounts.existing_user_ids(&user_ids).await?;

        let new_members: Vec<ChatMember> = batch
            .iter()
            .filter(|m| !known_members.contains(&m.user_id))
            .cloned()
            .collect();
        self.members.insert_many(chat_id, &new_members).await?;

        for user_id in user_ids.iter().filter(|id| !known_accounts.contains(id)) {
            let user = self.network.get_user(*user_id).await?;
            self.accounts.insert(&user).await?;
            tokio::time::sleep(self.account_fetch_delay).await;
        }

        info!(
            "Persisted members for chat {}: {} in batch, {} new",
            chat_id,
            batch.len(),
            new_members.len()
        );
        Ok(new_members.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::database::Database;
    use crate::network::{MockNetworkClient, User};

    #[tokio::test]
    async fn test_only_unknown_accounts_are_fetched() {
        let database = Database::new(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
        database.migrate().await.unwrap();
        let connection = database.connection();
        let accounts = AccountSeaOrmRepository::new(connection.clone());
        accounts
            .insert(&User {
                id: 1,
                ..Default::default()
            })
            .await
            .unwrap();

        let mut network = MockNetworkClient::new();
        network
            .expect_get_user()
            .withf(|id| *id == 2)
            .times(1)
            .returning(|id| {
                Ok(User {
                    id,
                    ..Default::default()
                })
            });

        let service = MemberService::new(
            GroupMemberSeaOrmRepository::new(connection.clone()),
            accounts.clone(),
            Arc::new(network),
            Duration::ZERO,
        );

        let batch = vec![
            ChatMember {
                user_id: 1,
                joined_at: 0,
            },
            ChatMember {
                user_id: 2,
                joined_at: 0,
            },
            ChatMember {
                user_id: 2,
                joined_at: 0,
            },
        ];
        assert_eq!(service.persist_batch(-5, &batch).await.unwrap(), 2);
        assert_eq!(service.persist_batch(-5, &batch[..1]).await.unwrap(), 0);
        assert_eq!(
            accounts.existing_user_ids(&[1, 2]).await.unwrap(),
            HashSet::from([1, 2])
        );
    }
}
