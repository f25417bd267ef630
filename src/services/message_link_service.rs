//! Records links found in crawled messages
//!
//! URLs are cleaned and reduced to a display domain before they are stored.
//! Repeated (chat, message, url) triples within the process never reach the
//! store.

use std::collections::HashSet;
use std::sync::Mutex;
use tracing::debug;

use crate::content::links::{clean_url, domain_of};
use crate::database::repositories::MessageLinkSeaOrmRepository;
use crate::errors::RepositoryResult;

pub struct MessageLinkService {
    repository: MessageLinkSeaOrmRepository,
    seen: Mutex<HashSet<(i64, i64, String)>>,
}

impl MessageLinkService {
    pub fn new(repository: MessageLinkSeaOrmRepository) -> Self {
        Self {
            repository,
            seen: Mutex::new(HashSet::new()),
        }
    }

    fn mark_seen(&self, key: (i64, i64, String)) -> bool {
        self.seen
            .lock()
            .map(|mut seen| seen.insert(key))
            .unwrap_or(true)
    }

    /// Store one link; `false` when it was already recorded or has no
    /// usable domain
    pub async fn record(&self, chat_id: i64, message_id: i64, raw_url: &str) -> RepositoryResult<bool> {
        let url = clean_url(raw_url);
        let Some(domain) = domain_of(&url) else {
            debug!("Skipping link without a domain: {}", raw_url);
            return Ok(false);
        };

        if !self.mark_seen((chat_id, message_id, url.clone())) {
            return Ok(false);
        }
        if self.repository.exists(chat_id, message_id, &url).await? {
            return Ok(false);
        }
        self.repository
            .insert(chat_id, message_id, &url, &domain)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::database::Database;

    async fn create_test_service() -> (MessageLinkService, MessageLinkSeaOrmRepository) {
        let database = Database::new(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
        database.migrate().await.unwrap();
        let repository = MessageLinkSeaOrmRepository::new(database.connection());
        (MessageLinkService::new(repository.clone()), repository)
    }

    #[tokio::test]
    async fn test_links_are_cleaned_and_deduplicated() {
        let (service, repository) = create_test_service().await;

        assert!(service.record(1, 10, "https://WWW.YouTube.com/watch/").await.unwrap());
        assert!(!service.record(1, 10, "https://www.youtube.com/watch").await.unwrap());
        assert!(service.record(1, 11, "https://youtu.be/x").await.unwrap());
        assert!(!service.record(1, 12, "no domain").await.unwrap());

        assert_eq!(
            repository.find_domains_for_chat(1).await.unwrap(),
            vec!["youtube.com".to_string(), "youtube.com".to_string()]
        );
    }

    #[tokio::test]
    async fn test_store_is_consulted_across_instances() {
        let (service, repository) = create_test_service().await;
        assert!(service.record(2, 1, "https://paypal.me/x").await.unwrap());

        let fresh = MessageLinkService::new(repository);
        assert!(!fresh.record(2, 1, "paypal.me/x").await.unwrap());
    }
}
