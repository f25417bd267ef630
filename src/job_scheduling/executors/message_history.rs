//! Message history paging
//!
//! One record fetches one page, newest first, below the cursor in `param3`.
//! Links and forwards found on the page feed the crawl frontier at
//! `depth + 1`; the next page keeps the current depth but loses priority
//! with every page so fresh discovery is not starved by deep paging.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::CrawlContext;
use crate::content::links::{TelegramTarget, classify_telegram_link, extract_links};
use crate::content::truncate_chars;
use crate::errors::RepositoryError;
use crate::job_scheduling::{JobError, JobRecord, JobType, NewJob, PersistedJobExecutor};
use crate::models::StoredMessage;
use crate::network::{Message, NetworkError};

const PROVENANCE: &str = "GetMessageHistory";

pub struct GetMessageHistoryExecutor {
    ctx: Arc<CrawlContext>,
}

/// Targets already enqueued from the current page
#[derive(Default)]
struct PageFrontier {
    links: HashSet<String>,
    origins: HashSet<i64>,
}

impl GetMessageHistoryExecutor {
    pub fn new(ctx: Arc<CrawlContext>) -> Self {
        Self { ctx }
    }

    async fn fetch_page(&self, chat_id: i64, from_message_id: i64) -> Result<Vec<Message>, JobError> {
        let config = &self.ctx.config;
        let fetch = self
            .ctx
            .network
            .get_chat_history(chat_id, from_message_id, config.history_page_size);

        match tokio::time::timeout(config.history_fetch_timeout, fetch).await {
            Err(_) => Err(JobError::Timeout(config.history_fetch_timeout)),
            Ok(Err(NetworkError::Abort(message))) => {
                self.mark_deleted(chat_id).await?;
                Err(JobError::Abort(message))
            }
            Ok(result) => Ok(result?),
        }
    }

    /// A chat whose history is no longer reachable is flagged for leaving
    async fn mark_deleted(&self, chat_id: i64) -> Result<(), JobError> {
        match self.ctx.repositories.group_chats.mark_deleted(chat_id).await {
            Ok(()) => {
                info!("Marked chat {} as deleted", chat_id);
                Ok(())
            }
            Err(RepositoryError::RecordNotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist the unseen messages of a page. Returns how many were stored.
    async fn process_page(&self, chat_id: i64, depth: i32, messages: &[Message]) -> Result<usize, JobError> {
        let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();
        let persisted = self
            .ctx
            .repositories
            .messages
            .existing_message_ids(chat_id, &ids)
            .await?;

        let mut frontier = PageFrontier::default();
        let mut stored = 0;
        for message in messages.iter().filter(|m| !persisted.contains(&m.id)) {
            if message.date() < self.ctx.config.oldest_message_date {
                return Err(JobError::abort(format!(
                    "Message {} of chat {} predates {}",
                    message.id, chat_id, self.ctx.config.oldest_message_date
                )));
            }
            if self.process_message(chat_id, depth, message, &mut frontier).await? {
                stored += 1;
            }
        }
        Ok(stored)
    }

    async fn process_message(
        &self,
        chat_id: i64,
        depth: i32,
        message: &Message,
        frontier: &mut PageFrontier,
    ) -> Result<bool, JobError> {
        let Some(content) = message.content.normalize() else {
            return Ok(false);
        };
        if !content.supported {
            warn!("Unhandled message type in chat {}: {:?}", chat_id, message.content);
        }

        let links = extract_links(&content.text, &content.entities);
        let mut text = content.text;
        for hidden in links.iter().filter(|l| l.hidden) {
            text.push_str("\n\n");
            text.push_str(&hidden.url);
        }

        let stored = StoredMessage {
            message_id: message.id,
            chat_id,
            author_id: message.author_id(),
            date: message.date(),
            forward_origin: message.channel_origin(),
            text: truncate_chars(&text, self.ctx.config.max_text_length),
            message_type: content.message_type.to_string(),
            entities: content.entities,
            media: content.media,
        };
        match self.ctx.repositories.messages.insert(&stored).await {
            Ok(()) => {}
            Err(e) if e.is_unique_violation() => {
                debug!("Message {} of chat {} was stored concurrently", message.id, chat_id);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        }

        for link in &links {
            self.ctx.links.record(chat_id, message.id, &link.url).await?;
            if frontier.links.insert(link.url.clone()) {
                self.follow_link(&link.url, depth).await?;
            }
        }

        if let Some((origin, _)) = stored.forward_origin
            && origin != 0
            && frontier.origins.insert(origin)
            && !self.ctx.repositories.group_chats.exists(origin).await?
        {
            self.ctx
                .enqueue(
                    NewJob::new(JobType::GetGroupInfo, PROVENANCE)
                        .param1(origin)
                        .depth(depth + 1),
                )
                .await?;
        }

        Ok(true)
    }

    async fn follow_link(&self, url: &str, depth: i32) -> Result<(), JobError> {
        let job = match classify_telegram_link(url) {
            Some(TelegramTarget::Handle(handle)) => {
                NewJob::new(JobType::GetGroupInfoByHandle, PROVENANCE).param1(handle)
            }
            Some(TelegramTarget::InviteLink(link)) => {
                NewJob::new(JobType::FollowInviteLink, PROVENANCE).param1(link)
            }
            None => return Ok(()),
        };
        self.ctx.enqueue(job.depth(depth + 1)).await?;
        Ok(())
    }
}

#[async_trait]
impl PersistedJobExecutor for GetMessageHistoryExecutor {
    fn job_type(&self) -> JobType {
        JobType::GetMessageHistory
    }

    async fn execute(&self, record: &JobRecord) -> Result<(), JobError> {
        let chat_id: i64 = record.parse_param(1, "chat_id")?;
        let page: i32 = record.param_or(2, 1);
        let from_message_id: i64 = record.param_or(3, 0);
        let depth = record.depth_or_zero();

        let messages = self.fetch_page(chat_id, from_message_id).await?;
        let stored = self.process_page(chat_id, depth, &messages).await?;

        let Some(last) = messages.last() else {
            debug!("History of chat {} exhausted at page {}", chat_id, page);
            return Ok(());
        };

        if last.id != from_message_id {
            self.ctx
                .enqueue(
                    NewJob::new(JobType::GetMessageHistory, PROVENANCE)
                        .param1(chat_id)
                        .param2(page + 1)
                        .param3(last.id)
                        .depth(depth)
                        .priority(record.priority + depth * 10 - page),
                )
                .await?;
        }

        info!(
            "Persisted messages: {} of {} (chat {}, page {}, oldest {})",
            stored,
            messages.len(),
            chat_id,
            page,
            last.date()
        );
        Ok(())
    }
}
