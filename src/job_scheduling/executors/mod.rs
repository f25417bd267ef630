//! Crawl executors, one per job type
//!
//! Every executor shares a [`CrawlContext`]: the repositories, the job
//! creator for follow-up records, the network client and the crawler knobs.

use std::sync::Arc;

use super::job_creator::JobCreator;
use super::job_registry::JobRegistry;
use super::types::{JobError, JobSchedulingError, NewJob};
use crate::config::CrawlerConfig;
use crate::database::repositories::Repositories;
use crate::network::NetworkClient;
use crate::services::{MemberService, MessageLinkService};

pub mod graph;
pub mod group_info;
pub mod invite_link;
pub mod leave_groups;
pub mod member_list;
pub mod message_history;

pub use graph::{CalculateGraphExecutor, build_edges};
pub use group_info::{GetGroupInfoByHandleExecutor, GetGroupInfoExecutor};
pub use invite_link::FollowInviteLinkExecutor;
pub use leave_groups::LeaveGroupsExecutor;
pub use member_list::GetMemberListExecutor;
pub use message_history::GetMessageHistoryExecutor;

pub struct CrawlContext {
    pub repositories: Repositories,
    pub creator: Arc<JobCreator>,
    pub network: Arc<dyn NetworkClient>,
    pub config: CrawlerConfig,
    pub links: MessageLinkService,
    pub members: MemberService,
}

impl CrawlContext {
    pub fn new(
        repositories: Repositories,
        creator: Arc<JobCreator>,
        network: Arc<dyn NetworkClient>,
        config: CrawlerConfig,
    ) -> Self {
        let links = MessageLinkService::new(repositories.message_links.clone());
        let members = MemberService::new(
            repositories.group_members.clone(),
            repositories.accounts.clone(),
            network.clone(),
            config.account_fetch_delay,
        );
        Self {
            repositories,
            creator,
            network,
            config,
            links,
            members,
        }
    }

    /// Create a follow-up record; duplicates are skipped silently
    pub(crate) async fn enqueue(&self, job: NewJob) -> Result<bool, JobError> {
        Ok(self.creator.create(job).await?)
    }
}

/// A registry with every crawl executor
pub fn build_registry(ctx: Arc<CrawlContext>) -> Result<JobRegistry, JobSchedulingError> {
    let mut registry = JobRegistry::new();
    registry.register_persisted(Arc::new(GetGroupInfoExecutor::new(ctx.clone())))?;
    registry.register_persisted(Arc::new(GetGroupInfoByHandleExecutor::new(ctx.clone())))?;
    registry.register_persisted(Arc::new(FollowInviteLinkExecutor::new(ctx.clone())))?;
    registry.register_persisted(Arc::new(GetMemberListExecutor::new(ctx.clone())))?;
    registry.register_persisted(Arc::new(GetMessageHistoryExecutor::new(ctx.clone())))?;
    registry.register_recurring(Arc::new(CalculateGraphExecutor::new(ctx.clone())))?;
    registry.register_recurring(Arc::new(LeaveGroupsExecutor::new(ctx)))?;
    Ok(registry)
}
