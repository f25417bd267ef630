//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use group_crawler::{
    config::{CrawlerConfig, DatabaseConfig, JobTypeOverrides, SchedulerConfig},
    content::{FormattedText, MessageContent},
    database::{Database, repositories::Repositories},
    job_scheduling::{
        JobCreator, JobDispatcher, JobType,
        executors::{CrawlContext, build_registry},
    },
    network::{
        BasicGroupInfo, Chat, ChatKind, ChatMember, ChatPermissions, DownloadedFile,
        InviteLinkInfo, Message, MessageSender, NetworkClient, NetworkError, NetworkResult,
        SupergroupInfo, User,
    },
};

/// Migrated in-memory database
pub async fn create_test_database() -> Repositories {
    let database = Database::new(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        ..Default::default()
    })
    .await
    .expect("Failed to connect to in-memory database");
    database.migrate().await.expect("Failed to run migrations");
    Repositories::new(database.connection())
}

/// Scheduler settings with every delay removed
pub fn quiet_scheduler_config() -> SchedulerConfig {
    let mut config = SchedulerConfig {
        launch_delay: Duration::ZERO,
        too_many_requests_cooldown: Duration::ZERO,
        ..Default::default()
    };
    for job_type in JobType::all() {
        config.job_types.insert(
            job_type,
            JobTypeOverrides {
                launch_delay: Some(Duration::ZERO),
                too_many_requests_cooldown: Some(Duration::ZERO),
                ..Default::default()
            },
        );
    }
    config
}

pub fn quiet_crawler_config() -> CrawlerConfig {
    CrawlerConfig {
        join_delay: Duration::ZERO,
        member_page_delay: Duration::ZERO,
        member_retry_delay: Duration::ZERO,
        account_fetch_delay: Duration::ZERO,
        ..Default::default()
    }
}

pub struct Harness {
    pub repositories: Repositories,
    pub network: Arc<FakeNetwork>,
    pub dispatcher: JobDispatcher,
}

/// Dispatcher wired with every crawl executor over a fresh database
pub async fn create_harness(network: FakeNetwork, scheduler: SchedulerConfig) -> Harness {
    create_harness_with(network, scheduler, quiet_crawler_config()).await
}

pub async fn create_harness_with(
    network: FakeNetwork,
    scheduler: SchedulerConfig,
    crawler: CrawlerConfig,
) -> Harness {
    let repositories = create_test_database().await;
    repositories
        .job_type_settings
        .ensure_all()
        .await
        .expect("Failed to create job type settings");

    let network = Arc::new(network);
    let client: Arc<dyn NetworkClient> = network.clone();
    let creator = Arc::new(JobCreator::new(repositories.job_records.clone(), None));
    let ctx = Arc::new(CrawlContext::new(
        repositories.clone(),
        creator,
        client.clone(),
        crawler,
    ));
    let registry = Arc::new(build_registry(ctx).expect("Failed to build registry"));
    let dispatcher = JobDispatcher::new(
        registry,
        repositories.job_records.clone(),
        repositories.job_type_settings.clone(),
        client,
        scheduler,
    );

    Harness {
        repositories,
        network,
        dispatcher,
    }
}

#[derive(Default)]
struct Script {
    chats: HashMap<i64, Chat>,
    handles: HashMap<String, i64>,
    supergroups: HashMap<i64, SupergroupInfo>,
    histories: HashMap<(i64, i64), Vec<Message>>,
    invite_links: HashMap<String, InviteLinkInfo>,
    joined_chat_count: i64,
    history_delay: Duration,
    calls: Vec<String>,
}

/// Network client answering from a fixed script and recording every call
#[derive(Default)]
pub struct FakeNetwork {
    script: Mutex<Script>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn with(self, f: impl FnOnce(&mut Script)) -> Self {
        f(&mut self.script.lock().expect("script lock poisoned"));
        self
    }

    pub fn supergroup(self, chat_id: i64, supergroup_id: i64, title: &str, info: SupergroupInfo) -> Self {
        let chat = Chat {
            id: chat_id,
            title: title.to_string(),
            kind: ChatKind::Supergroup {
                supergroup_id,
                is_channel: false,
            },
            permissions: ChatPermissions::default(),
        };
        self.with(|s| {
            s.chats.insert(chat_id, chat);
            s.supergroups.insert(supergroup_id, info);
        })
    }

    pub fn handle(self, handle: &str, chat_id: i64) -> Self {
        self.with(|s| {
            s.handles.insert(handle.to_string(), chat_id);
        })
    }

    /// Page returned for `chat_id` when asked for messages older than `from`
    pub fn history(self, chat_id: i64, from: i64, messages: Vec<Message>) -> Self {
        self.with(|s| {
            s.histories.insert((chat_id, from), messages);
        })
    }

    pub fn invite_link(self, link: &str, info: InviteLinkInfo) -> Self {
        self.with(|s| {
            s.invite_links.insert(link.to_string(), info);
        })
    }

    pub fn joined_chat_count(self, count: i64) -> Self {
        self.with(|s| s.joined_chat_count = count)
    }

    /// Latency added to every history request
    pub fn history_delay(self, delay: Duration) -> Self {
        self.with(|s| s.history_delay = delay)
    }

    pub fn calls(&self) -> Vec<String> {
        self.script.lock().expect("script lock poisoned").calls.clone()
    }

    pub fn calls_to(&self, operation: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.split('(').next() == Some(operation))
            .count()
    }

    fn record<T>(&self, call: String, f: impl FnOnce(&Script) -> NetworkResult<T>) -> NetworkResult<T> {
        let mut script = self.script.lock().expect("script lock poisoned");
        script.calls.push(call);
        f(&*script)
    }
}

fn unscripted<T>(what: impl std::fmt::Display) -> NetworkResult<T> {
    Err(NetworkError::Abort(format!("not scripted: {what}")))
}

#[async_trait]
impl NetworkClient for FakeNetwork {
    async fn is_authorized(&self) -> bool {
        true
    }

    async fn get_chat(&self, chat_id: i64) -> NetworkResult<Chat> {
        self.record(format!("get_chat({chat_id})"), |s| {
            s.chats.get(&chat_id).cloned().map_or_else(|| unscripted(chat_id), Ok)
        })
    }

    async fn get_chat_by_handle(&self, handle: &str) -> NetworkResult<Option<Chat>> {
        self.record(format!("get_chat_by_handle({handle})"), |s| {
            Ok(s.handles.get(handle).and_then(|id| s.chats.get(id)).cloned())
        })
    }

    async fn get_supergroup_info(&self, supergroup_id: i64) -> NetworkResult<SupergroupInfo> {
        self.record(format!("get_supergroup_info({supergroup_id})"), |s| {
            s.supergroups
                .get(&supergroup_id)
                .cloned()
                .map_or_else(|| unscripted(supergroup_id), Ok)
        })
    }

    async fn get_basic_group_info(&self, basic_group_id: i64) -> NetworkResult<BasicGroupInfo> {
        self.record(format!("get_basic_group_info({basic_group_id})"), |_| {
            unscripted(basic_group_id)
        })
    }

    async fn get_supergroup_members(
        &self,
        supergroup_id: i64,
        offset: i32,
        _limit: i32,
    ) -> NetworkResult<Vec<ChatMember>> {
        self.record(
            format!("get_supergroup_members({supergroup_id}, {offset})"),
            |_| Ok(Vec::new()),
        )
    }

    async fn get_user(&self, user_id: i64) -> NetworkResult<User> {
        self.record(format!("get_user({user_id})"), |_| {
            Ok(User {
                id: user_id,
                ..Default::default()
            })
        })
    }

    async fn get_chat_history(
        &self,
        chat_id: i64,
        from_message_id: i64,
        _limit: i32,
    ) -> NetworkResult<Vec<Message>> {
        let delay = self.script.lock().expect("script lock poisoned").history_delay;
        tokio::time::sleep(delay).await;
        self.record(
            format!("get_chat_history({chat_id}, {from_message_id})"),
            |s| {
                Ok(s.histories
                    .get(&(chat_id, from_message_id))
                    .cloned()
                    .unwrap_or_default())
            },
        )
    }

    async fn joined_chat_count(&self) -> NetworkResult<i64> {
        self.record("joined_chat_count()".to_string(), |s| Ok(s.joined_chat_count))
    }

    async fn check_invite_link(&self, link: &str) -> NetworkResult<InviteLinkInfo> {
        self.record(format!("check_invite_link({link})"), |s| {
            s.invite_links.get(link).cloned().map_or_else(|| unscripted(link), Ok)
        })
    }

    async fn join_chat_by_invite_link(&self, link: &str) -> NetworkResult<Chat> {
        self.record(format!("join_chat_by_invite_link({link})"), |s| {
            s.invite_links
                .get(link)
                .and_then(|info| s.chats.get(&info.chat_id))
                .cloned()
                .map_or_else(|| unscripted(link), Ok)
        })
    }

    async fn leave_chat(&self, chat_id: i64) -> NetworkResult<()> {
        self.record(format!("leave_chat({chat_id})"), |_| Ok(()))
    }

    async fn download_file(&self, file_id: i32) -> NetworkResult<DownloadedFile> {
        self.record(format!("download_file({file_id})"), |_| unscripted(file_id))
    }
}

/// Recent plain-text message from user 7
pub fn text_message(chat_id: i64, id: i64, text: &str) -> Message {
    Message {
        id,
        chat_id,
        sender: MessageSender::User { user_id: 7 },
        date: chrono::Utc::now().timestamp(),
        forward: None,
        content: MessageContent::Text {
            text: FormattedText::plain(text),
        },
    }
}
