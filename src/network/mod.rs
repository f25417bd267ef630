//! Facade over the rate-limited messaging network client
//!
//! Every call may fail with one of the retry-classification signals in
//! [`NetworkError`]; the dispatcher reacts to them through
//! [`crate::job_scheduling::JobError`].

use async_trait::async_trait;
use tracing::debug;

pub mod types;

pub use types::*;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// Bad input, not found or a business-rule violation
    #[error("{0}")]
    Abort(String),

    /// Transient, worth retrying later
    #[error("{0}")]
    Reset(String),

    #[error("{0}")]
    TooManyRequests(String),

    #[error("Network error [{code}] {message}")]
    Other { code: i32, message: String },
}

impl NetworkError {
    /// Map a client status code to a signal
    pub fn from_code(code: i32, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            400 => NetworkError::Abort(message),
            429 => NetworkError::TooManyRequests(message),
            _ => NetworkError::Other { code, message },
        }
    }
}

pub type NetworkResult<T> = Result<T, NetworkError>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// Batches are skipped until this turns true
    async fn is_authorized(&self) -> bool;

    async fn get_chat(&self, chat_id: i64) -> NetworkResult<Chat>;

    /// `None` when the handle resolves to nothing
    async fn get_chat_by_handle(&self, handle: &str) -> NetworkResult<Option<Chat>>;

    async fn get_supergroup_info(&self, supergroup_id: i64) -> NetworkResult<SupergroupInfo>;

    async fn get_basic_group_info(&self, basic_group_id: i64) -> NetworkResult<BasicGroupInfo>;

    async fn get_supergroup_members(
        &self,
        supergroup_id: i64,
        offset: i32,
        limit: i32,
    ) -> NetworkResult<Vec<ChatMember>>;

    async fn get_user(&self, user_id: i64) -> NetworkResult<User>;

    /// Messages older than `from_message_id` (0 = newest), newest first
    async fn get_chat_history(
        &self,
        chat_id: i64,
        from_message_id: i64,
        limit: i32,
    ) -> NetworkResult<Vec<Message>>;

    async fn joined_chat_count(&self) -> NetworkResult<i64>;

    async fn check_invite_link(&self, link: &str) -> NetworkResult<InviteLinkInfo>;

    async fn join_chat_by_invite_link(&self, link: &str) -> NetworkResult<Chat>;

    async fn leave_chat(&self, chat_id: i64) -> NetworkResult<()>;

    async fn download_file(&self, file_id: i32) -> NetworkResult<DownloadedFile>;
}

/// Client used until a real network session is wired in. It never reports
/// authorization, so persisted batches stay idle.
#[derive(Debug, Clone, Default)]
pub struct DisconnectedClient;

impl DisconnectedClient {
    fn unavailable<T>(&self, operation: &str) -> NetworkResult<T> {
        debug!("Network client not connected, rejecting {}", operation);
        Err(NetworkError::Reset(format!(
            "network client not connected ({operation})"
        )))
    }
}

#[async_trait]
impl NetworkClient for DisconnectedClient {
    async fn is_authorized(&self) -> bool {
        false
    }

    async fn get_chat(&self, _chat_id: i64) -> NetworkResult<Chat> {
        self.unavailable("get_chat")
    }

    async fn get_chat_by_handle(&self, _handle: &str) -> NetworkResult<Option<Chat>> {
        self.unavailable("get_chat_by_handle")
    }

    async fn get_supergroup_info(&self, _supergroup_id: i64) -> NetworkResult<SupergroupInfo> {
        self.unavailable("get_supergroup_info")
    }

    async fn get_basic_group_info(&self, _basic_group_id: i64) -> NetworkResult<BasicGroupInfo> {
        self.unavailable("get_basic_group_info")
    }

    async fn get_supergroup_members(
        &self,
        _supergroup_id: i64,
        _offset: i32,
        _limit: i32,
    ) -> NetworkResult<Vec<ChatMember>> {
        self.unavailable("get_supergroup_members")
    }

    async fn get_user(&self, _user_id: i64) -> NetworkResult<User> {
        self.unavailable("get_user")
    }

    async fn get_chat_history(
        &self,
        _chat_id: i64,
        _from_message_id: i64,
        _limit: i32,
    ) -> NetworkResult<Vec<Message>> {
        self.unavailable("get_chat_history")
    }

    async fn joined_chat_count(&self) -> NetworkResult<i64> {
        self.unavailable("joined_chat_count")
    }

    async fn check_invite_link(&self, _link: &str) -> NetworkResult<InviteLinkInfo> {
        self.unavailable("check_invite_link")
    }

    async fn join_chat_by_invite_link(&self, _link: &str) -> NetworkResult<Chat> {
        self.unavailable("join_chat_by_invite_link")
    }

    async fn leave_chat(&self, _chat_id: i64) -> NetworkResult<()> {
        self.unavailable("leave_chat")
    }

    async fn download_file(&self, _file_id: i32) -> NetworkResult<DownloadedFile> {
        self.unavailable("download_file")
    }
}
