//! Values returned by the network client

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::content::MessageContent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatKind {
    Supergroup { supergroup_id: i64, is_channel: bool },
    BasicGroup { basic_group_id: i64 },
    Private { user_id: i64 },
    Secret,
}

/// Default member permissions of a chat
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPermissions {
    pub can_send_messages: bool,
    pub can_send_media_messages: bool,
    pub can_send_polls: bool,
    pub can_send_other_messages: bool,
    pub can_add_web_page_previews: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub title: String,
    pub kind: ChatKind,
    #[serde(default)]
    pub permissions: ChatPermissions,
}

impl Chat {
    pub fn is_group(&self) -> bool {
        matches!(
            self.kind,
            ChatKind::Supergroup { .. } | ChatKind::BasicGroup { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupergroupInfo {
    pub description: Option<String>,
    pub member_count: i32,
    pub can_get_members: bool,
    pub is_all_history_available: bool,
    pub can_get_statistics: bool,
}

impl Default for SupergroupInfo {
    /// Assumed when full info cannot be fetched
    fn default() -> Self {
        Self {
            description: None,
            member_count: 0,
            can_get_members: true,
            is_all_history_available: true,
            can_get_statistics: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicGroupInfo {
    pub description: Option<String>,
    pub members: Vec<ChatMember>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMember {
    pub user_id: i64,
    /// Epoch seconds
    pub joined_at: i64,
}

impl ChatMember {
    pub fn joined_at(&self) -> DateTime<Utc> {
        epoch_to_utc(self.joined_at)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub phone_number: Option<String>,
    pub is_verified: bool,
    pub is_scam: bool,
    pub is_fake: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteLinkInfo {
    /// 0 when the chat is not accessible before joining
    pub chat_id: i64,
    pub title: String,
    pub is_public: bool,
    pub creates_join_request: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageSender {
    User { user_id: i64 },
    Chat { chat_id: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForwardOrigin {
    Channel { chat_id: i64, message_id: i64 },
    User { user_id: i64 },
    Chat { chat_id: i64 },
    HiddenUser { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub chat_id: i64,
    pub sender: MessageSender,
    /// Epoch seconds
    pub date: i64,
    pub forward: Option<ForwardOrigin>,
    pub content: MessageContent,
}

impl Message {
    pub fn date(&self) -> DateTime<Utc> {
        epoch_to_utc(self.date)
    }

    /// The author, falling back to the chat for anonymous/channel posts
    pub fn author_id(&self) -> i64 {
        match self.sender {
            MessageSender::User { user_id } => user_id,
            MessageSender::Chat { .. } => self.chat_id,
        }
    }

    /// Origin of a forward from a channel
    pub fn channel_origin(&self) -> Option<(i64, i64)> {
        match self.forward {
            Some(ForwardOrigin::Channel {
                chat_id,
                message_id,
            }) => Some((chat_id, message_id)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedFile {
    pub file_id: i32,
    pub local_path: Option<String>,
    pub size: i64,
    pub is_downloading_completed: bool,
}

fn epoch_to_utc(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
